use thiserror::Error;

/// Top-level error type for the `yengou-api` crate.
///
/// Covers every failure mode across both API surfaces: the realtime
/// WebSocket and the REST backend. `yengou-core` maps these into
/// user-facing diagnostics.
#[derive(Debug, Error)]
pub enum Error {
    // ── Authentication ──────────────────────────────────────────────
    /// Login failed or the bearer token was rejected.
    #[error("Authentication failed: {message}")]
    Authentication { message: String },

    /// The bearer token has expired or been revoked.
    #[error("Session expired -- re-authentication required")]
    SessionExpired,

    // ── Transport ───────────────────────────────────────────────────
    /// HTTP transport error (connection refused, DNS failure, etc.)
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    // ── REST ────────────────────────────────────────────────────────
    /// Non-success status returned by the REST backend.
    #[error("API error (HTTP {status}): {message}")]
    Api { status: u16, message: String },

    // ── WebSocket ───────────────────────────────────────────────────
    /// WebSocket connection failed.
    #[error("WebSocket connection failed: {0}")]
    WebSocketConnect(String),

    /// WebSocket closed unexpectedly.
    #[error("WebSocket closed (code {code}): {reason}")]
    WebSocketClosed { code: u16, reason: String },

    // ── Data ────────────────────────────────────────────────────────
    /// JSON deserialization failed, with the raw body for debugging.
    #[error("Deserialization error: {message}")]
    Deserialization { message: String, body: String },
}

impl Error {
    /// Returns `true` if the backend refused the credential outright.
    /// Retrying with the same token will not help.
    pub fn is_auth_rejection(&self) -> bool {
        matches!(self, Self::Authentication { .. } | Self::SessionExpired)
    }

    /// Returns `true` if this is a transient error worth retrying.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport(e) => e.is_timeout() || e.is_connect(),
            Self::WebSocketConnect(_) | Self::WebSocketClosed { .. } => true,
            Self::Api { status, .. } => *status >= 500,
            _ => false,
        }
    }

    /// Returns `true` if this is a "not found" error.
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::Transport(e) => e.status() == Some(reqwest::StatusCode::NOT_FOUND),
            Self::Api { status: 404, .. } => true,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_errors_are_rejections_not_transient() {
        let err = Error::Authentication {
            message: "bad token".into(),
        };
        assert!(err.is_auth_rejection());
        assert!(!err.is_transient());
        assert!(Error::SessionExpired.is_auth_rejection());
    }

    #[test]
    fn server_errors_are_transient() {
        let err = Error::Api {
            status: 503,
            message: "unavailable".into(),
        };
        assert!(err.is_transient());
        assert!(!err.is_auth_rejection());

        let err = Error::Api {
            status: 404,
            message: "missing".into(),
        };
        assert!(!err.is_transient());
        assert!(err.is_not_found());
    }

    #[test]
    fn websocket_drops_are_transient() {
        assert!(Error::WebSocketConnect("refused".into()).is_transient());
        assert!(
            Error::WebSocketClosed {
                code: 1006,
                reason: "abnormal".into()
            }
            .is_transient()
        );
    }
}
