// ── Core error types ──
//
// User-facing errors from yengou-core. Consumers never see HTTP status
// codes or JSON parse failures directly. The `From<yengou_api::Error>`
// impl translates transport-layer errors into domain variants.
//
// Realtime connection failures are NOT returned from here: they surface
// as `ConnectionError` events on the bus.

use thiserror::Error;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Connection errors ────────────────────────────────────────────
    #[error("Cannot reach backend at {url}: {reason}")]
    ConnectionFailed { url: String, reason: String },

    #[error("Authentication failed: {message}")]
    AuthenticationFailed { message: String },

    #[error("Realtime connection is not established")]
    NotConnected,

    #[error("No credential has been supplied yet")]
    NoCredential,

    #[error("Request timed out")]
    Timeout,

    // ── API errors (wrapped, not exposed raw) ────────────────────────
    #[error("API error: {message}")]
    Api {
        message: String,
        /// HTTP status code (if applicable).
        status: Option<u16>,
    },

    // ── Validation errors ────────────────────────────────────────────
    #[error("Validation failed: {message}")]
    ValidationFailed { message: String },

    // ── Configuration errors ─────────────────────────────────────────
    #[error("Configuration error: {message}")]
    Config { message: String },

    // ── Internal errors ──────────────────────────────────────────────
    #[error("Internal error: {0}")]
    Internal(String),
}

// ── Conversion from transport-layer errors ───────────────────────────

impl From<yengou_api::Error> for CoreError {
    fn from(err: yengou_api::Error) -> Self {
        match err {
            yengou_api::Error::Authentication { message } => {
                CoreError::AuthenticationFailed { message }
            }
            yengou_api::Error::SessionExpired => CoreError::AuthenticationFailed {
                message: "Session expired -- log in again".into(),
            },
            yengou_api::Error::Transport(ref e) => {
                if e.is_timeout() {
                    CoreError::Timeout
                } else if e.is_connect() {
                    CoreError::ConnectionFailed {
                        url: e
                            .url()
                            .map_or_else(|| "<unknown>".into(), ToString::to_string),
                        reason: e.to_string(),
                    }
                } else {
                    CoreError::Api {
                        message: e.to_string(),
                        status: e.status().map(|s| s.as_u16()),
                    }
                }
            }
            yengou_api::Error::InvalidUrl(e) => CoreError::Config {
                message: format!("Invalid URL: {e}"),
            },
            yengou_api::Error::Api { status, message } => CoreError::Api {
                message,
                status: Some(status),
            },
            yengou_api::Error::WebSocketConnect(reason) => CoreError::ConnectionFailed {
                url: String::new(),
                reason: format!("WebSocket connection failed: {reason}"),
            },
            yengou_api::Error::WebSocketClosed { code, reason } => CoreError::ConnectionFailed {
                url: String::new(),
                reason: format!("WebSocket closed (code {code}): {reason}"),
            },
            yengou_api::Error::Deserialization { message, body: _ } => {
                CoreError::Internal(format!("Deserialization error: {message}"))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_expiry_maps_to_auth_failure() {
        let err = CoreError::from(yengou_api::Error::SessionExpired);
        assert!(matches!(err, CoreError::AuthenticationFailed { .. }));
    }

    #[test]
    fn api_status_is_preserved() {
        let err = CoreError::from(yengou_api::Error::Api {
            status: 502,
            message: "bad gateway".into(),
        });
        match err {
            CoreError::Api { status, message } => {
                assert_eq!(status, Some(502));
                assert_eq!(message, "bad gateway");
            }
            other => panic!("unexpected {other:?}"),
        }
    }
}
