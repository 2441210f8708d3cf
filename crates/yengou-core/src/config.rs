// ── Runtime console configuration ──
//
// Describes *where* the backend lives and *who* is watching. Carries no
// credential: tokens are supplied per `connect()` call. The CLI/TUI
// builds a `ConsoleConfig` and hands it in; core never reads config files.

use std::fmt;
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use url::Url;
use yengou_api::ReconnectConfig;
use yengou_api::wire::SystemNotification;

/// An opaque bearer token from the auth collaborator.
///
/// Never mutated by this crate. Compared by value to decide whether a
/// `connect()` call is a no-op or a credential change.
#[derive(Clone)]
pub struct Credential(SecretString);

impl Credential {
    pub fn new(token: impl Into<String>) -> Self {
        Self(SecretString::from(token.into()))
    }

    pub fn secret(&self) -> &SecretString {
        &self.0
    }

    /// Whether both credentials carry the same token.
    pub fn same_as(&self, other: &Self) -> bool {
        self.0.expose_secret() == other.0.expose_secret()
    }
}

impl From<SecretString> for Credential {
    fn from(secret: SecretString) -> Self {
        Self(secret)
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential([REDACTED])")
    }
}

/// Who the console is running for. Targeted notifications are filtered
/// against this.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Audience {
    pub user_id: Option<String>,
    /// Authority names, e.g. `ROLE_ADMIN`.
    pub roles: Vec<String>,
}

impl Audience {
    /// Untargeted notifications always pass. A `userId` must match ours;
    /// a `targetRole` list must share at least one role with ours.
    pub fn accepts(&self, notification: &SystemNotification) -> bool {
        let user_ok = notification
            .user_id
            .as_deref()
            .is_none_or(|target| self.user_id.as_deref() == Some(target));

        let role_ok = match notification.target_role.as_deref() {
            None | Some([]) => true,
            Some(targets) => targets.iter().any(|t| self.roles.contains(t)),
        };

        user_ok && role_ok
    }
}

/// Configuration for one console instance.
#[derive(Debug, Clone)]
pub struct ConsoleConfig {
    /// REST API root, e.g. `http://localhost:8080/api`.
    pub api_url: Url,
    /// Realtime WebSocket endpoint.
    pub realtime_url: Url,
    /// REST request timeout.
    pub timeout: Duration,
    /// Transport-level reconnect policy.
    pub reconnect: ReconnectConfig,
    pub audience: Audience,
}

impl ConsoleConfig {
    pub fn new(api_url: Url, realtime_url: Url) -> Self {
        Self {
            api_url,
            realtime_url,
            timeout: Duration::from_secs(10),
            reconnect: ReconnectConfig::default(),
            audience: Audience::default(),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use yengou_api::wire::NotificationKind;

    fn notification(user_id: Option<&str>, roles: Option<&[&str]>) -> SystemNotification {
        SystemNotification {
            kind: NotificationKind::Info,
            title: "t".into(),
            message: "m".into(),
            timestamp: chrono::Utc::now(),
            user_id: user_id.map(str::to_owned),
            target_role: roles.map(|r| r.iter().map(|s| (*s).to_owned()).collect()),
        }
    }

    #[test]
    fn credential_debug_is_redacted() {
        let cred = Credential::new("super-secret");
        assert!(!format!("{cred:?}").contains("super-secret"));
        assert!(cred.same_as(&Credential::new("super-secret")));
        assert!(!cred.same_as(&Credential::new("other")));
    }

    #[test]
    fn untargeted_notifications_reach_everyone() {
        let audience = Audience::default();
        assert!(audience.accepts(&notification(None, None)));
        assert!(audience.accepts(&notification(None, Some(&[]))));
    }

    #[test]
    fn targeted_notifications_are_filtered() {
        let audience = Audience {
            user_id: Some("u1".into()),
            roles: vec!["ROLE_BACKOFFICE".into()],
        };
        assert!(audience.accepts(&notification(Some("u1"), None)));
        assert!(!audience.accepts(&notification(Some("u2"), None)));
        assert!(audience.accepts(&notification(None, Some(&["ROLE_ADMIN", "ROLE_BACKOFFICE"]))));
        assert!(!audience.accepts(&notification(None, Some(&["ROLE_ADMIN"]))));
        assert!(!audience.accepts(&notification(Some("u1"), Some(&["ROLE_ADMIN"]))));
    }
}
