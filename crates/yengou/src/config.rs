//! CLI configuration: thin wrapper around `yengou_config` shared types.
//!
//! Re-exports the shared types and adds CLI-specific resolution that
//! respects `GlobalOpts` flag overrides (--api-url, --token, etc.).

use std::time::Duration;

use secrecy::SecretString;

use yengou_core::{ConsoleConfig, CoreError, Credential};

use crate::cli::GlobalOpts;
use crate::error::CliError;

// ── Re-exports from shared crate ────────────────────────────────────

pub use yengou_config::{
    Config, Defaults, Profile, ProfileRole, config_path, load_config_or_default, save_config,
};

/// Everything a network-bound command needs.
pub struct Resolved {
    pub profile_name: String,
    pub role: ProfileRole,
    pub console: ConsoleConfig,
    /// `None` only when no credential source is configured at all.
    pub credential: Option<Credential>,
}

impl Resolved {
    pub fn credential(&self) -> Result<Credential, CliError> {
        self.credential.clone().ok_or_else(|| CliError::NoCredentials {
            profile: self.profile_name.clone(),
        })
    }
}

// ── CLI-specific helpers ────────────────────────────────────────────

/// Resolve the active profile name from CLI flags and config.
pub fn active_profile_name(global: &GlobalOpts, config: &Config) -> String {
    global
        .profile
        .clone()
        .or_else(|| config.default_profile.clone())
        .unwrap_or_else(|| "default".into())
}

/// Translate profile + global flags into a `ConsoleConfig` and credential.
///
/// CLI flag overrides take priority over profile values. Without a
/// profile, `--api-url` alone is enough to build a config.
pub fn resolve(global: &GlobalOpts) -> Result<Resolved, CliError> {
    let cfg = load_config_or_default();
    let profile_name = active_profile_name(global, &cfg);

    let base = match cfg.profiles.get(&profile_name) {
        Some(profile) => profile.clone(),
        None => {
            if global.profile.is_some() {
                let mut available: Vec<_> = cfg.profiles.keys().cloned().collect();
                available.sort();
                return Err(CliError::ProfileNotFound {
                    name: profile_name,
                    available: if available.is_empty() {
                        "(none)".into()
                    } else {
                        available.join(", ")
                    },
                });
            }
            let Some(ref api_url) = global.api_url else {
                return Err(CliError::NoConfig {
                    path: config_path().display().to_string(),
                });
            };
            Profile {
                api_url: api_url.clone(),
                ..Profile::default()
            }
        }
    };

    // 1. Endpoints (flag > env > profile)
    let profile = Profile {
        api_url: global.api_url.clone().unwrap_or_else(|| base.api_url.clone()),
        realtime_url: global.realtime_url.clone().or_else(|| base.realtime_url.clone()),
        timeout: global.timeout.or(base.timeout),
        ..base
    };
    let console = yengou_config::profile_to_console_config(&profile, &cfg.defaults)?;

    // 2. Credential (flag > token_env > keyring > plaintext)
    let credential = match global.token {
        Some(ref token) => Some(Credential::from(SecretString::from(token.clone()))),
        None => match yengou_config::resolve_credential(&profile, &profile_name) {
            Ok(c) => Some(c),
            Err(yengou_config::ConfigError::NoCredentials { .. }) => None,
            Err(e) => return Err(e.into()),
        },
    };

    Ok(Resolved {
        profile_name,
        role: profile.role,
        console,
        credential,
    })
}

impl Resolved {
    /// Map a backend error, filling in the profile and timeout the
    /// generic conversion cannot know.
    pub fn backend_error(&self, err: impl Into<CoreError>) -> CliError {
        match err.into() {
            CoreError::AuthenticationFailed { message } => CliError::AuthFailed {
                profile: self.profile_name.clone(),
                message,
            },
            CoreError::NoCredential => CliError::NoCredentials {
                profile: self.profile_name.clone(),
            },
            CoreError::Timeout => CliError::Timeout {
                seconds: self.console.timeout.as_secs(),
            },
            CoreError::NotConnected => CliError::ConnectionFailed {
                url: self.console.realtime_url.to_string(),
                source: "realtime connection is not established".into(),
            },
            other => other.into(),
        }
    }
}

/// Seconds to wait for the realtime handshake before giving up.
pub fn connect_timeout(resolved: &Resolved) -> Duration {
    resolved.console.timeout.max(Duration::from_secs(5))
}
