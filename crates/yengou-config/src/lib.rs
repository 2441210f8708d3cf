//! Shared configuration for the Yengou CLI and TUI.
//!
//! TOML profiles, bearer-token resolution (env + keyring + plaintext),
//! and translation to `yengou_core::ConsoleConfig`. Both binaries
//! depend on this crate; the CLI layers its flag overrides on top.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use thiserror::Error;
use url::Url;

use yengou_api::{LoginRole, ReconnectConfig};
use yengou_core::{Audience, ConsoleConfig, Credential};

/// Keyring service name; entries are keyed `{profile}/token`.
pub const KEYRING_SERVICE: &str = "yengou";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("no credentials configured for profile '{profile}'")]
    NoCredentials { profile: String },

    #[error("unknown profile '{name}'")]
    UnknownProfile { name: String },

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("keyring error: {0}")]
    Keyring(#[from] keyring::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration shared by CLI and TUI.
#[derive(Debug, Deserialize, Serialize)]
pub struct Config {
    /// Default profile name.
    pub default_profile: Option<String>,

    /// Global defaults.
    #[serde(default)]
    pub defaults: Defaults,

    /// Named backend profiles.
    #[serde(default)]
    pub profiles: HashMap<String, Profile>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_profile: Some("default".into()),
            defaults: Defaults::default(),
            profiles: HashMap::new(),
        }
    }
}

impl Config {
    /// Name of the profile to use when none is given explicitly.
    pub fn active_profile_name(&self) -> &str {
        self.default_profile.as_deref().unwrap_or("default")
    }

    /// Look up `name`, or the default profile when `None`.
    pub fn profile(&self, name: Option<&str>) -> Result<(&str, &Profile), ConfigError> {
        let name = name.unwrap_or_else(|| self.active_profile_name());
        self.profiles
            .get_key_value(name)
            .map(|(k, v)| (k.as_str(), v))
            .ok_or_else(|| ConfigError::UnknownProfile { name: name.into() })
    }
}

#[derive(Debug, Deserialize, Serialize)]
pub struct Defaults {
    #[serde(default = "default_output")]
    pub output: String,

    #[serde(default = "default_color")]
    pub color: String,

    /// REST timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout: u64,

    /// Realtime handshake retries before giving up.
    #[serde(default = "default_max_retries")]
    pub reconnect_max_retries: u32,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            output: default_output(),
            color: default_color(),
            timeout: default_timeout(),
            reconnect_max_retries: default_max_retries(),
        }
    }
}

fn default_output() -> String {
    "table".into()
}
fn default_color() -> String {
    "auto".into()
}
fn default_timeout() -> u64 {
    10
}
fn default_max_retries() -> u32 {
    5
}

/// Which console the operator signs into.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum ProfileRole {
    #[default]
    Admin,
    Support,
    User,
}

impl ProfileRole {
    /// Authority names this role holds, as carried in `targetRole`.
    pub fn authorities(self) -> Vec<String> {
        let names: &[&str] = match self {
            Self::Admin => &["ROLE_ADMIN"],
            Self::Support => &["ROLE_BACKOFFICE", "ROLE_SUPPORT"],
            Self::User => &["ROLE_USER"],
        };
        names.iter().map(|s| (*s).to_owned()).collect()
    }

    pub fn login_role(self) -> LoginRole {
        match self {
            Self::Admin => LoginRole::Admin,
            Self::Support => LoginRole::Support,
            Self::User => LoginRole::User,
        }
    }
}

/// A named backend profile.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Profile {
    /// REST API root (e.g., "http://localhost:8080/api").
    pub api_url: String,

    /// Realtime endpoint. Derived from `api_url` when absent.
    pub realtime_url: Option<String>,

    #[serde(default)]
    pub role: ProfileRole,

    /// Operator id for notification targeting.
    pub user_id: Option<String>,

    /// Bearer token (plaintext -- prefer keyring or env var).
    pub token: Option<String>,

    /// Environment variable name containing the bearer token.
    pub token_env: Option<String>,

    /// Override timeout.
    pub timeout: Option<u64>,

    /// Override reconnect retries.
    pub reconnect_max_retries: Option<u32>,
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("com", "yengou", "yengou").map_or_else(
        || {
            let mut p = dirs_fallback();
            p.push("config.toml");
            p
        },
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

fn dirs_fallback() -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(".config");
    p.push("yengou");
    p
}

// ── Config loading ──────────────────────────────────────────────────

/// Load the full Config from the canonical file + environment.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path())
}

/// Load from `path`, layered: defaults → file → `YENGOU_*` env.
///
/// Nested keys use a double underscore, e.g.
/// `YENGOU_PROFILES__PROD__API_URL`.
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed("YENGOU_").split("__"));

    let config: Config = figment.extract()?;
    Ok(config)
}

/// Load config, returning a default if the file doesn't exist.
pub fn load_config_or_default() -> Config {
    load_config().unwrap_or_default()
}

// ── Config saving ───────────────────────────────────────────────────

/// Serialize config to TOML and write to the canonical config path.
pub fn save_config(cfg: &Config) -> Result<(), ConfigError> {
    save_config_to(cfg, &config_path())
}

pub fn save_config_to(cfg: &Config, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(cfg)?;
    std::fs::write(path, toml_str)?;
    Ok(())
}

// ── Credential resolution ───────────────────────────────────────────

fn keyring_entry(profile_name: &str) -> Result<keyring::Entry, keyring::Error> {
    keyring::Entry::new(KEYRING_SERVICE, &format!("{profile_name}/token"))
}

/// Resolve the bearer token: `token_env` → keyring → plaintext.
pub fn resolve_credential(profile: &Profile, profile_name: &str) -> Result<Credential, ConfigError> {
    resolve_credential_with(profile, profile_name, |name| {
        keyring_entry(name).ok()?.get_password().ok()
    })
}

fn resolve_credential_with(
    profile: &Profile,
    profile_name: &str,
    keyring_lookup: impl FnOnce(&str) -> Option<String>,
) -> Result<Credential, ConfigError> {
    // 1. Profile's token_env → env var lookup
    if let Some(ref env_name) = profile.token_env {
        if let Ok(val) = std::env::var(env_name) {
            return Ok(Credential::from(SecretString::from(val)));
        }
    }

    // 2. System keyring
    if let Some(secret) = keyring_lookup(profile_name) {
        return Ok(Credential::from(SecretString::from(secret)));
    }

    // 3. Plaintext in config
    if let Some(ref token) = profile.token {
        return Ok(Credential::from(SecretString::from(token.clone())));
    }

    Err(ConfigError::NoCredentials {
        profile: profile_name.into(),
    })
}

/// Store a bearer token in the system keyring.
pub fn store_token(profile_name: &str, token: &SecretString) -> Result<(), ConfigError> {
    keyring_entry(profile_name)?.set_password(token.expose_secret())?;
    Ok(())
}

/// Remove a stored token. Missing entries are not an error.
pub fn forget_token(profile_name: &str) -> Result<(), ConfigError> {
    match keyring_entry(profile_name)?.delete_credential() {
        Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
        Err(e) => Err(e.into()),
    }
}

// ── ConsoleConfig translation ───────────────────────────────────────

/// `http://host:8080/api` → `ws://host:8080/realtime`.
pub fn derive_realtime_url(api_url: &Url) -> Result<Url, ConfigError> {
    let scheme = match api_url.scheme() {
        "https" => "wss",
        "http" => "ws",
        other => {
            return Err(ConfigError::Validation {
                field: "api_url".into(),
                reason: format!("unsupported scheme '{other}'"),
            });
        }
    };
    let mut url = api_url.clone();
    url.set_path("/realtime");
    url.set_query(None);
    url.set_scheme(scheme).map_err(|()| ConfigError::Validation {
        field: "api_url".into(),
        reason: format!("cannot derive realtime URL from {api_url}"),
    })?;
    Ok(url)
}

fn parse_url(field: &str, raw: &str) -> Result<Url, ConfigError> {
    raw.parse().map_err(|_| ConfigError::Validation {
        field: field.into(),
        reason: format!("invalid URL: {raw}"),
    })
}

/// Build a `ConsoleConfig` from a profile. No CLI flag overrides.
///
/// `defaults` supplies timeout and retry budget when the profile does
/// not override them.
pub fn profile_to_console_config(
    profile: &Profile,
    defaults: &Defaults,
) -> Result<ConsoleConfig, ConfigError> {
    let api_url = parse_url("api_url", &profile.api_url)?;
    let realtime_url = match profile.realtime_url {
        Some(ref raw) => parse_url("realtime_url", raw)?,
        None => derive_realtime_url(&api_url)?,
    };
    if !matches!(realtime_url.scheme(), "ws" | "wss") {
        return Err(ConfigError::Validation {
            field: "realtime_url".into(),
            reason: format!("expected ws:// or wss://, got {realtime_url}"),
        });
    }

    let mut config = ConsoleConfig::new(api_url, realtime_url);
    config.timeout = Duration::from_secs(profile.timeout.unwrap_or(defaults.timeout));
    config.reconnect = ReconnectConfig {
        max_retries: Some(
            profile
                .reconnect_max_retries
                .unwrap_or(defaults.reconnect_max_retries),
        ),
        ..ReconnectConfig::default()
    };
    config.audience = Audience {
        user_id: profile.user_id.clone(),
        roles: profile.role.authorities(),
    };
    Ok(config)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn profile(api_url: &str) -> Profile {
        Profile {
            api_url: api_url.into(),
            ..Profile::default()
        }
    }

    #[test]
    fn layers_file_and_env() {
        figment::Jail::expect_with(|jail| {
            jail.create_file(
                "config.toml",
                r#"
                default_profile = "prod"

                [defaults]
                timeout = 20

                [profiles.prod]
                api_url = "https://ops.example.com/api"
                role = "support"
                "#,
            )?;
            jail.set_env("YENGOU_DEFAULTS__TIMEOUT", "3");
            jail.set_env("YENGOU_PROFILES__PROD__USER_ID", "ops-7");

            let config = load_config_from(Path::new("config.toml")).unwrap();
            assert_eq!(config.defaults.timeout, 3);
            assert_eq!(config.defaults.output, "table");

            let (name, prod) = config.profile(None).unwrap();
            assert_eq!(name, "prod");
            assert_eq!(prod.role, ProfileRole::Support);
            assert_eq!(prod.user_id.as_deref(), Some("ops-7"));
            Ok(())
        });
    }

    #[test]
    fn missing_file_yields_defaults() {
        figment::Jail::expect_with(|_jail| {
            let config = load_config_from(Path::new("nope.toml")).unwrap();
            assert_eq!(config.active_profile_name(), "default");
            assert!(config.profiles.is_empty());
            assert!(matches!(
                config.profile(None),
                Err(ConfigError::UnknownProfile { .. })
            ));
            Ok(())
        });
    }

    #[test]
    fn save_then_load_preserves_profiles() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut config = Config::default();
        config.profiles.insert(
            "default".into(),
            Profile {
                role: ProfileRole::User,
                token_env: Some("YENGOU_TEST_TOKEN".into()),
                ..profile("http://localhost:8080/api")
            },
        );
        save_config_to(&config, &path).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("role = \"user\""));

        let loaded: Config = toml::from_str(&text).unwrap();
        let (_, p) = loaded.profile(None).unwrap();
        assert_eq!(p.token_env.as_deref(), Some("YENGOU_TEST_TOKEN"));
    }

    #[test]
    fn realtime_url_is_derived_from_api_url() {
        let api = Url::parse("https://ops.example.com:8443/api?x=1").unwrap();
        assert_eq!(
            derive_realtime_url(&api).unwrap().as_str(),
            "wss://ops.example.com:8443/realtime"
        );
        let api = Url::parse("http://localhost:8080/api").unwrap();
        assert_eq!(
            derive_realtime_url(&api).unwrap().as_str(),
            "ws://localhost:8080/realtime"
        );
    }

    #[test]
    fn console_config_from_profile() {
        let p = Profile {
            role: ProfileRole::Support,
            user_id: Some("ops-1".into()),
            reconnect_max_retries: Some(2),
            ..profile("http://localhost:8080/api")
        };
        let config = profile_to_console_config(&p, &Defaults::default()).unwrap();

        assert_eq!(config.realtime_url.as_str(), "ws://localhost:8080/realtime");
        assert_eq!(config.timeout, Duration::from_secs(10));
        assert_eq!(config.reconnect.max_retries, Some(2));
        assert_eq!(config.audience.user_id.as_deref(), Some("ops-1"));
        assert!(config.audience.roles.contains(&"ROLE_BACKOFFICE".to_owned()));
    }

    #[test]
    fn rejects_non_websocket_realtime_url() {
        let p = Profile {
            realtime_url: Some("http://localhost:8080/realtime".into()),
            ..profile("http://localhost:8080/api")
        };
        let err = profile_to_console_config(&p, &Defaults::default()).unwrap_err();
        assert!(matches!(err, ConfigError::Validation { ref field, .. } if field == "realtime_url"));
    }

    #[test]
    fn credential_order_env_then_keyring_then_plaintext() {
        figment::Jail::expect_with(|jail| {
            jail.set_env("YENGOU_TEST_TOKEN_ENV", "from-env");
            let p = Profile {
                token: Some("from-file".into()),
                token_env: Some("YENGOU_TEST_TOKEN_ENV".into()),
                ..profile("http://localhost:8080/api")
            };

            let cred = resolve_credential_with(&p, "prod", |_| Some("from-keyring".into())).unwrap();
            assert_eq!(cred.secret().expose_secret(), "from-env");

            let p = Profile { token_env: None, ..p };
            let cred = resolve_credential_with(&p, "prod", |name| {
                assert_eq!(name, "prod");
                Some("from-keyring".into())
            })
            .unwrap();
            assert_eq!(cred.secret().expose_secret(), "from-keyring");

            let cred = resolve_credential_with(&p, "prod", |_| None).unwrap();
            assert_eq!(cred.secret().expose_secret(), "from-file");

            let p = Profile { token: None, ..p };
            assert!(matches!(
                resolve_credential_with(&p, "prod", |_| None),
                Err(ConfigError::NoCredentials { .. })
            ));
            Ok(())
        });
    }

    #[test]
    fn role_maps_to_login_endpoint() {
        assert_eq!(ProfileRole::Admin.login_role(), LoginRole::Admin);
        assert_eq!("SUPPORT".parse::<ProfileRole>().unwrap(), ProfileRole::Support);
    }
}
