//! Config subcommand handlers.

use std::collections::HashMap;

use dialoguer::{Input, Select};
use secrecy::SecretString;

use crate::cli::{ConfigArgs, ConfigCommand, GlobalOpts};
use crate::config::{self, Config, Defaults, Profile, ProfileRole};
use crate::error::CliError;
use crate::output;

const REDACTED: &str = "****";

// ── Helpers ─────────────────────────────────────────────────────────

/// TOML-ish view of the config with plaintext tokens masked.
fn format_config_redacted(cfg: &Config) -> String {
    use std::fmt::Write;
    let mut out = String::new();

    if let Some(ref default) = cfg.default_profile {
        let _ = writeln!(out, "default_profile = \"{default}\"");
    }
    let _ = writeln!(out);
    let _ = writeln!(out, "[defaults]");
    let _ = writeln!(out, "output = \"{}\"", cfg.defaults.output);
    let _ = writeln!(out, "color = \"{}\"", cfg.defaults.color);
    let _ = writeln!(out, "timeout = {}", cfg.defaults.timeout);
    let _ = writeln!(
        out,
        "reconnect_max_retries = {}",
        cfg.defaults.reconnect_max_retries
    );

    let mut names: Vec<_> = cfg.profiles.keys().collect();
    names.sort();
    for name in names {
        let p = &cfg.profiles[name];
        let _ = writeln!(out);
        let _ = writeln!(out, "[profiles.{name}]");
        let _ = writeln!(out, "api_url = \"{}\"", p.api_url);
        if let Some(ref url) = p.realtime_url {
            let _ = writeln!(out, "realtime_url = \"{url}\"");
        }
        let _ = writeln!(out, "role = \"{}\"", p.role);
        if let Some(ref id) = p.user_id {
            let _ = writeln!(out, "user_id = \"{id}\"");
        }
        if p.token.is_some() {
            let _ = writeln!(out, "token = \"{REDACTED}\"");
        }
        if let Some(ref env) = p.token_env {
            let _ = writeln!(out, "token_env = \"{env}\"");
        }
        if let Some(timeout) = p.timeout {
            let _ = writeln!(out, "timeout = {timeout}");
        }
        if let Some(retries) = p.reconnect_max_retries {
            let _ = writeln!(out, "reconnect_max_retries = {retries}");
        }
    }

    out
}

/// Serde view for json/yaml output, same masking as the table view.
fn redacted_value(cfg: &Config) -> Result<serde_json::Value, CliError> {
    let mut value = serde_json::to_value(cfg)?;
    if let Some(profiles) = value.get_mut("profiles").and_then(|p| p.as_object_mut()) {
        for profile in profiles.values_mut() {
            if let Some(token) = profile.get_mut("token").filter(|t| !t.is_null()) {
                *token = REDACTED.into();
            }
        }
    }
    Ok(value)
}

fn save_config(cfg: &Config) -> Result<(), CliError> {
    config::save_config(cfg)?;
    Ok(())
}

/// Map a dialoguer / interactive I/O failure into CliError.
fn prompt_err(e: impl std::fmt::Display) -> CliError {
    CliError::Validation {
        field: "interactive".into(),
        reason: format!("prompt failed: {e}"),
    }
}

fn prompt_token() -> Result<SecretString, CliError> {
    let token = rpassword::prompt_password("Bearer token: ").map_err(prompt_err)?;
    if token.trim().is_empty() {
        return Err(CliError::Validation {
            field: "token".into(),
            reason: "token cannot be empty".into(),
        });
    }
    Ok(SecretString::from(token.trim().to_owned()))
}

fn profile_not_found(cfg: &Config, name: String) -> CliError {
    let mut available: Vec<_> = cfg.profiles.keys().cloned().collect();
    available.sort();
    CliError::ProfileNotFound {
        name,
        available: if available.is_empty() {
            "(none)".into()
        } else {
            available.join(", ")
        },
    }
}

fn parse_number<T: std::str::FromStr>(field: &str, value: &str) -> Result<T, CliError> {
    value.parse().map_err(|_| CliError::Validation {
        field: field.into(),
        reason: "must be a non-negative number".into(),
    })
}

/// Apply `key = value` to a profile.
fn set_key(profile: &mut Profile, key: &str, value: String) -> Result<(), CliError> {
    match key {
        "api_url" | "api-url" => profile.api_url = value,
        "realtime_url" | "realtime-url" => profile.realtime_url = Some(value),
        "role" => {
            profile.role = value.parse::<ProfileRole>().map_err(|_| CliError::Validation {
                field: "role".into(),
                reason: "must be 'admin', 'support', or 'user'".into(),
            })?;
        }
        "user_id" | "user-id" => profile.user_id = Some(value),
        "token_env" | "token-env" => profile.token_env = Some(value),
        "timeout" => profile.timeout = Some(parse_number("timeout", &value)?),
        "reconnect_max_retries" | "reconnect-max-retries" => {
            profile.reconnect_max_retries = Some(parse_number("reconnect_max_retries", &value)?);
        }
        other => {
            return Err(CliError::Validation {
                field: other.into(),
                reason: format!(
                    "unknown config key '{other}'. Valid keys: api_url, realtime_url, role, \
                     user_id, token_env, timeout, reconnect_max_retries"
                ),
            });
        }
    }
    Ok(())
}

// ── Handler ─────────────────────────────────────────────────────────

#[allow(clippy::too_many_lines)]
pub fn handle(args: ConfigArgs, global: &GlobalOpts) -> Result<(), CliError> {
    match args.command {
        // ── Init: interactive wizard ────────────────────────────────
        ConfigCommand::Init => {
            let config_path = config::config_path();
            eprintln!("yengou configuration wizard");
            eprintln!("   Config path: {}\n", config_path.display());

            let profile_name: String = Input::new()
                .with_prompt("Profile name")
                .default("default".into())
                .interact_text()
                .map_err(prompt_err)?;

            let api_url: String = Input::new()
                .with_prompt("API URL")
                .default("http://localhost:8080/api".into())
                .interact_text()
                .map_err(prompt_err)?;

            let roles = &["admin", "support", "user"];
            let role = match Select::new()
                .with_prompt("Role")
                .items(roles)
                .default(0)
                .interact()
                .map_err(prompt_err)?
            {
                0 => ProfileRole::Admin,
                1 => ProfileRole::Support,
                _ => ProfileRole::User,
            };

            let user_id: String = Input::new()
                .with_prompt("Operator id (blank to skip)")
                .allow_empty(true)
                .interact_text()
                .map_err(prompt_err)?;

            let storage = &[
                "Store a token in the system keyring (recommended)",
                "Read the token from an environment variable",
                "Save a token to the config file (plaintext)",
                "Skip (run `yengou login` later)",
            ];
            let choice = Select::new()
                .with_prompt("Bearer token")
                .items(storage)
                .default(0)
                .interact()
                .map_err(prompt_err)?;

            let (token, token_env) = match choice {
                0 => {
                    yengou_config::store_token(&profile_name, &prompt_token()?)?;
                    eprintln!("   Token stored in system keyring");
                    (None, None)
                }
                1 => {
                    let var: String = Input::new()
                        .with_prompt("Variable name")
                        .default("YENGOU_TOKEN".into())
                        .interact_text()
                        .map_err(prompt_err)?;
                    (None, Some(var))
                }
                2 => {
                    let token = rpassword::prompt_password("Bearer token: ").map_err(prompt_err)?;
                    (Some(token.trim().to_owned()), None)
                }
                _ => (None, None),
            };

            let profile = Profile {
                api_url,
                role,
                user_id: (!user_id.trim().is_empty()).then(|| user_id.trim().to_owned()),
                token,
                token_env,
                ..Profile::default()
            };

            let mut profiles = HashMap::new();
            profiles.insert(profile_name.clone(), profile);

            let cfg = Config {
                default_profile: Some(profile_name.clone()),
                defaults: Defaults::default(),
                profiles,
            };
            save_config(&cfg)?;

            eprintln!("\nConfiguration written to {}", config_path.display());
            eprintln!("  Active profile: {profile_name}");
            eprintln!("\n  Test it: yengou dashboard stats");
            Ok(())
        }

        // ── Show ────────────────────────────────────────────────────
        ConfigCommand::Show => {
            let cfg = config::load_config_or_default();
            let value = redacted_value(&cfg)?;
            let out = output::render_single(
                &global.output,
                &value,
                |_| format_config_redacted(&cfg),
                |_| config::active_profile_name(global, &cfg),
            )?;
            output::print_output(&out, global.quiet);
            Ok(())
        }

        // ── Set <key> <value> ───────────────────────────────────────
        ConfigCommand::Set { key, value } => {
            let mut cfg = config::load_config_or_default();
            let profile_name = config::active_profile_name(global, &cfg);
            let profile = cfg.profiles.entry(profile_name.clone()).or_default();
            set_key(profile, &key, value)?;
            save_config(&cfg)?;
            eprintln!("Set {key} on profile '{profile_name}'");
            Ok(())
        }

        // ── Profiles ────────────────────────────────────────────────
        ConfigCommand::Profiles => {
            let cfg = config::load_config_or_default();
            let default = cfg.default_profile.as_deref().unwrap_or("default");
            if cfg.profiles.is_empty() {
                eprintln!("No profiles configured. Run: yengou config init");
            } else {
                let mut names: Vec<_> = cfg.profiles.keys().collect();
                names.sort();
                for name in names {
                    let marker = if name == default { " *" } else { "" };
                    println!("{name}{marker}");
                }
            }
            Ok(())
        }

        // ── Use <name> ─────────────────────────────────────────────
        ConfigCommand::Use { name } => {
            let mut cfg = config::load_config_or_default();
            if !cfg.profiles.contains_key(&name) {
                return Err(profile_not_found(&cfg, name));
            }
            cfg.default_profile = Some(name.clone());
            save_config(&cfg)?;
            eprintln!("Default profile set to '{name}'");
            Ok(())
        }

        // ── Keyring ─────────────────────────────────────────────────
        ConfigCommand::SetToken { profile } => {
            let cfg = config::load_config_or_default();
            let profile_name = profile.unwrap_or_else(|| config::active_profile_name(global, &cfg));
            if !cfg.profiles.contains_key(&profile_name) {
                return Err(profile_not_found(&cfg, profile_name));
            }
            yengou_config::store_token(&profile_name, &prompt_token()?)?;
            eprintln!("Token stored in system keyring for profile '{profile_name}'");
            Ok(())
        }

        ConfigCommand::ForgetToken { profile } => {
            let cfg = config::load_config_or_default();
            let profile_name = profile.unwrap_or_else(|| config::active_profile_name(global, &cfg));
            yengou_config::forget_token(&profile_name)?;
            eprintln!("Token removed for profile '{profile_name}'");
            Ok(())
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn set_key_parses_typed_values() {
        let mut profile = Profile::default();
        set_key(&mut profile, "role", "support".into()).unwrap();
        set_key(&mut profile, "timeout", "30".into()).unwrap();
        set_key(&mut profile, "reconnect-max-retries", "2".into()).unwrap();
        assert_eq!(profile.role, ProfileRole::Support);
        assert_eq!(profile.timeout, Some(30));
        assert_eq!(profile.reconnect_max_retries, Some(2));

        assert!(set_key(&mut profile, "timeout", "soon".into()).is_err());
        assert!(set_key(&mut profile, "role", "driver".into()).is_err());
        assert!(set_key(&mut profile, "password", "x".into()).is_err());
    }

    #[test]
    fn plaintext_tokens_are_masked() {
        let mut cfg = Config::default();
        cfg.profiles.insert(
            "prod".into(),
            Profile {
                api_url: "https://ops.example.com/api".into(),
                token: Some("secret-token".into()),
                ..Profile::default()
            },
        );

        let text = format_config_redacted(&cfg);
        assert!(text.contains("token = \"****\""));
        assert!(!text.contains("secret-token"));

        let value = redacted_value(&cfg).unwrap();
        assert_eq!(value["profiles"]["prod"]["token"], "****");
    }
}
