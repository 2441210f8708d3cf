//! `yengou-tui`: live operations map for the Yengou ride-hailing backend.
//!
//! Built on [ratatui](https://ratatui.rs) with reactive data from
//! `yengou-core`'s [`Console`]. Screens are navigable via number keys:
//! Live map, Trips, and Alerts.
//!
//! Logs go to a file (default `/tmp/yengou-tui.log`) so they never
//! corrupt the terminal. A background data bridge seeds from REST, joins
//! the realtime feed, and forwards every change into the action loop.

mod action;
mod app;
mod component;
mod data_bridge;
mod event;
mod map;
mod screen;
mod screens;
mod theme;
mod tui;

use std::path::PathBuf;

use clap::Parser;
use color_eyre::eyre::{Result, WrapErr, eyre};
use secrecy::SecretString;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};
use url::Url;

use yengou_core::{Console, ConsoleConfig, Credential};

use crate::app::App;

/// Terminal live map for dispatchers and operators.
#[derive(Parser, Debug)]
#[command(name = "yengou-tui", version, about)]
struct Cli {
    /// Config profile to use
    #[arg(short, long, env = "YENGOU_PROFILE")]
    profile: Option<String>,

    /// REST API root, overriding the profile (e.g. http://localhost:8080/api)
    #[arg(short = 'u', long, env = "YENGOU_API_URL")]
    api_url: Option<String>,

    /// Bearer token, overriding the profile's stored credential
    #[arg(short = 't', long, env = "YENGOU_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// Log file path
    #[arg(long, default_value = "/tmp/yengou-tui.log")]
    log_file: PathBuf,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

/// File-based tracing. Logging to stdout/stderr would corrupt the TUI.
/// The returned guard must live until exit so buffered lines flush.
fn setup_tracing(cli: &Cli) -> WorkerGuard {
    let log_level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!("yengou_tui={log_level},yengou_core={log_level}"))
    });

    let log_dir = cli
        .log_file
        .parent()
        .unwrap_or(std::path::Path::new("/tmp"));
    let log_filename = cli
        .log_file
        .file_name()
        .unwrap_or(std::ffi::OsStr::new("yengou-tui.log"));

    let file_appender = tracing_appender::rolling::never(log_dir, log_filename);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(false)
                .with_target(true)
                .with_thread_ids(true),
        )
        .init();

    guard
}

/// Resolve connection settings. Priority: flags > profile.
fn build_console(cli: &Cli) -> Result<(Console, Credential)> {
    let cfg = yengou_config::load_config_or_default();
    let profile = match cfg.profile(cli.profile.as_deref()) {
        Ok(found) => Some(found),
        // An explicitly named profile must exist.
        Err(e) if cli.profile.is_some() => return Err(e.into()),
        Err(_) => None,
    };

    let mut config = match (profile, &cli.api_url) {
        (Some((_, p)), _) => yengou_config::profile_to_console_config(p, &cfg.defaults)?,
        (None, Some(raw)) => {
            let api_url: Url = raw.parse().wrap_err_with(|| format!("invalid --api-url {raw}"))?;
            let realtime_url = yengou_config::derive_realtime_url(&api_url)?;
            ConsoleConfig::new(api_url, realtime_url)
        }
        (None, None) => {
            return Err(eyre!(
                "no profile configured; run `yengou config init` or pass --api-url"
            ));
        }
    };
    if let (Some(_), Some(raw)) = (profile, &cli.api_url) {
        let api_url: Url = raw.parse().wrap_err_with(|| format!("invalid --api-url {raw}"))?;
        config.realtime_url = yengou_config::derive_realtime_url(&api_url)?;
        config.api_url = api_url;
    }

    let credential = match (&cli.token, profile) {
        (Some(token), _) => Credential::from(SecretString::from(token.clone())),
        (None, Some((name, p))) => yengou_config::resolve_credential(p, name)?,
        (None, None) => return Err(eyre!("no token; pass --token or run `yengou login`")),
    };

    Ok((Console::new(config), credential))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Hooks go in before the terminal enters raw mode.
    tui::install_hooks()?;
    let _log_guard = setup_tracing(&cli);

    let (console, credential) = build_console(&cli)?;
    info!(
        api_url = %console.config().api_url,
        realtime_url = %console.config().realtime_url,
        "starting yengou-tui"
    );

    let mut app = App::new(console, credential);
    app.run().await?;

    Ok(())
}
