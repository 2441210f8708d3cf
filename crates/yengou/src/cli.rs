//! Clap derive structures for the `yengou` CLI.
//!
//! Defines the complete command tree, global flags, and shared types.

use clap::{Args, Parser, Subcommand, ValueEnum};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// yengou -- operations console for the Yengou ride-hailing backend
#[derive(Debug, Parser)]
#[command(
    name = "yengou",
    version,
    about = "Watch drivers, trips and alerts on a Yengou backend",
    long_about = "Operations console for the Yengou ride-hailing backend.\n\n\
        Streams live driver locations, trip progress, dashboard counters and\n\
        system alerts over the realtime channel, and reads seed data over REST.",
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Command,
}

// ── Global Options ───────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct GlobalOpts {
    /// Backend profile to use
    #[arg(long, short = 'p', env = "YENGOU_PROFILE", global = true)]
    pub profile: Option<String>,

    /// REST API root (overrides profile)
    #[arg(long, env = "YENGOU_API_URL", global = true)]
    pub api_url: Option<String>,

    /// Realtime WebSocket endpoint (overrides profile)
    #[arg(long, env = "YENGOU_REALTIME_URL", global = true)]
    pub realtime_url: Option<String>,

    /// Bearer token (overrides profile, env and keyring)
    #[arg(long, env = "YENGOU_TOKEN", global = true, hide_env_values = true)]
    pub token: Option<String>,

    /// Output format
    #[arg(
        long,
        short = 'o',
        env = "YENGOU_OUTPUT",
        default_value = "table",
        global = true
    )]
    pub output: OutputFormat,

    /// When to use color output
    #[arg(long, default_value = "auto", global = true)]
    pub color: ColorMode,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    /// Request timeout in seconds (overrides profile)
    #[arg(long, env = "YENGOU_TIMEOUT", global = true)]
    pub timeout: Option<u64>,
}

// ── Output & Color Enums ─────────────────────────────────────────────

#[derive(Debug, Clone, ValueEnum)]
pub enum OutputFormat {
    /// Pretty table (default, interactive)
    Table,
    /// Pretty-printed JSON (one document per line when streaming)
    Json,
    /// Compact single-line JSON
    JsonCompact,
    /// YAML
    Yaml,
    /// Plain text, one value per line (scripting)
    Plain,
}

#[derive(Debug, Clone, ValueEnum)]
pub enum ColorMode {
    /// Auto-detect (color if terminal is interactive)
    Auto,
    /// Always emit color codes
    Always,
    /// Never emit color codes
    Never,
}

/// Console role; selects the login endpoint and notification audience.
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum RoleArg {
    Admin,
    Support,
    User,
}

// ── Top-Level Command Enum ───────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Stream live events from the realtime channel
    #[command(alias = "w")]
    Watch(WatchArgs),

    /// Driver directory
    #[command(alias = "d")]
    Drivers(DriversArgs),

    /// Active trips
    #[command(alias = "t")]
    Trips(TripsArgs),

    /// Dashboard counters and system alerts
    #[command(alias = "dash")]
    Dashboard(DashboardArgs),

    /// Publish a driver location (driver clients)
    SendLocation(SendLocationArgs),

    /// Obtain a bearer token and store it in the system keyring
    Login(LoginArgs),

    /// Manage CLI configuration and profiles
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  WATCH
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct WatchArgs {
    /// Follow a driver's location (repeatable)
    #[arg(long = "driver", value_name = "DRIVER_ID")]
    pub drivers: Vec<String>,

    /// Follow a trip (repeatable)
    #[arg(long = "trip", value_name = "TRIP_ID")]
    pub trips: Vec<String>,

    /// Follow dashboard counters
    #[arg(long)]
    pub dashboard: bool,

    /// Only print these topics (e.g. driver-location, trip-update, system-alert)
    #[arg(long, value_delimiter = ',')]
    pub topics: Vec<String>,

    /// Skip the REST seed before streaming
    #[arg(long)]
    pub no_seed: bool,

    /// Stop after this many seconds
    #[arg(long, value_name = "SECS")]
    pub duration: Option<u64>,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  DRIVERS / TRIPS / DASHBOARD
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct DriversArgs {
    #[command(subcommand)]
    pub command: DriversCommand,
}

#[derive(Debug, Subcommand)]
pub enum DriversCommand {
    /// List driver profiles
    #[command(alias = "ls")]
    List {
        /// Include banned accounts
        #[arg(long)]
        all: bool,
    },

    /// Show one driver
    Get {
        /// Driver id
        driver: String,
    },
}

#[derive(Debug, Args)]
pub struct TripsArgs {
    #[command(subcommand)]
    pub command: TripsCommand,
}

#[derive(Debug, Subcommand)]
pub enum TripsCommand {
    /// List accepted and in-transit trips
    #[command(alias = "ls")]
    List,

    /// Show one active trip
    Get {
        /// Trip id
        trip: String,
    },
}

#[derive(Debug, Args)]
pub struct DashboardArgs {
    #[command(subcommand)]
    pub command: DashboardCommand,
}

#[derive(Debug, Subcommand)]
pub enum DashboardCommand {
    /// Current aggregate counters
    Stats,

    /// Recent system alerts
    Alerts,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  SEND-LOCATION
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct SendLocationArgs {
    /// Driver id to report as
    pub driver: String,

    /// Latitude in degrees
    #[arg(long, allow_hyphen_values = true)]
    pub lat: f64,

    /// Longitude in degrees
    #[arg(long, allow_hyphen_values = true)]
    pub lng: f64,

    /// Horizontal accuracy in meters
    #[arg(long, default_value = "10")]
    pub accuracy: f64,

    /// Speed in km/h
    #[arg(long, default_value = "0")]
    pub speed: f64,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  LOGIN
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct LoginArgs {
    /// Account email or phone number
    #[arg(long, short = 'u')]
    pub username: String,

    /// Login endpoint (defaults to the profile role)
    #[arg(long)]
    pub role: Option<RoleArg>,

    /// Print the token instead of storing it
    #[arg(long)]
    pub print_token: bool,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  CONFIG
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Create initial config file with guided setup
    Init,

    /// Display current resolved configuration
    Show,

    /// Set a value on the active profile
    Set {
        /// Profile key (api_url, realtime_url, role, user_id, token_env, timeout, reconnect_max_retries)
        key: String,

        /// Value to set
        value: String,
    },

    /// List configured profiles
    Profiles,

    /// Set the default profile
    Use {
        /// Profile name to set as default
        name: String,
    },

    /// Store a bearer token in the system keyring
    SetToken {
        /// Profile name
        #[arg(long)]
        profile: Option<String>,
    },

    /// Remove the stored bearer token from the system keyring
    ForgetToken {
        /// Profile name
        #[arg(long)]
        profile: Option<String>,
    },
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  COMPLETIONS
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: clap_complete::Shell,
}
