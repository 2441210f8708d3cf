//! Command dispatch: bridges CLI args -> console operations -> output formatting.

pub mod config_cmd;
pub mod dashboard;
pub mod drivers;
pub mod login;
pub mod send_location;
pub mod trips;
pub mod watch;

use yengou_core::Console;

use crate::cli::{Command, GlobalOpts};
use crate::config::Resolved;
use crate::error::CliError;

/// Dispatch a backend-bound command to the appropriate handler.
pub async fn dispatch(
    cmd: Command,
    resolved: &Resolved,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    // Login is the one command that runs without a credential.
    if let Command::Login(args) = cmd {
        return login::handle(resolved, args, global).await;
    }

    let console = Console::new(resolved.console.clone());
    match cmd {
        Command::Watch(args) => watch::handle(&console, resolved, args, global).await,
        Command::Drivers(args) => drivers::handle(&console, resolved, args, global).await,
        Command::Trips(args) => trips::handle(&console, resolved, args, global).await,
        Command::Dashboard(args) => dashboard::handle(&console, resolved, args, global).await,
        Command::SendLocation(args) => {
            send_location::handle(&console, resolved, args, global).await
        }
        // Handled before dispatch
        Command::Login(_) | Command::Config(_) | Command::Completions(_) => Ok(()),
    }
}
