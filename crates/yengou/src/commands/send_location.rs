//! `send-location`: publish one position report as a driver client.

use yengou_core::{Console, ConnectionState};

use crate::cli::{GlobalOpts, SendLocationArgs};
use crate::config::{self, Resolved};
use crate::error::CliError;

pub async fn handle(
    console: &Console,
    resolved: &Resolved,
    args: SendLocationArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let credential = resolved.credential()?;
    let wait = config::connect_timeout(resolved);
    let mut state = console.connection_state();

    console.connect(credential).await;

    let reached = tokio::time::timeout(
        wait,
        state.wait_for(|s| matches!(s, ConnectionState::Connected | ConnectionState::Errored)),
    )
    .await
    .map(|waited| waited.map(|s| *s));

    let outcome = match reached {
        Err(_) => Err(CliError::Timeout {
            seconds: wait.as_secs(),
        }),
        Ok(Err(_)) => Err(CliError::ConnectionFailed {
            url: resolved.console.realtime_url.to_string(),
            source: "connection manager stopped".into(),
        }),
        Ok(Ok(ConnectionState::Errored)) => Err(CliError::ConnectionFailed {
            url: resolved.console.realtime_url.to_string(),
            source: "realtime handshake rejected".into(),
        }),
        Ok(Ok(_)) => console
            .send_location(&args.driver, args.lat, args.lng, args.accuracy, args.speed)
            .map_err(|e| resolved.backend_error(e)),
    };

    // Queued frames are flushed before the socket closes.
    console.disconnect().await;
    outcome?;

    if !global.quiet {
        eprintln!(
            "Sent location for {} ({:.5}, {:.5})",
            args.driver, args.lat, args.lng
        );
    }
    Ok(())
}
