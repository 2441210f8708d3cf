//! `watch`: stream realtime events through a live console.
//!
//! Data events go to stdout (one line each, or one JSON document per
//! line); connection lifecycle goes to stderr.

use std::sync::Arc;
use std::time::Duration;

use chrono::Local;
use indicatif::{ProgressBar, ProgressStyle};
use owo_colors::Style as Paint;
use serde_json::json;
use strum::IntoEnumIterator;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use yengou_core::{
    BusEvent, BusReceiver, Console, DriverDirectory, Scope, ScopeHandle, SystemNotification,
    Topic,
};

use crate::cli::{GlobalOpts, OutputFormat, WatchArgs};
use crate::config::Resolved;
use crate::error::CliError;
use crate::output;

/// Topics shown when `--topics` is not given.
const DATA_TOPICS: [Topic; 5] = [
    Topic::DriverLocation,
    Topic::TripUpdate,
    Topic::ServiceMatch,
    Topic::DashboardStats,
    Topic::SystemAlert,
];

const LIFECYCLE_TOPICS: [Topic; 3] = [Topic::Connected, Topic::Disconnected, Topic::ConnectionError];

fn parse_topics(raw: &[String]) -> Result<(Vec<Topic>, bool), CliError> {
    if raw.is_empty() {
        return Ok((DATA_TOPICS.to_vec(), true));
    }
    let mut topics = Vec::new();
    let mut notifications = false;
    for name in raw {
        let Some(topic) = Topic::iter().find(|t| t.to_string() == name.trim()) else {
            let valid: Vec<String> = Topic::iter().map(|t| t.to_string()).collect();
            return Err(CliError::Validation {
                field: "topics".into(),
                reason: format!("unknown topic '{name}', expected one of: {}", valid.join(", ")),
            });
        };
        match topic {
            Topic::Notification => notifications = true,
            t if LIFECYCLE_TOPICS.contains(&t) => {}
            t => topics.push(t),
        }
    }
    Ok((topics, notifications))
}

fn spinner(message: &'static str, quiet: bool) -> ProgressBar {
    if quiet {
        return ProgressBar::hidden();
    }
    let bar = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::with_template("{spinner} {msg}") {
        bar.set_style(style);
    }
    bar.set_message(message);
    bar.enable_steady_tick(Duration::from_millis(100));
    bar
}

// ── Rendering ───────────────────────────────────────────────────────

fn payload(event: &BusEvent) -> serde_json::Value {
    let data = match event {
        BusEvent::DriverLocation(u) => serde_json::to_value(u.as_ref()),
        BusEvent::TripUpdate(u) => serde_json::to_value(u.as_ref()),
        BusEvent::ServiceMatch(u) => serde_json::to_value(u.as_ref()),
        BusEvent::Notification(n) => serde_json::to_value(n.as_ref()),
        BusEvent::DashboardStats(s) => serde_json::to_value(s.as_ref()),
        BusEvent::SystemAlert(a) => serde_json::to_value(a.as_ref()),
        BusEvent::Connected | BusEvent::Disconnected(_) | BusEvent::ConnectionError(_) => {
            Ok(serde_json::Value::Null)
        }
    };
    json!({ "topic": event.topic().to_string(), "data": data.unwrap_or_default() })
}

fn summary(event: &BusEvent, directory: &DriverDirectory, color: bool) -> String {
    match event {
        BusEvent::DriverLocation(u) => format!(
            "{:<20} {} {:.5},{:.5} {:.0} km/h",
            directory.label(&u.driver_id),
            output::paint(&u.status.to_string(), output::driver_style(u.status), color),
            u.latitude,
            u.longitude,
            u.speed,
        ),
        BusEvent::TripUpdate(u) => {
            let status = u.status.map_or_else(
                || "-".to_owned(),
                |s| output::paint(&s.to_string(), output::trip_style(s), color),
            );
            let progress = u.progress.map(|p| format!(" {p:.0}%")).unwrap_or_default();
            let driver = u
                .driver_id
                .as_deref()
                .map(|d| format!(" ({})", directory.label(d)))
                .unwrap_or_default();
            format!("{} {status}{progress}{driver}", u.trip_id)
        }
        BusEvent::ServiceMatch(u) => format!(
            "{} {}{}",
            u.service_id,
            u.status,
            u.driver_id
                .as_deref()
                .map(|d| format!(" -> {}", directory.label(d)))
                .unwrap_or_default()
        ),
        BusEvent::Notification(n) => notification_line(n),
        BusEvent::DashboardStats(s) => format!(
            "drivers={} clients={} services_today={} revenue_today={:.2}",
            s.total_drivers, s.total_clients, s.services_today, s.revenue_today
        ),
        BusEvent::SystemAlert(a) => {
            let tag = match a.severity {
                Some(sev) => format!("[{}/{sev}]", a.kind),
                None => format!("[{}]", a.kind),
            };
            format!("{} {}", output::paint(&tag, Paint::new().red().bold(), color), a.message)
        }
        BusEvent::Connected => "connected".into(),
        BusEvent::Disconnected(reason) => format!("disconnected: {reason:?}"),
        BusEvent::ConnectionError(fault) => format!(
            "connection error: {}{}",
            fault.detail,
            if fault.will_retry { " (retrying)" } else { "" }
        ),
    }
}

fn notification_line(n: &SystemNotification) -> String {
    format!("[{}] {}: {}", n.kind, n.title, n.message)
}

fn print_event(
    event: &BusEvent,
    directory: &DriverDirectory,
    global: &GlobalOpts,
    color: bool,
) -> Result<(), CliError> {
    let line = match global.output {
        OutputFormat::Json | OutputFormat::JsonCompact => {
            output::render_json_compact(&payload(event))?
        }
        OutputFormat::Yaml => output::render_yaml(&payload(event))?,
        OutputFormat::Table | OutputFormat::Plain => format!(
            "{}  {:<16} {}",
            Local::now().format("%H:%M:%S"),
            event.topic(),
            summary(event, directory, color)
        ),
    };
    output::print_output(&line, global.quiet);
    Ok(())
}

// ── Handler ─────────────────────────────────────────────────────────

pub async fn handle(
    console: &Console,
    resolved: &Resolved,
    args: WatchArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let credential = resolved.credential()?;
    let color = output::should_color(&global.color);
    let (topics, show_notifications) = parse_topics(&args.topics)?;

    if !args.no_seed {
        let bar = spinner("Loading drivers and trips", global.quiet);
        let seeded = console.seed(&credential).await;
        bar.finish_and_clear();
        let report = seeded.map_err(|e| resolved.backend_error(e))?;
        tracing::info!(drivers = report.drivers, trips = report.trips, "seeded");
    }

    let mut subscribed: Vec<Topic> = topics.clone();
    subscribed.extend(LIFECYCLE_TOPICS);
    let feed = Feed {
        events: console.bus().channel(&subscribed),
        notifications: console.notifications(),
        show_notifications,
    };

    let scopes: Vec<ScopeHandle> = args
        .drivers
        .iter()
        .map(|d| Scope::Driver(d.clone()))
        .chain(args.trips.iter().map(|t| Scope::Trip(t.clone())))
        .chain(args.dashboard.then_some(Scope::Dashboard))
        .map(|scope| console.acquire(scope))
        .collect();

    console.connect(credential).await;

    let stop = async {
        match args.duration {
            Some(secs) => tokio::time::sleep(Duration::from_secs(secs)).await,
            None => std::future::pending().await,
        }
    };

    let url = resolved.console.realtime_url.to_string();
    stream_events(console, scopes, feed, stop, url, global, color).await
}

/// Receivers one watch session reads from.
struct Feed {
    events: BusReceiver,
    notifications: broadcast::Receiver<Arc<SystemNotification>>,
    show_notifications: bool,
}

/// Print events until `stop` fires or the transport gives up. Scopes are
/// released and the console shut down however the loop ends.
async fn stream_events(
    console: &Console,
    scopes: Vec<ScopeHandle>,
    mut feed: Feed,
    stop: impl Future<Output = ()>,
    url: String,
    global: &GlobalOpts,
    color: bool,
) -> Result<(), CliError> {
    tokio::pin!(stop);

    let result: Result<(), CliError> = async {
        loop {
            tokio::select! {
                () = &mut stop => return Ok(()),
                _ = tokio::signal::ctrl_c() => return Ok(()),
                received = feed.notifications.recv(), if feed.show_notifications => match received {
                    Ok(n) => {
                        print_event(&BusEvent::Notification(n), console.directory(), global, color)?;
                    }
                    Err(RecvError::Lagged(n)) => tracing::warn!(skipped = n, "notification listener lagged"),
                    Err(RecvError::Closed) => return Ok(()),
                },
                event = feed.events.recv() => {
                    let Some(event) = event else { return Ok(()) };
                    match event {
                        BusEvent::ConnectionError(ref fault) if !fault.will_retry => {
                            return Err(CliError::ConnectionFailed {
                                url,
                                source: fault.detail.clone().into(),
                            });
                        }
                        BusEvent::Connected | BusEvent::Disconnected(_) | BusEvent::ConnectionError(_) => {
                            if !global.quiet {
                                eprintln!("{}", summary(&event, console.directory(), color));
                            }
                        }
                        _ => print_event(&event, console.directory(), global, color)?,
                    }
                }
            }
        }
    }
    .await;

    drop(scopes);
    tracing::debug!(stale = console.drivers().stale_discards(), "stale locations discarded");
    console.shutdown().await;
    result
}
