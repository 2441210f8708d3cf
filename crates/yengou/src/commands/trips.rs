//! Active trip command handlers.
//!
//! Seeds a console over REST and renders its trip snapshot, so the
//! listing goes through the same merge rule as live updates.

use std::sync::Arc;

use tabled::Tabled;
use yengou_core::{Console, DriverDirectory, Place, Trip};

use crate::cli::{GlobalOpts, TripsArgs, TripsCommand};
use crate::config::Resolved;
use crate::error::CliError;
use crate::output;

// ── Table row ───────────────────────────────────────────────────────

#[derive(Tabled)]
struct TripRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "Driver")]
    driver: String,
    #[tabled(rename = "From")]
    from: String,
    #[tabled(rename = "To")]
    to: String,
}

fn place_label(place: Option<&Place>) -> String {
    match place {
        Some(Place { name: Some(name), .. }) => name.clone(),
        Some(p) => format!("{:.5}, {:.5}", p.point.latitude, p.point.longitude),
        None => "-".into(),
    }
}

fn row(trip: &Trip, directory: &DriverDirectory) -> TripRow {
    TripRow {
        id: trip.id.clone(),
        status: trip.status.map(|s| s.to_string()).unwrap_or_default(),
        driver: trip
            .driver_id
            .as_deref()
            .map(|id| directory.label(id))
            .unwrap_or_default(),
        from: place_label(trip.departure.as_ref()),
        to: place_label(trip.arrival.as_ref()),
    }
}

fn detail(trip: &Trip, directory: &DriverDirectory) -> String {
    let mut lines = vec![
        format!("ID:         {}", trip.id),
        format!(
            "Status:     {}",
            trip.status.map_or_else(|| "-".into(), |s| s.to_string())
        ),
        format!(
            "Driver:     {}",
            trip.driver_id
                .as_deref()
                .map_or_else(|| "-".into(), |id| directory.label(id))
        ),
        format!("From:       {}", place_label(trip.departure.as_ref())),
        format!("To:         {}", place_label(trip.arrival.as_ref())),
    ];
    if let Some(eta) = trip.estimated_arrival {
        lines.push(format!("ETA:        {}", eta.format("%Y-%m-%d %H:%M UTC")));
    }
    if let Some(progress) = trip.progress {
        lines.push(format!("Progress:   {progress:.0}%"));
    }
    lines.join("\n")
}

// ── Handler ─────────────────────────────────────────────────────────

pub async fn handle(
    console: &Console,
    resolved: &Resolved,
    args: TripsArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    console
        .seed(&resolved.credential()?)
        .await
        .map_err(|e| resolved.backend_error(e))?;
    let directory = console.directory();

    let snapshot = console.trips_snapshot();
    let mut trips: Vec<Arc<Trip>> = snapshot.values().cloned().collect();
    trips.sort_by(|a, b| a.id.cmp(&b.id));

    let out = match args.command {
        TripsCommand::List => output::render_list(
            &global.output,
            &trips,
            |t| row(t, directory),
            |t| t.id.clone(),
        )?,
        TripsCommand::Get { trip } => {
            let Some(found) = trips.iter().find(|t| t.id == trip) else {
                return Err(CliError::NotFound {
                    resource_type: "trip".into(),
                    identifier: trip,
                    list_command: "trips list".into(),
                });
            };
            output::render_single(
                &global.output,
                found,
                |t| detail(t, directory),
                |t| t.id.clone(),
            )?
        }
    };

    output::print_output(&out, global.quiet);
    Ok(())
}
