//! Driver directory command handlers.

use tabled::Tabled;
use yengou_core::{Console, DriverProfile};

use crate::cli::{DriversArgs, DriversCommand, GlobalOpts};
use crate::config::Resolved;
use crate::error::CliError;
use crate::output;

// ── Table row ───────────────────────────────────────────────────────

#[derive(Tabled)]
struct DriverRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Phone")]
    phone: String,
    #[tabled(rename = "Vehicle")]
    vehicle: String,
    #[tabled(rename = "Banned")]
    banned: String,
}

impl From<&DriverProfile> for DriverRow {
    fn from(d: &DriverProfile) -> Self {
        Self {
            id: d.id.clone(),
            name: d.name.clone().unwrap_or_default(),
            phone: d.phone.clone().unwrap_or_default(),
            vehicle: d.vehicle.clone().unwrap_or_default(),
            banned: if d.banned { "yes".into() } else { String::new() },
        }
    }
}

fn detail(d: &DriverProfile) -> String {
    [
        format!("ID:       {}", d.id),
        format!("Name:     {}", d.name.as_deref().unwrap_or("-")),
        format!("Phone:    {}", d.phone.as_deref().unwrap_or("-")),
        format!("Vehicle:  {}", d.vehicle.as_deref().unwrap_or("-")),
        format!("Banned:   {}", d.banned),
    ]
    .join("\n")
}

// ── Handler ─────────────────────────────────────────────────────────

pub async fn handle(
    console: &Console,
    resolved: &Resolved,
    args: DriversArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let client = console
        .rest_client(&resolved.credential()?)
        .map_err(|e| resolved.backend_error(e))?;
    let mut drivers: Vec<DriverProfile> = client
        .list_drivers()
        .await
        .map_err(|e| resolved.backend_error(e))?
        .into_iter()
        .map(DriverProfile::from)
        .collect();
    drivers.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id)));

    let out = match args.command {
        DriversCommand::List { all } => {
            if !all {
                drivers.retain(|d| !d.banned);
            }
            output::render_list(&global.output, &drivers, |d| DriverRow::from(d), |d| {
                d.id.clone()
            })?
        }
        DriversCommand::Get { driver } => {
            let Some(found) = drivers.iter().find(|d| d.id == driver) else {
                return Err(CliError::NotFound {
                    resource_type: "driver".into(),
                    identifier: driver,
                    list_command: "drivers list".into(),
                });
            };
            output::render_single(&global.output, found, detail, |d| d.id.clone())?
        }
    };

    output::print_output(&out, global.quiet);
    Ok(())
}
