//! Dashboard command handlers.

use tabled::Tabled;
use yengou_core::model::SystemAlert;
use yengou_core::{Console, DashboardStats};

use crate::cli::{DashboardArgs, DashboardCommand, GlobalOpts};
use crate::config::Resolved;
use crate::error::CliError;
use crate::output;

#[derive(Tabled)]
struct AlertRow {
    #[tabled(rename = "Type")]
    kind: String,
    #[tabled(rename = "Severity")]
    severity: String,
    #[tabled(rename = "Message")]
    message: String,
}

impl From<&SystemAlert> for AlertRow {
    fn from(a: &SystemAlert) -> Self {
        Self {
            kind: a.kind.to_string(),
            severity: a.severity.map(|s| s.to_string()).unwrap_or_default(),
            message: a.message.clone(),
        }
    }
}

fn stats_detail(s: &DashboardStats) -> String {
    let mut lines = vec![
        format!("Drivers:         {}", s.total_drivers),
        format!("Clients:         {}", s.total_clients),
        format!("Services:        {}", s.total_services),
        format!("Services today:  {}", s.services_today),
        format!("Revenue today:   {:.2}", s.revenue_today),
    ];
    let mut extra: Vec<_> = s.extra.iter().collect();
    extra.sort_by(|a, b| a.0.cmp(b.0));
    for (key, value) in extra {
        lines.push(format!("{key}: {value}"));
    }
    if let Some(at) = s.last_updated {
        lines.push(format!("Updated:         {}", at.format("%Y-%m-%d %H:%M:%S UTC")));
    }
    lines.join("\n")
}

pub async fn handle(
    console: &Console,
    resolved: &Resolved,
    args: DashboardArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let client = console
        .rest_client(&resolved.credential()?)
        .map_err(|e| resolved.backend_error(e))?;

    let out = match args.command {
        DashboardCommand::Stats => {
            let stats = client
                .dashboard_stats()
                .await
                .map_err(|e| resolved.backend_error(e))?;
            output::render_single(&global.output, &stats, stats_detail, |s| {
                s.total_drivers.to_string()
            })?
        }
        DashboardCommand::Alerts => {
            let alerts = client
                .system_alerts()
                .await
                .map_err(|e| resolved.backend_error(e))?;
            output::render_list(&global.output, &alerts, |a| AlertRow::from(a), |a| {
                a.message.clone()
            })?
        }
    };

    output::print_output(&out, global.quiet);
    Ok(())
}
