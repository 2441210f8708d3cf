//! Screen implementations. Each screen is a top-level Component.

pub mod alerts;
pub mod live_map;
pub mod trips;

use std::sync::Arc;

use yengou_core::DriverDirectory;

use crate::component::Component;
use crate::screen::ScreenId;

/// Build one component per [`ScreenId`], sharing the driver directory.
pub fn create_screens(directory: &Arc<DriverDirectory>) -> Vec<(ScreenId, Box<dyn Component>)> {
    ScreenId::ALL
        .iter()
        .map(|&id| {
            let screen: Box<dyn Component> = match id {
                ScreenId::LiveMap => Box::new(live_map::LiveMapScreen::new(Arc::clone(directory))),
                ScreenId::Trips => Box::new(trips::TripsScreen::new(Arc::clone(directory))),
                ScreenId::Alerts => Box::new(alerts::AlertsScreen::new()),
            };
            (id, screen)
        })
        .collect()
}
