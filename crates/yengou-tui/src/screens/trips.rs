//! Trips screen: every known trip with status, driver and ETA.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use color_eyre::eyre::Result;
use crossterm::event::{KeyCode, KeyEvent};
use ratatui::Frame;
use ratatui::layout::{Constraint, Layout, Rect};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, BorderType, Borders, Cell, Paragraph, Row, Table, TableState};

use yengou_core::{DriverDirectory, Place, Snapshot, Trip};

use crate::action::Action;
use crate::component::Component;
use crate::theme;

pub struct TripsScreen {
    focused: bool,
    directory: Arc<DriverDirectory>,
    /// Sorted by id so rows don't jump between updates.
    trips: Vec<Arc<Trip>>,
    table_state: TableState,
}

impl TripsScreen {
    pub fn new(directory: Arc<DriverDirectory>) -> Self {
        Self {
            focused: false,
            directory,
            trips: Vec::new(),
            table_state: TableState::default(),
        }
    }

    fn set_trips(&mut self, snapshot: &Snapshot<Trip>) {
        let selected_id = self
            .table_state
            .selected()
            .and_then(|i| self.trips.get(i))
            .map(|t| t.id.clone());

        let mut trips: Vec<Arc<Trip>> = snapshot.values().cloned().collect();
        trips.sort_by(|a, b| a.id.cmp(&b.id));
        self.trips = trips;

        let idx = selected_id
            .and_then(|id| self.trips.iter().position(|t| t.id == id))
            .unwrap_or(0);
        self.select(idx);
    }

    fn select(&mut self, idx: usize) {
        if self.trips.is_empty() {
            self.table_state.select(None);
        } else {
            self.table_state.select(Some(idx.min(self.trips.len() - 1)));
        }
    }

    fn move_selection(&mut self, delta: isize) {
        let current = self.table_state.selected().unwrap_or(0);
        self.select(current.saturating_add_signed(delta));
    }

    fn row(&self, trip: &Trip) -> Row<'static> {
        let status = trip
            .status
            .map_or_else(|| "─".to_owned(), |s| s.to_string());
        let driver = trip
            .driver_id
            .as_deref()
            .map_or_else(|| "unassigned".to_owned(), |id| self.directory.label(id));
        let progress = trip
            .progress
            .map_or_else(|| "─".to_owned(), |p| format!("{p:.0}%"));

        Row::new(vec![
            Cell::from(trip.id.clone()),
            Cell::from(status).style(theme::trip_status(trip.status)),
            Cell::from(driver),
            Cell::from(progress),
            Cell::from(eta_label(trip.estimated_arrival, Utc::now())),
            Cell::from(route_label(trip.departure.as_ref(), trip.arrival.as_ref())),
        ])
        .style(theme::table_row())
    }
}

/// Remaining time until `eta`, whole seconds.
fn eta_label(eta: Option<DateTime<Utc>>, now: DateTime<Utc>) -> String {
    let Some(eta) = eta else {
        return "─".into();
    };
    match (eta - now).to_std() {
        Ok(left) => humantime::format_duration(Duration::from_secs(left.as_secs())).to_string(),
        Err(_) => "due".into(),
    }
}

fn route_label(departure: Option<&Place>, arrival: Option<&Place>) -> String {
    let name = |place: Option<&Place>| {
        place.map_or_else(
            || "?".to_owned(),
            |p| {
                p.name.clone().unwrap_or_else(|| {
                    format!("{:.4},{:.4}", p.point.latitude, p.point.longitude)
                })
            },
        )
    };
    format!("{} → {}", name(departure), name(arrival))
}

impl Component for TripsScreen {
    fn handle_key_event(&mut self, key: KeyEvent) -> Result<Option<Action>> {
        let action = match key.code {
            KeyCode::Down | KeyCode::Char('j') => Action::ScrollDown,
            KeyCode::Up | KeyCode::Char('k') => Action::ScrollUp,
            KeyCode::Char('g') | KeyCode::Home => Action::ScrollToTop,
            KeyCode::Char('G') | KeyCode::End => Action::ScrollToBottom,
            _ => return Ok(None),
        };
        Ok(Some(action))
    }

    fn update(&mut self, action: &Action) -> Result<Option<Action>> {
        match action {
            Action::TripsUpdated(snapshot) => self.set_trips(snapshot),
            Action::ScrollDown => self.move_selection(1),
            Action::ScrollUp => self.move_selection(-1),
            Action::ScrollToTop => self.select(0),
            Action::ScrollToBottom => self.select(usize::MAX),
            _ => {}
        }
        Ok(None)
    }

    fn render(&self, frame: &mut Frame, area: Rect) {
        let active = self.trips.iter().filter(|t| t.is_active()).count();
        let block = Block::default()
            .title(format!(" Trips ({active} active / {}) ", self.trips.len()))
            .title_style(theme::title_style())
            .borders(Borders::ALL)
            .border_type(BorderType::Rounded)
            .border_style(if self.focused {
                theme::border_focused()
            } else {
                theme::border_default()
            });
        let inner = block.inner(area);
        frame.render_widget(block, area);

        let [table_area, hint_area] =
            Layout::vertical([Constraint::Min(1), Constraint::Length(1)]).areas(inner);

        if self.trips.is_empty() {
            frame.render_widget(
                Paragraph::new("  No trips yet").style(theme::key_hint()),
                table_area,
            );
        } else {
            let header = Row::new(["ID", "Status", "Driver", "Progress", "ETA", "Route"])
                .style(theme::table_header());
            let rows: Vec<Row> = self.trips.iter().map(|t| self.row(t)).collect();
            let widths = [
                Constraint::Length(12),
                Constraint::Length(11),
                Constraint::Length(18),
                Constraint::Length(9),
                Constraint::Length(10),
                Constraint::Min(20),
            ];
            let table = Table::new(rows, widths)
                .header(header)
                .row_highlight_style(theme::table_selected());
            let mut state = self.table_state;
            frame.render_stateful_widget(table, table_area, &mut state);
        }

        let hints = Line::from(vec![
            Span::styled("  j/k ", theme::key_hint_key()),
            Span::styled("navigate  ", theme::key_hint()),
            Span::styled("g/G ", theme::key_hint_key()),
            Span::styled("top/bottom", theme::key_hint()),
        ]);
        frame.render_widget(Paragraph::new(hints), hint_area);
    }

    fn set_focused(&mut self, focused: bool) {
        self.focused = focused;
    }

    fn key_hints(&self) -> &'static [(&'static str, &'static str)] {
        &[("j/k", "navigate")]
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::HashMap;

    use chrono::TimeDelta;
    use pretty_assertions::assert_eq;
    use yengou_core::GeoPoint;

    use super::*;

    fn snapshot(ids: &[&str]) -> Snapshot<Trip> {
        let map: HashMap<String, Arc<Trip>> = ids
            .iter()
            .map(|id| {
                (
                    (*id).to_owned(),
                    Arc::new(Trip {
                        id: (*id).to_owned(),
                        ..Trip::default()
                    }),
                )
            })
            .collect();
        Arc::new(map)
    }

    #[test]
    fn selection_follows_trip_across_updates() {
        let mut screen = TripsScreen::new(Arc::new(DriverDirectory::new()));
        screen.update(&Action::TripsUpdated(snapshot(&["T2", "T3"]))).unwrap();
        screen.update(&Action::ScrollDown).unwrap();
        assert_eq!(screen.trips[screen.table_state.selected().unwrap()].id, "T3");

        screen
            .update(&Action::TripsUpdated(snapshot(&["T1", "T2", "T3"])))
            .unwrap();
        assert_eq!(screen.table_state.selected(), Some(2));
    }

    #[test]
    fn selection_clamps_at_the_ends() {
        let mut screen = TripsScreen::new(Arc::new(DriverDirectory::new()));
        screen.update(&Action::TripsUpdated(snapshot(&["T1", "T2"]))).unwrap();
        screen.update(&Action::ScrollUp).unwrap();
        assert_eq!(screen.table_state.selected(), Some(0));
        screen.update(&Action::ScrollToBottom).unwrap();
        assert_eq!(screen.table_state.selected(), Some(1));

        screen.update(&Action::TripsUpdated(snapshot(&[]))).unwrap();
        assert_eq!(screen.table_state.selected(), None);
    }

    #[test]
    fn eta_is_relative_to_now() {
        let now = Utc::now();
        assert_eq!(eta_label(None, now), "─");
        assert_eq!(eta_label(Some(now + TimeDelta::seconds(150)), now), "2m 30s");
        assert_eq!(eta_label(Some(now - TimeDelta::seconds(5)), now), "due");
    }

    #[test]
    fn route_falls_back_to_coordinates() {
        let plateau = Place {
            point: GeoPoint::new(14.6700, -17.4300),
            name: Some("Plateau".into()),
        };
        let unnamed = Place {
            point: GeoPoint::new(14.7, -17.45),
            name: None,
        };
        assert_eq!(
            route_label(Some(&plateau), Some(&unnamed)),
            "Plateau → 14.7000,-17.4500"
        );
        assert_eq!(route_label(None, Some(&plateau)), "? → Plateau");
    }
}
