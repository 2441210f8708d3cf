//! Live map: driver and trip markers on a terminal canvas.

use std::sync::Arc;

use color_eyre::eyre::Result;
use crossterm::event::{KeyCode, KeyEvent};
use ratatui::Frame;
use ratatui::layout::{Constraint, Layout, Rect};
use ratatui::style::Style;
use ratatui::symbols::Marker;
use ratatui::text::{Line, Span};
use ratatui::widgets::canvas::{Canvas, Context, Points};
use ratatui::widgets::{Block, BorderType, Borders, Paragraph};

use yengou_core::{
    DriverDirectory, DriverLocation, DriverStatus, MapFilter, MapSurface, MarkerKind,
    MarkerRenderer, RenderOutcome, Snapshot, Trip, TripFilter,
};

use crate::action::Action;
use crate::component::Component;
use crate::map::CanvasSurface;
use crate::theme;

const LABEL_WIDTH: usize = 14;

pub struct LiveMapScreen {
    focused: bool,
    renderer: MarkerRenderer<CanvasSurface>,
    filter: MapFilter,
    directory: Arc<DriverDirectory>,
    drivers: Snapshot<DriverLocation>,
    trips: Snapshot<Trip>,
    /// Frame the markers once, the first time any are placed.
    fitted: bool,
}

impl LiveMapScreen {
    pub fn new(directory: Arc<DriverDirectory>) -> Self {
        Self {
            focused: false,
            renderer: MarkerRenderer::new(CanvasSurface::default()),
            filter: MapFilter::default(),
            directory,
            drivers: Snapshot::default(),
            trips: Snapshot::default(),
            fitted: false,
        }
    }

    fn rerender(&mut self) {
        let outcome =
            self.renderer
                .render(&self.drivers, &self.trips, &self.filter, &self.directory);
        if let RenderOutcome::Applied(stats) = outcome {
            if !stats.is_noop() {
                tracing::trace!(?stats, "map markers reconciled");
            }
            self.fit_once();
        }
    }

    fn fit_once(&mut self) {
        if !self.fitted && self.renderer.surface_mut().fit() {
            self.fitted = true;
        }
    }

    fn cycle_trip_filter(&mut self) {
        self.filter.trips = match self.filter.trips {
            TripFilter::Active => TripFilter::All,
            TripFilter::All => TripFilter::Hidden,
            _ => TripFilter::Active,
        };
    }

    fn trip_filter_label(&self) -> &'static str {
        match self.filter.trips {
            TripFilter::All => "all",
            TripFilter::Active => "active",
            TripFilter::Hidden => "hidden",
            TripFilter::ByStatus(_) | TripFilter::Custom(_) => "custom",
        }
    }

    #[cfg(test)]
    fn surface(&self) -> &CanvasSurface {
        self.renderer.surface()
    }

    // ── Rendering ────────────────────────────────────────────────

    fn render_canvas(&self, frame: &mut Frame, area: Rect) {
        let surface = self.renderer.surface();
        let viewport = surface.viewport();

        let block = Block::default()
            .title(" Live map ")
            .title_style(theme::title_style())
            .borders(Borders::ALL)
            .border_type(BorderType::Rounded)
            .border_style(if self.focused {
                theme::border_focused()
            } else {
                theme::border_default()
            });

        let canvas = Canvas::default()
            .block(block)
            .marker(Marker::Braille)
            .x_bounds(viewport.x_bounds())
            .y_bounds(viewport.y_bounds())
            .paint(|ctx: &mut Context<'_>| {
                for (_, spec) in surface.markers() {
                    let color = theme::marker_color(spec.color);
                    let (x, y) = (spec.position.longitude, spec.position.latitude);
                    ctx.draw(&Points {
                        coords: &[(x, y)],
                        color,
                    });
                    let glyph = match spec.kind {
                        MarkerKind::Driver(_) => "●",
                        MarkerKind::Departure => "▲",
                        MarkerKind::Arrival => "■",
                    };
                    let label: String = spec.label.chars().take(LABEL_WIDTH).collect();
                    ctx.print(
                        x,
                        y,
                        Span::styled(format!("{glyph} {label}"), Style::default().fg(color)),
                    );
                }
            });

        frame.render_widget(canvas, area);
    }

    fn render_legend(&self, frame: &mut Frame, area: Rect) {
        let block = Block::default()
            .title(" Filter ")
            .title_style(theme::title_style())
            .borders(Borders::ALL)
            .border_type(BorderType::Rounded)
            .border_style(theme::border_default());
        let inner = block.inner(area);
        frame.render_widget(block, area);

        let surface = self.renderer.surface();
        let stats = surface.stats();
        let off_view = surface
            .markers()
            .filter(|(_, spec)| surface.project(spec.position).is_none())
            .count();

        let status_line = |key: &'static str, status: DriverStatus| {
            let count = self.drivers.values().filter(|d| d.status == status).count();
            let shown = self.filter.drivers.shows(status);
            let color = theme::marker_color(yengou_core::render::Palette::driver(status));
            Line::from(vec![
                Span::styled(format!(" {key} "), theme::key_hint_key()),
                Span::styled(if shown { "● " } else { "○ " }, Style::default().fg(color)),
                Span::styled(format!("{:<10}", status.to_string()), theme::table_row()),
                Span::styled(format!("{count:>4}"), theme::table_row()),
            ])
        };

        let mut lines = vec![
            status_line("a", DriverStatus::Available),
            status_line("b", DriverStatus::Busy),
            status_line("o", DriverStatus::Offline),
            Line::from(vec![
                Span::styled(" t ", theme::key_hint_key()),
                Span::styled(
                    format!("trips: {} ({})", self.trip_filter_label(), self.trips.len()),
                    theme::table_row(),
                ),
            ]),
            Line::from(""),
            Line::from(Span::styled(
                format!(" markers  {:>5}", surface.marker_count()),
                theme::table_row(),
            )),
            Line::from(Span::styled(
                format!(" off view {off_view:>5}"),
                theme::key_hint(),
            )),
            Line::from(Span::styled(
                format!(
                    " +{} ~{} -{}",
                    stats.created, stats.moved, stats.removed
                ),
                theme::key_hint(),
            )),
        ];
        if self.renderer.has_pending() {
            lines.push(Line::from(Span::styled(
                " waiting for layout",
                Style::default().fg(theme::AMBER),
            )));
        }

        frame.render_widget(Paragraph::new(lines), inner);
    }
}

impl Component for LiveMapScreen {
    fn handle_key_event(&mut self, key: KeyEvent) -> Result<Option<Action>> {
        let action = match key.code {
            KeyCode::Char('a') => Action::ToggleDriverStatus(DriverStatus::Available),
            KeyCode::Char('b') => Action::ToggleDriverStatus(DriverStatus::Busy),
            KeyCode::Char('o') => Action::ToggleDriverStatus(DriverStatus::Offline),
            KeyCode::Char('t') => Action::CycleTripFilter,
            KeyCode::Left | KeyCode::Char('h') => Action::MapPan(-0.1, 0.0),
            KeyCode::Right | KeyCode::Char('l') => Action::MapPan(0.1, 0.0),
            KeyCode::Up | KeyCode::Char('k') => Action::MapPan(0.0, 0.1),
            KeyCode::Down | KeyCode::Char('j') => Action::MapPan(0.0, -0.1),
            KeyCode::Char('+' | '=') => Action::MapZoom(0.8),
            KeyCode::Char('-') => Action::MapZoom(1.25),
            KeyCode::Char('f') => Action::MapFit,
            _ => return Ok(None),
        };
        Ok(Some(action))
    }

    fn update(&mut self, action: &Action) -> Result<Option<Action>> {
        match action {
            Action::Resize(w, h) => {
                if self.renderer.surface_mut().resize(*w, *h) {
                    if let Some(stats) = self.renderer.surface_ready() {
                        tracing::debug!(?stats, "buffered markers applied");
                    }
                    self.fit_once();
                }
            }
            Action::DriversUpdated(snapshot) => {
                self.drivers = Arc::clone(snapshot);
                self.rerender();
            }
            Action::TripsUpdated(snapshot) => {
                self.trips = Arc::clone(snapshot);
                self.rerender();
            }
            Action::ToggleDriverStatus(status) => {
                self.filter.drivers.toggle(*status);
                self.rerender();
            }
            Action::CycleTripFilter => {
                self.cycle_trip_filter();
                self.rerender();
            }
            Action::MapPan(dx, dy) => self.renderer.surface_mut().pan(*dx, *dy),
            Action::MapZoom(factor) => self.renderer.surface_mut().zoom(*factor),
            Action::MapFit => {
                self.renderer.surface_mut().fit();
            }
            _ => {}
        }
        Ok(None)
    }

    fn render(&self, frame: &mut Frame, area: Rect) {
        let [map_area, legend_area] =
            Layout::horizontal([Constraint::Min(30), Constraint::Length(28)]).areas(area);
        self.render_canvas(frame, map_area);
        self.render_legend(frame, legend_area);
    }

    fn set_focused(&mut self, focused: bool) {
        self.focused = focused;
    }

    fn key_hints(&self) -> &'static [(&'static str, &'static str)] {
        &[("a/b/o", "status"), ("t", "trips"), ("+/-", "zoom"), ("f", "fit")]
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::HashMap;

    use chrono::Utc;
    use crossterm::event::KeyModifiers;
    use yengou_core::model::{GeoPoint, Place, TripStatus};

    use super::*;

    fn drivers(entries: &[(&str, DriverStatus)]) -> Snapshot<DriverLocation> {
        let map: HashMap<String, Arc<DriverLocation>> = entries
            .iter()
            .enumerate()
            .map(|(i, (id, status))| {
                let offset = f64::from(u8::try_from(i).unwrap()) * 0.01;
                (
                    (*id).to_owned(),
                    Arc::new(DriverLocation {
                        driver_id: (*id).to_owned(),
                        position: GeoPoint::new(14.70 + offset, -17.45),
                        accuracy: 5.0,
                        speed: 0.0,
                        timestamp: Utc::now(),
                        status: *status,
                    }),
                )
            })
            .collect();
        Arc::new(map)
    }

    fn screen() -> LiveMapScreen {
        LiveMapScreen::new(Arc::new(DriverDirectory::new()))
    }

    #[test]
    fn markers_wait_for_first_layout() {
        let mut screen = screen();
        let snapshot = drivers(&[("D1", DriverStatus::Available)]);
        screen.update(&Action::DriversUpdated(snapshot)).unwrap();
        assert_eq!(screen.surface().marker_count(), 0);
        assert!(screen.renderer.has_pending());

        screen.update(&Action::Resize(120, 40)).unwrap();
        assert_eq!(screen.surface().marker_count(), 1);
        assert!(!screen.renderer.has_pending());
    }

    #[test]
    fn status_toggle_reveals_offline_drivers() {
        let mut screen = screen();
        screen.update(&Action::Resize(120, 40)).unwrap();
        let snapshot = drivers(&[("D1", DriverStatus::Available), ("D2", DriverStatus::Offline)]);
        screen.update(&Action::DriversUpdated(snapshot)).unwrap();
        assert_eq!(screen.surface().marker_count(), 1);

        let key = KeyEvent::new(KeyCode::Char('o'), KeyModifiers::NONE);
        let action = screen.handle_key_event(key).unwrap().unwrap();
        screen.update(&action).unwrap();
        assert_eq!(screen.surface().marker_count(), 2);
    }

    #[test]
    fn trip_filter_cycles_through_hidden() {
        let mut screen = screen();
        screen.update(&Action::Resize(120, 40)).unwrap();
        let trip = Trip {
            id: "T1".into(),
            status: Some(TripStatus::Completed),
            departure: Some(Place {
                point: GeoPoint::new(14.69, -17.44),
                name: Some("Plateau".into()),
            }),
            ..Trip::default()
        };
        let trips: HashMap<String, Arc<Trip>> = [("T1".to_owned(), Arc::new(trip))].into();
        screen.update(&Action::TripsUpdated(Arc::new(trips))).unwrap();
        assert_eq!(screen.surface().marker_count(), 0, "completed trips are not active");

        screen.update(&Action::CycleTripFilter).unwrap();
        assert_eq!(screen.surface().marker_count(), 1);
        screen.update(&Action::CycleTripFilter).unwrap();
        assert_eq!(screen.surface().marker_count(), 0);
    }
}
