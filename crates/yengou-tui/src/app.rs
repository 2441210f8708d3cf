//! Application core: event loop, screen management, action dispatch.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use color_eyre::eyre::Result;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use ratatui::{
    Frame,
    layout::{Constraint, Layout, Rect},
    style::Style,
    text::{Line, Span},
    widgets::{Block, BorderType, Borders, Clear, Paragraph, Tabs},
};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use yengou_core::{ConnectionState, Console, Credential};

use crate::action::{Action, Toast, ToastLevel};
use crate::component::Component;
use crate::data_bridge::spawn_data_bridge;
use crate::event::{Event, EventReader};
use crate::screen::ScreenId;
use crate::screens::create_screens;
use crate::theme;
use crate::tui::Tui;

const TOAST_TTL: Duration = Duration::from_secs(4);

/// Top-level application state and event loop.
pub struct App {
    console: Console,
    /// Taken by the data bridge on start.
    credential: Option<Credential>,
    active_screen: ScreenId,
    screens: HashMap<ScreenId, Box<dyn Component>>,
    running: bool,
    connection: ConnectionState,
    help_visible: bool,
    toast: Option<(Toast, Instant)>,
    action_tx: mpsc::UnboundedSender<Action>,
    action_rx: mpsc::UnboundedReceiver<Action>,
    bridge_cancel: CancellationToken,
}

impl App {
    pub fn new(console: Console, credential: Credential) -> Self {
        let (action_tx, action_rx) = mpsc::unbounded_channel();
        let screens: HashMap<ScreenId, Box<dyn Component>> =
            create_screens(console.directory()).into_iter().collect();

        Self {
            console,
            credential: Some(credential),
            active_screen: ScreenId::default(),
            screens,
            running: true,
            connection: ConnectionState::Disconnected,
            help_visible: false,
            toast: None,
            action_tx,
            action_rx,
            bridge_cancel: CancellationToken::new(),
        }
    }

    fn start_bridge(&mut self) {
        let Some(credential) = self.credential.take() else {
            return;
        };
        tokio::spawn(spawn_data_bridge(
            self.console.clone(),
            credential,
            self.action_tx.clone(),
            self.bridge_cancel.clone(),
        ));
    }

    /// Run the main event loop.
    pub async fn run(&mut self) -> Result<()> {
        let mut tui = Tui::new()?;
        tui.enter()?;

        if let Some(screen) = self.screens.get_mut(&self.active_screen) {
            screen.set_focused(true);
        }
        // Lay out the map before any markers arrive.
        let (w, h) = tui.size().unwrap_or((80, 24));
        self.action_tx.send(Action::Resize(w, h))?;
        self.start_bridge();

        let mut events = EventReader::new(
            Duration::from_millis(250), // 4 Hz tick
            Duration::from_millis(33),  // ~30 FPS render
        );

        info!("TUI event loop started");

        while self.running {
            let Some(event) = events.next().await else {
                break;
            };

            match event {
                Event::Key(key) => {
                    if let Some(action) = self.handle_key_event(key)? {
                        self.action_tx.send(action)?;
                    }
                }
                Event::Resize(w, h) => self.action_tx.send(Action::Resize(w, h))?,
                Event::Tick => self.action_tx.send(Action::Tick)?,
                Event::Render => self.action_tx.send(Action::Render)?,
            }

            while let Ok(action) = self.action_rx.try_recv() {
                self.process_action(&action)?;

                if let Action::Render = action {
                    tui.draw(|frame| self.render(frame))?;
                }
            }
        }

        events.stop();
        self.bridge_cancel.cancel();
        tui.exit();
        info!("TUI event loop ended");
        Ok(())
    }

    /// Global keys first, then the active screen.
    fn handle_key_event(&mut self, key: KeyEvent) -> Result<Option<Action>> {
        if self.help_visible {
            return match key.code {
                KeyCode::Esc | KeyCode::Char('?') => Ok(Some(Action::ToggleHelp)),
                _ => Ok(None),
            };
        }

        match (key.modifiers, key.code) {
            (KeyModifiers::CONTROL, KeyCode::Char('c'))
            | (KeyModifiers::NONE, KeyCode::Char('q')) => return Ok(Some(Action::Quit)),
            (KeyModifiers::NONE, KeyCode::Char('?')) => return Ok(Some(Action::ToggleHelp)),
            (KeyModifiers::NONE, KeyCode::Char('r')) => return Ok(Some(Action::Reconnect)),
            (KeyModifiers::NONE, KeyCode::Char(c @ '1'..='9')) => {
                let n = u8::try_from(c).map_or(0, |b| b - b'0');
                if let Some(screen) = ScreenId::from_number(n) {
                    return Ok(Some(Action::SwitchScreen(screen)));
                }
            }
            (KeyModifiers::NONE, KeyCode::Tab) => {
                return Ok(Some(Action::SwitchScreen(self.active_screen.next())));
            }
            (KeyModifiers::SHIFT, KeyCode::BackTab) => {
                return Ok(Some(Action::SwitchScreen(self.active_screen.prev())));
            }
            _ => {}
        }

        if let Some(screen) = self.screens.get_mut(&self.active_screen) {
            return screen.handle_key_event(key);
        }
        Ok(None)
    }

    fn process_action(&mut self, action: &Action) -> Result<()> {
        match action {
            Action::Quit => self.running = false,

            Action::Tick => {
                if self
                    .toast
                    .as_ref()
                    .is_some_and(|(_, shown)| shown.elapsed() > TOAST_TTL)
                {
                    self.toast = None;
                }
            }

            Action::Render => {}

            Action::SwitchScreen(target) => {
                if *target != self.active_screen {
                    debug!("switching screen: {} → {}", self.active_screen, target);
                    if let Some(screen) = self.screens.get_mut(&self.active_screen) {
                        screen.set_focused(false);
                    }
                    self.active_screen = *target;
                    if let Some(screen) = self.screens.get_mut(&self.active_screen) {
                        screen.set_focused(true);
                    }
                }
            }

            Action::ToggleHelp => self.help_visible = !self.help_visible,

            Action::ConnectionChanged(state) => {
                self.connection = *state;
                if *state == ConnectionState::Errored {
                    self.show(Toast::error("Connection lost. Press r to reconnect"));
                }
            }

            Action::Reconnect => {
                if self.connection == ConnectionState::Connected {
                    return Ok(());
                }
                let console = self.console.clone();
                let tx = self.action_tx.clone();
                tokio::spawn(async move {
                    if let Err(e) = console.reconnect().await {
                        warn!(error = %e, "reconnect failed");
                        let _ = tx.send(Action::Notify(Toast::error(format!("Reconnect failed: {e}"))));
                    }
                });
            }

            Action::Seeded(report) => {
                self.show(Toast::info(format!(
                    "Loaded {} drivers, {} trips",
                    report.drivers, report.trips
                )));
            }

            Action::Notify(toast) => self.show(toast.clone()),

            // Data and layout reach every screen so hidden tabs stay current.
            Action::Resize(..)
            | Action::DriversUpdated(_)
            | Action::TripsUpdated(_)
            | Action::DashboardUpdated(_)
            | Action::NotificationReceived(_)
            | Action::AlertReceived(_) => {
                for screen in self.screens.values_mut() {
                    if let Some(follow_up) = screen.update(action)? {
                        self.action_tx.send(follow_up)?;
                    }
                }
            }

            other => {
                if let Some(screen) = self.screens.get_mut(&self.active_screen) {
                    if let Some(follow_up) = screen.update(other)? {
                        self.action_tx.send(follow_up)?;
                    }
                }
            }
        }

        Ok(())
    }

    fn show(&mut self, toast: Toast) {
        self.toast = Some((toast, Instant::now()));
    }

    // ── Rendering ────────────────────────────────────────────────

    fn render(&self, frame: &mut Frame) {
        let area = frame.area();

        let [content_area, tab_area, status_area] = Layout::vertical([
            Constraint::Min(1),
            Constraint::Length(1),
            Constraint::Length(1),
        ])
        .areas(area);

        if let Some(screen) = self.screens.get(&self.active_screen) {
            screen.render(frame, content_area);
        }
        self.render_tab_bar(frame, tab_area);
        self.render_status_bar(frame, status_area);

        if self.help_visible {
            self.render_help_overlay(frame, area);
        }
    }

    fn render_tab_bar(&self, frame: &mut Frame, area: Rect) {
        let titles: Vec<Line> = ScreenId::ALL
            .iter()
            .map(|&id| {
                let style = if id == self.active_screen {
                    theme::tab_active()
                } else {
                    theme::tab_inactive()
                };
                Line::from(Span::styled(format!(" {} {} ", id.number(), id.label()), style))
            })
            .collect();

        let tabs = Tabs::new(titles)
            .divider(Span::styled(" ", theme::key_hint()))
            .select(
                ScreenId::ALL
                    .iter()
                    .position(|&s| s == self.active_screen)
                    .unwrap_or(0),
            );
        frame.render_widget(tabs, area);
    }

    fn render_status_bar(&self, frame: &mut Frame, area: Rect) {
        let indicator = match self.connection {
            ConnectionState::Connected => {
                Span::styled("● connected", Style::default().fg(theme::GREEN))
            }
            ConnectionState::Connecting => {
                Span::styled("◐ connecting", Style::default().fg(theme::AMBER))
            }
            ConnectionState::Disconnected => {
                Span::styled("○ disconnected", Style::default().fg(theme::DIM_WHITE))
            }
            ConnectionState::Errored => {
                Span::styled("✕ offline (r)", Style::default().fg(theme::RED))
            }
        };

        let mut spans = vec![Span::raw(" "), indicator];
        if let Some(screen) = self.screens.get(&self.active_screen) {
            for (key, what) in screen.key_hints() {
                spans.push(Span::styled(format!("  {key} "), theme::key_hint_key()));
                spans.push(Span::styled(*what, theme::key_hint()));
            }
        }
        spans.push(Span::styled(" │ ? help  q quit", theme::key_hint()));

        if let Some((toast, _)) = &self.toast {
            let color = match toast.level {
                ToastLevel::Info => theme::CYAN,
                ToastLevel::Warning => theme::AMBER,
                ToastLevel::Error => theme::RED,
            };
            spans.push(Span::styled(
                format!(" │ {}", toast.message),
                Style::default().fg(color),
            ));
        }

        frame.render_widget(Paragraph::new(Line::from(spans)), area);
    }

    fn render_help_overlay(&self, frame: &mut Frame, area: Rect) {
        let help_width = 56u16.min(area.width.saturating_sub(4));
        let help_height = 20u16.min(area.height.saturating_sub(4));
        let help_area = Rect::new(
            area.x + area.width.saturating_sub(help_width) / 2,
            area.y + area.height.saturating_sub(help_height) / 2,
            help_width,
            help_height,
        );

        frame.render_widget(Clear, help_area);
        frame.render_widget(
            Block::default().style(Style::default().bg(theme::BG_DARK)),
            help_area,
        );

        let block = Block::default()
            .title(" Keyboard Shortcuts ")
            .title_style(theme::title_style())
            .borders(Borders::ALL)
            .border_type(BorderType::Rounded)
            .border_style(theme::border_focused());
        let inner = block.inner(help_area);
        frame.render_widget(block, help_area);

        let entry = |key: &'static str, what: &'static str| {
            Line::from(vec![
                Span::styled(format!("  {key:<10}"), theme::key_hint_key()),
                Span::styled(what, theme::key_hint()),
            ])
        };
        let heading =
            |title: &'static str| Line::from(Span::styled(format!("  {title}"), Style::default().fg(theme::CYAN)));

        let help_text = vec![
            Line::from(""),
            heading("Navigation"),
            entry("1-3", "Jump to screen"),
            entry("Tab", "Next screen"),
            entry("j/k ↑/↓", "Move up/down"),
            entry("g/G", "Top / bottom"),
            Line::from(""),
            heading("Live map"),
            entry("a b o", "Toggle available / busy / offline"),
            entry("t", "Trips: active, all, hidden"),
            entry("hjkl", "Pan"),
            entry("+ / -", "Zoom in / out"),
            entry("f", "Fit markers"),
            Line::from(""),
            heading("Global"),
            entry("r", "Reconnect after failure"),
            entry("?", "This help"),
            entry("q", "Quit"),
        ];
        frame.render_widget(Paragraph::new(help_text), inner);
    }
}
