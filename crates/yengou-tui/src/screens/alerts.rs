//! Alerts screen: dashboard counters above a feed of notifications and
//! system alerts, newest first.

use std::collections::VecDeque;
use std::sync::Arc;

use chrono::{DateTime, Local, Utc};
use color_eyre::eyre::Result;
use crossterm::event::{KeyCode, KeyEvent};
use ratatui::Frame;
use ratatui::layout::{Constraint, Layout, Rect};
use ratatui::style::Style;
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, BorderType, Borders, Paragraph};

use yengou_core::model::{AlertSeverity, NotificationKind};
use yengou_core::{DashboardStats, SystemAlert, SystemNotification};

use crate::action::Action;
use crate::component::Component;
use crate::theme;

const FEED_CAPACITY: usize = 200;

#[derive(Debug, Clone)]
enum FeedEntry {
    Notification(Arc<SystemNotification>),
    Alert {
        alert: Arc<SystemAlert>,
        received: DateTime<Utc>,
    },
}

impl FeedEntry {
    fn line(&self) -> Line<'static> {
        match self {
            Self::Notification(n) => {
                let style = match n.kind {
                    NotificationKind::Error => theme::severity(Some(AlertSeverity::High)),
                    NotificationKind::Warning => theme::severity(Some(AlertSeverity::Medium)),
                    NotificationKind::Success => Style::default().fg(theme::GREEN),
                    NotificationKind::Info => Style::default().fg(theme::CYAN),
                };
                Line::from(vec![
                    Span::styled(clock(n.timestamp), theme::key_hint()),
                    Span::styled(format!("{:<8}", n.kind.to_string()), style),
                    Span::styled(format!("{}: ", n.title), theme::title_style()),
                    Span::styled(n.message.clone(), theme::table_row()),
                ])
            }
            Self::Alert { alert, received } => {
                let severity = alert
                    .severity
                    .map_or_else(|| "─".to_owned(), |s| s.to_string());
                Line::from(vec![
                    Span::styled(clock(*received), theme::key_hint()),
                    Span::styled(format!("{severity:<8}"), theme::severity(alert.severity)),
                    Span::styled(format!("[{}] ", alert.kind), theme::key_hint()),
                    Span::styled(alert.message.clone(), theme::table_row()),
                ])
            }
        }
    }
}

fn clock(at: DateTime<Utc>) -> String {
    format!(" {} ", at.with_timezone(&Local).format("%H:%M:%S"))
}

pub struct AlertsScreen {
    focused: bool,
    feed: VecDeque<FeedEntry>,
    stats: Option<Arc<DashboardStats>>,
    /// Lines scrolled down from the newest entry.
    scroll: usize,
}

impl AlertsScreen {
    pub fn new() -> Self {
        Self {
            focused: false,
            feed: VecDeque::with_capacity(FEED_CAPACITY),
            stats: None,
            scroll: 0,
        }
    }

    fn push(&mut self, entry: FeedEntry) {
        if self.feed.len() == FEED_CAPACITY {
            self.feed.pop_back();
        }
        self.feed.push_front(entry);
        // Keep the viewed entry in place while reading older ones.
        if self.scroll > 0 {
            self.scroll = (self.scroll + 1).min(self.feed.len() - 1);
        }
    }

    fn render_stats(&self, frame: &mut Frame, area: Rect) {
        let block = Block::default()
            .title(" Dashboard ")
            .title_style(theme::title_style())
            .borders(Borders::ALL)
            .border_type(BorderType::Rounded)
            .border_style(theme::border_default());
        let inner = block.inner(area);
        frame.render_widget(block, area);

        let line = match &self.stats {
            None => Line::from(Span::styled("  waiting for stats", theme::key_hint())),
            Some(s) => {
                let counter = |label: &'static str, value: String| {
                    [
                        Span::styled(format!("  {label} "), theme::key_hint()),
                        Span::styled(value, Style::default().fg(theme::CYAN)),
                    ]
                };
                let mut spans = Vec::new();
                spans.extend(counter("drivers", s.total_drivers.to_string()));
                spans.extend(counter("clients", s.total_clients.to_string()));
                spans.extend(counter("services", s.total_services.to_string()));
                spans.extend(counter("today", s.services_today.to_string()));
                spans.extend(counter("revenue", format!("{:.2}", s.revenue_today)));
                if let Some(at) = s.last_updated {
                    spans.push(Span::styled(format!("  @{}", clock(at)), theme::key_hint()));
                }
                Line::from(spans)
            }
        };
        frame.render_widget(Paragraph::new(line), inner);
    }
}

impl Default for AlertsScreen {
    fn default() -> Self {
        Self::new()
    }
}

impl Component for AlertsScreen {
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
            Action::NotificationReceived(n) => {
                self.push(FeedEntry::Notification(Arc::clone(n)));
            }
            Action::AlertReceived(alert) => self.push(FeedEntry::Alert {
                alert: Arc::clone(alert),
                received: Utc::now(),
            }),
            Action::DashboardUpdated(stats) => self.stats = Some(Arc::clone(stats)),
            Action::ScrollDown => {
                self.scroll = (self.scroll + 1).min(self.feed.len().saturating_sub(1));
            }
            Action::ScrollUp => self.scroll = self.scroll.saturating_sub(1),
            Action::ScrollToTop => self.scroll = 0,
            Action::ScrollToBottom => self.scroll = self.feed.len().saturating_sub(1),
            _ => {}
        }
        Ok(None)
    }

    fn render(&self, frame: &mut Frame, area: Rect) {
        let [stats_area, feed_area] =
            Layout::vertical([Constraint::Length(3), Constraint::Min(3)]).areas(area);
        self.render_stats(frame, stats_area);

        let block = Block::default()
            .title(format!(" Alerts ({}) ", self.feed.len()))
            .title_style(theme::title_style())
            .borders(Borders::ALL)
            .border_type(BorderType::Rounded)
            .border_style(if self.focused {
                theme::border_focused()
            } else {
                theme::border_default()
            });
        let inner = block.inner(feed_area);
        frame.render_widget(block, feed_area);

        let lines: Vec<Line> = self
            .feed
            .iter()
            .skip(self.scroll)
            .take(usize::from(inner.height))
            .map(FeedEntry::line)
            .collect();
        if lines.is_empty() {
            frame.render_widget(
                Paragraph::new("  Nothing yet").style(theme::key_hint()),
                inner,
            );
        } else {
            frame.render_widget(Paragraph::new(lines), inner);
        }
    }

    fn set_focused(&mut self, focused: bool) {
        self.focused = focused;
    }

    fn key_hints(&self) -> &'static [(&'static str, &'static str)] {
        &[("j/k", "scroll")]
    }
}
