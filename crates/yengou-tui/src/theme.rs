//! Palette and semantic styles.

use ratatui::style::{Color, Modifier, Style};
use yengou_core::model::{AlertSeverity, TripStatus};
use yengou_core::render::Rgb;

// ── Core palette ─────────────────────────────────────────────────────

pub const ACCENT: Color = Color::Rgb(99, 102, 241); // #6366f1
pub const CYAN: Color = Color::Rgb(34, 211, 238); // #22d3ee
pub const AMBER: Color = Color::Rgb(245, 158, 11); // #f59e0b
pub const GREEN: Color = Color::Rgb(16, 185, 129); // #10b981
pub const RED: Color = Color::Rgb(239, 68, 68); // #ef4444

pub const DIM_WHITE: Color = Color::Rgb(203, 213, 225); // #cbd5e1
pub const BORDER_GRAY: Color = Color::Rgb(100, 116, 139); // #64748b
pub const BG_HIGHLIGHT: Color = Color::Rgb(30, 41, 59); // #1e293b
pub const BG_DARK: Color = Color::Rgb(15, 23, 42); // #0f172a

/// Marker colours come from the core palette unchanged.
pub fn marker_color(rgb: Rgb) -> Color {
    Color::Rgb(rgb.0, rgb.1, rgb.2)
}

pub fn trip_status(status: Option<TripStatus>) -> Style {
    let fg = match status {
        Some(TripStatus::InTransit) => CYAN,
        Some(TripStatus::Accepted) => GREEN,
        Some(TripStatus::Pending) => AMBER,
        Some(TripStatus::Completed) => BORDER_GRAY,
        Some(TripStatus::Cancelled) => RED,
        None => DIM_WHITE,
    };
    Style::default().fg(fg)
}

pub fn severity(severity: Option<AlertSeverity>) -> Style {
    match severity {
        Some(AlertSeverity::High) => Style::default().fg(RED).add_modifier(Modifier::BOLD),
        Some(AlertSeverity::Medium) => Style::default().fg(AMBER),
        Some(AlertSeverity::Low) | None => Style::default().fg(DIM_WHITE),
    }
}

// ── Semantic styles ──────────────────────────────────────────────────

pub fn title_style() -> Style {
    Style::default().fg(CYAN).add_modifier(Modifier::BOLD)
}

pub fn border_focused() -> Style {
    Style::default().fg(ACCENT)
}

pub fn border_default() -> Style {
    Style::default().fg(BORDER_GRAY)
}

pub fn table_header() -> Style {
    Style::default()
        .fg(CYAN)
        .add_modifier(Modifier::BOLD | Modifier::UNDERLINED)
}

pub fn table_row() -> Style {
    Style::default().fg(DIM_WHITE)
}

pub fn table_selected() -> Style {
    Style::default()
        .fg(ACCENT)
        .bg(BG_HIGHLIGHT)
        .add_modifier(Modifier::BOLD)
}

pub fn tab_active() -> Style {
    Style::default().fg(ACCENT).add_modifier(Modifier::BOLD)
}

pub fn tab_inactive() -> Style {
    Style::default().fg(DIM_WHITE)
}

pub fn key_hint() -> Style {
    Style::default().fg(BORDER_GRAY)
}

pub fn key_hint_key() -> Style {
    Style::default().fg(CYAN).add_modifier(Modifier::BOLD)
}
