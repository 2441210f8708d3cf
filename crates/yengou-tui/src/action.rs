//! All UI actions. Actions are the only way state changes.

use std::sync::Arc;

use yengou_core::model::{DashboardStats, SystemAlert, SystemNotification};
use yengou_core::{ConnectionState, DriverLocation, DriverStatus, SeedReport, Snapshot, Trip};

use crate::screen::ScreenId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToastLevel {
    Info,
    Warning,
    Error,
}

/// A transient status-bar message.
#[derive(Debug, Clone)]
pub struct Toast {
    pub message: String,
    pub level: ToastLevel,
}

impl Toast {
    pub fn info(msg: impl Into<String>) -> Self {
        Self {
            message: msg.into(),
            level: ToastLevel::Info,
        }
    }

    pub fn warning(msg: impl Into<String>) -> Self {
        Self {
            message: msg.into(),
            level: ToastLevel::Warning,
        }
    }

    pub fn error(msg: impl Into<String>) -> Self {
        Self {
            message: msg.into(),
            level: ToastLevel::Error,
        }
    }
}

#[derive(Debug, Clone)]
pub enum Action {
    // ── Lifecycle ──────────────────────────────────────────────────
    Quit,
    Tick,
    Render,
    Resize(u16, u16),

    // ── Navigation ────────────────────────────────────────────────
    SwitchScreen(ScreenId),
    ToggleHelp,

    // ── Connection ────────────────────────────────────────────────
    ConnectionChanged(ConnectionState),
    /// Caller-initiated retry after the transport gave up.
    Reconnect,

    // ── Data (from the console bridge) ────────────────────────────
    Seeded(SeedReport),
    DriversUpdated(Snapshot<DriverLocation>),
    TripsUpdated(Snapshot<Trip>),
    DashboardUpdated(Arc<DashboardStats>),
    NotificationReceived(Arc<SystemNotification>),
    AlertReceived(Arc<SystemAlert>),

    // ── Live map ──────────────────────────────────────────────────
    ToggleDriverStatus(DriverStatus),
    CycleTripFilter,
    MapPan(f64, f64),
    MapZoom(f64),
    MapFit,

    // ── Lists ─────────────────────────────────────────────────────
    ScrollUp,
    ScrollDown,
    ScrollToTop,
    ScrollToBottom,

    // ── Toasts ────────────────────────────────────────────────────
    Notify(Toast),
}
