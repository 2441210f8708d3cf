// yengou-api: Async Rust client for the Yengou ride-hailing backend (realtime + REST)

pub mod error;
pub mod realtime;
pub mod rest;
pub mod transport;
pub mod wire;

pub use error::Error;
pub use realtime::{RealtimeHandle, ReconnectConfig, TransportEvent};
pub use rest::{LoginRole, RestClient};
pub use transport::TransportConfig;
