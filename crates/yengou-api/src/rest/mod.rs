// REST backend client
//
// Bulk reads used to seed the live views before realtime updates arrive,
// plus the login endpoints that mint bearer tokens.

pub mod client;
pub mod models;

pub use client::{LoginRole, RestClient};
pub use models::{
    LoginResponse, RestDriver, RestParty, RestService, RestTrip, RestUser, RestVehicle,
};
