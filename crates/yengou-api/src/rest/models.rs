// REST response models
//
// Field names follow the backend's camelCase JSON. Everything that is not
// needed to identify an entity is optional so partial payloads from older
// backend builds still decode.

use chrono::{DateTime, Utc};
use secrecy::SecretString;
use serde::Deserialize;

use crate::wire::{GeoPoint, Place, TripStatus, TripUpdate};

// ── Accounts ─────────────────────────────────────────────────────────

/// A platform user account.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RestUser {
    pub id: String,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone_number: Option<String>,
    #[serde(default)]
    pub authorities: Vec<String>,
}

impl RestUser {
    /// "First Last", or whichever half is present.
    pub fn display_name(&self) -> Option<String> {
        let name = [self.first_name.as_deref(), self.last_name.as_deref()]
            .into_iter()
            .flatten()
            .filter(|s| !s.trim().is_empty())
            .collect::<Vec<_>>()
            .join(" ");
        (!name.is_empty()).then_some(name)
    }
}

/// Result of any of the login endpoints.
#[derive(Debug, Clone)]
pub struct LoginResponse {
    pub access_token: SecretString,
    pub refresh_token: Option<SecretString>,
    pub user: Option<RestUser>,
}

/// Raw login body. The user object sits at a different path per role.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RawLoginResponse {
    pub access_token: SecretString,
    #[serde(default)]
    pub refresh_token: Option<SecretString>,
    #[serde(default)]
    pub user: Option<RestUser>,
    #[serde(default)]
    pub admin_profile: Option<ProfileWithUser>,
    #[serde(default)]
    pub support_profile: Option<ProfileWithUser>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ProfileWithUser {
    #[serde(default)]
    pub user: Option<RestUser>,
}

impl From<RawLoginResponse> for LoginResponse {
    fn from(raw: RawLoginResponse) -> Self {
        let user = raw
            .user
            .or_else(|| raw.admin_profile.and_then(|p| p.user))
            .or_else(|| raw.support_profile.and_then(|p| p.user));
        Self {
            access_token: raw.access_token,
            refresh_token: raw.refresh_token,
            user,
        }
    }
}

// ── Drivers ──────────────────────────────────────────────────────────

/// `GET /driver-profiles` element.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RestDriver {
    pub id: String,
    #[serde(default)]
    pub balance: f64,
    #[serde(default)]
    pub account_banned: bool,
    #[serde(default)]
    pub user: Option<RestUser>,
    #[serde(default)]
    pub vehicles: Vec<RestVehicle>,
    #[serde(default)]
    pub ratings: Option<f64>,
    #[serde(default)]
    pub total_trips: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RestVehicle {
    pub id: String,
    #[serde(default)]
    pub make: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub license_plate: Option<String>,
    #[serde(default)]
    pub vehicle_type: Option<String>,
    #[serde(default)]
    pub vehicle_status: Option<String>,
}

// ── Trips ────────────────────────────────────────────────────────────

/// Driver or client summary embedded in a trip.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RestParty {
    pub id: String,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub phone_number: Option<String>,
}

/// The service request behind a trip; carries pickup and drop-off.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RestService {
    pub id: String,
    #[serde(default)]
    pub service_type: Option<String>,
    #[serde(default)]
    pub departure_latitude: Option<f64>,
    #[serde(default)]
    pub departure_longitude: Option<f64>,
    #[serde(default)]
    pub departure_location_name: Option<String>,
    #[serde(default)]
    pub arrival_latitude: Option<f64>,
    #[serde(default)]
    pub arrival_longitude: Option<f64>,
    #[serde(default)]
    pub arrival_location_name: Option<String>,
    #[serde(default)]
    pub price: Option<f64>,
}

impl RestService {
    pub fn departure(&self) -> Option<Place> {
        place(
            self.departure_latitude,
            self.departure_longitude,
            self.departure_location_name.as_deref(),
        )
    }

    pub fn arrival(&self) -> Option<Place> {
        place(
            self.arrival_latitude,
            self.arrival_longitude,
            self.arrival_location_name.as_deref(),
        )
    }
}

fn place(lat: Option<f64>, lng: Option<f64>, name: Option<&str>) -> Option<Place> {
    Some(Place {
        point: GeoPoint::new(lat?, lng?),
        name: name.map(str::to_owned),
    })
}

/// `GET /trips` element.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RestTrip {
    pub id: String,
    pub status: TripStatus,
    #[serde(default)]
    pub start_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub estimated_end_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub distance: Option<f64>,
    #[serde(default)]
    pub price: Option<f64>,
    #[serde(default)]
    pub driver: Option<RestParty>,
    #[serde(default)]
    pub client: Option<RestParty>,
    #[serde(default)]
    pub service: Option<RestService>,
}

/// Seeding feeds REST trips through the same merge path as pushed updates.
impl From<RestTrip> for TripUpdate {
    fn from(t: RestTrip) -> Self {
        let (departure, arrival) = t
            .service
            .as_ref()
            .map_or((None, None), |s| (s.departure(), s.arrival()));
        Self {
            trip_id: t.id,
            status: Some(t.status),
            driver_id: t.driver.map(|d| d.id),
            departure,
            arrival,
            estimated_arrival: t.estimated_end_time,
            ..Self::default()
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn trip_update_from_rest_carries_places() {
        let trip: RestTrip = serde_json::from_value(json!({
            "id": "T1",
            "status": "IN_TRANSIT",
            "driver": { "id": "drv-1" },
            "service": {
                "id": "S1",
                "departureLatitude": 14.69, "departureLongitude": -17.44,
                "departureLocationName": "Plateau",
                "arrivalLatitude": 14.74, "arrivalLongitude": -17.49
            }
        }))
        .unwrap();

        let update = TripUpdate::from(trip);
        assert_eq!(update.trip_id, "T1");
        assert_eq!(update.status, Some(TripStatus::InTransit));
        assert_eq!(update.driver_id.as_deref(), Some("drv-1"));
        assert_eq!(
            update.departure.unwrap().name.as_deref(),
            Some("Plateau")
        );
        assert!(update.arrival.is_some());
    }

    #[test]
    fn trip_update_from_rest_without_service() {
        let trip: RestTrip =
            serde_json::from_value(json!({ "id": "T2", "status": "PENDING" })).unwrap();

        let update = TripUpdate::from(trip);
        assert_eq!(update.status, Some(TripStatus::Pending));
        assert!(update.departure.is_none());
        assert!(update.arrival.is_none());
        assert!(update.driver_id.is_none());
    }
}
