// ── REST → domain conversions ──

use yengou_api::rest::{RestDriver, RestVehicle};

use crate::model::DriverProfile;

impl From<RestDriver> for DriverProfile {
    fn from(d: RestDriver) -> Self {
        let name = d.user.as_ref().and_then(|u| u.display_name());
        let phone = d.user.and_then(|u| u.phone_number);
        Self {
            id: d.id,
            name,
            phone,
            vehicle: d.vehicles.first().and_then(vehicle_label),
            banned: d.account_banned,
        }
    }
}

/// `"Toyota Corolla"`, falling back to the vehicle type.
fn vehicle_label(v: &RestVehicle) -> Option<String> {
    match (v.make.as_deref(), v.model.as_deref()) {
        (Some(make), Some(model)) => Some(format!("{make} {model}")),
        (Some(one), None) | (None, Some(one)) => Some(one.to_owned()),
        (None, None) => v.vehicle_type.clone(),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn driver_profile_from_rest() {
        let driver: RestDriver = serde_json::from_value(json!({
            "id": "drv-1",
            "accountBanned": false,
            "user": { "id": "u1", "firstName": "Awa", "lastName": "Diop", "phoneNumber": "+221700000000" },
            "vehicles": [{ "id": "v1", "make": "Toyota", "model": "Corolla" }]
        }))
        .unwrap();

        let profile = DriverProfile::from(driver);
        assert_eq!(profile.name.as_deref(), Some("Awa Diop"));
        assert_eq!(profile.phone.as_deref(), Some("+221700000000"));
        assert_eq!(profile.vehicle.as_deref(), Some("Toyota Corolla"));
        assert!(!profile.banned);
    }
}
