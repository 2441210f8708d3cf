// ── Driver directory ──
//
// Display metadata for drivers, seeded from REST. Location updates carry
// only an id; labels for markers and tables come from here.

use std::sync::Arc;

use dashmap::DashMap;
use serde::Serialize;

/// Human-facing details for one driver.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DriverProfile {
    pub id: String,
    pub name: Option<String>,
    pub phone: Option<String>,
    pub vehicle: Option<String>,
    pub banned: bool,
}

/// Concurrent id → profile lookup.
#[derive(Debug, Default)]
pub struct DriverDirectory {
    profiles: DashMap<String, Arc<DriverProfile>>,
}

impl DriverDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace profiles. Returns how many were written.
    pub fn extend(&self, profiles: impl IntoIterator<Item = DriverProfile>) -> usize {
        let mut n = 0;
        for profile in profiles {
            self.profiles.insert(profile.id.clone(), Arc::new(profile));
            n += 1;
        }
        n
    }

    pub fn get(&self, driver_id: &str) -> Option<Arc<DriverProfile>> {
        self.profiles.get(driver_id).map(|r| Arc::clone(r.value()))
    }

    /// Display label: the profile name, else `Driver <last 4 of id>`.
    pub fn label(&self, driver_id: &str) -> String {
        self.get(driver_id)
            .and_then(|p| p.name.clone())
            .unwrap_or_else(|| fallback_label(driver_id))
    }

    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }
}

fn fallback_label(driver_id: &str) -> String {
    let skip = driver_id.chars().count().saturating_sub(4);
    let tail: String = driver_id.chars().skip(skip).collect();
    format!("Driver {tail}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn label_prefers_profile_name() {
        let dir = DriverDirectory::new();
        dir.extend([DriverProfile {
            id: "drv-0001".into(),
            name: Some("Awa Diop".into()),
            phone: None,
            vehicle: None,
            banned: false,
        }]);

        assert_eq!(dir.label("drv-0001"), "Awa Diop");
        assert_eq!(dir.label("drv-abcd1234"), "Driver 1234");
        assert_eq!(dir.label("D1"), "Driver D1");
    }
}
