//! Screen identifiers, navigable by number keys.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ScreenId {
    #[default]
    LiveMap, // 1
    Trips,  // 2
    Alerts, // 3
}

impl ScreenId {
    /// Tab-bar order.
    pub const ALL: [ScreenId; 3] = [Self::LiveMap, Self::Trips, Self::Alerts];

    pub fn number(self) -> u8 {
        match self {
            Self::LiveMap => 1,
            Self::Trips => 2,
            Self::Alerts => 3,
        }
    }

    pub fn from_number(n: u8) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.number() == n)
    }

    /// Next screen in tab order, wrapping.
    pub fn next(self) -> Self {
        let idx = Self::ALL.iter().position(|&s| s == self).unwrap_or(0);
        Self::ALL[(idx + 1) % Self::ALL.len()]
    }

    /// Previous screen in tab order, wrapping.
    pub fn prev(self) -> Self {
        let idx = Self::ALL.iter().position(|&s| s == self).unwrap_or(0);
        Self::ALL[(idx + Self::ALL.len() - 1) % Self::ALL.len()]
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::LiveMap => "Live map",
            Self::Trips => "Trips",
            Self::Alerts => "Alerts",
        }
    }
}

impl fmt::Display for ScreenId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tab_order_wraps_both_ways() {
        assert_eq!(ScreenId::Alerts.next(), ScreenId::LiveMap);
        assert_eq!(ScreenId::LiveMap.prev(), ScreenId::Alerts);
        assert_eq!(ScreenId::from_number(2), Some(ScreenId::Trips));
        assert_eq!(ScreenId::from_number(9), None);
    }
}
