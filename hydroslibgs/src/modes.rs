//! Flight mode definitions
//!
//! A flight mode is a discrete operating state that gates which commands are
//! valid. The set is closed; uplink frames address modes by their stable
//! numeric id.

use serde::{Deserialize, Serialize};
use std::fmt;
use strum_macros::EnumIter;

/// Spacecraft flight modes, in id order
#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash, EnumIter,
)]
pub enum FlightMode {
    Boot,
    Restart,
    Normal,
    LowBatterySafety,
    Safety,
    OpNav,
    Maneuver,
    SensorMode,
    TestMode,
    CommsMode,
    Command,
}

impl FlightMode {
    /// Stable numeric id used on the uplink/downlink
    pub fn id(&self) -> u32 {
        match self {
            FlightMode::Boot => 0,
            FlightMode::Restart => 1,
            FlightMode::Normal => 2,
            FlightMode::LowBatterySafety => 3,
            FlightMode::Safety => 4,
            FlightMode::OpNav => 5,
            FlightMode::Maneuver => 6,
            FlightMode::SensorMode => 7,
            FlightMode::TestMode => 8,
            FlightMode::CommsMode => 9,
            FlightMode::Command => 10,
        }
    }

    /// Resolve a numeric id back to a mode
    pub fn from_id(id: u32) -> Option<Self> {
        match id {
            0 => Some(FlightMode::Boot),
            1 => Some(FlightMode::Restart),
            2 => Some(FlightMode::Normal),
            3 => Some(FlightMode::LowBatterySafety),
            4 => Some(FlightMode::Safety),
            5 => Some(FlightMode::OpNav),
            6 => Some(FlightMode::Maneuver),
            7 => Some(FlightMode::SensorMode),
            8 => Some(FlightMode::TestMode),
            9 => Some(FlightMode::CommsMode),
            10 => Some(FlightMode::Command),
            _ => None,
        }
    }

    /// Resolve a numeric id, surfacing the taxonomy error on failure
    pub fn try_from_id(id: u32) -> Result<Self, crate::error::FswError> {
        Self::from_id(id).ok_or(crate::error::FswError::UnknownFlightMode(id))
    }

    /// Iterate the full closed mode set, in id order
    pub fn all() -> impl Iterator<Item = FlightMode> {
        <FlightMode as strum::IntoEnumIterator>::iter()
    }

    pub fn name(&self) -> &'static str {
        match self {
            FlightMode::Boot => "Boot",
            FlightMode::Restart => "Restart",
            FlightMode::Normal => "Normal",
            FlightMode::LowBatterySafety => "LowBatterySafety",
            FlightMode::Safety => "Safety",
            FlightMode::OpNav => "OpNav",
            FlightMode::Maneuver => "Maneuver",
            FlightMode::SensorMode => "SensorMode",
            FlightMode::TestMode => "TestMode",
            FlightMode::CommsMode => "CommsMode",
            FlightMode::Command => "Command",
        }
    }
}

impl fmt::Display for FlightMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    #[test]
    fn test_mode_id_roundtrip() {
        for mode in FlightMode::iter() {
            assert_eq!(FlightMode::from_id(mode.id()), Some(mode));
        }
    }

    #[test]
    fn test_mode_ids_contiguous() {
        let ids: Vec<u32> = FlightMode::iter().map(|m| m.id()).collect();
        assert_eq!(ids, (0..11).collect::<Vec<u32>>());
    }

    #[test]
    fn test_unknown_mode_id() {
        assert_eq!(FlightMode::from_id(11), None);
        assert_eq!(FlightMode::from_id(u32::MAX), None);
    }
}
