//! Downlink acknowledgment records
//!
//! Handlers acknowledge command effects by enqueuing one of these on the
//! downlink queue. Transmission of the queue is outside this core.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::modes::FlightMode;

/// A single downlink acknowledgment record
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DownlinkFrame {
    /// Monotone frame counter assigned by the queue
    pub counter: u32,
    pub flight_mode_id: u32,
    pub command_id: u32,
    pub success: bool,
    /// Command-specific payload fields
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub fields: Map<String, Value>,
}

impl DownlinkFrame {
    pub fn new(counter: u32, mode: FlightMode, command_id: u32, success: bool) -> Self {
        Self {
            counter,
            flight_mode_id: mode.id(),
            command_id,
            success,
            fields: Map::new(),
        }
    }

    pub fn with_field(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.fields.insert(key.to_string(), value.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_serialization() {
        let frame = DownlinkFrame::new(7, FlightMode::Normal, 3, true).with_field("name", "X");
        let json = serde_json::to_string(&frame).unwrap();
        let decoded: DownlinkFrame = serde_json::from_str(&json).unwrap();
        assert_eq!(frame, decoded);
        assert_eq!(decoded.flight_mode_id, 2);
        assert_eq!(decoded.fields["name"], "X");
    }

    #[test]
    fn test_empty_fields_omitted() {
        let frame = DownlinkFrame::new(0, FlightMode::Boot, 0, true);
        let json = serde_json::to_string(&frame).unwrap();
        assert!(!json.contains("fields"));
    }
}
