//! Type definitions shared between ground and space software

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

/// Timestamp type for spacecraft time
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct Timestamp {
    /// Seconds since UNIX epoch
    pub seconds: u64,
    /// Nanoseconds within the current second
    pub nanoseconds: u32,
}

impl Timestamp {
    /// Create a new timestamp from the current system time
    pub fn now() -> Self {
        let duration = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default();
        Self {
            seconds: duration.as_secs(),
            nanoseconds: duration.subsec_nanos(),
        }
    }

    /// Build a timestamp from fractional seconds since the epoch
    pub fn from_secs_f64(t: f64) -> Self {
        let seconds = t.max(0.0).trunc();
        let nanoseconds = ((t.max(0.0) - seconds) * 1e9).round() as u32;
        Self {
            seconds: seconds as u64,
            nanoseconds,
        }
    }

    /// Fractional seconds since the epoch
    pub fn as_secs_f64(&self) -> f64 {
        self.seconds as f64 + f64::from(self.nanoseconds) / 1e9
    }

    /// Microseconds within the current second, rounded to the nearest
    /// microsecond. The verification downlink calls this field milliseconds
    /// in older documentation; the microsecond scale is the flown behavior.
    pub fn subsec_micros_rounded(&self) -> u32 {
        (self.nanoseconds + 500) / 1000
    }
}

/// Link-verification team identifier assigned by the ground segment
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct TeamId(pub u32);

impl fmt::Display for TeamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A typed runtime parameter value.
///
/// Serialized untagged so the persisted snapshot stays a plain JSON object
/// of name to value. `Bool` and `Int` are tried before `Float` so integral
/// snapshot values keep their type across a reload.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum ParamValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl ParamValue {
    /// Numeric view of the value, if it has one
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ParamValue::Int(v) => Some(*v as f64),
            ParamValue::Float(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ParamValue::Bool(v) => Some(*v),
            _ => None,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            ParamValue::Bool(_) => "bool",
            ParamValue::Int(_) => "int",
            ParamValue::Float(_) => "float",
            ParamValue::Text(_) => "text",
        }
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Bool(v) => write!(f, "{v}"),
            ParamValue::Int(v) => write!(f, "{v}"),
            ParamValue::Float(v) => write!(f, "{v}"),
            ParamValue::Text(v) => write!(f, "{v}"),
        }
    }
}

impl From<bool> for ParamValue {
    fn from(v: bool) -> Self {
        ParamValue::Bool(v)
    }
}

impl From<i64> for ParamValue {
    fn from(v: i64) -> Self {
        ParamValue::Int(v)
    }
}

impl From<f64> for ParamValue {
    fn from(v: f64) -> Self {
        ParamValue::Float(v)
    }
}

impl From<&str> for ParamValue {
    fn from(v: &str) -> Self {
        ParamValue::Text(v.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timestamp_now() {
        let ts = Timestamp::now();
        assert!(ts.seconds > 0);
    }

    #[test]
    fn test_timestamp_micros_rounding() {
        let ts = Timestamp {
            seconds: 1,
            nanoseconds: 1_499,
        };
        assert_eq!(ts.subsec_micros_rounded(), 1);
        let ts = Timestamp {
            seconds: 1,
            nanoseconds: 1_500,
        };
        assert_eq!(ts.subsec_micros_rounded(), 2);
    }

    #[test]
    fn test_timestamp_from_secs_f64() {
        let ts = Timestamp::from_secs_f64(1_000_000_000.0);
        assert_eq!(ts.seconds, 1_000_000_000);
        assert_eq!(ts.nanoseconds, 0);

        let ts = Timestamp::from_secs_f64(2.25);
        assert_eq!(ts.seconds, 2);
        assert_eq!(ts.nanoseconds, 250_000_000);
    }

    #[test]
    fn test_param_value_snapshot_roundtrip() {
        let json = r#"{"MAX_GYRO_RATE": 5.0, "OPNAV_INTERVAL": 60, "ELECTROLYSIS": false}"#;
        let doc: std::collections::BTreeMap<String, ParamValue> =
            serde_json::from_str(json).unwrap();
        assert_eq!(doc["MAX_GYRO_RATE"], ParamValue::Float(5.0));
        assert_eq!(doc["OPNAV_INTERVAL"], ParamValue::Int(60));
        assert_eq!(doc["ELECTROLYSIS"], ParamValue::Bool(false));
    }
}
