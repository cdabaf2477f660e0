//! Error definitions for Hydros

use thiserror::Error;

use crate::modes::FlightMode;

/// Hydros error taxonomy
#[derive(Error, Debug)]
pub enum FswError {
    #[error("command {id} not found in {mode} table")]
    CommandNotFound { mode: FlightMode, id: u32 },

    #[error("command argument error: {0}")]
    CommandArg(#[from] CommandArgError),

    #[error("command id {0} is reserved for the manual mode switch")]
    ReservedCommandId(u32),

    #[error("unknown parameter: {0}")]
    UnknownParameter(String),

    #[error("parameter `{name}` validation failed: {reason}")]
    ParameterValidation { name: String, reason: String },

    #[error(transparent)]
    Sensor(#[from] SensorAnomaly),

    #[error("driver unavailable: {0}")]
    DriverUnavailable(&'static str),

    #[error("driver fault in {device}: {reason}")]
    Driver { device: &'static str, reason: String },

    #[error("unknown flight mode id: {0}")]
    UnknownFlightMode(u32),

    #[error("task error: {0}")]
    Task(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias for Hydros operations
pub type FswResult<T> = Result<T, FswError>;

/// Typed telemetry anomalies raised by the validation sweep
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SensorAnomaly {
    #[error("unreasonable gyro rates ({x}, {y}, {z}) rad/s, limit {limit}")]
    Gyro { x: f64, y: f64, z: f64, limit: f64 },

    #[error("unreasonable pressure: {value} psi")]
    Pressure { value: f64 },

    #[error("unreasonable fuel tank temperature: {value} degC")]
    Thermal { value: f64 },

    #[error("unreasonable battery fraction: {value}")]
    Power { value: f64 },

    #[error("platform statistic `{field}` out of range: {value}")]
    Platform { field: &'static str, value: f64 },
}

/// A rejected command argument, with the field named for the logs
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("bad argument `{field}`: {reason}")]
pub struct CommandArgError {
    pub field: String,
    pub reason: String,
}

impl CommandArgError {
    pub fn new(field: &str, reason: impl Into<String>) -> Self {
        Self {
            field: field.to_string(),
            reason: reason.into(),
        }
    }

    pub fn missing(field: &str) -> Self {
        Self::new(field, "required argument missing")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = FswError::CommandNotFound {
            mode: FlightMode::Safety,
            id: 9,
        };
        assert_eq!(format!("{}", err), "command 9 not found in Safety table");
    }

    #[test]
    fn test_arg_error_display() {
        let err = CommandArgError::missing("state");
        assert_eq!(
            format!("{}", err),
            "bad argument `state`: required argument missing"
        );
    }

    #[test]
    fn test_anomaly_display() {
        let err = SensorAnomaly::Pressure { value: 2500.0 };
        assert_eq!(format!("{}", err), "unreasonable pressure: 2500 psi");
    }
}
