//! Configuration for the Hydros flight process
//!
//! Mission constants live here; operator-tunable values live in the
//! parameter store and are only seeded here.

use hydroslibgs::{ParamValue, TeamId};

/// Configuration constants
pub mod constants {
    use super::TeamId;
    use std::time::Duration;

    /// Link-verification team identifier assigned for this mission
    pub const TEAM_IDENTIFIER: TeamId = TeamId(2021);

    /// Cached telemetry older than this forces a fresh poll
    pub const TELEMETRY_STALENESS: Duration = Duration::from_secs(3600);

    /// Verification PRN generator constants: x_n = (A * x_{n-1} + B) mod M
    pub const PRN_A: u64 = 1_664_525;
    pub const PRN_B: u64 = 1_013_904_223;
    pub const PRN_M: u64 = 1 << 32;

    /// 32-bit words of PRN data per verification block
    pub const PRN_WORDS: usize = 32;

    /// Power-system output channel driving the electrolyzer
    pub const ELECTROLYZER_CHANNEL: u8 = 1;

    /// Valid pressure-transducer reading range, psi
    pub const PRESSURE_RANGE_PSI: (f64, f64) = (0.0, 2000.0);

    /// Valid fuel-tank thermocouple range, degrees Celsius
    pub const THERMOCOUPLE_RANGE_C: (f64, f64) = (-200.0, 200.0);

    /// Valid battery state-of-charge fraction range
    pub const BATTERY_FRACTION_RANGE: (f64, f64) = (0.0, 1.5);

    /// Default location of the persisted parameter snapshot
    pub const DEFAULT_SNAPSHOT_PATH: &str = "hydros_parameters.json";
}

// Parameter names. Uplinked set/get commands address parameters by these
// keys, so they are part of the ground interface.
pub const P_GOM_VOLTAGE_MIN: &str = "GOM_VOLTAGE_MIN";
pub const P_GOM_VOLTAGE_MAX: &str = "GOM_VOLTAGE_MAX";
pub const P_ENTER_LOW_BATTERY_THRESHOLD: &str = "ENTER_LOW_BATTERY_MODE_THRESHOLD";
pub const P_EXIT_LOW_BATTERY_THRESHOLD: &str = "EXIT_LOW_BATTERY_MODE_THRESHOLD";
pub const P_MAX_GYRO_RATE: &str = "MAX_GYRO_RATE";
pub const P_OPNAV_INTERVAL: &str = "OPNAV_INTERVAL";
pub const P_SCHEDULED_BURN_TIME: &str = "SCHEDULED_BURN_TIME";
pub const P_SPLIT_BURNWIRE_DURATION: &str = "SPLIT_BURNWIRE_DURATION";
pub const P_SEPARATION_GYRO_FREQ: &str = "SEPARATION_GYRO_FREQ";
pub const P_SEPARATION_GYRO_DURATION: &str = "SEPARATION_GYRO_DURATION";

/// Compiled-in parameter defaults. The persisted snapshot overlays these at
/// startup; a hard set rewrites the snapshot.
pub fn default_parameters() -> Vec<(&'static str, ParamValue)> {
    vec![
        // Battery voltage window used for the state-of-charge fraction, mV
        (P_GOM_VOLTAGE_MIN, ParamValue::Float(6000.0)),
        (P_GOM_VOLTAGE_MAX, ParamValue::Float(8400.0)),
        (P_ENTER_LOW_BATTERY_THRESHOLD, ParamValue::Float(0.4)),
        (P_EXIT_LOW_BATTERY_THRESHOLD, ParamValue::Float(0.3)),
        // Rates above this magnitude on any axis are flagged, rad/s
        (P_MAX_GYRO_RATE, ParamValue::Float(5.0)),
        // Minutes between autonomous optical-navigation runs
        (P_OPNAV_INTERVAL, ParamValue::Float(60.0)),
        (P_SCHEDULED_BURN_TIME, ParamValue::Float(0.0)),
        // Seconds of burnwire actuation for deployment separation
        (P_SPLIT_BURNWIRE_DURATION, ParamValue::Float(2.0)),
        // Gyro sampling during the separation test: rate (Hz) and window (s)
        (P_SEPARATION_GYRO_FREQ, ParamValue::Float(250.0)),
        (P_SEPARATION_GYRO_DURATION, ParamValue::Float(3.0)),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_cover_interface_parameters() {
        let defaults = default_parameters();
        let names: Vec<&str> = defaults.iter().map(|(n, _)| *n).collect();
        for name in [
            P_MAX_GYRO_RATE,
            P_ENTER_LOW_BATTERY_THRESHOLD,
            P_EXIT_LOW_BATTERY_THRESHOLD,
            P_SCHEDULED_BURN_TIME,
        ] {
            assert!(names.contains(&name), "missing default for {name}");
        }
    }

    #[test]
    fn test_exit_threshold_below_enter_threshold() {
        let defaults = default_parameters();
        let get = |name: &str| {
            defaults
                .iter()
                .find(|(n, _)| *n == name)
                .and_then(|(_, v)| v.as_f64())
                .unwrap()
        };
        assert!(get(P_EXIT_LOW_BATTERY_THRESHOLD) < get(P_ENTER_LOW_BATTERY_THRESHOLD));
    }
}
