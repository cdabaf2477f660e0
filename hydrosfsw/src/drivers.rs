//! Hardware capability seams
//!
//! Concrete I2C/SPI driver implementations live outside this core. The
//! flight process consumes them through these traits; a missing manager is a
//! recognized flight state (`DriverUnavailable`), not a fault.

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use hydroslibgs::{FswResult, Timestamp};

/// Power-system housekeeping snapshot
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Housekeeping {
    /// Boost converter voltages, mV
    pub vboost: [u16; 3],
    /// Battery voltage, mV
    pub vbatt: u16,
    /// Input currents, mA
    pub curin: [u16; 3],
    /// Current from solar panels, mA
    pub cursun: u16,
    /// Total system current, mA
    pub cursys: u16,
    /// Output channel currents, mA
    pub curout: [u16; 6],
    /// Output channel switch states
    pub outputs: [bool; 8],
    /// Board temperatures, degrees Celsius
    pub temp: [i16; 4],
    pub battmode: u8,
    pub counter_boot: u32,
}

/// Power system manager (battery, solar input, switched outputs, burnwires)
pub trait PowerSystem {
    fn housekeeping(&self) -> FswResult<Housekeeping>;

    fn set_output(&self, channel: u8, on: bool, delay_s: u32) -> FswResult<()>;

    fn set_electrolysis(&self, on: bool, delay_s: u32) -> FswResult<()>;

    fn fire_burnwire(&self, duration_s: f64) -> FswResult<()>;

    /// Full power cycle of the spacecraft bus. The driver validates the
    /// passcode; the dispatcher forwards it opaquely.
    fn hard_reset(&self, passcode: &str) -> FswResult<()>;
}

/// Rate gyro with magnetometer and accelerometer
pub trait Gyro {
    /// Angular rates, rad/s
    fn rates(&self) -> FswResult<[f64; 3]>;

    /// Magnetic field, microtesla
    fn magnetometer(&self) -> FswResult<[f64; 3]>;

    /// Linear acceleration, m/s^2
    fn acceleration(&self) -> FswResult<[f64; 3]>;

    /// Die temperature, degrees Celsius
    fn temperature(&self) -> FswResult<f64>;
}

/// Analog front end for the propulsion tank instrumentation
pub trait Adc {
    fn pressure_psi(&self) -> FswResult<f64>;

    fn thermocouple_celsius(&self) -> FswResult<f64>;

    /// Cold-junction temperature at the gyro sensor
    fn gyro_junction_celsius(&self) -> FswResult<f64>;
}

/// Real-time clock
pub trait Rtc {
    /// Seconds since the UNIX epoch
    fn time(&self) -> FswResult<u64>;
}

/// Radiation instrument manager
pub trait InstrumentManager {
    fn write_register(&self, address: u32, value: u32) -> FswResult<()>;

    fn read_register(&self, address: u32, size: u32) -> FswResult<Vec<u8>>;

    fn power_on(&self) -> FswResult<()>;

    fn power_off(&self) -> FswResult<()>;

    fn reboot(&self) -> FswResult<()>;

    fn process_rate_data(&self, t_start: f64, t_stop: f64, decimation_factor: u32)
        -> FswResult<()>;

    fn process_histograms(
        &self,
        t_start: f64,
        t_stop: f64,
        decimation_factor: u32,
    ) -> FswResult<()>;
}

/// Flight computer platform statistics
pub trait PlatformMonitor {
    fn cpu_percent(&self) -> f64;

    fn ram_percent(&self) -> f64;

    fn disk_percent(&self) -> f64;

    /// Boot instant, seconds since the UNIX epoch
    fn boot_time(&self) -> f64;

    fn uptime_secs(&self) -> f64;

    /// Board temperature, degrees Celsius
    fn temperature(&self) -> f64;
}

/// Wall-clock seam so timing preconditions and the verification encoder can
/// be pinned in tests
pub trait WallClock {
    fn now(&self) -> Timestamp;
}

/// System wall clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl WallClock for SystemClock {
    fn now(&self) -> Timestamp {
        Timestamp::now()
    }
}

/// Optional driver handles available to the flight process
#[derive(Clone, Default)]
pub struct DriverSet {
    pub power: Option<Arc<dyn PowerSystem + Send + Sync>>,
    pub gyro: Option<Arc<dyn Gyro + Send + Sync>>,
    pub adc: Option<Arc<dyn Adc + Send + Sync>>,
    pub rtc: Option<Arc<dyn Rtc + Send + Sync>>,
    pub instrument: Option<Arc<dyn InstrumentManager + Send + Sync>>,
    pub platform: Option<Arc<dyn PlatformMonitor + Send + Sync>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_driver_set_default_is_empty() {
        let drivers = DriverSet::default();
        assert!(drivers.power.is_none());
        assert!(drivers.instrument.is_none());
    }

    #[test]
    fn test_system_clock_advances() {
        let clock = SystemClock;
        assert!(clock.now().seconds > 0);
    }
}
