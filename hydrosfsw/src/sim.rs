//! Simulated hardware drivers
//!
//! Desk stand-ins for the real I2C/SPI managers so the flight process can
//! run without a spacecraft attached. Readings carry mild noise; actuations
//! are logged and, where the real hardware would block, block.

use log::{debug, info};
use rand::Rng;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use hydroslibgs::{FswError, FswResult};

use crate::config::constants::ELECTROLYZER_CHANNEL;
use crate::drivers::{
    Adc, DriverSet, Gyro, Housekeeping, InstrumentManager, PlatformMonitor, PowerSystem, Rtc,
};

fn epoch_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

/// Simulated power system with switched outputs and a healthy battery
pub struct SimPowerSystem {
    outputs: Mutex<[bool; 8]>,
}

impl SimPowerSystem {
    pub fn new() -> Self {
        Self {
            outputs: Mutex::new([false; 8]),
        }
    }
}

impl Default for SimPowerSystem {
    fn default() -> Self {
        Self::new()
    }
}

impl PowerSystem for SimPowerSystem {
    fn housekeeping(&self) -> FswResult<Housekeeping> {
        let mut rng = rand::thread_rng();
        let outputs = *self.outputs.lock().unwrap();
        Ok(Housekeeping {
            vboost: [
                5000 + rng.gen_range(0..40),
                5000 + rng.gen_range(0..40),
                5000 + rng.gen_range(0..40),
            ],
            vbatt: 7400 + rng.gen_range(0..100),
            curin: [
                120 + rng.gen_range(0..30),
                120 + rng.gen_range(0..30),
                120 + rng.gen_range(0..30),
            ],
            cursun: 300 + rng.gen_range(0..50),
            cursys: 280 + rng.gen_range(0..40),
            curout: [15, 0, 0, 5, 0, 0],
            outputs,
            temp: [21, 22, 20, 23],
            battmode: 1,
            counter_boot: 3,
        })
    }

    fn set_output(&self, channel: u8, on: bool, delay_s: u32) -> FswResult<()> {
        let index = usize::from(channel);
        let mut outputs = self.outputs.lock().unwrap();
        if index >= outputs.len() {
            return Err(FswError::Driver {
                device: "power system",
                reason: format!("no such output channel {channel}"),
            });
        }
        info!("sim power: output {channel} -> {on} (delay {delay_s}s)");
        outputs[index] = on;
        Ok(())
    }

    fn set_electrolysis(&self, on: bool, delay_s: u32) -> FswResult<()> {
        self.set_output(ELECTROLYZER_CHANNEL, on, delay_s)
    }

    fn fire_burnwire(&self, duration_s: f64) -> FswResult<()> {
        info!("sim power: burnwire firing for {duration_s}s");
        // The real burnwire call blocks for the burn window.
        thread::sleep(Duration::from_secs_f64(duration_s.max(0.0)));
        info!("sim power: burnwire released");
        Ok(())
    }

    fn hard_reset(&self, passcode: &str) -> FswResult<()> {
        if passcode.is_empty() {
            return Err(FswError::Driver {
                device: "power system",
                reason: "hard reset refused: empty passcode".to_string(),
            });
        }
        info!("sim power: full power cycle commanded");
        *self.outputs.lock().unwrap() = [false; 8];
        Ok(())
    }
}

/// Simulated rate gyro: a quietly tumbling spacecraft
pub struct SimGyro;

impl Gyro for SimGyro {
    fn rates(&self) -> FswResult<[f64; 3]> {
        let mut rng = rand::thread_rng();
        Ok([
            rng.gen_range(-0.02..0.02),
            rng.gen_range(-0.02..0.02),
            rng.gen_range(-0.02..0.02),
        ])
    }

    fn magnetometer(&self) -> FswResult<[f64; 3]> {
        let mut rng = rand::thread_rng();
        Ok([
            25.0 + rng.gen_range(-1.0..1.0),
            -8.0 + rng.gen_range(-1.0..1.0),
            40.0 + rng.gen_range(-1.0..1.0),
        ])
    }

    fn acceleration(&self) -> FswResult<[f64; 3]> {
        let mut rng = rand::thread_rng();
        Ok([0.0, 0.0, rng.gen_range(-0.002..0.002)])
    }

    fn temperature(&self) -> FswResult<f64> {
        Ok(24.0 + rand::thread_rng().gen_range(-2.0..2.0))
    }
}

/// Simulated analog front end
pub struct SimAdc;

impl Adc for SimAdc {
    fn pressure_psi(&self) -> FswResult<f64> {
        Ok(14.7 + rand::thread_rng().gen_range(-0.3..0.3))
    }

    fn thermocouple_celsius(&self) -> FswResult<f64> {
        Ok(21.0 + rand::thread_rng().gen_range(-1.0..1.0))
    }

    fn gyro_junction_celsius(&self) -> FswResult<f64> {
        Ok(23.0 + rand::thread_rng().gen_range(-1.0..1.0))
    }
}

/// Simulated RTC tracking host time
pub struct SimRtc;

impl Rtc for SimRtc {
    fn time(&self) -> FswResult<u64> {
        Ok(epoch_secs())
    }
}

/// Simulated radiation instrument with a small register file
pub struct SimInstrument {
    registers: Mutex<BTreeMap<u32, u32>>,
    powered: Mutex<bool>,
}

impl SimInstrument {
    pub fn new() -> Self {
        Self {
            registers: Mutex::new(BTreeMap::new()),
            powered: Mutex::new(true),
        }
    }
}

impl Default for SimInstrument {
    fn default() -> Self {
        Self::new()
    }
}

impl InstrumentManager for SimInstrument {
    fn write_register(&self, address: u32, value: u32) -> FswResult<()> {
        debug!("sim instrument: [{address:#06x}] <- {value:#010x}");
        self.registers.lock().unwrap().insert(address, value);
        Ok(())
    }

    fn read_register(&self, address: u32, size: u32) -> FswResult<Vec<u8>> {
        let value = self
            .registers
            .lock()
            .unwrap()
            .get(&address)
            .copied()
            .unwrap_or(0);
        let bytes = value.to_be_bytes();
        let take = (size as usize).min(bytes.len());
        Ok(bytes[bytes.len() - take..].to_vec())
    }

    fn power_on(&self) -> FswResult<()> {
        info!("sim instrument: power on");
        *self.powered.lock().unwrap() = true;
        Ok(())
    }

    fn power_off(&self) -> FswResult<()> {
        info!("sim instrument: power off");
        *self.powered.lock().unwrap() = false;
        Ok(())
    }

    fn reboot(&self) -> FswResult<()> {
        info!("sim instrument: reboot");
        self.registers.lock().unwrap().clear();
        Ok(())
    }

    fn process_rate_data(
        &self,
        t_start: f64,
        t_stop: f64,
        decimation_factor: u32,
    ) -> FswResult<()> {
        info!("sim instrument: rate data [{t_start}, {t_stop}] decimation {decimation_factor}");
        Ok(())
    }

    fn process_histograms(
        &self,
        t_start: f64,
        t_stop: f64,
        decimation_factor: u32,
    ) -> FswResult<()> {
        info!("sim instrument: histograms [{t_start}, {t_stop}] decimation {decimation_factor}");
        Ok(())
    }
}

/// Simulated flight computer platform statistics
pub struct SimPlatform {
    booted_at: u64,
}

impl SimPlatform {
    pub fn new() -> Self {
        Self {
            booted_at: epoch_secs(),
        }
    }
}

impl Default for SimPlatform {
    fn default() -> Self {
        Self::new()
    }
}

impl PlatformMonitor for SimPlatform {
    fn cpu_percent(&self) -> f64 {
        rand::thread_rng().gen_range(1.0..20.0)
    }

    fn ram_percent(&self) -> f64 {
        rand::thread_rng().gen_range(30.0..50.0)
    }

    fn disk_percent(&self) -> f64 {
        42.0
    }

    fn boot_time(&self) -> f64 {
        self.booted_at as f64
    }

    fn uptime_secs(&self) -> f64 {
        epoch_secs().saturating_sub(self.booted_at) as f64
    }

    fn temperature(&self) -> f64 {
        45.0 + rand::thread_rng().gen_range(-5.0..5.0)
    }
}

/// A full driver set backed by the simulators
pub fn simulated_drivers() -> DriverSet {
    DriverSet {
        power: Some(Arc::new(SimPowerSystem::new())),
        gyro: Some(Arc::new(SimGyro)),
        adc: Some(Arc::new(SimAdc)),
        rtc: Some(Arc::new(SimRtc)),
        instrument: Some(Arc::new(SimInstrument::new())),
        platform: Some(Arc::new(SimPlatform::new())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simulated_drivers_complete() {
        let drivers = simulated_drivers();
        assert!(drivers.power.is_some());
        assert!(drivers.gyro.is_some());
        assert!(drivers.adc.is_some());
        assert!(drivers.rtc.is_some());
        assert!(drivers.instrument.is_some());
        assert!(drivers.platform.is_some());
    }

    #[test]
    fn test_sim_housekeeping_in_range() {
        let power = SimPowerSystem::new();
        let hk = power.housekeeping().unwrap();
        assert!((7400..7500).contains(&hk.vbatt));
    }

    #[test]
    fn test_sim_power_rejects_bad_channel() {
        let power = SimPowerSystem::new();
        assert!(power.set_output(8, true, 0).is_err());
        assert!(power.set_output(3, true, 0).is_ok());
    }

    #[test]
    fn test_sim_instrument_register_roundtrip() {
        let instrument = SimInstrument::new();
        instrument.write_register(0x10, 0xDEAD_BEEF).unwrap();
        assert_eq!(
            instrument.read_register(0x10, 4).unwrap(),
            vec![0xDE, 0xAD, 0xBE, 0xEF]
        );
        assert_eq!(instrument.read_register(0x10, 2).unwrap(), vec![0xBE, 0xEF]);
    }
}
