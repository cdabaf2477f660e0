//! Shared test fixtures: pinned clock, deterministic drivers, and a
//! pre-wired flight context

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use hydroslibgs::{FlightMode, FswResult, Timestamp};

use crate::context::{FswContext, ModeQueue};
use crate::drivers::{
    Adc, DriverSet, Gyro, Housekeeping, InstrumentManager, PlatformMonitor, PowerSystem, Rtc,
    WallClock,
};
use crate::params::ParameterStore;

/// A clock pinned to one instant
pub struct FixedClock {
    timestamp: Timestamp,
}

impl FixedClock {
    pub fn at(seconds: f64) -> Self {
        Self {
            timestamp: Timestamp::from_secs_f64(seconds),
        }
    }
}

impl WallClock for FixedClock {
    fn now(&self) -> Timestamp {
        self.timestamp
    }
}

/// Power system returning fixed housekeeping and recording every actuation
pub struct StaticPower {
    calls: Mutex<Vec<String>>,
}

impl StaticPower {
    pub fn new() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }

    pub fn fixture_housekeeping() -> Housekeeping {
        Housekeeping {
            vboost: [5000, 5010, 5020],
            vbatt: 7200,
            curin: [100, 110, 120],
            cursun: 250,
            cursys: 300,
            curout: [10, 0, 0, 0, 0, 0],
            outputs: [false; 8],
            temp: [20, 21, 22, 23],
            battmode: 1,
            counter_boot: 5,
        }
    }
}

impl PowerSystem for StaticPower {
    fn housekeeping(&self) -> FswResult<Housekeeping> {
        Ok(Self::fixture_housekeeping())
    }

    fn set_output(&self, channel: u8, on: bool, delay_s: u32) -> FswResult<()> {
        self.record(format!("set_output({channel}, {on}, {delay_s})"));
        Ok(())
    }

    fn set_electrolysis(&self, on: bool, delay_s: u32) -> FswResult<()> {
        self.record(format!("set_electrolysis({on}, {delay_s})"));
        Ok(())
    }

    fn fire_burnwire(&self, duration_s: f64) -> FswResult<()> {
        self.record(format!("fire_burnwire({duration_s})"));
        Ok(())
    }

    fn hard_reset(&self, passcode: &str) -> FswResult<()> {
        self.record(format!("hard_reset({passcode})"));
        Ok(())
    }
}

/// Gyro returning constant values
pub struct StaticGyro {
    rates: [f64; 3],
    temp: f64,
}

impl StaticGyro {
    pub fn new() -> Self {
        Self::with_rates([0.01, -0.02, 0.005])
    }

    pub fn with_rates(rates: [f64; 3]) -> Self {
        Self { rates, temp: 24.0 }
    }
}

impl Gyro for StaticGyro {
    fn rates(&self) -> FswResult<[f64; 3]> {
        Ok(self.rates)
    }

    fn magnetometer(&self) -> FswResult<[f64; 3]> {
        Ok([12.0, -7.5, 30.0])
    }

    fn acceleration(&self) -> FswResult<[f64; 3]> {
        Ok([0.0, 0.0, 0.002])
    }

    fn temperature(&self) -> FswResult<f64> {
        Ok(self.temp)
    }
}

/// Gyro counting how often its rates were read
pub struct CountingGyro {
    polls: AtomicUsize,
}

impl CountingGyro {
    pub fn new() -> Self {
        Self {
            polls: AtomicUsize::new(0),
        }
    }

    pub fn polls(&self) -> usize {
        self.polls.load(Ordering::SeqCst)
    }
}

impl Gyro for CountingGyro {
    fn rates(&self) -> FswResult<[f64; 3]> {
        self.polls.fetch_add(1, Ordering::SeqCst);
        Ok([0.0, 0.0, 0.0])
    }

    fn magnetometer(&self) -> FswResult<[f64; 3]> {
        Ok([0.0, 0.0, 0.0])
    }

    fn acceleration(&self) -> FswResult<[f64; 3]> {
        Ok([0.0, 0.0, 0.0])
    }

    fn temperature(&self) -> FswResult<f64> {
        Ok(25.0)
    }
}

pub struct StaticAdc;

impl Adc for StaticAdc {
    fn pressure_psi(&self) -> FswResult<f64> {
        Ok(14.7)
    }

    fn thermocouple_celsius(&self) -> FswResult<f64> {
        Ok(21.5)
    }

    fn gyro_junction_celsius(&self) -> FswResult<f64> {
        Ok(23.0)
    }
}

pub struct StaticRtc;

impl Rtc for StaticRtc {
    fn time(&self) -> FswResult<u64> {
        Ok(1_000_000_000)
    }
}

pub struct StaticPlatform;

impl PlatformMonitor for StaticPlatform {
    fn cpu_percent(&self) -> f64 {
        5.0
    }

    fn ram_percent(&self) -> f64 {
        40.0
    }

    fn disk_percent(&self) -> f64 {
        60.0
    }

    fn boot_time(&self) -> f64 {
        999_000_000.0
    }

    fn uptime_secs(&self) -> f64 {
        3600.0
    }

    fn temperature(&self) -> f64 {
        45.0
    }
}

/// Instrument manager recording every operation
pub struct RecordingInstrument {
    ops: Mutex<Vec<String>>,
}

impl RecordingInstrument {
    pub fn new() -> Self {
        Self {
            ops: Mutex::new(Vec::new()),
        }
    }

    pub fn ops(&self) -> Vec<String> {
        self.ops.lock().unwrap().clone()
    }

    fn record(&self, op: String) {
        self.ops.lock().unwrap().push(op);
    }
}

impl InstrumentManager for RecordingInstrument {
    fn write_register(&self, address: u32, value: u32) -> FswResult<()> {
        self.record(format!("write_register({address}, {value})"));
        Ok(())
    }

    fn read_register(&self, address: u32, size: u32) -> FswResult<Vec<u8>> {
        self.record(format!("read_register({address}, {size})"));
        Ok(vec![0xAB; size as usize])
    }

    fn power_on(&self) -> FswResult<()> {
        self.record("power_on".to_string());
        Ok(())
    }

    fn power_off(&self) -> FswResult<()> {
        self.record("power_off".to_string());
        Ok(())
    }

    fn reboot(&self) -> FswResult<()> {
        self.record("reboot".to_string());
        Ok(())
    }

    fn process_rate_data(
        &self,
        t_start: f64,
        t_stop: f64,
        decimation_factor: u32,
    ) -> FswResult<()> {
        self.record(format!(
            "process_rate_data({t_start}, {t_stop}, {decimation_factor})"
        ));
        Ok(())
    }

    fn process_histograms(
        &self,
        t_start: f64,
        t_stop: f64,
        decimation_factor: u32,
    ) -> FswResult<()> {
        self.record(format!(
            "process_histograms({t_start}, {t_stop}, {decimation_factor})"
        ));
        Ok(())
    }
}

/// A driver set backed entirely by deterministic fixtures
pub fn static_drivers() -> DriverSet {
    DriverSet {
        power: Some(Arc::new(StaticPower::new())),
        gyro: Some(Arc::new(StaticGyro::new())),
        adc: Some(Arc::new(StaticAdc)),
        rtc: Some(Arc::new(StaticRtc)),
        instrument: Some(Arc::new(RecordingInstrument::new())),
        platform: Some(Arc::new(StaticPlatform)),
    }
}

/// A flight context wired to fixtures, with handles kept for inspection
pub struct TestHarness {
    pub ctx: FswContext,
    pub modes: Arc<ModeQueue>,
    pub power: Arc<StaticPower>,
    pub instrument: Arc<RecordingInstrument>,
}

pub fn test_harness() -> TestHarness {
    let power = Arc::new(StaticPower::new());
    let instrument = Arc::new(RecordingInstrument::new());
    let mut drivers = static_drivers();
    drivers.power = Some(power.clone());
    drivers.instrument = Some(instrument.clone());

    let modes = Arc::new(ModeQueue::new(FlightMode::Normal));
    let ctx = FswContext::new(ParameterStore::in_memory(), drivers, modes.clone())
        .with_clock(Arc::new(FixedClock::at(1_000_000.0)));

    TestHarness {
        ctx,
        modes,
        power,
        instrument,
    }
}
