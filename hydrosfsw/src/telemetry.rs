//! Telemetry aggregation and validation
//!
//! The aggregator polls every sensor in a fixed total order, caching one
//! sample per sensor category plus a single shared poll timestamp. Packet
//! builders and the validation sweep force a fresh synchronous poll when the
//! cache is older than the staleness threshold; polling blocks the caller.

use log::{debug, error, warn};
use serde::Serialize;
use serde_json::{json, Map, Value};
use std::thread;
use std::time::Duration;

use hydroslibgs::{FswError, FswResult, SensorAnomaly, Timestamp};

use crate::config::constants::{
    BATTERY_FRACTION_RANGE, ELECTROLYZER_CHANNEL, PRESSURE_RANGE_PSI, TELEMETRY_STALENESS,
    THERMOCOUPLE_RANGE_C,
};
use crate::config::{P_GOM_VOLTAGE_MAX, P_GOM_VOLTAGE_MIN, P_MAX_GYRO_RATE};
use crate::drivers::{DriverSet, Housekeeping, WallClock};
use crate::params::ParameterStore;

/// Power-system sample with the derived state-of-charge fraction
#[derive(Debug, Clone, Copy, Default)]
pub struct PowerSample {
    pub hk: Housekeeping,
    pub battery_fraction: f64,
    pub electrolyzing: bool,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct GyroSample {
    /// Angular rates, rad/s
    pub rot: [f64; 3],
    /// Magnetic field, microtesla
    pub mag: [f64; 3],
    /// Linear acceleration, m/s^2
    pub acc: [f64; 3],
    /// Die temperature, degrees Celsius
    pub temp: f64,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct PressureSample {
    /// Fuel tank pressure, psi
    pub psi: f64,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ThermocoupleSample {
    /// Fuel tank temperature, degrees Celsius
    pub celsius: f64,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct PlatformSample {
    pub cpu_percent: f64,
    pub ram_percent: f64,
    pub disk_percent: f64,
    pub boot_time: f64,
    pub uptime_secs: f64,
    pub temp: f64,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct RtcSample {
    /// Seconds since the UNIX epoch
    pub time: u64,
}

/// Latest optical-navigation solution. Populated by the OpNav task, not by
/// the polling sweep.
#[derive(Debug, Clone, Copy, Default)]
pub struct OpNavSample {
    pub pos: [f64; 3],
    pub quat: [f64; 4],
    pub acq_time: f64,
}

/// Field names of the standard telemetry packet, in downlink order
pub const STANDARD_PACKET_FIELDS: [&str; 23] = [
    "rtc_time",
    "position_x",
    "position_y",
    "position_z",
    "attitude_1",
    "attitude_2",
    "attitude_3",
    "attitude_4",
    "hk_temp_1",
    "hk_temp_2",
    "hk_temp_3",
    "hk_temp_4",
    "gyro_temp",
    "thermo_temp",
    "curin_1",
    "curin_2",
    "curin_3",
    "vboost_1",
    "vboost_2",
    "vboost_3",
    "cursys",
    "vbatt",
    "prs_pressure",
];

/// The fixed-layout standard telemetry packet
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct StandardPacket {
    pub rtc_time: f64,
    pub position_x: f64,
    pub position_y: f64,
    pub position_z: f64,
    pub attitude_1: f64,
    pub attitude_2: f64,
    pub attitude_3: f64,
    pub attitude_4: f64,
    pub hk_temp_1: f64,
    pub hk_temp_2: f64,
    pub hk_temp_3: f64,
    pub hk_temp_4: f64,
    pub gyro_temp: f64,
    pub thermo_temp: f64,
    pub curin_1: f64,
    pub curin_2: f64,
    pub curin_3: f64,
    pub vboost_1: f64,
    pub vboost_2: f64,
    pub vboost_3: f64,
    pub cursys: f64,
    pub vbatt: f64,
    pub prs_pressure: f64,
}

impl StandardPacket {
    /// Ordered-list form, matching [`STANDARD_PACKET_FIELDS`]
    pub fn ordered(&self) -> [f64; 23] {
        [
            self.rtc_time,
            self.position_x,
            self.position_y,
            self.position_z,
            self.attitude_1,
            self.attitude_2,
            self.attitude_3,
            self.attitude_4,
            self.hk_temp_1,
            self.hk_temp_2,
            self.hk_temp_3,
            self.hk_temp_4,
            self.gyro_temp,
            self.thermo_temp,
            self.curin_1,
            self.curin_2,
            self.curin_3,
            self.vboost_1,
            self.vboost_2,
            self.vboost_3,
            self.cursys,
            self.vbatt,
            self.prs_pressure,
        ]
    }

    /// Named-mapping form. Built independently of [`Self::ordered`] so the
    /// two representations can be checked against each other.
    pub fn named(&self) -> Map<String, Value> {
        let mut map = Map::new();
        map.insert("rtc_time".into(), json!(self.rtc_time));
        map.insert("position_x".into(), json!(self.position_x));
        map.insert("position_y".into(), json!(self.position_y));
        map.insert("position_z".into(), json!(self.position_z));
        map.insert("attitude_1".into(), json!(self.attitude_1));
        map.insert("attitude_2".into(), json!(self.attitude_2));
        map.insert("attitude_3".into(), json!(self.attitude_3));
        map.insert("attitude_4".into(), json!(self.attitude_4));
        map.insert("hk_temp_1".into(), json!(self.hk_temp_1));
        map.insert("hk_temp_2".into(), json!(self.hk_temp_2));
        map.insert("hk_temp_3".into(), json!(self.hk_temp_3));
        map.insert("hk_temp_4".into(), json!(self.hk_temp_4));
        map.insert("gyro_temp".into(), json!(self.gyro_temp));
        map.insert("thermo_temp".into(), json!(self.thermo_temp));
        map.insert("curin_1".into(), json!(self.curin_1));
        map.insert("curin_2".into(), json!(self.curin_2));
        map.insert("curin_3".into(), json!(self.curin_3));
        map.insert("vboost_1".into(), json!(self.vboost_1));
        map.insert("vboost_2".into(), json!(self.vboost_2));
        map.insert("vboost_3".into(), json!(self.vboost_3));
        map.insert("cursys".into(), json!(self.cursys));
        map.insert("vbatt".into(), json!(self.vbatt));
        map.insert("prs_pressure".into(), json!(self.prs_pressure));
        map
    }
}

/// Cached sensor samples plus the shared poll timestamp
pub struct TelemetryAggregator {
    power: PowerSample,
    gyro: GyroSample,
    pressure: PressureSample,
    thermocouple: ThermocoupleSample,
    platform: PlatformSample,
    rtc: RtcSample,
    opnav: OpNavSample,
    last_poll: Option<Timestamp>,
}

impl TelemetryAggregator {
    pub fn new() -> Self {
        Self {
            power: PowerSample::default(),
            gyro: GyroSample::default(),
            pressure: PressureSample::default(),
            thermocouple: ThermocoupleSample::default(),
            platform: PlatformSample::default(),
            rtc: RtcSample::default(),
            opnav: OpNavSample::default(),
            last_poll: None,
        }
    }

    pub fn last_poll(&self) -> Option<Timestamp> {
        self.last_poll
    }

    pub fn power(&self) -> PowerSample {
        self.power
    }

    pub fn gyro(&self) -> GyroSample {
        self.gyro
    }

    pub fn pressure(&self) -> PressureSample {
        self.pressure
    }

    pub fn thermocouple(&self) -> ThermocoupleSample {
        self.thermocouple
    }

    pub fn platform(&self) -> PlatformSample {
        self.platform
    }

    pub fn rtc(&self) -> RtcSample {
        self.rtc
    }

    pub fn opnav(&self) -> OpNavSample {
        self.opnav
    }

    /// Record a new optical-navigation solution
    pub fn update_opnav(&mut self, sample: OpNavSample) {
        self.opnav = sample;
    }

    /// Poll every registered sensor, in fixed order, replacing each cached
    /// sample wholesale and advancing the shared poll timestamp. Missing
    /// drivers keep their previous sample; a failing driver is logged and
    /// likewise keeps its previous sample.
    pub fn poll(
        &mut self,
        params: &ParameterStore,
        drivers: &DriverSet,
        clock: &dyn WallClock,
    ) -> FswResult<()> {
        if let Some(power) = &drivers.power {
            match power.housekeeping() {
                Ok(hk) => {
                    let vmin = params.get_f64(P_GOM_VOLTAGE_MIN)?;
                    let vmax = params.get_f64(P_GOM_VOLTAGE_MAX)?;
                    let fraction = (f64::from(hk.vbatt) - vmin) / (vmax - vmin);
                    self.power = PowerSample {
                        hk,
                        battery_fraction: fraction,
                        electrolyzing: hk.outputs[ELECTROLYZER_CHANNEL as usize],
                    };
                }
                Err(e) => warn!("power housekeeping poll failed: {e}"),
            }
        } else {
            debug!("power system driver unavailable; keeping previous sample");
        }

        if let Some(gyro) = &drivers.gyro {
            let polled = gyro.rates().and_then(|rot| {
                Ok(GyroSample {
                    rot,
                    mag: gyro.magnetometer()?,
                    acc: gyro.acceleration()?,
                    temp: gyro.temperature()?,
                })
            });
            match polled {
                Ok(sample) => self.gyro = sample,
                Err(e) => warn!("gyro poll failed: {e}"),
            }
        } else {
            debug!("gyro driver unavailable; keeping previous sample");
        }

        if let Some(adc) = &drivers.adc {
            match adc.pressure_psi() {
                Ok(psi) => self.pressure = PressureSample { psi },
                Err(e) => warn!("pressure poll failed: {e}"),
            }
            match adc.thermocouple_celsius() {
                Ok(celsius) => self.thermocouple = ThermocoupleSample { celsius },
                Err(e) => warn!("thermocouple poll failed: {e}"),
            }
        } else {
            debug!("adc driver unavailable; keeping previous samples");
        }

        if let Some(platform) = &drivers.platform {
            self.platform = PlatformSample {
                cpu_percent: platform.cpu_percent(),
                ram_percent: platform.ram_percent(),
                disk_percent: platform.disk_percent(),
                boot_time: platform.boot_time(),
                uptime_secs: platform.uptime_secs(),
                temp: platform.temperature(),
            };
        } else {
            debug!("platform monitor unavailable; keeping previous sample");
        }

        if let Some(rtc) = &drivers.rtc {
            match rtc.time() {
                Ok(time) => self.rtc = RtcSample { time },
                Err(e) => warn!("rtc poll failed: {e}"),
            }
        } else {
            debug!("rtc driver unavailable; keeping previous sample");
        }

        self.last_poll = Some(clock.now());
        Ok(())
    }

    fn is_stale(&self, clock: &dyn WallClock) -> bool {
        match self.last_poll {
            None => true,
            Some(last) => {
                let age = clock.now().as_secs_f64() - last.as_secs_f64();
                age > TELEMETRY_STALENESS.as_secs_f64()
            }
        }
    }

    /// Re-poll synchronously when the cache has gone stale
    pub fn ensure_fresh(
        &mut self,
        params: &ParameterStore,
        drivers: &DriverSet,
        clock: &dyn WallClock,
    ) -> FswResult<()> {
        if self.is_stale(clock) {
            debug!("telemetry cache stale; forcing synchronous poll");
            self.poll(params, drivers, clock)?;
        }
        Ok(())
    }

    /// Sweep the cached samples against the fixed sanity bounds. The sweep
    /// stops at the first violation and returns its typed anomaly; deciding
    /// any resulting mode transition is the caller's responsibility.
    pub fn sensor_check(
        &mut self,
        params: &ParameterStore,
        drivers: &DriverSet,
        clock: &dyn WallClock,
    ) -> FswResult<()> {
        self.ensure_fresh(params, drivers, clock)?;

        let limit = params.get_f64(P_MAX_GYRO_RATE)?;
        let [x, y, z] = self.gyro.rot;
        if x.abs() > limit || y.abs() > limit || z.abs() > limit {
            error!("gyro rates ({x}, {y}, {z}) rad/s exceed limit {limit}");
            return Err(SensorAnomaly::Gyro { x, y, z, limit }.into());
        }

        let psi = self.pressure.psi;
        if psi < PRESSURE_RANGE_PSI.0 || psi > PRESSURE_RANGE_PSI.1 {
            error!("pressure sensor reading {psi} psi out of range");
            return Err(SensorAnomaly::Pressure { value: psi }.into());
        }

        let celsius = self.thermocouple.celsius;
        if celsius < THERMOCOUPLE_RANGE_C.0 || celsius > THERMOCOUPLE_RANGE_C.1 {
            error!("thermocouple reading {celsius} degC out of range");
            return Err(SensorAnomaly::Thermal { value: celsius }.into());
        }

        let fraction = self.power.battery_fraction;
        if fraction < BATTERY_FRACTION_RANGE.0 || fraction > BATTERY_FRACTION_RANGE.1 {
            error!("battery fraction {fraction} out of range");
            return Err(SensorAnomaly::Power { value: fraction }.into());
        }

        let platform_fields = [
            ("cpu_percent", self.platform.cpu_percent),
            ("ram_percent", self.platform.ram_percent),
            ("disk_percent", self.platform.disk_percent),
            ("boot_time", self.platform.boot_time),
            ("uptime_secs", self.platform.uptime_secs),
            ("temp", self.platform.temp),
        ];
        for (field, value) in platform_fields {
            if value < 0.0 {
                error!("platform statistic {field} negative: {value}");
                return Err(SensorAnomaly::Platform { field, value }.into());
            }
        }

        Ok(())
    }

    /// Build the standard telemetry packet, re-polling first if the cache is
    /// stale
    pub fn standard_packet(
        &mut self,
        params: &ParameterStore,
        drivers: &DriverSet,
        clock: &dyn WallClock,
    ) -> FswResult<StandardPacket> {
        self.ensure_fresh(params, drivers, clock)?;

        let hk = self.power.hk;
        Ok(StandardPacket {
            rtc_time: self.rtc.time as f64,
            position_x: self.opnav.pos[0],
            position_y: self.opnav.pos[1],
            position_z: self.opnav.pos[2],
            attitude_1: self.opnav.quat[0],
            attitude_2: self.opnav.quat[1],
            attitude_3: self.opnav.quat[2],
            attitude_4: self.opnav.quat[3],
            hk_temp_1: f64::from(hk.temp[0]),
            hk_temp_2: f64::from(hk.temp[1]),
            hk_temp_3: f64::from(hk.temp[2]),
            hk_temp_4: f64::from(hk.temp[3]),
            gyro_temp: self.gyro.temp,
            thermo_temp: self.thermocouple.celsius,
            curin_1: f64::from(hk.curin[0]),
            curin_2: f64::from(hk.curin[1]),
            curin_3: f64::from(hk.curin[2]),
            vboost_1: f64::from(hk.vboost[0]),
            vboost_2: f64::from(hk.vboost[1]),
            vboost_3: f64::from(hk.vboost[2]),
            cursys: f64::from(hk.cursys),
            vbatt: f64::from(hk.vbatt),
            prs_pressure: self.pressure.psi,
        })
    }

    /// Minimal power-oriented packet for low-power downlink windows
    pub fn critical_packet(&self) -> Map<String, Value> {
        let hk = self.power.hk;
        let curin_total: u32 = hk.curin.iter().map(|&c| u32::from(c)).sum();
        let mut map = Map::new();
        map.insert(
            "battery_fraction".into(),
            json!(self.power.battery_fraction),
        );
        map.insert("vbatt".into(), json!(hk.vbatt));
        map.insert("cursys".into(), json!(hk.cursys));
        map.insert("curin_total".into(), json!(curin_total));
        map
    }

    /// Everything the standard packet carries plus rates, platform
    /// statistics, and propulsion state
    pub fn detailed_packet(
        &mut self,
        params: &ParameterStore,
        drivers: &DriverSet,
        clock: &dyn WallClock,
    ) -> FswResult<Map<String, Value>> {
        let mut map = self.standard_packet(params, drivers, clock)?.named();
        map.insert("gyro_rate_x".into(), json!(self.gyro.rot[0]));
        map.insert("gyro_rate_y".into(), json!(self.gyro.rot[1]));
        map.insert("gyro_rate_z".into(), json!(self.gyro.rot[2]));
        map.insert("gyro_mag_x".into(), json!(self.gyro.mag[0]));
        map.insert("gyro_mag_y".into(), json!(self.gyro.mag[1]));
        map.insert("gyro_mag_z".into(), json!(self.gyro.mag[2]));
        map.insert("gyro_acc_x".into(), json!(self.gyro.acc[0]));
        map.insert("gyro_acc_y".into(), json!(self.gyro.acc[1]));
        map.insert("gyro_acc_z".into(), json!(self.gyro.acc[2]));
        map.insert("platform_cpu".into(), json!(self.platform.cpu_percent));
        map.insert("platform_ram".into(), json!(self.platform.ram_percent));
        map.insert("platform_disk".into(), json!(self.platform.disk_percent));
        map.insert("platform_uptime".into(), json!(self.platform.uptime_secs));
        map.insert(
            "battery_fraction".into(),
            json!(self.power.battery_fraction),
        );
        map.insert("electrolyzing".into(), json!(self.power.electrolyzing));
        Ok(map)
    }

    /// Resample the gyro at `freq_hz` for `duration_s` and return per-axis
    /// rates smoothed with a trailing moving average of `window` samples.
    /// Blocks the caller for the whole sampling window.
    pub fn poll_smoothed(
        &self,
        drivers: &DriverSet,
        freq_hz: f64,
        duration_s: f64,
        window: usize,
    ) -> FswResult<[f64; 3]> {
        let gyro = drivers
            .gyro
            .as_ref()
            .ok_or(FswError::DriverUnavailable("gyro"))?;

        let count = ((freq_hz * duration_s).ceil() as usize).max(1);
        let period = Duration::from_secs_f64(1.0 / freq_hz.max(1.0));

        let mut samples = Vec::with_capacity(count);
        for _ in 0..count {
            match gyro.rates() {
                Ok(rot) => samples.push(rot),
                Err(e) => warn!("gyro sample dropped: {e}"),
            }
            thread::sleep(period);
        }

        if samples.is_empty() {
            return Err(FswError::Task("no gyro samples collected".to_string()));
        }

        let window = window.clamp(1, samples.len());
        let tail = &samples[samples.len() - window..];
        let mut smoothed = [0.0f64; 3];
        for sample in tail {
            for (axis, value) in sample.iter().enumerate() {
                smoothed[axis] += value;
            }
        }
        for value in &mut smoothed {
            *value /= window as f64;
        }
        Ok(smoothed)
    }
}

impl Default for TelemetryAggregator {
    fn default() -> Self {
        Self::new()
    }
}
