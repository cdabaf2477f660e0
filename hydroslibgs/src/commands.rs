//! Command definitions for Hydros
//!
//! Commands are uplinked from ground to space as `(flight_mode_id,
//! command_id, args)` frames. Each supported operation is one variant of the
//! closed [`Command`] enum, owning a typed argument record parsed from the
//! uplinked argument map. There is no dispatch by name: an uplinked string
//! never resolves to a callable.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::CommandArgError;
use crate::types::ParamValue;

/// Argument map as carried by an uplink frame
pub type ArgMap = Map<String, Value>;

/// An uplinked command frame
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UplinkFrame {
    pub flight_mode_id: u32,
    pub command_id: u32,
    #[serde(default)]
    pub args: ArgMap,
}

/// Per-mode command ids. Id 0 is reserved in every mode for the manual
/// mode-switch signal and may not be reassigned.
pub mod ids {
    pub const SWITCH_MODE: u32 = 0;

    pub mod boot {
        pub const SEPARATION: u32 = 1;
    }

    pub mod normal {
        pub const RUN_OPNAV: u32 = 1;
        pub const SET_ELECTROLYSIS: u32 = 2;
        pub const SET_PARAMETER: u32 = 3;
        pub const CRITICAL_TELEM: u32 = 4;
        pub const BASIC_TELEM: u32 = 5;
        pub const DETAILED_TELEM: u32 = 6;
        pub const VERIFICATION: u32 = 7;
        pub const GET_PARAMETER: u32 = 8;
        pub const SET_OPNAV_INTERVAL: u32 = 9;
        pub const SCHEDULE_MANEUVER: u32 = 10;
        pub const ACS_PULSE_TIMING: u32 = 11;
        pub const INSTRUMENT_WRITE_REGISTER: u32 = 12;
        pub const INSTRUMENT_READ_REGISTER: u32 = 13;
        pub const INSTRUMENT_POWER_ON: u32 = 14;
        pub const INSTRUMENT_POWER_OFF: u32 = 15;
        pub const INSTRUMENT_REBOOT: u32 = 16;
        pub const INSTRUMENT_PROCESS_RATE_DATA: u32 = 17;
        pub const INSTRUMENT_PROCESS_HISTOGRAMS: u32 = 18;
    }

    pub mod low_battery {
        pub const EXIT_LOW_BATTERY_SAFETY: u32 = 1;
        pub const SET_EXIT_THRESHOLD: u32 = 2;
        pub const SET_PARAMETER: u32 = 3;
        pub const CRITICAL_TELEM: u32 = 4;
        pub const BASIC_TELEM: u32 = 5;
        pub const DETAILED_TELEM: u32 = 6;
    }

    pub mod safety {
        pub const EXIT_SAFETY: u32 = 1;
        pub const SET_PARAMETER: u32 = 2;
        pub const CRITICAL_TELEM: u32 = 3;
        pub const BASIC_TELEM: u32 = 4;
        pub const DETAILED_TELEM: u32 = 5;
    }

    pub mod test {
        pub const SEPARATION: u32 = 2;
        pub const ADC_CHECK: u32 = 4;
        pub const SEPARATION_TEST: u32 = 5;
        pub const POWER_OUTPUT_SET: u32 = 6;
        pub const COMMS_LINK_CHECK: u32 = 7;
    }

    pub mod command {
        pub const SET_PARAMETER: u32 = 1;
        pub const POWER_CYCLE: u32 = 2;
        pub const POWER_OUTPUT_SET: u32 = 3;
    }
}

// Typed accessors over the uplinked argument map. Every failure names the
// offending field so a rejection can be diagnosed from the logs alone.

fn require<'a>(args: &'a ArgMap, field: &str) -> Result<&'a Value, CommandArgError> {
    args.get(field)
        .ok_or_else(|| CommandArgError::missing(field))
}

fn require_bool(args: &ArgMap, field: &str) -> Result<bool, CommandArgError> {
    require(args, field)?
        .as_bool()
        .ok_or_else(|| CommandArgError::new(field, "must be a boolean"))
}

fn require_f64(args: &ArgMap, field: &str) -> Result<f64, CommandArgError> {
    require(args, field)?
        .as_f64()
        .ok_or_else(|| CommandArgError::new(field, "must be a number"))
}

fn require_u32(args: &ArgMap, field: &str) -> Result<u32, CommandArgError> {
    require(args, field)?
        .as_u64()
        .and_then(|v| u32::try_from(v).ok())
        .ok_or_else(|| CommandArgError::new(field, "must be a non-negative 32-bit integer"))
}

fn require_u16(args: &ArgMap, field: &str) -> Result<u16, CommandArgError> {
    require(args, field)?
        .as_u64()
        .and_then(|v| u16::try_from(v).ok())
        .ok_or_else(|| CommandArgError::new(field, "must be a non-negative 16-bit integer"))
}

fn require_u8(args: &ArgMap, field: &str) -> Result<u8, CommandArgError> {
    require(args, field)?
        .as_u64()
        .and_then(|v| u8::try_from(v).ok())
        .ok_or_else(|| CommandArgError::new(field, "must be a non-negative 8-bit integer"))
}

fn require_str(args: &ArgMap, field: &str) -> Result<String, CommandArgError> {
    require(args, field)?
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| CommandArgError::new(field, "must be a string"))
}

fn optional_bool(args: &ArgMap, field: &str, default: bool) -> Result<bool, CommandArgError> {
    match args.get(field) {
        None => Ok(default),
        Some(_) => require_bool(args, field),
    }
}

fn optional_u32(args: &ArgMap, field: &str, default: u32) -> Result<u32, CommandArgError> {
    match args.get(field) {
        None => Ok(default),
        Some(_) => require_u32(args, field),
    }
}

fn param_value(args: &ArgMap, field: &str) -> Result<ParamValue, CommandArgError> {
    match require(args, field)? {
        Value::Bool(v) => Ok(ParamValue::Bool(*v)),
        Value::Number(n) => {
            if let Some(v) = n.as_i64() {
                Ok(ParamValue::Int(v))
            } else if let Some(v) = n.as_f64() {
                Ok(ParamValue::Float(v))
            } else {
                Err(CommandArgError::new(field, "number out of range"))
            }
        }
        Value::String(v) => Ok(ParamValue::Text(v.clone())),
        _ => Err(CommandArgError::new(
            field,
            "must be a boolean, number, or string",
        )),
    }
}

/// Electrolyzer toggle arguments
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ElectrolysisArgs {
    pub state: bool,
    /// Actuation delay in whole seconds
    pub delay: u32,
}

impl ElectrolysisArgs {
    pub fn from_args(args: &ArgMap) -> Result<Self, CommandArgError> {
        Ok(Self {
            state: require_bool(args, "state")?,
            delay: optional_u32(args, "delay", 0)?,
        })
    }
}

/// Parameter mutation arguments
#[derive(Debug, Clone, PartialEq)]
pub struct SetParameterArgs {
    pub name: String,
    pub value: ParamValue,
    /// Persist the new value to the parameter snapshot
    pub hard_set: bool,
}

impl SetParameterArgs {
    pub fn from_args(args: &ArgMap) -> Result<Self, CommandArgError> {
        Ok(Self {
            name: require_str(args, "name")?,
            value: param_value(args, "value")?,
            hard_set: optional_bool(args, "hard_set", false)?,
        })
    }
}

/// Parameter readback arguments
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GetParameterArgs {
    pub name: String,
}

impl GetParameterArgs {
    pub fn from_args(args: &ArgMap) -> Result<Self, CommandArgError> {
        Ok(Self {
            name: require_str(args, "name")?,
        })
    }
}

/// Link-verification transmission arguments
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VerificationArgs {
    pub num_blocks: u32,
}

impl VerificationArgs {
    pub fn from_args(args: &ArgMap) -> Result<Self, CommandArgError> {
        Ok(Self {
            num_blocks: require_u32(args, "num_blocks")?,
        })
    }
}

/// Optical-navigation interval arguments, minutes
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OpNavIntervalArgs {
    pub interval: f64,
}

impl OpNavIntervalArgs {
    pub fn from_args(args: &ArgMap) -> Result<Self, CommandArgError> {
        let interval = require_f64(args, "interval")?;
        if interval <= 1.0 {
            return Err(CommandArgError::new(
                "interval",
                "must be greater than one minute",
            ));
        }
        Ok(Self { interval })
    }
}

/// Scheduled burn arguments. The start time is validated against the current
/// clock at dispatch time.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ManeuverArgs {
    /// Burn start, seconds since the UNIX epoch
    pub time: f64,
}

impl ManeuverArgs {
    pub fn from_args(args: &ArgMap) -> Result<Self, CommandArgError> {
        Ok(Self {
            time: require_f64(args, "time")?,
        })
    }
}

/// Attitude-control pulse schedule arguments. Start time is validated
/// against the current clock at dispatch time; the repeat count and pulse
/// spacing are non-negative by type.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PulseTimingArgs {
    /// Pulse train start, seconds since the UNIX epoch
    pub start: f64,
    /// Single pulse duration, milliseconds
    pub duration_ms: u32,
    /// Number of pulses
    pub count: u16,
    /// Spacing between pulses, milliseconds
    pub interval_ms: u16,
}

impl PulseTimingArgs {
    pub fn from_args(args: &ArgMap) -> Result<Self, CommandArgError> {
        let duration_ms = require_u32(args, "duration_ms")?;
        if duration_ms == 0 {
            return Err(CommandArgError::new(
                "duration_ms",
                "must be strictly positive",
            ));
        }
        Ok(Self {
            start: require_f64(args, "start")?,
            duration_ms,
            count: require_u16(args, "count")?,
            interval_ms: require_u16(args, "interval_ms")?,
        })
    }
}

/// Low-battery exit threshold arguments. The open-interval range check is
/// static; the comparison against the enter threshold happens at dispatch
/// time against the live parameter store.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExitThresholdArgs {
    pub value: f64,
}

impl ExitThresholdArgs {
    pub fn from_args(args: &ArgMap) -> Result<Self, CommandArgError> {
        let value = require_f64(args, "value")?;
        if !(value > 0.0 && value < 1.0) {
            return Err(CommandArgError::new(
                "value",
                "must be strictly between 0 and 1",
            ));
        }
        Ok(Self { value })
    }
}

/// Radiation-instrument register write arguments
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegisterWriteArgs {
    pub address: u32,
    pub value: u32,
}

impl RegisterWriteArgs {
    pub fn from_args(args: &ArgMap) -> Result<Self, CommandArgError> {
        Ok(Self {
            address: require_u32(args, "address")?,
            value: require_u32(args, "value")?,
        })
    }
}

/// Radiation-instrument register read arguments
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegisterReadArgs {
    pub address: u32,
    pub size: u32,
}

impl RegisterReadArgs {
    pub fn from_args(args: &ArgMap) -> Result<Self, CommandArgError> {
        Ok(Self {
            address: require_u32(args, "address")?,
            size: require_u32(args, "size")?,
        })
    }
}

/// Radiation-instrument data processing window
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InstrumentWindowArgs {
    pub t_start: f64,
    pub t_stop: f64,
    pub decimation_factor: u32,
}

impl InstrumentWindowArgs {
    pub fn from_args(args: &ArgMap) -> Result<Self, CommandArgError> {
        Ok(Self {
            t_start: require_f64(args, "t_start")?,
            t_stop: require_f64(args, "t_stop")?,
            decimation_factor: require_u32(args, "decimation_factor")?,
        })
    }
}

/// Power-system output channel arguments
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PowerOutputArgs {
    pub channel: u8,
    pub state: bool,
    /// Actuation delay in whole seconds
    pub delay: u32,
}

impl PowerOutputArgs {
    pub fn from_args(args: &ArgMap) -> Result<Self, CommandArgError> {
        Ok(Self {
            channel: require_u8(args, "channel")?,
            state: optional_bool(args, "state", false)?,
            delay: optional_u32(args, "delay", 0)?,
        })
    }
}

/// Power-system hard reset arguments. The passcode is validated by the
/// power-system driver, not by the dispatcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PowerCycleArgs {
    pub passcode: String,
}

impl PowerCycleArgs {
    pub fn from_args(args: &ArgMap) -> Result<Self, CommandArgError> {
        Ok(Self {
            passcode: require_str(args, "passcode")?,
        })
    }
}

/// Union of all uplinked operations. One variant per operation; each carries
/// its typed argument record.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Reserved id 0 in every mode: log-only operator-forced switch marker
    SwitchModeSignal,
    /// Fire the split burnwire
    Separation,
    /// Enqueue a request for OpNav mode
    RunOpNav,
    SetElectrolysis(ElectrolysisArgs),
    SetParameter(SetParameterArgs),
    GetParameter(GetParameterArgs),
    CriticalTelem,
    BasicTelem,
    DetailedTelem,
    Verification(VerificationArgs),
    SetOpNavInterval(OpNavIntervalArgs),
    ScheduleManeuver(ManeuverArgs),
    AcsPulseTiming(PulseTimingArgs),
    /// Replace the current mode with Normal
    ReturnToNormal,
    SetExitLowBatteryThreshold(ExitThresholdArgs),
    InstrumentWriteRegister(RegisterWriteArgs),
    InstrumentReadRegister(RegisterReadArgs),
    InstrumentPowerOn,
    InstrumentPowerOff,
    InstrumentReboot,
    InstrumentProcessRateData(InstrumentWindowArgs),
    InstrumentProcessHistograms(InstrumentWindowArgs),
    /// Log ADC readings for a ground sanity check
    AdcCheck,
    /// Burnwire actuation with concurrent gyro sampling
    SeparationTest,
    PowerOutputSet(PowerOutputArgs),
    /// Downlink current gyro rates as a link check
    CommsLinkCheck,
    PowerCycle(PowerCycleArgs),
}

impl Command {
    pub fn name(&self) -> &'static str {
        match self {
            Command::SwitchModeSignal => "switch_mode_signal",
            Command::Separation => "separation",
            Command::RunOpNav => "run_opnav",
            Command::SetElectrolysis(_) => "set_electrolysis",
            Command::SetParameter(_) => "set_parameter",
            Command::GetParameter(_) => "get_parameter",
            Command::CriticalTelem => "critical_telem",
            Command::BasicTelem => "basic_telem",
            Command::DetailedTelem => "detailed_telem",
            Command::Verification(_) => "verification",
            Command::SetOpNavInterval(_) => "set_opnav_interval",
            Command::ScheduleManeuver(_) => "schedule_maneuver",
            Command::AcsPulseTiming(_) => "acs_pulse_timing",
            Command::ReturnToNormal => "return_to_normal",
            Command::SetExitLowBatteryThreshold(_) => "set_exit_low_battery_threshold",
            Command::InstrumentWriteRegister(_) => "instrument_write_register",
            Command::InstrumentReadRegister(_) => "instrument_read_register",
            Command::InstrumentPowerOn => "instrument_power_on",
            Command::InstrumentPowerOff => "instrument_power_off",
            Command::InstrumentReboot => "instrument_reboot",
            Command::InstrumentProcessRateData(_) => "instrument_process_rate_data",
            Command::InstrumentProcessHistograms(_) => "instrument_process_histograms",
            Command::AdcCheck => "adc_check",
            Command::SeparationTest => "separation_test",
            Command::PowerOutputSet(_) => "power_output_set",
            Command::CommsLinkCheck => "comms_link_check",
            Command::PowerCycle(_) => "power_cycle",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn args(value: Value) -> ArgMap {
        match value {
            Value::Object(map) => map,
            _ => panic!("fixture must be a JSON object"),
        }
    }

    #[test]
    fn test_uplink_frame_default_args() {
        let frame: UplinkFrame =
            serde_json::from_str(r#"{"flight_mode_id": 2, "command_id": 5}"#).unwrap();
        assert_eq!(frame.flight_mode_id, 2);
        assert_eq!(frame.command_id, 5);
        assert!(frame.args.is_empty());
    }

    #[test]
    fn test_electrolysis_requires_boolean() {
        let err = ElectrolysisArgs::from_args(&args(json!({"state": 1}))).unwrap_err();
        assert_eq!(err.field, "state");

        let ok = ElectrolysisArgs::from_args(&args(json!({"state": true}))).unwrap();
        assert!(ok.state);
        assert_eq!(ok.delay, 0);
    }

    #[test]
    fn test_missing_field_names_field() {
        let err = SetParameterArgs::from_args(&args(json!({"value": 1.0}))).unwrap_err();
        assert_eq!(err.field, "name");
    }

    #[test]
    fn test_set_parameter_value_typing() {
        let parsed =
            SetParameterArgs::from_args(&args(json!({"name": "X", "value": 3, "hard_set": true})))
                .unwrap();
        assert_eq!(parsed.value, ParamValue::Int(3));
        assert!(parsed.hard_set);

        let parsed =
            SetParameterArgs::from_args(&args(json!({"name": "X", "value": 0.5}))).unwrap();
        assert_eq!(parsed.value, ParamValue::Float(0.5));
        assert!(!parsed.hard_set);
    }

    #[test]
    fn test_pulse_timing_rejects_zero_duration() {
        let err = PulseTimingArgs::from_args(&args(json!({
            "start": 1e9, "duration_ms": 0, "count": 4, "interval_ms": 100
        })))
        .unwrap_err();
        assert_eq!(err.field, "duration_ms");
    }

    #[test]
    fn test_pulse_timing_rejects_negative_count() {
        let err = PulseTimingArgs::from_args(&args(json!({
            "start": 1e9, "duration_ms": 50, "count": -1, "interval_ms": 100
        })))
        .unwrap_err();
        assert_eq!(err.field, "count");
    }

    #[test]
    fn test_exit_threshold_open_interval() {
        for bad in [0.0, 1.0, -0.2, 1.5] {
            let err = ExitThresholdArgs::from_args(&args(json!({ "value": bad }))).unwrap_err();
            assert_eq!(err.field, "value");
        }
        let ok = ExitThresholdArgs::from_args(&args(json!({"value": 0.25}))).unwrap();
        assert_eq!(ok.value, 0.25);
    }

    #[test]
    fn test_opnav_interval_lower_bound() {
        assert!(OpNavIntervalArgs::from_args(&args(json!({"interval": 1.0}))).is_err());
        assert!(OpNavIntervalArgs::from_args(&args(json!({"interval": 1.5}))).is_ok());
    }
}
