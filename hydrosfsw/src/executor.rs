//! Command executor
//!
//! Resolves an uplinked `(mode, id, args)` tuple through the registry,
//! validates the arguments, and runs the handler. The executor is pure
//! dispatch: side effects (parameter mutation, downlink acknowledgments,
//! driver actuation) are the business of the individual handlers. Commands
//! run one at a time to completion; the only internal concurrency is the
//! separation test's bounded sampling thread, which is joined before the
//! handler returns.

use log::{debug, error, info};
use serde::Serialize;
use serde_json::{json, Map, Value};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use hydroslibgs::{
    ArgMap, Command, CommandArgError, ElectrolysisArgs, ExitThresholdArgs, FlightMode, FswError,
    FswResult, GetParameterArgs, InstrumentWindowArgs, ManeuverArgs, OpNavIntervalArgs,
    ParamValue, PowerCycleArgs, PowerOutputArgs, PulseTimingArgs, RegisterReadArgs,
    RegisterWriteArgs, SetParameterArgs, VerificationArgs,
};

use crate::config::constants::TEAM_IDENTIFIER;
use crate::config::{
    P_ENTER_LOW_BATTERY_THRESHOLD, P_EXIT_LOW_BATTERY_THRESHOLD, P_OPNAV_INTERVAL,
    P_SCHEDULED_BURN_TIME, P_SEPARATION_GYRO_DURATION, P_SEPARATION_GYRO_FREQ,
    P_SPLIT_BURNWIRE_DURATION,
};
use crate::context::FswContext;
use crate::drivers::{Adc, Gyro, InstrumentManager, PowerSystem};
use crate::registry::CommandRegistry;
use crate::telemetry::StandardPacket;
use crate::verification::VerificationEncoder;

/// Value returned to the caller of a successfully executed command
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum CommandOutput {
    None,
    Parameter { name: String, value: ParamValue },
    TelemetryPacket(StandardPacket),
    TelemetryFields(Map<String, Value>),
    VerificationHex(String),
    RegisterData(Vec<u8>),
    SeparationReport { samples: usize, mean_rates: [f64; 3] },
}

/// Command executor state
pub struct CommandExecutor {
    registry: CommandRegistry,
}

impl CommandExecutor {
    pub fn new(registry: CommandRegistry) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &CommandRegistry {
        &self.registry
    }

    /// Execute one uplinked command. Lookup and argument failures are
    /// logged here, at the dispatch boundary, and reported as failure
    /// results; they never escape as panics.
    pub fn execute(
        &self,
        ctx: &mut FswContext,
        mode: FlightMode,
        id: u32,
        args: &ArgMap,
    ) -> FswResult<CommandOutput> {
        let Some(spec) = self.registry.lookup(mode, id) else {
            error!("command {id} not found in {mode} table");
            return Err(FswError::CommandNotFound { mode, id });
        };

        let command = match (spec.parse)(args) {
            Ok(command) => command,
            Err(e) => {
                error!("{mode} command {id} ({}) rejected: {e}", spec.name);
                return Err(e.into());
            }
        };

        debug!("dispatching {} in {mode}", command.name());
        match self.dispatch(ctx, mode, id, command) {
            Ok(output) => Ok(output),
            Err(e) => {
                error!("{mode} command {id} failed: {e}");
                Err(e)
            }
        }
    }

    fn dispatch(
        &self,
        ctx: &mut FswContext,
        mode: FlightMode,
        id: u32,
        command: Command,
    ) -> FswResult<CommandOutput> {
        match command {
            Command::SwitchModeSignal => self.handle_switch_signal(mode),
            Command::Separation => self.handle_separation(ctx),
            Command::RunOpNav => self.handle_run_opnav(ctx),
            Command::SetElectrolysis(args) => self.handle_set_electrolysis(ctx, args),
            Command::SetParameter(args) => self.handle_set_parameter(ctx, mode, id, args),
            Command::GetParameter(args) => self.handle_get_parameter(ctx, args),
            Command::CriticalTelem => self.handle_critical_telem(ctx),
            Command::BasicTelem => self.handle_basic_telem(ctx),
            Command::DetailedTelem => self.handle_detailed_telem(ctx),
            Command::Verification(args) => self.handle_verification(ctx, args),
            Command::SetOpNavInterval(args) => {
                self.handle_set_opnav_interval(ctx, mode, id, args)
            }
            Command::ScheduleManeuver(args) => {
                self.handle_schedule_maneuver(ctx, mode, id, args)
            }
            Command::AcsPulseTiming(args) => self.handle_acs_pulse_timing(ctx, args),
            Command::ReturnToNormal => self.handle_return_to_normal(ctx),
            Command::SetExitLowBatteryThreshold(args) => {
                self.handle_set_exit_threshold(ctx, mode, id, args)
            }
            Command::InstrumentWriteRegister(args) => {
                self.handle_instrument_write_register(ctx, args)
            }
            Command::InstrumentReadRegister(args) => {
                self.handle_instrument_read_register(ctx, args)
            }
            Command::InstrumentPowerOn => self.handle_instrument_power_on(ctx),
            Command::InstrumentPowerOff => self.handle_instrument_power_off(ctx),
            Command::InstrumentReboot => self.handle_instrument_reboot(ctx),
            Command::InstrumentProcessRateData(args) => {
                self.handle_instrument_process_rate_data(ctx, args)
            }
            Command::InstrumentProcessHistograms(args) => {
                self.handle_instrument_process_histograms(ctx, args)
            }
            Command::AdcCheck => self.handle_adc_check(ctx),
            Command::SeparationTest => self.handle_separation_test(ctx, mode, id),
            Command::PowerOutputSet(args) => self.handle_power_output_set(ctx, args),
            Command::CommsLinkCheck => self.handle_comms_link_check(ctx, mode, id),
            Command::PowerCycle(args) => self.handle_power_cycle(ctx, args),
        }
    }

    /// Reserved id 0: the operator forced a mode switch through the mode
    /// controller. Only a log marker; the switch itself is not ours.
    fn handle_switch_signal(&self, mode: FlightMode) -> FswResult<CommandOutput> {
        error!("manual flight mode switch commanded ({mode} table)");
        Ok(CommandOutput::None)
    }

    fn handle_separation(&self, ctx: &mut FswContext) -> FswResult<CommandOutput> {
        let power = require_power(ctx)?;
        let duration = ctx.params.get_f64(P_SPLIT_BURNWIRE_DURATION)?;
        info!("firing split burnwire for {duration}s");
        power.fire_burnwire(duration)?;
        Ok(CommandOutput::None)
    }

    fn handle_run_opnav(&self, ctx: &mut FswContext) -> FswResult<CommandOutput> {
        info!("queueing an optical navigation run");
        ctx.mode_control.request_mode(FlightMode::OpNav);
        Ok(CommandOutput::None)
    }

    fn handle_set_electrolysis(
        &self,
        ctx: &mut FswContext,
        args: ElectrolysisArgs,
    ) -> FswResult<CommandOutput> {
        let power = require_power(ctx)?;
        info!(
            "setting electrolysis {} (delay {}s)",
            if args.state { "on" } else { "off" },
            args.delay
        );
        power.set_electrolysis(args.state, args.delay)?;
        Ok(CommandOutput::None)
    }

    fn handle_set_parameter(
        &self,
        ctx: &mut FswContext,
        mode: FlightMode,
        id: u32,
        args: SetParameterArgs,
    ) -> FswResult<CommandOutput> {
        let previous = ctx
            .params
            .set(&args.name, args.value.clone(), args.hard_set)?;
        info!(
            "changed parameter {} from {previous} to {}{}",
            args.name,
            args.value,
            if args.hard_set { " (persisted)" } else { "" }
        );
        ctx.downlink.enqueue(mode, id, true);
        Ok(CommandOutput::None)
    }

    fn handle_get_parameter(
        &self,
        ctx: &mut FswContext,
        args: GetParameterArgs,
    ) -> FswResult<CommandOutput> {
        let value = ctx.params.get(&args.name)?;
        info!("parameter {} = {value}", args.name);
        Ok(CommandOutput::Parameter {
            name: args.name,
            value,
        })
    }

    fn handle_critical_telem(&self, ctx: &mut FswContext) -> FswResult<CommandOutput> {
        ctx.telemetry
            .ensure_fresh(&ctx.params, &ctx.drivers, &*ctx.clock)?;
        Ok(CommandOutput::TelemetryFields(ctx.telemetry.critical_packet()))
    }

    fn handle_basic_telem(&self, ctx: &mut FswContext) -> FswResult<CommandOutput> {
        let packet = ctx
            .telemetry
            .standard_packet(&ctx.params, &ctx.drivers, &*ctx.clock)?;
        Ok(CommandOutput::TelemetryPacket(packet))
    }

    fn handle_detailed_telem(&self, ctx: &mut FswContext) -> FswResult<CommandOutput> {
        let fields = ctx
            .telemetry
            .detailed_packet(&ctx.params, &ctx.drivers, &*ctx.clock)?;
        Ok(CommandOutput::TelemetryFields(fields))
    }

    fn handle_verification(
        &self,
        ctx: &mut FswContext,
        args: VerificationArgs,
    ) -> FswResult<CommandOutput> {
        let encoder = VerificationEncoder::new(TEAM_IDENTIFIER);
        let hex = encoder.encode(args.num_blocks, &*ctx.clock);
        info!(
            "encoded {} verification blocks ({} hex chars)",
            args.num_blocks,
            hex.len()
        );
        Ok(CommandOutput::VerificationHex(hex))
    }

    fn handle_set_opnav_interval(
        &self,
        ctx: &mut FswContext,
        mode: FlightMode,
        id: u32,
        args: OpNavIntervalArgs,
    ) -> FswResult<CommandOutput> {
        self.handle_set_parameter(
            ctx,
            mode,
            id,
            SetParameterArgs {
                name: P_OPNAV_INTERVAL.to_string(),
                value: ParamValue::Float(args.interval),
                hard_set: false,
            },
        )
    }

    fn handle_schedule_maneuver(
        &self,
        ctx: &mut FswContext,
        mode: FlightMode,
        id: u32,
        args: ManeuverArgs,
    ) -> FswResult<CommandOutput> {
        let now = ctx.clock.now().as_secs_f64();
        if args.time <= now {
            return Err(CommandArgError::new(
                "time",
                format!("burn time {} is not after current time {now}", args.time),
            )
            .into());
        }
        info!("scheduling a maneuver burn at {}", args.time);
        self.handle_set_parameter(
            ctx,
            mode,
            id,
            SetParameterArgs {
                name: P_SCHEDULED_BURN_TIME.to_string(),
                value: ParamValue::Float(args.time),
                hard_set: true,
            },
        )?;
        ctx.mode_control.request_mode(FlightMode::Maneuver);
        Ok(CommandOutput::None)
    }

    fn handle_acs_pulse_timing(
        &self,
        ctx: &mut FswContext,
        args: PulseTimingArgs,
    ) -> FswResult<CommandOutput> {
        let now = ctx.clock.now().as_secs_f64();
        if args.start <= now {
            return Err(CommandArgError::new(
                "start",
                format!("pulse start {} is not after current time {now}", args.start),
            )
            .into());
        }
        info!(
            "accepted pulse schedule: start {} duration {}ms count {} spacing {}ms",
            args.start, args.duration_ms, args.count, args.interval_ms
        );
        ctx.pulse_schedule.push_back(args);
        Ok(CommandOutput::None)
    }

    fn handle_return_to_normal(&self, ctx: &mut FswContext) -> FswResult<CommandOutput> {
        ctx.mode_control.replace_current_mode(FlightMode::Normal);
        Ok(CommandOutput::None)
    }

    fn handle_set_exit_threshold(
        &self,
        ctx: &mut FswContext,
        mode: FlightMode,
        id: u32,
        args: ExitThresholdArgs,
    ) -> FswResult<CommandOutput> {
        let enter = ctx.params.get_f64(P_ENTER_LOW_BATTERY_THRESHOLD)?;
        if args.value >= enter {
            error!(
                "rejected exit low-battery threshold {}: must be below enter threshold {enter}",
                args.value
            );
            return Err(CommandArgError::new(
                "value",
                format!("must be below the enter threshold {enter}"),
            )
            .into());
        }
        self.handle_set_parameter(
            ctx,
            mode,
            id,
            SetParameterArgs {
                name: P_EXIT_LOW_BATTERY_THRESHOLD.to_string(),
                value: ParamValue::Float(args.value),
                hard_set: false,
            },
        )
    }

    fn handle_instrument_write_register(
        &self,
        ctx: &mut FswContext,
        args: RegisterWriteArgs,
    ) -> FswResult<CommandOutput> {
        let instrument = require_instrument(ctx)?;
        info!(
            "instrument register write: address {:#06x} value {:#010x}",
            args.address, args.value
        );
        instrument.write_register(args.address, args.value)?;
        Ok(CommandOutput::None)
    }

    fn handle_instrument_read_register(
        &self,
        ctx: &mut FswContext,
        args: RegisterReadArgs,
    ) -> FswResult<CommandOutput> {
        let instrument = require_instrument(ctx)?;
        let data = instrument.read_register(args.address, args.size)?;
        info!(
            "instrument register read: address {:#06x} returned {} bytes",
            args.address,
            data.len()
        );
        Ok(CommandOutput::RegisterData(data))
    }

    fn handle_instrument_power_on(&self, ctx: &mut FswContext) -> FswResult<CommandOutput> {
        let instrument = require_instrument(ctx)?;
        info!("powering instrument on");
        instrument.power_on()?;
        Ok(CommandOutput::None)
    }

    fn handle_instrument_power_off(&self, ctx: &mut FswContext) -> FswResult<CommandOutput> {
        let instrument = require_instrument(ctx)?;
        info!("powering instrument off");
        instrument.power_off()?;
        Ok(CommandOutput::None)
    }

    fn handle_instrument_reboot(&self, ctx: &mut FswContext) -> FswResult<CommandOutput> {
        let instrument = require_instrument(ctx)?;
        info!("rebooting instrument");
        instrument.reboot()?;
        Ok(CommandOutput::None)
    }

    fn handle_instrument_process_rate_data(
        &self,
        ctx: &mut FswContext,
        args: InstrumentWindowArgs,
    ) -> FswResult<CommandOutput> {
        let instrument = require_instrument(ctx)?;
        info!(
            "processing instrument rate data over [{}, {}] (decimation {})",
            args.t_start, args.t_stop, args.decimation_factor
        );
        instrument.process_rate_data(args.t_start, args.t_stop, args.decimation_factor)?;
        Ok(CommandOutput::None)
    }

    fn handle_instrument_process_histograms(
        &self,
        ctx: &mut FswContext,
        args: InstrumentWindowArgs,
    ) -> FswResult<CommandOutput> {
        let instrument = require_instrument(ctx)?;
        info!(
            "processing instrument histograms over [{}, {}] (decimation {})",
            args.t_start, args.t_stop, args.decimation_factor
        );
        instrument.process_histograms(args.t_start, args.t_stop, args.decimation_factor)?;
        Ok(CommandOutput::None)
    }

    fn handle_adc_check(&self, ctx: &mut FswContext) -> FswResult<CommandOutput> {
        let adc = require_adc(ctx)?;
        info!(
            "gyro cold junction temperature: {} degC",
            adc.gyro_junction_celsius()?
        );
        info!("pressure: {} psi", adc.pressure_psi()?);
        info!("fuel tank temperature: {} degC", adc.thermocouple_celsius()?);
        Ok(CommandOutput::None)
    }

    /// Fire the burnwire while a bounded gyro-sampling thread runs
    /// alongside, then rendezvous and downlink the combined result. The
    /// rates confirm a successful separation tumble.
    fn handle_separation_test(
        &self,
        ctx: &mut FswContext,
        mode: FlightMode,
        id: u32,
    ) -> FswResult<CommandOutput> {
        let gyro = require_gyro(ctx)?;
        let power = require_power(ctx)?;
        let freq = ctx.params.get_f64(P_SEPARATION_GYRO_FREQ)?;
        let duration = ctx.params.get_f64(P_SEPARATION_GYRO_DURATION)?;
        let burn = ctx.params.get_f64(P_SPLIT_BURNWIRE_DURATION)?;

        info!("separation test: sampling gyro at {freq} Hz for {duration}s around a {burn}s burn");
        let sampler = thread::spawn(move || sample_gyro_rates(&*gyro, freq, duration));
        let burn_result = power.fire_burnwire(burn);

        let (samples, mean_rates) = sampler
            .join()
            .map_err(|_| FswError::Task("gyro sampling task panicked".to_string()))?;
        burn_result?;

        let mut fields = Map::new();
        fields.insert("samples".to_string(), json!(samples));
        fields.insert("gyro_mean_x".to_string(), json!(mean_rates[0]));
        fields.insert("gyro_mean_y".to_string(), json!(mean_rates[1]));
        fields.insert("gyro_mean_z".to_string(), json!(mean_rates[2]));
        ctx.downlink.enqueue_with_fields(mode, id, true, fields);

        Ok(CommandOutput::SeparationReport {
            samples,
            mean_rates,
        })
    }

    fn handle_power_output_set(
        &self,
        ctx: &mut FswContext,
        args: PowerOutputArgs,
    ) -> FswResult<CommandOutput> {
        let power = require_power(ctx)?;
        info!(
            "setting power output channel {} {} (delay {}s)",
            args.channel,
            if args.state { "on" } else { "off" },
            args.delay
        );
        power.set_output(args.channel, args.state, args.delay)?;
        Ok(CommandOutput::None)
    }

    fn handle_comms_link_check(
        &self,
        ctx: &mut FswContext,
        mode: FlightMode,
        id: u32,
    ) -> FswResult<CommandOutput> {
        let gyro = require_gyro(ctx)?;
        let rates = gyro.rates()?;
        let mut fields = Map::new();
        fields.insert("gyro1".to_string(), json!(rates[0]));
        fields.insert("gyro2".to_string(), json!(rates[1]));
        fields.insert("gyro3".to_string(), json!(rates[2]));
        ctx.downlink.enqueue_with_fields(mode, id, true, fields);
        Ok(CommandOutput::None)
    }

    fn handle_power_cycle(
        &self,
        ctx: &mut FswContext,
        args: PowerCycleArgs,
    ) -> FswResult<CommandOutput> {
        let power = require_power(ctx)?;
        info!("commanding full power cycle");
        power.hard_reset(&args.passcode)?;
        Ok(CommandOutput::None)
    }
}

// A missing optional manager is handled here, inside the dispatch layer: it
// is logged with the device name and reported to the caller, never panicked
// on.

fn require_power(ctx: &FswContext) -> FswResult<Arc<dyn PowerSystem + Send + Sync>> {
    ctx.drivers.power.clone().ok_or_else(|| {
        error!("power system manager not initialized");
        FswError::DriverUnavailable("power system")
    })
}

fn require_gyro(ctx: &FswContext) -> FswResult<Arc<dyn Gyro + Send + Sync>> {
    ctx.drivers.gyro.clone().ok_or_else(|| {
        error!("gyro manager not initialized");
        FswError::DriverUnavailable("gyro")
    })
}

fn require_adc(ctx: &FswContext) -> FswResult<Arc<dyn Adc + Send + Sync>> {
    ctx.drivers.adc.clone().ok_or_else(|| {
        error!("adc manager not initialized");
        FswError::DriverUnavailable("adc")
    })
}

fn require_instrument(ctx: &FswContext) -> FswResult<Arc<dyn InstrumentManager + Send + Sync>> {
    ctx.drivers.instrument.clone().ok_or_else(|| {
        error!("instrument manager not initialized");
        FswError::DriverUnavailable("instrument manager")
    })
}

/// Sample gyro rates at `freq_hz` for `duration_s`, returning the number of
/// successful reads and the per-axis mean
fn sample_gyro_rates(gyro: &dyn Gyro, freq_hz: f64, duration_s: f64) -> (usize, [f64; 3]) {
    let count = ((freq_hz * duration_s).ceil() as usize).max(1);
    let period = Duration::from_secs_f64(1.0 / freq_hz.max(1.0));

    let mut sums = [0.0f64; 3];
    let mut collected = 0usize;
    for _ in 0..count {
        if let Ok(rates) = gyro.rates() {
            for (axis, value) in rates.iter().enumerate() {
                sums[axis] += value;
            }
            collected += 1;
        }
        thread::sleep(period);
    }

    if collected == 0 {
        return (0, [0.0; 3]);
    }
    for value in &mut sums {
        *value /= collected as f64;
    }
    (collected, sums)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::P_MAX_GYRO_RATE;
    use crate::context::ModeControl;
    use crate::testutil::{test_harness, TestHarness};
    use hydroslibgs::ids;
    use serde_json::json;

    fn arg_map(value: Value) -> ArgMap {
        match value {
            Value::Object(map) => map,
            _ => panic!("fixture must be a JSON object"),
        }
    }

    fn executor() -> CommandExecutor {
        CommandExecutor::new(CommandRegistry::standard())
    }

    #[test]
    fn test_reserved_id_in_every_mode_is_pure() {
        let executor = executor();
        let TestHarness {
            mut ctx, modes, ..
        } = test_harness();
        let burn_before = ctx.params.get_f64(P_SPLIT_BURNWIRE_DURATION).unwrap();

        for mode in FlightMode::all() {
            let output = executor
                .execute(&mut ctx, mode, ids::SWITCH_MODE, &ArgMap::new())
                .unwrap();
            assert_eq!(output, CommandOutput::None);
        }

        assert!(ctx.downlink.is_empty());
        assert!(modes.pending().is_empty());
        assert_eq!(modes.current(), FlightMode::Normal);
        assert_eq!(
            ctx.params.get_f64(P_SPLIT_BURNWIRE_DURATION).unwrap(),
            burn_before
        );
    }

    #[test]
    fn test_unknown_command_has_no_side_effects() {
        let executor = executor();
        let TestHarness {
            mut ctx, modes, ..
        } = test_harness();

        let err = executor
            .execute(&mut ctx, FlightMode::Maneuver, 42, &ArgMap::new())
            .unwrap_err();
        assert!(matches!(
            err,
            FswError::CommandNotFound {
                mode: FlightMode::Maneuver,
                id: 42
            }
        ));
        assert!(ctx.downlink.is_empty());
        assert!(modes.pending().is_empty());
        assert!(ctx.telemetry.last_poll().is_none());
    }

    #[test]
    fn test_set_parameter_updates_and_acknowledges() {
        let executor = executor();
        let TestHarness { mut ctx, .. } = test_harness();

        let args = arg_map(json!({"name": P_MAX_GYRO_RATE, "value": 7.5}));
        executor
            .execute(&mut ctx, FlightMode::Normal, ids::normal::SET_PARAMETER, &args)
            .unwrap();

        assert_eq!(ctx.params.get_f64(P_MAX_GYRO_RATE).unwrap(), 7.5);
        let frames = ctx.downlink.drain();
        assert_eq!(frames.len(), 1);
        assert!(frames[0].success);
        assert_eq!(frames[0].command_id, ids::normal::SET_PARAMETER);
    }

    #[test]
    fn test_set_unknown_parameter_fails_without_ack() {
        let executor = executor();
        let TestHarness { mut ctx, .. } = test_harness();

        let args = arg_map(json!({"name": "BOGUS", "value": 1}));
        let err = executor
            .execute(&mut ctx, FlightMode::Normal, ids::normal::SET_PARAMETER, &args)
            .unwrap_err();
        assert!(matches!(err, FswError::UnknownParameter(_)));
        assert!(ctx.downlink.is_empty());
    }

    #[test]
    fn test_get_parameter_returns_value() {
        let executor = executor();
        let TestHarness { mut ctx, .. } = test_harness();

        let args = arg_map(json!({"name": P_MAX_GYRO_RATE}));
        let output = executor
            .execute(&mut ctx, FlightMode::Normal, ids::normal::GET_PARAMETER, &args)
            .unwrap();
        assert_eq!(
            output,
            CommandOutput::Parameter {
                name: P_MAX_GYRO_RATE.to_string(),
                value: ParamValue::Float(5.0),
            }
        );
    }

    #[test]
    fn test_electrolysis_type_check_and_actuation() {
        let executor = executor();
        let TestHarness {
            mut ctx, power, ..
        } = test_harness();

        let err = executor
            .execute(
                &mut ctx,
                FlightMode::Normal,
                ids::normal::SET_ELECTROLYSIS,
                &arg_map(json!({"state": "on"})),
            )
            .unwrap_err();
        assert!(matches!(err, FswError::CommandArg(_)));
        assert!(power.calls().is_empty());

        executor
            .execute(
                &mut ctx,
                FlightMode::Normal,
                ids::normal::SET_ELECTROLYSIS,
                &arg_map(json!({"state": true})),
            )
            .unwrap();
        assert_eq!(power.calls(), vec!["set_electrolysis(true, 0)"]);
    }

    #[test]
    fn test_exit_threshold_rejection_leaves_parameter() {
        let executor = executor();
        let TestHarness { mut ctx, .. } = test_harness();
        let before = ctx.params.get_f64(P_EXIT_LOW_BATTERY_THRESHOLD).unwrap();

        // At or above the enter threshold (0.4): rejected.
        for value in [0.4, 0.45, 0.9] {
            let err = executor
                .execute(
                    &mut ctx,
                    FlightMode::LowBatterySafety,
                    ids::low_battery::SET_EXIT_THRESHOLD,
                    &arg_map(json!({ "value": value })),
                )
                .unwrap_err();
            assert!(matches!(err, FswError::CommandArg(_)), "value {value}");
        }
        // Outside (0, 1): rejected at parse time.
        let err = executor
            .execute(
                &mut ctx,
                FlightMode::LowBatterySafety,
                ids::low_battery::SET_EXIT_THRESHOLD,
                &arg_map(json!({"value": 0.0})),
            )
            .unwrap_err();
        assert!(matches!(err, FswError::CommandArg(_)));

        assert_eq!(
            ctx.params.get_f64(P_EXIT_LOW_BATTERY_THRESHOLD).unwrap(),
            before
        );
        assert!(ctx.downlink.is_empty());
    }

    #[test]
    fn test_exit_threshold_accepts_valid_value() {
        let executor = executor();
        let TestHarness { mut ctx, .. } = test_harness();

        executor
            .execute(
                &mut ctx,
                FlightMode::LowBatterySafety,
                ids::low_battery::SET_EXIT_THRESHOLD,
                &arg_map(json!({"value": 0.35})),
            )
            .unwrap();
        assert_eq!(
            ctx.params.get_f64(P_EXIT_LOW_BATTERY_THRESHOLD).unwrap(),
            0.35
        );
        assert_eq!(ctx.downlink.len(), 1);
    }

    #[test]
    fn test_schedule_maneuver_validates_start_time() {
        let executor = executor();
        let TestHarness {
            mut ctx, modes, ..
        } = test_harness();
        let now = ctx.clock.now().as_secs_f64();

        let err = executor
            .execute(
                &mut ctx,
                FlightMode::Normal,
                ids::normal::SCHEDULE_MANEUVER,
                &arg_map(json!({"time": now - 1.0})),
            )
            .unwrap_err();
        assert!(matches!(err, FswError::CommandArg(_)));
        assert!(modes.pending().is_empty());

        executor
            .execute(
                &mut ctx,
                FlightMode::Normal,
                ids::normal::SCHEDULE_MANEUVER,
                &arg_map(json!({"time": now + 600.0})),
            )
            .unwrap();
        assert_eq!(
            ctx.params.get_f64(P_SCHEDULED_BURN_TIME).unwrap(),
            now + 600.0
        );
        assert_eq!(modes.pending(), vec![FlightMode::Maneuver]);
    }

    #[test]
    fn test_pulse_timing_validates_and_queues() {
        let executor = executor();
        let TestHarness { mut ctx, .. } = test_harness();
        let now = ctx.clock.now().as_secs_f64();

        let err = executor
            .execute(
                &mut ctx,
                FlightMode::Normal,
                ids::normal::ACS_PULSE_TIMING,
                &arg_map(json!({
                    "start": now - 5.0, "duration_ms": 50, "count": 4, "interval_ms": 100
                })),
            )
            .unwrap_err();
        assert!(matches!(err, FswError::CommandArg(_)));
        assert!(ctx.pulse_schedule.is_empty());

        executor
            .execute(
                &mut ctx,
                FlightMode::Normal,
                ids::normal::ACS_PULSE_TIMING,
                &arg_map(json!({
                    "start": now + 30.0, "duration_ms": 50, "count": 4, "interval_ms": 100
                })),
            )
            .unwrap();
        assert_eq!(ctx.pulse_schedule.len(), 1);
        assert_eq!(ctx.pulse_schedule[0].count, 4);
    }

    #[test]
    fn test_verification_output_length() {
        let executor = executor();
        let TestHarness { mut ctx, .. } = test_harness();

        let output = executor
            .execute(
                &mut ctx,
                FlightMode::Normal,
                ids::normal::VERIFICATION,
                &arg_map(json!({"num_blocks": 3})),
            )
            .unwrap();
        match output {
            CommandOutput::VerificationHex(hex) => assert_eq!(hex.len(), 288 * 3),
            other => panic!("unexpected output {other:?}"),
        }
    }

    #[test]
    fn test_run_opnav_requests_mode() {
        let executor = executor();
        let TestHarness {
            mut ctx, modes, ..
        } = test_harness();

        executor
            .execute(
                &mut ctx,
                FlightMode::Normal,
                ids::normal::RUN_OPNAV,
                &ArgMap::new(),
            )
            .unwrap();
        assert_eq!(modes.pending(), vec![FlightMode::OpNav]);
    }

    #[test]
    fn test_exit_safety_replaces_mode() {
        let executor = executor();
        let TestHarness {
            mut ctx, modes, ..
        } = test_harness();
        modes.replace_current_mode(FlightMode::Safety);

        executor
            .execute(
                &mut ctx,
                FlightMode::Safety,
                ids::safety::EXIT_SAFETY,
                &ArgMap::new(),
            )
            .unwrap();
        assert_eq!(modes.current(), FlightMode::Normal);
    }

    #[test]
    fn test_basic_telem_returns_packet() {
        let executor = executor();
        let TestHarness { mut ctx, .. } = test_harness();

        let output = executor
            .execute(
                &mut ctx,
                FlightMode::Normal,
                ids::normal::BASIC_TELEM,
                &ArgMap::new(),
            )
            .unwrap();
        match output {
            CommandOutput::TelemetryPacket(packet) => {
                assert_eq!(packet.vbatt, 7200.0);
                assert_eq!(packet.prs_pressure, 14.7);
            }
            other => panic!("unexpected output {other:?}"),
        }
    }

    #[test]
    fn test_instrument_unavailable_is_reported() {
        let executor = executor();
        let TestHarness { mut ctx, .. } = test_harness();
        ctx.drivers.instrument = None;

        let err = executor
            .execute(
                &mut ctx,
                FlightMode::Normal,
                ids::normal::INSTRUMENT_POWER_ON,
                &ArgMap::new(),
            )
            .unwrap_err();
        assert!(matches!(
            err,
            FswError::DriverUnavailable("instrument manager")
        ));
    }

    #[test]
    fn test_instrument_register_write_reaches_driver() {
        let executor = executor();
        let TestHarness {
            mut ctx,
            instrument,
            ..
        } = test_harness();

        executor
            .execute(
                &mut ctx,
                FlightMode::Normal,
                ids::normal::INSTRUMENT_WRITE_REGISTER,
                &arg_map(json!({"address": 16, "value": 255})),
            )
            .unwrap();
        assert_eq!(instrument.ops(), vec!["write_register(16, 255)"]);
    }

    #[test]
    fn test_separation_test_rendezvous() {
        let executor = executor();
        let TestHarness {
            mut ctx, power, ..
        } = test_harness();

        // Shrink the sampling window so the rendezvous is quick.
        ctx.params
            .set(P_SEPARATION_GYRO_FREQ, ParamValue::Float(200.0), false)
            .unwrap();
        ctx.params
            .set(P_SEPARATION_GYRO_DURATION, ParamValue::Float(0.02), false)
            .unwrap();
        ctx.params
            .set(P_SPLIT_BURNWIRE_DURATION, ParamValue::Float(0.01), false)
            .unwrap();

        let output = executor
            .execute(
                &mut ctx,
                FlightMode::TestMode,
                ids::test::SEPARATION_TEST,
                &ArgMap::new(),
            )
            .unwrap();

        match output {
            CommandOutput::SeparationReport { samples, .. } => assert!(samples > 0),
            other => panic!("unexpected output {other:?}"),
        }
        assert_eq!(power.calls(), vec!["fire_burnwire(0.01)"]);

        let frames = ctx.downlink.drain();
        assert_eq!(frames.len(), 1);
        assert!(frames[0].fields.contains_key("samples"));
    }

    #[test]
    fn test_comms_link_check_downlinks_rates() {
        let executor = executor();
        let TestHarness { mut ctx, .. } = test_harness();

        executor
            .execute(
                &mut ctx,
                FlightMode::TestMode,
                ids::test::COMMS_LINK_CHECK,
                &ArgMap::new(),
            )
            .unwrap();

        let frames = ctx.downlink.drain();
        assert_eq!(frames.len(), 1);
        assert!(frames[0].fields.contains_key("gyro1"));
    }

    #[test]
    fn test_command_mode_power_cycle() {
        let executor = executor();
        let TestHarness {
            mut ctx, power, ..
        } = test_harness();

        executor
            .execute(
                &mut ctx,
                FlightMode::Command,
                ids::command::POWER_CYCLE,
                &arg_map(json!({"passcode": "ground-override"})),
            )
            .unwrap();
        assert_eq!(power.calls(), vec!["hard_reset(ground-override)"]);
    }
}
