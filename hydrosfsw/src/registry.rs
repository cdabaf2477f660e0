//! Mode-scoped command registry
//!
//! Each flight mode owns one command table mapping numeric ids to command
//! specifications. Id 0 of every table is pre-populated with the manual
//! mode-switch signal and cannot be reassigned. An empty table (beyond id 0)
//! is a legitimate not-yet-implemented state.

use std::collections::BTreeMap;

use hydroslibgs::{
    ids, ArgMap, Command, CommandArgError, ElectrolysisArgs, ExitThresholdArgs, FlightMode,
    FswError, FswResult, GetParameterArgs, InstrumentWindowArgs, ManeuverArgs, OpNavIntervalArgs,
    PowerCycleArgs, PowerOutputArgs, PulseTimingArgs, RegisterReadArgs, RegisterWriteArgs,
    SetParameterArgs, VerificationArgs,
};

/// Parses an uplinked argument map into a typed command
pub type ParseFn = fn(&ArgMap) -> Result<Command, CommandArgError>;

/// A registered command: its wire name and argument parser
#[derive(Clone)]
pub struct CommandSpec {
    pub name: &'static str,
    pub parse: ParseFn,
}

impl CommandSpec {
    pub fn new(name: &'static str, parse: ParseFn) -> Self {
        Self { name, parse }
    }
}

/// One mode's table of command ids
pub struct CommandTable {
    entries: BTreeMap<u32, CommandSpec>,
}

impl CommandTable {
    /// A fresh table holding only the reserved manual-switch entry
    fn reserved() -> Self {
        let mut entries = BTreeMap::new();
        entries.insert(
            ids::SWITCH_MODE,
            CommandSpec::new("switch_mode_signal", |_| Ok(Command::SwitchModeSignal)),
        );
        Self { entries }
    }

    pub fn get(&self, id: u32) -> Option<&CommandSpec> {
        self.entries.get(&id)
    }

    pub fn ids(&self) -> impl Iterator<Item = u32> + '_ {
        self.entries.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// The full mode-to-table mapping
pub struct CommandRegistry {
    tables: BTreeMap<FlightMode, CommandTable>,
}

impl CommandRegistry {
    /// Registry with every mode's table holding only the reserved entry
    pub fn empty() -> Self {
        let tables = FlightMode::all()
            .map(|mode| (mode, CommandTable::reserved()))
            .collect();
        Self { tables }
    }

    /// The standard mission command tables
    pub fn standard() -> Self {
        let mut registry = Self::empty();

        registry.insert(
            FlightMode::Boot,
            ids::boot::SEPARATION,
            CommandSpec::new("separation", |_| Ok(Command::Separation)),
        );

        {
            use ids::normal::*;
            let mode = FlightMode::Normal;
            registry.insert(
                mode,
                RUN_OPNAV,
                CommandSpec::new("run_opnav", |_| Ok(Command::RunOpNav)),
            );
            registry.insert(
                mode,
                SET_ELECTROLYSIS,
                CommandSpec::new("set_electrolysis", |args| {
                    Ok(Command::SetElectrolysis(ElectrolysisArgs::from_args(args)?))
                }),
            );
            registry.insert(mode, SET_PARAMETER, set_parameter_spec());
            registry.insert(
                mode,
                CRITICAL_TELEM,
                CommandSpec::new("critical_telem", |_| Ok(Command::CriticalTelem)),
            );
            registry.insert(
                mode,
                BASIC_TELEM,
                CommandSpec::new("basic_telem", |_| Ok(Command::BasicTelem)),
            );
            registry.insert(
                mode,
                DETAILED_TELEM,
                CommandSpec::new("detailed_telem", |_| Ok(Command::DetailedTelem)),
            );
            registry.insert(
                mode,
                VERIFICATION,
                CommandSpec::new("verification", |args| {
                    Ok(Command::Verification(VerificationArgs::from_args(args)?))
                }),
            );
            registry.insert(
                mode,
                GET_PARAMETER,
                CommandSpec::new("get_parameter", |args| {
                    Ok(Command::GetParameter(GetParameterArgs::from_args(args)?))
                }),
            );
            registry.insert(
                mode,
                SET_OPNAV_INTERVAL,
                CommandSpec::new("set_opnav_interval", |args| {
                    Ok(Command::SetOpNavInterval(OpNavIntervalArgs::from_args(
                        args,
                    )?))
                }),
            );
            registry.insert(
                mode,
                SCHEDULE_MANEUVER,
                CommandSpec::new("schedule_maneuver", |args| {
                    Ok(Command::ScheduleManeuver(ManeuverArgs::from_args(args)?))
                }),
            );
            registry.insert(
                mode,
                ACS_PULSE_TIMING,
                CommandSpec::new("acs_pulse_timing", |args| {
                    Ok(Command::AcsPulseTiming(PulseTimingArgs::from_args(args)?))
                }),
            );
            registry.insert(
                mode,
                INSTRUMENT_WRITE_REGISTER,
                CommandSpec::new("instrument_write_register", |args| {
                    Ok(Command::InstrumentWriteRegister(
                        RegisterWriteArgs::from_args(args)?,
                    ))
                }),
            );
            registry.insert(
                mode,
                INSTRUMENT_READ_REGISTER,
                CommandSpec::new("instrument_read_register", |args| {
                    Ok(Command::InstrumentReadRegister(RegisterReadArgs::from_args(
                        args,
                    )?))
                }),
            );
            registry.insert(
                mode,
                INSTRUMENT_POWER_ON,
                CommandSpec::new("instrument_power_on", |_| Ok(Command::InstrumentPowerOn)),
            );
            registry.insert(
                mode,
                INSTRUMENT_POWER_OFF,
                CommandSpec::new("instrument_power_off", |_| Ok(Command::InstrumentPowerOff)),
            );
            registry.insert(
                mode,
                INSTRUMENT_REBOOT,
                CommandSpec::new("instrument_reboot", |_| Ok(Command::InstrumentReboot)),
            );
            registry.insert(
                mode,
                INSTRUMENT_PROCESS_RATE_DATA,
                CommandSpec::new("instrument_process_rate_data", |args| {
                    Ok(Command::InstrumentProcessRateData(
                        InstrumentWindowArgs::from_args(args)?,
                    ))
                }),
            );
            registry.insert(
                mode,
                INSTRUMENT_PROCESS_HISTOGRAMS,
                CommandSpec::new("instrument_process_histograms", |args| {
                    Ok(Command::InstrumentProcessHistograms(
                        InstrumentWindowArgs::from_args(args)?,
                    ))
                }),
            );
        }

        {
            use ids::low_battery::*;
            let mode = FlightMode::LowBatterySafety;
            registry.insert(
                mode,
                EXIT_LOW_BATTERY_SAFETY,
                CommandSpec::new("exit_low_battery_safety", |_| Ok(Command::ReturnToNormal)),
            );
            registry.insert(
                mode,
                SET_EXIT_THRESHOLD,
                CommandSpec::new("set_exit_low_battery_threshold", |args| {
                    Ok(Command::SetExitLowBatteryThreshold(
                        ExitThresholdArgs::from_args(args)?,
                    ))
                }),
            );
            registry.insert(mode, SET_PARAMETER, set_parameter_spec());
            registry.insert(
                mode,
                CRITICAL_TELEM,
                CommandSpec::new("critical_telem", |_| Ok(Command::CriticalTelem)),
            );
            registry.insert(
                mode,
                BASIC_TELEM,
                CommandSpec::new("basic_telem", |_| Ok(Command::BasicTelem)),
            );
            registry.insert(
                mode,
                DETAILED_TELEM,
                CommandSpec::new("detailed_telem", |_| Ok(Command::DetailedTelem)),
            );
        }

        {
            use ids::safety::*;
            let mode = FlightMode::Safety;
            registry.insert(
                mode,
                EXIT_SAFETY,
                CommandSpec::new("exit_safety", |_| Ok(Command::ReturnToNormal)),
            );
            registry.insert(mode, SET_PARAMETER, set_parameter_spec());
            registry.insert(
                mode,
                CRITICAL_TELEM,
                CommandSpec::new("critical_telem", |_| Ok(Command::CriticalTelem)),
            );
            registry.insert(
                mode,
                BASIC_TELEM,
                CommandSpec::new("basic_telem", |_| Ok(Command::BasicTelem)),
            );
            registry.insert(
                mode,
                DETAILED_TELEM,
                CommandSpec::new("detailed_telem", |_| Ok(Command::DetailedTelem)),
            );
        }

        {
            use ids::test::*;
            let mode = FlightMode::TestMode;
            registry.insert(
                mode,
                SEPARATION,
                CommandSpec::new("separation", |_| Ok(Command::Separation)),
            );
            registry.insert(
                mode,
                ADC_CHECK,
                CommandSpec::new("adc_check", |_| Ok(Command::AdcCheck)),
            );
            registry.insert(
                mode,
                SEPARATION_TEST,
                CommandSpec::new("separation_test", |_| Ok(Command::SeparationTest)),
            );
            registry.insert(mode, POWER_OUTPUT_SET, power_output_spec());
            registry.insert(
                mode,
                COMMS_LINK_CHECK,
                CommandSpec::new("comms_link_check", |_| Ok(Command::CommsLinkCheck)),
            );
        }

        {
            use ids::command::*;
            let mode = FlightMode::Command;
            registry.insert(mode, SET_PARAMETER, set_parameter_spec());
            registry.insert(
                mode,
                POWER_CYCLE,
                CommandSpec::new("power_cycle", |args| {
                    Ok(Command::PowerCycle(PowerCycleArgs::from_args(args)?))
                }),
            );
            registry.insert(mode, POWER_OUTPUT_SET, power_output_spec());
        }

        registry
    }

    /// Register a mission command. Id 0 is reserved and refused.
    pub fn register(&mut self, mode: FlightMode, id: u32, spec: CommandSpec) -> FswResult<()> {
        if id == ids::SWITCH_MODE {
            return Err(FswError::ReservedCommandId(id));
        }
        self.insert(mode, id, spec);
        Ok(())
    }

    fn insert(&mut self, mode: FlightMode, id: u32, spec: CommandSpec) {
        debug_assert_ne!(id, ids::SWITCH_MODE);
        if let Some(table) = self.tables.get_mut(&mode) {
            table.entries.insert(id, spec);
        }
    }

    pub fn lookup(&self, mode: FlightMode, id: u32) -> Option<&CommandSpec> {
        self.tables.get(&mode).and_then(|table| table.get(id))
    }

    pub fn table(&self, mode: FlightMode) -> Option<&CommandTable> {
        self.tables.get(&mode)
    }
}

fn set_parameter_spec() -> CommandSpec {
    CommandSpec::new("set_parameter", |args| {
        Ok(Command::SetParameter(SetParameterArgs::from_args(args)?))
    })
}

fn power_output_spec() -> CommandSpec {
    CommandSpec::new("power_output_set", |args| {
        Ok(Command::PowerOutputSet(PowerOutputArgs::from_args(args)?))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Map;

    #[test]
    fn test_every_mode_has_reserved_entry() {
        for registry in [CommandRegistry::empty(), CommandRegistry::standard()] {
            for mode in FlightMode::all() {
                let spec = registry
                    .lookup(mode, ids::SWITCH_MODE)
                    .unwrap_or_else(|| panic!("mode {mode} missing reserved id 0"));
                let command = (spec.parse)(&Map::new()).unwrap();
                assert_eq!(command, Command::SwitchModeSignal);
            }
        }
    }

    #[test]
    fn test_register_rejects_reserved_id() {
        let mut registry = CommandRegistry::empty();
        let result = registry.register(
            FlightMode::Normal,
            ids::SWITCH_MODE,
            CommandSpec::new("rogue", |_| Ok(Command::RunOpNav)),
        );
        assert!(matches!(result, Err(FswError::ReservedCommandId(0))));

        // The reserved entry is untouched.
        let spec = registry.lookup(FlightMode::Normal, ids::SWITCH_MODE).unwrap();
        assert_eq!((spec.parse)(&Map::new()).unwrap(), Command::SwitchModeSignal);
    }

    #[test]
    fn test_register_mission_command() {
        let mut registry = CommandRegistry::empty();
        registry
            .register(
                FlightMode::SensorMode,
                4,
                CommandSpec::new("basic_telem", |_| Ok(Command::BasicTelem)),
            )
            .unwrap();
        let spec = registry.lookup(FlightMode::SensorMode, 4).unwrap();
        assert_eq!(spec.name, "basic_telem");
    }

    #[test]
    fn test_unregistered_id_is_absent() {
        let registry = CommandRegistry::standard();
        assert!(registry.lookup(FlightMode::Restart, 99).is_none());
        assert!(registry.lookup(FlightMode::OpNav, 1).is_none());
    }

    #[test]
    fn test_standard_tables_spot_checks() {
        let registry = CommandRegistry::standard();

        let normal = registry.table(FlightMode::Normal).unwrap();
        assert_eq!(
            normal.get(ids::normal::VERIFICATION).unwrap().name,
            "verification"
        );
        assert!(normal.len() > 15);

        let lb = registry.table(FlightMode::LowBatterySafety).unwrap();
        assert_eq!(
            lb.get(ids::low_battery::SET_EXIT_THRESHOLD).unwrap().name,
            "set_exit_low_battery_threshold"
        );

        // Idle modes only carry the reserved entry.
        for mode in [FlightMode::Restart, FlightMode::OpNav, FlightMode::CommsMode] {
            assert_eq!(registry.table(mode).unwrap().len(), 1);
        }
    }
}
