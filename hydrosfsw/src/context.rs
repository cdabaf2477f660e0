//! Shared flight context handed to the command executor
//!
//! Rather than process-wide globals, everything a handler may touch travels
//! in one explicit bundle: the parameter store, the telemetry cache, the
//! downlink queue, the driver handles, the mode-control collaborator, and
//! the wall clock.

use log::info;
use serde_json::{Map, Value};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use hydroslibgs::{DownlinkFrame, FlightMode, PulseTimingArgs};

use crate::drivers::{DriverSet, SystemClock, WallClock};
use crate::params::ParameterStore;
use crate::telemetry::TelemetryAggregator;

/// Mode-transition capability of the (external) mode controller. Handlers
/// may replace the running mode or enqueue a request; the policy connecting
/// anomalies to transitions lives with the implementor.
pub trait ModeControl {
    fn replace_current_mode(&self, mode: FlightMode);

    fn request_mode(&self, mode: FlightMode);
}

/// Minimal mode controller: a current mode plus a FIFO of requests
pub struct ModeQueue {
    current: Mutex<FlightMode>,
    pending: Mutex<VecDeque<FlightMode>>,
}

impl ModeQueue {
    pub fn new(initial: FlightMode) -> Self {
        Self {
            current: Mutex::new(initial),
            pending: Mutex::new(VecDeque::new()),
        }
    }

    pub fn current(&self) -> FlightMode {
        *self.current.lock().unwrap()
    }

    pub fn pop_request(&self) -> Option<FlightMode> {
        self.pending.lock().unwrap().pop_front()
    }

    pub fn pending(&self) -> Vec<FlightMode> {
        self.pending.lock().unwrap().iter().copied().collect()
    }
}

impl ModeControl for ModeQueue {
    fn replace_current_mode(&self, mode: FlightMode) {
        let mut current = self.current.lock().unwrap();
        info!("flight mode replaced: {} -> {}", *current, mode);
        *current = mode;
    }

    fn request_mode(&self, mode: FlightMode) {
        self.pending.lock().unwrap().push_back(mode);
    }
}

/// Single-producer downlink acknowledgment queue. Enqueue-only from the
/// handlers' point of view; the transmission side drains it.
pub struct DownlinkQueue {
    counter: u32,
    frames: VecDeque<DownlinkFrame>,
}

impl DownlinkQueue {
    pub fn new() -> Self {
        Self {
            counter: 0,
            frames: VecDeque::new(),
        }
    }

    /// Enqueue a plain acknowledgment, returning its counter value
    pub fn enqueue(&mut self, mode: FlightMode, command_id: u32, success: bool) -> u32 {
        self.enqueue_with_fields(mode, command_id, success, Map::new())
    }

    /// Enqueue an acknowledgment carrying command-specific fields
    pub fn enqueue_with_fields(
        &mut self,
        mode: FlightMode,
        command_id: u32,
        success: bool,
        fields: Map<String, Value>,
    ) -> u32 {
        let counter = self.counter;
        self.counter += 1;
        let mut frame = DownlinkFrame::new(counter, mode, command_id, success);
        frame.fields = fields;
        self.frames.push_back(frame);
        counter
    }

    pub fn drain(&mut self) -> Vec<DownlinkFrame> {
        self.frames.drain(..).collect()
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}

impl Default for DownlinkQueue {
    fn default() -> Self {
        Self::new()
    }
}

/// The explicit context bundle passed to the executor and every handler
pub struct FswContext {
    pub params: ParameterStore,
    pub telemetry: TelemetryAggregator,
    pub downlink: DownlinkQueue,
    pub drivers: DriverSet,
    pub mode_control: Arc<dyn ModeControl + Send + Sync>,
    pub clock: Arc<dyn WallClock + Send + Sync>,
    /// Pulse schedules accepted by AcsPulseTiming, consumed by the external
    /// attitude-control task
    pub pulse_schedule: VecDeque<PulseTimingArgs>,
}

impl FswContext {
    pub fn new(
        params: ParameterStore,
        drivers: DriverSet,
        mode_control: Arc<dyn ModeControl + Send + Sync>,
    ) -> Self {
        Self {
            params,
            telemetry: TelemetryAggregator::new(),
            downlink: DownlinkQueue::new(),
            drivers,
            mode_control,
            clock: Arc::new(SystemClock),
            pulse_schedule: VecDeque::new(),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn WallClock + Send + Sync>) -> Self {
        self.clock = clock;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_downlink_counter_is_monotone() {
        let mut queue = DownlinkQueue::new();
        assert_eq!(queue.enqueue(FlightMode::Normal, 3, true), 0);
        assert_eq!(queue.enqueue(FlightMode::Normal, 3, false), 1);
        assert_eq!(queue.enqueue(FlightMode::Command, 1, true), 2);

        let frames = queue.drain();
        assert_eq!(frames.len(), 3);
        assert!(queue.is_empty());
        assert_eq!(frames[2].counter, 2);

        // The counter keeps advancing after a drain.
        assert_eq!(queue.enqueue(FlightMode::Normal, 3, true), 3);
    }

    #[test]
    fn test_mode_queue_replace_and_request() {
        let queue = ModeQueue::new(FlightMode::Boot);
        assert_eq!(queue.current(), FlightMode::Boot);

        queue.replace_current_mode(FlightMode::Normal);
        assert_eq!(queue.current(), FlightMode::Normal);

        queue.request_mode(FlightMode::OpNav);
        queue.request_mode(FlightMode::Maneuver);
        assert_eq!(
            queue.pending(),
            vec![FlightMode::OpNav, FlightMode::Maneuver]
        );
        assert_eq!(queue.pop_request(), Some(FlightMode::OpNav));
        assert_eq!(queue.pop_request(), Some(FlightMode::Maneuver));
        assert_eq!(queue.pop_request(), None);
    }
}
