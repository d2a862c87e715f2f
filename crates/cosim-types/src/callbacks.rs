use crate::command::{Command, SimulationState};
use crate::ids::SimulationTime;
use crate::message::{CanMessage, EthMessage, FrMessage, LinMessage};
use crate::signal::IoSignal;

/// Fired when an incoming IO signal's value changed on deserialize
/// (spec §4.5 `Deserialize`).
pub type IoSignalChangedCallback = Box<dyn FnMut(SimulationTime, &IoSignal, &[u8]) + Send>;

/// Fired for an incoming bus message when no queueing should happen
/// (spec §4.6 `Deserialize`: callback presence suppresses rx-ring
/// enqueue).
pub type CanMessageReceivedCallback = Box<dyn FnMut(SimulationTime, &CanMessage) + Send>;
pub type EthMessageReceivedCallback = Box<dyn FnMut(SimulationTime, &EthMessage) + Send>;
pub type LinMessageReceivedCallback = Box<dyn FnMut(SimulationTime, &LinMessage) + Send>;
pub type FrMessageReceivedCallback = Box<dyn FnMut(SimulationTime, &FrMessage) + Send>;

/// Fired around a step exchange (spec §4.8 blocking loop).
pub type SimulationCallback = Box<dyn FnMut(SimulationTime) + Send>;

/// Fired on a lifecycle transition (spec §4.8, §4.9).
pub type LifecycleCallback = Box<dyn FnMut(SimulationState) + Send>;

/// The full set of user-registered callbacks for one co-simulation
/// session. Held by value for the duration of the loop (spec §9 "Cyclic
/// callbacks vs ownership") — nothing here escapes back to user space as
/// a reference the core retains past the call.
#[derive(Default)]
pub struct Callbacks {
    pub io_signal_changed: Option<IoSignalChangedCallback>,
    pub can_message_received: Option<CanMessageReceivedCallback>,
    pub eth_message_received: Option<EthMessageReceivedCallback>,
    pub lin_message_received: Option<LinMessageReceivedCallback>,
    pub fr_message_received: Option<FrMessageReceivedCallback>,
    pub simulation_begin_step: Option<SimulationCallback>,
    pub simulation_end_step: Option<SimulationCallback>,
    pub on_start: Option<LifecycleCallback>,
    pub on_stop: Option<LifecycleCallback>,
    pub on_pause: Option<LifecycleCallback>,
    pub on_continue: Option<LifecycleCallback>,
    pub on_terminate: Option<LifecycleCallback>,
}

impl Callbacks {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fire_lifecycle(&mut self, command: Command, state: SimulationState) {
        let cb = match command {
            Command::Start => &mut self.on_start,
            Command::Stop => &mut self.on_stop,
            Command::Pause => &mut self.on_pause,
            Command::Continue => &mut self.on_continue,
            Command::Terminate => &mut self.on_terminate,
        };
        if let Some(cb) = cb {
            cb(state);
        }
    }
}

impl std::fmt::Debug for Callbacks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Callbacks").finish_non_exhaustive()
    }
}
