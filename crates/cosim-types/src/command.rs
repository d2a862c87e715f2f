/// Lifecycle commands the server emits and the client's atomic
/// next-command slot stores (spec §4.8, §4.9, §9 "Atomic next-command").
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[repr(u8)]
pub enum Command {
    Start = 0,
    Stop = 1,
    Pause = 2,
    Continue = 3,
    Terminate = 4,
}

/// Server-side simulation state machine (spec §4.9).
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[repr(u8)]
pub enum SimulationState {
    Unloaded = 0,
    Stopped = 1,
    Running = 2,
    Paused = 3,
    Terminated = 4,
}

impl SimulationState {
    /// Applies `command`, returning the resulting state, or `None` if the
    /// transition is illegal and must be a no-op (spec §4.9 state table).
    #[must_use]
    pub const fn apply(self, command: Command) -> Option<Self> {
        use Command::{Continue, Pause, Start, Stop, Terminate};
        use SimulationState::{Paused, Running, Stopped, Terminated, Unloaded};

        match (self, command) {
            (Unloaded, _) => None,
            (Stopped, Start) => Some(Running),
            (Running, Stop) => Some(Stopped),
            (Running, Pause) => Some(Paused),
            (Paused, Continue) => Some(Running),
            (Stopped | Running | Paused, Terminate) => Some(Terminated),
            _ => None,
        }
    }
}

/// Client-observable connection state (SPEC_FULL.md supplemented feature
/// 3, grounded on the original's `GetConnectionState`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum ConnectionState {
    Disconnected,
    Connected,
}

/// Whether a `CoSimClient` is driven by the blocking callback loop or the
/// non-blocking poll/finish pair. Locked in at first use (spec §4.8).
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum ResponderMode {
    Unknown,
    Blocking,
    NonBlocking,
}

/// Reserved wire-format placeholder in the `Connect` frame (SPEC_FULL.md
/// supplemented feature 4). Carries no information today; future
/// protocol versions may add variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
pub enum Mode {
    #[default]
    Default,
}
