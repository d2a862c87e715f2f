//! Facade crate tying the wire codec, buffers, transport, and port
//! mapper together into the two types an embedding application actually
//! drives: [`CoSimClient`] and [`CoSimServer`] (spec §4.8, §4.9).

pub mod client;
pub mod config;
pub mod logging;
pub mod server;

pub use client::{CoSimClient, PollOutcome};
pub use config::{ConnectConfig, CoSimServerConfig};
pub use cosim_types::{
    BusKind, BusMessage, CanController, CanMessage, CanMessageFlags, Callbacks, Command, ConnectionState,
    Controller, CoSimError, EthController, EthMessage, EthMessageFlags, FrClusterParameters, FrController,
    FrMessage, FrMessageFlags, IoSignal, IoSignalId, LinController, LinControllerType, LinMessage,
    LinMessageFlags, Result, SimulationState, SimulationTime,
};
pub use logging::init_tracing;
pub use server::{ConnectionKind, CoSimServer};
