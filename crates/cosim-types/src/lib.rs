//! Shared data model for the co-simulation workspace: identifiers, IO
//! signal and bus controller/message descriptors, lifecycle and
//! connection state, callback traits, and the crate-wide error type.
//!
//! Every other crate in this workspace (`cosim-net`, `cosim-protocol`,
//! `cosim-buffers`, `cosim-portmapper`, `cosim`) depends on this one and
//! none of its own types.

pub mod callbacks;
pub mod codec;
pub mod command;
pub mod constants;
pub mod controller;
pub mod error;
pub mod ids;
pub mod message;
pub mod next_command;
pub mod signal;

pub use callbacks::Callbacks;
pub use codec::{Reader, Writer};
pub use command::{Command, ConnectionState, Mode, ResponderMode, SimulationState};
pub use controller::{
    CanController, Controller, EthController, FrClusterParameters, FrController, LinController,
    LinControllerType,
};
pub use error::{CoSimError, Result};
pub use ids::{BusControllerId, BusMessageId, IoSignalId, SimulationTime};
pub use message::{
    BusKind, BusMessage, CanMessage, CanMessageFlags, EthMessage, EthMessageFlags, FrMessage,
    FrMessageFlags, LinMessage, LinMessageFlags,
};
pub use next_command::NextCommandSlot;
pub use signal::{DataType, IoSignal, SizeKind};
