//! The name → TCP port registry and its RPC server/client (spec §4.7).
//! One process hosts at most one [`PortMapperServer`]; it is independent
//! of any simulation session, so it can be unit-tested in isolation
//! (spec §9 "Global port-mapper state").

pub mod client;
pub mod registry;
pub mod server;

pub use client::{get_port, mapper_port, set_port, unset_port};
pub use registry::Registry;
pub use server::PortMapperServer;
