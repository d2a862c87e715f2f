pub const CAN_MESSAGE_MAX_LENGTH: usize = 64;
pub const ETH_MESSAGE_MAX_LENGTH: usize = 9018;
pub const LIN_MESSAGE_MAX_LENGTH: usize = 8;
pub const FR_MESSAGE_MAX_LENGTH: usize = 254;
pub const ETH_ADDRESS_LENGTH: usize = 6;

pub const DEFAULT_PORT_MAPPER_PORT: u16 = 27027;
pub const PORT_MAPPER_PORT_ENV_VAR: &str = "VEOS_COSIM_PORTMAPPER_PORT";

pub const PROTOCOL_V1: u32 = 0x0001_0000;
pub const PROTOCOL_V2: u32 = 0x0002_0000;
pub const LATEST_PROTOCOL_VERSION: u32 = PROTOCOL_V2;

/// Default client-side timeout waiting for a response from the server
/// (`ConnectOk`, command acknowledgements). SPEC_FULL.md "Supplemented
/// features" item 2.
pub const DEFAULT_RESPONSE_TIMEOUT_MS: u64 = 1000;

/// Interval at which the server's background thread attempts an accept
/// while no client is connected.
pub const ACCEPT_POLL_INTERVAL_MS: u64 = 100;

/// Interval at which the server pings an idle, connected client.
pub const PING_INTERVAL_MS: u64 = 1000;
