use cosim_types::{CanController, EthController, FrController, IoSignal, LinController, SimulationTime};

/// Client-supplied connection parameters (spec §6). Plain serde-derived
/// data so an embedding application can load it from JSON/TOML.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ConnectConfig {
    /// May be empty — resolved via `server_name` and the port mapper.
    pub remote_ip_address: String,
    /// May be empty if `remote_port` is set directly.
    pub server_name: String,
    pub client_name: String,
    /// `0` resolves the port via the port mapper.
    pub remote_port: u16,
    /// `0` lets the OS choose the local port.
    pub local_port: u16,
    /// SPEC_FULL.md "Supplemented features" item 2: bounds how long the
    /// client waits for `ConnectOk`/command responses.
    pub response_timeout_ms: u64,
}

impl Default for ConnectConfig {
    fn default() -> Self {
        Self {
            remote_ip_address: String::new(),
            server_name: String::new(),
            client_name: String::new(),
            remote_port: 0,
            local_port: 0,
            response_timeout_ms: cosim_types::constants::DEFAULT_RESPONSE_TIMEOUT_MS,
        }
    }
}

/// Server-side session configuration (spec §6). Lifecycle and
/// received-message callbacks are supplied separately as a
/// [`cosim_types::Callbacks`] value, since closures aren't serializable.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct CoSimServerConfig {
    /// `0` lets the OS choose the port.
    pub port: u16,
    /// Bind `0.0.0.0` instead of `127.0.0.1`.
    pub enable_remote_access: bool,
    pub server_name: String,
    pub is_client_optional: bool,
    pub start_port_mapper: bool,
    pub register_at_port_mapper: bool,
    pub step_size: SimulationTime,
    pub incoming_signals: Vec<IoSignal>,
    pub outgoing_signals: Vec<IoSignal>,
    pub can_controllers: Vec<CanController>,
    pub eth_controllers: Vec<EthController>,
    pub lin_controllers: Vec<LinController>,
    pub fr_controllers: Vec<FrController>,
}
