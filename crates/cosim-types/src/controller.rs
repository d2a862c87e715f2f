use crate::ids::BusControllerId;

/// CAN bus adapter descriptor (spec §3).
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct CanController {
    pub id: BusControllerId,
    pub queue_size: u32,
    pub bit_rate: u32,
    pub fd_bit_rate: u32,
    pub name: String,
    pub channel_name: String,
}

/// Ethernet bus adapter descriptor.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct EthController {
    pub id: BusControllerId,
    pub queue_size: u32,
    pub bit_rate: u32,
    pub mac_address: [u8; crate::constants::ETH_ADDRESS_LENGTH],
    pub name: String,
    pub channel_name: String,
}

/// LIN responder/commander role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum LinControllerType {
    Responder,
    Commander,
}

/// LIN bus adapter descriptor.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct LinController {
    pub id: BusControllerId,
    pub queue_size: u32,
    pub bit_rate: u32,
    pub controller_type: LinControllerType,
    pub name: String,
    pub channel_name: String,
}

/// FlexRay cluster timing geometry, carried in full so a `FrController`
/// round-trips losslessly through the V2 codec (see SPEC_FULL.md
/// "Supplemented features" item 5).
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct FrClusterParameters {
    pub macrotick_length_in_ns: u32,
    pub cycle_length_in_macrotick: u32,
    pub gd_cas: u32,
    pub gd_minislot: u32,
    pub gd_static_slot: u32,
    pub gd_symbol_window: u32,
    pub n_static_slots: u32,
    pub p_payload_length_static: u32,
}

/// FlexRay bus adapter descriptor. Only present in protocol V2
/// (spec §4.3).
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct FrController {
    pub id: BusControllerId,
    pub queue_size: u32,
    pub cluster_parameters: FrClusterParameters,
    pub name: String,
    pub channel_name: String,
}

/// Shared behavior every controller descriptor implements, so generic
/// bus-buffer code (spec §9 "Polymorphism over bus kinds") can be
/// written once per-kind without runtime dispatch.
pub trait Controller {
    fn id(&self) -> BusControllerId;
    fn queue_size(&self) -> u32;
}

macro_rules! impl_controller {
    ($ty:ty) => {
        impl Controller for $ty {
            fn id(&self) -> BusControllerId {
                self.id
            }

            fn queue_size(&self) -> u32 {
                self.queue_size
            }
        }
    };
}

impl_controller!(CanController);
impl_controller!(EthController);
impl_controller!(LinController);
impl_controller!(FrController);
