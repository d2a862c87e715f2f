use crate::constants::{
    CAN_MESSAGE_MAX_LENGTH, ETH_MESSAGE_MAX_LENGTH, FR_MESSAGE_MAX_LENGTH, LIN_MESSAGE_MAX_LENGTH,
};
use crate::error::{CoSimError, Result};
use crate::ids::{BusControllerId, BusMessageId, SimulationTime};

bitflags::bitflags! {
    /// CAN message flag bitset (spec §8 boundary behaviors).
    #[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
    pub struct CanMessageFlags: u32 {
        const LOOPBACK = 1 << 0;
        const ERROR_FRAME = 1 << 1;
        const EXTENDED_ID = 1 << 2;
        const FLEXIBLE_DATA_RATE_FORMAT = 1 << 3;
        const BIT_RATE_SWITCH = 1 << 4;
    }
}

bitflags::bitflags! {
    /// Ethernet message flag bitset.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
    pub struct EthMessageFlags: u32 {
        const LOOPBACK = 1 << 0;
        const ERROR_FRAME = 1 << 1;
    }
}

bitflags::bitflags! {
    /// LIN message flag bitset.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
    pub struct LinMessageFlags: u32 {
        const LOOPBACK = 1 << 0;
        const ERROR_FRAME = 1 << 1;
        const WAKE_EVENT = 1 << 2;
    }
}

bitflags::bitflags! {
    /// FlexRay message flag bitset.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
    pub struct FrMessageFlags: u32 {
        const LOOPBACK = 1 << 0;
        const ERROR_FRAME = 1 << 1;
        const STARTUP_FRAME = 1 << 2;
        const SYNC_FRAME = 1 << 3;
    }
}

macro_rules! bus_message {
    ($name:ident, $flags:ty, $max:expr, $id_field:ident : $id_ty:ty) => {
        #[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
        pub struct $name {
            pub timestamp: SimulationTime,
            pub controller_id: BusControllerId,
            pub $id_field: $id_ty,
            pub flags: $flags,
            pub data: Vec<u8>,
        }

        impl $name {
            pub const MAX_LENGTH: usize = $max;

            /// Length validation shared by every kind (spec §4.6): the
            /// payload must fit the kind-specific maximum.
            pub fn check_length(&self) -> Result<()> {
                if self.data.len() > Self::MAX_LENGTH {
                    return Err(CoSimError::InvalidArgument(format!(
                        "{} message length {} exceeds max {}",
                        stringify!($name),
                        self.data.len(),
                        Self::MAX_LENGTH
                    )));
                }
                Ok(())
            }

            /// Scalar fields in declaration order, then the payload (spec
            /// §4.6 "Per-message serialization").
            pub fn write_to<W: crate::codec::Writer>(&self, w: &mut W) -> Result<()> {
                w.write_i64(self.timestamp)?;
                w.write_u32(self.controller_id.raw())?;
                w.write_u32(self.$id_field)?;
                w.write_u32(self.flags.bits())?;
                w.write_u32(self.data.len() as u32)?;
                w.write_bytes(&self.data)
            }

            pub fn read_from<R: crate::codec::Reader>(r: &mut R) -> Result<Self> {
                let timestamp = r.read_i64()?;
                let controller_id = BusControllerId::new(r.read_u32()?);
                let $id_field = r.read_u32()?;
                let flags = <$flags>::from_bits_truncate(r.read_u32()?);
                let length = r.read_u32()? as usize;
                let mut data = vec![0u8; length];
                r.read_bytes(&mut data)?;
                let message = Self { timestamp, controller_id, $id_field, flags, data };
                message.check_length()?;
                Ok(message)
            }
        }
    };
}

bus_message!(CanMessage, CanMessageFlags, CAN_MESSAGE_MAX_LENGTH, can_id: u32);
bus_message!(EthMessage, EthMessageFlags, ETH_MESSAGE_MAX_LENGTH, reserved: u32);
bus_message!(LinMessage, LinMessageFlags, LIN_MESSAGE_MAX_LENGTH, lin_id: u32);
bus_message!(FrMessage, FrMessageFlags, FR_MESSAGE_MAX_LENGTH, frame_id: u32);

impl CanMessage {
    /// Boundary behaviors from spec §8: payload > 8 bytes requires FDF;
    /// BRS requires FDF.
    pub fn check_flags(&self) -> Result<()> {
        self.check_length()?;
        let fdf = self.flags.contains(CanMessageFlags::FLEXIBLE_DATA_RATE_FORMAT);
        let brs = self.flags.contains(CanMessageFlags::BIT_RATE_SWITCH);
        if self.data.len() > 8 && !fdf {
            return Err(CoSimError::InvalidArgument(
                "CAN payload longer than 8 bytes requires FlexibleDataRateFormat".into(),
            ));
        }
        if brs && !fdf {
            return Err(CoSimError::InvalidArgument(
                "CAN BitRateSwitch requires FlexibleDataRateFormat".into(),
            ));
        }
        Ok(())
    }
}

/// Shared contract every bus message kind implements, so the generic bus
/// buffer (spec §9 "Polymorphism over bus kinds") can be written once
/// per-kind without runtime dispatch.
pub trait BusMessage: Clone + Sized {
    const MAX_LENGTH: usize;

    fn controller_id(&self) -> BusControllerId;
    fn validate(&self) -> Result<()>;
    fn write_to<W: crate::codec::Writer>(&self, w: &mut W) -> Result<()>;
    fn read_from<R: crate::codec::Reader>(r: &mut R) -> Result<Self>;
}

macro_rules! impl_bus_message {
    ($ty:ty) => {
        impl BusMessage for $ty {
            const MAX_LENGTH: usize = <$ty>::MAX_LENGTH;

            fn controller_id(&self) -> BusControllerId {
                self.controller_id
            }

            fn validate(&self) -> Result<()> {
                self.check_length()
            }

            fn write_to<W: crate::codec::Writer>(&self, w: &mut W) -> Result<()> {
                <$ty>::write_to(self, w)
            }

            fn read_from<R: crate::codec::Reader>(r: &mut R) -> Result<Self> {
                <$ty>::read_from(r)
            }
        }
    };
}

impl_bus_message!(EthMessage);
impl_bus_message!(LinMessage);
impl_bus_message!(FrMessage);

impl BusMessage for CanMessage {
    const MAX_LENGTH: usize = CanMessage::MAX_LENGTH;

    fn controller_id(&self) -> BusControllerId {
        self.controller_id
    }

    fn validate(&self) -> Result<()> {
        self.check_flags()
    }

    fn write_to<W: crate::codec::Writer>(&self, w: &mut W) -> Result<()> {
        CanMessage::write_to(self, w)
    }

    fn read_from<R: crate::codec::Reader>(r: &mut R) -> Result<Self> {
        CanMessage::read_from(r)
    }
}

/// Bus message kinds an id can refer to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum BusKind {
    Can,
    Eth,
    Lin,
    Fr,
}
