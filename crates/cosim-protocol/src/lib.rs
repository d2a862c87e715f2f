//! Frame kinds and the versioned wire codec (spec §4.3): everything a
//! connection needs to read and write a frame's header and payload,
//! generic over [`cosim_types::Reader`]/[`Writer`] so it never depends
//! on `cosim-net`'s concrete channel type.

pub mod codec;
pub mod frame_kind;
pub mod messages;

pub use codec::{codec_for_version, negotiate, read_connect_ok, Protocol, ProtocolV1, ProtocolV2};
pub use frame_kind::FrameKind;
pub use messages::{
    ConnectFrame, ConnectOkFrame, ErrorFrame, GetPortFrame, GetPortOkFrame, LifecycleFrame, PingOkFrame,
    SetPortFrame, StepOkFrame, UnsetPortFrame,
};
