use cosim_types::{constants, Reader, Result, Writer};

use crate::messages::ConnectOkFrame;

/// Per-version wire schema for the frames that actually differ between
/// versions (spec §9 "Protocol version handling": "encode each version's
/// schema as a distinct codec implementation behind a common interface").
/// Every other frame kind (`Connect`, `Step`, `StepOk`, `Ping`, `PingOk`,
/// lifecycle commands, port-mapper RPCs) is version-invariant and is
/// read/written directly through the payload types in [`crate::messages`]
/// without going through this trait.
pub trait Protocol: Send + Sync {
    fn version(&self) -> u32;

    fn write_connect_ok(&self, w: &mut dyn Writer, payload: &ConnectOkFrame) -> Result<()>;

    /// Reads everything after `version`, which the caller has already
    /// consumed (see [`read_connect_ok`]).
    fn read_connect_ok_body(&self, version: u32, r: &mut dyn Reader) -> Result<ConnectOkFrame>;
}

/// Baseline protocol: IO + CAN + ETH + LIN. No FlexRay fields on the
/// wire (spec §4.3).
pub struct ProtocolV1;

impl Protocol for ProtocolV1 {
    fn version(&self) -> u32 {
        constants::PROTOCOL_V1
    }

    fn write_connect_ok(&self, w: &mut dyn Writer, payload: &ConnectOkFrame) -> Result<()> {
        payload.write_v1(w)
    }

    fn read_connect_ok_body(&self, version: u32, r: &mut dyn Reader) -> Result<ConnectOkFrame> {
        ConnectOkFrame::read_v1_body(version, r)
    }
}

/// Adds FlexRay controllers and messages (spec §4.3; SPEC_FULL.md
/// supplemented feature 5).
pub struct ProtocolV2;

impl Protocol for ProtocolV2 {
    fn version(&self) -> u32 {
        constants::PROTOCOL_V2
    }

    fn write_connect_ok(&self, w: &mut dyn Writer, payload: &ConnectOkFrame) -> Result<()> {
        payload.write_v2(w)
    }

    fn read_connect_ok_body(&self, version: u32, r: &mut dyn Reader) -> Result<ConnectOkFrame> {
        ConnectOkFrame::read_v2_body(version, r)
    }
}

/// Reads a `ConnectOk` payload off the wire without knowing the
/// negotiated version ahead of time: the version field is version-
/// invariant (always the first `u32`), so it's read generically, then
/// used to pick the codec that decodes the rest (spec §4.3: "the server
/// ... sends `ConnectOk` echoing the chosen version first").
pub fn read_connect_ok(r: &mut dyn Reader) -> Result<ConnectOkFrame> {
    let version = r.read_u32()?;
    codec_for_version(version).read_connect_ok_body(version, r)
}

/// Builds the codec for a negotiated version. The connection holds the
/// returned trait object for its lifetime (spec §9: "the connection
/// carries a live pointer to the negotiated codec").
#[must_use]
pub fn codec_for_version(version: u32) -> Box<dyn Protocol> {
    if version >= constants::PROTOCOL_V2 { Box::new(ProtocolV2) } else { Box::new(ProtocolV1) }
}

/// Server-side negotiation: the chosen version is the lower of what the
/// client advertised and the highest version this server implements
/// (spec §4.3).
#[must_use]
pub fn negotiate(client_version: u32) -> u32 {
    client_version.min(constants::LATEST_PROTOCOL_VERSION)
}

#[cfg(test)]
mod test {
    use cosim_types::{BusControllerId, SimulationState};

    use super::*;

    fn sample_payload(fr: Vec<cosim_types::FrController>) -> ConnectOkFrame {
        ConnectOkFrame {
            version: constants::PROTOCOL_V2,
            step_size: 1_000_000,
            state: SimulationState::Stopped,
            can_controllers: vec![],
            eth_controllers: vec![],
            lin_controllers: vec![],
            fr_controllers: fr,
            incoming_signals: vec![],
            outgoing_signals: vec![],
        }
    }

    struct VecIo {
        buf: Vec<u8>,
        pos: usize,
    }
    impl Writer for VecIo {
        fn write_bytes(&mut self, bytes: &[u8]) -> Result<()> {
            self.buf.extend_from_slice(bytes);
            Ok(())
        }
    }
    impl Reader for VecIo {
        fn read_bytes(&mut self, out: &mut [u8]) -> Result<()> {
            out.copy_from_slice(&self.buf[self.pos..self.pos + out.len()]);
            self.pos += out.len();
            Ok(())
        }
    }

    #[test]
    fn negotiates_down_to_the_lower_version() {
        assert_eq!(negotiate(constants::PROTOCOL_V1), constants::PROTOCOL_V1);
        assert_eq!(negotiate(constants::PROTOCOL_V2), constants::PROTOCOL_V2);
        assert_eq!(negotiate(0x0003_0000), constants::LATEST_PROTOCOL_VERSION);
    }

    #[test]
    fn v1_codec_drops_flex_ray_controllers_on_the_wire() {
        let codec = codec_for_version(constants::PROTOCOL_V1);
        let payload = sample_payload(vec![cosim_types::FrController {
            id: BusControllerId::new(1),
            queue_size: 4,
            cluster_parameters: cosim_types::FrClusterParameters {
                macrotick_length_in_ns: 1,
                cycle_length_in_macrotick: 2,
                gd_cas: 3,
                gd_minislot: 4,
                gd_static_slot: 5,
                gd_symbol_window: 6,
                n_static_slots: 7,
                p_payload_length_static: 8,
            },
            name: "fr0".into(),
            channel_name: "ch0".into(),
        }]);

        let mut wire = VecIo { buf: Vec::new(), pos: 0 };
        codec.write_connect_ok(&mut wire, &payload).unwrap();
        let decoded = read_connect_ok(&mut wire).unwrap();
        assert!(decoded.fr_controllers.is_empty());
    }

    #[test]
    fn v2_codec_round_trips_flex_ray_controllers() {
        let codec = codec_for_version(constants::PROTOCOL_V2);
        let fr = cosim_types::FrController {
            id: BusControllerId::new(7),
            queue_size: 2,
            cluster_parameters: cosim_types::FrClusterParameters {
                macrotick_length_in_ns: 10,
                cycle_length_in_macrotick: 20,
                gd_cas: 30,
                gd_minislot: 40,
                gd_static_slot: 50,
                gd_symbol_window: 60,
                n_static_slots: 70,
                p_payload_length_static: 80,
            },
            name: "fr1".into(),
            channel_name: "ch1".into(),
        };
        let payload = sample_payload(vec![fr.clone()]);

        let mut wire = VecIo { buf: Vec::new(), pos: 0 };
        codec.write_connect_ok(&mut wire, &payload).unwrap();
        let decoded = read_connect_ok(&mut wire).unwrap();
        assert_eq!(decoded.fr_controllers, vec![fr]);
    }
}
