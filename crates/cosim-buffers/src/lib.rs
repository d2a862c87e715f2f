//! In-process buffering between the wire codec and simulation callbacks:
//! the IO signal cache, the generic per-bus-kind transmit/receive rings,
//! and the ring buffer primitive they're both built on.
//!
//! Generic over [`cosim_types::codec::Reader`]/[`Writer`] rather than
//! `cosim_net::Channel` directly, so this crate never depends on
//! `cosim-net` — a socket-backed `Channel` just happens to implement
//! both traits.

pub mod bus_buffer;
pub mod io_buffer;
pub mod ring;

pub use bus_buffer::BusProtocolBuffer;
pub use io_buffer::IoBuffer;
pub use ring::RingBuffer;

use cosim_types::{
    CanController, CanMessage, Callbacks, EthController, EthMessage, FrController, FrMessage,
    LinController, LinMessage, Reader, Result, SimulationTime, Writer,
};

/// The closed set of four bus kinds (spec §4.6), composed into the one
/// object a `CoSimClient`/`CoSimServer` actually holds.
pub struct BusBuffer {
    pub can: BusProtocolBuffer<CanMessage, CanController>,
    pub eth: BusProtocolBuffer<EthMessage, EthController>,
    pub lin: BusProtocolBuffer<LinMessage, LinController>,
    pub fr: BusProtocolBuffer<FrMessage, FrController>,
}

impl BusBuffer {
    #[must_use]
    pub fn new(
        can_controllers: &[CanController],
        eth_controllers: &[EthController],
        lin_controllers: &[LinController],
        fr_controllers: &[FrController],
    ) -> Self {
        Self {
            can: BusProtocolBuffer::new(can_controllers),
            eth: BusProtocolBuffer::new(eth_controllers),
            lin: BusProtocolBuffer::new(lin_controllers),
            fr: BusProtocolBuffer::new(fr_controllers),
        }
    }

    /// Serializes all four kinds' tx rings in a fixed order (spec §4.6
    /// Step payload layout: CAN, ETH, LIN, FR).
    pub fn serialize<W: Writer>(&mut self, w: &mut W) -> Result<()> {
        self.can.serialize(w)?;
        self.eth.serialize(w)?;
        self.lin.serialize(w)?;
        self.fr.serialize(w)
    }

    /// Fires the matching `*_message_received` callback per kind when the
    /// caller registered one; suppresses rx-ring enqueue for that kind
    /// while it is set (spec §4.6 `Deserialize`).
    pub fn deserialize<R: Reader>(
        &mut self,
        r: &mut R,
        sim_time: SimulationTime,
        callbacks: &mut Callbacks,
    ) -> Result<()> {
        self.can.deserialize(
            r,
            sim_time,
            callbacks.can_message_received.as_deref_mut().map(|f| f as &mut dyn FnMut(_, _)),
        )?;
        self.eth.deserialize(
            r,
            sim_time,
            callbacks.eth_message_received.as_deref_mut().map(|f| f as &mut dyn FnMut(_, _)),
        )?;
        self.lin.deserialize(
            r,
            sim_time,
            callbacks.lin_message_received.as_deref_mut().map(|f| f as &mut dyn FnMut(_, _)),
        )?;
        self.fr.deserialize(
            r,
            sim_time,
            callbacks.fr_message_received.as_deref_mut().map(|f| f as &mut dyn FnMut(_, _)),
        )
    }

    pub fn clear_data(&mut self) {
        self.can.clear_data();
        self.eth.clear_data();
        self.lin.clear_data();
        self.fr.clear_data();
    }
}

#[cfg(test)]
mod test {
    use cosim_types::{BusControllerId, CanMessageFlags, CoSimError};

    use super::*;

    fn controller(id: u32, queue_size: u32) -> CanController {
        CanController {
            id: BusControllerId::new(id),
            queue_size,
            bit_rate: 500_000,
            fd_bit_rate: 2_000_000,
            name: format!("can-{id}"),
            channel_name: format!("channel-{id}"),
        }
    }

    fn message(controller_id: u32, byte: u8) -> CanMessage {
        CanMessage {
            timestamp: 0,
            controller_id: BusControllerId::new(controller_id),
            can_id: 0x100,
            flags: CanMessageFlags::empty(),
            data: vec![byte],
        }
    }

    #[test]
    fn can_round_trip_under_pressure() {
        let mut buf: BusProtocolBuffer<CanMessage, CanController> =
            BusProtocolBuffer::new(&[controller(1, 2)]);

        assert!(buf.transmit(message(1, 1)).is_ok());
        assert!(buf.transmit(message(1, 2)).is_ok());
        assert!(matches!(buf.transmit(message(1, 3)), Err(CoSimError::Full)));

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

        let mut wire = VecIo { buf: Vec::new(), pos: 0 };
        buf.serialize(&mut wire).unwrap();

        let mut rx_buf: BusProtocolBuffer<CanMessage, CanController> =
            BusProtocolBuffer::new(&[controller(1, 2)]);
        rx_buf.deserialize(&mut wire, 0, None).unwrap();

        assert_eq!(rx_buf.receive().unwrap().data, vec![1]);
        assert_eq!(rx_buf.receive().unwrap().data, vec![2]);
        assert!(matches!(rx_buf.receive(), Err(CoSimError::Empty)));
    }

    #[test]
    fn unknown_controller_is_rejected() {
        let mut buf: BusProtocolBuffer<CanMessage, CanController> =
            BusProtocolBuffer::new(&[controller(1, 2)]);
        assert!(matches!(buf.transmit(message(99, 1)), Err(CoSimError::InvalidArgument(_))));
    }
}
