use std::collections::HashMap;
use std::marker::PhantomData;

use cosim_types::{BusControllerId, BusMessage, CoSimError, Controller, Reader, Result, SimulationTime, Writer};
use tracing::warn;

use crate::ring::RingBuffer;

/// Per-controller bookkeeping (spec §4.6 "controller slot"): live tx/rx
/// counts plus the one-shot-per-session drop-warning flags.
struct ControllerSlot<C> {
    descriptor: C,
    tx_count: u32,
    rx_count: u32,
    tx_warned: bool,
    rx_warned: bool,
}

/// One bus kind's transmit/receive subsystem, generic over its message
/// and controller descriptor types (spec §9 "Polymorphism over bus
/// kinds": monomorphized per kind at compile time rather than dispatched
/// at runtime). `CoSimClient`/`CoSimServer` hold one instance per bus
/// kind (CAN/ETH/LIN/FR).
pub struct BusProtocolBuffer<M, C> {
    controllers: HashMap<BusControllerId, ControllerSlot<C>>,
    tx: RingBuffer<Option<M>>,
    rx: RingBuffer<Option<M>>,
    _marker: PhantomData<M>,
}

impl<M, C> BusProtocolBuffer<M, C>
where
    M: BusMessage,
    C: Controller + Clone,
{
    #[must_use]
    pub fn new(controllers: &[C]) -> Self {
        let total_capacity: u32 = controllers.iter().map(Controller::queue_size).sum();
        let map = controllers
            .iter()
            .cloned()
            .map(|c| {
                (
                    c.id(),
                    ControllerSlot { descriptor: c, tx_count: 0, rx_count: 0, tx_warned: false, rx_warned: false },
                )
            })
            .collect();
        Self {
            controllers: map,
            tx: RingBuffer::new(total_capacity.max(1) as usize),
            rx: RingBuffer::new(total_capacity.max(1) as usize),
            _marker: PhantomData,
        }
    }

    /// Spec §4.6 `Transmit`.
    pub fn transmit(&mut self, message: M) -> Result<()> {
        message.validate()?;
        let controller_id = message.controller_id();
        let slot = self
            .controllers
            .get_mut(&controller_id)
            .ok_or_else(|| CoSimError::InvalidArgument(format!("unknown controller {controller_id}")))?;

        if slot.tx_count >= slot.descriptor.queue_size() {
            if !slot.tx_warned {
                warn!(%controller_id, "transmit queue full, dropping message");
                slot.tx_warned = true;
            }
            return Err(CoSimError::Full);
        }
        self.tx.push_back(Some(message));
        slot.tx_count += 1;
        Ok(())
    }

    /// Spec §4.6 `Receive`.
    pub fn receive(&mut self) -> Result<M> {
        let message = self.rx.pop_front().flatten().ok_or(CoSimError::Empty)?;
        if let Some(slot) = self.controllers.get_mut(&message.controller_id()) {
            slot.rx_count = slot.rx_count.saturating_sub(1);
        }
        Ok(message)
    }

    /// Spec §4.6 `Serialize`: drains the tx ring, writing each message in
    /// push order, and zeroes every slot's tx count.
    pub fn serialize<W: Writer>(&mut self, w: &mut W) -> Result<()> {
        let count = self.tx.len();
        w.write_u32(count as u32)?;
        for _ in 0..count {
            if let Some(message) = self.tx.pop_front().flatten() {
                message.write_to(w)?;
            }
        }
        for slot in self.controllers.values_mut() {
            slot.tx_count = 0;
        }
        Ok(())
    }

    /// Spec §4.6 `Deserialize`: if the caller registered a received-
    /// message callback, invoke it and skip the rx ring entirely;
    /// otherwise enqueue (dropping with a one-shot warning on overflow).
    pub fn deserialize<R: Reader>(
        &mut self,
        r: &mut R,
        sim_time: SimulationTime,
        mut on_received: Option<&mut dyn FnMut(SimulationTime, &M)>,
    ) -> Result<()> {
        let count = r.read_u32()?;
        for _ in 0..count {
            let message = M::read_from(r)?;
            let controller_id = message.controller_id();
            let slot = self.controllers.get_mut(&controller_id).ok_or_else(|| {
                CoSimError::InvalidArgument(format!("unknown controller {controller_id} in Step payload"))
            })?;

            if let Some(cb) = on_received.as_deref_mut() {
                cb(sim_time, &message);
                continue;
            }

            if slot.rx_count >= slot.descriptor.queue_size() {
                if !slot.rx_warned {
                    warn!(%controller_id, "receive queue full, dropping message");
                    slot.rx_warned = true;
                }
                continue;
            }
            self.rx.push_back(Some(message));
            slot.rx_count += 1;
        }
        Ok(())
    }

    /// Spec §4.6 `ClearData`: drains both rings and resets every slot's
    /// counts and warning flags. Called on `Start`.
    pub fn clear_data(&mut self) {
        self.tx.clear_data();
        self.rx.clear_data();
        for slot in self.controllers.values_mut() {
            slot.tx_count = 0;
            slot.rx_count = 0;
            slot.tx_warned = false;
            slot.rx_warned = false;
        }
    }
}
