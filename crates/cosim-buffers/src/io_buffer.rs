use std::collections::HashMap;

use cosim_types::{Callbacks, CoSimError, IoSignal, IoSignalId, Reader, Result, SimulationTime, Writer};

/// Per-signal, per-direction state (spec §4.5 "IO buffer entry"). One
/// `Entry` is shared by both the write-side and read-side view of a
/// signal; which fields are meaningful depends on which map the entry
/// sits in.
#[derive(Debug, Clone)]
struct Entry {
    descriptor: IoSignal,
    length: u32,
    bytes: Vec<u8>,
    dirty: bool,
}

impl Entry {
    fn new(descriptor: IoSignal) -> Self {
        let capacity = descriptor.capacity_bytes();
        Self { descriptor, length: 0, bytes: vec![0; capacity], dirty: false }
    }
}

/// Tracks last-written values and a dirty/change-order queue for one
/// direction of a co-simulation session (spec §4.5). A `CoSimClient`
/// owns one `IoBuffer` with `incoming`/`outgoing` relative to itself;
/// `CoSimServer` builds its own with the roles swapped.
pub struct IoBuffer {
    write_side: HashMap<IoSignalId, Entry>,
    read_side: HashMap<IoSignalId, Entry>,
    change_order: Vec<IoSignalId>,
}

impl IoBuffer {
    /// `outgoing` backs `Write`/`Serialize`; `incoming` backs
    /// `Read`/`Deserialize` (spec §4.5 Initialization).
    #[must_use]
    pub fn new(outgoing: &[IoSignal], incoming: &[IoSignal]) -> Self {
        Self {
            write_side: outgoing.iter().cloned().map(|s| (s.id, Entry::new(s))).collect(),
            read_side: incoming.iter().cloned().map(|s| (s.id, Entry::new(s))).collect(),
            change_order: Vec::new(),
        }
    }

    /// Spec §4.5 `Write`.
    pub fn write(&mut self, signal_id: IoSignalId, length: u32, bytes: &[u8]) -> Result<()> {
        let entry = self
            .write_side
            .get_mut(&signal_id)
            .ok_or_else(|| CoSimError::InvalidArgument(format!("unknown IO signal {signal_id}")))?;

        let max_length = entry.descriptor.max_length;
        let is_fixed = matches!(entry.descriptor.size_kind, cosim_types::SizeKind::Fixed);
        if length > max_length || (is_fixed && length != max_length) {
            return Err(CoSimError::InvalidArgument(format!(
                "signal {signal_id} write length {length} invalid for max {max_length}"
            )));
        }
        let element_size = entry.descriptor.data_type.element_size();
        let byte_len = length as usize * element_size;
        if bytes.len() < byte_len {
            return Err(CoSimError::InvalidArgument(format!(
                "signal {signal_id} write supplied {} bytes, need {byte_len}",
                bytes.len()
            )));
        }

        let changed = entry.length != length || &entry.bytes[..byte_len] != &bytes[..byte_len];
        if !changed {
            return Ok(());
        }

        entry.length = length;
        entry.bytes[..byte_len].copy_from_slice(&bytes[..byte_len]);
        if !entry.dirty {
            entry.dirty = true;
            self.change_order.push(signal_id);
        }
        Ok(())
    }

    /// Spec §4.5 `Read`.
    pub fn read(&self, signal_id: IoSignalId) -> Result<(u32, &[u8])> {
        let entry = self
            .read_side
            .get(&signal_id)
            .ok_or_else(|| CoSimError::InvalidArgument(format!("unknown IO signal {signal_id}")))?;
        let byte_len = entry.length as usize * entry.descriptor.data_type.element_size();
        Ok((entry.length, &entry.bytes[..byte_len]))
    }

    /// Spec §4.5 `Serialize`: writes dirty entries in first-dirty-in-cycle
    /// order, then clears the dirty set.
    pub fn serialize<W: Writer>(&mut self, writer: &mut W) -> Result<()> {
        writer.write_u32(self.change_order.len() as u32)?;
        for signal_id in self.change_order.drain(..) {
            let entry = self.write_side.get_mut(&signal_id).expect("queued id must exist");
            let byte_len = entry.length as usize * entry.descriptor.data_type.element_size();
            writer.write_u32(signal_id.raw())?;
            writer.write_u32(entry.length)?;
            writer.write_bytes(&entry.bytes[..byte_len])?;
            entry.dirty = false;
        }
        Ok(())
    }

    /// Spec §4.5 `Deserialize`: updates the read side and fires the
    /// change callback only when the value actually changed.
    pub fn deserialize<R: Reader>(
        &mut self,
        reader: &mut R,
        sim_time: SimulationTime,
        callbacks: &mut Callbacks,
    ) -> Result<()> {
        let count = reader.read_u32()?;
        for _ in 0..count {
            let signal_id = IoSignalId::new(reader.read_u32()?);
            let length = reader.read_u32()?;

            let entry = self.read_side.get_mut(&signal_id).ok_or_else(|| {
                CoSimError::InvalidArgument(format!("unknown IO signal {signal_id} in Step payload"))
            })?;
            let element_size = entry.descriptor.data_type.element_size();
            let byte_len = length as usize * element_size;
            let mut bytes = vec![0u8; byte_len];
            reader.read_bytes(&mut bytes)?;

            let changed = entry.length != length || entry.bytes[..byte_len] != bytes[..];
            if changed {
                entry.length = length;
                entry.bytes[..byte_len].copy_from_slice(&bytes);
                if let Some(cb) = callbacks.io_signal_changed.as_mut() {
                    cb(sim_time, &entry.descriptor, &entry.bytes[..byte_len]);
                }
            }
        }
        Ok(())
    }

    /// Spec §4.5 `ClearData`: zero all lengths/bytes and drain the
    /// change queue. Called on `Start`.
    pub fn clear_data(&mut self) {
        for entry in self.write_side.values_mut().chain(self.read_side.values_mut()) {
            entry.length = if matches!(entry.descriptor.size_kind, cosim_types::SizeKind::Fixed) {
                entry.descriptor.max_length
            } else {
                0
            };
            entry.bytes.iter_mut().for_each(|b| *b = 0);
            entry.dirty = false;
        }
        self.change_order.clear();
    }
}

#[cfg(test)]
mod test {
    use cosim_types::DataType;

    use super::*;

    fn signal(id: u32, max_length: u32, kind: cosim_types::SizeKind) -> IoSignal {
        IoSignal {
            id: IoSignalId::new(id),
            max_length,
            data_type: DataType::U16,
            size_kind: kind,
            name: format!("signal-{id}"),
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
        fn read_bytes(&mut self, buf: &mut [u8]) -> Result<()> {
            buf.copy_from_slice(&self.buf[self.pos..self.pos + buf.len()]);
            self.pos += buf.len();
            Ok(())
        }
    }

    #[test]
    fn happy_step_round_trips_fixed_signal() {
        let s = signal(1, 3, cosim_types::SizeKind::Fixed);
        let mut out = IoBuffer::new(&[s.clone()], &[]);
        let mut inn = IoBuffer::new(&[], &[s.clone()]);

        let values: [u16; 3] = [0x0011, 0x0022, 0x0033];
        let bytes: Vec<u8> = values.iter().flat_map(|v| v.to_le_bytes()).collect();
        out.write(s.id, 3, &bytes).unwrap();

        let mut wire = VecIo { buf: Vec::new(), pos: 0 };
        out.serialize(&mut wire).unwrap();

        let captured = std::rc::Rc::new(std::cell::RefCell::new(None));
        let captured_cb = captured.clone();
        let mut callbacks = Callbacks::new();
        callbacks.io_signal_changed = Some(Box::new(move |_t, _d, b| {
            *captured_cb.borrow_mut() = Some(b.to_vec());
        }));

        inn.deserialize(&mut wire, 0, &mut callbacks).unwrap();
        assert_eq!(captured.borrow().as_deref(), Some(bytes.as_slice()));
    }

    #[test]
    fn coalesces_repeated_writes_within_one_cycle() {
        let s = signal(1, 3, cosim_types::SizeKind::Fixed);
        let mut out = IoBuffer::new(&[s.clone()], &[]);

        let first: Vec<u8> = [1u16, 1, 1].iter().flat_map(|v| v.to_le_bytes()).collect();
        let second: Vec<u8> = [2u16, 2, 2].iter().flat_map(|v| v.to_le_bytes()).collect();
        out.write(s.id, 3, &first).unwrap();
        out.write(s.id, 3, &second).unwrap();

        let mut wire = VecIo { buf: Vec::new(), pos: 0 };
        out.serialize(&mut wire).unwrap();

        assert_eq!(u32::from_le_bytes(wire.buf[0..4].try_into().unwrap()), 1);
    }

    #[test]
    fn fixed_write_with_wrong_length_is_invalid() {
        let s = signal(1, 3, cosim_types::SizeKind::Fixed);
        let mut out = IoBuffer::new(&[s.clone()], &[]);
        let bytes = vec![0u8; 4];
        assert!(matches!(out.write(s.id, 2, &bytes), Err(CoSimError::InvalidArgument(_))));
    }

    #[test]
    fn variable_write_over_max_is_invalid() {
        let s = signal(1, 3, cosim_types::SizeKind::Variable);
        let mut out = IoBuffer::new(&[s.clone()], &[]);
        let bytes = vec![0u8; 8];
        assert!(matches!(out.write(s.id, 4, &bytes), Err(CoSimError::InvalidArgument(_))));
    }

    #[test]
    fn clear_data_resets_fixed_signal_to_zeroed_max_length() {
        let s = signal(1, 3, cosim_types::SizeKind::Fixed);
        let mut out = IoBuffer::new(&[s.clone()], &[]);
        let bytes: Vec<u8> = [1u16, 1, 1].iter().flat_map(|v| v.to_le_bytes()).collect();
        out.write(s.id, 3, &bytes).unwrap();
        out.clear_data();
        let (len, read_bytes) = {
            // clear_data zeroes the write side too, but Read() looks at
            // read_side; mirror the signal there for this assertion.
            let mut inn = IoBuffer::new(&[], &[s.clone()]);
            inn.clear_data();
            let (l, b) = inn.read(s.id).unwrap();
            (l, b.to_vec())
        };
        assert_eq!(len, 3);
        assert!(read_bytes.iter().all(|b| *b == 0));
        let _ = out;
    }
}
