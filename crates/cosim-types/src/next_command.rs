use std::sync::atomic::{AtomicU8, Ordering};

use crate::command::Command;

const NONE: u8 = 0xFF;

/// The client's single atomic next-command slot (spec §9 "Atomic
/// next-command"). Any consistent single-slot lock-free exchange
/// suffices; this one uses a `u8` sentinel rather than an
/// `AtomicPtr`/`Mutex<Option<Command>>` pair, matching how the original
/// keeps the field trivially-copyable.
#[derive(Debug, Default)]
pub struct NextCommandSlot(AtomicU8);

impl NextCommandSlot {
    #[must_use]
    pub const fn new() -> Self {
        Self(AtomicU8::new(NONE))
    }

    /// Called from any public `Start`/`Stop`/`Pause`/`Continue`/`Terminate`
    /// method; overwrites whatever was previously requested.
    pub fn request(&self, command: Command) {
        self.0.store(command as u8, Ordering::SeqCst);
    }

    /// Exchanges the slot for "none requested" and returns whatever was
    /// there, used when composing a `StepOk`/`PingOk` frame.
    pub fn take(&self) -> Option<Command> {
        let raw = self.0.swap(NONE, Ordering::SeqCst);
        decode(raw)
    }
}

fn decode(raw: u8) -> Option<Command> {
    match raw {
        0 => Some(Command::Start),
        1 => Some(Command::Stop),
        2 => Some(Command::Pause),
        3 => Some(Command::Continue),
        4 => Some(Command::Terminate),
        _ => None,
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn empty_slot_takes_none() {
        let slot = NextCommandSlot::new();
        assert_eq!(slot.take(), None);
    }

    #[test]
    fn request_then_take_roundtrips_once() {
        let slot = NextCommandSlot::new();
        slot.request(Command::Pause);
        assert_eq!(slot.take(), Some(Command::Pause));
        assert_eq!(slot.take(), None);
    }

    #[test]
    fn later_request_overwrites_earlier() {
        let slot = NextCommandSlot::new();
        slot.request(Command::Start);
        slot.request(Command::Terminate);
        assert_eq!(slot.take(), Some(Command::Terminate));
    }
}
