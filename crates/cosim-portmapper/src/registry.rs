use std::collections::HashMap;
use std::sync::Mutex;

use cosim_types::{CoSimError, Result};

/// Name → TCP port registry (spec §4.7). Access is serialized by one
/// mutex around the map; `SetPort` overwrites an existing entry for the
/// same name.
#[derive(Default)]
pub struct Registry {
    ports: Mutex<HashMap<String, u16>>,
}

impl Registry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_port(&self, name: &str, port: u16) {
        self.ports.lock().expect("registry mutex poisoned").insert(name.to_string(), port);
    }

    pub fn unset_port(&self, name: &str) {
        self.ports.lock().expect("registry mutex poisoned").remove(name);
    }

    pub fn get_port(&self, name: &str) -> Result<u16> {
        self.ports
            .lock()
            .expect("registry mutex poisoned")
            .get(name)
            .copied()
            .ok_or_else(|| CoSimError::Protocol(format!("no port registered for {name}")))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn set_then_get_round_trips() {
        let registry = Registry::new();
        registry.set_port("sim-a", 4000);
        assert_eq!(registry.get_port("sim-a").unwrap(), 4000);
    }

    #[test]
    fn set_overwrites_existing_entry() {
        let registry = Registry::new();
        registry.set_port("sim-a", 4000);
        registry.set_port("sim-a", 4001);
        assert_eq!(registry.get_port("sim-a").unwrap(), 4001);
    }

    #[test]
    fn unset_then_get_is_an_error() {
        let registry = Registry::new();
        registry.set_port("sim-a", 4000);
        registry.unset_port("sim-a");
        assert!(registry.get_port("sim-a").is_err());
    }

    #[test]
    fn unknown_name_is_an_error() {
        let registry = Registry::new();
        assert!(registry.get_port("unknown").is_err());
    }
}
