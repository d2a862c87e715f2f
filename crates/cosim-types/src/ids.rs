/// Signed 64-bit count of nanoseconds. Monotone within a run, reset to
/// zero on `Start`.
pub type SimulationTime = i64;

/// Ticks per second of `SimulationTime`.
pub const SIMULATION_TIME_RESOLUTION_PER_SECOND: i64 = 1_000_000_000;

macro_rules! opaque_id {
    ($name:ident) => {
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
        )]
        #[repr(transparent)]
        pub struct $name(pub u32);

        impl $name {
            #[must_use]
            pub const fn new(raw: u32) -> Self {
                Self(raw)
            }

            #[must_use]
            pub const fn raw(self) -> u32 {
                self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<u32> for $name {
            fn from(raw: u32) -> Self {
                Self(raw)
            }
        }
    };
}

opaque_id!(IoSignalId);
opaque_id!(BusControllerId);
opaque_id!(BusMessageId);
