//! Cross-family blocking stream sockets (spec §4.1) and the
//! length-prefixed framed channel built on top of them (spec §4.2).
//!
//! Mio appears only in [`listener`], driving the cooperative ~100ms
//! accept poll; every other socket operation in this crate is a
//! blocking `std::net`/`std::os::unix::net` call, matching the
//! predominantly-cooperative-per-connection concurrency model (spec §5).

pub mod channel;
pub mod listener;
pub mod socket;

pub use channel::Channel;
pub use cosim_types::{Reader, Writer};
pub use listener::Listener;
pub use socket::{AddressFamily, BlockingStream, local_connect, local_socket_path, tcp_connect};
