use std::io;
use std::os::fd::{FromRawFd, IntoRawFd};
use std::path::{Path, PathBuf};
use std::time::Duration;

use mio::net::{TcpListener as MioTcpListener, UnixListener as MioUnixListener};
use mio::{Events, Interest, Poll, Token};

use cosim_types::Result;

use crate::socket::BlockingStream;

const LISTENER: Token = Token(0);

/// A listening socket polled cooperatively so the accept loop can check a
/// stop flag between attempts (spec §4.1: "Accept uses a short poll
/// (≈100 ms)"; spec §4.9 background service). Mio is used purely for this
/// readiness check — once a connection is accepted it is converted to a
/// blocking stream for all subsequent I/O (spec §5 concurrency model is
/// predominantly blocking per connection).
pub enum Listener {
    Tcp { listener: MioTcpListener, poll: Poll, events: Events },
    Local { listener: MioUnixListener, poll: Poll, events: Events, path: PathBuf },
}

impl Listener {
    /// Binds a TCP listener. `port == 0` yields an OS-chosen port,
    /// readable back via [`Listener::local_port`].
    pub fn bind_tcp(port: u16, enable_remote_access: bool) -> Result<Self> {
        let host = if enable_remote_access { "0.0.0.0" } else { "127.0.0.1" };
        let addr = format!("{host}:{port}").parse().expect("valid literal");
        let mut listener = MioTcpListener::bind(addr)?;
        let poll = Poll::new()?;
        poll.registry().register(&mut listener, LISTENER, Interest::READABLE)?;
        Ok(Self::Tcp { listener, poll, events: Events::with_capacity(4) })
    }

    /// Binds a local (Unix-domain-socket) listener at a path derived from
    /// `server_name`.
    pub fn bind_local(server_name: &str) -> Result<Self> {
        let path = crate::socket::local_socket_path(server_name);
        if path.exists() {
            std::fs::remove_file(&path)?;
        }
        let mut listener = MioUnixListener::bind(&path)?;
        let poll = Poll::new()?;
        poll.registry().register(&mut listener, LISTENER, Interest::READABLE)?;
        Ok(Self::Local { listener, poll, events: Events::with_capacity(4), path })
    }

    #[must_use]
    pub fn local_port(&self) -> Option<u16> {
        match self {
            Self::Tcp { listener, .. } => listener.local_addr().ok().map(|a| a.port()),
            Self::Local { .. } => None,
        }
    }

    /// Waits up to `timeout` (spec default ≈100ms) for an incoming
    /// connection; returns `Ok(None)` on timeout so the caller can check
    /// its stop flag and retry.
    pub fn accept(&mut self, timeout: Duration) -> Result<Option<BlockingStream>> {
        match self {
            Self::Tcp { listener, poll, events } => {
                poll.poll(events, Some(timeout))?;
                if events.is_empty() {
                    return Ok(None);
                }
                let (stream, _peer) = match listener.accept() {
                    Ok(pair) => pair,
                    Err(e) if e.kind() == io::ErrorKind::WouldBlock => return Ok(None),
                    Err(e) => return Err(e.into()),
                };
                let fd = stream.into_raw_fd();
                let std_stream = unsafe { std::net::TcpStream::from_raw_fd(fd) };
                std_stream.set_nonblocking(false)?;
                Ok(Some(BlockingStream::Tcp(std_stream)))
            }
            Self::Local { listener, poll, events, .. } => {
                poll.poll(events, Some(timeout))?;
                if events.is_empty() {
                    return Ok(None);
                }
                let (stream, _peer) = match listener.accept() {
                    Ok(pair) => pair,
                    Err(e) if e.kind() == io::ErrorKind::WouldBlock => return Ok(None),
                    Err(e) => return Err(e.into()),
                };
                let fd = stream.into_raw_fd();
                let std_stream = unsafe { std::os::unix::net::UnixStream::from_raw_fd(fd) };
                std_stream.set_nonblocking(false)?;
                Ok(Some(BlockingStream::Unix(std_stream)))
            }
        }
    }

    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        match self {
            Self::Local { path, .. } => Some(path),
            Self::Tcp { .. } => None,
        }
    }
}

impl Drop for Listener {
    fn drop(&mut self) {
        if let Self::Local { path, .. } = self {
            let _ = std::fs::remove_file(path);
        }
    }
}
