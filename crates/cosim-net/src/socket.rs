use std::io::{self, Read, Write};
use std::net::{SocketAddr, TcpStream as StdTcpStream};
use std::os::unix::net::UnixStream as StdUnixStream;
use std::path::{Path, PathBuf};
use std::time::Duration;

use cosim_types::{CoSimError, Result};
use socket2::{Domain, Socket, Type};

/// Address family a listener/connection operates over (spec §4.1). The
/// "local" family is a Unix domain socket on POSIX; this workspace does
/// not target Windows, so the named-pipe variant from the original is
/// not implemented (see `DESIGN.md`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressFamily {
    Ipv4,
    Ipv6,
    Local,
}

/// One connected, blocking duplex byte stream, abstracting over TCP and
/// Unix-domain-socket transports so the framed channel above it (spec
/// §4.2) does not need to know which family it is running over.
pub enum BlockingStream {
    Tcp(StdTcpStream),
    Unix(StdUnixStream),
}

impl BlockingStream {
    /// Enables `TCP_NODELAY`; a no-op for the local transport (spec
    /// §4.1: "TCP sockets enable TCP_NODELAY").
    pub fn set_nodelay(&self) -> Result<()> {
        if let Self::Tcp(s) = self {
            s.set_nodelay(true)?;
        }
        Ok(())
    }

    pub fn set_read_timeout(&self, timeout: Option<Duration>) -> Result<()> {
        match self {
            Self::Tcp(s) => s.set_read_timeout(timeout)?,
            Self::Unix(s) => s.set_read_timeout(timeout)?,
        }
        Ok(())
    }

    /// Loops over partial sends until `buf` is fully written (spec
    /// §4.1: "`Send` and `Receive` report short counts and the caller
    /// loops until the span is complete").
    pub fn send_all(&mut self, buf: &[u8]) -> Result<()> {
        let mut written = 0;
        while written < buf.len() {
            let n = match self {
                Self::Tcp(s) => s.write(&buf[written..]),
                Self::Unix(s) => s.write(&buf[written..]),
            };
            match n {
                Ok(0) => return Err(CoSimError::Disconnected),
                Ok(n) => written += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(classify(e)),
            }
        }
        Ok(())
    }

    /// Loops over partial reads until `buf` is fully populated.
    pub fn receive_all(&mut self, buf: &mut [u8]) -> Result<()> {
        let mut read = 0;
        while read < buf.len() {
            let n = match self {
                Self::Tcp(s) => s.read(&mut buf[read..]),
                Self::Unix(s) => s.read(&mut buf[read..]),
            };
            match n {
                Ok(0) => return Err(CoSimError::Disconnected),
                Ok(n) => read += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(classify(e)),
            }
        }
        Ok(())
    }
}

fn classify(e: io::Error) -> CoSimError {
    match e.kind() {
        io::ErrorKind::ConnectionReset
        | io::ErrorKind::ConnectionAborted
        | io::ErrorKind::BrokenPipe
        | io::ErrorKind::UnexpectedEof
        | io::ErrorKind::TimedOut => CoSimError::Disconnected,
        _ => CoSimError::Io(e),
    }
}

/// Connects to a TCP peer. `local_port` of `0` lets the OS choose the
/// local port; otherwise the socket is bound to it before `connect(2)`
/// (spec §6 "local-port (u16, 0 → OS choose)").
pub fn tcp_connect(ip: &str, remote_port: u16, local_port: u16) -> Result<BlockingStream> {
    let remote: SocketAddr = format!("{ip}:{remote_port}")
        .parse()
        .map_err(|_| CoSimError::InvalidArgument(format!("invalid address {ip}:{remote_port}")))?;
    let domain = if remote.is_ipv6() { Domain::IPV6 } else { Domain::IPV4 };
    let socket = Socket::new(domain, Type::STREAM, None).map_err(classify)?;
    if local_port != 0 {
        let local: SocketAddr = if remote.is_ipv6() {
            format!("[::]:{local_port}").parse().expect("valid literal")
        } else {
            format!("0.0.0.0:{local_port}").parse().expect("valid literal")
        };
        socket.bind(&local.into()).map_err(classify)?;
    }
    socket.connect(&remote.into()).map_err(classify)?;
    let stream: StdTcpStream = socket.into();
    stream.set_nodelay(true)?;
    Ok(BlockingStream::Tcp(stream))
}

/// Connects to a local Unix-domain-socket server identified by
/// `server_name` (SPEC_FULL.md supplemented feature 1: path derived as
/// `/tmp/cosim_{server_name}`).
pub fn local_connect(server_name: &str) -> Result<BlockingStream> {
    let path = local_socket_path(server_name);
    let stream = StdUnixStream::connect(&path)?;
    Ok(BlockingStream::Unix(stream))
}

#[must_use]
pub fn local_socket_path(server_name: &str) -> PathBuf {
    PathBuf::from(format!("/tmp/cosim_{server_name}"))
}

/// Path helper for tests wanting a scratch local-transport socket,
/// avoiding collisions between concurrently-running test binaries.
#[must_use]
pub fn scratch_local_path(dir: &Path, name: &str) -> PathBuf {
    dir.join(format!("cosim_{name}.sock"))
}
