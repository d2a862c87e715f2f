use cosim_net::Channel;
use cosim_protocol::{ErrorFrame, FrameKind, GetPortFrame, GetPortOkFrame, SetPortFrame, UnsetPortFrame};
use cosim_types::{CoSimError, Result};

/// Resolves the port-mapper's own TCP port: the `VEOS_COSIM_PORTMAPPER_PORT`
/// environment override if set and parseable, else the default (spec §4.7,
/// §6).
#[must_use]
pub fn mapper_port() -> u16 {
    std::env::var(cosim_types::constants::PORT_MAPPER_PORT_ENV_VAR)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(cosim_types::constants::DEFAULT_PORT_MAPPER_PORT)
}

fn connect(host: &str, mapper_port: u16) -> Result<Channel> {
    let stream = cosim_net::tcp_connect(host, mapper_port, 0)?;
    Ok(Channel::new(stream))
}

fn read_error(channel: &mut Channel) -> Result<CoSimError> {
    Ok(CoSimError::Protocol(ErrorFrame::read(channel)?.message))
}

/// `SetPort(name, port)` → `Ok` or `Error` (spec §4.7). Servers call this
/// on listen-start.
pub fn set_port(host: &str, mapper_port: u16, name: &str, port: u16) -> Result<()> {
    let mut channel = connect(host, mapper_port)?;
    FrameKind::SetPort.write(&mut channel)?;
    SetPortFrame { name: name.to_string(), port }.write(&mut channel)?;
    channel.end_write()?;

    channel.begin_read_frame()?;
    match FrameKind::read(&mut channel)? {
        FrameKind::Ok => Ok(()),
        FrameKind::Error => Err(read_error(&mut channel)?),
        other => Err(CoSimError::Protocol(format!("unexpected SetPort response frame {other:?}"))),
    }
}

/// `UnsetPort(name)` → `Ok` (spec §4.7). Servers call this on shutdown.
pub fn unset_port(host: &str, mapper_port: u16, name: &str) -> Result<()> {
    let mut channel = connect(host, mapper_port)?;
    FrameKind::UnsetPort.write(&mut channel)?;
    UnsetPortFrame { name: name.to_string() }.write(&mut channel)?;
    channel.end_write()?;

    channel.begin_read_frame()?;
    match FrameKind::read(&mut channel)? {
        FrameKind::Ok => Ok(()),
        FrameKind::Error => Err(read_error(&mut channel)?),
        other => Err(CoSimError::Protocol(format!("unexpected UnsetPort response frame {other:?}"))),
    }
}

/// `GetPort(name)` → `GetPortOk(port)` or `Error("not found")` (spec
/// §4.7). Clients call this only when the server name is known but the
/// port is not.
pub fn get_port(host: &str, mapper_port: u16, name: &str) -> Result<u16> {
    let mut channel = connect(host, mapper_port)?;
    FrameKind::GetPort.write(&mut channel)?;
    GetPortFrame { name: name.to_string() }.write(&mut channel)?;
    channel.end_write()?;

    channel.begin_read_frame()?;
    match FrameKind::read(&mut channel)? {
        FrameKind::GetPortOk => Ok(GetPortOkFrame::read(&mut channel)?.port),
        FrameKind::Error => Err(read_error(&mut channel)?),
        other => Err(CoSimError::Protocol(format!("unexpected GetPort response frame {other:?}"))),
    }
}
