use cosim_types::{CoSimError, Reader, Result, Writer};

/// The closed set of frame kinds every wire message opens with (spec
/// §4.3). One byte on the wire, immediately after the 4-byte length
/// header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum FrameKind {
    Ok = 0,
    Error = 1,
    Ping = 2,
    PingOk = 3,
    Connect = 4,
    ConnectOk = 5,
    Start = 6,
    Stop = 7,
    Terminate = 8,
    Pause = 9,
    Continue = 10,
    Step = 11,
    StepOk = 12,
    GetPort = 13,
    GetPortOk = 14,
    SetPort = 15,
    UnsetPort = 16,
}

impl FrameKind {
    fn from_u8(raw: u8) -> Result<Self> {
        Ok(match raw {
            0 => Self::Ok,
            1 => Self::Error,
            2 => Self::Ping,
            3 => Self::PingOk,
            4 => Self::Connect,
            5 => Self::ConnectOk,
            6 => Self::Start,
            7 => Self::Stop,
            8 => Self::Terminate,
            9 => Self::Pause,
            10 => Self::Continue,
            11 => Self::Step,
            12 => Self::StepOk,
            13 => Self::GetPort,
            14 => Self::GetPortOk,
            15 => Self::SetPort,
            16 => Self::UnsetPort,
            other => return Err(CoSimError::Protocol(format!("unknown frame kind {other}"))),
        })
    }

    pub fn write(self, w: &mut dyn Writer) -> Result<()> {
        w.write_u8(self as u8)
    }

    pub fn read(r: &mut dyn Reader) -> Result<Self> {
        Self::from_u8(r.read_u8()?)
    }
}
