use cosim_types::{
    BusControllerId, CanController, Command, CoSimError, DataType, EthController, FrClusterParameters,
    FrController, IoSignal, IoSignalId, LinController, LinControllerType, Mode, Reader, Result,
    SimulationState, SimulationTime, SizeKind, Writer,
};

/// `Connect` frame payload (spec §4.3, §4.8 step 3).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectFrame {
    pub version: u32,
    pub mode: Mode,
    pub server_name: String,
    pub client_name: String,
}

impl ConnectFrame {
    pub fn write(&self, w: &mut dyn Writer) -> Result<()> {
        w.write_u32(self.version)?;
        w.write_u8(0)?; // Mode::Default is the wire format's only value today.
        w.write_string(&self.server_name)?;
        w.write_string(&self.client_name)
    }

    pub fn read(r: &mut dyn Reader) -> Result<Self> {
        let version = r.read_u32()?;
        let mode_tag = r.read_u8()?;
        if mode_tag != 0 {
            return Err(CoSimError::Protocol(format!("unknown Mode tag {mode_tag}")));
        }
        let server_name = r.read_string()?;
        let client_name = r.read_string()?;
        Ok(Self { version, mode: Mode::Default, server_name, client_name })
    }
}

/// `ConnectOk` capability payload (spec §4.3). `fr_controllers` is empty
/// and never written/read at protocol V1.
#[derive(Debug, Clone, PartialEq)]
pub struct ConnectOkFrame {
    pub version: u32,
    pub step_size: SimulationTime,
    pub state: SimulationState,
    pub can_controllers: Vec<CanController>,
    pub eth_controllers: Vec<EthController>,
    pub lin_controllers: Vec<LinController>,
    pub fr_controllers: Vec<FrController>,
    pub incoming_signals: Vec<IoSignal>,
    pub outgoing_signals: Vec<IoSignal>,
}

fn write_state(w: &mut dyn Writer, state: SimulationState) -> Result<()> {
    w.write_u8(state as u8)
}

fn read_state(r: &mut dyn Reader) -> Result<SimulationState> {
    Ok(match r.read_u8()? {
        0 => SimulationState::Unloaded,
        1 => SimulationState::Stopped,
        2 => SimulationState::Running,
        3 => SimulationState::Paused,
        4 => SimulationState::Terminated,
        other => return Err(CoSimError::Protocol(format!("unknown SimulationState tag {other}"))),
    })
}

fn write_data_type(w: &mut dyn Writer, data_type: DataType) -> Result<()> {
    let tag: u8 = match data_type {
        DataType::Bool => 0,
        DataType::I8 => 1,
        DataType::I16 => 2,
        DataType::I32 => 3,
        DataType::I64 => 4,
        DataType::U8 => 5,
        DataType::U16 => 6,
        DataType::U32 => 7,
        DataType::U64 => 8,
        DataType::F32 => 9,
        DataType::F64 => 10,
    };
    w.write_u8(tag)
}

fn read_data_type(r: &mut dyn Reader) -> Result<DataType> {
    Ok(match r.read_u8()? {
        0 => DataType::Bool,
        1 => DataType::I8,
        2 => DataType::I16,
        3 => DataType::I32,
        4 => DataType::I64,
        5 => DataType::U8,
        6 => DataType::U16,
        7 => DataType::U32,
        8 => DataType::U64,
        9 => DataType::F32,
        10 => DataType::F64,
        other => return Err(CoSimError::Protocol(format!("unknown DataType tag {other}"))),
    })
}

fn write_io_signal(w: &mut dyn Writer, signal: &IoSignal) -> Result<()> {
    w.write_u32(signal.id.raw())?;
    w.write_u32(signal.max_length)?;
    write_data_type(w, signal.data_type)?;
    w.write_u8(match signal.size_kind { SizeKind::Fixed => 0, SizeKind::Variable => 1 })?;
    w.write_string(&signal.name)
}

fn read_io_signal(r: &mut dyn Reader) -> Result<IoSignal> {
    let id = IoSignalId::new(r.read_u32()?);
    let max_length = r.read_u32()?;
    let data_type = read_data_type(r)?;
    let size_kind = match r.read_u8()? {
        0 => SizeKind::Fixed,
        1 => SizeKind::Variable,
        other => return Err(CoSimError::Protocol(format!("unknown SizeKind tag {other}"))),
    };
    let name = r.read_string()?;
    Ok(IoSignal { id, max_length, data_type, size_kind, name })
}

fn write_io_signal_vec(w: &mut dyn Writer, signals: &[IoSignal]) -> Result<()> {
    w.write_u32(signals.len() as u32)?;
    signals.iter().try_for_each(|s| write_io_signal(w, s))
}

fn read_io_signal_vec(r: &mut dyn Reader) -> Result<Vec<IoSignal>> {
    let count = r.read_u32()?;
    (0..count).map(|_| read_io_signal(r)).collect()
}

fn write_can_controller(w: &mut dyn Writer, c: &CanController) -> Result<()> {
    w.write_u32(c.id.raw())?;
    w.write_u32(c.queue_size)?;
    w.write_u32(c.bit_rate)?;
    w.write_u32(c.fd_bit_rate)?;
    w.write_string(&c.name)?;
    w.write_string(&c.channel_name)
}

fn read_can_controller(r: &mut dyn Reader) -> Result<CanController> {
    let id = BusControllerId::new(r.read_u32()?);
    let queue_size = r.read_u32()?;
    let bit_rate = r.read_u32()?;
    let fd_bit_rate = r.read_u32()?;
    let name = r.read_string()?;
    let channel_name = r.read_string()?;
    Ok(CanController { id, queue_size, bit_rate, fd_bit_rate, name, channel_name })
}

fn write_eth_controller(w: &mut dyn Writer, c: &EthController) -> Result<()> {
    w.write_u32(c.id.raw())?;
    w.write_u32(c.queue_size)?;
    w.write_u32(c.bit_rate)?;
    w.write_bytes(&c.mac_address)?;
    w.write_string(&c.name)?;
    w.write_string(&c.channel_name)
}

fn read_eth_controller(r: &mut dyn Reader) -> Result<EthController> {
    let id = BusControllerId::new(r.read_u32()?);
    let queue_size = r.read_u32()?;
    let bit_rate = r.read_u32()?;
    let mut mac_address = [0u8; cosim_types::constants::ETH_ADDRESS_LENGTH];
    r.read_bytes(&mut mac_address)?;
    let name = r.read_string()?;
    let channel_name = r.read_string()?;
    Ok(EthController { id, queue_size, bit_rate, mac_address, name, channel_name })
}

fn write_lin_controller(w: &mut dyn Writer, c: &LinController) -> Result<()> {
    w.write_u32(c.id.raw())?;
    w.write_u32(c.queue_size)?;
    w.write_u32(c.bit_rate)?;
    w.write_u8(match c.controller_type { LinControllerType::Responder => 0, LinControllerType::Commander => 1 })?;
    w.write_string(&c.name)?;
    w.write_string(&c.channel_name)
}

fn read_lin_controller(r: &mut dyn Reader) -> Result<LinController> {
    let id = BusControllerId::new(r.read_u32()?);
    let queue_size = r.read_u32()?;
    let bit_rate = r.read_u32()?;
    let controller_type = match r.read_u8()? {
        0 => LinControllerType::Responder,
        1 => LinControllerType::Commander,
        other => return Err(CoSimError::Protocol(format!("unknown LinControllerType tag {other}"))),
    };
    let name = r.read_string()?;
    let channel_name = r.read_string()?;
    Ok(LinController { id, queue_size, bit_rate, controller_type, name, channel_name })
}

fn write_fr_controller(w: &mut dyn Writer, c: &FrController) -> Result<()> {
    w.write_u32(c.id.raw())?;
    w.write_u32(c.queue_size)?;
    let p = &c.cluster_parameters;
    w.write_u32(p.macrotick_length_in_ns)?;
    w.write_u32(p.cycle_length_in_macrotick)?;
    w.write_u32(p.gd_cas)?;
    w.write_u32(p.gd_minislot)?;
    w.write_u32(p.gd_static_slot)?;
    w.write_u32(p.gd_symbol_window)?;
    w.write_u32(p.n_static_slots)?;
    w.write_u32(p.p_payload_length_static)?;
    w.write_string(&c.name)?;
    w.write_string(&c.channel_name)
}

fn read_fr_controller(r: &mut dyn Reader) -> Result<FrController> {
    let id = BusControllerId::new(r.read_u32()?);
    let queue_size = r.read_u32()?;
    let cluster_parameters = FrClusterParameters {
        macrotick_length_in_ns: r.read_u32()?,
        cycle_length_in_macrotick: r.read_u32()?,
        gd_cas: r.read_u32()?,
        gd_minislot: r.read_u32()?,
        gd_static_slot: r.read_u32()?,
        gd_symbol_window: r.read_u32()?,
        n_static_slots: r.read_u32()?,
        p_payload_length_static: r.read_u32()?,
    };
    let name = r.read_string()?;
    let channel_name = r.read_string()?;
    Ok(FrController { id, queue_size, cluster_parameters, name, channel_name })
}

macro_rules! write_controller_vec {
    ($w:expr, $items:expr, $write_one:path) => {{
        $w.write_u32($items.len() as u32)?;
        $items.iter().try_for_each(|c| $write_one($w, c))
    }};
}

macro_rules! read_controller_vec {
    ($r:expr, $read_one:path) => {{
        let count = $r.read_u32()?;
        (0..count).map(|_| $read_one($r)).collect::<Result<Vec<_>>>()
    }};
}

impl ConnectOkFrame {
    /// Writes everything except the FlexRay controller vector, which V1
    /// never carries on the wire (spec §4.3). `self.version` (the
    /// negotiated version) is written first, same as `write_v2`, so a
    /// reader can peek it before picking a schema.
    pub fn write_v1(&self, w: &mut dyn Writer) -> Result<()> {
        w.write_u32(self.version)?;
        w.write_i64(self.step_size)?;
        write_state(w, self.state)?;
        write_controller_vec!(w, self.can_controllers, write_can_controller)?;
        write_controller_vec!(w, self.eth_controllers, write_eth_controller)?;
        write_controller_vec!(w, self.lin_controllers, write_lin_controller)?;
        write_io_signal_vec(w, &self.incoming_signals)?;
        write_io_signal_vec(w, &self.outgoing_signals)
    }

    /// Reads the body after `version` has already been consumed by the
    /// caller (see [`crate::codec::read_connect_ok`]).
    pub fn read_v1_body(version: u32, r: &mut dyn Reader) -> Result<Self> {
        let step_size = r.read_i64()?;
        let state = read_state(r)?;
        let can_controllers = read_controller_vec!(r, read_can_controller)?;
        let eth_controllers = read_controller_vec!(r, read_eth_controller)?;
        let lin_controllers = read_controller_vec!(r, read_lin_controller)?;
        let incoming_signals = read_io_signal_vec(r)?;
        let outgoing_signals = read_io_signal_vec(r)?;
        Ok(Self {
            version,
            step_size,
            state,
            can_controllers,
            eth_controllers,
            lin_controllers,
            fr_controllers: Vec::new(),
            incoming_signals,
            outgoing_signals,
        })
    }

    /// V2 adds the FlexRay controller vector after LIN, before the IO
    /// signal lists (spec §4.3, SPEC_FULL.md supplemented feature 5).
    pub fn write_v2(&self, w: &mut dyn Writer) -> Result<()> {
        w.write_u32(self.version)?;
        w.write_i64(self.step_size)?;
        write_state(w, self.state)?;
        write_controller_vec!(w, self.can_controllers, write_can_controller)?;
        write_controller_vec!(w, self.eth_controllers, write_eth_controller)?;
        write_controller_vec!(w, self.lin_controllers, write_lin_controller)?;
        write_controller_vec!(w, self.fr_controllers, write_fr_controller)?;
        write_io_signal_vec(w, &self.incoming_signals)?;
        write_io_signal_vec(w, &self.outgoing_signals)
    }

    /// See [`ConnectOkFrame::read_v1_body`].
    pub fn read_v2_body(version: u32, r: &mut dyn Reader) -> Result<Self> {
        let step_size = r.read_i64()?;
        let state = read_state(r)?;
        let can_controllers = read_controller_vec!(r, read_can_controller)?;
        let eth_controllers = read_controller_vec!(r, read_eth_controller)?;
        let lin_controllers = read_controller_vec!(r, read_lin_controller)?;
        let fr_controllers = read_controller_vec!(r, read_fr_controller)?;
        let incoming_signals = read_io_signal_vec(r)?;
        let outgoing_signals = read_io_signal_vec(r)?;
        Ok(Self {
            version,
            step_size,
            state,
            can_controllers,
            eth_controllers,
            lin_controllers,
            fr_controllers,
            incoming_signals,
            outgoing_signals,
        })
    }
}

const NO_PENDING_COMMAND: u8 = 0xFF;

fn write_pending_command(w: &mut dyn Writer, command: Option<Command>) -> Result<()> {
    w.write_u8(command.map_or(NO_PENDING_COMMAND, |c| c as u8))
}

fn read_pending_command(r: &mut dyn Reader) -> Result<Option<Command>> {
    Ok(match r.read_u8()? {
        NO_PENDING_COMMAND => None,
        0 => Some(Command::Start),
        1 => Some(Command::Stop),
        2 => Some(Command::Pause),
        3 => Some(Command::Continue),
        4 => Some(Command::Terminate),
        other => return Err(CoSimError::Protocol(format!("unknown pending command tag {other}"))),
    })
}

/// `StepOk` payload (spec §4.3): everything after the IO/bus blobs that
/// the caller serializes directly into the same frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepOkFrame {
    pub next_sim_time: SimulationTime,
    pub pending_command: Option<Command>,
}

impl StepOkFrame {
    pub fn write(&self, w: &mut dyn Writer) -> Result<()> {
        w.write_i64(self.next_sim_time)?;
        write_pending_command(w, self.pending_command)
    }

    pub fn read(r: &mut dyn Reader) -> Result<Self> {
        let next_sim_time = r.read_i64()?;
        let pending_command = read_pending_command(r)?;
        Ok(Self { next_sim_time, pending_command })
    }
}

/// `PingOk` payload: just the pending command the client wants serviced
/// (spec §4.8, §4.9).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PingOkFrame {
    pub pending_command: Option<Command>,
}

impl PingOkFrame {
    pub fn write(&self, w: &mut dyn Writer) -> Result<()> {
        write_pending_command(w, self.pending_command)
    }

    pub fn read(r: &mut dyn Reader) -> Result<Self> {
        Ok(Self { pending_command: read_pending_command(r)? })
    }
}

/// `Start`/`Stop`/`Pause`/`Continue`/`Terminate` payload (spec §4.9): the
/// simulation time at which the transition takes effect. All five frame
/// kinds share this shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LifecycleFrame {
    pub sim_time: SimulationTime,
}

impl LifecycleFrame {
    pub fn write(&self, w: &mut dyn Writer) -> Result<()> {
        w.write_i64(self.sim_time)
    }

    pub fn read(r: &mut dyn Reader) -> Result<Self> {
        Ok(Self { sim_time: r.read_i64()? })
    }
}

/// `Error` payload: one human-readable message (spec §4.3, §7).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorFrame {
    pub message: String,
}

impl ErrorFrame {
    pub fn write(&self, w: &mut dyn Writer) -> Result<()> {
        w.write_string(&self.message)
    }

    pub fn read(r: &mut dyn Reader) -> Result<Self> {
        Ok(Self { message: r.read_string()? })
    }
}

/// Port-mapper RPC payloads (spec §4.7).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GetPortFrame {
    pub name: String,
}

impl GetPortFrame {
    pub fn write(&self, w: &mut dyn Writer) -> Result<()> {
        w.write_string(&self.name)
    }

    pub fn read(r: &mut dyn Reader) -> Result<Self> {
        Ok(Self { name: r.read_string()? })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GetPortOkFrame {
    pub port: u16,
}

impl GetPortOkFrame {
    pub fn write(&self, w: &mut dyn Writer) -> Result<()> {
        w.write_u16(self.port)
    }

    pub fn read(r: &mut dyn Reader) -> Result<Self> {
        Ok(Self { port: r.read_u16()? })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetPortFrame {
    pub name: String,
    pub port: u16,
}

impl SetPortFrame {
    pub fn write(&self, w: &mut dyn Writer) -> Result<()> {
        w.write_string(&self.name)?;
        w.write_u16(self.port)
    }

    pub fn read(r: &mut dyn Reader) -> Result<Self> {
        let name = r.read_string()?;
        let port = r.read_u16()?;
        Ok(Self { name, port })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnsetPortFrame {
    pub name: String,
}

impl UnsetPortFrame {
    pub fn write(&self, w: &mut dyn Writer) -> Result<()> {
        w.write_string(&self.name)
    }

    pub fn read(r: &mut dyn Reader) -> Result<Self> {
        Ok(Self { name: r.read_string()? })
    }
}
