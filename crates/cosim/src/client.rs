use std::time::Duration;

use cosim_buffers::{BusBuffer, IoBuffer};
use cosim_net::{local_connect, tcp_connect, BlockingStream, Channel};
use cosim_protocol::{
    codec_for_version, read_connect_ok, ConnectFrame, ErrorFrame, FrameKind, LifecycleFrame, PingOkFrame,
    Protocol, StepOkFrame,
};
use cosim_types::{
    CanController, CanMessage, Callbacks, Command, ConnectionState, CoSimError, EthController, EthMessage,
    FrController, FrMessage, IoSignal, IoSignalId, LinController, LinMessage, NextCommandSlot, Result,
    ResponderMode, SimulationState, SimulationTime,
};
use tracing::{debug, info};

use crate::config::ConnectConfig;

/// One connected co-simulation session from the client's perspective
/// (spec §4.8). Holds the channel as `Option` so [`CoSimClient::connection_state`]
/// keeps answering after a disconnect (SPEC_FULL.md supplemented feature 3).
pub struct CoSimClient {
    channel: Option<Channel>,
    codec: Box<dyn Protocol>,
    connection_state: ConnectionState,
    responder_mode: ResponderMode,
    /// Requested via [`CoSimClient::start`]/[`stop`](Self::stop)/etc.;
    /// piggybacked on the next `StepOk`/`PingOk` (spec §9 "Atomic
    /// next-command").
    next_command: NextCommandSlot,
    /// Set by [`CoSimClient::poll_command`], consumed by
    /// [`CoSimClient::finish_command`]; `None` means no exchange is open.
    pending_poll_outcome: Option<PollOutcome>,
    /// Callbacks registered via [`CoSimClient::start_polling_based_co_simulation`];
    /// only present once the client is locked into non-blocking mode.
    polling_callbacks: Option<Callbacks>,
    state: SimulationState,
    current_sim_time: SimulationTime,
    next_sim_time: SimulationTime,
    incoming_signals: Vec<IoSignal>,
    outgoing_signals: Vec<IoSignal>,
    can_controllers: Vec<CanController>,
    eth_controllers: Vec<EthController>,
    lin_controllers: Vec<LinController>,
    fr_controllers: Vec<FrController>,
    io_buffer: IoBuffer,
    bus_buffer: BusBuffer,
}

/// What a non-blocking [`CoSimClient::poll_command`] call resolved to:
/// either a simulation step (callbacks already fired, only `finish_command`
/// remains), or a lifecycle frame the caller is meant to act on. Kept
/// distinct from [`Command`], which models only the five lifecycle
/// transitions (spec §3) and has no variant for a step.
#[derive(Debug, Clone, Copy)]
pub enum PollOutcome {
    Step { sim_time: SimulationTime },
    Lifecycle { command: Command, sim_time: SimulationTime },
}

/// Implements spec §4.8 step 2: local transport first when only a server
/// name is given, else resolve a TCP port directly or via the port mapper
/// (SPEC_FULL.md supplemented feature 1).
fn establish_stream(config: &ConnectConfig) -> Result<BlockingStream> {
    if !config.server_name.is_empty() && config.remote_ip_address.is_empty() && config.remote_port == 0 {
        if let Ok(stream) = local_connect(&config.server_name) {
            debug!(server_name = %config.server_name, "connected over local transport");
            return Ok(stream);
        }
        let mapper_port = cosim_portmapper::mapper_port();
        let port = cosim_portmapper::get_port("127.0.0.1", mapper_port, &config.server_name)?;
        return tcp_connect("127.0.0.1", port, config.local_port);
    }

    let host = if config.remote_ip_address.is_empty() { "127.0.0.1" } else { config.remote_ip_address.as_str() };
    let port = if config.remote_port != 0 {
        config.remote_port
    } else {
        let mapper_port = cosim_portmapper::mapper_port();
        cosim_portmapper::get_port(host, mapper_port, &config.server_name)?
    };
    tcp_connect(host, port, config.local_port)
}

impl CoSimClient {
    /// Runs the connection procedure (spec §4.8 steps 1-4) and returns a
    /// ready-to-drive client.
    pub fn connect(config: &ConnectConfig) -> Result<Self> {
        if config.server_name.is_empty() && config.remote_port == 0 {
            return Err(CoSimError::InvalidArgument(
                "ConnectConfig must set either server_name or remote_port".into(),
            ));
        }

        let stream = establish_stream(config)?;
        stream.set_read_timeout(Some(Duration::from_millis(config.response_timeout_ms)))?;
        let mut channel = Channel::new(stream);

        FrameKind::Connect.write(&mut channel)?;
        ConnectFrame {
            version: cosim_types::constants::LATEST_PROTOCOL_VERSION,
            mode: cosim_types::Mode::Default,
            server_name: config.server_name.clone(),
            client_name: config.client_name.clone(),
        }
        .write(&mut channel)?;
        channel.end_write()?;

        channel.begin_read_frame()?;
        match FrameKind::read(&mut channel)? {
            FrameKind::ConnectOk => {}
            FrameKind::Error => {
                let message = ErrorFrame::read(&mut channel)?.message;
                return Err(CoSimError::Protocol(message));
            }
            other => {
                return Err(CoSimError::Protocol(format!("unexpected connect response frame {other:?}")));
            }
        }

        let mut connect_ok = read_connect_ok(&mut channel)?;
        if connect_ok.version > cosim_types::constants::LATEST_PROTOCOL_VERSION {
            return Err(CoSimError::Protocol(format!(
                "server responded with protocol version {:#010x}, newer than the {:#010x} this client understands",
                connect_ok.version,
                cosim_types::constants::LATEST_PROTOCOL_VERSION
            )));
        }
        let codec = codec_for_version(connect_ok.version);
        info!(version = connect_ok.version, server_name = %config.server_name, "connected");

        // `ConnectOkFrame::{incoming,outgoing}_signals` are named from the
        // server's perspective (matching `CoSimServerConfig`); swap them
        // for the client (spec §4.5 "the role of incoming/outgoing is
        // swapped relative to the client").
        let client_incoming = std::mem::take(&mut connect_ok.outgoing_signals);
        let client_outgoing = std::mem::take(&mut connect_ok.incoming_signals);
        let io_buffer = IoBuffer::new(&client_outgoing, &client_incoming);
        let bus_buffer = BusBuffer::new(
            &connect_ok.can_controllers,
            &connect_ok.eth_controllers,
            &connect_ok.lin_controllers,
            &connect_ok.fr_controllers,
        );

        Ok(Self {
            channel: Some(channel),
            codec,
            connection_state: ConnectionState::Connected,
            responder_mode: ResponderMode::Unknown,
            next_command: NextCommandSlot::new(),
            pending_poll_outcome: None,
            polling_callbacks: None,
            state: connect_ok.state,
            current_sim_time: 0,
            next_sim_time: 0,
            incoming_signals: client_incoming,
            outgoing_signals: client_outgoing,
            can_controllers: connect_ok.can_controllers,
            eth_controllers: connect_ok.eth_controllers,
            lin_controllers: connect_ok.lin_controllers,
            fr_controllers: connect_ok.fr_controllers,
            io_buffer,
            bus_buffer,
        })
    }

    pub fn disconnect(&mut self) {
        self.channel = None;
        self.connection_state = ConnectionState::Disconnected;
    }

    #[must_use]
    pub fn connection_state(&self) -> ConnectionState {
        self.connection_state
    }

    #[must_use]
    pub fn codec_version(&self) -> u32 {
        self.codec.version()
    }

    #[must_use]
    pub fn get_incoming_signals(&self) -> &[IoSignal] {
        &self.incoming_signals
    }

    #[must_use]
    pub fn get_outgoing_signals(&self) -> &[IoSignal] {
        &self.outgoing_signals
    }

    #[must_use]
    pub fn get_can_controllers(&self) -> &[CanController] {
        &self.can_controllers
    }

    #[must_use]
    pub fn get_eth_controllers(&self) -> &[EthController] {
        &self.eth_controllers
    }

    #[must_use]
    pub fn get_lin_controllers(&self) -> &[LinController] {
        &self.lin_controllers
    }

    #[must_use]
    pub fn get_fr_controllers(&self) -> &[FrController] {
        &self.fr_controllers
    }

    pub fn write(&mut self, signal_id: IoSignalId, length: u32, bytes: &[u8]) -> Result<()> {
        self.io_buffer.write(signal_id, length, bytes)
    }

    pub fn read(&self, signal_id: IoSignalId) -> Result<(u32, &[u8])> {
        self.io_buffer.read(signal_id)
    }

    pub fn transmit_can(&mut self, message: CanMessage) -> Result<()> {
        self.bus_buffer.can.transmit(message)
    }

    pub fn receive_can(&mut self) -> Result<CanMessage> {
        self.bus_buffer.can.receive()
    }

    pub fn transmit_eth(&mut self, message: EthMessage) -> Result<()> {
        self.bus_buffer.eth.transmit(message)
    }

    pub fn receive_eth(&mut self) -> Result<EthMessage> {
        self.bus_buffer.eth.receive()
    }

    pub fn transmit_lin(&mut self, message: LinMessage) -> Result<()> {
        self.bus_buffer.lin.transmit(message)
    }

    pub fn receive_lin(&mut self) -> Result<LinMessage> {
        self.bus_buffer.lin.receive()
    }

    pub fn transmit_fr(&mut self, message: FrMessage) -> Result<()> {
        self.bus_buffer.fr.transmit(message)
    }

    pub fn receive_fr(&mut self) -> Result<FrMessage> {
        self.bus_buffer.fr.receive()
    }

    /// Requests a lifecycle transition be reported to the server on the
    /// next `StepOk`/`PingOk` (spec §9 "Atomic next-command"). Does not
    /// itself change local state; the server decides whether to act on it.
    pub fn start(&self) -> Result<()> {
        self.ensure_connected()?;
        self.next_command.request(Command::Start);
        Ok(())
    }

    pub fn stop(&self) -> Result<()> {
        self.ensure_connected()?;
        self.next_command.request(Command::Stop);
        Ok(())
    }

    pub fn pause(&self) -> Result<()> {
        self.ensure_connected()?;
        self.next_command.request(Command::Pause);
        Ok(())
    }

    pub fn continue_(&self) -> Result<()> {
        self.ensure_connected()?;
        self.next_command.request(Command::Continue);
        Ok(())
    }

    pub fn terminate(&self) -> Result<()> {
        self.ensure_connected()?;
        self.next_command.request(Command::Terminate);
        Ok(())
    }

    pub fn set_next_simulation_time(&mut self, sim_time: SimulationTime) -> Result<()> {
        self.ensure_connected()?;
        self.next_sim_time = sim_time;
        Ok(())
    }

    /// Drives the connection from a single thread until disconnected
    /// (spec §4.8 "Blocking callback mode").
    pub fn run_callback_based_co_simulation(&mut self, mut callbacks: Callbacks) -> Result<()> {
        self.lock_responder_mode(ResponderMode::Blocking)?;

        let result = self.run_callback_loop(&mut callbacks);
        if result.is_err() {
            self.disconnect();
        }
        result
    }

    fn run_callback_loop(&mut self, callbacks: &mut Callbacks) -> Result<()> {
        loop {
            match self.read_frame_kind()? {
                FrameKind::Step => {
                    self.on_step(callbacks)?;
                    self.finish_step()?;
                }
                FrameKind::Start => self.on_lifecycle(Command::Start, callbacks)?,
                FrameKind::Stop => self.on_lifecycle(Command::Stop, callbacks)?,
                FrameKind::Pause => self.on_lifecycle(Command::Pause, callbacks)?,
                FrameKind::Continue => self.on_lifecycle(Command::Continue, callbacks)?,
                FrameKind::Terminate => self.on_lifecycle(Command::Terminate, callbacks)?,
                FrameKind::Ping => self.finish_ping()?,
                other => {
                    return Err(CoSimError::Protocol(format!("unexpected frame {other:?} in blocking loop")));
                }
            }
        }
    }

    /// Registers callbacks for the non-blocking mode; subsequent progress
    /// is driven by [`CoSimClient::poll_command`]/[`finish_command`](Self::finish_command).
    pub fn start_polling_based_co_simulation(&mut self, callbacks: Callbacks) -> Result<()> {
        self.lock_responder_mode(ResponderMode::NonBlocking)?;
        self.polling_callbacks = Some(callbacks);
        Ok(())
    }

    /// Blocks on exactly one frame, consuming any `Ping` internally, and
    /// returns what the caller must finish with
    /// [`CoSimClient::finish_command`] (spec §4.8 "Non-blocking polling
    /// mode").
    pub fn poll_command(&mut self) -> Result<PollOutcome> {
        if self.pending_poll_outcome.is_some() {
            return Err(CoSimError::InvalidArgument(
                "poll_command called without a prior finish_command".into(),
            ));
        }
        self.ensure_responder_mode(ResponderMode::NonBlocking)?;

        loop {
            let mut callbacks = self.polling_callbacks.take().unwrap_or_default();
            let frame_kind = self.read_frame_kind()?;
            let outcome = match frame_kind {
                FrameKind::Step => {
                    self.on_step(&mut callbacks)?;
                    self.polling_callbacks = Some(callbacks);
                    Some(PollOutcome::Step { sim_time: self.current_sim_time })
                }
                FrameKind::Ping => {
                    self.finish_ping()?;
                    self.polling_callbacks = Some(callbacks);
                    None
                }
                FrameKind::Start | FrameKind::Stop | FrameKind::Pause | FrameKind::Continue | FrameKind::Terminate => {
                    let sim_time = self.read_lifecycle_sim_time()?;
                    let command = frame_kind_to_command(frame_kind);
                    self.polling_callbacks = Some(callbacks);
                    Some(PollOutcome::Lifecycle { command, sim_time })
                }
                other => {
                    self.polling_callbacks = Some(callbacks);
                    return Err(CoSimError::Protocol(format!("unexpected frame {other:?} while polling")));
                }
            };

            if let Some(outcome) = outcome {
                self.pending_poll_outcome = Some(outcome);
                return Ok(outcome);
            }
        }
    }

    /// Sends the response matching whatever [`CoSimClient::poll_command`]
    /// last returned, firing any lifecycle callback and clearing data on
    /// `Start` just as the blocking loop does.
    pub fn finish_command(&mut self) -> Result<()> {
        let outcome = self
            .pending_poll_outcome
            .take()
            .ok_or_else(|| CoSimError::InvalidArgument("finish_command called without a prior poll_command".into()))?;

        match outcome {
            PollOutcome::Step { .. } => self.finish_step(),
            PollOutcome::Lifecycle { command, .. } => {
                if command == Command::Start {
                    self.io_buffer.clear_data();
                    self.bus_buffer.clear_data();
                }
                if let Some(next_state) = self.state.apply(command) {
                    self.state = next_state;
                }
                if let Some(callbacks) = self.polling_callbacks.as_mut() {
                    callbacks.fire_lifecycle(command, self.state);
                }
                self.send_ok()
            }
        }
    }

    fn read_lifecycle_sim_time(&mut self) -> Result<SimulationTime> {
        let channel = self.channel.as_mut().ok_or(CoSimError::Disconnected)?;
        let frame = LifecycleFrame::read(channel)?;
        self.current_sim_time = frame.sim_time;
        Ok(frame.sim_time)
    }

    fn on_step(&mut self, callbacks: &mut Callbacks) -> Result<()> {
        let sim_time = self.channel.as_mut().ok_or(CoSimError::Disconnected)?.read_i64()?;
        self.current_sim_time = sim_time;

        if let Some(cb) = callbacks.simulation_begin_step.as_mut() {
            cb(sim_time);
        }

        self.io_buffer.deserialize(self.channel.as_mut().ok_or(CoSimError::Disconnected)?, sim_time, callbacks)?;
        self.bus_buffer.deserialize(self.channel.as_mut().ok_or(CoSimError::Disconnected)?, sim_time, callbacks)?;

        if let Some(cb) = callbacks.simulation_end_step.as_mut() {
            cb(sim_time);
        }
        Ok(())
    }

    fn finish_step(&mut self) -> Result<()> {
        let pending_command = self.next_command.take();
        let channel = self.channel.as_mut().ok_or(CoSimError::Disconnected)?;
        FrameKind::StepOk.write(channel)?;
        StepOkFrame { next_sim_time: self.next_sim_time, pending_command }.write(channel)?;
        self.io_buffer.serialize(channel)?;
        self.bus_buffer.serialize(channel)?;
        channel.end_write()
    }

    fn finish_ping(&mut self) -> Result<()> {
        let pending_command = self.next_command.take();
        let channel = self.channel.as_mut().ok_or(CoSimError::Disconnected)?;
        FrameKind::PingOk.write(channel)?;
        PingOkFrame { pending_command }.write(channel)?;
        channel.end_write()
    }

    fn on_lifecycle(&mut self, command: Command, callbacks: &mut Callbacks) -> Result<()> {
        self.read_lifecycle_sim_time()?;

        if command == Command::Start {
            self.io_buffer.clear_data();
            self.bus_buffer.clear_data();
        }

        if let Some(next_state) = self.state.apply(command) {
            self.state = next_state;
        }
        callbacks.fire_lifecycle(command, self.state);

        self.send_ok()
    }

    fn send_ok(&mut self) -> Result<()> {
        let channel = self.channel.as_mut().ok_or(CoSimError::Disconnected)?;
        FrameKind::Ok.write(channel)?;
        channel.end_write()
    }

    fn read_frame_kind(&mut self) -> Result<FrameKind> {
        let channel = self.channel.as_mut().ok_or(CoSimError::Disconnected)?;
        let result = channel.begin_read_frame().and_then(|_| FrameKind::read(channel));
        if matches!(result, Err(CoSimError::Disconnected)) {
            self.disconnect();
        }
        result
    }

    fn lock_responder_mode(&mut self, mode: ResponderMode) -> Result<()> {
        self.ensure_connected()?;
        match self.responder_mode {
            ResponderMode::Unknown => {
                self.responder_mode = mode;
                Ok(())
            }
            current if current == mode => Ok(()),
            _ => Err(CoSimError::InvalidArgument(format!(
                "client is already locked in {:?} responder mode",
                self.responder_mode
            ))),
        }
    }

    fn ensure_responder_mode(&self, mode: ResponderMode) -> Result<()> {
        if self.responder_mode != mode {
            return Err(CoSimError::InvalidArgument(format!(
                "client is not in {mode:?} responder mode"
            )));
        }
        Ok(())
    }

    fn ensure_connected(&self) -> Result<()> {
        if self.channel.is_none() {
            return Err(CoSimError::Disconnected);
        }
        Ok(())
    }
}

fn frame_kind_to_command(kind: FrameKind) -> Command {
    match kind {
        FrameKind::Start => Command::Start,
        FrameKind::Stop => Command::Stop,
        FrameKind::Pause => Command::Pause,
        FrameKind::Continue => Command::Continue,
        FrameKind::Terminate => Command::Terminate,
        _ => unreachable!("only called for lifecycle frame kinds"),
    }
}
