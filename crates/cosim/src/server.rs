use std::time::{Duration, Instant};

use cosim_buffers::{BusBuffer, IoBuffer};
use cosim_net::{BlockingStream, Channel, Listener};
use cosim_protocol::{
    codec_for_version, negotiate, ConnectFrame, ConnectOkFrame, ErrorFrame, FrameKind, LifecycleFrame, PingOkFrame,
    Protocol, StepOkFrame,
};
use cosim_portmapper::PortMapperServer;
use cosim_types::{constants, Callbacks, Command, CoSimError, Result, SimulationState, SimulationTime, Writer};
use tracing::{debug, info, warn};

use crate::config::CoSimServerConfig;

/// Which transport an accepted connection arrived over (SPEC_FULL.md
/// supplemented feature 3, grounded on the original's `ConnectionKind`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionKind {
    Local,
    Remote,
}

struct Connection {
    channel: Channel,
    kind: ConnectionKind,
}

/// Hosts one co-simulation session for at most one connected client at a
/// time (spec §4.9, §4.8 step 2). Binds both transports unconditionally
/// while waiting to accept; only one [`Connection`] is ever held.
pub struct CoSimServer {
    config: CoSimServerConfig,
    callbacks: Callbacks,
    /// Owned only when `config.start_port_mapper` is set; dropping it
    /// stops the embedded registry's accept thread.
    port_mapper: Option<PortMapperServer>,
    tcp_listener: Option<Listener>,
    local_listener: Option<Listener>,
    connection: Option<Connection>,
    state: SimulationState,
    first_step: bool,
    io_buffer: IoBuffer,
    bus_buffer: BusBuffer,
}

impl CoSimServer {
    /// Loads the session configuration, binds the TCP and local
    /// listeners, and registers with the port mapper if configured
    /// (spec §4.9 `Load`).
    pub fn load(config: CoSimServerConfig, callbacks: Callbacks) -> Result<Self> {
        let io_buffer = IoBuffer::new(&config.outgoing_signals, &config.incoming_signals);
        let bus_buffer = BusBuffer::new(
            &config.can_controllers,
            &config.eth_controllers,
            &config.lin_controllers,
            &config.fr_controllers,
        );

        let port_mapper = if config.start_port_mapper {
            Some(PortMapperServer::start(cosim_portmapper::mapper_port(), config.enable_remote_access)?)
        } else {
            None
        };

        let mut server = Self {
            config,
            callbacks,
            port_mapper,
            tcp_listener: None,
            local_listener: None,
            connection: None,
            state: SimulationState::Stopped,
            first_step: true,
            io_buffer,
            bus_buffer,
        };
        server.start_accepting()?;
        info!(server_name = %server.config.server_name, "loaded");
        Ok(server)
    }

    /// Tears down both listeners and unregisters from the port mapper,
    /// mirroring `Load` (spec §4.9 `Unload`).
    pub fn unload(&mut self) {
        self.stop_accepting();
        self.port_mapper = None;
    }

    #[must_use]
    pub fn state(&self) -> SimulationState {
        self.state
    }

    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.connection.is_some()
    }

    #[must_use]
    pub fn connection_kind(&self) -> Option<ConnectionKind> {
        self.connection.as_ref().map(|c| c.kind)
    }

    fn start_accepting(&mut self) -> Result<()> {
        let tcp_listener = Listener::bind_tcp(self.config.port, self.config.enable_remote_access)?;
        let bound_port = tcp_listener.local_port().expect("TCP listener reports a port");
        self.tcp_listener = Some(tcp_listener);
        self.local_listener = Some(Listener::bind_local(&self.config.server_name)?);

        if self.config.register_at_port_mapper && bound_port != 0 {
            let mapper_port = cosim_portmapper::mapper_port();
            cosim_portmapper::set_port("127.0.0.1", mapper_port, &self.config.server_name, bound_port)?;
        }
        Ok(())
    }

    fn stop_accepting(&mut self) {
        if self.config.register_at_port_mapper {
            let mapper_port = cosim_portmapper::mapper_port();
            if let Err(error) = cosim_portmapper::unset_port("127.0.0.1", mapper_port, &self.config.server_name) {
                warn!(%error, "failed to unregister from port mapper");
            }
        }
        self.tcp_listener = None;
        self.local_listener = None;
    }

    /// Tries the local listener first, then TCP, whichever yields a
    /// connection first (spec §4.8 step 2, grounded on the original's
    /// `AcceptChannel` trying local before remote).
    fn accept_channel(&mut self, timeout: Duration) -> Result<bool> {
        if let Some(listener) = self.local_listener.as_mut() {
            if let Some(stream) = listener.accept(timeout)? {
                self.finish_accept(stream, ConnectionKind::Local)?;
                return Ok(true);
            }
        }
        if let Some(listener) = self.tcp_listener.as_mut() {
            if let Some(stream) = listener.accept(Duration::from_millis(0))? {
                stream.set_nodelay()?;
                self.finish_accept(stream, ConnectionKind::Remote)?;
                return Ok(true);
            }
        }
        Ok(false)
    }

    fn finish_accept(&mut self, stream: BlockingStream, kind: ConnectionKind) -> Result<()> {
        let mut channel = Channel::new(stream);
        self.handle_connect(&mut channel)?;
        self.connection = Some(Connection { channel, kind });
        self.first_step = true;
        self.stop_accepting();
        info!(?kind, "client connected");
        Ok(())
    }

    /// Reads `Connect`, negotiates a version, and replies `ConnectOk`
    /// with the server's own descriptor vectors (spec §4.8 step 3-4).
    fn handle_connect(&mut self, channel: &mut Channel) -> Result<()> {
        channel.begin_read_frame()?;
        match FrameKind::read(channel)? {
            FrameKind::Connect => {}
            other => return Err(CoSimError::Protocol(format!("expected Connect, got {other:?}"))),
        }
        let request = ConnectFrame::read(channel)?;
        let version = negotiate(request.version);
        let codec = codec_for_version(version);
        debug!(
            client_version = request.version,
            negotiated = version,
            client_name = %request.client_name,
            "handling connect"
        );

        FrameKind::ConnectOk.write(channel)?;
        codec.write_connect_ok(
            channel,
            &ConnectOkFrame {
                version,
                step_size: self.config.step_size,
                state: self.state,
                can_controllers: self.config.can_controllers.clone(),
                eth_controllers: self.config.eth_controllers.clone(),
                lin_controllers: self.config.lin_controllers.clone(),
                fr_controllers: self.config.fr_controllers.clone(),
                incoming_signals: self.config.incoming_signals.clone(),
                outgoing_signals: self.config.outgoing_signals.clone(),
            },
        )?;
        channel.end_write()
    }

    /// Fires the matching lifecycle callback as a notification only; the
    /// server's own state machine is driven exclusively by its own
    /// `start`/`stop`/etc. calls, never by a command a client piggybacked
    /// on `StepOk`/`PingOk` (grounded on the original's
    /// `HandlePendingCommand`).
    fn handle_pending_command(&mut self, command: Option<Command>) {
        let Some(command) = command else { return };
        self.callbacks.fire_lifecycle(command, self.state);
    }

    /// Advances by one simulation step (spec §4.9 `Step`). A no-op when
    /// no client is connected.
    pub fn step(&mut self, sim_time: SimulationTime) -> Result<SimulationTime> {
        let Some(mut connection) = self.connection.take() else {
            return Ok(sim_time);
        };

        if self.first_step {
            if let Some(core_id) = core_affinity::get_core_ids().and_then(|ids| ids.into_iter().next()) {
                core_affinity::set_for_current(core_id);
            }
            self.first_step = false;
        }

        let result = self.step_on_connection(&mut connection, sim_time);
        match result {
            Ok((next_sim_time, pending_command)) => {
                self.connection = Some(connection);
                self.handle_pending_command(pending_command);
                Ok(next_sim_time)
            }
            Err(error) => {
                self.close_connection();
                Err(error)
            }
        }
    }

    fn step_on_connection(
        &mut self,
        connection: &mut Connection,
        sim_time: SimulationTime,
    ) -> Result<(SimulationTime, Option<Command>)> {
        let channel = &mut connection.channel;
        FrameKind::Step.write(channel)?;
        channel.write_i64(sim_time)?;
        self.io_buffer.serialize(channel)?;
        self.bus_buffer.serialize(channel)?;
        channel.end_write()?;

        channel.begin_read_frame()?;
        match FrameKind::read(channel)? {
            FrameKind::StepOk => {}
            FrameKind::Error => return Err(CoSimError::Protocol(ErrorFrame::read(channel)?.message)),
            other => return Err(CoSimError::Protocol(format!("unexpected frame {other:?} after Step"))),
        }

        let header = StepOkFrame::read(channel)?;
        self.io_buffer.deserialize(channel, header.next_sim_time, &mut self.callbacks)?;
        self.bus_buffer.deserialize(channel, header.next_sim_time, &mut self.callbacks)?;
        Ok((header.next_sim_time, header.pending_command))
    }

    /// Drops the connection, fires a `Stop` notification unless the
    /// client is optional, and resumes accepting (grounded on the
    /// original's `CloseConnection`).
    fn close_connection(&mut self) {
        self.connection = None;
        if !self.config.is_client_optional {
            self.callbacks.fire_lifecycle(Command::Stop, self.state);
        }
        if let Err(error) = self.start_accepting() {
            warn!(%error, "failed to resume accepting after disconnect");
        }
    }

    /// Shared body of `start`/`stop`/`pause`/`continue_`/`terminate`: waits
    /// for a client if one is required and not yet connected, validates
    /// the transition against the state table (spec §4.9), and round-
    /// trips the frame.
    fn lifecycle(&mut self, kind: FrameKind, command: Command, sim_time: SimulationTime) -> Result<()> {
        if self.connection.is_none() {
            if self.config.is_client_optional {
                return Ok(());
            }
            while !self.accept_channel(Duration::from_millis(constants::ACCEPT_POLL_INTERVAL_MS))? {}
        }

        let Some(next_state) = self.state.apply(command) else {
            return Ok(());
        };

        let Some(mut connection) = self.connection.take() else {
            return Ok(());
        };
        let result = Self::lifecycle_on_connection(&mut connection, kind, sim_time);
        self.connection = Some(connection);
        result?;

        self.state = next_state;
        Ok(())
    }

    fn lifecycle_on_connection(connection: &mut Connection, kind: FrameKind, sim_time: SimulationTime) -> Result<()> {
        let channel = &mut connection.channel;
        kind.write(channel)?;
        LifecycleFrame { sim_time }.write(channel)?;
        channel.end_write()?;

        channel.begin_read_frame()?;
        match FrameKind::read(channel)? {
            FrameKind::Ok => Ok(()),
            FrameKind::Error => Err(CoSimError::Protocol(ErrorFrame::read(channel)?.message)),
            other => Err(CoSimError::Protocol(format!("unexpected frame {other:?} after {kind:?}"))),
        }
    }

    pub fn start(&mut self, sim_time: SimulationTime) -> Result<()> {
        self.lifecycle(FrameKind::Start, Command::Start, sim_time)
    }

    pub fn stop(&mut self, sim_time: SimulationTime) -> Result<()> {
        self.lifecycle(FrameKind::Stop, Command::Stop, sim_time)
    }

    pub fn pause(&mut self, sim_time: SimulationTime) -> Result<()> {
        self.lifecycle(FrameKind::Pause, Command::Pause, sim_time)
    }

    pub fn continue_(&mut self, sim_time: SimulationTime) -> Result<()> {
        self.lifecycle(FrameKind::Continue, Command::Continue, sim_time)
    }

    pub fn terminate(&mut self, sim_time: SimulationTime) -> Result<()> {
        self.lifecycle(FrameKind::Terminate, Command::Terminate, sim_time)
    }

    /// Call roughly once a second from the host application's idle loop:
    /// accepts a pending connection, or pings the connected client and
    /// dispatches whatever command it reports back (spec §4.9
    /// `BackgroundService`). Returns the round-trip time of the `Ping`
    /// when one was sent.
    pub fn background_service(&mut self) -> Result<Option<Duration>> {
        let Some(mut connection) = self.connection.take() else {
            self.accept_channel(Duration::from_millis(0))?;
            return Ok(None);
        };

        let started = Instant::now();
        let result = Self::ping_on_connection(&mut connection);
        match result {
            Ok(pending_command) => {
                self.connection = Some(connection);
                self.handle_pending_command(pending_command);
                Ok(Some(started.elapsed()))
            }
            Err(error) => {
                self.close_connection();
                Err(error)
            }
        }
    }

    fn ping_on_connection(connection: &mut Connection) -> Result<Option<Command>> {
        let channel = &mut connection.channel;
        FrameKind::Ping.write(channel)?;
        channel.end_write()?;

        channel.begin_read_frame()?;
        match FrameKind::read(channel)? {
            FrameKind::PingOk => Ok(PingOkFrame::read(channel)?.pending_command),
            FrameKind::Error => Err(CoSimError::Protocol(ErrorFrame::read(channel)?.message)),
            other => Err(CoSimError::Protocol(format!("unexpected frame {other:?} after Ping"))),
        }
    }
}
