use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use cosim_net::{BlockingStream, Channel, Listener};
use cosim_protocol::{ErrorFrame, FrameKind, GetPortFrame, GetPortOkFrame, SetPortFrame, UnsetPortFrame};
use cosim_types::{constants, Result};
use tracing::warn;

use crate::registry::Registry;

/// Stand-alone TCP RPC server fronting a [`Registry`] (spec §4.7). Runs
/// its own accept thread; each accepted connection is handled on a short-
/// lived thread of its own since, unlike a `CoSimServer`, the mapper
/// serves any number of concurrent callers.
pub struct PortMapperServer {
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
    port: u16,
}

impl PortMapperServer {
    /// Binds the listener and starts the accept loop. `port == 0` lets
    /// the OS choose one, readable back via [`PortMapperServer::port`].
    pub fn start(port: u16, enable_remote_access: bool) -> Result<Self> {
        let mut listener = Listener::bind_tcp(port, enable_remote_access)?;
        let bound_port = listener.local_port().expect("TCP listener reports a port");

        let registry = Arc::new(Registry::new());
        let stop = Arc::new(AtomicBool::new(false));
        let accept_stop = stop.clone();

        let handle = thread::spawn(move || {
            while !accept_stop.load(Ordering::Relaxed) {
                match listener.accept(Duration::from_millis(constants::ACCEPT_POLL_INTERVAL_MS)) {
                    Ok(Some(stream)) => {
                        let registry = registry.clone();
                        thread::spawn(move || handle_connection(stream, &registry));
                    }
                    Ok(None) => {}
                    Err(error) => warn!(%error, "port-mapper accept failed"),
                }
            }
        });

        Ok(Self { stop, handle: Some(handle), port: bound_port })
    }

    #[must_use]
    pub fn port(&self) -> u16 {
        self.port
    }
}

impl Drop for PortMapperServer {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

fn handle_connection(stream: BlockingStream, registry: &Registry) {
    let mut channel = Channel::new(stream);
    if let Err(error) = serve_one_request(&mut channel, registry) {
        warn!(%error, "port-mapper request failed");
    }
}

fn serve_one_request(channel: &mut Channel, registry: &Registry) -> Result<()> {
    channel.begin_read_frame()?;
    match FrameKind::read(channel)? {
        FrameKind::SetPort => {
            let request = SetPortFrame::read(channel)?;
            registry.set_port(&request.name, request.port);
            FrameKind::Ok.write(channel)?;
        }
        FrameKind::UnsetPort => {
            let request = UnsetPortFrame::read(channel)?;
            registry.unset_port(&request.name);
            FrameKind::Ok.write(channel)?;
        }
        FrameKind::GetPort => {
            let request = GetPortFrame::read(channel)?;
            match registry.get_port(&request.name) {
                Ok(port) => {
                    FrameKind::GetPortOk.write(channel)?;
                    GetPortOkFrame { port }.write(channel)?;
                }
                Err(error) => {
                    FrameKind::Error.write(channel)?;
                    ErrorFrame { message: error.to_string() }.write(channel)?;
                }
            }
        }
        other => {
            FrameKind::Error.write(channel)?;
            ErrorFrame { message: format!("unexpected port-mapper request frame {other:?}") }.write(channel)?;
        }
    }
    channel.end_write()
}
