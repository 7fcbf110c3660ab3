//! Lifecycle glue: turns a [`Config`] into an open tun device, a bound UDP
//! socket, and a running [`EventLoop`]. Grounded on `tunnel_create()`.

use std::net::SocketAddr;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use crate::config::Config;
use crate::error::TunnelError;
use crate::event_loop::{self, EventLoop};
use crate::fec::FecEngine;
use crate::receiver::Receiver;
use crate::secret;
use crate::sender::Sender;
use crate::time::TimeProvider;
use crate::transport::{Role, UdpTransport};
use crate::tun_device::TunDevice;

pub struct Tunnel<'a> {
    event_loop: EventLoop<'a>,
}

impl<'a> Tunnel<'a> {
    /// `resync_requested` is shared with the caller's SIGUSR1 handler; the
    /// caller creates it (via [`event_loop::install_resync_flag`]) so it can
    /// wire the same `Arc` into `signal_hook` before starting the loop.
    pub fn create(
        config: &Config,
        time: &'a dyn TimeProvider,
        resync_requested: Arc<AtomicBool>,
    ) -> Result<Self, TunnelError> {
        let tun = TunDevice::open(&config.iface_name)?;

        let role = if config.is_server_mode() {
            tracing::info!("using server mode");
            Role::Server { peer: None }
        } else {
            let peer = SocketAddr::from((config.remote_host, config.remote_port));
            tracing::info!(%peer, "using client mode");
            Role::Client { peer }
        };

        let socket = event_loop::bind_socket(config.local_port, &role)?;
        let transport = UdpTransport::new(socket, role);

        let secret = secret::compiled_secret();
        let sender = Sender::new(FecEngine::new()?, secret.clone(), time);
        let receiver = Receiver::new(FecEngine::new()?, secret);

        let event_loop = EventLoop::new(tun, transport, sender, receiver, time, resync_requested);

        Ok(Self { event_loop })
    }

    pub fn run(&mut self) -> Result<(), TunnelError> {
        self.event_loop.run()
    }
}
