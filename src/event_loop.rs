//! The single-threaded, cooperative event loop multiplexing the tun device
//! and the UDP socket. Grounded on `main()`'s `select()` loop: no threads,
//! no async runtime, every inbound payload is handled start-to-finish before
//! the next `poll` call.
//!
//! `mio` stands in for `select()` here; nothing in the teacher crate does
//! raw fd multiplexing of its own, so this is an ecosystem import rather
//! than an adaptation of teacher code (see DESIGN.md).

use std::io::{self, ErrorKind};
use std::net::SocketAddr;
use std::os::unix::io::AsRawFd;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use mio::unix::SourceFd;
use mio::{Events, Interest, Poll, Token};

use crate::constants::PACKET_SIZE;
use crate::receiver::{DeliverStatus, Receiver};
use crate::sender::Sender;
use crate::time::TimeProvider;
use crate::transport::{Role, UdpTransport};
use crate::tun_device::TunDevice;
use crate::TunnelError;

const TUN_TOKEN: Token = Token(0);
const SOCKET_TOKEN: Token = Token(1);

/// Set by the SIGUSR1 handler installed in `src/bin/eccvpn.rs`; consumed
/// (read-and-cleared) once per inbound datagram, matching the original's
/// `force_reset` global.
pub fn install_resync_flag() -> Arc<AtomicBool> {
    Arc::new(AtomicBool::new(false))
}

pub struct EventLoop<'a> {
    tun: TunDevice,
    transport: UdpTransport,
    sender: Sender,
    receiver: Receiver,
    time: &'a dyn TimeProvider,
    resync_requested: Arc<AtomicBool>,
}

impl<'a> EventLoop<'a> {
    pub fn new(
        tun: TunDevice,
        transport: UdpTransport,
        sender: Sender,
        receiver: Receiver,
        time: &'a dyn TimeProvider,
        resync_requested: Arc<AtomicBool>,
    ) -> Self {
        Self {
            tun,
            transport,
            sender,
            receiver,
            time,
            resync_requested,
        }
    }

    /// Runs until a fatal I/O error occurs. Transient receive errors
    /// (`ECONNREFUSED`, matching an unreachable peer dropping a prior
    /// datagram) are logged and swallowed; everything else propagates.
    pub fn run(&mut self) -> Result<(), TunnelError> {
        let mut poll = Poll::new()?;
        let socket_fd = self.transport.socket().as_raw_fd();
        let tun_fd = self.tun.as_raw_fd();

        // mio's UdpSocket requires ownership to register; we only need edge
        // readiness notifications, so register the raw fd directly instead
        // of migrating socket ownership into mio.
        poll.registry()
            .register(&mut SourceFd(&socket_fd), SOCKET_TOKEN, Interest::READABLE)?;
        poll.registry()
            .register(&mut SourceFd(&tun_fd), TUN_TOKEN, Interest::READABLE)?;

        let mut events = Events::with_capacity(16);
        let mut buf = vec![0u8; PACKET_SIZE];

        loop {
            if let Err(e) = poll.poll(&mut events, None) {
                if e.kind() == ErrorKind::Interrupted {
                    continue;
                }
                return Err(TunnelError::Io(e));
            }

            for event in events.iter() {
                match event.token() {
                    SOCKET_TOKEN => self.handle_socket_readable(&mut buf)?,
                    TUN_TOKEN => self.handle_tun_readable(&mut buf)?,
                    _ => unreachable!(),
                }
            }
        }
    }

    /// Drains every datagram currently queued on the socket. Both the
    /// socket and the tun device are registered non-blocking and mio uses
    /// edge-triggered readiness on Linux, so leaving any of them unread
    /// would mean no further wakeup until new data arrives.
    fn handle_socket_readable(&mut self, buf: &mut [u8]) -> Result<(), TunnelError> {
        loop {
            let (n, from) = match self.recv_from_socket(buf) {
                Ok(v) => v,
                Err(e) if e.raw_os_error() == Some(libc::ECONNREFUSED) => continue,
                Err(e) if e.kind() == ErrorKind::WouldBlock => return Ok(()),
                Err(e) => return Err(TunnelError::Io(e)),
            };
            if n == 0 {
                continue;
            }

            let force_reset = self.resync_requested.swap(false, Ordering::SeqCst);
            let outcome = self.receiver.deliver(&buf[..n], force_reset, self.time)?;

            // Only a genuinely authenticated packet gets to move the peer:
            // adopting on `from` before the MAC check would let an arbitrary
            // source hijack the outbound peer with a forged or malformed
            // datagram.
            let authenticated = !matches!(
                outcome.status,
                Some(DeliverStatus::DroppedMalformed) | Some(DeliverStatus::DroppedAuthFailure)
            );
            if authenticated {
                if let Some(from) = from {
                    if self.transport.role_mut().adopt_peer(from) {
                        tracing::info!(peer = %from, "new peer address");
                    }
                }
            }

            for payload in &outcome.to_tun {
                self.tun.send(payload)?;
            }
        }
    }

    fn recv_from_socket(&self, buf: &mut [u8]) -> io::Result<(usize, Option<SocketAddr>)> {
        match self.transport.role() {
            Role::Client { .. } => self.transport.socket().recv(buf).map(|n| (n, None)),
            Role::Server { .. } => self
                .transport
                .socket()
                .recv_from(buf)
                .map(|(n, from)| (n, Some(from))),
        }
    }

    fn handle_tun_readable(&mut self, buf: &mut [u8]) -> Result<(), TunnelError> {
        loop {
            let n = match self.tun.recv(buf) {
                Ok(n) => n,
                Err(e) if e.kind() == ErrorKind::WouldBlock => return Ok(()),
                Err(e) => return Err(TunnelError::Io(e)),
            };
            if n == 0 {
                continue;
            }
            let ready_to_send =
                self.transport.role().is_client() || self.transport.role().known_peer().is_some();
            if ready_to_send {
                self.sender.submit(&buf[..n], &mut self.transport)?;
            }
        }
    }
}

/// Binds and, in client mode, connects the tunnel's UDP socket the same way
/// `tunnel_create()` does.
pub fn bind_socket(local_port: u16, role: &Role) -> Result<std::net::UdpSocket, TunnelError> {
    let socket = std::net::UdpSocket::bind(("0.0.0.0", local_port))?;
    if let Role::Client { peer } = role {
        socket.connect(peer)?;
    }
    // mio uses edge-triggered readiness on Linux; the socket must be
    // non-blocking so handle_socket_readable can drain it to WouldBlock.
    socket.set_nonblocking(true)?;
    Ok(socket)
}
