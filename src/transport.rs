//! Client vs. server is modeled as two thin capability variants rather than
//! an inheritance hierarchy: they differ only in whether the UDP socket is
//! connected up front, and whether the receive path captures the source
//! address of each datagram (see §9 of DESIGN.md / the spec's polymorphism
//! note).

use std::io;
use std::net::{SocketAddr, UdpSocket};
use std::os::unix::io::AsRawFd;

/// Everything the sender needs to get packets onto the wire. Kept as a
/// trait so the sender/receiver engine can be driven in tests without a
/// real socket.
pub trait Transport {
    /// Sends one already-framed packet.
    fn send(&mut self, packet: &[u8]) -> io::Result<()>;

    /// Sends a burst of already-framed parity packets for one matrix flush.
    /// The default implementation just sends them one at a time; the real
    /// UDP transport overrides this to match §4.3 step 4's
    /// connect-vectored-send-disconnect dance in server mode.
    fn send_burst(&mut self, packets: &[Vec<u8>]) -> io::Result<()> {
        for p in packets {
            self.send(p)?;
        }
        Ok(())
    }
}

/// Which address the next outbound packet should go to, and whether the
/// receive path should adopt a new peer from inbound traffic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// Socket is connected to a single, known peer up front.
    Client { peer: SocketAddr },
    /// Peer address is learned from the first valid inbound packet and may
    /// change at any time (§6 "role change").
    Server { peer: Option<SocketAddr> },
}

impl Role {
    pub fn is_client(&self) -> bool {
        matches!(self, Role::Client { .. })
    }

    pub fn known_peer(&self) -> Option<SocketAddr> {
        match self {
            Role::Client { peer } => Some(*peer),
            Role::Server { peer } => *peer,
        }
    }

    /// Adopts `from` as the new peer. Only meaningful in server mode; a
    /// no-op for a client, whose peer is fixed at construction.
    pub fn adopt_peer(&mut self, from: SocketAddr) -> bool {
        match self {
            Role::Client { .. } => false,
            Role::Server { peer } => {
                let changed = *peer != Some(from);
                *peer = Some(from);
                changed
            }
        }
    }
}

/// The real UDP-socket-backed transport.
pub struct UdpTransport {
    socket: UdpSocket,
    role: Role,
}

impl UdpTransport {
    pub fn new(socket: UdpSocket, role: Role) -> Self {
        Self { socket, role }
    }

    pub fn role(&self) -> &Role {
        &self.role
    }

    pub fn role_mut(&mut self) -> &mut Role {
        &mut self.role
    }

    pub fn socket(&self) -> &UdpSocket {
        &self.socket
    }

    /// Temporarily connects the socket to `peer` for the duration of `f`,
    /// restoring the unconnected state afterwards. No-op in client mode,
    /// where the socket stays connected for the tunnel's whole lifetime.
    fn with_connected<R>(&self, peer: SocketAddr, f: impl FnOnce() -> io::Result<R>) -> io::Result<R> {
        if self.role.is_client() {
            return f();
        }
        self.socket.connect(peer)?;
        let result = f();
        disconnect(&self.socket)?;
        result
    }
}

impl Transport for UdpTransport {
    fn send(&mut self, packet: &[u8]) -> io::Result<()> {
        match self.role {
            Role::Client { .. } => {
                self.socket.send(packet)?;
            }
            Role::Server { peer: Some(peer) } => {
                self.socket.send_to(packet, peer)?;
            }
            Role::Server { peer: None } => {
                // No known peer yet; the event loop is responsible for not
                // calling submit() in this state (§4.5).
            }
        }
        Ok(())
    }

    fn send_burst(&mut self, packets: &[Vec<u8>]) -> io::Result<()> {
        let Some(peer) = self.role.known_peer() else {
            return Ok(());
        };
        self.with_connected(peer, || writev_all(&self.socket, packets))
    }
}

/// Sends every packet in `packets` over an already-connected socket via
/// `writev`, matching the original's use of `writev(sockfd, iov, 2)` per
/// parity packet rather than one `send` syscall per packet.
fn writev_all(socket: &UdpSocket, packets: &[Vec<u8>]) -> io::Result<()> {
    let fd = socket.as_raw_fd();
    for packet in packets {
        let iov = libc::iovec {
            iov_base: packet.as_ptr() as *mut libc::c_void,
            iov_len: packet.len(),
        };
        let n = unsafe { libc::writev(fd, &iov, 1) };
        if n < 0 {
            return Err(io::Error::last_os_error());
        }
    }
    Ok(())
}

/// Disconnects a connected UDP socket by reconnecting it to `AF_UNSPEC`,
/// the same trick the original C tunnel uses (`connect()` to a
/// zeroed `sockaddr` with `sin_family = AF_UNSPEC`). `std::net::UdpSocket`
/// has no safe API for this.
fn disconnect(socket: &UdpSocket) -> io::Result<()> {
    let fd = socket.as_raw_fd();
    let addr: libc::sockaddr_in = unsafe { std::mem::zeroed() };
    let mut addr = addr;
    addr.sin_family = libc::AF_UNSPEC as libc::sa_family_t;
    let ret = unsafe {
        libc::connect(
            fd,
            &addr as *const libc::sockaddr_in as *const libc::sockaddr,
            std::mem::size_of::<libc::sockaddr_in>() as libc::socklen_t,
        )
    };
    if ret < 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}

/// Test-only transport implementations, kept public (not `#[cfg(test)]`) so
/// both in-crate unit tests and `tests/*.rs` integration tests can drive the
/// sender without a real socket.
pub mod mock {
    use super::Transport;
    use std::io;

    /// Records every framed packet handed to it, for use in sender tests
    /// that don't need a real socket.
    #[derive(Default)]
    pub struct RecordingTransport {
        pub sent: Vec<Vec<u8>>,
    }

    impl Transport for RecordingTransport {
        fn send(&mut self, packet: &[u8]) -> io::Result<()> {
            self.sent.push(packet.to_vec());
            Ok(())
        }
    }
}
