//! The virtual network interface the tunnel reads plaintext IP datagrams
//! from and writes recovered ones back to.
//!
//! Grounded on `tunnel_create()`'s `/dev/net/tun` + `TUNSETIFF` dance;
//! `tun-tap` wraps exactly that ioctl sequence, so this module is a thin
//! layer on top of it plus the `SIOCSIFMTU` call the original also makes,
//! which the crate itself does not expose.

use std::io;
use std::os::unix::io::AsRawFd;

use tun_tap::{Iface, Mode};

use crate::constants::PAYLOAD_SIZE;
use crate::error::TunnelError;

pub struct TunDevice {
    iface: Iface,
}

impl TunDevice {
    /// Opens (or attaches to) `name` in IP-only mode (`IFF_TUN | IFF_NO_PI`)
    /// and sets its MTU so a full-size inner datagram never needs
    /// fragmentation across the tunnel.
    pub fn open(name: &str) -> Result<Self, TunnelError> {
        let iface = Iface::new(name, Mode::Tun).map_err(|e| TunnelError::Tun(e.to_string()))?;
        set_mtu(iface.name(), PAYLOAD_SIZE as i32).map_err(|e| TunnelError::Tun(e.to_string()))?;
        set_nonblocking(iface.as_raw_fd()).map_err(|e| TunnelError::Tun(e.to_string()))?;
        Ok(Self { iface })
    }

    pub fn recv(&self, buf: &mut [u8]) -> io::Result<usize> {
        self.iface.recv(buf)
    }

    pub fn send(&self, buf: &[u8]) -> io::Result<usize> {
        self.iface.send(buf)
    }
}

impl AsRawFd for TunDevice {
    fn as_raw_fd(&self) -> std::os::unix::io::RawFd {
        self.iface.as_raw_fd()
    }
}

/// Mirrors the kernel's `struct ifreq` for the `SIOCSIFMTU` request only:
/// interface name followed by the `ifr_mtu` member of its union. `libc`
/// does not expose `ifreq` itself, so the layout is reproduced by hand the
/// way most tun/tap crates do.
#[repr(C)]
struct IfreqMtu {
    ifr_name: [libc::c_char; libc::IFNAMSIZ],
    ifr_mtu: libc::c_int,
}

/// `tun-tap` offers no non-blocking toggle, so it's set directly via
/// `fcntl`. Required so the event loop's edge-triggered `mio` readiness can
/// safely drain the device in a loop without risking a block on an empty
/// read.
fn set_nonblocking(fd: std::os::unix::io::RawFd) -> io::Result<()> {
    let flags = unsafe { libc::fcntl(fd, libc::F_GETFL, 0) };
    if flags < 0 {
        return Err(io::Error::last_os_error());
    }
    let ret = unsafe { libc::fcntl(fd, libc::F_SETFL, flags | libc::O_NONBLOCK) };
    if ret < 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}

fn set_mtu(if_name: &str, mtu: i32) -> io::Result<()> {
    let sock = unsafe { libc::socket(libc::AF_INET, libc::SOCK_DGRAM, 0) };
    if sock < 0 {
        return Err(io::Error::last_os_error());
    }

    let mut ifr: IfreqMtu = unsafe { std::mem::zeroed() };
    let name_bytes = if_name.as_bytes();
    debug_assert!(name_bytes.len() < ifr.ifr_name.len());
    for (dst, &src) in ifr.ifr_name.iter_mut().zip(name_bytes) {
        *dst = src as libc::c_char;
    }
    ifr.ifr_mtu = mtu;

    let ret = unsafe { libc::ioctl(sock, libc::SIOCSIFMTU, &ifr) };
    let err = io::Error::last_os_error();
    unsafe { libc::close(sock) };
    if ret < 0 {
        return Err(err);
    }
    Ok(())
}
