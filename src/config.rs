//! Command-line configuration, grounded on the `clap::Parser` derive style
//! used by `tox-sequenced`'s `bin/benchmark.rs` — doc comments on each field
//! double as `--help` text.

use std::net::Ipv4Addr;

use clap::Parser;

/// A point-to-point IP tunnel over UDP with interleaved Reed-Solomon FEC.
#[derive(Debug, Parser)]
#[command(name = "eccvpn", version, about)]
pub struct Config {
    /// Name of the tun interface to create or attach to.
    pub iface_name: String,

    /// Remote tunnel endpoint. `0.0.0.0` selects server mode: the peer
    /// address is instead learned from the first authenticated inbound
    /// packet.
    pub remote_host: Ipv4Addr,

    /// Local UDP port to bind.
    pub local_port: u16,

    /// Remote UDP port. Ignored in server mode.
    pub remote_port: u16,

    /// Stay in the foreground instead of daemonizing.
    #[arg(long)]
    pub foreground: bool,

    /// Directory to chroot into after opening the tun device and socket.
    #[arg(long)]
    pub chroot_dir: Option<String>,

    /// Unprivileged user to switch to after privileges are no longer needed.
    #[arg(long)]
    pub run_as_user: Option<String>,

    /// Unprivileged group to switch to after privileges are no longer needed.
    #[arg(long)]
    pub run_as_group: Option<String>,
}

impl Config {
    /// Server mode is selected the same way the original tunnel selects it:
    /// an unspecified remote address and a zero remote port.
    pub fn is_server_mode(&self) -> bool {
        self.remote_host == Ipv4Addr::UNSPECIFIED && self.remote_port == 0
    }
}
