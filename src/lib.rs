//! A point-to-point IP tunnel over UDP with interleaved Reed-Solomon forward
//! error correction, modeled on the long-standing `eccvpn` design: no
//! congestion control, no retransmission, no key exchange, one peer per
//! tunnel. Loss is masked statistically by spreading each group of data
//! packets across a matrix of parity packets instead of by asking the
//! sender to resend anything.

pub mod config;
pub mod constants;
pub mod error;
pub mod event_loop;
pub mod fec;
pub mod group;
pub mod ip;
pub mod receiver;
pub mod secret;
pub mod sender;
pub mod seq;
pub mod time;
pub mod transport;
pub mod tun_device;
pub mod tunnel;
pub mod wire;

pub use error::TunnelError;
pub use tunnel::Tunnel;
