//! Wire and protocol constants. Both tunnel endpoints must be built from the
//! same values here — there is no runtime negotiation.

/// Underlying link MTU in bytes.
pub const LINK_MTU: usize = 1500;

/// Maximum UDP payload (link MTU minus the 20-byte IP header and 8-byte UDP header).
pub const PACKET_SIZE: usize = LINK_MTU - 28;

/// Number of data packets per group.
pub const DATA_SIZE: usize = 16;

/// Number of parity packets per group, fixed by the Reed-Solomon codec width.
pub const CHECK_SIZE: usize = 4;

/// Data packets plus parity packets per group.
pub const TOTAL_SIZE: usize = DATA_SIZE + CHECK_SIZE;

/// Number of parallel groups making up one interleaved transmission matrix.
pub const INTERLEAVE: usize = 4;

/// Receive window size, in groups.
pub const HIST_SIZE: u32 = 65_536;

/// Idle seconds after which the receiver resynchronises with the peer.
pub const RECEIVE_TIMEOUT: u64 = 10_800;

/// Bytes of truncated HMAC-SHA1 carried on the wire.
pub const HMAC_SIZE: usize = 20;

/// Wire header size: 4-byte sequence, 1-byte index, plus the HMAC when enabled.
#[cfg(not(feature = "no-hmac"))]
pub const HEADER_SIZE: usize = 4 + 1 + HMAC_SIZE;
#[cfg(feature = "no-hmac")]
pub const HEADER_SIZE: usize = 4 + 1;

/// Inner datagram capacity: whatever is left of a link-MTU-sized UDP payload
/// once the header is accounted for.
pub const PAYLOAD_SIZE: usize = PACKET_SIZE - HEADER_SIZE;

/// Smallest possible IPv4 header, used as the floor for a plausible inner datagram.
pub const MIN_IP_HEADER_SIZE: usize = 20;
