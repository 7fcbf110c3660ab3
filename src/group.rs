//! A packet slot and the fixed-width group buffer that holds one row of the
//! interleaved FEC matrix, on both the sending and receiving side.

use crate::constants::{PAYLOAD_SIZE, TOTAL_SIZE};

/// One slot in a group: a fixed-capacity buffer plus the actual payload
/// length. `size == 0` uniquely means "empty/erased" — there is no separate
/// presence flag.
#[derive(Clone)]
pub struct PacketSlot {
    pub size: usize,
    pub data: [u8; PAYLOAD_SIZE],
}

impl PacketSlot {
    pub fn empty() -> Self {
        Self {
            size: 0,
            data: [0u8; PAYLOAD_SIZE],
        }
    }

    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    /// Fills the slot from `payload`, which must fit within `PAYLOAD_SIZE`.
    pub fn fill(&mut self, payload: &[u8]) {
        debug_assert!(payload.len() <= PAYLOAD_SIZE);
        self.data[..payload.len()].copy_from_slice(payload);
        self.size = payload.len();
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.data[..self.size]
    }

    pub fn clear(&mut self) {
        self.size = 0;
    }
}

/// `TOTAL_SIZE` packet slots belonging to one group, plus the point in time
/// the first packet for the group was seen (kept for diagnostics — see the
/// forced-resync extended report).
pub struct GroupBuffer {
    pub slots: [PacketSlot; TOTAL_SIZE],
    pub age_unix_secs: u64,
}

impl GroupBuffer {
    pub fn new(age_unix_secs: u64) -> Box<Self> {
        Box::new(Self {
            slots: std::array::from_fn(|_| PacketSlot::empty()),
            age_unix_secs,
        })
    }

    /// The widest payload observed across data slots so far; this sets the
    /// codec's column count for the group.
    pub fn max_size(&self) -> usize {
        self.slots.iter().map(|s| s.size).max().unwrap_or(0)
    }

    /// Indices of slots still missing a packet.
    pub fn missing_indices(&self) -> Vec<usize> {
        self.slots
            .iter()
            .enumerate()
            .filter(|(_, s)| s.is_empty())
            .map(|(i, _)| i)
            .collect()
    }
}
