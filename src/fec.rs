//! Drives the external Reed-Solomon codec column-wise across one group's
//! `TOTAL_SIZE` packet slots.
//!
//! `reed_solomon_erasure::ReedSolomon` already treats a `Vec` of equal-length
//! shards as a matrix processed byte-column-by-byte-column internally, so a
//! packet slot maps directly onto a codec shard — there is no need to loop
//! over byte columns by hand the way a byte-at-a-time RS library would
//! require (see DESIGN.md for how this differs from the original).

use reed_solomon_erasure::galois_8::ReedSolomon;

use crate::constants::{DATA_SIZE, PAYLOAD_SIZE, TOTAL_SIZE};
use crate::error::TunnelError;
use crate::group::GroupBuffer;
use crate::ip;

pub struct FecEngine {
    codec: ReedSolomon,
}

impl FecEngine {
    pub fn new() -> Result<Self, TunnelError> {
        let codec = ReedSolomon::new(DATA_SIZE, TOTAL_SIZE - DATA_SIZE)
            .map_err(|e| TunnelError::Codec(e.to_string()))?;
        Ok(Self { codec })
    }

    /// Computes the parity slots of `group` over its first `max_size` bytes
    /// and stores them back into the group's parity slots, sized to
    /// `max_size` — matching the sender's width for this matrix row.
    pub fn encode(&self, group: &mut GroupBuffer, max_size: usize) -> Result<(), TunnelError> {
        if max_size == 0 {
            return Ok(());
        }
        debug_assert!(max_size <= PAYLOAD_SIZE);

        let mut shards: Vec<Vec<u8>> = group
            .slots
            .iter()
            .map(|slot| {
                let mut shard = vec![0u8; max_size];
                let n = slot.size.min(max_size);
                shard[..n].copy_from_slice(&slot.data[..n]);
                shard
            })
            .collect();

        self.codec
            .encode(&mut shards)
            .map_err(|e| TunnelError::Codec(e.to_string()))?;

        for i in DATA_SIZE..TOTAL_SIZE {
            group.slots[i].fill(&shards[i]);
        }
        Ok(())
    }

    /// Reconstructs erased data slots of `group` over its `max_size` column
    /// width, in place. Only invoked by the receiver once a group has
    /// accumulated exactly `DATA_SIZE` packets, so there are exactly
    /// `TOTAL_SIZE - DATA_SIZE` erasures at call time.
    ///
    /// A no-op (returns `Ok(0)`) when there are no erased *data* slots —
    /// missing parity alone needs no repair.
    pub fn decode(&self, group: &mut GroupBuffer, max_size: usize) -> Result<usize, TunnelError> {
        let erased: Vec<bool> = group.slots.iter().map(|s| s.is_empty()).collect();
        let data_erasures = erased[..DATA_SIZE].iter().filter(|&&e| e).count();
        if data_erasures == 0 || max_size == 0 {
            return Ok(0);
        }

        let mut shards: Vec<Option<Vec<u8>>> = group
            .slots
            .iter()
            .zip(erased.iter())
            .map(|(slot, &is_erased)| {
                if is_erased {
                    None
                } else {
                    Some(slot.data[..max_size].to_vec())
                }
            })
            .collect();

        self.codec
            .reconstruct(&mut shards)
            .map_err(|e| TunnelError::Codec(e.to_string()))?;

        let mut recovered = 0;
        for (i, was_erased) in erased.iter().enumerate().take(DATA_SIZE) {
            if !was_erased {
                continue;
            }
            let shard = shards[i]
                .as_ref()
                .expect("reconstruct fills every previously-None shard on success");
            match ip::validate_recovered_datagram(shard, PAYLOAD_SIZE) {
                Some(total_len) => {
                    group.slots[i].fill(&shard[..total_len]);
                    recovered += 1;
                }
                None => {
                    tracing::warn!(slot = i, "recovered data slot failed IP validation, dropped");
                }
            }
        }
        Ok(recovered)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::group::GroupBuffer;

    fn sample_group(widths: &[usize; TOTAL_SIZE]) -> Box<GroupBuffer> {
        let mut g = GroupBuffer::new(0);
        for (i, w) in widths.iter().enumerate() {
            if *w > 0 {
                let payload: Vec<u8> = (0..*w).map(|b| (i * 7 + b) as u8).collect();
                g.slots[i].fill(&payload);
            }
        }
        g
    }

    #[test]
    fn encode_then_decode_recovers_check_size_losses() {
        let engine = FecEngine::new().unwrap();
        let widths = [32; TOTAL_SIZE];
        let mut group = sample_group(&widths);
        // Make the first 16 slots look like real, checksummed IPv4 headers
        // so post-decode validation accepts them.
        for i in 0..DATA_SIZE {
            let mut hdr = [0u8; 32];
            hdr[0] = 0x45;
            hdr[2..4].copy_from_slice(&32u16.to_be_bytes());
            let csum = ip::checksum(&hdr[..20]);
            hdr[10..12].copy_from_slice(&csum.to_be_bytes());
            group.slots[i].fill(&hdr);
        }
        engine.encode(&mut group, 32).unwrap();

        // Erase CHECK_SIZE (4) data slots — the maximum this code can repair.
        for i in [1usize, 4, 9, 15] {
            group.slots[i].clear();
        }
        let recovered = engine.decode(&mut group, 32).unwrap();
        assert_eq!(recovered, 4);
        for i in [1usize, 4, 9, 15] {
            assert_eq!(group.slots[i].size, 32);
        }
    }

    #[test]
    fn decode_is_noop_when_only_parity_is_missing() {
        let engine = FecEngine::new().unwrap();
        let widths = [16; TOTAL_SIZE];
        let mut group = sample_group(&widths);
        engine.encode(&mut group, 16).unwrap();
        group.slots[DATA_SIZE].clear();
        group.slots[DATA_SIZE + 1].clear();
        let recovered = engine.decode(&mut group, 16).unwrap();
        assert_eq!(recovered, 0);
    }
}
