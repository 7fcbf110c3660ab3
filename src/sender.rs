//! Outbound half of the tunnel: accumulates packets into an interleaved
//! matrix of groups and flushes a parity burst once the matrix fills.
//!
//! Grounded on `tunnel_encaps()` in the original C tunnel: a payload arrives
//! from the tun device, is framed and sent immediately, then copied into the
//! in-flight matrix; once the last data slot of the last group in the matrix
//! is filled, every group in the matrix is encoded and its freshly computed
//! parity packets are sent as one burst.

use crate::constants::{DATA_SIZE, HEADER_SIZE, INTERLEAVE, PAYLOAD_SIZE, TOTAL_SIZE};
use crate::error::TunnelError;
use crate::fec::FecEngine;
use crate::group::GroupBuffer;
use crate::seq::Sequence;
use crate::time::TimeProvider;
use crate::transport::Transport;
use crate::wire;

/// Sender-side state: the in-flight interleaved matrix plus the cursor
/// tracking where the next outbound packet lands within it.
pub struct Sender {
    fec: FecEngine,
    secret: Vec<u8>,
    matrix: [Box<GroupBuffer>; INTERLEAVE],
    /// Sequence number of interleave column 0's group; columns 1..INTERLEAVE
    /// are `seq_snd + 1 ..= seq_snd + INTERLEAVE - 1`.
    seq_snd: Sequence,
    /// Row within the current group (0..DATA_SIZE).
    npkt: u8,
    /// Column within the matrix (0..INTERLEAVE).
    snd_il: u8,
}

impl Sender {
    /// Seeds `seq_snd` from wall-clock time the way the original tunnel
    /// does (`(time(NULL) & 0xFFFF) << 16`) — not a source of real entropy,
    /// just a cheap way to avoid colliding with a previous run's sequence
    /// space after a restart.
    pub fn new(fec: FecEngine, secret: Vec<u8>, time: &dyn TimeProvider) -> Self {
        let seed = ((time.now_unix_secs() & 0xFFFF) as u32) << 16;
        Self {
            fec,
            secret,
            matrix: std::array::from_fn(|_| GroupBuffer::new(time.now_unix_secs())),
            seq_snd: Sequence(seed),
            npkt: 0,
            snd_il: 0,
        }
    }

    /// Frames and sends `payload`, then folds it into the in-flight matrix.
    /// When this completes the matrix's last row, every group in the matrix
    /// is encoded and the resulting parity packets are sent as one burst.
    pub fn submit(&mut self, payload: &[u8], transport: &mut dyn Transport) -> Result<(), TunnelError> {
        debug_assert!(payload.len() <= PAYLOAD_SIZE);

        let seq = self.seq_snd.wrapping_add(self.snd_il as u32);
        let mut buf = vec![0u8; HEADER_SIZE + payload.len()];
        let n = wire::encode_header(&mut buf, seq, self.npkt, payload, &self.secret);
        transport.send(&buf[..n])?;

        let group = &mut self.matrix[self.snd_il as usize];
        group.slots[self.npkt as usize].fill(payload);

        if self.snd_il as usize == INTERLEAVE - 1 && self.npkt as usize == DATA_SIZE - 1 {
            self.flush_matrix(transport)?;
        }

        self.advance();
        Ok(())
    }

    fn flush_matrix(&mut self, transport: &mut dyn Transport) -> Result<(), TunnelError> {
        let mut burst = Vec::with_capacity(INTERLEAVE * (TOTAL_SIZE - DATA_SIZE));
        for (col, group) in self.matrix.iter_mut().enumerate() {
            let max_size = group.max_size();
            self.fec.encode(group, max_size)?;

            let group_seq = self.seq_snd.wrapping_add(col as u32);
            for idx in DATA_SIZE..TOTAL_SIZE {
                let payload = group.slots[idx].as_slice();
                let mut buf = vec![0u8; HEADER_SIZE + payload.len()];
                let n = wire::encode_header(&mut buf, group_seq, idx as u8, payload, &self.secret);
                buf.truncate(n);
                burst.push(buf);
            }
        }
        transport.send_burst(&burst)?;
        Ok(())
    }

    fn advance(&mut self) {
        if self.snd_il as usize == INTERLEAVE - 1 {
            self.snd_il = 0;
            if self.npkt as usize == DATA_SIZE - 1 {
                self.npkt = 0;
                self.seq_snd = self.seq_snd.wrapping_add(INTERLEAVE as u32);
                for group in &mut self.matrix {
                    let age = group.age_unix_secs;
                    *group = GroupBuffer::new(age);
                }
            } else {
                self.npkt += 1;
            }
        } else {
            self.snd_il += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::ManualTimeProvider;
    use crate::transport::mock::RecordingTransport;

    fn sender() -> Sender {
        let fec = FecEngine::new().unwrap();
        let time = ManualTimeProvider::new(0);
        Sender::new(fec, b"secret".to_vec(), &time)
    }

    #[test]
    fn sends_one_packet_immediately_per_submit() {
        let mut s = sender();
        let mut t = RecordingTransport::default();
        s.submit(&[1, 2, 3], &mut t).unwrap();
        assert_eq!(t.sent.len(), 1);
    }

    #[test]
    fn flushes_parity_burst_after_filling_the_matrix() {
        let mut s = sender();
        let mut t = RecordingTransport::default();
        let payload = [9u8; 32];
        for _ in 0..DATA_SIZE * INTERLEAVE - 1 {
            s.submit(&payload, &mut t).unwrap();
        }
        let before = t.sent.len();
        s.submit(&payload, &mut t).unwrap();
        // One more data packet, plus a burst of INTERLEAVE * CHECK_SIZE parity packets.
        let parity_count = INTERLEAVE * (TOTAL_SIZE - DATA_SIZE);
        assert_eq!(t.sent.len(), before + 1 + parity_count);
    }

    #[test]
    fn one_completed_row_advances_the_column_cursor_not_the_sequence() {
        let mut s = sender();
        let mut t = RecordingTransport::default();
        let start = s.seq_snd;
        for _ in 0..INTERLEAVE {
            s.submit(&[0u8; 4], &mut t).unwrap();
        }
        // One row done means one packet landed in every column's group, but
        // the matrix's groups keep their sequence numbers until every row
        // is filled.
        assert_eq!(s.seq_snd, start);
        assert_eq!(s.npkt, 1);
        assert_eq!(s.snd_il, 0);
    }

    #[test]
    fn sequence_advances_by_interleave_once_the_whole_matrix_completes() {
        let mut s = sender();
        let mut t = RecordingTransport::default();
        let start = s.seq_snd;
        for _ in 0..DATA_SIZE * INTERLEAVE {
            s.submit(&[0u8; 4], &mut t).unwrap();
        }
        assert_eq!(s.seq_snd, start.wrapping_add(INTERLEAVE as u32));
        assert_eq!(s.npkt, 0);
        assert_eq!(s.snd_il, 0);
    }
}
