//! Inbound half of the tunnel: per-group reassembly, immediate delivery,
//! triggered FEC recovery, and peer resynchronisation.
//!
//! Grounded on `tunnel_decaps()` / `tunnel_recycle_grp()` in the original C
//! tunnel. The receive window is `HIST_SIZE` groups wide; each slot lazily
//! allocates a [`GroupBuffer`] on its first arrival and releases it once the
//! group is fully accounted for.

use crate::constants::{DATA_SIZE, HIST_SIZE, RECEIVE_TIMEOUT, TOTAL_SIZE};
use crate::error::TunnelError;
use crate::fec::FecEngine;
use crate::group::GroupBuffer;
use crate::seq::Sequence;
use crate::time::TimeProvider;
use crate::wire;

/// What happened to one inbound datagram.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliverStatus {
    /// Accepted; see [`DeliverOutcome::to_tun`] for what should be written out.
    Delivered,
    DroppedMalformed,
    DroppedAuthFailure,
    DroppedLate,
    /// The group this packet belongs to already reached `TOTAL_SIZE` packets.
    DroppedDuplicate,
    /// The group was already decoded; this is the `DATA_SIZE + 1`th-or-later
    /// arrival and carries no new information.
    DroppedAlreadyRecovered,
}

/// Result of one [`Receiver::deliver`] call.
#[derive(Debug, Default)]
pub struct DeliverOutcome {
    pub status: Option<DeliverStatus>,
    /// Payloads to write to the virtual interface, in order: the packet's
    /// own payload first (if accepted), then any data slots the FEC engine
    /// newly recovered as a result of this arrival.
    pub to_tun: Vec<Vec<u8>>,
    /// Set when this arrival triggered a resynchronisation with the peer.
    pub resynced: bool,
}

impl DeliverOutcome {
    fn dropped(status: DeliverStatus) -> Self {
        Self {
            status: Some(status),
            to_tun: Vec::new(),
            resynced: false,
        }
    }
}

#[derive(Default)]
struct ReceiverSlot {
    count: u8,
    max_size: usize,
    group: Option<Box<GroupBuffer>>,
}

pub struct Receiver {
    fec: FecEngine,
    secret: Vec<u8>,
    slots: Vec<ReceiverSlot>,
    initialized: bool,
    seq_rcv: Sequence,
    seq_first: Sequence,
    last_receive: u64,
    rcv_total: u64,
    rcv_rec: u64,
    rcv_fail: u64,
}

impl Receiver {
    pub fn new(fec: FecEngine, secret: Vec<u8>) -> Self {
        Self {
            fec,
            secret,
            slots: (0..HIST_SIZE).map(|_| ReceiverSlot::default()).collect(),
            initialized: false,
            seq_rcv: Sequence(0),
            seq_first: Sequence(0),
            last_receive: 0,
            rcv_total: 0,
            rcv_rec: 0,
            rcv_fail: 0,
        }
    }

    pub fn rcv_total(&self) -> u64 {
        self.rcv_total
    }

    pub fn rcv_recovered(&self) -> u64 {
        self.rcv_rec
    }

    pub fn rcv_failed(&self) -> u64 {
        self.rcv_fail
    }

    /// Processes one inbound, still-framed datagram. `force_reset` carries
    /// the consumed state of a pending SIGUSR1 request (see the event loop),
    /// which forces an immediate resync and an extended diagnostic report.
    pub fn deliver(
        &mut self,
        buf: &[u8],
        force_reset: bool,
        time: &dyn TimeProvider,
    ) -> Result<DeliverOutcome, TunnelError> {
        let (hdr, payload) = match wire::verify_and_parse(buf, &self.secret) {
            Ok(v) => v,
            Err(TunnelError::MalformedPacket) => {
                tracing::warn!(len = buf.len(), "invalid packet received");
                return Ok(DeliverOutcome::dropped(DeliverStatus::DroppedMalformed));
            }
            Err(TunnelError::AuthFailure) => {
                tracing::warn!("dropped packet with invalid HMAC");
                return Ok(DeliverOutcome::dropped(DeliverStatus::DroppedAuthFailure));
            }
            Err(e) => return Err(e),
        };

        let now = time.now_unix_secs();
        let timed_out = self.last_receive + RECEIVE_TIMEOUT < now;
        let out_of_window = self.initialized && hdr.seq.after(self.seq_rcv.wrapping_add(HIST_SIZE - 1));
        let mut resynced = false;

        if force_reset || !self.initialized || timed_out || out_of_window {
            if force_reset {
                self.log_extended_report();
            }
            tracing::info!("synchronizing state with peer");
            for slot_id in 0..self.slots.len() {
                self.recycle_slot(slot_id);
            }
            if force_reset {
                tracing::info!(
                    total = self.rcv_total,
                    recovered = self.rcv_rec,
                    failed = self.rcv_fail,
                    "resync summary"
                );
            }
            self.seq_rcv = hdr.seq;
            self.seq_first = hdr.seq;
            self.initialized = true;
            self.rcv_total = 0;
            self.rcv_rec = 0;
            self.rcv_fail = 0;
            resynced = true;
        }
        self.last_receive = now;

        if hdr.seq.before_or_equal(self.seq_rcv.wrapping_sub(HIST_SIZE)) {
            tracing::warn!(seq = %hdr.seq, "dropped late packet");
            let mut outcome = DeliverOutcome::dropped(DeliverStatus::DroppedLate);
            outcome.resynced = resynced;
            return Ok(outcome);
        } else if hdr.seq.after(self.seq_rcv) {
            let mut seq = self.seq_rcv.wrapping_add(1);
            while seq != hdr.seq {
                self.recycle_slot(seq.window_slot(HIST_SIZE) as usize);
                seq = seq.wrapping_add(1);
            }
            self.recycle_slot(hdr.seq.window_slot(HIST_SIZE) as usize);
            self.seq_rcv = hdr.seq;
        }

        let slot_id = hdr.seq.window_slot(HIST_SIZE) as usize;
        if self.slots[slot_id].count as usize == TOTAL_SIZE {
            tracing::warn!(slot = slot_id, "duplicate packet in group");
            let mut outcome = DeliverOutcome::dropped(DeliverStatus::DroppedDuplicate);
            outcome.resynced = resynced;
            return Ok(outcome);
        }
        self.slots[slot_id].count += 1;
        if self.slots[slot_id].count as usize > DATA_SIZE {
            let mut outcome = DeliverOutcome::dropped(DeliverStatus::DroppedAlreadyRecovered);
            outcome.resynced = resynced;
            return Ok(outcome);
        }

        let mut to_tun = vec![payload.to_vec()];

        if self.slots[slot_id].count == 1 {
            self.slots[slot_id].group = Some(GroupBuffer::new(now));
        }
        let slot = &mut self.slots[slot_id];
        let group = slot
            .group
            .as_mut()
            .expect("allocated on this arrival or a prior one");
        group.slots[hdr.idx as usize].fill(payload);
        if payload.len() > slot.max_size {
            slot.max_size = payload.len();
        }

        if slot.count as usize == DATA_SIZE {
            let missing = group.missing_indices();
            self.fec.decode(group, slot.max_size)?;
            for i in missing {
                if i < DATA_SIZE && !group.slots[i].is_empty() {
                    to_tun.push(group.slots[i].as_slice().to_vec());
                }
            }
        }

        Ok(DeliverOutcome {
            status: Some(DeliverStatus::Delivered),
            to_tun,
            resynced,
        })
    }

    /// Accounts for and releases one window slot, mirroring
    /// `tunnel_recycle_grp`. A slot with zero arrivals is a no-op beyond
    /// clearing its stale width. `seq_rcv`/`seq_first`'s own slots are
    /// excluded from failure accounting: they straddle a resync boundary
    /// and were never a complete, addressable group.
    fn recycle_slot(&mut self, slot_id: usize) {
        let count = self.slots[slot_id].count as usize;
        if count == 0 {
            self.slots[slot_id].max_size = 0;
            return;
        }
        if count == TOTAL_SIZE {
            self.rcv_total += DATA_SIZE as u64;
        }
        if count < TOTAL_SIZE && count >= DATA_SIZE {
            self.rcv_total += DATA_SIZE as u64;
            self.rcv_rec += 1;
        }
        if count < DATA_SIZE {
            let is_boundary = slot_id == self.seq_rcv.window_slot(HIST_SIZE) as usize
                || slot_id == self.seq_first.window_slot(HIST_SIZE) as usize;
            if !is_boundary {
                let dropped = DATA_SIZE - count;
                self.rcv_fail += dropped as u64;
                tracing::warn!(slot = slot_id, dropped, "insufficient data to repair group");
            }
            self.rcv_total += count as u64;
        }
        self.slots[slot_id].count = 0;
        self.slots[slot_id].group = None;
        self.slots[slot_id].max_size = 0;
    }

    fn log_extended_report(&self) {
        tracing::info!("extended report:");
        for (slot_id, slot) in self.slots.iter().enumerate() {
            let count = slot.count as usize;
            if count == 0 || count == TOTAL_SIZE {
                continue;
            }
            if let Some(group) = &slot.group {
                let missing = group.missing_indices();
                tracing::info!(slot = slot_id, received = count, ?missing, "partial group");
            }
        }
    }
}
