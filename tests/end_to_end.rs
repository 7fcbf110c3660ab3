//! End-to-end scenarios driving a real [`Sender`] into a real [`Receiver`]
//! through an in-memory transport, without a tun device or UDP socket.
//! Covers scenarios A, B and F from the specification's testable
//! properties; scenario C (unrepairable-group accounting) is covered as a
//! white-box unit test in `src/receiver.rs`, since the counters it exercises
//! are reset as part of the very same resync that would otherwise make them
//! observable here.

use eccvpn::constants::{CHECK_SIZE, DATA_SIZE, INTERLEAVE};
use eccvpn::fec::FecEngine;
use eccvpn::ip;
use eccvpn::receiver::{DeliverStatus, Receiver};
use eccvpn::sender::Sender;
use eccvpn::time::ManualTimeProvider;
use eccvpn::transport::mock::RecordingTransport;

const SECRET: &[u8] = b"integration-test-secret";

/// A payload that looks like a minimal, validly-checksummed IPv4 datagram,
/// so a recovered copy of it passes [`ip::validate_recovered_datagram`].
fn ip_like_payload(byte: u8) -> Vec<u8> {
    let mut hdr = vec![0u8; 32];
    hdr[0] = 0x45;
    hdr[2..4].copy_from_slice(&32u16.to_be_bytes());
    hdr[19] = byte;
    let csum = ip::checksum(&hdr[..20]);
    hdr[10..12].copy_from_slice(&csum.to_be_bytes());
    hdr
}

fn new_sender() -> Sender {
    Sender::new(FecEngine::new().unwrap(), SECRET.to_vec(), &ManualTimeProvider::new(0))
}

fn new_receiver() -> Receiver {
    Receiver::new(FecEngine::new().unwrap(), SECRET.to_vec())
}

#[test]
fn scenario_a_zero_loss_delivers_every_payload_in_order() {
    let mut sender = new_sender();
    let mut transport = RecordingTransport::default();
    let payloads: Vec<Vec<u8>> = (0..DATA_SIZE).map(|i| ip_like_payload(i as u8)).collect();
    for p in &payloads {
        sender.submit(p, &mut transport).unwrap();
    }

    let mut receiver = new_receiver();
    let time = ManualTimeProvider::new(1_000);
    let mut delivered = Vec::new();
    for frame in &transport.sent {
        let outcome = receiver.deliver(frame, false, &time).unwrap();
        assert_eq!(outcome.status, Some(DeliverStatus::Delivered));
        delivered.extend(outcome.to_tun);
    }

    assert_eq!(delivered, payloads);
}

#[test]
fn scenario_b_recovers_up_to_check_size_losses_in_one_group() {
    let mut sender = new_sender();
    let mut transport = RecordingTransport::default();
    // Fill a whole interleave matrix so the parity burst actually fires.
    let total_packets = DATA_SIZE * INTERLEAVE;
    let payloads: Vec<Vec<u8>> = (0..total_packets).map(|i| ip_like_payload(i as u8)).collect();
    for p in &payloads {
        sender.submit(p, &mut transport).unwrap();
    }

    // Submissions are interleaved column-first: frame i belongs to group
    // (i % INTERLEAVE), row (i / INTERLEAVE). Take group 0's frames.
    let group0_data: Vec<usize> = (0..DATA_SIZE).map(|row| row * INTERLEAVE).collect();
    let group0_parity: Vec<usize> = (0..CHECK_SIZE).map(|k| total_packets + k).collect();
    let dropped = &group0_data[..CHECK_SIZE];

    let mut receiver = new_receiver();
    let time = ManualTimeProvider::new(1_000);
    let mut delivered = Vec::new();
    let mut recovered_any = false;
    for &i in group0_data.iter().skip(CHECK_SIZE).chain(group0_parity.iter()) {
        let outcome = receiver.deliver(&transport.sent[i], false, &time).unwrap();
        if outcome.to_tun.len() > 1 {
            recovered_any = true;
        }
        delivered.extend(outcome.to_tun);
    }

    assert!(recovered_any, "the arrival completing the group should trigger FEC recovery");
    for &i in dropped {
        assert!(delivered.contains(&payloads[i]), "dropped payload {i} should have been recovered");
    }
    assert_eq!(receiver.rcv_recovered(), 1);
    assert_eq!(receiver.rcv_failed(), 0);
}

#[test]
fn scenario_f_forced_resync_resets_accounting_for_the_next_epoch() {
    let mut sender = new_sender();
    let mut transport = RecordingTransport::default();
    let payloads: Vec<Vec<u8>> = (0..DATA_SIZE).map(|i| ip_like_payload(i as u8)).collect();
    for p in &payloads {
        sender.submit(p, &mut transport).unwrap();
    }

    let mut receiver = new_receiver();
    let time = ManualTimeProvider::new(1_000);
    for frame in &transport.sent {
        receiver.deliver(frame, false, &time).unwrap();
    }

    // A second round of the same kind of traffic, but this time forcing a
    // resync on the first packet of the new epoch.
    let mut sender2 = new_sender();
    let mut transport2 = RecordingTransport::default();
    for p in &payloads {
        sender2.submit(p, &mut transport2).unwrap();
    }
    let outcome = receiver.deliver(&transport2.sent[0], true, &time).unwrap();

    assert!(outcome.resynced);
    assert_eq!(receiver.rcv_total(), 0);
    assert_eq!(receiver.rcv_recovered(), 0);
    assert_eq!(receiver.rcv_failed(), 0);
}
