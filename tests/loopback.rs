//! Integration test: full send → network → receive loop over real
//! localhost UDP sockets.
//!
//! Opens both pipeline directions, pushes media units through the
//! output stream, and verifies the input stream reproduces them —
//! including a unit large enough to fragment — with matching counters.

use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::{Duration, Instant};

use bytes::Bytes;

use rtpstream::jitter::JitterConfig;
use rtpstream::stream::{ProcessorInputStream, ProcessorOutputStream};
use rtpstream::{
    MediaBuffer, ReceiverEvent, RtpInputStream, RtpOutputStream, RtpSession, SessionConfig,
    StreamStats, WriteOutcome,
};

/// Fixed port for the receive side; the sender binds ephemerally.
const RECEIVE_PORT: u16 = 15004;

fn collect_events(input: &mut RtpInputStream, want: usize, timeout: Duration) -> Vec<ReceiverEvent> {
    let deadline = Instant::now() + timeout;
    let mut events = Vec::new();
    while events.len() < want && Instant::now() < deadline {
        match input.read().expect("read") {
            Some(event) => events.push(event),
            None => std::thread::sleep(Duration::from_millis(2)),
        }
    }
    events
}

#[test]
fn units_round_trip_over_udp() {
    let receive_addr = SocketAddr::from((Ipv4Addr::LOCALHOST, RECEIVE_PORT));

    let send_config = SessionConfig {
        remote_addr: receive_addr,
        local_addr: SocketAddr::from((Ipv4Addr::LOCALHOST, 0)),
        max_payload: 64,
        ..Default::default()
    };
    let recv_config = SessionConfig {
        local_addr: receive_addr,
        ..send_config.clone()
    };

    let send_stats = Arc::new(StreamStats::new());
    let recv_stats = Arc::new(StreamStats::new());

    let send_session = Arc::new(RtpSession::new(&send_config));
    let frame_ticks = send_session.clock_rate() / 30; // one frame at 30 fps

    let mut output = RtpOutputStream::new(send_config.clone(), send_session, send_stats.clone());
    let mut input = RtpInputStream::new(
        recv_config.clone(),
        Arc::new(RtpSession::new(&recv_config)),
        JitterConfig {
            target_latency: Duration::from_millis(30),
            max_entries: 64,
        },
        recv_stats.clone(),
    );

    input.open().expect("input open");
    output.open().expect("output open");

    // Three units: two small, one spanning three fragments.
    let units: Vec<&[u8]> = vec![b"alpha", &[0xAB; 150], b"omega"];
    for payload in &units {
        let unit = MediaBuffer::from_payload(Bytes::copy_from_slice(payload));
        match output.write(unit, frame_ticks).expect("write") {
            WriteOutcome::Sent => {}
            WriteOutcome::WouldBlock(_) => panic!("loopback socket should not backpressure"),
        }
    }

    let events = collect_events(&mut input, units.len(), Duration::from_secs(2));
    assert_eq!(events.len(), units.len(), "every unit must arrive");

    let mut last_ts = None;
    for (event, expected) in events.iter().zip(&units) {
        match event {
            ReceiverEvent::Unit(unit) => {
                assert_eq!(unit.payload().as_ref(), *expected, "payload round-trips");
                if let Some(last) = last_ts {
                    assert!(unit.timestamp() > last, "timestamps strictly increase");
                }
                last_ts = Some(unit.timestamp());
            }
            ReceiverEvent::Lost(loss) => panic!("unexpected loss on loopback: {loss:?}"),
        }
    }

    // 1 + 3 + 1 fragments left the sender and all arrived.
    let sent = send_stats.snapshot();
    let received = recv_stats.snapshot();
    assert_eq!(sent.packets_sent, 5);
    assert_eq!(received.packets_received, 5);
    assert_eq!(received.units_delivered, 3);
    assert_eq!(received.units_lost, 0);
    assert_eq!(received.duplicates_dropped, 0);

    output.close();
    input.close();
    assert_eq!(input.jitter_occupancy(), 0);
}
