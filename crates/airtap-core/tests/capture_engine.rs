use std::cell::Cell;
use std::collections::VecDeque;
use std::rc::Rc;
use std::time::Duration;

use airtap_core::capture::{Capture, CaptureError, CaptureEvent, PullPolicy};
use airtap_core::source::{PacketBoundary, Reader, SourceError};
use airtap_core::Linktype;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// One scripted dispatch.
enum Step {
    Packets(Vec<Vec<u8>>),
    /// A packet reported with the snapshot overflow flag.
    Truncated(Vec<u8>),
    Fail,
}

struct ScriptedReader {
    steps: VecDeque<Step>,
    snaplen: usize,
    dispatches: Rc<Cell<usize>>,
    closes: Rc<Cell<usize>>,
}

#[derive(Clone, Default)]
struct Counters {
    dispatches: Rc<Cell<usize>>,
    closes: Rc<Cell<usize>>,
}

impl ScriptedReader {
    fn new(steps: Vec<Step>, snaplen: usize) -> (Self, Counters) {
        let counters = Counters::default();
        let reader = Self {
            steps: steps.into(),
            snaplen,
            dispatches: counters.dispatches.clone(),
            closes: counters.closes.clone(),
        };
        (reader, counters)
    }
}

fn boundary(offset: usize, len: usize, packet_overflow: bool) -> PacketBoundary {
    PacketBoundary {
        offset,
        timestamp: Duration::from_millis(offset as u64),
        orig_len: len as u32,
        buffer_overflow: false,
        packet_overflow,
    }
}

impl Reader for ScriptedReader {
    fn dispatch(
        &mut self,
        max_packets: usize,
        buffer: &mut [u8],
        on_packet: &mut dyn FnMut(PacketBoundary),
    ) -> Result<usize, SourceError> {
        self.dispatches.set(self.dispatches.get() + 1);
        match self.steps.pop_front() {
            None => Ok(0),
            Some(Step::Fail) => Err(SourceError::Pcap("scripted failure".to_string())),
            Some(Step::Truncated(data)) => {
                buffer[..data.len()].copy_from_slice(&data);
                on_packet(boundary(data.len(), data.len() + 100, true));
                Ok(1)
            }
            Some(Step::Packets(mut packets)) => {
                let rest = packets.split_off(max_packets.min(packets.len()));
                if !rest.is_empty() {
                    self.steps.push_front(Step::Packets(rest));
                }
                let mut written = 0;
                for packet in &packets {
                    let end = written + packet.len();
                    buffer[written..end].copy_from_slice(packet);
                    on_packet(boundary(end, packet.len(), false));
                    written = end;
                }
                Ok(packets.len())
            }
        }
    }

    fn datalink(&self) -> Linktype {
        Linktype::IEEE802_11
    }

    fn snapshot_length(&self) -> usize {
        self.snaplen
    }

    fn close(&mut self) {
        self.closes.set(self.closes.get() + 1);
    }
}

fn packets(count: usize) -> Vec<Vec<u8>> {
    (0..count).map(|i| vec![i as u8; i % 4 + 1]).collect()
}

fn scripted(steps: Vec<Step>, policy: PullPolicy) -> (Capture<ScriptedReader>, Counters) {
    let (reader, counters) = ScriptedReader::new(steps, 16);
    let capture = Capture::new(reader, 256, 8, policy).expect("valid capture");
    (capture, counters)
}

fn count_preemptive(events: &[CaptureEvent]) -> usize {
    events
        .iter()
        .filter(|e| matches!(e, CaptureEvent::Error(CaptureError::PreemptiveFetch { .. })))
        .count()
}

#[test]
fn buffer_smaller_than_snaplen_fails_construction() {
    let mut rng = StdRng::seed_from_u64(0x5eed);
    for _ in 0..200 {
        let snaplen = rng.gen_range(1..=70_000);
        let buffer = rng.gen_range(0..snaplen);
        let (reader, counters) = ScriptedReader::new(Vec::new(), snaplen);
        let err = Capture::new(reader, buffer, 1, PullPolicy::CloseOnEmpty).err();
        assert!(
            matches!(err, Some(CaptureError::BufferTooSmall { buffer_len, snaplen: s })
                if buffer_len == buffer && s == snaplen),
            "buffer {buffer} snaplen {snaplen}"
        );
        assert_eq!(counters.dispatches.get(), 0);
    }
}

#[test]
fn buffer_equal_to_snaplen_is_accepted() {
    let (reader, _) = ScriptedReader::new(Vec::new(), 64);
    let capture = Capture::new(reader, 64, 1, PullPolicy::CloseOnEmpty).expect("valid capture");
    assert_eq!(capture.buffer_len(), 64);
    assert_eq!(capture.snapshot_length(), 64);
    assert_eq!(capture.datalink(), Linktype::IEEE802_11);
}

#[tokio::test]
async fn has_packet_tracks_the_batch() {
    let (mut capture, _) = scripted(
        vec![Step::Packets(packets(3)), Step::Packets(Vec::new())],
        PullPolicy::CloseOnEmpty,
    );
    assert!(!capture.has_packet());

    assert_eq!(capture.fetch().await, 3);
    assert!(capture.has_packet());
    let mut seen = Vec::new();
    while let Some(view) = capture.get_packet() {
        seen.push(capture.packet_data(&view).unwrap().to_vec());
    }
    assert_eq!(seen, packets(3));
    assert!(!capture.has_packet());
    assert!(capture.get_packet().is_none());

    assert_eq!(capture.fetch().await, 0);
    assert!(!capture.has_packet());
}

#[tokio::test]
async fn batch_size_caps_each_fetch() {
    let (mut capture, _) = scripted(vec![Step::Packets(packets(11))], PullPolicy::CloseOnEmpty);
    assert_eq!(capture.fetch().await, 8);
    while capture.get_packet().is_some() {}
    assert_eq!(capture.fetch().await, 3);
}

#[tokio::test]
async fn fetch_with_pending_packets_reports_preemptive_fetch() {
    let (mut capture, _) = scripted(
        vec![Step::Packets(packets(3)), Step::Packets(packets(2))],
        PullPolicy::CloseOnEmpty,
    );
    capture.fetch().await;
    capture.get_packet();
    assert_eq!(capture.fetch().await, 2);

    let events = capture.drain_events();
    assert!(events.iter().any(|e| matches!(
        e,
        CaptureEvent::Error(CaptureError::PreemptiveFetch { pending: 2 })
    )));
    // The undrained packets were discarded by the reset.
    let view = capture.get_packet().unwrap();
    assert_eq!(capture.packet_data(&view).unwrap(), packets(2)[0].as_slice());
}

#[tokio::test]
async fn drained_interleavings_never_report_preemptive_fetch() {
    let mut rng = StdRng::seed_from_u64(42);
    for _ in 0..50 {
        let steps = (0..rng.gen_range(1..6))
            .map(|_| Step::Packets(packets(rng.gen_range(0..12))))
            .collect();
        let (mut capture, _) = scripted(steps, PullPolicy::CloseOnEmpty);
        for _ in 0..8 {
            capture.fetch().await;
            // Pull a random number of times, then drain whatever is left.
            for _ in 0..rng.gen_range(0..4) {
                capture.get_packet();
            }
            while capture.get_packet().is_some() {}
        }
        assert_eq!(count_preemptive(&capture.drain_events()), 0);
    }
}

#[tokio::test]
async fn undrained_interleavings_report_preemptive_fetch() {
    let mut rng = StdRng::seed_from_u64(7);
    for _ in 0..50 {
        let (mut capture, _) = scripted(
            vec![Step::Packets(packets(5)), Step::Packets(packets(1))],
            PullPolicy::CloseOnEmpty,
        );
        capture.fetch().await;
        for _ in 0..rng.gen_range(0..5) {
            capture.get_packet();
        }
        capture.fetch().await;
        assert_eq!(count_preemptive(&capture.drain_events()), 1);
    }
}

#[tokio::test]
async fn overflow_is_reported_and_packet_kept() {
    let (mut capture, _) = scripted(
        vec![Step::Truncated(vec![0xaa; 16])],
        PullPolicy::CloseOnEmpty,
    );
    assert_eq!(capture.fetch().await, 1);
    let view = capture.get_packet().unwrap();
    assert_eq!(view.len(), 16);
    assert_eq!(view.orig_len(), 116);

    let events = capture.drain_events();
    assert!(events.iter().any(|e| matches!(
        e,
        CaptureEvent::Error(CaptureError::Overflow {
            packet: 0,
            buffer_overflow: false,
            packet_overflow: true,
        })
    )));
}

#[tokio::test]
async fn source_failure_is_an_event() {
    let (mut capture, _) = scripted(
        vec![Step::Fail, Step::Packets(packets(1))],
        PullPolicy::CloseOnEmpty,
    );
    assert_eq!(capture.fetch().await, 0);
    let events = capture.drain_events();
    assert!(matches!(
        events.as_slice(),
        [
            CaptureEvent::Error(CaptureError::Source(SourceError::Pcap(_))),
            CaptureEvent::Fetch(Some(report)),
        ] if report.packets == 0
    ));
    assert!(!capture.is_closed());
    assert_eq!(capture.fetch().await, 1);
}

#[tokio::test]
async fn fetch_after_close_is_a_no_op() {
    let (mut capture, counters) = scripted(vec![Step::Packets(packets(2))], PullPolicy::CloseOnEmpty);
    capture.close();
    capture.drain_events();

    assert_eq!(capture.fetch().await, 0);
    assert_eq!(counters.dispatches.get(), 0);
    let events = capture.drain_events();
    assert!(matches!(events.as_slice(), [CaptureEvent::Fetch(None)]));
    assert!(capture.read().await.is_none());
}

#[test]
fn close_is_idempotent() {
    let (mut capture, counters) = scripted(Vec::new(), PullPolicy::CloseOnEmpty);
    assert!(!capture.is_closed());
    capture.close();
    capture.close();
    assert!(capture.is_closed());
    assert_eq!(counters.closes.get(), 1);

    let ends = capture
        .drain_events()
        .into_iter()
        .filter(|e| matches!(e, CaptureEvent::End))
        .count();
    assert_eq!(ends, 1);

    drop(capture);
    assert_eq!(counters.closes.get(), 1);
}

#[test]
fn dropping_open_capture_closes_reader() {
    let (capture, counters) = scripted(Vec::new(), PullPolicy::CloseOnEmpty);
    drop(capture);
    assert_eq!(counters.closes.get(), 1);
}

#[tokio::test]
async fn close_on_empty_ends_stream_once() {
    let (mut capture, counters) = scripted(
        vec![Step::Packets(packets(3)), Step::Packets(packets(2))],
        PullPolicy::CloseOnEmpty,
    );
    let mut seen = Vec::new();
    while let Some(view) = capture.read().await {
        seen.push(capture.packet_data(&view).unwrap().to_vec());
    }
    let mut expected = packets(3);
    expected.extend(packets(2));
    assert_eq!(seen, expected);
    assert!(capture.is_closed());
    assert!(capture.read().await.is_none());

    capture.close();
    assert_eq!(counters.closes.get(), 1);
    let ends = capture
        .drain_events()
        .into_iter()
        .filter(|e| matches!(e, CaptureEvent::End))
        .count();
    assert_eq!(ends, 1);
}

#[tokio::test]
async fn retry_policy_waits_through_empty_fetches() {
    let (mut capture, counters) = scripted(
        vec![
            Step::Packets(packets(1)),
            Step::Packets(Vec::new()),
            Step::Packets(Vec::new()),
            Step::Packets(packets(2)),
        ],
        PullPolicy::Retry {
            backoff: Duration::from_millis(1),
        },
    );
    for _ in 0..3 {
        assert!(capture.read().await.is_some());
    }
    assert!(!capture.is_closed());
    assert_eq!(counters.dispatches.get(), 4);
}

#[tokio::test]
async fn stale_view_is_rejected() {
    let (mut capture, _) = scripted(
        vec![Step::Packets(packets(1)), Step::Packets(packets(1))],
        PullPolicy::CloseOnEmpty,
    );
    capture.fetch().await;
    let old = capture.get_packet().unwrap();
    assert!(capture.packet_data(&old).is_ok());

    capture.fetch().await;
    let err = capture.packet_data(&old).unwrap_err();
    assert!(matches!(err, CaptureError::StaleView { view: 1, current: 2 }));

    let fresh = capture.get_packet().unwrap();
    assert_eq!(fresh.generation(), 2);
    assert!(capture.packet_data(&fresh).is_ok());
}

#[tokio::test]
async fn views_carry_metadata() {
    let (mut capture, _) = scripted(vec![Step::Packets(packets(2))], PullPolicy::CloseOnEmpty);
    let first = capture.read().await.unwrap();
    let second = capture.read().await.unwrap();
    assert_eq!(first.timestamp(), Duration::from_millis(1));
    assert_eq!(second.timestamp(), Duration::from_millis(3));
    assert_eq!(second.orig_len(), 2);
}

#[test]
fn stats_unsupported_by_default() {
    let (mut capture, _) = scripted(Vec::new(), PullPolicy::CloseOnEmpty);
    assert!(matches!(
        capture.stats(),
        Err(CaptureError::Source(SourceError::Unsupported(_)))
    ));
}

#[tokio::test]
async fn fetch_yields_before_dispatching() {
    let (mut capture, counters) = scripted(vec![Step::Packets(packets(2))], PullPolicy::CloseOnEmpty);
    let seen = Rc::new(Cell::new(None));

    let local = tokio::task::LocalSet::new();
    local
        .run_until(async {
            let dispatches = counters.dispatches.clone();
            let seen_by_task = seen.clone();
            tokio::task::spawn_local(async move {
                seen_by_task.set(Some(dispatches.get()));
            });
            assert_eq!(capture.fetch().await, 2);
        })
        .await;

    // The other task ran while fetch was suspended, before the dispatch.
    assert_eq!(seen.get(), Some(0));
    assert_eq!(counters.dispatches.get(), 1);
}
