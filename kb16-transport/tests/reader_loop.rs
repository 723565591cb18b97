//! Integration tests for the report reader thread.
//!
//! A scripted `ReportSource` stands in for the HID device so ordering,
//! shutdown and error handling can be checked without hardware.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use kb16_transport::{
    run_report_reader_loop, ReaderConfig, ReaderExit, ReportReader, ReportSource, TransportError,
};
use tokio::sync::mpsc;

enum Step {
    Data(Vec<u8>),
    Timeout,
    Fail(TransportError),
}

/// Plays back a fixed script, then times out forever
struct ScriptedSource {
    steps: VecDeque<Step>,
}

impl ScriptedSource {
    fn new(steps: Vec<Step>) -> Self {
        Self {
            steps: steps.into(),
        }
    }
}

impl ReportSource for ScriptedSource {
    fn read_report(&mut self, buf: &mut [u8], timeout_ms: i32) -> Result<usize, TransportError> {
        match self.steps.pop_front() {
            Some(Step::Data(data)) => {
                buf[..data.len()].copy_from_slice(&data);
                Ok(data.len())
            }
            Some(Step::Fail(e)) => Err(e),
            Some(Step::Timeout) | None => {
                std::thread::sleep(Duration::from_millis(timeout_ms as u64));
                Ok(0)
            }
        }
    }
}

fn fast_config() -> ReaderConfig {
    ReaderConfig {
        read_timeout_ms: 1,
        error_sleep_ms: 1,
        max_consecutive_errors: 3,
        queue_capacity: 8,
    }
}

// ── Ordering and delivery ──

#[test]
fn reports_arrive_in_order() {
    let source = ScriptedSource::new(vec![
        Step::Data(vec![0x00]),
        Step::Timeout,
        Step::Data(vec![0x01, 0x02]),
        Step::Data(vec![0x03]),
    ]);
    let (reader, mut rx) = ReportReader::spawn(source, fast_config()).unwrap();

    let received: Vec<Vec<u8>> = (0..3)
        .map(|_| rx.blocking_recv().unwrap().report.to_vec())
        .collect();
    assert_eq!(received, vec![vec![0x00], vec![0x01, 0x02], vec![0x03]]);

    assert_eq!(reader.stop().unwrap(), ReaderExit::Shutdown);
}

#[test]
fn timestamps_never_go_backwards() {
    let steps = (0..5u8).map(|i| Step::Data(vec![i])).collect();
    let (reader, mut rx) = ReportReader::spawn(ScriptedSource::new(steps), fast_config()).unwrap();

    let mut last = 0.0;
    for _ in 0..5 {
        let report = rx.blocking_recv().unwrap();
        assert!(report.elapsed >= last);
        last = report.elapsed;
    }
    drop(rx);
    reader.stop().unwrap();
}

// ── Shutdown ──

#[test]
fn stop_flag_ends_idle_loop() {
    let (tx, _rx) = mpsc::channel(4);
    let shutdown = Arc::new(AtomicBool::new(true));
    let exit = run_report_reader_loop(ScriptedSource::new(vec![]), tx, shutdown, &fast_config());
    assert_eq!(exit, ReaderExit::Shutdown);
}

#[test]
fn dropped_receiver_ends_loop() {
    let (tx, rx) = mpsc::channel(4);
    drop(rx);
    let shutdown = Arc::new(AtomicBool::new(false));
    let source = ScriptedSource::new(vec![Step::Data(vec![0xAA])]);
    let exit = run_report_reader_loop(source, tx, shutdown.clone(), &fast_config());
    assert_eq!(exit, ReaderExit::ReceiverDropped);
    assert!(!shutdown.load(Ordering::SeqCst));
}

#[test]
fn channel_closes_after_stop() {
    let (reader, mut rx) =
        ReportReader::spawn(ScriptedSource::new(vec![Step::Data(vec![1])]), fast_config())
            .unwrap();
    assert!(rx.blocking_recv().is_some());
    reader.stop().unwrap();
    assert!(rx.blocking_recv().is_none());
}

// ── Errors ──

#[test]
fn transient_errors_are_retried() {
    let source = ScriptedSource::new(vec![
        Step::Fail(TransportError::HidError("glitch".into())),
        Step::Fail(TransportError::HidError("glitch".into())),
        Step::Data(vec![0x42]),
    ]);
    let (reader, mut rx) = ReportReader::spawn(source, fast_config()).unwrap();
    assert_eq!(rx.blocking_recv().unwrap().report.to_vec(), vec![0x42]);
    reader.stop().unwrap();
}

#[test]
fn repeated_errors_give_up() {
    let steps = (0..3)
        .map(|_| Step::Fail(TransportError::HidError("io".into())))
        .collect();
    let (reader, mut rx) = ReportReader::spawn(ScriptedSource::new(steps), fast_config()).unwrap();
    assert!(rx.blocking_recv().is_none());
    assert_eq!(reader.stop().unwrap(), ReaderExit::DeviceError);
}

#[test]
fn disconnect_stops_immediately() {
    let source = ScriptedSource::new(vec![
        Step::Data(vec![0x01]),
        Step::Fail(TransportError::Disconnected),
        Step::Data(vec![0x02]),
    ]);
    let (reader, mut rx) = ReportReader::spawn(source, fast_config()).unwrap();
    assert_eq!(rx.blocking_recv().unwrap().report.to_vec(), vec![0x01]);
    assert!(rx.blocking_recv().is_none());
    assert_eq!(reader.stop().unwrap(), ReaderExit::DeviceError);
}
