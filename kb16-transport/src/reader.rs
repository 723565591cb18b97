//! Background report reader
//!
//! A dedicated thread reads input reports with a short timeout and pushes
//! them, in arrival order, into a bounded tokio channel. The shutdown flag is
//! checked after every read, so an idle device still stops within one read
//! timeout. Dropping the channel receiver also stops the thread.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use hidapi::HidDevice;
use kb16_matrix::{hex_string, Report, MAX_REPORT_LEN};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::error::TransportError;
use crate::types::TimestampedReport;

/// Anything that yields raw input reports with a read timeout
pub trait ReportSource: Send {
    /// Read one report into `buf`, returning its length (0 on timeout)
    fn read_report(&mut self, buf: &mut [u8], timeout_ms: i32) -> Result<usize, TransportError>;
}

impl ReportSource for HidDevice {
    fn read_report(&mut self, buf: &mut [u8], timeout_ms: i32) -> Result<usize, TransportError> {
        Ok(self.read_timeout(buf, timeout_ms)?)
    }
}

/// Configuration for the reader loop
#[derive(Debug, Clone)]
pub struct ReaderConfig {
    /// Read timeout in milliseconds (for checking shutdown flag when idle)
    pub read_timeout_ms: i32,
    /// Sleep duration on error before retrying
    pub error_sleep_ms: u64,
    /// Consecutive read errors before giving up
    pub max_consecutive_errors: u32,
    /// Channel capacity in reports
    pub queue_capacity: usize,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self {
            read_timeout_ms: 100,
            error_sleep_ms: 100,
            max_consecutive_errors: 10,
            queue_capacity: 256,
        }
    }
}

/// Why the reader loop returned
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReaderExit {
    /// Shutdown flag was set
    Shutdown,
    /// Nobody is listening any more
    ReceiverDropped,
    /// The device kept failing or went away
    DeviceError,
}

/// Reader loop body, run on the reader thread.
///
/// Returns when the shutdown flag is set, the receiver is dropped or the
/// source fails fatally / too often in a row.
pub fn run_report_reader_loop<S: ReportSource>(
    mut source: S,
    tx: mpsc::Sender<TimestampedReport>,
    shutdown: Arc<AtomicBool>,
    config: &ReaderConfig,
) -> ReaderExit {
    debug!("Report reader thread started");
    let mut buf = [0u8; MAX_REPORT_LEN];
    let start_time = Instant::now();
    let mut consecutive_errors = 0u32;

    let exit = loop {
        if shutdown.load(Ordering::Relaxed) {
            break ReaderExit::Shutdown;
        }

        match source.read_report(&mut buf, config.read_timeout_ms) {
            Ok(len) if len > 0 => {
                consecutive_errors = 0;
                let elapsed = start_time.elapsed().as_secs_f64();
                let data = &buf[..len.min(MAX_REPORT_LEN)];
                debug!("Report at {:.3}s: {}", elapsed, hex_string(data));

                let report = match Report::new(data) {
                    Ok(report) => report,
                    Err(e) => {
                        warn!("Dropping report: {}", e);
                        continue;
                    }
                };
                if tx
                    .blocking_send(TimestampedReport::new(elapsed, report))
                    .is_err()
                {
                    break ReaderExit::ReceiverDropped;
                }
            }
            Ok(_) => {
                // Timeout, no data
            }
            Err(e) if e.is_fatal() => {
                warn!("Report reader stopping: {}", e);
                break ReaderExit::DeviceError;
            }
            Err(e) => {
                consecutive_errors += 1;
                warn!(
                    "Report reader error ({}/{}): {}",
                    consecutive_errors, config.max_consecutive_errors, e
                );
                if consecutive_errors >= config.max_consecutive_errors {
                    break ReaderExit::DeviceError;
                }
                std::thread::sleep(Duration::from_millis(config.error_sleep_ms));
            }
        }
    };

    debug!(?exit, "Report reader thread exiting");
    exit
}

/// Handle to a running reader thread.
///
/// Dropping the handle signals shutdown without waiting; use
/// [`ReportReader::stop`] to wait for the thread to finish.
pub struct ReportReader {
    shutdown: Arc<AtomicBool>,
    handle: Option<JoinHandle<ReaderExit>>,
}

impl ReportReader {
    /// Start reading from `source` on a new thread
    pub fn spawn<S: ReportSource + 'static>(
        source: S,
        config: ReaderConfig,
    ) -> Result<(Self, mpsc::Receiver<TimestampedReport>), TransportError> {
        let (tx, rx) = mpsc::channel(config.queue_capacity.max(1));
        let shutdown = Arc::new(AtomicBool::new(false));
        let shutdown_clone = shutdown.clone();

        let handle = std::thread::Builder::new()
            .name("kb16-report-reader".into())
            .spawn(move || run_report_reader_loop(source, tx, shutdown_clone, &config))
            .map_err(|e| TransportError::Internal(format!("failed to spawn reader thread: {e}")))?;

        Ok((
            Self {
                shutdown,
                handle: Some(handle),
            },
            rx,
        ))
    }

    /// Whether the reader thread has exited
    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().map_or(true, |h| h.is_finished())
    }

    /// Signal shutdown and wait for the thread.
    ///
    /// The thread may be blocked on a full channel; drop or drain the
    /// receiver first.
    pub fn stop(mut self) -> Result<ReaderExit, TransportError> {
        self.shutdown.store(true, Ordering::SeqCst);
        match self.handle.take() {
            Some(handle) => handle
                .join()
                .map_err(|_| TransportError::Internal("reader thread panicked".into())),
            None => Ok(ReaderExit::Shutdown),
        }
    }
}

impl Drop for ReportReader {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::SeqCst);
        debug!("ReportReader dropped, signaling reader shutdown");
    }
}
