//! # Dispatch Queue
//!
//! Single-flight worker that performs the blocking status report write.
//!
//! The effect-update path only flips an atomic flag and wakes the worker; the
//! worker, one tokio task per session, runs the SET_REPORT on the blocking
//! pool. At most one run is queued at a time and runs never overlap. A
//! `schedule` that arrives while a run is executing queues exactly one
//! follow-up run, so the last written motor values always reach the device.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};

use crate::device::HidTransport;
use crate::report::ReportDescriptor;

/// Counters describing dispatch activity for one session
///
/// Write failures are never returned to a caller; this is the only place they
/// show up besides the log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DispatchStats {
    /// Runs whose SET_REPORT succeeded
    pub completed: u64,
    /// Runs whose SET_REPORT failed
    pub failed: u64,
}

#[derive(Debug, Default)]
struct DispatchState {
    pending: AtomicBool,
    cancelled: AtomicBool,
    wake: Notify,
    completed: AtomicU64,
    failed: AtomicU64,
}

impl DispatchState {
    fn schedule(&self) -> bool {
        if self.cancelled.load(Ordering::Acquire) {
            return false;
        }
        if self.pending.swap(true, Ordering::AcqRel) {
            return false;
        }
        self.wake.notify_one();
        true
    }
}

/// Cheap, cloneable handle for requesting a dispatch run
///
/// Safe to use from contexts that must not block: `schedule` only touches
/// atomics and a [`Notify`] permit.
#[derive(Debug, Clone)]
pub struct DispatchHandle {
    state: Arc<DispatchState>,
}

impl DispatchHandle {
    /// Request a run
    ///
    /// Returns `true` if this call queued a new run, `false` if one was
    /// already pending or the queue has been cancelled. A run that is already
    /// executing does not count as pending: a request made during it queues
    /// one follow-up run, which starts after the current one finishes.
    pub fn schedule(&self) -> bool {
        self.state.schedule()
    }
}

/// Per-session deferred writer
#[derive(Debug, Default)]
pub struct DispatchQueue {
    state: Arc<DispatchState>,
    worker: Option<JoinHandle<()>>,
}

impl DispatchQueue {
    /// Create an unarmed queue
    ///
    /// Runs requested before [`arm`](Self::arm) are held and start as soon as
    /// the worker is spawned.
    pub fn new() -> Self {
        Self::default()
    }

    /// Handle for the effect-update path
    pub fn handle(&self) -> DispatchHandle {
        DispatchHandle {
            state: Arc::clone(&self.state),
        }
    }

    /// Spawn the worker bound to `transport` and `report`
    ///
    /// Must be called from within a tokio runtime. Arming twice, or arming a
    /// cancelled queue, does nothing.
    pub fn arm<T: HidTransport>(&mut self, transport: Arc<T>, report: Arc<ReportDescriptor>) {
        if self.worker.is_some() || self.state.cancelled.load(Ordering::Acquire) {
            return;
        }
        let state = Arc::clone(&self.state);
        self.worker = Some(tokio::spawn(run_worker(state, transport, report)));
        debug!("Dispatch worker armed");
    }

    /// Request a run (see [`DispatchHandle::schedule`])
    pub fn schedule(&self) -> bool {
        self.state.schedule()
    }

    /// Whether a run is queued but has not started yet
    pub fn is_pending(&self) -> bool {
        self.state.pending.load(Ordering::Acquire)
    }

    /// Whether the worker has been spawned and not yet joined
    pub fn is_armed(&self) -> bool {
        self.worker.is_some()
    }

    /// Whether [`cancel_and_join`](Self::cancel_and_join) has been called
    pub fn is_cancelled(&self) -> bool {
        self.state.cancelled.load(Ordering::Acquire)
    }

    /// Snapshot of the dispatch counters
    pub fn stats(&self) -> DispatchStats {
        DispatchStats {
            completed: self.state.completed.load(Ordering::Relaxed),
            failed: self.state.failed.load(Ordering::Relaxed),
        }
    }

    /// Stop all future runs and wait for an executing run to finish
    ///
    /// A run that is queued but not started is dropped. Calling this again
    /// returns immediately.
    pub async fn cancel_and_join(&mut self) {
        self.cancel();
        if let Some(worker) = self.worker.take() {
            if let Err(e) = worker.await {
                warn!("Dispatch worker ended abnormally: {}", e);
            }
        }
    }

    fn cancel(&self) {
        self.state.cancelled.store(true, Ordering::Release);
        self.state.pending.store(false, Ordering::Release);
        self.state.wake.notify_one();
    }
}

impl Drop for DispatchQueue {
    fn drop(&mut self) {
        // The worker holds its own references to the transport and report, so
        // an executing run finishes safely after this.
        if self.worker.is_some() {
            self.cancel();
        }
    }
}

async fn run_worker<T: HidTransport>(
    state: Arc<DispatchState>,
    transport: Arc<T>,
    report: Arc<ReportDescriptor>,
) {
    loop {
        state.wake.notified().await;

        if state.cancelled.load(Ordering::Acquire) {
            break;
        }
        if !state.pending.swap(false, Ordering::AcqRel) {
            continue;
        }

        let transport = Arc::clone(&transport);
        let report = Arc::clone(&report);
        let result = tokio::task::spawn_blocking(move || {
            // Read the live buffer now, not at schedule time
            let payload = report.current_bytes();
            trace!("Sending status report {:02x?}", payload);
            transport.set_report(report.report_id(), &payload)
        })
        .await;

        match result {
            Ok(Ok(())) => {
                state.completed.fetch_add(1, Ordering::Relaxed);
            }
            Ok(Err(e)) => {
                state.failed.fetch_add(1, Ordering::Relaxed);
                warn!("Failed to send status report: {}", e);
            }
            Err(e) => {
                state.failed.fetch_add(1, Ordering::Relaxed);
                warn!("Status report write did not complete: {}", e);
            }
        }
    }

    debug!("Dispatch worker stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::mocks::RecordingTransport;
    use crate::report::validator::validate;
    use crate::report::{FeatureReport, ReportField};
    use std::time::Duration;

    fn status_report() -> Arc<ReportDescriptor> {
        let reports = [FeatureReport::new(
            9,
            vec![ReportField {
                report_size: 8,
                report_count: 6,
            }],
        )];
        Arc::new(validate(&reports).unwrap())
    }

    #[test]
    fn test_schedule_without_worker_is_held() {
        let queue = DispatchQueue::new();
        assert!(queue.schedule());
        assert!(!queue.schedule(), "second request must coalesce");
        assert!(queue.is_pending());
        assert!(!queue.is_armed());
    }

    #[tokio::test]
    async fn test_burst_of_schedules_runs_once() {
        let transport = Arc::new(RecordingTransport::new());
        let report = status_report();
        let mut queue = DispatchQueue::new();
        queue.arm(Arc::clone(&transport), Arc::clone(&report));

        let queued: Vec<bool> = (0..10).map(|_| queue.schedule()).collect();
        assert_eq!(queued.iter().filter(|q| **q).count(), 1);

        transport.wait_for_writes(1).await;
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert_eq!(transport.writes().len(), 1);
        assert_eq!(queue.stats().completed, 1);
        queue.cancel_and_join().await;
    }

    #[tokio::test]
    async fn test_run_reads_live_buffer() {
        let transport = Arc::new(RecordingTransport::new());
        let report = status_report();
        let mut queue = DispatchQueue::new();

        // Values written after schedule but before the run are transmitted
        queue.schedule();
        report.set_motors(1, 2);
        queue.arm(Arc::clone(&transport), Arc::clone(&report));

        transport.wait_for_writes(1).await;
        assert_eq!(transport.writes(), vec![(9, vec![1, 2, 0, 0, 0, 0])]);
        queue.cancel_and_join().await;
    }

    #[tokio::test]
    async fn test_failed_write_is_counted_not_raised() {
        let transport = Arc::new(RecordingTransport::new());
        transport.fail_writes(true);
        let mut queue = DispatchQueue::new();
        queue.arm(Arc::clone(&transport), status_report());

        queue.schedule();
        transport.wait_for_attempts(1).await;
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(queue.stats(), DispatchStats { completed: 0, failed: 1 });

        // Later runs still happen
        transport.fail_writes(false);
        queue.schedule();
        transport.wait_for_writes(1).await;
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(queue.stats(), DispatchStats { completed: 1, failed: 1 });
        queue.cancel_and_join().await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_cancel_waits_for_executing_run() {
        let transport = Arc::new(RecordingTransport::new());
        transport.hold_writes();
        let mut queue = DispatchQueue::new();
        queue.arm(Arc::clone(&transport), status_report());

        queue.schedule();
        transport.wait_for_attempts(1).await;

        let handle = queue.handle();
        let join = tokio::spawn(async move {
            queue.cancel_and_join().await;
            queue
        });

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!join.is_finished(), "cancel must block while the write runs");

        transport.release_writes();
        let queue = join.await.unwrap();

        assert_eq!(transport.writes().len(), 1);
        assert!(queue.is_cancelled());
        assert!(!handle.schedule(), "no run may start after cancel");
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(transport.attempts(), 1);
    }

    #[tokio::test]
    async fn test_schedule_during_run_queues_one_follow_up() {
        let transport = Arc::new(RecordingTransport::new());
        transport.hold_writes();
        let report = status_report();
        let mut queue = DispatchQueue::new();
        queue.arm(Arc::clone(&transport), Arc::clone(&report));

        report.set_motors(10, 0);
        queue.schedule();
        transport.wait_for_attempts(1).await;

        report.set_motors(0, 20);
        assert!(queue.schedule());
        assert!(!queue.schedule());

        transport.release_writes();
        transport.wait_for_writes(2).await;
        tokio::time::sleep(Duration::from_millis(20)).await;

        let writes = transport.writes();
        assert_eq!(writes.len(), 2);
        assert_eq!(writes[1].1, vec![0, 20, 0, 0, 0, 0]);
        queue.cancel_and_join().await;
    }

    #[tokio::test]
    async fn test_cancel_drops_queued_run() {
        let transport = Arc::new(RecordingTransport::new());
        let mut queue = DispatchQueue::new();
        queue.schedule();
        queue.arm(Arc::clone(&transport), status_report());
        queue.cancel_and_join().await;

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(transport.attempts(), 0);
    }

    #[tokio::test]
    async fn test_cancel_is_idempotent() {
        let mut queue = DispatchQueue::new();
        queue.arm(Arc::new(RecordingTransport::new()), status_report());
        queue.cancel_and_join().await;
        queue.cancel_and_join().await;
        assert!(!queue.is_armed());

        // Arming after cancel stays disarmed
        queue.arm(Arc::new(RecordingTransport::new()), status_report());
        assert!(!queue.is_armed());
    }

    #[test]
    fn test_cancel_and_join_on_unarmed_queue() {
        let mut queue = DispatchQueue::new();
        tokio_test::block_on(queue.cancel_and_join());
        assert!(queue.is_cancelled());
        assert!(!queue.schedule());
    }
}
