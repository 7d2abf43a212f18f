//! Recording transport for tests

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::time::Duration;

use super::{ConnectMask, HidTransport};
use crate::error::TransportError;
use crate::report::{FeatureReport, ReportField};

/// Mock HID transport
///
/// Records every call in order, can fail on demand, and can hold
/// `set_report` calls until released to simulate a slow device.
#[derive(Clone)]
pub struct RecordingTransport {
    pub reports: Arc<Mutex<Vec<FeatureReport>>>,
    pub events: Arc<Mutex<Vec<String>>>,
    pub written: Arc<Mutex<Vec<(u8, Vec<u8>)>>>,
    attempts: Arc<AtomicUsize>,
    fail_start: Arc<AtomicBool>,
    fail_writes: Arc<AtomicBool>,
    gate: Arc<(Mutex<bool>, Condvar)>,
}

impl RecordingTransport {
    /// Transport advertising one valid six-value status report (id 0x20)
    pub fn new() -> Self {
        Self::with_reports(vec![FeatureReport::new(
            0x20,
            vec![ReportField {
                report_size: 8,
                report_count: 6,
            }],
        )])
    }

    pub fn with_reports(reports: Vec<FeatureReport>) -> Self {
        Self {
            reports: Arc::new(Mutex::new(reports)),
            events: Arc::new(Mutex::new(Vec::new())),
            written: Arc::new(Mutex::new(Vec::new())),
            attempts: Arc::new(AtomicUsize::new(0)),
            fail_start: Arc::new(AtomicBool::new(false)),
            fail_writes: Arc::new(AtomicBool::new(false)),
            gate: Arc::new((Mutex::new(true), Condvar::new())),
        }
    }

    pub fn fail_start(&self, fail: bool) {
        self.fail_start.store(fail, Ordering::SeqCst);
    }

    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Block subsequent `set_report` calls until `release_writes`
    pub fn hold_writes(&self) {
        *self.gate.0.lock().unwrap() = false;
    }

    pub fn release_writes(&self) {
        let (open, cv) = &*self.gate;
        *open.lock().unwrap() = true;
        cv.notify_all();
    }

    pub fn writes(&self) -> Vec<(u8, Vec<u8>)> {
        self.written.lock().unwrap().clone()
    }

    pub fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }

    /// Number of `set_report` calls entered, including held and failed ones
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    pub fn record(&self, event: &str) {
        self.events.lock().unwrap().push(event.to_string());
    }

    pub async fn wait_for_writes(&self, count: usize) {
        self.wait_until(|t| t.writes().len() >= count).await;
    }

    pub async fn wait_for_attempts(&self, count: usize) {
        self.wait_until(|t| t.attempts() >= count).await;
    }

    async fn wait_until(&self, done: impl Fn(&Self) -> bool) {
        let result = tokio::time::timeout(Duration::from_secs(2), async {
            while !done(self) {
                tokio::time::sleep(Duration::from_millis(1)).await;
            }
        })
        .await;
        assert!(result.is_ok(), "timed out waiting for transport activity");
    }
}

impl HidTransport for RecordingTransport {
    fn start(&self, mask: ConnectMask) -> Result<(), TransportError> {
        self.record(&format!("start:{:#x}", mask.bits()));
        if self.fail_start.load(Ordering::SeqCst) {
            return Err(TransportError::Hid("mock start failure".to_string()));
        }
        Ok(())
    }

    fn feature_reports(&self) -> Result<Vec<FeatureReport>, TransportError> {
        Ok(self.reports.lock().unwrap().clone())
    }

    fn set_report(&self, report_id: u8, payload: &[u8]) -> Result<(), TransportError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);

        let (open, cv) = &*self.gate;
        let mut guard = open.lock().unwrap();
        while !*guard {
            guard = cv.wait(guard).unwrap();
        }
        drop(guard);

        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(TransportError::Hid("mock write failure".to_string()));
        }
        self.record("set_report");
        self.written
            .lock()
            .unwrap()
            .push((report_id, payload.to_vec()));
        Ok(())
    }

    fn wait(&self) {
        self.record("wait");
    }

    fn close(&self) {
        self.record("close");
    }

    fn stop(&self) {
        self.record("stop");
    }
}
