//! # Report Module
//!
//! The controller keeps its motor state in a six-byte feature report.
//!
//! This module handles:
//! - The host-side view of advertised feature reports ([`FeatureReport`])
//! - Parsing raw HID report descriptors into that view
//! - Attach-time layout validation
//! - The shared, lock-free status buffer written by `play` and read by dispatch

use std::sync::atomic::{AtomicU8, Ordering};

use crate::error::{Result, XiaomiFfError};

pub mod descriptor;
pub mod validator;

/// Number of values in the status report field
pub const STATUS_REPORT_LEN: usize = 6;

/// Buffer index of the weak (high frequency) motor
pub const WEAK_MOTOR_INDEX: usize = 0;

/// Buffer index of the strong (low frequency) motor
pub const STRONG_MOTOR_INDEX: usize = 1;

/// One field of a feature report, as the device declares it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReportField {
    /// Size of one value in bits
    pub report_size: u32,
    /// Number of values in the field
    pub report_count: usize,
}

/// A feature report advertised by a device
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FeatureReport {
    /// Report ID (0 when the device does not use numbered reports)
    pub id: u8,
    /// Fields in declaration order
    pub fields: Vec<ReportField>,
}

impl FeatureReport {
    /// Create a report with the given fields
    pub fn new(id: u8, fields: Vec<ReportField>) -> Self {
        Self { id, fields }
    }
}

/// Validated status report and its live byte buffer
///
/// This is the only state shared between the effect-update path and the
/// dispatch worker. There is no lock: each byte is an atomic, `play` fully
/// writes both motor bytes before scheduling, and the worker reads the bytes
/// only when it builds the outgoing payload. A run racing a concurrent `play`
/// may therefore transmit a mix of old and new motor values.
///
/// Instances only come out of [`validator::validate`], so the buffer always
/// holds exactly [`STATUS_REPORT_LEN`] bytes. It mirrors the first field of
/// the report only; further fields (`field_count > 1`) are not sent.
#[derive(Debug)]
pub struct ReportDescriptor {
    report_id: u8,
    field_count: usize,
    bytes: Box<[AtomicU8]>,
}

impl ReportDescriptor {
    /// Reserve a zero-filled buffer for a validated layout
    ///
    /// # Errors
    ///
    /// Returns `AllocationFailure` if the buffer cannot be reserved.
    pub(crate) fn allocate(report_id: u8, field_count: usize) -> Result<Self> {
        let mut bytes: Vec<AtomicU8> = Vec::new();
        bytes
            .try_reserve_exact(STATUS_REPORT_LEN)
            .map_err(|_| XiaomiFfError::AllocationFailure)?;
        bytes.extend((0..STATUS_REPORT_LEN).map(|_| AtomicU8::new(0)));

        Ok(Self {
            report_id,
            field_count,
            bytes: bytes.into_boxed_slice(),
        })
    }

    /// Report ID used when addressing the device
    pub fn report_id(&self) -> u8 {
        self.report_id
    }

    /// Number of fields the device declared for this report
    pub fn field_count(&self) -> usize {
        self.field_count
    }

    /// Number of value bytes in the buffer (always [`STATUS_REPORT_LEN`])
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Always false; kept for symmetry with `len`
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Read a single byte of the live buffer
    pub fn get(&self, index: usize) -> Option<u8> {
        self.bytes.get(index).map(|b| b.load(Ordering::Relaxed))
    }

    /// Store both motor intensities
    pub fn set_motors(&self, weak: u8, strong: u8) {
        self.bytes[WEAK_MOTOR_INDEX].store(weak, Ordering::Relaxed);
        self.bytes[STRONG_MOTOR_INDEX].store(strong, Ordering::Relaxed);
    }

    /// Zero every byte of the report (motors off)
    pub fn clear(&self) {
        for byte in self.bytes.iter() {
            byte.store(0, Ordering::Relaxed);
        }
    }

    /// Current contents of the buffer, read at the moment of the call
    pub fn current_bytes(&self) -> [u8; STATUS_REPORT_LEN] {
        let mut out = [0u8; STATUS_REPORT_LEN];
        for (dst, src) in out.iter_mut().zip(self.bytes.iter()) {
            *dst = src.load(Ordering::Relaxed);
        }
        out
    }
}
