//! # Effect Translator
//!
//! Converts rumble magnitudes into the two motor bytes of the status report.

use std::sync::Arc;

use tracing::trace;

use super::dispatch::DispatchHandle;
use super::{RumbleEffect, RumbleHandler};
use crate::report::ReportDescriptor;

/// Scale a 16-bit magnitude to a motor byte
///
/// `byte = magnitude * 255 / 65535`, truncating.
///
/// # Examples
///
/// ```
/// use xiaomi_ff::ff::scale_magnitude;
///
/// assert_eq!(scale_magnitude(0), 0);
/// assert_eq!(scale_magnitude(32768), 127);
/// assert_eq!(scale_magnitude(u16::MAX), 255);
/// ```
pub fn scale_magnitude(magnitude: u16) -> u8 {
    (magnitude as u32 * 0xff / 0xffff) as u8
}

/// `play` callback for one device session
///
/// Writes both motor bytes into the session's live report, then asks the
/// dispatch worker to transmit it. No I/O happens here.
#[derive(Debug)]
pub struct EffectTranslator {
    report: Arc<ReportDescriptor>,
    dispatch: DispatchHandle,
}

impl EffectTranslator {
    pub fn new(report: Arc<ReportDescriptor>, dispatch: DispatchHandle) -> Self {
        Self { report, dispatch }
    }
}

impl RumbleHandler for EffectTranslator {
    fn play(&self, effect: RumbleEffect) {
        let weak = scale_magnitude(effect.weak_magnitude);
        let strong = scale_magnitude(effect.strong_magnitude);

        trace!("ff running with 0x{:02x} 0x{:02x}", strong, weak);

        self.report.set_motors(weak, strong);
        self.dispatch.schedule();
    }
}
