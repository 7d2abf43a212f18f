//! # HID Report Descriptor Parser
//!
//! Extracts the feature reports a device declares in its raw report
//! descriptor. Only the pieces needed to locate the status report are
//! tracked: Report ID, Report Size and Report Count globals (with Push/Pop),
//! usage locals, and Feature main items.

use super::{FeatureReport, ReportField};
use crate::error::TransportError;

/// Prefix byte introducing a long item
const LONG_ITEM_PREFIX: u8 = 0xFE;

const ITEM_TYPE_MAIN: u8 = 0;
const ITEM_TYPE_GLOBAL: u8 = 1;
const ITEM_TYPE_LOCAL: u8 = 2;

const MAIN_FEATURE: u8 = 0xB;
const MAIN_INPUT: u8 = 0x8;
const MAIN_OUTPUT: u8 = 0x9;
const MAIN_COLLECTION: u8 = 0xA;
const MAIN_END_COLLECTION: u8 = 0xC;

const GLOBAL_REPORT_SIZE: u8 = 0x7;
const GLOBAL_REPORT_ID: u8 = 0x8;
const GLOBAL_REPORT_COUNT: u8 = 0x9;
const GLOBAL_PUSH: u8 = 0xA;
const GLOBAL_POP: u8 = 0xB;

const LOCAL_USAGE: u8 = 0x0;
const LOCAL_USAGE_MINIMUM: u8 = 0x1;
const LOCAL_USAGE_MAXIMUM: u8 = 0x2;

#[derive(Debug, Clone, Copy, Default)]
struct GlobalState {
    report_id: u8,
    report_size: u32,
    report_count: usize,
}

/// Parse a raw report descriptor into its feature reports
///
/// Reports are returned in the order their first Feature item appears.
/// Padding fields (Feature items without any usage) still register their
/// report but do not add a field to it.
///
/// # Errors
///
/// Returns `Descriptor` if an item is truncated, Report ID 0 is declared, or a
/// Pop has no matching Push.
pub fn parse_feature_reports(descriptor: &[u8]) -> Result<Vec<FeatureReport>, TransportError> {
    let mut reports: Vec<FeatureReport> = Vec::new();
    let mut global = GlobalState::default();
    let mut stack: Vec<GlobalState> = Vec::new();
    let mut has_usage = false;
    let mut pos = 0;

    while pos < descriptor.len() {
        let prefix = descriptor[pos];

        if prefix == LONG_ITEM_PREFIX {
            let size = *descriptor.get(pos + 1).ok_or_else(|| truncated(pos))? as usize;
            pos += 3 + size;
            if pos > descriptor.len() {
                return Err(truncated(pos));
            }
            continue;
        }

        let size = match prefix & 0x03 {
            3 => 4,
            n => n as usize,
        };
        let item_type = (prefix >> 2) & 0x03;
        let tag = prefix >> 4;

        let data = descriptor
            .get(pos + 1..pos + 1 + size)
            .ok_or_else(|| truncated(pos))?;
        let value = data
            .iter()
            .rev()
            .fold(0u32, |acc, &b| (acc << 8) | b as u32);
        pos += 1 + size;

        match item_type {
            ITEM_TYPE_MAIN => {
                if tag == MAIN_FEATURE {
                    let index = match reports.iter().position(|r| r.id == global.report_id) {
                        Some(index) => index,
                        None => {
                            reports.push(FeatureReport::new(global.report_id, Vec::new()));
                            reports.len() - 1
                        }
                    };
                    if has_usage {
                        reports[index].fields.push(ReportField {
                            report_size: global.report_size,
                            report_count: global.report_count,
                        });
                    }
                }
                if matches!(
                    tag,
                    MAIN_FEATURE | MAIN_INPUT | MAIN_OUTPUT | MAIN_COLLECTION | MAIN_END_COLLECTION
                ) {
                    has_usage = false;
                }
            }
            ITEM_TYPE_GLOBAL => match tag {
                GLOBAL_REPORT_SIZE => global.report_size = value,
                GLOBAL_REPORT_COUNT => global.report_count = value as usize,
                GLOBAL_REPORT_ID => {
                    if value == 0 || value > u8::MAX as u32 {
                        return Err(TransportError::Descriptor(format!(
                            "invalid report id {}",
                            value
                        )));
                    }
                    global.report_id = value as u8;
                }
                GLOBAL_PUSH => stack.push(global),
                GLOBAL_POP => {
                    global = stack.pop().ok_or_else(|| {
                        TransportError::Descriptor("global item stack underflow".to_string())
                    })?;
                }
                _ => {}
            },
            ITEM_TYPE_LOCAL => {
                if matches!(tag, LOCAL_USAGE | LOCAL_USAGE_MINIMUM | LOCAL_USAGE_MAXIMUM) {
                    has_usage = true;
                }
            }
            _ => {}
        }
    }

    Ok(reports)
}

fn truncated(pos: usize) -> TransportError {
    TransportError::Descriptor(format!("truncated item at offset {}", pos))
}
