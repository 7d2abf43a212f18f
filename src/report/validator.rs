//! Attach-time check that a device exposes the six-value status report.
//!
//! The controller's haptic state does not use the generic force-feedback
//! report shape. Any other layout means an incompatible firmware revision and
//! the device is rejected outright.

use tracing::{debug, error, warn};

use super::{FeatureReport, ReportDescriptor, STATUS_REPORT_LEN};
use crate::error::{Result, XiaomiFfError};

/// Validate the advertised feature reports and build the status report
///
/// Only the first feature report is considered, and only its first field.
/// Fields after the first are accepted but never transmitted: every write
/// carries the six bytes of field 0 alone.
///
/// # Errors
///
/// - `NoFeatureReport`: `reports` is empty
/// - `UnexpectedReportLayout`: the first report has no fields, or its first
///   field does not hold exactly six values
/// - `AllocationFailure`: the buffer could not be reserved
pub fn validate(reports: &[FeatureReport]) -> Result<ReportDescriptor> {
    let report = reports.first().ok_or_else(|| {
        error!("no feature reports found");
        XiaomiFfError::NoFeatureReport
    })?;

    let found = report.fields.first().map_or(0, |f| f.report_count);
    if found != STATUS_REPORT_LEN {
        error!("unexpected output report layout (first field has {} values)", found);
        return Err(XiaomiFfError::UnexpectedReportLayout { found });
    }

    if report.fields.len() > 1 {
        warn!(
            "Status report 0x{:02x} declares {} fields, only the first is sent",
            report.id,
            report.fields.len()
        );
    }

    debug!(
        "Status report 0x{:02x} accepted ({} fields)",
        report.id,
        report.fields.len()
    );
    ReportDescriptor::allocate(report.id, report.fields.len())
}
