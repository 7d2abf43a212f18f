//! # Error Types
//!
//! Custom error types for xiaomi-ff using `thiserror`.
//!
//! Every attach-time failure maps onto one variant of [`XiaomiFfError`] and is
//! handed back to the host unchanged. Once a session is active, nothing in the
//! rumble path returns an error to a caller.

use thiserror::Error;

/// Main error type for xiaomi-ff
#[derive(Debug, Error)]
pub enum XiaomiFfError {
    /// The device advertises no feature reports at all
    #[error("no feature reports found")]
    NoFeatureReport,

    /// The first feature report does not carry a six-value field
    #[error("unexpected feature report layout: first field has {found} values, expected 6")]
    UnexpectedReportLayout { found: usize },

    /// The shared report buffer could not be reserved
    #[error("failed to allocate the rumble report buffer")]
    AllocationFailure,

    /// The input layer refused the rumble capability
    #[error("failed to register rumble capability: {0}")]
    CapabilityRegistrationFailure(String),

    /// The HID transport could not be started
    #[error("hw start failed: {0}")]
    TransportStartFailure(#[source] TransportError),

    /// Any other transport failure during attach
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// No matching controller was found on the system
    #[error("no matching controller found ({0})")]
    DeviceNotFound(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors reported by a [`crate::device::HidTransport`]
#[derive(Debug, Error)]
pub enum TransportError {
    /// Failure inside the HID library
    #[error("HID error: {0}")]
    Hid(String),

    /// The transport has already been stopped
    #[error("transport is closed")]
    Closed,

    /// The device returned a report descriptor that cannot be parsed
    #[error("report descriptor error: {0}")]
    Descriptor(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<hidapi::HidError> for TransportError {
    fn from(err: hidapi::HidError) -> Self {
        TransportError::Hid(err.to_string())
    }
}

/// Result type alias for xiaomi-ff
pub type Result<T> = std::result::Result<T, XiaomiFfError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout_error_reports_found_count() {
        let err = XiaomiFfError::UnexpectedReportLayout { found: 5 };
        assert!(err.to_string().contains("5 values"));
    }

    #[test]
    fn test_transport_start_failure_keeps_source() {
        use std::error::Error as _;

        let err = XiaomiFfError::TransportStartFailure(TransportError::Closed);
        assert!(err.source().is_some());
        assert!(err.to_string().starts_with("hw start failed"));
    }

    #[test]
    fn test_io_error_converts_into_transport_error() {
        let io = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "gone");
        let err: TransportError = io.into();
        assert!(matches!(err, TransportError::Io(_)));
    }
}
