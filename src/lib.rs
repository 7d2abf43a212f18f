//! # xiaomi-ff Library
//!
//! Rumble support for the Xiaomi Bluetooth game controller.
//!
//! The controller drives its motors from a six-byte feature report instead of
//! a generic force-feedback report. This library validates that report at
//! attach time and bridges non-blocking rumble requests to the blocking
//! SET_REPORT that updates it.

pub mod config;
pub mod device;
pub mod error;
pub mod ff;
pub mod input;
pub mod report;
