//! # Device Module
//!
//! Host-facing side of the driver: the traits the core consumes, the device
//! match table, and the per-device session.
//!
//! This module handles:
//! - Abstracting the HID transport (report introspection, blocking SET_REPORT)
//! - Abstracting the generic input layer that delivers rumble effects
//! - Attaching to and detaching from a controller

use std::sync::Arc;

use bitflags::bitflags;

use crate::error::TransportError;
use crate::ff::RumbleHandler;
use crate::report::FeatureReport;

pub mod hidraw;
pub mod session;

#[cfg(test)]
pub mod mocks;

pub use hidraw::HidapiTransport;
pub use session::{DeviceSession, SessionOptions, SessionState};

/// Xiaomi vendor ID
pub const XIAOMI_VENDOR_ID: u16 = 0x2717;

/// Xiaomi Bluetooth game controller product ID
pub const XIAOMI_GAMEPAD_PRODUCT_ID: u16 = 0x3144;

/// Name the driver registers under
pub const DRIVER_NAME: &str = "hid-xiaomiff";

/// Bus a supported device is attached through
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bus {
    Usb,
    Bluetooth,
}

/// Entry of the device match table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceId {
    pub bus: Bus,
    pub vendor: u16,
    pub product: u16,
}

/// Devices this driver binds to
pub const SUPPORTED_DEVICES: &[DeviceId] = &[DeviceId {
    bus: Bus::Bluetooth,
    vendor: XIAOMI_VENDOR_ID,
    product: XIAOMI_GAMEPAD_PRODUCT_ID,
}];

/// Check a device against the match table
pub fn is_supported(bus: Bus, vendor: u16, product: u16) -> bool {
    SUPPORTED_DEVICES
        .iter()
        .any(|id| id.bus == bus && id.vendor == vendor && id.product == product)
}

bitflags! {
    /// Which host subsystems get connected when the transport starts
    #[repr(transparent)]
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ConnectMask: u32 {
        /// Generic input device
        const INPUT  = 0b0000_0001;
        /// Raw HID node
        const HIDRAW = 0b0000_0100;
        /// Legacy hiddev node
        const HIDDEV = 0b0000_1000;
        /// Generic force-feedback wiring
        const FF     = 0b0010_0000;

        /// Everything, including the generic force-feedback wiring
        const DEFAULT = Self::INPUT.bits() | Self::HIDRAW.bits() | Self::HIDDEV.bits() | Self::FF.bits();
    }
}

/// Hardware access to one HID device
///
/// All methods may block; the core only calls them from attach, detach and
/// the dispatch worker, never from the effect-update path.
pub trait HidTransport: Send + Sync + 'static {
    /// Bring the device up with the given subsystems connected
    fn start(&self, mask: ConnectMask) -> Result<(), TransportError>;

    /// Feature reports the device advertises, in declaration order
    fn feature_reports(&self) -> Result<Vec<FeatureReport>, TransportError>;

    /// Blocking SET_REPORT of a feature report
    fn set_report(&self, report_id: u8, payload: &[u8]) -> Result<(), TransportError>;

    /// Wait for in-flight requests to complete
    fn wait(&self);

    /// Close the device handle
    fn close(&self);

    /// Stop the device
    fn stop(&self);
}

/// Generic input layer that delivers force-feedback effects
#[cfg_attr(test, mockall::automock)]
pub trait InputLayer: Send {
    /// Advertise the rumble capability and install `handler` as the
    /// effect-update callback
    fn register_rumble(&mut self, handler: Arc<dyn RumbleHandler>) -> Result<(), String>;

    /// Remove the callback; no `play` may arrive after this returns
    fn unregister(&mut self);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_device_ids() {
        assert_eq!(XIAOMI_VENDOR_ID, 0x2717);
        assert_eq!(XIAOMI_GAMEPAD_PRODUCT_ID, 0x3144);
    }

    #[test]
    fn test_only_bluetooth_controller_is_supported() {
        assert!(is_supported(Bus::Bluetooth, 0x2717, 0x3144));
        assert!(!is_supported(Bus::Usb, 0x2717, 0x3144));
        assert!(!is_supported(Bus::Bluetooth, 0x2717, 0x3145));
    }

    #[test]
    fn test_connect_mask_without_ff() {
        let mask = ConnectMask::DEFAULT.difference(ConnectMask::FF);
        assert!(!mask.contains(ConnectMask::FF));
        assert!(mask.contains(ConnectMask::INPUT));
        assert!(mask.contains(ConnectMask::HIDRAW));
        assert!(mask.contains(ConnectMask::HIDDEV));
        assert_eq!(mask.bits(), 0x0d);
        assert_eq!(mask, ConnectMask::DEFAULT & !ConnectMask::FF);
    }

    #[test]
    fn test_connect_mask_default_bits() {
        assert_eq!(ConnectMask::DEFAULT.bits(), 0x2d);
        assert!(ConnectMask::DEFAULT.contains(ConnectMask::FF));
        assert_eq!(ConnectMask::from_bits(0x0d), Some(ConnectMask::DEFAULT - ConnectMask::FF));
        assert_eq!(ConnectMask::from_bits(0x02), None);
    }
}
