//! # hidraw Transport
//!
//! [`HidTransport`] backed by `hidapi`.
//!
//! The controller is located either by an explicit `/dev/hidrawN` path or by
//! scanning for the configured vendor/product IDs, preferring the Bluetooth
//! interface listed in the match table.

use std::ffi::CString;
use std::sync::Mutex;

use hidapi::{BusType, DeviceInfo, HidApi, HidDevice};
use tracing::{debug, info, trace, warn};

use super::{is_supported, Bus, ConnectMask, HidTransport};
use crate::config::DeviceConfig;
use crate::error::{Result, TransportError, XiaomiFfError};
use crate::report::descriptor::parse_feature_reports;
use crate::report::FeatureReport;

/// Largest report descriptor the HID specification allows
const MAX_REPORT_DESCRIPTOR_SIZE: usize = 4096;

/// Controller opened through hidraw
pub struct HidapiTransport {
    device: Mutex<Option<HidDevice>>,
    path: String,
}

impl std::fmt::Debug for HidapiTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HidapiTransport")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

impl HidapiTransport {
    /// Open the controller described by `config`
    ///
    /// # Errors
    ///
    /// - `DeviceNotFound`: no hidraw device matches the configured IDs
    /// - `Transport`: hidapi could not be initialised or the device not opened
    pub fn open(config: &DeviceConfig) -> Result<Self> {
        let api = HidApi::new().map_err(TransportError::from)?;

        let path = match &config.hidraw_path {
            Some(path) => path.clone(),
            None => find_controller(&api, config.vendor_id, config.product_id)?,
        };

        let c_path = CString::new(path.clone())
            .map_err(|e| TransportError::Hid(format!("invalid device path {}: {}", path, e)))?;
        let device = api.open_path(&c_path).map_err(TransportError::from)?;

        if let Ok(info) = device.get_device_info() {
            if info.vendor_id() != config.vendor_id || info.product_id() != config.product_id {
                warn!(
                    "{} is {:04x}:{:04x}, expected {:04x}:{:04x}",
                    path,
                    info.vendor_id(),
                    info.product_id(),
                    config.vendor_id,
                    config.product_id
                );
            }
        }

        info!("Opened controller at {}", path);
        Ok(Self {
            device: Mutex::new(Some(device)),
            path,
        })
    }

    /// hidraw path of the opened device
    pub fn device_path(&self) -> &str {
        &self.path
    }

    fn with_device<R>(
        &self,
        f: impl FnOnce(&HidDevice) -> std::result::Result<R, TransportError>,
    ) -> std::result::Result<R, TransportError> {
        let guard = self
            .device
            .lock()
            .map_err(|_| TransportError::Hid("device lock poisoned".to_string()))?;
        match guard.as_ref() {
            Some(device) => f(device),
            None => Err(TransportError::Closed),
        }
    }

    fn release(&self) -> bool {
        match self.device.lock() {
            Ok(mut guard) => guard.take().is_some(),
            Err(_) => false,
        }
    }
}

impl HidTransport for HidapiTransport {
    fn start(&self, mask: ConnectMask) -> std::result::Result<(), TransportError> {
        self.with_device(|_| {
            debug!("Starting {} (connect mask {:#x})", self.path, mask.bits());
            Ok(())
        })
    }

    fn feature_reports(&self) -> std::result::Result<Vec<FeatureReport>, TransportError> {
        let descriptor = self.with_device(|device| {
            read_descriptor(|buf| Ok(device.get_report_descriptor(buf)?))
        })?;
        debug!("Report descriptor of {} is {} bytes", self.path, descriptor.len());
        parse_feature_reports(&descriptor)
    }

    fn set_report(&self, report_id: u8, payload: &[u8]) -> std::result::Result<(), TransportError> {
        let mut buf = Vec::with_capacity(payload.len() + 1);
        buf.push(report_id);
        buf.extend_from_slice(payload);

        self.with_device(|device| {
            device.send_feature_report(&buf)?;
            Ok(())
        })?;
        trace!("SET_REPORT 0x{:02x} ({} bytes)", report_id, payload.len());
        Ok(())
    }

    fn wait(&self) {
        // hidapi feature reports complete before send_feature_report returns
    }

    fn close(&self) {
        if self.release() {
            debug!("Closed {}", self.path);
        }
    }

    fn stop(&self) {
        self.release();
        info!("Stopped {}", self.path);
    }
}

/// Fill a maximum-size buffer through `read` and keep the bytes it reported
fn read_descriptor(
    read: impl FnOnce(&mut [u8]) -> std::result::Result<usize, TransportError>,
) -> std::result::Result<Vec<u8>, TransportError> {
    let mut buf = vec![0u8; MAX_REPORT_DESCRIPTOR_SIZE];
    let len = read(&mut buf)?;
    if len > buf.len() {
        return Err(TransportError::Descriptor(format!(
            "descriptor length {} exceeds {} bytes",
            len,
            buf.len()
        )));
    }
    buf.truncate(len);
    Ok(buf)
}

fn bus_of(info: &DeviceInfo) -> Option<Bus> {
    match info.bus_type() {
        BusType::Bluetooth => Some(Bus::Bluetooth),
        BusType::Usb => Some(Bus::Usb),
        _ => None,
    }
}

fn find_controller(api: &HidApi, vendor_id: u16, product_id: u16) -> Result<String> {
    let candidates: Vec<&DeviceInfo> = api
        .device_list()
        .filter(|info| info.vendor_id() == vendor_id && info.product_id() == product_id)
        .collect();

    for info in &candidates {
        debug!(
            "Found {:04x}:{:04x} at {} ({:?})",
            vendor_id,
            product_id,
            info.path().to_string_lossy(),
            info.bus_type()
        );
    }

    let preferred = candidates.iter().find(|info| {
        bus_of(info).is_some_and(|bus| is_supported(bus, info.vendor_id(), info.product_id()))
    });

    let chosen = match preferred {
        Some(info) => info,
        None => {
            let info = candidates.first().ok_or_else(|| {
                XiaomiFfError::DeviceNotFound(format!("{:04x}:{:04x}", vendor_id, product_id))
            })?;
            warn!(
                "Controller found on an unexpected bus ({:?}), using it anyway",
                info.bus_type()
            );
            info
        }
    };

    Ok(chosen.path().to_string_lossy().into_owned())
}
