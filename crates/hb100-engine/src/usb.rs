//! USB transport: the bulk endpoint pair of the device.
//!
//! The engine drives everything through the [`Transport`] trait so the
//! protocol logic can be exercised against a scripted transport in tests;
//! [`UsbTransport`] is the real implementation on top of `rusb`.

use std::time::Duration;

use rusb::{Context, DeviceHandle, UsbContext};
use tracing::{debug, info, trace};

use crate::error::EngineError;
use crate::wire::{ENDPOINT_IN, ENDPOINT_OUT, PRODUCT_ID, TRANSFER_TIMEOUT_MS, VENDOR_ID};

/// Bulk I/O with the device, bounded by the protocol timeout.
pub trait Transport {
    /// Write one outbound payload to the bulk OUT endpoint.
    fn send(&mut self, payload: &[u8]) -> Result<usize, EngineError>;

    /// Read one inbound fragment from the bulk IN endpoint into `buf`,
    /// returning the number of bytes received. A quiet device surfaces as
    /// [`EngineError::TimedOut`].
    fn recv(&mut self, buf: &mut [u8]) -> Result<usize, EngineError>;
}

/// Format a byte buffer as a contiguous hex string for trace logging.
pub(crate) fn hex(bytes: &[u8]) -> String {
    use std::fmt::Write as _;
    bytes.iter().fold(String::new(), |mut out, b| {
        let _ = write!(out, "{b:02x}");
        out
    })
}

fn usb_log_level(level: u8) -> rusb::LogLevel {
    match level {
        0 => rusb::LogLevel::None,
        1 => rusb::LogLevel::Error,
        2 => rusb::LogLevel::Warning,
        3 => rusb::LogLevel::Info,
        _ => rusb::LogLevel::Debug,
    }
}

/// The device's bulk endpoint pair, opened and claimed.
pub struct UsbTransport {
    handle: DeviceHandle<Context>,
    timeout: Duration,
}

impl UsbTransport {
    /// Open the device by vendor/product id, detach any kernel driver and
    /// claim interface 0.
    ///
    /// `debug_level` (0..=4) is handed to libusb's own logging.
    pub fn open(debug_level: u8) -> Result<Self, EngineError> {
        let mut context = Context::new().map_err(EngineError::from)?;
        context.set_log_level(usb_log_level(debug_level));

        let handle = context
            .open_device_with_vid_pid(VENDOR_ID, PRODUCT_ID)
            .ok_or(EngineError::Disconnected)?;
        let descriptor = handle.device().device_descriptor().map_err(EngineError::from)?;

        info!("connected to the device");
        if let Ok(manufacturer) = handle.read_manufacturer_string_ascii(&descriptor) {
            info!("  -- Manufacturer:  {manufacturer}");
        }
        if let Ok(product) = handle.read_product_string_ascii(&descriptor) {
            info!("  -- Product:       {product}");
        }
        if let Ok(serial) = handle.read_serial_number_string_ascii(&descriptor) {
            info!("  -- Serial Number: {serial}");
        }

        if handle.kernel_driver_active(0).unwrap_or(false) {
            info!("kernel driver active, detaching");
            if handle.detach_kernel_driver(0).is_ok() {
                debug!("kernel driver detached");
            }
        }
        handle.claim_interface(0).map_err(EngineError::from)?;

        Ok(Self {
            handle,
            timeout: Duration::from_millis(TRANSFER_TIMEOUT_MS),
        })
    }
}

impl Drop for UsbTransport {
    fn drop(&mut self) {
        let _ = self.handle.release_interface(0);
    }
}

impl Transport for UsbTransport {
    fn send(&mut self, payload: &[u8]) -> Result<usize, EngineError> {
        trace!(len = payload.len(), data = %hex(payload), "bulk out");
        let sent = self.handle.write_bulk(ENDPOINT_OUT, payload, self.timeout)?;
        debug!("sent {sent}/{} bytes", payload.len());
        Ok(sent)
    }

    fn recv(&mut self, buf: &mut [u8]) -> Result<usize, EngineError> {
        let received = self.handle.read_bulk(ENDPOINT_IN, buf, self.timeout)?;
        trace!(len = received, data = %hex(&buf[..received]), "bulk in");
        Ok(received)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_formats_bytes() {
        assert_eq!(hex(&[0x08, 0xaa, 0x55]), "08aa55");
        assert_eq!(hex(&[]), "");
    }

    #[test]
    fn debug_levels_clamp_to_libusb_range() {
        assert!(matches!(usb_log_level(0), rusb::LogLevel::None));
        assert!(matches!(usb_log_level(4), rusb::LogLevel::Debug));
        assert!(matches!(usb_log_level(9), rusb::LogLevel::Debug));
    }
}
