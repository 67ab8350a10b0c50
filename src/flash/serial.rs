//! Serial reset pulse.
//!
//! Opening the board's USB serial port at 1200 baud and closing it again
//! makes the SAM3X erase itself and jump into its bootloader.

use std::time::Duration;

use crate::core::errors::PipelineError;

/// Something that can deliver the open/close reset pulse.
pub trait SerialReset {
    /// Open `device` at `baud`, then close it immediately. No data is sent.
    fn pulse(&self, device: &str, baud: u32) -> Result<(), PipelineError>;
}

/// Reset through a real serial port.
#[derive(Debug, Clone, Copy, Default)]
pub struct SerialPortReset;

impl SerialReset for SerialPortReset {
    fn pulse(&self, device: &str, baud: u32) -> Result<(), PipelineError> {
        tracing::debug!("opening {} at {} baud", device, baud);
        let port = serialport::new(device, baud)
            .timeout(Duration::from_millis(100))
            .open()
            .map_err(|e| PipelineError::DeviceUnavailable {
                port: device.to_string(),
                reason: describe(&e),
            })?;
        drop(port);
        Ok(())
    }
}

fn describe(err: &serialport::Error) -> String {
    match err.kind() {
        serialport::ErrorKind::NoDevice => "no such device".to_string(),
        serialport::ErrorKind::Io(std::io::ErrorKind::NotFound) => "device not found".to_string(),
        serialport::ErrorKind::Io(std::io::ErrorKind::PermissionDenied) => "permission denied".to_string(),
        _ => err.to_string(),
    }
}

/// Whether `device` looks present, for health checks.
pub fn device_exists(device: &str) -> bool {
    if cfg!(windows) {
        serialport::available_ports()
            .map(|ports| ports.iter().any(|p| p.port_name.eq_ignore_ascii_case(device)))
            .unwrap_or(false)
    } else {
        std::path::Path::new(device).exists()
    }
}
