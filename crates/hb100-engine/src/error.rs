//! Error types for the protocol engine.

use thiserror::Error;

use hb100_preset::PresetError;

/// Errors raised while scheduling tasks or driving the USB protocol.
#[derive(Debug, Error)]
pub enum EngineError {
    /// A USB command was attempted with no open device.
    #[error("device not connected")]
    Disconnected,

    /// A transfer reported a timeout. Expected while draining responses,
    /// where it terminates the read loop; an error anywhere else.
    #[error("transfer timed out")]
    TimedOut,

    /// Any other USB-level failure.
    #[error("USB error: {0}")]
    Usb(rusb::Error),

    /// Task kind recognised but not implemented.
    #[error("unsupported command: {0}")]
    Unsupported(&'static str),

    /// Preset parsing, encoding or store failure.
    #[error(transparent)]
    Preset(#[from] PresetError),

    /// Filesystem failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<rusb::Error> for EngineError {
    fn from(e: rusb::Error) -> Self {
        match e {
            rusb::Error::Timeout => EngineError::TimedOut,
            rusb::Error::NoDevice | rusb::Error::NotFound => EngineError::Disconnected,
            other => EngineError::Usb(other),
        }
    }
}

impl EngineError {
    /// Completion code reported to the task originator.
    pub fn completion_code(&self) -> u16 {
        match self {
            EngineError::Disconnected => 503,
            EngineError::TimedOut => 504,
            EngineError::Unsupported(_) => 501,
            EngineError::Preset(e) => e.completion_code(),
            EngineError::Usb(_) | EngineError::Io(_) => 500,
        }
    }
}
