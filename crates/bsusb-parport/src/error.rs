//! Error types for parallel port operations

use thiserror::Error;

/// Parallel port errors
#[derive(Debug, Error)]
pub enum ParportError {
    /// Failed to open the device file
    #[error("Failed to open {path}: {source}")]
    OpenFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// The kernel refused to grant the port
    #[error("Failed to claim {path}: {source}")]
    ClaimFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// A ppdev ioctl failed
    #[error("{request} failed: {source}")]
    Ioctl {
        request: &'static str,
        #[source]
        source: std::io::Error,
    },

    /// Raw port I/O failed
    #[error("Port I/O at 0x{address:03x} failed: {source}")]
    PortIo {
        address: u16,
        #[source]
        source: std::io::Error,
    },

    /// The port was released
    #[error("Parallel port not claimed")]
    NotClaimed,

    /// Auto-detection found nothing
    #[error("No parallel port detected (probed {probed})")]
    NotDetected { probed: String },

    /// Invalid parameter
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// Unknown back end name
    #[error("Unknown port back end '{0}'")]
    UnknownBackend(String),

    /// Back end not built for this platform
    #[error("Port back end '{0}' is not available on this platform")]
    Unsupported(&'static str),
}

/// Result type for parallel port operations
pub type Result<T> = std::result::Result<T, ParportError>;
