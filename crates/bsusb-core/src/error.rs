//! Error types for trigger box operations
//!
//! Every failure returned by [`BoxManager`](crate::BoxManager) is a
//! [`BoxError`]. Each variant maps to a stable negative status code through
//! [`BoxError::status`], so callers that speak integer status codes can
//! keep doing so.

use std::fmt;

use thiserror::Error;

/// Advice shown when the USB stack refuses access to the device node
pub const PERMISSION_HINT: &str = "the USB device node is not accessible to this user; \
     install a udev rule granting access to 1305:1979, or change the ownership \
     of the device node under /dev/bus/usb";

/// Classification of a failure reported by a USB driver back end
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverErrorKind {
    /// The OS refused access to the device
    PermissionDenied,
    /// The device went away
    Disconnected,
    /// The device or interface is claimed by someone else
    Busy,
    /// The device or a resource on it does not exist
    NotFound,
    /// The transfer did not complete in time
    Timeout,
    /// The device stalled the request
    Stall,
    /// The context has no open device
    NotOpen,
    /// Anything else
    Other,
}

impl fmt::Display for DriverErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DriverErrorKind::PermissionDenied => "permission denied",
            DriverErrorKind::Disconnected => "disconnected",
            DriverErrorKind::Busy => "busy",
            DriverErrorKind::NotFound => "not found",
            DriverErrorKind::Timeout => "timeout",
            DriverErrorKind::Stall => "stall",
            DriverErrorKind::NotOpen => "not open",
            DriverErrorKind::Other => "error",
        };
        f.write_str(s)
    }
}

/// Failure reported by a USB driver back end
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message} ({kind})")]
pub struct DriverError {
    kind: DriverErrorKind,
    message: String,
}

impl DriverError {
    /// Create a driver error
    pub fn new(kind: DriverErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Shorthand for a [`DriverErrorKind::Other`] error
    pub fn other(message: impl Into<String>) -> Self {
        Self::new(DriverErrorKind::Other, message)
    }

    /// Shorthand for a [`DriverErrorKind::NotOpen`] error
    pub fn not_open() -> Self {
        Self::new(DriverErrorKind::NotOpen, "device not open")
    }

    /// The failure class
    pub fn kind(&self) -> DriverErrorKind {
        self.kind
    }

    /// The back end's description of the failure
    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Trigger box errors
#[derive(Debug, Error)]
pub enum BoxError {
    /// Slot index is not below the enumerated count or the slot limit
    #[error("Slot {slot} out of range ({count} device(s) enumerated, {max_slots} slots)")]
    SlotOutOfRange {
        slot: usize,
        count: usize,
        max_slots: usize,
    },

    /// Slot already holds an open device
    #[error("Slot {slot} is already open")]
    SlotBusy { slot: usize },

    /// Slot holds no open device
    #[error("Slot {slot} is not open")]
    SlotClosed { slot: usize },

    /// Open was attempted before any enumeration
    #[error("Devices have not been enumerated")]
    NotEnumerated,

    /// Scanning the bus failed
    #[error("Failed to enumerate devices: {source}")]
    Enumeration {
        #[source]
        source: DriverError,
    },

    /// Creating the driver context failed
    #[error("Failed to initialize driver for slot {slot}: {source}")]
    DriverInit {
        slot: usize,
        #[source]
        source: DriverError,
    },

    /// Opening the device failed
    #[error("Failed to open device in slot {slot}: {source}")]
    Open {
        slot: usize,
        #[source]
        source: DriverError,
    },

    /// Resetting the device failed
    #[error("Failed to reset device in slot {slot}: {source}")]
    Reset {
        slot: usize,
        #[source]
        source: DriverError,
    },

    /// Disabling bitbang mode failed
    #[error("Failed to disable bitbang mode in slot {slot}: {source}")]
    Bitmode {
        slot: usize,
        #[source]
        source: DriverError,
    },

    /// Write failed; the slot has been closed
    #[error("Write to slot {slot} failed: {source}")]
    Write {
        slot: usize,
        #[source]
        source: DriverError,
    },

    /// Pin read failed; the slot has been closed
    #[error("Reading pins of slot {slot} failed: {source}")]
    ReadPins {
        slot: usize,
        #[source]
        source: DriverError,
    },

    /// Control request failed
    #[error("Control request on slot {slot} failed: {source}")]
    Control {
        slot: usize,
        #[source]
        source: DriverError,
    },

    /// Close reported a failure; the context was released anyway
    #[error("Failed to close slot {slot}: {source}")]
    Close {
        slot: usize,
        #[source]
        source: DriverError,
    },

    /// Enumeration ran but found nothing
    #[error("No trigger box found ({vendor_id:04x}:{product_id:04x})")]
    NoDevices { vendor_id: u16, product_id: u16 },

    /// Marker code or payload outside the chunk format
    #[error("Invalid marker: {0}")]
    InvalidMarker(String),

    /// Invalid configuration parameter
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// Writing a marker recording failed
    #[error("Failed to record marker: {0}")]
    Recording(#[source] std::io::Error),
}

impl BoxError {
    /// Negative status code for this error
    pub fn status(&self) -> i32 {
        match self {
            BoxError::SlotOutOfRange { .. } => -1,
            BoxError::SlotBusy { .. } => -2,
            BoxError::SlotClosed { .. } => -3,
            BoxError::NotEnumerated => -4,
            BoxError::Enumeration { .. } => -5,
            BoxError::DriverInit { .. } => -6,
            BoxError::Open { .. } => -7,
            BoxError::Reset { .. } => -8,
            BoxError::Bitmode { .. } => -9,
            BoxError::Write { .. } => -10,
            BoxError::ReadPins { .. } => -11,
            BoxError::Control { .. } => -12,
            BoxError::Close { .. } => -13,
            BoxError::NoDevices { .. } => -14,
            BoxError::InvalidMarker(_) => -15,
            BoxError::InvalidParameter(_) => -16,
            BoxError::Recording(_) => -17,
        }
    }

    /// Slot the error refers to, if any
    pub fn slot(&self) -> Option<usize> {
        match self {
            BoxError::SlotOutOfRange { slot, .. }
            | BoxError::SlotBusy { slot }
            | BoxError::SlotClosed { slot }
            | BoxError::DriverInit { slot, .. }
            | BoxError::Open { slot, .. }
            | BoxError::Reset { slot, .. }
            | BoxError::Bitmode { slot, .. }
            | BoxError::Write { slot, .. }
            | BoxError::ReadPins { slot, .. }
            | BoxError::Control { slot, .. }
            | BoxError::Close { slot, .. } => Some(*slot),
            _ => None,
        }
    }

    /// Underlying driver failure, if any
    pub fn driver_error(&self) -> Option<&DriverError> {
        match self {
            BoxError::Enumeration { source }
            | BoxError::DriverInit { source, .. }
            | BoxError::Open { source, .. }
            | BoxError::Reset { source, .. }
            | BoxError::Bitmode { source, .. }
            | BoxError::Write { source, .. }
            | BoxError::ReadPins { source, .. }
            | BoxError::Control { source, .. }
            | BoxError::Close { source, .. } => Some(source),
            _ => None,
        }
    }

    /// Troubleshooting hint for errors that usually have a local cause.
    ///
    /// Only a suggestion: a permission failure reported by the USB stack
    /// most often means a missing udev rule, but not always.
    pub fn hint(&self) -> Option<&'static str> {
        match self.driver_error() {
            Some(e) if e.kind() == DriverErrorKind::PermissionDenied => Some(PERMISSION_HINT),
            _ => None,
        }
    }
}

/// Result type for trigger box operations
pub type Result<T> = std::result::Result<T, BoxError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes_are_negative_and_distinct() {
        let err = || DriverError::other("x");
        let errors = vec![
            BoxError::SlotOutOfRange {
                slot: 9,
                count: 1,
                max_slots: 5,
            },
            BoxError::SlotBusy { slot: 0 },
            BoxError::SlotClosed { slot: 0 },
            BoxError::NotEnumerated,
            BoxError::Enumeration { source: err() },
            BoxError::DriverInit { slot: 0, source: err() },
            BoxError::Open { slot: 0, source: err() },
            BoxError::Reset { slot: 0, source: err() },
            BoxError::Bitmode { slot: 0, source: err() },
            BoxError::Write { slot: 0, source: err() },
            BoxError::ReadPins { slot: 0, source: err() },
            BoxError::Control { slot: 0, source: err() },
            BoxError::Close { slot: 0, source: err() },
            BoxError::NoDevices {
                vendor_id: 0x1305,
                product_id: 0x1979,
            },
            BoxError::InvalidMarker("x".into()),
            BoxError::InvalidParameter("x".into()),
            BoxError::Recording(std::io::Error::other("x")),
        ];

        let mut codes: Vec<i32> = errors.iter().map(BoxError::status).collect();
        assert!(codes.iter().all(|&c| c < 0));
        codes.sort_unstable();
        codes.dedup();
        assert_eq!(codes.len(), errors.len());
    }

    #[test]
    fn test_permission_hint_only_for_permission_errors() {
        let denied = BoxError::Open {
            slot: 0,
            source: DriverError::new(DriverErrorKind::PermissionDenied, "access denied"),
        };
        assert_eq!(denied.hint(), Some(PERMISSION_HINT));

        let busy = BoxError::Open {
            slot: 0,
            source: DriverError::new(DriverErrorKind::Busy, "claimed"),
        };
        assert_eq!(busy.hint(), None);
        assert_eq!(BoxError::SlotBusy { slot: 1 }.hint(), None);
    }

    #[test]
    fn test_error_message_carries_driver_failure() {
        let e = BoxError::Write {
            slot: 2,
            source: DriverError::new(DriverErrorKind::Timeout, "write timed out"),
        };
        assert_eq!(
            e.to_string(),
            "Write to slot 2 failed: write timed out (timeout)"
        );
        assert_eq!(e.slot(), Some(2));
    }
}
