//! Mapping of nusb failures onto driver errors

use bsusb_core::{DriverError, DriverErrorKind};
use nusb::transfer::TransferError;

/// Wrap a device-level nusb error
pub(crate) fn usb_error(what: &str, e: nusb::Error) -> DriverError {
    let kind = match e.kind() {
        nusb::ErrorKind::PermissionDenied => DriverErrorKind::PermissionDenied,
        nusb::ErrorKind::Disconnected => DriverErrorKind::Disconnected,
        nusb::ErrorKind::Busy => DriverErrorKind::Busy,
        nusb::ErrorKind::NotFound => DriverErrorKind::NotFound,
        _ => DriverErrorKind::Other,
    };
    DriverError::new(kind, format!("{}: {}", what, e))
}

/// Wrap a failed transfer
pub(crate) fn transfer_error(what: &str, e: TransferError) -> DriverError {
    let kind = match e {
        TransferError::Stall => DriverErrorKind::Stall,
        TransferError::Disconnected => DriverErrorKind::Disconnected,
        _ => DriverErrorKind::Other,
    };
    DriverError::new(kind, format!("{}: {}", what, e))
}

pub(crate) fn timeout(what: &str) -> DriverError {
    DriverError::new(DriverErrorKind::Timeout, format!("{} timed out", what))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transfer_error_kinds() {
        assert_eq!(
            transfer_error("write", TransferError::Stall).kind(),
            DriverErrorKind::Stall
        );
        assert_eq!(
            transfer_error("write", TransferError::Disconnected).kind(),
            DriverErrorKind::Disconnected
        );
        assert_eq!(
            transfer_error("write", TransferError::Cancelled).kind(),
            DriverErrorKind::Other
        );
        assert_eq!(timeout("USB write").kind(), DriverErrorKind::Timeout);
    }
}
