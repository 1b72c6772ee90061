//! FTDI SIO protocol constants for the FT245BM
//!
//! Request numbers and values follow libftdi's `ftdi.h`.

use std::time::Duration;

/// Bulk OUT endpoint of interface A
pub const WRITE_EP: u8 = 0x02;

/// Interface number to claim
pub const INTERFACE: u8 = 0;

/// wIndex addressing interface A in SIO requests
pub const USB_INDEX: u16 = 1;

/// Largest bulk transfer submitted at once
pub const WRITE_CHUNK_SIZE: usize = 4096;

/// Timeout for SIO configuration requests
pub const CONTROL_TIMEOUT: Duration = Duration::from_secs(5);

/// How long to wait for cancelled transfers to come back
pub const CANCEL_TIMEOUT: Duration = Duration::from_millis(100);

// ============================================================================
// SIO requests
// ============================================================================

/// Reset / purge request
pub const SIO_RESET_REQUEST: u8 = 0x00;
/// Set bitbang mode request
pub const SIO_SET_BITMODE_REQUEST: u8 = 0x0B;
/// Read pins request
pub const SIO_READ_PINS_REQUEST: u8 = 0x0C;

/// wValue of SIO_RESET_REQUEST: reset the SIO state
pub const SIO_RESET_SIO: u16 = 0;
/// wValue of SIO_RESET_REQUEST: purge the TX buffer
pub const SIO_RESET_PURGE_TX: u16 = 2;

/// wValue of SIO_SET_BITMODE_REQUEST: mode in the high byte, mask in the low
pub fn bitmode_value(mode: u8, mask: u8) -> u16 {
    ((mode as u16) << 8) | mask as u16
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bitmode_value() {
        assert_eq!(bitmode_value(0x00, 0x00), 0x0000);
        assert_eq!(bitmode_value(0x01, 0xff), 0x01ff);
        assert_eq!(bitmode_value(0x04, 0x0f), 0x040f);
    }

    #[test]
    fn test_marker_strobe_is_tx_purge() {
        let strobe = bsusb_core::protocol::MARKER_STROBE;
        assert_eq!(strobe.request, SIO_RESET_REQUEST);
        assert_eq!(strobe.value, SIO_RESET_PURGE_TX);
    }
}
