//! Trigger interface constants

use std::time::Duration;

use crate::driver::ControlRequest;

/// BioSemi vendor ID programmed into the FT245BM EEPROM
pub const BIOSEMI_VENDOR_ID: u16 = 0x1305;
/// BioSemi USB trigger interface product ID
pub const BIOSEMI_PRODUCT_ID: u16 = 0x1979;

/// Number of slots in a default slot table
pub const MAX_SLOTS: usize = 5;

/// Default timeout for a single write
pub const DEFAULT_WRITE_TIMEOUT: Duration = Duration::from_secs(5);

/// Length of the zero packet written after opening a box
pub const SNOWPLOUGH_LEN: usize = 256;

/// Vendor OUT request that purges the TX FIFO.
///
/// Sent before every marker chunk: the purge pulses TXE, which the
/// recorder latches as the marker timestamp.
pub const MARKER_STROBE: ControlRequest = ControlRequest::new(0x40, 0x00, 0x0002, 0x0000);
