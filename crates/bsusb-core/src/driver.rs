//! Driver seam between the slot table and a USB stack
//!
//! A [`UsbDriver`] scans the bus and hands out fresh [`UsbContext`]s. A
//! context is the per-device handle: it is created empty, opened on one
//! discovered device, and from then on owned by exactly one slot.

use std::fmt;

use crate::config::BoxConfig;
use crate::error::DriverError;

/// FT245BM I/O mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BitMode {
    /// Bitbang off, FIFO streaming
    Reset,
    /// Asynchronous bitbang
    Bitbang,
    /// Synchronous bitbang
    SyncBitbang,
}

impl BitMode {
    /// Value of the mode byte in a SET_BITMODE request
    pub fn as_raw(self) -> u8 {
        match self {
            BitMode::Reset => 0x00,
            BitMode::Bitbang => 0x01,
            BitMode::SyncBitbang => 0x04,
        }
    }

    /// Decode a mode byte
    pub fn from_raw(raw: u8) -> Option<Self> {
        match raw {
            0x00 => Some(BitMode::Reset),
            0x01 => Some(BitMode::Bitbang),
            0x04 => Some(BitMode::SyncBitbang),
            _ => None,
        }
    }
}

impl fmt::Display for BitMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BitMode::Reset => write!(f, "fifo"),
            BitMode::Bitbang => write!(f, "bitbang"),
            BitMode::SyncBitbang => write!(f, "sync-bitbang"),
        }
    }
}

/// Data stage direction of a control request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Host to device
    Out,
    /// Device to host
    In,
}

/// Request type field of bmRequestType
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestKind {
    /// Standard request
    Standard,
    /// Class request
    Class,
    /// Vendor request
    Vendor,
    /// Reserved encoding
    Reserved,
}

/// Recipient field of bmRequestType
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recipient {
    /// The device
    Device,
    /// An interface
    Interface,
    /// An endpoint
    Endpoint,
    /// Other or reserved
    Other,
}

/// A raw control request without a data stage
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControlRequest {
    /// Raw bmRequestType byte
    pub request_type: u8,
    /// bRequest
    pub request: u8,
    /// wValue
    pub value: u16,
    /// wIndex
    pub index: u16,
}

impl ControlRequest {
    /// Create a control request
    pub const fn new(request_type: u8, request: u8, value: u16, index: u16) -> Self {
        Self {
            request_type,
            request,
            value,
            index,
        }
    }

    /// Direction bit of the request type
    pub fn direction(&self) -> Direction {
        if self.request_type & 0x80 != 0 {
            Direction::In
        } else {
            Direction::Out
        }
    }

    /// Type bits of the request type
    pub fn kind(&self) -> RequestKind {
        match (self.request_type >> 5) & 0x03 {
            0 => RequestKind::Standard,
            1 => RequestKind::Class,
            2 => RequestKind::Vendor,
            _ => RequestKind::Reserved,
        }
    }

    /// Recipient bits of the request type
    pub fn recipient(&self) -> Recipient {
        match self.request_type & 0x1f {
            0 => Recipient::Device,
            1 => Recipient::Interface,
            2 => Recipient::Endpoint,
            _ => Recipient::Other,
        }
    }
}

impl fmt::Display for ControlRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "0x{:02x} {} {} {}",
            self.request_type, self.request, self.value, self.index
        )
    }
}

/// Printable facts about a discovered device
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceDescriptor {
    /// Platform bus identifier
    pub bus_id: String,
    /// Address on the bus
    pub address: u8,
    /// USB vendor ID
    pub vendor_id: u16,
    /// USB product ID
    pub product_id: u16,
    /// Serial number string, if reported
    pub serial: Option<String>,
    /// Product string, if reported
    pub product: Option<String>,
}

impl fmt::Display for DeviceDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:04x}:{:04x} bus {} address {}",
            self.vendor_id, self.product_id, self.bus_id, self.address
        )?;
        if let Some(ref product) = self.product {
            write!(f, " \"{}\"", product)?;
        }
        if let Some(ref serial) = self.serial {
            write!(f, " serial {}", serial)?;
        }
        Ok(())
    }
}

/// A USB stack able to find trigger boxes and create device contexts
pub trait UsbDriver {
    /// Handle to a discovered, not yet opened device
    type Device;
    /// Per-device context
    type Context: UsbContext<Device = Self::Device>;

    /// Short name used in log messages
    fn name(&self) -> &'static str;

    /// Scan the bus for devices with the given identification pair
    fn find_all(&mut self, vendor_id: u16, product_id: u16)
        -> Result<Vec<Self::Device>, DriverError>;

    /// Describe a discovered device
    fn describe(&self, device: &Self::Device) -> DeviceDescriptor;

    /// Create an empty context configured with `config`
    fn new_context(&mut self, config: &BoxConfig) -> Result<Self::Context, DriverError>;
}

/// Per-device operations
///
/// All calls block until the transfer completes or the context's write
/// timeout expires. Every method except [`open`](UsbContext::open) fails
/// with [`DriverErrorKind::NotOpen`](crate::DriverErrorKind::NotOpen) on a
/// context without an open device.
pub trait UsbContext {
    /// Handle type accepted by [`open`](UsbContext::open)
    type Device;

    /// Open `device` and claim its interface
    fn open(&mut self, device: &Self::Device) -> Result<(), DriverError>;

    /// Reset the SIO state of the chip
    fn reset(&mut self) -> Result<(), DriverError>;

    /// Set the I/O mode; `mask` selects output lines in bitbang modes
    fn set_bitmode(&mut self, mask: u8, mode: BitMode) -> Result<(), DriverError>;

    /// Write `data` to the FIFO, returning the number of bytes accepted
    fn write(&mut self, data: &[u8]) -> Result<usize, DriverError>;

    /// Read the instantaneous state of the data pins
    fn read_pins(&mut self) -> Result<u8, DriverError>;

    /// Issue a control request with an empty data stage
    fn control(&mut self, request: &ControlRequest) -> Result<usize, DriverError>;

    /// Release the device
    fn close(&mut self) -> Result<(), DriverError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_type_decomposition() {
        let strobe = ControlRequest::new(0x40, 0, 2, 0);
        assert_eq!(strobe.direction(), Direction::Out);
        assert_eq!(strobe.kind(), RequestKind::Vendor);
        assert_eq!(strobe.recipient(), Recipient::Device);

        let status = ControlRequest::new(0xc1, 0x0c, 0, 1);
        assert_eq!(status.direction(), Direction::In);
        assert_eq!(status.kind(), RequestKind::Vendor);
        assert_eq!(status.recipient(), Recipient::Interface);

        let clear = ControlRequest::new(0x02, 0x01, 0, 0x81);
        assert_eq!(clear.kind(), RequestKind::Standard);
        assert_eq!(clear.recipient(), Recipient::Endpoint);
    }

    #[test]
    fn test_bitmode_raw_values() {
        for mode in [BitMode::Reset, BitMode::Bitbang, BitMode::SyncBitbang] {
            assert_eq!(BitMode::from_raw(mode.as_raw()), Some(mode));
        }
        assert_eq!(BitMode::Reset.as_raw(), 0);
        assert_eq!(BitMode::from_raw(0x02), None);
    }

    #[test]
    fn test_descriptor_display() {
        let desc = DeviceDescriptor {
            bus_id: "3".into(),
            address: 7,
            vendor_id: 0x1305,
            product_id: 0x1979,
            serial: Some("BS0001".into()),
            product: Some("USB Trigger Interface".into()),
        };
        assert_eq!(
            desc.to_string(),
            "1305:1979 bus 3 address 7 \"USB Trigger Interface\" serial BS0001"
        );
    }
}
