//! bsusb-parport - Parallel port data lines for trigger synchronization
//!
//! Drives the eight data lines of a PC parallel port, typically to mark
//! stimulus onsets on an oscilloscope or a second recorder alongside the
//! USB trigger box.
//!
//! Access is abstracted by the [`ParallelPort`] trait. The back end is
//! picked at startup:
//!
//! - `ppdev` - Linux ppdev device (`/dev/parportN`), claimed with `PPCLAIM`
//! - `direct` - raw port I/O on a legacy LPT base address through
//!   `/dev/port`, with optional auto-detection of the base
//! - `dummy` - in-memory latch
//!
//! # Example
//!
//! ```no_run
//! use bsusb_parport::{open_port, ParallelPort};
//!
//! let mut port = open_port("ppdev", &[("dev", "/dev/parport0")])?;
//! port.write_data(0xff)?;
//! port.write_data(0x00)?;
//! port.release()?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! # Port Options
//!
//! - `ppdev:dev=/dev/parport1` - device path (default: `/dev/parport0`)
//! - `direct:base=0x378` - fixed base address
//! - `direct:base=auto` - probe 0x278, 0x378 and 0x3BC (default)
//!
//! # System Requirements
//!
//! - `ppdev`: the `ppdev` kernel module and write access to the device,
//!   usually via the `lp` group
//! - `direct`: root or `CAP_SYS_RAWIO` for `/dev/port`

pub mod direct;
pub mod error;
pub mod port;
#[cfg(target_os = "linux")]
pub mod ppdev;

pub use direct::{autodetect, DirectPort, PortIo, SimulatedPortSpace, CANDIDATE_BASES};
pub use error::{ParportError, Result};
pub use port::{DummyPort, ParallelPort};

/// Available back ends and their one-line descriptions
pub const BACKENDS: &[(&str, &str)] = &[
    ("ppdev", "Linux ppdev device (/dev/parportN)"),
    ("direct", "Raw port I/O via /dev/port, base=0x378 or base=auto"),
    ("dummy", "In-memory latch for testing"),
];

/// Base address selection for the direct back end
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BaseAddress {
    /// Probe the legacy addresses
    Auto,
    /// Use this base
    Fixed(u16),
}

impl BaseAddress {
    /// Parse `auto` or a hex address (`0x378`, `378`)
    pub fn parse(s: &str) -> Result<Self> {
        if s.eq_ignore_ascii_case("auto") {
            return Ok(BaseAddress::Auto);
        }
        let hex = s.trim_start_matches("0x").trim_start_matches("0X");
        u16::from_str_radix(hex, 16)
            .map(BaseAddress::Fixed)
            .map_err(|_| ParportError::InvalidParameter(format!("Invalid base address '{}'", s)))
    }
}

/// Open a parallel port back end by name
///
/// This is a convenience function for use in the CLI port dispatch.
///
/// # Arguments
///
/// * `name` - Back end name (`ppdev`, `direct`, `dummy`)
/// * `options` - Slice of (key, value) pairs from port string parsing
pub fn open_port(name: &str, options: &[(&str, &str)]) -> Result<Box<dyn ParallelPort>> {
    match name {
        "ppdev" => open_ppdev(options),
        "direct" => open_direct(options),
        "dummy" => Ok(Box::new(DummyPort::new())),
        _ => Err(ParportError::UnknownBackend(name.to_string())),
    }
}

#[cfg(target_os = "linux")]
fn open_ppdev(options: &[(&str, &str)]) -> Result<Box<dyn ParallelPort>> {
    let mut device = ppdev::DEFAULT_DEVICE;
    for (key, value) in options {
        match *key {
            "dev" => device = *value,
            _ => log::warn!("Unknown ppdev option: {}={}", key, value),
        }
    }
    Ok(Box::new(ppdev::Ppdev::open(device)?))
}

#[cfg(not(target_os = "linux"))]
fn open_ppdev(_options: &[(&str, &str)]) -> Result<Box<dyn ParallelPort>> {
    Err(ParportError::Unsupported("ppdev"))
}

#[cfg(unix)]
fn open_direct(options: &[(&str, &str)]) -> Result<Box<dyn ParallelPort>> {
    let mut base = BaseAddress::Auto;
    for (key, value) in options {
        match *key {
            "base" => base = BaseAddress::parse(value)?,
            _ => log::warn!("Unknown direct port option: {}={}", key, value),
        }
    }

    let io = direct::DevPort::open()?;
    let port = match base {
        BaseAddress::Auto => DirectPort::detect(io)?,
        BaseAddress::Fixed(base) => DirectPort::new(io, base),
    };
    Ok(Box::new(port))
}

#[cfg(not(unix))]
fn open_direct(_options: &[(&str, &str)]) -> Result<Box<dyn ParallelPort>> {
    Err(ParportError::Unsupported("direct"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_address_parse() {
        assert_eq!(BaseAddress::parse("auto").unwrap(), BaseAddress::Auto);
        assert_eq!(BaseAddress::parse("AUTO").unwrap(), BaseAddress::Auto);
        assert_eq!(
            BaseAddress::parse("0x378").unwrap(),
            BaseAddress::Fixed(0x378)
        );
        assert_eq!(
            BaseAddress::parse("3bc").unwrap(),
            BaseAddress::Fixed(0x3BC)
        );
        assert!(BaseAddress::parse("lpt1").is_err());
    }

    #[test]
    fn test_open_dummy_and_unknown() {
        let mut port = open_port("dummy", &[]).unwrap();
        port.write_data(1).unwrap();
        assert!(matches!(
            open_port("serial", &[]),
            Err(ParportError::UnknownBackend(_))
        ));
    }
}
