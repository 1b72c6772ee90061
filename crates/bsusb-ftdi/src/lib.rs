//! bsusb-ftdi - FT245BM back end for the BioSemi trigger interface
//!
//! This crate drives the FTDI FT245BM inside the BioSemi USB trigger
//! interface directly over [`nusb`], without libftdi. Only the part of the
//! FTDI SIO protocol the trigger box needs is implemented:
//!
//! - SIO reset
//! - SET_BITMODE (used to leave bitbang mode)
//! - READ_PINS
//! - bulk writes to the FIFO, chunked like libftdi does
//! - raw control requests with an empty data stage
//!
//! # Example
//!
//! ```no_run
//! use bsusb_core::{BoxConfig, BoxManager};
//! use bsusb_ftdi::Ft245Driver;
//!
//! let mut boxes = BoxManager::new(Ft245Driver::new(), BoxConfig::default());
//! if boxes.find_all()? > 0 {
//!     boxes.open(0)?;
//!     boxes.write_bytes(0, &[0u8; 256])?;
//!     boxes.close(0)?;
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! # Driver Options
//!
//! When using the CLI (`--driver ftdi:<options>`):
//!
//! - `vid=<hex>` - Vendor ID (default: 1305)
//! - `pid=<hex>` - Product ID (default: 1979)
//! - `timeout=<ms>` - Write timeout in milliseconds (default: 5000)
//! - `slots=<N>` - Slot table capacity (default: 5)
//!
//! # System Requirements
//!
//! On Linux the user needs write access to the device node under
//! `/dev/bus/usb`. A udev rule such as
//!
//! ```text
//! SUBSYSTEM=="usb", ATTR{idVendor}=="1305", ATTR{idProduct}=="1979", MODE="0666"
//! ```
//!
//! grants that without running as root.

mod device;
mod error;
pub mod protocol;

pub use device::{Ft245Context, Ft245Driver};
