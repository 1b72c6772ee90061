//! bsusb-core - Core abstractions for the BioSemi USB trigger interface
//!
//! The BioSemi USB trigger interface is an FTDI FT245BM FIFO chip
//! (VID:1305 PID:1979) wired to the trigger input of an acquisition box.
//! Several boxes can be attached at once; each one is addressed by a
//! caller-chosen slot number.
//!
//! This crate contains everything that does not depend on a particular
//! USB stack:
//!
//! - [`driver`]: the [`UsbDriver`] / [`UsbContext`] traits implemented by
//!   the real FT245BM back end and by the in-memory dummy
//! - [`slots`]: [`BoxManager`], the owned slot table with the open/reset/
//!   disable-bitbang lifecycle and the force-close policy
//! - [`marker`]: event-marker framing and the marker sinks
//! - [`error`]: the error taxonomy and its negative status codes
//! - [`config`]: identification pair, timeout and slot limit
//!
//! # Example
//!
//! ```ignore
//! use bsusb_core::{BoxConfig, BoxManager};
//!
//! let mut boxes = BoxManager::new(driver, BoxConfig::default());
//! let count = boxes.find_all()?;
//! println!("{} trigger box(es) found", count);
//!
//! boxes.open(0)?;
//! boxes.write_byte(0, 0x42)?;
//! boxes.close(0)?;
//! ```

pub mod config;
pub mod driver;
pub mod error;
pub mod marker;
pub mod protocol;
pub mod slots;

pub use config::BoxConfig;
pub use driver::{BitMode, ControlRequest, DeviceDescriptor, UsbContext, UsbDriver};
pub use error::{BoxError, DriverError, DriverErrorKind, Result};
pub use marker::{MarkerCode, MarkerSink, RecordingMarkers, UsbMarkers};
pub use slots::BoxManager;
