//! Parallel port capability

use crate::error::{ParportError, Result};

/// Eight digital output lines of a parallel port
///
/// Implementations claim the port when they are created and give it back
/// on [`release`](ParallelPort::release) or when dropped. Data access after
/// release fails with [`ParportError::NotClaimed`].
pub trait ParallelPort {
    /// Human readable location, e.g. `/dev/parport0` or `0x378`
    fn location(&self) -> String;

    /// Drive the data lines
    fn write_data(&mut self, value: u8) -> Result<()>;

    /// Read the data lines back
    fn read_data(&mut self) -> Result<u8>;

    /// Give the port back. Calling it again is a no-op.
    fn release(&mut self) -> Result<()>;

    /// Whether the port is still held
    fn is_claimed(&self) -> bool;
}

impl<P: ParallelPort + ?Sized> ParallelPort for Box<P> {
    fn location(&self) -> String {
        (**self).location()
    }

    fn write_data(&mut self, value: u8) -> Result<()> {
        (**self).write_data(value)
    }

    fn read_data(&mut self) -> Result<u8> {
        (**self).read_data()
    }

    fn release(&mut self) -> Result<()> {
        (**self).release()
    }

    fn is_claimed(&self) -> bool {
        (**self).is_claimed()
    }
}

/// In-memory data latch that records every value written
#[derive(Debug, Clone)]
pub struct DummyPort {
    value: u8,
    history: Vec<u8>,
    claimed: bool,
}

impl DummyPort {
    /// Create a claimed port with all lines low
    pub fn new() -> Self {
        Self {
            value: 0,
            history: Vec::new(),
            claimed: true,
        }
    }

    /// Every value written so far, oldest first
    pub fn history(&self) -> &[u8] {
        &self.history
    }
}

impl Default for DummyPort {
    fn default() -> Self {
        Self::new()
    }
}

impl ParallelPort for DummyPort {
    fn location(&self) -> String {
        "dummy".into()
    }

    fn write_data(&mut self, value: u8) -> Result<()> {
        if !self.claimed {
            return Err(ParportError::NotClaimed);
        }
        log::trace!("dummy parport: 0x{:02x}", value);
        self.value = value;
        self.history.push(value);
        Ok(())
    }

    fn read_data(&mut self) -> Result<u8> {
        if !self.claimed {
            return Err(ParportError::NotClaimed);
        }
        Ok(self.value)
    }

    fn release(&mut self) -> Result<()> {
        self.claimed = false;
        Ok(())
    }

    fn is_claimed(&self) -> bool {
        self.claimed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dummy_port() {
        let mut port = DummyPort::new();
        port.write_data(0xff).unwrap();
        port.write_data(0x00).unwrap();
        assert_eq!(port.read_data().unwrap(), 0x00);
        assert_eq!(port.history(), [0xff, 0x00]);
    }

    #[test]
    fn test_release_is_idempotent() {
        let mut port = DummyPort::new();
        port.release().unwrap();
        port.release().unwrap();
        assert!(!port.is_claimed());
        assert!(matches!(port.write_data(1), Err(ParportError::NotClaimed)));
        assert!(matches!(port.read_data(), Err(ParportError::NotClaimed)));
    }

    #[test]
    fn test_boxed_port() {
        let mut port: Box<dyn ParallelPort> = Box::new(DummyPort::new());
        port.write_data(0x42).unwrap();
        assert_eq!(port.read_data().unwrap(), 0x42);
        assert_eq!(port.location(), "dummy");
    }
}
