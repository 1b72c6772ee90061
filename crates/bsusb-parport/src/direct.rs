//! Direct port I/O on a legacy LPT base address
//!
//! The data register sits at `base`, the read-only status register at
//! `base + 1`. Port access goes through a [`PortIo`] implementation; on
//! Linux [`DevPort`] uses `/dev/port`, which needs root (or
//! `CAP_SYS_RAWIO`).

use std::collections::HashMap;

use crate::error::{ParportError, Result};
use crate::port::ParallelPort;

/// Legacy LPT base addresses, in probing order
pub const CANDIDATE_BASES: [u16; 3] = [0x278, 0x378, 0x3BC];

/// Byte-wide access to the I/O port space
pub trait PortIo {
    /// Read one byte from `port`
    fn inb(&mut self, port: u16) -> Result<u8>;

    /// Write one byte to `port`
    fn outb(&mut self, port: u16, value: u8) -> Result<()>;
}

impl<T: PortIo + ?Sized> PortIo for &mut T {
    fn inb(&mut self, port: u16) -> Result<u8> {
        (**self).inb(port)
    }

    fn outb(&mut self, port: u16, value: u8) -> Result<()> {
        (**self).outb(port, value)
    }
}

/// Port I/O through the `/dev/port` character device
#[cfg(unix)]
pub struct DevPort {
    file: std::fs::File,
}

#[cfg(unix)]
impl DevPort {
    /// Default device path
    pub const PATH: &'static str = "/dev/port";

    /// Open `/dev/port`
    pub fn open() -> Result<Self> {
        Self::open_path(Self::PATH)
    }

    /// Open a port-space device file at `path`
    pub fn open_path(path: &str) -> Result<Self> {
        let file = std::fs::OpenOptions::new()
            .read(true)
            .write(true)
            .open(path)
            .map_err(|e| ParportError::OpenFailed {
                path: path.to_string(),
                source: e,
            })?;
        log::debug!("parport: opened {}", path);
        Ok(Self { file })
    }
}

#[cfg(unix)]
impl PortIo for DevPort {
    fn inb(&mut self, port: u16) -> Result<u8> {
        use std::os::unix::fs::FileExt;

        let mut buf = [0u8; 1];
        self.file
            .read_exact_at(&mut buf, port as u64)
            .map_err(|e| ParportError::PortIo {
                address: port,
                source: e,
            })?;
        Ok(buf[0])
    }

    fn outb(&mut self, port: u16, value: u8) -> Result<()> {
        use std::os::unix::fs::FileExt;

        self.file
            .write_all_at(&[value], port as u64)
            .map_err(|e| ParportError::PortIo {
                address: port,
                source: e,
            })
    }
}

/// Simulated I/O port space with parallel ports at chosen addresses
///
/// A simulated port latches writes to its data register and returns a
/// fixed value from its read-only status register. Unpopulated addresses
/// read as `0xFF` and ignore writes, like a floating ISA bus.
#[derive(Debug, Clone, Default)]
pub struct SimulatedPortSpace {
    ports: HashMap<u16, SimulatedLpt>,
    writes: Vec<(u16, u8)>,
}

#[derive(Debug, Clone, Copy)]
struct SimulatedLpt {
    data: u8,
    status: u8,
}

impl SimulatedPortSpace {
    /// An empty port space
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a parallel port at `base` whose status register reads `status`
    pub fn with_port(mut self, base: u16, status: u8) -> Self {
        self.ports.insert(base, SimulatedLpt { data: 0, status });
        self
    }

    /// Current data register of the port at `base`
    pub fn data(&self, base: u16) -> Option<u8> {
        self.ports.get(&base).map(|p| p.data)
    }

    /// Every write seen, as (address, value)
    pub fn writes(&self) -> &[(u16, u8)] {
        &self.writes
    }
}

impl PortIo for SimulatedPortSpace {
    fn inb(&mut self, port: u16) -> Result<u8> {
        if let Some(lpt) = self.ports.get(&port) {
            return Ok(lpt.data);
        }
        if let Some(lpt) = port.checked_sub(1).and_then(|b| self.ports.get(&b)) {
            return Ok(lpt.status);
        }
        Ok(0xFF)
    }

    fn outb(&mut self, port: u16, value: u8) -> Result<()> {
        self.writes.push((port, value));
        if let Some(lpt) = self.ports.get_mut(&port) {
            lpt.data = value;
        }
        Ok(())
    }
}

/// Probe `candidates` in order and return the first base that behaves like
/// a parallel port.
///
/// A base passes when its status register does not float high, ignores a
/// write of its complement, and its data register latches a complemented
/// value.
pub fn autodetect<P: PortIo + ?Sized>(io: &mut P, candidates: &[u16]) -> Result<Option<u16>> {
    for &base in candidates {
        let Some(status_port) = base.checked_add(1) else {
            log::debug!("parport: 0x{:04x} has no status register", base);
            continue;
        };
        let status = io.inb(status_port)?;
        if status == 0xFF {
            log::debug!("parport: nothing at 0x{:03x}", base);
            continue;
        }

        io.outb(status_port, status ^ 0xFF)?;
        if io.inb(status_port)? != status {
            log::debug!("parport: status register at 0x{:03x} is writable", status_port);
            continue;
        }

        let data = io.inb(base)?;
        io.outb(base, data ^ 0xFF)?;
        if io.inb(base)? == data ^ 0xFF {
            log::info!("parport: found parallel port at 0x{:03x}", base);
            return Ok(Some(base));
        }
        log::debug!("parport: data register at 0x{:03x} does not latch", base);
    }
    Ok(None)
}

/// Parallel port driven through raw port I/O
pub struct DirectPort<P: PortIo> {
    io: P,
    base: u16,
    claimed: bool,
}

impl<P: PortIo> DirectPort<P> {
    /// Use the port at `base`
    pub fn new(io: P, base: u16) -> Self {
        log::debug!("parport: using base 0x{:03x}", base);
        Self {
            io,
            base,
            claimed: true,
        }
    }

    /// Auto-detect the base among [`CANDIDATE_BASES`]
    pub fn detect(mut io: P) -> Result<Self> {
        match autodetect(&mut io, &CANDIDATE_BASES)? {
            Some(base) => Ok(Self::new(io, base)),
            None => Err(ParportError::NotDetected {
                probed: CANDIDATE_BASES
                    .iter()
                    .map(|b| format!("0x{:03x}", b))
                    .collect::<Vec<_>>()
                    .join(", "),
            }),
        }
    }

    /// Base address in use
    pub fn base(&self) -> u16 {
        self.base
    }

    /// The underlying port I/O
    pub fn io(&self) -> &P {
        &self.io
    }
}

impl<P: PortIo> ParallelPort for DirectPort<P> {
    fn location(&self) -> String {
        format!("0x{:03x}", self.base)
    }

    fn write_data(&mut self, value: u8) -> Result<()> {
        if !self.claimed {
            return Err(ParportError::NotClaimed);
        }
        self.io.outb(self.base, value)
    }

    fn read_data(&mut self) -> Result<u8> {
        if !self.claimed {
            return Err(ParportError::NotClaimed);
        }
        self.io.inb(self.base)
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
    fn test_autodetect_first_responsive_base() {
        let mut space = SimulatedPortSpace::new()
            .with_port(0x378, 0x7f)
            .with_port(0x3BC, 0x7f);
        assert_eq!(
            autodetect(&mut space, &CANDIDATE_BASES).unwrap(),
            Some(0x378)
        );
    }

    #[test]
    fn test_autodetect_probe_order() {
        let mut space = SimulatedPortSpace::new()
            .with_port(0x278, 0x78)
            .with_port(0x378, 0x78);
        assert_eq!(
            autodetect(&mut space, &CANDIDATE_BASES).unwrap(),
            Some(0x278)
        );
        // 0x278 probe: status read-back, then data complement
        assert_eq!(space.writes()[0], (0x279, 0x87));
        assert_eq!(space.writes()[1], (0x278, 0xff));
    }

    #[test]
    fn test_autodetect_nothing() {
        let mut space = SimulatedPortSpace::new();
        assert_eq!(autodetect(&mut space, &CANDIDATE_BASES).unwrap(), None);
    }

    #[test]
    fn test_autodetect_skips_floating_status() {
        let mut space = SimulatedPortSpace::new().with_port(0x278, 0xff);
        assert_eq!(autodetect(&mut space, &CANDIDATE_BASES).unwrap(), None);
        assert!(space.writes().is_empty());
    }

    #[test]
    fn test_autodetect_skips_top_of_port_space() {
        let mut space = SimulatedPortSpace::new().with_port(0x378, 0x7f);
        assert_eq!(autodetect(&mut space, &[0xFFFF, 0x378]).unwrap(), Some(0x378));
        assert_eq!(autodetect(&mut space, &[0xFFFF]).unwrap(), None);
    }

    #[test]
    fn test_direct_port() {
        let space = SimulatedPortSpace::new().with_port(0x3BC, 0x40);
        let mut port = DirectPort::detect(space).unwrap();
        assert_eq!(port.base(), 0x3BC);
        assert_eq!(port.location(), "0x3bc");

        port.write_data(0xff).unwrap();
        assert_eq!(port.read_data().unwrap(), 0xff);
        assert_eq!(port.io().data(0x3BC), Some(0xff));

        port.release().unwrap();
        assert!(matches!(port.write_data(0), Err(ParportError::NotClaimed)));
    }

    #[test]
    fn test_detect_reports_probed_addresses() {
        let err = DirectPort::detect(SimulatedPortSpace::new())
            .err()
            .unwrap();
        assert_eq!(
            err.to_string(),
            "No parallel port detected (probed 0x278, 0x378, 0x3bc)"
        );
    }
}
