//! Linux ppdev back end (`/dev/parportN`)

use std::fs::{File, OpenOptions};
use std::os::unix::io::AsRawFd;

use crate::error::{ParportError, Result};
use crate::port::ParallelPort;

/// Default ppdev device
pub const DEFAULT_DEVICE: &str = "/dev/parport0";

/// ppdev ioctls from `linux/ppdev.h`
mod ioctl {
    use nix::{ioctl_none, ioctl_read, ioctl_write_ptr};

    const PP_IOCTL: u8 = b'p';

    ioctl_read!(pprdata, PP_IOCTL, 0x85, u8);
    ioctl_write_ptr!(ppwdata, PP_IOCTL, 0x86, u8);
    ioctl_none!(ppclaim, PP_IOCTL, 0x8b);
    ioctl_none!(pprelease, PP_IOCTL, 0x8c);
}

/// A parallel port claimed through ppdev
pub struct Ppdev {
    path: String,
    file: Option<File>,
}

impl Ppdev {
    /// Open and claim the port at `path`
    pub fn open(path: &str) -> Result<Self> {
        log::debug!("ppdev: opening {}", path);

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(path)
            .map_err(|e| ParportError::OpenFailed {
                path: path.to_string(),
                source: e,
            })?;

        unsafe {
            ioctl::ppclaim(file.as_raw_fd()).map_err(|e| ParportError::ClaimFailed {
                path: path.to_string(),
                source: std::io::Error::from_raw_os_error(e as i32),
            })?;
        }

        log::info!("ppdev: claimed {}", path);
        Ok(Self {
            path: path.to_string(),
            file: Some(file),
        })
    }

    /// Open and claim `/dev/parport0`
    pub fn open_default() -> Result<Self> {
        Self::open(DEFAULT_DEVICE)
    }

    fn file(&self) -> Result<&File> {
        self.file.as_ref().ok_or(ParportError::NotClaimed)
    }
}

impl ParallelPort for Ppdev {
    fn location(&self) -> String {
        self.path.clone()
    }

    fn write_data(&mut self, value: u8) -> Result<()> {
        let fd = self.file()?.as_raw_fd();
        unsafe {
            ioctl::ppwdata(fd, &value).map_err(|e| ParportError::Ioctl {
                request: "PPWDATA",
                source: std::io::Error::from_raw_os_error(e as i32),
            })?;
        }
        Ok(())
    }

    fn read_data(&mut self) -> Result<u8> {
        let fd = self.file()?.as_raw_fd();
        let mut value = 0u8;
        unsafe {
            ioctl::pprdata(fd, &mut value).map_err(|e| ParportError::Ioctl {
                request: "PPRDATA",
                source: std::io::Error::from_raw_os_error(e as i32),
            })?;
        }
        Ok(value)
    }

    fn release(&mut self) -> Result<()> {
        let Some(file) = self.file.take() else {
            return Ok(());
        };
        let result = unsafe { ioctl::pprelease(file.as_raw_fd()) };
        drop(file);
        log::debug!("ppdev: released {}", self.path);
        result.map(|_| ()).map_err(|e| ParportError::Ioctl {
            request: "PPRELEASE",
            source: std::io::Error::from_raw_os_error(e as i32),
        })
    }

    fn is_claimed(&self) -> bool {
        self.file.is_some()
    }
}

impl Drop for Ppdev {
    fn drop(&mut self) {
        if let Err(e) = self.release() {
            log::warn!("ppdev: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_missing_device() {
        let err = Ppdev::open("/nonexistent/parport9").err().unwrap();
        assert!(matches!(err, ParportError::OpenFailed { .. }));
    }
}
