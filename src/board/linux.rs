//! `/dev/i2c-N` access through `linux-embedded-hal`.
//!
//! Each session is a freshly opened [`I2cdev`]; the device file is closed
//! when the session drops. Block reads go out as one combined
//! write-then-read transfer, matching an SMBus I2C block read.

use super::BusOpener;
use linux_embedded_hal::I2cdev;
use std::io;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct LinuxI2c {
    path: PathBuf,
}

impl LinuxI2c {
    pub fn new(bus: u8) -> Self {
        Self { path: PathBuf::from(format!("/dev/i2c-{}", bus)) }
    }

    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl BusOpener for LinuxI2c {
    type Session = I2cdev;

    fn open(&self) -> io::Result<Self::Session> {
        I2cdev::new(&self.path).map_err(|e| {
            io::Error::new(io::ErrorKind::NotFound, format!("{}: {}", self.path.display(), e))
        })
    }
}
