//! Register transport for the SM-TC eight-channel thermocouple card.
//!
//! Every public operation opens its own bus session, performs exactly one
//! register read or write and closes the session again (the session is
//! dropped on every path, including errors). Nothing holds the bus open
//! between calls, so each operation can be retried on its own.
//!
//! A session is any [`embedded_hal::i2c::I2c`] implementation. Register reads
//! are a `write_read` of the register offset; writes send offset and value in
//! one `write`.

pub mod linux;
pub mod memory;

use crate::config::{SensorType, CHANNEL_COUNT};
use crate::error::{Result, ThermoError};
use embedded_hal::i2c::{self, I2c};
use serde::{Deserialize, Serialize};
use static_assertions::const_assert;
use std::io;
use tracing::{debug, info};

pub use linux::LinuxI2c;
pub use memory::MemoryBus;

pub const CARD_BASE_ADDRESS: u8 = 0x16;
pub const STACK_LEVEL_MAX: u8 = 7;

pub const TEMP_BASE: u8 = 0;
pub const SENSOR_TYPE_BASE: u8 = 16;
pub const DIAG_TEMPERATURE: u8 = 24;
pub const DIAG_SUPPLY_5V: u8 = 26;
pub const REVISION_MAJOR: u8 = 50;
pub const REVISION_MINOR: u8 = 51;
pub const MILLIVOLT_BASE: u8 = 54;
pub const THERMISTOR_BASE: u8 = 101;

pub const VALUE_SIZE_BYTES: u8 = 2;
pub const TEMP_SCALE: f64 = 10.0;
pub const MILLIVOLT_SCALE: f64 = 100.0;
pub const SUPPLY_SCALE: f64 = 100.0;

// Register blocks must not overlap
const_assert!(TEMP_BASE as usize + CHANNEL_COUNT * 2 <= SENSOR_TYPE_BASE as usize);
const_assert!(SENSOR_TYPE_BASE as usize + CHANNEL_COUNT <= DIAG_TEMPERATURE as usize);
const_assert!(REVISION_MINOR == REVISION_MAJOR + 1);
const_assert!(MILLIVOLT_BASE as usize + CHANNEL_COUNT * 2 <= THERMISTOR_BASE as usize);

/// Factory for short-lived bus sessions. Dropping a session closes it.
pub trait BusOpener {
    type Session: I2c;

    fn open(&self) -> io::Result<Self::Session>;
}

/// Carry an I2C failure as an `io::Error`, keeping NACKs distinguishable.
fn bus_error<E: i2c::Error>(e: E) -> io::Error {
    let kind = match e.kind() {
        i2c::ErrorKind::NoAcknowledge(_) => io::ErrorKind::NotConnected,
        _ => io::ErrorKind::Other,
    };
    io::Error::new(kind, format!("{:?}", e))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoardRevision {
    pub major: u8,
    pub minor: u8,
}

impl core::fmt::Display for BoardRevision {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

/// Reject anything outside `1..=8` before the bus is touched.
pub fn validate_channel(channel: u8) -> Result<u8> {
    if channel == 0 || usize::from(channel) > CHANNEL_COUNT {
        return Err(ThermoError::InvalidChannel { channel });
    }
    Ok(channel)
}

/// Offset of a 16-bit per-channel register.
pub fn word_register(base: u8, channel: u8) -> Result<u8> {
    let channel = validate_channel(channel)?;
    Ok(base + (channel - 1) * VALUE_SIZE_BYTES)
}

/// Offset of an 8-bit per-channel register.
pub fn byte_register(base: u8, channel: u8) -> Result<u8> {
    let channel = validate_channel(channel)?;
    Ok(base + (channel - 1))
}

#[derive(Debug)]
pub struct SmtcBoard<B: BusOpener> {
    bus: B,
    address: u8,
    revision: BoardRevision,
}

impl<B: BusOpener> SmtcBoard<B> {
    /// Probe the card at `stack` by reading its revision bytes.
    ///
    /// Any failure here means there is no usable board; it is reported as
    /// [`ThermoError::HardwareUnavailable`] so the caller can fall back.
    pub fn probe(bus: B, stack: u8) -> Result<Self> {
        if stack > STACK_LEVEL_MAX {
            return Err(ThermoError::InvalidStack { stack });
        }
        let address = CARD_BASE_ADDRESS + stack;
        let mut board = Self {
            bus,
            address,
            revision: BoardRevision { major: 0, minor: 0 },
        };
        board.revision = board
            .read_revision()
            .map_err(|e| ThermoError::HardwareUnavailable(e.to_string()))?;
        info!(target: "hardware", "SM-TC card rev {} found at 0x{:02x}", board.revision, address);
        Ok(board)
    }

    pub fn address(&self) -> u8 {
        self.address
    }

    pub fn revision(&self) -> BoardRevision {
        self.revision
    }

    pub fn read_temperature(&self, channel: u8) -> Result<f64> {
        let register = word_register(TEMP_BASE, channel)?;
        let raw = self.read_i16("read temperature", register)?;
        Ok(f64::from(raw) / TEMP_SCALE)
    }

    pub fn read_millivolts(&self, channel: u8) -> Result<f64> {
        let register = word_register(MILLIVOLT_BASE, channel)?;
        let raw = self.read_i16("read millivolts", register)?;
        Ok(f64::from(raw) / MILLIVOLT_SCALE)
    }

    pub fn write_sensor_type(&self, channel: u8, sensor_type: SensorType) -> Result<()> {
        let register = byte_register(SENSOR_TYPE_BASE, channel)?;
        self.with_session("write sensor type", |session, address| {
            session.write(address, &[register, sensor_type.board_code()])
        })?;
        info!(target: "hardware", "Set CH{} to Type {}", channel, sensor_type);
        Ok(())
    }

    pub fn read_sensor_type(&self, channel: u8) -> Result<SensorType> {
        let register = byte_register(SENSOR_TYPE_BASE, channel)?;
        let code = self.read_u8("read sensor type", register)?;
        SensorType::from_board_code(code)
    }

    pub fn read_revision(&self) -> Result<BoardRevision> {
        let mut buf = [0u8; 2];
        self.read_exact("read revision", REVISION_MAJOR, &mut buf)?;
        Ok(BoardRevision { major: buf[0], minor: buf[1] })
    }

    /// On-board diagnostic temperature, °C.
    pub fn read_diag_temperature(&self) -> Result<f64> {
        let raw = self.read_i16("read diagnostic temperature", DIAG_TEMPERATURE)?;
        Ok(f64::from(raw) / TEMP_SCALE)
    }

    /// 5 V supply rail, volts.
    pub fn read_supply_voltage(&self) -> Result<f64> {
        let raw = self.read_i16("read 5V supply", DIAG_SUPPLY_5V)?;
        Ok(f64::from(raw) / SUPPLY_SCALE)
    }

    /// On-board thermistor `channel` (1..=8), °C.
    pub fn read_thermistor_temperature(&self, channel: u8) -> Result<f64> {
        let register = word_register(THERMISTOR_BASE, channel)?;
        let raw = self.read_i16("read thermistor", register)?;
        Ok(f64::from(raw) / TEMP_SCALE)
    }

    fn with_session<T>(
        &self,
        operation: &'static str,
        f: impl FnOnce(&mut B::Session, u8) -> core::result::Result<T, <B::Session as i2c::ErrorType>::Error>,
    ) -> Result<T> {
        let mut session = self.bus.open().map_err(|e| ThermoError::comm(operation, e))?;
        let result = f(&mut session, self.address);
        drop(session);
        result.map_err(|e| {
            let e = bus_error(e);
            debug!(target: "comm", "{} at 0x{:02x} failed: {}", operation, self.address, e);
            ThermoError::comm(operation, e)
        })
    }

    fn read_exact(&self, operation: &'static str, register: u8, buf: &mut [u8]) -> Result<()> {
        self.with_session(operation, |session, address| session.write_read(address, &[register], buf))
    }

    fn read_i16(&self, operation: &'static str, register: u8) -> Result<i16> {
        let mut buf = [0u8; 2];
        self.read_exact(operation, register, &mut buf)?;
        Ok(i16::from_le_bytes(buf))
    }

    fn read_u8(&self, operation: &'static str, register: u8) -> Result<u8> {
        let mut buf = [0u8; 1];
        self.read_exact(operation, register, &mut buf)?;
        Ok(buf[0])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_offsets() {
        assert_eq!(word_register(TEMP_BASE, 1).unwrap(), 0);
        assert_eq!(word_register(TEMP_BASE, 8).unwrap(), 14);
        assert_eq!(word_register(MILLIVOLT_BASE, 3).unwrap(), 58);
        assert_eq!(byte_register(SENSOR_TYPE_BASE, 8).unwrap(), 23);
        assert_eq!(word_register(THERMISTOR_BASE, 2).unwrap(), 103);
    }

    #[test]
    fn test_out_of_range_channels_rejected() {
        assert!(matches!(word_register(TEMP_BASE, 0), Err(ThermoError::InvalidChannel { channel: 0 })));
        assert!(matches!(byte_register(SENSOR_TYPE_BASE, 9), Err(ThermoError::InvalidChannel { channel: 9 })));
    }
}
