//! In-memory stand-in for the SM-TC card.
//!
//! Holds a 256-byte register image behind a shared handle so a test (or the
//! CLI's `--simulate-board` mode) can keep mutating the image while a
//! [`SmtcBoard`](super::SmtcBoard) owns a clone of the bus. Faults can be
//! injected per register, and the whole bus can be made unavailable.
//!
//! Sessions speak [`embedded_hal::i2c::I2c`] with a register pointer, like
//! the card: a write sets the pointer from its first byte and stores the
//! rest, a read continues from the pointer.

use super::{
    word_register, BusOpener, DIAG_SUPPLY_5V, DIAG_TEMPERATURE, MILLIVOLT_BASE,
    MILLIVOLT_SCALE, REVISION_MAJOR, REVISION_MINOR, SENSOR_TYPE_BASE, SUPPLY_SCALE, TEMP_BASE,
    TEMP_SCALE, THERMISTOR_BASE,
};
use crate::config::{SensorType, CHANNEL_COUNT};
use embedded_hal::i2c::{self, ErrorKind, I2c, NoAcknowledgeSource, Operation};
use std::collections::HashSet;
use std::io;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

const IMAGE_SIZE: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemoryBusError {
    /// The register was set to fail.
    Nack { register: u8 },
    /// The card stopped acknowledging partway through a read.
    Truncated { register: u8 },
    /// Access past the end of the register map.
    OutOfRange,
    /// A write carried no register pointer.
    EmptyWrite,
}

impl i2c::Error for MemoryBusError {
    fn kind(&self) -> ErrorKind {
        match self {
            MemoryBusError::Nack { .. } | MemoryBusError::Truncated { .. } => {
                ErrorKind::NoAcknowledge(NoAcknowledgeSource::Data)
            }
            MemoryBusError::OutOfRange | MemoryBusError::EmptyWrite => ErrorKind::Other,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BusStats {
    pub opens: u32,
    pub closes: u32,
    pub reads: u32,
    pub writes: u32,
}

#[derive(Debug)]
struct MemoryImage {
    registers: [u8; IMAGE_SIZE],
    failing: HashSet<u8>,
    short_reads: HashSet<u8>,
    unavailable: bool,
    stats: BusStats,
}

#[derive(Debug, Clone)]
pub struct MemoryBus {
    image: Arc<Mutex<MemoryImage>>,
}

impl MemoryBus {
    /// Blank card (every channel reads 0 °C / 0 mV) reporting revision 1.0.
    pub fn new() -> Self {
        let mut registers = [0u8; IMAGE_SIZE];
        registers[usize::from(REVISION_MAJOR)] = 1;
        registers[usize::from(REVISION_MINOR)] = 0;
        for (i, t) in [SensorType::K; CHANNEL_COUNT].iter().enumerate() {
            registers[usize::from(SENSOR_TYPE_BASE) + i] = t.board_code();
        }
        Self {
            image: Arc::new(Mutex::new(MemoryImage {
                registers,
                failing: HashSet::new(),
                short_reads: HashSet::new(),
                unavailable: false,
                stats: BusStats::default(),
            })),
        }
    }

    /// Card with every channel plugged in, sitting a little above room temperature.
    pub fn populated() -> Self {
        let bus = Self::new();
        for ch in 1..=CHANNEL_COUNT as u8 {
            let celsius = 21.0 + f64::from(ch) * 0.5;
            bus.set_temperature(ch, celsius);
            // Roughly the K-type EMF for the temperature above
            bus.set_millivolts(ch, celsius * 0.0405);
            bus.set_thermistor(ch, 24.0 + f64::from(ch) * 0.1);
        }
        bus.set_diag_temperature(31.5);
        bus.set_supply_voltage(5.02);
        bus
    }

    fn lock(&self) -> MutexGuard<'_, MemoryImage> {
        self.image.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_word(&self, register: u8, raw: i16) {
        let mut image = self.lock();
        let bytes = raw.to_le_bytes();
        let at = usize::from(register);
        image.registers[at..at + 2].copy_from_slice(&bytes);
    }

    fn scaled(value: f64, scale: f64) -> i16 {
        (value * scale).round().clamp(f64::from(i16::MIN), f64::from(i16::MAX)) as i16
    }

    pub fn set_temperature(&self, channel: u8, celsius: f64) {
        if let Ok(register) = word_register(TEMP_BASE, channel) {
            self.write_word(register, Self::scaled(celsius, TEMP_SCALE));
        }
    }

    pub fn set_millivolts(&self, channel: u8, millivolts: f64) {
        if let Ok(register) = word_register(MILLIVOLT_BASE, channel) {
            self.write_word(register, Self::scaled(millivolts, MILLIVOLT_SCALE));
        }
    }

    pub fn set_thermistor(&self, channel: u8, celsius: f64) {
        if let Ok(register) = word_register(THERMISTOR_BASE, channel) {
            self.write_word(register, Self::scaled(celsius, TEMP_SCALE));
        }
    }

    pub fn set_diag_temperature(&self, celsius: f64) {
        self.write_word(DIAG_TEMPERATURE, Self::scaled(celsius, TEMP_SCALE));
    }

    pub fn set_supply_voltage(&self, volts: f64) {
        self.write_word(DIAG_SUPPLY_5V, Self::scaled(volts, SUPPLY_SCALE));
    }

    /// Drop a channel's voltage to exactly zero, as an open thermocouple reads.
    pub fn unplug(&self, channel: u8) {
        self.set_millivolts(channel, 0.0);
    }

    pub fn register(&self, register: u8) -> u8 {
        self.lock().registers[usize::from(register)]
    }

    pub fn set_register(&self, register: u8, value: u8) {
        self.lock().registers[usize::from(register)] = value;
    }

    /// Reads touching `register` fail with an I/O error until cleared.
    pub fn fail_register(&self, register: u8) {
        self.lock().failing.insert(register);
    }

    /// Temperature reads of `channel` fail until cleared.
    pub fn fail_temperature(&self, channel: u8) {
        if let Ok(register) = word_register(TEMP_BASE, channel) {
            self.fail_register(register);
        }
    }

    /// Reads starting at `register` stop acknowledging before the last byte.
    pub fn short_read_register(&self, register: u8) {
        self.lock().short_reads.insert(register);
    }

    pub fn clear_faults(&self) {
        let mut image = self.lock();
        image.failing.clear();
        image.short_reads.clear();
    }

    /// Make every open fail, as when no card answers on the bus.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.lock().unavailable = unavailable;
    }

    pub fn stats(&self) -> BusStats {
        self.lock().stats
    }
}

impl Default for MemoryBus {
    fn default() -> Self {
        Self::new()
    }
}

impl BusOpener for MemoryBus {
    type Session = MemorySession;

    fn open(&self) -> io::Result<Self::Session> {
        let mut image = self.lock();
        if image.unavailable {
            return Err(io::Error::new(io::ErrorKind::NotFound, "no device at address"));
        }
        image.stats.opens += 1;
        Ok(MemorySession { image: Arc::clone(&self.image), pointer: 0 })
    }
}

#[derive(Debug)]
pub struct MemorySession {
    image: Arc<Mutex<MemoryImage>>,
    pointer: usize,
}

impl MemorySession {
    fn lock(&self) -> MutexGuard<'_, MemoryImage> {
        self.image.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl i2c::ErrorType for MemorySession {
    type Error = MemoryBusError;
}

impl I2c for MemorySession {
    fn transaction(&mut self, _address: u8, operations: &mut [Operation<'_>]) -> Result<(), Self::Error> {
        let mut image = self.image.lock().unwrap_or_else(PoisonError::into_inner);
        for operation in operations.iter_mut() {
            match operation {
                Operation::Write(bytes) => {
                    let (&register, data) = bytes.split_first().ok_or(MemoryBusError::EmptyWrite)?;
                    let start = usize::from(register);
                    if start + data.len() > IMAGE_SIZE {
                        return Err(MemoryBusError::OutOfRange);
                    }
                    if !data.is_empty() {
                        image.stats.writes += 1;
                        if image.failing.contains(&register) {
                            return Err(MemoryBusError::Nack { register });
                        }
                        image.registers[start..start + data.len()].copy_from_slice(data);
                    }
                    self.pointer = start + data.len();
                }
                Operation::Read(buf) => {
                    image.stats.reads += 1;
                    let start = self.pointer;
                    let end = start + buf.len();
                    if end > IMAGE_SIZE {
                        return Err(MemoryBusError::OutOfRange);
                    }
                    if let Some(register) = (start..end).map(|r| r as u8).find(|r| image.failing.contains(r)) {
                        return Err(MemoryBusError::Nack { register });
                    }
                    let register = start as u8;
                    if image.short_reads.contains(&register) {
                        return Err(MemoryBusError::Truncated { register });
                    }
                    buf.copy_from_slice(&image.registers[start..end]);
                    self.pointer = end;
                }
            }
        }
        Ok(())
    }
}

impl Drop for MemorySession {
    fn drop(&mut self) {
        self.lock().stats.closes += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_word_written_little_endian() {
        let bus = MemoryBus::new();
        bus.set_temperature(2, -12.3);
        let raw = i16::from_le_bytes([bus.register(2), bus.register(3)]);
        assert_eq!(raw, -123);
    }

    #[test]
    fn test_unavailable_bus_refuses_open() {
        let bus = MemoryBus::new();
        bus.set_unavailable(true);
        assert!(bus.open().is_err());
        assert_eq!(bus.stats().opens, 0);
    }

    #[test]
    fn test_write_then_read_follows_register_pointer() {
        let bus = MemoryBus::new();
        let mut session = bus.open().unwrap();
        session.write(0x16, &[SENSOR_TYPE_BASE + 1, 5, 6]).unwrap();
        let mut buf = [0u8; 2];
        session.write_read(0x16, &[SENSOR_TYPE_BASE + 1], &mut buf).unwrap();
        assert_eq!(buf, [5, 6]);
        drop(session);
        assert_eq!(bus.stats(), BusStats { opens: 1, closes: 1, reads: 1, writes: 1 });
    }

    #[test]
    fn test_failing_register_nacks() {
        let bus = MemoryBus::new();
        bus.fail_register(REVISION_MINOR);
        let mut session = bus.open().unwrap();
        let mut buf = [0u8; 2];
        assert_eq!(
            session.write_read(0x16, &[REVISION_MAJOR], &mut buf),
            Err(MemoryBusError::Nack { register: REVISION_MINOR })
        );
    }
}
