//! # Thermologger
//!
//! Acquisition engine for an eight-channel thermocouple logger built around
//! the SM-TC I2C card, with a synthetic fallback source and debounced
//! front-panel buttons.
//!
//! ## Features
//!
//! - **Register transport**: one bus session per operation, signed 16-bit
//!   little-endian registers scaled to °C and mV
//! - **ITS-90 K-type conversion**: piecewise inverse polynomial, µV to °C
//! - **Synthetic source**: smooth, time-correlated per-channel data when no
//!   card answers at startup
//! - **Connectivity tracking**: exact-zero open-circuit detection with
//!   change-only notifications
//! - **Button debounce**: sample-count plus hold-time filter with a startup
//!   grace period and floating-input lockout
//!
//! ## Quick Start
//!
//! ```rust
//! use thermologger::{AcquisitionLoop, AppConfig, Event, MemoryBus};
//!
//! let bus = MemoryBus::populated();
//! bus.unplug(3);
//!
//! let mut acquisition = AcquisitionLoop::detect(&AppConfig::default(), bus);
//! let mut events: Vec<Event> = Vec::new();
//! let sweep = acquisition.tick(&mut events);
//!
//! assert_eq!(sweep.values.len(), 8);
//! assert_eq!(acquisition.unplugged().as_slice(), &[3]);
//! ```
//!
//! ## Architecture
//!
//! - [`board`] - SM-TC register map and bus transports
//! - [`conversion`] - K-type millivolt to temperature conversion
//! - [`synthetic`] - Fallback data generator
//! - [`source`] - Startup source selection
//! - [`acquisition`] - Per-tick sweep and connectivity checks
//! - [`buttons`] / [`gpio`] - Debounce engine and its input pins
//! - [`runtime`] - Tokio tasks and their stop handles
//! - [`events`] - Notifications to the consumer

#![deny(clippy::all)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]

pub mod acquisition;
pub mod board;
pub mod buttons;
pub mod channels;
pub mod config;
pub mod conversion;
pub mod error;
pub mod events;
pub mod gpio;
pub mod runtime;
pub mod source;
pub mod synthetic;

// Re-export main public types for convenience
pub use acquisition::{AcquisitionLoop, LoopState};
pub use board::{LinuxI2c, MemoryBus, SmtcBoard};
pub use buttons::DebounceEngine;
pub use channels::{ChannelSet, ChannelTable, Reading, Sweep};
pub use config::{AppConfig, SensorType};
pub use error::{Result, ThermoError};
pub use events::{Event, EventSink};
pub use gpio::{ButtonPin, MemoryPanel};
pub use source::{SourceKind, SourceSelection};
