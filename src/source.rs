//! The one thermocouple source chosen at startup.
//!
//! Selection happens exactly once: the card is probed and, if that fails for
//! any reason, the synthetic source takes over for the rest of the run. The
//! probe result is an explicit [`SourceSelection`] rather than a flag, so the
//! acquisition loop can tell the user why it is not on real hardware.

use crate::board::{BusOpener, SmtcBoard};
use crate::channels::ChannelSet;
use crate::config::{NoiseMethod, CHANNEL_COUNT};
use crate::error::Result;
use crate::synthetic::SyntheticSource;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Hardware,
    Synthetic,
}

impl core::fmt::Display for SourceKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            SourceKind::Hardware => write!(f, "hardware"),
            SourceKind::Synthetic => write!(f, "synthetic"),
        }
    }
}

/// Anything that can produce per-channel thermocouple readings.
pub trait ThermocoupleSource {
    fn kind(&self) -> SourceKind;

    /// Compensated temperature of `channel` (1..=8), °C.
    fn temperature(&self, channel: u8) -> Result<f64>;

    /// Raw junction voltage of `channel` (1..=8), mV.
    fn millivolts(&self, channel: u8) -> Result<f64>;

    /// Channels whose voltage reads exactly 0.0 mV, ascending.
    ///
    /// A channel whose read fails is logged and left out of the set; a
    /// transient bus error is not evidence of an open thermocouple.
    fn scan_unplugged(&self) -> ChannelSet {
        // At most CHANNEL_COUNT items, which is the set's capacity
        (1..=CHANNEL_COUNT as u8)
            .filter(|&channel| match self.millivolts(channel) {
                // Exact comparison: an open junction reads a hard zero
                Ok(mv) => mv == 0.0,
                Err(e) => {
                    warn!(target: "hardware", "Connectivity check CH{}: {}", channel, e);
                    false
                }
            })
            .collect()
    }
}

impl<B: BusOpener> ThermocoupleSource for SmtcBoard<B> {
    fn kind(&self) -> SourceKind {
        SourceKind::Hardware
    }

    fn temperature(&self, channel: u8) -> Result<f64> {
        self.read_temperature(channel)
    }

    fn millivolts(&self, channel: u8) -> Result<f64> {
        self.read_millivolts(channel)
    }
}

#[derive(Debug)]
pub enum ActiveSource<B: BusOpener> {
    Hardware(SmtcBoard<B>),
    Synthetic(SyntheticSource),
}

impl<B: BusOpener> ActiveSource<B> {
    pub fn board(&self) -> Option<&SmtcBoard<B>> {
        match self {
            ActiveSource::Hardware(board) => Some(board),
            ActiveSource::Synthetic(_) => None,
        }
    }

    fn as_source(&self) -> &dyn ThermocoupleSource {
        match self {
            ActiveSource::Hardware(board) => board,
            ActiveSource::Synthetic(synthetic) => synthetic,
        }
    }
}

impl<B: BusOpener> ThermocoupleSource for ActiveSource<B> {
    fn kind(&self) -> SourceKind {
        self.as_source().kind()
    }

    fn temperature(&self, channel: u8) -> Result<f64> {
        self.as_source().temperature(channel)
    }

    fn millivolts(&self, channel: u8) -> Result<f64> {
        self.as_source().millivolts(channel)
    }

    fn scan_unplugged(&self) -> ChannelSet {
        self.as_source().scan_unplugged()
    }
}

/// Outcome of the startup probe.
#[derive(Debug)]
pub struct SourceSelection<B: BusOpener> {
    pub source: ActiveSource<B>,
    /// Why hardware was not used; `None` when it was.
    pub fallback_reason: Option<String>,
}

impl<B: BusOpener> SourceSelection<B> {
    /// Probe the card on `bus` at `stack`, falling back to synthetic data.
    pub fn detect(bus: B, stack: u8, method: NoiseMethod) -> Self {
        match SmtcBoard::probe(bus, stack) {
            Ok(board) => {
                info!(target: "hardware", "Using hardware source (card rev {})", board.revision());
                Self { source: ActiveSource::Hardware(board), fallback_reason: None }
            }
            Err(e) => {
                warn!(target: "hardware", "SM-TC card unavailable, using synthetic data: {}", e);
                Self::synthetic(method, Some(e.to_string()))
            }
        }
    }

    pub fn synthetic(method: NoiseMethod, fallback_reason: Option<String>) -> Self {
        debug!("Synthetic source using {}", method.description());
        Self {
            source: ActiveSource::Synthetic(SyntheticSource::new(method)),
            fallback_reason,
        }
    }
}
