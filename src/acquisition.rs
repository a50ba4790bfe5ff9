//! Periodic sweep of all eight channels plus connectivity tracking.
//!
//! [`AcquisitionLoop`] is synchronous and owns no timer: the runtime calls
//! [`tick`](AcquisitionLoop::tick) once per interval. That keeps every
//! behaviour here reproducible from a test without sleeping.

use crate::board::{BusOpener, LinuxI2c};
use crate::channels::{ChannelSet, ChannelTable, ConnectivityDiff, Sweep};
use crate::config::{AcquisitionConfig, AppConfig, SensorType, CHANNEL_COUNT};
use crate::error::{Result, ThermoError};
use crate::events::{Event, EventSink};
use crate::source::{ActiveSource, SourceKind, SourceSelection, ThermocoupleSource};
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LoopState {
    Init,
    Running,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AcquisitionStats {
    pub sweeps: u64,
    pub read_errors: u64,
    pub checks: u64,
    pub connectivity_changes: u64,
}

pub struct AcquisitionLoop<B: BusOpener = LinuxI2c> {
    config: AcquisitionConfig,
    source: ActiveSource<B>,
    fallback_reason: Option<String>,
    channels: ChannelTable,
    unplugged: ChannelSet,
    ticks_since_check: u32,
    state: LoopState,
    stats: AcquisitionStats,
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

impl<B: BusOpener> AcquisitionLoop<B> {
    /// Build around an already selected source.
    ///
    /// On hardware the configured sensor type of every channel is written
    /// to the card here; a failed write is logged and the channel keeps
    /// whatever type the card already had.
    pub fn new(config: AcquisitionConfig, channels: ChannelTable, selection: SourceSelection<B>) -> Self {
        if let ActiveSource::Hardware(board) = &selection.source {
            for channel in channels.iter() {
                if let Err(e) = board.write_sensor_type(channel.number(), channel.sensor_type) {
                    error!(target: "hardware", "Failed to set CH{} type: {}", channel.number(), e);
                }
            }
        }

        Self {
            config,
            source: selection.source,
            fallback_reason: selection.fallback_reason,
            channels,
            unplugged: ChannelSet::new(),
            ticks_since_check: 0,
            state: LoopState::Init,
            stats: AcquisitionStats::default(),
        }
    }

    /// Probe the card on `bus` and build the loop from application config.
    pub fn detect(config: &AppConfig, bus: B) -> Self {
        let selection = SourceSelection::detect(bus, config.board.stack, config.acquisition.synthetic_method);
        Self::new(config.acquisition, ChannelTable::from_config(config), selection)
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    pub fn source_kind(&self) -> SourceKind {
        self.source.kind()
    }

    pub fn source(&self) -> &ActiveSource<B> {
        &self.source
    }

    pub fn fallback_reason(&self) -> Option<&str> {
        self.fallback_reason.as_deref()
    }

    pub fn channels(&self) -> &ChannelTable {
        &self.channels
    }

    /// Channels unplugged as of the last connectivity check.
    pub fn unplugged(&self) -> &ChannelSet {
        &self.unplugged
    }

    pub fn stats(&self) -> AcquisitionStats {
        self.stats
    }

    pub fn config(&self) -> &AcquisitionConfig {
        &self.config
    }

    /// Announce the source and, on hardware, establish the initial
    /// unplugged set. Calling it again once running has no effect.
    pub fn start(&mut self, sink: &mut impl EventSink) {
        if self.state == LoopState::Running {
            return;
        }
        self.state = LoopState::Running;

        let source = self.source.kind();
        info!("Acquisition started with {} source", source);
        sink.emit(Event::SourceSelected {
            source,
            fallback_reason: self.fallback_reason.clone(),
        });

        let synthetic_method = match &self.source {
            ActiveSource::Hardware(_) => None,
            ActiveSource::Synthetic(synthetic) => Some(synthetic.method()),
        };
        match synthetic_method {
            None => self.check_connectivity(sink),
            Some(method) => sink.emit(Event::SourceInfo {
                message: format!("Using synthetic data ({})", method.description()),
            }),
        }
    }

    /// Read every channel once. A channel that fails is NaN in the sweep
    /// and gets its own `ReadingError`; the other channels are unaffected.
    pub fn sweep(&mut self, sink: &mut impl EventSink) -> Sweep {
        let mut values = [f64::NAN; CHANNEL_COUNT];
        for (i, value) in values.iter_mut().enumerate() {
            let channel = i as u8 + 1;
            match self.source.temperature(channel) {
                Ok(celsius) => *value = celsius,
                Err(e) => {
                    warn!(target: "reading", "Error reading CH{}: {}", channel, e);
                    self.stats.read_errors += 1;
                    sink.emit(Event::ReadingError { channel, message: e.to_string() });
                }
            }
        }

        self.stats.sweeps += 1;
        Sweep {
            sequence: self.stats.sweeps,
            timestamp_ms: now_ms(),
            values,
        }
    }

    /// One interval: sweep, publish, and run the periodic connectivity
    /// check on hardware every `check_every` ticks.
    pub fn tick(&mut self, sink: &mut impl EventSink) -> Sweep {
        if self.state == LoopState::Init {
            self.start(sink);
        }

        let sweep = self.sweep(sink);
        sink.emit(Event::ReadingsReady { sweep });

        if self.source.kind() == SourceKind::Hardware {
            self.ticks_since_check += 1;
            if self.ticks_since_check >= self.config.check_every() {
                self.ticks_since_check = 0;
                self.check_connectivity(sink);
            }
        }
        sweep
    }

    /// Rescan for unplugged channels and publish the difference.
    ///
    /// `ConnectivityChanged` is only sent when the set changed;
    /// `CheckComplete` is always sent last. The synthetic source never
    /// reports anything unplugged, so there this only completes.
    pub fn check_connectivity(&mut self, sink: &mut impl EventSink) {
        self.stats.checks += 1;
        let current = self.source.scan_unplugged();
        let diff = ConnectivityDiff::between(&self.unplugged, &current);

        if !diff.is_empty() {
            for channel in &diff.connected {
                info!(target: "hardware", "CH{} connected", channel);
            }
            for channel in &diff.disconnected {
                warn!(target: "hardware", "CH{} unplugged", channel);
            }
            self.stats.connectivity_changes += 1;
            self.channels.apply_unplugged(&current);
            self.unplugged = current.clone();
            sink.emit(Event::ConnectivityChanged {
                unplugged: current,
                connected: diff.connected,
                disconnected: diff.disconnected,
            });
        } else {
            debug!(target: "hardware", "Connectivity unchanged, unplugged: {:?}", self.unplugged);
        }

        sink.emit(Event::CheckComplete);
    }

    /// Reconfigure one channel's thermocouple type on the card.
    pub fn write_sensor_type(&mut self, channel: u8, sensor_type: SensorType) -> Result<()> {
        let board = self
            .source
            .board()
            .ok_or_else(|| ThermoError::HardwareUnavailable("no card to configure".into()))?;
        board.write_sensor_type(channel, sensor_type)?;
        self.channels.set_sensor_type(channel, sensor_type);
        Ok(())
    }
}
