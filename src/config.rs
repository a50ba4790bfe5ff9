//! Runtime configuration, loaded once before the tasks start.
//!
//! Everything is defaulted so a missing or partial `settings.json` still
//! yields a usable configuration.

use crate::error::{Result, ThermoError};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::info;

pub const CHANNEL_COUNT: usize = 8;
pub const BUTTON_COUNT: usize = 4;

pub const DEFAULT_INTERVAL_MS: u64 = 1000;
pub const MIN_INTERVAL_MS: u64 = 100;
pub const DEFAULT_CHECK_EVERY: u32 = 10;

/// Thermocouple alloy standard configured on a channel.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SensorType {
    B,
    E,
    J,
    #[default]
    K,
    N,
    R,
    S,
    T,
}

impl SensorType {
    pub const ALL: [SensorType; 8] = [
        SensorType::B,
        SensorType::E,
        SensorType::J,
        SensorType::K,
        SensorType::N,
        SensorType::R,
        SensorType::S,
        SensorType::T,
    ];

    /// Value stored in the board's sensor type register.
    pub fn board_code(self) -> u8 {
        match self {
            SensorType::B => 0,
            SensorType::E => 1,
            SensorType::J => 2,
            SensorType::K => 3,
            SensorType::N => 4,
            SensorType::R => 5,
            SensorType::S => 6,
            SensorType::T => 7,
        }
    }

    pub fn from_board_code(code: u8) -> Result<Self> {
        Self::ALL
            .get(usize::from(code))
            .copied()
            .ok_or(ThermoError::InvalidSensorCode { code })
    }

    pub fn letter(self) -> char {
        match self {
            SensorType::B => 'B',
            SensorType::E => 'E',
            SensorType::J => 'J',
            SensorType::K => 'K',
            SensorType::N => 'N',
            SensorType::R => 'R',
            SensorType::S => 'S',
            SensorType::T => 'T',
        }
    }
}

impl core::fmt::Display for SensorType {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.letter())
    }
}

impl core::str::FromStr for SensorType {
    type Err = ThermoError;

    fn from_str(s: &str) -> Result<Self> {
        let trimmed = s.trim();
        Self::ALL
            .iter()
            .copied()
            .find(|t| trimmed.len() == 1 && trimmed.eq_ignore_ascii_case(&t.letter().to_string()))
            .ok_or_else(|| ThermoError::Config(format!("unknown thermocouple type '{}'", s)))
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NoiseMethod {
    #[default]
    Perlin,
    Sine,
}

impl NoiseMethod {
    pub fn description(self) -> &'static str {
        match self {
            NoiseMethod::Perlin => "Perlin noise",
            NoiseMethod::Sine => "sine wave (fallback)",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BoardConfig {
    pub i2c_bus: u8,
    pub stack: u8,
}

impl Default for BoardConfig {
    fn default() -> Self {
        Self { i2c_bus: 1, stack: 0 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AcquisitionConfig {
    pub interval_ms: u64,
    /// Connectivity check runs every this many ticks.
    pub connectivity_check_every: u32,
    pub synthetic_method: NoiseMethod,
}

impl AcquisitionConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms.max(MIN_INTERVAL_MS))
    }

    pub fn check_every(&self) -> u32 {
        self.connectivity_check_every.max(1)
    }
}

impl Default for AcquisitionConfig {
    fn default() -> Self {
        Self {
            interval_ms: DEFAULT_INTERVAL_MS,
            connectivity_check_every: DEFAULT_CHECK_EVERY,
            synthetic_method: NoiseMethod::default(),
        }
    }
}

/// Debounce parameters. Copied into the engine at construction and never
/// changed afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DebounceConfig {
    pub poll_interval_ms: u64,
    pub consecutive_count: u32,
    pub min_hold_ms: u64,
    pub grace_period_ms: u64,
}

impl DebounceConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }

    pub fn min_hold(&self) -> Duration {
        Duration::from_millis(self.min_hold_ms)
    }

    pub fn grace_period(&self) -> Duration {
        Duration::from_millis(self.grace_period_ms)
    }
}

impl Default for DebounceConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 50,
            consecutive_count: 2,
            min_hold_ms: 200,
            grace_period_ms: 2000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ButtonConfig {
    /// GPIO character device the lines belong to.
    pub chip: String,
    /// BCM line offsets on `chip`, index = logical button - 1.
    pub pins: [u32; BUTTON_COUNT],
    /// Set for pull-down wiring where a pressed button reads HIGH.
    pub invert: bool,
    pub debounce: DebounceConfig,
}

impl Default for ButtonConfig {
    fn default() -> Self {
        Self {
            chip: "/dev/gpiochip0".to_string(),
            // Header pins 16, 13, 15, 31
            pins: [23, 27, 22, 6],
            invert: false,
            debounce: DebounceConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub board: BoardConfig,
    pub acquisition: AcquisitionConfig,
    pub channel_types: Vec<SensorType>,
    pub channel_enabled: Vec<bool>,
    pub buttons: ButtonConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            board: BoardConfig::default(),
            acquisition: AcquisitionConfig::default(),
            channel_types: vec![SensorType::K; CHANNEL_COUNT],
            channel_enabled: vec![true; CHANNEL_COUNT],
            buttons: ButtonConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load from `path`; a missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            info!("Settings file not found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let text = std::fs::read_to_string(path).map_err(|source| ThermoError::ConfigRead {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_json(&text)?;
        info!(
            "Settings loaded from {} (types: {:?}, enabled: {:?})",
            path.display(),
            config.channel_types,
            config.channel_enabled
        );
        Ok(config)
    }

    pub fn from_json(text: &str) -> Result<Self> {
        let mut config: Self = serde_json::from_str(text)?;
        config.normalize();
        config.validate()?;
        Ok(config)
    }

    /// Force both channel lists to exactly [`CHANNEL_COUNT`] entries.
    pub fn normalize(&mut self) {
        self.channel_types.resize(CHANNEL_COUNT, SensorType::default());
        self.channel_enabled.resize(CHANNEL_COUNT, true);
    }

    pub fn validate(&self) -> Result<()> {
        if self.board.stack > 7 {
            return Err(ThermoError::InvalidStack { stack: self.board.stack });
        }
        if self.buttons.debounce.consecutive_count == 0 {
            return Err(ThermoError::Config("debounce.consecutive_count must be at least 1".into()));
        }
        Ok(())
    }

    pub fn channel_type(&self, index: usize) -> SensorType {
        self.channel_types.get(index).copied().unwrap_or_default()
    }

    pub fn is_channel_enabled(&self, index: usize) -> bool {
        self.channel_enabled.get(index).copied().unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_board_codes_round_trip_for_every_type() {
        for t in SensorType::ALL {
            assert_eq!(SensorType::from_board_code(t.board_code()).unwrap(), t);
        }
        assert!(SensorType::from_board_code(8).is_err());
    }

    #[test]
    fn test_sensor_type_parse_is_case_insensitive() {
        assert_eq!("k".parse::<SensorType>().unwrap(), SensorType::K);
        assert_eq!(" T ".parse::<SensorType>().unwrap(), SensorType::T);
        assert!("KK".parse::<SensorType>().is_err());
        assert!("X".parse::<SensorType>().is_err());
    }

    #[test]
    fn test_interval_clamped_to_minimum() {
        let config = AcquisitionConfig { interval_ms: 10, ..AcquisitionConfig::default() };
        assert_eq!(config.interval(), Duration::from_millis(MIN_INTERVAL_MS));
    }
}
