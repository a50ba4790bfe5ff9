//! Channel table and the records produced by one acquisition sweep.

use crate::config::{AppConfig, SensorType, CHANNEL_COUNT};
use serde::{Deserialize, Serialize};

/// Set of 1-based channel numbers, kept in ascending order.
pub type ChannelSet = heapless::Vec<u8, CHANNEL_COUNT>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Channel {
    /// Zero-based position; the board and all events use `number()`.
    pub index: usize,
    pub sensor_type: SensorType,
    pub enabled: bool,
    /// Cleared while the last connectivity check saw 0.0 mV.
    pub plugged: bool,
}

impl Channel {
    pub fn number(&self) -> u8 {
        self.index as u8 + 1
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelTable {
    channels: [Channel; CHANNEL_COUNT],
}

impl ChannelTable {
    pub fn from_config(config: &AppConfig) -> Self {
        let mut channels = [Channel {
            index: 0,
            sensor_type: SensorType::default(),
            enabled: true,
            plugged: true,
        }; CHANNEL_COUNT];
        for (index, channel) in channels.iter_mut().enumerate() {
            channel.index = index;
            channel.sensor_type = config.channel_type(index);
            channel.enabled = config.is_channel_enabled(index);
        }
        Self { channels }
    }

    pub fn iter(&self) -> impl Iterator<Item = &Channel> {
        self.channels.iter()
    }

    /// Look up by 1-based channel number.
    pub fn get(&self, number: u8) -> Option<&Channel> {
        usize::from(number).checked_sub(1).and_then(|i| self.channels.get(i))
    }

    pub fn set_sensor_type(&mut self, number: u8, sensor_type: SensorType) -> bool {
        match usize::from(number).checked_sub(1).and_then(|i| self.channels.get_mut(i)) {
            Some(channel) => {
                channel.sensor_type = sensor_type;
                true
            }
            None => false,
        }
    }

    pub fn apply_unplugged(&mut self, unplugged: &ChannelSet) {
        for channel in self.channels.iter_mut() {
            channel.plugged = !unplugged.contains(&channel.number());
        }
    }

    pub fn unplugged(&self) -> ChannelSet {
        self.channels
            .iter()
            .filter(|c| !c.plugged)
            .map(Channel::number)
            .collect()
    }
}

/// A single channel value from a sweep.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    pub channel: u8,
    /// °C, or NaN when the channel could not be read.
    pub value: f64,
    pub timestamp_ms: u64,
}

impl Reading {
    pub fn is_valid(&self) -> bool {
        self.value.is_finite()
    }
}

/// One value per channel, in channel order, taken in a single tick.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sweep {
    pub sequence: u64,
    pub timestamp_ms: u64,
    pub values: [f64; CHANNEL_COUNT],
}

impl Sweep {
    pub fn readings(&self) -> impl Iterator<Item = Reading> + '_ {
        self.values.iter().enumerate().map(move |(i, &value)| Reading {
            channel: i as u8 + 1,
            value,
            timestamp_ms: self.timestamp_ms,
        })
    }

    pub fn valid_count(&self) -> usize {
        self.values.iter().filter(|v| v.is_finite()).count()
    }

    /// Value for 1-based `channel`.
    pub fn value(&self, channel: u8) -> Option<f64> {
        usize::from(channel).checked_sub(1).and_then(|i| self.values.get(i)).copied()
    }
}

/// Difference between two consecutive unplugged sets.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectivityDiff {
    /// Previously unplugged, now reading a voltage.
    pub connected: ChannelSet,
    /// Newly reading exactly zero.
    pub disconnected: ChannelSet,
}

impl ConnectivityDiff {
    pub fn between(previous: &ChannelSet, current: &ChannelSet) -> Self {
        Self {
            connected: previous.iter().copied().filter(|c| !current.contains(c)).collect(),
            disconnected: current.iter().copied().filter(|c| !previous.contains(c)).collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.connected.is_empty() && self.disconnected.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(channels: &[u8]) -> ChannelSet {
        channels.iter().copied().collect()
    }

    #[test]
    fn test_table_follows_config() {
        let mut config = AppConfig::default();
        config.channel_types[2] = SensorType::J;
        config.channel_enabled[7] = false;
        let table = ChannelTable::from_config(&config);
        assert_eq!(table.get(3).unwrap().sensor_type, SensorType::J);
        assert!(!table.get(8).unwrap().enabled);
        assert!(table.get(0).is_none());
        assert!(table.get(9).is_none());
    }

    #[test]
    fn test_apply_unplugged_updates_flags() {
        let mut table = ChannelTable::from_config(&AppConfig::default());
        table.apply_unplugged(&set(&[2, 5]));
        assert_eq!(table.unplugged(), set(&[2, 5]));
        table.apply_unplugged(&set(&[]));
        assert!(table.unplugged().is_empty());
    }

    #[test]
    fn test_diff_between_sets() {
        let diff = ConnectivityDiff::between(&set(&[2, 5]), &set(&[5, 7]));
        assert_eq!(diff.connected, set(&[2]));
        assert_eq!(diff.disconnected, set(&[7]));
        assert!(ConnectivityDiff::between(&set(&[3]), &set(&[3])).is_empty());
    }

    #[test]
    fn test_sweep_readings_are_one_based() {
        let mut values = [0.0; CHANNEL_COUNT];
        values[0] = 21.5;
        values[3] = f64::NAN;
        let sweep = Sweep { sequence: 1, timestamp_ms: 42, values };
        let readings: Vec<Reading> = sweep.readings().collect();
        assert_eq!(readings[0].channel, 1);
        assert_eq!(readings[0].value, 21.5);
        assert!(!readings[3].is_valid());
        assert_eq!(sweep.valid_count(), 7);
        assert_eq!(sweep.value(1), Some(21.5));
    }
}
