//! Synthetic thermocouple readings for running without the card.
//!
//! Each channel follows its own smooth, time-correlated curve around a
//! per-channel baseline so the channels stay visually distinct. The
//! millivolt reading is always zero and nothing is ever reported unplugged:
//! connectivity only exists on real hardware.

use crate::board::validate_channel;
use crate::channels::ChannelSet;
use crate::config::{NoiseMethod, CHANNEL_COUNT};
use crate::error::Result;
use crate::source::{SourceKind, ThermocoupleSource};
use std::time::Instant;

const BASE_TEMP_C: f64 = 20.0;
const CHANNEL_OFFSET_C: f64 = 2.0;

const PERLIN_AMPLITUDE_C: f64 = 10.0;
/// Lattice cells per second; one cell every 50 s keeps the drift slow.
const PERLIN_TIME_SCALE: f64 = 0.02;

const SINE_AMPLITUDE_C: f64 = 2.5;
const SINE_PERIOD_DIVISOR_S: f64 = 15.0;
const SINE_PHASE_STEP: f64 = 0.6;

/// One-dimensional gradient noise with a fixed seed.
#[derive(Debug, Clone, Copy)]
struct GradientNoise {
    seed: u64,
}

impl GradientNoise {
    fn new(seed: u64) -> Self {
        Self { seed }
    }

    /// Pseudo-random gradient in [-1, 1] for an integer lattice point.
    fn gradient(&self, lattice: i64) -> f64 {
        // MMIX LCG step, then the murmur3 64-bit finalizer
        let mut z = (self.seed ^ lattice as u64)
            .wrapping_mul(6_364_136_223_846_793_005)
            .wrapping_add(1_442_695_040_888_963_407);
        z ^= z >> 33;
        z = z.wrapping_mul(0xff51_afd7_ed55_8ccd);
        z ^= z >> 33;
        let unit = (z >> 11) as f64 / (1u64 << 53) as f64;
        unit * 2.0 - 1.0
    }

    fn fade(t: f64) -> f64 {
        t * t * t * (t * (t * 6.0 - 15.0) + 10.0)
    }

    /// Noise value in roughly [-0.5, 0.5], continuous in `x`.
    fn sample(&self, x: f64) -> f64 {
        let x0 = x.floor();
        let t = x - x0;
        let cell = x0 as i64;
        let d0 = self.gradient(cell) * t;
        let d1 = self.gradient(cell + 1) * (t - 1.0);
        d0 + Self::fade(t) * (d1 - d0)
    }
}

#[derive(Debug, Clone)]
pub struct SyntheticSource {
    method: NoiseMethod,
    noise: [GradientNoise; CHANNEL_COUNT],
    started: Instant,
}

impl SyntheticSource {
    pub fn new(method: NoiseMethod) -> Self {
        let mut noise = [GradientNoise::new(0); CHANNEL_COUNT];
        for (ch, generator) in noise.iter_mut().enumerate() {
            *generator = GradientNoise::new(ch as u64);
        }
        Self { method, noise, started: Instant::now() }
    }

    pub fn method(&self) -> NoiseMethod {
        self.method
    }

    pub fn baseline(channel: u8) -> f64 {
        BASE_TEMP_C + f64::from(channel.saturating_sub(1)) * CHANNEL_OFFSET_C
    }

    /// Temperature of `channel` at `elapsed_s` seconds into the run, rounded to 0.1 °C.
    pub fn temperature_at(&self, channel: u8, elapsed_s: f64) -> Result<f64> {
        let channel = validate_channel(channel)?;
        let index = usize::from(channel - 1);
        let base = Self::baseline(channel);
        let temp = match self.method {
            NoiseMethod::Perlin => {
                base + PERLIN_AMPLITUDE_C * self.noise[index].sample(elapsed_s * PERLIN_TIME_SCALE)
            }
            NoiseMethod::Sine => {
                let phase = index as f64 * SINE_PHASE_STEP;
                base + SINE_AMPLITUDE_C * (elapsed_s / SINE_PERIOD_DIVISOR_S + phase).sin()
            }
        };
        Ok((temp * 10.0).round() / 10.0)
    }
}

impl ThermocoupleSource for SyntheticSource {
    fn kind(&self) -> SourceKind {
        SourceKind::Synthetic
    }

    fn temperature(&self, channel: u8) -> Result<f64> {
        self.temperature_at(channel, self.started.elapsed().as_secs_f64())
    }

    fn millivolts(&self, channel: u8) -> Result<f64> {
        validate_channel(channel)?;
        Ok(0.0)
    }

    fn scan_unplugged(&self) -> ChannelSet {
        ChannelSet::new()
    }
}
