//! Button inputs as `embedded-hal` digital pins.
//!
//! On the Pi the lines are claimed from the GPIO character device through
//! `linux-embedded-hal`. The pull-up itself is board wiring; nothing here
//! configures bias. [`MemoryPanel`] provides the same pins in memory.

use crate::error::{Result, ThermoError};
use embedded_hal::digital::{self, ErrorKind, ErrorType, InputPin};
use linux_embedded_hal::gpio_cdev::{Chip, LineRequestFlags};
use linux_embedded_hal::CdevPin;
use std::fmt::Display;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::info;

const CONSUMER: &str = "thermologger";

/// A button input that reads LOW when pressed.
///
/// With `invert` set the raw level is flipped, for pull-down wiring where
/// a pressed button drives the line HIGH.
#[derive(Debug)]
pub struct ButtonPin<P> {
    pin: P,
    invert: bool,
}

impl<P: InputPin> ButtonPin<P> {
    pub fn new(pin: P, invert: bool) -> Self {
        Self { pin, invert }
    }
}

impl<P: InputPin> ErrorType for ButtonPin<P> {
    type Error = P::Error;
}

impl<P: InputPin> InputPin for ButtonPin<P> {
    fn is_high(&mut self) -> core::result::Result<bool, Self::Error> {
        Ok(self.pin.is_high()? != self.invert)
    }

    fn is_low(&mut self) -> core::result::Result<bool, Self::Error> {
        Ok(self.pin.is_low()? != self.invert)
    }
}

fn unavailable(what: impl Display, e: impl Display) -> ThermoError {
    ThermoError::GpioUnavailable(format!("{}: {}", what, e))
}

/// Claim `pins` on `chip` as inputs, in button order.
pub fn open_buttons(chip: &Path, pins: &[u32], invert: bool) -> Result<Vec<ButtonPin<CdevPin>>> {
    let mut gpio = Chip::new(chip).map_err(|e| unavailable(chip.display(), e))?;
    let buttons = pins
        .iter()
        .map(|&offset| {
            let line = gpio.get_line(offset).map_err(|e| unavailable(format!("line {}", offset), e))?;
            let handle = line
                .request(LineRequestFlags::INPUT, 0, CONSUMER)
                .map_err(|e| unavailable(format!("line {}", offset), e))?;
            let pin = CdevPin::new(handle).map_err(|e| unavailable(format!("line {}", offset), e))?;
            Ok(ButtonPin::new(pin, invert))
        })
        .collect::<Result<Vec<_>>>()?;
    info!(target: "gpio", "Button inputs ready on {} lines {:?}", chip.display(), pins);
    Ok(buttons)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryPinError {
    pub line: usize,
}

impl digital::Error for MemoryPinError {
    fn kind(&self) -> ErrorKind {
        ErrorKind::Other
    }
}

#[derive(Debug, Default)]
struct PanelState {
    low: Vec<bool>,
    broken: Vec<bool>,
}

/// Shared in-memory levels for a set of input lines, all HIGH at start.
#[derive(Debug, Clone, Default)]
pub struct MemoryPanel {
    state: Arc<Mutex<PanelState>>,
}

impl MemoryPanel {
    pub fn new(lines: usize) -> Self {
        Self {
            state: Arc::new(Mutex::new(PanelState {
                low: vec![false; lines],
                broken: vec![false; lines],
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, PanelState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn line_count(&self) -> usize {
        self.lock().low.len()
    }

    /// One pin per line, all backed by this panel.
    pub fn pins(&self) -> Vec<MemoryPin> {
        (0..self.line_count())
            .map(|line| MemoryPin { state: Arc::clone(&self.state), line })
            .collect()
    }

    pub fn set_low(&self, line: usize, low: bool) {
        if let Some(level) = self.lock().low.get_mut(line) {
            *level = low;
        }
    }

    pub fn press(&self, line: usize) {
        self.set_low(line, true);
    }

    pub fn release(&self, line: usize) {
        self.set_low(line, false);
    }

    /// Set every line at once; `true` is LOW.
    pub fn set_levels(&self, levels: &[bool]) {
        let mut state = self.lock();
        for (level, &low) in state.low.iter_mut().zip(levels) {
            *level = low;
        }
    }

    /// Reads of `line` fail from now on.
    pub fn break_line(&self, line: usize) {
        if let Some(broken) = self.lock().broken.get_mut(line) {
            *broken = true;
        }
    }
}

#[derive(Debug)]
pub struct MemoryPin {
    state: Arc<Mutex<PanelState>>,
    line: usize,
}

impl ErrorType for MemoryPin {
    type Error = MemoryPinError;
}

impl InputPin for MemoryPin {
    fn is_high(&mut self) -> core::result::Result<bool, Self::Error> {
        self.is_low().map(|low| !low)
    }

    fn is_low(&mut self) -> core::result::Result<bool, Self::Error> {
        let state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if state.broken.get(self.line).copied().unwrap_or(true) {
            return Err(MemoryPinError { line: self.line });
        }
        Ok(state.low[self.line])
    }
}
