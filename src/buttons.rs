//! Debounce engine for the four front-panel buttons.
//!
//! Buttons are active-low: a line reading LOW is pressed. A press is
//! reported once, on the poll where the line has been LOW for at least
//! `consecutive_count` samples *and* `min_hold`; it cannot fire again until
//! the line has gone HIGH. Any HIGH sample clears all progress.
//!
//! Nothing is reported during the startup grace period. When it ends every
//! line is sampled once, and if most of them read LOW together the inputs
//! are treated as floating and the buttons stay disabled for the run.
//!
//! The engine polls any [`embedded_hal::digital::InputPin`]; pin `i` is
//! logical button `i + 1`.

use crate::config::DebounceConfig;
use crate::error::{Result, ThermoError};
use crate::events::{Event, EventSink};
use embedded_hal::digital::InputPin;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::{debug, error, info};

pub const MAX_BUTTONS: usize = 8;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ButtonLine {
    pub consecutive_low: u32,
    pub held: Duration,
    pub triggered: bool,
}

impl ButtonLine {
    fn reset(&mut self) {
        *self = Self::default();
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GraceState {
    Active,
    Elapsed,
    /// Too many lines read LOW at the end of grace.
    Disabled { pressed_lines: usize },
}

pub struct DebounceEngine<P: InputPin> {
    config: DebounceConfig,
    pins: heapless::Vec<P, MAX_BUTTONS>,
    lines: heapless::Vec<ButtonLine, MAX_BUTTONS>,
    grace: GraceState,
    started: Instant,
}

fn read_low<P: InputPin>(pin: &mut P, line: usize) -> Result<bool> {
    pin.is_low().map_err(|e| ThermoError::Gpio { line, reason: format!("{:?}", e) })
}

impl<P: InputPin> DebounceEngine<P> {
    /// Take ownership of the button pins. More than [`MAX_BUTTONS`] is rejected.
    pub fn new(config: DebounceConfig, pins: impl IntoIterator<Item = P>) -> Result<Self> {
        let mut owned: heapless::Vec<P, MAX_BUTTONS> = heapless::Vec::new();
        for pin in pins {
            if owned.push(pin).is_err() {
                return Err(ThermoError::Config(format!(
                    "at most {} button lines are supported",
                    MAX_BUTTONS
                )));
            }
        }
        let lines = owned.iter().map(|_| ButtonLine::default()).collect();
        Ok(Self {
            config,
            pins: owned,
            lines,
            grace: GraceState::Active,
            started: Instant::now(),
        })
    }

    pub fn config(&self) -> &DebounceConfig {
        &self.config
    }

    pub fn grace_state(&self) -> GraceState {
        self.grace
    }

    pub fn line(&self, line: usize) -> Option<&ButtonLine> {
        self.lines.get(line)
    }

    pub fn line_count(&self) -> usize {
        self.lines.len()
    }

    pub fn pin_mut(&mut self, line: usize) -> Option<&mut P> {
        self.pins.get_mut(line)
    }

    /// Poll using wall time since construction.
    pub fn poll(&mut self, sink: &mut impl EventSink) -> Result<usize> {
        let elapsed = self.started.elapsed();
        self.poll_at(elapsed, sink)
    }

    /// Poll with an explicit time since construction.
    ///
    /// Returns the number of presses reported. A read error aborts the poll
    /// and is returned to the caller.
    pub fn poll_at(&mut self, elapsed: Duration, sink: &mut impl EventSink) -> Result<usize> {
        match self.grace {
            GraceState::Disabled { .. } => return Ok(0),
            GraceState::Active => {
                if elapsed < self.config.grace_period() {
                    return Ok(0);
                }
                self.end_grace()?;
                return Ok(0);
            }
            GraceState::Elapsed => {}
        }

        let poll_interval = self.config.poll_interval();
        let mut fired = 0;
        for (i, (pin, line)) in self.pins.iter_mut().zip(self.lines.iter_mut()).enumerate() {
            if !read_low(pin, i)? {
                line.reset();
                continue;
            }

            line.consecutive_low = line.consecutive_low.saturating_add(1);
            line.held += poll_interval;
            if !line.triggered
                && line.consecutive_low >= self.config.consecutive_count
                && line.held >= self.config.min_hold()
            {
                line.triggered = true;
                let button = i as u8 + 1;
                info!(target: "gpio", "Button {} pressed", button);
                sink.emit(Event::ButtonPressed { button });
                fired += 1;
            }
        }
        Ok(fired)
    }

    fn end_grace(&mut self) -> Result<()> {
        let mut pressed_lines = 0;
        for (i, pin) in self.pins.iter_mut().enumerate() {
            if read_low(pin, i)? {
                pressed_lines += 1;
            }
        }

        // Three of four (or more) LOW together means floating inputs
        let count = self.lines.len();
        if count > 0 && pressed_lines * 4 >= count * 3 {
            error!(
                target: "gpio",
                "{} of {} buttons read pressed after grace period, inputs look floating; buttons disabled",
                pressed_lines,
                count
            );
            self.grace = GraceState::Disabled { pressed_lines };
        } else {
            debug!(target: "gpio", "Grace period over, {} of {} lines low", pressed_lines, count);
            self.grace = GraceState::Elapsed;
        }
        Ok(())
    }
}
