use std::time::Duration;
use thermologger::buttons::{DebounceEngine, GraceState, MAX_BUTTONS};
use thermologger::config::{DebounceConfig, BUTTON_COUNT};
use thermologger::events::Event;
use thermologger::gpio::{MemoryPanel, MemoryPin};
use thermologger::ThermoError;

/// Four released lines.
fn panel() -> MemoryPanel {
    MemoryPanel::new(BUTTON_COUNT)
}

/// Drives the engine on a 50 ms grid starting at the end of grace.
struct Harness {
    engine: DebounceEngine<MemoryPin>,
    panel: MemoryPanel,
    now: Duration,
    events: Vec<Event>,
}

impl Harness {
    fn new(config: DebounceConfig, panel: MemoryPanel) -> Self {
        Self {
            engine: DebounceEngine::new(config, panel.pins()).unwrap(),
            panel,
            now: Duration::ZERO,
            events: Vec::new(),
        }
    }

    /// Advance past the grace period and take the grace-end sample.
    fn finish_grace(&mut self) {
        self.now = self.engine.config().grace_period();
        self.engine.poll_at(self.now, &mut self.events).unwrap();
    }

    fn set(&mut self, line: usize, low: bool) {
        self.panel.set_low(line, low);
    }

    fn polls(&mut self, count: usize) {
        for _ in 0..count {
            self.now += self.engine.config().poll_interval();
            self.engine.poll_at(self.now, &mut self.events).unwrap();
        }
    }

    fn presses(&self) -> Vec<u8> {
        self.events
            .iter()
            .filter_map(|e| match e {
                Event::ButtonPressed { button } => Some(*button),
                _ => None,
            })
            .collect()
    }
}

fn ready() -> Harness {
    let mut harness = Harness::new(DebounceConfig::default(), panel());
    harness.finish_grace();
    harness
}

#[cfg(test)]
mod press_detection_tests {
    use super::*;

    #[test]
    fn test_short_press_rejected() {
        let mut h = ready();
        h.set(0, true);
        h.polls(3); // 150 ms, below the 200 ms hold
        h.set(0, false);
        h.polls(5);
        assert!(h.presses().is_empty());
    }

    #[test]
    fn test_long_press_fires_once() {
        let mut h = ready();
        h.set(1, true);
        h.polls(3);
        assert!(h.presses().is_empty());
        h.polls(1);
        assert_eq!(h.presses(), vec![2]);

        // Holding longer does not repeat
        h.polls(40);
        assert_eq!(h.presses(), vec![2]);
        assert!(h.engine.line(1).unwrap().triggered);
    }

    #[test]
    fn test_release_rearms_button() {
        let mut h = ready();
        h.set(3, true);
        h.polls(4);
        h.set(3, false);
        h.polls(1);
        assert_eq!(*h.engine.line(3).unwrap(), Default::default());
        h.set(3, true);
        h.polls(4);
        assert_eq!(h.presses(), vec![4, 4]);
    }

    #[test]
    fn test_single_high_sample_resets_progress() {
        let mut h = ready();
        h.set(0, true);
        h.polls(3);
        h.set(0, false);
        h.polls(1);
        h.set(0, true);
        h.polls(3);
        assert!(h.presses().is_empty());
        h.polls(1);
        assert_eq!(h.presses(), vec![1]);
    }

    #[test]
    fn test_sample_count_gate_applies_without_hold() {
        let config = DebounceConfig { consecutive_count: 5, min_hold_ms: 0, ..DebounceConfig::default() };
        let mut h = Harness::new(config, panel());
        h.finish_grace();
        h.set(2, true);
        h.polls(4);
        assert!(h.presses().is_empty());
        h.polls(1);
        assert_eq!(h.presses(), vec![3]);
    }

    #[test]
    fn test_simultaneous_presses_on_two_buttons() {
        let mut h = ready();
        h.set(0, true);
        h.set(2, true);
        h.polls(4);
        assert_eq!(h.presses(), vec![1, 3]);
    }
}

#[cfg(test)]
mod grace_period_tests {
    use super::*;

    #[test]
    fn test_no_presses_during_grace() {
        let mut h = Harness::new(DebounceConfig::default(), panel());
        h.set(0, true);
        // 39 polls at 50 ms stays below 2000 ms
        h.polls(39);
        assert!(h.presses().is_empty());
        assert_eq!(h.engine.grace_state(), GraceState::Active);
    }

    #[test]
    fn test_line_held_through_grace_counts_from_grace_end() {
        let initial = panel();
        initial.press(0);
        let mut h = Harness::new(DebounceConfig::default(), initial);
        h.finish_grace();
        assert_eq!(h.engine.grace_state(), GraceState::Elapsed);
        assert_eq!(h.engine.line(0).unwrap().consecutive_low, 0);

        h.polls(3);
        assert!(h.presses().is_empty());
        h.polls(1);
        assert_eq!(h.presses(), vec![1]);
    }

    #[test]
    fn test_floating_inputs_disable_buttons() {
        let initial = panel();
        initial.set_levels(&[true, true, true, false]);
        let mut h = Harness::new(DebounceConfig::default(), initial);
        h.finish_grace();
        assert_eq!(h.engine.grace_state(), GraceState::Disabled { pressed_lines: 3 });

        // Lines settle, a real press comes in: still ignored
        h.panel.set_levels(&[false, false, false, true]);
        h.polls(200);
        assert!(h.presses().is_empty());
    }

    #[test]
    fn test_all_lines_low_disables_buttons() {
        let initial = panel();
        initial.set_levels(&[true; BUTTON_COUNT]);
        let mut h = Harness::new(DebounceConfig::default(), initial);
        h.finish_grace();
        assert!(matches!(h.engine.grace_state(), GraceState::Disabled { pressed_lines: 4 }));
    }
}

#[cfg(test)]
mod gpio_failure_tests {
    use super::*;

    #[test]
    fn test_read_error_is_returned() {
        let mut h = ready();
        h.panel.break_line(2);
        let result = h.engine.poll_at(h.now + Duration::from_millis(50), &mut h.events);
        match result {
            Err(err @ ThermoError::Gpio { line: 2, .. }) => {
                assert!(err.to_string().starts_with("Button line 2 read failed"));
            }
            other => panic!("expected a GPIO error on line 2, got {:?}", other),
        }
    }

    #[test]
    fn test_read_error_at_grace_end_is_returned() {
        let lines = panel();
        lines.break_line(0);
        let mut engine = DebounceEngine::new(DebounceConfig::default(), lines.pins()).unwrap();
        let mut events = Vec::new();
        assert!(matches!(
            engine.poll_at(Duration::from_secs(3), &mut events),
            Err(ThermoError::Gpio { line: 0, .. })
        ));
    }
}

#[cfg(test)]
mod construction_tests {
    use super::*;

    #[test]
    fn test_ninth_line_rejected() {
        let wide = MemoryPanel::new(MAX_BUTTONS + 1);
        match DebounceEngine::new(DebounceConfig::default(), wide.pins()) {
            Err(ThermoError::Config(message)) => assert!(message.contains("8")),
            Err(other) => panic!("unexpected error {:?}", other),
            Ok(_) => panic!("engine accepted {} lines", MAX_BUTTONS + 1),
        }
    }

    #[test]
    fn test_one_state_per_pin() {
        let engine = DebounceEngine::new(DebounceConfig::default(), panel().pins()).unwrap();
        assert_eq!(engine.line_count(), BUTTON_COUNT);
        assert!(engine.line(BUTTON_COUNT - 1).is_some());
        assert!(engine.line(BUTTON_COUNT).is_none());
    }
}
