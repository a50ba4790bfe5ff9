use std::time::Duration;
use thermologger::acquisition::AcquisitionLoop;
use thermologger::board::MemoryBus;
use thermologger::buttons::DebounceEngine;
use thermologger::channels::ChannelTable;
use thermologger::config::{AppConfig, DebounceConfig, NoiseMethod, BUTTON_COUNT};
use thermologger::events::Event;
use thermologger::gpio::MemoryPanel;
use thermologger::runtime::{spawn_acquisition, spawn_buttons, STOP_TIMEOUT};
use thermologger::source::{SourceKind, SourceSelection};
use thermologger::ThermoError;
use tokio::sync::mpsc;
use tokio::time;

fn fast_config() -> AppConfig {
    let mut config = AppConfig::default();
    config.acquisition.interval_ms = 100;
    config
}

async fn wait_for<F>(rx: &mut mpsc::UnboundedReceiver<Event>, mut want: F) -> Event
where
    F: FnMut(&Event) -> bool,
{
    time::timeout(Duration::from_secs(3), async {
        loop {
            match rx.recv().await {
                Some(event) if want(&event) => return event,
                Some(_) => continue,
                None => panic!("event channel closed"),
            }
        }
    })
    .await
    .expect("timed out waiting for event")
}

fn quick_debounce() -> DebounceConfig {
    DebounceConfig {
        poll_interval_ms: 10,
        consecutive_count: 2,
        min_hold_ms: 30,
        grace_period_ms: 0,
    }
}

#[cfg(test)]
mod acquisition_task_tests {
    use super::*;

    #[tokio::test]
    async fn test_synthetic_task_streams_sweeps() {
        let config = fast_config();
        let acq = AcquisitionLoop::<MemoryBus>::new(
            config.acquisition,
            ChannelTable::from_config(&config),
            SourceSelection::synthetic(NoiseMethod::Perlin, None),
        );
        let (tx, mut rx) = mpsc::unbounded_channel();
        let handle = spawn_acquisition(acq, tx);

        let first = wait_for(&mut rx, |_| true).await;
        assert_eq!(first, Event::SourceSelected { source: SourceKind::Synthetic, fallback_reason: None });

        for _ in 0..3 {
            match wait_for(&mut rx, |e| matches!(e, Event::ReadingsReady { .. })).await {
                Event::ReadingsReady { sweep } => assert_eq!(sweep.valid_count(), 8),
                other => panic!("unexpected {:?}", other),
            }
        }

        handle.stop(STOP_TIMEOUT).await.unwrap();
    }

    #[tokio::test]
    async fn test_recheck_request_completes() {
        let bus = MemoryBus::populated();
        let mut config = fast_config();
        config.acquisition.interval_ms = 1000;
        let acq = AcquisitionLoop::detect(&config, bus.clone());
        let (tx, mut rx) = mpsc::unbounded_channel();
        let handle = spawn_acquisition(acq, tx);

        // Initial check at start
        wait_for(&mut rx, |e| *e == Event::CheckComplete).await;

        bus.unplug(6);
        handle.request_recheck();
        let change = wait_for(&mut rx, |e| matches!(e, Event::ConnectivityChanged { .. })).await;
        assert!(matches!(change, Event::ConnectivityChanged { unplugged, .. } if unplugged.as_slice() == [6]));
        wait_for(&mut rx, |e| *e == Event::CheckComplete).await;

        handle.stop(STOP_TIMEOUT).await.unwrap();
    }

    #[tokio::test]
    async fn test_stop_closes_event_stream() {
        let acq = AcquisitionLoop::detect(&fast_config(), MemoryBus::populated());
        let (tx, mut rx) = mpsc::unbounded_channel();
        let handle = spawn_acquisition(acq, tx);
        wait_for(&mut rx, |e| matches!(e, Event::ReadingsReady { .. })).await;

        handle.stop(Duration::from_millis(500)).await.unwrap();

        // Task dropped its sender; draining ends
        let drained = time::timeout(Duration::from_secs(1), async {
            while rx.recv().await.is_some() {}
        })
        .await;
        assert!(drained.is_ok());
    }
}

#[cfg(test)]
mod button_task_tests {
    use super::*;

    #[tokio::test]
    async fn test_press_reaches_consumer() {
        let panel = MemoryPanel::new(BUTTON_COUNT);
        let engine = DebounceEngine::new(quick_debounce(), panel.pins()).unwrap();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let handle = spawn_buttons(engine, tx);

        time::sleep(Duration::from_millis(50)).await;
        panel.press(1);

        let event = wait_for(&mut rx, |e| matches!(e, Event::ButtonPressed { .. })).await;
        assert_eq!(event, Event::ButtonPressed { button: 2 });

        handle.stop(STOP_TIMEOUT).await.unwrap();
    }

    #[tokio::test]
    async fn test_gpio_error_ends_task() {
        let panel = MemoryPanel::new(BUTTON_COUNT);
        for line in 0..BUTTON_COUNT {
            panel.break_line(line);
        }
        let engine = DebounceEngine::new(quick_debounce(), panel.pins()).unwrap();
        let (tx, _rx) = mpsc::unbounded_channel::<Event>();
        let handle = spawn_buttons(engine, tx);

        time::timeout(Duration::from_secs(2), async {
            while !handle.is_finished() {
                time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("button task kept running");

        assert!(matches!(handle.stop(STOP_TIMEOUT).await, Err(ThermoError::Gpio { .. })));
    }
}
