//! Tokio tasks driving the acquisition loop and the button poller.
//!
//! Each task owns its engine outright; the only shared state is the event
//! channel and the stop/control channels held by the returned handle.

use crate::acquisition::AcquisitionLoop;
use crate::board::BusOpener;
use crate::buttons::DebounceEngine;
use crate::error::{Result, ThermoError};
use crate::events::EventSink;
use embedded_hal::digital::InputPin;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, error, info, warn};

/// Default wait for a task to wind down after a stop request.
pub const STOP_TIMEOUT: Duration = Duration::from_millis(1000);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Control {
    Recheck,
}

pub struct AcquisitionHandle {
    stop_tx: watch::Sender<bool>,
    control_tx: mpsc::UnboundedSender<Control>,
    join: JoinHandle<()>,
}

impl AcquisitionHandle {
    /// Ask for a connectivity check outside the periodic schedule.
    /// The task answers with `CheckComplete` when done.
    pub fn request_recheck(&self) {
        if self.control_tx.send(Control::Recheck).is_err() {
            debug!("Acquisition task already gone, recheck dropped");
        }
    }

    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }

    /// Signal the task to stop and wait up to `timeout` for it.
    pub async fn stop(self, timeout: Duration) -> Result<()> {
        let _ = self.stop_tx.send(true);
        join_with_timeout("acquisition", self.join, timeout).await
    }
}

/// Start the acquisition loop on the current runtime.
///
/// The first sweep happens immediately; later ones follow the configured
/// interval. A slow sweep delays the next tick rather than bursting.
pub fn spawn_acquisition<B, S>(mut acquisition: AcquisitionLoop<B>, mut sink: S) -> AcquisitionHandle
where
    B: BusOpener + Send + 'static,
    S: EventSink + Send + 'static,
{
    let (stop_tx, mut stop_rx) = watch::channel(false);
    let (control_tx, mut control_rx) = mpsc::unbounded_channel();
    let period = acquisition.config().interval();

    let join = tokio::spawn(async move {
        acquisition.start(&mut sink);

        let mut interval = time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = stop_rx.changed() => break,
                Some(control) = control_rx.recv() => match control {
                    Control::Recheck => acquisition.check_connectivity(&mut sink),
                },
                _ = interval.tick() => {
                    acquisition.tick(&mut sink);
                }
            }
        }

        let stats = acquisition.stats();
        info!(
            "Acquisition stopped after {} sweeps ({} read errors, {} checks)",
            stats.sweeps, stats.read_errors, stats.checks
        );
    });

    AcquisitionHandle { stop_tx, control_tx, join }
}

pub struct ButtonHandle {
    stop_tx: watch::Sender<bool>,
    join: JoinHandle<Result<()>>,
}

impl ButtonHandle {
    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }

    /// Stop polling. A GPIO error that ended the task early is returned here.
    pub async fn stop(self, timeout: Duration) -> Result<()> {
        let _ = self.stop_tx.send(true);
        match time::timeout(timeout, self.join).await {
            Ok(Ok(result)) => result,
            Ok(Err(e)) => Err(ThermoError::TaskFailed { task: "button", reason: e.to_string() }),
            Err(_) => {
                warn!(target: "gpio", "Button task did not stop within {:?}", timeout);
                Err(ThermoError::StopTimeout { task: "button", timeout_ms: timeout.as_millis() as u64 })
            }
        }
    }
}

/// Start polling buttons every `poll_interval`.
///
/// A read failure ends the task and is logged on the `gpio` target.
pub fn spawn_buttons<P, S>(mut engine: DebounceEngine<P>, mut sink: S) -> ButtonHandle
where
    P: InputPin + Send + 'static,
    S: EventSink + Send + 'static,
{
    let (stop_tx, mut stop_rx) = watch::channel(false);
    let period = engine.config().poll_interval();

    let join = tokio::spawn(async move {
        let mut interval = time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        debug!(target: "gpio", "Button polling every {:?}", period);

        loop {
            tokio::select! {
                biased;
                _ = stop_rx.changed() => break,
                _ = interval.tick() => {
                    if let Err(e) = engine.poll(&mut sink) {
                        error!(target: "gpio", "Button polling stopped: {}", e);
                        return Err(e);
                    }
                }
            }
        }
        Ok(())
    });

    ButtonHandle { stop_tx, join }
}

async fn join_with_timeout(task: &'static str, join: JoinHandle<()>, timeout: Duration) -> Result<()> {
    match time::timeout(timeout, join).await {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) => {
            error!("{} task failed: {}", task, e);
            Err(ThermoError::TaskFailed { task, reason: e.to_string() })
        }
        Err(_) => {
            warn!("{} task did not stop within {:?}", task, timeout);
            Err(ThermoError::StopTimeout { task, timeout_ms: timeout.as_millis() as u64 })
        }
    }
}
