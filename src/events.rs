//! Notifications published by the acquisition and button tasks.
//!
//! Producers only know about [`EventSink`]; the CLI hands them the sending
//! half of a tokio channel, tests hand them a `Vec<Event>`.

use crate::channels::{ChannelSet, Sweep};
use crate::source::SourceKind;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::trace;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum Event {
    /// Emitted once when acquisition starts.
    SourceSelected {
        source: SourceKind,
        fallback_reason: Option<String>,
    },
    /// Informational message about the active source.
    SourceInfo { message: String },
    ReadingsReady { sweep: Sweep },
    /// One channel failed during a sweep; its value in the sweep is NaN.
    ReadingError { channel: u8, message: String },
    /// Only emitted when the unplugged set differs from the previous check.
    ConnectivityChanged {
        unplugged: ChannelSet,
        connected: ChannelSet,
        disconnected: ChannelSet,
    },
    /// Ends every connectivity check, changed or not.
    CheckComplete,
    /// Logical button number, 1..=4.
    ButtonPressed { button: u8 },
}

pub trait EventSink {
    fn emit(&mut self, event: Event);
}

impl EventSink for Vec<Event> {
    fn emit(&mut self, event: Event) {
        self.push(event);
    }
}

impl EventSink for mpsc::UnboundedSender<Event> {
    fn emit(&mut self, event: Event) {
        if self.send(event).is_err() {
            trace!("Event receiver dropped, discarding event");
        }
    }
}
