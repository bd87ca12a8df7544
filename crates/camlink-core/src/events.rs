//! Renewal events and sinks.

use std::{
    collections::VecDeque,
    sync::{PoisonError, RwLock},
};

use chrono::{DateTime, Utc};
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;

use crate::ApiError;

/// Default number of events kept for late subscribers.
const HISTORY_EVENTS: usize = 256;

/// Something that happened in a session's renewal cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum RenewalEvent {
    /// The session was extended.
    Renewed {
        previous_session_id: String,
        session_id: String,
        expires_at: DateTime<Utc>,
    },
    /// An extension failed. No further renewal is attempted and the
    /// stream ends at `expires_at`.
    Failed {
        session_id: String,
        expires_at: DateTime<Utc>,
        error: ApiError,
    },
    /// Renewal was cancelled by stopping the session.
    Cancelled { session_id: String },
}

/// Receives renewal events.
///
/// Renewal runs in the background with no caller waiting on it, so this
/// is the only place renewal failures surface besides the logs.
pub trait RenewalSink: Send + Sync + 'static {
    fn report(&self, event: RenewalEvent);
}

/// Sink that drops every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopSink;

impl RenewalSink for NoopSink {
    fn report(&self, _event: RenewalEvent) {}
}

/// Event log with broadcast and history support.
///
/// New subscribers receive the history and then live events.
pub struct EventLog {
    history: RwLock<VecDeque<RenewalEvent>>,
    capacity: usize,
    sender: broadcast::Sender<RenewalEvent>,
}

impl Default for EventLog {
    fn default() -> Self {
        Self::new()
    }
}

impl EventLog {
    /// Create a log keeping the default amount of history.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(HISTORY_EVENTS)
    }

    /// Create a log keeping at most `capacity` events of history.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self {
            history: RwLock::new(VecDeque::with_capacity(capacity.min(32))),
            capacity,
            sender,
        }
    }

    /// Push an event to live listeners and history.
    pub fn push(&self, event: RenewalEvent) {
        let _ = self.sender.send(event.clone()); // live listeners

        let mut history = self.history.write().unwrap_or_else(PoisonError::into_inner);
        while history.len() >= self.capacity {
            if history.pop_front().is_none() {
                break;
            }
        }
        if self.capacity > 0 {
            history.push_back(event);
        }
    }

    /// Get a receiver for live events.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<RenewalEvent> {
        self.sender.subscribe()
    }

    /// Snapshot of the history.
    #[must_use]
    pub fn history(&self) -> Vec<RenewalEvent> {
        self.history
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .cloned()
            .collect()
    }

    /// Failures recorded in the history.
    #[must_use]
    pub fn failures(&self) -> Vec<ApiError> {
        self.history()
            .into_iter()
            .filter_map(|event| match event {
                RenewalEvent::Failed { error, .. } => Some(error),
                _ => None,
            })
            .collect()
    }

    /// Stream that yields history first, then live events.
    #[must_use]
    pub fn history_plus_stream(&self) -> futures::stream::BoxStream<'static, RenewalEvent> {
        let (history, rx) = (self.history(), self.subscribe());

        let hist = futures::stream::iter(history);
        let live = BroadcastStream::new(rx).filter_map(|res| async move { res.ok() });

        Box::pin(hist.chain(live))
    }
}

impl RenewalSink for EventLog {
    fn report(&self, event: RenewalEvent) {
        self.push(event);
    }
}
