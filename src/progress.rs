//! Cosmetic progress for an in-flight analysis.
//!
//! The analyze request is a single POST with no streaming, so the service
//! reports nothing until it finishes. The ticker just advances a value on a
//! fixed cadence up to a ceiling below 100 so the operator sees movement.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use crate::events::{emit, EventSender, SessionEvent};

pub const COMPLETE: u8 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressSettings {
    pub tick: Duration,
    pub step: u8,
    pub ceiling: u8,
}

impl Default for ProgressSettings {
    fn default() -> Self {
        Self {
            tick: Duration::from_secs(1),
            step: 10,
            ceiling: 90,
        }
    }
}

/// Current progress value plus change notifications.
pub struct ProgressSignal {
    value: watch::Sender<u8>,
    events: EventSender,
}

impl ProgressSignal {
    pub fn new(events: EventSender) -> Self {
        Self {
            value: watch::channel(0).0,
            events,
        }
    }

    pub fn get(&self) -> u8 {
        *self.value.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<u8> {
        self.value.subscribe()
    }

    pub fn set(&self, value: u8) {
        self.value.send_replace(value);
        emit(&self.events, SessionEvent::Progress(value));
    }

    /// Move forward by `step`, never past `ceiling` and never backwards.
    pub fn advance(&self, step: u8, ceiling: u8) {
        let mut next = 0;
        let changed = self.value.send_if_modified(|v| {
            let candidate = v.saturating_add(step).min(ceiling);
            if candidate > *v {
                *v = candidate;
                next = candidate;
                true
            } else {
                false
            }
        });
        if changed {
            emit(&self.events, SessionEvent::Progress(next));
        }
    }
}

/// Background task advancing a `ProgressSignal` until stopped.
pub struct ProgressTicker {
    handle: Option<JoinHandle<()>>,
}

impl ProgressTicker {
    /// First advance happens one tick after start.
    pub fn start(signal: Arc<ProgressSignal>, settings: ProgressSettings) -> Self {
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + settings.tick, settings.tick);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                signal.advance(settings.step, settings.ceiling);
            }
        });
        Self {
            handle: Some(handle),
        }
    }

    /// Stop and wait until the task is gone, so no advance can land afterwards.
    pub async fn stop(mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
            let _ = handle.await;
        }
    }
}

impl Drop for ProgressTicker {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}
