use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::{debug, warn};

use crate::events::{emit, EventSender, SessionEvent};

/// Single slot for the message currently shown to the operator.
///
/// Setting replaces whatever was there; there is no queue.
pub struct ErrorSurface {
    slot: Mutex<Option<String>>,
    events: EventSender,
}

impl ErrorSurface {
    pub fn new(events: EventSender) -> Self {
        Self {
            slot: Mutex::new(None),
            events,
        }
    }

    fn slot(&self) -> MutexGuard<'_, Option<String>> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn set(&self, message: impl Into<String>) {
        let message = message.into();
        warn!("Error surfaced: {}", message);
        *self.slot() = Some(message.clone());
        emit(&self.events, SessionEvent::ErrorChanged(Some(message)));
    }

    pub fn clear(&self) {
        if self.slot().take().is_some() {
            debug!("Error cleared");
            emit(&self.events, SessionEvent::ErrorChanged(None));
        }
    }

    pub fn current(&self) -> Option<String> {
        self.slot().clone()
    }
}
