//! Change notifications for shells that render incrementally.

use std::sync::Arc;

use tokio::sync::broadcast;

use crate::api::AnalysisResult;
use crate::monitor::ApiStatus;

pub const EVENT_CAPACITY: usize = 256;

#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    StatusChanged(ApiStatus),
    FileSelected(String),
    Progress(u8),
    ResultReady(Arc<AnalysisResult>),
    ResultCleared,
    ErrorChanged(Option<String>),
}

pub type EventSender = broadcast::Sender<SessionEvent>;

pub fn channel() -> EventSender {
    broadcast::channel(EVENT_CAPACITY).0
}

/// Send without caring whether anyone is listening.
pub fn emit(events: &EventSender, event: SessionEvent) {
    let _ = events.send(event);
}
