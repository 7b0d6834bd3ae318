//! Periodic health polling of the analysis service.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

use crate::api::PorometApi;
use crate::events::{emit, EventSender, SessionEvent};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ApiStatus {
    Checking,
    Online,
    Offline,
}

impl ApiStatus {
    pub fn label(self) -> &'static str {
        match self {
            ApiStatus::Checking => "Checking...",
            ApiStatus::Online => "Ready",
            ApiStatus::Offline => "Offline",
        }
    }
}

/// Polls `GET /api/health` and publishes the resulting status.
///
/// Any success status means `Online`; every other outcome, reachable or
/// not, means `Offline`. The interval is fixed, there is no backoff.
#[derive(Clone)]
pub struct ApiHealthMonitor {
    api: Arc<dyn PorometApi>,
    interval: Duration,
    status: Arc<watch::Sender<ApiStatus>>,
    events: EventSender,
}

impl ApiHealthMonitor {
    pub fn new(
        api: Arc<dyn PorometApi>,
        interval: Duration,
        status: Arc<watch::Sender<ApiStatus>>,
        events: EventSender,
    ) -> Self {
        Self {
            api,
            interval,
            status,
            events,
        }
    }

    pub fn status(&self) -> ApiStatus {
        *self.status.borrow()
    }

    /// Run one probe and publish its outcome.
    pub async fn check_status(&self) -> ApiStatus {
        let next = match self.api.health().await {
            Ok(()) => ApiStatus::Online,
            Err(e) => {
                debug!("Health probe failed: {} ({:?})", e, e.detail());
                ApiStatus::Offline
            }
        };

        let changed = self.status.send_if_modified(|current| {
            if *current != next {
                *current = next;
                true
            } else {
                false
            }
        });
        if changed {
            info!("API status is now {:?}", next);
            emit(&self.events, SessionEvent::StatusChanged(next));
        }
        next
    }

    /// Probe immediately, then every `interval` until the handle is cancelled or dropped.
    pub fn spawn(self) -> MonitorHandle {
        info!("Starting health monitor every {:?}", self.interval);
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                self.check_status().await;
            }
        });
        MonitorHandle {
            handle: Some(handle),
        }
    }
}

/// Owns the polling task. Cancelling or dropping it stops further probes.
#[derive(Debug)]
pub struct MonitorHandle {
    handle: Option<JoinHandle<()>>,
}

impl MonitorHandle {
    pub fn cancel(mut self) {
        self.abort();
    }

    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().map_or(true, |h| h.is_finished())
    }

    fn abort(&mut self) {
        if let Some(handle) = self.handle.take() {
            debug!("Stopping health monitor");
            handle.abort();
        }
    }
}

impl Drop for MonitorHandle {
    fn drop(&mut self) {
        self.abort();
    }
}
