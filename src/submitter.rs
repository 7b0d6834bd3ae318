//! Submit -> await -> parse-or-fail for a single analysis.
//!
//! ```text
//! Idle --submit, preconditions ok--> InFlight --response--> Idle
//! Idle --submit, preconditions fail--> Idle (error)
//! ```
//!
//! Only one submission can be in flight; a second `begin` while one is
//! outstanding is refused with `PorometError::Busy`.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use crate::api::{AnalysisResult, PorometApi};
use crate::error::{PorometError, NO_FILE_SELECTED, SERVICE_OFFLINE};
use crate::monitor::ApiStatus;
use crate::params::{AnalysisParams, SelectedFile};
use crate::progress::{ProgressSettings, ProgressSignal, ProgressTicker, COMPLETE};

pub struct AnalysisSubmitter {
    api: Arc<dyn PorometApi>,
    progress: Arc<ProgressSignal>,
    settings: ProgressSettings,
    request_timeout: Duration,
    in_flight: Arc<AtomicBool>,
}

impl AnalysisSubmitter {
    pub fn new(
        api: Arc<dyn PorometApi>,
        progress: Arc<ProgressSignal>,
        settings: ProgressSettings,
        request_timeout: Duration,
    ) -> Self {
        Self {
            api,
            progress,
            settings,
            request_timeout,
            in_flight: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn is_analyzing(&self) -> bool {
        self.in_flight.load(Ordering::SeqCst)
    }

    pub fn progress(&self) -> u8 {
        self.progress.get()
    }

    /// Check preconditions and enter InFlight. Nothing touches the network here.
    pub fn begin(
        &self,
        file: Option<&SelectedFile>,
        status: ApiStatus,
    ) -> Result<InFlight, PorometError> {
        if self.is_analyzing() {
            return Err(PorometError::Busy);
        }
        let file = file.ok_or_else(|| PorometError::Precondition(NO_FILE_SELECTED.to_string()))?;
        if status != ApiStatus::Online {
            return Err(PorometError::Precondition(SERVICE_OFFLINE.to_string()));
        }
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(PorometError::Busy);
        }

        Ok(InFlight {
            api: self.api.clone(),
            progress: self.progress.clone(),
            settings: self.settings,
            request_timeout: self.request_timeout,
            file: file.clone(),
            in_flight: self.in_flight.clone(),
        })
    }

    pub async fn submit(
        &self,
        file: Option<&SelectedFile>,
        params: &AnalysisParams,
        status: ApiStatus,
    ) -> Result<AnalysisResult, PorometError> {
        self.begin(file, status)?.run(params).await
    }
}

/// A submission that passed its preconditions.
///
/// Dropping it (including dropping the `run` future) returns the submitter
/// to Idle.
pub struct InFlight {
    api: Arc<dyn PorometApi>,
    progress: Arc<ProgressSignal>,
    settings: ProgressSettings,
    request_timeout: Duration,
    file: SelectedFile,
    in_flight: Arc<AtomicBool>,
}

impl InFlight {
    pub async fn run(self, params: &AnalysisParams) -> Result<AnalysisResult, PorometError> {
        info!(
            "Analyzing {} (magnification={}, max_diam_nm={}, thresh_mag={})",
            self.file.name, params.magnification, params.max_diam_nm, params.thresh_mag
        );

        self.progress.set(0);
        let ticker = ProgressTicker::start(self.progress.clone(), self.settings);

        let outcome =
            match tokio::time::timeout(self.request_timeout, self.api.analyze(&self.file, params))
                .await
            {
                Ok(outcome) => outcome,
                Err(_) => Err(PorometError::Timeout(self.request_timeout)),
            };

        ticker.stop().await;
        self.progress.set(COMPLETE);
        self.progress.set(0);

        match &outcome {
            Ok(result) => info!(
                "Analysis complete: output_dir={}, {} histogram points",
                result.output_dir,
                result.histogram_data.len()
            ),
            Err(e) => warn!("Analysis failed: {}", e),
        }
        outcome
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        // A cancelled `run` never reaches its own reset.
        if self.in_flight.swap(false, Ordering::SeqCst) && self.progress.get() != 0 {
            warn!("Analysis of {} abandoned while in flight", self.file.name);
            self.progress.set(0);
        }
    }
}
