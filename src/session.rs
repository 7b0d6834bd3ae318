//! One operator session against the analysis service.
//!
//! `Session` wires the components together and owns the state they share:
//! parameters and file, the current result, the error slot, the API status
//! and the progress value. Shells drive it through these methods and read
//! it back through `view()` or the event stream.

use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use serde::Serialize;
use tokio::sync::{broadcast, watch};
use tracing::{debug, info};

use crate::api::{AnalysisResult, HttpPorometClient, PorometApi};
use crate::config::Config;
use crate::download::ResultDownloader;
use crate::error::PorometError;
use crate::error_surface::ErrorSurface;
use crate::events::{self, emit, EventSender, SessionEvent};
use crate::monitor::{ApiHealthMonitor, ApiStatus, MonitorHandle};
use crate::params::{AnalysisParams, ParamKey, ParameterStore, SelectedFile};
use crate::progress::{ProgressSettings, ProgressSignal};
use crate::render::{HistogramImage, ResultRenderer, ResultSummary};
use crate::submitter::AnalysisSubmitter;

pub const EMPTY_HINT: &str = "Upload an image and run analysis to see results";

/// Everything a shell needs to draw the current state.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionView {
    pub status: ApiStatus,
    pub status_label: &'static str,
    /// How to bring the service up; only set while it is offline
    pub offline_hint: Option<String>,
    pub file_name: Option<String>,
    pub params: AnalysisParams,
    pub analyzing: bool,
    pub progress: u8,
    pub progress_text: Option<String>,
    pub run_label: &'static str,
    pub can_run: bool,
    pub error: Option<String>,
    pub summary: Option<ResultSummary>,
    pub empty_hint: Option<&'static str>,
}

pub struct Session {
    config: Config,
    store: Mutex<ParameterStore>,
    result: Mutex<Option<Arc<AnalysisResult>>>,
    errors: ErrorSurface,
    status: Arc<watch::Sender<ApiStatus>>,
    progress: Arc<ProgressSignal>,
    monitor: ApiHealthMonitor,
    submitter: AnalysisSubmitter,
    renderer: ResultRenderer,
    downloader: ResultDownloader,
    events: EventSender,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Session {
    /// Session talking HTTP to `config.api_base_url`.
    pub fn new(config: Config) -> Result<Self, PorometError> {
        config.validate()?;
        let api = Arc::new(HttpPorometClient::new(&config)?);
        Ok(Self::with_api(config, api))
    }

    /// Session over any `PorometApi`, e.g. a test double.
    pub fn with_api(config: Config, api: Arc<dyn PorometApi>) -> Self {
        let events = events::channel();
        let status = Arc::new(watch::channel(ApiStatus::Checking).0);
        let progress = Arc::new(ProgressSignal::new(events.clone()));

        let monitor = ApiHealthMonitor::new(
            api.clone(),
            config.health_interval(),
            status.clone(),
            events.clone(),
        );
        let submitter = AnalysisSubmitter::new(
            api.clone(),
            progress.clone(),
            ProgressSettings {
                tick: config.progress_tick(),
                step: config.progress_step,
                ceiling: config.progress_ceiling,
            },
            config.request_timeout(),
        );
        let renderer = ResultRenderer::new(api.clone());
        let downloader = ResultDownloader::new(api, config.resolved_download_dir());

        Self {
            store: Mutex::new(ParameterStore::new(config.default_params)),
            result: Mutex::new(None),
            errors: ErrorSurface::new(events.clone()),
            status,
            progress,
            monitor,
            submitter,
            renderer,
            downloader,
            events,
            config,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    // -- Health --

    /// Start background polling. Keep the handle for as long as the session is shown.
    pub fn start_monitor(&self) -> MonitorHandle {
        self.monitor.clone().spawn()
    }

    /// Run a single probe now.
    pub async fn check_status(&self) -> ApiStatus {
        self.monitor.check_status().await
    }

    pub fn api_status(&self) -> ApiStatus {
        *self.status.borrow()
    }

    pub fn status_receiver(&self) -> watch::Receiver<ApiStatus> {
        self.status.subscribe()
    }

    /// Wait until the first probe has settled, up to `timeout`.
    pub async fn wait_for_status(&self, timeout: Duration) -> ApiStatus {
        let mut rx = self.status.subscribe();
        let settled = tokio::time::timeout(timeout, rx.wait_for(|s| *s != ApiStatus::Checking)).await;
        match settled {
            Ok(Ok(status)) => *status,
            _ => self.api_status(),
        }
    }

    // -- Parameters and file --

    pub fn params(&self) -> AnalysisParams {
        lock(&self.store).params()
    }

    pub fn set_param(&self, key: ParamKey, value: f64) {
        debug!("Setting {} = {}", key.field_name(), value);
        lock(&self.store).set_param(key, value);
    }

    /// Set a parameter from operator text; returns the coerced value.
    pub fn set_param_text(&self, key: ParamKey, text: &str) -> f64 {
        let value = lock(&self.store).set_param_text(key, text);
        debug!("Setting {} = {} (from {:?})", key.field_name(), value, text);
        value
    }

    pub fn selected_file(&self) -> Option<SelectedFile> {
        lock(&self.store).selected_file().cloned()
    }

    /// Replace the selected image. Any result or error from before is dropped.
    pub fn select_file(&self, file: SelectedFile) {
        info!("Selected {} ({} bytes)", file.name, file.len());
        let name = file.name.clone();
        lock(&self.store).select_file(file);
        emit(&self.events, SessionEvent::FileSelected(name));

        if lock(&self.result).take().is_some() {
            emit(&self.events, SessionEvent::ResultCleared);
        }
        self.errors.clear();
    }

    // -- Analysis --

    pub fn is_analyzing(&self) -> bool {
        self.submitter.is_analyzing()
    }

    pub fn progress(&self) -> u8 {
        self.progress.get()
    }

    pub fn progress_receiver(&self) -> watch::Receiver<u8> {
        self.progress.subscribe()
    }

    /// Submit the selected file with the current parameters.
    ///
    /// On success the result replaces any previous one and the error is
    /// cleared. On failure the error is set and a previous result, if any,
    /// stays as it was. A call made while another is in flight returns
    /// `Busy` and changes nothing.
    pub async fn run_analysis(&self) -> Result<Arc<AnalysisResult>, PorometError> {
        let (file, params) = {
            let store = lock(&self.store);
            (store.selected_file().cloned(), store.params())
        };

        let in_flight = match self.submitter.begin(file.as_ref(), self.api_status()) {
            Ok(in_flight) => in_flight,
            Err(PorometError::Busy) => return Err(PorometError::Busy),
            Err(e) => {
                self.errors.set(e.to_string());
                return Err(e);
            }
        };
        self.errors.clear();

        match in_flight.run(&params).await {
            Ok(result) => {
                let result = Arc::new(result);
                *lock(&self.result) = Some(result.clone());
                emit(&self.events, SessionEvent::ResultReady(result.clone()));
                self.errors.clear();
                Ok(result)
            }
            Err(e) => {
                self.errors.set(e.to_string());
                Err(e)
            }
        }
    }

    pub fn result(&self) -> Option<Arc<AnalysisResult>> {
        lock(&self.result).clone()
    }

    pub fn error(&self) -> Option<String> {
        self.errors.current()
    }

    pub fn summary(&self) -> Option<ResultSummary> {
        self.result().map(|r| self.renderer.summarize(&r))
    }

    /// Histogram for the current result; None when there is no result.
    pub async fn render_histogram(&self) -> Option<HistogramImage> {
        let result = self.result()?;
        Some(self.renderer.histogram(&result.output_dir).await)
    }

    /// Save the bundle for the current result; `Ok(None)` when there is no result.
    pub async fn download_results(&self) -> Result<Option<PathBuf>, PorometError> {
        let Some(result) = self.result() else {
            return Ok(None);
        };
        match self.downloader.download(&result.output_dir).await {
            Ok(path) => Ok(Some(path)),
            Err(e) => {
                self.errors.set(e.to_string());
                Err(e)
            }
        }
    }

    pub fn download_dir(&self) -> PathBuf {
        self.downloader.download_dir().to_path_buf()
    }

    // -- View --

    pub fn view(&self) -> SessionView {
        let status = self.api_status();
        let (file_name, params) = {
            let store = lock(&self.store);
            (store.selected_file().map(|f| f.name.clone()), store.params())
        };
        let analyzing = self.is_analyzing();
        let progress = self.progress();
        let error = self.error();
        let summary = self.summary();

        let offline_hint = (status == ApiStatus::Offline).then(|| {
            format!(
                "Backend server not running. To start it, run: {} (the server will start at {})",
                self.config.server_start_command, self.config.api_base_url
            )
        });
        let empty_hint = (summary.is_none() && error.is_none()).then_some(EMPTY_HINT);

        SessionView {
            status,
            status_label: status.label(),
            offline_hint,
            can_run: file_name.is_some() && !analyzing && status == ApiStatus::Online,
            file_name,
            params,
            analyzing,
            progress,
            progress_text: analyzing.then(|| format!("Processing image... {}%", progress)),
            run_label: if analyzing { "Analyzing..." } else { "Run Analysis" },
            error,
            summary,
            empty_hint,
        }
    }
}
