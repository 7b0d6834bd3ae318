//! In-memory stand-in for the analysis service, used by unit tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::api::{AnalysisResult, HistogramAsset, HistogramPoint, PorometApi};
use crate::error::PorometError;
use crate::params::{AnalysisParams, SelectedFile};

type AnalyzeFn = Box<dyn Fn() -> Result<AnalysisResult, PorometError> + Send + Sync>;

pub fn sample_result(output_dir: &str) -> AnalysisResult {
    AnalysisResult {
        avg_diam_nm: 23.4567,
        mode_diam_nm: 18.994,
        histogram_data: vec![
            HistogramPoint { diameter: 7.26, pdf: 0.01 },
            HistogramPoint { diameter: 18.99, pdf: 0.07 },
            HistogramPoint { diameter: 64.04, pdf: 0.002 },
        ],
        output_dir: output_dir.to_string(),
        pixel_size: 0.4219531,
    }
}

pub struct FakeApi {
    health: Mutex<VecDeque<bool>>,
    pub health_calls: AtomicUsize,
    analyze: Mutex<AnalyzeFn>,
    analyze_delay: Mutex<Duration>,
    pub analyze_calls: AtomicUsize,
    pub last_params: Mutex<Option<AnalysisParams>>,
    histogram: Mutex<Option<HistogramAsset>>,
    pub histogram_calls: Mutex<Vec<Option<i64>>>,
    download: Mutex<Option<Vec<u8>>>,
    pub download_calls: AtomicUsize,
}

impl FakeApi {
    pub fn new() -> Self {
        Self {
            health: Mutex::new(VecDeque::new()),
            health_calls: AtomicUsize::new(0),
            analyze: Mutex::new(Box::new(|| Ok(sample_result("run-1")))),
            analyze_delay: Mutex::new(Duration::ZERO),
            analyze_calls: AtomicUsize::new(0),
            last_params: Mutex::new(None),
            histogram: Mutex::new(Some(HistogramAsset {
                bytes: b"\x89PNG fake".to_vec(),
                content_type: Some("image/png".to_string()),
            })),
            histogram_calls: Mutex::new(Vec::new()),
            download: Mutex::new(Some(b"PK\x03\x04 fake zip".to_vec())),
            download_calls: AtomicUsize::new(0),
        }
    }

    /// Queue health outcomes; once exhausted the service reports healthy.
    pub fn script_health(&self, outcomes: &[bool]) {
        self.health.lock().unwrap().extend(outcomes.iter().copied());
    }

    pub fn on_analyze<F>(&self, f: F)
    where
        F: Fn() -> Result<AnalysisResult, PorometError> + Send + Sync + 'static,
    {
        *self.analyze.lock().unwrap() = Box::new(f);
    }

    pub fn analyze_takes(&self, delay: Duration) {
        *self.analyze_delay.lock().unwrap() = delay;
    }

    pub fn histogram_missing(&self) {
        *self.histogram.lock().unwrap() = None;
    }

    pub fn download_fails(&self) {
        *self.download.lock().unwrap() = None;
    }
}

#[async_trait]
impl PorometApi for FakeApi {
    async fn health(&self) -> Result<(), PorometError> {
        self.health_calls.fetch_add(1, Ordering::SeqCst);
        let healthy = self.health.lock().unwrap().pop_front().unwrap_or(true);
        if healthy {
            Ok(())
        } else {
            Err(PorometError::Transport("connection refused".to_string()))
        }
    }

    async fn analyze(
        &self,
        _file: &SelectedFile,
        params: &AnalysisParams,
    ) -> Result<AnalysisResult, PorometError> {
        self.analyze_calls.fetch_add(1, Ordering::SeqCst);
        *self.last_params.lock().unwrap() = Some(*params);
        let delay = *self.analyze_delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        (self.analyze.lock().unwrap())()
    }

    async fn histogram(
        &self,
        output_dir: &str,
        cache_buster: Option<i64>,
    ) -> Result<HistogramAsset, PorometError> {
        self.histogram_calls.lock().unwrap().push(cache_buster);
        self.histogram
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| PorometError::Asset(format!("HTTP 404 for {}", output_dir)))
    }

    async fn download(&self, output_dir: &str) -> Result<Vec<u8>, PorometError> {
        self.download_calls.fetch_add(1, Ordering::SeqCst);
        self.download
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| PorometError::Download(format!("HTTP 500 for {}", output_dir)))
    }
}
