//! Contract with the remote analysis service.
//!
//! `PorometApi` is the seam between the session logic and the network.
//! `HttpPorometClient` is the real implementation; tests substitute their own.

pub mod client;
pub mod types;

use async_trait::async_trait;

use crate::error::PorometError;
use crate::params::{AnalysisParams, SelectedFile};

pub use client::HttpPorometClient;
pub use types::{service_error_message, AnalysisResult, HistogramAsset, HistogramPoint};

#[async_trait]
pub trait PorometApi: Send + Sync {
    /// `GET /api/health`. Ok only for a success status.
    async fn health(&self) -> Result<(), PorometError>;

    /// `POST /api/analyze` with the image and parameters as multipart fields.
    async fn analyze(
        &self,
        file: &SelectedFile,
        params: &AnalysisParams,
    ) -> Result<AnalysisResult, PorometError>;

    /// `GET /api/histogram/{output_dir}`, optionally with a `t` cache buster.
    /// Failures are reported as `PorometError::Asset`.
    async fn histogram(
        &self,
        output_dir: &str,
        cache_buster: Option<i64>,
    ) -> Result<HistogramAsset, PorometError>;

    /// `GET /api/download/{output_dir}`. Failures are reported as `PorometError::Download`.
    async fn download(&self, output_dir: &str) -> Result<Vec<u8>, PorometError>;
}
