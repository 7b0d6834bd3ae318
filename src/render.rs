//! Presentation of a finished analysis.
//!
//! `ResultSummary` holds the numbers and their display strings. The
//! histogram image is fetched separately and falls back to an inline
//! placeholder; that path never produces an error for the operator.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::api::{AnalysisResult, PorometApi};

/// Shown in place of the histogram when the image cannot be loaded.
pub const PLACEHOLDER_SVG: &str = concat!(
    "<svg width='800' height='600' xmlns='http://www.w3.org/2000/svg'>",
    "<rect width='100%' height='100%' fill='#f3f4f6'/>",
    "<text x='50%' y='50%' font-family='sans-serif' font-size='14' ",
    "text-anchor='middle' dominant-baseline='middle' fill='#9ca3af'>",
    "Histogram not available</text></svg>"
);

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResultSummary {
    pub output_dir: String,
    pub avg_diam_nm: f64,
    pub mode_diam_nm: f64,
    pub pixel_size: f64,
    pub point_count: usize,
    /// Smallest and largest diameter; None for an empty distribution
    pub diameter_range: Option<(f64, f64)>,
}

impl ResultSummary {
    pub fn from_result(result: &AnalysisResult) -> Self {
        Self {
            output_dir: result.output_dir.clone(),
            avg_diam_nm: result.avg_diam_nm,
            mode_diam_nm: result.mode_diam_nm,
            pixel_size: result.pixel_size,
            point_count: result.histogram_data.len(),
            diameter_range: result.diameter_range(),
        }
    }

    pub fn avg_diameter_label(&self) -> String {
        format!("{:.2} nm", self.avg_diam_nm)
    }

    pub fn mode_diameter_label(&self) -> String {
        format!("{:.2} nm", self.mode_diam_nm)
    }

    pub fn pixel_size_label(&self) -> String {
        format!("{:.4} nm/px", self.pixel_size)
    }

    pub fn point_count_label(&self) -> String {
        format!("Data points: {}", self.point_count)
    }

    pub fn range_label(&self) -> String {
        match self.diameter_range {
            Some((min, max)) => format!("Range: {:.1} - {:.1} nm", min, max),
            None => "Range: n/a".to_string(),
        }
    }

    /// Summary tab followed by the distribution tab, one line each.
    pub fn lines(&self) -> Vec<String> {
        vec![
            format!("Average Diameter: {}", self.avg_diameter_label()),
            format!("Mode Diameter: {}", self.mode_diameter_label()),
            format!("Pixel Size: {}", self.pixel_size_label()),
            self.point_count_label(),
            self.range_label(),
        ]
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum HistogramImage {
    Remote {
        bytes: Vec<u8>,
        content_type: Option<String>,
    },
    Placeholder,
}

impl HistogramImage {
    pub fn is_placeholder(&self) -> bool {
        matches!(self, HistogramImage::Placeholder)
    }

    pub fn bytes(&self) -> &[u8] {
        match self {
            HistogramImage::Remote { bytes, .. } => bytes,
            HistogramImage::Placeholder => PLACEHOLDER_SVG.as_bytes(),
        }
    }

    pub fn content_type(&self) -> &str {
        match self {
            HistogramImage::Remote {
                content_type: Some(ct),
                ..
            } => ct.as_str(),
            HistogramImage::Remote { .. } => "application/octet-stream",
            HistogramImage::Placeholder => "image/svg+xml",
        }
    }

    /// File extension matching the content type, without the dot.
    pub fn extension(&self) -> &'static str {
        let essence = self.content_type().split(';').next().unwrap_or("").trim();
        match essence {
            "image/svg+xml" => "svg",
            "image/png" => "png",
            "image/jpeg" => "jpg",
            "application/octet-stream" => "bin",
            other => mime_guess::get_mime_extensions_str(other)
                .and_then(|exts| exts.first().copied())
                .unwrap_or("bin"),
        }
    }
}

pub struct ResultRenderer {
    api: Arc<dyn PorometApi>,
    last_buster: AtomicI64,
}

impl ResultRenderer {
    pub fn new(api: Arc<dyn PorometApi>) -> Self {
        Self {
            api,
            last_buster: AtomicI64::new(0),
        }
    }

    pub fn summarize(&self, result: &AnalysisResult) -> ResultSummary {
        ResultSummary::from_result(result)
    }

    /// Millisecond timestamp, bumped when needed so two renders never share one.
    fn next_cache_buster(&self) -> i64 {
        let now = Utc::now().timestamp_millis();
        let mut prev = self.last_buster.load(Ordering::SeqCst);
        loop {
            let next = now.max(prev + 1);
            match self
                .last_buster
                .compare_exchange(prev, next, Ordering::SeqCst, Ordering::SeqCst)
            {
                Ok(_) => return next,
                Err(actual) => prev = actual,
            }
        }
    }

    /// Fetch the histogram for `output_dir`, or the placeholder if that fails.
    pub async fn histogram(&self, output_dir: &str) -> HistogramImage {
        let buster = self.next_cache_buster();
        match self.api.histogram(output_dir, Some(buster)).await {
            Ok(asset) if !asset.bytes.is_empty() => {
                info!("Histogram loaded for {} ({} bytes)", output_dir, asset.bytes.len());
                HistogramImage::Remote {
                    bytes: asset.bytes,
                    content_type: asset.content_type,
                }
            }
            Ok(_) => {
                warn!("Histogram for {} was empty, using placeholder", output_dir);
                self.diagnose(output_dir).await;
                HistogramImage::Placeholder
            }
            Err(e) => {
                warn!("Failed to load histogram for {}: {}", output_dir, e);
                self.diagnose(output_dir).await;
                HistogramImage::Placeholder
            }
        }
    }

    /// One plain re-fetch whose outcome is only logged.
    async fn diagnose(&self, output_dir: &str) {
        match self.api.histogram(output_dir, None).await {
            Ok(asset) => debug!(
                "Diagnostic histogram fetch for {} returned {} bytes ({:?})",
                output_dir,
                asset.bytes.len(),
                asset.content_type
            ),
            Err(e) => debug!("Diagnostic histogram fetch for {} failed: {}", output_dir, e),
        }
    }
}
