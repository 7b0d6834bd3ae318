//! Payloads exchanged with the analysis service.

use serde::{Deserialize, Serialize};

/// One point of the pore-size distribution.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HistogramPoint {
    /// Pore diameter in nm
    pub diameter: f64,
    /// Probability density at this diameter
    pub pdf: f64,
}

/// Result of one successful analysis run.
///
/// `output_dir` identifies the run on the service and is the key for the
/// histogram and download endpoints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub avg_diam_nm: f64,
    pub mode_diam_nm: f64,
    pub histogram_data: Vec<HistogramPoint>,
    pub output_dir: String,
    pub pixel_size: f64,
}

impl AnalysisResult {
    /// Smallest and largest diameter in the distribution, if it has any points.
    pub fn diameter_range(&self) -> Option<(f64, f64)> {
        let mut points = self.histogram_data.iter().map(|p| p.diameter);
        let first = points.next()?;
        Some(points.fold((first, first), |(lo, hi), d| (lo.min(d), hi.max(d))))
    }
}

/// Raw histogram image as served by the service.
#[derive(Debug, Clone, PartialEq)]
pub struct HistogramAsset {
    pub bytes: Vec<u8>,
    pub content_type: Option<String>,
}

/// Turn a failed analyze response into the message shown to the operator.
///
/// Precedence: the JSON `detail` field, then the raw body text, then
/// "Analysis failed: <status phrase>". A body that is valid JSON without a
/// usable `detail` falls straight through to the status phrase.
pub fn service_error_message(status_phrase: &str, body: &str) -> String {
    let fallback = format!("Analysis failed: {}", status_phrase);

    match serde_json::from_str::<serde_json::Value>(body) {
        Ok(json) => match json.get("detail") {
            Some(serde_json::Value::String(s)) if !s.is_empty() => s.clone(),
            Some(serde_json::Value::Null) | Some(serde_json::Value::Bool(false)) | None => fallback,
            Some(serde_json::Value::String(_)) => fallback,
            Some(other) => other.to_string(),
        },
        Err(_) if !body.is_empty() => body.to_string(),
        Err(_) => fallback,
    }
}
