use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use tracing::{debug, error, info, warn};
use url::Url;

use super::types::{service_error_message, AnalysisResult, HistogramAsset};
use super::PorometApi;
use crate::config::Config;
use crate::error::PorometError;
use crate::params::{AnalysisParams, SelectedFile};

/// HTTP client for the analysis service.
///
/// Analysis requests carry no client-level timeout; the submitter bounds
/// them. Health probes use the short probe timeout, everything else the
/// configured request timeout.
pub struct HttpPorometClient {
    client: reqwest::Client,
    base_url: Url,
    health_timeout: Duration,
    request_timeout: Duration,
}

impl HttpPorometClient {
    pub fn new(config: &Config) -> Result<Self, PorometError> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("poromet/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| PorometError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.base_url()?,
            health_timeout: config.health_timeout(),
            request_timeout: config.request_timeout(),
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Build `<base>/api/<segments...>`, percent-encoding each segment.
    pub fn endpoint(&self, segments: &[&str]) -> Result<Url, PorometError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| {
                PorometError::Config(format!("api_base_url cannot be a base: {}", self.base_url))
            })?
            .pop_if_empty()
            .push("api")
            .extend(segments);
        Ok(url)
    }
}

fn transport_error(url: &Url, e: reqwest::Error) -> PorometError {
    let msg = format!("Request to {} failed: {}", url, e);
    warn!("{}", msg);
    PorometError::Transport(msg)
}

#[async_trait]
impl PorometApi for HttpPorometClient {
    async fn health(&self) -> Result<(), PorometError> {
        let url = self.endpoint(&["health"])?;
        let response = self
            .client
            .get(url.clone())
            .timeout(self.health_timeout)
            .send()
            .await
            .map_err(|e| PorometError::Transport(format!("Health probe failed: {}", e)))?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(PorometError::Service(format!("Health probe returned {}", status)))
        }
    }

    async fn analyze(
        &self,
        file: &SelectedFile,
        params: &AnalysisParams,
    ) -> Result<AnalysisResult, PorometError> {
        let url = self.endpoint(&["analyze"])?;

        let part = Part::bytes(file.bytes.to_vec())
            .file_name(file.name.clone())
            .mime_str(&file.mime)
            .map_err(|e| PorometError::Precondition(format!("Invalid file type '{}': {}", file.mime, e)))?;
        let form = params
            .form_fields()
            .into_iter()
            .fold(Form::new().part("file", part), |form, (name, value)| form.text(name, value));

        info!(
            "Submitting {} ({} bytes) to {}",
            file.name,
            file.len(),
            url
        );
        let response = self
            .client
            .post(url.clone())
            .multipart(form)
            .send()
            .await
            .map_err(|e| transport_error(&url, e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let msg = service_error_message(status.canonical_reason().unwrap_or("Unknown"), &body);
            error!("Analysis failed with {}: {}", status, msg);
            return Err(PorometError::Service(msg));
        }

        let body = response
            .text()
            .await
            .map_err(|e| transport_error(&url, e))?;
        serde_json::from_str::<AnalysisResult>(&body).map_err(|e| {
            let truncated = if body.len() > 200 {
                format!("{}...", body.chars().take(200).collect::<String>())
            } else {
                body.clone()
            };
            error!("Malformed analysis response: {} (body: {})", e, truncated);
            PorometError::Parse(e.to_string())
        })
    }

    async fn histogram(
        &self,
        output_dir: &str,
        cache_buster: Option<i64>,
    ) -> Result<HistogramAsset, PorometError> {
        let mut url = self.endpoint(&["histogram", output_dir])?;
        if let Some(t) = cache_buster {
            url.query_pairs_mut().append_pair("t", &t.to_string());
        }

        debug!("Fetching histogram from {}", url);
        let response = self
            .client
            .get(url.clone())
            .timeout(self.request_timeout)
            .send()
            .await
            .map_err(|e| PorometError::Asset(format!("Request to {} failed: {}", url, e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(PorometError::Asset(format!(
                "HTTP {} from {}: {}",
                status.as_u16(),
                url,
                body
            )));
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());
        let bytes = response
            .bytes()
            .await
            .map_err(|e| PorometError::Asset(format!("Failed to read histogram body: {}", e)))?;

        Ok(HistogramAsset {
            bytes: bytes.to_vec(),
            content_type,
        })
    }

    async fn download(&self, output_dir: &str) -> Result<Vec<u8>, PorometError> {
        let url = self.endpoint(&["download", output_dir])?;

        info!("Downloading results from {}", url);
        let response = self
            .client
            .get(url.clone())
            .timeout(self.request_timeout)
            .send()
            .await
            .map_err(|e| PorometError::Download(format!("Request to {} failed: {}", url, e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(PorometError::Download(format!(
                "HTTP {} {} from {}",
                status.as_u16(),
                status.canonical_reason().unwrap_or("Unknown"),
                url
            )));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| PorometError::Download(format!("Failed to read download body: {}", e)))?;
        Ok(bytes.to_vec())
    }
}
