//! In-process mock of the Poromet analysis service.

#![allow(dead_code)]

use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::{Arc, Mutex};

use axum::extract::{Multipart, Path as UrlPath, Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::json;

use poromet::{Config, Session};

pub const PNG_BYTES: &[u8] = b"\x89PNG\r\n\x1a\nmock histogram";
pub const ZIP_BYTES: &[u8] = b"PK\x03\x04mock bundle";

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AnalyzeMode {
    Succeed,
    JsonDetail,
    PlainText,
    EmptyBadGateway,
    Malformed,
}

#[derive(Debug)]
pub struct Recorded {
    pub healthy: bool,
    pub analyze_mode: AnalyzeMode,
    pub output_dir: String,
    pub histogram_available: bool,
    pub download_available: bool,
    pub analyze_hits: usize,
    pub fields: HashMap<String, String>,
    pub file_name: Option<String>,
    pub file_bytes: Vec<u8>,
    pub histogram_queries: Vec<Option<String>>,
    pub download_hits: Vec<String>,
}

impl Default for Recorded {
    fn default() -> Self {
        Self {
            healthy: true,
            analyze_mode: AnalyzeMode::Succeed,
            output_dir: "abc123".to_string(),
            histogram_available: true,
            download_available: true,
            analyze_hits: 0,
            fields: HashMap::new(),
            file_name: None,
            file_bytes: Vec::new(),
            histogram_queries: Vec::new(),
            download_hits: Vec::new(),
        }
    }
}

#[derive(Clone, Default)]
pub struct MockService {
    pub state: Arc<Mutex<Recorded>>,
}

impl MockService {
    pub fn with<R>(&self, f: impl FnOnce(&mut Recorded) -> R) -> R {
        f(&mut self.state.lock().unwrap())
    }
}

pub fn histogram_body() -> serde_json::Value {
    json!([
        {"diameter": 4.87, "pdf": 0.004},
        {"diameter": 12.5, "pdf": 0.031},
        {"diameter": 21.04, "pdf": 0.052},
        {"diameter": 33.33, "pdf": 0.019},
        {"diameter": 78.96, "pdf": 0.001}
    ])
}

async fn health(State(mock): State<MockService>) -> StatusCode {
    if mock.with(|s| s.healthy) {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}

async fn analyze(State(mock): State<MockService>, mut multipart: Multipart) -> Response {
    let mut fields = HashMap::new();
    let mut file_name = None;
    let mut file_bytes = Vec::new();
    while let Some(field) = multipart.next_field().await.unwrap() {
        let name = field.name().unwrap_or_default().to_string();
        if name == "file" {
            file_name = field.file_name().map(|s| s.to_string());
            file_bytes = field.bytes().await.unwrap().to_vec();
        } else {
            fields.insert(name, field.text().await.unwrap());
        }
    }

    let (mode, output_dir) = mock.with(|s| {
        s.analyze_hits += 1;
        s.fields = fields;
        s.file_name = file_name;
        s.file_bytes = file_bytes;
        (s.analyze_mode, s.output_dir.clone())
    });

    match mode {
        AnalyzeMode::Succeed => Json(json!({
            "avg_diam_nm": 24.6183,
            "mode_diam_nm": 19.2061,
            "histogram_data": histogram_body(),
            "output_dir": output_dir,
            "pixel_size": 0.35714,
        }))
        .into_response(),
        AnalyzeMode::JsonDetail => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({"detail": "bad image"})),
        )
            .into_response(),
        AnalyzeMode::PlainText => {
            (StatusCode::INTERNAL_SERVER_ERROR, "internal error").into_response()
        }
        AnalyzeMode::EmptyBadGateway => StatusCode::BAD_GATEWAY.into_response(),
        AnalyzeMode::Malformed => (StatusCode::OK, "<html>not json</html>").into_response(),
    }
}

async fn histogram(
    State(mock): State<MockService>,
    UrlPath(_output_dir): UrlPath<String>,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    let available = mock.with(|s| {
        s.histogram_queries.push(query.get("t").cloned());
        s.histogram_available
    });
    if available {
        ([(header::CONTENT_TYPE, "image/png")], PNG_BYTES.to_vec()).into_response()
    } else {
        (StatusCode::NOT_FOUND, Json(json!({"detail": "Histogram not found"}))).into_response()
    }
}

async fn download(State(mock): State<MockService>, UrlPath(output_dir): UrlPath<String>) -> Response {
    let available = mock.with(|s| {
        s.download_hits.push(output_dir);
        s.download_available
    });
    if available {
        ([(header::CONTENT_TYPE, "application/zip")], ZIP_BYTES.to_vec()).into_response()
    } else {
        StatusCode::INTERNAL_SERVER_ERROR.into_response()
    }
}

/// Start the mock on an ephemeral port.
pub async fn spawn_mock() -> (MockService, SocketAddr) {
    let mock = MockService::default();
    let app = Router::new()
        .route("/api/health", get(health))
        .route("/api/analyze", post(analyze))
        .route("/api/histogram/:output_dir", get(histogram))
        .route("/api/download/:output_dir", get(download))
        .with_state(mock.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (mock, addr)
}

/// An address nothing is listening on.
pub fn dead_address() -> SocketAddr {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap()
}

pub fn config_for(addr: SocketAddr, download_dir: &Path) -> Config {
    Config {
        api_base_url: format!("http://{}", addr),
        health_timeout_secs: 2,
        request_timeout_secs: 10,
        download_dir: Some(download_dir.to_path_buf()),
        ..Config::default()
    }
}

pub fn session_for(addr: SocketAddr, download_dir: &Path) -> Session {
    Session::new(config_for(addr, download_dir)).unwrap()
}
