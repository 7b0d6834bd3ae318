use std::time::Duration;

use thiserror::Error;

pub const NO_FILE_SELECTED: &str = "Please select an image file first";
pub const SERVICE_OFFLINE: &str = "Backend API is not running. Please start the server first.";

#[derive(Debug, Error)]
pub enum PorometError {
    /// Refused client-side; the service was never contacted.
    #[error("{0}")]
    Precondition(String),

    #[error("An analysis is already running")]
    Busy,

    /// Connection, DNS or socket failure. The detail is kept for logs only.
    #[error("Could not reach the analysis service")]
    Transport(String),

    #[error("Analysis request timed out after {}s", .0.as_secs())]
    Timeout(Duration),

    /// The service answered with a failure status; holds the operator-facing message.
    #[error("{0}")]
    Service(String),

    /// Success status but a body that is not a valid analysis result.
    /// Surfaced the same way as a service failure.
    #[error("Invalid response from analysis service: {0}")]
    Parse(String),

    /// Histogram image could not be loaded. Always recovered by the renderer.
    #[error("Histogram unavailable: {0}")]
    Asset(String),

    #[error("Failed to download results")]
    Download(String),

    #[error("Config error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl PorometError {
    /// Extra context that the operator-facing message leaves out.
    pub fn detail(&self) -> Option<&str> {
        match self {
            PorometError::Transport(d) | PorometError::Download(d) => Some(d),
            _ => None,
        }
    }
}

impl From<PorometError> for String {
    fn from(err: PorometError) -> Self {
        err.to_string()
    }
}
