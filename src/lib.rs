pub mod api;
pub mod config;
pub mod console;
pub mod download;
mod error;
pub mod error_surface;
pub mod events;
pub mod monitor;
pub mod params;
pub mod progress;
pub mod render;
pub mod session;
pub mod submitter;

#[cfg(test)]
mod testing;

use clap::Parser;

pub use api::{AnalysisResult, HistogramPoint, HttpPorometClient, PorometApi};
pub use config::Config;
pub use error::{PorometError, NO_FILE_SELECTED, SERVICE_OFFLINE};
pub use events::SessionEvent;
pub use monitor::{ApiStatus, MonitorHandle};
pub use params::{AnalysisParams, ParamKey, SelectedFile};
pub use render::{HistogramImage, ResultSummary};
pub use session::{Session, SessionView};

pub fn run() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = console::Cli::parse();
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?
        .block_on(console::run(cli))
}
