//! Operator entry point: analyze one image from the terminal.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context};
use clap::Parser;
use tracing::{info, warn};

use crate::config::Config;
use crate::download::{histogram_file_name, write_atomic};
use crate::events::SessionEvent;
use crate::monitor::ApiStatus;
use crate::params::{ParamKey, SelectedFile};
use crate::session::Session;

#[derive(Debug, Parser)]
#[command(name = "poromet", version, about = "Pore size analysis of SEM images via the Poromet service")]
pub struct Cli {
    /// SEM image to analyze
    pub image: PathBuf,

    /// Config file (defaults to <config dir>/poromet/config.toml)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// SEM magnification
    #[arg(long)]
    pub magnification: Option<String>,

    /// Max pore diameter in nm
    #[arg(long)]
    pub max_diam_nm: Option<String>,

    /// Threshold magnification
    #[arg(long)]
    pub thresh_mag: Option<String>,

    /// Skip saving the histogram and result bundle
    #[arg(long)]
    pub no_save: bool,
}

impl Cli {
    fn overrides(&self) -> Vec<(ParamKey, &str)> {
        [
            (ParamKey::Magnification, &self.magnification),
            (ParamKey::MaxDiamNm, &self.max_diam_nm),
            (ParamKey::ThreshMag, &self.thresh_mag),
        ]
        .into_iter()
        .filter_map(|(key, value)| value.as_deref().map(|v| (key, v)))
        .collect()
    }
}

pub async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    let first_probe_timeout = config.health_timeout() + std::time::Duration::from_secs(1);
    let session = Arc::new(Session::new(config)?);
    let _monitor = session.start_monitor();

    let file = SelectedFile::from_path(&cli.image)
        .with_context(|| format!("Failed to read image {:?}", cli.image))?;
    session.select_file(file);
    for (key, text) in cli.overrides() {
        session.set_param_text(key, text);
    }

    let view = session.view();
    println!("Poromet - Pore Size Analysis");
    for key in ParamKey::ALL {
        println!("  {}: {}", key.label(), view.params.get(key));
    }

    let status = session.wait_for_status(first_probe_timeout).await;
    println!("API Status: {}", status.label());
    if status != ApiStatus::Online {
        if let Some(hint) = session.view().offline_hint {
            eprintln!("{}", hint);
        }
    }

    let mut events = session.subscribe();
    let printer = tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            if let SessionEvent::Progress(p) = event {
                if p > 0 && p < 100 {
                    eprintln!("Processing image... {}%", p);
                }
            }
        }
    });

    let outcome = session.run_analysis().await;
    printer.abort();

    if let Err(e) = outcome {
        if let Some(detail) = e.detail() {
            warn!("{}", detail);
        }
        bail!("{}", e);
    }

    let Some(summary) = session.summary() else {
        bail!("Analysis finished without a result");
    };
    println!("Analysis Results ({})", summary.output_dir);
    for line in summary.lines() {
        println!("  {}", line);
    }

    if cli.no_save {
        return Ok(());
    }

    if let Some(image) = session.render_histogram().await {
        let path = session
            .download_dir()
            .join(histogram_file_name(&summary.output_dir, image.extension()));
        match write_atomic(&path, image.bytes()) {
            Ok(()) => println!("Histogram: {}", path.display()),
            Err(e) => warn!("Could not save histogram to {:?}: {}", path, e),
        }
    }

    match session.download_results().await {
        Ok(Some(path)) => println!("Results: {}", path.display()),
        Ok(None) => {}
        Err(e) => {
            if let Some(detail) = e.detail() {
                warn!("{}", detail);
            }
            bail!("{}", e);
        }
    }

    info!("Done");
    Ok(())
}
