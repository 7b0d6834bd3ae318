//! Saving result bundles to disk.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tempfile::NamedTempFile;
use tracing::info;

use crate::api::PorometApi;
use crate::error::PorometError;

/// `output_dir` made safe to embed in a file name.
///
/// Path separators, drive colons and NUL become `_`, so the file always
/// lands directly in the download directory.
pub fn file_name_component(output_dir: &str) -> String {
    output_dir
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '\0' => '_',
            c => c,
        })
        .collect()
}

/// File name for a bundle: `poromet_results_<output_dir>.zip`.
pub fn bundle_file_name(output_dir: &str) -> String {
    format!("poromet_results_{}.zip", file_name_component(output_dir))
}

/// File name for a saved histogram: `poromet_histogram_<output_dir>.<ext>`.
pub fn histogram_file_name(output_dir: &str, extension: &str) -> String {
    format!(
        "poromet_histogram_{}.{}",
        file_name_component(output_dir),
        extension
    )
}

/// Write `bytes` to `target` through a temp file in the same directory.
///
/// Readers never see a partial file, and an interrupted write leaves only
/// the temp file, which is removed when dropped.
pub fn write_atomic(target: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let parent = target.parent().filter(|p| !p.as_os_str().is_empty()).unwrap_or(Path::new("."));
    std::fs::create_dir_all(parent)?;

    let mut temp = NamedTempFile::new_in(parent)?;
    temp.write_all(bytes)?;
    temp.flush()?;
    temp.persist(target).map_err(|e| e.error)?;
    Ok(())
}

pub struct ResultDownloader {
    api: Arc<dyn PorometApi>,
    download_dir: PathBuf,
}

impl ResultDownloader {
    pub fn new(api: Arc<dyn PorometApi>, download_dir: PathBuf) -> Self {
        Self { api, download_dir }
    }

    pub fn download_dir(&self) -> &Path {
        &self.download_dir
    }

    /// Fetch the bundle for `output_dir` and save it. No retry, no resume.
    pub async fn download(&self, output_dir: &str) -> Result<PathBuf, PorometError> {
        let bytes = self.api.download(output_dir).await?;
        let target = self.download_dir.join(bundle_file_name(output_dir));

        let path = target.clone();
        tokio::task::spawn_blocking(move || write_atomic(&path, &bytes))
            .await
            .map_err(|e| PorometError::Download(format!("Save task failed: {}", e)))?
            .map_err(|e| PorometError::Download(format!("Failed to save {:?}: {}", target, e)))?;

        info!("Saved results to {:?}", target);
        Ok(target)
    }
}
