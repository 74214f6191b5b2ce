use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::driver::Driver;

/// Persists failure screenshots
pub trait DiagnosticSink: Send + Sync {
    /// Store PNG bytes under `file_name`, returning where they landed
    fn persist(&self, file_name: &str, png: &[u8]) -> Result<PathBuf>;
}

/// Writes screenshots into a directory, creating it on first use
#[derive(Debug, Clone)]
pub struct FileSink {
    dir: PathBuf,
}

impl FileSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl DiagnosticSink for FileSink {
    fn persist(&self, file_name: &str, png: &[u8]) -> Result<PathBuf> {
        std::fs::create_dir_all(&self.dir).with_context(|| {
            format!("Failed to create screenshot directory {}", self.dir.display())
        })?;
        let path = self.dir.join(file_name);
        std::fs::write(&path, png)
            .with_context(|| format!("Failed to write screenshot {}", path.display()))?;
        Ok(path)
    }
}

/// Discards everything; used when screenshots are disabled
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl DiagnosticSink for NullSink {
    fn persist(&self, file_name: &str, _png: &[u8]) -> Result<PathBuf> {
        anyhow::bail!("screenshot capture disabled, dropped {}", file_name)
    }
}

/// Timestamped, filesystem-safe screenshot name for a failure label
pub fn screenshot_file_name(label: &str) -> String {
    let slug: String = label
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_lowercase() } else { '_' })
        .collect::<String>()
        .split('_')
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("_");
    let slug = if slug.is_empty() { "failure".to_string() } else { slug };
    format!(
        "{}_{}.png",
        slug,
        chrono::Local::now().format("%Y%m%d_%H%M%S_%3f")
    )
}

/// Best-effort screenshot of the current page.
///
/// Capture or persistence failures are logged and swallowed.
pub async fn capture_failure<D: Driver + ?Sized>(
    driver: &D,
    sink: &dyn DiagnosticSink,
    label: &str,
) -> Option<PathBuf> {
    let png = match driver.screenshot().await {
        Ok(png) => png,
        Err(e) => {
            warn!("Could not capture diagnostic screenshot for {}: {}", label, e);
            return None;
        }
    };

    match sink.persist(&screenshot_file_name(label), &png) {
        Ok(path) => {
            info!("Saved diagnostic screenshot to {}", path.display());
            Some(path)
        }
        Err(e) => {
            warn!("Could not persist diagnostic screenshot for {}: {:#}", label, e);
            None
        }
    }
}
