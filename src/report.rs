//! Validation requests, results and the downloadable report file.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

pub const REPORT_FILE_NAME: &str = "validator_report.md";
pub const REPORT_MIME_TYPE: &str = "text/markdown";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationRequest {
    pub idea_text: String,
    /// Unix timestamp in seconds.
    pub submitted_at: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationResult {
    /// Markdown exactly as returned by the provider.
    pub report_text: String,
    /// Name of the provider that produced the report.
    pub produced_by: String,
}

/// A report prepared for download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportDownload {
    pub file_name: &'static str,
    pub mime_type: &'static str,
    pub contents: String,
}

impl ReportDownload {
    pub fn from_result(result: &ValidationResult) -> Self {
        Self {
            file_name: REPORT_FILE_NAME,
            mime_type: REPORT_MIME_TYPE,
            contents: result.report_text.clone(),
        }
    }

    /// Writes the report into `dir`, replacing any previous download.
    pub fn save_to(&self, dir: &Path) -> Result<PathBuf> {
        fs::create_dir_all(dir)?;
        let path = dir.join(self.file_name);
        fs::write(&path, &self.contents)?;
        info!("Saved {} ({}) to {}", self.file_name, self.mime_type, path.display());
        Ok(path)
    }
}
