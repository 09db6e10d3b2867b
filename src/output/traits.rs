//! Sink trait and harvest record types
//!
//! The harvester hands completed records to a sink. The trait seam keeps
//! the orchestration engine independent of the on-disk layout and lets
//! tests substitute a recording sink.

use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur during sink operations
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("Failed to write output: {0}")]
    Write(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Result type for sink operations
pub type SinkResult<T> = Result<T, SinkError>;

/// Summary of one finished harvest run
#[derive(Debug, Clone, Default, Serialize)]
pub struct HarvestSummary {
    pub started_at: String,
    pub finished_at: String,
    pub config_hash: String,
    pub jobs_issued: u64,
    pub jobs_completed: u64,
    pub jobs_failed: u64,
    pub pages_written: u64,
    pub images_downloaded: u64,
    pub edit_histories: u64,
    pub redirects: u64,
}

/// Receives completed records from the harvester
pub trait Sink: Send {
    /// Site metadata record.
    fn write_siteinfo(&mut self, siteinfo: &Value) -> SinkResult<()>;

    /// A batch of page records, each with one or more revisions. Returns
    /// the number of revisions written.
    fn write_pages(&mut self, data: &Value) -> SinkResult<u64>;

    /// Accumulated edit-history records.
    fn write_edits(&mut self, edits: &[Value]) -> SinkResult<()>;

    /// The redirect mapping.
    fn write_redirects(&mut self, redirects: &BTreeMap<String, String>) -> SinkResult<()>;

    /// Bytes of one downloaded image; returns the local path.
    fn write_image(&mut self, title: &str, bytes: &[u8]) -> SinkResult<PathBuf>;

    /// Closing run summary.
    fn write_summary(&mut self, summary: &HarvestSummary) -> SinkResult<()>;
}
