// Common data models for the download engine

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use time::OffsetDateTime;

/// A single resolvable media unit, possibly one entry of a playlist.
///
/// Produced by the resolver, immutable afterwards. `url` is the unique key
/// used by the ledger and the progress channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaItem {
    pub title: String,
    pub url: String,
    /// Duration in whole seconds (0 when the service did not report one).
    pub duration: u64,
    pub uploader: String,
    pub is_playlist: bool,
    pub playlist_title: Option<String>,
    pub playlist_uploader: Option<String>,
}

/// Lifecycle of one ledger record. Forward-only once the manager drives it:
/// Pending -> Downloading -> (Converting) -> Completed | Failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DownloadStatus {
    Pending,
    Downloading,
    Converting,
    Completed,
    Failed,
}

impl DownloadStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

/// One persisted entry of the download ledger.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownloadRecord {
    pub title: String,
    pub url: String,
    #[serde(default)]
    pub file_path: Option<String>,
    pub status: DownloadStatus,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
    #[serde(default)]
    pub error_message: Option<String>,
}

impl DownloadRecord {
    pub fn pending(title: &str, url: &str) -> Self {
        Self {
            title: title.to_string(),
            url: url.to_string(),
            file_path: None,
            status: DownloadStatus::Pending,
            timestamp: OffsetDateTime::now_utc(),
            error_message: None,
        }
    }
}

/// Status tag carried by progress events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProgressStatus {
    Downloading,
    Converting,
    Finished,
}

/// Which phase of the unified 0-100 scale an event belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProgressPhase {
    Download,
    Conversion,
    Completed,
}

/// One progress update for one item, tagged with the item url so concurrent
/// streams never interleave. Ephemeral, never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressEvent {
    pub url: String,
    pub status: ProgressStatus,
    pub phase: ProgressPhase,
    pub percent: f32,
    #[serde(default)]
    pub downloaded_bytes: Option<u64>,
    #[serde(default)]
    pub total_bytes: Option<u64>,
    /// Bytes per second.
    #[serde(default)]
    pub speed: Option<f64>,
    #[serde(default)]
    pub message: Option<String>,
}

/// Options for one batch run.
#[derive(Debug, Clone)]
pub struct BatchOptions {
    pub output_dir: PathBuf,
    pub convert_to_mp3: bool,
    /// Keep the fetched video file after a successful conversion.
    pub keep_original: bool,
    pub concurrency: usize,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            output_dir: dirs::download_dir().unwrap_or_else(|| PathBuf::from(".")),
            convert_to_mp3: true,
            keep_original: false,
            concurrency: crate::downloader::manager::DEFAULT_DOWNLOAD_CONCURRENCY,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_serializes_lowercase() {
        let json = serde_json::to_string(&DownloadStatus::Downloading).unwrap();
        assert_eq!(json, "\"downloading\"");
        let back: DownloadStatus = serde_json::from_str("\"failed\"").unwrap();
        assert_eq!(back, DownloadStatus::Failed);
    }

    #[test]
    fn record_tolerates_missing_optional_fields() {
        let json = r#"{
            "title": "Song A",
            "url": "https://example.com/a",
            "status": "pending",
            "timestamp": "2024-05-01T12:00:00Z"
        }"#;
        let record: DownloadRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.status, DownloadStatus::Pending);
        assert!(record.file_path.is_none());
        assert!(record.error_message.is_none());
    }

    #[test]
    fn terminal_statuses() {
        assert!(DownloadStatus::Completed.is_terminal());
        assert!(DownloadStatus::Failed.is_terminal());
        assert!(!DownloadStatus::Converting.is_terminal());
    }
}
