// Collaborator traits: media service and transcoder

use async_trait::async_trait;
use serde::Deserialize;
use std::path::{Path, PathBuf};

use super::errors::DownloadError;
use super::progress::RawProgress;

/// Callback invoked with raw fetch-phase progress, 0-100 per attempt.
pub type FetchProgressFn<'a> = &'a (dyn Fn(RawProgress) + Send + Sync);

/// Callback invoked with raw transcode-phase progress, 0-100.
pub type TranscodeProgressFn<'a> = &'a (dyn Fn(f32) + Send + Sync);

/// Metadata-only lookup result, normalized at the service boundary.
/// Unknown fields from the service are dropped; absent ones default.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MediaProbe {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub uploader: Option<String>,
    #[serde(default)]
    pub duration: Option<f64>,
    #[serde(default)]
    pub webpage_url: Option<String>,
    /// Present (and flat) when the url is a playlist.
    #[serde(default)]
    pub entries: Option<Vec<ProbeEntry>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProbeEntry {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub duration: Option<f64>,
    #[serde(default)]
    pub uploader: Option<String>,
}

/// The external media resolution/fetch collaborator.
#[async_trait]
pub trait FetchService: Send + Sync {
    /// Name of the service (for logging)
    fn name(&self) -> &'static str;

    /// Metadata-only lookup with flatten-playlist semantics.
    async fn probe(&self, url: &str) -> Result<MediaProbe, DownloadError>;

    /// Fetch the media stream for `url` into `dest_dir` using the given
    /// format selector, streaming raw progress. Returns the artifact path.
    async fn fetch(
        &self,
        url: &str,
        dest_dir: &Path,
        selector: &str,
        on_progress: FetchProgressFn<'_>,
    ) -> Result<PathBuf, DownloadError>;
}

/// The external transcode collaborator.
#[async_trait]
pub trait Transcoder: Send + Sync {
    /// Convert a fetched artifact, returning the new artifact path.
    /// `duration_hint` is the source duration in seconds when known, used
    /// to turn encoder timestamps into percentages.
    async fn transcode(
        &self,
        input: &Path,
        duration_hint: Option<f64>,
        on_progress: TranscodeProgressFn<'_>,
    ) -> Result<PathBuf, DownloadError>;
}
