// Per-item fetch/transcode state machine with format-fallback retry

use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

use super::errors::DownloadError;
use super::models::{BatchOptions, MediaItem};
use super::planner::plan_destination;
use super::progress::{ProgressCompositor, RawProgress};
use super::traits::{FetchService, Transcoder};

/// Ordered preference: capped best, capped merge, anything, worst. At least
/// one of these is virtually always satisfiable.
pub const PRIMARY_SELECTOR: &str =
    "best[height<=1080]/bestvideo[height<=1080]+bestaudio/best/worst";

/// Most permissive selector, used for the single fallback retry.
pub const FALLBACK_SELECTOR: &str = "worst";

pub struct FetchOrchestrator {
    service: Arc<dyn FetchService>,
    transcoder: Arc<dyn Transcoder>,
}

impl FetchOrchestrator {
    pub fn new(service: Arc<dyn FetchService>, transcoder: Arc<dyn Transcoder>) -> Self {
        Self {
            service,
            transcoder,
        }
    }

    /// Drive one item through fetch and, when requested, transcode.
    /// Returns the final artifact path.
    pub async fn run(
        &self,
        item: &MediaItem,
        opts: &BatchOptions,
        progress: &ProgressCompositor,
    ) -> Result<PathBuf, DownloadError> {
        let dest = plan_destination(&opts.output_dir, item);
        info!(url = %item.url, dest = %dest.display(), "starting fetch");

        let fetched = self.fetch_with_fallback(item, &dest, progress).await?;
        progress.fetch_finished();

        if !opts.convert_to_mp3 {
            return Ok(fetched);
        }

        let duration_hint = (item.duration > 0).then_some(item.duration as f64);
        let on_transcode = |raw: f32| progress.transcode_progress(raw);
        let converted = self
            .transcoder
            .transcode(&fetched, duration_hint, &on_transcode)
            .await?;
        // Transcode errors propagate above with the fetched file left in
        // place: the download itself succeeded.

        if !opts.keep_original {
            match std::fs::remove_file(&fetched) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => {
                    warn!(path = %fetched.display(), error = %e, "could not remove source file");
                }
            }
        }

        progress.finished();
        info!(url = %item.url, path = %converted.display(), "item complete");
        Ok(converted)
    }

    async fn fetch_with_fallback(
        &self,
        item: &MediaItem,
        dest: &std::path::Path,
        progress: &ProgressCompositor,
    ) -> Result<PathBuf, DownloadError> {
        let on_fetch = |raw: RawProgress| progress.fetch_progress(raw);

        let primary_err = match self
            .service
            .fetch(&item.url, dest, PRIMARY_SELECTOR, &on_fetch)
            .await
        {
            Ok(path) => return Ok(path),
            Err(e) if e.is_format_fallback_candidate() => e,
            Err(e) => return Err(e),
        };

        warn!(url = %item.url, error = %primary_err, "primary fetch failed, retrying with worst");
        match self
            .service
            .fetch(&item.url, dest, FALLBACK_SELECTOR, &on_fetch)
            .await
        {
            Ok(path) => Ok(path),
            Err(fallback_err) => Err(DownloadError::AttemptsExhausted {
                primary: primary_err.to_string(),
                fallback: fallback_err.to_string(),
            }),
        }
    }
}
