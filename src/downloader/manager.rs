// Batch execution over the download pool

use std::sync::Arc;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{error, info};

use super::ledger::StatusLedger;
use super::models::{BatchOptions, DownloadStatus, MediaItem, ProgressEvent};
use super::orchestrator::FetchOrchestrator;
use super::pool::WorkerPool;
use super::progress::ProgressCompositor;
use super::traits::{FetchService, Transcoder};

/// Default width of the download pool. Transcoding is CPU-bound, so this
/// sits lower than the resolution pool.
pub const DEFAULT_DOWNLOAD_CONCURRENCY: usize = 2;

/// Runs the orchestrator over many items, recording every outcome in the
/// ledger. One item failing never aborts the rest.
pub struct DownloadManager {
    orchestrator: FetchOrchestrator,
    ledger: Arc<StatusLedger>,
    events: UnboundedSender<ProgressEvent>,
}

impl DownloadManager {
    pub fn new(
        service: Arc<dyn FetchService>,
        transcoder: Arc<dyn Transcoder>,
        ledger: Arc<StatusLedger>,
        events: UnboundedSender<ProgressEvent>,
    ) -> Self {
        Self {
            orchestrator: FetchOrchestrator::new(service, transcoder),
            ledger,
            events,
        }
    }

    /// Download all `items`, at most `opts.concurrency` at a time.
    /// Returns `(item, success)` pairs in completion order.
    pub async fn run_batch(
        &self,
        items: Vec<MediaItem>,
        opts: &BatchOptions,
    ) -> Vec<(MediaItem, bool)> {
        for item in &items {
            self.ledger.add_pending(&item.title, &item.url);
        }

        let pool = WorkerPool::new("download", opts.concurrency);
        let tasks: Vec<_> = items
            .into_iter()
            .map(|item| self.run_one(item, opts))
            .collect();

        let results = pool.run(tasks).await;
        let succeeded = results.iter().filter(|(_, ok)| *ok).count();
        info!(total = results.len(), succeeded, "batch finished");
        results
    }

    async fn run_one(&self, item: MediaItem, opts: &BatchOptions) -> (MediaItem, bool) {
        self.ledger
            .update_status(&item.url, DownloadStatus::Downloading, None, None);

        let compositor = ProgressCompositor::new(
            item.url.clone(),
            opts.convert_to_mp3,
            self.events.clone(),
        );

        match self.orchestrator.run(&item, opts, &compositor).await {
            Ok(path) => {
                self.ledger.update_status(
                    &item.url,
                    DownloadStatus::Completed,
                    Some(&path.to_string_lossy()),
                    None,
                );
                info!(title = %item.title, "download completed");
                (item, true)
            }
            Err(e) => {
                self.ledger.update_status(
                    &item.url,
                    DownloadStatus::Failed,
                    None,
                    Some(&e.to_string()),
                );
                error!(title = %item.title, error = %e, "download failed");
                (item, false)
            }
        }
    }
}
