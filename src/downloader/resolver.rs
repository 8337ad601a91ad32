// URL resolution: one url in, zero or more media items out

use std::path::Path;
use std::sync::Arc;
use tracing::{error, info, warn};

use super::models::MediaItem;
use super::pool::WorkerPool;
use super::traits::{FetchService, MediaProbe};

/// Default width of the resolution pool. Metadata lookups are I/O-bound,
/// so this sits higher than the download pool.
pub const DEFAULT_RESOLVE_CONCURRENCY: usize = 3;

pub struct UrlResolver {
    service: Arc<dyn FetchService>,
}

impl UrlResolver {
    pub fn new(service: Arc<dyn FetchService>) -> Self {
        Self { service }
    }

    /// Resolve one url into its media items.
    ///
    /// A playlist yields one item per entry, all sharing the playlist
    /// metadata. Lookup failure is absorbed here: it is logged and yields
    /// an empty list, never an error.
    pub async fn resolve(&self, url: &str) -> Vec<MediaItem> {
        match self.service.probe(url).await {
            Ok(probe) => self.items_from_probe(url, probe),
            Err(e) => {
                error!(url, error = %e, "metadata lookup failed");
                Vec::new()
            }
        }
    }

    /// Resolve many urls on the resolution pool, concatenating per-url
    /// results in completion order.
    pub async fn resolve_many(&self, urls: &[String], concurrency: usize) -> Vec<MediaItem> {
        let pool = WorkerPool::new("resolve", concurrency);
        let tasks: Vec<_> = urls
            .iter()
            .map(|url| {
                let url = url.clone();
                async move {
                    let items = self.resolve(&url).await;
                    info!(url, items = items.len(), "resolved");
                    items
                }
            })
            .collect();

        let resolved = pool.run(tasks).await;
        let all: Vec<MediaItem> = resolved.into_iter().flatten().collect();
        info!(total = all.len(), "resolution finished");
        all
    }

    fn items_from_probe(&self, url: &str, probe: MediaProbe) -> Vec<MediaItem> {
        match probe.entries {
            Some(entries) if !entries.is_empty() => {
                let playlist_title = probe
                    .title
                    .unwrap_or_else(|| "Unknown Playlist".to_string());
                let playlist_uploader =
                    probe.uploader.unwrap_or_else(|| "Unknown".to_string());

                let items: Vec<MediaItem> = entries
                    .into_iter()
                    .filter_map(|entry| {
                        // Entries without an id cannot be fetched; skip them
                        // without failing the playlist.
                        let id = entry.id?;
                        let entry_url = entry
                            .url
                            .unwrap_or_else(|| format!("https://www.youtube.com/watch?v={}", id));
                        Some(MediaItem {
                            title: entry.title.unwrap_or_else(|| "Unknown".to_string()),
                            url: entry_url,
                            duration: entry.duration.unwrap_or(0.0).max(0.0) as u64,
                            uploader: entry.uploader.unwrap_or_else(|| "Unknown".to_string()),
                            is_playlist: true,
                            playlist_title: Some(playlist_title.clone()),
                            playlist_uploader: Some(playlist_uploader.clone()),
                        })
                    })
                    .collect();

                info!(
                    playlist = %playlist_title,
                    items = items.len(),
                    "playlist detected"
                );
                items
            }
            Some(_) => {
                warn!(url, "playlist probe returned no entries");
                Vec::new()
            }
            None => vec![MediaItem {
                title: probe.title.unwrap_or_else(|| "Unknown".to_string()),
                url: url.to_string(),
                duration: probe.duration.unwrap_or(0.0).max(0.0) as u64,
                uploader: probe.uploader.unwrap_or_else(|| "Unknown".to_string()),
                is_playlist: false,
                playlist_title: None,
                playlist_uploader: None,
            }],
        }
    }
}

/// Read a url-per-line list file, skipping blank lines.
pub fn read_url_list(path: &Path) -> std::io::Result<Vec<String>> {
    let content = std::fs::read_to_string(path)?;
    Ok(content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect())
}
