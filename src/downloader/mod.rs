// Download engine - resolution, orchestration, progress, persistence

pub mod backends;
pub mod errors;
pub mod ledger;
pub mod manager;
pub mod models;
pub mod orchestrator;
pub mod planner;
pub mod pool;
pub mod progress;
pub mod resolver;
pub mod sanitize;
pub mod traits;
pub mod utils;

pub use errors::DownloadError;
pub use ledger::StatusLedger;
pub use manager::{DownloadManager, DEFAULT_DOWNLOAD_CONCURRENCY};
pub use models::{
    BatchOptions, DownloadRecord, DownloadStatus, MediaItem, ProgressEvent, ProgressPhase,
    ProgressStatus,
};
pub use orchestrator::FetchOrchestrator;
pub use progress::ProgressCompositor;
pub use resolver::{read_url_list, UrlResolver, DEFAULT_RESOLVE_CONCURRENCY};
pub use traits::{FetchService, MediaProbe, ProbeEntry, Transcoder};
