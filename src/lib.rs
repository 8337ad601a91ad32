//! Batch media download engine built on yt-dlp and ffmpeg.
//!
//! Urls are resolved into individual media items (playlists flatten into
//! one item per entry), fetched on a bounded worker pool with a one-shot
//! format fallback, optionally transcoded to mp3, and tracked in a
//! persisted status ledger. Progress for each item is composited onto a
//! single 0-100 scale and streamed over a channel.

pub mod downloader;

pub use downloader::backends::{FfmpegTranscoder, YtDlpService};
pub use downloader::{
    read_url_list, BatchOptions, DownloadError, DownloadManager, DownloadRecord, DownloadStatus,
    MediaItem, ProgressEvent, StatusLedger, UrlResolver,
};
