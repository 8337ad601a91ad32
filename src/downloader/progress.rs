// Two-phase progress compositing and yt-dlp output parsing

use regex::Regex;
use std::sync::Mutex;
use tokio::sync::mpsc::UnboundedSender;

use super::models::{ProgressEvent, ProgressPhase, ProgressStatus};

/// Share of the unified 0-100 scale occupied by the fetch phase.
const DOWNLOAD_SHARE: f32 = 0.7;

/// Raw fetch-phase progress as reported by the service, 0-100 per attempt.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RawProgress {
    pub percent: f32,
    pub downloaded_bytes: Option<u64>,
    pub total_bytes: Option<u64>,
    /// Bytes per second.
    pub speed: Option<f64>,
}

/// What one line of yt-dlp `--newline` output told us.
#[derive(Debug, Clone, PartialEq)]
pub enum FetchLine {
    Progress(RawProgress),
    Destination(String),
    /// `[Merger] Merging formats into "<path>"` - the merged file is the
    /// real artifact.
    Merged(String),
    AlreadyDownloaded(String),
}

lazy_static::lazy_static! {
    // [download]  12.5% of ~ 310.04MiB at  374.36KiB/s ETA 11:59
    static ref PROGRESS_RE: Regex = Regex::new(
        r"\[download\]\s+(\d+\.?\d*)%\s+of\s+~?\s*(\d+\.?\d*)\s*([KMGT]?i?B)\s+at\s+(\d+\.?\d*)\s*([KMGT]?i?B)/s"
    ).unwrap();
    static ref DEST_RE: Regex = Regex::new(r"\[download\]\s+Destination:\s+(.+)").unwrap();
    static ref MERGE_RE: Regex = Regex::new(r#"\[Merger\]\s+Merging formats into\s+"(.+)""#).unwrap();
    static ref ALREADY_RE: Regex = Regex::new(r"\[download\]\s+(.+?)\s+has already been downloaded").unwrap();
}

fn unit_multiplier(unit: &str) -> f64 {
    match unit {
        "B" => 1.0,
        "KiB" | "KB" => 1024.0,
        "MiB" | "MB" => 1024.0 * 1024.0,
        "GiB" | "GB" => 1024.0 * 1024.0 * 1024.0,
        "TiB" | "TB" => 1024.0 * 1024.0 * 1024.0 * 1024.0,
        _ => 1.0,
    }
}

/// Parse one line of yt-dlp `--newline` output.
pub fn parse_fetch_line(line: &str) -> Option<FetchLine> {
    if let Some(caps) = PROGRESS_RE.captures(line) {
        let percent: f32 = caps.get(1)?.as_str().parse().ok()?;
        let total = caps
            .get(2)
            .and_then(|m| m.as_str().parse::<f64>().ok())
            .zip(caps.get(3))
            .map(|(n, u)| (n * unit_multiplier(u.as_str())) as u64);
        let speed = caps
            .get(4)
            .and_then(|m| m.as_str().parse::<f64>().ok())
            .zip(caps.get(5))
            .map(|(n, u)| n * unit_multiplier(u.as_str()));
        let downloaded = total.map(|t| (t as f64 * f64::from(percent) / 100.0) as u64);

        return Some(FetchLine::Progress(RawProgress {
            percent,
            downloaded_bytes: downloaded,
            total_bytes: total,
            speed,
        }));
    }

    if let Some(caps) = DEST_RE.captures(line) {
        return Some(FetchLine::Destination(caps.get(1)?.as_str().trim().to_string()));
    }

    if let Some(caps) = MERGE_RE.captures(line) {
        return Some(FetchLine::Merged(caps.get(1)?.as_str().to_string()));
    }

    if let Some(caps) = ALREADY_RE.captures(line) {
        return Some(FetchLine::AlreadyDownloaded(
            caps.get(1)?.as_str().to_string(),
        ));
    }

    None
}

/// Maps raw phase-local progress of one item onto the unified 0-100 scale
/// and pushes the result down the event channel.
///
/// Fetch occupies 0-70, conversion 70-100. A per-phase high-water mark
/// keeps the reported percent non-decreasing even when a fallback retry
/// restarts the raw stream at zero.
pub struct ProgressCompositor {
    url: String,
    convert_requested: bool,
    sink: UnboundedSender<ProgressEvent>,
    high_water: Mutex<f32>,
}

impl ProgressCompositor {
    pub fn new(url: String, convert_requested: bool, sink: UnboundedSender<ProgressEvent>) -> Self {
        Self {
            url,
            convert_requested,
            sink,
            high_water: Mutex::new(0.0),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    fn emit(&self, mut event: ProgressEvent) {
        let mut high = self.high_water.lock().unwrap();
        if event.percent < *high {
            event.percent = *high;
        } else {
            *high = event.percent;
        }
        // A closed receiver just means nobody is listening anymore.
        let _ = self.sink.send(event);
    }

    /// Raw fetch progress: unified percent = raw * 0.7.
    pub fn fetch_progress(&self, raw: RawProgress) {
        self.emit(ProgressEvent {
            url: self.url.clone(),
            status: ProgressStatus::Downloading,
            phase: ProgressPhase::Download,
            percent: (raw.percent.clamp(0.0, 100.0)) * DOWNLOAD_SHARE,
            downloaded_bytes: raw.downloaded_bytes,
            total_bytes: raw.total_bytes,
            speed: raw.speed,
            message: None,
        });
    }

    /// Fetch phase done. Emits the 70% conversion boundary when a transcode
    /// follows, the terminal event otherwise.
    pub fn fetch_finished(&self) {
        if self.convert_requested {
            self.emit(ProgressEvent {
                url: self.url.clone(),
                status: ProgressStatus::Converting,
                phase: ProgressPhase::Conversion,
                percent: 100.0 * DOWNLOAD_SHARE,
                downloaded_bytes: None,
                total_bytes: None,
                speed: None,
                message: Some("Converting to MP3...".to_string()),
            });
        } else {
            self.finished();
        }
    }

    /// Raw transcode progress: unified percent = 70 + raw * 0.3.
    pub fn transcode_progress(&self, raw_percent: f32) {
        let unified =
            100.0 * DOWNLOAD_SHARE + raw_percent.clamp(0.0, 100.0) * (1.0 - DOWNLOAD_SHARE);
        self.emit(ProgressEvent {
            url: self.url.clone(),
            status: ProgressStatus::Converting,
            phase: ProgressPhase::Conversion,
            percent: unified,
            downloaded_bytes: None,
            total_bytes: None,
            speed: None,
            message: None,
        });
    }

    /// Exactly one of these terminates a successful item.
    pub fn finished(&self) {
        self.emit(ProgressEvent {
            url: self.url.clone(),
            status: ProgressStatus::Finished,
            phase: ProgressPhase::Completed,
            percent: 100.0,
            downloaded_bytes: None,
            total_bytes: None,
            speed: None,
            message: None,
        });
    }
}
