// ffmpeg backed mp3 transcoder

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::downloader::errors::DownloadError;
use crate::downloader::traits::{Transcoder, TranscodeProgressFn};
use crate::downloader::utils::{locate_tool, run_streaming_lines};

/// [`Transcoder`] implementation shelling out to ffmpeg, producing a
/// VBR mp3 (libmp3lame -q:a 2) next to the input.
pub struct FfmpegTranscoder {
    bin: PathBuf,
}

impl FfmpegTranscoder {
    pub fn new() -> Result<Self, DownloadError> {
        match locate_tool("ffmpeg") {
            Some(bin) => {
                info!(bin = %bin.display(), "ffmpeg located");
                Ok(Self { bin })
            }
            None => Err(DownloadError::ToolNotFound("ffmpeg".to_string())),
        }
    }

    pub fn with_binary(bin: impl Into<PathBuf>) -> Self {
        Self { bin: bin.into() }
    }

    pub fn check_available(&self) -> bool {
        self.bin.exists()
    }
}

#[async_trait]
impl Transcoder for FfmpegTranscoder {
    async fn transcode(
        &self,
        input: &Path,
        duration_hint: Option<f64>,
        on_progress: TranscodeProgressFn<'_>,
    ) -> Result<PathBuf, DownloadError> {
        let output = input.with_extension("mp3");
        debug!(input = %input.display(), output = %output.display(), "transcoding");

        // -progress pipe:1 puts key=value progress on stdout, one per line
        let args = vec![
            "-y".to_string(),
            "-i".to_string(),
            input.to_string_lossy().into_owned(),
            "-vn".to_string(),
            "-codec:a".to_string(),
            "libmp3lame".to_string(),
            "-q:a".to_string(),
            "2".to_string(),
            "-progress".to_string(),
            "pipe:1".to_string(),
            "-nostats".to_string(),
            output.to_string_lossy().into_owned(),
        ];

        let (status, stderr) = run_streaming_lines(&self.bin, &args, |line| {
            if let Some(done_secs) = parse_progress_seconds(line) {
                if let Some(total) = duration_hint.filter(|d| *d > 0.0) {
                    let percent = ((done_secs / total) * 100.0).clamp(0.0, 100.0) as f32;
                    on_progress(percent);
                }
            }
        })
        .await
        .map_err(|e| match e {
            DownloadError::ToolNotFound(_) => e,
            other => DownloadError::Transcode(other.to_string()),
        })?;

        if !status.success() {
            return Err(DownloadError::Transcode(stderr_tail(&stderr)));
        }
        if !output.exists() {
            return Err(DownloadError::Transcode(format!(
                "ffmpeg succeeded but {} is missing",
                output.display()
            )));
        }

        on_progress(100.0);
        Ok(output)
    }
}

/// Seconds of output encoded so far, from a `-progress` key=value line.
/// `out_time_ms` is microseconds despite the name; `out_time` is a
/// HH:MM:SS.micros clock.
fn parse_progress_seconds(line: &str) -> Option<f64> {
    if let Some(value) = line.strip_prefix("out_time_ms=") {
        return value.trim().parse::<f64>().ok().map(|us| us / 1_000_000.0);
    }
    if let Some(value) = line.strip_prefix("out_time=") {
        return parse_clock(value.trim());
    }
    None
}

fn parse_clock(clock: &str) -> Option<f64> {
    let mut parts = clock.split(':');
    let hours: f64 = parts.next()?.parse().ok()?;
    let minutes: f64 = parts.next()?.parse().ok()?;
    let seconds: f64 = parts.next()?.parse().ok()?;
    if parts.next().is_some() {
        return None;
    }
    Some(hours * 3600.0 + minutes * 60.0 + seconds)
}

fn stderr_tail(stderr: &str) -> String {
    let lines: Vec<&str> = stderr
        .lines()
        .filter(|line| !line.trim().is_empty())
        .collect();
    let tail = lines.len().saturating_sub(3);
    let tail = &lines[tail..];
    if tail.is_empty() {
        "ffmpeg failed with no diagnostics".to_string()
    } else {
        tail.join("; ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn out_time_ms_is_microseconds() {
        assert_eq!(parse_progress_seconds("out_time_ms=90000000"), Some(90.0));
    }

    #[test]
    fn out_time_clock_parses() {
        let secs = parse_progress_seconds("out_time=00:01:30.500000").unwrap();
        assert!((secs - 90.5).abs() < 1e-6);
    }

    #[test]
    fn unrelated_progress_keys_are_ignored() {
        assert_eq!(parse_progress_seconds("bitrate= 192.0kbits/s"), None);
        assert_eq!(parse_progress_seconds("progress=continue"), None);
        assert_eq!(parse_progress_seconds("out_time=bogus"), None);
    }

    #[test]
    fn stderr_tail_keeps_the_last_lines() {
        let tail = stderr_tail("a\nb\nc\nd\ne\n");
        assert_eq!(tail, "c; d; e");
        assert_eq!(stderr_tail("\n\n"), "ffmpeg failed with no diagnostics");
    }
}
