// yt-dlp backed media service

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::downloader::errors::DownloadError;
use crate::downloader::progress::{parse_fetch_line, FetchLine};
use crate::downloader::traits::{FetchProgressFn, FetchService, MediaProbe};
use crate::downloader::utils::{locate_tool, run_output_with_timeout, run_streaming_lines};

const PROBE_TIMEOUT_SECS: u64 = 30;
const VERSION_TIMEOUT_SECS: u64 = 10;

/// [`FetchService`] implementation shelling out to yt-dlp.
pub struct YtDlpService {
    bin: PathBuf,
}

impl YtDlpService {
    /// Locate yt-dlp on this system.
    pub fn new() -> Result<Self, DownloadError> {
        match locate_tool("yt-dlp") {
            Some(bin) => {
                info!(bin = %bin.display(), "yt-dlp located");
                Ok(Self { bin })
            }
            None => Err(DownloadError::ToolNotFound("yt-dlp".to_string())),
        }
    }

    /// Use a specific binary instead of searching for one.
    pub fn with_binary(bin: impl Into<PathBuf>) -> Self {
        Self { bin: bin.into() }
    }

    /// Report the installed yt-dlp version, if the tool runs at all.
    pub async fn version(&self) -> Option<String> {
        let args = vec!["--version".to_string()];
        let out = run_output_with_timeout(&self.bin, &args, VERSION_TIMEOUT_SECS)
            .await
            .ok()?;
        out.status
            .success()
            .then(|| String::from_utf8_lossy(&out.stdout).trim().to_string())
    }

    pub async fn check_available(&self) -> bool {
        self.version().await.is_some()
    }
}

#[async_trait]
impl FetchService for YtDlpService {
    fn name(&self) -> &'static str {
        "yt-dlp"
    }

    async fn probe(&self, url: &str) -> Result<MediaProbe, DownloadError> {
        let args = vec![
            "--dump-single-json".to_string(),
            "--flat-playlist".to_string(),
            "--quiet".to_string(),
            "--no-warnings".to_string(),
            "--ignore-errors".to_string(),
            url.to_string(),
        ];

        let out = run_output_with_timeout(&self.bin, &args, PROBE_TIMEOUT_SECS).await?;
        if !out.status.success() {
            let stderr = String::from_utf8_lossy(&out.stderr);
            return Err(DownloadError::Resolution(first_error_line(&stderr)));
        }

        serde_json::from_slice(&out.stdout)
            .map_err(|e| DownloadError::Resolution(format!("unreadable metadata: {}", e)))
    }

    async fn fetch(
        &self,
        url: &str,
        dest_dir: &Path,
        selector: &str,
        on_progress: FetchProgressFn<'_>,
    ) -> Result<PathBuf, DownloadError> {
        let args = vec![
            "-f".to_string(),
            selector.to_string(),
            "--newline".to_string(),
            "--no-playlist".to_string(),
            "--merge-output-format".to_string(),
            "mp4".to_string(),
            "-P".to_string(),
            dest_dir.to_string_lossy().into_owned(),
            "-o".to_string(),
            "%(title)s.%(ext)s".to_string(),
            url.to_string(),
        ];

        let mut artifact: Option<String> = None;
        let (status, stderr) = run_streaming_lines(&self.bin, &args, |line| {
            match parse_fetch_line(line) {
                Some(FetchLine::Progress(raw)) => on_progress(raw),
                Some(FetchLine::Destination(path)) => {
                    debug!(path, "download started");
                    artifact = Some(path);
                }
                // The merged file supersedes the per-stream destinations.
                Some(FetchLine::Merged(path)) => artifact = Some(path),
                Some(FetchLine::AlreadyDownloaded(path)) => {
                    info!(path, "file already present");
                    artifact = Some(path);
                }
                None => {}
            }
        })
        .await?;

        if !status.success() {
            return Err(DownloadError::from(first_error_line(&stderr)));
        }

        let artifact = match artifact {
            Some(path) => resolve_artifact(dest_dir, &path),
            None => {
                warn!(url, "yt-dlp reported success but printed no destination");
                return Err(DownloadError::MissingArtifact(
                    dest_dir.to_string_lossy().into_owned(),
                ));
            }
        };
        if !artifact.exists() {
            return Err(DownloadError::MissingArtifact(
                artifact.to_string_lossy().into_owned(),
            ));
        }
        Ok(artifact)
    }
}

/// yt-dlp prints destinations relative to `-P` in some versions, absolute
/// in others.
fn resolve_artifact(dest_dir: &Path, reported: &str) -> PathBuf {
    let path = PathBuf::from(reported);
    if path.is_absolute() {
        path
    } else {
        dest_dir.join(path)
    }
}

/// The first ERROR: line of stderr, or the trimmed tail if there is none.
fn first_error_line(stderr: &str) -> String {
    stderr
        .lines()
        .find(|line| line.starts_with("ERROR:"))
        .or_else(|| stderr.lines().rev().find(|line| !line.trim().is_empty()))
        .unwrap_or("unknown error")
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relative_destination_lands_under_dest_dir() {
        let dest = Path::new("/out/My Mix");
        assert_eq!(
            resolve_artifact(dest, "Song A.mp4"),
            PathBuf::from("/out/My Mix/Song A.mp4")
        );
        assert_eq!(
            resolve_artifact(dest, "/abs/Song A.mp4"),
            PathBuf::from("/abs/Song A.mp4")
        );
    }

    #[test]
    fn first_error_line_prefers_error_prefix() {
        let stderr = "WARNING: something\nERROR: Requested format is not available\nnoise";
        assert_eq!(
            first_error_line(stderr),
            "ERROR: Requested format is not available"
        );
        assert_eq!(first_error_line("just noise\nlast line\n"), "last line");
        assert_eq!(first_error_line(""), "unknown error");
    }

    #[test]
    fn format_error_from_stderr_is_a_fallback_candidate() {
        let err = DownloadError::from(first_error_line(
            "ERROR: Requested format is not available. Use --list-formats",
        ));
        assert!(err.is_format_fallback_candidate());
    }
}
