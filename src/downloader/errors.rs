// Error types for the download engine

use std::fmt;

#[derive(Debug, Clone)]
pub enum DownloadError {
    /// Metadata lookup against the media service failed
    Resolution(String),

    /// The service rejected the requested format selector
    FormatUnavailable(String),

    /// The service reported success but the artifact is missing on disk
    MissingArtifact(String),

    /// The transcode collaborator failed
    Transcode(String),

    /// yt-dlp or ffmpeg not found on the system
    ToolNotFound(String),

    /// Subprocess could not be spawned or exited abnormally
    Execution(String),

    /// Filesystem problem outside a collaborator call
    Io(String),

    /// Primary and fallback fetch both failed
    AttemptsExhausted { primary: String, fallback: String },
}

impl DownloadError {
    /// Failures that warrant the single worst-selector retry: the service
    /// complained about the format, or claimed success without producing
    /// a file.
    pub fn is_format_fallback_candidate(&self) -> bool {
        matches!(self, Self::FormatUnavailable(_) | Self::MissingArtifact(_))
    }
}

impl fmt::Display for DownloadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Resolution(msg) => write!(f, "Resolution failed: {}", msg),
            Self::FormatUnavailable(msg) => write!(f, "Requested format unavailable: {}", msg),
            Self::MissingArtifact(path) => {
                write!(f, "File was not downloaded: {}", path)
            }
            Self::Transcode(msg) => write!(f, "Conversion failed: {}", msg),
            Self::ToolNotFound(tool) => write!(f, "Tool not found: {}", tool),
            Self::Execution(msg) => write!(f, "Execution error: {}", msg),
            Self::Io(msg) => write!(f, "IO error: {}", msg),
            Self::AttemptsExhausted { primary, fallback } => write!(
                f,
                "Both download attempts failed. Original: {}, Fallback: {}",
                primary, fallback
            ),
        }
    }
}

impl std::error::Error for DownloadError {}

// Classify raw collaborator stderr into the taxonomy above.
impl From<String> for DownloadError {
    fn from(s: String) -> Self {
        // Format/selector trouble triggers the fallback retry
        if s.contains("Requested format is not available") || s.to_lowercase().contains("format") {
            return Self::FormatUnavailable(s);
        }

        if s.contains("not found") || s.contains("No such file") || s.contains("command not found")
        {
            return Self::ToolNotFound(s);
        }

        Self::Execution(s)
    }
}

impl From<std::io::Error> for DownloadError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e.to_string())
    }
}
