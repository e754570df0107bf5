use thiserror::Error;

/// Broad classification of an [`UpdateError`], used to tell apart failures
/// that share a fallback path (for example a patch that could not be
/// downloaded versus one that produced the wrong bytes).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Transport,
    Decode,
    Integrity,
    Apply,
    Io,
    Recovery,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Transport => "transport",
            Self::Decode => "decode",
            Self::Integrity => "integrity",
            Self::Apply => "apply",
            Self::Io => "io",
            Self::Recovery => "recovery",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Error)]
pub enum UpdateError {
    #[error("failed to build HTTP client: {0}")]
    ClientBuild(#[source] reqwest::Error),
    #[error("request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("request to {url} failed with HTTP {status}")]
    HttpStatus {
        url: String,
        status: reqwest::StatusCode,
    },
    #[error("fetch of {url} failed: {details}")]
    Fetch { url: String, details: String },
    #[error("fetch of {url} returned neither a body nor an error")]
    EmptyResponse { url: String },
    #[error("failed to decode update manifest: {0}")]
    ManifestDecode(#[source] serde_json::Error),
    #[error("invalid hash length: expected {expected} bytes, got {actual}")]
    InvalidHashLength { expected: usize, actual: usize },
    #[error("candidate hash mismatch: expected {expected}, got {actual}")]
    HashMismatch { expected: String, actual: String },
    #[error("failed to apply binary patch: {0}")]
    Patch(#[source] std::io::Error),
    #[error("failed to decompress update payload: {0}")]
    Decompress(#[source] std::io::Error),
    #[error("failed to install {path}: {source}")]
    Install {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("{context}: {source}")]
    Io {
        context: &'static str,
        #[source]
        source: std::io::Error,
    },
    #[error("update and recovery errors: patch: {patch}; full binary: {full}")]
    Recovery {
        patch: Box<UpdateError>,
        full: Box<UpdateError>,
    },
}

impl UpdateError {
    pub fn fetch(url: impl Into<String>, details: impl Into<String>) -> Self {
        Self::Fetch {
            url: url.into(),
            details: details.into(),
        }
    }

    pub(crate) fn io(context: &'static str, source: std::io::Error) -> Self {
        Self::Io { context, source }
    }

    pub(crate) fn install(path: &std::path::Path, source: std::io::Error) -> Self {
        Self::Install {
            path: path.display().to_string(),
            source,
        }
    }

    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::ClientBuild(_)
            | Self::Request { .. }
            | Self::HttpStatus { .. }
            | Self::Fetch { .. }
            | Self::EmptyResponse { .. } => ErrorKind::Transport,
            Self::ManifestDecode(_) | Self::InvalidHashLength { .. } => ErrorKind::Decode,
            Self::HashMismatch { .. } => ErrorKind::Integrity,
            Self::Patch(_) | Self::Decompress(_) | Self::Install { .. } => ErrorKind::Apply,
            Self::Io { .. } => ErrorKind::Io,
            Self::Recovery { .. } => ErrorKind::Recovery,
        }
    }
}
