// Error types for gitreleases.
// Resolution errors returned to callers and setup errors raised at startup.

use thiserror::Error;

/// Semantic classification of a failed resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Owner, repository, release or asset does not exist.
    NotFound,
    /// Anything not confidently classifiable as not-found.
    ServerError,
}

/// Outcome of a failed release lookup.
///
/// Clone so negative results can be memoized in the cache.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResolveError {
    #[error("github: no release found")]
    ReleaseNotFound,

    #[error("github: asset not found")]
    AssetNotFound,

    /// Error reported by the upstream API, carrying its raw message.
    #[error("{message}")]
    Upstream { kind: ErrorKind, message: String },

    /// The caller's deadline elapsed before the remote call finished.
    #[error("deadline exceeded while waiting for github")]
    DeadlineExceeded,
}

impl ResolveError {
    pub fn upstream(kind: ErrorKind, message: impl Into<String>) -> Self {
        ResolveError::Upstream {
            kind,
            message: message.into(),
        }
    }

    /// Classified kind. A deadline expiry reports `ServerError`;
    /// use [`ResolveError::is_deadline_exceeded`] to tell it apart.
    pub fn kind(&self) -> ErrorKind {
        match self {
            ResolveError::ReleaseNotFound | ResolveError::AssetNotFound => ErrorKind::NotFound,
            ResolveError::Upstream { kind, .. } => *kind,
            ResolveError::DeadlineExceeded => ErrorKind::ServerError,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.kind() == ErrorKind::NotFound
    }

    pub fn is_deadline_exceeded(&self) -> bool {
        matches!(self, ResolveError::DeadlineExceeded)
    }

    /// Whether this error may be stored as a negative cache entry.
    pub fn is_cacheable(&self) -> bool {
        !self.is_deadline_exceeded()
    }
}

/// Errors raised while setting up the service.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Invalid GitHub token: {0}")]
    InvalidToken(String),

    #[error("Metrics recorder error: {0}")]
    Metrics(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, AppError>;
