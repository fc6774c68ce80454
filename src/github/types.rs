// GitHub release query types.
// Rate limit accounting, release assets, and the outcome of a single remote query.

use chrono::{DateTime, Utc};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Remaining points below which the budget is reported as critical.
pub const RATE_LIMIT_CRITICAL_REMAINING: u64 = 50;

/// Rate limit snapshot reported alongside every GraphQL answer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RateLimit {
    pub limit: u64,
    pub cost: u64,
    pub remaining: u64,
    pub reset_at: Option<DateTime<Utc>>,
}

impl RateLimit {
    /// Whether the server sent any accounting at all.
    pub fn is_reported(&self) -> bool {
        self.limit > 0
    }

    /// Whether the remaining budget is low enough to alert on.
    pub fn is_critical(&self) -> bool {
        self.is_reported() && self.remaining < RATE_LIMIT_CRITICAL_REMAINING
    }
}

/// Downloadable file attached to a release.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReleaseAsset {
    pub download_url: String,
}

/// Source archive formats GitHub generates for every tagged release.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveFormat {
    Zip,
    TarGz,
}

impl ArchiveFormat {
    /// Reserved asset names that select a source archive.
    pub fn from_asset_name(name: &str) -> Option<Self> {
        match name {
            "ziparchive" => Some(ArchiveFormat::Zip),
            "targzarchive" => Some(ArchiveFormat::TarGz),
            _ => None,
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            ArchiveFormat::Zip => "zip",
            ArchiveFormat::TarGz => "tar.gz",
        }
    }

    /// Archive download URL for `tag` below a repository's web URL.
    pub fn download_url(&self, repository_url: &str, tag: &str) -> String {
        format!(
            "{}/archive/{}.{}",
            repository_url.trim_end_matches('/'),
            tag,
            self.extension()
        )
    }
}

/// Raw failure of a remote release query, before classification.
#[derive(Error, Debug)]
pub enum QueryError {
    #[error("github: no release found")]
    ReleaseNotFound,

    #[error("github: asset not found")]
    AssetNotFound,

    /// First error message of a GraphQL error response.
    #[error("{0}")]
    Graphql(String),

    #[error("HTTP {status}: {body}")]
    Status { status: StatusCode, body: String },

    #[error("GitHub API error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON parsing error: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Assets matched by one query plus the rate limit the server reported for it.
///
/// The rate limit is kept even when the query failed at the data level.
#[derive(Debug)]
pub struct QueryOutcome {
    pub assets: Result<Vec<ReleaseAsset>, QueryError>,
    pub rate_limit: RateLimit,
}

impl QueryOutcome {
    pub fn new(assets: Result<Vec<ReleaseAsset>, QueryError>, rate_limit: RateLimit) -> Self {
        Self { assets, rate_limit }
    }

    /// Outcome of a call that never produced a readable answer.
    pub fn failed(error: QueryError) -> Self {
        Self {
            assets: Err(error),
            rate_limit: RateLimit::default(),
        }
    }
}
