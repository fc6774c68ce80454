// Release source abstraction.
// The two remote lookups the resolver depends on, so tests can stand in for GitHub.

use async_trait::async_trait;

use super::types::QueryOutcome;

/// Provider of release assets for an `(owner, repo)` pair.
///
/// Each call is a single round-trip with no retry.
#[async_trait]
pub trait ReleaseSource: Send + Sync {
    /// Assets of the newest of the last few releases that has a matching asset.
    async fn fetch_latest(&self, owner: &str, repo: &str, asset_name: &str) -> QueryOutcome;

    /// Assets of the release tagged exactly `tag`.
    async fn fetch_tag(&self, owner: &str, repo: &str, tag: &str, asset_name: &str)
    -> QueryOutcome;
}
