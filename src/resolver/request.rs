// Release request tuple.
// Identifies one asset lookup and derives its cache key.

use std::fmt;

/// Tag value selecting the latest release instead of an exact tag.
pub const LATEST_TAG: &str = "latest";

/// One `(owner, repo, tag, asset)` lookup.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ReleaseRequest {
    pub owner: String,
    pub repo: String,
    pub tag: String,
    pub asset_name: String,
}

impl ReleaseRequest {
    pub fn new(
        owner: impl Into<String>,
        repo: impl Into<String>,
        tag: impl Into<String>,
        asset_name: impl Into<String>,
    ) -> Self {
        Self {
            owner: owner.into(),
            repo: repo.into(),
            tag: tag.into(),
            asset_name: asset_name.into(),
        }
    }

    pub fn is_latest(&self) -> bool {
        self.tag == LATEST_TAG
    }

    /// Fields joined with `/`, which GitHub does not allow inside any of them.
    pub fn cache_key(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for ReleaseRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/{}/{}",
            self.owner, self.repo, self.tag, self.asset_name
        )
    }
}
