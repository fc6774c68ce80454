// GitHub GraphQL release queries.
// Typed latest-release and specific-tag lookups built on the GraphQL client.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use super::client::GitHubClient;
use super::source::ReleaseSource;
use super::types::{ArchiveFormat, QueryError, QueryOutcome, RateLimit, ReleaseAsset};

/// Number of most recent releases scanned for the latest matching asset.
pub const LATEST_LOOKBACK: usize = 5;

const LATEST_RELEASE_QUERY: &str = r#"
query($owner: String!, $repo: String!, $assetName: String!) {
  repository(owner: $owner, name: $repo) {
    url
    releases(first: 5, orderBy: {direction: DESC, field: CREATED_AT}) {
      nodes {
        tagName
        releaseAssets(name: $assetName, first: 1) {
          totalCount
          nodes { downloadUrl }
        }
      }
    }
  }
  rateLimit { limit cost remaining resetAt }
}
"#;

const SPECIFIC_TAG_QUERY: &str = r#"
query($owner: String!, $repo: String!, $tag: String!, $assetName: String!) {
  repository(owner: $owner, name: $repo) {
    url
    release(tagName: $tag) {
      tagName
      releaseAssets(name: $assetName, first: 1) {
        totalCount
        nodes { downloadUrl }
      }
    }
  }
  rateLimit { limit cost remaining resetAt }
}
"#;

/// Asset connection filtered by asset name.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct AssetConnection {
    total_count: u64,
    nodes: Vec<ReleaseAsset>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ReleaseNode {
    tag_name: String,
    #[serde(default)]
    release_assets: AssetConnection,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ReleaseConnection {
    nodes: Vec<ReleaseNode>,
}

#[derive(Debug, Deserialize)]
struct LatestRepository {
    url: String,
    #[serde(default)]
    releases: ReleaseConnection,
}

#[derive(Debug, Deserialize)]
struct TagRepository {
    url: String,
    release: Option<ReleaseNode>,
}

/// `data` of the latest-release query.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct LatestReleaseData {
    repository: Option<LatestRepository>,
    rate_limit: Option<RateLimit>,
}

/// `data` of the specific-tag query.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct SpecificTagData {
    repository: Option<TagRepository>,
    rate_limit: Option<RateLimit>,
}

/// Pick the assets of the newest release that has a match for `asset_name`.
fn select_latest(
    repository: Option<LatestRepository>,
    asset_name: &str,
) -> Result<Vec<ReleaseAsset>, QueryError> {
    let Some(repository) = repository else {
        return Err(QueryError::ReleaseNotFound);
    };

    let releases = repository.releases.nodes;
    let Some(newest) = releases.first() else {
        return Err(QueryError::ReleaseNotFound);
    };

    if let Some(format) = ArchiveFormat::from_asset_name(asset_name) {
        return Ok(vec![ReleaseAsset {
            download_url: format.download_url(&repository.url, &newest.tag_name),
        }]);
    }

    releases
        .into_iter()
        .take(LATEST_LOOKBACK)
        .find(|release| release.release_assets.total_count > 0)
        .map(|release| release.release_assets.nodes)
        .ok_or(QueryError::AssetNotFound)
}

/// Assets of the release tagged `tag`; may be empty.
fn select_tag(
    repository: Option<TagRepository>,
    asset_name: &str,
) -> Result<Vec<ReleaseAsset>, QueryError> {
    let Some(repository) = repository else {
        return Err(QueryError::ReleaseNotFound);
    };
    let Some(release) = repository.release else {
        return Err(QueryError::ReleaseNotFound);
    };

    if let Some(format) = ArchiveFormat::from_asset_name(asset_name) {
        return Ok(vec![ReleaseAsset {
            download_url: format.download_url(&repository.url, &release.tag_name),
        }]);
    }

    Ok(release.release_assets.nodes)
}

#[async_trait]
impl ReleaseSource for GitHubClient {
    async fn fetch_latest(&self, owner: &str, repo: &str, asset_name: &str) -> QueryOutcome {
        let variables = json!({
            "owner": owner,
            "repo": repo,
            "assetName": asset_name,
        });

        let response = match self
            .query::<LatestReleaseData>(LATEST_RELEASE_QUERY, variables)
            .await
        {
            Ok(response) => response,
            Err(e) => return QueryOutcome::failed(e),
        };

        let (data, error) = response.into_parts();
        let data = data.unwrap_or_default();
        let rate_limit = data.rate_limit.unwrap_or_default();

        if let Some(message) = error {
            return QueryOutcome::new(Err(QueryError::Graphql(message)), rate_limit);
        }

        QueryOutcome::new(select_latest(data.repository, asset_name), rate_limit)
    }

    async fn fetch_tag(&self, owner: &str, repo: &str, tag: &str, asset_name: &str) -> QueryOutcome {
        let variables = json!({
            "owner": owner,
            "repo": repo,
            "tag": tag,
            "assetName": asset_name,
        });

        let response = match self
            .query::<SpecificTagData>(SPECIFIC_TAG_QUERY, variables)
            .await
        {
            Ok(response) => response,
            Err(e) => return QueryOutcome::failed(e),
        };

        let (data, error) = response.into_parts();
        let data = data.unwrap_or_default();
        let rate_limit = data.rate_limit.unwrap_or_default();

        if let Some(message) = error {
            return QueryOutcome::new(Err(QueryError::Graphql(message)), rate_limit);
        }

        QueryOutcome::new(select_tag(data.repository, asset_name), rate_limit)
    }
}
