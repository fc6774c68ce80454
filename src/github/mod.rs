// GitHub API module.
// GraphQL client, release queries, and upstream error classification.

pub mod classify;
pub mod client;
pub mod endpoints;
pub mod source;
pub mod types;

pub use classify::{ErrorClassifier, GitHubMessageClassifier};
pub use client::{GITHUB_GRAPHQL_ENDPOINT, GitHubClient};
pub use endpoints::LATEST_LOOKBACK;
pub use source::ReleaseSource;
pub use types::*;
