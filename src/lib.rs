// gitreleases: stable short URLs for GitHub release assets.
// Resolves (owner, repo, tag, asset) to a download URL and redirects to it.

pub mod cache;
pub mod config;
pub mod error;
pub mod github;
pub mod resolver;
pub mod server;

pub use error::{AppError, ErrorKind, ResolveError, Result};
pub use resolver::{ReleaseRequest, ReleaseResolver};
