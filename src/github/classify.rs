// Upstream error classification.
// Maps raw GraphQL error messages onto the service's error kinds.

use crate::error::ErrorKind;

/// Marker GitHub uses for unknown owners and repositories.
///
/// Matching on message text is brittle: a wording change upstream
/// silently turns these into server errors.
pub const UNRESOLVED_MARKER: &str = "Could not resolve to";

/// Strategy deciding what kind of failure a raw upstream message describes.
pub trait ErrorClassifier: Send + Sync {
    fn classify(&self, message: &str) -> ErrorKind;
}

impl<F> ErrorClassifier for F
where
    F: Fn(&str) -> ErrorKind + Send + Sync,
{
    fn classify(&self, message: &str) -> ErrorKind {
        self(message)
    }
}

/// Default heuristic for github.com error wording.
#[derive(Debug, Clone, Copy, Default)]
pub struct GitHubMessageClassifier;

impl ErrorClassifier for GitHubMessageClassifier {
    fn classify(&self, message: &str) -> ErrorKind {
        if message.contains(UNRESOLVED_MARKER) {
            ErrorKind::NotFound
        } else {
            ErrorKind::ServerError
        }
    }
}
