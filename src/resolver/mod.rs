// Release resolution.
// Cache lookup, remote query dispatch, error classification, and memoization.

pub mod request;

pub use request::{LATEST_TAG, ReleaseRequest};

use std::sync::Arc;
use std::time::Duration;

use tokio::time::{Instant, timeout_at};
use tracing::{debug, error, info, warn};

use crate::cache::{CachedResolution, ResolutionCache};
use crate::error::{ErrorKind, ResolveError};
use crate::github::{
    ErrorClassifier, GitHubMessageClassifier, QueryError, RateLimit, ReleaseSource,
};

/// Resolves release requests to asset download URLs.
///
/// Every request makes at most one remote call. Concurrent misses for the
/// same key each query the source; the first result stored wins.
#[derive(Clone)]
pub struct ReleaseResolver {
    source: Arc<dyn ReleaseSource>,
    cache: Arc<dyn ResolutionCache>,
    classifier: Arc<dyn ErrorClassifier>,
}

impl ReleaseResolver {
    pub fn new(source: Arc<dyn ReleaseSource>, cache: Arc<dyn ResolutionCache>) -> Self {
        Self {
            source,
            cache,
            classifier: Arc::new(GitHubMessageClassifier),
        }
    }

    /// Replace the upstream error classification strategy.
    pub fn with_classifier(mut self, classifier: impl ErrorClassifier + 'static) -> Self {
        self.classifier = Arc::new(classifier);
        self
    }

    /// Resolve `request`, giving up with `DeadlineExceeded` after `timeout`.
    pub async fn resolve_within(
        &self,
        request: &ReleaseRequest,
        timeout: Duration,
    ) -> Result<String, ResolveError> {
        self.resolve(request, Instant::now() + timeout).await
    }

    /// Resolve `request` to a download URL before `deadline`.
    ///
    /// A deadline expiry is never cached. Dropping the returned future before
    /// the remote call completes leaves the cache untouched.
    pub async fn resolve(
        &self,
        request: &ReleaseRequest,
        deadline: Instant,
    ) -> Result<String, ResolveError> {
        let key = request.cache_key();

        match self.cache.get(&key) {
            Some(Ok(url)) if !url.is_empty() => {
                debug!(key = %key, "cache hit");
                return Ok(url);
            }
            Some(Err(e)) => {
                debug!(key = %key, error = %e, "cached failure");
                return Err(e);
            }
            _ => {}
        }

        let fetch = async {
            if request.is_latest() {
                self.source
                    .fetch_latest(&request.owner, &request.repo, &request.asset_name)
                    .await
            } else {
                self.source
                    .fetch_tag(
                        &request.owner,
                        &request.repo,
                        &request.tag,
                        &request.asset_name,
                    )
                    .await
            }
        };

        let outcome = match timeout_at(deadline, fetch).await {
            Ok(outcome) => outcome,
            Err(_) => {
                warn!(key = %key, "deadline exceeded while querying github");
                return Err(ResolveError::DeadlineExceeded);
            }
        };

        log_rate_limit(&outcome.rate_limit);

        let resolution: CachedResolution = match outcome.assets {
            Err(e) => Err(self.classify(e)),
            Ok(assets) => match assets.into_iter().next() {
                Some(asset) if !asset.download_url.is_empty() => Ok(asset.download_url),
                _ => Err(ResolveError::AssetNotFound),
            },
        };

        if resolution.as_ref().err().is_none_or(ResolveError::is_cacheable) {
            self.cache.put(&key, resolution.clone());
        }

        match &resolution {
            Ok(url) => info!(key = %key, url = %url, "resolved release asset"),
            Err(e) => info!(key = %key, error = %e, kind = ?e.kind(), "release asset not resolved"),
        }

        resolution
    }

    /// Map a raw query failure onto the error taxonomy.
    fn classify(&self, error: QueryError) -> ResolveError {
        match error {
            QueryError::ReleaseNotFound => ResolveError::ReleaseNotFound,
            QueryError::AssetNotFound => ResolveError::AssetNotFound,
            QueryError::Graphql(message) => {
                let kind = self.classifier.classify(&message);
                ResolveError::upstream(kind, message)
            }
            other => ResolveError::upstream(ErrorKind::ServerError, other.to_string()),
        }
    }
}

/// Report the rate limit snapshot; a nearly exhausted budget is critical.
fn log_rate_limit(rate_limit: &RateLimit) {
    let reset_at = rate_limit.reset_at.map(|t| t.to_rfc3339());
    if rate_limit.is_critical() {
        error!(
            severity = "critical",
            limit = rate_limit.limit,
            cost = rate_limit.cost,
            remaining = rate_limit.remaining,
            reset_at = ?reset_at,
            "almost no rate limit points remaining"
        );
    } else {
        info!(
            limit = rate_limit.limit,
            cost = rate_limit.cost,
            remaining = rate_limit.remaining,
            reset_at = ?reset_at,
            "current rate limit points"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{CacheConfig, NoopCache, TtlCache};
    use crate::github::{QueryOutcome, ReleaseAsset};
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::io;

    #[derive(Debug, Clone, PartialEq, Eq)]
    enum Call {
        Latest,
        Tag(String),
    }

    type Respond = Box<dyn Fn() -> QueryOutcome + Send + Sync>;

    struct StubSource {
        calls: Mutex<Vec<Call>>,
        respond: Respond,
        delay: Option<Duration>,
    }

    impl StubSource {
        fn new(respond: impl Fn() -> QueryOutcome + Send + Sync + 'static) -> Self {
            Self {
                calls: Mutex::new(Vec::new()),
                respond: Box::new(respond),
                delay: None,
            }
        }

        fn with_delay(mut self, delay: Duration) -> Self {
            self.delay = Some(delay);
            self
        }

        fn calls(&self) -> Vec<Call> {
            self.calls.lock().clone()
        }

        async fn answer(&self, call: Call) -> QueryOutcome {
            self.calls.lock().push(call);
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            (self.respond)()
        }
    }

    #[async_trait]
    impl ReleaseSource for StubSource {
        async fn fetch_latest(&self, _owner: &str, _repo: &str, _asset: &str) -> QueryOutcome {
            self.answer(Call::Latest).await
        }

        async fn fetch_tag(&self, _owner: &str, _repo: &str, tag: &str, _asset: &str) -> QueryOutcome {
            self.answer(Call::Tag(tag.to_string())).await
        }
    }

    fn healthy_limit() -> RateLimit {
        RateLimit {
            limit: 5000,
            cost: 1,
            remaining: 4999,
            reset_at: None,
        }
    }

    fn found(url: &'static str) -> impl Fn() -> QueryOutcome + Send + Sync + 'static {
        move || {
            QueryOutcome::new(
                Ok(vec![ReleaseAsset {
                    download_url: url.to_string(),
                }]),
                healthy_limit(),
            )
        }
    }

    fn setup(source: StubSource) -> (Arc<StubSource>, Arc<TtlCache>, ReleaseResolver) {
        let source = Arc::new(source);
        let cache = Arc::new(TtlCache::new(&CacheConfig::new()));
        let resolver = ReleaseResolver::new(source.clone(), cache.clone());
        (source, cache, resolver)
    }

    const TIMEOUT: Duration = Duration::from_secs(2);

    #[tokio::test]
    async fn test_latest_dispatch() {
        let (source, _, resolver) = setup(StubSource::new(found("https://example.com/a")));

        let request = ReleaseRequest::new("o", "r", "latest", "a");
        resolver.resolve_within(&request, TIMEOUT).await.unwrap();

        assert_eq!(source.calls(), vec![Call::Latest]);
    }

    #[tokio::test]
    async fn test_tag_dispatch() {
        let (source, _, resolver) = setup(StubSource::new(found("https://example.com/a")));

        let request = ReleaseRequest::new("o", "r", "v1.2.3", "a");
        resolver.resolve_within(&request, TIMEOUT).await.unwrap();

        assert_eq!(source.calls(), vec![Call::Tag("v1.2.3".to_string())]);
    }

    #[tokio::test]
    async fn test_latest_asset_is_cached() {
        let url = "https://example.com/testing/testing/releases/download/latest/testing.zip";
        let (source, _, resolver) = setup(StubSource::new(found(url)));
        let request = ReleaseRequest::new("a", "b", "latest", "testing.zip");

        assert_eq!(resolver.resolve_within(&request, TIMEOUT).await.unwrap(), url);
        assert_eq!(resolver.resolve_within(&request, TIMEOUT).await.unwrap(), url);
        assert_eq!(source.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_missing_tag_is_cached_as_not_found() {
        let (source, cache, resolver) = setup(StubSource::new(|| {
            QueryOutcome::new(Err(QueryError::ReleaseNotFound), healthy_limit())
        }));
        let request = ReleaseRequest::new("a", "b", "v9.9.9", "testing.zip");

        let err = resolver.resolve_within(&request, TIMEOUT).await.unwrap_err();
        assert_eq!(err, ResolveError::ReleaseNotFound);
        assert!(err.is_not_found());
        assert_eq!(
            cache.get(&request.cache_key()),
            Some(Err(ResolveError::ReleaseNotFound))
        );

        let again = resolver.resolve_within(&request, TIMEOUT).await.unwrap_err();
        assert_eq!(again, ResolveError::ReleaseNotFound);
        assert_eq!(source.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_empty_asset_list_is_asset_not_found() {
        let (source, cache, resolver) = setup(StubSource::new(|| {
            QueryOutcome::new(Ok(Vec::new()), healthy_limit())
        }));
        let request = ReleaseRequest::new("a", "b", "v1", "missing.bin");

        let err = resolver.resolve_within(&request, TIMEOUT).await.unwrap_err();
        assert_eq!(err, ResolveError::AssetNotFound);
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert!(cache.get(&request.cache_key()).is_some());
        assert_eq!(source.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_deadline_is_not_cached() {
        let source = StubSource::new(found("https://example.com/a"))
            .with_delay(Duration::from_millis(500));
        let (source, cache, resolver) = setup(source);
        let request = ReleaseRequest::new("a", "b", "latest", "a");

        let err = resolver
            .resolve_within(&request, Duration::from_millis(20))
            .await
            .unwrap_err();
        assert!(err.is_deadline_exceeded());
        assert!(cache.get(&request.cache_key()).is_none());

        let err = resolver
            .resolve_within(&request, Duration::from_millis(20))
            .await
            .unwrap_err();
        assert!(err.is_deadline_exceeded());
        assert_eq!(source.calls().len(), 2);
    }

    /// Collects formatted log lines for assertions.
    #[derive(Clone, Default)]
    struct LogBuffer(Arc<Mutex<Vec<u8>>>);

    impl LogBuffer {
        fn contents(&self) -> String {
            String::from_utf8_lossy(&self.0.lock()).into_owned()
        }
    }

    impl io::Write for LogBuffer {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    /// Resolve one request whose answer reports `remaining` points and return the logs.
    async fn resolve_with_remaining(remaining: u64) -> (String, String) {
        let logs = LogBuffer::default();
        let writer = logs.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_ansi(false)
            .with_max_level(tracing::Level::INFO)
            .finish();
        let _guard = tracing::subscriber::set_default(subscriber);

        let (_, _, resolver) = setup(StubSource::new(move || {
            QueryOutcome::new(
                Ok(vec![ReleaseAsset {
                    download_url: "https://example.com/a".to_string(),
                }]),
                RateLimit {
                    limit: 5000,
                    cost: 1,
                    remaining,
                    reset_at: None,
                },
            )
        }));
        let request = ReleaseRequest::new("a", "b", "latest", "a");

        let url = resolver.resolve_within(&request, TIMEOUT).await.unwrap();
        (url, logs.contents())
    }

    #[tokio::test]
    async fn test_low_rate_limit_still_resolves() {
        let (url, logs) = resolve_with_remaining(10).await;

        assert_eq!(url, "https://example.com/a");
        assert!(logs.contains("ERROR"), "logs: {}", logs);
        assert!(logs.contains(r#"severity="critical""#), "logs: {}", logs);
        assert!(logs.contains("remaining=10"), "logs: {}", logs);
    }

    #[tokio::test]
    async fn test_healthy_rate_limit_is_not_critical() {
        let (url, logs) = resolve_with_remaining(4999).await;

        assert_eq!(url, "https://example.com/a");
        assert!(logs.contains("remaining=4999"), "logs: {}", logs);
        assert!(!logs.contains("critical"), "logs: {}", logs);
    }

    #[tokio::test]
    async fn test_empty_download_url_is_asset_not_found() {
        let (_, cache, resolver) = setup(StubSource::new(found("")));
        let request = ReleaseRequest::new("a", "b", "v1", "a");

        let err = resolver.resolve_within(&request, TIMEOUT).await.unwrap_err();
        assert_eq!(err, ResolveError::AssetNotFound);
        assert_eq!(
            cache.get(&request.cache_key()),
            Some(Err(ResolveError::AssetNotFound))
        );
    }

    #[tokio::test]
    async fn test_unresolvable_owner_keeps_message() {
        let message = "Could not resolve to a User with the username 'x'.";
        let (_, _, resolver) = setup(StubSource::new(move || {
            QueryOutcome::new(Err(QueryError::Graphql(message.to_string())), healthy_limit())
        }));
        let request = ReleaseRequest::new("x", "b", "latest", "a");

        let err = resolver.resolve_within(&request, TIMEOUT).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert_eq!(err.to_string(), message);
    }

    #[tokio::test]
    async fn test_generic_graphql_error_is_server_error() {
        let (_, _, resolver) = setup(StubSource::new(|| {
            QueryOutcome::new(
                Err(QueryError::Graphql("internal server error".to_string())),
                RateLimit::default(),
            )
        }));
        let request = ReleaseRequest::new("a", "b", "latest", "a");

        let err = resolver.resolve_within(&request, TIMEOUT).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ServerError);
        assert!(!err.is_deadline_exceeded());
    }

    #[tokio::test]
    async fn test_custom_classifier() {
        let source = Arc::new(StubSource::new(|| {
            QueryOutcome::new(
                Err(QueryError::Graphql("something odd".to_string())),
                RateLimit::default(),
            )
        }));
        let resolver = ReleaseResolver::new(source, Arc::new(NoopCache))
            .with_classifier(|_: &str| ErrorKind::NotFound);
        let request = ReleaseRequest::new("a", "b", "latest", "a");

        let err = resolver.resolve_within(&request, TIMEOUT).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_status_error_is_server_error() {
        let (_, _, resolver) = setup(StubSource::new(|| {
            QueryOutcome::failed(QueryError::Status {
                status: reqwest::StatusCode::UNAUTHORIZED,
                body: "Bad credentials".to_string(),
            })
        }));
        let request = ReleaseRequest::new("a", "b", "v1", "a");

        let err = resolver.resolve_within(&request, TIMEOUT).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ServerError);
        assert!(err.to_string().contains("Bad credentials"));
    }

    #[tokio::test]
    async fn test_noop_cache_always_fetches() {
        let source = Arc::new(StubSource::new(found("https://example.com/a")));
        let resolver = ReleaseResolver::new(source.clone(), Arc::new(NoopCache));
        let request = ReleaseRequest::new("a", "b", "latest", "a");

        resolver.resolve_within(&request, TIMEOUT).await.unwrap();
        resolver.resolve_within(&request, TIMEOUT).await.unwrap();
        assert_eq!(source.calls().len(), 2);
    }
}
