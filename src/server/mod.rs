// HTTP server.
// Routes inbound requests to the resolver and maps results onto responses.

pub mod auth;
pub mod handlers;
pub mod metrics;

pub use auth::BasicCredentials;

use std::future::Future;
use std::io;
use std::time::Duration;

use axum::Router;
use axum::middleware;
use axum::routing::get;
use metrics_exporter_prometheus::PrometheusHandle;
use tokio::net::TcpListener;

use crate::error::Result;
use crate::resolver::ReleaseResolver;

/// Shared state of every handler.
#[derive(Clone)]
pub struct AppState {
    pub resolver: ReleaseResolver,
    /// Deadline applied to each release resolution.
    pub request_timeout: Duration,
    pub metrics: PrometheusHandle,
    pub metrics_credentials: BasicCredentials,
}

impl AppState {
    pub fn new(
        resolver: ReleaseResolver,
        request_timeout: Duration,
        metrics: PrometheusHandle,
        metrics_credentials: BasicCredentials,
    ) -> Self {
        Self {
            resolver,
            request_timeout,
            metrics,
            metrics_credentials,
        }
    }
}

/// Build the service router. Only the download route is instrumented.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route(
            "/gh/{owner}/{repo}/{tag}/{asset_name}",
            get(handlers::download_release),
        )
        .route_layer(middleware::from_fn(metrics::track_metrics))
        .route("/metrics", get(handlers::metrics))
        .route("/status", get(handlers::status))
        .with_state(state)
}

/// Serve `app` on `listener` until `shutdown` resolves and open requests finish.
pub async fn serve<F>(listener: TcpListener, app: Router, shutdown: F) -> io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
}

/// Bind the listening socket for [`serve`].
pub async fn bind(addr: &str) -> Result<TcpListener> {
    Ok(TcpListener::bind(addr).await?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;

    #[tokio::test]
    async fn test_bind_ephemeral_port() {
        let listener = bind("127.0.0.1:0").await.unwrap();
        assert_ne!(listener.local_addr().unwrap().port(), 0);
    }

    #[tokio::test]
    async fn test_bind_failure_is_io_error() {
        let taken = bind("127.0.0.1:0").await.unwrap();
        let addr = taken.local_addr().unwrap().to_string();

        let err = bind(&addr).await.unwrap_err();
        assert!(matches!(err, AppError::Io(_)));
    }
}
