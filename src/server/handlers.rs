// HTTP handlers.
// Release redirects, service status, and the Prometheus scrape endpoint.

use axum::Json;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, Method, StatusCode, Uri, header};
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use tracing::{error, info};

use crate::error::{ErrorKind, ResolveError};
use crate::resolver::ReleaseRequest;

use super::AppState;

/// Body of `GET /status`.
#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub version: &'static str,
}

/// `GET /gh/{owner}/{repo}/{tag}/{asset_name}`: redirect to the asset.
pub async fn download_release(
    State(state): State<AppState>,
    Path((owner, repo, tag, asset_name)): Path<(String, String, String, String)>,
    method: Method,
    uri: Uri,
) -> Response {
    info!(%method, %uri, "fetching release URL");

    let request = ReleaseRequest::new(owner, repo, tag, asset_name);
    match state
        .resolver
        .resolve_within(&request, state.request_timeout)
        .await
    {
        Ok(url) => {
            info!(%method, %uri, url = %url, "found release URL");
            (StatusCode::MOVED_PERMANENTLY, [(header::LOCATION, url)]).into_response()
        }
        Err(e) => error_response(&method, &uri, &e),
    }
}

/// Status code and body for a failed resolution.
fn error_response(method: &Method, uri: &Uri, err: &ResolveError) -> Response {
    if err.is_deadline_exceeded() {
        error!(%method, %uri, error = %err, "error retrieving release URL");
        return text_response(StatusCode::BAD_GATEWAY, "Bad Gateway");
    }

    match err.kind() {
        ErrorKind::NotFound => {
            info!(%method, %uri, error = %err, "data not found");
            text_response(StatusCode::NOT_FOUND, &err.to_string())
        }
        ErrorKind::ServerError => {
            error!(%method, %uri, error = %err, "unhandled github error");
            text_response(StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error")
        }
    }
}

fn text_response(status: StatusCode, message: &str) -> Response {
    (status, format!("{}\n", message)).into_response()
}

/// `GET /status`: running version.
pub async fn status() -> Json<StatusResponse> {
    Json(StatusResponse {
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// `GET /metrics`: Prometheus exposition behind Basic auth.
pub async fn metrics(State(state): State<AppState>, headers: HeaderMap) -> Response {
    if !state.metrics_credentials.authorizes(&headers) {
        return (
            StatusCode::UNAUTHORIZED,
            [(header::WWW_AUTHENTICATE, r#"Basic realm="Restricted""#)],
            "Unauthorized.\n",
        )
            .into_response();
    }

    state.metrics.render().into_response()
}
