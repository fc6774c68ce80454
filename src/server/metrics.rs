// Request metrics for the download route.
// Prometheus recorder setup and the instrumentation middleware.

use std::time::Instant;

use axum::body::HttpBody;
use axum::extract::{MatchedPath, Request};
use axum::http::header;
use axum::middleware::Next;
use axum::response::Response;
use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};

use crate::error::{AppError, Result};

pub const IN_FLIGHT_REQUESTS: &str = "in_flight_requests";
pub const REQUESTS_TOTAL: &str = "api_requests_total";
pub const REQUEST_DURATION: &str = "request_duration_seconds";
pub const RESPONSE_SIZE: &str = "response_size_bytes";

const DURATION_BUCKETS: &[f64] = &[0.25, 0.5, 1.0, 2.5, 5.0, 10.0];
const SIZE_BUCKETS: &[f64] = &[200.0, 500.0, 900.0, 1500.0];

fn builder() -> Result<PrometheusBuilder> {
    PrometheusBuilder::new()
        .set_buckets_for_metric(Matcher::Full(REQUEST_DURATION.to_string()), DURATION_BUCKETS)
        .and_then(|builder| {
            builder.set_buckets_for_metric(Matcher::Full(RESPONSE_SIZE.to_string()), SIZE_BUCKETS)
        })
        .map_err(|e| AppError::Metrics(e.to_string()))
}

/// Install the process-wide Prometheus recorder.
pub fn install_recorder() -> Result<PrometheusHandle> {
    builder()?
        .install_recorder()
        .map_err(|e| AppError::Metrics(e.to_string()))
}

/// Count, time, and track in-flight requests of the wrapped routes.
pub async fn track_metrics(request: Request, next: Next) -> Response {
    let method = request.method().to_string();
    let handler = request
        .extensions()
        .get::<MatchedPath>()
        .map(|path| path.as_str().to_string())
        .unwrap_or_else(|| request.uri().path().to_string());

    let start = Instant::now();
    gauge!(IN_FLIGHT_REQUESTS).increment(1.0);

    let response = next.run(request).await;

    gauge!(IN_FLIGHT_REQUESTS).decrement(1.0);
    let code = response.status().as_u16().to_string();
    counter!(REQUESTS_TOTAL, "code" => code.clone(), "method" => method.clone()).increment(1);
    histogram!(REQUEST_DURATION, "handler" => handler, "method" => method.clone())
        .record(start.elapsed().as_secs_f64());
    if let Some(size) = response_size(&response) {
        histogram!(RESPONSE_SIZE, "code" => code, "method" => method).record(size as f64);
    }

    response
}

/// Body size in bytes when known up front, else the declared `Content-Length`.
fn response_size(response: &Response) -> Option<u64> {
    response.body().size_hint().exact().or_else(|| {
        response
            .headers()
            .get(header::CONTENT_LENGTH)?
            .to_str()
            .ok()?
            .parse()
            .ok()
    })
}
