//! HTTP middleware recording request count and latency per matched route

use super::*;
use axum::{
    extract::{MatchedPath, Request},
    middleware::Next,
    response::Response,
};
use std::time::Instant;

/// Paths excluded from request metrics
const EXCLUDED_PATHS: &[&str] = &["/metrics"];

/// Path label for requests no route matched, keeping label cardinality bounded
const UNMATCHED_PATH: &str = "unmatched";

/// Record request count and latency.
///
/// # Example
/// ```no_run
/// use axum::{Router, middleware};
/// use customer_retention_service::metrics::track_metrics;
///
/// let app: Router = Router::new()
///     .layer(middleware::from_fn(track_metrics));
/// ```
pub async fn track_metrics(req: Request, next: Next) -> Response {
    let method = req.method().to_string();
    let path = req
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_string())
        .unwrap_or_else(|| UNMATCHED_PATH.to_string());

    if EXCLUDED_PATHS.contains(&path.as_str()) {
        return next.run(req).await;
    }

    let start = Instant::now();
    let response = next.run(req).await;

    let duration = start.elapsed().as_secs_f64();
    let status = response.status().as_u16().to_string();

    HTTP_REQUESTS_TOTAL
        .with_label_values(&[&method, &path, &status])
        .inc();
    HTTP_REQUEST_DURATION_SECONDS
        .with_label_values(&[&method, &path])
        .observe(duration);

    response
}
