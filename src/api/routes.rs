use crate::api::{handlers, AppState};
use crate::auth::require_auth;
use crate::error::AppError;
use crate::metrics::track_metrics;
use axum::{
    error_handling::HandleErrorLayer,
    middleware,
    routing::{get, post},
    BoxError, Router,
};
use tower::{timeout::TimeoutLayer, ServiceBuilder};
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};

/// Build the main API router
pub fn build_router(state: AppState) -> Router {
    let auth_layer = middleware::from_fn_with_state(state.auth.clone(), require_auth);
    let request_timeout = state.request_timeout;

    // Session endpoints always need a bearer token
    let session = Router::new()
        .route("/auth/logout", post(handlers::logout))
        .route("/auth/me", get(handlers::me))
        .route_layer(auth_layer.clone());

    let mut prediction = Router::new()
        .route("/api/predict", post(handlers::predict))
        .route("/api/segments", get(handlers::list_segments));
    if state.protect_api {
        prediction = prediction.route_layer(auth_layer);
    }

    Router::new()
        // Health endpoints
        .route("/health", get(handlers::health_check))
        .route("/metrics", get(handlers::metrics))
        .route("/api/ping", get(handlers::ping))
        // Accounts
        .route("/auth/register", post(handlers::register))
        .route("/auth/login", post(handlers::login))
        .merge(session)
        .merge(prediction)
        // Add state
        .with_state(state)
        // Add middleware
        .layer(
            ServiceBuilder::new()
                .layer(HandleErrorLayer::new(handle_timeout_error))
                .layer(TimeoutLayer::new(request_timeout)),
        )
        .layer(middleware::from_fn(track_metrics))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().include_headers(true))
                .on_response(DefaultOnResponse::new().include_headers(true)),
        )
        .layer(CorsLayer::permissive())
}

/// Map middleware failures into the JSON error envelope
async fn handle_timeout_error(err: BoxError) -> AppError {
    if err.is::<tower::timeout::error::Elapsed>() {
        AppError::Timeout
    } else {
        AppError::Internal(format!("Unhandled middleware error: {}", err))
    }
}
