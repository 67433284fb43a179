use crate::api::AppState;
use crate::auth::{AuthenticatedUser, RegisterRequest};
use crate::error::{AppError, Result};
use crate::metrics::gather_metrics;
use crate::models::{CustomerSegment, PredictionResult, UserProfile};
use axum::{
    extract::{rejection::JsonRejection, Extension, State},
    http::header::CONTENT_TYPE,
    response::IntoResponse,
    Json,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> Result<Json<HealthResponse>> {
    Ok(Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: state.uptime_seconds(),
    }))
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_seconds: u64,
}

/// Prometheus scrape endpoint
pub async fn metrics() -> impl IntoResponse {
    (
        [(CONTENT_TYPE, "text/plain; version=0.0.4")],
        gather_metrics(),
    )
}

/// Liveness check that also reports model and webhook readiness
pub async fn ping(State(state): State<AppState>) -> Json<PingResponse> {
    Json(PingResponse {
        status: "success".to_string(),
        message: "pong".to_string(),
        model_loaded: state.processor.model_loaded(),
        marketing_enabled: state.processor.marketing_enabled(),
        timestamp: Utc::now(),
    })
}

#[derive(Debug, Serialize)]
pub struct PingResponse {
    pub status: String,
    pub message: String,
    pub model_loaded: bool,
    pub marketing_enabled: bool,
    pub timestamp: DateTime<Utc>,
}

/// Score a customer feature record
pub async fn predict(
    State(state): State<AppState>,
    payload: std::result::Result<Json<Value>, JsonRejection>,
) -> Result<Json<PredictionResult>> {
    let Json(payload) = payload.map_err(invalid_body)?;
    let result = state.processor.predict(&payload).await?;
    Ok(Json(result))
}

/// List stored customer segments
pub async fn list_segments(State(state): State<AppState>) -> Result<Json<Vec<CustomerSegment>>> {
    Ok(Json(state.processor.list_segments().await?))
}

/// Register a new account
pub async fn register(
    State(state): State<AppState>,
    payload: std::result::Result<Json<Value>, JsonRejection>,
) -> Result<Json<RegisterResponse>> {
    let Json(payload) = payload.map_err(invalid_body)?;

    let (Some(username), Some(email), Some(password)) = (
        string_field(&payload, "username"),
        string_field(&payload, "email"),
        string_field(&payload, "password"),
    ) else {
        return Err(AppError::Validation("Missing required fields".to_string()));
    };

    let user = state
        .auth
        .register(RegisterRequest {
            username,
            email,
            password,
        })
        .await?;

    Ok(Json(RegisterResponse {
        message: "User registered successfully".to_string(),
        user: user.profile(),
    }))
}

#[derive(Debug, Serialize)]
pub struct RegisterResponse {
    pub message: String,
    pub user: UserProfile,
}

/// Exchange credentials for a bearer token
pub async fn login(
    State(state): State<AppState>,
    payload: std::result::Result<Json<Value>, JsonRejection>,
) -> Result<Json<LoginResponse>> {
    let Json(payload) = payload.map_err(invalid_body)?;

    let (Some(email), Some(password)) = (
        string_field(&payload, "email"),
        string_field(&payload, "password"),
    ) else {
        return Err(AppError::Validation(
            "Missing email or password".to_string(),
        ));
    };

    let session = state.auth.login(&email, &password).await?;
    let expires_at = session.expires_at();

    Ok(Json(LoginResponse {
        message: "Logged in successfully".to_string(),
        token: session.token,
        user: session.user.profile(),
        expires_at,
    }))
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub message: String,
    pub token: String,
    pub user: UserProfile,
    pub expires_at: DateTime<Utc>,
}

/// Revoke the presented token
pub async fn logout(
    State(state): State<AppState>,
    Extension(current): Extension<AuthenticatedUser>,
) -> Result<Json<MessageResponse>> {
    state.auth.logout(&current.claims).await?;
    Ok(Json(MessageResponse {
        message: "Logged out successfully".to_string(),
    }))
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

/// Profile of the token's owner
pub async fn me(Extension(current): Extension<AuthenticatedUser>) -> Json<MeResponse> {
    Json(MeResponse {
        user: current.user.profile(),
    })
}

#[derive(Debug, Serialize)]
pub struct MeResponse {
    pub user: UserProfile,
}

fn invalid_body(rejection: JsonRejection) -> AppError {
    AppError::Validation(rejection.body_text())
}

/// A present, non-blank string field
fn string_field(payload: &Value, name: &str) -> Option<String> {
    payload
        .get(name)
        .and_then(Value::as_str)
        .filter(|s| !s.trim().is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_string_field() {
        let payload = json!({"email": "a@b.co", "password": "  ", "username": 4});
        assert_eq!(string_field(&payload, "email").as_deref(), Some("a@b.co"));
        assert_eq!(string_field(&payload, "password"), None);
        assert_eq!(string_field(&payload, "username"), None);
        assert_eq!(string_field(&payload, "missing"), None);
    }
}
