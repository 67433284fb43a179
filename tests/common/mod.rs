//! Shared helpers for driving the HTTP router in integration tests

#![allow(dead_code)]

use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
    Router,
};
use customer_retention_service::{
    api::{build_router, AppState},
    auth::AuthService,
    config::{Config, StorageBackend},
    ml::{LogisticScorer, RiskClassifier, Scorer},
    notifications::MarketingNotifier,
    processing::PredictionProcessor,
    state::{create_in_memory_store, Store},
};
use serde_json::{json, Value};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

/// Path of the bundled model artifact
pub fn model_path() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("data/churn_model.json")
}

/// In-memory store, cheap bcrypt, webhook disabled
pub fn test_config() -> Config {
    let mut config = Config::default();
    config.storage.backend = StorageBackend::Memory;
    config.storage.path = None;
    config.auth.bcrypt_cost = 4;
    config.auth.secret_key = "integration-test-secret".to_string();
    config.model.path = model_path();
    config.marketing.webhook_enabled = false;
    config
}

pub struct TestApp {
    pub router: Router,
    pub store: Arc<dyn Store>,
}

/// Build the full router; `with_model = false` leaves the scorer unloaded
pub fn build_test_app(config: &Config, with_model: bool) -> TestApp {
    let _ = customer_retention_service::metrics::init_metrics();

    let store = create_in_memory_store();
    let scorer: Option<Arc<dyn Scorer>> = if with_model {
        let scorer: Arc<dyn Scorer> =
            Arc::new(LogisticScorer::load(&config.model.path).expect("bundled model loads"));
        Some(scorer)
    } else {
        None
    };
    let classifier = RiskClassifier::new(scorer, config.risk).expect("valid thresholds");
    let notifier = MarketingNotifier::new(config.marketing.clone(), config.risk)
        .expect("valid marketing config");
    let processor = PredictionProcessor::new(store.clone(), classifier)
        .with_notifier(Arc::new(notifier));
    let auth = Arc::new(AuthService::new(store.clone(), config.auth.clone()));

    let state = AppState::new(Arc::new(processor), auth)
        .with_protected_api(config.auth.protect_api)
        .with_request_timeout(Duration::from_secs(config.server.request_timeout_secs));

    TestApp {
        router: build_router(state),
        store,
    }
}

impl TestApp {
    /// Send a request and decode the body as JSON, falling back to a string
    pub async fn send(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
        token: Option<&str>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string())),
            None => builder.body(Body::empty()),
        }
        .unwrap();

        self.dispatch(request).await
    }

    pub async fn dispatch(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = serde_json::from_slice(&bytes)
            .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()));
        (status, value)
    }

    pub async fn get(&self, uri: &str) -> (StatusCode, Value) {
        self.send(Method::GET, uri, None, None).await
    }

    pub async fn post(&self, uri: &str, body: Value) -> (StatusCode, Value) {
        self.send(Method::POST, uri, Some(body), None).await
    }

    /// Register then log in, returning the bearer token
    pub async fn register_and_login(&self, username: &str, email: &str, password: &str) -> String {
        let (status, _) = self
            .post(
                "/auth/register",
                json!({"username": username, "email": email, "password": password}),
            )
            .await;
        assert_eq!(status, StatusCode::OK);

        let (status, body) = self
            .post("/auth/login", json!({"email": email, "password": password}))
            .await;
        assert_eq!(status, StatusCode::OK);
        body["token"].as_str().unwrap().to_string()
    }
}

/// Low churn risk reference customer
pub fn low_risk_features() -> Value {
    json!({
        "Recency": 10,
        "Frequency": 20,
        "Monetary": 500.0,
        "TenureDays": 100,
        "AvgPurchaseGap": 5.0,
        "AvgBasketValue": 25.0,
        "BasketStdDev": 3.0,
        "UniqueProducts": 10
    })
}

/// High churn risk reference customer
pub fn high_risk_features() -> Value {
    json!({
        "Recency": 200,
        "Frequency": 1,
        "Monetary": 5.0,
        "TenureDays": 200,
        "AvgPurchaseGap": 200.0,
        "AvgBasketValue": 5.0,
        "BasketStdDev": 0.0,
        "UniqueProducts": 1
    })
}

/// Assert the standard error envelope and return its message
pub fn error_message(body: &Value, code: &str, status: StatusCode) -> String {
    assert_eq!(body["error"]["code"], code, "unexpected body {}", body);
    assert_eq!(body["error"]["status"], status.as_u16());
    body["error"]["message"].as_str().unwrap_or_default().to_string()
}

/// Value of the first sample line for `metric` with every given label
pub fn metric_value(output: &str, metric: &str, labels: &[(&str, &str)]) -> Option<f64> {
    output
        .lines()
        .filter(|line| !line.starts_with('#'))
        .filter(|line| {
            line.split(|c| c == '{' || c == ' ')
                .next()
                .is_some_and(|name| name == metric)
        })
        .find(|line| {
            labels
                .iter()
                .all(|(k, v)| line.contains(&format!("{}=\"{}\"", k, v)))
        })
        .and_then(|line| line.split_whitespace().last())
        .and_then(|v| v.parse().ok())
}
