use customer_retention_service::{
    api::{build_router, AppState},
    auth::AuthService,
    config::Config,
    metrics::MODEL_LOADED,
    ml::{LogisticScorer, RiskClassifier, Scorer},
    notifications::MarketingNotifier,
    processing::PredictionProcessor,
    state::create_store,
};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration before tracing so json_logs can pick the formatter
    let config = match Config::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    init_tracing(&config);

    tracing::info!(
        "Starting customer retention service v{}",
        env!("CARGO_PKG_VERSION")
    );

    // Initialize Prometheus metrics
    if config.observability.prometheus_enabled {
        if let Err(e) = customer_retention_service::metrics::init_metrics() {
            tracing::warn!("Failed to initialize metrics: {}", e);
            tracing::warn!("Continuing without metrics");
        } else {
            tracing::info!("Prometheus metrics initialized");
        }
    } else {
        tracing::info!("Prometheus metrics disabled in configuration");
    }

    // Initialize storage backend
    tracing::info!("Storage backend: {:?}", config.storage.backend);
    let store = create_store(&config.storage).await?;
    tracing::info!("Storage backend initialized");

    // Load the churn model; the service still answers without one
    let scorer: Option<Arc<dyn Scorer>> = match LogisticScorer::load(&config.model.path) {
        Ok(scorer) => {
            tracing::info!(
                path = %config.model.path.display(),
                model = %scorer.name(),
                "Churn model loaded"
            );
            let scorer: Arc<dyn Scorer> = Arc::new(scorer);
            Some(scorer)
        }
        Err(e) => {
            tracing::warn!(
                path = %config.model.path.display(),
                error = %e,
                "Churn model unavailable, predictions will return 503"
            );
            None
        }
    };
    MODEL_LOADED.set(if scorer.is_some() { 1.0 } else { 0.0 });

    let classifier = RiskClassifier::new(scorer, config.risk)?;

    // Initialize marketing notifier
    let mut processor = PredictionProcessor::new(store.clone(), classifier);
    match MarketingNotifier::new(config.marketing.clone(), config.risk) {
        Ok(notifier) => {
            if notifier.is_enabled() {
                tracing::info!("Marketing webhook enabled");
            } else {
                tracing::info!("Marketing webhook disabled");
            }
            processor.set_notifier(Arc::new(notifier));
        }
        Err(e) => {
            tracing::warn!("Marketing notifier initialization failed: {}", e);
            tracing::warn!("Continuing without marketing notifications");
        }
    }

    let auth = Arc::new(AuthService::new(store, config.auth.clone()));

    let app_state = AppState::new(Arc::new(processor), auth)
        .with_protected_api(config.auth.protect_api)
        .with_request_timeout(Duration::from_secs(config.server.request_timeout_secs));
    let app = build_router(app_state);

    // Start HTTP server
    let http_addr = format!("{}:{}", config.server.host, config.server.http_port);
    let http_listener = tokio::net::TcpListener::bind(&http_addr).await?;

    tracing::info!("HTTP API server listening on http://{}", http_addr);
    tracing::info!("   Health check: http://{}/health", http_addr);
    tracing::info!("   Predict: http://{}/api/predict", http_addr);
    tracing::info!("Press Ctrl+C to shutdown");

    let http_handle = tokio::spawn(async move {
        if let Err(e) = axum::serve(http_listener, app).await {
            tracing::error!("HTTP server error: {}", e);
        }
    });

    tokio::select! {
        _ = http_handle => {
            tracing::warn!("HTTP server stopped");
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Shutdown signal received");
        }
    }

    tracing::info!("Shutting down gracefully...");
    Ok(())
}

fn init_tracing(config: &Config) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        format!(
            "customer_retention_service={},tower_http=info",
            config.observability.log_level
        )
        .into()
    });

    let registry = tracing_subscriber::registry().with(filter);
    if config.observability.json_logs {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}
