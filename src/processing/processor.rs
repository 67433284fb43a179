use crate::error::{AppError, Result};
use crate::metrics::{
    PREDICTIONS_TOTAL, PREDICTION_DURATION_SECONDS, PREDICTION_ERRORS_TOTAL,
    WEBHOOK_DISPATCH_TOTAL,
};
use crate::ml::{validate_features, Classification, RiskClassifier};
use crate::models::{CustomerSegment, FeatureRecord, PredictionResult};
use crate::notifications::{DispatchOutcome, MarketingNotifier};
use crate::state::Store;
use chrono::Utc;
use serde_json::Value;
use std::sync::Arc;

/// Validates, scores and notifies for a single prediction request
pub struct PredictionProcessor {
    store: Arc<dyn Store>,
    classifier: RiskClassifier,
    notifier: Option<Arc<MarketingNotifier>>,
}

impl PredictionProcessor {
    pub fn new(store: Arc<dyn Store>, classifier: RiskClassifier) -> Self {
        Self {
            store,
            classifier,
            notifier: None,
        }
    }

    /// Set the marketing notifier
    pub fn with_notifier(mut self, notifier: Arc<MarketingNotifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    /// Set the marketing notifier after construction
    pub fn set_notifier(&mut self, notifier: Arc<MarketingNotifier>) {
        self.notifier = Some(notifier);
    }

    pub fn model_loaded(&self) -> bool {
        self.classifier.is_loaded()
    }

    pub fn marketing_enabled(&self) -> bool {
        self.notifier.as_ref().is_some_and(|n| n.is_enabled())
    }

    /// Validate, classify, notify and assemble the response
    pub async fn predict(&self, payload: &Value) -> Result<PredictionResult> {
        let timer = PREDICTION_DURATION_SECONDS.start_timer();

        let result = self.predict_inner(payload).await;
        match &result {
            Ok(prediction) => {
                PREDICTIONS_TOTAL
                    .with_label_values(&[prediction.risk_level.as_ref()])
                    .inc();
                timer.observe_duration();
            }
            Err(e) => {
                let kind = match e {
                    AppError::Validation(_) => "validation",
                    AppError::ModelUnavailable => "model_unavailable",
                    _ => "internal",
                };
                PREDICTION_ERRORS_TOTAL.with_label_values(&[kind]).inc();
                timer.stop_and_discard();
            }
        }

        result
    }

    async fn predict_inner(&self, payload: &Value) -> Result<PredictionResult> {
        let record = validate_features(payload)?;
        let classification = self.classifier.classify(&record)?;

        tracing::info!(
            customer_id = record.customer_id.as_deref().unwrap_or(""),
            probability = classification.probability,
            risk_level = %classification.tier,
            "Prediction computed"
        );

        let outcome = self.dispatch(&record, &classification).await;

        Ok(PredictionResult {
            churn_probability: classification.probability,
            risk_level: classification.tier,
            explanation: classification.explanation,
            recommended_actions: classification.recommended_actions,
            timestamp: Utc::now(),
            input: record,
            notification_sent: outcome.as_ref().is_some_and(DispatchOutcome::is_sent),
            campaign_id: outcome
                .as_ref()
                .and_then(|o| o.campaign_id())
                .map(str::to_string),
        })
    }

    /// Notifier failures are logged and reported as "not sent"
    async fn dispatch(
        &self,
        record: &FeatureRecord,
        classification: &Classification,
    ) -> Option<DispatchOutcome> {
        let notifier = self.notifier.as_ref()?;

        match notifier.notify(record, classification.probability).await {
            Ok(outcome) => {
                let label = if outcome.is_sent() { "sent" } else { "skipped" };
                WEBHOOK_DISPATCH_TOTAL.with_label_values(&[label]).inc();
                if let DispatchOutcome::Skipped(reason) = &outcome {
                    tracing::debug!(reason = %reason, "Marketing notification skipped");
                }
                Some(outcome)
            }
            Err(e) => {
                WEBHOOK_DISPATCH_TOTAL.with_label_values(&["failed"]).inc();
                tracing::error!(error = %e, "Marketing automation error");
                None
            }
        }
    }

    pub async fn list_segments(&self) -> Result<Vec<CustomerSegment>> {
        self.store.list_segments().await
    }
}
