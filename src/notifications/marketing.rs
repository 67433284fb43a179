use super::webhook::WebhookSender;
use crate::config::{MarketingConfig, RiskConfig};
use crate::error::{AppError, Result};
use crate::metrics::WEBHOOK_ATTEMPTS_TOTAL;
use crate::ml::risk_tier;
use crate::models::{FeatureRecord, RiskTier};
use chrono::Utc;
use serde::Serialize;
use serde_json::Value;
use std::fmt;
use std::time::Duration;
use tracing::{error, info, warn};
use uuid::Uuid;

pub const EVENT_TYPE: &str = "customer_risk_alert";
pub const CAMPAIGN_TRIGGER: &str = "churn_prediction";

/// Why a dispatch was not attempted
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    Disabled,
    NoUrl,
    LowRisk,
    NoCampaign(RiskTier),
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::Disabled => write!(f, "marketing webhook is disabled"),
            SkipReason::NoUrl => write!(f, "no marketing webhook URL configured"),
            SkipReason::LowRisk => write!(f, "low risk customers are not notified"),
            SkipReason::NoCampaign(tier) => {
                write!(f, "no campaign configured for {} risk", tier)
            }
        }
    }
}

/// Result of a dispatch that did not fail
#[derive(Debug, Clone, PartialEq)]
pub enum DispatchOutcome {
    Skipped(SkipReason),
    Sent {
        campaign_id: String,
        attempts: u32,
        /// Marketing system response body, when it was JSON
        response: Option<Value>,
    },
}

impl DispatchOutcome {
    pub fn is_sent(&self) -> bool {
        matches!(self, DispatchOutcome::Sent { .. })
    }

    pub fn campaign_id(&self) -> Option<&str> {
        match self {
            DispatchOutcome::Sent { campaign_id, .. } => Some(campaign_id),
            DispatchOutcome::Skipped(_) => None,
        }
    }
}

#[derive(Debug, Serialize)]
struct RiskAlertEvent<'a> {
    event: &'static str,
    timestamp: String,
    customer: CustomerBlock<'a>,
    campaign: CampaignBlock<'a>,
}

#[derive(Debug, Serialize)]
struct CustomerBlock<'a> {
    id: &'a str,
    email: &'a str,
    risk_level: RiskTier,
    churn_probability: f64,
    features: Value,
}

#[derive(Debug, Serialize)]
struct CampaignBlock<'a> {
    id: &'a str,
    trigger: &'static str,
    priority: &'static str,
}

/// Posts risk alerts to the marketing automation webhook
#[derive(Clone)]
pub struct MarketingNotifier {
    config: MarketingConfig,
    thresholds: RiskConfig,
    sender: WebhookSender,
}

impl MarketingNotifier {
    pub fn new(config: MarketingConfig, thresholds: RiskConfig) -> Result<Self> {
        thresholds.validate()?;
        if config.webhook_retries == 0 {
            return Err(AppError::Configuration(
                "marketing.webhook_retries must be at least 1".to_string(),
            ));
        }

        let sender = WebhookSender::new(config.webhook_timeout_secs)?;
        Ok(Self {
            config,
            thresholds,
            sender,
        })
    }

    /// Enabled and pointed at a URL
    pub fn is_enabled(&self) -> bool {
        self.config.webhook_enabled && self.webhook_url().is_some()
    }

    fn webhook_url(&self) -> Option<&str> {
        self.config
            .webhook_url
            .as_deref()
            .map(str::trim)
            .filter(|url| !url.is_empty())
    }

    pub fn campaign_for(&self, tier: RiskTier) -> Option<&str> {
        let campaigns = &self.config.campaigns;
        match tier {
            RiskTier::High => campaigns.high.as_deref(),
            RiskTier::Medium => campaigns.medium.as_deref(),
            RiskTier::Low => campaigns.low.as_deref(),
        }
        .filter(|id| !id.trim().is_empty())
    }

    /// Delay after the `attempt`-th failed attempt (1-based)
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        Duration::from_millis(self.config.retry_backoff_ms.saturating_mul(attempt as u64))
    }

    /// Event envelope sent to the marketing system
    pub fn build_event(
        &self,
        record: &FeatureRecord,
        tier: RiskTier,
        probability: f64,
        campaign_id: &str,
    ) -> Result<Value> {
        let event = RiskAlertEvent {
            event: EVENT_TYPE,
            timestamp: Utc::now().to_rfc3339(),
            customer: CustomerBlock {
                id: record.customer_id.as_deref().unwrap_or_default(),
                email: record.email.as_deref().unwrap_or_default(),
                risk_level: tier,
                churn_probability: probability,
                features: record.features_json(),
            },
            campaign: CampaignBlock {
                id: campaign_id,
                trigger: CAMPAIGN_TRIGGER,
                priority: tier.priority(),
            },
        };
        Ok(serde_json::to_value(&event)?)
    }

    /// Trigger the campaign for this record's tier.
    ///
    /// Returns `Skipped` when nothing should be sent and
    /// `NotificationFailed` once every attempt has failed.
    pub async fn notify(&self, record: &FeatureRecord, probability: f64) -> Result<DispatchOutcome> {
        if !self.config.webhook_enabled {
            info!("Marketing webhook is disabled");
            return Ok(DispatchOutcome::Skipped(SkipReason::Disabled));
        }

        let Some(url) = self.webhook_url() else {
            warn!("No marketing webhook URL configured");
            return Ok(DispatchOutcome::Skipped(SkipReason::NoUrl));
        };

        let tier = risk_tier(probability, &self.thresholds);
        if tier == RiskTier::Low && !self.config.notify_low_risk {
            return Ok(DispatchOutcome::Skipped(SkipReason::LowRisk));
        }

        let Some(campaign_id) = self.campaign_for(tier) else {
            warn!(risk_level = %tier, "No campaign ID configured for risk level");
            return Ok(DispatchOutcome::Skipped(SkipReason::NoCampaign(tier)));
        };

        let payload = self.build_event(record, tier, probability, campaign_id)?;
        let request_id = Uuid::new_v4().to_string();
        let max_attempts = self.config.webhook_retries;
        let mut last_error = String::new();

        for attempt in 1..=max_attempts {
            WEBHOOK_ATTEMPTS_TOTAL.inc();

            match self
                .sender
                .send_json(url, &payload, &request_id, &self.config.headers)
                .await
            {
                Ok(response) => {
                    info!(
                        risk_level = %tier,
                        campaign_id = campaign_id,
                        customer_id = record.customer_id.as_deref().unwrap_or(""),
                        attempts = attempt,
                        request_id = %request_id,
                        "Triggered retention campaign"
                    );
                    return Ok(DispatchOutcome::Sent {
                        campaign_id: campaign_id.to_string(),
                        attempts: attempt,
                        response,
                    });
                }
                Err(e) => {
                    last_error = e.to_string();
                    warn!(
                        attempt = attempt,
                        max_attempts = max_attempts,
                        error = %last_error,
                        request_id = %request_id,
                        "Marketing webhook attempt failed"
                    );

                    if attempt < max_attempts {
                        tokio::time::sleep(self.backoff_delay(attempt)).await;
                    }
                }
            }
        }

        error!(
            attempts = max_attempts,
            error = %last_error,
            request_id = %request_id,
            "Failed to trigger marketing campaign"
        );
        Err(AppError::NotificationFailed {
            attempts: max_attempts,
            message: last_error,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> FeatureRecord {
        FeatureRecord {
            recency: 200,
            frequency: 1,
            monetary: 5.0,
            tenure_days: 200,
            avg_purchase_gap: 200.0,
            avg_basket_value: 5.0,
            basket_std_dev: 0.0,
            unique_products: 1,
            customer_id: Some("C-1".to_string()),
            email: Some("c1@example.com".to_string()),
        }
    }

    fn notifier(config: MarketingConfig) -> MarketingNotifier {
        MarketingNotifier::new(config, RiskConfig::default()).unwrap()
    }

    fn enabled_config() -> MarketingConfig {
        MarketingConfig {
            webhook_enabled: true,
            webhook_url: Some("http://127.0.0.1:9/hook".to_string()),
            retry_backoff_ms: 1,
            ..MarketingConfig::default()
        }
    }

    #[test]
    fn test_backoff_is_linear() {
        let n = notifier(MarketingConfig::default());
        assert_eq!(n.backoff_delay(1), Duration::from_secs(1));
        assert_eq!(n.backoff_delay(2), Duration::from_secs(2));
        assert_eq!(n.backoff_delay(3), Duration::from_secs(3));
    }

    #[test]
    fn test_event_shape() {
        let n = notifier(enabled_config());
        let event = n
            .build_event(&record(), RiskTier::High, 0.93, "high_retention_campaign")
            .unwrap();

        assert_eq!(event["event"], "customer_risk_alert");
        assert_eq!(event["customer"]["id"], "C-1");
        assert_eq!(event["customer"]["email"], "c1@example.com");
        assert_eq!(event["customer"]["risk_level"], "high");
        assert_eq!(event["customer"]["churn_probability"], 0.93);
        assert_eq!(event["customer"]["features"]["Recency"], 200);
        assert_eq!(event["campaign"]["id"], "high_retention_campaign");
        assert_eq!(event["campaign"]["trigger"], "churn_prediction");
        assert_eq!(event["campaign"]["priority"], "HIGH");
        assert!(event["timestamp"].is_string());
    }

    #[tokio::test]
    async fn test_disabled_is_skipped() {
        let n = notifier(MarketingConfig::default());
        let outcome = n.notify(&record(), 0.95).await.unwrap();
        assert_eq!(outcome, DispatchOutcome::Skipped(SkipReason::Disabled));
    }

    #[tokio::test]
    async fn test_missing_url_is_skipped() {
        let n = notifier(MarketingConfig {
            webhook_url: Some("  ".to_string()),
            ..enabled_config()
        });
        assert!(!n.is_enabled());
        let outcome = n.notify(&record(), 0.95).await.unwrap();
        assert_eq!(outcome, DispatchOutcome::Skipped(SkipReason::NoUrl));
    }

    #[tokio::test]
    async fn test_low_risk_is_skipped_by_default() {
        let n = notifier(enabled_config());
        let outcome = n.notify(&record(), 0.1).await.unwrap();
        assert_eq!(outcome, DispatchOutcome::Skipped(SkipReason::LowRisk));
    }

    #[tokio::test]
    async fn test_missing_campaign_is_skipped() {
        let mut config = enabled_config();
        config.campaigns.medium = None;
        let n = notifier(config);
        let outcome = n.notify(&record(), 0.5).await.unwrap();
        assert_eq!(
            outcome,
            DispatchOutcome::Skipped(SkipReason::NoCampaign(RiskTier::Medium))
        );
    }

    #[test]
    fn test_zero_retries_rejected() {
        let config = MarketingConfig {
            webhook_retries: 0,
            ..MarketingConfig::default()
        };
        assert!(MarketingNotifier::new(config, RiskConfig::default()).is_err());
    }
}
