use crate::config::RiskConfig;
use crate::error::{AppError, Result};
use crate::ml::scorer::Scorer;
use crate::models::{FeatureRecord, RiskTier};
use std::sync::Arc;

/// Probability and tier produced for one record
#[derive(Debug, Clone, PartialEq)]
pub struct Classification {
    pub probability: f64,
    pub tier: RiskTier,
    pub explanation: String,
    pub recommended_actions: Vec<String>,
}

/// Bucket a probability into a tier
pub fn risk_tier(probability: f64, thresholds: &RiskConfig) -> RiskTier {
    if probability >= thresholds.high_threshold {
        RiskTier::High
    } else if probability >= thresholds.medium_threshold {
        RiskTier::Medium
    } else {
        RiskTier::Low
    }
}

/// Static playbook per tier
pub fn recommended_actions(tier: RiskTier) -> Vec<String> {
    let actions: &[&str] = match tier {
        RiskTier::High => &[
            "Send a personalized win-back offer",
            "Schedule outreach from an account manager",
            "Offer a loyalty discount on the next purchase",
        ],
        RiskTier::Medium => &[
            "Send a re-engagement email campaign",
            "Recommend products based on purchase history",
        ],
        RiskTier::Low => &[
            "Keep the customer on the regular newsletter",
            "Invite the customer to the loyalty program",
        ],
    };
    actions.iter().map(|a| a.to_string()).collect()
}

/// Rule-based summary of why a record looks risky
pub fn explain(record: &FeatureRecord, tier: RiskTier, probability: f64) -> String {
    let mut factors = Vec::new();

    if record.recency > 100 {
        factors.push(format!("no purchase in {} days", record.recency));
    }
    if record.frequency < 2 {
        factors.push(format!("only {} purchase(s) on record", record.frequency));
    }
    if record.monetary < 10.0 {
        factors.push(format!("low total spend ({:.2})", record.monetary));
    }
    if record.avg_purchase_gap > 30.0 {
        factors.push(format!(
            "long average gap between purchases ({:.1} days)",
            record.avg_purchase_gap
        ));
    }

    let headline = format!(
        "{} churn risk ({:.1}% probability).",
        capitalize(tier.as_ref()),
        probability * 100.0
    );

    if factors.is_empty() {
        format!("{} No significant churn risk factors detected.", headline)
    } else {
        format!("{} Contributing factors: {}.", headline, factors.join(", "))
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Wraps the injected scorer with tiering, explanation and actions
#[derive(Clone)]
pub struct RiskClassifier {
    scorer: Option<Arc<dyn Scorer>>,
    thresholds: RiskConfig,
}

impl RiskClassifier {
    /// Create a classifier; `scorer` is `None` when no model could be loaded
    pub fn new(scorer: Option<Arc<dyn Scorer>>, thresholds: RiskConfig) -> Result<Self> {
        thresholds.validate()?;
        Ok(Self { scorer, thresholds })
    }

    pub fn is_loaded(&self) -> bool {
        self.scorer.is_some()
    }

    pub fn model_name(&self) -> Option<String> {
        self.scorer.as_ref().map(|s| s.name())
    }

    /// Raw probability, clamped to [0, 1]
    pub fn score(&self, record: &FeatureRecord) -> Result<f64> {
        let scorer = self.scorer.as_ref().ok_or(AppError::ModelUnavailable)?;
        let probability = scorer.predict_proba(&record.to_vector())?;

        if !probability.is_finite() {
            return Err(AppError::Internal(format!(
                "Scorer returned non-finite probability: {}",
                probability
            )));
        }

        Ok(probability.clamp(0.0, 1.0))
    }

    /// Score and tier a validated record
    pub fn classify(&self, record: &FeatureRecord) -> Result<Classification> {
        let probability = self.score(record)?;
        let tier = risk_tier(probability, &self.thresholds);

        Ok(Classification {
            probability,
            tier,
            explanation: explain(record, tier, probability),
            recommended_actions: recommended_actions(tier),
        })
    }
}

impl std::fmt::Debug for RiskClassifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RiskClassifier")
            .field("model", &self.model_name())
            .field("thresholds", &self.thresholds)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::FEATURE_COUNT;

    struct FixedScorer(f64);

    impl Scorer for FixedScorer {
        fn predict_proba(&self, _features: &[f64; FEATURE_COUNT]) -> Result<f64> {
            Ok(self.0)
        }

        fn name(&self) -> String {
            "fixed".to_string()
        }
    }

    fn record(recency: i64, frequency: i64, monetary: f64, gap: f64) -> FeatureRecord {
        FeatureRecord {
            recency,
            frequency,
            monetary,
            tenure_days: 100,
            avg_purchase_gap: gap,
            avg_basket_value: 25.0,
            basket_std_dev: 3.0,
            unique_products: 10,
            customer_id: None,
            email: None,
        }
    }

    fn classifier(p: f64) -> RiskClassifier {
        RiskClassifier::new(Some(Arc::new(FixedScorer(p))), RiskConfig::default()).unwrap()
    }

    #[test]
    fn test_tier_boundaries() {
        let thresholds = RiskConfig::default();
        assert_eq!(risk_tier(0.0, &thresholds), RiskTier::Low);
        assert_eq!(risk_tier(0.39, &thresholds), RiskTier::Low);
        assert_eq!(risk_tier(0.4, &thresholds), RiskTier::Medium);
        assert_eq!(risk_tier(0.69, &thresholds), RiskTier::Medium);
        assert_eq!(risk_tier(0.7, &thresholds), RiskTier::High);
        assert_eq!(risk_tier(1.0, &thresholds), RiskTier::High);
    }

    #[test]
    fn test_tier_is_monotonic() {
        let thresholds = RiskConfig::default();
        let mut previous = RiskTier::Low;
        for i in 0..=100 {
            let tier = risk_tier(i as f64 / 100.0, &thresholds);
            assert!(tier >= previous);
            previous = tier;
        }
    }

    #[test]
    fn test_missing_scorer_is_unavailable() {
        let classifier = RiskClassifier::new(None, RiskConfig::default()).unwrap();
        assert!(!classifier.is_loaded());
        assert!(matches!(
            classifier.classify(&record(10, 20, 500.0, 5.0)),
            Err(AppError::ModelUnavailable)
        ));
    }

    #[test]
    fn test_output_is_clamped() {
        assert_eq!(classifier(1.7).score(&record(10, 20, 500.0, 5.0)).unwrap(), 1.0);
        assert_eq!(classifier(-0.2).score(&record(10, 20, 500.0, 5.0)).unwrap(), 0.0);
        assert!(classifier(f64::NAN).score(&record(10, 20, 500.0, 5.0)).is_err());
    }

    #[test]
    fn test_inverted_thresholds_rejected() {
        let thresholds = RiskConfig {
            high_threshold: 0.2,
            medium_threshold: 0.5,
        };
        assert!(RiskClassifier::new(None, thresholds).is_err());
    }

    #[test]
    fn test_explanation_factors() {
        let result = classifier(0.9).classify(&record(200, 1, 5.0, 45.0)).unwrap();
        assert_eq!(result.tier, RiskTier::High);
        assert!(result.explanation.starts_with("High churn risk (90.0% probability)."));
        assert!(result.explanation.contains("no purchase in 200 days"));
        assert!(result.explanation.contains("only 1 purchase(s)"));
        assert!(result.explanation.contains("low total spend"));
        assert!(result.explanation.contains("long average gap"));
        assert_eq!(result.recommended_actions.len(), 3);

        let result = classifier(0.1).classify(&record(10, 20, 500.0, 5.0)).unwrap();
        assert_eq!(result.tier, RiskTier::Low);
        assert!(result
            .explanation
            .ends_with("No significant churn risk factors detected."));
    }

    #[test]
    fn test_classification_is_deterministic() {
        let c = classifier(0.55);
        let r = record(120, 3, 80.0, 12.0);
        assert_eq!(c.classify(&r).unwrap(), c.classify(&r).unwrap());
    }
}
