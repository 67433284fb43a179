use super::FeatureRecord;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumIter, EnumString};

/// Churn risk bucket, ordered low < medium < high
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
    EnumIter,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum RiskTier {
    #[serde(alias = "Low", alias = "LOW")]
    Low,
    #[serde(alias = "Medium", alias = "MEDIUM")]
    Medium,
    #[serde(alias = "High", alias = "HIGH")]
    High,
}

impl RiskTier {
    /// Campaign priority sent to the marketing system
    pub fn priority(&self) -> &'static str {
        match self {
            RiskTier::Low => "LOW",
            RiskTier::Medium => "MEDIUM",
            RiskTier::High => "HIGH",
        }
    }
}

/// Outcome of a single prediction request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictionResult {
    pub churn_probability: f64,
    pub risk_level: RiskTier,
    pub explanation: String,
    pub recommended_actions: Vec<String>,
    pub timestamp: DateTime<Utc>,
    /// Validated input echoed back
    pub input: FeatureRecord,
    pub notification_sent: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub campaign_id: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;
    use strum::IntoEnumIterator;

    #[test]
    fn test_tier_ordering() {
        assert!(RiskTier::Low < RiskTier::Medium);
        assert!(RiskTier::Medium < RiskTier::High);
        assert_eq!(RiskTier::iter().max(), Some(RiskTier::High));
    }

    #[test]
    fn test_tier_string_forms() {
        assert_eq!(RiskTier::High.to_string(), "high");
        assert_eq!(RiskTier::from_str("MEDIUM").unwrap(), RiskTier::Medium);
        assert_eq!(serde_json::to_string(&RiskTier::Low).unwrap(), "\"low\"");
        assert_eq!(RiskTier::Medium.priority(), "MEDIUM");
        assert!(RiskTier::from_str("severe").is_err());
        let tier: RiskTier = serde_json::from_str("\"High\"").unwrap();
        assert_eq!(tier, RiskTier::High);
    }
}
