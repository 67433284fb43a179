use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Number of model inputs
pub const FEATURE_COUNT: usize = 8;

/// Canonical feature order, shared with the training pipeline
pub const FEATURE_NAMES: [&str; FEATURE_COUNT] = [
    "Recency",
    "Frequency",
    "Monetary",
    "TenureDays",
    "AvgPurchaseGap",
    "AvgBasketValue",
    "BasketStdDev",
    "UniqueProducts",
];

/// A validated customer record, every numeric field non-negative
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct FeatureRecord {
    /// Days since last purchase
    pub recency: i64,
    /// Number of purchases
    pub frequency: i64,
    /// Total spend
    pub monetary: f64,
    /// Days since first purchase
    pub tenure_days: i64,
    pub avg_purchase_gap: f64,
    pub avg_basket_value: f64,
    pub basket_std_dev: f64,
    pub unique_products: i64,

    #[serde(rename = "customer_id", default, skip_serializing_if = "Option::is_none")]
    pub customer_id: Option<String>,

    #[serde(rename = "email", default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

impl FeatureRecord {
    /// Model input in canonical order
    pub fn to_vector(&self) -> [f64; FEATURE_COUNT] {
        [
            self.recency as f64,
            self.frequency as f64,
            self.monetary,
            self.tenure_days as f64,
            self.avg_purchase_gap,
            self.avg_basket_value,
            self.basket_std_dev,
            self.unique_products as f64,
        ]
    }

    /// The eight features keyed by name, integers kept integral
    pub fn features_json(&self) -> Value {
        json!({
            "Recency": self.recency,
            "Frequency": self.frequency,
            "Monetary": self.monetary,
            "TenureDays": self.tenure_days,
            "AvgPurchaseGap": self.avg_purchase_gap,
            "AvgBasketValue": self.avg_basket_value,
            "BasketStdDev": self.basket_std_dev,
            "UniqueProducts": self.unique_products,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> FeatureRecord {
        FeatureRecord {
            recency: 10,
            frequency: 20,
            monetary: 500.0,
            tenure_days: 100,
            avg_purchase_gap: 5.0,
            avg_basket_value: 25.0,
            basket_std_dev: 3.0,
            unique_products: 10,
            customer_id: None,
            email: None,
        }
    }

    #[test]
    fn test_vector_follows_canonical_order() {
        assert_eq!(
            sample().to_vector(),
            [10.0, 20.0, 500.0, 100.0, 5.0, 25.0, 3.0, 10.0]
        );
    }

    #[test]
    fn test_serializes_with_feature_names() {
        let value = serde_json::to_value(sample()).unwrap();
        for name in FEATURE_NAMES {
            assert!(value.get(name).is_some(), "missing {}", name);
        }
        assert!(value.get("customer_id").is_none());
        assert_eq!(value["Recency"], json!(10));
        assert_eq!(sample().features_json()["UniqueProducts"], json!(10));
    }
}
