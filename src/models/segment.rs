use super::RiskTier;
use serde::{Deserialize, Serialize};

/// Stored churn score for one customer, keyed by customer id
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomerSegment {
    #[serde(rename = "CustomerID", alias = "customer_id")]
    pub customer_id: i64,

    #[serde(rename = "Churn_Prob", alias = "churn_prob", alias = "churn_probability")]
    pub churn_probability: f64,

    #[serde(rename = "Risk", alias = "risk")]
    pub risk: RiskTier,
}

impl CustomerSegment {
    pub fn new(customer_id: i64, churn_probability: f64, risk: RiskTier) -> Self {
        Self {
            customer_id,
            churn_probability,
            risk,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_wire_keys() {
        let segment = CustomerSegment::new(42, 0.81, RiskTier::High);
        let value = serde_json::to_value(&segment).unwrap();
        assert_eq!(
            value,
            json!({"CustomerID": 42, "Churn_Prob": 0.81, "Risk": "high"})
        );
    }

    #[test]
    fn test_snake_case_input_accepted() {
        let segment: CustomerSegment = serde_json::from_value(json!({
            "customer_id": 7,
            "churn_prob": 0.2,
            "risk": "Low"
        }))
        .unwrap();
        assert_eq!(segment, CustomerSegment::new(7, 0.2, RiskTier::Low));
    }
}
