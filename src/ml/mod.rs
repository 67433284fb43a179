/// Churn scoring
///
/// This module provides:
/// - Validation and coercion of inbound feature records
/// - The `Scorer` seam and a logistic-regression scorer loaded from JSON
/// - Risk tiering, explanations and recommended actions

pub mod classifier;
pub mod features;
pub mod scorer;

pub use classifier::{explain, recommended_actions, risk_tier, Classification, RiskClassifier};
pub use features::{validate_features, ValidationError};
pub use scorer::{LogisticScorer, ModelArtifact, Scorer, StandardScaler};
