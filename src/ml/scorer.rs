use crate::error::{AppError, Result};
use crate::models::{FEATURE_COUNT, FEATURE_NAMES};
use ndarray::Array1;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Opaque churn model: eight features in, probability out
pub trait Scorer: Send + Sync {
    /// Probability of churn for a feature vector in canonical order
    fn predict_proba(&self, features: &[f64; FEATURE_COUNT]) -> Result<f64>;

    /// Human-readable model identifier
    fn name(&self) -> String;
}

/// Serialized logistic regression produced by the training pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelArtifact {
    pub name: String,
    pub version: String,
    pub feature_names: Vec<String>,
    pub coefficients: Vec<f64>,
    pub intercept: f64,
    #[serde(default)]
    pub scaler: Option<StandardScaler>,
}

/// Per-feature standardization fitted at training time
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StandardScaler {
    pub mean: Vec<f64>,
    pub scale: Vec<f64>,
}

/// Logistic regression scorer
#[derive(Debug, Clone)]
pub struct LogisticScorer {
    name: String,
    version: String,
    weights: Array1<f64>,
    intercept: f64,
    mean: Option<Array1<f64>>,
    scale: Option<Array1<f64>>,
}

impl LogisticScorer {
    /// Build from an artifact, checking it matches the canonical feature layout
    pub fn from_artifact(artifact: ModelArtifact) -> Result<Self> {
        if artifact.feature_names.len() != FEATURE_COUNT
            || artifact
                .feature_names
                .iter()
                .zip(FEATURE_NAMES)
                .any(|(got, want)| got != want)
        {
            return Err(AppError::Configuration(format!(
                "Model feature order {:?} does not match {:?}",
                artifact.feature_names, FEATURE_NAMES
            )));
        }

        if artifact.coefficients.len() != FEATURE_COUNT {
            return Err(AppError::Configuration(format!(
                "Model has {} coefficients, expected {}",
                artifact.coefficients.len(),
                FEATURE_COUNT
            )));
        }

        let (mean, scale) = match artifact.scaler {
            Some(scaler) => {
                if scaler.mean.len() != FEATURE_COUNT || scaler.scale.len() != FEATURE_COUNT {
                    return Err(AppError::Configuration(
                        "Model scaler must have one mean and scale per feature".to_string(),
                    ));
                }
                if scaler.scale.iter().any(|s| *s == 0.0 || !s.is_finite()) {
                    return Err(AppError::Configuration(
                        "Model scaler contains a zero or non-finite scale".to_string(),
                    ));
                }
                (
                    Some(Array1::from(scaler.mean)),
                    Some(Array1::from(scaler.scale)),
                )
            }
            None => (None, None),
        };

        Ok(Self {
            name: artifact.name,
            version: artifact.version,
            weights: Array1::from(artifact.coefficients),
            intercept: artifact.intercept,
            mean,
            scale,
        })
    }

    /// Load a JSON artifact from disk
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        let artifact: ModelArtifact = serde_json::from_str(&raw)?;
        Self::from_artifact(artifact)
    }
}

impl Scorer for LogisticScorer {
    fn predict_proba(&self, features: &[f64; FEATURE_COUNT]) -> Result<f64> {
        let mut x = Array1::from(features.to_vec());
        if let (Some(mean), Some(scale)) = (&self.mean, &self.scale) {
            x = (x - mean) / scale;
        }

        let z = self.weights.dot(&x) + self.intercept;
        Ok(sigmoid(z))
    }

    fn name(&self) -> String {
        format!("{} v{}", self.name, self.version)
    }
}

fn sigmoid(z: f64) -> f64 {
    1.0 / (1.0 + (-z).exp())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_artifact() -> ModelArtifact {
        ModelArtifact {
            name: "churn-logreg".to_string(),
            version: "1.0.0".to_string(),
            feature_names: FEATURE_NAMES.iter().map(|s| s.to_string()).collect(),
            coefficients: vec![1.2, -0.9, -0.5, -0.2, 0.8, -0.2, 0.05, -0.4],
            intercept: -0.3,
            scaler: Some(StandardScaler {
                mean: vec![90.0, 5.0, 300.0, 365.0, 40.0, 50.0, 15.0, 8.0],
                scale: vec![80.0, 5.0, 400.0, 250.0, 40.0, 40.0, 15.0, 6.0],
            }),
        }
    }

    #[test]
    fn test_probability_bounds_and_direction() {
        let scorer = LogisticScorer::from_artifact(test_artifact()).unwrap();
        let low = scorer
            .predict_proba(&[10.0, 20.0, 500.0, 100.0, 5.0, 25.0, 3.0, 10.0])
            .unwrap();
        let high = scorer
            .predict_proba(&[200.0, 1.0, 5.0, 200.0, 200.0, 5.0, 0.0, 1.0])
            .unwrap();

        assert!((0.0..=1.0).contains(&low));
        assert!((0.0..=1.0).contains(&high));
        assert!(low < 0.4);
        assert!(high > 0.7);
    }

    #[test]
    fn test_without_scaler() {
        let mut artifact = test_artifact();
        artifact.scaler = None;
        artifact.coefficients = vec![0.0; FEATURE_COUNT];
        artifact.intercept = 0.0;
        let scorer = LogisticScorer::from_artifact(artifact).unwrap();
        let p = scorer.predict_proba(&[1.0; FEATURE_COUNT]).unwrap();
        assert!((p - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_feature_order_mismatch_rejected() {
        let mut artifact = test_artifact();
        artifact.feature_names.swap(0, 1);
        assert!(LogisticScorer::from_artifact(artifact).is_err());
    }

    #[test]
    fn test_zero_scale_rejected() {
        let mut artifact = test_artifact();
        if let Some(scaler) = artifact.scaler.as_mut() {
            scaler.scale[3] = 0.0;
        }
        assert!(LogisticScorer::from_artifact(artifact).is_err());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.json");
        std::fs::write(&path, serde_json::to_string(&test_artifact()).unwrap()).unwrap();

        let scorer = LogisticScorer::load(&path).unwrap();
        assert_eq!(scorer.name(), "churn-logreg v1.0.0");

        assert!(LogisticScorer::load(dir.path().join("missing.json")).is_err());
    }
}
