use crate::error::AppError;
use crate::models::{FeatureRecord, FEATURE_COUNT, FEATURE_NAMES};
use serde_json::{Map, Value};
use thiserror::Error;
use validator::ValidateEmail;

/// Rejections raised while checking an inbound feature record
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("Request body must be a JSON object")]
    NotAnObject,

    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Invalid value for {field}: {value}")]
    InvalidType { field: String, value: String },

    #[error("{field} cannot be negative")]
    NegativeValue { field: String },
}

impl ValidationError {
    fn invalid(field: &str, value: &Value) -> Self {
        ValidationError::InvalidType {
            field: field.to_string(),
            value: value.to_string(),
        }
    }
}

impl From<ValidationError> for AppError {
    fn from(err: ValidationError) -> Self {
        AppError::Validation(err.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum FieldKind {
    Int,
    Float,
}

const FIELD_KINDS: [FieldKind; FEATURE_COUNT] = [
    FieldKind::Int,   // Recency
    FieldKind::Int,   // Frequency
    FieldKind::Float, // Monetary
    FieldKind::Int,   // TenureDays
    FieldKind::Float, // AvgPurchaseGap
    FieldKind::Float, // AvgBasketValue
    FieldKind::Float, // BasketStdDev
    FieldKind::Int,   // UniqueProducts
];

/// Check `payload` against the eight required features and coerce each to
/// its canonical numeric type.
///
/// Fields are checked in canonical order; the first failure is returned.
/// Integer fields accept integral floats and numeric strings, float fields
/// accept any finite number or numeric string.
pub fn validate_features(payload: &Value) -> Result<FeatureRecord, ValidationError> {
    let object = payload.as_object().ok_or(ValidationError::NotAnObject)?;

    let mut values = [0.0_f64; FEATURE_COUNT];
    let mut ints = [0_i64; FEATURE_COUNT];

    for (idx, (name, kind)) in FEATURE_NAMES.iter().zip(FIELD_KINDS).enumerate() {
        let raw = object
            .get(*name)
            .ok_or_else(|| ValidationError::MissingField(name.to_string()))?;

        match kind {
            FieldKind::Int => {
                let v = coerce_int(name, raw)?;
                if v < 0 {
                    return Err(ValidationError::NegativeValue {
                        field: name.to_string(),
                    });
                }
                ints[idx] = v;
                values[idx] = v as f64;
            }
            FieldKind::Float => {
                let v = coerce_float(name, raw)?;
                if v < 0.0 {
                    return Err(ValidationError::NegativeValue {
                        field: name.to_string(),
                    });
                }
                values[idx] = v;
            }
        }
    }

    Ok(FeatureRecord {
        recency: ints[0],
        frequency: ints[1],
        monetary: values[2],
        tenure_days: ints[3],
        avg_purchase_gap: values[4],
        avg_basket_value: values[5],
        basket_std_dev: values[6],
        unique_products: ints[7],
        customer_id: customer_id(object)?,
        email: email(object)?,
    })
}

fn coerce_int(field: &str, raw: &Value) -> Result<i64, ValidationError> {
    match raw {
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Ok(i)
            } else {
                n.as_f64()
                    .and_then(integral)
                    .ok_or_else(|| ValidationError::invalid(field, raw))
            }
        }
        Value::String(s) => {
            let s = s.trim();
            s.parse::<i64>()
                .ok()
                .or_else(|| s.parse::<f64>().ok().and_then(integral))
                .ok_or_else(|| ValidationError::invalid(field, raw))
        }
        _ => Err(ValidationError::invalid(field, raw)),
    }
}

fn coerce_float(field: &str, raw: &Value) -> Result<f64, ValidationError> {
    let parsed = match raw {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };

    parsed
        .filter(|v| v.is_finite())
        .ok_or_else(|| ValidationError::invalid(field, raw))
}

fn integral(v: f64) -> Option<i64> {
    if v.is_finite() && v.fract() == 0.0 && v.abs() < i64::MAX as f64 {
        Some(v as i64)
    } else {
        None
    }
}

fn customer_id(object: &Map<String, Value>) -> Result<Option<String>, ValidationError> {
    match object.get("customer_id") {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) if s.trim().is_empty() => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.trim().to_string())),
        Some(Value::Number(n)) => Ok(Some(n.to_string())),
        Some(other) => Err(ValidationError::invalid("customer_id", other)),
    }
}

fn email(object: &Map<String, Value>) -> Result<Option<String>, ValidationError> {
    match object.get("email") {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) if s.trim().is_empty() => Ok(None),
        Some(raw @ Value::String(s)) => {
            let s = s.trim();
            if s.validate_email() {
                Ok(Some(s.to_string()))
            } else {
                Err(ValidationError::invalid("email", raw))
            }
        }
        Some(other) => Err(ValidationError::invalid("email", other)),
    }
}
