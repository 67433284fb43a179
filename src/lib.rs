//! Customer churn scoring service: feature validation, logistic risk
//! scoring, marketing webhook dispatch and token-based accounts.

pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod metrics;
pub mod ml;
pub mod models;
pub mod notifications;
pub mod processing;
pub mod state;

pub use error::{AppError, Result};
