pub mod marketing;
pub mod webhook;

pub use marketing::{DispatchOutcome, MarketingNotifier, SkipReason};
pub use webhook::WebhookSender;
