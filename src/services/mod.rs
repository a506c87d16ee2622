pub mod topup;
pub mod webhook_processor;

pub use topup::{StartTopup, StartedTopup, TopupService};
pub use webhook_processor::{WebhookError, WebhookOutcome, WebhookProcessor};
