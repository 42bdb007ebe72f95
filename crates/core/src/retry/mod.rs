//! Retry policy: turns a failure plus prior attempt counts into a decision.

mod config;
mod policy;
mod types;

pub use config::RetryConfig;
pub use policy::{backoff, classify};
pub use types::{AbortReason, AttemptCounts, ErrorKind, RetryDecision};
