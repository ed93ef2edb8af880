//! Cross-component scenarios.

pub mod lifecycle;
pub mod restart;
pub mod subscriptions;
