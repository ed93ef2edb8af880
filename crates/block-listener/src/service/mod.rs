//! # Listener Service
//!
//! - `store` - `BlockStore`: record/pointer persistence and pagination
//! - `resume` - `ResumeTracker`: where a source's stream restarts
//! - `subscription` - `SubscriptionManager`: one listening task per source
//! - `lifecycle` - `BlockListener`: init/close and the public entry points

mod lifecycle;
mod resume;
mod store;
mod subscription;

pub use lifecycle::BlockListener;
pub use resume::ResumeTracker;
pub use store::BlockStore;
pub use subscription::{SourceStatus, SubscriptionManager, TaskExit};
