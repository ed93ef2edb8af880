//! # Domain Layer
//!
//! Pure domain logic for the block listener. Nothing here touches disk,
//! the async runtime, or an event stream.
//!
//! ## Modules
//!
//! - `entities` - BlockEvent, BlockRecord, LatestPointer, BlockPage
//! - `hashing` - canonical header encoding and SHA-256 block hash
//! - `pagination` - descending page window arithmetic
//! - `value_objects` - configuration, namespaces and key layout
//! - `errors` - error types

pub mod entities;
pub mod errors;
pub mod hashing;
pub mod pagination;
pub mod value_objects;
