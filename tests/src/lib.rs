//! # Block Listener Test Suite
//!
//! ```text
//! tests/
//! ├── src/integration/   # Cross-component scenarios against real data dirs
//! │   ├── restart.rs         # persistence and resume across reopen
//! │   ├── subscriptions.rs   # concurrent sources, reconnects
//! │   └── lifecycle.rs       # init_once / close semantics
//! └── benches/           # Hashing and pagination throughput
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! cargo test -p listener-tests
//! cargo test -p listener-tests integration::restart::
//! cargo bench -p listener-tests
//! ```

pub mod integration;
pub mod support;
