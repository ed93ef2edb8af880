//! # Ports Layer
//!
//! - `inbound.rs` - Driving ports (read API exposed to callers)
//! - `outbound.rs` - Driven ports (storage, event source, clock)

pub mod inbound;
pub mod outbound;
