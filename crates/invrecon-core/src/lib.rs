//! # invrecon-core
//!
//! Core domain models and infrastructure for multi-tenant invoice reconciliation.
//!
//! This crate provides the foundational types used throughout the platform:
//! - Tenant-scoped financial document models (Invoice, Purchase Order, Receipt)
//! - Match results with confidence scores and decision criteria
//! - Hash-chained immutable audit events
//! - Storage and cache interfaces with in-memory reference implementations
//! - Bounded streaming channels and the import progress fanout registry

pub mod audit_chain;
pub mod cache;
pub mod error;
pub mod fanout;
pub mod models;
pub mod storage;
pub mod streaming;

pub use audit_chain::*;
pub use cache::*;
pub use error::*;
pub use fanout::*;
pub use models::*;
pub use storage::*;
pub use streaming::*;
