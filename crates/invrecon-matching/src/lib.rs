//! # invrecon-matching
//!
//! The automated matching engines: exact and fuzzy two-way matching
//! (Invoice <-> PO) and line-level three-way matching
//! (Invoice <-> PO <-> Receipt), built from pure fuzzy-similarity
//! primitives, a tolerance engine, and a weighted confidence scorer.
//!
//! Every decision persists a `MatchResult` and appends a hash-chained audit
//! event inside the same storage transaction, so a decision and its trail
//! commit or roll back together.

pub mod confidence;
pub mod fuzzy;
pub mod metrics;
pub mod three_way;
pub mod tolerance;
pub mod two_way;

pub use confidence::*;
pub use fuzzy::*;
pub use metrics::*;
pub use three_way::*;
pub use tolerance::*;
pub use two_way::*;
