//! # invrecon-config
//!
//! Validation and loading of per-tenant matching configuration.
//!
//! A [`invrecon_core::MatchingConfiguration`] drives both matching engines:
//! confidence thresholds, factor weights, feature flags, and batch
//! parallelism. This crate validates configurations before an engine will
//! accept them and resolves the active version for a tenant from storage,
//! falling back to defaults when a tenant has never been configured.

pub mod loader;
pub mod validation;

pub use loader::*;
pub use validation::*;
