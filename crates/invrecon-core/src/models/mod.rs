//! Domain models for the reconciliation platform.
//!
//! Every entity is tenant-scoped: each row carries a `tenant_id` and every
//! storage query filters on it. Monetary totals are fixed-point decimals with
//! 2 fractional digits; unit prices and quantities carry 4.

mod audit;
mod configuration;
mod import;
mod invoice;
mod matching;
mod purchase_order;
mod receipt;
mod tenant;
mod tolerance;
mod vendor;

pub use audit::*;
pub use configuration::*;
pub use import::*;
pub use invoice::*;
pub use matching::*;
pub use purchase_order::*;
pub use receipt::*;
pub use tenant::*;
pub use tolerance::*;
pub use vendor::*;

use serde::{Deserialize, Serialize};

/// Document processing status shared by invoices, purchase orders, and receipts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum DocumentStatus {
    /// Awaiting processing
    #[default]
    Pending,
    /// Currently being processed
    Processing,
    /// Matched to counterpart documents
    Matched,
    /// No match found
    Unmatched,
    /// Flagged for exception handling
    Exception,
    /// Soft-deleted
    Archived,
}

impl DocumentStatus {
    /// Archived documents are excluded from matching candidate sets.
    pub fn is_archived(&self) -> bool {
        matches!(self, Self::Archived)
    }
}

/// Supported currency codes.
///
/// Currency is treated as an opaque code; all documents in one matching
/// comparison must share it. There is no conversion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum CurrencyCode {
    #[default]
    USD,
    EUR,
    GBP,
    CAD,
    AUD,
}

impl std::fmt::Display for CurrencyCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let code = match self {
            Self::USD => "USD",
            Self::EUR => "EUR",
            Self::GBP => "GBP",
            Self::CAD => "CAD",
            Self::AUD => "AUD",
        };
        write!(f, "{}", code)
    }
}
