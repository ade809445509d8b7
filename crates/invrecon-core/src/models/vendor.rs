//! Vendor master data and learned name aliases.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::CurrencyCode;

/// A supplier. `(tenant_id, vendor_code)` is unique.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Vendor {
    /// Vendor identifier
    pub id: Uuid,

    /// Owning tenant
    pub tenant_id: Uuid,

    /// Vendor code, unique within the tenant
    pub vendor_code: String,

    /// Vendor name as used on documents
    pub name: String,

    /// Registered legal name
    pub legal_name: String,

    /// Tax identification number
    pub tax_id: Option<String>,

    /// Default currency for this vendor's documents
    pub default_currency: CurrencyCode,

    /// Payment terms in days
    pub payment_terms_days: u16,

    /// Is this vendor active
    pub is_active: bool,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,

    /// Last update timestamp
    pub updated_at: DateTime<Utc>,

    /// Actor that created the record
    pub created_by: Option<Uuid>,

    /// Actor that last updated the record
    pub updated_by: Option<Uuid>,
}

impl Vendor {
    /// Create a new active vendor.
    pub fn new(
        tenant_id: Uuid,
        vendor_code: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        let name = name.into();
        Self {
            id: Uuid::new_v4(),
            tenant_id,
            vendor_code: vendor_code.into(),
            legal_name: name.clone(),
            name,
            tax_id: None,
            default_currency: CurrencyCode::USD,
            payment_terms_days: 30,
            is_active: true,
            created_at: now,
            updated_at: now,
            created_by: None,
            updated_by: None,
        }
    }

    /// Set the legal name.
    pub fn with_legal_name(mut self, legal_name: impl Into<String>) -> Self {
        self.legal_name = legal_name.into();
        self
    }

    /// Set the creating actor.
    pub fn with_created_by(mut self, user_id: Uuid) -> Self {
        self.created_by = Some(user_id);
        self
    }

    /// Set the default currency.
    pub fn with_currency(mut self, currency: CurrencyCode) -> Self {
        self.default_currency = currency;
        self
    }
}

/// Origin of a vendor name alias.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AliasSource {
    /// Entered by a user
    Manual,
    /// Extracted from a scanned document
    Ocr,
    /// Learned from approved match feedback
    Learning,
}

/// An approved or learned name variation used by fuzzy matching.
///
/// `(tenant_id, vendor_id, alias)` is unique.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VendorAlias {
    /// Alias identifier
    pub id: Uuid,

    /// Owning tenant
    pub tenant_id: Uuid,

    /// Vendor this alias belongs to
    pub vendor_id: Uuid,

    /// The alias text
    pub alias: String,

    /// Similarity to the canonical name, in [0, 1]
    pub similarity_score: Decimal,

    /// Has a user approved this alias
    pub is_approved: bool,

    /// Where the alias came from
    pub source: AliasSource,

    /// Confidence of the source, in [0, 1]
    pub confidence: Decimal,
}

impl VendorAlias {
    /// Create a new unapproved alias.
    pub fn new(
        tenant_id: Uuid,
        vendor_id: Uuid,
        alias: impl Into<String>,
        source: AliasSource,
        similarity_score: Decimal,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            tenant_id,
            vendor_id,
            alias: alias.into(),
            similarity_score,
            is_approved: false,
            source,
            confidence: similarity_score,
        }
    }
}
