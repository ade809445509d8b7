//! Invoice header and line models.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{CurrencyCode, DocumentStatus};

/// Invoice header. `(tenant_id, vendor_id, invoice_number)` is unique.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Invoice {
    /// Invoice identifier
    pub id: Uuid,

    /// Owning tenant
    pub tenant_id: Uuid,

    /// Issuing vendor
    pub vendor_id: Uuid,

    /// Vendor's invoice number, unique within (tenant, vendor)
    pub invoice_number: String,

    /// Free-text pointer to a PO number; may be absent or noisy
    pub po_reference: Option<String>,

    /// Document currency
    pub currency: CurrencyCode,

    /// Net amount before tax
    pub subtotal: Decimal,

    /// Tax amount, >= 0
    pub tax_amount: Decimal,

    /// Gross total, >= subtotal
    pub total_amount: Decimal,

    /// Invoice date
    pub invoice_date: NaiveDate,

    /// Payment due date
    pub due_date: Option<NaiveDate>,

    /// Date the invoice was received
    pub received_date: Option<NaiveDate>,

    /// Document status
    pub status: DocumentStatus,

    /// Free-text processing stage marker (e.g. "imported")
    pub processing_status: Option<String>,

    /// OCR extraction confidence, in [0, 1] when OCR was used
    pub ocr_confidence: Option<Decimal>,

    /// Free-form extracted field data
    pub extracted_data: Option<serde_json::Value>,

    /// Raw OCR text, if any
    pub raw_text: Option<String>,

    /// Stored file name
    pub file_name: String,

    /// Storage path of the source file
    pub file_path: String,

    /// Content hash of the source file
    pub file_hash: String,

    /// Source file size in bytes, > 0
    pub file_size: u64,

    /// MIME type of the source file
    pub mime_type: String,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,

    /// Last update timestamp
    pub updated_at: DateTime<Utc>,

    /// Actor that created the record
    pub created_by: Option<Uuid>,

    /// Actor that last updated the record
    pub updated_by: Option<Uuid>,
}

impl Invoice {
    /// Create a new pending invoice.
    pub fn new(
        tenant_id: Uuid,
        vendor_id: Uuid,
        invoice_number: impl Into<String>,
        total_amount: Decimal,
        invoice_date: NaiveDate,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            tenant_id,
            vendor_id,
            invoice_number: invoice_number.into(),
            po_reference: None,
            currency: CurrencyCode::USD,
            subtotal: total_amount,
            tax_amount: Decimal::ZERO,
            total_amount,
            invoice_date,
            due_date: None,
            received_date: None,
            status: DocumentStatus::Pending,
            processing_status: None,
            ocr_confidence: None,
            extracted_data: None,
            raw_text: None,
            file_name: String::new(),
            file_path: String::new(),
            file_hash: String::new(),
            file_size: 1,
            mime_type: "application/octet-stream".to_string(),
            created_at: now,
            updated_at: now,
            created_by: None,
            updated_by: None,
        }
    }

    /// Set the PO reference.
    pub fn with_po_reference(mut self, po_reference: impl Into<String>) -> Self {
        self.po_reference = Some(po_reference.into());
        self
    }

    /// Set subtotal and tax; total stays as constructed.
    pub fn with_amounts(mut self, subtotal: Decimal, tax_amount: Decimal) -> Self {
        self.subtotal = subtotal;
        self.tax_amount = tax_amount;
        self
    }

    /// Set the document currency.
    pub fn with_currency(mut self, currency: CurrencyCode) -> Self {
        self.currency = currency;
        self
    }

    /// Set the payment due date.
    pub fn with_due_date(mut self, due_date: NaiveDate) -> Self {
        self.due_date = Some(due_date);
        self
    }

    /// Set source file bookkeeping fields.
    pub fn with_source_file(
        mut self,
        file_name: impl Into<String>,
        file_path: impl Into<String>,
        file_hash: impl Into<String>,
        file_size: u64,
        mime_type: impl Into<String>,
    ) -> Self {
        self.file_name = file_name.into();
        self.file_path = file_path.into();
        self.file_hash = file_hash.into();
        self.file_size = file_size;
        self.mime_type = mime_type.into();
        self
    }

    /// Set the creating actor.
    pub fn with_created_by(mut self, user_id: Uuid) -> Self {
        self.created_by = Some(user_id);
        self
    }
}

/// Invoice line. `(invoice_id, line_number)` is unique.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvoiceLine {
    /// Line identifier
    pub id: Uuid,

    /// Owning tenant
    pub tenant_id: Uuid,

    /// Parent invoice
    pub invoice_id: Uuid,

    /// Line number, unique within the invoice
    pub line_number: u16,

    /// Item/material code
    pub item_code: Option<String>,

    /// Line description
    pub description: String,

    /// Billed quantity, > 0
    pub quantity: Decimal,

    /// Unit price, >= 0
    pub unit_price: Decimal,

    /// Extended line total, >= 0
    pub line_total: Decimal,
}

impl InvoiceLine {
    /// Create a new invoice line; line total is derived from quantity and price.
    pub fn new(
        tenant_id: Uuid,
        invoice_id: Uuid,
        line_number: u16,
        description: impl Into<String>,
        quantity: Decimal,
        unit_price: Decimal,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            tenant_id,
            invoice_id,
            line_number,
            item_code: None,
            description: description.into(),
            quantity,
            unit_price,
            line_total: (quantity * unit_price).round_dp(2),
        }
    }

    /// Set the item code.
    pub fn with_item_code(mut self, item_code: impl Into<String>) -> Self {
        self.item_code = Some(item_code.into());
        self
    }
}
