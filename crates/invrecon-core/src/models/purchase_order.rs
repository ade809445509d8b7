//! Purchase Order header and line models.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{CurrencyCode, DocumentStatus};

/// Purchase order header. `(tenant_id, po_number)` is unique.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PurchaseOrder {
    /// Purchase order identifier
    pub id: Uuid,

    /// Owning tenant
    pub tenant_id: Uuid,

    /// Vendor the order was placed with
    pub vendor_id: Uuid,

    /// PO number, unique within the tenant
    pub po_number: String,

    /// PO number in the vendor's system, if known
    pub external_po_number: Option<String>,

    /// Document currency
    pub currency: CurrencyCode,

    /// Net amount before tax, >= 0
    pub subtotal: Decimal,

    /// Tax amount, >= 0
    pub tax_amount: Decimal,

    /// Gross total, >= subtotal
    pub total_amount: Decimal,

    /// Order date
    pub po_date: NaiveDate,

    /// Expected delivery date
    pub expected_delivery_date: Option<NaiveDate>,

    /// Processing status
    pub status: DocumentStatus,

    /// Approval workflow state
    pub approval_status: Option<String>,

    /// Free-text description
    pub description: Option<String>,

    /// Delivery address
    pub delivery_address: Option<String>,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,

    /// Last update timestamp
    pub updated_at: DateTime<Utc>,

    /// Actor that created the record
    pub created_by: Option<Uuid>,

    /// Actor that last updated the record
    pub updated_by: Option<Uuid>,
}

impl PurchaseOrder {
    /// Create a new pending purchase order.
    pub fn new(
        tenant_id: Uuid,
        vendor_id: Uuid,
        po_number: impl Into<String>,
        total_amount: Decimal,
        po_date: NaiveDate,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            tenant_id,
            vendor_id,
            po_number: po_number.into(),
            external_po_number: None,
            currency: CurrencyCode::USD,
            subtotal: total_amount,
            tax_amount: Decimal::ZERO,
            total_amount,
            po_date,
            expected_delivery_date: None,
            status: DocumentStatus::Pending,
            approval_status: None,
            description: None,
            delivery_address: None,
            created_at: now,
            updated_at: now,
            created_by: None,
            updated_by: None,
        }
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

    /// Set the expected delivery date.
    pub fn with_expected_delivery(mut self, date: NaiveDate) -> Self {
        self.expected_delivery_date = Some(date);
        self
    }
}

/// Purchase order line. `(purchase_order_id, line_number)` is unique.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PurchaseOrderLine {
    /// Line identifier
    pub id: Uuid,

    /// Owning tenant
    pub tenant_id: Uuid,

    /// Parent purchase order
    pub purchase_order_id: Uuid,

    /// Line number, unique within the PO
    pub line_number: u16,

    /// Item/material code
    pub item_code: Option<String>,

    /// Line description
    pub description: String,

    /// Ordered quantity, > 0
    pub quantity: Decimal,

    /// Unit price, >= 0
    pub unit_price: Decimal,

    /// Extended line total, >= 0
    pub line_total: Decimal,

    /// Unit of measure
    pub unit_of_measure: Option<String>,

    /// Quantity received so far, in [0, quantity]
    pub quantity_received: Decimal,

    /// Quantity invoiced so far, in [0, quantity]
    pub quantity_invoiced: Decimal,
}

impl PurchaseOrderLine {
    /// Create a new PO line; line total is derived from quantity and price.
    pub fn new(
        tenant_id: Uuid,
        purchase_order_id: Uuid,
        line_number: u16,
        description: impl Into<String>,
        quantity: Decimal,
        unit_price: Decimal,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            tenant_id,
            purchase_order_id,
            line_number,
            item_code: None,
            description: description.into(),
            quantity,
            unit_price,
            line_total: (quantity * unit_price).round_dp(2),
            unit_of_measure: None,
            quantity_received: Decimal::ZERO,
            quantity_invoiced: Decimal::ZERO,
        }
    }

    /// Set the item code.
    pub fn with_item_code(mut self, item_code: impl Into<String>) -> Self {
        self.item_code = Some(item_code.into());
        self
    }

    /// Set the unit of measure.
    pub fn with_unit_of_measure(mut self, uom: impl Into<String>) -> Self {
        self.unit_of_measure = Some(uom.into());
        self
    }
}
