//! Goods receipt header and line models.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::DocumentStatus;

/// Condition of received goods on a receipt line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum LineCondition {
    /// Received in good order
    #[default]
    Good,
    /// Received damaged
    Damaged,
    /// Rejected at the dock
    Rejected,
}

/// Goods receipt header. `(tenant_id, receipt_number)` is unique.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Receipt {
    /// Receipt identifier
    pub id: Uuid,

    /// Owning tenant
    pub tenant_id: Uuid,

    /// Purchase order the goods were received against
    pub purchase_order_id: Uuid,

    /// Receipt number, unique within the tenant
    pub receipt_number: String,

    /// Vendor delivery note reference
    pub delivery_note: Option<String>,

    /// Date the goods were received
    pub receipt_date: NaiveDate,

    /// Person that booked the receipt
    pub received_by: Option<String>,

    /// Total quantity received, >= 0
    pub total_quantity: Decimal,

    /// Total value received, >= 0
    pub total_value: Decimal,

    /// Document status
    pub status: DocumentStatus,

    /// Free-text notes
    pub notes: Option<String>,

    /// Delivery condition remarks
    pub delivery_conditions: Option<String>,
}

impl Receipt {
    /// Create a new pending receipt.
    pub fn new(
        tenant_id: Uuid,
        purchase_order_id: Uuid,
        receipt_number: impl Into<String>,
        receipt_date: NaiveDate,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            tenant_id,
            purchase_order_id,
            receipt_number: receipt_number.into(),
            delivery_note: None,
            receipt_date,
            received_by: None,
            total_quantity: Decimal::ZERO,
            total_value: Decimal::ZERO,
            status: DocumentStatus::Pending,
            notes: None,
            delivery_conditions: None,
        }
    }

    /// Set header totals.
    pub fn with_totals(mut self, total_quantity: Decimal, total_value: Decimal) -> Self {
        self.total_quantity = total_quantity;
        self.total_value = total_value;
        self
    }

    /// Set the receiving actor.
    pub fn with_received_by(mut self, received_by: impl Into<String>) -> Self {
        self.received_by = Some(received_by.into());
        self
    }
}

/// Goods receipt line. `(receipt_id, line_number)` is unique.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReceiptLine {
    /// Line identifier
    pub id: Uuid,

    /// Owning tenant
    pub tenant_id: Uuid,

    /// Parent receipt
    pub receipt_id: Uuid,

    /// Purchase order line the goods were received against
    pub po_line_id: Uuid,

    /// Line number, unique within the receipt
    pub line_number: u16,

    /// Quantity received, > 0
    pub quantity_received: Decimal,

    /// Unit cost, >= 0
    pub unit_cost: Decimal,

    /// Extended line value, >= 0
    pub line_value: Decimal,

    /// Condition of the goods
    pub condition: LineCondition,
}

impl ReceiptLine {
    /// Create a new receipt line; line value is derived from quantity and cost.
    pub fn new(
        tenant_id: Uuid,
        receipt_id: Uuid,
        po_line_id: Uuid,
        line_number: u16,
        quantity_received: Decimal,
        unit_cost: Decimal,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            tenant_id,
            receipt_id,
            po_line_id,
            line_number,
            quantity_received,
            unit_cost,
            line_value: (quantity_received * unit_cost).round_dp(2),
            condition: LineCondition::Good,
        }
    }

    /// Set the goods condition.
    pub fn with_condition(mut self, condition: LineCondition) -> Self {
        self.condition = condition;
        self
    }
}
