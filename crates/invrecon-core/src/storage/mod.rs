//! Storage interface.
//!
//! The relational store is the core's only hard dependency. The `Storage`
//! trait exposes tenant-scoped reads plus a transaction entry point; every
//! write happens inside a transaction closure against a [`StorageTxn`], which
//! supports savepoints so a single row's work can be rolled back without
//! abandoning the batch. Uniqueness constraints are the arbitration
//! mechanism for concurrent writers: colliding inserts fail with
//! `ReconError::Duplicate`.
//!
//! Audit events are append-only by construction - the interface has no
//! update or delete for them, and each append chains the event hash off the
//! previous event for the same match result.

mod memory;

pub use memory::MemoryStorage;

use chrono::NaiveDate;
use uuid::Uuid;

use crate::error::ReconResult;
use crate::models::{
    AuditEvent, ImportBatch, ImportError, Invoice, InvoiceLine, MatchResult,
    MatchingConfiguration, MatchingTolerance, NewAuditEvent, PurchaseOrder, PurchaseOrderLine,
    Receipt, ReceiptLine, Tenant, Vendor, VendorAlias,
};

/// Savepoint token within a transaction, issued by [`StorageTxn::savepoint`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Savepoint(pub usize);

/// Write surface of an open transaction, scoped to one tenant.
///
/// Reads offered here observe staged-but-uncommitted writes, which the
/// duplicate checks during ingestion rely on.
pub trait StorageTxn {
    /// Mark a savepoint; a later [`StorageTxn::rollback_to`] undoes
    /// everything staged since.
    fn savepoint(&mut self) -> Savepoint;

    /// Roll back to a savepoint taken earlier in this transaction.
    fn rollback_to(&mut self, savepoint: Savepoint);

    fn insert_tenant(&mut self, tenant: Tenant) -> ReconResult<()>;
    fn insert_vendor(&mut self, vendor: Vendor) -> ReconResult<()>;
    fn insert_vendor_alias(&mut self, alias: VendorAlias) -> ReconResult<()>;
    fn insert_invoice(&mut self, invoice: Invoice) -> ReconResult<()>;
    fn insert_invoice_line(&mut self, line: InvoiceLine) -> ReconResult<()>;
    fn insert_purchase_order(&mut self, po: PurchaseOrder) -> ReconResult<()>;
    fn insert_purchase_order_line(&mut self, line: PurchaseOrderLine) -> ReconResult<()>;
    fn insert_receipt(&mut self, receipt: Receipt) -> ReconResult<()>;
    fn insert_receipt_line(&mut self, line: ReceiptLine) -> ReconResult<()>;
    fn insert_tolerance(&mut self, tolerance: MatchingTolerance) -> ReconResult<()>;
    fn insert_configuration(&mut self, config: MatchingConfiguration) -> ReconResult<()>;
    fn insert_match_result(&mut self, result: MatchResult) -> ReconResult<()>;

    /// Replace a match result row (user feedback path).
    fn update_match_result(&mut self, result: MatchResult) -> ReconResult<()>;

    /// Append an audit event, computing its chain hash from the latest event
    /// for the same match result. Returns the stored event.
    fn append_audit_event(&mut self, event: NewAuditEvent) -> ReconResult<AuditEvent>;

    /// Vendor lookup by case-insensitive name, observing staged writes.
    fn vendor_by_name_ci(&self, name: &str) -> Option<Vendor>;

    /// Whether a vendor code is taken, observing staged writes.
    fn vendor_code_exists(&self, code: &str) -> bool;

    /// Whether an invoice number exists for a vendor, observing staged writes.
    fn invoice_exists(&self, vendor_id: Uuid, invoice_number: &str) -> bool;
}

/// Transaction body. Returning `Err` rolls back everything staged.
pub type TxnBody<'a> = &'a mut dyn FnMut(&mut dyn StorageTxn) -> ReconResult<()>;

/// Tenant-scoped storage contract.
///
/// Every read takes the tenant id explicitly; implementations must never
/// return rows owned by another tenant.
pub trait Storage: Send + Sync {
    /// Run a transaction for one tenant. Commits on `Ok`, rolls back on `Err`.
    fn transaction(&self, tenant_id: Uuid, body: TxnBody<'_>) -> ReconResult<()>;

    // -- tenants ----------------------------------------------------------

    fn tenant(&self, tenant_id: Uuid) -> ReconResult<Option<Tenant>>;

    // -- vendors ----------------------------------------------------------

    fn vendor(&self, tenant_id: Uuid, vendor_id: Uuid) -> ReconResult<Option<Vendor>>;

    fn vendor_by_name_ci(&self, tenant_id: Uuid, name: &str) -> ReconResult<Option<Vendor>>;

    fn vendor_code_exists(&self, tenant_id: Uuid, code: &str) -> ReconResult<bool>;

    /// Names of active vendors; the fuzzy matcher's corpus.
    fn active_vendor_names(&self, tenant_id: Uuid) -> ReconResult<Vec<String>>;

    fn vendor_aliases(&self, tenant_id: Uuid, vendor_id: Uuid) -> ReconResult<Vec<VendorAlias>>;

    // -- invoices ---------------------------------------------------------

    fn invoice(&self, tenant_id: Uuid, invoice_id: Uuid) -> ReconResult<Option<Invoice>>;

    /// Lines ordered by line number.
    fn invoice_lines(&self, tenant_id: Uuid, invoice_id: Uuid) -> ReconResult<Vec<InvoiceLine>>;

    fn invoice_exists(
        &self,
        tenant_id: Uuid,
        vendor_id: Uuid,
        invoice_number: &str,
    ) -> ReconResult<bool>;

    // -- purchase orders --------------------------------------------------

    fn purchase_order(&self, tenant_id: Uuid, po_id: Uuid) -> ReconResult<Option<PurchaseOrder>>;

    /// Non-archived POs with the exact number for a vendor.
    fn purchase_orders_by_number(
        &self,
        tenant_id: Uuid,
        vendor_id: Uuid,
        po_number: &str,
    ) -> ReconResult<Vec<PurchaseOrder>>;

    /// Non-archived POs dated within `[from, to]`, optionally restricted to a
    /// vendor.
    fn purchase_orders_in_window(
        &self,
        tenant_id: Uuid,
        vendor_id: Option<Uuid>,
        from: NaiveDate,
        to: NaiveDate,
    ) -> ReconResult<Vec<PurchaseOrder>>;

    /// Lines ordered by line number.
    fn purchase_order_lines(
        &self,
        tenant_id: Uuid,
        po_id: Uuid,
    ) -> ReconResult<Vec<PurchaseOrderLine>>;

    // -- receipts ---------------------------------------------------------

    /// Non-archived receipts for a PO dated within `[from, to]`, ordered by
    /// receipt date.
    fn receipts_for_po(
        &self,
        tenant_id: Uuid,
        po_id: Uuid,
        from: NaiveDate,
        to: NaiveDate,
    ) -> ReconResult<Vec<Receipt>>;

    /// Lines ordered by line number.
    fn receipt_lines(&self, tenant_id: Uuid, receipt_id: Uuid) -> ReconResult<Vec<ReceiptLine>>;

    // -- matching configuration -------------------------------------------

    /// Active tolerance rules for a tenant.
    fn active_tolerances(&self, tenant_id: Uuid) -> ReconResult<Vec<MatchingTolerance>>;

    /// The single active configuration version, if one exists.
    fn active_configuration(&self, tenant_id: Uuid)
        -> ReconResult<Option<MatchingConfiguration>>;

    // -- match results & audit --------------------------------------------

    fn match_result(
        &self,
        tenant_id: Uuid,
        match_result_id: Uuid,
    ) -> ReconResult<Option<MatchResult>>;

    /// Match results for an invoice, most recent first.
    fn match_results_for_invoice(
        &self,
        tenant_id: Uuid,
        invoice_id: Uuid,
    ) -> ReconResult<Vec<MatchResult>>;

    /// Audit events for a match result in append order.
    fn audit_events(
        &self,
        tenant_id: Uuid,
        match_result_id: Uuid,
    ) -> ReconResult<Vec<AuditEvent>>;

    // -- import bookkeeping -----------------------------------------------
    //
    // Batch rows and per-row errors are updated live so progress stays
    // observable while the batch's document writes are still staged.

    fn insert_import_batch(&self, batch: ImportBatch) -> ReconResult<()>;

    fn import_batch(&self, tenant_id: Uuid, batch_id: Uuid) -> ReconResult<Option<ImportBatch>>;

    fn update_import_batch(&self, batch: &ImportBatch) -> ReconResult<()>;

    fn append_import_errors(&self, errors: Vec<ImportError>) -> ReconResult<()>;

    /// Errors for a batch ordered by row number.
    fn import_errors(&self, tenant_id: Uuid, batch_id: Uuid) -> ReconResult<Vec<ImportError>>;
}
