//! In-memory reference storage.
//!
//! Backs the engines and the test suites with the same contract a relational
//! store provides: tenant scoping on every read, `UNIQUE(tenant_id, ...)`
//! enforcement on every write, and transactions with savepoints implemented
//! as an undo journal. A transaction holds the document-store lock for its
//! duration, which serializes writers the way row locks would; audit appends
//! are therefore chained without races.

use std::collections::HashMap;
use std::sync::Mutex;

use chrono::{NaiveDate, Utc};
use uuid::Uuid;

use crate::audit_chain::compute_event_hash;
use crate::error::{ReconError, ReconResult};
use crate::models::{
    AuditEvent, ImportBatch, ImportError, Invoice, InvoiceLine, MatchResult,
    MatchingConfiguration, MatchingTolerance, NewAuditEvent, PurchaseOrder, PurchaseOrderLine,
    Receipt, ReceiptLine, Tenant, Vendor, VendorAlias,
};

use super::{Savepoint, Storage, StorageTxn, TxnBody};

#[derive(Default)]
struct DocStore {
    tenants: HashMap<Uuid, Tenant>,
    vendors: HashMap<Uuid, Vendor>,
    vendor_aliases: HashMap<Uuid, VendorAlias>,
    invoices: HashMap<Uuid, Invoice>,
    invoice_lines: HashMap<Uuid, InvoiceLine>,
    purchase_orders: HashMap<Uuid, PurchaseOrder>,
    purchase_order_lines: HashMap<Uuid, PurchaseOrderLine>,
    receipts: HashMap<Uuid, Receipt>,
    receipt_lines: HashMap<Uuid, ReceiptLine>,
    tolerances: HashMap<Uuid, MatchingTolerance>,
    configurations: HashMap<Uuid, MatchingConfiguration>,
    match_results: HashMap<Uuid, MatchResult>,
    audit_events: Vec<AuditEvent>,
}

#[derive(Default)]
struct ImportStore {
    batches: HashMap<Uuid, ImportBatch>,
    errors: Vec<ImportError>,
}

/// Undo entries reverting one staged write each.
enum Undo {
    RemoveTenant(Uuid),
    RemoveVendor(Uuid),
    RemoveVendorAlias(Uuid),
    RemoveInvoice(Uuid),
    RemoveInvoiceLine(Uuid),
    RemovePurchaseOrder(Uuid),
    RemovePurchaseOrderLine(Uuid),
    RemoveReceipt(Uuid),
    RemoveReceiptLine(Uuid),
    RemoveTolerance(Uuid),
    RemoveConfiguration(Uuid),
    RemoveMatchResult(Uuid),
    RestoreMatchResult(Box<MatchResult>),
    RemoveAuditEvent(Uuid),
}

/// In-memory storage implementing the full [`Storage`] contract.
#[derive(Default)]
pub struct MemoryStorage {
    docs: Mutex<DocStore>,
    imports: Mutex<ImportStore>,
}

impl MemoryStorage {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

struct MemTxn<'a> {
    store: &'a mut DocStore,
    tenant_id: Uuid,
    journal: Vec<Undo>,
}

impl<'a> MemTxn<'a> {
    fn guard_tenant(&self, row_tenant: Uuid) -> ReconResult<()> {
        if row_tenant != self.tenant_id {
            return Err(ReconError::storage(
                "cross-tenant write rejected by row-level policy",
            ));
        }
        Ok(())
    }

    fn undo(store: &mut DocStore, entry: Undo) {
        match entry {
            Undo::RemoveTenant(id) => {
                store.tenants.remove(&id);
            }
            Undo::RemoveVendor(id) => {
                store.vendors.remove(&id);
            }
            Undo::RemoveVendorAlias(id) => {
                store.vendor_aliases.remove(&id);
            }
            Undo::RemoveInvoice(id) => {
                store.invoices.remove(&id);
            }
            Undo::RemoveInvoiceLine(id) => {
                store.invoice_lines.remove(&id);
            }
            Undo::RemovePurchaseOrder(id) => {
                store.purchase_orders.remove(&id);
            }
            Undo::RemovePurchaseOrderLine(id) => {
                store.purchase_order_lines.remove(&id);
            }
            Undo::RemoveReceipt(id) => {
                store.receipts.remove(&id);
            }
            Undo::RemoveReceiptLine(id) => {
                store.receipt_lines.remove(&id);
            }
            Undo::RemoveTolerance(id) => {
                store.tolerances.remove(&id);
            }
            Undo::RemoveConfiguration(id) => {
                store.configurations.remove(&id);
            }
            Undo::RemoveMatchResult(id) => {
                store.match_results.remove(&id);
            }
            Undo::RestoreMatchResult(result) => {
                store.match_results.insert(result.id, *result);
            }
            Undo::RemoveAuditEvent(id) => {
                store.audit_events.retain(|e| e.id != id);
            }
        }
    }

    fn rollback_all(&mut self) {
        while let Some(entry) = self.journal.pop() {
            Self::undo(self.store, entry);
        }
    }
}

impl<'a> StorageTxn for MemTxn<'a> {
    fn savepoint(&mut self) -> Savepoint {
        Savepoint(self.journal.len())
    }

    fn rollback_to(&mut self, savepoint: Savepoint) {
        while self.journal.len() > savepoint.0 {
            if let Some(entry) = self.journal.pop() {
                Self::undo(self.store, entry);
            }
        }
    }

    fn insert_tenant(&mut self, tenant: Tenant) -> ReconResult<()> {
        if self.store.tenants.values().any(|t| t.name == tenant.name) {
            return Err(ReconError::duplicate(format!(
                "tenant name '{}' already exists",
                tenant.name
            )));
        }
        let id = tenant.id;
        self.store.tenants.insert(id, tenant);
        self.journal.push(Undo::RemoveTenant(id));
        Ok(())
    }

    fn insert_vendor(&mut self, vendor: Vendor) -> ReconResult<()> {
        self.guard_tenant(vendor.tenant_id)?;
        if self.vendor_code_exists(&vendor.vendor_code) {
            return Err(ReconError::duplicate(format!(
                "vendor code '{}' already exists",
                vendor.vendor_code
            )));
        }
        let id = vendor.id;
        self.store.vendors.insert(id, vendor);
        self.journal.push(Undo::RemoveVendor(id));
        Ok(())
    }

    fn insert_vendor_alias(&mut self, alias: VendorAlias) -> ReconResult<()> {
        self.guard_tenant(alias.tenant_id)?;
        let collision = self.store.vendor_aliases.values().any(|a| {
            a.tenant_id == alias.tenant_id
                && a.vendor_id == alias.vendor_id
                && a.alias == alias.alias
        });
        if collision {
            return Err(ReconError::duplicate(format!(
                "alias '{}' already exists for vendor",
                alias.alias
            )));
        }
        let id = alias.id;
        self.store.vendor_aliases.insert(id, alias);
        self.journal.push(Undo::RemoveVendorAlias(id));
        Ok(())
    }

    fn insert_invoice(&mut self, invoice: Invoice) -> ReconResult<()> {
        self.guard_tenant(invoice.tenant_id)?;
        if self.invoice_exists(invoice.vendor_id, &invoice.invoice_number) {
            return Err(ReconError::duplicate(format!(
                "invoice '{}' already exists for vendor",
                invoice.invoice_number
            )));
        }
        let id = invoice.id;
        self.store.invoices.insert(id, invoice);
        self.journal.push(Undo::RemoveInvoice(id));
        Ok(())
    }

    fn insert_invoice_line(&mut self, line: InvoiceLine) -> ReconResult<()> {
        self.guard_tenant(line.tenant_id)?;
        let collision = self.store.invoice_lines.values().any(|l| {
            l.invoice_id == line.invoice_id && l.line_number == line.line_number
        });
        if collision {
            return Err(ReconError::duplicate(format!(
                "invoice line {} already exists",
                line.line_number
            )));
        }
        let id = line.id;
        self.store.invoice_lines.insert(id, line);
        self.journal.push(Undo::RemoveInvoiceLine(id));
        Ok(())
    }

    fn insert_purchase_order(&mut self, po: PurchaseOrder) -> ReconResult<()> {
        self.guard_tenant(po.tenant_id)?;
        let collision = self
            .store
            .purchase_orders
            .values()
            .any(|p| p.tenant_id == po.tenant_id && p.po_number == po.po_number);
        if collision {
            return Err(ReconError::duplicate(format!(
                "PO number '{}' already exists",
                po.po_number
            )));
        }
        let id = po.id;
        self.store.purchase_orders.insert(id, po);
        self.journal.push(Undo::RemovePurchaseOrder(id));
        Ok(())
    }

    fn insert_purchase_order_line(&mut self, line: PurchaseOrderLine) -> ReconResult<()> {
        self.guard_tenant(line.tenant_id)?;
        let collision = self.store.purchase_order_lines.values().any(|l| {
            l.purchase_order_id == line.purchase_order_id && l.line_number == line.line_number
        });
        if collision {
            return Err(ReconError::duplicate(format!(
                "PO line {} already exists",
                line.line_number
            )));
        }
        let id = line.id;
        self.store.purchase_order_lines.insert(id, line);
        self.journal.push(Undo::RemovePurchaseOrderLine(id));
        Ok(())
    }

    fn insert_receipt(&mut self, receipt: Receipt) -> ReconResult<()> {
        self.guard_tenant(receipt.tenant_id)?;
        let collision = self
            .store
            .receipts
            .values()
            .any(|r| r.tenant_id == receipt.tenant_id && r.receipt_number == receipt.receipt_number);
        if collision {
            return Err(ReconError::duplicate(format!(
                "receipt number '{}' already exists",
                receipt.receipt_number
            )));
        }
        let id = receipt.id;
        self.store.receipts.insert(id, receipt);
        self.journal.push(Undo::RemoveReceipt(id));
        Ok(())
    }

    fn insert_receipt_line(&mut self, line: ReceiptLine) -> ReconResult<()> {
        self.guard_tenant(line.tenant_id)?;
        let collision = self
            .store
            .receipt_lines
            .values()
            .any(|l| l.receipt_id == line.receipt_id && l.line_number == line.line_number);
        if collision {
            return Err(ReconError::duplicate(format!(
                "receipt line {} already exists",
                line.line_number
            )));
        }
        let id = line.id;
        self.store.receipt_lines.insert(id, line);
        self.journal.push(Undo::RemoveReceiptLine(id));
        Ok(())
    }

    fn insert_tolerance(&mut self, tolerance: MatchingTolerance) -> ReconResult<()> {
        self.guard_tenant(tolerance.tenant_id)?;
        if tolerance.percentage_tolerance.is_none() && tolerance.absolute_tolerance.is_none() {
            return Err(ReconError::config(
                "tolerance rule needs a percentage or an absolute bound",
            ));
        }
        let id = tolerance.id;
        self.store.tolerances.insert(id, tolerance);
        self.journal.push(Undo::RemoveTolerance(id));
        Ok(())
    }

    fn insert_configuration(&mut self, config: MatchingConfiguration) -> ReconResult<()> {
        self.guard_tenant(config.tenant_id)?;
        let version_taken = self.store.configurations.values().any(|c| {
            c.tenant_id == config.tenant_id && c.config_version == config.config_version
        });
        if version_taken {
            return Err(ReconError::duplicate(format!(
                "configuration version '{}' already exists",
                config.config_version
            )));
        }
        let active_clash = config.is_active
            && self
                .store
                .configurations
                .values()
                .any(|c| c.tenant_id == config.tenant_id && c.is_active);
        if active_clash {
            return Err(ReconError::duplicate(
                "tenant already has an active configuration version",
            ));
        }
        let id = config.id;
        self.store.configurations.insert(id, config);
        self.journal.push(Undo::RemoveConfiguration(id));
        Ok(())
    }

    fn insert_match_result(&mut self, result: MatchResult) -> ReconResult<()> {
        self.guard_tenant(result.tenant_id)?;
        let id = result.id;
        self.store.match_results.insert(id, result);
        self.journal.push(Undo::RemoveMatchResult(id));
        Ok(())
    }

    fn update_match_result(&mut self, result: MatchResult) -> ReconResult<()> {
        self.guard_tenant(result.tenant_id)?;
        let existing = self
            .store
            .match_results
            .get(&result.id)
            .cloned()
            .ok_or_else(|| ReconError::not_found("match result to update"))?;
        self.store.match_results.insert(result.id, result);
        self.journal.push(Undo::RestoreMatchResult(Box::new(existing)));
        Ok(())
    }

    fn append_audit_event(&mut self, event: NewAuditEvent) -> ReconResult<AuditEvent> {
        self.guard_tenant(event.tenant_id)?;
        let prior_hash = self
            .store
            .audit_events
            .iter()
            .rev()
            .find(|e| e.match_result_id == event.match_result_id)
            .map(|e| e.event_hash.clone())
            .unwrap_or_default();

        let occurred_at = Utc::now();
        let hash = compute_event_hash(
            event.event_type,
            &event.decision_factors,
            occurred_at,
            &prior_hash,
        );
        let stored = event.into_event(occurred_at, hash);
        let id = stored.id;
        self.store.audit_events.push(stored.clone());
        self.journal.push(Undo::RemoveAuditEvent(id));
        Ok(stored)
    }

    fn vendor_by_name_ci(&self, name: &str) -> Option<Vendor> {
        let needle = name.trim().to_uppercase();
        self.store
            .vendors
            .values()
            .find(|v| v.tenant_id == self.tenant_id && v.name.to_uppercase() == needle)
            .cloned()
    }

    fn vendor_code_exists(&self, code: &str) -> bool {
        self.store
            .vendors
            .values()
            .any(|v| v.tenant_id == self.tenant_id && v.vendor_code == code)
    }

    fn invoice_exists(&self, vendor_id: Uuid, invoice_number: &str) -> bool {
        self.store.invoices.values().any(|i| {
            i.tenant_id == self.tenant_id
                && i.vendor_id == vendor_id
                && i.invoice_number == invoice_number
        })
    }
}

impl Storage for MemoryStorage {
    fn transaction(&self, tenant_id: Uuid, body: TxnBody<'_>) -> ReconResult<()> {
        let mut docs = self.docs.lock().unwrap();
        let mut txn = MemTxn {
            store: &mut docs,
            tenant_id,
            journal: Vec::new(),
        };
        match body(&mut txn) {
            Ok(()) => Ok(()),
            Err(err) => {
                txn.rollback_all();
                Err(err)
            }
        }
    }

    fn tenant(&self, tenant_id: Uuid) -> ReconResult<Option<Tenant>> {
        Ok(self.docs.lock().unwrap().tenants.get(&tenant_id).cloned())
    }

    fn vendor(&self, tenant_id: Uuid, vendor_id: Uuid) -> ReconResult<Option<Vendor>> {
        Ok(self
            .docs
            .lock()
            .unwrap()
            .vendors
            .get(&vendor_id)
            .filter(|v| v.tenant_id == tenant_id)
            .cloned())
    }

    fn vendor_by_name_ci(&self, tenant_id: Uuid, name: &str) -> ReconResult<Option<Vendor>> {
        let needle = name.trim().to_uppercase();
        Ok(self
            .docs
            .lock()
            .unwrap()
            .vendors
            .values()
            .find(|v| v.tenant_id == tenant_id && v.name.to_uppercase() == needle)
            .cloned())
    }

    fn vendor_code_exists(&self, tenant_id: Uuid, code: &str) -> ReconResult<bool> {
        Ok(self
            .docs
            .lock()
            .unwrap()
            .vendors
            .values()
            .any(|v| v.tenant_id == tenant_id && v.vendor_code == code))
    }

    fn active_vendor_names(&self, tenant_id: Uuid) -> ReconResult<Vec<String>> {
        let mut names: Vec<String> = self
            .docs
            .lock()
            .unwrap()
            .vendors
            .values()
            .filter(|v| v.tenant_id == tenant_id && v.is_active)
            .map(|v| v.name.clone())
            .collect();
        names.sort();
        Ok(names)
    }

    fn vendor_aliases(&self, tenant_id: Uuid, vendor_id: Uuid) -> ReconResult<Vec<VendorAlias>> {
        Ok(self
            .docs
            .lock()
            .unwrap()
            .vendor_aliases
            .values()
            .filter(|a| a.tenant_id == tenant_id && a.vendor_id == vendor_id)
            .cloned()
            .collect())
    }

    fn invoice(&self, tenant_id: Uuid, invoice_id: Uuid) -> ReconResult<Option<Invoice>> {
        Ok(self
            .docs
            .lock()
            .unwrap()
            .invoices
            .get(&invoice_id)
            .filter(|i| i.tenant_id == tenant_id)
            .cloned())
    }

    fn invoice_lines(&self, tenant_id: Uuid, invoice_id: Uuid) -> ReconResult<Vec<InvoiceLine>> {
        let mut lines: Vec<InvoiceLine> = self
            .docs
            .lock()
            .unwrap()
            .invoice_lines
            .values()
            .filter(|l| l.tenant_id == tenant_id && l.invoice_id == invoice_id)
            .cloned()
            .collect();
        lines.sort_by_key(|l| l.line_number);
        Ok(lines)
    }

    fn invoice_exists(
        &self,
        tenant_id: Uuid,
        vendor_id: Uuid,
        invoice_number: &str,
    ) -> ReconResult<bool> {
        Ok(self.docs.lock().unwrap().invoices.values().any(|i| {
            i.tenant_id == tenant_id
                && i.vendor_id == vendor_id
                && i.invoice_number == invoice_number
        }))
    }

    fn purchase_order(&self, tenant_id: Uuid, po_id: Uuid) -> ReconResult<Option<PurchaseOrder>> {
        Ok(self
            .docs
            .lock()
            .unwrap()
            .purchase_orders
            .get(&po_id)
            .filter(|p| p.tenant_id == tenant_id)
            .cloned())
    }

    fn purchase_orders_by_number(
        &self,
        tenant_id: Uuid,
        vendor_id: Uuid,
        po_number: &str,
    ) -> ReconResult<Vec<PurchaseOrder>> {
        Ok(self
            .docs
            .lock()
            .unwrap()
            .purchase_orders
            .values()
            .filter(|p| {
                p.tenant_id == tenant_id
                    && p.vendor_id == vendor_id
                    && p.po_number == po_number
                    && !p.status.is_archived()
            })
            .cloned()
            .collect())
    }

    fn purchase_orders_in_window(
        &self,
        tenant_id: Uuid,
        vendor_id: Option<Uuid>,
        from: NaiveDate,
        to: NaiveDate,
    ) -> ReconResult<Vec<PurchaseOrder>> {
        let mut pos: Vec<PurchaseOrder> = self
            .docs
            .lock()
            .unwrap()
            .purchase_orders
            .values()
            .filter(|p| {
                p.tenant_id == tenant_id
                    && vendor_id.map_or(true, |v| p.vendor_id == v)
                    && p.po_date >= from
                    && p.po_date <= to
                    && !p.status.is_archived()
            })
            .cloned()
            .collect();
        pos.sort_by_key(|p| p.po_date);
        Ok(pos)
    }

    fn purchase_order_lines(
        &self,
        tenant_id: Uuid,
        po_id: Uuid,
    ) -> ReconResult<Vec<PurchaseOrderLine>> {
        let mut lines: Vec<PurchaseOrderLine> = self
            .docs
            .lock()
            .unwrap()
            .purchase_order_lines
            .values()
            .filter(|l| l.tenant_id == tenant_id && l.purchase_order_id == po_id)
            .cloned()
            .collect();
        lines.sort_by_key(|l| l.line_number);
        Ok(lines)
    }

    fn receipts_for_po(
        &self,
        tenant_id: Uuid,
        po_id: Uuid,
        from: NaiveDate,
        to: NaiveDate,
    ) -> ReconResult<Vec<Receipt>> {
        let mut receipts: Vec<Receipt> = self
            .docs
            .lock()
            .unwrap()
            .receipts
            .values()
            .filter(|r| {
                r.tenant_id == tenant_id
                    && r.purchase_order_id == po_id
                    && r.receipt_date >= from
                    && r.receipt_date <= to
                    && !r.status.is_archived()
            })
            .cloned()
            .collect();
        receipts.sort_by_key(|r| r.receipt_date);
        Ok(receipts)
    }

    fn receipt_lines(&self, tenant_id: Uuid, receipt_id: Uuid) -> ReconResult<Vec<ReceiptLine>> {
        let mut lines: Vec<ReceiptLine> = self
            .docs
            .lock()
            .unwrap()
            .receipt_lines
            .values()
            .filter(|l| l.tenant_id == tenant_id && l.receipt_id == receipt_id)
            .cloned()
            .collect();
        lines.sort_by_key(|l| l.line_number);
        Ok(lines)
    }

    fn active_tolerances(&self, tenant_id: Uuid) -> ReconResult<Vec<MatchingTolerance>> {
        Ok(self
            .docs
            .lock()
            .unwrap()
            .tolerances
            .values()
            .filter(|t| t.tenant_id == tenant_id && t.is_active)
            .cloned()
            .collect())
    }

    fn active_configuration(
        &self,
        tenant_id: Uuid,
    ) -> ReconResult<Option<MatchingConfiguration>> {
        Ok(self
            .docs
            .lock()
            .unwrap()
            .configurations
            .values()
            .filter(|c| c.tenant_id == tenant_id && c.is_active)
            .max_by_key(|c| c.created_at)
            .cloned())
    }

    fn match_result(
        &self,
        tenant_id: Uuid,
        match_result_id: Uuid,
    ) -> ReconResult<Option<MatchResult>> {
        Ok(self
            .docs
            .lock()
            .unwrap()
            .match_results
            .get(&match_result_id)
            .filter(|m| m.tenant_id == tenant_id)
            .cloned())
    }

    fn match_results_for_invoice(
        &self,
        tenant_id: Uuid,
        invoice_id: Uuid,
    ) -> ReconResult<Vec<MatchResult>> {
        let mut results: Vec<MatchResult> = self
            .docs
            .lock()
            .unwrap()
            .match_results
            .values()
            .filter(|m| m.tenant_id == tenant_id && m.invoice_id == invoice_id)
            .cloned()
            .collect();
        results.sort_by(|a, b| b.matched_at.cmp(&a.matched_at));
        Ok(results)
    }

    fn audit_events(
        &self,
        tenant_id: Uuid,
        match_result_id: Uuid,
    ) -> ReconResult<Vec<AuditEvent>> {
        Ok(self
            .docs
            .lock()
            .unwrap()
            .audit_events
            .iter()
            .filter(|e| e.tenant_id == tenant_id && e.match_result_id == match_result_id)
            .cloned()
            .collect())
    }

    fn insert_import_batch(&self, batch: ImportBatch) -> ReconResult<()> {
        let mut imports = self.imports.lock().unwrap();
        if imports.batches.contains_key(&batch.id) {
            return Err(ReconError::duplicate("import batch already exists"));
        }
        imports.batches.insert(batch.id, batch);
        Ok(())
    }

    fn import_batch(&self, tenant_id: Uuid, batch_id: Uuid) -> ReconResult<Option<ImportBatch>> {
        Ok(self
            .imports
            .lock()
            .unwrap()
            .batches
            .get(&batch_id)
            .filter(|b| b.tenant_id == tenant_id)
            .cloned())
    }

    fn update_import_batch(&self, batch: &ImportBatch) -> ReconResult<()> {
        let mut imports = self.imports.lock().unwrap();
        if !imports.batches.contains_key(&batch.id) {
            return Err(ReconError::not_found("import batch to update"));
        }
        imports.batches.insert(batch.id, batch.clone());
        Ok(())
    }

    fn append_import_errors(&self, errors: Vec<ImportError>) -> ReconResult<()> {
        self.imports.lock().unwrap().errors.extend(errors);
        Ok(())
    }

    fn import_errors(&self, tenant_id: Uuid, batch_id: Uuid) -> ReconResult<Vec<ImportError>> {
        let mut errors: Vec<ImportError> = self
            .imports
            .lock()
            .unwrap()
            .errors
            .iter()
            .filter(|e| e.tenant_id == tenant_id && e.import_batch_id == batch_id)
            .cloned()
            .collect();
        errors.sort_by_key(|e| e.row_number);
        Ok(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit_chain::verify_chain;
    use crate::models::{AuditEventType, MatchType};
    use rust_decimal_macros::dec;

    fn seeded_vendor(storage: &MemoryStorage, tenant: Uuid) -> Vendor {
        let vendor = Vendor::new(tenant, "ACME01", "Acme Corporation");
        let stored = vendor.clone();
        storage
            .transaction(tenant, &mut |txn| txn.insert_vendor(stored.clone()))
            .unwrap();
        vendor
    }

    #[test]
    fn test_transaction_rolls_back_on_error() {
        let storage = MemoryStorage::new();
        let tenant = Uuid::new_v4();
        let vendor = Vendor::new(tenant, "ACME01", "Acme Corporation");

        let result = storage.transaction(tenant, &mut |txn| {
            txn.insert_vendor(vendor.clone())?;
            Err(ReconError::storage("induced failure"))
        });

        assert!(result.is_err());
        assert!(!storage.vendor_code_exists(tenant, "ACME01").unwrap());
    }

    #[test]
    fn test_savepoint_rolls_back_single_row() {
        let storage = MemoryStorage::new();
        let tenant = Uuid::new_v4();
        let keep = Vendor::new(tenant, "KEEP01", "Keep Industries");
        let drop_v = Vendor::new(tenant, "DROP01", "Drop Industries");

        storage
            .transaction(tenant, &mut |txn| {
                txn.insert_vendor(keep.clone())?;
                let sp = txn.savepoint();
                txn.insert_vendor(drop_v.clone())?;
                txn.rollback_to(sp);
                Ok(())
            })
            .unwrap();

        assert!(storage.vendor_code_exists(tenant, "KEEP01").unwrap());
        assert!(!storage.vendor_code_exists(tenant, "DROP01").unwrap());
    }

    #[test]
    fn test_unique_invoice_number_per_vendor() {
        let storage = MemoryStorage::new();
        let tenant = Uuid::new_v4();
        let vendor = seeded_vendor(&storage, tenant);
        let date = NaiveDate::from_ymd_opt(2025, 1, 6).unwrap();

        let first = Invoice::new(tenant, vendor.id, "INV-1", dec!(100.00), date);
        let second = Invoice::new(tenant, vendor.id, "INV-1", dec!(200.00), date);

        storage
            .transaction(tenant, &mut |txn| txn.insert_invoice(first.clone()))
            .unwrap();
        let err = storage
            .transaction(tenant, &mut |txn| txn.insert_invoice(second.clone()))
            .unwrap_err();

        assert!(err.is_duplicate());
    }

    #[test]
    fn test_cross_tenant_reads_are_empty() {
        let storage = MemoryStorage::new();
        let tenant_a = Uuid::new_v4();
        let tenant_b = Uuid::new_v4();
        seeded_vendor(&storage, tenant_a);

        assert_eq!(storage.active_vendor_names(tenant_a).unwrap().len(), 1);
        assert_eq!(storage.active_vendor_names(tenant_b).unwrap().len(), 0);
    }

    #[test]
    fn test_cross_tenant_write_rejected() {
        let storage = MemoryStorage::new();
        let tenant = Uuid::new_v4();
        let other = Uuid::new_v4();
        let vendor = Vendor::new(other, "ACME01", "Acme Corporation");

        let result = storage.transaction(tenant, &mut |txn| txn.insert_vendor(vendor.clone()));
        assert!(result.is_err());
    }

    #[test]
    fn test_audit_chain_links_per_match_result() {
        let storage = MemoryStorage::new();
        let tenant = Uuid::new_v4();
        let match_id = Uuid::new_v4();
        let invoice_id = Uuid::new_v4();

        storage
            .transaction(tenant, &mut |txn| {
                let mut result =
                    MatchResult::new(tenant, invoice_id, MatchType::Exact, dec!(1.0));
                result.id = match_id;
                txn.insert_match_result(result)?;
                txn.append_audit_event(NewAuditEvent::new(
                    tenant,
                    match_id,
                    AuditEventType::MatchCreated,
                    "match created",
                ))?;
                txn.append_audit_event(NewAuditEvent::new(
                    tenant,
                    match_id,
                    AuditEventType::UserFeedback,
                    "feedback",
                ))?;
                Ok(())
            })
            .unwrap();

        let events = storage.audit_events(tenant, match_id).unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(verify_chain(&events), None);
        // Second event chains off the first.
        assert_ne!(events[0].event_hash, events[1].event_hash);
    }

    #[test]
    fn test_one_active_configuration_per_tenant() {
        let storage = MemoryStorage::new();
        let tenant = Uuid::new_v4();

        storage
            .transaction(tenant, &mut |txn| {
                txn.insert_configuration(MatchingConfiguration::defaults(tenant))
            })
            .unwrap();

        let mut second = MatchingConfiguration::defaults(tenant);
        second.config_version = "2".to_string();
        let err = storage
            .transaction(tenant, &mut |txn| txn.insert_configuration(second.clone()))
            .unwrap_err();
        assert!(err.is_duplicate());
    }
}
