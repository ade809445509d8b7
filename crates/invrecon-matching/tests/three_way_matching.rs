//! Three-way matching integration tests.
//!
//! Covers the perfect-match and partial-receipt scenarios end to end,
//! including line-level binding, classification, approval decisions, and the
//! persisted audit trail.

use std::sync::Arc;

use chrono::{Duration, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use uuid::Uuid;

use invrecon_core::{
    verify_chain, CurrencyCode, Invoice, InvoiceLine, MemoryStorage, PurchaseOrder,
    PurchaseOrderLine, Receipt, ReceiptLine, Storage, Vendor,
};
use invrecon_matching::{ThreeWayMatchClass, ThreeWayMatchEngine};

struct Fixture {
    storage: Arc<dyn Storage>,
    tenant: Uuid,
    vendor: Vendor,
    po: PurchaseOrder,
    po_line: PurchaseOrderLine,
}

/// Receipt dates must fall inside the engine's search envelope, so the
/// fixture anchors all documents near today.
fn fixture() -> Fixture {
    let storage: Arc<dyn Storage> = Arc::new(MemoryStorage::new());
    let tenant = Uuid::new_v4();
    let vendor = Vendor::new(tenant, "ACME01", "Acme Corporation");

    let po_date = Utc::now().date_naive() - Duration::days(10);
    let po = PurchaseOrder::new(tenant, vendor.id, "PO-12345", dec!(1000.00), po_date);
    let po_line = PurchaseOrderLine::new(tenant, po.id, 1, "Industrial Widget", dec!(10), dec!(100.00))
        .with_item_code("W-100");

    let (v, p, l) = (vendor.clone(), po.clone(), po_line.clone());
    storage
        .transaction(tenant, &mut |txn| {
            txn.insert_vendor(v.clone())?;
            txn.insert_purchase_order(p.clone())?;
            txn.insert_purchase_order_line(l.clone())
        })
        .unwrap();

    Fixture {
        storage,
        tenant,
        vendor,
        po,
        po_line,
    }
}

fn seed_invoice_with_line(fx: &Fixture, total: Decimal, quantity: Decimal) -> Invoice {
    let invoice_date = Utc::now().date_naive() - Duration::days(2);
    let invoice = Invoice::new(fx.tenant, fx.vendor.id, "INV-9001", total, invoice_date)
        .with_po_reference("PO-12345");
    let line = InvoiceLine::new(
        fx.tenant,
        invoice.id,
        1,
        "Industrial Widget",
        quantity,
        dec!(100.00),
    )
    .with_item_code("W-100");

    let (i, l) = (invoice.clone(), line.clone());
    fx.storage
        .transaction(fx.tenant, &mut |txn| {
            txn.insert_invoice(i.clone())?;
            txn.insert_invoice_line(l.clone())
        })
        .unwrap();
    invoice
}

fn seed_receipt(fx: &Fixture, receipt_number: &str, quantity: Decimal) -> Receipt {
    let receipt_date = Utc::now().date_naive() - Duration::days(5);
    let receipt = Receipt::new(fx.tenant, fx.po.id, receipt_number, receipt_date)
        .with_totals(quantity, quantity * dec!(100.00));
    let line = ReceiptLine::new(
        fx.tenant,
        receipt.id,
        fx.po_line.id,
        1,
        quantity,
        dec!(100.00),
    );

    let (r, l) = (receipt.clone(), line.clone());
    fx.storage
        .transaction(fx.tenant, &mut |txn| {
            txn.insert_receipt(r.clone())?;
            txn.insert_receipt_line(l.clone())
        })
        .unwrap();
    receipt
}

#[test]
fn test_perfect_match() {
    let fx = fixture();
    let invoice = seed_invoice_with_line(&fx, dec!(1000.00), dec!(10));
    seed_receipt(&fx, "GR-001", dec!(10));

    let engine = ThreeWayMatchEngine::new(fx.tenant, Arc::clone(&fx.storage));
    let outcome = engine.perform(invoice.id).unwrap().unwrap();

    assert_eq!(outcome.class, ThreeWayMatchClass::PerfectMatch);
    assert_eq!(outcome.overall_confidence, dec!(0.95));
    assert!(outcome.auto_approved);
    assert!(outcome.exception_items.is_empty());
    assert_eq!(outcome.po_id, fx.po.id);
    assert_eq!(outcome.receipt_ids.len(), 1);

    let line = &outcome.line_matches[0];
    assert!(line.is_matched);
    assert!(line.variance_within_tolerance);
    assert_eq!(line.po_line_id, Some(fx.po_line.id));
    assert_eq!(line.receipt_quantity, dec!(10));
}

#[test]
fn test_partial_receipt() {
    let fx = fixture();
    let invoice = seed_invoice_with_line(&fx, dec!(1000.00), dec!(10));
    // Only 7 of 10 units received.
    seed_receipt(&fx, "GR-001", dec!(7));

    let engine = ThreeWayMatchEngine::new(fx.tenant, Arc::clone(&fx.storage));
    let outcome = engine.perform(invoice.id).unwrap().unwrap();

    assert_eq!(outcome.class, ThreeWayMatchClass::PartialReceipt);
    assert!(outcome.overall_confidence >= dec!(0.70));
    assert!(outcome.overall_confidence <= dec!(0.85));
    assert!(!outcome.auto_approved);
    assert!(outcome.requires_review);
    // The 30% short delivery shows up as a high-variance line exception.
    assert!(outcome
        .exception_items
        .iter()
        .any(|e| e.contains("high variance")));

    let line = &outcome.line_matches[0];
    assert_eq!(line.receipt_quantity, dec!(7));
    assert_eq!(line.quantity_variance, dec!(0.3));
    assert!(!line.variance_within_tolerance);
}

#[test]
fn test_split_delivery_aggregates_receipts() {
    let fx = fixture();
    let invoice = seed_invoice_with_line(&fx, dec!(1000.00), dec!(10));
    seed_receipt(&fx, "GR-001", dec!(4));
    seed_receipt(&fx, "GR-002", dec!(6));

    let engine = ThreeWayMatchEngine::new(fx.tenant, Arc::clone(&fx.storage));
    let outcome = engine.perform(invoice.id).unwrap().unwrap();

    // Two receipts summing to the full quantity reconcile cleanly.
    assert_eq!(outcome.class, ThreeWayMatchClass::PerfectMatch);
    assert_eq!(outcome.summary.total_receipt_quantity, dec!(10));
    assert_eq!(outcome.receipt_ids.len(), 2);
    assert!(outcome.auto_approved);
}

#[test]
fn test_no_receipts_reconciles_invoice_to_po() {
    let fx = fixture();
    let invoice = seed_invoice_with_line(&fx, dec!(1000.00), dec!(10));

    let engine = ThreeWayMatchEngine::new(fx.tenant, Arc::clone(&fx.storage));
    let outcome = engine.perform(invoice.id).unwrap().unwrap();

    // With no goods posted the quantity comparison falls back to the
    // invoice quantity, so a clean invoice/PO pair still reads as perfect.
    assert_eq!(outcome.class, ThreeWayMatchClass::PerfectMatch);
    assert_eq!(outcome.summary.total_receipt_quantity, Decimal::ZERO);
    assert!(outcome.receipt_ids.is_empty());
}

#[test]
fn test_fuzzy_po_discovery_without_reference() {
    let fx = fixture();
    let invoice_date = Utc::now().date_naive() - Duration::days(2);
    // No PO reference; amount 5% over, inside the 10% discovery band.
    let invoice = Invoice::new(fx.tenant, fx.vendor.id, "INV-9002", dec!(1050.00), invoice_date);
    let line = InvoiceLine::new(
        fx.tenant,
        invoice.id,
        1,
        "Industrial Widget",
        dec!(10),
        dec!(105.00),
    )
    .with_item_code("W-100");
    let (i, l) = (invoice.clone(), line.clone());
    fx.storage
        .transaction(fx.tenant, &mut |txn| {
            txn.insert_invoice(i.clone())?;
            txn.insert_invoice_line(l.clone())
        })
        .unwrap();
    seed_receipt(&fx, "GR-001", dec!(10));

    let engine = ThreeWayMatchEngine::new(fx.tenant, Arc::clone(&fx.storage));
    let outcome = engine.perform(invoice.id).unwrap().unwrap();
    assert_eq!(outcome.po_id, fx.po.id);
}

#[test]
fn test_mixed_currency_po_is_skipped() {
    let fx = fixture();
    let invoice_date = Utc::now().date_naive() - Duration::days(2);
    let invoice = Invoice::new(fx.tenant, fx.vendor.id, "INV-9003", dec!(1000.00), invoice_date)
        .with_po_reference("PO-12345")
        .with_currency(CurrencyCode::GBP);
    let stored = invoice.clone();
    fx.storage
        .transaction(fx.tenant, &mut |txn| txn.insert_invoice(stored.clone()))
        .unwrap();

    let engine = ThreeWayMatchEngine::new(fx.tenant, Arc::clone(&fx.storage));
    assert!(engine.perform(invoice.id).unwrap().is_none());
}

#[test]
fn test_persisted_result_and_audit_trail() {
    let fx = fixture();
    let invoice = seed_invoice_with_line(&fx, dec!(1000.00), dec!(10));
    seed_receipt(&fx, "GR-001", dec!(10));

    let engine = ThreeWayMatchEngine::new(fx.tenant, Arc::clone(&fx.storage));
    let outcome = engine.perform(invoice.id).unwrap().unwrap();

    let result = fx
        .storage
        .match_result(fx.tenant, outcome.match_result_id)
        .unwrap()
        .unwrap();
    assert_eq!(result.invoice_id, invoice.id);
    assert_eq!(result.purchase_order_id, Some(fx.po.id));
    assert!(result.auto_approved);
    assert_eq!(
        result.criteria_met["three_way_match_type"],
        "perfect_match"
    );

    let events = fx
        .storage
        .audit_events(fx.tenant, outcome.match_result_id)
        .unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(verify_chain(&events), None);
    // The full classification block rides in decision_factors.
    let block = &events[0].decision_factors["three_way_match_result"];
    assert_eq!(block["match_type"], "perfect_match");
    assert!(block["line_matches_summary"]["total_lines"].is_number());
}

#[test]
fn test_missing_invoice_returns_none() {
    let fx = fixture();
    let engine = ThreeWayMatchEngine::new(fx.tenant, fx.storage.clone());
    assert!(engine.perform(Uuid::new_v4()).unwrap().is_none());
}
