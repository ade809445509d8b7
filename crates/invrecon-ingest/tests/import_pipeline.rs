//! Import pipeline integration tests.
//!
//! Drives the full service against in-memory storage and a real file on
//! disk: happy path, duplicates, partial failures, cancellation, and
//! progress snapshots.

use std::fs;
use std::sync::Arc;

use uuid::Uuid;

use invrecon_core::{
    Cache, ImportBatch, ImportBatchStatus, ImportErrorType, MemoryCache, MemoryStorage,
    ProgressFanout, Storage,
};
use invrecon_ingest::ImportService;

struct Harness {
    storage: Arc<dyn Storage>,
    cache: Arc<MemoryCache>,
    fanout: Arc<ProgressFanout>,
    tenant: Uuid,
    _dir: tempfile::TempDir,
}

impl Harness {
    fn new() -> Self {
        let cache = Arc::new(MemoryCache::new());
        let fanout = Arc::new(ProgressFanout::new(cache.clone() as Arc<dyn Cache>));
        Self {
            storage: Arc::new(MemoryStorage::new()),
            cache,
            fanout,
            tenant: Uuid::new_v4(),
            _dir: tempfile::tempdir().unwrap(),
        }
    }

    fn service(&self) -> ImportService {
        ImportService::new(
            Arc::clone(&self.storage),
            Arc::clone(&self.fanout),
            self.tenant,
        )
    }

    /// Write a CSV to disk and register a batch with the standard
    /// positional mapping (col0..col3 -> the four required fields).
    fn seed_batch(&self, content: &str) -> ImportBatch {
        self.seed_batch_with_mapping(
            content,
            serde_json::json!({
                "col0": "invoice_number",
                "col1": "vendor",
                "col2": "amount",
                "col3": "invoice_date",
            }),
        )
    }

    fn seed_batch_with_mapping(&self, content: &str, mapping: serde_json::Value) -> ImportBatch {
        let path = self._dir.path().join(format!("{}.csv", Uuid::new_v4()));
        fs::write(&path, content).unwrap();

        let batch = ImportBatch::new(
            self.tenant,
            "invoices.csv",
            path.to_string_lossy().to_string(),
            content.len() as u64,
            "test-hash",
        )
        .with_column_mapping(mapping);
        self.storage.insert_import_batch(batch.clone()).unwrap();
        batch
    }

    fn reload(&self, batch_id: Uuid) -> ImportBatch {
        self.storage
            .import_batch(self.tenant, batch_id)
            .unwrap()
            .unwrap()
    }
}

#[test]
fn test_happy_path_import() {
    let harness = Harness::new();
    let batch = harness.seed_batch(
        "INV001,ACME Corporation,150.00,2023-01-15\nINV002,Beta Industries,75.50,2023-01-16\n",
    );

    let outcome = harness.service().process_batch(batch.id, None).unwrap();

    assert_eq!(outcome.status, ImportBatchStatus::Completed);
    assert_eq!(outcome.stats.successful_rows, 2);
    assert_eq!(outcome.stats.error_rows, 0);
    assert_eq!(outcome.stats.duplicate_rows, 0);
    assert_eq!(outcome.stats.vendors_created, 2);

    // Vendors were auto-created under their normalized names.
    let acme = harness
        .storage
        .vendor_by_name_ci(harness.tenant, "ACME")
        .unwrap()
        .unwrap();
    let beta = harness
        .storage
        .vendor_by_name_ci(harness.tenant, "BETA INDUSTRIES")
        .unwrap()
        .unwrap();
    assert!(harness
        .storage
        .invoice_exists(harness.tenant, acme.id, "INV001")
        .unwrap());
    assert!(harness
        .storage
        .invoice_exists(harness.tenant, beta.id, "INV002")
        .unwrap());

    let stored = harness.reload(batch.id);
    assert_eq!(stored.status, ImportBatchStatus::Completed);
    assert_eq!(stored.progress_percentage, 100);
    assert_eq!(stored.successful_records, 2);
    assert!(stored.processing_completed_at.is_some());
}

#[test]
fn test_duplicate_in_batch_counted_not_persisted() {
    let harness = Harness::new();
    let batch = harness.seed_batch(
        "INV001,ACME Corporation,150.00,2023-01-15\nINV001,ACME Corporation,150.00,2023-01-15\n",
    );

    let outcome = harness.service().process_batch(batch.id, None).unwrap();

    assert_eq!(outcome.status, ImportBatchStatus::Completed);
    assert_eq!(outcome.stats.successful_rows, 1);
    assert_eq!(outcome.stats.duplicate_rows, 1);
    assert_eq!(outcome.stats.error_rows, 0);

    let errors = harness
        .storage
        .import_errors(harness.tenant, batch.id)
        .unwrap();
    let duplicate = errors
        .iter()
        .find(|e| e.error_type == ImportErrorType::Duplicate)
        .unwrap();
    assert_eq!(duplicate.error_code, "DUPLICATE_IN_BATCH");
    assert_eq!(duplicate.row_number, 2);
}

#[test]
fn test_blocking_error_outranks_duplicate_classification() {
    let harness = Harness::new();
    // Row 2 repeats row 1's (vendor, invoice_number) and also fails the
    // positive-amount business rule, so it carries both a duplicate
    // diagnostic and a blocking error. It must count as an error row.
    let batch = harness.seed_batch(
        "INV001,ACME Corporation,150.00,2023-01-15\nINV001,ACME Corporation,-50.00,2023-01-15\n",
    );

    let outcome = harness.service().process_batch(batch.id, None).unwrap();

    assert_eq!(outcome.status, ImportBatchStatus::Completed);
    assert_eq!(outcome.stats.successful_rows, 1);
    assert_eq!(outcome.stats.error_rows, 1);
    assert_eq!(outcome.stats.duplicate_rows, 0);

    let stored = harness.reload(batch.id);
    assert_eq!(stored.error_records, 1);
    assert_eq!(stored.duplicate_records, 0);

    // Both diagnostics are still recorded against the row.
    let errors = harness
        .storage
        .import_errors(harness.tenant, batch.id)
        .unwrap();
    assert!(errors
        .iter()
        .any(|e| e.error_code == "NEGATIVE_AMOUNT" && e.row_number == 2));
    assert!(errors
        .iter()
        .any(|e| e.error_code == "DUPLICATE_IN_BATCH" && e.row_number == 2));
}

#[test]
fn test_invalid_rows_block_only_themselves() {
    let harness = Harness::new();
    let batch = harness.seed_batch(
        "INV001,ACME Corporation,150.00,2023-01-15\nINV002,Beta Industries,not-money,2023-01-16\n",
    );

    let outcome = harness.service().process_batch(batch.id, None).unwrap();

    // Completed with warnings: one row landed, one was blocked.
    assert_eq!(outcome.status, ImportBatchStatus::Completed);
    assert_eq!(outcome.stats.successful_rows, 1);
    assert_eq!(outcome.stats.error_rows, 1);

    let errors = harness
        .storage
        .import_errors(harness.tenant, batch.id)
        .unwrap();
    assert!(errors
        .iter()
        .any(|e| e.error_code == "INVALID_TOTAL_AMOUNT_TYPE" && e.row_number == 2));
}

#[test]
fn test_all_rows_failing_marks_batch_failed() {
    let harness = Harness::new();
    let batch = harness.seed_batch(
        "INV001,ACME Corporation,not-money,bad-date\nINV002,Beta Industries,also-bad,2023-13-45\n",
    );

    let outcome = harness.service().process_batch(batch.id, None).unwrap();

    assert_eq!(outcome.status, ImportBatchStatus::Failed);
    assert_eq!(outcome.stats.successful_rows, 0);
}

#[test]
fn test_missing_required_mapping_fails_batch() {
    let harness = Harness::new();
    let batch = harness.seed_batch_with_mapping(
        "INV001,ACME,150.00,2023-01-15\n",
        serde_json::json!({"col0": "invoice_number", "col1": "vendor"}),
    );

    let outcome = harness.service().process_batch(batch.id, None).unwrap();

    assert_eq!(outcome.status, ImportBatchStatus::Failed);
    let stored = harness.reload(batch.id);
    assert!(stored.error_summary.is_some());
}

#[test]
fn test_header_row_is_skipped() {
    let harness = Harness::new();
    let batch = harness.seed_batch_with_mapping(
        "invoice_number,vendor_name,total_amount,invoice_date\n\
         INV001,ACME Corporation,150.00,2023-01-15\n",
        serde_json::json!({
            "invoice_number": "invoice_number",
            "vendor_name": "vendor",
            "total_amount": "amount",
            "invoice_date": "invoice_date",
        }),
    );

    let outcome = harness.service().process_batch(batch.id, None).unwrap();
    assert_eq!(outcome.stats.successful_rows, 1);
    assert_eq!(outcome.stats.error_rows, 0);

    // Row numbering accounts for the header: the data row is row 2.
    let stored = harness.reload(batch.id);
    assert!(stored.has_header);
}

#[test]
fn test_vendor_reused_across_rows_and_batches() {
    let harness = Harness::new();
    let first = harness.seed_batch(
        "INV000,ACME Corporation,50.00,2023-01-14\nINV001,ACME Corporation,100.00,2023-01-15\n",
    );
    harness.service().process_batch(first.id, None).unwrap();

    let second = harness.seed_batch(
        "INV002,ACME Corporation,200.00,2023-01-16\nINV003,ACME Corporation,300.00,2023-01-17\n",
    );
    let outcome = harness.service().process_batch(second.id, None).unwrap();

    assert_eq!(outcome.stats.vendors_created, 0);
    assert_eq!(outcome.stats.vendors_matched, 1);
    // Still exactly one ACME vendor.
    assert_eq!(
        harness
            .storage
            .active_vendor_names(harness.tenant)
            .unwrap()
            .len(),
        1
    );
}

#[test]
fn test_duplicate_against_existing_system_invoice() {
    let harness = Harness::new();
    let first = harness.seed_batch(
        "INV001,ACME Corporation,100.00,2023-01-15\nINV002,ACME Corporation,25.00,2023-01-15\n",
    );
    harness.service().process_batch(first.id, None).unwrap();

    let second = harness.seed_batch(
        "INV001,ACME Corporation,100.00,2023-01-15\nINV003,ACME Corporation,30.00,2023-01-16\n",
    );
    let outcome = harness.service().process_batch(second.id, None).unwrap();

    assert_eq!(outcome.stats.duplicate_rows, 1);
    assert_eq!(outcome.stats.successful_rows, 1);
    let errors = harness
        .storage
        .import_errors(harness.tenant, second.id)
        .unwrap();
    assert!(errors.iter().any(|e| e.error_code == "DUPLICATE_IN_SYSTEM"));
}

#[test]
fn test_cancellation_persists_nothing() {
    let harness = Harness::new();

    // A large batch, cancelled before processing reaches a commit.
    let mut content = String::new();
    for i in 0..500 {
        content.push_str(&format!(
            "INV{:04},Vendor Number {},100.00,2023-01-15\n",
            i,
            i % 50
        ));
    }
    let batch = harness.seed_batch(&content);

    harness.fanout.request_cancel(batch.id).unwrap();
    let outcome = harness.service().process_batch(batch.id, None).unwrap();

    assert_eq!(outcome.status, ImportBatchStatus::Cancelled);
    let stored = harness.reload(batch.id);
    assert_eq!(stored.status, ImportBatchStatus::Cancelled);

    // The rollback left no invoices and no orphan vendors.
    assert!(harness
        .storage
        .active_vendor_names(harness.tenant)
        .unwrap()
        .is_empty());
}

#[test]
fn test_progress_snapshot_cached_for_late_subscribers() {
    let harness = Harness::new();
    let mut content = String::new();
    for i in 0..120 {
        content.push_str(&format!("INV{:04},ACME Corporation,10.00,2023-01-15\n", i));
    }
    let batch = harness.seed_batch(&content);

    harness.service().process_batch(batch.id, None).unwrap();

    let snapshot = harness.fanout.cached_progress(batch.id).unwrap().unwrap();
    assert_eq!(snapshot["progress_percentage"], 100);
    assert_eq!(snapshot["successful_records"], 120);
}

#[test]
fn test_progress_is_monotonic() {
    let harness = Harness::new();
    let tenant = harness.tenant;
    let batch = harness.seed_batch(
        "INV001,ACME Corporation,150.00,2023-01-15\nINV002,Beta Industries,75.50,2023-01-16\n",
    );

    let rx = harness.fanout.subscribe(tenant, "watcher", batch.id);
    harness.service().process_batch(batch.id, None).unwrap();

    let mut last = 0i64;
    while let Some(message) = rx.try_recv() {
        if let Some(data) = message.data {
            if let Some(pct) = data.get("progress_percentage").and_then(|p| p.as_i64()) {
                assert!(pct >= last, "progress went backwards: {} -> {}", last, pct);
                last = pct;
            }
        }
    }
    assert_eq!(last, 100);
}

#[test]
fn test_terminal_batch_refuses_reprocessing() {
    let harness = Harness::new();
    let batch = harness.seed_batch("INV001,ACME Corporation,150.00,2023-01-15\n");

    harness.service().process_batch(batch.id, None).unwrap();
    assert!(harness.service().process_batch(batch.id, None).is_err());
}

#[test]
fn test_unknown_batch_is_not_found() {
    let harness = Harness::new();
    let err = harness
        .service()
        .process_batch(Uuid::new_v4(), None)
        .unwrap_err();
    assert!(matches!(err, invrecon_core::ReconError::NotFound(_)));
}
