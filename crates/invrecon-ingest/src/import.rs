//! The import pipeline.
//!
//! One background run per batch: decode the file, stream its rows through
//! normalization and the validation chain, stage vendors and invoices, and
//! commit everything in a single transaction with a savepoint per row.
//! Progress is republished every fifty rows, and the cancellation flag is
//! polled at the same checkpoints - observing it drops the staged writes,
//! so a cancelled batch persists nothing.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tracing::{error, info, warn};
use uuid::Uuid;

use invrecon_core::{
    CurrencyCode, DocumentStatus, ErrorSeverity, ImportBatch, ImportBatchStatus, ImportError,
    ImportErrorType, Invoice, InvoiceLine, ProgressFanout, ReconError, ReconResult, Storage,
    StorageTxn, Vendor,
};

use crate::metadata::parse_metadata;
use crate::normalize::{
    normalize_amount, normalize_date, normalize_description, normalize_invoice_number,
    normalize_po_reference, normalize_vendor_name,
};
use crate::validate::{NormalizedRow, RowData, ValidationEngine, ValidationError};
use crate::vendor_code::generate_vendor_code;
use crate::MAX_FILE_SIZE;

/// Canonical fields that must be mapped before processing starts.
const REQUIRED_MAPPED_FIELDS: [&str; 4] = ["invoice_number", "vendor", "amount", "invoice_date"];

/// Rows between progress checkpoints.
const PROGRESS_INTERVAL: u64 = 50;

/// Running counters for one import run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ImportStats {
    pub total_rows: u64,
    pub processed_rows: u64,
    pub successful_rows: u64,
    pub error_rows: u64,
    pub duplicate_rows: u64,
    pub vendors_created: u64,
    pub vendors_matched: u64,
}

/// Result of one import run.
#[derive(Debug, Clone, Serialize)]
pub struct ImportOutcome {
    pub batch_id: Uuid,
    pub status: ImportBatchStatus,
    pub message: String,
    pub stats: ImportStats,
}

/// A row staged for the atomic commit.
struct StagedRow {
    row_number: u64,
    vendor_key: String,
    invoice: Invoice,
    line: Option<InvoiceLine>,
}

/// Vendor resolution for staged rows: an existing vendor or one created by
/// this batch.
enum StagedVendor {
    Existing(Uuid),
    Created(Vendor),
}

impl StagedVendor {
    fn id(&self) -> Uuid {
        match self {
            Self::Existing(id) => *id,
            Self::Created(vendor) => vendor.id,
        }
    }
}

/// The CSV import service for one tenant.
pub struct ImportService {
    storage: Arc<dyn Storage>,
    fanout: Arc<ProgressFanout>,
    tenant_id: Uuid,
}

impl ImportService {
    /// Create a service over the given storage and progress fanout.
    pub fn new(storage: Arc<dyn Storage>, fanout: Arc<ProgressFanout>, tenant_id: Uuid) -> Self {
        Self {
            storage,
            fanout,
            tenant_id,
        }
    }

    /// Process one import batch end to end.
    ///
    /// Unexpected failures mark the batch `Failed` with an error summary;
    /// an observed cancellation flag marks it `Cancelled`. Both outcomes
    /// leave zero invoices persisted for the batch.
    pub fn process_batch(&self, batch_id: Uuid, actor: Option<Uuid>) -> ReconResult<ImportOutcome> {
        let mut batch = self
            .storage
            .import_batch(self.tenant_id, batch_id)?
            .ok_or_else(|| ReconError::not_found(format!("import batch {}", batch_id)))?;

        if batch.status.is_terminal() {
            return Err(ReconError::validation(format!(
                "import batch is already {:?}",
                batch.status
            )));
        }

        match self.run(&mut batch, actor) {
            Ok(outcome) => Ok(outcome),
            Err(err) if err.is_cancelled() => self.finish_cancelled(&mut batch),
            Err(err) => {
                error!(%batch_id, %err, "import batch failed");
                batch.status = ImportBatchStatus::Failed;
                batch.error_summary = Some(serde_json::json!({"error": err.to_string()}));
                batch.processing_completed_at = Some(Utc::now());
                batch.updated_at = Utc::now();
                self.storage.update_import_batch(&batch)?;
                self.fanout.publish_status(
                    batch.id,
                    self.tenant_id,
                    "failed",
                    Some(serde_json::json!({"error": err.to_string()})),
                )?;
                Ok(ImportOutcome {
                    batch_id,
                    status: ImportBatchStatus::Failed,
                    message: format!("Import failed: {}", err),
                    stats: ImportStats::default(),
                })
            }
        }
    }

    fn run(&self, batch: &mut ImportBatch, actor: Option<Uuid>) -> ReconResult<ImportOutcome> {
        self.checkpoint_cancel(batch.id)?;

        batch.status = ImportBatchStatus::Processing;
        batch.processing_started_at = Some(Utc::now());
        self.update_progress(batch, 0, "Initializing import process")?;

        // Read and (if detection never ran) analyze the file.
        let content = std::fs::read(&batch.storage_path)?;
        if content.len() > MAX_FILE_SIZE {
            return Err(ReconError::validation("file exceeds the 50 MB limit"));
        }
        if batch.csv_delimiter.is_none() || batch.csv_encoding.is_none() {
            let metadata = parse_metadata(&content)?;
            batch.csv_delimiter = Some(metadata.delimiter);
            batch.csv_encoding = Some(metadata.encoding.clone());
            batch.has_header = metadata.has_header;
            batch.preview_data = Some(serde_json::to_value(&metadata.preview_data)?);
            if batch.total_records == 0 {
                batch.total_records = metadata.estimated_rows as u64;
            }
        }

        let mapping = self.column_mapping(batch)?;
        self.update_progress(batch, 5, "Reading CSV file")?;

        let delimiter = batch.csv_delimiter.unwrap_or(',');
        let (text, _) = crate::metadata::decode_content(&content);

        let mut reader = csv::ReaderBuilder::new()
            .delimiter(delimiter as u8)
            .has_headers(false)
            .flexible(true)
            .from_reader(text.as_bytes());

        let mut records = reader.records();

        // Resolve the header row into a name -> index table. Headerless
        // files address columns positionally through the mapping keys.
        let header_index: HashMap<String, usize> = if batch.has_header {
            let header = records
                .next()
                .ok_or_else(|| ReconError::validation("file appears to be empty"))?
                .map_err(|e| ReconError::validation(format!("CSV parse error: {}", e)))?;
            header
                .iter()
                .enumerate()
                .map(|(i, name)| (name.trim().to_string(), i))
                .collect()
        } else {
            HashMap::new()
        };

        let mut validation = ValidationEngine::new(Arc::clone(&self.storage), self.tenant_id);
        let mut stats = ImportStats::default();
        let mut staged_rows: Vec<StagedRow> = Vec::new();
        let mut staged_vendors: HashMap<String, StagedVendor> = HashMap::new();
        let mut staged_codes: HashSet<String> = HashSet::new();
        let mut pending_errors: Vec<ImportError> = Vec::new();
        let mut row_number = u64::from(batch.has_header);

        for record in records {
            row_number += 1;
            let record = match record {
                Ok(record) => record,
                Err(err) => {
                    warn!(row = row_number, %err, "unparseable CSV record");
                    stats.error_rows += 1;
                    stats.processed_rows += 1;
                    pending_errors.push(
                        ImportError::new(
                            self.tenant_id,
                            batch.id,
                            row_number,
                            ImportErrorType::Parsing,
                            "MALFORMED_ROW",
                            format!("Row could not be parsed: {}", err),
                            ErrorSeverity::Error,
                        ),
                    );
                    continue;
                }
            };
            if record.iter().all(|c| c.trim().is_empty()) {
                continue;
            }
            stats.processed_rows += 1;

            let row = build_row(&record, &mapping, &header_index);
            let (ctx, errors) = validation.validate_row(&row, row_number);

            let raw_json = raw_row_json(&row);
            // Duplicate diagnostics also carry error severity, so the
            // blocking check excludes them: a row failing validation counts
            // as an error even when it is also a duplicate, while a row
            // whose only blocker is the duplicate counts as a duplicate.
            let has_blocking = errors.iter().any(|e| {
                e.severity == ErrorSeverity::Error && e.error_type != ImportErrorType::Duplicate
            });
            let has_duplicate = errors
                .iter()
                .any(|e| e.error_type == ImportErrorType::Duplicate);

            if has_blocking {
                stats.error_rows += 1;
                pending_errors.extend(
                    errors
                        .iter()
                        .map(|e| to_import_error(e, self.tenant_id, batch.id, row_number, &raw_json)),
                );
            } else if has_duplicate {
                stats.duplicate_rows += 1;
                pending_errors.extend(
                    errors
                        .iter()
                        .map(|e| to_import_error(e, self.tenant_id, batch.id, row_number, &raw_json)),
                );
            } else {
                // Warnings ride along with the persisted row.
                pending_errors.extend(
                    errors
                        .iter()
                        .filter(|e| e.severity == ErrorSeverity::Warning)
                        .map(|e| to_import_error(e, self.tenant_id, batch.id, row_number, &raw_json)),
                );
                self.stage_row(
                    batch,
                    actor,
                    row_number,
                    &row.parsed,
                    ctx.matched_vendor_id,
                    &mut staged_rows,
                    &mut staged_vendors,
                    &mut staged_codes,
                    &mut stats,
                )?;
                stats.successful_rows += 1;
            }

            if stats.processed_rows % PROGRESS_INTERVAL == 0 {
                self.checkpoint_cancel(batch.id)?;
                let total = batch.total_records.max(stats.processed_rows).max(1);
                let pct = (10 + (stats.processed_rows * 80 / total)).min(95) as u8;
                batch.processed_records = stats.processed_rows;
                batch.successful_records = stats.successful_rows;
                batch.error_records = stats.error_rows;
                batch.duplicate_records = stats.duplicate_rows;
                self.update_progress(batch, pct, &format!("Processing row {}", stats.processed_rows))?;
            }
        }

        stats.total_rows = stats.processed_rows;

        // Stage boundary: last chance to observe cancellation before commit.
        self.checkpoint_cancel(batch.id)?;
        self.update_progress(batch, 95, "Finalizing import")?;

        let commit_adjustments = self.commit(batch, staged_vendors, staged_rows)?;
        for (row_number, import_error) in commit_adjustments {
            stats.successful_rows -= 1;
            stats.duplicate_rows += 1;
            warn!(row = row_number, "row lost a uniqueness race at commit");
            pending_errors.push(import_error);
        }

        if !pending_errors.is_empty() {
            self.storage.append_import_errors(pending_errors)?;
        }

        self.finish(batch, &validation, stats)
    }

    fn column_mapping(&self, batch: &ImportBatch) -> ReconResult<BTreeMap<String, String>> {
        let raw = batch
            .column_mapping
            .as_ref()
            .ok_or_else(|| ReconError::validation("column mapping not configured"))?;
        let object = raw
            .as_object()
            .ok_or_else(|| ReconError::validation("column mapping must be an object"))?;

        let mapping: BTreeMap<String, String> = object
            .iter()
            .filter_map(|(column, field)| {
                field.as_str().map(|f| (column.clone(), f.to_string()))
            })
            .collect();

        let mapped: HashSet<&str> = mapping.values().map(String::as_str).collect();
        for required in REQUIRED_MAPPED_FIELDS {
            if !mapped.contains(required) {
                return Err(ReconError::validation(format!(
                    "required field '{}' is not mapped to any column",
                    required
                )));
            }
        }
        Ok(mapping)
    }

    #[allow(clippy::too_many_arguments)]
    fn stage_row(
        &self,
        batch: &ImportBatch,
        actor: Option<Uuid>,
        row_number: u64,
        parsed: &NormalizedRow,
        matched_vendor_id: Option<Uuid>,
        staged_rows: &mut Vec<StagedRow>,
        staged_vendors: &mut HashMap<String, StagedVendor>,
        staged_codes: &mut HashSet<String>,
        stats: &mut ImportStats,
    ) -> ReconResult<()> {
        // Validation guarantees these are present on a stageable row.
        let vendor_name = parsed
            .vendor_name
            .clone()
            .ok_or_else(|| ReconError::validation("vendor name missing on validated row"))?;
        let invoice_number = parsed
            .invoice_number
            .clone()
            .ok_or_else(|| ReconError::validation("invoice number missing on validated row"))?;
        let total_amount = parsed
            .total_amount
            .ok_or_else(|| ReconError::validation("amount missing on validated row"))?;
        let invoice_date = parsed
            .invoice_date
            .ok_or_else(|| ReconError::validation("invoice date missing on validated row"))?;

        let vendor_key = vendor_name.to_uppercase();
        if !staged_vendors.contains_key(&vendor_key) {
            let resolved = match matched_vendor_id {
                Some(id) => {
                    stats.vendors_matched += 1;
                    StagedVendor::Existing(id)
                }
                None => {
                    let code = generate_vendor_code(&vendor_name, |candidate| {
                        staged_codes.contains(candidate)
                            || self
                                .storage
                                .vendor_code_exists(self.tenant_id, candidate)
                                .unwrap_or(false)
                    });
                    staged_codes.insert(code.clone());
                    stats.vendors_created += 1;
                    let mut vendor = Vendor::new(self.tenant_id, code, vendor_name.clone());
                    vendor.created_by = actor;
                    StagedVendor::Created(vendor)
                }
            };
            staged_vendors.insert(vendor_key.clone(), resolved);
        }
        let vendor_id = staged_vendors[&vendor_key].id();

        let mut invoice = Invoice::new(
            self.tenant_id,
            vendor_id,
            invoice_number,
            total_amount,
            invoice_date,
        );
        invoice.currency = CurrencyCode::USD;
        invoice.subtotal = parsed.subtotal.unwrap_or(total_amount);
        invoice.tax_amount = parsed.tax_amount.unwrap_or_default();
        invoice.due_date = parsed.due_date;
        invoice.po_reference = parsed.po_reference.clone();
        invoice.status = DocumentStatus::Pending;
        invoice.processing_status = Some("imported".to_string());
        invoice.created_by = actor;
        invoice = invoice.with_source_file(
            batch.original_filename.clone(),
            batch.storage_path.clone(),
            batch.file_hash.clone(),
            batch.file_size.max(1),
            "text/csv",
        );

        let line = parsed.description.as_ref().map(|description| {
            InvoiceLine::new(
                self.tenant_id,
                invoice.id,
                1,
                description.clone(),
                rust_decimal::Decimal::ONE,
                total_amount,
            )
        });

        staged_rows.push(StagedRow {
            row_number,
            vendor_key,
            invoice,
            line,
        });
        Ok(())
    }

    /// Commit every staged vendor and row atomically. Rows that lose a
    /// uniqueness race at commit time are rolled back to their savepoint
    /// and reported as duplicates; everything else lands or nothing does.
    fn commit(
        &self,
        batch: &ImportBatch,
        staged_vendors: HashMap<String, StagedVendor>,
        staged_rows: Vec<StagedRow>,
    ) -> ReconResult<Vec<(u64, ImportError)>> {
        let mut lost_rows: Vec<(u64, ImportError)> = Vec::new();
        let tenant_id = self.tenant_id;
        let batch_id = batch.id;

        self.storage.transaction(tenant_id, &mut |txn: &mut dyn StorageTxn| {
            for vendor in staged_vendors.values() {
                if let StagedVendor::Created(vendor) = vendor {
                    txn.insert_vendor(vendor.clone())?;
                }
            }

            for row in &staged_rows {
                let savepoint = txn.savepoint();
                let inserted = txn.insert_invoice(row.invoice.clone()).and_then(|()| {
                    match &row.line {
                        Some(line) => txn.insert_invoice_line(line.clone()),
                        None => Ok(()),
                    }
                });

                match inserted {
                    Ok(()) => {}
                    Err(err) if err.is_duplicate() => {
                        txn.rollback_to(savepoint);
                        lost_rows.push((
                            row.row_number,
                            ImportError::new(
                                tenant_id,
                                batch_id,
                                row.row_number,
                                ImportErrorType::Duplicate,
                                "DUPLICATE_IN_SYSTEM",
                                format!(
                                    "Invoice already exists in system: {} - {}",
                                    row.vendor_key, row.invoice.invoice_number
                                ),
                                ErrorSeverity::Error,
                            )
                            .with_column("invoice_number")
                            .with_raw_value(row.invoice.invoice_number.clone()),
                        ));
                    }
                    Err(err) => return Err(err),
                }
            }
            Ok(())
        })?;

        Ok(lost_rows)
    }

    fn finish(
        &self,
        batch: &mut ImportBatch,
        validation: &ValidationEngine,
        stats: ImportStats,
    ) -> ReconResult<ImportOutcome> {
        let (status, message) = if stats.error_rows == 0 && stats.successful_rows > 0 {
            (
                ImportBatchStatus::Completed,
                format!(
                    "Import completed successfully. {} records imported.",
                    stats.successful_rows
                ),
            )
        } else if stats.successful_rows > 0 {
            (
                ImportBatchStatus::Completed,
                format!(
                    "Import completed with warnings. {} records imported, {} errors.",
                    stats.successful_rows, stats.error_rows
                ),
            )
        } else {
            (
                ImportBatchStatus::Failed,
                "Import failed. No records were imported.".to_string(),
            )
        };

        batch.status = status;
        batch.total_records = stats.total_rows;
        batch.processed_records = stats.processed_rows;
        batch.successful_records = stats.successful_rows;
        batch.error_records = stats.error_rows;
        batch.duplicate_records = stats.duplicate_rows;
        batch.processing_completed_at = Some(Utc::now());
        batch.processing_summary = Some(serde_json::json!({
            "statistics": stats,
            "validation": validation.summary()?,
        }));
        self.update_progress(batch, 100, "Import completed")?;

        self.fanout.publish_status(
            batch.id,
            self.tenant_id,
            match status {
                ImportBatchStatus::Completed => "completed",
                _ => "failed",
            },
            Some(serde_json::json!({"message": message, "statistics": stats})),
        )?;

        info!(batch_id = %batch.id, ?status, "import batch finished");
        Ok(ImportOutcome {
            batch_id: batch.id,
            status,
            message,
            stats,
        })
    }

    fn finish_cancelled(&self, batch: &mut ImportBatch) -> ReconResult<ImportOutcome> {
        batch.status = ImportBatchStatus::Cancelled;
        batch.processing_completed_at = Some(Utc::now());
        batch.updated_at = Utc::now();
        self.storage.update_import_batch(batch)?;
        self.fanout
            .publish_status(batch.id, self.tenant_id, "cancelled", None)?;

        info!(batch_id = %batch.id, "import batch cancelled");
        Ok(ImportOutcome {
            batch_id: batch.id,
            status: ImportBatchStatus::Cancelled,
            message: "Import cancelled by user".to_string(),
            stats: ImportStats::default(),
        })
    }

    fn checkpoint_cancel(&self, batch_id: Uuid) -> ReconResult<()> {
        if self.fanout.is_cancel_requested(batch_id) {
            Err(ReconError::cancelled("import cancelled by user"))
        } else {
            Ok(())
        }
    }

    /// Persist batch progress and publish it to subscribers. Progress never
    /// decreases.
    fn update_progress(
        &self,
        batch: &mut ImportBatch,
        percentage: u8,
        stage: &str,
    ) -> ReconResult<()> {
        batch.progress_percentage = batch.progress_percentage.max(percentage);
        batch.processing_stage = Some(stage.to_string());
        batch.updated_at = Utc::now();
        self.storage.update_import_batch(batch)?;

        self.fanout.publish_progress(
            batch.id,
            serde_json::json!({
                "progress_percentage": batch.progress_percentage,
                "processing_stage": stage,
                "processed_records": batch.processed_records,
                "successful_records": batch.successful_records,
                "error_records": batch.error_records,
                "duplicate_records": batch.duplicate_records,
            }),
        )
    }
}

/// Build a [`RowData`] from one CSV record and the column mapping.
fn build_row(
    record: &csv::StringRecord,
    mapping: &BTreeMap<String, String>,
    header_index: &HashMap<String, usize>,
) -> RowData {
    let mut row = RowData::default();

    for (column, field) in mapping {
        let Some(index) = resolve_column_index(column, header_index) else {
            continue;
        };
        let raw = record.get(index).unwrap_or_default().trim().to_string();
        row.raw.insert(canonical_field(field).to_string(), raw.clone());

        match field.as_str() {
            "invoice_number" => row.parsed.invoice_number = normalize_invoice_number(&raw),
            "vendor" => row.parsed.vendor_name = normalize_vendor_name(&raw),
            "amount" => row.parsed.total_amount = normalize_amount(&raw),
            "invoice_date" => row.parsed.invoice_date = normalize_date(&raw),
            "subtotal" => row.parsed.subtotal = normalize_amount(&raw),
            "tax_amount" => row.parsed.tax_amount = normalize_amount(&raw),
            "due_date" => row.parsed.due_date = normalize_date(&raw),
            "po_reference" => row.parsed.po_reference = normalize_po_reference(&raw),
            "description" => row.parsed.description = normalize_description(&raw),
            _ => {}
        }
    }

    row
}

/// Resolve a mapping key to a column index: a header name, a detected
/// `column_N` name (1-based), a `colN` shorthand (0-based), or a bare
/// index.
fn resolve_column_index(column: &str, header_index: &HashMap<String, usize>) -> Option<usize> {
    if let Some(&index) = header_index.get(column) {
        return Some(index);
    }
    if let Some(rest) = column.strip_prefix("column_") {
        return rest.parse::<usize>().ok().map(|n| n.saturating_sub(1));
    }
    if let Some(rest) = column.strip_prefix("col") {
        return rest.parse().ok();
    }
    column.parse().ok()
}

/// Canonical field name used in raw-cell bookkeeping: mapping names
/// (vendor, amount) become the stored field names.
fn canonical_field(field: &str) -> &str {
    match field {
        "vendor" => "vendor_name",
        "amount" => "total_amount",
        other => other,
    }
}

fn raw_row_json(row: &RowData) -> serde_json::Value {
    serde_json::json!(row.raw)
}

fn to_import_error(
    error: &ValidationError,
    tenant_id: Uuid,
    batch_id: Uuid,
    row_number: u64,
    raw_row: &serde_json::Value,
) -> ImportError {
    let mut import_error = ImportError::new(
        tenant_id,
        batch_id,
        row_number,
        error.error_type,
        error.code.clone(),
        error.message.clone(),
        error.severity,
    )
    .with_raw_row(raw_row.clone());

    if let Some(field) = &error.field {
        import_error = import_error.with_column(field.clone());
    }
    if let Some(raw_value) = &error.raw_value {
        import_error = import_error.with_raw_value(raw_value.clone());
    }
    if let Some(expected) = &error.expected_format {
        import_error = import_error.with_expected_format(expected.clone());
    }
    if let Some(fix) = &error.suggested_fix {
        import_error = import_error.with_suggested_fix(fix.clone());
    }
    import_error
}
