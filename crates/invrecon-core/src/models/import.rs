//! Import batch and per-row error models for CSV ingestion.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle of an import batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ImportBatchStatus {
    /// Created, waiting for upload to finish
    #[default]
    Pending,
    /// Chunks still arriving
    Uploading,
    /// Metadata detection and mapping validation
    Validating,
    /// Row processing in progress
    Processing,
    /// Finished; at least one row persisted
    Completed,
    /// Finished with nothing persisted
    Failed,
    /// Cancelled by the user; outer transaction rolled back
    Cancelled,
}

impl ImportBatchStatus {
    /// Terminal states never transition again.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }
}

/// Kind of a per-row import error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImportErrorType {
    /// Field-level validation failure
    Validation,
    /// Row could not be parsed
    Parsing,
    /// Business rule violation
    BusinessRule,
    /// In-batch or in-storage duplicate
    Duplicate,
    /// Unexpected system failure
    System,
}

/// Severity of a per-row diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorSeverity {
    /// Blocks persistence of the row
    Error,
    /// Row persists; diagnostic recorded alongside
    Warning,
}

/// A single CSV ingestion job with its own lifecycle and counters.
///
/// Counters are non-negative and monotonic;
/// `successful + error + duplicate <= total`. Progress is in [0, 100] and
/// never decreases.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportBatch {
    /// Batch identifier
    pub id: Uuid,

    /// Owning tenant
    pub tenant_id: Uuid,

    /// Stored (sanitized) filename
    pub filename: String,

    /// Filename as uploaded
    pub original_filename: String,

    /// File size in bytes
    pub file_size: u64,

    /// Content hash of the uploaded file
    pub file_hash: String,

    /// MIME type as declared at upload
    pub mime_type: String,

    /// Where the file lives on disk
    pub storage_path: String,

    /// Lifecycle status
    pub status: ImportBatchStatus,

    /// Human-readable current stage
    pub processing_stage: Option<String>,

    /// Progress, in [0, 100]
    pub progress_percentage: u8,

    /// Total rows in the file (estimated until processing finishes)
    pub total_records: u64,

    /// Rows consumed so far
    pub processed_records: u64,

    /// Rows persisted
    pub successful_records: u64,

    /// Rows blocked by errors
    pub error_records: u64,

    /// Rows skipped as duplicates
    pub duplicate_records: u64,

    /// Detected delimiter
    pub csv_delimiter: Option<char>,

    /// Detected encoding name
    pub csv_encoding: Option<String>,

    /// Does the file carry a header row
    pub has_header: bool,

    /// CSV column -> canonical field mapping
    pub column_mapping: Option<serde_json::Value>,

    /// First rows of the file for mapping UIs
    pub preview_data: Option<serde_json::Value>,

    /// Final processing summary
    pub processing_summary: Option<serde_json::Value>,

    /// Batch-level error summary when the batch fails
    pub error_summary: Option<serde_json::Value>,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,

    /// Last update timestamp
    pub updated_at: DateTime<Utc>,

    /// When row processing started
    pub processing_started_at: Option<DateTime<Utc>>,

    /// When the batch reached a terminal state
    pub processing_completed_at: Option<DateTime<Utc>>,

    /// Actor that created the batch
    pub created_by: Option<Uuid>,
}

impl ImportBatch {
    /// Create a new pending batch for an uploaded file.
    pub fn new(
        tenant_id: Uuid,
        original_filename: impl Into<String>,
        storage_path: impl Into<String>,
        file_size: u64,
        file_hash: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        let original_filename = original_filename.into();
        Self {
            id: Uuid::new_v4(),
            tenant_id,
            filename: original_filename.clone(),
            original_filename,
            file_size,
            file_hash: file_hash.into(),
            mime_type: "text/csv".to_string(),
            storage_path: storage_path.into(),
            status: ImportBatchStatus::Pending,
            processing_stage: None,
            progress_percentage: 0,
            total_records: 0,
            processed_records: 0,
            successful_records: 0,
            error_records: 0,
            duplicate_records: 0,
            csv_delimiter: None,
            csv_encoding: None,
            has_header: true,
            column_mapping: None,
            preview_data: None,
            processing_summary: None,
            error_summary: None,
            created_at: now,
            updated_at: now,
            processing_started_at: None,
            processing_completed_at: None,
            created_by: None,
        }
    }

    /// Set the column mapping.
    pub fn with_column_mapping(mut self, mapping: serde_json::Value) -> Self {
        self.column_mapping = Some(mapping);
        self
    }

    /// Set the creating actor.
    pub fn with_created_by(mut self, user_id: Uuid) -> Self {
        self.created_by = Some(user_id);
        self
    }
}

/// A per-row import diagnostic.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportError {
    /// Error identifier
    pub id: Uuid,

    /// Owning tenant
    pub tenant_id: Uuid,

    /// Batch the row belongs to
    pub import_batch_id: Uuid,

    /// 1-based row number in the source file
    pub row_number: u64,

    /// Offending column name, if attributable
    pub column_name: Option<String>,

    /// Offending column index, if attributable
    pub column_index: Option<u32>,

    /// Kind of failure
    pub error_type: ImportErrorType,

    /// Stable machine code (e.g. DUPLICATE_IN_BATCH)
    pub error_code: String,

    /// Human-readable message
    pub error_message: String,

    /// Does the error block the row
    pub severity: ErrorSeverity,

    /// The raw offending value
    pub raw_value: Option<String>,

    /// What the value should have looked like
    pub expected_format: Option<String>,

    /// Suggested remediation
    pub suggested_fix: Option<String>,

    /// The full raw row for context
    pub raw_row_data: Option<serde_json::Value>,

    /// Has the row been resolved by a user
    pub is_resolved: bool,

    /// Resolution note
    pub resolution_note: Option<String>,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,
}

impl ImportError {
    /// Create a new unresolved import error.
    pub fn new(
        tenant_id: Uuid,
        import_batch_id: Uuid,
        row_number: u64,
        error_type: ImportErrorType,
        error_code: impl Into<String>,
        error_message: impl Into<String>,
        severity: ErrorSeverity,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            tenant_id,
            import_batch_id,
            row_number,
            column_name: None,
            column_index: None,
            error_type,
            error_code: error_code.into(),
            error_message: error_message.into(),
            severity,
            raw_value: None,
            expected_format: None,
            suggested_fix: None,
            raw_row_data: None,
            is_resolved: false,
            resolution_note: None,
            created_at: Utc::now(),
        }
    }

    /// Attribute the error to a column.
    pub fn with_column(mut self, name: impl Into<String>) -> Self {
        self.column_name = Some(name.into());
        self
    }

    /// Attach the raw offending value.
    pub fn with_raw_value(mut self, value: impl Into<String>) -> Self {
        self.raw_value = Some(value.into());
        self
    }

    /// Attach the expected format hint.
    pub fn with_expected_format(mut self, format: impl Into<String>) -> Self {
        self.expected_format = Some(format.into());
        self
    }

    /// Attach a suggested fix.
    pub fn with_suggested_fix(mut self, fix: impl Into<String>) -> Self {
        self.suggested_fix = Some(fix.into());
        self
    }

    /// Attach the raw row for context.
    pub fn with_raw_row(mut self, row: serde_json::Value) -> Self {
        self.raw_row_data = Some(row);
        self
    }
}
