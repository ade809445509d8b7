//! Row validation rule chain.
//!
//! Rules run in a fixed order per row: required fields, types, business
//! rules, vendor validation, duplicate detection. Each rule emits zero or
//! more [`ValidationError`]s; a row with at least one `Error`-severity
//! diagnostic is blocked from persistence, while warnings accompany a
//! persisted row.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use chrono::{Duration, NaiveDate, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Serialize;
use tracing::error;
use uuid::Uuid;

use invrecon_core::{ErrorSeverity, ImportErrorType, ReconResult, Storage};

/// A single validation diagnostic for a row.
#[derive(Debug, Clone, Serialize)]
pub struct ValidationError {
    pub error_type: ImportErrorType,
    pub code: String,
    pub message: String,
    pub field: Option<String>,
    pub raw_value: Option<String>,
    pub expected_format: Option<String>,
    pub suggested_fix: Option<String>,
    pub severity: ErrorSeverity,
}

impl ValidationError {
    fn new(
        error_type: ImportErrorType,
        code: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            error_type,
            code: code.into(),
            message: message.into(),
            field: None,
            raw_value: None,
            expected_format: None,
            suggested_fix: None,
            severity: ErrorSeverity::Error,
        }
    }

    fn warning(mut self) -> Self {
        self.severity = ErrorSeverity::Warning;
        self
    }

    fn on_field(mut self, field: &str) -> Self {
        self.field = Some(field.to_string());
        self
    }

    fn with_raw(mut self, raw: impl Into<String>) -> Self {
        self.raw_value = Some(raw.into());
        self
    }

    fn expecting(mut self, format: impl Into<String>) -> Self {
        self.expected_format = Some(format.into());
        self
    }

    fn suggesting(mut self, fix: impl Into<String>) -> Self {
        self.suggested_fix = Some(fix.into());
        self
    }
}

/// Typed values extracted from one CSV row.
#[derive(Debug, Clone, Default)]
pub struct NormalizedRow {
    pub invoice_number: Option<String>,
    pub vendor_name: Option<String>,
    pub total_amount: Option<Decimal>,
    pub subtotal: Option<Decimal>,
    pub tax_amount: Option<Decimal>,
    pub invoice_date: Option<NaiveDate>,
    pub due_date: Option<NaiveDate>,
    pub po_reference: Option<String>,
    pub description: Option<String>,
}

/// One row as seen by the validation chain: raw cells keyed by canonical
/// field, plus the typed values normalization produced.
#[derive(Debug, Clone, Default)]
pub struct RowData {
    pub raw: BTreeMap<String, String>,
    pub parsed: NormalizedRow,
}

impl RowData {
    fn raw_present(&self, field: &str) -> bool {
        self.raw.get(field).map_or(false, |v| !v.trim().is_empty())
    }

    fn raw_value(&self, field: &str) -> Option<String> {
        self.raw.get(field).map(|v| v.trim().to_string())
    }
}

/// Mutable per-row context threaded through the chain.
#[derive(Debug, Default)]
pub struct ValidationContext {
    pub row_number: u64,
    /// Vendor resolved by the vendor rule; the import service reuses it.
    pub matched_vendor_id: Option<Uuid>,
}

/// A validation rule. Rules may keep per-batch state (duplicate sets,
/// vendor caches), so they take `&mut self`.
pub trait ValidationRule: Send {
    /// Stable rule name for logs and summaries.
    fn name(&self) -> &'static str;

    fn validate(&mut self, row: &RowData, ctx: &mut ValidationContext) -> Vec<ValidationError>;
}

/// Required canonical fields must be present and parseable.
pub struct RequiredFieldsRule;

impl ValidationRule for RequiredFieldsRule {
    fn name(&self) -> &'static str {
        "required_fields"
    }

    fn validate(&mut self, row: &RowData, _ctx: &mut ValidationContext) -> Vec<ValidationError> {
        let mut errors = Vec::new();
        let checks: [(&str, bool); 4] = [
            ("invoice_number", row.parsed.invoice_number.is_some()),
            ("vendor_name", row.parsed.vendor_name.is_some()),
            ("total_amount", row.parsed.total_amount.is_some()),
            ("invoice_date", row.parsed.invoice_date.is_some()),
        ];

        for (field, present) in checks {
            // A raw value that failed to parse is a type error, not a
            // missing field.
            if !present && !row.raw_present(field) {
                errors.push(
                    ValidationError::new(
                        ImportErrorType::Validation,
                        format!("MISSING_{}", field.to_uppercase()),
                        format!("Required field '{}' is missing or empty", field),
                    )
                    .on_field(field),
                );
            }
        }
        errors
    }
}

/// Raw values that refused to parse into their declared type.
pub struct DataTypeRule;

impl ValidationRule for DataTypeRule {
    fn name(&self) -> &'static str {
        "data_types"
    }

    fn validate(&mut self, row: &RowData, _ctx: &mut ValidationContext) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        let decimal_fields: [(&str, bool); 3] = [
            ("total_amount", row.parsed.total_amount.is_some()),
            ("tax_amount", row.parsed.tax_amount.is_some()),
            ("subtotal", row.parsed.subtotal.is_some()),
        ];
        for (field, parsed) in decimal_fields {
            if row.raw_present(field) && !parsed {
                errors.push(
                    ValidationError::new(
                        ImportErrorType::Validation,
                        format!("INVALID_{}_TYPE", field.to_uppercase()),
                        format!("Field '{}' must be a decimal number", field),
                    )
                    .on_field(field)
                    .with_raw(row.raw_value(field).unwrap_or_default())
                    .expecting("Decimal number (e.g., 1234.56)"),
                );
            }
        }

        let date_fields: [(&str, bool); 2] = [
            ("invoice_date", row.parsed.invoice_date.is_some()),
            ("due_date", row.parsed.due_date.is_some()),
        ];
        for (field, parsed) in date_fields {
            if row.raw_present(field) && !parsed {
                errors.push(
                    ValidationError::new(
                        ImportErrorType::Validation,
                        format!("INVALID_{}_TYPE", field.to_uppercase()),
                        format!("Field '{}' must be a date", field),
                    )
                    .on_field(field)
                    .with_raw(row.raw_value(field).unwrap_or_default())
                    .expecting("Date (YYYY-MM-DD or MM/DD/YYYY)"),
                );
            }
        }

        errors
    }
}

/// Business constraints on amounts, dates, and their relationships.
pub struct BusinessRules {
    today: NaiveDate,
}

impl BusinessRules {
    pub fn new() -> Self {
        Self {
            today: Utc::now().date_naive(),
        }
    }

    fn amount_rules(&self, row: &RowData) -> Vec<ValidationError> {
        let mut errors = Vec::new();
        let Some(total) = row.parsed.total_amount else {
            return errors;
        };

        if total <= Decimal::ZERO {
            errors.push(
                ValidationError::new(
                    ImportErrorType::BusinessRule,
                    "NEGATIVE_AMOUNT",
                    "Invoice amount must be positive",
                )
                .on_field("total_amount")
                .with_raw(total.to_string())
                .suggesting("Ensure amount is a positive number"),
            );
        }

        if total > dec!(1000000.00) {
            errors.push(
                ValidationError::new(
                    ImportErrorType::BusinessRule,
                    "AMOUNT_TOO_LARGE",
                    "Invoice amount exceeds the $1,000,000.00 limit",
                )
                .on_field("total_amount")
                .with_raw(total.to_string())
                .warning(),
            );
        }

        if let Some(tax) = row.parsed.tax_amount {
            if tax < Decimal::ZERO {
                errors.push(
                    ValidationError::new(
                        ImportErrorType::BusinessRule,
                        "NEGATIVE_TAX",
                        "Tax amount cannot be negative",
                    )
                    .on_field("tax_amount")
                    .with_raw(tax.to_string()),
                );
            }
            if tax > total {
                errors.push(
                    ValidationError::new(
                        ImportErrorType::BusinessRule,
                        "TAX_EXCEEDS_TOTAL",
                        "Tax amount cannot exceed total amount",
                    )
                    .on_field("tax_amount")
                    .with_raw(tax.to_string())
                    .suggesting("Verify tax and total amounts are correct"),
                );
            }
            if total > Decimal::ZERO && tax / total > dec!(0.5) {
                errors.push(
                    ValidationError::new(
                        ImportErrorType::BusinessRule,
                        "HIGH_TAX_RATE",
                        format!("Tax rate appears high ({})", (tax / total).round_dp(3)),
                    )
                    .on_field("tax_amount")
                    .with_raw(tax.to_string())
                    .warning(),
                );
            }
        }

        errors
    }

    fn date_rules(&self, row: &RowData) -> Vec<ValidationError> {
        let mut errors = Vec::new();
        let Some(invoice_date) = row.parsed.invoice_date else {
            return errors;
        };

        if invoice_date < self.today - Duration::days(1095) {
            errors.push(
                ValidationError::new(
                    ImportErrorType::BusinessRule,
                    "DATE_TOO_OLD",
                    "Invoice date is more than 3 years old",
                )
                .on_field("invoice_date")
                .with_raw(invoice_date.to_string())
                .warning(),
            );
        }

        if invoice_date > self.today {
            errors.push(
                ValidationError::new(
                    ImportErrorType::BusinessRule,
                    "FUTURE_DATE",
                    "Invoice date cannot be in the future",
                )
                .on_field("invoice_date")
                .with_raw(invoice_date.to_string())
                .warning(),
            );
        }

        if let Some(due_date) = row.parsed.due_date {
            if due_date < invoice_date {
                errors.push(
                    ValidationError::new(
                        ImportErrorType::BusinessRule,
                        "DUE_BEFORE_INVOICE",
                        "Due date cannot be before invoice date",
                    )
                    .on_field("due_date")
                    .with_raw(due_date.to_string())
                    .suggesting("Ensure due date is after invoice date"),
                );
            } else if (due_date - invoice_date).num_days() > 365 {
                errors.push(
                    ValidationError::new(
                        ImportErrorType::BusinessRule,
                        "LONG_PAYMENT_TERMS",
                        format!(
                            "Payment terms are unusually long ({} days)",
                            (due_date - invoice_date).num_days()
                        ),
                    )
                    .on_field("due_date")
                    .with_raw(due_date.to_string())
                    .warning(),
                );
            }
        }

        errors
    }

    fn cross_field_rules(&self, row: &RowData) -> Vec<ValidationError> {
        let mut errors = Vec::new();
        if let (Some(total), Some(tax), Some(subtotal)) = (
            row.parsed.total_amount,
            row.parsed.tax_amount,
            row.parsed.subtotal,
        ) {
            let expected = subtotal + tax;
            if (total - expected).abs() > dec!(0.02) {
                errors.push(
                    ValidationError::new(
                        ImportErrorType::BusinessRule,
                        "AMOUNT_CALCULATION_ERROR",
                        format!(
                            "Total amount ({}) doesn't match subtotal + tax ({})",
                            total, expected
                        ),
                    )
                    .on_field("total_amount")
                    .with_raw(total.to_string())
                    .suggesting("Verify subtotal, tax, and total amounts are correct"),
                );
            }
        }
        errors
    }
}

impl Default for BusinessRules {
    fn default() -> Self {
        Self::new()
    }
}

impl ValidationRule for BusinessRules {
    fn name(&self) -> &'static str {
        "business_rules"
    }

    fn validate(&mut self, row: &RowData, _ctx: &mut ValidationContext) -> Vec<ValidationError> {
        let mut errors = self.amount_rules(row);
        errors.extend(self.date_rules(row));
        errors.extend(self.cross_field_rules(row));
        errors
    }
}

/// Vendor name format checking and exact match against the tenant's
/// vendor master.
pub struct VendorValidationRule {
    storage: Arc<dyn Storage>,
    tenant_id: Uuid,
    cache: HashMap<String, Option<Uuid>>,
}

impl VendorValidationRule {
    pub fn new(storage: Arc<dyn Storage>, tenant_id: Uuid) -> Self {
        Self {
            storage,
            tenant_id,
            cache: HashMap::new(),
        }
    }

    fn is_valid_name(name: &str) -> bool {
        name.len() >= 2
            && name.chars().any(|c| c.is_alphabetic())
            && !name.chars().all(|c| c.is_ascii_digit())
    }

    fn find_match(&mut self, name: &str) -> Option<Uuid> {
        let key = name.to_uppercase();
        if let Some(cached) = self.cache.get(&key) {
            return *cached;
        }
        let found = match self.storage.vendor_by_name_ci(self.tenant_id, name) {
            Ok(vendor) => vendor.map(|v| v.id),
            Err(err) => {
                error!(%err, "vendor lookup failed during validation");
                None
            }
        };
        self.cache.insert(key, found);
        found
    }
}

impl ValidationRule for VendorValidationRule {
    fn name(&self) -> &'static str {
        "vendor_validation"
    }

    fn validate(&mut self, row: &RowData, ctx: &mut ValidationContext) -> Vec<ValidationError> {
        let mut errors = Vec::new();
        let Some(vendor_name) = row.parsed.vendor_name.as_deref() else {
            return errors;
        };

        if !Self::is_valid_name(vendor_name) {
            errors.push(
                ValidationError::new(
                    ImportErrorType::Validation,
                    "INVALID_VENDOR_FORMAT",
                    "Vendor name contains invalid characters or format",
                )
                .on_field("vendor_name")
                .with_raw(vendor_name)
                .expecting("Alphanumeric characters, spaces, and common punctuation"),
            );
            return errors;
        }

        match self.find_match(vendor_name) {
            Some(vendor_id) => ctx.matched_vendor_id = Some(vendor_id),
            None => errors.push(
                ValidationError::new(
                    ImportErrorType::Validation,
                    "NEW_VENDOR",
                    format!("Vendor '{}' not found in system - will be created", vendor_name),
                )
                .on_field("vendor_name")
                .with_raw(vendor_name)
                .warning(),
            ),
        }

        errors
    }
}

/// Duplicate detection within the batch and against stored invoices.
pub struct DuplicateDetectionRule {
    storage: Arc<dyn Storage>,
    tenant_id: Uuid,
    batch_seen: HashSet<(String, String)>,
}

impl DuplicateDetectionRule {
    pub fn new(storage: Arc<dyn Storage>, tenant_id: Uuid) -> Self {
        Self {
            storage,
            tenant_id,
            batch_seen: HashSet::new(),
        }
    }
}

impl ValidationRule for DuplicateDetectionRule {
    fn name(&self) -> &'static str {
        "duplicate_detection"
    }

    fn validate(&mut self, row: &RowData, ctx: &mut ValidationContext) -> Vec<ValidationError> {
        let mut errors = Vec::new();
        let (Some(vendor_name), Some(invoice_number)) = (
            row.parsed.vendor_name.as_deref(),
            row.parsed.invoice_number.as_deref(),
        ) else {
            return errors;
        };

        let key = (vendor_name.to_uppercase(), invoice_number.to_string());
        if !self.batch_seen.insert(key) {
            errors.push(
                ValidationError::new(
                    ImportErrorType::Duplicate,
                    "DUPLICATE_IN_BATCH",
                    format!(
                        "Duplicate invoice found in batch: {} - {}",
                        vendor_name, invoice_number
                    ),
                )
                .on_field("invoice_number")
                .with_raw(invoice_number)
                .suggesting("Remove duplicate entry or verify invoice details"),
            );
            return errors;
        }

        if let Some(vendor_id) = ctx.matched_vendor_id {
            match self
                .storage
                .invoice_exists(self.tenant_id, vendor_id, invoice_number)
            {
                Ok(true) => errors.push(
                    ValidationError::new(
                        ImportErrorType::Duplicate,
                        "DUPLICATE_IN_SYSTEM",
                        format!(
                            "Invoice already exists in system: {} - {}",
                            vendor_name, invoice_number
                        ),
                    )
                    .on_field("invoice_number")
                    .with_raw(invoice_number)
                    .suggesting("Verify this is a new invoice or update existing record"),
                ),
                Ok(false) => {}
                Err(err) => {
                    // A storage hiccup must not fail validation of the row.
                    error!(%err, "duplicate check failed");
                }
            }
        }

        errors
    }
}

/// Running statistics for one batch's validation.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ValidationStats {
    pub total_rows: u64,
    pub valid_rows: u64,
    pub rows_with_errors: u64,
    pub rows_with_warnings: u64,
    pub total_errors: u64,
    pub total_warnings: u64,
    pub error_breakdown: BTreeMap<String, u64>,
    pub warning_breakdown: BTreeMap<String, u64>,
}

/// The validation engine: the fixed rule chain plus batch statistics.
pub struct ValidationEngine {
    rules: Vec<Box<dyn ValidationRule>>,
    stats: ValidationStats,
}

impl ValidationEngine {
    /// Build the standard chain for one tenant and batch.
    pub fn new(storage: Arc<dyn Storage>, tenant_id: Uuid) -> Self {
        Self {
            rules: vec![
                Box::new(RequiredFieldsRule),
                Box::new(DataTypeRule),
                Box::new(BusinessRules::new()),
                Box::new(VendorValidationRule::new(Arc::clone(&storage), tenant_id)),
                Box::new(DuplicateDetectionRule::new(storage, tenant_id)),
            ],
            stats: ValidationStats::default(),
        }
    }

    /// Validate one row through the whole chain.
    pub fn validate_row(
        &mut self,
        row: &RowData,
        row_number: u64,
    ) -> (ValidationContext, Vec<ValidationError>) {
        let mut ctx = ValidationContext {
            row_number,
            ..ValidationContext::default()
        };

        let mut all_errors = Vec::new();
        for rule in &mut self.rules {
            all_errors.extend(rule.validate(row, &mut ctx));
        }

        self.record(&all_errors);
        (ctx, all_errors)
    }

    fn record(&mut self, errors: &[ValidationError]) {
        self.stats.total_rows += 1;

        let error_count = errors
            .iter()
            .filter(|e| e.severity == ErrorSeverity::Error)
            .count() as u64;
        let warning_count = errors
            .iter()
            .filter(|e| e.severity == ErrorSeverity::Warning)
            .count() as u64;

        if error_count > 0 {
            self.stats.rows_with_errors += 1;
        } else if warning_count > 0 {
            self.stats.rows_with_warnings += 1;
        } else {
            self.stats.valid_rows += 1;
        }
        self.stats.total_errors += error_count;
        self.stats.total_warnings += warning_count;

        for error in errors {
            let breakdown = match error.severity {
                ErrorSeverity::Error => &mut self.stats.error_breakdown,
                ErrorSeverity::Warning => &mut self.stats.warning_breakdown,
            };
            *breakdown.entry(error.code.clone()).or_insert(0) += 1;
        }
    }

    /// Statistics accumulated so far.
    pub fn stats(&self) -> &ValidationStats {
        &self.stats
    }

    /// Summary for the batch's `processing_summary`.
    pub fn summary(&self) -> ReconResult<serde_json::Value> {
        Ok(serde_json::to_value(&self.stats)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use invrecon_core::{MemoryStorage, Vendor};
    use rust_decimal_macros::dec;

    fn storage_with_vendor(tenant: Uuid, name: &str) -> Arc<dyn Storage> {
        let storage: Arc<dyn Storage> = Arc::new(MemoryStorage::new());
        let vendor = Vendor::new(tenant, "V00001", name);
        storage
            .transaction(tenant, &mut |txn| txn.insert_vendor(vendor.clone()))
            .unwrap();
        storage
    }

    fn good_row() -> RowData {
        let mut raw = BTreeMap::new();
        raw.insert("invoice_number".to_string(), "INV-1".to_string());
        raw.insert("vendor_name".to_string(), "ACME".to_string());
        raw.insert("total_amount".to_string(), "150.00".to_string());
        raw.insert("invoice_date".to_string(), "2025-01-15".to_string());
        RowData {
            raw,
            parsed: NormalizedRow {
                invoice_number: Some("INV-1".to_string()),
                vendor_name: Some("ACME".to_string()),
                total_amount: Some(dec!(150.00)),
                invoice_date: Some(NaiveDate::from_ymd_opt(2025, 1, 15).unwrap()),
                ..NormalizedRow::default()
            },
        }
    }

    #[test]
    fn test_clean_row_passes_with_new_vendor_warning() {
        let tenant = Uuid::new_v4();
        let storage: Arc<dyn Storage> = Arc::new(MemoryStorage::new());
        let mut engine = ValidationEngine::new(storage, tenant);

        let (_, errors) = engine.validate_row(&good_row(), 1);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].code, "NEW_VENDOR");
        assert_eq!(errors[0].severity, ErrorSeverity::Warning);
    }

    #[test]
    fn test_known_vendor_attaches_id() {
        let tenant = Uuid::new_v4();
        let storage = storage_with_vendor(tenant, "ACME");
        let mut engine = ValidationEngine::new(storage, tenant);

        let (ctx, errors) = engine.validate_row(&good_row(), 1);
        assert!(ctx.matched_vendor_id.is_some());
        assert!(errors.is_empty());
    }

    #[test]
    fn test_missing_required_fields() {
        let tenant = Uuid::new_v4();
        let storage: Arc<dyn Storage> = Arc::new(MemoryStorage::new());
        let mut engine = ValidationEngine::new(storage, tenant);

        let (_, errors) = engine.validate_row(&RowData::default(), 1);
        let codes: Vec<&str> = errors.iter().map(|e| e.code.as_str()).collect();
        assert!(codes.contains(&"MISSING_INVOICE_NUMBER"));
        assert!(codes.contains(&"MISSING_VENDOR_NAME"));
        assert!(codes.contains(&"MISSING_TOTAL_AMOUNT"));
        assert!(codes.contains(&"MISSING_INVOICE_DATE"));
    }

    #[test]
    fn test_unparseable_amount_is_type_error_not_missing() {
        let tenant = Uuid::new_v4();
        let storage: Arc<dyn Storage> = Arc::new(MemoryStorage::new());
        let mut engine = ValidationEngine::new(storage, tenant);

        let mut row = good_row();
        row.raw
            .insert("total_amount".to_string(), "not-a-number".to_string());
        row.parsed.total_amount = None;

        let (_, errors) = engine.validate_row(&row, 1);
        let codes: Vec<&str> = errors.iter().map(|e| e.code.as_str()).collect();
        assert!(codes.contains(&"INVALID_TOTAL_AMOUNT_TYPE"));
        assert!(!codes.contains(&"MISSING_TOTAL_AMOUNT"));
    }

    #[test]
    fn test_business_rules() {
        let tenant = Uuid::new_v4();
        let storage = storage_with_vendor(tenant, "ACME");
        let mut engine = ValidationEngine::new(storage, tenant);

        let mut row = good_row();
        row.parsed.tax_amount = Some(dec!(200.00)); // exceeds total
        row.parsed.subtotal = Some(dec!(100.00));

        let (_, errors) = engine.validate_row(&row, 1);
        let codes: Vec<&str> = errors.iter().map(|e| e.code.as_str()).collect();
        assert!(codes.contains(&"TAX_EXCEEDS_TOTAL"));
        assert!(codes.contains(&"AMOUNT_CALCULATION_ERROR"));
    }

    #[test]
    fn test_cross_field_tolerates_rounding() {
        let tenant = Uuid::new_v4();
        let storage = storage_with_vendor(tenant, "ACME");
        let mut engine = ValidationEngine::new(storage, tenant);

        let mut row = good_row();
        row.parsed.subtotal = Some(dec!(140.00));
        row.parsed.tax_amount = Some(dec!(9.99)); // off by a cent

        let (_, errors) = engine.validate_row(&row, 1);
        assert!(!errors.iter().any(|e| e.code == "AMOUNT_CALCULATION_ERROR"));
    }

    #[test]
    fn test_duplicate_in_batch() {
        let tenant = Uuid::new_v4();
        let storage = storage_with_vendor(tenant, "ACME");
        let mut engine = ValidationEngine::new(storage, tenant);

        let (_, first) = engine.validate_row(&good_row(), 1);
        assert!(first.is_empty());

        let (_, second) = engine.validate_row(&good_row(), 2);
        assert!(second.iter().any(|e| e.code == "DUPLICATE_IN_BATCH"
            && e.error_type == ImportErrorType::Duplicate));
    }

    #[test]
    fn test_duplicate_in_system() {
        use invrecon_core::Invoice;

        let tenant = Uuid::new_v4();
        let storage = storage_with_vendor(tenant, "ACME");
        let vendor = storage.vendor_by_name_ci(tenant, "ACME").unwrap().unwrap();
        let invoice = Invoice::new(
            tenant,
            vendor.id,
            "INV-1",
            dec!(1.00),
            NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(),
        );
        storage
            .transaction(tenant, &mut |txn| txn.insert_invoice(invoice.clone()))
            .unwrap();

        let mut engine = ValidationEngine::new(storage, tenant);
        let (_, errors) = engine.validate_row(&good_row(), 1);
        assert!(errors.iter().any(|e| e.code == "DUPLICATE_IN_SYSTEM"));
    }

    #[test]
    fn test_vendor_format_rejected_for_digits_only() {
        let tenant = Uuid::new_v4();
        let storage: Arc<dyn Storage> = Arc::new(MemoryStorage::new());
        let mut engine = ValidationEngine::new(storage, tenant);

        let mut row = good_row();
        row.parsed.vendor_name = Some("12345".to_string());

        let (_, errors) = engine.validate_row(&row, 1);
        assert!(errors.iter().any(|e| e.code == "INVALID_VENDOR_FORMAT"));
    }

    #[test]
    fn test_stats_accumulate() {
        let tenant = Uuid::new_v4();
        let storage = storage_with_vendor(tenant, "ACME");
        let mut engine = ValidationEngine::new(storage, tenant);

        engine.validate_row(&good_row(), 1);
        engine.validate_row(&RowData::default(), 2);

        let stats = engine.stats();
        assert_eq!(stats.total_rows, 2);
        assert_eq!(stats.valid_rows, 1);
        assert_eq!(stats.rows_with_errors, 1);
        assert!(stats.error_breakdown.contains_key("MISSING_INVOICE_NUMBER"));
    }
}
