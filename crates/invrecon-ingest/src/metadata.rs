//! CSV metadata detection.
//!
//! Runs right after upload: sniff the encoding, delimiter, and header row,
//! guess column types, suggest a column mapping, and build a preview for
//! the mapping UI. The result is cached per batch for an hour so the
//! frontend can render without re-reading the file.

use std::collections::BTreeMap;
use std::time::Duration;

use encoding_rs::{Encoding, UTF_8, WINDOWS_1252};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use uuid::Uuid;

use invrecon_core::{Cache, ReconError, ReconResult};

use crate::{MAX_FILE_SIZE, MAX_LINE_BYTES, MAX_LINE_COUNT};

/// Delimiters the sniffer considers.
pub const CANDIDATE_DELIMITERS: [char; 4] = [',', '\t', '|', ';'];

/// Rows included in the preview payload.
pub const PREVIEW_ROWS: usize = 10;

/// Lines inspected for delimiter detection.
const SNIFF_LINES: usize = 10;

/// Rows inspected for column analysis.
const ANALYZE_ROWS: usize = 100;

/// TTL for cached metadata.
const METADATA_TTL: Duration = Duration::from_secs(3600);

/// Header keywords; two or more hits in the first row imply a header.
const HEADER_KEYWORDS: [&str; 7] = ["invoice", "vendor", "amount", "date", "number", "total", "tax"];

/// Canonical fields a column can map to, with the header keywords that
/// suggest each.
const MAPPING_RULES: &[(&str, &[&str])] = &[
    ("invoice_number", &["invoice_number", "invoice_no", "inv_no", "invoice", "number"]),
    ("vendor", &["vendor_name", "supplier_name", "vendor", "supplier", "company"]),
    ("amount", &["total_amount", "invoice_amount", "amount", "total", "sum"]),
    ("invoice_date", &["invoice_date", "inv_date", "bill_date", "date"]),
    ("po_reference", &["po_number", "purchase_order", "po_ref", "po"]),
    ("description", &["description", "desc", "note", "memo"]),
    ("tax_amount", &["tax_amount", "tax", "vat", "gst"]),
    ("due_date", &["due_date", "payment_due", "due"]),
];

/// Guessed content type of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnType {
    Numeric,
    Date,
    Text,
    Unknown,
}

/// Per-column analysis result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnAnalysis {
    /// Guessed content type
    pub column_type: ColumnType,
    /// Non-empty cells seen
    pub non_empty_count: usize,
    /// First non-empty sample values
    pub sample_values: Vec<String>,
    /// Suggested canonical field, if the header implies one
    pub suggested_mapping: Option<String>,
}

/// Everything detection learned about an uploaded CSV.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CsvMetadata {
    /// Detected encoding name
    pub encoding: String,
    /// Detected delimiter
    pub delimiter: char,
    /// Whether the first row is a header
    pub has_header: bool,
    /// Column names (synthesized as column_N without a header)
    pub headers: Vec<String>,
    /// Number of columns
    pub column_count: usize,
    /// Estimated data rows
    pub estimated_rows: usize,
    /// First rows for the mapping UI
    pub preview_data: Vec<BTreeMap<String, String>>,
    /// Per-column analysis keyed by header
    pub column_analysis: BTreeMap<String, ColumnAnalysis>,
    /// File size in bytes
    pub file_size: usize,
}

/// Detect the text encoding of raw file content.
///
/// A byte-order mark decides immediately. Otherwise the candidate set
/// {utf-8, utf-16, ascii, iso-8859-1, windows-1252} is probed in order and
/// the first clean decode wins; windows-1252 accepts any byte sequence and
/// is the terminal fallback.
pub fn detect_encoding(content: &[u8]) -> (&'static Encoding, String) {
    if let Some((encoding, _)) = Encoding::for_bom(content) {
        debug!(encoding = encoding.name(), "encoding detected from BOM");
        return (encoding, encoding.name().to_lowercase());
    }

    let sample = &content[..content.len().min(10_000)];
    let (_, had_errors) = UTF_8.decode_without_bom_handling(sample);
    if !had_errors {
        let name = if sample.iter().all(|b| b.is_ascii()) {
            "ascii"
        } else {
            "utf-8"
        };
        return (UTF_8, name.to_string());
    }

    warn!("content is not valid UTF-8, falling back to windows-1252");
    (WINDOWS_1252, "windows-1252".to_string())
}

/// Decode raw content with the detected encoding, replacing malformed
/// sequences.
pub fn decode_content(content: &[u8]) -> (String, String) {
    let (encoding, name) = detect_encoding(content);
    let (text, _, _) = encoding.decode(content);
    (text.into_owned(), name)
}

/// Detect the delimiter from sample text.
///
/// A candidate that appears a consistent non-zero number of times on every
/// sampled line wins; otherwise the candidate with the highest total count
/// in the first ten non-empty lines is used.
pub fn detect_delimiter(sample: &str) -> char {
    let lines: Vec<&str> = sample
        .lines()
        .filter(|l| !l.trim().is_empty())
        .take(SNIFF_LINES)
        .collect();
    if lines.is_empty() {
        return ',';
    }

    let mut best = (',', 0usize, false);
    for candidate in CANDIDATE_DELIMITERS {
        let counts: Vec<usize> = lines
            .iter()
            .map(|l| l.matches(candidate).count())
            .collect();
        let total: usize = counts.iter().sum();
        let consistent = counts[0] > 0 && counts.iter().all(|&c| c == counts[0]);

        let better = match (consistent, best.2) {
            (true, false) => true,
            (false, true) => false,
            _ => total > best.1,
        };
        if better && total > 0 {
            best = (candidate, total, consistent);
        }
    }

    debug!(delimiter = %best.0, "delimiter detected");
    best.0
}

/// Decide whether the first row is a header.
///
/// True when the first row is mostly non-numeric while the second row is
/// substantially numeric, or when the first row contains two or more known
/// header keywords.
pub fn detect_has_header(lines: &[&str], delimiter: char) -> bool {
    if lines.len() < 2 {
        return true;
    }

    let first: Vec<&str> = lines[0].split(delimiter).collect();
    let second: Vec<&str> = lines[1].split(delimiter).collect();

    if !first.is_empty() && !second.is_empty() {
        let first_numeric = first.iter().filter(|c| is_numeric_cell(c.trim())).count();
        let second_numeric = second.iter().filter(|c| is_numeric_cell(c.trim())).count();

        if (first_numeric as f64) / (first.len() as f64) < 0.5
            && (second_numeric as f64) / (second.len() as f64) >= 0.3
        {
            return true;
        }
    }

    let first_row_text = lines[0].to_lowercase();
    let keyword_hits = HEADER_KEYWORDS
        .iter()
        .filter(|k| first_row_text.contains(*k))
        .count();
    keyword_hits >= 2
}

/// Whether a cell reads as a number once currency markers and grouping are
/// stripped.
pub fn is_numeric_cell(value: &str) -> bool {
    let cleaned: String = value
        .chars()
        .filter(|c| !matches!(c, '$' | '\u{20ac}' | '\u{a3}' | '\u{a5}' | '\u{20b9}' | ',' | ' '))
        .collect();
    !cleaned.is_empty() && cleaned.parse::<f64>().is_ok()
}

fn looks_like_date(value: &str) -> bool {
    crate::normalize::normalize_date(value).is_some()
}

/// Suggest the canonical field a header maps to, by keyword. The longest
/// matching keyword wins, so "invoice_date" resolves to the date field and
/// not to the bare "invoice" keyword.
pub fn suggest_column_mapping(header: &str) -> Option<String> {
    let header_lower = header.trim().to_lowercase();
    let mut best: Option<(&str, usize)> = None;
    for (field, keywords) in MAPPING_RULES {
        for keyword in *keywords {
            if header_lower.contains(keyword)
                && best.map_or(true, |(_, len)| keyword.len() > len)
            {
                best = Some((field, keyword.len()));
            }
        }
    }
    best.map(|(field, _)| field.to_string())
}

fn detect_column_type(values: &[String]) -> ColumnType {
    if values.is_empty() {
        return ColumnType::Unknown;
    }
    let checked = values.len().min(20);
    let numeric = values[..checked]
        .iter()
        .filter(|v| is_numeric_cell(v))
        .count();
    let dates = values[..checked]
        .iter()
        .filter(|v| !is_numeric_cell(v) && looks_like_date(v))
        .count();

    if numeric as f64 / checked as f64 > 0.8 {
        ColumnType::Numeric
    } else if dates as f64 / checked as f64 > 0.6 {
        ColumnType::Date
    } else {
        ColumnType::Text
    }
}

/// Parse raw file content into full metadata: encoding, delimiter, header,
/// column analysis, and preview rows.
pub fn parse_metadata(content: &[u8]) -> ReconResult<CsvMetadata> {
    if content.len() > MAX_FILE_SIZE {
        return Err(ReconError::validation(format!(
            "file size {} exceeds the {} byte limit",
            content.len(),
            MAX_FILE_SIZE
        )));
    }

    let (text, encoding) = decode_content(content);

    let all_lines: Vec<&str> = text.lines().collect();
    if all_lines.len() > MAX_LINE_COUNT {
        return Err(ReconError::validation(format!(
            "file has {} lines, limit is {}",
            all_lines.len(),
            MAX_LINE_COUNT
        )));
    }
    if let Some(line) = all_lines.iter().find(|l| l.len() > MAX_LINE_BYTES) {
        return Err(ReconError::validation(format!(
            "line exceeds {} bytes ({} bytes)",
            MAX_LINE_BYTES,
            line.len()
        )));
    }

    let non_empty: Vec<&str> = all_lines
        .iter()
        .copied()
        .filter(|l| !l.trim().is_empty())
        .collect();
    if non_empty.is_empty() {
        return Err(ReconError::validation("file appears to be empty"));
    }

    let sample = non_empty
        .iter()
        .take(SNIFF_LINES)
        .copied()
        .collect::<Vec<_>>()
        .join("\n");
    let delimiter = detect_delimiter(&sample);
    let has_header = detect_has_header(&non_empty, delimiter);

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter as u8)
        .has_headers(false)
        .flexible(true)
        .from_reader(text.as_bytes());

    let mut rows: Vec<Vec<String>> = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| ReconError::validation(format!("CSV parse error: {}", e)))?;
        let row: Vec<String> = record.iter().map(|c| c.to_string()).collect();
        if row.iter().any(|c| !c.trim().is_empty()) {
            rows.push(row);
        }
        if rows.len() > ANALYZE_ROWS + 1 {
            break;
        }
    }
    if rows.is_empty() {
        return Err(ReconError::validation("no data rows found in file"));
    }

    let (headers, data_rows): (Vec<String>, &[Vec<String>]) = if has_header {
        (
            rows[0].iter().map(|h| h.trim().to_string()).collect(),
            &rows[1..],
        )
    } else {
        (
            (1..=rows[0].len()).map(|i| format!("column_{}", i)).collect(),
            &rows[..],
        )
    };
    if headers.is_empty() {
        return Err(ReconError::validation("no columns detected in CSV file"));
    }

    let estimated_rows = non_empty.len().saturating_sub(usize::from(has_header));

    // Preview rows keyed by header, padded to the header width.
    let preview_data: Vec<BTreeMap<String, String>> = data_rows
        .iter()
        .take(PREVIEW_ROWS)
        .map(|row| {
            headers
                .iter()
                .enumerate()
                .map(|(i, h)| (h.clone(), row.get(i).cloned().unwrap_or_default()))
                .collect()
        })
        .collect();

    let mut column_analysis = BTreeMap::new();
    for (i, header) in headers.iter().enumerate() {
        let values: Vec<String> = data_rows
            .iter()
            .take(ANALYZE_ROWS)
            .filter_map(|row| row.get(i))
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty())
            .collect();

        column_analysis.insert(
            header.clone(),
            ColumnAnalysis {
                column_type: detect_column_type(&values),
                non_empty_count: values.len(),
                sample_values: values.iter().take(5).cloned().collect(),
                suggested_mapping: if has_header {
                    suggest_column_mapping(header)
                } else {
                    None
                },
            },
        );
    }

    Ok(CsvMetadata {
        encoding,
        delimiter,
        has_header,
        column_count: headers.len(),
        headers,
        estimated_rows,
        preview_data,
        column_analysis,
        file_size: content.len(),
    })
}

/// Cache key for a batch's metadata preview.
pub fn metadata_key(batch_id: Uuid) -> String {
    format!("import_metadata:{}", batch_id)
}

/// Cache parsed metadata for a batch (1 hour TTL).
pub fn cache_metadata(
    cache: &dyn Cache,
    batch_id: Uuid,
    metadata: &CsvMetadata,
) -> ReconResult<()> {
    cache.set(
        &metadata_key(batch_id),
        serde_json::to_value(metadata)?,
        METADATA_TTL,
    )
}

/// Fetch previously cached metadata for a batch.
pub fn cached_metadata(cache: &dyn Cache, batch_id: Uuid) -> ReconResult<Option<CsvMetadata>> {
    match cache.get(&metadata_key(batch_id))? {
        Some(value) => Ok(Some(serde_json::from_value(value)?)),
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use invrecon_core::MemoryCache;

    const SAMPLE: &str = "invoice_number,vendor_name,total_amount,invoice_date\n\
        INV001,ACME Corporation,150.00,2023-01-15\n\
        INV002,Beta Industries,75.50,2023-01-16\n";

    #[test]
    fn test_detect_delimiter_comma() {
        assert_eq!(detect_delimiter(SAMPLE), ',');
    }

    #[test]
    fn test_detect_delimiter_pipe() {
        let sample = "a|b|c\n1|2|3\n4|5|6";
        assert_eq!(detect_delimiter(sample), '|');
    }

    #[test]
    fn test_detect_header_by_numeric_shape() {
        let lines: Vec<&str> = SAMPLE.lines().collect();
        assert!(detect_has_header(&lines, ','));
    }

    #[test]
    fn test_detect_no_header() {
        let lines = vec!["INV001,ACME,150.00,2023-01-15", "INV002,Beta,75.50,2023-01-16"];
        assert!(!detect_has_header(&lines, ','));
    }

    #[test]
    fn test_detect_header_by_keywords() {
        let lines = vec!["invoice,vendor,amount,date", "x,y,z,w"];
        assert!(detect_has_header(&lines, ','));
    }

    #[test]
    fn test_encoding_utf8_and_ascii() {
        let (_, name) = detect_encoding(b"plain ascii");
        assert_eq!(name, "ascii");
        let (_, name) = detect_encoding("caf\u{e9}".as_bytes());
        assert_eq!(name, "utf-8");
    }

    #[test]
    fn test_encoding_bom_wins() {
        let mut content = vec![0xFF, 0xFE]; // UTF-16LE BOM
        content.extend("a\0b\0".as_bytes());
        let (encoding, _) = detect_encoding(&content);
        assert_eq!(encoding.name(), "UTF-16LE");
    }

    #[test]
    fn test_encoding_latin1_fallback() {
        // 0xE9 alone is invalid UTF-8.
        let (_, name) = detect_encoding(&[b'c', b'a', b'f', 0xE9]);
        assert_eq!(name, "windows-1252");
    }

    #[test]
    fn test_parse_metadata_full() {
        let metadata = parse_metadata(SAMPLE.as_bytes()).unwrap();

        assert_eq!(metadata.delimiter, ',');
        assert!(metadata.has_header);
        assert_eq!(metadata.column_count, 4);
        assert_eq!(metadata.estimated_rows, 2);
        assert_eq!(metadata.preview_data.len(), 2);

        let amount = &metadata.column_analysis["total_amount"];
        assert_eq!(amount.column_type, ColumnType::Numeric);
        assert_eq!(amount.suggested_mapping.as_deref(), Some("amount"));

        let date = &metadata.column_analysis["invoice_date"];
        assert_eq!(date.column_type, ColumnType::Date);
        assert_eq!(date.suggested_mapping.as_deref(), Some("invoice_date"));

        let vendor = &metadata.column_analysis["vendor_name"];
        assert_eq!(vendor.suggested_mapping.as_deref(), Some("vendor"));
    }

    #[test]
    fn test_parse_metadata_rejects_empty() {
        assert!(parse_metadata(b"\n\n\n").is_err());
    }

    #[test]
    fn test_metadata_cache_roundtrip() {
        let cache = MemoryCache::new();
        let batch = Uuid::new_v4();
        let metadata = parse_metadata(SAMPLE.as_bytes()).unwrap();

        cache_metadata(&cache, batch, &metadata).unwrap();
        let cached = cached_metadata(&cache, batch).unwrap().unwrap();
        assert_eq!(cached.column_count, 4);
        assert_eq!(cached.encoding, metadata.encoding);
    }
}
