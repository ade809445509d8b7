//! # invrecon-ingest
//!
//! The transactional CSV import pipeline: chunked upload reassembly,
//! metadata detection (encoding, delimiter, header, column mapping
//! suggestions), field normalization, a pluggable validation rule chain,
//! and the import service that stages vendors, invoices, and lines into a
//! single atomic commit with per-row savepoints, streamed progress, and
//! cooperative cancellation.

pub mod import;
pub mod metadata;
pub mod normalize;
pub mod upload;
pub mod validate;
pub mod vendor_code;

pub use import::*;
pub use metadata::*;
pub use normalize::*;
pub use upload::*;
pub use validate::*;
pub use vendor_code::*;

/// Maximum accepted file size in bytes (50 MB).
pub const MAX_FILE_SIZE: usize = 50 * 1024 * 1024;

/// Maximum number of lines accepted per file.
pub const MAX_LINE_COUNT: usize = 50_000;

/// Maximum bytes accepted per line.
pub const MAX_LINE_BYTES: usize = 100_000;
