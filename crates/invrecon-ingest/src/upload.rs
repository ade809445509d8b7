//! Chunked upload reassembly.
//!
//! Large files arrive as numbered chunks written to a per-upload staging
//! directory. Once every chunk is present they are concatenated in order
//! and the declared content hash is verified before the file enters
//! metadata detection.

use std::collections::BTreeSet;
use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use tracing::{debug, info};

use invrecon_core::{ReconError, ReconResult};

/// A chunked upload in progress.
pub struct ChunkedUpload {
    staging_dir: PathBuf,
    total_chunks: u32,
    declared_sha256: String,
    received: BTreeSet<u32>,
}

impl ChunkedUpload {
    /// Start (or resume) a chunked upload in a staging directory.
    pub fn new(
        staging_dir: impl Into<PathBuf>,
        total_chunks: u32,
        declared_sha256: impl Into<String>,
    ) -> ReconResult<Self> {
        if total_chunks == 0 {
            return Err(ReconError::validation("total_chunks must be positive"));
        }
        let staging_dir = staging_dir.into();
        fs::create_dir_all(&staging_dir)?;

        // Resume: pick up chunks already on disk.
        let mut received = BTreeSet::new();
        for entry in fs::read_dir(&staging_dir)? {
            let entry = entry?;
            if let Some(index) = chunk_index(&entry.path()) {
                if index < total_chunks {
                    received.insert(index);
                }
            }
        }

        Ok(Self {
            staging_dir,
            total_chunks,
            declared_sha256: declared_sha256.into(),
            received,
        })
    }

    fn chunk_path(&self, index: u32) -> PathBuf {
        self.staging_dir.join(format!("chunk_{:04}", index))
    }

    /// Write one chunk. Rewriting an already-received index replaces it.
    pub fn write_chunk(&mut self, index: u32, data: &[u8]) -> ReconResult<()> {
        if index >= self.total_chunks {
            return Err(ReconError::validation(format!(
                "chunk index {} out of range (total {})",
                index, self.total_chunks
            )));
        }
        let mut file = File::create(self.chunk_path(index))?;
        file.write_all(data)?;
        self.received.insert(index);
        debug!(index, received = self.received.len(), "chunk written");
        Ok(())
    }

    /// Whether every chunk 0..total has been received.
    pub fn is_complete(&self) -> bool {
        self.received.len() as u32 == self.total_chunks
    }

    /// Indices still missing.
    pub fn missing_chunks(&self) -> Vec<u32> {
        (0..self.total_chunks)
            .filter(|i| !self.received.contains(i))
            .collect()
    }

    /// Concatenate all chunks into `destination`, verify the declared
    /// content hash, and clean up the staging directory.
    pub fn assemble(self, destination: impl AsRef<Path>) -> ReconResult<PathBuf> {
        if !self.is_complete() {
            return Err(ReconError::validation(format!(
                "upload incomplete: {} of {} chunks received",
                self.received.len(),
                self.total_chunks
            )));
        }

        let destination = destination.as_ref().to_path_buf();
        let mut output = File::create(&destination)?;
        let mut hasher = Sha256::new();

        for index in 0..self.total_chunks {
            let mut chunk = Vec::new();
            File::open(self.chunk_path(index))?.read_to_end(&mut chunk)?;
            hasher.update(&chunk);
            output.write_all(&chunk)?;
        }
        output.flush()?;

        let actual = hex::encode(hasher.finalize());
        if !actual.eq_ignore_ascii_case(&self.declared_sha256) {
            fs::remove_file(&destination)?;
            return Err(ReconError::validation(format!(
                "content hash mismatch: declared {}, computed {}",
                self.declared_sha256, actual
            )));
        }

        fs::remove_dir_all(&self.staging_dir)?;
        info!(path = %destination.display(), chunks = self.total_chunks, "upload assembled");
        Ok(destination)
    }
}

fn chunk_index(path: &Path) -> Option<u32> {
    path.file_name()?
        .to_str()?
        .strip_prefix("chunk_")?
        .parse()
        .ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn sha256_hex(data: &[u8]) -> String {
        hex::encode(Sha256::digest(data))
    }

    #[test]
    fn test_assemble_in_order() {
        let dir = tempdir().unwrap();
        let staging = dir.path().join("staging");
        let content = b"hello,world\n1,2\n";
        let hash = sha256_hex(content);

        let mut upload = ChunkedUpload::new(&staging, 2, &hash).unwrap();
        // Out-of-order arrival is fine.
        upload.write_chunk(1, &content[8..]).unwrap();
        assert!(!upload.is_complete());
        assert_eq!(upload.missing_chunks(), vec![0]);
        upload.write_chunk(0, &content[..8]).unwrap();
        assert!(upload.is_complete());

        let dest = dir.path().join("assembled.csv");
        let path = upload.assemble(&dest).unwrap();
        assert_eq!(fs::read(path).unwrap(), content);
        assert!(!staging.exists());
    }

    #[test]
    fn test_hash_mismatch_rejected() {
        let dir = tempdir().unwrap();
        let mut upload =
            ChunkedUpload::new(dir.path().join("staging"), 1, "00".repeat(32)).unwrap();
        upload.write_chunk(0, b"data").unwrap();

        let dest = dir.path().join("out.csv");
        let err = upload.assemble(&dest).unwrap_err();
        assert!(err.to_string().contains("hash mismatch"));
        assert!(!dest.exists());
    }

    #[test]
    fn test_incomplete_assembly_refused() {
        let dir = tempdir().unwrap();
        let mut upload = ChunkedUpload::new(dir.path().join("staging"), 3, "ab").unwrap();
        upload.write_chunk(0, b"x").unwrap();

        assert!(upload.assemble(dir.path().join("out.csv")).is_err());
    }

    #[test]
    fn test_resume_picks_up_existing_chunks() {
        let dir = tempdir().unwrap();
        let staging = dir.path().join("staging");

        let mut first = ChunkedUpload::new(&staging, 2, "irrelevant").unwrap();
        first.write_chunk(0, b"part").unwrap();
        drop(first);

        let resumed = ChunkedUpload::new(&staging, 2, "irrelevant").unwrap();
        assert_eq!(resumed.missing_chunks(), vec![1]);
    }

    #[test]
    fn test_out_of_range_chunk_rejected() {
        let dir = tempdir().unwrap();
        let mut upload = ChunkedUpload::new(dir.path().join("staging"), 2, "ab").unwrap();
        assert!(upload.write_chunk(2, b"x").is_err());
    }
}
