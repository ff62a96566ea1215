use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::ArtifactError;

/// Write handle for the hit-count artifact.
///
/// The file is created when the run is configured, before the target
/// executes anything, so that an unwritable output path fails the run up
/// front instead of discarding a finished trace at termination.
pub struct ArtifactWriter {
    path: PathBuf,
    writer: BufWriter<File>,
}

impl ArtifactWriter {
    pub fn create(path: &Path) -> Result<Self, ArtifactError> {
        let file = File::create(path).map_err(|source| ArtifactError::Create {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self {
            path: path.to_path_buf(),
            writer: BufWriter::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Writes the table snapshot as raw bytes, one per address offset in
    /// ascending order, with no header, and flushes the file.
    pub fn write_counts(mut self, counts: &[u8]) -> Result<(), ArtifactError> {
        self.writer.write_all(counts)?;
        self.writer.flush()?;
        debug!(path = %self.path.display(), bytes = counts.len(), "artifact written");
        Ok(())
    }
}
