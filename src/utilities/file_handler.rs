//! Staged JSON artifact writes.
//!
//! Artifacts are serialized up front, written into temp files next to their
//! destinations, and only renamed into place once every artifact has been
//! staged.  A failure before the rename step leaves prior artifacts untouched.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tempfile::NamedTempFile;

use crate::error::{PipelineError, Result};

/// One serialized artifact waiting to be written.
#[derive(Debug, Clone)]
struct PendingFile {
    relative: PathBuf,
    content: String,
}

/// Collects JSON artifacts under one output directory and commits them together.
#[derive(Debug, Clone)]
pub struct FileHandler {
    /// Directory the artifact paths are relative to.
    pub directory: PathBuf,
    pending: Vec<PendingFile>,
}

impl FileHandler {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
            pending: Vec::new(),
        }
    }

    /// Serialize `data` as pretty JSON (two-space indent, trailing newline).
    ///
    /// Nothing touches the filesystem until [`Self::commit`].
    pub fn stage_json<T: Serialize + ?Sized>(
        &mut self,
        relative: impl AsRef<Path>,
        data: &T,
    ) -> Result<()> {
        let mut content = serde_json::to_string_pretty(data)?;
        content.push('\n');
        self.pending.push(PendingFile {
            relative: relative.as_ref().to_path_buf(),
            content,
        });
        Ok(())
    }

    /// Destination paths of everything staged so far.
    pub fn pending_paths(&self) -> Vec<PathBuf> {
        self.pending
            .iter()
            .map(|p| self.directory.join(&p.relative))
            .collect()
    }

    /// Write every staged artifact, replacing prior versions.
    ///
    /// All temp files are written and flushed before the first rename.
    pub fn commit(self) -> Result<Vec<PathBuf>> {
        let mut staged: Vec<(NamedTempFile, PathBuf)> = Vec::with_capacity(self.pending.len());

        for file in &self.pending {
            let dest = self.directory.join(&file.relative);
            let dir = dest
                .parent()
                .map(Path::to_path_buf)
                .unwrap_or_else(|| self.directory.clone());
            fs::create_dir_all(&dir).map_err(|source| write_error(&dest, source))?;

            let mut tmp = NamedTempFile::new_in(&dir).map_err(|source| write_error(&dest, source))?;
            tmp.write_all(file.content.as_bytes())
                .and_then(|_| tmp.flush())
                .map_err(|source| write_error(&dest, source))?;
            staged.push((tmp, dest));
        }

        let mut written = Vec::with_capacity(staged.len());
        for (tmp, dest) in staged {
            tmp.persist(&dest)
                .map_err(|e| write_error(&dest, e.error))?;
            log::debug!("wrote {}", dest.display());
            written.push(dest);
        }
        Ok(written)
    }
}

fn write_error(path: &Path, source: std::io::Error) -> PipelineError {
    PipelineError::Write {
        path: path.to_path_buf(),
        source,
    }
}
