//! Batched, append-only output file.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::error::{Error, Result};

/// Buffers decoded lines and appends them to the output file in batches.
///
/// Each flush is a single write of every buffered line, newline-terminated,
/// in arrival order. Flushing needs `&mut self`, so two flushes can never
/// interleave.
pub struct OutputSink {
    path: PathBuf,
    batch: Vec<String>,
    batch_size: usize,
    lines_written: u64,
    flushes: u64,
}

impl OutputSink {
    /// Recreate the output file (previous contents are discarded).
    pub fn create(path: impl Into<PathBuf>, batch_size: usize) -> Result<Self> {
        let path = path.into();
        if batch_size == 0 {
            return Err(Error::InvalidConfig(
                "flush batch size must be at least 1".to_string(),
            ));
        }

        if path.exists() {
            info!("Output file {} exists, recreating it", path.display());
        }
        File::create(&path).map_err(|source| Error::Output {
            path: path.clone(),
            source,
        })?;

        Ok(Self {
            path,
            batch: Vec::with_capacity(batch_size),
            batch_size,
            lines_written: 0,
            flushes: 0,
        })
    }

    /// Buffer one line. Returns true when the append triggered a flush.
    pub fn append(&mut self, line: String) -> Result<bool> {
        self.batch.push(line);
        if self.batch.len() >= self.batch_size {
            self.flush()?;
            return Ok(true);
        }
        Ok(false)
    }

    /// Write out whatever is buffered. Returns the number of lines written;
    /// an empty batch leaves the file untouched.
    ///
    /// On failure the batch is kept, so a later flush can retry it.
    pub fn flush(&mut self) -> Result<usize> {
        if self.batch.is_empty() {
            return Ok(0);
        }

        let mut chunk = String::with_capacity(self.batch.iter().map(|l| l.len() + 1).sum());
        for line in &self.batch {
            chunk.push_str(line);
            chunk.push('\n');
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|source| self.output_error(source))?;
        file.write_all(chunk.as_bytes())
            .and_then(|_| file.flush())
            .map_err(|source| self.output_error(source))?;

        let written = self.batch.len();
        self.batch.clear();
        self.lines_written += written as u64;
        self.flushes += 1;
        debug!(
            "Flushed {written} lines to {} ({} total)",
            self.path.display(),
            self.lines_written
        );
        Ok(written)
    }

    fn output_error(&self, source: std::io::Error) -> Error {
        Error::Output {
            path: self.path.clone(),
            source,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn buffered(&self) -> usize {
        self.batch.len()
    }

    pub fn lines_written(&self) -> u64 {
        self.lines_written
    }

    pub fn flushes(&self) -> u64 {
        self.flushes
    }
}
