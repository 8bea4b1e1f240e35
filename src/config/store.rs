//! Registry document persistence

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use tracing::debug;

use super::REGISTRY_FILE;
use crate::bucket::BucketRecord;
use crate::error::Result;

/// Reads and rewrites `buckets.json` as a whole.
#[derive(Debug, Clone)]
pub struct ConfigStore {
    path: PathBuf,
}

impl ConfigStore {
    pub fn new(config_dir: &Path) -> Self {
        Self {
            path: config_dir.join(REGISTRY_FILE),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load every record; a missing file is an empty registry.
    pub fn load(&self) -> Result<Vec<BucketRecord>> {
        if !self.path.exists() {
            debug!(path = %self.path.display(), "no registry file, starting empty");
            return Ok(Vec::new());
        }
        let content = fs::read_to_string(&self.path)?;
        let records: Vec<BucketRecord> = serde_json::from_str(&content)?;
        debug!(path = %self.path.display(), buckets = records.len(), "loaded registry");
        Ok(records)
    }

    /// Replace the document atomically: write a sibling temp file, then rename over.
    pub fn save(&self, records: &[BucketRecord]) -> Result<()> {
        let dir = self.path.parent().unwrap_or_else(|| Path::new("."));
        let mut tmp = NamedTempFile::new_in(dir)?;
        serde_json::to_writer_pretty(&mut tmp, records)?;
        tmp.write_all(b"\n")?;
        tmp.as_file().sync_all()?;
        tmp.persist(&self.path).map_err(|e| e.error)?;
        debug!(path = %self.path.display(), buckets = records.len(), "saved registry");
        Ok(())
    }
}
