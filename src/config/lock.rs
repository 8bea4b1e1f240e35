//! Single-instance lock
//!
//! The lock is a sentinel file created exclusively in the config directory.
//! It holds the owner's pid and is removed when the guard is released or
//! dropped. A lock whose pid no longer exists is taken over, where `/proc`
//! can answer that.

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use super::LOCK_FILE;
use crate::error::{ResenError, Result};

#[derive(Debug)]
pub struct InstanceLock {
    path: PathBuf,
    held: bool,
}

impl InstanceLock {
    /// Take the lock, failing with `AlreadyRunning` if another instance holds it.
    pub fn acquire(config_dir: &Path) -> Result<Self> {
        let path = config_dir.join(LOCK_FILE);
        let mut file = match create_exclusive(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists && is_stale(&path) => {
                warn!(path = %path.display(), "removing stale lock left by a dead process");
                fs::remove_file(&path)?;
                create_exclusive(&path).map_err(|e| match e.kind() {
                    io::ErrorKind::AlreadyExists => ResenError::AlreadyRunning(path.clone()),
                    _ => e.into(),
                })?
            }
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                return Err(ResenError::AlreadyRunning(path))
            }
            Err(e) => return Err(e.into()),
        };
        writeln!(file, "{}", std::process::id())?;
        debug!(path = %path.display(), "acquired instance lock");
        Ok(Self { path, held: true })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Release the lock, reporting failures to the caller.
    pub fn release(mut self) -> Result<()> {
        self.unlock()
    }

    fn unlock(&mut self) -> Result<()> {
        if !self.held {
            return Ok(());
        }
        self.held = false;
        match fs::remove_file(&self.path) {
            Ok(()) => {
                debug!(path = %self.path.display(), "released instance lock");
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

fn create_exclusive(path: &Path) -> io::Result<fs::File> {
    OpenOptions::new().write(true).create_new(true).open(path)
}

/// Whether the lock names a pid that no longer runs. Without `/proc`, or
/// when the file holds no pid yet, the lock counts as live.
fn is_stale(path: &Path) -> bool {
    let proc_root = Path::new("/proc");
    if !proc_root.join("self").exists() {
        return false;
    }
    fs::read_to_string(path)
        .ok()
        .and_then(|content| content.trim().parse::<u32>().ok())
        .map_or(false, |pid| !proc_root.join(pid.to_string()).exists())
}

impl Drop for InstanceLock {
    fn drop(&mut self) {
        if let Err(e) = self.unlock() {
            warn!(path = %self.path.display(), "unable to remove lock file: {}", e);
        }
    }
}
