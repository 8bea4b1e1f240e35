//! Portable bucket bundles
//!
//! A bundle is one `.tar.gz` holding a single directory:
//!
//! ```text
//! <bucket>/
//!   image.tar          container snapshot saved by the engine
//!   <mount>.tar.gz     one archive per exported storage mount
//!   manifest.json      {"image": ..., "mounts": [[file, container_path, permission], ...]}
//! ```
//!
//! Importing restores the image and the mounts into a new bucket with the
//! same container paths and permissions. Ports and the container itself are
//! left for an explicit bind and start.

mod archive;
mod manifest;

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::binder::ResourceBinder;
use crate::bucket::{BucketRecord, ImageDescriptor};
use crate::error::{ResenError, Result};
use crate::runtime::ContainerRuntime;

pub use archive::{pack_dir, unpack, ARCHIVE_SUFFIX};
pub use manifest::{Manifest, MountEntry};

pub const IMAGE_ARCHIVE: &str = "image.tar";
pub const MANIFEST_FILE: &str = "manifest.json";
/// Version recorded for images that came from a bundle
pub const IMPORTED_VERSION: &str = "imported";

/// Outcome of an export
#[derive(Debug, Clone, Serialize)]
pub struct ExportReport {
    pub path: PathBuf,
    pub size: u64,
    pub mounts: usize,
}

/// Make a name safe to use as a file or directory name.
fn file_safe(name: &str) -> String {
    let safe: String = name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') { c } else { '_' })
        .collect();
    match safe.trim_start_matches('.') {
        "" => "bucket".to_string(),
        s => s.to_string(),
    }
}

/// Image tag used when snapshotting a bucket's container.
fn export_tag(bucket: &str) -> String {
    format!("resen/{}:export", file_safe(bucket).to_ascii_lowercase())
}

/// Pick a unique archive stem for a mount, based on its directory name.
fn mount_stem(local: &Path, used: &mut HashSet<String>) -> String {
    let base = local
        .file_name()
        .map(|n| file_safe(&n.to_string_lossy()))
        .unwrap_or_else(|| "mount".to_string());
    let mut stem = base.clone();
    let mut n = 1;
    while !used.insert(stem.clone()) {
        stem = format!("{}_{}", base, n);
        n += 1;
    }
    stem
}

pub struct BundleManager<'a> {
    runtime: &'a dyn ContainerRuntime,
}

impl<'a> BundleManager<'a> {
    pub fn new(runtime: &'a dyn ContainerRuntime) -> Self {
        Self { runtime }
    }

    /// Write `record` to a bundle at `output`, skipping mounts whose local
    /// path is listed in `excluded`.
    pub fn export(&self, record: &BucketRecord, output: &Path, excluded: &[PathBuf]) -> Result<ExportReport> {
        let container = record.container()?;
        let work = tempfile::Builder::new().prefix("resen-export-").tempdir()?;
        let dir_name = file_safe(&record.name);
        let root = work.path().join(&dir_name);
        fs::create_dir(&root)?;

        let tag = export_tag(&record.name);
        info!(bucket = %record.name, %tag, "exporting container image");
        if !self.runtime.export_container(container, &tag, &root.join(IMAGE_ARCHIVE))? {
            return Err(ResenError::Adapter(format!(
                "export of bucket '{}' did not produce an image archive",
                record.name
            )));
        }

        let mut used = HashSet::new();
        let mut mounts = Vec::new();
        for binding in &record.storage {
            if excluded.contains(&binding.local) {
                debug!(local = %binding.local.display(), "mount excluded from export");
                continue;
            }
            let stem = mount_stem(&binding.local, &mut used);
            let file = format!("{}{}", stem, ARCHIVE_SUFFIX);
            let size = pack_dir(&binding.local, &stem, &root.join(&file))?;
            debug!(local = %binding.local.display(), %file, size, "packed mount");
            mounts.push(MountEntry(
                file,
                binding.container.to_string_lossy().into_owned(),
                binding.permission,
            ));
        }

        let manifest = Manifest {
            image: IMAGE_ARCHIVE.to_string(),
            mounts,
        };
        manifest.write(&root.join(MANIFEST_FILE))?;

        let size = pack_dir(&root, &dir_name, output)?;
        work.close()?;
        info!(bucket = %record.name, path = %output.display(), size, "bundle written");
        Ok(ExportReport {
            path: output.to_path_buf(),
            size,
            mounts: manifest.mounts.len(),
        })
    }

    /// Build a new bucket named `name` from the bundle at `input`. Mounts are
    /// unpacked under `mount_root/<name>/`. The record is returned for the
    /// caller to register.
    pub fn import(
        &self,
        binder: &ResourceBinder,
        name: &str,
        input: &Path,
        mount_root: &Path,
    ) -> Result<BucketRecord> {
        if !input.is_file() {
            return Err(ResenError::NotFound(format!("Bundle {} does not exist", input.display())));
        }
        let work = tempfile::Builder::new().prefix("resen-import-").tempdir()?;
        unpack(input, work.path())?;
        let root = single_dir(work.path())?;
        let manifest = Manifest::read(&root.join(MANIFEST_FILE))?;

        info!(bucket = name, bundle = %input.display(), "importing container image");
        let image_id = self.runtime.import_image(&root.join(&manifest.image))?;
        let mut record = BucketRecord::new(name);
        record.image = Some(ImageDescriptor {
            version: IMPORTED_VERSION.to_string(),
            image_id,
            pull_reference: None,
        });

        let dest = mount_root.join(file_safe(name));
        fs::create_dir_all(&dest)?;
        let mut unpacked = Vec::new();
        if let Err(e) = restore_mounts(binder, &mut record, &manifest, &root, &dest, &mut unpacked) {
            for dir in &unpacked {
                if let Err(err) = fs::remove_dir_all(dir) {
                    warn!(dir = %dir.display(), "could not clean up unpacked mount: {}", err);
                }
            }
            // only succeeds when nothing else lives there
            let _ = fs::remove_dir(&dest);
            return Err(e);
        }
        work.close()?;
        Ok(record)
    }
}

/// Unpack every mount into `dest` and bind it. Directories created so far
/// are pushed onto `unpacked`, so the caller can undo a partial restore.
fn restore_mounts(
    binder: &ResourceBinder,
    record: &mut BucketRecord,
    manifest: &Manifest,
    root: &Path,
    dest: &Path,
    unpacked: &mut Vec<PathBuf>,
) -> Result<()> {
    for entry in &manifest.mounts {
        let local = dest.join(entry.stem());
        if local.exists() {
            return Err(ResenError::Conflict(format!(
                "Cannot unpack mount, {} already exists",
                local.display()
            )));
        }
        unpacked.push(local.clone());
        unpack(&root.join(entry.file()), dest)?;
        binder.bind_storage(record, &local, entry.container(), entry.permission())?;
    }
    Ok(())
}

/// The only directory directly inside `dir`.
fn single_dir(dir: &Path) -> Result<PathBuf> {
    let mut dirs = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        if entry.file_type()?.is_dir() {
            dirs.push(entry.path());
        }
    }
    match dirs.len() {
        1 => Ok(dirs.remove(0)),
        n => Err(ResenError::Validation(format!(
            "Bundle must contain exactly one top-level directory, found {}",
            n
        ))),
    }
}
