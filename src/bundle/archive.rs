//! gzip-compressed tar helpers

use std::fs::{self, File};
use std::path::Path;

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use tar::{Archive, Builder};

use crate::error::Result;

pub const ARCHIVE_SUFFIX: &str = ".tar.gz";

/// Compress directory `src` into `dest`, storing its contents under `name/`.
/// Returns the archive size in bytes.
pub fn pack_dir(src: &Path, name: &str, dest: &Path) -> Result<u64> {
    let file = File::create(dest)?;
    let mut builder = Builder::new(GzEncoder::new(file, Compression::default()));
    builder.follow_symlinks(false);
    builder.append_dir_all(name, src)?;
    builder.into_inner()?.finish()?;
    Ok(fs::metadata(dest)?.len())
}

/// Extract the archive at `src` into directory `dest`.
pub fn unpack(src: &Path, dest: &Path) -> Result<()> {
    let file = File::open(src)?;
    let mut archive = Archive::new(GzDecoder::new(file));
    archive.set_preserve_permissions(true);
    archive.unpack(dest)?;
    Ok(())
}
