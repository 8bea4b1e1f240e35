//! Bundle manifest (`manifest.json`)

use std::fs;
use std::path::{Component, Path};

use serde::{Deserialize, Serialize};

use crate::bucket::Permission;
use crate::error::{ResenError, Result};

use super::archive::ARCHIVE_SUFFIX;

/// One mount: `[archive file name, container path, permission]`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MountEntry(pub String, pub String, pub Permission);

impl MountEntry {
    pub fn file(&self) -> &str {
        &self.0
    }

    pub fn container(&self) -> &Path {
        Path::new(&self.1)
    }

    pub fn permission(&self) -> Permission {
        self.2
    }

    /// Directory name the mount unpacks to
    pub fn stem(&self) -> &str {
        self.0.strip_suffix(ARCHIVE_SUFFIX).unwrap_or(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    pub image: String,
    pub mounts: Vec<MountEntry>,
}

impl Manifest {
    pub fn read(path: &Path) -> Result<Self> {
        if !path.is_file() {
            return Err(ResenError::Validation(format!(
                "Bundle has no manifest at {}",
                path.display()
            )));
        }
        let manifest: Manifest = serde_json::from_str(&fs::read_to_string(path)?)?;
        manifest.validate()?;
        Ok(manifest)
    }

    pub fn write(&self, path: &Path) -> Result<()> {
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    /// Every referenced file must sit directly in the bundle directory.
    fn validate(&self) -> Result<()> {
        let names = std::iter::once(self.image.as_str()).chain(self.mounts.iter().map(|m| m.file()));
        for name in names {
            let mut components = Path::new(name).components();
            let plain = matches!(components.next(), Some(Component::Normal(_))) && components.next().is_none();
            if !plain {
                return Err(ResenError::Validation(format!(
                    "Bundle manifest references an invalid file name '{}'",
                    name
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn test_manifest_wire_format() {
        let manifest = Manifest {
            image: "image.tar".to_string(),
            mounts: vec![MountEntry(
                "data.tar.gz".to_string(),
                "/home/jovyan/mount/data".to_string(),
                "rw,Z".parse().unwrap(),
            )],
        };
        let value = serde_json::to_value(&manifest).unwrap();
        assert_eq!(
            value,
            json!({
                "image": "image.tar",
                "mounts": [["data.tar.gz", "/home/jovyan/mount/data", "rw,Z"]]
            })
        );
        assert_eq!(manifest.mounts[0].stem(), "data");
    }

    #[test]
    fn test_manifest_rejects_escaping_names() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("manifest.json");
        fs::write(&path, r#"{"image": "../image.tar", "mounts": []}"#).unwrap();
        assert!(Manifest::read(&path).is_err());

        fs::write(&path, r#"{"image": "image.tar", "mounts": [["a/b.tar.gz", "/x", "ro"]]}"#).unwrap();
        assert!(Manifest::read(&path).is_err());

        fs::write(&path, r#"{"image": "image.tar", "mounts": [["b.tar.gz", "/x", "rx"]]}"#).unwrap();
        assert!(Manifest::read(&path).is_err());
    }

    #[test]
    fn test_manifest_missing() {
        let tmp = TempDir::new().unwrap();
        assert!(Manifest::read(&tmp.path().join("manifest.json")).is_err());
    }
}
