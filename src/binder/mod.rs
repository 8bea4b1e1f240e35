//! Port and storage bindings
//!
//! Bindings can only change while a bucket has no container. Storage may
//! only be mounted under whitelisted container prefixes, and automatically
//! allocated ports are searched upward from a base port.
//!
//! The allocator probes the host and then records the port; another process
//! can grab the port in between. Only the instance lock keeps two copies of
//! this tool from handing out the same port.

mod ports;

use std::collections::HashSet;
use std::path::{Component, Path, PathBuf};
use std::process::Command;

use tracing::{debug, info};

use crate::bucket::{BucketRecord, Permission, PortBinding, StorageBinding};
use crate::config::Settings;
use crate::error::{ResenError, Result};

pub use ports::{PortProbe, StaticProbe, TcpProbe};

const GETENFORCE: &str = "/usr/sbin/getenforce";

/// Whether the host enforces SELinux, in which case mounts need relabeling.
pub fn detect_selinux() -> bool {
    match Command::new(GETENFORCE).output() {
        Ok(output) => {
            let enforcing = output.status.success()
                && String::from_utf8_lossy(&output.stdout).trim() == "Enforcing";
            debug!(enforcing, "probed SELinux mode");
            enforcing
        }
        Err(_) => false,
    }
}

pub struct ResourceBinder {
    whitelist: Vec<PathBuf>,
    base_port: u16,
    relabel: bool,
    probe: Box<dyn PortProbe>,
}

impl std::fmt::Debug for ResourceBinder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceBinder")
            .field("whitelist", &self.whitelist)
            .field("base_port", &self.base_port)
            .field("relabel", &self.relabel)
            .finish()
    }
}

impl ResourceBinder {
    pub fn new(settings: &Settings, relabel: bool, probe: Box<dyn PortProbe>) -> Self {
        Self {
            whitelist: settings.storage_whitelist.clone(),
            base_port: settings.base_port,
            relabel,
            probe,
        }
    }

    /// Mount a host directory into the bucket.
    pub fn add_storage(
        &self,
        record: &mut BucketRecord,
        local: &Path,
        container: &Path,
        permission: &str,
    ) -> Result<()> {
        self.check_storage(record, local, container)?;
        let mut permission = Permission::from_token(permission)?;
        if self.relabel {
            permission = permission.relabeled();
        }
        self.push_storage(record, local, container, permission);
        Ok(())
    }

    /// Mount with an already-normalized permission, kept exactly as given.
    pub fn bind_storage(
        &self,
        record: &mut BucketRecord,
        local: &Path,
        container: &Path,
        permission: Permission,
    ) -> Result<()> {
        self.check_storage(record, local, container)?;
        self.push_storage(record, local, container, permission);
        Ok(())
    }

    fn check_storage(&self, record: &BucketRecord, local: &Path, container: &Path) -> Result<()> {
        record.ensure_bindings_mutable("storage")?;
        if record.storage_for(local).is_some() {
            return Err(ResenError::Conflict(format!(
                "Local storage location {} already in use in bucket '{}'",
                local.display(),
                record.name
            )));
        }
        if record.storage.iter().any(|s| s.container == container) {
            return Err(ResenError::Conflict(format!(
                "Container storage location {} already in use in bucket '{}'",
                container.display(),
                record.name
            )));
        }
        if !local.is_dir() {
            return Err(ResenError::NotFound(format!(
                "Local directory {} does not exist",
                local.display()
            )));
        }
        self.check_whitelisted(container)
    }

    fn check_whitelisted(&self, container: &Path) -> Result<()> {
        let clean = container.is_absolute()
            && !container.components().any(|c| matches!(c, Component::ParentDir | Component::CurDir));
        if clean && self.whitelist.iter().any(|prefix| container.starts_with(prefix)) {
            return Ok(());
        }
        let allowed: Vec<String> = self.whitelist.iter().map(|p| p.display().to_string()).collect();
        Err(ResenError::Validation(format!(
            "Invalid mount location {}. Can only mount storage into: {}",
            container.display(),
            allowed.join(", ")
        )))
    }

    fn push_storage(&self, record: &mut BucketRecord, local: &Path, container: &Path, permission: Permission) {
        info!(bucket = %record.name, local = %local.display(), container = %container.display(), %permission, "added storage");
        record.storage.push(StorageBinding {
            local: local.to_path_buf(),
            container: container.to_path_buf(),
            permission,
        });
    }

    pub fn remove_storage(&self, record: &mut BucketRecord, local: &Path) -> Result<StorageBinding> {
        record.ensure_bindings_mutable("storage")?;
        let pos = record.storage.iter().position(|s| s.local == local).ok_or_else(|| {
            ResenError::NotFound(format!(
                "Storage location {} not associated with bucket '{}'",
                local.display(),
                record.name
            ))
        })?;
        Ok(record.storage.remove(pos))
    }

    /// Publish a port. With neither side given, the first free port from the
    /// base upward is bound on both sides; with one side given, it is used for
    /// both. `taken` holds the local ports of every bucket in the registry.
    pub fn add_port(
        &self,
        record: &mut BucketRecord,
        local: Option<u16>,
        container: Option<u16>,
        tcp: bool,
        taken: &HashSet<u16>,
    ) -> Result<PortBinding> {
        record.ensure_bindings_mutable("ports")?;
        let (local, container) = match (local, container) {
            (None, None) => {
                let port = self.allocate_port(record, taken)?;
                (port, port)
            }
            (Some(l), None) => (l, l),
            (None, Some(c)) => (c, c),
            (Some(l), Some(c)) => (l, c),
        };
        if record.port(local).is_some() {
            return Err(ResenError::Conflict(format!(
                "Local port {} already in use in bucket '{}'",
                local, record.name
            )));
        }
        if record.ports.iter().any(|p| p.container == container) {
            return Err(ResenError::Conflict(format!(
                "Container port {} already in use in bucket '{}'",
                container, record.name
            )));
        }
        let binding = PortBinding { local, container, tcp };
        info!(bucket = %record.name, local, container, tcp, "added port");
        record.ports.push(binding);
        Ok(binding)
    }

    /// First port at or above the base that no bucket uses and nothing listens on.
    pub fn allocate_port(&self, record: &BucketRecord, taken: &HashSet<u16>) -> Result<u16> {
        (self.base_port..=u16::MAX)
            .filter(|port| !taken.contains(port))
            .filter(|port| !record.ports.iter().any(|p| p.container == *port))
            .find(|port| {
                let busy = self.probe.in_use(*port);
                if busy {
                    debug!(port, "port busy on host");
                }
                !busy
            })
            .ok_or_else(|| {
                ResenError::Conflict(format!("No free port available from {}", self.base_port))
            })
    }

    pub fn remove_port(&self, record: &mut BucketRecord, local: u16) -> Result<PortBinding> {
        record.ensure_bindings_mutable("ports")?;
        let pos = record.ports.iter().position(|p| p.local == local).ok_or_else(|| {
            ResenError::NotFound(format!(
                "Port {} not associated with bucket '{}'",
                local, record.name
            ))
        })?;
        Ok(record.ports.remove(pos))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use tempfile::TempDir;

    fn binder(busy: &[u16], relabel: bool) -> ResourceBinder {
        ResourceBinder::new(
            &Settings::default(),
            relabel,
            Box::new(StaticProbe::new(busy.iter().copied())),
        )
    }

    fn frozen(name: &str) -> BucketRecord {
        let mut record = BucketRecord::new(name);
        record.attach_container("abc".to_string());
        record
    }

    #[test]
    fn test_add_storage_whitelist() {
        let tmp = TempDir::new().unwrap();
        let binder = binder(&[], false);
        let mut record = BucketRecord::new("lab");

        binder
            .add_storage(&mut record, tmp.path(), Path::new("/home/jovyan/mount/data"), "rw")
            .unwrap();

        let other = TempDir::new().unwrap();
        for bad in ["/home/jovyan/work", "/home/jovyan", "/home/jovyan/mountain", "/home/jovyan/mount/../work", "mount/data"] {
            let err = binder
                .add_storage(&mut record, other.path(), Path::new(bad), "rw")
                .unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Validation, "{}", bad);
        }
        binder
            .add_storage(&mut record, other.path(), Path::new("/home/jovyan/mount"), "r")
            .unwrap();
        assert_eq!(record.storage.len(), 2);
        assert_eq!(record.storage[1].permission.to_string(), "ro");
    }

    #[test]
    fn test_add_storage_conflicts() {
        let tmp = TempDir::new().unwrap();
        let other = TempDir::new().unwrap();
        let binder = binder(&[], false);
        let mut record = BucketRecord::new("lab");
        binder
            .add_storage(&mut record, tmp.path(), Path::new("/home/jovyan/mount/a"), "rw")
            .unwrap();

        let dup_local = binder
            .add_storage(&mut record, tmp.path(), Path::new("/home/jovyan/mount/b"), "rw")
            .unwrap_err();
        assert_eq!(dup_local.kind(), ErrorKind::Conflict);

        let dup_container = binder
            .add_storage(&mut record, other.path(), Path::new("/home/jovyan/mount/a"), "rw")
            .unwrap_err();
        assert_eq!(dup_container.kind(), ErrorKind::Conflict);
    }

    #[test]
    fn test_add_storage_missing_dir_and_bad_permission() {
        let tmp = TempDir::new().unwrap();
        let binder = binder(&[], false);
        let mut record = BucketRecord::new("lab");

        let missing = binder
            .add_storage(&mut record, &tmp.path().join("nope"), Path::new("/home/jovyan/mount/a"), "rw")
            .unwrap_err();
        assert_eq!(missing.kind(), ErrorKind::NotFound);

        let perm = binder
            .add_storage(&mut record, tmp.path(), Path::new("/home/jovyan/mount/a"), "x")
            .unwrap_err();
        assert_eq!(perm.kind(), ErrorKind::Validation);
        assert!(record.storage.is_empty());
    }

    #[test]
    fn test_add_storage_relabels() {
        let tmp = TempDir::new().unwrap();
        let binder = binder(&[], true);
        let mut record = BucketRecord::new("lab");
        binder
            .add_storage(&mut record, tmp.path(), Path::new("/home/jovyan/mount/a"), "rw")
            .unwrap();
        assert_eq!(record.storage[0].permission.to_string(), "rw,Z");
    }

    #[test]
    fn test_bindings_frozen_after_container() {
        let tmp = TempDir::new().unwrap();
        let binder = binder(&[], false);
        let mut record = frozen("lab");
        let taken = HashSet::new();

        let errs = [
            binder
                .add_storage(&mut record, tmp.path(), Path::new("/home/jovyan/mount/a"), "rw")
                .unwrap_err(),
            binder.remove_storage(&mut record, tmp.path()).unwrap_err(),
            binder.add_port(&mut record, None, None, true, &taken).unwrap_err(),
            binder.remove_port(&mut record, 9000).unwrap_err(),
        ];
        for err in errs {
            assert_eq!(err.kind(), ErrorKind::InvalidState);
        }
    }

    #[test]
    fn test_allocate_skips_busy_and_taken() {
        let binder = binder(&[9000, 9001, 9002], false);
        let mut record = BucketRecord::new("lab");
        let taken: HashSet<u16> = [9003, 9004].into_iter().collect();

        let binding = binder.add_port(&mut record, None, None, true, &taken).unwrap();
        assert_eq!(binding, PortBinding { local: 9005, container: 9005, tcp: true });

        let next = binder.add_port(&mut record, None, None, true, &taken).unwrap();
        assert_eq!(next.local, 9006);
    }

    #[test]
    fn test_allocate_skips_own_container_ports() {
        let binder = binder(&[], false);
        let mut record = BucketRecord::new("lab");
        let taken = HashSet::new();
        binder.add_port(&mut record, Some(9100), Some(9000), true, &taken).unwrap();
        let binding = binder.add_port(&mut record, None, None, true, &taken).unwrap();
        assert_eq!(binding.local, 9001);
    }

    #[test]
    fn test_explicit_port_conflicts() {
        let binder = binder(&[8888], false);
        let mut record = BucketRecord::new("lab");
        let taken = HashSet::new();

        // explicit ports are not probed
        binder.add_port(&mut record, Some(8888), Some(8888), true, &taken).unwrap();
        let dup_local = binder
            .add_port(&mut record, Some(8888), Some(9999), true, &taken)
            .unwrap_err();
        assert_eq!(dup_local.kind(), ErrorKind::Conflict);
        let dup_container = binder
            .add_port(&mut record, Some(7777), Some(8888), false, &taken)
            .unwrap_err();
        assert_eq!(dup_container.kind(), ErrorKind::Conflict);

        let single = binder.add_port(&mut record, Some(7000), None, false, &taken).unwrap();
        assert_eq!((single.local, single.container, single.tcp), (7000, 7000, false));
    }

    #[test]
    fn test_remove_bindings() {
        let tmp = TempDir::new().unwrap();
        let binder = binder(&[], false);
        let mut record = BucketRecord::new("lab");
        binder
            .add_storage(&mut record, tmp.path(), Path::new("/home/jovyan/mount/a"), "rw")
            .unwrap();
        binder.add_port(&mut record, Some(9000), None, true, &HashSet::new()).unwrap();

        assert_eq!(
            binder.remove_storage(&mut record, Path::new("/elsewhere")).unwrap_err().kind(),
            ErrorKind::NotFound
        );
        binder.remove_storage(&mut record, tmp.path()).unwrap();
        binder.remove_port(&mut record, 9000).unwrap();
        assert_eq!(binder.remove_port(&mut record, 9000).unwrap_err().kind(), ErrorKind::NotFound);
        assert!(record.storage.is_empty() && record.ports.is_empty());
    }
}
