//! Bucket manager
//!
//! The single entry point for every bucket operation. It owns the instance
//! lock, the registry and its store, and the runtime adapter. Each operation
//! validates against the registry, delegates side effects, and writes the
//! registry back before reporting success.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::binder::{detect_selinux, PortProbe, ResourceBinder, TcpProbe};
use crate::bucket::{BucketRecord, BucketRegistry, BucketStatus, PortBinding, StorageBinding};
use crate::bundle::{BundleManager, ExportReport};
use crate::catalog::{CoreImage, ImageCatalog};
use crate::config::{ConfigStore, InstanceLock, Settings};
use crate::error::{ResenError, Result};
use crate::lifecycle::LifecycleController;
use crate::runtime::{ContainerRuntime, DockerCli, ExecOutput};
use crate::session::{ProcessSupervisor, SessionAccess};

/// Directory under the config dir where imported mounts go by default
pub const IMPORTS_DIR: &str = "imports";

pub struct BucketManager<R: ContainerRuntime = DockerCli> {
    config_dir: PathBuf,
    settings: Settings,
    store: ConfigStore,
    registry: BucketRegistry,
    binder: ResourceBinder,
    catalog: ImageCatalog,
    runtime: R,
    lock: InstanceLock,
}

impl<R: ContainerRuntime> BucketManager<R> {
    /// Lock `config_dir` and load its registry, probing the host for busy
    /// ports and SELinux.
    pub fn open(config_dir: &Path, runtime: R) -> Result<Self> {
        Self::open_with(config_dir, runtime, Box::new(TcpProbe), detect_selinux())
    }

    pub fn open_with(
        config_dir: &Path,
        runtime: R,
        probe: Box<dyn PortProbe>,
        relabel: bool,
    ) -> Result<Self> {
        let lock = InstanceLock::acquire(config_dir)?;
        let settings = Settings::load(config_dir)?;
        let store = ConfigStore::new(config_dir);
        let registry = BucketRegistry::from_records(store.load()?)?;
        let binder = ResourceBinder::new(&settings, relabel, probe);
        debug!(config_dir = %config_dir.display(), buckets = registry.len(), relabel, "bucket manager ready");
        Ok(Self {
            config_dir: config_dir.to_path_buf(),
            settings,
            store,
            registry,
            binder,
            catalog: ImageCatalog::default(),
            runtime,
            lock,
        })
    }

    pub fn lock_path(&self) -> &Path {
        self.lock.path()
    }

    pub fn runtime(&self) -> &R {
        &self.runtime
    }

    /// Release the instance lock.
    pub fn close(self) -> Result<()> {
        self.lock.release()
    }

    fn persist(&self) -> Result<()> {
        self.store.save(self.registry.records())
    }

    /// Apply a registry-only change; it is undone if it cannot be persisted.
    fn update<T, F>(&mut self, name: &str, f: F) -> Result<T>
    where
        F: FnOnce(&ResourceBinder, &mut BucketRecord) -> Result<T>,
    {
        let record = self.registry.get_mut(name)?;
        let before = record.clone();
        let out = f(&self.binder, record)?;
        if let Err(e) = self.persist() {
            *self.registry.get_mut(name)? = before;
            return Err(e);
        }
        Ok(out)
    }

    /// Run an operation with runtime side effects. Whatever it changed on the
    /// record is persisted, whether or not it succeeded.
    fn drive<T, F>(&mut self, name: &str, f: F) -> Result<T>
    where
        F: FnOnce(&R, &Settings, &mut BucketRecord) -> Result<T>,
    {
        let record = self.registry.get_mut(name)?;
        let before = record.clone();
        let out = f(&self.runtime, &self.settings, record);
        let changed = *record != before;
        if changed {
            self.persist()?;
        }
        out
    }

    pub fn create_bucket(&mut self, name: &str) -> Result<()> {
        self.registry.create(name)?;
        if let Err(e) = self.persist() {
            self.registry.delete(name)?;
            return Err(e);
        }
        info!(bucket = name, "created bucket");
        Ok(())
    }

    pub fn get_bucket(&self, name: &str) -> Result<&BucketRecord> {
        self.registry.get(name)
    }

    pub fn list_buckets(&self) -> &[BucketRecord] {
        self.registry.records()
    }

    pub fn list_images(&self) -> &[CoreImage] {
        self.catalog.images()
    }

    /// Remove the bucket's container (if any) and then the bucket itself.
    pub fn remove_bucket(&mut self, name: &str) -> Result<()> {
        self.drive(name, |rt, _, record| LifecycleController::new(rt).remove(record))?;
        let pos = self.registry.position(name).ok_or_else(|| ResenError::no_bucket(name))?;
        let removed = self.registry.delete(name)?;
        if let Err(e) = self.persist() {
            self.registry.insert_at(pos, removed)?;
            return Err(e);
        }
        info!(bucket = name, "removed bucket");
        Ok(())
    }

    /// Assign a catalogued core image to a bucket that has none yet.
    pub fn set_image(&mut self, name: &str, version: &str) -> Result<()> {
        self.registry.get(name)?;
        let descriptor = self.catalog.resolve(version)?.descriptor();
        self.update(name, |_, record| {
            if let Some(existing) = &record.image {
                return Err(ResenError::Conflict(format!(
                    "Image {} was already added to bucket '{}'",
                    existing.version, record.name
                )));
            }
            record.ensure_bindings_mutable("the image")?;
            record.image = Some(descriptor);
            Ok(())
        })
    }

    pub fn add_storage(&mut self, name: &str, local: &Path, container: &Path, permission: &str) -> Result<()> {
        self.update(name, |binder, record| binder.add_storage(record, local, container, permission))
    }

    pub fn remove_storage(&mut self, name: &str, local: &Path) -> Result<StorageBinding> {
        self.update(name, |binder, record| binder.remove_storage(record, local))
    }

    pub fn add_port(
        &mut self,
        name: &str,
        local: Option<u16>,
        container: Option<u16>,
        tcp: bool,
    ) -> Result<PortBinding> {
        let taken: HashSet<u16> = self
            .registry
            .records()
            .iter()
            .flat_map(|r| r.ports.iter().map(|p| p.local))
            .collect();
        self.update(name, |binder, record| binder.add_port(record, local, container, tcp, &taken))
    }

    pub fn remove_port(&mut self, name: &str, local: u16) -> Result<PortBinding> {
        self.update(name, |binder, record| binder.remove_port(record, local))
    }

    pub fn start_bucket(&mut self, name: &str) -> Result<()> {
        self.drive(name, |rt, _, record| LifecycleController::new(rt).start(record))
    }

    pub fn stop_bucket(&mut self, name: &str) -> Result<()> {
        self.drive(name, |rt, _, record| LifecycleController::new(rt).stop(record))
    }

    pub fn refresh_status(&mut self, name: &str) -> Result<BucketStatus> {
        self.drive(name, |rt, _, record| LifecycleController::new(rt).refresh_status(record))
    }

    /// Refresh every bucket that has a container. A bucket the engine cannot
    /// answer for keeps its cached status; only a failed save is an error.
    pub fn refresh_all(&mut self) -> Result<()> {
        if self.registry.is_empty() {
            return Ok(());
        }
        let ctl = LifecycleController::new(&self.runtime);
        let mut changed = false;
        for record in self.registry.records_mut() {
            let before = record.clone();
            if let Err(e) = ctl.refresh_status(record) {
                warn!(bucket = %record.name, "could not refresh status: {}", e);
            }
            changed |= *record != before;
        }
        if changed {
            self.persist()?;
        }
        Ok(())
    }

    /// Run `command` in a running bucket. A detached command must launch
    /// without an exit code; an attached one must exit with 0.
    pub fn execute(&mut self, name: &str, command: &str, detach: bool) -> Result<ExecOutput> {
        self.drive(name, |rt, _, record| {
            LifecycleController::new(rt).refresh_status(record)?;
            if record.status != BucketStatus::Running {
                return Err(ResenError::InvalidState(format!(
                    "Bucket '{}' is not running",
                    record.name
                )));
            }
            let output = rt.execute_command(record.container()?, command, detach)?;
            let ok = if detach {
                output.exit_code.is_none()
            } else {
                output.exit_code == Some(0)
            };
            if !ok {
                return Err(ResenError::Adapter(format!(
                    "Command '{}' failed in bucket '{}' with exit code {:?}",
                    command, record.name, output.exit_code
                )));
            }
            Ok(output)
        })
    }

    pub fn start_session(&mut self, name: &str, local_port: u16, container_port: u16) -> Result<SessionAccess> {
        self.drive(name, |rt, settings, record| {
            LifecycleController::new(rt).refresh_status(record)?;
            ProcessSupervisor::new(rt, settings.session_settle())?
                .start_session(record, local_port, container_port)
        })
    }

    pub fn stop_session(&mut self, name: &str) -> Result<()> {
        self.drive(name, |rt, settings, record| {
            LifecycleController::new(rt).refresh_status(record)?;
            ProcessSupervisor::new(rt, settings.session_settle())?.stop_session(record)
        })
    }

    pub fn export_bucket(&mut self, name: &str, output: &Path, excluded: &[PathBuf]) -> Result<ExportReport> {
        self.refresh_status(name)?;
        let record = self.registry.get(name)?;
        BundleManager::new(&self.runtime).export(record, output, excluded)
    }

    /// Create bucket `name` from a bundle. Mounts are unpacked under
    /// `mount_dir`, the configured bundle mount directory, or `<config>/imports`.
    pub fn import_bucket(&mut self, name: &str, input: &Path, mount_dir: Option<&Path>) -> Result<&BucketRecord> {
        if self.registry.contains(name) {
            return Err(ResenError::Conflict(format!(
                "Bucket with name '{}' already exists",
                name
            )));
        }
        let mount_root = mount_dir
            .map(Path::to_path_buf)
            .or_else(|| self.settings.bundle_mount_dir.clone())
            .unwrap_or_else(|| self.config_dir.join(IMPORTS_DIR));
        let record = BundleManager::new(&self.runtime).import(&self.binder, name, input, &mount_root)?;

        self.registry.insert(record)?;
        if let Err(e) = self.persist() {
            self.registry.delete(name)?;
            return Err(e);
        }
        info!(bucket = name, bundle = %input.display(), "imported bucket");
        self.registry.get(name)
    }
}
