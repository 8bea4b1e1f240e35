//! Bucket lifecycle
//!
//! Drives a bucket through `unset -> created -> running <-> exited` against
//! the container runtime. Records are only updated after the runtime reports
//! the state it actually reached.

use tracing::{debug, info, warn};

use crate::bucket::{BucketRecord, BucketStatus};
use crate::error::{ResenError, Result};
use crate::runtime::{ContainerRuntime, ContainerSpec};

pub struct LifecycleController<'a> {
    runtime: &'a dyn ContainerRuntime,
}

impl<'a> LifecycleController<'a> {
    pub fn new(runtime: &'a dyn ContainerRuntime) -> Self {
        Self { runtime }
    }

    /// Overwrite the cached status with what the engine reports now.
    pub fn refresh_status(&self, record: &mut BucketRecord) -> Result<BucketStatus> {
        let Some(id) = record.container_ref.as_deref() else {
            return Ok(record.status);
        };
        match self.runtime.get_container_status(id) {
            Ok(status) => {
                if status != record.status {
                    debug!(bucket = %record.name, from = %record.status, to = %status, "status changed outside resen");
                }
                record.observe(status);
            }
            Err(ResenError::NotFound(_)) => {
                warn!(bucket = %record.name, container = %id, "container no longer exists, forgetting it");
                record.forget_container();
            }
            Err(e) => return Err(e),
        }
        Ok(record.status)
    }

    /// Start the bucket, creating its container first if needed.
    pub fn start(&self, record: &mut BucketRecord) -> Result<()> {
        if record.has_container() {
            self.refresh_status(record)?;
        }
        if record.status == BucketStatus::Running {
            debug!(bucket = %record.name, "already running");
            return Ok(());
        }
        let spec = ContainerSpec::from_record(record)?;

        if !record.has_container() {
            info!(bucket = %record.name, image = %spec.image.version, "creating container");
            let (id, status) = self.runtime.create_container(&spec)?;
            record.attach_container(id);
            if status != BucketStatus::Created {
                record.observe(status);
                return Err(ResenError::StartFailure(format!(
                    "container for bucket '{}' was created in state {}",
                    record.name, status
                )));
            }
            record.transition(BucketStatus::Created)?;
        }

        let id = record.container()?.to_string();
        info!(bucket = %record.name, container = %id, "starting container");
        let status = self.runtime.start_container(&id)?;
        if status != BucketStatus::Running {
            record.observe(status);
            return Err(ResenError::StartFailure(format!(
                "bucket '{}' is {} after start",
                record.name, status
            )));
        }
        record.transition(BucketStatus::Running)
    }

    /// Stop a running bucket. A container removed behind resen's back
    /// counts as stopped.
    pub fn stop(&self, record: &mut BucketRecord) -> Result<()> {
        if !record.has_container() {
            return Err(ResenError::InvalidState(format!(
                "Bucket '{}' has never been started",
                record.name
            )));
        }
        self.refresh_status(record)?;
        if matches!(record.status, BucketStatus::Unset | BucketStatus::Created | BucketStatus::Exited) {
            debug!(bucket = %record.name, status = %record.status, "not running, nothing to stop");
            return Ok(());
        }

        let id = record.container()?.to_string();
        info!(bucket = %record.name, container = %id, "stopping container");
        let status = self.runtime.stop_container(&id)?;
        if status != BucketStatus::Exited {
            record.observe(status);
            return Err(ResenError::StopFailure(format!(
                "bucket '{}' is {} after stop",
                record.name, status
            )));
        }
        record.transition(BucketStatus::Exited)?;
        record.jupyter_session = None;
        Ok(())
    }

    /// Remove the bucket's container, leaving the record without one.
    pub fn remove(&self, record: &mut BucketRecord) -> Result<()> {
        if let Err(e) = self.refresh_status(record) {
            warn!(bucket = %record.name, "could not refresh status before removal: {}", e);
        }
        if record.status == BucketStatus::Running {
            return Err(ResenError::InvalidState(format!(
                "Bucket '{}' is running, cannot remove",
                record.name
            )));
        }
        let Some(id) = record.container_ref.clone() else {
            return Ok(());
        };

        info!(bucket = %record.name, container = %id, "removing container");
        if !self.runtime.remove_container(&id)? {
            return Err(ResenError::RemovalFailure(format!(
                "container {} of bucket '{}' still exists",
                id, record.name
            )));
        }
        record.detach_container()
    }
}
