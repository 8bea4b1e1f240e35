//! Container runtime adapter
//!
//! The lifecycle code never talks to an engine directly; it goes through
//! [`ContainerRuntime`]. [`DockerCli`] drives the `docker` client binary.

mod docker;
#[cfg(test)]
pub(crate) mod fake;

use std::path::Path;

use crate::bucket::{BucketRecord, BucketStatus, ImageDescriptor, PortBinding, StorageBinding};
use crate::error::{ResenError, Result};

pub use docker::DockerCli;

/// Everything the engine needs to create a bucket's container
#[derive(Debug, Clone, PartialEq)]
pub struct ContainerSpec {
    pub bucket: String,
    pub image: ImageDescriptor,
    pub ports: Vec<PortBinding>,
    pub storage: Vec<StorageBinding>,
}

impl ContainerSpec {
    pub fn from_record(record: &BucketRecord) -> Result<Self> {
        let image = record
            .image
            .clone()
            .ok_or_else(|| ResenError::MissingImage(record.name.clone()))?;
        Ok(Self {
            bucket: record.name.clone(),
            image,
            ports: record.ports.clone(),
            storage: record.storage.clone(),
        })
    }
}

/// Result of running a command inside a container
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecOutput {
    /// `None` for detached commands that were launched successfully
    pub exit_code: Option<i64>,
    pub output: Vec<u8>,
}

impl ExecOutput {
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.output).into_owned()
    }
}

/// Lifecycle primitives of a container engine
pub trait ContainerRuntime {
    /// Create (but do not start) a container; returns its id and status.
    fn create_container(&self, spec: &ContainerSpec) -> Result<(String, BucketStatus)>;

    fn start_container(&self, container: &str) -> Result<BucketStatus>;

    fn stop_container(&self, container: &str) -> Result<BucketStatus>;

    /// Returns `true` once the engine no longer knows the container.
    fn remove_container(&self, container: &str) -> Result<bool>;

    fn execute_command(&self, container: &str, command: &str, detach: bool) -> Result<ExecOutput>;

    /// Current status; `NotFound` once the engine no longer knows the container.
    fn get_container_status(&self, container: &str) -> Result<BucketStatus>;

    /// Snapshot the container as image `tag` and save it to `path`.
    fn export_container(&self, container: &str, tag: &str, path: &Path) -> Result<bool>;

    /// Load an image archive, returning the local image id.
    fn import_image(&self, path: &Path) -> Result<String>;
}

/// Map an engine state string onto a bucket status.
pub fn parse_engine_state(state: &str) -> Result<BucketStatus> {
    match state.trim() {
        "created" => Ok(BucketStatus::Created),
        "running" | "restarting" | "paused" => Ok(BucketStatus::Running),
        "exited" | "dead" | "removing" => Ok(BucketStatus::Exited),
        other => Err(ResenError::Adapter(format!("Unknown container state '{}'", other))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_engine_state() {
        assert_eq!(parse_engine_state("running\n").unwrap(), BucketStatus::Running);
        assert_eq!(parse_engine_state("created").unwrap(), BucketStatus::Created);
        assert_eq!(parse_engine_state("dead").unwrap(), BucketStatus::Exited);
        assert!(parse_engine_state("bogus").is_err());
    }

    #[test]
    fn test_spec_requires_image() {
        let record = BucketRecord::new("lab");
        let err = ContainerSpec::from_record(&record).unwrap_err();
        assert!(matches!(err, ResenError::MissingImage(_)));
    }
}
