//! Bucket record definitions
//!
//! A bucket is a named workspace backed by at most one container. Everything
//! the tool knows about a bucket lives in its [`BucketRecord`], which is
//! persisted verbatim in the registry document.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{ResenError, Result};

/// Relabeling marker appended to mount permissions on hosts enforcing SELinux
pub const RELABEL_MARKER: &str = "Z";

/// Lifecycle status of the container behind a bucket
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BucketStatus {
    /// No container exists
    #[default]
    Unset,
    Created,
    Running,
    Exited,
}

impl BucketStatus {
    /// Whether the controller may move a bucket from `self` to `next`.
    ///
    /// Staying in the same state is always allowed. Returning to `Unset`
    /// models container removal and is only possible while stopped.
    pub fn can_transition_to(self, next: BucketStatus) -> bool {
        use BucketStatus::*;
        self == next
            || matches!(
                (self, next),
                (Unset, Created)
                    | (Created, Running)
                    | (Running, Exited)
                    | (Exited, Running)
                    | (Created, Unset)
                    | (Exited, Unset)
            )
    }
}

impl fmt::Display for BucketStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BucketStatus::Unset => "unset",
            BucketStatus::Created => "created",
            BucketStatus::Running => "running",
            BucketStatus::Exited => "exited",
        };
        write!(f, "{}", s)
    }
}

/// Image assigned to a bucket
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageDescriptor {
    pub version: String,
    pub image_id: String,
    /// Reference the engine can pull from; absent for imported images
    pub pull_reference: Option<String>,
}

/// Published port of a bucket
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortBinding {
    pub local: u16,
    pub container: u16,
    pub tcp: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessMode {
    ReadOnly,
    ReadWrite,
}

/// Mount permission, e.g. `ro`, `rw` or `rw,Z`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Permission {
    pub mode: AccessMode,
    pub relabel: bool,
}

impl Permission {
    /// Parse a user-supplied permission token (`r`, `ro` or `rw`).
    pub fn from_token(token: &str) -> Result<Self> {
        let mode = match token {
            "r" | "ro" => AccessMode::ReadOnly,
            "rw" => AccessMode::ReadWrite,
            other => {
                return Err(ResenError::Validation(format!(
                    "Invalid permissions '{}'. Valid options are 'r' and 'rw'",
                    other
                )))
            }
        };
        Ok(Self { mode, relabel: false })
    }

    pub fn relabeled(self) -> Self {
        Self { relabel: true, ..self }
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mode = match self.mode {
            AccessMode::ReadOnly => "ro",
            AccessMode::ReadWrite => "rw",
        };
        if self.relabel {
            write!(f, "{},{}", mode, RELABEL_MARKER)
        } else {
            write!(f, "{}", mode)
        }
    }
}

impl FromStr for Permission {
    type Err = ResenError;

    /// Parse the stored form, which may carry the relabeling marker.
    fn from_str(s: &str) -> Result<Self> {
        match s.split_once(',') {
            Some((mode, marker)) if marker == RELABEL_MARKER => {
                Ok(Permission::from_token(mode)?.relabeled())
            }
            Some(_) => Err(ResenError::Validation(format!("Invalid permissions '{}'", s))),
            None => Permission::from_token(s),
        }
    }
}

impl TryFrom<String> for Permission {
    type Error = ResenError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<Permission> for String {
    fn from(value: Permission) -> Self {
        value.to_string()
    }
}

/// Host directory mounted into the bucket's container
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageBinding {
    pub local: PathBuf,
    pub container: PathBuf,
    pub permission: Permission,
}

/// Notebook server known to be running inside a bucket
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JupyterSession {
    pub token: String,
    pub local_port: u16,
    pub container_port: u16,
}

/// Everything recorded about one bucket
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BucketRecord {
    pub name: String,
    pub image: Option<ImageDescriptor>,
    pub container_ref: Option<String>,
    #[serde(default)]
    pub status: BucketStatus,
    #[serde(default)]
    pub ports: Vec<PortBinding>,
    #[serde(default)]
    pub storage: Vec<StorageBinding>,
    pub jupyter_session: Option<JupyterSession>,
    pub created_at: DateTime<Utc>,
}

impl BucketRecord {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            image: None,
            container_ref: None,
            status: BucketStatus::Unset,
            ports: Vec::new(),
            storage: Vec::new(),
            jupyter_session: None,
            created_at: Utc::now(),
        }
    }

    pub fn has_container(&self) -> bool {
        self.container_ref.is_some()
    }

    /// Container id, or `InvalidState` when no container was created yet
    pub fn container(&self) -> Result<&str> {
        self.container_ref.as_deref().ok_or_else(|| {
            ResenError::InvalidState(format!("Bucket '{}' has no container", self.name))
        })
    }

    /// Ports and mounts are fixed by the engine once the container exists.
    pub fn ensure_bindings_mutable(&self, what: &str) -> Result<()> {
        if self.has_container() {
            return Err(ResenError::InvalidState(format!(
                "Bucket '{}' has already been started, cannot change {}",
                self.name, what
            )));
        }
        Ok(())
    }

    /// Move to `next` following the lifecycle transition table.
    pub fn transition(&mut self, next: BucketStatus) -> Result<()> {
        if next != BucketStatus::Unset && self.container_ref.is_none() {
            return Err(ResenError::InvalidState(format!(
                "Bucket '{}' cannot be {} without a container",
                self.name, next
            )));
        }
        if !self.status.can_transition_to(next) {
            return Err(ResenError::InvalidState(format!(
                "Bucket '{}' cannot go from {} to {}",
                self.name, self.status, next
            )));
        }
        self.status = next;
        Ok(())
    }

    /// Record a status observed on the engine, bypassing the transition table.
    pub fn observe(&mut self, status: BucketStatus) {
        if self.container_ref.is_some() {
            self.status = status;
        }
    }

    pub fn attach_container(&mut self, id: String) {
        self.container_ref = Some(id);
    }

    pub fn detach_container(&mut self) -> Result<()> {
        self.transition(BucketStatus::Unset)?;
        self.container_ref = None;
        self.jupyter_session = None;
        Ok(())
    }

    /// Drop a container the engine no longer knows, whatever its cached status.
    pub fn forget_container(&mut self) {
        self.container_ref = None;
        self.status = BucketStatus::Unset;
        self.jupyter_session = None;
    }

    pub fn port(&self, local: u16) -> Option<&PortBinding> {
        self.ports.iter().find(|p| p.local == local)
    }

    pub fn storage_for(&self, local: &Path) -> Option<&StorageBinding> {
        self.storage.iter().find(|s| s.local == local)
    }
}
