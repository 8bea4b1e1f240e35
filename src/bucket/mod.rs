//! Bucket records and the registry holding them
//!
//! A bucket carries:
//! - An optional image, assigned once before the container exists
//! - Port and storage bindings, frozen when the container is created
//! - The cached lifecycle status of its container
//! - The notebook session known to run inside it

mod record;
mod registry;

pub use record::{
    AccessMode, BucketRecord, BucketStatus, ImageDescriptor, JupyterSession, Permission,
    PortBinding, StorageBinding, RELABEL_MARKER,
};
pub use registry::BucketRegistry;
