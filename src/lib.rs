//! Resen - manage container-backed development buckets
//!
//! A bucket is a named, persistent description of a container: its core
//! image, published ports, and mounted host directories. Resen records
//! buckets in a JSON registry, drives their containers through the engine,
//! supervises a Jupyter Lab server inside them, and moves them between hosts
//! as portable bundles.
//!
//! # Example
//!
//! ```no_run
//! use resen::{config, BucketManager, DockerCli};
//!
//! let dir = config::config_dir(None).unwrap();
//! let mut manager = BucketManager::open(&dir, DockerCli::default()).unwrap();
//! manager.create_bucket("lab").unwrap();
//! manager.set_image("lab", "2019.1.0rc2").unwrap();
//! manager.start_bucket("lab").unwrap();
//! manager.close().unwrap();
//! ```

pub mod binder;
pub mod bucket;
pub mod bundle;
pub mod catalog;
pub mod cli;
pub mod config;
pub mod error;
pub mod lifecycle;
pub mod manager;
pub mod output;
pub mod repl;
pub mod runtime;
pub mod session;
pub mod telemetry;

pub use bucket::{BucketRecord, BucketStatus};
pub use error::{ErrorKind, ResenError, Result};
pub use manager::BucketManager;
pub use output::{format_output, OutputFormat, Report};
pub use runtime::{ContainerRuntime, DockerCli};
