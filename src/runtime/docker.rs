//! `docker` command-line client adapter

use std::ffi::OsStr;
use std::path::Path;
use std::process::{Command, Output};

use tracing::{debug, info};

use super::{parse_engine_state, ContainerRuntime, ContainerSpec, ExecOutput};
use crate::bucket::BucketStatus;
use crate::error::{ResenError, Result};

/// Label attached to every container created for a bucket
pub const BUCKET_LABEL: &str = "org.resen.bucket";

#[derive(Debug, Clone)]
pub struct DockerCli {
    binary: String,
}

impl Default for DockerCli {
    fn default() -> Self {
        Self::new("docker")
    }
}

impl DockerCli {
    pub fn new(binary: impl Into<String>) -> Self {
        Self { binary: binary.into() }
    }

    fn run<I, S>(&self, args: I) -> Result<Output>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let mut cmd = Command::new(&self.binary);
        cmd.env_remove("DOCKER_API_VERSION").args(args);
        debug!(command = ?cmd, "running docker");
        cmd.output()
            .map_err(|e| ResenError::Adapter(format!("Failed to run '{}': {}", self.binary, e)))
    }

    /// Run a command that must succeed, returning trimmed stdout.
    fn run_ok<I, S>(&self, what: &str, args: I) -> Result<String>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let output = self.run(args)?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ResenError::Adapter(format!("docker {} failed: {}", what, stderr.trim())));
        }
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    fn image_present(&self, image: &str) -> Result<bool> {
        Ok(self.run(["image", "inspect", image])?.status.success())
    }

    /// Image id to create from, pulling the pinned reference when missing locally.
    fn ensure_image(&self, spec: &ContainerSpec) -> Result<String> {
        let image_id = &spec.image.image_id;
        if self.image_present(image_id)? {
            return Ok(image_id.clone());
        }
        let reference = spec.image.pull_reference.as_deref().ok_or_else(|| {
            ResenError::Adapter(format!("Image {} is not available locally", image_id))
        })?;
        info!(image = reference, "pulling image");
        self.run_ok("pull", ["pull", reference])?;
        Ok(image_id.clone())
    }

    fn create_args(spec: &ContainerSpec, image: &str) -> Vec<String> {
        let mut args = vec![
            "create".to_string(),
            "--interactive".to_string(),
            "--tty".to_string(),
            "--label".to_string(),
            format!("{}={}", BUCKET_LABEL, spec.bucket),
        ];
        for port in &spec.ports {
            let proto = if port.tcp { "" } else { "/udp" };
            args.push("--publish".to_string());
            args.push(format!("{}:{}{}", port.local, port.container, proto));
        }
        for mount in &spec.storage {
            args.push("--volume".to_string());
            args.push(format!(
                "{}:{}:{}",
                mount.local.display(),
                mount.container.display(),
                mount.permission
            ));
        }
        args.push(image.to_string());
        args
    }
}

impl ContainerRuntime for DockerCli {
    fn create_container(&self, spec: &ContainerSpec) -> Result<(String, BucketStatus)> {
        let image = self.ensure_image(spec)?;
        let id = self.run_ok("create", Self::create_args(spec, &image))?;
        if id.is_empty() {
            return Err(ResenError::Adapter("docker create returned no container id".to_string()));
        }
        let status = self.get_container_status(&id)?;
        Ok((id, status))
    }

    fn start_container(&self, container: &str) -> Result<BucketStatus> {
        self.run_ok("start", ["start", container])?;
        self.get_container_status(container)
    }

    fn stop_container(&self, container: &str) -> Result<BucketStatus> {
        self.run_ok("stop", ["stop", container])?;
        self.get_container_status(container)
    }

    fn remove_container(&self, container: &str) -> Result<bool> {
        let output = self.run(["rm", container])?;
        if !output.status.success() {
            debug!(container, stderr = %String::from_utf8_lossy(&output.stderr).trim(), "docker rm failed");
        }
        let gone = !self.run(["container", "inspect", container])?.status.success();
        Ok(gone)
    }

    fn execute_command(&self, container: &str, command: &str, detach: bool) -> Result<ExecOutput> {
        let mut args = vec!["exec"];
        if detach {
            args.push("--detach");
        }
        args.extend([container, "sh", "-c", command]);
        let output = self.run(&args)?;

        let mut combined = output.stdout;
        combined.extend_from_slice(&output.stderr);
        let code = output.status.code().map(i64::from);
        let exit_code = if detach && output.status.success() { None } else { code };
        Ok(ExecOutput {
            exit_code,
            output: combined,
        })
    }

    fn get_container_status(&self, container: &str) -> Result<BucketStatus> {
        let output = self.run(["container", "inspect", "--format", "{{.State.Status}}", container])?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            if is_missing_container(&stderr) {
                return Err(ResenError::NotFound(format!("No such container: {}", container)));
            }
            return Err(ResenError::Adapter(format!("docker inspect failed: {}", stderr.trim())));
        }
        parse_engine_state(&String::from_utf8_lossy(&output.stdout))
    }

    fn export_container(&self, container: &str, tag: &str, path: &Path) -> Result<bool> {
        self.run_ok("commit", ["commit", container, tag])?;
        let output = self.run([
            OsStr::new("save"),
            OsStr::new("--output"),
            path.as_os_str(),
            OsStr::new(tag),
        ])?;
        Ok(output.status.success() && path.exists())
    }

    fn import_image(&self, path: &Path) -> Result<String> {
        let loaded = self.run_ok("load", [OsStr::new("load"), OsStr::new("--input"), path.as_os_str()])?;
        let reference = parse_loaded_image(&loaded).ok_or_else(|| {
            ResenError::Adapter(format!("Could not find an image in docker load output: {}", loaded))
        })?;
        self.run_ok("image inspect", ["image", "inspect", "--format", "{{.Id}}", reference.as_str()])
    }
}

fn is_missing_container(stderr: &str) -> bool {
    stderr.contains("No such container") || stderr.contains("No such object")
}

/// Extract the image reference from `docker load` output.
fn parse_loaded_image(output: &str) -> Option<String> {
    output.lines().rev().find_map(|line| {
        line.strip_prefix("Loaded image ID: ")
            .or_else(|| line.strip_prefix("Loaded image: "))
            .map(|s| s.trim().to_string())
    })
}
