//! In-memory engine used by the unit tests

use std::cell::RefCell;
use std::collections::HashMap;
use std::fs;
use std::path::Path;

use super::{ContainerRuntime, ContainerSpec, ExecOutput};
use crate::bucket::BucketStatus;
use crate::error::{ResenError, Result};
use crate::session::PS_COMMAND;

const PS_HEADER: &str = "UID        PID  PPID  C STIME TTY          TIME CMD";
const SESSION_PID: u32 = 57;

#[derive(Debug)]
struct FakeContainer {
    status: BucketStatus,
    session: Option<String>,
}

#[derive(Debug)]
struct FakeState {
    next_id: u32,
    containers: HashMap<String, FakeContainer>,
    created: Vec<ContainerSpec>,
    commands: Vec<String>,
    fail_start: bool,
    fail_stop: bool,
    fail_remove: bool,
    sessions_launch: bool,
    sessions_stop: bool,
    stop_calls: usize,
    imported: usize,
}

impl Default for FakeState {
    fn default() -> Self {
        Self {
            next_id: 1,
            containers: HashMap::new(),
            created: Vec::new(),
            commands: Vec::new(),
            fail_start: false,
            fail_stop: false,
            fail_remove: false,
            sessions_launch: true,
            sessions_stop: true,
            stop_calls: 0,
            imported: 0,
        }
    }
}

#[derive(Debug, Default)]
pub(crate) struct FakeRuntime {
    state: RefCell<FakeState>,
}

impl FakeRuntime {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_start(&self) {
        self.state.borrow_mut().fail_start = true;
    }

    pub fn fail_stop(&self) {
        self.state.borrow_mut().fail_stop = true;
    }

    pub fn fail_remove(&self) {
        self.state.borrow_mut().fail_remove = true;
    }

    /// Launch commands succeed but no server process ever shows up.
    pub fn refuse_sessions(&self) {
        self.state.borrow_mut().sessions_launch = false;
    }

    /// Shutdown commands run but the server keeps running.
    pub fn keep_sessions_alive(&self) {
        self.state.borrow_mut().sessions_stop = false;
    }

    /// Change a container's state behind the tool's back.
    pub fn set_status(&self, id: &str, status: BucketStatus) {
        if let Some(c) = self.state.borrow_mut().containers.get_mut(id) {
            c.status = status;
        }
    }

    /// Delete a container behind the tool's back.
    pub fn delete_container(&self, id: &str) {
        self.state.borrow_mut().containers.remove(id);
    }

    pub fn stop_calls(&self) -> usize {
        self.state.borrow().stop_calls
    }

    pub fn container_count(&self) -> usize {
        self.state.borrow().containers.len()
    }

    pub fn created_specs(&self) -> Vec<ContainerSpec> {
        self.state.borrow().created.clone()
    }

    pub fn commands(&self) -> Vec<String> {
        self.state.borrow().commands.clone()
    }
}

impl ContainerRuntime for FakeRuntime {
    fn create_container(&self, spec: &ContainerSpec) -> Result<(String, BucketStatus)> {
        let mut state = self.state.borrow_mut();
        let id = format!("container{}", state.next_id);
        state.next_id += 1;
        state.created.push(spec.clone());
        state.containers.insert(
            id.clone(),
            FakeContainer {
                status: BucketStatus::Created,
                session: None,
            },
        );
        Ok((id, BucketStatus::Created))
    }

    fn start_container(&self, container: &str) -> Result<BucketStatus> {
        let mut state = self.state.borrow_mut();
        let fail = state.fail_start;
        let c = state
            .containers
            .get_mut(container)
            .ok_or_else(|| ResenError::Adapter(format!("No such container: {}", container)))?;
        if !fail {
            c.status = BucketStatus::Running;
        }
        Ok(c.status)
    }

    fn stop_container(&self, container: &str) -> Result<BucketStatus> {
        let mut state = self.state.borrow_mut();
        state.stop_calls += 1;
        let fail = state.fail_stop;
        let c = state
            .containers
            .get_mut(container)
            .ok_or_else(|| ResenError::Adapter(format!("No such container: {}", container)))?;
        if !fail {
            c.status = BucketStatus::Exited;
            c.session = None;
        }
        Ok(c.status)
    }

    fn remove_container(&self, container: &str) -> Result<bool> {
        let mut state = self.state.borrow_mut();
        if state.fail_remove {
            return Ok(false);
        }
        Ok(state.containers.remove(container).is_some())
    }

    fn execute_command(&self, container: &str, command: &str, detach: bool) -> Result<ExecOutput> {
        let mut state = self.state.borrow_mut();
        state.commands.push(command.to_string());
        let launches = state.sessions_launch;
        let stops = state.sessions_stop;
        let c = state
            .containers
            .get_mut(container)
            .filter(|c| c.status == BucketStatus::Running)
            .ok_or_else(|| ResenError::Adapter(format!("Container {} is not running", container)))?;

        let mut output = String::new();
        if command == PS_COMMAND {
            output.push_str(PS_HEADER);
            output.push('\n');
            output.push_str("jovyan       1     0  0 10:00 pts/0    00:00:00 /bin/bash\n");
            if let Some(line) = &c.session {
                output.push_str(line);
                output.push('\n');
            }
        } else if command.contains("jupyter lab --no-browser") {
            if launches {
                c.session = Some(format!(
                    "jovyan      {}     1  0 10:00 ?        00:00:02 {}",
                    SESSION_PID, command
                ));
            }
        } else if command.contains("shutdown_server") || command.starts_with("kill ") {
            if stops {
                c.session = None;
            }
            output.push_str("True\n");
        }

        Ok(ExecOutput {
            exit_code: if detach { None } else { Some(0) },
            output: output.into_bytes(),
        })
    }

    fn get_container_status(&self, container: &str) -> Result<BucketStatus> {
        self.state
            .borrow()
            .containers
            .get(container)
            .map(|c| c.status)
            .ok_or_else(|| ResenError::NotFound(format!("No such container: {}", container)))
    }

    fn export_container(&self, container: &str, tag: &str, path: &Path) -> Result<bool> {
        if !self.state.borrow().containers.contains_key(container) {
            return Ok(false);
        }
        fs::write(path, format!("image {}", tag))?;
        Ok(true)
    }

    fn import_image(&self, path: &Path) -> Result<String> {
        if !path.is_file() {
            return Err(ResenError::Adapter(format!("No image archive at {}", path.display())));
        }
        let mut state = self.state.borrow_mut();
        state.imported += 1;
        Ok(format!("sha256:imported{}", state.imported))
    }
}
