//! Notebook server supervision
//!
//! A Jupyter Lab server is launched inside a running bucket with a detached
//! exec. There is no handle on the process afterwards: it is found again by
//! scanning the container's process list for its launch signature.

use std::thread;
use std::time::Duration;

use rand::RngCore;
use regex::Regex;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::bucket::{BucketRecord, BucketStatus, JupyterSession};
use crate::error::{ResenError, Result};
use crate::runtime::ContainerRuntime;

pub const PS_COMMAND: &str = "ps -ef";
pub const SESSION_HOST: &str = "localhost";

/// Random bytes in a session token (rendered as twice as many hex digits)
pub const TOKEN_BYTES: usize = 24;

const SIGNATURE: &str = r"jupyter[- ]lab.*--no-browser --ip 0\.0\.0\.0";
const ENV_ACTIVATE: &str = "source activate py36";
const ENV_PYTHON: &str = "/home/jovyan/envs/py36/bin/python";

/// How to reach a running notebook server
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionAccess {
    pub host: String,
    pub port: u16,
    pub token: String,
}

impl SessionAccess {
    fn from_session(session: &JupyterSession) -> Self {
        Self {
            host: SESSION_HOST.to_string(),
            port: session.local_port,
            token: session.token.clone(),
        }
    }

    pub fn url(&self) -> String {
        format!("http://{}:{}/?token={}", self.host, self.port, self.token)
    }
}

pub fn generate_token() -> String {
    let mut bytes = [0u8; TOKEN_BYTES];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

fn launch_command(container_port: u16, token: &str) -> String {
    format!(
        "bash -cl '{} && jupyter lab --no-browser --ip 0.0.0.0 --port {} --NotebookApp.token={} --KernelSpecManager.ensure_native_kernel=False'",
        ENV_ACTIVATE, container_port, token
    )
}

fn shutdown_command(container_port: u16) -> String {
    let script = format!(
        "from notebook.notebookapp import shutdown_server, list_running_servers; \
         svrs = [x for x in list_running_servers() if x[\\\"port\\\"] == {}]; \
         sts = True if len(svrs) == 0 else shutdown_server(svrs[0]); print(sts)",
        container_port
    );
    format!("bash -cl '{} -c \"{}\"'", ENV_PYTHON, script)
}

pub struct ProcessSupervisor<'a> {
    runtime: &'a dyn ContainerRuntime,
    settle: Duration,
    signature: Regex,
}

impl<'a> ProcessSupervisor<'a> {
    pub fn new(runtime: &'a dyn ContainerRuntime, settle: Duration) -> Result<Self> {
        let signature = Regex::new(SIGNATURE)
            .map_err(|e| ResenError::Validation(format!("Invalid session signature: {}", e)))?;
        Ok(Self {
            runtime,
            settle,
            signature,
        })
    }

    /// Pid of the notebook server running in the bucket, if any.
    pub fn find_session(&self, record: &BucketRecord) -> Result<Option<u32>> {
        if record.status != BucketStatus::Running {
            return Err(ResenError::InvalidState(format!(
                "Bucket '{}' is not running",
                record.name
            )));
        }
        let output = self
            .runtime
            .execute_command(record.container()?, PS_COMMAND, false)?;
        if output.exit_code != Some(0) {
            return Err(ResenError::Adapter(format!(
                "'{}' failed in bucket '{}' with exit code {:?}",
                PS_COMMAND, record.name, output.exit_code
            )));
        }
        Ok(self.scan(&output.text()))
    }

    fn scan(&self, listing: &str) -> Option<u32> {
        listing
            .lines()
            .filter(|line| self.signature.is_match(line))
            .find_map(|line| line.split_whitespace().nth(1)?.parse().ok())
    }

    /// Launch a notebook server, or return the one already running.
    pub fn start_session(
        &self,
        record: &mut BucketRecord,
        local_port: u16,
        container_port: u16,
    ) -> Result<SessionAccess> {
        if let Some(pid) = self.find_session(record)? {
            return match &record.jupyter_session {
                Some(session) => {
                    debug!(bucket = %record.name, pid, "notebook server already running");
                    Ok(SessionAccess::from_session(session))
                }
                None => Err(ResenError::Conflict(format!(
                    "A notebook server (pid {}) not started by resen is running in bucket '{}'",
                    pid, record.name
                ))),
            };
        }
        if !record
            .ports
            .iter()
            .any(|p| p.local == local_port && p.container == container_port)
        {
            warn!(bucket = %record.name, local_port, container_port, "port pair is not published by this bucket");
        }

        let token = generate_token();
        let output = self.runtime.execute_command(
            record.container()?,
            &launch_command(container_port, &token),
            true,
        )?;
        if let Some(code) = output.exit_code {
            return Err(ResenError::StartFailure(format!(
                "notebook launch in bucket '{}' exited with code {}",
                record.name, code
            )));
        }
        thread::sleep(self.settle);

        let Some(pid) = self.find_session(record)? else {
            return Err(ResenError::StartFailure(format!(
                "notebook server did not come up in bucket '{}'",
                record.name
            )));
        };
        info!(bucket = %record.name, pid, local_port, "notebook server started");
        let session = JupyterSession {
            token,
            local_port,
            container_port,
        };
        let access = SessionAccess::from_session(&session);
        record.jupyter_session = Some(session);
        Ok(access)
    }

    /// Shut the notebook server down; succeeds if none is running.
    pub fn stop_session(&self, record: &mut BucketRecord) -> Result<()> {
        if record.status != BucketStatus::Running {
            record.jupyter_session = None;
            return Ok(());
        }
        let Some(pid) = self.find_session(record)? else {
            record.jupyter_session = None;
            return Ok(());
        };

        let command = match &record.jupyter_session {
            Some(session) => shutdown_command(session.container_port),
            None => format!("kill {}", pid),
        };
        let output = self.runtime.execute_command(record.container()?, &command, false)?;
        debug!(bucket = %record.name, exit_code = ?output.exit_code, "ran notebook shutdown");
        thread::sleep(self.settle);

        if self.find_session(record)?.is_some() {
            return Err(ResenError::StopFailure(format!(
                "notebook server (pid {}) is still running in bucket '{}'",
                pid, record.name
            )));
        }
        info!(bucket = %record.name, pid, "notebook server stopped");
        record.jupyter_session = None;
        Ok(())
    }
}
