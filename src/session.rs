//! Sandbox session lifecycle
//!
//! One session owns one scratch directory and one child process. Teardown
//! is unconditional: dropping the session kills whatever is left of the
//! process group and removes the scratch tree, on every exit path.

use std::fs;
use std::path::Path;
use std::process::Child;

use log::{debug, warn};
use nix::sys::signal::{killpg, Signal};
use nix::unistd::Pid;
use tempfile::TempDir;
use uuid::Uuid;

use crate::capture::OutputCapture;
use crate::config::ExecutorConfig;
use crate::errors::{ExecutorError, Result};
use crate::isolation::{self, BoundaryConfig};
use crate::program;
use crate::request::{Capability, ExecutionRequest};

/// One isolated execution environment
pub struct SandboxSession {
    id: String,
    scratch: TempDir,
    child: Child,
    pgid: Pid,
}

impl SandboxSession {
    /// Create the scratch directory, write the program, spawn the child
    /// and start draining its output.
    pub fn create(
        config: &ExecutorConfig,
        request: &ExecutionRequest,
    ) -> Result<(Self, OutputCapture)> {
        fs::create_dir_all(&config.scratch_root)?;

        let scratch = tempfile::Builder::new()
            .prefix("session-")
            .tempdir_in(&config.scratch_root)?;
        let id = Uuid::new_v4().to_string();

        let program_text = program::assemble(request.code(), &config.preamble_imports);
        let script = scratch.path().join(program::SOURCE_FILE);
        fs::write(&script, &program_text)?;

        let boundary = BoundaryConfig {
            interpreter: config.interpreter.clone(),
            script,
            scratch: scratch.path().to_path_buf(),
            budget: *request.budget(),
            allow_network: request.allows(Capability::Network),
        };

        let mut child = isolation::spawn(&boundary)?;
        let pgid = Pid::from_raw(child.id() as i32);

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| ExecutorError::Session("child stdout not piped".to_string()))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| ExecutorError::Session("child stderr not piped".to_string()))?;
        let capture =
            OutputCapture::start(stdout, stderr, request.budget().max_output_bytes as usize);

        debug!("session {} created in {}", id, scratch.path().display());

        Ok((
            Self {
                id,
                scratch,
                child,
                pgid,
            },
            capture,
        ))
    }

    /// Session ID
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Scratch directory path
    pub fn scratch_path(&self) -> &Path {
        self.scratch.path()
    }

    /// Process group of the child (its own, via setsid)
    pub fn pgid(&self) -> Pid {
        self.pgid
    }

    /// Mutable handle to the child for supervision
    pub fn child_mut(&mut self) -> &mut Child {
        &mut self.child
    }

    /// Read the return channel, if the code wrote one
    pub fn read_return_value(&self) -> Option<String> {
        let text = fs::read_to_string(self.scratch.path().join(program::RESULT_FILE)).ok()?;
        if text.trim().is_empty() {
            None
        } else {
            Some(text)
        }
    }
}

impl Drop for SandboxSession {
    fn drop(&mut self) {
        let running = matches!(self.child.try_wait(), Ok(None) | Err(_));
        if running {
            if let Err(e) = killpg(self.pgid, Signal::SIGKILL) {
                debug!("session {}: killpg failed: {}", self.id, e);
            }
            if let Err(e) = self.child.wait() {
                warn!("session {}: failed to reap child: {}", self.id, e);
            }
        }
        // TempDir removes the scratch tree when it drops
    }
}
