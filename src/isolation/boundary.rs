//! Child process spawn with the sandbox applied
//!
//! The child is placed in its own session (so the limiter can kill the
//! whole tree), gets a scrubbed environment and the scratch directory as
//! working directory, and applies rlimit backstops plus the seccomp network
//! filter between fork and exec. Namespace unsharing is added when running
//! as root; without root the process boundary and seccomp still hold.

use std::io;
use std::os::unix::process::CommandExt;
use std::path::PathBuf;
use std::process::{Child, Command, Stdio};

use log::warn;
use nix::sched::{unshare, CloneFlags};

use crate::errors::{ExecutorError, Result};
use crate::isolation::seccomp;
use crate::request::ResourceBudget;
use crate::utils;

/// Address-space backstop factor over the memory budget.
///
/// The polling limiter enforces the exact budget; the rlimit only has to
/// stop a runaway allocation between two polls.
const ADDRESS_SPACE_FACTOR: u64 = 2;

/// Everything needed to spawn one sandboxed child
#[derive(Debug, Clone)]
pub struct BoundaryConfig {
    /// Interpreter binary
    pub interpreter: PathBuf,
    /// Script to execute, inside the scratch directory
    pub script: PathBuf,
    /// Scratch directory, the child's working directory
    pub scratch: PathBuf,
    /// Budget the rlimit backstops are derived from
    pub budget: ResourceBudget,
    /// Whether the request granted network access
    pub allow_network: bool,
}

/// Resource limits applied in the child before exec (unprivileged
/// enforcement path)
#[derive(Debug, Clone, Copy, Default)]
pub struct RlimitSet {
    /// Maximum address space size in bytes (RLIMIT_AS)
    pub max_address_space: Option<u64>,
    /// Maximum CPU time in seconds (RLIMIT_CPU)
    pub max_cpu_seconds: Option<u64>,
    /// Maximum number of processes (RLIMIT_NPROC)
    pub max_processes: Option<u64>,
    /// Maximum file size in bytes (RLIMIT_FSIZE)
    pub max_file_size: Option<u64>,
    /// Maximum number of open files (RLIMIT_NOFILE)
    pub max_open_files: Option<u64>,
}

impl RlimitSet {
    /// Derive backstops from a request budget
    pub fn for_budget(budget: &ResourceBudget) -> Self {
        let cpu_seconds = budget.max_duration.as_secs().saturating_add(2);
        Self {
            max_address_space: budget
                .max_memory_bytes
                .checked_mul(ADDRESS_SPACE_FACTOR)
                .or(Some(u64::MAX)),
            max_cpu_seconds: Some(cpu_seconds),
            max_processes: Some(16),
            max_file_size: Some(16 * 1024 * 1024),
            max_open_files: Some(64),
        }
    }

    /// Apply the limits to the current process; runs in the child between
    /// fork and exec
    pub fn apply(&self) -> io::Result<()> {
        if let Some(mem) = self.max_address_space {
            set_rlimit(libc::RLIMIT_AS, mem)?;
        }
        if let Some(cpu) = self.max_cpu_seconds {
            set_rlimit(libc::RLIMIT_CPU, cpu)?;
        }
        if let Some(nproc) = self.max_processes {
            set_rlimit(libc::RLIMIT_NPROC, nproc)?;
        }
        if let Some(fsize) = self.max_file_size {
            set_rlimit(libc::RLIMIT_FSIZE, fsize)?;
        }
        if let Some(nofile) = self.max_open_files {
            set_rlimit(libc::RLIMIT_NOFILE, nofile)?;
        }
        Ok(())
    }
}

fn set_rlimit(resource: libc::__rlimit_resource_t, limit: u64) -> io::Result<()> {
    let rlim = libc::rlimit {
        rlim_cur: limit,
        rlim_max: limit,
    };

    let ret = unsafe { libc::setrlimit(resource, &rlim) };
    if ret != 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}

/// Spawn the interpreter inside the sandbox with piped stdout/stderr
pub fn spawn(config: &BoundaryConfig) -> Result<Child> {
    let rlimits = RlimitSet::for_budget(&config.budget);

    let filter = if config.allow_network {
        None
    } else {
        let filter = seccomp::network_deny_filter();
        if filter.is_none() {
            warn!("no seccomp syscall table for this architecture, relying on namespaces");
        }
        filter
    };

    let use_namespaces = utils::is_root();
    if !use_namespaces {
        warn!("running without namespace isolation (not root)");
    }
    let unshare_flags = namespace_flags(config.allow_network);

    let mut cmd = Command::new(&config.interpreter);
    cmd.arg(&config.script)
        .current_dir(&config.scratch)
        .env_clear()
        .env("PATH", "/usr/local/bin:/usr/bin:/bin")
        .env("HOME", &config.scratch)
        .env("LANG", "C.UTF-8")
        .env("PYTHONDONTWRITEBYTECODE", "1")
        .env("PYTHONUNBUFFERED", "1")
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    unsafe {
        cmd.pre_exec(move || {
            // Own session so the supervisor can kill the whole tree
            if libc::setsid() == -1 {
                return Err(io::Error::last_os_error());
            }

            if use_namespaces {
                unshare(unshare_flags)
                    .map_err(|e| io::Error::from_raw_os_error(e as i32))?;
            }

            rlimits.apply()?;

            if let Some(ref filter) = filter {
                seccomp::load(filter)?;
            }

            Ok(())
        });
    }

    cmd.spawn().map_err(|e| {
        ExecutorError::Session(format!(
            "Failed to spawn interpreter {}: {}",
            config.interpreter.display(),
            e
        ))
    })
}

/// Namespaces to unshare when running as root
fn namespace_flags(allow_network: bool) -> CloneFlags {
    let mut flags = CloneFlags::CLONE_NEWNS | CloneFlags::CLONE_NEWIPC | CloneFlags::CLONE_NEWUTS;
    if !allow_network {
        flags |= CloneFlags::CLONE_NEWNET;
    }
    flags
}
