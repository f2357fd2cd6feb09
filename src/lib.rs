//! code-executor: sandboxed execution of generated Python snippets
//!
//! A query pipeline hands this crate code that answers a "needs precise
//! computation" question; the crate runs it in an isolated process under a
//! strict resource budget and returns a typed outcome. Every failure mode
//! inside the sandbox is contained and reported; nothing the executed code
//! does can block or crash the host.
//!
//! # Modules
//!
//! - **executor**: top-level orchestration (`execute` → `ExecutionOutcome`)
//! - **isolation**: process boundary, rlimits, seccomp, namespaces
//! - **limits**: polling limiter enforcing wall-clock and memory budgets
//! - **capture**: bounded draining of child stdout/stderr
//! - **session**: scratch directory + child lifecycle, unconditional teardown
//! - **screen**: static safety screen applied before execution
//! - **admission**: concurrent-session admission control
//! - **classify**: detection of queries that need computation
//!
//! # Example
//!
//! ```ignore
//! use code_executor::{Executor, ExecutorConfig, ExecutionRequest, ResourceBudget};
//! use std::time::Duration;
//!
//! let executor = Executor::new(ExecutorConfig::default())?;
//! let budget = ResourceBudget::new(Duration::from_secs(2), 50 << 20, 1024);
//! let outcome = executor.execute(&ExecutionRequest::new("print(2+2)", budget))?;
//! println!("{}", outcome.status());
//! ```

// Core modules
pub mod errors;
pub mod utils;

// Request/response model
pub mod outcome;
pub mod request;

// Layered modules
pub mod admission;
pub mod capture;
pub mod classify;
pub mod config;
pub mod isolation;
pub mod limits;
pub mod program;
pub mod screen;
pub mod session;

// Main orchestrator
pub mod executor;

// Public API
pub use admission::{AdmissionController, AdmissionPermit};
pub use capture::{CapturedOutput, OutputCapture};
pub use config::{ExecutorConfig, ServiceConfig};
pub use errors::{ExecutorError, Result};
pub use executor::Executor;
pub use limits::{CancelFlag, LimitVerdict, SupervisionReport};
pub use outcome::ExecutionOutcome;
pub use request::{Capability, ExecutionRequest, ResourceBudget};
pub use session::SandboxSession;


#[cfg(test)]
pub mod test_support {
    use std::process::{Command, Stdio};
    use std::sync::{Mutex, MutexGuard, OnceLock};

    pub fn serial_guard() -> MutexGuard<'static, ()> {
        static LOCK: OnceLock<Mutex<()>> = OnceLock::new();
        LOCK.get_or_init(|| Mutex::new(()))
            .lock()
            .unwrap_or_else(|poison| poison.into_inner())
    }

    /// Tests that execute real Python skip themselves on hosts without an
    /// interpreter.
    pub fn python_available() -> bool {
        Command::new("python3")
            .arg("--version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map(|status| status.success())
            .unwrap_or(false)
    }
}
