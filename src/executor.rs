//! Executor orchestration
//!
//! Drives one request through validate → screen → admit → spawn →
//! supervise → classify. Every failure inside the sandbox becomes an
//! [`ExecutionOutcome`] variant; only malformed requests and admission
//! refusals surface as errors, and those never consume a sandbox.

use log::{debug, info, warn};

use crate::admission::AdmissionController;
use crate::capture::CapturedOutput;
use crate::config::ExecutorConfig;
use crate::errors::Result;
use crate::limits::{self, CancelFlag, LimitVerdict, SupervisionReport};
use crate::outcome::ExecutionOutcome;
use crate::request::{Capability, ExecutionRequest};
use crate::screen;
use crate::session::SandboxSession;
use crate::utils;

/// Top-level execution API.
///
/// Shared-state free apart from the admission counter, so one `Executor`
/// serves concurrent callers; each call gets its own session, and sessions
/// never share scratch state.
pub struct Executor {
    config: ExecutorConfig,
    admission: AdmissionController,
}

impl Executor {
    /// Create an executor after validating its configuration
    pub fn new(config: ExecutorConfig) -> Result<Self> {
        config.validate()?;
        let admission = AdmissionController::new(config.max_sessions);
        Ok(Self { config, admission })
    }

    /// Executor configuration
    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    /// Admission state, for health reporting
    pub fn admission(&self) -> &AdmissionController {
        &self.admission
    }

    /// Execute a request to completion
    pub fn execute(&self, request: &ExecutionRequest) -> Result<ExecutionOutcome> {
        self.execute_with_cancel(request, None)
    }

    /// Execute a request, honoring a caller-supplied cancellation flag.
    ///
    /// Cancellation takes the same forced-termination path as a timeout and
    /// carries the same teardown guarantee.
    pub fn execute_with_cancel(
        &self,
        request: &ExecutionRequest,
        cancel: Option<&CancelFlag>,
    ) -> Result<ExecutionOutcome> {
        request.validate()?;

        if let Err(reason) = screen::check(request.code(), request.allows(Capability::Network)) {
            warn!("request rejected by safety screen: {}", reason);
            return Ok(ExecutionOutcome::Rejected { reason });
        }

        let _permit = self.admission.try_acquire()?;

        let (mut session, capture) = SandboxSession::create(&self.config, request)?;
        debug!(
            "session {} supervising pid {}",
            session.id(),
            session.pgid()
        );

        let truncated = capture.truncation_flag();
        let report = limits::supervise(
            session.child_mut(),
            session.pgid(),
            request.budget(),
            self.config.poll_interval,
            &truncated,
            cancel,
        )?;
        let output = capture.finish();

        let outcome = classify(&report, output, &session);
        info!(
            "session {} finished: {} ({} ms, peak rss {} bytes)",
            session.id(),
            outcome.status(),
            report.wall_time.as_millis(),
            report.peak_rss_bytes
        );

        Ok(outcome)
        // session drops here: process group killed if alive, scratch removed
    }
}

/// Map a supervision report and captured output onto exactly one outcome
fn classify(
    report: &SupervisionReport,
    output: CapturedOutput,
    session: &SandboxSession,
) -> ExecutionOutcome {
    let stdout = utils::sanitize_output(&output.stdout);
    let stderr = utils::sanitize_output(&output.stderr);

    match report.verdict {
        LimitVerdict::Cancelled => ExecutionOutcome::Cancelled,
        LimitVerdict::Timeout => ExecutionOutcome::Timeout,
        LimitVerdict::MemoryExceeded => ExecutionOutcome::MemoryExceeded,
        LimitVerdict::OutputTruncated => ExecutionOutcome::OutputTruncated { partial: stdout },
        LimitVerdict::Exited { code, signal } => {
            if output.truncated {
                return ExecutionOutcome::OutputTruncated { partial: stdout };
            }

            if code == 0 && signal.is_none() {
                return ExecutionOutcome::Success {
                    stdout,
                    return_value: session.read_return_value(),
                };
            }

            if let Some(sig) = signal {
                return ExecutionOutcome::RuntimeError {
                    message: format!("process terminated by signal {}", sig),
                    stacktrace: stderr,
                };
            }

            // The interpreter hit the address-space backstop before the
            // poller saw the growth
            if stderr.contains("MemoryError") {
                return ExecutionOutcome::MemoryExceeded;
            }

            ExecutionOutcome::RuntimeError {
                message: last_nonempty_line(&stderr),
                stacktrace: stderr,
            }
        }
    }
}

fn last_nonempty_line(text: &str) -> String {
    text.lines()
        .rev()
        .find(|line| !line.trim().is_empty())
        .unwrap_or("process exited with a nonzero status")
        .to_string()
}
