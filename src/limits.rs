//! Wall-clock and memory supervision of a running session
//!
//! One limiter supervises exactly one child process. It polls at a bounded
//! interval and, on any violation, kills the child's whole process group
//! with SIGKILL — termination is never cooperative. Limiter state lives on
//! the supervising thread's stack and dies with the session.

use std::fs;
use std::process::Child;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use log::{debug, warn};
use nix::sys::signal::{killpg, Signal};
use nix::unistd::Pid;

use crate::errors::Result;
use crate::request::ResourceBudget;

/// Default polling interval for the supervision loop
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Caller-supplied cancellation signal.
///
/// Cancelling takes the same unconditional-termination path as a timeout.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request termination of the supervised session
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Why supervision ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LimitVerdict {
    /// The child exited on its own
    Exited { code: i32, signal: Option<i32> },
    /// Wall-clock budget exceeded, child killed
    Timeout,
    /// Memory budget exceeded, child killed
    MemoryExceeded,
    /// Output cap reached, child killed
    OutputTruncated,
    /// Cancellation flag fired, child killed
    Cancelled,
}

/// Summary of one supervision run
#[derive(Debug, Clone, Copy)]
pub struct SupervisionReport {
    pub verdict: LimitVerdict,
    pub wall_time: Duration,
    pub peak_rss_bytes: u64,
}

/// Supervise `child` until it exits or violates the budget.
///
/// The child is always reaped before this returns, so no zombie survives
/// the session. The loop is bounded by `budget.max_duration` plus one poll
/// interval of teardown overhead.
pub fn supervise(
    child: &mut Child,
    pgid: Pid,
    budget: &ResourceBudget,
    poll_interval: Duration,
    truncated: &AtomicBool,
    cancel: Option<&CancelFlag>,
) -> Result<SupervisionReport> {
    let start = Instant::now();
    let mut peak_rss_bytes = 0u64;

    let verdict = loop {
        if let Some(status) = child.try_wait()? {
            use std::os::unix::process::ExitStatusExt;
            let (code, signal) = match status.code() {
                Some(code) => (code, None),
                None => {
                    let sig = status.signal().unwrap_or(0);
                    (128 + sig, Some(sig))
                }
            };
            break LimitVerdict::Exited { code, signal };
        }

        if cancel.map(|c| c.is_cancelled()).unwrap_or(false) {
            kill_group(child, pgid);
            break LimitVerdict::Cancelled;
        }

        if truncated.load(Ordering::SeqCst) {
            debug!("output cap reached, stopping session early");
            kill_group(child, pgid);
            break LimitVerdict::OutputTruncated;
        }

        if start.elapsed() > budget.max_duration {
            kill_group(child, pgid);
            break LimitVerdict::Timeout;
        }

        if let Some(rss) = read_rss_bytes(child.id()) {
            if rss > peak_rss_bytes {
                peak_rss_bytes = rss;
            }
            if rss > budget.max_memory_bytes {
                kill_group(child, pgid);
                break LimitVerdict::MemoryExceeded;
            }
        }

        thread::sleep(poll_interval);
    };

    Ok(SupervisionReport {
        verdict,
        wall_time: start.elapsed(),
        peak_rss_bytes,
    })
}

/// SIGKILL the whole process group, then reap the direct child
fn kill_group(child: &mut Child, pgid: Pid) {
    if let Err(e) = killpg(pgid, Signal::SIGKILL) {
        // Group may already be gone between the check and the kill
        debug!("killpg({}) failed: {}", pgid, e);
    }
    if let Err(e) = child.wait() {
        warn!("failed to reap child {}: {}", child.id(), e);
    }
}

/// Resident set size of a process from /proc/<pid>/stat, in bytes.
///
/// Returns None when the process has already exited; the next `try_wait`
/// observes the exit.
fn read_rss_bytes(pid: u32) -> Option<u64> {
    let stat = fs::read_to_string(format!("/proc/{}/stat", pid)).ok()?;

    // Field 24 (1-based) is rss in pages; comm (field 2) may contain
    // spaces, so parse from the closing paren.
    let after_comm = stat.rsplit(')').next()?;
    let rss_pages: u64 = after_comm.split_whitespace().nth(21)?.parse().ok()?;

    let page_size = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };
    if page_size <= 0 {
        return None;
    }

    Some(rss_pages * page_size as u64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::unix::process::CommandExt;
    use std::process::{Command, Stdio};

    fn spawn_in_own_group(script: &str) -> Child {
        let mut cmd = Command::new("/bin/sh");
        cmd.arg("-c")
            .arg(script)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());
        unsafe {
            cmd.pre_exec(|| {
                if libc::setsid() == -1 {
                    return Err(std::io::Error::last_os_error());
                }
                Ok(())
            });
        }
        cmd.spawn().expect("spawn /bin/sh")
    }

    fn budget(duration_ms: u64) -> ResourceBudget {
        ResourceBudget::new(
            Duration::from_millis(duration_ms),
            512 * 1024 * 1024,
            64 * 1024,
        )
    }

    #[test]
    fn test_cancel_flag_starts_clear() {
        let flag = CancelFlag::new();
        assert!(!flag.is_cancelled());
        flag.cancel();
        assert!(flag.is_cancelled());
    }

    #[test]
    fn test_supervise_reports_clean_exit() {
        let mut child = spawn_in_own_group("exit 0");
        let pgid = Pid::from_raw(child.id() as i32);
        let not_truncated = AtomicBool::new(false);

        let report = supervise(
            &mut child,
            pgid,
            &budget(2_000),
            Duration::from_millis(10),
            &not_truncated,
            None,
        )
        .unwrap();

        assert_eq!(
            report.verdict,
            LimitVerdict::Exited {
                code: 0,
                signal: None
            }
        );
    }

    #[test]
    fn test_supervise_reports_nonzero_exit() {
        let mut child = spawn_in_own_group("exit 3");
        let pgid = Pid::from_raw(child.id() as i32);
        let not_truncated = AtomicBool::new(false);

        let report = supervise(
            &mut child,
            pgid,
            &budget(2_000),
            Duration::from_millis(10),
            &not_truncated,
            None,
        )
        .unwrap();

        assert_eq!(
            report.verdict,
            LimitVerdict::Exited {
                code: 3,
                signal: None
            }
        );
    }

    #[test]
    fn test_supervise_times_out_sleeping_child() {
        let mut child = spawn_in_own_group("sleep 30");
        let pgid = Pid::from_raw(child.id() as i32);
        let not_truncated = AtomicBool::new(false);

        let start = Instant::now();
        let report = supervise(
            &mut child,
            pgid,
            &budget(200),
            Duration::from_millis(10),
            &not_truncated,
            None,
        )
        .unwrap();

        assert_eq!(report.verdict, LimitVerdict::Timeout);
        assert!(start.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn test_supervise_honors_cancellation() {
        let mut child = spawn_in_own_group("sleep 30");
        let pgid = Pid::from_raw(child.id() as i32);
        let not_truncated = AtomicBool::new(false);
        let cancel = CancelFlag::new();
        cancel.cancel();

        let report = supervise(
            &mut child,
            pgid,
            &budget(10_000),
            Duration::from_millis(10),
            &not_truncated,
            Some(&cancel),
        )
        .unwrap();

        assert_eq!(report.verdict, LimitVerdict::Cancelled);
    }

    #[test]
    fn test_supervise_stops_on_truncation() {
        let mut child = spawn_in_own_group("sleep 30");
        let pgid = Pid::from_raw(child.id() as i32);
        let truncated = AtomicBool::new(true);

        let report = supervise(
            &mut child,
            pgid,
            &budget(10_000),
            Duration::from_millis(10),
            &truncated,
            None,
        )
        .unwrap();

        assert_eq!(report.verdict, LimitVerdict::OutputTruncated);
    }

    #[test]
    fn test_read_rss_of_current_process() {
        let rss = read_rss_bytes(std::process::id()).unwrap();
        assert!(rss > 0);
    }

    #[test]
    fn test_read_rss_of_missing_process() {
        assert!(read_rss_bytes(9_999_999).is_none());
    }
}
