//! Typed outcomes of one execution

use serde::{Deserialize, Serialize};

/// Result of one execution request.
///
/// Exactly one variant is produced per request, and producing it ends the
/// request's lifecycle; there is no streaming or partial delivery beyond
/// `OutputTruncated`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ExecutionOutcome {
    /// The code ran to completion with exit status zero
    Success {
        /// Captured standard output (sanitized)
        stdout: String,
        /// Value written to the return channel, if any (JSON text)
        return_value: Option<String>,
    },
    /// Wall-clock budget exceeded; the session was forcibly terminated
    Timeout,
    /// Memory budget exceeded; the session was forcibly terminated
    MemoryExceeded,
    /// The code raised an error or was killed by a signal
    RuntimeError {
        /// Short description, usually the final traceback line
        message: String,
        /// Full captured standard error
        stacktrace: String,
    },
    /// Output budget exceeded; `partial` holds exactly the first
    /// `max_output_bytes` of standard output
    OutputTruncated { partial: String },
    /// The static safety screen refused the code before any sandbox existed
    Rejected { reason: String },
    /// A caller-supplied cancellation fired; same termination path as Timeout
    Cancelled,
}

impl ExecutionOutcome {
    /// Whether the execution completed normally
    pub fn is_success(&self) -> bool {
        matches!(self, ExecutionOutcome::Success { .. })
    }

    /// Stable machine-readable label for logs and wire formats
    pub fn status(&self) -> &'static str {
        match self {
            ExecutionOutcome::Success { .. } => "success",
            ExecutionOutcome::Timeout => "timeout",
            ExecutionOutcome::MemoryExceeded => "memory_exceeded",
            ExecutionOutcome::RuntimeError { .. } => "runtime_error",
            ExecutionOutcome::OutputTruncated { .. } => "output_truncated",
            ExecutionOutcome::Rejected { .. } => "rejected",
            ExecutionOutcome::Cancelled => "cancelled",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_success() {
        let outcome = ExecutionOutcome::Success {
            stdout: "4\n".to_string(),
            return_value: None,
        };
        assert!(outcome.is_success());
        assert!(!ExecutionOutcome::Timeout.is_success());
    }

    #[test]
    fn test_status_labels() {
        assert_eq!(ExecutionOutcome::Timeout.status(), "timeout");
        assert_eq!(ExecutionOutcome::MemoryExceeded.status(), "memory_exceeded");
        assert_eq!(ExecutionOutcome::Cancelled.status(), "cancelled");
    }

    #[test]
    fn test_serialized_tag() {
        let outcome = ExecutionOutcome::OutputTruncated {
            partial: "abc".to_string(),
        };
        let json = serde_json::to_string(&outcome).unwrap();
        assert!(json.contains("\"status\":\"output_truncated\""));
        assert!(json.contains("\"partial\":\"abc\""));
    }

    #[test]
    fn test_runtime_error_round_trip() {
        let outcome = ExecutionOutcome::RuntimeError {
            message: "ZeroDivisionError: division by zero".to_string(),
            stacktrace: "Traceback...".to_string(),
        };
        let json = serde_json::to_string(&outcome).unwrap();
        let back: ExecutionOutcome = serde_json::from_str(&json).unwrap();
        assert_eq!(outcome, back);
    }
}
