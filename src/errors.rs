//! Error types for the execution service

use std::io;
use thiserror::Error;

/// Result type for executor operations
pub type Result<T> = std::result::Result<T, ExecutorError>;

/// Errors surfaced to the caller before or outside a sandbox.
///
/// Failures *inside* a sandbox never appear here; they are converted to
/// [`crate::ExecutionOutcome`] variants by the orchestrator.
#[derive(Error, Debug)]
pub enum ExecutorError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Resource exhausted: {0}")]
    ResourceExhausted(String),

    #[error("Syscall error: {0}")]
    Syscall(String),

    #[error("Seccomp error: {0}")]
    Seccomp(String),

    #[error("Session error: {0}")]
    Session(String),
}
