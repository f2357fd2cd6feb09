//! Execution requests and resource budgets

use std::collections::BTreeSet;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::errors::{ExecutorError, Result};

/// Capability a request may grant to the executed code.
///
/// The default set is empty: no network, nothing beyond the scratch
/// directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    /// Outbound network access from inside the sandbox
    Network,
}

/// Resource ceiling applied to one execution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceBudget {
    /// Maximum wall-clock duration
    pub max_duration: Duration,
    /// Maximum resident memory in bytes
    pub max_memory_bytes: u64,
    /// Maximum captured output in bytes
    pub max_output_bytes: u64,
}

impl ResourceBudget {
    /// Create a budget from explicit limits
    pub fn new(max_duration: Duration, max_memory_bytes: u64, max_output_bytes: u64) -> Self {
        Self {
            max_duration,
            max_memory_bytes,
            max_output_bytes,
        }
    }

    /// Validate that every limit is positive
    pub fn validate(&self) -> Result<()> {
        if self.max_duration.is_zero() {
            return Err(ExecutorError::InvalidRequest(
                "Budget max_duration must be positive".to_string(),
            ));
        }

        if self.max_memory_bytes == 0 {
            return Err(ExecutorError::InvalidRequest(
                "Budget max_memory_bytes must be positive".to_string(),
            ));
        }

        if self.max_output_bytes == 0 {
            return Err(ExecutorError::InvalidRequest(
                "Budget max_output_bytes must be positive".to_string(),
            ));
        }

        Ok(())
    }
}

impl Default for ResourceBudget {
    fn default() -> Self {
        Self {
            max_duration: Duration::from_secs(5),
            max_memory_bytes: 128 * 1024 * 1024,
            max_output_bytes: 64 * 1024,
        }
    }
}

/// One submission of generated code plus its budget.
///
/// Immutable once constructed; the fields are only readable through
/// accessors so a request cannot be altered while in flight.
#[derive(Debug, Clone)]
pub struct ExecutionRequest {
    code: String,
    budget: ResourceBudget,
    capabilities: BTreeSet<Capability>,
}

impl ExecutionRequest {
    /// Create a request with an empty capability set
    pub fn new(code: impl Into<String>, budget: ResourceBudget) -> Self {
        Self {
            code: code.into(),
            budget,
            capabilities: BTreeSet::new(),
        }
    }

    /// Grant an additional capability
    pub fn with_capability(mut self, capability: Capability) -> Self {
        self.capabilities.insert(capability);
        self
    }

    /// The code text to execute
    pub fn code(&self) -> &str {
        &self.code
    }

    /// The resource budget for this request
    pub fn budget(&self) -> &ResourceBudget {
        &self.budget
    }

    /// Check whether a capability was granted
    pub fn allows(&self, capability: Capability) -> bool {
        self.capabilities.contains(&capability)
    }

    /// Validate the request before any resource is consumed
    pub fn validate(&self) -> Result<()> {
        if self.code.trim().is_empty() {
            return Err(ExecutorError::InvalidRequest(
                "Code text cannot be empty".to_string(),
            ));
        }

        self.budget.validate()
    }
}
