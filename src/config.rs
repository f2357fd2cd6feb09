//! Executor and service configuration
//!
//! Defaults work out of the box; every knob has an environment override so
//! deployments tune the service without code changes.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use log::warn;

use crate::errors::{ExecutorError, Result};
use crate::limits::DEFAULT_POLL_INTERVAL;
use crate::program;
use crate::request::ResourceBudget;
use crate::utils;

/// Configuration of the executor itself
#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    /// Directory under which per-session scratch directories are created
    pub scratch_root: PathBuf,
    /// Interpreter binary, resolved via PATH when not absolute
    pub interpreter: PathBuf,
    /// Supervision polling interval
    pub poll_interval: Duration,
    /// Maximum concurrently active sessions (admission control)
    pub max_sessions: usize,
    /// Imports prepended to every submitted snippet
    pub preamble_imports: Vec<String>,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            scratch_root: env::temp_dir().join("code-executor"),
            interpreter: PathBuf::from("python3"),
            poll_interval: DEFAULT_POLL_INTERVAL,
            max_sessions: 8,
            preamble_imports: program::default_imports(),
        }
    }
}

impl ExecutorConfig {
    /// Build from environment overrides on top of the defaults
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(root) = env::var("EXECUTOR_SCRATCH_ROOT") {
            config.scratch_root = PathBuf::from(root);
        }
        if let Ok(interpreter) = env::var("EXECUTOR_INTERPRETER") {
            config.interpreter = PathBuf::from(interpreter);
        }
        if let Some(ms) = parse_env_u64("EXECUTOR_POLL_INTERVAL_MS") {
            config.poll_interval = Duration::from_millis(ms);
        }
        if let Some(max) = parse_env_u64("EXECUTOR_MAX_SESSIONS") {
            config.max_sessions = max as usize;
        }

        config
    }

    /// Validate configuration invariants
    pub fn validate(&self) -> Result<()> {
        if self.max_sessions == 0 {
            return Err(ExecutorError::InvalidConfig(
                "max_sessions must be at least 1".to_string(),
            ));
        }

        if self.poll_interval.is_zero() {
            return Err(ExecutorError::InvalidConfig(
                "poll_interval must be positive".to_string(),
            ));
        }

        Ok(())
    }
}

/// Configuration of the REST service wrapping the executor
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub executor: ExecutorConfig,
    pub host: String,
    pub port: u16,
    /// Budget applied when a request leaves limits unspecified
    pub default_budget: ResourceBudget,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            executor: ExecutorConfig::default(),
            host: "127.0.0.1".to_string(),
            port: 8080,
            default_budget: ResourceBudget::default(),
        }
    }
}

impl ServiceConfig {
    /// Build from environment overrides on top of the defaults
    pub fn from_env() -> Self {
        let mut config = Self {
            executor: ExecutorConfig::from_env(),
            ..Default::default()
        };

        if let Ok(host) = env::var("EXECUTOR_HOST") {
            config.host = host;
        }
        if let Some(port) = parse_env_u64("EXECUTOR_PORT") {
            config.port = port as u16;
        }
        if let Some(secs) = parse_env_u64("EXECUTOR_DEFAULT_MAX_DURATION_SECS") {
            config.default_budget.max_duration = Duration::from_secs(secs);
        }
        if let Ok(mem) = env::var("EXECUTOR_DEFAULT_MAX_MEMORY") {
            match utils::parse_memory_size(&mem) {
                Ok(bytes) => config.default_budget.max_memory_bytes = bytes,
                Err(e) => warn!("ignoring EXECUTOR_DEFAULT_MAX_MEMORY: {}", e),
            }
        }
        if let Some(bytes) = parse_env_u64("EXECUTOR_DEFAULT_MAX_OUTPUT_BYTES") {
            config.default_budget.max_output_bytes = bytes;
        }

        config
    }
}

fn parse_env_u64(key: &str) -> Option<u64> {
    let value = env::var(key).ok()?;
    match value.parse() {
        Ok(parsed) => Some(parsed),
        Err(_) => {
            warn!("ignoring {}: not a number: {}", key, value);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::serial_guard;

    struct EnvVarGuard {
        key: &'static str,
        prev: Option<String>,
    }

    impl EnvVarGuard {
        fn new(key: &'static str, value: &str) -> Self {
            let prev = env::var(key).ok();
            env::set_var(key, value);
            Self { key, prev }
        }
    }

    impl Drop for EnvVarGuard {
        fn drop(&mut self) {
            if let Some(ref value) = self.prev {
                env::set_var(self.key, value);
            } else {
                env::remove_var(self.key);
            }
        }
    }

    #[test]
    fn test_default_config_is_valid() {
        assert!(ExecutorConfig::default().validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_sessions() {
        let config = ExecutorConfig {
            max_sessions: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_zero_poll_interval() {
        let config = ExecutorConfig {
            poll_interval: Duration::ZERO,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_env_overrides_executor_config() {
        let _guard = serial_guard();
        let _scratch = EnvVarGuard::new("EXECUTOR_SCRATCH_ROOT", "/tmp/exec-test");
        let _poll = EnvVarGuard::new("EXECUTOR_POLL_INTERVAL_MS", "25");
        let _max = EnvVarGuard::new("EXECUTOR_MAX_SESSIONS", "3");

        let config = ExecutorConfig::from_env();
        assert_eq!(config.scratch_root, PathBuf::from("/tmp/exec-test"));
        assert_eq!(config.poll_interval, Duration::from_millis(25));
        assert_eq!(config.max_sessions, 3);
    }

    #[test]
    fn test_env_invalid_number_falls_back() {
        let _guard = serial_guard();
        let _poll = EnvVarGuard::new("EXECUTOR_POLL_INTERVAL_MS", "soon");

        let config = ExecutorConfig::from_env();
        assert_eq!(config.poll_interval, DEFAULT_POLL_INTERVAL);
    }

    #[test]
    fn test_env_overrides_service_budget() {
        let _guard = serial_guard();
        let _mem = EnvVarGuard::new("EXECUTOR_DEFAULT_MAX_MEMORY", "64M");
        let _dur = EnvVarGuard::new("EXECUTOR_DEFAULT_MAX_DURATION_SECS", "2");

        let config = ServiceConfig::from_env();
        assert_eq!(config.default_budget.max_memory_bytes, 64 * 1024 * 1024);
        assert_eq!(config.default_budget.max_duration, Duration::from_secs(2));
    }

    #[test]
    fn test_service_defaults() {
        let config = ServiceConfig::default();
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.port, 8080);
    }
}
