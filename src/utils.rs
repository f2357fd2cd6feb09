//! Utility functions shared across the executor

use crate::errors::{ExecutorError, Result};
#[cfg(test)]
use std::cell::Cell;

#[cfg(test)]
thread_local! {
    static ROOT_OVERRIDE: Cell<Option<bool>> = const { Cell::new(None) };
}

/// Check if running as root
pub fn is_root() -> bool {
    #[cfg(test)]
    {
        if let Some(value) = ROOT_OVERRIDE.with(|cell| cell.get()) {
            return value;
        }
    }

    unsafe { libc::geteuid() == 0 }
}

/// Get current UID
pub fn get_uid() -> u32 {
    unsafe { libc::geteuid() }
}

/// Parse memory size string (e.g., "100M", "1G")
pub fn parse_memory_size(s: &str) -> Result<u64> {
    let s = s.trim().to_uppercase();

    let (num_str, multiplier) = if s.ends_with('G') {
        (&s[..s.len() - 1], 1024u64 * 1024 * 1024)
    } else if s.ends_with('M') {
        (&s[..s.len() - 1], 1024u64 * 1024)
    } else if s.ends_with('K') {
        (&s[..s.len() - 1], 1024u64)
    } else if s.ends_with('B') {
        (&s[..s.len() - 1], 1u64)
    } else {
        (s.as_str(), 1u64)
    };

    let num: u64 = num_str
        .parse()
        .map_err(|_| ExecutorError::InvalidConfig(format!("Invalid memory size: {}", s)))?;

    num.checked_mul(multiplier)
        .ok_or_else(|| ExecutorError::InvalidConfig(format!("Memory size overflow: {}", s)))
}

/// Scrub control characters from captured output, keeping newlines, tabs and
/// carriage returns.
pub fn sanitize_output(output: &str) -> String {
    output
        .chars()
        .filter(|c| !c.is_control() || matches!(c, '\n' | '\t' | '\r'))
        .collect()
}

#[cfg(test)]
pub fn set_root_override(value: Option<bool>) {
    ROOT_OVERRIDE.with(|cell| cell.set(value));
}
