//! Isolation layer: sandboxed spawn, rlimit backstops, seccomp filtering
//!
//! This module runs untrusted code in a separate process with no ambient
//! filesystem or network reach beyond the scratch directory and the
//! request's granted capabilities.
//!
//! # Layers
//!
//! - **Process boundary**: own session/process group, scrubbed environment,
//!   scratch working directory
//! - **Rlimits**: hard kernel backstops under the polling limiter
//! - **Seccomp**: network syscall deny filter (unprivileged hosts)
//! - **Namespaces**: mount/net/ipc/uts unshare when running as root

pub mod boundary;
pub mod seccomp;

pub use boundary::{spawn, BoundaryConfig, RlimitSet};
pub use seccomp::network_deny_filter;
