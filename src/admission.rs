//! Admission control for concurrent sessions
//!
//! Cross-request resource arbitration is an explicit policy, not an
//! accident of scheduling: at most `max_sessions` sandboxes exist at once.
//! Acquisition never blocks; a full executor refuses with a typed error and
//! the caller decides whether to retry.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::errors::{ExecutorError, Result};

#[derive(Debug)]
struct Inner {
    max_sessions: usize,
    active: AtomicUsize,
}

/// Counting permits over the concurrent-session ceiling
#[derive(Debug, Clone)]
pub struct AdmissionController {
    inner: Arc<Inner>,
}

impl AdmissionController {
    pub fn new(max_sessions: usize) -> Self {
        Self {
            inner: Arc::new(Inner {
                max_sessions,
                active: AtomicUsize::new(0),
            }),
        }
    }

    /// Acquire a session permit or refuse immediately
    pub fn try_acquire(&self) -> Result<AdmissionPermit> {
        let mut current = self.inner.active.load(Ordering::SeqCst);
        loop {
            if current >= self.inner.max_sessions {
                return Err(ExecutorError::ResourceExhausted(format!(
                    "admission limit of {} concurrent sessions reached",
                    self.inner.max_sessions
                )));
            }
            match self.inner.active.compare_exchange(
                current,
                current + 1,
                Ordering::SeqCst,
                Ordering::SeqCst,
            ) {
                Ok(_) => {
                    return Ok(AdmissionPermit {
                        inner: Arc::clone(&self.inner),
                    })
                }
                Err(observed) => current = observed,
            }
        }
    }

    /// Number of currently active sessions
    pub fn active(&self) -> usize {
        self.inner.active.load(Ordering::SeqCst)
    }

    /// Configured ceiling
    pub fn capacity(&self) -> usize {
        self.inner.max_sessions
    }
}

/// RAII permit; releases its slot on drop
#[derive(Debug)]
pub struct AdmissionPermit {
    inner: Arc<Inner>,
}

impl Drop for AdmissionPermit {
    fn drop(&mut self) {
        self.inner.active.fetch_sub(1, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_acquire_and_release() {
        let admission = AdmissionController::new(2);
        assert_eq!(admission.active(), 0);

        let p1 = admission.try_acquire().unwrap();
        let p2 = admission.try_acquire().unwrap();
        assert_eq!(admission.active(), 2);

        assert!(admission.try_acquire().is_err());

        drop(p1);
        assert_eq!(admission.active(), 1);
        let _p3 = admission.try_acquire().unwrap();
        drop(p2);
    }

    #[test]
    fn test_refusal_is_resource_exhausted() {
        let admission = AdmissionController::new(1);
        let _p = admission.try_acquire().unwrap();

        let err = admission.try_acquire().unwrap_err();
        assert!(matches!(err, ExecutorError::ResourceExhausted(_)));
        assert!(err.to_string().contains("admission limit"));
    }

    #[test]
    fn test_capacity_reported() {
        let admission = AdmissionController::new(8);
        assert_eq!(admission.capacity(), 8);
    }

    #[test]
    fn test_concurrent_acquires_respect_ceiling() {
        use std::thread;

        let admission = AdmissionController::new(4);
        let mut handles = Vec::new();
        for _ in 0..16 {
            let admission = admission.clone();
            handles.push(thread::spawn(move || admission.try_acquire().is_ok()));
        }

        let results: Vec<bool> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        let granted = results.iter().filter(|granted| **granted).count();
        assert!(granted >= 1);

        // Permits dropped inside the threads; the ceiling must be intact
        assert_eq!(admission.active(), 0);
        let _p = admission.try_acquire().unwrap();
    }
}
