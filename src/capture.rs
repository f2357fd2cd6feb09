//! Bounded capture of child process output
//!
//! Output is drained incrementally on reader threads so the buffers never
//! grow past the configured cap. Once the cap is reached the capture stops
//! accepting bytes but keeps draining, so the child cannot block forever on
//! a full pipe; the truncation flag tells the limiter it can stop the
//! session early. Reader threads terminate at pipe EOF, which the kill path
//! guarantees, so no drain waits indefinitely.

use std::io::{ErrorKind, Read};
use std::process::{ChildStderr, ChildStdout};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

use log::debug;

const READ_CHUNK_BYTES: usize = 4096;

/// Output collected from one session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapturedOutput {
    pub stdout: String,
    pub stderr: String,
    /// True when stdout hit the byte cap before the stream ended
    pub truncated: bool,
}

/// In-flight capture of a child's stdout and stderr
pub struct OutputCapture {
    stdout: Arc<Mutex<Vec<u8>>>,
    stderr: Arc<Mutex<Vec<u8>>>,
    truncated: Arc<AtomicBool>,
    readers: Vec<JoinHandle<()>>,
}

impl OutputCapture {
    /// Start draining both streams with `limit_bytes` applied to each
    pub fn start(stdout: ChildStdout, stderr: ChildStderr, limit_bytes: usize) -> Self {
        let stdout_buf = Arc::new(Mutex::new(Vec::new()));
        let stderr_buf = Arc::new(Mutex::new(Vec::new()));
        let truncated = Arc::new(AtomicBool::new(false));

        let readers = vec![
            spawn_capped_reader(
                stdout,
                Arc::clone(&stdout_buf),
                limit_bytes,
                Some(Arc::clone(&truncated)),
            ),
            spawn_capped_reader(stderr, Arc::clone(&stderr_buf), limit_bytes, None),
        ];

        Self {
            stdout: stdout_buf,
            stderr: stderr_buf,
            truncated,
            readers,
        }
    }

    /// Shared flag raised when the stdout cap is hit; polled by the limiter
    pub fn truncation_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.truncated)
    }

    /// Join the readers and return the collected output.
    ///
    /// Must be called after the child has been reaped; the closed pipes end
    /// the reader threads, so the join is bounded.
    pub fn finish(self) -> CapturedOutput {
        for handle in self.readers {
            if handle.join().is_err() {
                debug!("output reader thread panicked");
            }
        }

        let stdout = take_buffer(&self.stdout);
        let stderr = take_buffer(&self.stderr);

        CapturedOutput {
            stdout: String::from_utf8_lossy(&stdout).into_owned(),
            stderr: String::from_utf8_lossy(&stderr).into_owned(),
            truncated: self.truncated.load(Ordering::SeqCst),
        }
    }
}

fn take_buffer(buf: &Arc<Mutex<Vec<u8>>>) -> Vec<u8> {
    let mut guard = buf.lock().unwrap_or_else(|poison| poison.into_inner());
    std::mem::take(&mut *guard)
}

/// Drain a stream into a byte-capped buffer.
///
/// Bytes past the cap are discarded rather than buffered; when
/// `truncation_flag` is set, overflowing marks the capture truncated.
fn spawn_capped_reader<R: Read + Send + 'static>(
    mut source: R,
    buffer: Arc<Mutex<Vec<u8>>>,
    cap: usize,
    truncation_flag: Option<Arc<AtomicBool>>,
) -> JoinHandle<()> {
    thread::spawn(move || {
        let mut chunk = [0u8; READ_CHUNK_BYTES];
        loop {
            match source.read(&mut chunk) {
                Ok(0) => break,
                Ok(n) => {
                    let mut guard = buffer.lock().unwrap_or_else(|poison| poison.into_inner());
                    let remaining = cap.saturating_sub(guard.len());
                    let take = remaining.min(n);
                    if take > 0 {
                        guard.extend_from_slice(&chunk[..take]);
                    }
                    if take < n {
                        if let Some(ref flag) = truncation_flag {
                            flag.store(true, Ordering::SeqCst);
                        }
                    }
                }
                Err(ref e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(_) => break,
            }
        }
    })
}
