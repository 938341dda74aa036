//! Background layout workers

use std::any::Any;
use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use parking_lot::Mutex;

use crate::error::{ReaderError, Result};

/// Handle to a layout running on a worker thread.
///
/// Dropping the handle detaches the worker; its completion callback still
/// fires.
#[derive(Debug)]
pub struct LayoutTask {
    handle: Option<JoinHandle<bool>>,
}

impl LayoutTask {
    /// A task that already finished on the caller's thread
    pub(crate) fn completed() -> Self {
        Self { handle: None }
    }

    /// Block until the worker finishes. True when the layout was applied.
    pub fn wait(self) -> bool {
        match self.handle {
            Some(handle) => handle.join().unwrap_or(false),
            None => false,
        }
    }

    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().map_or(true, JoinHandle::is_finished)
    }
}

/// Run `work` on a named worker and report its result to `on_complete`
/// exactly once, including when the thread cannot be started or panics.
pub(crate) fn spawn<W, C>(name: &str, work: W, on_complete: C) -> LayoutTask
where
    W: FnOnce() -> Result<()> + Send + 'static,
    C: FnOnce(Result<()>) + Send + 'static,
{
    let callback = Arc::new(Mutex::new(Some(on_complete)));
    let worker_callback = Arc::clone(&callback);

    let spawned = thread::Builder::new().name(name.to_string()).spawn(move || {
        let result = panic::catch_unwind(AssertUnwindSafe(work))
            .unwrap_or_else(|payload| Err(worker_panicked(payload)));
        let applied = result.is_ok();
        if let Some(on_complete) = worker_callback.lock().take() {
            on_complete(result);
        }
        applied
    });

    match spawned {
        Ok(handle) => LayoutTask {
            handle: Some(handle),
        },
        Err(err) => {
            tracing::warn!(worker = name, error = %err, "Failed to start layout worker");
            if let Some(on_complete) = callback.lock().take() {
                on_complete(Err(ReaderError::Worker(err)));
            }
            LayoutTask::completed()
        }
    }
}

fn worker_panicked(payload: Box<dyn Any + Send>) -> ReaderError {
    let message = payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string());
    ReaderError::Worker(io::Error::new(
        io::ErrorKind::Other,
        format!("layout worker panicked: {}", message),
    ))
}
