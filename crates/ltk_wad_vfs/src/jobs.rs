//! Background execution of long running operations.

use std::sync::mpsc::{self, Receiver};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use ltk_hashtable::CancellationToken;

use crate::error::{Result, VfsError};

/// A running background operation.
///
/// Progress events arrive on [`progress`](Self::progress) in emission order.
/// Dropping the handle detaches the job; it keeps running to completion.
pub struct JobHandle<T, P> {
    name: String,
    progress: Receiver<P>,
    cancel: CancellationToken,
    handle: JoinHandle<Result<T>>,
}

impl<T, P> JobHandle<T, P> {
    /// Requests cooperative cancellation.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn progress(&self) -> &Receiver<P> {
        &self.progress
    }

    /// Drains progress events received so far without blocking.
    pub fn poll_progress(&self) -> Vec<P> {
        self.progress.try_iter().collect()
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Waits for the job and returns its result.
    pub fn join(self) -> Result<T> {
        self.handle
            .join()
            .unwrap_or_else(|_| Err(VfsError::JobPanicked(self.name)))
    }
}

/// Runs `job` on a new thread with a progress channel and a fresh token.
pub fn spawn_job<T, P, F>(name: impl Into<String>, job: F) -> JobHandle<T, P>
where
    T: Send + 'static,
    P: Send + 'static,
    F: FnOnce(Arc<dyn Fn(P) + Send + Sync>, CancellationToken) -> Result<T> + Send + 'static,
{
    let name = name.into();
    let (sender, receiver) = mpsc::channel();
    let cancel = CancellationToken::new();
    let job_cancel = cancel.clone();
    let job_name = name.clone();

    let handle = thread::spawn(move || {
        tracing::debug!("Background job '{}' started", job_name);
        let emit: Arc<dyn Fn(P) + Send + Sync> = Arc::new(move |event: P| {
            // The receiver may be gone if the handle was dropped
            let _ = sender.send(event);
        });
        let result = job(emit, job_cancel);
        tracing::debug!("Background job '{}' finished (ok = {})", job_name, result.is_ok());
        result
    });

    JobHandle {
        name,
        progress: receiver,
        cancel,
        handle,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progress_and_result() {
        let job = spawn_job("count", |emit, _cancel| {
            for i in 1..=3u32 {
                emit(i);
            }
            Ok("done")
        });
        assert_eq!(job.join().unwrap(), "done");
    }

    #[test]
    fn test_progress_is_received_in_order() {
        let job = spawn_job("count", |emit, _cancel| {
            for i in 1..=3u32 {
                emit(i);
            }
            Ok(())
        });
        let events = job.progress().iter().take(3).collect::<Vec<_>>();
        assert_eq!(events, vec![1, 2, 3]);
        job.join().unwrap();
    }

    #[test]
    fn test_cancel_is_visible_to_job() {
        let job = spawn_job::<(), (), _>("wait", |_emit, cancel| {
            while !cancel.is_cancelled() {
                std::thread::yield_now();
            }
            Err(VfsError::Cancelled)
        });
        job.cancel();
        assert!(matches!(job.join(), Err(VfsError::Cancelled)));
    }
}
