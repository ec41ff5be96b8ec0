// Copyright 2024 Saptak Santra
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Background encode jobs
//!
//! One dedicated thread per job. The only shared state is a `done/error`
//! status record behind a single mutex; callers poll it or block on it.
//! There is no cancellation and no retry.

use parking_lot::{Condvar, Mutex};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use tracing::{debug, warn};

use crate::error::{Result, SaveError};

/// Snapshot of a job's progress
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct EncodeStatus {
    pub done: bool,
    pub error: Option<String>,
}

#[derive(Default)]
struct Shared {
    status: Mutex<EncodeStatus>,
    finished: Condvar,
}

impl Shared {
    fn finish(&self, error: Option<String>) {
        let mut status = self.status.lock();
        status.done = true;
        status.error = error;
        self.finished.notify_all();
    }
}

/// Handle to a running encode
pub struct EncodeJob {
    shared: Arc<Shared>,
    thread: Option<JoinHandle<()>>,
}

impl EncodeJob {
    /// Run `task` on a new named thread
    pub fn spawn<F>(name: &str, task: F) -> Result<Self>
    where
        F: FnOnce() -> Result<()> + Send + 'static,
    {
        let shared = Arc::new(Shared::default());
        let worker = Arc::clone(&shared);
        let thread_name = name.to_owned();

        let thread = std::thread::Builder::new()
            .name(thread_name.clone())
            .spawn(move || {
                let error = match catch_unwind(AssertUnwindSafe(task)) {
                    Ok(Ok(())) => None,
                    Ok(Err(err)) => Some(err.to_string()),
                    Err(panic) => Some(panic_message(panic.as_ref())),
                };
                match &error {
                    None => debug!(job = %thread_name, "encode finished"),
                    Some(err) => warn!(job = %thread_name, error = %err, "encode failed"),
                }
                worker.finish(error);
            })?;

        Ok(Self {
            shared,
            thread: Some(thread),
        })
    }

    pub fn is_done(&self) -> bool {
        self.shared.status.lock().done
    }

    /// Error message of a finished, failed job
    pub fn error(&self) -> Option<String> {
        self.shared.status.lock().error.clone()
    }

    pub fn status(&self) -> EncodeStatus {
        self.shared.status.lock().clone()
    }

    /// Block until the job is done
    pub fn wait(&self) -> Result<()> {
        let mut status = self.shared.status.lock();
        while !status.done {
            self.shared.finished.wait(&mut status);
        }
        outcome(&status)
    }

    /// Block up to `timeout`; `None` if the job is still running
    pub fn wait_timeout(&self, timeout: Duration) -> Option<Result<()>> {
        let mut status = self.shared.status.lock();
        if !status.done {
            self.shared.finished.wait_for(&mut status, timeout);
        }
        status.done.then(|| outcome(&status))
    }

    /// Wait for the job and reap its thread
    pub fn join(mut self) -> Result<()> {
        let result = self.wait();
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
        result
    }
}

fn outcome(status: &EncodeStatus) -> Result<()> {
    match &status.error {
        Some(err) => Err(SaveError::EncodeFailed(err.clone())),
        None => Ok(()),
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(msg) = panic.downcast_ref::<&str>() {
        (*msg).to_owned()
    } else if let Some(msg) = panic.downcast_ref::<String>() {
        msg.clone()
    } else {
        "encode thread panicked".to_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;

    #[test]
    fn test_successful_job() {
        let job = EncodeJob::spawn("ok", || Ok(())).unwrap();
        job.wait().unwrap();
        assert_eq!(
            job.status(),
            EncodeStatus {
                done: true,
                error: None
            }
        );
        job.join().unwrap();
    }

    #[test]
    fn test_failed_job_reports_error() {
        let job = EncodeJob::spawn("fail", || Err(SaveError::MissingArgument("data"))).unwrap();
        let err = job.wait().unwrap_err();
        assert!(matches!(err, SaveError::EncodeFailed(_)));
        assert!(job.is_done());
        assert_eq!(job.error().as_deref(), Some("Missing argument: data"));
    }

    #[test]
    fn test_panic_is_captured() {
        let job = EncodeJob::spawn("panic", || panic!("boom")).unwrap();
        assert_eq!(job.join(), Err(SaveError::EncodeFailed("boom".into())));
    }

    #[test]
    fn test_poll_before_done() {
        let (tx, rx) = mpsc::channel::<()>();
        let job = EncodeJob::spawn("gated", move || {
            let _ = rx.recv();
            Ok(())
        })
        .unwrap();
        assert!(job.wait_timeout(Duration::from_millis(10)).is_none());
        assert!(!job.is_done());
        tx.send(()).unwrap();
        assert_eq!(job.wait_timeout(Duration::from_secs(10)), Some(Ok(())));
    }
}
