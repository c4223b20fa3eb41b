// src/job.rs

//! A single unit of work: identity, dependencies, priority and status.
//!
//! Jobs are created by the caller, bundled into a [`Task`](crate::task::Task)
//! and handed to a [`Loader`](crate::loader::Loader). The name and dependency
//! list are fixed at construction; status and effective priority evolve under
//! the loader's lock. Each job carries its own completion signal so waiters
//! do not depend on the loader's bookkeeping outliving the job.

use std::fmt;
use std::sync::atomic::{AtomicI64, AtomicU64, AtomicU8, AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex, OnceLock, RwLock};

use crate::errors::LoadError;

/// The user-supplied work function. Invoked once, on a worker thread, with a
/// reference to the job itself so it can inspect its own name, priority and
/// dependencies. Returning an error marks the job FAILED.
pub type JobFunc = Box<dyn FnOnce(&Arc<Job>) -> anyhow::Result<()> + Send + 'static>;

static NEXT_JOB_ID: AtomicU64 = AtomicU64::new(1);

/// Lifecycle status of a job. `Pending` is the only non-terminal state; a
/// job that reached `Ok`, `Failed` or `Canceled` never transitions again.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum JobStatus {
    Pending = 0,
    Ok = 1,
    Failed = 2,
    Canceled = 3,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        self != JobStatus::Pending
    }

    fn from_u8(raw: u8) -> JobStatus {
        match raw {
            1 => JobStatus::Ok,
            2 => JobStatus::Failed,
            3 => JobStatus::Canceled,
            _ => JobStatus::Pending,
        }
    }
}

pub struct Job {
    name: String,
    id: u64,
    /// Fixed once the job is scheduled. Behind a lock only so that the
    /// scheduler can read a consistent snapshot while the caller still holds
    /// clones of the `Arc`.
    deps: RwLock<Vec<Arc<Job>>>,
    /// Taken exactly once by the worker that executes the job.
    func: Mutex<Option<JobFunc>>,
    /// Authoritative writes happen under the loader lock; relaxed reads are
    /// fine for diagnostics.
    status: AtomicU8,
    /// Effective priority: declared priority, raised by inheritance from
    /// dependents. Never lowered.
    priority: AtomicI64,
    /// Populated before the status flips to `Failed` or `Canceled`.
    error: OnceLock<LoadError>,
    /// Number of threads currently blocked in [`Job::wait`].
    waiters: AtomicUsize,
    /// Completion signal: `done` is notified whenever `status` becomes
    /// terminal, under `done_lock`.
    done_lock: Mutex<()>,
    done: Condvar,
}

impl Job {
    /// Create a job with the default priority (0).
    pub fn new<F>(deps: Vec<Arc<Job>>, name: impl Into<String>, func: F) -> Arc<Job>
    where
        F: FnOnce(&Arc<Job>) -> anyhow::Result<()> + Send + 'static,
    {
        Job::with_priority(deps, name, 0, func)
    }

    /// Create a job with an explicit declared priority. Higher values are
    /// more urgent.
    pub fn with_priority<F>(
        deps: Vec<Arc<Job>>,
        name: impl Into<String>,
        priority: i64,
        func: F,
    ) -> Arc<Job>
    where
        F: FnOnce(&Arc<Job>) -> anyhow::Result<()> + Send + 'static,
    {
        Arc::new(Job {
            name: name.into(),
            id: NEXT_JOB_ID.fetch_add(1, Ordering::Relaxed),
            deps: RwLock::new(deps),
            func: Mutex::new(Some(Box::new(func))),
            status: AtomicU8::new(JobStatus::Pending as u8),
            priority: AtomicI64::new(priority),
            error: OnceLock::new(),
            waiters: AtomicUsize::new(0),
            done_lock: Mutex::new(()),
            done: Condvar::new(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn id(&self) -> u64 {
        self.id
    }

    /// Snapshot of the dependency list.
    pub fn dependencies(&self) -> Vec<Arc<Job>> {
        self.deps.read().unwrap().clone()
    }

    pub fn status(&self) -> JobStatus {
        JobStatus::from_u8(self.status.load(Ordering::Acquire))
    }

    /// Current effective priority (declared priority plus inheritance).
    pub fn priority(&self) -> i64 {
        self.priority.load(Ordering::Relaxed)
    }

    /// Number of threads currently blocked in [`Job::wait`].
    pub fn waiters_count(&self) -> usize {
        self.waiters.load(Ordering::Relaxed)
    }

    /// The stored error, if the job failed or was canceled.
    pub fn error(&self) -> Option<LoadError> {
        self.error.get().cloned()
    }

    /// Block until the job is terminal. Returns the stored error if the job
    /// ended `Failed` or `Canceled`.
    ///
    /// A job that is never scheduled stays `Pending`, and `wait` on it
    /// blocks indefinitely.
    pub fn wait(&self) -> Result<(), LoadError> {
        let mut guard = self.done_lock.lock().unwrap();
        while !self.status().is_terminal() {
            self.waiters.fetch_add(1, Ordering::Relaxed);
            guard = self.done.wait(guard).unwrap();
            self.waiters.fetch_sub(1, Ordering::Relaxed);
        }
        drop(guard);

        match self.status() {
            JobStatus::Ok => Ok(()),
            _ => Err(self
                .error()
                .unwrap_or_else(|| LoadError::canceled(&self.name, "no stored error"))),
        }
    }

    /// Raise the effective priority. Called under the loader lock; the value
    /// only ever grows.
    pub(crate) fn raise_priority(&self, priority: i64) {
        self.priority.store(priority, Ordering::Relaxed);
    }

    pub(crate) fn take_func(&self) -> Option<JobFunc> {
        self.func.lock().unwrap().take()
    }

    /// Transition to a terminal status and wake every waiter. Called under
    /// the loader lock; the status write is protected by `done_lock` so a
    /// waiter checking the status cannot miss the notification.
    pub(crate) fn finish(&self, status: JobStatus, error: Option<LoadError>) {
        debug_assert!(status.is_terminal());
        let _guard = self.done_lock.lock().unwrap();
        debug_assert!(!self.status().is_terminal(), "status is monotonic");
        if let Some(err) = error {
            let _ = self.error.set(err);
        }
        self.status.store(status as u8, Ordering::Release);
        self.done.notify_all();
    }

    /// Test-only back door used to build dependency cycles, which the public
    /// constructors cannot express.
    #[cfg(test)]
    pub(crate) fn inject_dependency(&self, dep: Arc<Job>) {
        self.deps.write().unwrap().push(dep);
    }
}

impl fmt::Debug for Job {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Job")
            .field("name", &self.name)
            .field("status", &self.status())
            .field("priority", &self.priority())
            .finish()
    }
}
