// src/task.rs

//! Caller-owned lifecycle handle over a set of jobs.
//!
//! A task bundles jobs so they can be scheduled and, later, removed or
//! detached as a unit. Ownership is joint: a job referenced by several tasks
//! is only canceled once every owning task removed it. Dropping a scheduled
//! task without detaching behaves like [`Task::remove`].

use std::sync::Arc;

use crate::errors::Result;
use crate::job::Job;
use crate::loader::Loader;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TaskState {
    Created,
    Scheduled,
    /// Removed, detached or merged away; the handle no longer owns anything.
    Released,
}

pub struct Task {
    loader: Loader,
    jobs: Vec<Arc<Job>>,
    state: TaskState,
}

impl Task {
    /// Bundle `jobs` into a task bound to `loader`. Nothing is scheduled
    /// until [`Task::schedule`] is called.
    pub fn new(loader: &Loader, jobs: Vec<Arc<Job>>) -> Task {
        Task {
            loader: loader.clone(),
            jobs,
            state: TaskState::Created,
        }
    }

    /// Atomically schedule every member job. No-op if the task was already
    /// scheduled, removed or detached.
    pub fn schedule(&mut self) -> Result<()> {
        if self.state != TaskState::Created {
            return Ok(());
        }
        self.loader.schedule_jobs(&self.jobs)?;
        self.state = TaskState::Scheduled;
        Ok(())
    }

    /// Cancel every still-pending member; wait for running members to finish
    /// naturally. Members owned by other tasks as well survive until their
    /// last owner lets go.
    pub fn remove(&mut self) {
        if self.state == TaskState::Scheduled {
            self.loader.remove_jobs(&self.jobs);
        }
        self.state = TaskState::Released;
        self.jobs.clear();
    }

    /// Relinquish ownership without canceling: the jobs keep running (or
    /// waiting) independently of this handle.
    pub fn detach(&mut self) {
        if self.state == TaskState::Scheduled {
            self.loader.detach_jobs(&self.jobs);
        }
        self.state = TaskState::Released;
        self.jobs.clear();
    }

    /// Absorb another task's jobs under this handle. `other` is consumed and
    /// releases its members without canceling them.
    pub fn merge(&mut self, mut other: Task) {
        self.jobs.append(&mut other.jobs);
        other.state = TaskState::Released;
    }

    /// The member jobs this handle still owns.
    pub fn jobs(&self) -> &[Arc<Job>] {
        &self.jobs
    }
}

impl Drop for Task {
    fn drop(&mut self) {
        if self.state == TaskState::Scheduled {
            self.loader.remove_jobs(&self.jobs);
        }
    }
}
