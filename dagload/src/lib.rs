// src/lib.rs

//! dagload: an asynchronous job loader.
//!
//! Executes a user-supplied DAG of named jobs on a bounded pool of worker
//! threads, honoring declared dependencies, per-job priorities with priority
//! inheritance across dependencies, and graceful cancellation.
//!
//! The shape of an interaction:
//! - build [`Job`]s with their dependency lists (and optional priorities)
//! - bundle them into a [`Task`] and call [`Task::schedule`]
//! - [`Loader::start`] brings the worker pool up; workers execute ready jobs
//!   highest-effective-priority first
//! - synchronize with [`Job::wait`] (re-raises the job's error) or
//!   [`Loader::wait`] (blocks until the loader owns no work)
//!
//! Guarantees:
//! - a job runs only after all of its dependencies reached OK
//! - a failed or canceled dependency cancels every transitive dependent,
//!   carrying the originating message
//! - a job's effective priority is raised to that of its most urgent
//!   (transitive) dependent, and never lowered
//! - cancellation never interrupts a running job; removal waits for it

pub mod errors;
pub mod job;
pub mod loader;
pub mod logging;
pub mod metrics;
pub mod task;

mod dag;

pub use errors::{ErrorKind, LoadError, Result};
pub use job::{Job, JobFunc, JobStatus};
pub use loader::{Loader, LoaderBuilder};
pub use metrics::Gauge;
pub use task::Task;
