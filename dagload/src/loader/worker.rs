// src/loader/worker.rs

//! The worker loop.
//!
//! Each worker repeatedly pops the highest-priority ready job, runs its
//! function with the scheduler lock released, then applies the outcome under
//! the lock: OK resolves dependents, an error marks the job FAILED and
//! cancels every transitive dependent. Workers exit when the loader stops or
//! when the pool shrank below their headcount.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use anyhow::anyhow;
use tracing::{debug, warn};

use crate::errors::LoadError;
use crate::job::{Job, JobStatus};
use crate::loader::{Shared, State};

pub(crate) fn worker_loop(shared: Arc<Shared>) {
    let mut state = shared.state.lock().unwrap();
    loop {
        if !state.started || state.alive_workers > state.max_threads {
            break;
        }
        let Some(job_id) = state.ready.pop() else {
            state = shared.job_ready.wait(state).unwrap();
            continue;
        };
        let Some(entry) = state.graph.get_mut(job_id) else {
            continue;
        };
        entry.enqueued = false;
        entry.running = true;
        let job = Arc::clone(&entry.job);
        drop(state);

        shared.active_threads.inc();
        let result = run_job(&job);
        shared.active_threads.dec();

        state = shared.state.lock().unwrap();
        finish_job(&shared, &mut state, &job, result);
    }
    state.alive_workers -= 1;
    drop(state);
    shared.total_threads.dec();
    debug!("worker exited");
}

/// Invoke the user function, converting a panic into an error so nothing
/// escapes the worker thread.
fn run_job(job: &Arc<Job>) -> anyhow::Result<()> {
    let Some(func) = job.take_func() else {
        return Err(anyhow!("job function already consumed"));
    };
    match panic::catch_unwind(AssertUnwindSafe(|| func(job))) {
        Ok(result) => result,
        Err(payload) => Err(anyhow!("job panicked: {}", panic_message(payload.as_ref()))),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "opaque panic payload".to_string()
    }
}

/// Apply a finished job's outcome under the scheduler lock.
fn finish_job(shared: &Shared, state: &mut State, job: &Arc<Job>, result: anyhow::Result<()>) {
    let entry = state.graph.remove(job.id());
    match result {
        Ok(()) => {
            job.finish(JobStatus::Ok, None);
            debug!(job = %job.name(), "job finished");
            if let Some(entry) = entry {
                let newly_ready = state.resolve_dependents(&entry.dependents);
                for _ in 0..newly_ready {
                    shared.job_ready.notify_one();
                }
            }
        }
        Err(cause) => {
            let err = LoadError::failed(job.name(), format!("{cause:#}"));
            if shared.log_failures {
                warn!(job = %job.name(), error = %err, "job failed");
            }
            job.finish(JobStatus::Failed, Some(err.clone()));
            if let Some(entry) = entry {
                state.cancel_dependents(&entry.dependents, &err);
            }
        }
    }
    if state.graph.is_empty() {
        debug_assert!(state.ready.is_empty());
        shared.drained.notify_all();
    }
}
