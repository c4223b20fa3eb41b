#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use dagload::{Job, JobFunc};

/// Shared log of executed jobs, recorded as `name` + effective priority at
/// execution time (e.g. `A9E9D9...`). Lets tests assert exact execution
/// order on a single-worker pool.
#[derive(Clone, Default)]
pub struct ExecutionLog {
    entries: Arc<Mutex<String>>,
}

impl ExecutionLog {
    pub fn new() -> Self {
        ExecutionLog::default()
    }

    /// Append `name` and effective priority for a job to the log.
    pub fn record(&self, job: &Arc<Job>) {
        self.entries
            .lock()
            .unwrap()
            .push_str(&format!("{}{}", job.name(), job.priority()));
    }

    /// A job function that appends `name` and effective priority to the log.
    pub fn recorder(&self) -> JobFunc {
        let log = self.clone();
        Box::new(move |job: &Arc<Job>| {
            log.record(job);
            Ok(())
        })
    }

    pub fn snapshot(&self) -> String {
        self.entries.lock().unwrap().clone()
    }
}

/// A linear chain `prefix0 <- prefix1 <- ... <- prefixN-1`, each job running
/// a function produced by `make_func`.
pub fn chain_jobs(
    count: usize,
    name_prefix: &str,
    mut make_func: impl FnMut() -> JobFunc,
) -> Vec<Arc<Job>> {
    let mut jobs: Vec<Arc<Job>> = Vec::with_capacity(count);
    for i in 0..count {
        let deps = match jobs.last() {
            Some(prev) => vec![Arc::clone(prev)],
            None => vec![],
        };
        jobs.push(Job::new(deps, format!("{name_prefix}{i}"), make_func()));
    }
    jobs
}

/// A job function that does nothing.
pub fn noop_func() -> JobFunc {
    Box::new(|_: &Arc<Job>| Ok(()))
}
