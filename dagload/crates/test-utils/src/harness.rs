use std::sync::Arc;

use dagload::{Gauge, Job, Loader, Task};

/// A loader plus its gauges, with the schedule-a-batch shorthand most tests
/// want.
pub struct LoaderHarness {
    pub loader: Loader,
    pub total_threads: Gauge,
    pub active_threads: Gauge,
}

impl LoaderHarness {
    pub fn new(max_threads: usize) -> Self {
        let total_threads = Gauge::new();
        let active_threads = Gauge::new();
        let loader = Loader::new(
            total_threads.clone(),
            active_threads.clone(),
            max_threads,
            false,
        );
        LoaderHarness {
            loader,
            total_threads,
            active_threads,
        }
    }

    /// Bundle `jobs` into a task and schedule it, panicking on rejection.
    /// Tests that expect `schedule` to fail use [`Task`] directly.
    pub fn schedule(&self, jobs: Vec<Arc<Job>>) -> Task {
        let mut task = Task::new(&self.loader, jobs);
        task.schedule().expect("schedule failed");
        task
    }
}
