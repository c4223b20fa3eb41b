// src/loader/mod.rs

//! The loader core: worker pool lifecycle and the shared scheduler state.
//!
//! A single mutex protects all mutable scheduler state (job statuses, graph
//! edges, the ready queue, pool counters). Every transition happens under
//! that lock; user job functions run with the lock released. Critical
//! sections are bounded by graph fan-in/fan-out, not by user work.

mod schedule;
mod worker;

use std::collections::VecDeque;
use std::sync::{Arc, Condvar, Mutex};
use std::thread::{self, JoinHandle};

use tracing::debug;

use crate::dag::{JobGraph, ReadyQueue};
use crate::errors::LoadError;
use crate::job::{Job, JobStatus};
use crate::metrics::Gauge;

/// Handle to an asynchronous job loader. Cloning is cheap and clones drive
/// the same pool.
#[derive(Clone)]
pub struct Loader {
    shared: Arc<Shared>,
}

pub(crate) struct Shared {
    /// Serializes `start`/`stop`, held across the join in `stop` so a
    /// concurrent `start` cannot revive workers that are being joined.
    lifecycle: Mutex<()>,
    pub(crate) state: Mutex<State>,
    /// Workers sleep here when the ready queue is empty.
    pub(crate) job_ready: Condvar,
    /// [`Loader::wait`] sleeps here until the loader owns no jobs.
    pub(crate) drained: Condvar,
    pub(crate) total_threads: Gauge,
    pub(crate) active_threads: Gauge,
    pub(crate) log_failures: bool,
}

pub(crate) struct State {
    pub(crate) started: bool,
    pub(crate) max_threads: usize,
    /// Workers that have been spawned and not yet exited. Never exceeds
    /// `max_threads` except transiently while shrinking.
    pub(crate) alive_workers: usize,
    next_worker_id: usize,
    pub(crate) graph: JobGraph,
    pub(crate) ready: ReadyQueue,
    workers: Vec<JoinHandle<()>>,
}

impl Loader {
    /// Create a loader. The gauges are updated on worker spawn/exit and on
    /// job start/end; `max_threads` bounds concurrent job execution;
    /// `log_failures` controls whether failed jobs are logged as warnings.
    pub fn new(
        total_threads: Gauge,
        active_threads: Gauge,
        max_threads: usize,
        log_failures: bool,
    ) -> Loader {
        Loader {
            shared: Arc::new(Shared {
                lifecycle: Mutex::new(()),
                state: Mutex::new(State {
                    started: false,
                    max_threads,
                    alive_workers: 0,
                    next_worker_id: 0,
                    graph: JobGraph::new(),
                    ready: ReadyQueue::new(),
                    workers: Vec::new(),
                }),
                job_ready: Condvar::new(),
                drained: Condvar::new(),
                total_threads,
                active_threads,
                log_failures,
            }),
        }
    }

    pub fn builder() -> LoaderBuilder {
        LoaderBuilder::default()
    }

    /// Spawn workers up to `max_threads`. Idempotent.
    pub fn start(&self) {
        let _lifecycle = self.shared.lifecycle.lock().unwrap();
        let mut state = self.shared.state.lock().unwrap();
        if state.started {
            return;
        }
        state.started = true;
        debug!(max_threads = state.max_threads, "loader starting");
        self.spawn_workers(&mut state);
    }

    /// Signal shutdown, wait for running jobs to finish and join every
    /// worker. Ready jobs stay queued and resume on the next `start`.
    pub fn stop(&self) {
        let _lifecycle = self.shared.lifecycle.lock().unwrap();
        let handles = {
            let mut state = self.shared.state.lock().unwrap();
            if !state.started {
                return;
            }
            state.started = false;
            self.shared.job_ready.notify_all();
            std::mem::take(&mut state.workers)
        };
        for handle in handles {
            let _ = handle.join();
        }
        debug!("loader stopped");
    }

    /// Block until the loader owns no jobs (pending or running). Job errors
    /// are not re-raised here; use [`Job::wait`] for that.
    pub fn wait(&self) {
        let mut state = self.shared.state.lock().unwrap();
        while !state.graph.is_empty() {
            state = self.shared.drained.wait(state).unwrap();
        }
    }

    /// Reshape the pool. Growing spawns workers immediately (if started);
    /// shrinking lets surplus workers exit after their current job.
    pub fn set_max_threads(&self, max_threads: usize) {
        let mut state = self.shared.state.lock().unwrap();
        state.max_threads = max_threads;
        debug!(max_threads, "pool resized");
        if state.started {
            if state.alive_workers < max_threads {
                self.spawn_workers(&mut state);
            } else {
                // Wake sleepers so surplus workers notice and exit.
                self.shared.job_ready.notify_all();
            }
        }
    }

    pub fn max_threads(&self) -> usize {
        self.shared.state.lock().unwrap().max_threads
    }

    /// Number of jobs currently owned by the loader (pending or running).
    /// Useful for caller-side backpressure.
    pub fn scheduled_job_count(&self) -> usize {
        self.shared.state.lock().unwrap().graph.len()
    }

    fn spawn_workers(&self, state: &mut State) {
        while state.alive_workers < state.max_threads {
            let id = state.next_worker_id;
            state.next_worker_id += 1;
            state.alive_workers += 1;
            self.shared.total_threads.inc();
            let shared = Arc::clone(&self.shared);
            let handle = thread::Builder::new()
                .name(format!("dagload-worker-{id}"))
                .spawn(move || worker::worker_loop(shared))
                .expect("failed to spawn worker thread");
            state.workers.push(handle);
        }
    }
}

impl State {
    /// Put a pending job with no unresolved dependencies into the ready
    /// queue at its current effective priority.
    fn enqueue(&mut self, id: u64) {
        let Some(entry) = self.graph.get_mut(id) else {
            return;
        };
        entry.enqueued = true;
        let priority = entry.job.priority();
        self.ready.push(id, priority);
    }

    /// A job reached OK: resolve it for each dependent and enqueue the ones
    /// whose last blocker it was. Returns how many became ready.
    fn resolve_dependents(&mut self, dependents: &[u64]) -> usize {
        let mut newly_ready = 0;
        for &dep_id in dependents.iter().rev() {
            let became_ready = {
                let Some(dependent) = self.graph.get_mut(dep_id) else {
                    continue;
                };
                dependent.deps_left -= 1;
                dependent.deps_left == 0
            };
            if became_ready {
                self.enqueue(dep_id);
                newly_ready += 1;
            }
        }
        newly_ready
    }

    /// Cancel a pending job and every transitive dependent still owned by
    /// the loader. Each canceled job stores an error whose message cites its
    /// dependency's error, so a chain failure is traceable from any
    /// descendant.
    fn cancel_job(&mut self, id: u64, err: LoadError) {
        let mut queue: VecDeque<(u64, LoadError)> = VecDeque::new();
        queue.push_back((id, err));
        while let Some((id, err)) = queue.pop_front() {
            let Some(entry) = self.graph.remove(id) else {
                continue;
            };
            if entry.enqueued {
                self.ready.remove(id, entry.job.priority());
            }
            debug!(job = %entry.job.name(), "job canceled");
            entry.job.finish(JobStatus::Canceled, Some(err.clone()));
            for &dep_id in entry.dependents.iter().rev() {
                if let Some(child) = self.graph.get(dep_id) {
                    let child_err =
                        LoadError::canceled(child.job.name(), err.as_dependency_reason());
                    queue.push_back((dep_id, child_err));
                }
            }
        }
    }

    /// Cancel the dependents of a job that just failed.
    fn cancel_dependents(&mut self, dependents: &[u64], origin_err: &LoadError) {
        for &dep_id in dependents.iter().rev() {
            if let Some(child) = self.graph.get(dep_id) {
                let child_err =
                    LoadError::canceled(child.job.name(), origin_err.as_dependency_reason());
                self.cancel_job(dep_id, child_err);
            }
        }
    }

    /// Raise the effective priority of `job` and of its transitive
    /// dependencies to at least `min_priority`. Priorities never drop, so
    /// the walk stops at any job that is already urgent enough. Pending
    /// ready-queue entries relocate to their new level.
    fn raise_priority(&mut self, job: &Arc<Job>, min_priority: i64) {
        let mut stack: Vec<(Arc<Job>, i64)> = vec![(Arc::clone(job), min_priority)];
        while let Some((job, priority)) = stack.pop() {
            if job.status().is_terminal() || job.priority() >= priority {
                continue;
            }
            let old = job.priority();
            job.raise_priority(priority);
            if let Some(entry) = self.graph.get(job.id()) {
                if entry.enqueued {
                    self.ready.relocate(job.id(), old, priority);
                }
            }
            for dep in job.dependencies() {
                stack.push((dep, priority));
            }
        }
    }
}

/// Builder-style construction for [`Loader`].
pub struct LoaderBuilder {
    total_threads: Gauge,
    active_threads: Gauge,
    max_threads: usize,
    log_failures: bool,
}

impl Default for LoaderBuilder {
    fn default() -> Self {
        LoaderBuilder {
            total_threads: Gauge::new(),
            active_threads: Gauge::new(),
            max_threads: default_max_threads(),
            log_failures: true,
        }
    }
}

impl LoaderBuilder {
    pub fn total_threads_gauge(mut self, gauge: Gauge) -> Self {
        self.total_threads = gauge;
        self
    }

    pub fn active_threads_gauge(mut self, gauge: Gauge) -> Self {
        self.active_threads = gauge;
        self
    }

    pub fn max_threads(mut self, max_threads: usize) -> Self {
        self.max_threads = max_threads;
        self
    }

    pub fn log_failures(mut self, log_failures: bool) -> Self {
        self.log_failures = log_failures;
        self
    }

    pub fn build(self) -> Loader {
        Loader::new(
            self.total_threads,
            self.active_threads,
            self.max_threads,
            self.log_failures,
        )
    }
}

fn default_max_threads() -> usize {
    thread::available_parallelism().map(|n| n.get()).unwrap_or(4)
}
