// src/loader/schedule.rs

//! Scheduling, reprioritization and removal.
//!
//! `schedule_jobs` is atomic: the cycle check runs over the provisional
//! graph before anything is mutated, so a rejected batch leaves no trace.
//! Insertion processes the batch in dependency order, which lets a job whose
//! dependency was canceled earlier in the same batch observe that terminal
//! status and cancel in turn, before `schedule_jobs` returns.

use std::sync::Arc;

use tracing::debug;

use crate::dag::{validate_acyclic, JobEntry};
use crate::errors::LoadError;
use crate::job::{Job, JobStatus};
use crate::loader::Loader;

impl Loader {
    /// Insert a batch of jobs into the graph. Jobs with no unresolved
    /// dependencies are seeded into the ready queue; declared priorities are
    /// propagated backward along dependency edges.
    ///
    /// Fails with [`LoadError::Cycle`] and mutates nothing if the batch
    /// would introduce a dependency cycle.
    pub(crate) fn schedule_jobs(&self, jobs: &[Arc<Job>]) -> Result<(), LoadError> {
        let mut state = self.shared.state.lock().unwrap();

        let batch = validate_acyclic(jobs)?;

        let mut inserted: Vec<Arc<Job>> = Vec::with_capacity(batch.len());
        let mut newly_ready = 0;
        for job in batch {
            if let Some(entry) = state.graph.get_mut(job.id()) {
                // Already scheduled through another task: joint ownership.
                entry.owners += 1;
                continue;
            }
            if job.status().is_terminal() {
                continue;
            }

            let deps = job.dependencies();
            let mut deps_left = 0;
            let mut cancel_reason: Option<String> = None;
            for dep in &deps {
                match dep.status() {
                    JobStatus::Ok => {}
                    JobStatus::Pending if state.graph.contains(dep.id()) => deps_left += 1,
                    JobStatus::Pending => {
                        cancel_reason =
                            Some(format!("dependency '{}' is not scheduled", dep.name()));
                        break;
                    }
                    JobStatus::Failed | JobStatus::Canceled => {
                        let reason = match dep.error() {
                            Some(err) => err.as_dependency_reason(),
                            None => format!("dependency '{}' was canceled", dep.name()),
                        };
                        cancel_reason = Some(reason);
                        break;
                    }
                }
            }

            if let Some(reason) = cancel_reason {
                let err = LoadError::canceled(job.name(), reason);
                debug!(job = %job.name(), error = %err, "job canceled at schedule time");
                job.finish(JobStatus::Canceled, Some(err));
                continue;
            }

            for dep in &deps {
                if let Some(dep_entry) = state.graph.get_mut(dep.id()) {
                    dep_entry.dependents.push(job.id());
                }
            }
            state.graph.insert(JobEntry {
                job: Arc::clone(&job),
                deps_left,
                dependents: Vec::new(),
                owners: 1,
                running: false,
                enqueued: false,
            });
            if deps_left == 0 {
                state.enqueue(job.id());
                newly_ready += 1;
            }
            inserted.push(job);
        }

        debug!(
            scheduled = inserted.len(),
            ready_queue = state.ready.len(),
            "batch scheduled"
        );

        // Priority inheritance: an urgent job makes all of its transitive
        // dependencies at least as urgent.
        for job in &inserted {
            let priority = job.priority();
            for dep in job.dependencies() {
                state.raise_priority(&dep, priority);
            }
        }

        for _ in 0..newly_ready {
            self.shared.job_ready.notify_one();
        }
        Ok(())
    }

    /// Raise `job`'s priority to at least `new_priority` and propagate the
    /// raise backward through its dependencies. Never lowers a priority;
    /// affected pending ready-queue entries move to their new level.
    pub fn prioritize(&self, job: &Arc<Job>, new_priority: i64) {
        let mut state = self.shared.state.lock().unwrap();
        state.raise_priority(job, new_priority);
    }

    /// Drop one task's ownership of each job. Pending jobs with no owners
    /// left are canceled (propagating to their dependents); running jobs are
    /// never interrupted, but this call returns only after they finished.
    pub(crate) fn remove_jobs(&self, jobs: &[Arc<Job>]) {
        let mut running: Vec<Arc<Job>> = Vec::new();
        {
            let mut state = self.shared.state.lock().unwrap();
            for job in jobs {
                let Some(entry) = state.graph.get_mut(job.id()) else {
                    continue;
                };
                entry.owners = entry.owners.saturating_sub(1);
                if entry.owners > 0 {
                    continue;
                }
                if entry.running {
                    running.push(Arc::clone(job));
                    continue;
                }
                let err = LoadError::canceled(job.name(), "task was removed");
                state.cancel_job(job.id(), err);
            }
            if state.graph.is_empty() {
                self.shared.drained.notify_all();
            }
        }
        for job in running {
            let _ = job.wait();
        }
    }

    /// Drop one task's ownership of each job without canceling anything.
    pub(crate) fn detach_jobs(&self, jobs: &[Arc<Job>]) {
        let mut state = self.shared.state.lock().unwrap();
        for job in jobs {
            if let Some(entry) = state.graph.get_mut(job.id()) {
                entry.owners = entry.owners.saturating_sub(1);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ErrorKind;
    use crate::metrics::Gauge;

    fn loader() -> Loader {
        Loader::new(Gauge::new(), Gauge::new(), 1, false)
    }

    fn job(deps: Vec<Arc<Job>>, name: &str) -> Arc<Job> {
        Job::new(deps, name, |_| Ok(()))
    }

    #[test]
    fn scheduling_a_cycle_fails_and_mutates_nothing() {
        let loader = loader();

        let j0 = job(vec![], "j0");
        let j1 = job(vec![j0.clone()], "j1");
        let j2 = job(vec![j0.clone(), j1.clone()], "j2");
        let j3 = job(vec![j0.clone(), j2.clone()], "j3");
        j1.inject_dependency(j3.clone());
        let j4 = job(vec![j1.clone()], "j4");

        let err = loader
            .schedule_jobs(&[j0.clone(), j1, j2, j3, j4])
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Cycle);
        assert_eq!(err.code(), ErrorKind::Cycle.code());
        assert_eq!(loader.scheduled_job_count(), 0);
        assert_eq!(j0.status(), JobStatus::Pending);
    }

    #[test]
    fn unscheduled_pending_dependency_cancels_the_job() {
        let loader = loader();

        let missing = job(vec![], "missing");
        let dependent = job(vec![missing.clone()], "dependent");
        loader.schedule_jobs(&[dependent.clone()]).unwrap();

        assert_eq!(dependent.status(), JobStatus::Canceled);
        let err = dependent.wait().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Canceled);
        assert!(err.to_string().contains("missing"));
        assert_eq!(loader.scheduled_job_count(), 0);
    }

    #[test]
    fn rescheduling_through_a_second_task_adds_ownership() {
        let loader = loader();
        let shared = job(vec![], "shared");

        loader.schedule_jobs(&[shared.clone()]).unwrap();
        loader.schedule_jobs(&[shared.clone()]).unwrap();
        assert_eq!(loader.scheduled_job_count(), 1);

        // First owner leaves: the job survives.
        loader.remove_jobs(&[shared.clone()]);
        assert_eq!(shared.status(), JobStatus::Pending);
        assert_eq!(loader.scheduled_job_count(), 1);

        // Last owner leaves: the pending job is canceled.
        loader.remove_jobs(&[shared.clone()]);
        assert_eq!(shared.status(), JobStatus::Canceled);
        assert_eq!(loader.scheduled_job_count(), 0);
    }

    #[test]
    fn detach_relinquishes_without_canceling() {
        let loader = loader();
        let lone = job(vec![], "lone");

        loader.schedule_jobs(&[lone.clone()]).unwrap();
        loader.detach_jobs(&[lone.clone()]);
        assert_eq!(lone.status(), JobStatus::Pending);
        assert_eq!(loader.scheduled_job_count(), 1);
    }
}
