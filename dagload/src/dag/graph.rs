// src/dag/graph.rs

//! Bookkeeping for jobs currently owned by the loader.
//!
//! Each live job gets one [`JobEntry`] keyed by its stable id: the count of
//! unresolved dependencies, the reverse edges needed to enqueue dependents
//! and to propagate cancellation, and task-ownership state. Entries exist
//! from `schedule` until the job reaches a terminal status; completion
//! signalling lives on the [`Job`] itself, so waiters never touch the graph.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::errors::LoadError;
use crate::job::Job;

#[derive(Debug)]
pub(crate) struct JobEntry {
    pub job: Arc<Job>,
    /// Number of dependencies that have not yet reached OK.
    pub deps_left: usize,
    /// Ids of scheduled jobs that depend on this one, in schedule order.
    pub dependents: Vec<u64>,
    /// Number of tasks currently owning this job. `Task::remove` cancels a
    /// pending job only once this drops to zero.
    pub owners: usize,
    /// Picked by a worker and currently executing.
    pub running: bool,
    /// Present in the ready queue.
    pub enqueued: bool,
}

/// The set of jobs the loader currently owns (pending or running), with the
/// reverse-dependency edges between them.
#[derive(Debug, Default)]
pub(crate) struct JobGraph {
    entries: HashMap<u64, JobEntry>,
}

impl JobGraph {
    pub fn new() -> Self {
        JobGraph::default()
    }

    pub fn contains(&self, id: u64) -> bool {
        self.entries.contains_key(&id)
    }

    pub fn get(&self, id: u64) -> Option<&JobEntry> {
        self.entries.get(&id)
    }

    pub fn get_mut(&mut self, id: u64) -> Option<&mut JobEntry> {
        self.entries.get_mut(&id)
    }

    pub fn insert(&mut self, entry: JobEntry) {
        self.entries.insert(entry.job.id(), entry);
    }

    pub fn remove(&mut self, id: u64) -> Option<JobEntry> {
        self.entries.remove(&id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Color {
    Gray,
    Black,
}

struct Frame {
    job: Arc<Job>,
    deps: Vec<Arc<Job>>,
    next_dep: usize,
}

/// Validate that scheduling `jobs` keeps the graph acyclic.
///
/// Runs an iterative depth-first search over the provisional graph: the
/// provided batch plus everything reachable through dependency edges
/// (including jobs already owned by the loader, which the batch may depend
/// on). A back edge to a node on the
/// current DFS path reveals a cycle; the error names exactly the jobs on
/// that path segment and nothing else.
///
/// On success, returns the batch in dependency order (every job after all of
/// its in-batch dependencies), which is the order `schedule` inserts them in.
pub(crate) fn validate_acyclic(jobs: &[Arc<Job>]) -> Result<Vec<Arc<Job>>, LoadError> {
    let batch_ids: HashSet<u64> = jobs.iter().map(|j| j.id()).collect();
    let mut colors: HashMap<u64, Color> = HashMap::new();
    let mut order: Vec<Arc<Job>> = Vec::with_capacity(jobs.len());

    for root in jobs {
        if colors.contains_key(&root.id()) {
            continue;
        }

        let mut stack = vec![Frame {
            job: Arc::clone(root),
            deps: root.dependencies(),
            next_dep: 0,
        }];
        colors.insert(root.id(), Color::Gray);

        while let Some(frame) = stack.last_mut() {
            if let Some(dep) = frame.deps.get(frame.next_dep).cloned() {
                frame.next_dep += 1;

                if dep.status().is_terminal() {
                    // Finished dependencies cannot participate in a cycle.
                    colors.insert(dep.id(), Color::Black);
                    continue;
                }
                match colors.get(&dep.id()) {
                    Some(Color::Black) => {}
                    Some(Color::Gray) => {
                        // Back edge: the cycle is the DFS path from `dep`
                        // down to the current frame.
                        let start = stack
                            .iter()
                            .position(|f| f.job.id() == dep.id())
                            .unwrap_or(0);
                        let names = stack[start..]
                            .iter()
                            .map(|f| f.job.name().to_string())
                            .collect();
                        return Err(LoadError::cycle(names));
                    }
                    None => {
                        colors.insert(dep.id(), Color::Gray);
                        stack.push(Frame {
                            deps: dep.dependencies(),
                            job: dep,
                            next_dep: 0,
                        });
                    }
                }
            } else {
                let frame = stack.pop().expect("non-empty stack");
                colors.insert(frame.job.id(), Color::Black);
                if batch_ids.contains(&frame.job.id()) {
                    order.push(frame.job);
                }
            }
        }
    }

    Ok(order)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ErrorKind;
    use crate::job::JobStatus;

    fn job(deps: Vec<Arc<Job>>, name: &str) -> Arc<Job> {
        Job::new(deps, name, |_| Ok(()))
    }

    #[test]
    fn dependency_order_puts_deps_first() {
        let a = job(vec![], "a");
        let b = job(vec![a.clone()], "b");
        let c = job(vec![a.clone(), b.clone()], "c");

        let order =
            validate_acyclic(&[c.clone(), b.clone(), a.clone()]).expect("acyclic");
        let names: Vec<&str> = order.iter().map(|j| j.name()).collect();
        assert_eq!(names, vec!["a", "b", "c"]);
    }

    #[test]
    fn cycle_reports_exactly_the_cycle_members() {
        // j1 -> j3 -> j2 -> j1, with j0 upstream of everything and a tail of
        // unrelated jobs hanging off the cycle.
        let j0 = job(vec![], "j0");
        let j1 = job(vec![j0.clone()], "j1");
        let j2 = job(vec![j0.clone(), j1.clone()], "j2");
        let j3 = job(vec![j0.clone(), j2.clone()], "j3");
        j1.inject_dependency(j3.clone());

        let j4 = job(vec![j1.clone()], "j4");
        let j5 = job(vec![j4.clone()], "j5");
        let j6 = job(vec![j3.clone()], "j6");
        let j7 = job(
            vec![
                j1.clone(),
                j2.clone(),
                j3.clone(),
                j4.clone(),
                j5.clone(),
                j6.clone(),
            ],
            "j7",
        );
        let j8 = job(vec![], "j8");
        let j9 = job(vec![], "j9");
        let j10 = job(vec![j9.clone()], "j10");

        let batch = vec![j0, j1, j2, j3, j4, j5, j6, j7, j8, j9, j10];
        let err = validate_acyclic(&batch).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Cycle);

        let msg = err.to_string();
        let expected = [
            false, true, true, true, false, false, false, false, false, false, false,
        ];
        for (i, present) in expected.iter().enumerate() {
            assert_eq!(
                msg.contains(&format!("'j{i}'")),
                *present,
                "unexpected membership of j{i} in: {msg}"
            );
        }
    }

    #[test]
    fn terminal_dependencies_are_ignored() {
        let done = job(vec![], "done");
        done.finish(JobStatus::Ok, None);
        let j = job(vec![done], "j");
        let order = validate_acyclic(&[j]).expect("acyclic");
        assert_eq!(order.len(), 1);
    }
}
