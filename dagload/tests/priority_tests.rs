//! Priority inheritance and dynamic reprioritization, observed as exact
//! execution order on a single-worker pool.

use std::sync::{Arc, OnceLock};

use dagload::{Job, JobFunc, JobStatus};
use dagload_test_utils::builders::{noop_func, ExecutionLog};
use dagload_test_utils::harness::LoaderHarness;
use dagload_test_utils::init_tracing;

/// The DAG shared by the priority tests:
///
/// ```text
/// A -+-> B
///    |
///    `-> C
///    |
///    `-> D -.
///    |      +-> F --> G --> H
///    `-> E -'
/// ```
fn diamond(log: &ExecutionLog, priorities: [i64; 8]) -> Vec<Arc<Job>> {
    let [a, b, c, d, e, f, g, h] = priorities;
    let ja = Job::with_priority(vec![], "A", a, log.recorder());
    let jb = Job::with_priority(vec![ja.clone()], "B", b, log.recorder());
    let jc = Job::with_priority(vec![ja.clone()], "C", c, log.recorder());
    let jd = Job::with_priority(vec![ja.clone()], "D", d, log.recorder());
    let je = Job::with_priority(vec![ja.clone()], "E", e, log.recorder());
    let jf = Job::with_priority(vec![jd.clone(), je.clone()], "F", f, log.recorder());
    let jg = Job::with_priority(vec![jf.clone()], "G", g, log.recorder());
    let jh = Job::with_priority(vec![jg.clone()], "H", h, log.recorder());
    vec![ja, jb, jc, jd, je, jf, jg, jh]
}

#[test]
fn static_priorities_pull_blocking_dependencies_forward() {
    init_tracing();
    let t = LoaderHarness::new(1);
    let log = ExecutionLog::new();

    // H's priority 9 is inherited by G, F, D, E and A; C and B keep their
    // own priorities and run last.
    let jobs = diamond(&log, [0, 3, 4, 1, 2, 0, 0, 9]);
    let _task = t.schedule(jobs);

    t.loader.start();
    t.loader.wait();

    assert_eq!(log.snapshot(), "A9E9D9F9G9H9C4B3");
    t.loader.stop();
}

#[test]
fn dynamic_prioritization_reorders_pending_work() {
    init_tracing();
    for prioritize in [false, true] {
        let t = LoaderHarness::new(1);
        let log = ExecutionLog::new();

        // Same DAG, but H starts at 0; while C executes, G is raised to 9,
        // postponing B.
        let job_to_prioritize: Arc<OnceLock<Arc<Job>>> = Arc::new(OnceLock::new());

        let ja = Job::with_priority(vec![], "A", 0, log.recorder());
        let jb = Job::with_priority(vec![ja.clone()], "B", 3, log.recorder());
        let c_func: JobFunc = {
            let loader = t.loader.clone();
            let target = Arc::clone(&job_to_prioritize);
            let log = log.clone();
            Box::new(move |job: &Arc<Job>| {
                if prioritize {
                    let g = target.get().expect("target job registered");
                    loader.prioritize(g, 9);
                }
                log.record(job);
                Ok(())
            })
        };
        let jc = Job::with_priority(vec![ja.clone()], "C", 4, c_func);
        let jd = Job::with_priority(vec![ja.clone()], "D", 1, log.recorder());
        let je = Job::with_priority(vec![ja.clone()], "E", 2, log.recorder());
        let jf = Job::with_priority(vec![jd.clone(), je.clone()], "F", 0, log.recorder());
        let jg = Job::with_priority(vec![jf.clone()], "G", 0, log.recorder());
        let jh = Job::with_priority(vec![jg.clone()], "H", 0, log.recorder());
        job_to_prioritize.set(jg.clone()).unwrap();

        let _task = t.schedule(vec![ja, jb, jc, jd, je, jf, jg, jh]);

        t.loader.start();
        t.loader.wait();
        t.loader.stop();

        if prioritize {
            assert_eq!(log.snapshot(), "A4C4E9D9F9G9B3H0");
        } else {
            assert_eq!(log.snapshot(), "A4C4B3E2D1F0G0H0");
        }
    }
}

#[test]
fn scheduling_propagates_priorities_backward() {
    init_tracing();
    let t = LoaderHarness::new(1);

    let a = Job::new(vec![], "a", noop_func());
    let b = Job::with_priority(vec![a.clone()], "b", 5, noop_func());
    let _task = t.schedule(vec![a.clone(), b.clone()]);

    assert_eq!(a.priority(), 5);
    assert_eq!(b.priority(), 5);
}

#[test]
fn prioritize_never_lowers() {
    init_tracing();
    let t = LoaderHarness::new(1);

    let job = Job::with_priority(vec![], "j", 5, noop_func());
    let _task = t.schedule(vec![job.clone()]);

    t.loader.prioritize(&job, 3);
    assert_eq!(job.priority(), 5);

    t.loader.prioritize(&job, 7);
    assert_eq!(job.priority(), 7);
}

#[test]
fn a_job_with_no_urgent_dependents_keeps_its_low_priority() {
    init_tracing();
    let t = LoaderHarness::new(1);

    let head = Job::new(vec![], "head", noop_func());
    let tail = Job::with_priority(vec![head.clone()], "tail", -1, noop_func());
    let _task = t.schedule(vec![head.clone(), tail.clone()]);

    assert_eq!(head.priority(), 0);
    assert_eq!(tail.priority(), -1);

    t.loader.start();
    t.loader.wait();
    assert_eq!(tail.status(), JobStatus::Ok);
    t.loader.stop();
}
