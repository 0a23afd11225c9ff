//! The worker pool: N threads draining a shared LIFO task queue.
//!
//! One mutex guards the queue; atomics cover the retry budget and the
//! cancellation flag. Workers check the flag before dequeuing and again
//! after each compilation, so an in-flight compile runs to completion but
//! nothing new starts once cancellation is observed.

use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::thread;

use parking_lot::Mutex;

use shaderbake_common::options::Options;

use crate::planner::Task;
use crate::report::Reporter;

/// Result of one compilation attempt.
pub enum CompileOutcome {
    /// Compiled and wrote artifacts; `log` carries any compiler warnings.
    Success { log: String },
    /// The host failed to run the compiler (spawn error, missing shell).
    /// Eligible for re-enqueueing while the retry budget lasts.
    Transient { log: String },
    /// The shader itself failed to compile.
    Failed { log: String },
}

/// A per-worker compiler instance.
pub trait Driver {
    fn compile(&mut self, task: &Task) -> CompileOutcome;
}

/// Drain `tasks` across the pool. `make_driver` runs once on each worker
/// thread; returning `None` (after reporting why) cancels the run.
pub fn run_tasks<D, F>(
    options: &Options,
    tasks: Vec<Task>,
    reporter: &Reporter,
    cancel: &AtomicBool,
    make_driver: F,
) where
    D: Driver,
    F: Fn() -> Option<D> + Sync,
{
    let queue = Mutex::new(tasks);
    let retry_budget = AtomicI64::new(i64::from(options.retry_count));

    let thread_count = if options.serial {
        1
    } else {
        thread::available_parallelism().map_or(1, |n| n.get())
    };

    thread::scope(|scope| {
        for _ in 0..thread_count {
            scope.spawn(|| {
                let Some(mut driver) = make_driver() else {
                    cancel.store(true, Ordering::SeqCst);
                    return;
                };

                worker(
                    options,
                    &queue,
                    &retry_budget,
                    reporter,
                    cancel,
                    &mut driver,
                );
            });
        }
    });
}

fn worker<D: Driver>(
    options: &Options,
    queue: &Mutex<Vec<Task>>,
    retry_budget: &AtomicI64,
    reporter: &Reporter,
    cancel: &AtomicBool,
    driver: &mut D,
) {
    while !cancel.load(Ordering::SeqCst) {
        let Some(task) = queue.lock().pop() else {
            return;
        };

        let outcome = driver.compile(&task);

        if cancel.load(Ordering::SeqCst) {
            return;
        }

        match outcome {
            CompileOutcome::Success { log } => reporter.task_succeeded(&task, &log),
            CompileOutcome::Transient { log } => {
                // fetch_sub claims one retry; losing the race fails hard.
                if retry_budget.fetch_sub(1, Ordering::SeqCst) > 0 {
                    reporter.task_retry_queued(&task);
                    queue.lock().push(task);
                } else {
                    fail(options, reporter, cancel, &task, &log);
                }
            }
            CompileOutcome::Failed { log } => fail(options, reporter, cancel, &task, &log),
        }
    }
}

fn fail(
    options: &Options,
    reporter: &Reporter,
    cancel: &AtomicBool,
    task: &Task,
    log: &str,
) {
    reporter.task_failed(task, log);
    if !options.continue_on_error {
        cancel.store(true, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::planner::Task;
    use shaderbake_common::{ShaderModel, ShaderProfile};
    use std::path::PathBuf;
    use std::sync::atomic::AtomicU32;
    use std::sync::Arc;

    fn task(name: &str) -> Task {
        Task {
            source: PathBuf::from(format!("{name}.hlsl")),
            entry_point: String::from("main"),
            profile: ShaderProfile::Pixel,
            shader_model: ShaderModel::default(),
            defines: Vec::new(),
            combined_defines: String::new(),
            optimization_level: 3,
            output_path_no_ext: PathBuf::from(format!("out/{name}")),
        }
    }

    struct ScriptedDriver {
        calls: Arc<AtomicU32>,
        outcome: fn() -> CompileOutcome,
    }

    impl Driver for ScriptedDriver {
        fn compile(&mut self, _task: &Task) -> CompileOutcome {
            self.calls.fetch_add(1, Ordering::SeqCst);
            (self.outcome)()
        }
    }

    fn run_one(
        options: &Options,
        tasks: Vec<Task>,
        cancel: &AtomicBool,
        outcome: fn() -> CompileOutcome,
    ) -> (Arc<AtomicU32>, Reporter) {
        let reporter = Reporter::new(options, tasks.len() as u32);
        let calls = Arc::new(AtomicU32::new(0));
        {
            let calls = Arc::clone(&calls);
            run_tasks(options, tasks, &reporter, cancel, move || {
                Some(ScriptedDriver {
                    calls: Arc::clone(&calls),
                    outcome,
                })
            });
        }
        (calls, reporter)
    }

    #[test]
    fn transient_failures_retry_until_the_budget_runs_out() {
        let options = Options {
            serial: true,
            retry_count: 2,
            ..Options::default()
        };
        let cancel = AtomicBool::new(false);

        let (calls, reporter) = run_one(&options, vec![task("t")], &cancel, || {
            CompileOutcome::Transient {
                log: String::from("spawn failed"),
            }
        });

        // Two re-enqueues, then the third attempt fails hard.
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(reporter.failed_count(), 1);
        assert!(cancel.load(Ordering::SeqCst));
    }

    #[test]
    fn continue_on_error_keeps_the_pool_running() {
        let options = Options {
            serial: true,
            retry_count: 0,
            continue_on_error: true,
            ..Options::default()
        };
        let cancel = AtomicBool::new(false);

        let (calls, reporter) = run_one(
            &options,
            vec![task("a"), task("b"), task("c")],
            &cancel,
            || CompileOutcome::Failed {
                log: String::from("bad shader"),
            },
        );

        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(reporter.failed_count(), 3);
        assert!(!cancel.load(Ordering::SeqCst));
    }

    #[test]
    fn first_hard_failure_cancels_the_run() {
        let options = Options {
            serial: true,
            retry_count: 0,
            ..Options::default()
        };
        let cancel = AtomicBool::new(false);

        let (calls, reporter) = run_one(
            &options,
            vec![task("a"), task("b"), task("c")],
            &cancel,
            || CompileOutcome::Failed {
                log: String::new(),
            },
        );

        // LIFO: "c" pops first, fails, and the rest never start.
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(reporter.failed_count(), 1);
        assert!(cancel.load(Ordering::SeqCst));
    }

    #[test]
    fn no_task_starts_after_cancellation() {
        let options = Options {
            serial: true,
            ..Options::default()
        };
        let cancel = AtomicBool::new(true);

        let (calls, _) = run_one(&options, vec![task("a"), task("b")], &cancel, || {
            CompileOutcome::Success { log: String::new() }
        });

        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn successful_tasks_drain_the_queue() {
        let options = Options {
            ..Options::default()
        };
        let cancel = AtomicBool::new(false);

        let (calls, reporter) = run_one(
            &options,
            (0..16).map(|i| task(&format!("t{i}"))).collect(),
            &cancel,
            || CompileOutcome::Success { log: String::new() },
        );

        assert_eq!(calls.load(Ordering::SeqCst), 16);
        assert_eq!(reporter.failed_count(), 0);
    }
}
