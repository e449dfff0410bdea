//! Work item execution
//!
//! Items are independent: the scheduler gives no ordering guarantee, runs
//! each item at most once, and stops starting new items as soon as the run is
//! cancelled or an item faults.

use rayon::prelude::*;
use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tracing::info;

use crate::errors::{Result, SetupError};
use crate::progress::ProgressHandler;

/// Cooperative cancellation signal shared by every item of a run
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    flag: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// Safe point for long-running items
    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(SetupError::Cancelled)
        } else {
            Ok(())
        }
    }
}

type ItemAction = Box<dyn FnOnce(&CancellationToken) -> Result<()> + Send>;

/// A labelled unit of work
pub struct WorkItem {
    label: String,
    action: ItemAction,
}

impl WorkItem {
    pub fn new(
        label: impl Into<String>,
        action: impl FnOnce(&CancellationToken) -> Result<()> + Send + 'static,
    ) -> Self {
        Self {
            label: label.into(),
            action: Box::new(action),
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn run(self, token: &CancellationToken) -> Result<()> {
        (self.action)(token)
    }
}

impl fmt::Debug for WorkItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkItem")
            .field("label", &self.label)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ExecutionReport {
    pub completed: usize,
    pub skipped: usize,
}

#[derive(Default)]
struct RunState {
    faulted: AtomicBool,
    first_fault: Mutex<Option<SetupError>>,
    completed: AtomicUsize,
    skipped: AtomicUsize,
}

impl RunState {
    fn record_fault(&self, label: String, source: SetupError) {
        self.faulted.store(true, Ordering::SeqCst);
        let mut slot = self.first_fault.lock().unwrap_or_else(|e| e.into_inner());
        if slot.is_none() {
            *slot = Some(SetupError::ItemFault {
                label,
                source: Box::new(source),
            });
        }
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

/// Runs work items with a bounded degree of parallelism
#[derive(Debug, Clone, Copy)]
pub struct Scheduler {
    max_parallelism: usize,
}

impl Scheduler {
    /// `0` uses every available core, `1` runs items sequentially on the
    /// calling thread
    pub fn new(max_parallelism: usize) -> Self {
        Self { max_parallelism }
    }

    pub fn max_parallelism(&self) -> usize {
        self.max_parallelism
    }

    pub fn execute(
        &self,
        items: Vec<WorkItem>,
        token: &CancellationToken,
        progress: &dyn ProgressHandler,
    ) -> Result<ExecutionReport> {
        let total = items.len();
        let state = RunState::default();
        progress.run_started(total);

        let run_one = |item: WorkItem| {
            if token.is_cancelled() || state.faulted.load(Ordering::SeqCst) {
                state.skipped.fetch_add(1, Ordering::SeqCst);
                progress.item_skipped(item.label());
                return;
            }

            let label = item.label.clone();
            progress.item_started(&label);

            let outcome = panic::catch_unwind(AssertUnwindSafe(|| item.run(token)))
                .unwrap_or_else(|payload| Err(SetupError::Panicked(panic_message(payload))));

            match outcome {
                Ok(()) => {
                    state.completed.fetch_add(1, Ordering::SeqCst);
                    progress.item_finished(&label);
                }
                Err(e) if e.is_cancelled() => {
                    state.skipped.fetch_add(1, Ordering::SeqCst);
                    progress.item_skipped(&label);
                }
                Err(e) => {
                    progress.item_failed(&label, &e.to_string());
                    state.record_fault(label, e);
                }
            }
        };

        if self.max_parallelism == 1 {
            items.into_iter().for_each(run_one);
        } else {
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(self.max_parallelism)
                .thread_name(|i| format!("modsetup-worker-{}", i))
                .build()
                .map_err(|e| SetupError::Config(format!("Failed to start worker pool: {}", e)))?;
            pool.install(|| items.into_par_iter().for_each(run_one));
        }

        let report = ExecutionReport {
            completed: state.completed.load(Ordering::SeqCst),
            skipped: state.skipped.load(Ordering::SeqCst),
        };

        if let Some(fault) = state
            .first_fault
            .into_inner()
            .unwrap_or_else(|e| e.into_inner())
        {
            return Err(fault);
        }

        if token.is_cancelled() && report.completed < total {
            info!(
                "Cancelled after {} of {} work items",
                report.completed, total
            );
            return Err(SetupError::Cancelled);
        }

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::{CollectingProgressHandler, ProgressEvent};

    fn counting_items(n: usize, counter: &Arc<AtomicUsize>) -> Vec<WorkItem> {
        (0..n)
            .map(|i| {
                let counter = counter.clone();
                WorkItem::new(format!("item {}", i), move |_| {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                })
            })
            .collect()
    }

    #[test]
    fn test_runs_every_item_once() {
        for parallelism in [0, 1, 4] {
            let counter = Arc::new(AtomicUsize::new(0));
            let progress = CollectingProgressHandler::new();

            let report = Scheduler::new(parallelism)
                .execute(counting_items(50, &counter), &CancellationToken::new(), &progress)
                .unwrap();

            assert_eq!(report.completed, 50);
            assert_eq!(report.skipped, 0);
            assert_eq!(counter.load(Ordering::SeqCst), 50);
            assert_eq!(progress.finished_count(), 50);
        }
    }

    #[test]
    fn test_empty_run() {
        let report = Scheduler::new(0)
            .execute(Vec::new(), &CancellationToken::new(), &CollectingProgressHandler::new())
            .unwrap();
        assert_eq!(report, ExecutionReport::default());
    }

    #[test]
    fn test_cancelled_before_start() {
        let counter = Arc::new(AtomicUsize::new(0));
        let token = CancellationToken::new();
        token.cancel();

        let err = Scheduler::new(2)
            .execute(counting_items(10, &counter), &token, &CollectingProgressHandler::new())
            .unwrap_err();

        assert!(matches!(err, SetupError::Cancelled));
        assert_eq!(counter.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_cancel_midway_stops_dispatch() {
        let counter = Arc::new(AtomicUsize::new(0));
        let token = CancellationToken::new();

        let mut items = counting_items(3, &counter);
        items.push(WorkItem::new("cancel", |token: &CancellationToken| {
            token.cancel();
            Ok(())
        }));
        items.extend(counting_items(5, &counter));

        let err = Scheduler::new(1)
            .execute(items, &token, &CollectingProgressHandler::new())
            .unwrap_err();

        assert!(err.is_cancelled());
        assert_eq!(counter.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_fault_carries_label_and_stops_dispatch() {
        let counter = Arc::new(AtomicUsize::new(0));
        let progress = CollectingProgressHandler::new();

        let mut items = counting_items(2, &counter);
        items.push(WorkItem::new("Decompiling N/Bad.cs", |_| {
            Err(SetupError::Decompile("unsupported opcode".to_string()))
        }));
        items.extend(counting_items(4, &counter));

        let err = Scheduler::new(1)
            .execute(items, &CancellationToken::new(), &progress)
            .unwrap_err();

        match err {
            SetupError::ItemFault { label, source } => {
                assert_eq!(label, "Decompiling N/Bad.cs");
                assert!(matches!(*source, SetupError::Decompile(_)));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(counter.load(Ordering::SeqCst), 2);
        assert_eq!(progress.failed_count(), 1);
    }

    #[test]
    fn test_parallel_fault_accounts_for_every_item() {
        let total = 40;
        let counter = Arc::new(AtomicUsize::new(0));
        let progress = CollectingProgressHandler::new();

        let items: Vec<WorkItem> = (0..total)
            .map(|i| {
                if i == 10 {
                    WorkItem::new("Decompiling N/Bad.cs", |_| {
                        Err(SetupError::Decompile("unsupported opcode".to_string()))
                    })
                } else {
                    let counter = counter.clone();
                    WorkItem::new(format!("item {}", i), move |_| {
                        std::thread::sleep(std::time::Duration::from_millis(2));
                        counter.fetch_add(1, Ordering::SeqCst);
                        Ok(())
                    })
                }
            })
            .collect();

        let err = Scheduler::new(4)
            .execute(items, &CancellationToken::new(), &progress)
            .unwrap_err();

        match err {
            SetupError::ItemFault { label, .. } => assert_eq!(label, "Decompiling N/Bad.cs"),
            other => panic!("unexpected error: {other}"),
        }

        let skipped = progress
            .events()
            .iter()
            .filter(|e| matches!(e, ProgressEvent::ItemSkipped { .. }))
            .count();
        let completed = progress.finished_count();
        assert_eq!(progress.failed_count(), 1);
        assert_eq!(completed, counter.load(Ordering::SeqCst));
        assert_eq!(completed + skipped + 1, total);
    }

    #[test]
    fn test_panic_is_a_fault() {
        let items = vec![WorkItem::new("explodes", |_| panic!("kaboom"))];

        let err = Scheduler::new(1)
            .execute(items, &CancellationToken::new(), &CollectingProgressHandler::new())
            .unwrap_err();

        match err {
            SetupError::ItemFault { label, source } => {
                assert_eq!(label, "explodes");
                assert!(source.to_string().contains("kaboom"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
