use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use tracing::{debug, info, warn};

/// Progress of a scheduled run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgressEvent {
    RunStarted { total: usize },
    ItemStarted { label: String },
    ItemFinished { label: String },
    ItemFailed { label: String, message: String },
    ItemSkipped { label: String },
}

/// Trait for observing work item progress
/// This allows for dependency injection and testing with collecting handlers
pub trait ProgressHandler: Send + Sync {
    fn report(&self, event: ProgressEvent);

    fn run_started(&self, total: usize) {
        self.report(ProgressEvent::RunStarted { total });
    }

    fn item_started(&self, label: &str) {
        self.report(ProgressEvent::ItemStarted {
            label: label.to_string(),
        });
    }

    fn item_finished(&self, label: &str) {
        self.report(ProgressEvent::ItemFinished {
            label: label.to_string(),
        });
    }

    fn item_failed(&self, label: &str, message: &str) {
        self.report(ProgressEvent::ItemFailed {
            label: label.to_string(),
            message: message.to_string(),
        });
    }

    fn item_skipped(&self, label: &str) {
        self.report(ProgressEvent::ItemSkipped {
            label: label.to_string(),
        });
    }

    fn finished_count(&self) -> usize;
    fn failed_count(&self) -> usize;
    fn events(&self) -> Vec<ProgressEvent>;
}

fn count(events: &[ProgressEvent], pred: impl Fn(&ProgressEvent) -> bool) -> usize {
    events.iter().filter(|e| pred(e)).count()
}

/// Progress handler that logs through `tracing`
///
/// Keeps counters only; `events()` is always empty.
#[derive(Debug, Default)]
pub struct ConsoleProgressHandler {
    total: AtomicUsize,
    done: AtomicUsize,
    failed: AtomicUsize,
}

impl ConsoleProgressHandler {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ProgressHandler for ConsoleProgressHandler {
    fn report(&self, event: ProgressEvent) {
        match event {
            ProgressEvent::RunStarted { total } => {
                self.total.store(total, Ordering::SeqCst);
                self.done.store(0, Ordering::SeqCst);
                self.failed.store(0, Ordering::SeqCst);
                info!("Executing {} work items", total);
            }
            ProgressEvent::ItemStarted { label } => debug!("{}", label),
            ProgressEvent::ItemFinished { label } => {
                let done = self.done.fetch_add(1, Ordering::SeqCst) + 1;
                let total = self.total.load(Ordering::SeqCst);
                debug!("[{}/{}] {}", done, total, label);
            }
            ProgressEvent::ItemFailed { label, message } => {
                self.failed.fetch_add(1, Ordering::SeqCst);
                warn!("{} failed: {}", label, message);
            }
            ProgressEvent::ItemSkipped { label } => debug!("Skipped {}", label),
        }
    }

    fn finished_count(&self) -> usize {
        self.done.load(Ordering::SeqCst)
    }

    fn failed_count(&self) -> usize {
        self.failed.load(Ordering::SeqCst)
    }

    fn events(&self) -> Vec<ProgressEvent> {
        Vec::new()
    }
}

/// Collecting progress handler for testing
/// Collects all events without logging
#[derive(Debug, Default)]
pub struct CollectingProgressHandler {
    events: Mutex<Vec<ProgressEvent>>,
}

impl CollectingProgressHandler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Labels of items that finished, sorted
    pub fn finished_labels(&self) -> Vec<String> {
        let mut labels: Vec<String> = self
            .events()
            .into_iter()
            .filter_map(|e| match e {
                ProgressEvent::ItemFinished { label } => Some(label),
                _ => None,
            })
            .collect();
        labels.sort();
        labels
    }
}

impl ProgressHandler for CollectingProgressHandler {
    fn report(&self, event: ProgressEvent) {
        self.events
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(event);
    }

    fn finished_count(&self) -> usize {
        let events = self.events.lock().unwrap_or_else(|e| e.into_inner());
        count(&events, |e| matches!(e, ProgressEvent::ItemFinished { .. }))
    }

    fn failed_count(&self) -> usize {
        let events = self.events.lock().unwrap_or_else(|e| e.into_inner());
        count(&events, |e| matches!(e, ProgressEvent::ItemFailed { .. }))
    }

    fn events(&self) -> Vec<ProgressEvent> {
        self.events.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}
