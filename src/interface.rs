//! Threaded interface for resolving batches of annotation graphs.
//!
//! A batch runs on a background thread and resolves its graphs one after
//! another against a shared, read-only [`KnownIntervals`] table. Each graph
//! is a unit of failure isolation: an error in one graph is reported in its
//! row and the batch moves on. Cancellation is cooperative and only observed
//! between graphs, never in the middle of a resolution.

use std::collections::HashMap;
use std::sync::mpsc::{self, Receiver};
use std::sync::{Arc, Mutex, PoisonError, atomic::{AtomicBool, Ordering}};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use tracing::{info, warn};

use crate::error::Result;
use crate::graph::{AnnotationGraph, KnownIntervals};
use crate::resolve::{Value, resolve_graph};
use crate::settings::BatchSettings;

/// The outcome for one graph of a batch, at its position in the batch.
#[derive(Debug, Clone)]
pub struct BatchRow {
    pub index: usize,
    pub result: Result<Vec<Value>>,
}

/// Cancellation token shared with the worker thread.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);
impl CancelToken {
    pub fn new() -> Self { Self::default() }
    pub fn cancel(&self) { self.0.store(true, Ordering::SeqCst); }
    pub fn is_cancelled(&self) -> bool { self.0.load(Ordering::Relaxed) }
}

/// Opaque batch identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BatchId(u64);

/// What a finished batch did. `rows` is empty when results were streamed.
#[derive(Debug, Default)]
pub struct BatchSummary {
    pub rows: Vec<BatchRow>,
    pub resolved: usize,
    pub failed: usize,
    pub cancelled: bool,
}

/// Handle to a running or completed batch.
pub struct BatchHandle {
    pub id: BatchId,
    cancel: CancelToken,
    started: Instant,
    join: Option<JoinHandle<BatchSummary>>,
    pub results: Option<Receiver<BatchRow>>, // None unless streaming
}
impl BatchHandle {
    /// Request cancellation. Graphs already being resolved run to completion.
    pub fn cancel(&self) { self.cancel.cancel(); }
    /// Wait for the batch to finish.
    pub fn join(mut self) -> BatchSummary {
        match self.join.take().map(JoinHandle::join) {
            Some(Ok(summary)) => summary,
            Some(Err(_)) => {
                warn!(id = self.id.0, "batch worker panicked");
                BatchSummary { cancelled: true, ..BatchSummary::default() }
            }
            None => BatchSummary::default(),
        }
    }
    /// Elapsed time since start.
    pub fn elapsed(&self) -> Duration { self.started.elapsed() }
}

/// Batch submission options.
#[derive(Debug, Clone)]
pub struct BatchOptions {
    pub stream_results: bool,
    pub timeout: Option<Duration>,
}
impl Default for BatchOptions {
    fn default() -> Self { Self { stream_results: true, timeout: None } }
}
impl From<&BatchSettings> for BatchOptions {
    fn from(settings: &BatchSettings) -> Self {
        Self {
            stream_results: settings.stream_results,
            timeout: settings.timeout_ms.map(Duration::from_millis),
        }
    }
}

/// Registry managing batch lifecycles.
pub struct BatchInterface {
    known: Arc<KnownIntervals>, // shared, never mutated while batches run
    next_id: Mutex<u64>,
    active: Arc<Mutex<HashMap<BatchId, CancelToken>>>, // for external cancellation
}

impl BatchInterface {
    pub fn new(known: Arc<KnownIntervals>) -> Self {
        Self { known, next_id: Mutex::new(0), active: Arc::new(Mutex::new(HashMap::new())) }
    }

    pub fn known(&self) -> &KnownIntervals {
        &self.known
    }

    fn allocate_id(&self) -> BatchId {
        let mut g = self.next_id.lock().unwrap_or_else(PoisonError::into_inner);
        *g += 1; BatchId(*g)
    }

    /// Resolve `graphs` on a background thread. When `options.stream_results`
    /// is true, rows are sent over the handle's channel as they complete.
    pub fn start_batch(&self, graphs: Vec<AnnotationGraph>, options: BatchOptions) -> BatchHandle {
        let id = self.allocate_id();
        let cancel = CancelToken::new();
        self.active
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id, cancel.clone());

        let (tx, rx) = if options.stream_results {
            let (tx, rx) = mpsc::channel();
            (Some(tx), Some(rx))
        } else {
            (None, None)
        };

        let known = Arc::clone(&self.known);
        let active = Arc::clone(&self.active);
        let cancel_for_thread = cancel.clone();
        let started = Instant::now();
        let deadline = options.timeout.map(|d| started + d);
        let join = std::thread::spawn(move || {
            info!(id = id.0, graphs = graphs.len(), "batch started");
            let mut summary = BatchSummary::default();
            for (index, graph) in graphs.into_iter().enumerate() {
                // only between graphs, a half-resolved graph is never abandoned
                if cancel_for_thread.is_cancelled() || deadline.is_some_and(|d| Instant::now() >= d) {
                    summary.cancelled = true;
                    break;
                }
                let row = resolve_row(index, &graph, &known);
                if row.result.is_ok() { summary.resolved += 1 } else { summary.failed += 1 }
                match &tx {
                    Some(tx) => {
                        if tx.send(row).is_err() {
                            // receiver dropped, nobody is listening anymore
                            summary.cancelled = true;
                            break;
                        }
                    }
                    None => summary.rows.push(row),
                }
            }
            active.lock().unwrap_or_else(PoisonError::into_inner).remove(&id);
            info!(
                id = id.0,
                resolved = summary.resolved,
                failed = summary.failed,
                cancelled = summary.cancelled,
                "batch finished"
            );
            summary
        });

        BatchHandle { id, cancel, started, join: Some(join), results: rx }
    }

    /// Resolve `graphs` on the current thread.
    pub fn run_sync(&self, graphs: &[AnnotationGraph]) -> Vec<BatchRow> {
        graphs
            .iter()
            .enumerate()
            .map(|(index, graph)| resolve_row(index, graph, &self.known))
            .collect()
    }

    /// Cancel a batch by id.
    pub fn cancel(&self, id: BatchId) -> bool {
        if let Some(tok) = self.active.lock().unwrap_or_else(PoisonError::into_inner).get(&id) {
            tok.cancel();
            true
        } else { false }
    }
}

fn resolve_row(index: usize, graph: &AnnotationGraph, known: &KnownIntervals) -> BatchRow {
    let result = resolve_graph(graph, known);
    if let Err(e) = &result {
        warn!(index, error = %e, "graph failed to resolve");
    }
    BatchRow { index, result }
}
