//! Run-level aggregation of per-event photon rows.
//!
//! A run moves through `Closed -> Open -> Finalized`. While open, any number
//! of worker handles record events into private buffers and merge them into
//! one consolidated store under a single lock. `end_run` writes whatever is
//! still pending, closes the sink and reports what was written.
//!
//! ```text
//! RunAggregator::begin_run ──► worker() ──► WorkerRun::record_event ...
//!                          ──► worker() ──► WorkerRun::record_event ...
//!                                   each WorkerRun::end_run
//!                          ──► RunAggregator::end_run ──► RunSummary
//! ```

use crate::error::RunError;
use crate::format::OutputFormat;
use crate::writer::{create_sink, PhotonSink};
use crate::Result;
use log::{debug, info, warn};
use photonyield_core::{EventRecord, PhotonTable};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

/// Rows buffered before a merge into the shared store.
pub const DEFAULT_FLUSH_ROWS: usize = 4096;

/// Lifecycle state of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    /// `begin_run` has not been called.
    Closed,
    /// Accepting events.
    Open,
    /// `end_run` completed; no further writes are accepted.
    Finalized,
}

/// Outcome of a completed run.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct RunSummary {
    /// Dataset the run was written to.
    pub path: PathBuf,
    /// Layout of the dataset.
    #[cfg_attr(feature = "serde", serde(serialize_with = "serialize_format"))]
    pub format: OutputFormat,
    /// Rows in the consolidated dataset, one per recorded event.
    pub events: usize,
    /// Scintillation photons summed over all events.
    pub scint_total: u64,
    /// Cerenkov photons summed over all events.
    pub cerenkov_total: u64,
    /// Worker handles that contributed rows or closed cleanly.
    pub worker_runs: usize,
}

impl RunSummary {
    /// Mean scintillation photons per event.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn scint_mean(&self) -> f64 {
        if self.events == 0 {
            0.0
        } else {
            self.scint_total as f64 / self.events as f64
        }
    }

    /// Mean Cerenkov photons per event.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn cerenkov_mean(&self) -> f64 {
        if self.events == 0 {
            0.0
        } else {
            self.cerenkov_total as f64 / self.events as f64
        }
    }
}

#[cfg(feature = "serde")]
fn serialize_format<S: serde::Serializer>(
    format: &OutputFormat,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    serializer.collect_str(format)
}

struct RunShared {
    state: RunState,
    sink: Option<Box<dyn PhotonSink>>,
    pending: PhotonTable,
    events: usize,
    scint_total: u64,
    cerenkov_total: u64,
    active_workers: usize,
    registered: usize,
    worker_runs: usize,
}

impl RunShared {
    fn new() -> Self {
        Self {
            state: RunState::Closed,
            sink: None,
            pending: PhotonTable::new(),
            events: 0,
            scint_total: 0,
            cerenkov_total: 0,
            active_workers: 0,
            registered: 0,
            worker_runs: 0,
        }
    }

    fn require_open(&self) -> std::result::Result<(), RunError> {
        match self.state {
            RunState::Open => Ok(()),
            RunState::Closed => Err(RunError::NotOpen),
            RunState::Finalized => Err(RunError::Finalized),
        }
    }

    fn merge(&mut self, rows: &PhotonTable) {
        for row in rows.rows() {
            self.scint_total = self.scint_total.saturating_add(row.scint_total);
            self.cerenkov_total = self.cerenkov_total.saturating_add(row.cerenkov_total);
        }
        self.events += rows.len();
        self.pending.append(rows);
    }

    fn push(&mut self, record: EventRecord) {
        self.scint_total = self.scint_total.saturating_add(record.scint_total);
        self.cerenkov_total = self.cerenkov_total.saturating_add(record.cerenkov_total);
        self.events += 1;
        self.pending.push(record);
    }

    /// Writes pending rows once `threshold` is reached; `0` forces the write.
    fn drain(&mut self, threshold: usize) -> Result<()> {
        if self.pending.is_empty() || self.pending.len() < threshold {
            return Ok(());
        }
        let sink = self.sink.as_mut().ok_or(RunError::NotOpen)?;
        sink.write_table(&self.pending)?;
        self.pending.clear();
        Ok(())
    }
}

fn lock(shared: &Mutex<RunShared>) -> std::result::Result<MutexGuard<'_, RunShared>, RunError> {
    shared.lock().map_err(|_| RunError::Poisoned)
}

/// Consolidates event rows from concurrent workers into one dataset.
///
/// The aggregator is `Sync`; share it by reference across threads and hand
/// each thread its own [`WorkerRun`].
pub struct RunAggregator {
    path: PathBuf,
    format: OutputFormat,
    flush_rows: usize,
    shared: Arc<Mutex<RunShared>>,
}

impl RunAggregator {
    /// Creates an aggregator writing to `path`, format chosen by extension.
    #[must_use]
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        let format = OutputFormat::from_path(&path);
        Self {
            path: path.as_ref().to_path_buf(),
            format,
            flush_rows: DEFAULT_FLUSH_ROWS,
            shared: Arc::new(Mutex::new(RunShared::new())),
        }
    }

    /// Overrides the output format.
    #[must_use]
    pub fn with_format(mut self, format: OutputFormat) -> Self {
        self.format = format;
        self
    }

    /// Sets how many rows are buffered before merging or writing.
    #[must_use]
    pub fn with_flush_rows(mut self, rows: usize) -> Self {
        self.flush_rows = rows.max(1);
        self
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[must_use]
    pub fn format(&self) -> OutputFormat {
        self.format
    }

    /// Current lifecycle state.
    ///
    /// # Errors
    /// Returns [`RunError::Poisoned`] if a worker panicked while holding the lock.
    pub fn state(&self) -> Result<RunState> {
        Ok(lock(&self.shared)?.state)
    }

    /// Rows merged into the consolidated store so far.
    ///
    /// # Errors
    /// Returns [`RunError::Poisoned`] if a worker panicked while holding the lock.
    pub fn events_recorded(&self) -> Result<usize> {
        Ok(lock(&self.shared)?.events)
    }

    /// Opens the run and creates the dataset, discarding any previous content.
    ///
    /// # Errors
    /// Returns [`RunError::AlreadyOpen`] or [`RunError::Finalized`] when called
    /// out of order, or an I/O error if the sink cannot be created.
    pub fn begin_run(&self) -> Result<()> {
        let mut shared = lock(&self.shared)?;
        match shared.state {
            RunState::Closed => {}
            RunState::Open => return Err(RunError::AlreadyOpen.into()),
            RunState::Finalized => return Err(RunError::Finalized.into()),
        }
        shared.sink = Some(create_sink(&self.path, self.format)?);
        shared.state = RunState::Open;
        debug!(
            "Run opened: {} ({})",
            self.path.display(),
            self.format
        );
        Ok(())
    }

    /// Registers a worker and returns its recording handle.
    ///
    /// # Errors
    /// Returns [`RunError::NotOpen`] or [`RunError::Finalized`] outside an open run.
    pub fn worker(&self) -> Result<WorkerRun> {
        let mut shared = lock(&self.shared)?;
        shared.require_open()?;
        let id = shared.registered;
        shared.registered += 1;
        shared.active_workers += 1;
        debug!("Worker {id} joined run");
        Ok(WorkerRun {
            id,
            shared: Arc::clone(&self.shared),
            buffer: PhotonTable::new(),
            flush_rows: self.flush_rows,
            recorded: 0,
            closed: false,
        })
    }

    /// Appends one row directly to the consolidated store.
    ///
    /// # Errors
    /// Returns [`RunError::NotOpen`] or [`RunError::Finalized`] outside an open
    /// run, or an I/O error from the sink.
    pub fn record_event(&self, record: EventRecord) -> Result<()> {
        let mut shared = lock(&self.shared)?;
        shared.require_open()?;
        shared.push(record);
        shared.drain(self.flush_rows)
    }

    /// Writes remaining rows, closes the dataset and finalizes the run.
    ///
    /// # Errors
    /// Returns [`RunError::WorkersStillActive`] while worker handles are open
    /// (the run stays open), [`RunError::NotOpen`] / [`RunError::Finalized`]
    /// when called out of order, or an I/O error from the sink.
    pub fn end_run(&self) -> Result<RunSummary> {
        let mut shared = lock(&self.shared)?;
        shared.require_open()?;
        if shared.active_workers > 0 {
            return Err(RunError::WorkersStillActive(shared.active_workers).into());
        }

        shared.drain(0)?;
        let mut sink = shared.sink.take().ok_or(RunError::NotOpen)?;
        shared.state = RunState::Finalized;
        sink.finish()?;

        let written = sink.rows_written();
        if written != shared.events {
            warn!(
                "Sink reports {written} rows but {} events were recorded",
                shared.events
            );
        }

        let summary = RunSummary {
            path: self.path.clone(),
            format: self.format,
            events: shared.events,
            scint_total: shared.scint_total,
            cerenkov_total: shared.cerenkov_total,
            worker_runs: shared.worker_runs,
        };
        info!(
            "Run finalized: {} events from {} worker(s) -> {}",
            summary.events,
            summary.worker_runs,
            self.path.display()
        );
        Ok(summary)
    }
}

/// A worker's handle on an open run.
///
/// Rows are buffered locally and merged into the shared store in batches.
/// Call [`WorkerRun::end_run`] when the worker is done; dropping the handle
/// merges the buffer too, but logs a warning and swallows errors.
pub struct WorkerRun {
    id: usize,
    shared: Arc<Mutex<RunShared>>,
    buffer: PhotonTable,
    flush_rows: usize,
    recorded: usize,
    closed: bool,
}

impl WorkerRun {
    /// Registration index of this worker within the run.
    #[must_use]
    pub fn id(&self) -> usize {
        self.id
    }

    /// Events recorded through this handle.
    #[must_use]
    pub fn recorded(&self) -> usize {
        self.recorded
    }

    /// Buffers one event row, merging the buffer once it is full.
    ///
    /// # Errors
    /// Returns an error if the merge fails.
    pub fn record_event(&mut self, record: EventRecord) -> Result<()> {
        self.buffer.push(record);
        self.recorded += 1;
        if self.buffer.len() >= self.flush_rows {
            self.merge()?;
        }
        Ok(())
    }

    /// Merges buffered rows into the shared store.
    ///
    /// The buffer is only cleared once the shared store holds its rows, so a
    /// failed merge can be retried.
    ///
    /// # Errors
    /// Returns [`RunError::Poisoned`] or an I/O error from the sink.
    pub fn merge(&mut self) -> Result<()> {
        if self.buffer.is_empty() {
            return Ok(());
        }
        let mut shared = lock(&self.shared)?;
        shared.require_open()?;
        shared.merge(&self.buffer);
        self.buffer.clear();
        shared.drain(self.flush_rows)
    }

    /// Rows recorded but not yet merged.
    #[must_use]
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Merges remaining rows and deregisters the worker.
    ///
    /// Returns the number of events this worker recorded.
    ///
    /// # Errors
    /// Returns an error if the final merge fails; the worker is deregistered
    /// either way.
    pub fn end_run(mut self) -> Result<usize> {
        let merged = self.merge();
        self.close()?;
        merged?;
        debug!("Worker {} finished with {} events", self.id, self.recorded);
        Ok(self.recorded)
    }

    fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        let mut shared = lock(&self.shared)?;
        shared.active_workers = shared.active_workers.saturating_sub(1);
        shared.worker_runs += 1;
        Ok(())
    }
}

impl Drop for WorkerRun {
    fn drop(&mut self) {
        if self.closed {
            return;
        }
        warn!(
            "Worker {} dropped without end_run; merging {} buffered rows",
            self.id,
            self.buffer.len()
        );
        if let Err(e) = self.merge() {
            warn!("Worker {} lost buffered rows: {e}", self.id);
        }
        if let Err(e) = self.close() {
            warn!("Worker {} could not deregister: {e}", self.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reader::read_photons;
    use crate::Error;
    use tempfile::{Builder, NamedTempFile};

    fn csv_path() -> NamedTempFile {
        Builder::new().suffix(".csv").tempfile().unwrap()
    }

    #[test]
    fn test_state_machine() {
        let file = csv_path();
        let run = RunAggregator::new(file.path());
        assert_eq!(run.state().unwrap(), RunState::Closed);

        assert!(matches!(
            run.record_event(EventRecord::new(1, 1)),
            Err(Error::Run(RunError::NotOpen))
        ));
        assert!(matches!(
            run.end_run(),
            Err(Error::Run(RunError::NotOpen))
        ));

        run.begin_run().unwrap();
        assert_eq!(run.state().unwrap(), RunState::Open);
        assert!(matches!(
            run.begin_run(),
            Err(Error::Run(RunError::AlreadyOpen))
        ));

        run.end_run().unwrap();
        assert_eq!(run.state().unwrap(), RunState::Finalized);
        assert!(matches!(
            run.record_event(EventRecord::new(1, 1)),
            Err(Error::Run(RunError::Finalized))
        ));
        assert!(matches!(
            run.begin_run(),
            Err(Error::Run(RunError::Finalized))
        ));
        assert!(matches!(run.worker(), Err(Error::Run(RunError::Finalized))));
    }

    #[test]
    fn test_direct_record_event() {
        let file = csv_path();
        let run = RunAggregator::new(file.path()).with_flush_rows(2);
        run.begin_run().unwrap();
        for i in 0..5 {
            run.record_event(EventRecord::new(i, 2 * i)).unwrap();
        }
        let summary = run.end_run().unwrap();

        assert_eq!(summary.events, 5);
        assert_eq!(summary.scint_total, 10);
        assert_eq!(summary.cerenkov_total, 20);
        assert!((summary.scint_mean() - 2.0).abs() < f64::EPSILON);

        let table = read_photons(file.path()).unwrap();
        assert_eq!(table.scint, vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn test_end_run_waits_for_workers() {
        let file = csv_path();
        let run = RunAggregator::new(file.path());
        run.begin_run().unwrap();

        let mut worker = run.worker().unwrap();
        worker.record_event(EventRecord::new(7, 3)).unwrap();
        assert!(matches!(
            run.end_run(),
            Err(Error::Run(RunError::WorkersStillActive(1)))
        ));
        assert_eq!(run.state().unwrap(), RunState::Open);

        assert_eq!(worker.end_run().unwrap(), 1);
        let summary = run.end_run().unwrap();
        assert_eq!(summary.events, 1);
        assert_eq!(summary.worker_runs, 1);
    }

    #[test]
    fn test_dropped_worker_merges_rows() {
        let file = csv_path();
        let run = RunAggregator::new(file.path());
        run.begin_run().unwrap();
        {
            let mut worker = run.worker().unwrap();
            worker.record_event(EventRecord::new(1, 0)).unwrap();
            worker.record_event(EventRecord::new(2, 0)).unwrap();
        }
        let summary = run.end_run().unwrap();
        assert_eq!(summary.events, 2);
        assert_eq!(read_photons(file.path()).unwrap().len(), 2);
    }

    #[test]
    fn test_failed_merge_keeps_rows() {
        let file = csv_path();
        let run = RunAggregator::new(file.path()).with_flush_rows(100);
        run.begin_run().unwrap();

        let mut worker = run.worker().unwrap();
        worker.record_event(EventRecord::new(5, 1)).unwrap();
        worker.record_event(EventRecord::new(6, 2)).unwrap();

        let shared = Arc::clone(&worker.shared);
        let panicked = std::thread::spawn(move || {
            let _guard = shared.lock().unwrap();
            panic!("worker panicked while holding the run lock");
        })
        .join();
        assert!(panicked.is_err());

        assert!(matches!(
            worker.merge(),
            Err(Error::Run(RunError::Poisoned))
        ));
        assert_eq!(worker.buffered(), 2);
        assert_eq!(worker.recorded(), 2);
        assert!(matches!(run.events_recorded(), Err(Error::Run(RunError::Poisoned))));
    }

    #[test]
    fn test_merge_moves_buffer_to_run() {
        let file = csv_path();
        let run = RunAggregator::new(file.path()).with_flush_rows(100);
        run.begin_run().unwrap();

        let mut worker = run.worker().unwrap();
        worker.record_event(EventRecord::new(5, 1)).unwrap();
        assert_eq!(worker.buffered(), 1);
        assert_eq!(run.events_recorded().unwrap(), 0);

        worker.merge().unwrap();
        assert_eq!(worker.buffered(), 0);
        assert_eq!(run.events_recorded().unwrap(), 1);
        worker.end_run().unwrap();
        assert_eq!(run.end_run().unwrap().events, 1);
    }

    #[test]
    fn test_empty_run_writes_header_only() {
        let file = csv_path();
        std::fs::write(file.path(), "ScintPhoton,CerenkovPhoton\n1,1\n").unwrap();

        let run = RunAggregator::new(file.path());
        run.begin_run().unwrap();
        let summary = run.end_run().unwrap();
        assert_eq!(summary.events, 0);
        assert!(summary.scint_mean().abs() < f64::EPSILON);
        assert!(read_photons(file.path()).unwrap().is_empty());
    }

    #[test]
    fn test_concurrent_workers_row_count() {
        const WORKERS: u64 = 8;
        const PER_WORKER: u64 = 250;

        let file = Builder::new().suffix(".bin").tempfile().unwrap();
        let run = RunAggregator::new(file.path()).with_flush_rows(16);
        run.begin_run().unwrap();

        std::thread::scope(|scope| {
            for w in 0..WORKERS {
                let mut worker = run.worker().unwrap();
                scope.spawn(move || {
                    for i in 0..PER_WORKER {
                        worker
                            .record_event(EventRecord::new(w * 1000 + i, 1))
                            .unwrap();
                    }
                    worker.end_run().unwrap();
                });
            }
        });

        let summary = run.end_run().unwrap();
        let expected = usize::try_from(WORKERS * PER_WORKER).unwrap();
        assert_eq!(summary.events, expected);
        assert_eq!(summary.worker_runs, 8);
        assert_eq!(summary.cerenkov_total, WORKERS * PER_WORKER);

        let mut scint = read_photons(file.path()).unwrap().scint;
        assert_eq!(scint.len(), expected);
        scint.sort_unstable();
        scint.dedup();
        assert_eq!(scint.len(), expected);
    }
}
