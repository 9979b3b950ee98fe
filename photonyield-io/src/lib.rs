//! photonyield-io: Dataset I/O and run aggregation for photonyield.
//!
//! Provides the per-run photon table writers (CSV, binary, optional HDF5),
//! matching readers, the step-trace parser used for replays, and the
//! [`RunAggregator`] that merges rows from concurrent workers.

mod error;
mod format;
#[cfg(feature = "hdf5")]
pub mod hdf5;
mod reader;
pub mod run;
pub mod trace;
mod writer;

pub use error::{Error, Result, RunError};
pub use format::{OutputFormat, DEFAULT_OUTPUT_STEM};
#[cfg(feature = "hdf5")]
pub use hdf5::{Hdf5PhotonSink, PhotonWriteOptions};
pub use reader::{read_photons, read_photons_binary, read_photons_csv};
pub use run::{RunAggregator, RunState, RunSummary, WorkerRun, DEFAULT_FLUSH_ROWS};
pub use trace::{parse_trace, read_trace, EventTrace, TraceStep, TRACE_HEADER};
pub use writer::{
    create_sink, BinarySink, CsvSink, PhotonFileWriter, PhotonSink, BINARY_ROW_BYTES,
};
