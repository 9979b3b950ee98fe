//! I/O error types.

use thiserror::Error;

/// Result type for I/O operations.
pub type Result<T> = std::result::Result<T, Error>;

/// I/O error types.
#[derive(Error, Debug)]
pub enum Error {
    /// File I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// HDF5 library error.
    #[cfg(feature = "hdf5")]
    #[error("HDF5 error: {0}")]
    Hdf5(#[from] hdf5::Error),

    /// CSV framing or decoding error.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Invalid file format.
    #[error("invalid file format: {0}")]
    InvalidFormat(String),

    /// Output format not available in this build.
    #[error("unsupported output format: {0}")]
    UnsupportedFormat(String),

    /// Core library error.
    #[error("core error: {0}")]
    CoreError(#[from] photonyield_core::Error),

    /// Run lifecycle contract violation.
    #[error("run error: {0}")]
    Run(#[from] RunError),
}

/// Maps a row decoding failure to [`Error::InvalidFormat`] naming the line
/// and column; other CSV failures pass through as [`Error::Csv`].
pub(crate) fn csv_row_error(err: csv::Error, columns: &[&str]) -> Error {
    let line = err.position().map_or(0, csv::Position::line);
    if let csv::ErrorKind::Deserialize { err: de, .. } = err.kind() {
        let column = de
            .field()
            .and_then(|i| usize::try_from(i).ok())
            .and_then(|i| columns.get(i))
            .copied()
            .unwrap_or("field");
        return Error::InvalidFormat(format!("line {line}: invalid {column}: {}", de.kind()));
    }
    Error::Csv(err)
}

/// Misuse of the `begin_run -> record_event -> end_run` sequence.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunError {
    /// The run has not been opened.
    #[error("run is not open; call begin_run first")]
    NotOpen,

    /// `begin_run` on an already open run.
    #[error("run is already open")]
    AlreadyOpen,

    /// The run has been closed by `end_run`.
    #[error("run has already ended")]
    Finalized,

    /// `end_run` while worker handles are still recording.
    #[error("{0} worker(s) have not called end_run")]
    WorkersStillActive(usize),

    /// The shared run state was poisoned by a panicking worker.
    #[error("run state poisoned by a panicked worker")]
    Poisoned,
}
