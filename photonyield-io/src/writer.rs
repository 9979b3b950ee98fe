//! File writers for photon-count datasets.

use crate::format::OutputFormat;
use crate::Result;
use photonyield_core::table::{CERENKOV_COLUMN, SCINT_COLUMN};
use photonyield_core::PhotonTable;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// Bytes per event in the binary layout.
pub const BINARY_ROW_BYTES: usize = 16;

/// Writer for photon-count output files.
///
/// Opening the writer creates or truncates the file.
pub struct PhotonFileWriter {
    writer: BufWriter<File>,
}

impl PhotonFileWriter {
    /// Creates a new file writer.
    ///
    /// # Errors
    /// Returns an error if the file cannot be created.
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::create(path)?;
        let writer = BufWriter::new(file);
        Ok(Self { writer })
    }

    /// Writes the CSV header row.
    ///
    /// # Errors
    /// Returns an error if the write fails.
    pub fn write_header_csv(&mut self) -> Result<()> {
        writeln!(self.writer, "{SCINT_COLUMN},{CERENKOV_COLUMN}")?;
        Ok(())
    }

    /// Writes rows as CSV.
    ///
    /// # Errors
    /// Returns an error if the write fails.
    pub fn write_rows_csv(&mut self, table: &PhotonTable) -> Result<()> {
        for row in table.rows() {
            writeln!(self.writer, "{},{}", row.scint_total, row.cerenkov_total)?;
        }
        Ok(())
    }

    /// Writes rows as binary data.
    ///
    /// Format: for each event, u64 (scintillation) + u64 (Cerenkov), little-endian.
    ///
    /// # Errors
    /// Returns an error if the write fails.
    pub fn write_rows_binary(&mut self, table: &PhotonTable) -> Result<()> {
        for row in table.rows() {
            self.writer.write_all(&row.scint_total.to_le_bytes())?;
            self.writer.write_all(&row.cerenkov_total.to_le_bytes())?;
        }
        Ok(())
    }

    /// Flushes the writer.
    ///
    /// # Errors
    /// Returns an error if the flush fails.
    pub fn flush(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }
}

/// Destination of consolidated photon rows.
///
/// A sink is created (truncating any previous content) when a run opens,
/// receives rows in one or more `write_table` calls, and is closed by
/// `finish` when the run ends.
pub trait PhotonSink: Send {
    /// Appends rows.
    ///
    /// # Errors
    /// Returns an error if the underlying store rejects the write.
    fn write_table(&mut self, table: &PhotonTable) -> Result<()>;

    /// Flushes and closes the store.
    ///
    /// # Errors
    /// Returns an error if the final flush fails.
    fn finish(&mut self) -> Result<()>;

    /// Rows written so far.
    fn rows_written(&self) -> usize;

    /// Format name for logging.
    fn format(&self) -> OutputFormat;
}

/// CSV sink with a header row.
pub struct CsvSink {
    writer: PhotonFileWriter,
    rows: usize,
}

impl CsvSink {
    /// Creates the file and writes the header.
    ///
    /// # Errors
    /// Returns an error if the file cannot be created.
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut writer = PhotonFileWriter::create(path)?;
        writer.write_header_csv()?;
        Ok(Self { writer, rows: 0 })
    }
}

impl PhotonSink for CsvSink {
    fn write_table(&mut self, table: &PhotonTable) -> Result<()> {
        self.writer.write_rows_csv(table)?;
        self.rows += table.len();
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        self.writer.flush()
    }

    fn rows_written(&self) -> usize {
        self.rows
    }

    fn format(&self) -> OutputFormat {
        OutputFormat::Csv
    }
}

/// Headerless little-endian binary sink.
pub struct BinarySink {
    writer: PhotonFileWriter,
    rows: usize,
}

impl BinarySink {
    /// Creates the file.
    ///
    /// # Errors
    /// Returns an error if the file cannot be created.
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        Ok(Self {
            writer: PhotonFileWriter::create(path)?,
            rows: 0,
        })
    }
}

impl PhotonSink for BinarySink {
    fn write_table(&mut self, table: &PhotonTable) -> Result<()> {
        self.writer.write_rows_binary(table)?;
        self.rows += table.len();
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        self.writer.flush()
    }

    fn rows_written(&self) -> usize {
        self.rows
    }

    fn format(&self) -> OutputFormat {
        OutputFormat::Binary
    }
}

/// Opens a sink of the requested format, truncating `path`.
///
/// # Errors
/// Returns an error if the file cannot be created, or
/// [`crate::Error::UnsupportedFormat`] for HDF5 without the `hdf5` feature.
pub fn create_sink<P: AsRef<Path>>(path: P, format: OutputFormat) -> Result<Box<dyn PhotonSink>> {
    match format {
        OutputFormat::Csv => Ok(Box::new(CsvSink::create(path)?)),
        OutputFormat::Binary => Ok(Box::new(BinarySink::create(path)?)),
        #[cfg(feature = "hdf5")]
        OutputFormat::Hdf5 => Ok(Box::new(crate::hdf5::Hdf5PhotonSink::create(
            path,
            crate::hdf5::PhotonWriteOptions::default(),
        )?)),
        #[cfg(not(feature = "hdf5"))]
        OutputFormat::Hdf5 => Err(crate::Error::UnsupportedFormat(
            "hdf5 output requires the `hdf5` feature".to_string(),
        )),
    }
}
