//! Readers for photon-count datasets.

use crate::error::csv_row_error;
use crate::format::OutputFormat;
use crate::writer::BINARY_ROW_BYTES;
use crate::{Error, Result};
use photonyield_core::table::{CERENKOV_COLUMN, SCINT_COLUMN};
use photonyield_core::{EventRecord, PhotonTable};
use std::path::Path;

const PHOTON_COLUMNS: [&str; 2] = [SCINT_COLUMN, CERENKOV_COLUMN];

/// Reads a photon dataset, choosing the format from the file extension.
///
/// # Errors
/// Returns an error if the file cannot be read or is malformed.
pub fn read_photons<P: AsRef<Path>>(path: P) -> Result<PhotonTable> {
    match OutputFormat::from_path(&path) {
        OutputFormat::Csv => read_photons_csv(path),
        OutputFormat::Binary => read_photons_binary(path),
        #[cfg(feature = "hdf5")]
        OutputFormat::Hdf5 => crate::hdf5::read_photons_hdf5(path),
        #[cfg(not(feature = "hdf5"))]
        OutputFormat::Hdf5 => Err(Error::UnsupportedFormat(
            "hdf5 input requires the `hdf5` feature".to_string(),
        )),
    }
}

/// Reads a CSV photon dataset written by [`crate::CsvSink`].
///
/// # Errors
/// Returns an error on I/O failure, a wrong header, or a malformed row.
pub fn read_photons_csv<P: AsRef<Path>>(path: P) -> Result<PhotonTable> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_path(path)?;

    let headers = rdr.headers()?;
    if !headers.iter().eq(PHOTON_COLUMNS) {
        let found = headers.iter().collect::<Vec<_>>().join(",");
        return Err(Error::InvalidFormat(format!(
            "unexpected CSV header '{found}', expected '{SCINT_COLUMN},{CERENKOV_COLUMN}'"
        )));
    }

    let mut table = PhotonTable::new();
    for row in rdr.deserialize::<(u64, u64)>() {
        let (scint, cerenkov) = row.map_err(|e| csv_row_error(e, &PHOTON_COLUMNS))?;
        table.push(EventRecord::new(scint, cerenkov));
    }
    Ok(table)
}

/// Reads a binary photon dataset written by [`crate::BinarySink`].
///
/// # Errors
/// Returns an error on I/O failure or a truncated final row.
pub fn read_photons_binary<P: AsRef<Path>>(path: P) -> Result<PhotonTable> {
    let data = std::fs::read(path)?;
    if data.len() % BINARY_ROW_BYTES != 0 {
        return Err(Error::InvalidFormat(format!(
            "binary length {} is not a multiple of {BINARY_ROW_BYTES}",
            data.len()
        )));
    }

    let mut table = PhotonTable::with_capacity(data.len() / BINARY_ROW_BYTES);
    for row in data.chunks_exact(BINARY_ROW_BYTES) {
        let (scint, cerenkov) = row.split_at(8);
        table.push(EventRecord::new(read_u64_le(scint)?, read_u64_le(cerenkov)?));
    }
    Ok(table)
}

fn read_u64_le(bytes: &[u8]) -> Result<u64> {
    let array: [u8; 8] = bytes
        .try_into()
        .map_err(|_| Error::InvalidFormat("short binary field".to_string()))?;
    Ok(u64::from_le_bytes(array))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::writer::{create_sink, PhotonSink};
    use tempfile::Builder;

    fn sample_table() -> PhotonTable {
        [(9012, 37), (0, 0), (8870, 154)]
            .into_iter()
            .map(|(s, c)| EventRecord::new(s, c))
            .collect()
    }

    fn write(path: &Path, table: &PhotonTable) {
        let mut sink = create_sink(path, OutputFormat::from_path(path)).unwrap();
        sink.write_table(table).unwrap();
        sink.finish().unwrap();
    }

    #[test]
    fn test_csv_read_back() {
        let file = Builder::new().suffix(".csv").tempfile().unwrap();
        write(file.path(), &sample_table());
        assert_eq!(read_photons(file.path()).unwrap(), sample_table());
    }

    #[test]
    fn test_binary_read_back() {
        let file = Builder::new().suffix(".bin").tempfile().unwrap();
        write(file.path(), &sample_table());
        assert_eq!(read_photons(file.path()).unwrap(), sample_table());
    }

    #[test]
    fn test_csv_bad_header() {
        let file = Builder::new().suffix(".csv").tempfile().unwrap();
        std::fs::write(file.path(), "x,y\n1,2\n").unwrap();
        assert!(matches!(
            read_photons_csv(file.path()),
            Err(Error::InvalidFormat(_))
        ));
    }

    #[test]
    fn test_csv_negative_count_rejected() {
        let file = Builder::new().suffix(".csv").tempfile().unwrap();
        std::fs::write(file.path(), "ScintPhoton,CerenkovPhoton\n10,-1\n").unwrap();
        let err = read_photons_csv(file.path()).unwrap_err();
        assert!(err.to_string().contains("line 2"), "{err}");
    }

    #[test]
    fn test_csv_quoted_counts() {
        let file = Builder::new().suffix(".csv").tempfile().unwrap();
        std::fs::write(
            file.path(),
            "\"ScintPhoton\",\"CerenkovPhoton\"\n\"9012\", 37\n",
        )
        .unwrap();
        let table = read_photons_csv(file.path()).unwrap();
        assert_eq!(table.get(0), Some(EventRecord::new(9012, 37)));
    }

    #[test]
    fn test_binary_truncated_row() {
        let file = Builder::new().suffix(".bin").tempfile().unwrap();
        std::fs::write(file.path(), [0u8; 20]).unwrap();
        assert!(matches!(
            read_photons_binary(file.path()),
            Err(Error::InvalidFormat(_))
        ));
    }
}
