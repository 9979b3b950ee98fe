//! HDF5 photon-count datasets.
//!
//! Layout:
//!
//! ```text
//! /                        photonyield_format_version = "0.1"
//! /entry                   NX_class = "NXentry"
//! /entry/PhotonTree        NX_class = "NXdata", calibration attributes
//! /entry/PhotonTree/ScintPhoton      u64[n_events]
//! /entry/PhotonTree/CerenkovPhoton   u64[n_events]
//! ```

use crate::format::OutputFormat;
use crate::writer::PhotonSink;
use crate::{Error, Result};
use hdf5::types::{H5Type, VarLenUnicode};
use hdf5::{Dataset, File, Group, Location};
use ndarray::{s, ArrayView1};
use photonyield_core::table::{CERENKOV_COLUMN, SCINT_COLUMN, TABLE_NAME};
use photonyield_core::{PhotonTable, YieldConfig};
use std::ops::Range;
use std::path::Path;
use std::str::FromStr;

/// Dataset write configuration.
#[derive(Clone, Debug)]
pub struct PhotonWriteOptions {
    /// Rows per HDF5 chunk.
    pub chunk_events: usize,
    /// Deflate level, or `None` for uncompressed columns.
    pub compression: Option<u8>,
    /// Apply the byte-shuffle filter before compression.
    pub shuffle: bool,
    /// Calibration constants stored as group attributes.
    pub config: Option<YieldConfig>,
}

impl Default for PhotonWriteOptions {
    fn default() -> Self {
        Self {
            chunk_events: 65_536,
            compression: Some(1),
            shuffle: true,
            config: None,
        }
    }
}

/// Streaming HDF5 sink for photon rows.
pub struct Hdf5PhotonSink {
    file: File,
    scint: Dataset,
    cerenkov: Dataset,
    rows: usize,
}

impl Hdf5PhotonSink {
    /// Creates (truncating) the file and its extendable datasets.
    ///
    /// # Errors
    /// Returns an error if the HDF5 file or datasets cannot be created.
    pub fn create<P: AsRef<Path>>(path: P, options: PhotonWriteOptions) -> Result<Self> {
        let file = File::create(path)?;
        write_str_attr(&file, "photonyield_format_version", "0.1")?;

        let entry = file.create_group("entry")?;
        write_str_attr(&entry, "NX_class", "NXentry")?;

        let tree = entry.create_group(TABLE_NAME)?;
        write_str_attr(&tree, "NX_class", "NXdata")?;
        if let Some(config) = &options.config {
            set_calibration_attrs(&tree, config)?;
        }

        let scint = photon_column(&tree, SCINT_COLUMN, &options)?;
        let cerenkov = photon_column(&tree, CERENKOV_COLUMN, &options)?;

        Ok(Self {
            file,
            scint,
            cerenkov,
            rows: 0,
        })
    }
}

impl PhotonSink for Hdf5PhotonSink {
    fn write_table(&mut self, table: &PhotonTable) -> Result<()> {
        if table.is_empty() {
            return Ok(());
        }
        let end = self.rows + table.len();
        extend_column(&self.scint, self.rows..end, &table.scint)?;
        extend_column(&self.cerenkov, self.rows..end, &table.cerenkov)?;
        self.rows = end;
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        self.file.flush()?;
        Ok(())
    }

    fn rows_written(&self) -> usize {
        self.rows
    }

    fn format(&self) -> OutputFormat {
        OutputFormat::Hdf5
    }
}

/// Writes a complete photon table to an HDF5 file.
///
/// # Errors
/// Returns an error if HDF5 I/O fails.
pub fn write_photons_hdf5<P: AsRef<Path>>(
    path: P,
    table: &PhotonTable,
    options: PhotonWriteOptions,
) -> Result<()> {
    let mut sink = Hdf5PhotonSink::create(path, options)?;
    sink.write_table(table)?;
    sink.finish()
}

/// Reads a photon table from an HDF5 file.
///
/// # Errors
/// Returns an error if HDF5 I/O fails or the columns differ in length.
pub fn read_photons_hdf5<P: AsRef<Path>>(path: P) -> Result<PhotonTable> {
    let file = File::open(path)?;
    let tree = file.group("entry")?.group(TABLE_NAME)?;
    let scint = tree.dataset(SCINT_COLUMN)?.read_raw::<u64>()?;
    let cerenkov = tree.dataset(CERENKOV_COLUMN)?.read_raw::<u64>()?;
    if scint.len() != cerenkov.len() {
        return Err(Error::InvalidFormat(format!(
            "column length mismatch: {} scintillation vs {} cerenkov rows",
            scint.len(),
            cerenkov.len()
        )));
    }
    Ok(PhotonTable { scint, cerenkov })
}

/// Reads the calibration attributes stored with the table, if present.
///
/// # Errors
/// Returns an error if HDF5 I/O fails.
pub fn read_calibration_hdf5<P: AsRef<Path>>(path: P) -> Result<Option<YieldConfig>> {
    let file = File::open(path)?;
    let tree = file.group("entry")?.group(TABLE_NAME)?;
    let Some(refractive_index) = read_attr_opt::<f64>(&tree, "refractive_index")? else {
        return Ok(None);
    };
    let defaults = YieldConfig::default();
    Ok(Some(YieldConfig {
        scintillation_yield_per_mev: read_attr_opt(&tree, "scintillation_yield_per_mev")?
            .unwrap_or(defaults.scintillation_yield_per_mev),
        collection_efficiency: read_attr_opt(&tree, "collection_efficiency")?
            .unwrap_or(defaults.collection_efficiency),
        refractive_index,
        cerenkov_photons_per_cm: read_attr_opt(&tree, "cerenkov_photons_per_cm")?
            .unwrap_or(defaults.cerenkov_photons_per_cm),
    }))
}

fn set_calibration_attrs(group: &Group, config: &YieldConfig) -> Result<()> {
    for (name, value) in [
        (
            "scintillation_yield_per_mev",
            config.scintillation_yield_per_mev,
        ),
        ("collection_efficiency", config.collection_efficiency),
        ("refractive_index", config.refractive_index),
        ("cerenkov_photons_per_cm", config.cerenkov_photons_per_cm),
    ] {
        group.new_attr::<f64>().create(name)?.write_scalar(&value)?;
    }
    Ok(())
}

/// Creates an empty, growable `u64` count column tagged with photon units.
fn photon_column(tree: &Group, name: &str, options: &PhotonWriteOptions) -> Result<Dataset> {
    let mut builder = tree
        .new_dataset::<u64>()
        .shape((0..,))
        .chunk((options.chunk_events.max(1),));
    if let Some(level) = options.compression {
        builder = builder.deflate(level);
    }
    if options.shuffle {
        builder = builder.shuffle();
    }
    let column = builder.create(name)?;
    write_str_attr(&column, "units", "photons")?;
    Ok(column)
}

fn extend_column(column: &Dataset, rows: Range<usize>, values: &[u64]) -> Result<()> {
    column.resize((rows.end,))?;
    column.write_slice(ArrayView1::from(values), s![rows])?;
    Ok(())
}

/// Writes a scalar UTF-8 attribute on a file, group or dataset.
fn write_str_attr(location: &Location, name: &str, value: &str) -> Result<()> {
    let value = VarLenUnicode::from_str(value)
        .map_err(|e| Error::InvalidFormat(format!("attribute {name} is not valid UTF-8: {e}")))?;
    location
        .new_attr::<VarLenUnicode>()
        .create(name)?
        .write_scalar(&value)?;
    Ok(())
}

fn read_attr_opt<T: H5Type + Clone>(group: &Group, name: &str) -> Result<Option<T>> {
    match group.attr(name) {
        Ok(attr) => Ok(Some(attr.read_scalar::<T>()?)),
        Err(_) => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use photonyield_core::EventRecord;
    use tempfile::NamedTempFile;

    fn options() -> PhotonWriteOptions {
        PhotonWriteOptions {
            chunk_events: 4,
            compression: None,
            shuffle: false,
            config: None,
        }
    }

    #[test]
    fn test_hdf5_photon_roundtrip() {
        let table: PhotonTable = [(9012, 37), (0, 0), (8870, 154)]
            .into_iter()
            .map(|(s, c)| EventRecord::new(s, c))
            .collect();

        let file = NamedTempFile::new().unwrap();
        write_photons_hdf5(file.path(), &table, options()).unwrap();
        assert_eq!(read_photons_hdf5(file.path()).unwrap(), table);
        assert!(read_calibration_hdf5(file.path()).unwrap().is_none());
    }

    #[test]
    fn test_hdf5_sink_multi_append() {
        let file = NamedTempFile::new().unwrap();
        let mut sink = Hdf5PhotonSink::create(file.path(), options()).unwrap();

        // Spans more than one chunk.
        for i in 0..3u64 {
            let part: PhotonTable = (0..3)
                .map(|j| EventRecord::new(i * 10 + j, j))
                .collect();
            sink.write_table(&part).unwrap();
        }
        sink.write_table(&PhotonTable::new()).unwrap();
        sink.finish().unwrap();
        assert_eq!(sink.rows_written(), 9);
        drop(sink);

        let table = read_photons_hdf5(file.path()).unwrap();
        assert_eq!(table.len(), 9);
        assert_eq!(table.scint[..4], [0, 1, 2, 10]);
    }

    #[test]
    fn test_hdf5_calibration_attrs() {
        let file = NamedTempFile::new().unwrap();
        let config = YieldConfig::default().with_refractive_index(1.49);
        let opts = PhotonWriteOptions {
            config: Some(config),
            ..options()
        };
        write_photons_hdf5(file.path(), &PhotonTable::new(), opts).unwrap();

        let stored = read_calibration_hdf5(file.path()).unwrap().unwrap();
        assert_eq!(stored, config);
    }
}
