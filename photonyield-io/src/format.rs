//! Output format selection.

use std::fmt;
use std::path::Path;

/// Default output file stem.
pub const DEFAULT_OUTPUT_STEM: &str = "PhotonData";

/// On-disk layout of a photon dataset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Comma-separated text with a header row.
    Csv,
    /// Little-endian `u64` pairs, 16 bytes per event.
    Binary,
    /// HDF5 file with one dataset per column.
    Hdf5,
}

impl OutputFormat {
    /// Picks the format from the file extension; unknown extensions map to binary.
    #[must_use]
    pub fn from_path<P: AsRef<Path>>(path: P) -> Self {
        let ext = path
            .as_ref()
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_lowercase);
        match ext.as_deref() {
            Some("csv") => Self::Csv,
            Some("h5" | "hdf5" | "nxs") => Self::Hdf5,
            _ => Self::Binary,
        }
    }

    /// Canonical file extension.
    #[must_use]
    pub fn extension(self) -> &'static str {
        match self {
            Self::Csv => "csv",
            Self::Binary => "bin",
            Self::Hdf5 => "h5",
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Csv => "csv",
            Self::Binary => "binary",
            Self::Hdf5 => "hdf5",
        };
        f.write_str(name)
    }
}
