//! Columnar storage for per-event photon counts.
//!
//! `PhotonTable` keeps the two output columns in parallel vectors, one row
//! per completed event, matching the on-disk schema.
#![allow(clippy::cast_precision_loss)]

use crate::event::EventRecord;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Name of the persisted photon dataset.
pub const TABLE_NAME: &str = "PhotonTree";
/// Column holding scintillation photon counts.
pub const SCINT_COLUMN: &str = "ScintPhoton";
/// Column holding Cerenkov photon counts.
pub const CERENKOV_COLUMN: &str = "CerenkovPhoton";

/// Two-column table of photon counts.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PhotonTable {
    /// Scintillation photons per event.
    pub scint: Vec<u64>,
    /// Cerenkov photons per event.
    pub cerenkov: Vec<u64>,
}

impl PhotonTable {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty table with pre-allocated rows.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            scint: Vec::with_capacity(capacity),
            cerenkov: Vec::with_capacity(capacity),
        }
    }

    /// Returns the number of rows.
    #[must_use]
    pub fn len(&self) -> usize {
        self.scint.len()
    }

    /// Returns true if the table has no rows.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.scint.is_empty()
    }

    /// Appends one event row.
    pub fn push(&mut self, record: EventRecord) {
        self.scint.push(record.scint_total);
        self.cerenkov.push(record.cerenkov_total);
    }

    /// Appends all rows of another table.
    pub fn append(&mut self, other: &PhotonTable) {
        self.scint.extend_from_slice(&other.scint);
        self.cerenkov.extend_from_slice(&other.cerenkov);
    }

    /// Removes all rows, keeping the allocation.
    pub fn clear(&mut self) {
        self.scint.clear();
        self.cerenkov.clear();
    }

    /// Returns row `index` as an event record.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<EventRecord> {
        Some(EventRecord::new(
            *self.scint.get(index)?,
            *self.cerenkov.get(index)?,
        ))
    }

    /// Iterates over rows.
    pub fn rows(&self) -> impl Iterator<Item = EventRecord> + '_ {
        self.scint
            .iter()
            .zip(&self.cerenkov)
            .map(|(&scint, &cerenkov)| EventRecord::new(scint, cerenkov))
    }

    /// Computes per-channel summary statistics.
    #[must_use]
    pub fn statistics(&self) -> PhotonStatistics {
        let mut stats = PhotonStatistics {
            events: self.len(),
            ..PhotonStatistics::default()
        };
        if self.is_empty() {
            return stats;
        }

        stats.scint_total = self.scint.iter().fold(0u64, |a, &b| a.saturating_add(b));
        stats.cerenkov_total = self
            .cerenkov
            .iter()
            .fold(0u64, |a, &b| a.saturating_add(b));
        stats.scint_max = self.scint.iter().copied().max().unwrap_or(0);
        stats.cerenkov_max = self.cerenkov.iter().copied().max().unwrap_or(0);

        let n = self.len() as f64;
        stats.scint_mean = self.scint.iter().map(|&v| v as f64).sum::<f64>() / n;
        stats.cerenkov_mean = self.cerenkov.iter().map(|&v| v as f64).sum::<f64>() / n;
        stats.scint_std = std_dev(&self.scint, stats.scint_mean);
        stats.cerenkov_std = std_dev(&self.cerenkov, stats.cerenkov_mean);
        stats
    }
}

impl FromIterator<EventRecord> for PhotonTable {
    fn from_iter<I: IntoIterator<Item = EventRecord>>(iter: I) -> Self {
        let mut table = Self::new();
        for record in iter {
            table.push(record);
        }
        table
    }
}

impl Extend<EventRecord> for PhotonTable {
    fn extend<I: IntoIterator<Item = EventRecord>>(&mut self, iter: I) {
        for record in iter {
            self.push(record);
        }
    }
}

/// Summary of a photon table.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PhotonStatistics {
    /// Number of events (rows).
    pub events: usize,
    /// Sum of scintillation photons.
    pub scint_total: u64,
    /// Sum of Cerenkov photons.
    pub cerenkov_total: u64,
    /// Mean scintillation photons per event.
    pub scint_mean: f64,
    /// Mean Cerenkov photons per event.
    pub cerenkov_mean: f64,
    /// Population standard deviation of scintillation photons.
    pub scint_std: f64,
    /// Population standard deviation of Cerenkov photons.
    pub cerenkov_std: f64,
    /// Largest scintillation count.
    pub scint_max: u64,
    /// Largest Cerenkov count.
    pub cerenkov_max: u64,
}

fn std_dev(values: &[u64], mean: f64) -> f64 {
    let var = values
        .iter()
        .map(|&v| {
            let d = v as f64 - mean;
            d * d
        })
        .sum::<f64>()
        / values.len() as f64;
    var.sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_table_operations() {
        let mut table = PhotonTable::with_capacity(4);
        assert!(table.is_empty());

        table.push(EventRecord::new(10, 1));
        table.push(EventRecord::new(20, 2));
        assert_eq!(table.len(), 2);
        assert_eq!(table.get(1), Some(EventRecord::new(20, 2)));
        assert_eq!(table.get(2), None);

        let other: PhotonTable = vec![EventRecord::new(30, 3)].into_iter().collect();
        table.append(&other);
        assert_eq!(table.scint, vec![10, 20, 30]);
        assert_eq!(table.cerenkov, vec![1, 2, 3]);

        table.clear();
        assert!(table.is_empty());
    }

    #[test]
    fn test_statistics() {
        let table: PhotonTable = [(2, 0), (4, 10), (6, 20)]
            .into_iter()
            .map(|(s, c)| EventRecord::new(s, c))
            .collect();
        let stats = table.statistics();

        assert_eq!(stats.events, 3);
        assert_eq!(stats.scint_total, 12);
        assert_eq!(stats.cerenkov_total, 30);
        assert_eq!(stats.scint_max, 6);
        assert_eq!(stats.cerenkov_max, 20);
        assert_relative_eq!(stats.scint_mean, 4.0);
        assert_relative_eq!(stats.cerenkov_mean, 10.0);
        assert_relative_eq!(stats.scint_std, (8.0f64 / 3.0).sqrt(), epsilon = 1e-12);
    }

    #[test]
    fn test_empty_statistics() {
        let stats = PhotonTable::new().statistics();
        assert_eq!(stats.events, 0);
        assert_relative_eq!(stats.scint_mean, 0.0);
    }
}
