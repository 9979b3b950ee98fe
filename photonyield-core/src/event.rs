//! Per-event photon accumulation.

use crate::error::LifecycleError;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Finalized photon totals of one event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct EventRecord {
    /// Detected scintillation photons.
    pub scint_total: u64,
    /// Detected Cerenkov photons.
    pub cerenkov_total: u64,
}

impl EventRecord {
    /// Creates an event record.
    #[inline]
    #[must_use]
    pub fn new(scint_total: u64, cerenkov_total: u64) -> Self {
        Self {
            scint_total,
            cerenkov_total,
        }
    }
}

/// Running photon totals of the event in progress on one worker.
///
/// The accumulator follows a strict `begin_event -> add_* -> finalize` cycle.
/// Adding or finalizing outside that cycle is rejected so totals can never
/// leak from one event into the next.
#[derive(Debug, Clone, Default)]
pub struct EventAccumulator {
    scint_total: u64,
    cerenkov_total: u64,
    active: bool,
}

impl EventAccumulator {
    /// Creates an idle accumulator.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Resets both counters and opens a new event.
    pub fn begin_event(&mut self) {
        self.scint_total = 0;
        self.cerenkov_total = 0;
        self.active = true;
    }

    /// Adds scintillation photons to the current event.
    ///
    /// # Errors
    /// Returns [`LifecycleError::EventNotStarted`] outside an event.
    #[inline]
    pub fn add_scint(&mut self, n: u64) -> Result<(), LifecycleError> {
        self.ensure_active()?;
        self.scint_total = self.scint_total.saturating_add(n);
        Ok(())
    }

    /// Adds Cerenkov photons to the current event.
    ///
    /// # Errors
    /// Returns [`LifecycleError::EventNotStarted`] outside an event.
    #[inline]
    pub fn add_cerenkov(&mut self, n: u64) -> Result<(), LifecycleError> {
        self.ensure_active()?;
        self.cerenkov_total = self.cerenkov_total.saturating_add(n);
        Ok(())
    }

    /// Closes the current event and returns its totals.
    ///
    /// # Errors
    /// Returns [`LifecycleError::EventNotStarted`] if no event is open,
    /// including a second `finalize` for the same event.
    pub fn finalize(&mut self) -> Result<EventRecord, LifecycleError> {
        self.ensure_active()?;
        self.active = false;
        Ok(EventRecord::new(self.scint_total, self.cerenkov_total))
    }

    /// Returns true between `begin_event` and `finalize`.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Scintillation photons accumulated so far.
    #[must_use]
    pub fn scint_total(&self) -> u64 {
        self.scint_total
    }

    /// Cerenkov photons accumulated so far.
    #[must_use]
    pub fn cerenkov_total(&self) -> u64 {
        self.cerenkov_total
    }

    #[inline]
    fn ensure_active(&self) -> Result<(), LifecycleError> {
        if self.active {
            Ok(())
        } else {
            Err(LifecycleError::EventNotStarted)
        }
    }
}
