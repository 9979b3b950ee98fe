//! Calibration constants for photon yield estimation.

use crate::error::ConfigError;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Millimetres per centimetre; step lengths arrive in mm.
pub const MM_PER_CM: f64 = 10.0;

/// Calibration constants shared by both emission channels.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct YieldConfig {
    /// Scintillation photons produced per MeV of deposited energy.
    pub scintillation_yield_per_mev: f64,
    /// Fraction of produced photons that reach the readout.
    pub collection_efficiency: f64,
    /// Refractive index of the Cerenkov radiator.
    pub refractive_index: f64,
    /// Cerenkov photons per cm for a `beta = 1` particle over the visible window.
    pub cerenkov_photons_per_cm: f64,
}

impl Default for YieldConfig {
    fn default() -> Self {
        Self {
            scintillation_yield_per_mev: 10_000.0,
            collection_efficiency: 0.9,
            refractive_index: 1.458, // fused silica
            cerenkov_photons_per_cm: 369.0,
        }
    }
}

impl YieldConfig {
    /// Creates a configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the scintillation yield density (photons/MeV).
    #[must_use]
    pub fn with_scintillation_yield(mut self, photons_per_mev: f64) -> Self {
        self.scintillation_yield_per_mev = photons_per_mev;
        self
    }

    /// Sets the collection efficiency.
    #[must_use]
    pub fn with_collection_efficiency(mut self, efficiency: f64) -> Self {
        self.collection_efficiency = efficiency;
        self
    }

    /// Sets the refractive index of the Cerenkov medium.
    #[must_use]
    pub fn with_refractive_index(mut self, index: f64) -> Self {
        self.refractive_index = index;
        self
    }

    /// Sets the Cerenkov emission constant (photons/cm).
    #[must_use]
    pub fn with_cerenkov_constant(mut self, photons_per_cm: f64) -> Self {
        self.cerenkov_photons_per_cm = photons_per_cm;
        self
    }

    /// Velocity threshold `1/n` below which no Cerenkov light is emitted.
    #[must_use]
    pub fn beta_threshold(&self) -> f64 {
        1.0 / self.refractive_index
    }

    /// Checks that every constant describes a physical detector.
    ///
    /// # Errors
    /// Returns the first offending constant.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.refractive_index.is_finite() && self.refractive_index > 1.0) {
            return Err(ConfigError::RefractiveIndex(self.refractive_index));
        }
        if !(0.0..=1.0).contains(&self.collection_efficiency) {
            return Err(ConfigError::CollectionEfficiency(
                self.collection_efficiency,
            ));
        }
        if !(self.scintillation_yield_per_mev.is_finite() && self.scintillation_yield_per_mev >= 0.0)
        {
            return Err(ConfigError::ScintillationYield(
                self.scintillation_yield_per_mev,
            ));
        }
        if !(self.cerenkov_photons_per_cm.is_finite() && self.cerenkov_photons_per_cm >= 0.0) {
            return Err(ConfigError::CerenkovConstant(self.cerenkov_photons_per_cm));
        }
        Ok(())
    }
}
