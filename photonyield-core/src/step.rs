//! Step records and volume classification.

use std::collections::HashMap;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Logical volume name of the scintillating fibers.
pub const SCINT_FIBER_VOLUME: &str = "LogicScintFiber";
/// Logical volume name of the quartz Cerenkov fibers.
pub const CERENKOV_FIBER_VOLUME: &str = "LogicCerenkovFiber";

/// Emission channel of the volume a step starts in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum VolumeKind {
    /// Passive material; no photons are counted.
    #[default]
    None,
    /// Scintillating medium.
    Scintillation,
    /// Cerenkov radiator.
    Cerenkov,
}

/// Maps a step location to its emission channel.
///
/// Implemented by the geometry side; the yield pipeline only asks for the
/// classification and never inspects the location itself.
pub trait VolumeClassifier: Send + Sync {
    /// Location type supplied with each step.
    type Location: ?Sized;

    /// Classifies the pre-step location.
    fn classify(&self, location: &Self::Location) -> VolumeKind;
}

impl<T: VolumeClassifier + ?Sized> VolumeClassifier for &T {
    type Location = T::Location;

    #[inline]
    fn classify(&self, location: &Self::Location) -> VolumeKind {
        (**self).classify(location)
    }
}

/// Name-based classifier for engines that report logical volume names.
#[derive(Debug, Clone, Default)]
pub struct VolumeTable {
    kinds: HashMap<String, VolumeKind>,
}

impl VolumeTable {
    /// Creates an empty table; every volume classifies as [`VolumeKind::None`].
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Table for the copper-rod fiber module: scintillating and quartz fibers.
    #[must_use]
    pub fn fiber_default() -> Self {
        Self::new()
            .with_volume(SCINT_FIBER_VOLUME, VolumeKind::Scintillation)
            .with_volume(CERENKOV_FIBER_VOLUME, VolumeKind::Cerenkov)
    }

    /// Registers a volume name.
    #[must_use]
    pub fn with_volume(mut self, name: impl Into<String>, kind: VolumeKind) -> Self {
        self.insert(name, kind);
        self
    }

    /// Registers or replaces a volume name.
    pub fn insert(&mut self, name: impl Into<String>, kind: VolumeKind) {
        self.kinds.insert(name.into(), kind);
    }

    /// Number of registered volumes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.kinds.len()
    }

    /// Returns true if no volume is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.kinds.is_empty()
    }
}

impl VolumeClassifier for VolumeTable {
    type Location = str;

    fn classify(&self, location: &str) -> VolumeKind {
        self.kinds.get(location).copied().unwrap_or_default()
    }
}

/// Per-step quantities handed over by the transport engine.
///
/// Energies and momentum are in MeV, lengths in mm.
#[derive(Debug, PartialEq)]
pub struct StepRecord<'a, L: ?Sized> {
    /// Pre-step location, interpreted by a [`VolumeClassifier`].
    pub location: &'a L,
    /// Total energy deposited along the step.
    pub edep_mev: f64,
    /// Particle charge in units of the elementary charge.
    pub charge: f64,
    /// Momentum magnitude.
    pub momentum_mev: f64,
    /// Total relativistic energy.
    pub total_energy_mev: f64,
    /// Step length.
    pub step_length_mm: f64,
}

impl<'a, L: ?Sized> StepRecord<'a, L> {
    /// Creates a step with no deposit and no motion at `location`.
    #[inline]
    pub fn at(location: &'a L) -> Self {
        Self {
            location,
            edep_mev: 0.0,
            charge: 0.0,
            momentum_mev: 0.0,
            total_energy_mev: 0.0,
            step_length_mm: 0.0,
        }
    }

    /// Sets the energy deposit.
    #[inline]
    #[must_use]
    pub fn with_edep(mut self, edep_mev: f64) -> Self {
        self.edep_mev = edep_mev;
        self
    }

    /// Sets the particle kinematics.
    #[inline]
    #[must_use]
    pub fn with_particle(mut self, charge: f64, momentum_mev: f64, total_energy_mev: f64) -> Self {
        self.charge = charge;
        self.momentum_mev = momentum_mev;
        self.total_energy_mev = total_energy_mev;
        self
    }

    /// Sets the step length.
    #[inline]
    #[must_use]
    pub fn with_step_length(mut self, step_length_mm: f64) -> Self {
        self.step_length_mm = step_length_mm;
        self
    }
}
