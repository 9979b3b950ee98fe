//! Error types for photonyield-core.

use thiserror::Error;

/// Result type alias for photonyield operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error types for photonyield operations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// Invalid calibration constant.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Event lifecycle contract violation.
    #[error("lifecycle error: {0}")]
    Lifecycle(#[from] LifecycleError),
}

/// Calibration constants that cannot describe a physical detector.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// Refractive index must exceed 1 for a Cerenkov threshold to exist.
    #[error("refractive index must be finite and > 1, got {0}")]
    RefractiveIndex(f64),

    /// Collection efficiency is a fraction.
    #[error("collection efficiency must lie in [0, 1], got {0}")]
    CollectionEfficiency(f64),

    /// Scintillation yield density in photons per MeV.
    #[error("scintillation yield must be finite and >= 0, got {0}")]
    ScintillationYield(f64),

    /// Cerenkov emission constant in photons per cm.
    #[error("cerenkov emission constant must be finite and >= 0, got {0}")]
    CerenkovConstant(f64),
}

/// Misuse of the reset, accumulate, finalize sequence.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleError {
    /// Accumulation or finalize without a preceding `begin_event`.
    #[error("no event in progress; call begin_event first")]
    EventNotStarted,
}
