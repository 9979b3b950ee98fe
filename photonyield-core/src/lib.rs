//! photonyield-core: Optical photon yield estimation for fiber calorimeters.
//!
//! This crate converts per-step transport quantities into sampled
//! scintillation and Cerenkov photon counts and accumulates them per event.
//!

pub mod config;
pub mod error;
pub mod estimator;
pub mod event;
pub mod pipeline;
pub mod poisson;
pub mod step;
pub mod table;

pub use config::{YieldConfig, MM_PER_CM};
pub use error::{ConfigError, Error, LifecycleError, Result};
pub use estimator::PhotonYieldEstimator;
pub use event::{EventAccumulator, EventRecord};
pub use pipeline::StepPipeline;
pub use poisson::{sample_poisson, worker_rng};
pub use step::{StepRecord, VolumeClassifier, VolumeKind, VolumeTable};
pub use table::{PhotonStatistics, PhotonTable};
