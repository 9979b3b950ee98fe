//! Worker-local step processing.
//!
//! A `StepPipeline` is what one simulation worker drives through the event
//! lifecycle: `begin_event`, then `per_step` for every transport step, then
//! `end_event` to obtain the finalized totals. Each pipeline owns its random
//! stream and accumulator, so pipelines on different threads share nothing.

use crate::config::YieldConfig;
use crate::error::{LifecycleError, Result};
use crate::estimator::PhotonYieldEstimator;
use crate::event::{EventAccumulator, EventRecord};
use crate::step::{StepRecord, VolumeClassifier, VolumeKind};
use rand::Rng;

/// Event-scoped photon counting for a single worker.
#[derive(Debug)]
pub struct StepPipeline<C, R> {
    estimator: PhotonYieldEstimator,
    classifier: C,
    rng: R,
    accumulator: EventAccumulator,
}

impl<C: VolumeClassifier, R: Rng> StepPipeline<C, R> {
    /// Creates a pipeline with validated constants, a classifier and a random stream.
    ///
    /// # Errors
    /// Returns a configuration error if any constant is unphysical.
    pub fn new(config: YieldConfig, classifier: C, rng: R) -> Result<Self> {
        Ok(Self::with_estimator(
            PhotonYieldEstimator::new(config)?,
            classifier,
            rng,
        ))
    }

    /// Creates a pipeline around an existing estimator.
    pub fn with_estimator(estimator: PhotonYieldEstimator, classifier: C, rng: R) -> Self {
        Self {
            estimator,
            classifier,
            rng,
            accumulator: EventAccumulator::new(),
        }
    }

    /// Starts a new event with zeroed totals.
    pub fn begin_event(&mut self) {
        self.accumulator.begin_event();
    }

    /// Converts one step into photons and adds them to the current event.
    ///
    /// Returns the channel the step was classified into.
    ///
    /// # Errors
    /// Returns a lifecycle error if no event is in progress.
    pub fn per_step(&mut self, step: &StepRecord<'_, C::Location>) -> Result<VolumeKind> {
        if !self.accumulator.is_active() {
            return Err(LifecycleError::EventNotStarted.into());
        }

        let kind = self.classifier.classify(step.location);
        match kind {
            VolumeKind::None => {}
            VolumeKind::Scintillation => {
                let n = self
                    .estimator
                    .scintillation_yield(step.edep_mev, &mut self.rng);
                self.accumulator.add_scint(n)?;
            }
            VolumeKind::Cerenkov => {
                let n = self.estimator.cerenkov_yield(
                    step.charge,
                    step.momentum_mev,
                    step.total_energy_mev,
                    step.step_length_mm,
                    &mut self.rng,
                );
                self.accumulator.add_cerenkov(n)?;
            }
        }
        Ok(kind)
    }

    /// Finalizes the current event.
    ///
    /// # Errors
    /// Returns a lifecycle error if no event is in progress.
    pub fn end_event(&mut self) -> Result<EventRecord> {
        Ok(self.accumulator.finalize()?)
    }

    /// Returns the yield estimator.
    #[must_use]
    pub fn estimator(&self) -> &PhotonYieldEstimator {
        &self.estimator
    }

    /// Returns the accumulator of the current event.
    #[must_use]
    pub fn accumulator(&self) -> &EventAccumulator {
        &self.accumulator
    }
}
