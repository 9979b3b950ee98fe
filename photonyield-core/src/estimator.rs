//! Scintillation and Cerenkov photon yield models.
//!
//! Both channels compute a mean photon count from the step quantities and
//! draw the detected count from a Poisson distribution around it:
//!
//! - **Scintillation**: `mean = edep * yield * efficiency`.
//! - **Cerenkov**: `mean = C * (1 - 1 / (beta^2 n^2)) * L[cm] * efficiency`
//!   for charged particles above the `beta > 1/n` threshold.
//!
//! Paths that yield a zero mean return 0 without drawing from the random source.

use crate::config::{YieldConfig, MM_PER_CM};
use crate::error::ConfigError;
use crate::poisson::sample_poisson;
use rand::Rng;

/// Converts step quantities into sampled photon counts.
///
/// The estimator holds only validated calibration constants; the random
/// source is supplied per call so each worker can own its stream.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PhotonYieldEstimator {
    config: YieldConfig,
    beta_threshold: f64,
}

impl PhotonYieldEstimator {
    /// Creates an estimator from validated constants.
    ///
    /// # Errors
    /// Returns an error if any constant is unphysical.
    pub fn new(config: YieldConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            beta_threshold: config.beta_threshold(),
            config,
        })
    }

    /// Returns the calibration constants.
    #[must_use]
    pub fn config(&self) -> &YieldConfig {
        &self.config
    }

    /// Velocity threshold `1/n` of the Cerenkov medium.
    #[must_use]
    pub fn beta_threshold(&self) -> f64 {
        self.beta_threshold
    }

    /// Mean detected scintillation photons for an energy deposit in MeV.
    ///
    /// Non-positive or NaN deposits give 0.
    #[must_use]
    pub fn scintillation_mean(&self, edep_mev: f64) -> f64 {
        if edep_mev.is_nan() || edep_mev <= 0.0 {
            return 0.0;
        }
        edep_mev * self.config.scintillation_yield_per_mev * self.config.collection_efficiency
    }

    /// Sampled scintillation photon count for an energy deposit in MeV.
    pub fn scintillation_yield<R: Rng + ?Sized>(&self, edep_mev: f64, rng: &mut R) -> u64 {
        sample_poisson(self.scintillation_mean(edep_mev), rng)
    }

    /// Particle velocity `p / E`, or `None` when it is undefined.
    #[must_use]
    pub fn cerenkov_beta(momentum_mev: f64, total_energy_mev: f64) -> Option<f64> {
        if total_energy_mev.is_nan() || total_energy_mev <= 0.0 || momentum_mev.is_nan() {
            return None;
        }
        Some(momentum_mev.abs() / total_energy_mev)
    }

    /// Cerenkov photons emitted per cm at velocity `beta`.
    ///
    /// Zero at or below the threshold, strictly increasing above it.
    #[must_use]
    pub fn cerenkov_density(&self, beta: f64) -> f64 {
        if beta.is_nan() || beta <= self.beta_threshold {
            return 0.0;
        }
        let n = self.config.refractive_index;
        self.config.cerenkov_photons_per_cm * (1.0 - 1.0 / (beta * beta * n * n))
    }

    /// Mean detected Cerenkov photons for a step.
    ///
    /// Neutral particles, undefined velocities and sub-threshold particles give 0.
    #[must_use]
    pub fn cerenkov_mean(
        &self,
        charge: f64,
        momentum_mev: f64,
        total_energy_mev: f64,
        step_length_mm: f64,
    ) -> f64 {
        if charge == 0.0 || charge.is_nan() {
            return 0.0;
        }
        let Some(beta) = Self::cerenkov_beta(momentum_mev, total_energy_mev) else {
            return 0.0;
        };
        let density = self.cerenkov_density(beta);
        if density <= 0.0 || step_length_mm.is_nan() || step_length_mm <= 0.0 {
            return 0.0;
        }
        density * (step_length_mm / MM_PER_CM) * self.config.collection_efficiency
    }

    /// Sampled Cerenkov photon count for a step.
    pub fn cerenkov_yield<R: Rng + ?Sized>(
        &self,
        charge: f64,
        momentum_mev: f64,
        total_energy_mev: f64,
        step_length_mm: f64,
        rng: &mut R,
    ) -> u64 {
        let mean = self.cerenkov_mean(charge, momentum_mev, total_energy_mev, step_length_mm);
        sample_poisson(mean, rng)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rand::rngs::StdRng;
    use rand::{RngCore, SeedableRng};

    struct Untouchable;

    impl RngCore for Untouchable {
        fn next_u32(&mut self) -> u32 {
            panic!("estimator drew from rng")
        }

        fn next_u64(&mut self) -> u64 {
            panic!("estimator drew from rng")
        }

        fn fill_bytes(&mut self, _dst: &mut [u8]) {
            panic!("estimator drew from rng")
        }
    }

    fn estimator() -> PhotonYieldEstimator {
        PhotonYieldEstimator::new(YieldConfig::default()).unwrap()
    }

    /// Momentum and energy for a unit-mass particle moving at `beta`.
    fn kinematics(beta: f64) -> (f64, f64) {
        let gamma = 1.0 / (1.0 - beta * beta).sqrt();
        (gamma * beta, gamma)
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = YieldConfig::new().with_refractive_index(1.0);
        assert!(PhotonYieldEstimator::new(config).is_err());
        let config = YieldConfig::new().with_collection_efficiency(1.5);
        assert!(PhotonYieldEstimator::new(config).is_err());
    }

    #[test]
    fn test_scintillation_mean() {
        assert_relative_eq!(estimator().scintillation_mean(1.0), 9_000.0);
        assert_relative_eq!(estimator().scintillation_mean(0.5), 4_500.0);
    }

    #[test]
    fn test_non_positive_deposit_yields_nothing() {
        let est = estimator();
        let mut rng = Untouchable;
        for edep in [0.0, -0.0, -1.0e-9, -5.0, f64::NAN] {
            assert_eq!(est.scintillation_yield(edep, &mut rng), 0);
        }
    }

    #[test]
    fn test_scintillation_sample_average() {
        let est = estimator();
        let mut rng = StdRng::seed_from_u64(2024);
        let trials = 1_000u32;
        let total: u64 = (0..trials)
            .map(|_| est.scintillation_yield(1.0, &mut rng))
            .sum();
        let average = total as f64 / f64::from(trials);
        assert!(
            (average - 9_000.0).abs() < 3.0 * 9_000f64.sqrt(),
            "average = {average}"
        );
    }

    #[test]
    fn test_neutral_particle_yields_nothing() {
        let est = estimator();
        let mut rng = Untouchable;
        for beta in [0.5, 0.9, 0.999] {
            let (p, e) = kinematics(beta);
            assert_eq!(est.cerenkov_yield(0.0, p, e, 10.0, &mut rng), 0);
        }
    }

    #[test]
    fn test_threshold_is_inclusive() {
        let est = estimator();
        let threshold = est.beta_threshold();
        assert_relative_eq!(est.cerenkov_density(threshold), 0.0);

        let mut rng = Untouchable;
        // p / E == threshold exactly.
        assert_eq!(est.cerenkov_yield(1.0, threshold, 1.0, 10.0, &mut rng), 0);
    }

    #[test]
    fn test_sub_threshold_yields_nothing() {
        let est = estimator();
        let (p, e) = kinematics(0.5);
        let mut rng = Untouchable;
        for step_mm in [0.1, 10.0, 1.0e6] {
            assert_eq!(est.cerenkov_yield(1.0, p, e, step_mm, &mut rng), 0);
        }
    }

    #[test]
    fn test_density_at_beta_point_nine() {
        let est = estimator();
        assert_relative_eq!(est.beta_threshold(), 0.6859, epsilon = 1e-4);
        let expected = 369.0 * (1.0 - 1.0 / (0.81 * 1.458 * 1.458));
        assert_relative_eq!(est.cerenkov_density(0.9), expected, epsilon = 1e-9);
        assert_relative_eq!(est.cerenkov_density(0.9), 154.5, epsilon = 0.5);
    }

    #[test]
    fn test_density_strictly_increasing_above_threshold() {
        let est = estimator();
        let start = est.beta_threshold();
        let mut previous = est.cerenkov_density(start);
        for i in 1..=100 {
            let beta = start + (1.0 - start) * f64::from(i) / 100.0;
            let density = est.cerenkov_density(beta);
            assert!(density > previous, "beta = {beta}");
            previous = density;
        }
    }

    #[test]
    fn test_cerenkov_mean_uses_centimetres() {
        let est = estimator();
        let (p, e) = kinematics(0.9);
        let per_cm = est.cerenkov_density(0.9) * 0.9;
        // 10 mm == 1 cm
        assert_relative_eq!(est.cerenkov_mean(1.0, p, e, 10.0), per_cm, epsilon = 1e-9);
        assert_relative_eq!(
            est.cerenkov_mean(-1.0, p, e, 25.0),
            per_cm * 2.5,
            epsilon = 1e-9
        );
    }

    #[test]
    fn test_undefined_kinematics_yield_nothing() {
        let est = estimator();
        assert_relative_eq!(est.cerenkov_mean(1.0, 1.0, 0.0, 10.0), 0.0);
        assert_relative_eq!(est.cerenkov_mean(1.0, f64::NAN, 1.0, 10.0), 0.0);
        assert_relative_eq!(est.cerenkov_mean(1.0, 0.95, 1.0, 0.0), 0.0);
        assert!(PhotonYieldEstimator::cerenkov_beta(1.0, -1.0).is_none());
    }

    #[test]
    fn test_cerenkov_sample_is_reproducible() {
        let est = estimator();
        let (p, e) = kinematics(0.99);
        let mut a = StdRng::seed_from_u64(5);
        let mut b = StdRng::seed_from_u64(5);
        let first: Vec<u64> = (0..16)
            .map(|_| est.cerenkov_yield(1.0, p, e, 4.0, &mut a))
            .collect();
        let second: Vec<u64> = (0..16)
            .map(|_| est.cerenkov_yield(1.0, p, e, 4.0, &mut b))
            .collect();
        assert_eq!(first, second);
        assert!(first.iter().any(|&n| n > 0));
    }
}
