//! Poisson photon-count sampling and per-worker random streams.
#![allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Normal, Poisson};

/// Above this mean the count is drawn from the Gaussian limit `N(mean, mean)`.
///
/// The relative width is below 1e-6 here, far beyond any photon statistics
/// the readout can resolve, and it keeps the cast into `u64` bounded.
pub const GAUSSIAN_LIMIT_MEAN: f64 = 1.0e12;

/// Golden-ratio increment used to spread worker indices across seed space.
const WORKER_SEED_STRIDE: u64 = 0x9E37_79B9_7F4A_7C15;

/// Draws a Poisson-distributed count with the given mean.
///
/// A mean of zero, a negative mean or NaN returns 0 without touching `rng`.
/// An infinite mean saturates to `u64::MAX`.
#[inline]
pub fn sample_poisson<R: Rng + ?Sized>(mean: f64, rng: &mut R) -> u64 {
    if mean.is_nan() || mean <= 0.0 {
        return 0;
    }
    if mean.is_infinite() {
        return u64::MAX;
    }
    if mean > GAUSSIAN_LIMIT_MEAN {
        let draw = match Normal::new(mean, mean.sqrt()) {
            Ok(normal) => normal.sample(rng),
            Err(_) => mean,
        };
        return draw.max(0.0).round() as u64;
    }
    match Poisson::new(mean) {
        Ok(poisson) => poisson.sample(rng) as u64,
        Err(_) => mean.round() as u64,
    }
}

/// Independent random stream for worker `worker` of a run seeded with `seed`.
///
/// Streams are reproducible for a fixed `(seed, worker)` pair and distinct
/// workers never share sampler state.
#[must_use]
pub fn worker_rng(seed: u64, worker: u64) -> StdRng {
    StdRng::seed_from_u64(seed ^ worker.wrapping_add(1).wrapping_mul(WORKER_SEED_STRIDE))
}
