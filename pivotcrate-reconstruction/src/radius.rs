//! Ball radius estimation
//!
//! A best-effort statistical heuristic: sample a few points, then grow a trial
//! radius geometrically until enough of the samples see enough neighbors
//! within it. An explicit radius in [`crate::BPAConfig`] always wins over
//! this estimate.

use pivotcrate_core::{Error, NeighborIndex, NormalPoint3f, Result};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rayon::prelude::*;
use tracing::{debug, info};

/// Parameters of the radius search
#[derive(Debug, Clone, PartialEq)]
pub struct RadiusEstimation {
    /// Number of points sampled (capped at the cloud size)
    pub sample_count: usize,
    /// Neighbors a sample needs within the radius, itself excluded
    pub min_neighbors: usize,
    /// Fraction of samples that must reach `min_neighbors`
    pub success_ratio: f32,
    /// Factor applied to the trial radius after a failed trial
    pub growth: f32,
    /// Number of trials before giving up
    pub max_steps: usize,
    /// Seed of the sampling generator
    pub seed: u64,
}

impl Default for RadiusEstimation {
    fn default() -> Self {
        Self {
            sample_count: 100,
            min_neighbors: 6,
            success_ratio: 0.9,
            growth: 1.2,
            max_steps: 64,
            seed: 0,
        }
    }
}

impl RadiusEstimation {
    /// Check the parameters without looking at any data
    pub fn validate(&self) -> Result<()> {
        if self.sample_count == 0 {
            return Err(Error::InvalidConfig(
                "radius estimation needs at least one sample point".to_string(),
            ));
        }
        if self.min_neighbors == 0 {
            return Err(Error::InvalidConfig(
                "radius estimation needs at least one neighbor per sample".to_string(),
            ));
        }
        if !(self.success_ratio > 0.0 && self.success_ratio <= 1.0) {
            return Err(Error::InvalidConfig(format!(
                "success ratio must be in (0, 1], got {}",
                self.success_ratio
            )));
        }
        if !(self.growth.is_finite() && self.growth > 1.0) {
            return Err(Error::InvalidConfig(format!(
                "radius growth must be greater than 1, got {}",
                self.growth
            )));
        }
        if self.max_steps == 0 {
            return Err(Error::InvalidConfig(
                "radius estimation needs at least one trial".to_string(),
            ));
        }
        Ok(())
    }
}

/// Estimate a ball radius for `points`
///
/// One sample set is drawn up front and reused for every trial, so the result
/// is the smallest radius on the ladder `r0 * growth^k` that satisfies the
/// density criterion for that sample. `r0` is the median distance of a sample
/// to its nearest neighbor.
pub fn estimate_radius<I>(
    points: &[NormalPoint3f],
    index: &I,
    params: &RadiusEstimation,
) -> Result<f32>
where
    I: NeighborIndex + Sync,
{
    params.validate()?;

    let n = points.len();
    if n == 0 {
        return Err(Error::InvalidData("Point cloud is empty".to_string()));
    }
    if n <= params.min_neighbors {
        return Err(Error::InvalidData(format!(
            "cannot find {} neighbors in a cloud of {} points",
            params.min_neighbors, n
        )));
    }

    let mut rng = StdRng::seed_from_u64(params.seed);
    let amount = params.sample_count.min(n);
    let mut samples = rand::seq::index::sample(&mut rng, n, amount).into_vec();
    samples.sort_unstable();

    let mut trial = initial_trial_radius(points, index, &samples)?;

    for step in 0..params.max_steps {
        let hits = samples
            .par_iter()
            .filter(|&&i| {
                index
                    .query_radius_excluding(&points[i].position, trial, i)
                    .len()
                    >= params.min_neighbors
            })
            .count();
        let ratio = hits as f32 / amount as f32;
        debug!(step, trial, hits, samples = amount, "radius trial");

        if ratio >= params.success_ratio {
            info!(radius = trial, steps = step + 1, "estimated ball radius");
            return Ok(trial);
        }
        trial *= params.growth;
    }

    Err(Error::Algorithm(format!(
        "radius estimation did not converge after {} trials",
        params.max_steps
    )))
}

/// Median nearest neighbor distance over the samples
fn initial_trial_radius<I: NeighborIndex>(
    points: &[NormalPoint3f],
    index: &I,
    samples: &[usize],
) -> Result<f32> {
    let mut distances: Vec<f32> = samples
        .iter()
        .filter_map(|&i| {
            index
                .k_nearest(&points[i].position, 2)
                .into_iter()
                .find(|&(j, _)| j != i)
                .map(|(_, distance)| distance)
        })
        .filter(|&d| d > 0.0)
        .collect();

    if distances.is_empty() {
        return Err(Error::InvalidData(
            "sampled points have no distinct neighbors".to_string(),
        ));
    }
    distances.sort_by(|a, b| a.total_cmp(b));
    Ok(distances[distances.len() / 2])
}
