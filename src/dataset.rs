//! Synthetic "inside vs. outside the unit circle" point set.
use ndarray::{Array2, Axis};
use rand::{rngs::StdRng, SeedableRng};
use rand_distr::{Distribution, StandardNormal};

use crate::error::{NnError, Result};

/// Seed of the generator behind [`generate`].
pub const DATASET_SEED: u64 = 0;

pub const DEFAULT_SAMPLES: usize = 100;

/// Points `x` (shape `(n, 2)`) and their labels `y` (shape `(n, 1)`, values ±1).
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    pub x: Array2<f64>,
    pub y: Array2<f64>,
}

impl Dataset {
    pub fn len(&self) -> usize {
        self.x.nrows()
    }

    pub fn is_empty(&self) -> bool {
        self.x.nrows() == 0
    }

    /// Per-column `(min, max)` of the features.
    pub fn bounds(&self) -> Vec<(f64, f64)> {
        self.x
            .axis_iter(Axis(1))
            .map(|col| {
                col.iter().fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
                    (lo.min(v), hi.max(v))
                })
            })
            .collect()
    }
}

/// `+1` for points strictly outside the unit circle, `-1` otherwise.
pub fn circle_label(x1: f64, x2: f64) -> f64 {
    if x1 * x1 + x2 * x2 > 1.0 {
        1.0
    } else {
        -1.0
    }
}

/// Draws `n_samples` standard-normal points with the fixed [`DATASET_SEED`].
pub fn generate(n_samples: usize) -> Result<Dataset> {
    generate_with_seed(n_samples, DATASET_SEED)
}

pub fn generate_with_seed(n_samples: usize, seed: u64) -> Result<Dataset> {
    if n_samples == 0 {
        return Err(NnError::InvalidArgument(
            "sample count must be positive".to_string(),
        ));
    }

    let mut rng = StdRng::seed_from_u64(seed);
    let values: Vec<f64> = (0..n_samples * 2)
        .map(|_| StandardNormal.sample(&mut rng))
        .collect();
    let x = Array2::from_shape_vec((n_samples, 2), values)
        .map_err(|e| NnError::Computation(e.to_string()))?;

    let y = x
        .map_axis(Axis(1), |row| circle_label(row[0], row[1]))
        .insert_axis(Axis(1));

    Ok(Dataset { x, y })
}
