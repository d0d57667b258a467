use ndarray::{ArrayView2, ArrayView3, Axis};
use rayon::prelude::*;

use crate::diagnostics::correlation::{DEFAULT_UPSAMPLE_FACTOR, phase_cross_correlation};
use crate::diagnostics::pairs::{find_180_deg_pairs, select_pairs};
use crate::diagnostics::{DiagnosticError, median};
use crate::imaging::transform::fliplr;
use crate::parallel::ParallelConfig;

#[derive(Debug, Clone, PartialEq)]
pub struct RotationCenterOptions {
    /// Whether the angles are given in degrees rather than radians.
    pub in_degrees: bool,
    /// Tolerance, in degrees, for two angles to count as 180° apart.
    pub atol_deg: f64,
    /// Number of pairs to use; `-1` (or any non-positive value) uses all of them.
    pub num_pairs: i64,
    pub parallel: ParallelConfig,
}

impl Default for RotationCenterOptions {
    fn default() -> Self {
        Self {
            in_degrees: true,
            atol_deg: 0.1,
            num_pairs: -1,
            parallel: ParallelConfig::default(),
        }
    }
}

/// Rotation-center candidate from one 180° pair, in pixel-edge coordinates
/// (pixel `i` spans `[i, i + 1)`).
pub fn pair_rotation_center(low: ArrayView2<f64>, high: ArrayView2<f64>) -> Result<f64, DiagnosticError> {
    let flipped = fliplr(high);
    let (_, shift) = phase_cross_correlation(low, flipped.view(), DEFAULT_UPSAMPLE_FACTOR)?;
    Ok(low.ncols() as f64 / 2.0 + shift / 2.0)
}

/// Estimates the rotation axis column as the median of the per-pair estimates.
pub fn find_rotation_center(
    arrays: ArrayView3<f64>,
    angles: &[f64],
    options: &RotationCenterOptions,
) -> Result<f64, DiagnosticError> {
    let n_images = arrays.len_of(Axis(0));
    if n_images != angles.len() {
        return Err(DiagnosticError::LengthMismatch {
            images: n_images,
            angles: angles.len(),
        });
    }

    let (low, high) = find_180_deg_pairs(angles, options.atol_deg, options.in_degrees)?;
    let pairs = select_pairs(&low, &high, options.num_pairs);
    if pairs.is_empty() {
        return Err(DiagnosticError::NoPairsFound { atol: options.atol_deg });
    }
    log::info!("Estimating rotation center from {} pair(s)", pairs.len());

    let centers = options.parallel.install(|| {
        pairs
            .par_iter()
            .map(|&(i, j)| pair_rotation_center(arrays.index_axis(Axis(0), i), arrays.index_axis(Axis(0), j)))
            .collect::<Result<Vec<f64>, DiagnosticError>>()
    })??;
    log::debug!("Per-pair rotation centers: {:?}", centers);

    let center = median(&centers);
    log::info!("Rotation center: {:.2}", center);
    Ok(center)
}
