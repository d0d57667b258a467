//! Tilt of the rotation axis relative to the detector columns.
//!
//! A 180° pair is a mirror image once the axis is vertical. The tilt is found
//! by minimizing a p3-norm dissimilarity between the two images after
//! counter-rotating them by a trial angle.

use std::borrow::Cow;

use ndarray::{Array3, ArrayView2, ArrayView3, Axis, s};
use rayon::prelude::*;

use crate::diagnostics::correlation::{DEFAULT_UPSAMPLE_FACTOR, phase_cross_correlation};
use crate::diagnostics::optimize::{BoundedMinimum, BoundedOptions, minimize_scalar_bounded};
use crate::diagnostics::pairs::find_180_deg_pairs;
use crate::diagnostics::{DiagnosticError, mean};
use crate::imaging::transform::{fliplr, min_max_normalize, rotate};
use crate::parallel::ParallelConfig;

#[derive(Debug, Clone, PartialEq)]
pub struct TiltOptions {
    /// Search interval for the tilt, in degrees.
    pub low_bound: f64,
    pub high_bound: f64,
    /// Mean tilts smaller than this (degrees) are not corrected.
    pub cut_off_angle_deg: f64,
    /// Tolerance, in degrees, for two angles to count as 180° apart.
    pub atol_deg: f64,
    pub parallel: ParallelConfig,
}

impl Default for TiltOptions {
    fn default() -> Self {
        Self {
            low_bound: -5.0,
            high_bound: 5.0,
            cut_off_angle_deg: 1e-3,
            atol_deg: 0.1,
            parallel: ParallelConfig::default(),
        }
    }
}

/// p3-norm dissimilarity between `image0` and the mirror of `image1` after
/// rotating them by `-tilt_deg` and `+tilt_deg` respectively. Lower is more similar.
pub fn calculate_dissimilarity(
    tilt_deg: f64,
    image0: ArrayView2<f64>,
    image1: ArrayView2<f64>,
) -> Result<f64, DiagnosticError> {
    if image0.dim() != image1.dim() {
        return Err(DiagnosticError::ShapeMismatch {
            first: image0.dim(),
            second: image1.dim(),
        });
    }
    let flipped = fliplr(image1);
    let (_, shift) = phase_cross_correlation(image0, flipped.view(), DEFAULT_UPSAMPLE_FACTOR)?;

    // keep only the columns both images share
    let width = image0.ncols();
    let (view0, view1) = if shift.abs() > 1.0 {
        let k = (shift.abs().round() as usize).min(width.saturating_sub(1));
        if shift > 0.0 {
            (image0.slice_move(s![.., k..]), flipped.slice(s![.., ..width - k]))
        } else {
            (image0.slice_move(s![.., ..width - k]), flipped.slice(s![.., k..]))
        }
    } else {
        (image0, flipped.view())
    };

    let a = rotate(min_max_normalize(view0).view(), -tilt_deg, true);
    let b = rotate(min_max_normalize(view1).view(), tilt_deg, true);

    let numerator: f64 = a.iter().zip(b.iter()).map(|(x, y)| (x - y).abs().powi(3)).sum();
    let norm_a = a.iter().map(|v| v * v).sum::<f64>().sqrt();
    let norm_b = b.iter().map(|v| v * v).sum::<f64>().sqrt();
    let denominator = norm_a * norm_b;
    if denominator == 0.0 {
        return Ok(numerator);
    }
    Ok(numerator / denominator)
}

/// Searches `[low_bound, high_bound]` degrees for the tilt minimizing
/// [`calculate_dissimilarity`].
pub fn calculate_tilt(
    image0: ArrayView2<f64>,
    image180: ArrayView2<f64>,
    low_bound: f64,
    high_bound: f64,
) -> Result<BoundedMinimum, DiagnosticError> {
    let result = minimize_scalar_bounded(
        |tilt| calculate_dissimilarity(tilt, image0, image180),
        (low_bound, high_bound),
        BoundedOptions::default(),
    )?;
    if !result.success {
        log::warn!("Tilt search did not converge: {} (x = {:.4})", result.message, result.x);
    }
    Ok(result)
}

/// Mean tilt over every 180° pair of the stack, in degrees.
pub fn estimate_tilt(arrays: ArrayView3<f64>, rot_angles: &[f64], options: &TiltOptions) -> Result<f64, DiagnosticError> {
    let n_images = arrays.len_of(Axis(0));
    if n_images != rot_angles.len() {
        return Err(DiagnosticError::LengthMismatch {
            images: n_images,
            angles: rot_angles.len(),
        });
    }

    let (low, high) = find_180_deg_pairs(rot_angles, options.atol_deg, false)?;
    if low.is_empty() {
        return Err(DiagnosticError::NoPairsFound { atol: options.atol_deg });
    }
    log::info!("Estimating tilt from {} pair(s)", low.len());

    let tilts = options.parallel.install(|| {
        low.par_iter()
            .zip(high.par_iter())
            .map(|(&i, &j)| {
                calculate_tilt(
                    arrays.index_axis(Axis(0), i),
                    arrays.index_axis(Axis(0), j),
                    options.low_bound,
                    options.high_bound,
                )
                .map(|result| result.x)
            })
            .collect::<Result<Vec<f64>, DiagnosticError>>()
    })??;
    log::debug!("Per-pair tilts: {:?}", tilts);
    Ok(mean(&tilts))
}

/// Rotates every image of the stack by `-tilt_deg` (bilinear, same shape).
pub fn apply_tilt_correction(
    arrays: ArrayView3<f64>,
    tilt_deg: f64,
    parallel: ParallelConfig,
) -> Result<Array3<f64>, DiagnosticError> {
    let rotated = parallel.install(|| {
        (0..arrays.len_of(Axis(0)))
            .into_par_iter()
            .map(|i| rotate(arrays.index_axis(Axis(0), i), -tilt_deg, false))
            .collect::<Vec<_>>()
    })?;

    let mut corrected = Array3::zeros(arrays.raw_dim());
    for (mut slot, image) in corrected.axis_iter_mut(Axis(0)).zip(rotated) {
        slot.assign(&image);
    }
    Ok(corrected)
}

/// Estimates the tilt and removes it. Below the cut-off the input is returned
/// untouched.
pub fn tilt_correction<'a>(
    arrays: &'a Array3<f64>,
    rot_angles: &[f64],
    options: &TiltOptions,
) -> Result<Cow<'a, Array3<f64>>, DiagnosticError> {
    let tilt = estimate_tilt(arrays.view(), rot_angles, options)?;
    if tilt.abs() < options.cut_off_angle_deg {
        log::info!("Tilt {:.4} deg is below the cut-off, no correction applied", tilt);
        return Ok(Cow::Borrowed(arrays));
    }
    log::info!("Correcting tilt of {:.4} deg", tilt);
    Ok(Cow::Owned(apply_tilt_correction(arrays.view(), tilt, options.parallel)?))
}
