use ndarray::{Array2, Array3, ArrayView2, ArrayView3, Axis, s};
use rayon::prelude::*;

use crate::imaging::ImagingError;
use crate::parallel::ParallelConfig;

/// Smallest value a normalization denominator or a log argument may take.
pub const FLOOR: f64 = 1e-6;

fn image_shape(stack: &ArrayView3<f64>) -> (usize, usize) {
    let (_, rows, cols) = stack.dim();
    (rows, cols)
}

/// Open-beam / dark-current normalization:
/// `(ct - mean(dc)) / (mean(ob) - mean(dc))`, optionally clipped at `cut_off`.
pub fn normalization(
    arrays: ArrayView3<f64>,
    flats: ArrayView3<f64>,
    darks: Option<ArrayView3<f64>>,
    cut_off: Option<f64>,
) -> Result<Array3<f64>, ImagingError> {
    let shape = image_shape(&arrays);
    let flat = flats
        .mean_axis(Axis(0))
        .ok_or_else(|| ImagingError::InvalidArgument("at least one open beam image is required".into()))?;
    if flat.dim() != shape {
        return Err(ImagingError::ShapeMismatch {
            expected: shape,
            actual: flat.dim(),
        });
    }

    let dark = match darks.and_then(|d| d.mean_axis(Axis(0))) {
        Some(dark) if dark.dim() != shape => {
            return Err(ImagingError::ShapeMismatch {
                expected: shape,
                actual: dark.dim(),
            });
        }
        Some(dark) => dark,
        None => Array2::zeros(shape),
    };

    let denominator = (&flat - &dark).mapv(|v| v.max(FLOOR));
    let mut normalized = &arrays - &dark;
    normalized /= &denominator;
    if let Some(limit) = cut_off {
        normalized.mapv_inplace(|v| v.min(limit));
    }
    Ok(normalized)
}

fn median9(window: &mut [f64; 9]) -> f64 {
    window.sort_by(f64::total_cmp);
    window[4]
}

/// Replaces isolated bright outliers (gamma spikes) by the 3×3 median of
/// their neighborhood when they exceed it by more than `diff`.
pub fn gamma_filter_image(image: ArrayView2<f64>, diff: f64) -> Array2<f64> {
    let (rows, cols) = image.dim();
    let mut filtered = image.to_owned();
    if rows == 0 || cols == 0 {
        return filtered;
    }
    let mut window = [0.0; 9];
    for r in 0..rows {
        for c in 0..cols {
            let mut k = 0;
            for dr in [-1isize, 0, 1] {
                for dc in [-1isize, 0, 1] {
                    let rr = (r as isize + dr).clamp(0, rows as isize - 1) as usize;
                    let cc = (c as isize + dc).clamp(0, cols as isize - 1) as usize;
                    window[k] = image[[rr, cc]];
                    k += 1;
                }
            }
            let median = median9(&mut window);
            if image[[r, c]] - median > diff {
                filtered[[r, c]] = median;
            }
        }
    }
    filtered
}

/// [`gamma_filter_image`] over every image of the stack.
pub fn gamma_filter(arrays: ArrayView3<f64>, diff: f64, parallel: ParallelConfig) -> Result<Array3<f64>, ImagingError> {
    if !diff.is_finite() || diff < 0.0 {
        return Err(ImagingError::InvalidArgument(format!(
            "gamma filter threshold must be non-negative, got {diff}"
        )));
    }
    let filtered = parallel.install(|| {
        (0..arrays.len_of(Axis(0)))
            .into_par_iter()
            .map(|i| gamma_filter_image(arrays.index_axis(Axis(0), i), diff))
            .collect::<Vec<_>>()
    })?;

    let mut out = Array3::zeros(arrays.raw_dim());
    for (mut slot, image) in out.axis_iter_mut(Axis(0)).zip(filtered) {
        slot.assign(&image);
    }
    Ok(out)
}

/// Keeps columns `left..right` and rows `top..bottom` of every image.
pub fn crop(arrays: ArrayView3<f64>, crop_limit: [usize; 4]) -> Result<Array3<f64>, ImagingError> {
    let [left, right, top, bottom] = crop_limit;
    let (rows, cols) = image_shape(&arrays);
    if left >= right || right > cols || top >= bottom || bottom > rows {
        return Err(ImagingError::InvalidArgument(format!(
            "crop limits {crop_limit:?} do not fit images of shape ({rows}, {cols})"
        )));
    }
    Ok(arrays.slice(s![.., top..bottom, left..right]).to_owned())
}

/// Converts transmission to attenuation: `-ln(max(x, 1e-6))`.
pub fn minus_log(arrays: ArrayView3<f64>) -> Array3<f64> {
    arrays.mapv(|v| -v.max(FLOOR).ln())
}
