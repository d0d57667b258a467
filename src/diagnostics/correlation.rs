//! Sub-pixel image registration by phase correlation.
//!
//! The coarse shift comes from the peak of the inverse FFT of the
//! phase-normalized cross-power spectrum. It is then refined by evaluating the
//! cross-correlation on an upsampled grid around the peak with a matrix DFT,
//! which costs far less than zero-padding the whole spectrum.

use ndarray::{Array2, ArrayView2, Zip};
use rustfft::{FftDirection, FftPlanner, num_complex::Complex64};
use std::f64::consts::PI;

use crate::diagnostics::DiagnosticError;

/// Shifts are resolved to 1/100 of a pixel.
pub const DEFAULT_UPSAMPLE_FACTOR: usize = 100;

/// 2-D discrete Fourier transform of a real image.
pub fn fft2(image: ArrayView2<f64>) -> Array2<Complex64> {
    let mut data = image.mapv(|v| Complex64::new(v, 0.0));
    transform_in_place(&mut data, FftDirection::Forward);
    data
}

/// Unnormalized 2-D inverse transform.
fn ifft2(spectrum: &Array2<Complex64>) -> Array2<Complex64> {
    let mut data = spectrum.clone();
    transform_in_place(&mut data, FftDirection::Inverse);
    data
}

fn transform_in_place(data: &mut Array2<Complex64>, direction: FftDirection) {
    let (rows, cols) = data.dim();
    let mut planner = FftPlanner::new();

    let row_fft = planner.plan_fft(cols, direction);
    let mut buffer = vec![Complex64::new(0.0, 0.0); cols];
    for mut row in data.rows_mut() {
        buffer.iter_mut().zip(row.iter()).for_each(|(b, v)| *b = *v);
        row_fft.process(&mut buffer);
        row.iter_mut().zip(buffer.iter()).for_each(|(v, b)| *v = *b);
    }

    let col_fft = planner.plan_fft(rows, direction);
    let mut buffer = vec![Complex64::new(0.0, 0.0); rows];
    for mut col in data.columns_mut() {
        buffer.iter_mut().zip(col.iter()).for_each(|(b, v)| *b = *v);
        col_fft.process(&mut buffer);
        col.iter_mut().zip(buffer.iter()).for_each(|(v, b)| *v = *b);
    }
}

/// Sample frequencies of an `n`-point DFT with sample spacing `d`, in numpy order.
fn fftfreq(n: usize, d: f64) -> Vec<f64> {
    let scale = 1.0 / (n as f64 * d);
    (0..n)
        .map(|k| {
            let k = if k < n.div_ceil(2) { k as f64 } else { k as f64 - n as f64 };
            k * scale
        })
        .collect()
}

/// Index of the entry with the largest magnitude; the first one wins ties.
fn argmax_abs(data: &Array2<Complex64>) -> (usize, usize) {
    let mut best = (0, 0);
    let mut best_norm = f64::NEG_INFINITY;
    for (idx, value) in data.indexed_iter() {
        let norm = value.norm_sqr();
        if norm > best_norm {
            best_norm = norm;
            best = idx;
        }
    }
    best
}

/// Evaluates the inverse DFT of `spectrum` on a `region × region` grid whose
/// origin sits at `offsets` (in upsampled pixels).
fn upsampled_dft(spectrum: &Array2<Complex64>, region: usize, upsample_factor: f64, offsets: (f64, f64)) -> Array2<Complex64> {
    let (rows, cols) = spectrum.dim();
    let kernel = |n: usize, offset: f64| {
        let freqs = fftfreq(n, upsample_factor);
        Array2::from_shape_fn((region, n), |(u, k)| {
            let phase = 2.0 * PI * (u as f64 - offset) * freqs[k];
            Complex64::new(phase.cos(), phase.sin())
        })
    };
    let row_kernel = kernel(rows, offsets.0);
    let col_kernel = kernel(cols, offsets.1);

    let partial = spectrum.dot(&col_kernel.t());
    row_kernel.dot(&partial)
}

/// Estimates the `(row, column)` translation that registers `moving` onto `reference`,
/// i.e. `reference(y, x) ≈ moving(y - dy, x - dx)`.
///
/// `upsample_factor` of 1 gives whole-pixel precision; larger values refine the
/// estimate to `1 / upsample_factor` of a pixel.
pub fn phase_cross_correlation(
    reference: ArrayView2<f64>,
    moving: ArrayView2<f64>,
    upsample_factor: usize,
) -> Result<(f64, f64), DiagnosticError> {
    if reference.dim() != moving.dim() {
        return Err(DiagnosticError::ShapeMismatch {
            first: reference.dim(),
            second: moving.dim(),
        });
    }
    let (rows, cols) = reference.dim();
    if rows == 0 || cols == 0 {
        return Err(DiagnosticError::InvalidArgument("cannot correlate empty images".into()));
    }
    if upsample_factor == 0 {
        return Err(DiagnosticError::InvalidArgument("upsample factor must be at least 1".into()));
    }

    let floor = 100.0 * f64::EPSILON;
    let reference_spectrum = fft2(reference);
    let moving_spectrum = fft2(moving);
    let cross_power = Zip::from(&reference_spectrum)
        .and(&moving_spectrum)
        .map_collect(|r, m| {
            let product = r * m.conj();
            product / product.norm().max(floor)
        });

    let (peak_row, peak_col) = argmax_abs(&ifft2(&cross_power));
    let wrap = |peak: usize, n: usize| {
        let shift = peak as f64;
        if shift > (n / 2) as f64 { shift - n as f64 } else { shift }
    };
    let mut shift = (wrap(peak_row, rows), wrap(peak_col, cols));

    if upsample_factor > 1 {
        let factor = upsample_factor as f64;
        shift = ((shift.0 * factor).round() / factor, (shift.1 * factor).round() / factor);
        let region = (factor * 1.5).ceil();
        let center = (region / 2.0).trunc();
        let offsets = (center - shift.0 * factor, center - shift.1 * factor);

        let refined = upsampled_dft(&cross_power, region as usize, factor, offsets);
        let (fine_row, fine_col) = argmax_abs(&refined);
        shift.0 += (fine_row as f64 - center) / factor;
        shift.1 += (fine_col as f64 - center) / factor;
    }

    Ok(shift)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn blob(rows: usize, cols: usize, cy: f64, cx: f64) -> Array2<f64> {
        Array2::from_shape_fn((rows, cols), |(y, x)| {
            let dy = y as f64 - cy;
            let dx = x as f64 - cx;
            (-(dy * dy) / 18.0 - (dx * dx) / 8.0).exp() + 0.4 * (-((dy - 4.0).powi(2) + (dx + 6.0).powi(2)) / 10.0).exp()
        })
    }

    #[test]
    fn test_fftfreq_matches_numpy_order() {
        assert_eq!(fftfreq(4, 1.0), vec![0.0, 0.25, -0.5, -0.25]);
        assert_eq!(fftfreq(5, 1.0), vec![0.0, 0.2, 0.4, -0.4, -0.2]);
    }

    #[test]
    fn test_fft2_dc_term() {
        let image = Array2::from_elem((4, 6), 2.0);
        let spectrum = fft2(image.view());
        assert_abs_diff_eq!(spectrum[[0, 0]].re, 48.0, epsilon = 1e-12);
        assert_abs_diff_eq!(spectrum[[1, 2]].norm(), 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_integer_shift() {
        let reference = blob(32, 32, 16.0, 16.0);
        let moving = blob(32, 32, 13.0, 19.0);
        let (dy, dx) = phase_cross_correlation(reference.view(), moving.view(), 1).unwrap();
        assert_eq!((dy, dx), (3.0, -3.0));
    }

    #[test]
    fn test_subpixel_shift() {
        let reference = blob(48, 48, 24.0, 24.0);
        let moving = blob(48, 48, 22.7, 25.35);
        let (dy, dx) = phase_cross_correlation(reference.view(), moving.view(), DEFAULT_UPSAMPLE_FACTOR).unwrap();
        assert_abs_diff_eq!(dy, 1.3, epsilon = 0.1);
        assert_abs_diff_eq!(dx, -1.35, epsilon = 0.1);
    }

    #[test]
    fn test_shape_mismatch() {
        let a = Array2::<f64>::zeros((4, 4));
        let b = Array2::<f64>::zeros((4, 5));
        assert!(matches!(
            phase_cross_correlation(a.view(), b.view(), 10),
            Err(DiagnosticError::ShapeMismatch { .. })
        ));
    }
}
