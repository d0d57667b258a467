//! Rotation-center and tilt diagnostics for CT projection stacks.
//!
//! Both estimators work on 180° pairs: two projections taken half a turn apart
//! are mirror images of each other about the rotation axis. The rotation center
//! follows from the horizontal shift between one image and the mirrored other;
//! the tilt from the in-plane rotation that best aligns them.

pub mod correlation;
pub mod error;
pub mod optimize;
pub mod pairs;
pub mod rotation;
pub mod tilt;

pub use correlation::{fft2, phase_cross_correlation};
pub use error::DiagnosticError;
pub use optimize::{BoundedMinimum, BoundedOptions, TerminationStatus, minimize_scalar_bounded};
pub use pairs::find_180_deg_pairs;
pub use rotation::{RotationCenterOptions, find_rotation_center};
pub use tilt::{
    TiltOptions, apply_tilt_correction, calculate_dissimilarity, calculate_tilt, estimate_tilt, tilt_correction,
};

/// Median; an even count averages the two middle values. Callers ensure `values` is not empty.
pub(crate) fn median(values: &[f64]) -> f64 {
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let n = sorted.len();
    if n == 0 {
        return f64::NAN;
    }
    if n % 2 == 1 {
        sorted[n / 2]
    } else {
        (sorted[n / 2 - 1] + sorted[n / 2]) / 2.0
    }
}

pub(crate) fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_median() {
        assert_eq!(median(&[3.0, 1.0, 2.0]), 2.0);
        assert_eq!(median(&[4.0, 1.0, 3.0, 2.0]), 2.5);
        assert!(median(&[]).is_nan());
    }

    #[test]
    fn test_median_ignores_order() {
        assert_eq!(median(&[31.0, 30.5, 40.0, 31.5]), median(&[40.0, 31.5, 31.0, 30.5]));
    }

    #[test]
    fn test_mean() {
        assert_eq!(mean(&[1.0, 2.0, 6.0]), 3.0);
    }
}
