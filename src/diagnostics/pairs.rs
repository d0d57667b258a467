use crate::diagnostics::DiagnosticError;

/// Finds every ordered pair of angles that are 180° apart within `atol` degrees.
///
/// Returns `(idx_low, idx_high)` with `angles[idx_high[k]] - angles[idx_low[k]] ≈ 180°`,
/// in row-major order of the difference matrix. An empty result is not an error.
pub fn find_180_deg_pairs(
    angles: &[f64],
    atol: f64,
    in_degrees: bool,
) -> Result<(Vec<usize>, Vec<usize>), DiagnosticError> {
    if !atol.is_finite() || atol < 0.0 {
        return Err(DiagnosticError::InvalidArgument(format!(
            "angular tolerance must be a non-negative number, got {atol}"
        )));
    }

    let degrees: Vec<f64> = if in_degrees {
        angles.to_vec()
    } else {
        angles.iter().map(|a| a.to_degrees()).collect()
    };

    let mut low = Vec::new();
    let mut high = Vec::new();
    for (i, a) in degrees.iter().enumerate() {
        for (j, b) in degrees.iter().enumerate() {
            if ((b - a) - 180.0).abs() <= atol {
                low.push(i);
                high.push(j);
            }
        }
    }
    log::debug!("Found {} 180-degree pair(s) among {} angles", low.len(), angles.len());
    Ok((low, high))
}

/// Picks `num_pairs` evenly spaced pairs; non-positive or oversized requests keep all.
pub(crate) fn select_pairs(low: &[usize], high: &[usize], num_pairs: i64) -> Vec<(usize, usize)> {
    let all: Vec<(usize, usize)> = low.iter().copied().zip(high.iter().copied()).collect();
    match usize::try_from(num_pairs) {
        Ok(n) if n > 0 && n < all.len() => (0..n).map(|k| all[k * all.len() / n]).collect(),
        _ => all,
    }
}
