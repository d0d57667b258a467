//! Bounded scalar minimization (Brent's method restricted to an interval).

use std::fmt;

use crate::diagnostics::DiagnosticError;

/// Why the bounded search stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminationStatus {
    Converged,
    MaxIterations,
    NotANumber,
}

impl TerminationStatus {
    /// Numeric status code: 0 converged, 1 iteration limit, 2 NaN encountered.
    pub fn code(&self) -> u8 {
        match self {
            TerminationStatus::Converged => 0,
            TerminationStatus::MaxIterations => 1,
            TerminationStatus::NotANumber => 2,
        }
    }

    pub fn message(&self) -> &'static str {
        match self {
            TerminationStatus::Converged => "Solution found.",
            TerminationStatus::MaxIterations => "Maximum number of function calls reached.",
            TerminationStatus::NotANumber => "NaN result encountered.",
        }
    }
}

impl fmt::Display for TerminationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}

/// Full record of a bounded minimization.
#[derive(Debug, Clone, PartialEq)]
pub struct BoundedMinimum {
    /// Argmin.
    pub x: f64,
    /// Objective value at `x`.
    pub fun: f64,
    /// Number of objective evaluations.
    pub nfev: usize,
    pub nit: usize,
    pub status: TerminationStatus,
    pub success: bool,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundedOptions {
    /// Absolute tolerance on the argmin.
    pub xatol: f64,
    /// Maximum number of objective evaluations.
    pub maxiter: usize,
}

impl Default for BoundedOptions {
    fn default() -> Self {
        Self {
            xatol: 1e-5,
            maxiter: 500,
        }
    }
}

fn sign(v: f64) -> f64 {
    if v > 0.0 {
        1.0
    } else if v < 0.0 {
        -1.0
    } else {
        0.0
    }
}

/// Minimizes `func` on `[lower, upper]` without derivatives, combining golden
/// section steps with parabolic interpolation.
///
/// Objective errors abort the search and are returned unchanged.
pub fn minimize_scalar_bounded<F>(
    mut func: F,
    bounds: (f64, f64),
    options: BoundedOptions,
) -> Result<BoundedMinimum, DiagnosticError>
where
    F: FnMut(f64) -> Result<f64, DiagnosticError>,
{
    let (lower, upper) = bounds;
    if !lower.is_finite() || !upper.is_finite() {
        return Err(DiagnosticError::InvalidArgument("optimization bounds must be finite".into()));
    }
    if lower > upper {
        return Err(DiagnosticError::InvalidArgument(format!(
            "lower bound {lower} exceeds upper bound {upper}"
        )));
    }

    let sqrt_eps = 2.2e-16f64.sqrt();
    let golden_mean = 0.5 * (3.0 - 5.0f64.sqrt());
    let xatol = options.xatol;

    let (mut a, mut b) = (lower, upper);
    let mut fulc = a + golden_mean * (b - a);
    let mut nfc = fulc;
    let mut xf = fulc;
    let mut rat = 0.0f64;
    let mut e = 0.0f64;
    let mut fx = func(xf)?;
    let mut num = 1usize;
    let mut fu = f64::INFINITY;
    let mut ffulc = fx;
    let mut fnfc = fx;
    let mut xm = 0.5 * (a + b);
    let mut tol1 = sqrt_eps * xf.abs() + xatol / 3.0;
    let mut tol2 = 2.0 * tol1;
    let mut status = TerminationStatus::Converged;

    while (xf - xm).abs() > tol2 - 0.5 * (b - a) {
        let mut golden = true;

        if e.abs() > tol1 {
            golden = false;
            let mut r = (xf - nfc) * (fx - ffulc);
            let mut q = (xf - fulc) * (fx - fnfc);
            let mut p = (xf - fulc) * q - (xf - nfc) * r;
            q = 2.0 * (q - r);
            if q > 0.0 {
                p = -p;
            }
            q = q.abs();
            r = e;
            e = rat;

            if p.abs() < (0.5 * q * r).abs() && p > q * (a - xf) && p < q * (b - xf) {
                rat = p / q;
                let x = xf + rat;
                if (x - a) < tol2 || (b - x) < tol2 {
                    let si = sign(xm - xf) + if xm - xf == 0.0 { 1.0 } else { 0.0 };
                    rat = tol1 * si;
                }
            } else {
                golden = true;
            }
        }

        if golden {
            e = if xf >= xm { a - xf } else { b - xf };
            rat = golden_mean * e;
        }

        let si = sign(rat) + if rat == 0.0 { 1.0 } else { 0.0 };
        let x = xf + si * rat.abs().max(tol1);
        fu = func(x)?;
        num += 1;

        if fu <= fx {
            if x >= xf {
                a = xf;
            } else {
                b = xf;
            }
            fulc = nfc;
            ffulc = fnfc;
            nfc = xf;
            fnfc = fx;
            xf = x;
            fx = fu;
        } else {
            if x < xf {
                a = x;
            } else {
                b = x;
            }
            if fu <= fnfc || nfc == xf {
                fulc = nfc;
                ffulc = fnfc;
                nfc = x;
                fnfc = fu;
            } else if fu <= ffulc || fulc == xf || fulc == nfc {
                fulc = x;
                ffulc = fu;
            }
        }

        xm = 0.5 * (a + b);
        tol1 = sqrt_eps * xf.abs() + xatol / 3.0;
        tol2 = 2.0 * tol1;

        if num >= options.maxiter {
            status = TerminationStatus::MaxIterations;
            break;
        }
    }

    if xf.is_nan() || fx.is_nan() || fu.is_nan() {
        status = TerminationStatus::NotANumber;
    }

    Ok(BoundedMinimum {
        x: xf,
        fun: fx,
        nfev: num,
        nit: num,
        status,
        success: status == TerminationStatus::Converged,
        message: status.message().to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_parabola_minimum() {
        let result =
            minimize_scalar_bounded(|x| Ok((x - 1.3).powi(2) + 2.0), (-5.0, 5.0), BoundedOptions::default()).unwrap();
        assert!(result.success);
        assert_eq!(result.status.code(), 0);
        assert_abs_diff_eq!(result.x, 1.3, epsilon = 1e-4);
        assert_abs_diff_eq!(result.fun, 2.0, epsilon = 1e-8);
        assert!(result.nfev < 50);
    }

    #[test]
    fn test_minimum_on_boundary() {
        let result = minimize_scalar_bounded(|x| Ok(x), (-2.0, 3.0), BoundedOptions::default()).unwrap();
        assert_abs_diff_eq!(result.x, -2.0, epsilon = 1e-4);
    }

    #[test]
    fn test_iteration_limit() {
        let options = BoundedOptions { xatol: 1e-12, maxiter: 3 };
        let result = minimize_scalar_bounded(|x| Ok(x.cos()), (0.0, 6.0), options).unwrap();
        assert_eq!(result.status, TerminationStatus::MaxIterations);
        assert!(!result.success);
        assert_eq!(result.nfev, 3);
    }

    #[test]
    fn test_nan_objective() {
        let result = minimize_scalar_bounded(|_| Ok(f64::NAN), (0.0, 1.0), BoundedOptions::default()).unwrap();
        assert_eq!(result.status.code(), 2);
        assert_eq!(result.message, "NaN result encountered.");
    }

    #[test]
    fn test_objective_error_propagates() {
        let err = minimize_scalar_bounded(
            |_| Err(DiagnosticError::InvalidArgument("boom".into())),
            (0.0, 1.0),
            BoundedOptions::default(),
        )
        .unwrap_err();
        assert!(err.to_string().contains("boom"));
    }

    #[test]
    fn test_invalid_bounds() {
        assert!(minimize_scalar_bounded(|x| Ok(x), (1.0, 0.0), BoundedOptions::default()).is_err());
        assert!(minimize_scalar_bounded(|x| Ok(x), (0.0, f64::INFINITY), BoundedOptions::default()).is_err());
    }
}
