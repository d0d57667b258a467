//! Geometric transforms of single images.

use ndarray::{Array2, ArrayView2, s};

/// Mirror image of `image` about its vertical axis.
pub fn fliplr(image: ArrayView2<f64>) -> Array2<f64> {
    image.slice(s![.., ..;-1]).to_owned()
}

/// Rescales `image` linearly onto `[0, 1]`. A constant image maps to zeros.
pub fn min_max_normalize(image: ArrayView2<f64>) -> Array2<f64> {
    let (min, max) = image
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)));
    let range = max - min;
    if !range.is_finite() || range == 0.0 {
        return Array2::zeros(image.raw_dim());
    }
    image.mapv(|v| (v - min) / range)
}

/// Samples `image` at a fractional position, extending edge pixels outward.
fn sample_bilinear(image: &ArrayView2<f64>, y: f64, x: f64) -> f64 {
    let (rows, cols) = image.dim();
    let y = y.clamp(0.0, (rows - 1) as f64);
    let x = x.clamp(0.0, (cols - 1) as f64);
    let y0 = y.floor() as usize;
    let x0 = x.floor() as usize;
    let y1 = (y0 + 1).min(rows - 1);
    let x1 = (x0 + 1).min(cols - 1);
    let fy = y - y0 as f64;
    let fx = x - x0 as f64;

    let top = image[[y0, x0]] * (1.0 - fx) + image[[y0, x1]] * fx;
    let bottom = image[[y1, x0]] * (1.0 - fx) + image[[y1, x1]] * fx;
    top * (1.0 - fy) + bottom * fy
}

/// Rotates `image` counter-clockwise by `angle_deg` about its center.
///
/// Uses bilinear interpolation with edge extension. With `resize` the output
/// grows to hold the whole rotated image, otherwise it keeps the input shape.
pub fn rotate(image: ArrayView2<f64>, angle_deg: f64, resize: bool) -> Array2<f64> {
    let (rows, cols) = image.dim();
    if rows == 0 || cols == 0 {
        return image.to_owned();
    }

    let theta = angle_deg.to_radians();
    let (sin, cos) = theta.sin_cos();
    let cx = cols as f64 / 2.0 - 0.5;
    let cy = rows as f64 / 2.0 - 0.5;

    // output origin expressed in the input frame, output shape
    let (origin_x, origin_y, out_rows, out_cols) = if resize {
        let corners = [
            (0.0, 0.0),
            (0.0, (rows - 1) as f64),
            ((cols - 1) as f64, (rows - 1) as f64),
            ((cols - 1) as f64, 0.0),
        ];
        let mapped: Vec<(f64, f64)> = corners
            .iter()
            .map(|&(x, y)| {
                let (dx, dy) = (x - cx, y - cy);
                (cx + cos * dx + sin * dy, cy - sin * dx + cos * dy)
            })
            .collect();
        let min_x = mapped.iter().map(|p| p.0).fold(f64::INFINITY, f64::min);
        let max_x = mapped.iter().map(|p| p.0).fold(f64::NEG_INFINITY, f64::max);
        let min_y = mapped.iter().map(|p| p.1).fold(f64::INFINITY, f64::min);
        let max_y = mapped.iter().map(|p| p.1).fold(f64::NEG_INFINITY, f64::max);
        let out_rows = (max_y - min_y + 1.0).round().max(1.0) as usize;
        let out_cols = (max_x - min_x + 1.0).round().max(1.0) as usize;
        // grid centered on the rotation center keeps mirror symmetry
        let origin_x = cx - (out_cols as f64 - 1.0) / 2.0;
        let origin_y = cy - (out_rows as f64 - 1.0) / 2.0;
        (origin_x, origin_y, out_rows, out_cols)
    } else {
        (0.0, 0.0, rows, cols)
    };

    Array2::from_shape_fn((out_rows, out_cols), |(r, c)| {
        let dx = c as f64 + origin_x - cx;
        let dy = r as f64 + origin_y - cy;
        let x_in = cx + cos * dx - sin * dy;
        let y_in = cy + sin * dx + cos * dy;
        sample_bilinear(&image, y_in, x_in)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    #[test]
    fn test_fliplr() {
        let image = array![[1.0, 2.0, 3.0], [4.0, 5.0, 6.0]];
        assert_eq!(fliplr(image.view()), array![[3.0, 2.0, 1.0], [6.0, 5.0, 4.0]]);
    }

    #[test]
    fn test_min_max_normalize() {
        let image = array![[2.0, 4.0], [6.0, 10.0]];
        assert_eq!(min_max_normalize(image.view()), array![[0.0, 0.25], [0.5, 1.0]]);
        let flat = Array2::from_elem((2, 2), 3.0);
        assert_eq!(min_max_normalize(flat.view()), Array2::<f64>::zeros((2, 2)));
    }

    #[test]
    fn test_zero_rotation_is_identity() {
        let image = Array2::from_shape_fn((5, 7), |(r, c)| (r * 7 + c) as f64);
        let rotated = rotate(image.view(), 0.0, false);
        for (a, b) in rotated.iter().zip(image.iter()) {
            assert_abs_diff_eq!(a, b, epsilon = 1e-12);
        }
        assert_eq!(rotate(image.view(), 0.0, true).dim(), (5, 7));
    }

    #[test]
    fn test_quarter_turn_counter_clockwise() {
        let image = array![[1.0, 2.0, 3.0], [4.0, 5.0, 6.0], [7.0, 8.0, 9.0]];
        let rotated = rotate(image.view(), 90.0, false);
        let expected = array![[3.0, 6.0, 9.0], [2.0, 5.0, 8.0], [1.0, 4.0, 7.0]];
        for (a, b) in rotated.iter().zip(expected.iter()) {
            assert_abs_diff_eq!(a, b, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_resized_rotation_commutes_with_mirror() {
        let image = Array2::from_shape_fn((9, 14), |(r, c)| ((r * 31 + c * 17) % 11) as f64 + 0.1 * c as f64);
        for angle in [7.3, -2.6, 33.0] {
            let mirrored_after = fliplr(rotate(image.view(), angle, true).view());
            let mirrored_before = rotate(fliplr(image.view()).view(), -angle, true);
            assert_eq!(mirrored_after.dim(), mirrored_before.dim());
            for (a, b) in mirrored_after.iter().zip(mirrored_before.iter()) {
                assert_abs_diff_eq!(a, b, epsilon = 1e-9);
            }
        }
    }

    #[test]
    fn test_resized_quarter_turn_keeps_pixels() {
        let image = array![[1.0, 2.0, 3.0], [4.0, 5.0, 6.0]];
        let rotated = rotate(image.view(), 90.0, true);
        let expected = array![[3.0, 6.0], [2.0, 5.0], [1.0, 4.0]];
        for (a, b) in rotated.iter().zip(expected.iter()) {
            assert_abs_diff_eq!(a, b, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_resize_grows_output() {
        let image = Array2::<f64>::ones((10, 20));
        assert_eq!(rotate(image.view(), 90.0, true).dim(), (20, 10));
        let (rows, cols) = rotate(image.view(), 45.0, true).dim();
        assert!(rows > 10 && cols > 20);
    }
}
