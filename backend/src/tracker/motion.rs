use nalgebra::{DMatrix, Matrix2};
use opencv::core::Point2f;

/// Smallest allowed ratio between the singular values of the centered source points.
///
/// Below this the points are treated as collinear and no linear map is fitted.
const MIN_SINGULAR_RATIO: f64 = 1e-6;

/// Region motion between two point sets.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Motion {
    /// Difference between the means of the new and old points.
    pub translation: Point2f,
    /// Residual linear map acting on column vectors around the mean.
    ///
    /// This is [`None`] when the old points do not span two dimensions.
    pub linear: Option<Matrix2<f64>>,
}

/// Estimates the motion mapping `old` onto `new`, matched by index.
///
/// The translation is the difference of means. The residual linear map is the least-squares
/// solution of `old_centered * M = new_centered` through the pseudo-inverse, transposed into
/// column-vector form. Returns [`None`] when there are no pairs.
pub fn estimate_motion(old: &[Point2f], new: &[Point2f]) -> Option<Motion> {
    if old.is_empty() || old.len() != new.len() {
        return None;
    }

    let old_mean = mean(old);
    let new_mean = mean(new);
    let translation = Point2f::new(
        (new_mean.0 - old_mean.0) as f32,
        (new_mean.1 - old_mean.1) as f32,
    );
    let linear = fit_linear(&centered(old, old_mean), &centered(new, new_mean));

    Some(Motion {
        translation,
        linear,
    })
}

fn fit_linear(old: &DMatrix<f64>, new: &DMatrix<f64>) -> Option<Matrix2<f64>> {
    if old.nrows() < 3 {
        return None;
    }

    let svd = old.clone().svd(true, true);
    let max = svd.singular_values.max();
    let min = svd.singular_values.min();
    if max <= 0.0 || min / max < MIN_SINGULAR_RATIO {
        return None;
    }

    let solution = svd.pseudo_inverse(f64::EPSILON).ok()? * new;
    Some(Matrix2::new(
        solution[(0, 0)],
        solution[(1, 0)],
        solution[(0, 1)],
        solution[(1, 1)],
    ))
}

fn mean(points: &[Point2f]) -> (f64, f64) {
    let (sum_x, sum_y) = points.iter().fold((0.0, 0.0), |(x, y), point| {
        (x + point.x as f64, y + point.y as f64)
    });
    let count = points.len() as f64;
    (sum_x / count, sum_y / count)
}

fn centered(points: &[Point2f], (mean_x, mean_y): (f64, f64)) -> DMatrix<f64> {
    DMatrix::from_fn(points.len(), 2, |row, col| {
        let point = points[row];
        if col == 0 {
            point.x as f64 - mean_x
        } else {
            point.y as f64 - mean_y
        }
    })
}
