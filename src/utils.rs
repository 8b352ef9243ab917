/*
    Bearing TMA, bearing-only target motion analysis
    Copyright (C) 2018-onwards Christopher Rabotin <christopher.rabotin@gmail.com>

    This program is free software: you can redistribute it and/or modify
    it under the terms of the GNU Affero General Public License as published
    by the Free Software Foundation, either version 3 of the License, or
    (at your option) any later version.

    This program is distributed in the hope that it will be useful,
    but WITHOUT ANY WARRANTY; without even the implied warranty of
    MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
    GNU Affero General Public License for more details.

    You should have received a copy of the GNU Affero General Public License
    along with this program.  If not, see <https://www.gnu.org/licenses/>.
*/

use crate::linalg::{DMatrix, Matrix2, Vector2};
use crate::od::{SingularMatrixSnafu, TrackingError};
use nalgebra::linalg::SVD;
use snafu::ensure;

/// Relative cutoff applied to the singular values in [pseudo_inverse], same as numpy's `pinv` default.
pub const PINV_RCOND: f64 = 1e-15;

/// Maximum number of SVD sweeps per row or column of the decomposed matrix.
pub const SVD_MAX_ITER_PER_DIM: usize = 100;

/// Returns the Moore-Penrose pseudo-inverse of the provided matrix, computed from its SVD.
///
/// Singular values below `PINV_RCOND * sigma_max` are zeroed, so rank deficient systems (e.g. near collinear
/// bearings) yield the minimum norm least squares solution instead of failing.
///
/// # Errors
/// `SingularMatrix` if the matrix has a non-finite entry, or if the SVD does not converge within
/// `SVD_MAX_ITER_PER_DIM * max(rows, cols)` iterations.
pub fn pseudo_inverse(mat: &DMatrix<f64>) -> Result<DMatrix<f64>, TrackingError> {
    let (rows, cols) = mat.shape();
    ensure!(
        mat.iter().all(|x| x.is_finite()),
        SingularMatrixSnafu {
            details: format!("{rows}x{cols} matrix has non-finite entries")
        }
    );

    let max_niter = SVD_MAX_ITER_PER_DIM * rows.max(cols).max(1);
    let svd = SVD::try_new(mat.clone(), true, true, f64::EPSILON, max_niter).ok_or_else(|| {
        SingularMatrixSnafu {
            details: format!("{rows}x{cols} SVD did not converge in {max_niter} iterations"),
        }
        .build()
    })?;
    let eps = PINV_RCOND * svd.singular_values.max();

    svd.pseudo_inverse(eps).map_err(|details| {
        SingularMatrixSnafu {
            details: format!("{rows}x{cols} pseudo-inverse: {details}"),
        }
        .build()
    })
}

/// Rotates the provided vector by +90 degrees, i.e. returns `(-y, x)`.
pub fn perpendicular(v: &Vector2<f64>) -> Vector2<f64> {
    Vector2::new(-v.y, v.x)
}

/// Returns the sample mean and the unbiased sample covariance of a set of planar points.
///
/// The covariance is zero if fewer than two points are provided.
pub fn mean_and_covariance(points: &[Vector2<f64>]) -> (Vector2<f64>, Matrix2<f64>) {
    if points.is_empty() {
        return (Vector2::zeros(), Matrix2::zeros());
    }
    let n = points.len() as f64;
    let mean = points.iter().fold(Vector2::zeros(), |acc, p| acc + p) / n;

    if points.len() < 2 {
        return (mean, Matrix2::zeros());
    }

    let mut covar = Matrix2::zeros();
    for p in points {
        let dev = p - mean;
        covar += dev * dev.transpose();
    }
    (mean, covar / (n - 1.0))
}
