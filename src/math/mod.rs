// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Some helper mathematics.

mod eigh;
mod error;

pub(crate) use eigh::{generalised_eigh, hermitian_eigh, GeneralisedEigen, HermitianEigen};
pub use error::EigenError;

use crate::{c64, constants::MAX_KMEANS_ITERATIONS};

/// A Cartesian 3-vector.
pub(crate) type Vec3 = [f64; 3];
/// A 3x3 matrix, row-major.
pub(crate) type Mat3 = [[f64; 3]; 3];

/// Complex exponential. The argument is assumed to be purely imaginary.
///
/// This function doesn't actually use complex numbers; it just returns the real
/// and imag components from Euler's formula (i.e. e^{ix} = cos{x} + i sin{x}).
///
/// # Examples
///
/// `assert_abs_diff_eq!(cexp(PI), c64::new(-1.0, 0.0));`
#[inline]
pub(crate) fn cexp(x: f64) -> c64 {
    let (im, re) = x.sin_cos();
    c64::new(re, im)
}

/// The unnormalised sinc function, sin(x) / x.
#[inline]
pub(crate) fn sinc(x: f64) -> f64 {
    if x.abs() < 1e-8 {
        // Second-order Taylor expansion; exact to double precision here.
        1.0 - x * x / 6.0
    } else {
        x.sin() / x
    }
}

#[inline]
pub(crate) fn dot(a: &Vec3, b: &Vec3) -> f64 {
    a[0] * b[0] + a[1] * b[1] + a[2] * b[2]
}

#[inline]
pub(crate) fn cross(a: &Vec3, b: &Vec3) -> Vec3 {
    [
        a[1] * b[2] - a[2] * b[1],
        a[2] * b[0] - a[0] * b[2],
        a[0] * b[1] - a[1] * b[0],
    ]
}

#[inline]
pub(crate) fn norm(a: &Vec3) -> f64 {
    dot(a, a).sqrt()
}

/// Scale a vector to unit length. Returns `None` for (near-)zero vectors.
pub(crate) fn normalise(a: &Vec3) -> Option<Vec3> {
    let n = norm(a);
    if n < 1e-12 || !n.is_finite() {
        None
    } else {
        Some([a[0] / n, a[1] / n, a[2] / n])
    }
}

#[inline]
pub(crate) fn mat_vec(m: &Mat3, v: &Vec3) -> Vec3 {
    [dot(&m[0], v), dot(&m[1], v), dot(&m[2], v)]
}

/// The unit vector at a colatitude and longitude (both radians).
#[inline]
pub(crate) fn unit_vector(colat: f64, lon: f64) -> Vec3 {
    let (s_t, c_t) = colat.sin_cos();
    let (s_p, c_p) = lon.sin_cos();
    [s_t * c_p, s_t * s_p, c_t]
}

/// The rotation matrix that rotates vectors by `angle` radians
/// (counter-clockwise) about `axis` (Rodrigues' formula). `axis` must be unit
/// length.
pub(crate) fn rotation_matrix(axis: &Vec3, angle: f64) -> Mat3 {
    let (s, c) = angle.sin_cos();
    let t = 1.0 - c;
    let [x, y, z] = *axis;
    [
        [t * x * x + c, t * x * y - s * z, t * x * z + s * y],
        [t * x * y + s * z, t * y * y + c, t * y * z - s * x],
        [t * x * z - s * y, t * y * z + s * x, t * z * z + c],
    ]
}

/// Wrap an angle into (-π, π].
#[inline]
pub(crate) fn wrap_angle(x: f64) -> f64 {
    use std::f64::consts::{PI, TAU};
    let y = x.rem_euclid(TAU);
    if y > PI {
        y - TAU
    } else {
        y
    }
}

/// The index of the value in `centroids` closest to `x`. The lowest index wins
/// ties. `centroids` must not be empty.
pub(crate) fn nearest_index(x: f64, centroids: &[f64]) -> usize {
    let mut best = 0;
    let mut best_dist = f64::INFINITY;
    for (i, &c) in centroids.iter().enumerate() {
        let dist = (x - c).abs();
        if dist < best_dist {
            best = i;
            best_dist = dist;
        }
    }
    best
}

/// Cluster one-dimensional data into (at most) `k` groups with Lloyd's
/// algorithm, returning the centroids in ascending order.
///
/// The centroids are initialised at evenly spaced quantiles of the sorted
/// data, so the result is deterministic. Empty clusters keep their previous
/// centroid.
pub(crate) fn kmeans_1d(data: &[f64], k: usize) -> Vec<f64> {
    if data.is_empty() || k == 0 {
        return vec![];
    }
    let mut sorted = data.to_vec();
    sorted.sort_by(f64::total_cmp);
    let n = sorted.len();

    let mut centroids: Vec<f64> = (0..k)
        .map(|j| sorted[((2 * j + 1) * n / (2 * k)).min(n - 1)])
        .collect();
    let mut assignment = vec![usize::MAX; n];
    for _ in 0..MAX_KMEANS_ITERATIONS {
        let mut changed = false;
        for (&x, a) in sorted.iter().zip(assignment.iter_mut()) {
            let nearest = nearest_index(x, &centroids);
            if nearest != *a {
                *a = nearest;
                changed = true;
            }
        }
        if !changed {
            break;
        }

        let mut sums = vec![0.0; k];
        let mut counts = vec![0_usize; k];
        for (&x, &a) in sorted.iter().zip(assignment.iter()) {
            sums[a] += x;
            counts[a] += 1;
        }
        for ((c, s), count) in centroids.iter_mut().zip(sums).zip(counts) {
            if count > 0 {
                *c = s / count as f64;
            }
        }
    }

    centroids.sort_by(f64::total_cmp);
    centroids
}
