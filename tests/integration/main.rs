// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Integration tests.
//!
//! Some help for laying out these tests was taken from:
//! https://matklad.github.io/2021/02/27/delete-cargo-integration-tests.html

mod properties;
mod scenarios;

use std::f64::consts::{PI, TAU};

use ndarray::prelude::*;

use bluebild::{
    c64, Duration, Epoch, FrameBuilder, ImageContainer, RADec, SynthesisFloat, SynthesisFrame,
};

const WAVELENGTH: f64 = 1.0;

/// A small non-redundant array \[wavelengths\]. It lies in the Y-Z plane, so
/// a field centre at (0°, 0°) looks straight down its X axis.
fn layout() -> Array2<f64> {
    array![
        [0.0, 0.0, 0.0],
        [0.0, 1.3, 0.2],
        [0.0, -0.4, 1.7],
        [0.0, 2.1, -1.1],
        [0.0, -1.8, -0.9],
        [0.0, 0.6, -2.3],
    ]
}

fn start() -> Epoch {
    Epoch::from_gpst_seconds(1090008640.0)
}

fn unit_vector(colatitude: f64, longitude: f64) -> [f64; 3] {
    let (s_t, c_t) = colatitude.sin_cos();
    let (s_p, c_p) = longitude.sin_cos();
    [s_t * c_p, s_t * s_p, c_t]
}

/// The array turned by `angle` about the Z axis.
fn rotated(positions: ArrayView2<f64>, angle: f64) -> Array2<f64> {
    let (s, c) = angle.sin_cos();
    let mut out = positions.to_owned();
    for mut p in out.outer_iter_mut() {
        let (x, y) = (p[0], p[1]);
        p[0] = c * x - s * y;
        p[1] = s * x + c * y;
    }
    out
}

/// The antenna signals of a unit point source in direction `r`.
fn steering(positions: ArrayView2<f64>, r: [f64; 3]) -> Array1<c64> {
    let k = TAU / WAVELENGTH;
    positions
        .outer_iter()
        .map(|p| c64::from_polar(1.0, k * (r[0] * p[0] + r[1] * p[1] + r[2] * p[2])))
        .collect()
}

/// The covariance of point sources `(direction, flux)` seen by antennas with
/// unit weights.
fn point_sources(positions: ArrayView2<f64>, sources: &[([f64; 3], f64)]) -> Array2<c64> {
    let n = positions.len_of(Axis(0));
    let mut covariance = Array2::zeros((n, n));
    for &(r, flux) in sources {
        let x = steering(positions, r);
        covariance.zip_mut_with(
            &Array2::from_shape_fn((n, n), |(a, b)| x[a] * x[b].conj() * flux),
            |c, &v| *c += v,
        );
    }
    covariance
}

/// A 40° field around (0°, 0°) with π/28 pixels, turning at `rate` for
/// `span` seconds.
fn field_frame(rate: f64, span: f64) -> SynthesisFrame {
    FrameBuilder::new(
        RADec::from_degrees(0.0, 0.0),
        start(),
        start() + Duration::from_seconds(span),
        40_f64.to_radians(),
        PI / 28.0,
    )
    .rotation_rate(rate)
    .build()
    .unwrap()
}

fn peak<F: SynthesisFloat>(image: &ImageContainer<F>) -> f64 {
    image.data().fold(0.0_f64, |acc, v| acc.max(v.load()))
}

/// The pixel index and direction of the brightest pixel of a single level.
fn brightest<F: SynthesisFloat>(image: &ImageContainer<F>) -> ((usize, usize), [f64; 3]) {
    let ((q, l), _) = image
        .level(0)
        .indexed_iter()
        .max_by(|(_, a), (_, b)| a.load().total_cmp(&b.load()))
        .unwrap();
    let grid = image.grid();
    ((q, l), unit_vector(grid.colatitudes()[q], grid.longitudes()[l]))
}

fn angle_between(a: [f64; 3], b: [f64; 3]) -> f64 {
    (a[0] * b[0] + a[1] * b[1] + a[2] * b[2])
        .clamp(-1.0, 1.0)
        .acos()
}

/// A snapshot as the imager consumes it.
struct Observation {
    timestamp: Epoch,
    positions: Array2<f64>,
    weights: Array2<c64>,
    covariance: Array2<c64>,
}

/// `num` snapshots spread evenly over `span` seconds of the array turning at
/// `rate` while looking at `sources`, plus `noise` on every antenna.
fn observe(
    sources: &[([f64; 3], f64)],
    noise: f64,
    num: usize,
    rate: f64,
    span: f64,
) -> Vec<Observation> {
    (0..num)
        .map(|i| {
            let dt = if num > 1 {
                span * i as f64 / (num - 1) as f64
            } else {
                0.0
            };
            let positions = rotated(layout().view(), rate * (dt - 0.5 * span));
            let mut covariance = point_sources(positions.view(), sources);
            covariance.diag_mut().mapv_inplace(|v| v + noise);
            Observation {
                timestamp: start() + Duration::from_seconds(dt),
                weights: Array2::eye(positions.len_of(Axis(0))),
                positions,
                covariance,
            }
        })
        .collect()
}
