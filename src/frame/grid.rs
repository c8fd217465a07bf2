// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Equiangular pixel grids on the sphere.

use std::f64::consts::PI;

use ndarray::prelude::*;
use serde::{Deserialize, Serialize};

use crate::math::{unit_vector, wrap_angle};

/// An equiangular colatitude x longitude sampling of (part of) the sphere, in
/// synthesis-frame coordinates.
///
/// The grid is cut from the order-`N` full-sphere sampling with colatitudes
/// `π (2q + 1) / (2N + 2)` and longitudes `2π l / (2N + 2)`, so both axes have
/// the spacing `π / (N + 1)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PixelGrid {
    order: usize,
    colatitudes: Array1<f64>,
    longitudes: Array1<f64>,
    full_circle: bool,
}

impl PixelGrid {
    /// The grid of order `N = max(1, ceil(π / resolution) - 1)` covering the
    /// spherical cap of diameter `field_of_view` around the direction with
    /// colatitude `centre_colat` and longitude 0.
    pub(crate) fn new(centre_colat: f64, field_of_view: f64, resolution: f64) -> PixelGrid {
        // Guard against π / (π / (M + 1)) landing just above M + 1.
        let order = ((PI / resolution - 1e-9).ceil() as usize)
            .saturating_sub(1)
            .max(1);
        let spacing = PI / (order + 1) as f64;
        let half_fov = field_of_view / 2.0;

        let mut colatitudes = (0..=order)
            .map(|q| spacing * (q as f64 + 0.5))
            .filter(|&t| (t - centre_colat).abs() <= half_fov)
            .collect::<Vec<_>>();
        if colatitudes.is_empty() {
            let q = ((centre_colat / spacing - 0.5).round().max(0.0) as usize).min(order);
            colatitudes.push(spacing * (q as f64 + 0.5));
        }

        // The cap's longitude half-width; if the cap contains a pole, all
        // longitudes are needed.
        let full_circle = half_fov >= centre_colat.min(PI - centre_colat);
        let half_width = if full_circle {
            PI
        } else {
            (half_fov.sin() / centre_colat.sin()).clamp(-1.0, 1.0).asin()
        };
        let mut longitudes = (0..2 * order + 2)
            .map(|l| wrap_angle(spacing * l as f64))
            .filter(|&p| full_circle || p.abs() <= half_width)
            .collect::<Vec<_>>();
        // Longitude 0 is always a sample, so this only guards against NaNs.
        if longitudes.is_empty() {
            longitudes.push(0.0);
        }
        longitudes.sort_by(f64::total_cmp);

        PixelGrid {
            order,
            colatitudes: Array1::from(colatitudes),
            longitudes: Array1::from(longitudes),
            full_circle,
        }
    }

    /// The order `N` of the full-sphere sampling this grid is cut from.
    pub fn order(&self) -> usize {
        self.order
    }

    /// The spacing between adjacent samples on either axis \[radians\].
    pub fn spacing(&self) -> f64 {
        PI / (self.order + 1) as f64
    }

    /// Colatitudes of the rows \[radians\], ascending.
    pub fn colatitudes(&self) -> ArrayView1<f64> {
        self.colatitudes.view()
    }

    /// Longitudes of the columns \[radians\], ascending within (-π, π].
    pub fn longitudes(&self) -> ArrayView1<f64> {
        self.longitudes.view()
    }

    /// (rows, columns)
    pub fn shape(&self) -> (usize, usize) {
        (self.colatitudes.len(), self.longitudes.len())
    }

    pub fn num_pixels(&self) -> usize {
        self.colatitudes.len() * self.longitudes.len()
    }

    /// Does the grid sample the whole circle of longitudes?
    pub fn is_full_circle(&self) -> bool {
        self.full_circle
    }

    /// The longitude extent of the grid's samples \[radians\].
    pub(crate) fn longitude_extent(&self) -> f64 {
        let n = self.longitudes.len();
        if n < 2 {
            0.0
        } else {
            self.longitudes[n - 1] - self.longitudes[0]
        }
    }

    /// The solid angle of a pixel in row `q` \[steradians\].
    pub fn pixel_solid_angle(&self, q: usize) -> f64 {
        let d = self.spacing();
        self.colatitudes[q].sin() * d * d
    }

    /// The unit vector of every pixel, with shape (rows, columns, 3).
    pub fn directions(&self) -> Array3<f64> {
        let (rows, cols) = self.shape();
        Array3::from_shape_fn((rows, cols, 3), |(q, l, i)| {
            unit_vector(self.colatitudes[q], self.longitudes[l])[i]
        })
    }

    /// The pixel nearest to a synthesis-frame direction, as (row, column).
    pub fn nearest_pixel(&self, direction: &[f64; 3]) -> (usize, usize) {
        let colat = direction[2].clamp(-1.0, 1.0).acos();
        let lon = direction[1].atan2(direction[0]);
        let q = argmin(self.colatitudes.iter().map(|&t| (t - colat).abs()));
        let l = argmin(self.longitudes.iter().map(|&p| wrap_angle(p - lon).abs()));
        (q, l)
    }
}

fn argmin(it: impl Iterator<Item = f64>) -> usize {
    it.enumerate()
        .fold((0, f64::INFINITY), |(bi, bv), (i, v)| {
            if v < bv {
                (i, v)
            } else {
                (bi, bv)
            }
        })
        .0
}
