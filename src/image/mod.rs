// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Finalised images.

mod error;

pub use error::ImageError;

use ndarray::{prelude::*, Zip};
use serde::{Deserialize, Serialize};

use crate::{frame::PixelGrid, imager::SynthesisFloat};

/// A per-level pixel cube (levels, rows, columns) and the grid it was
/// evaluated on. Containers on the same grid can be combined elementwise; a
/// single-level right-hand side is applied to every level.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(bound = "")]
pub struct ImageContainer<F: SynthesisFloat> {
    data: Array3<F>,
    grid: PixelGrid,
}

impl<F: SynthesisFloat> ImageContainer<F> {
    pub fn new(data: Array3<F>, grid: PixelGrid) -> Result<Self, ImageError> {
        let (_, rows, cols) = data.dim();
        if (rows, cols) != grid.shape() {
            return Err(ImageError::Shape {
                data: data.dim(),
                grid: grid.shape(),
            });
        }
        Ok(Self { data, grid })
    }

    pub fn data(&self) -> ArrayView3<F> {
        self.data.view()
    }

    pub fn into_data(self) -> Array3<F> {
        self.data
    }

    pub fn grid(&self) -> &PixelGrid {
        &self.grid
    }

    pub fn num_levels(&self) -> usize {
        self.data.len_of(Axis(0))
    }

    pub fn level(&self, i: usize) -> ArrayView2<F> {
        self.data.index_axis(Axis(0), i)
    }

    fn zip_with(&self, other: &Self, f: impl Fn(F, F) -> F) -> Result<Self, ImageError> {
        if self.grid != other.grid {
            return Err(ImageError::GridMismatch);
        }
        let (left, right) = (self.num_levels(), other.num_levels());
        if left != right && right != 1 {
            return Err(ImageError::LevelMismatch { left, right });
        }

        let mut data = self.data.clone();
        for (i, mut level) in data.outer_iter_mut().enumerate() {
            let rhs = other.data.index_axis(Axis(0), if right == 1 { 0 } else { i });
            Zip::from(&mut level)
                .and(&rhs)
                .for_each(|l, &r| *l = f(*l, r));
        }
        Ok(Self {
            data,
            grid: self.grid.clone(),
        })
    }

    pub fn add(&self, other: &Self) -> Result<Self, ImageError> {
        self.zip_with(other, |a, b| a + b)
    }

    pub fn sub(&self, other: &Self) -> Result<Self, ImageError> {
        self.zip_with(other, |a, b| a - b)
    }

    pub fn mul(&self, other: &Self) -> Result<Self, ImageError> {
        self.zip_with(other, |a, b| a * b)
    }

    /// Elementwise division. Pixels where the quotient isn't finite (e.g. a
    /// zero denominator) are 0.
    pub fn div(&self, other: &Self) -> Result<Self, ImageError> {
        self.zip_with(other, |a, b| {
            let q = a / b;
            if q.is_finite() {
                q
            } else {
                F::zero()
            }
        })
    }

    /// A single-level image holding the sum over levels.
    pub fn sum_levels(&self) -> Self {
        Self {
            data: self.data.sum_axis(Axis(0)).insert_axis(Axis(0)),
            grid: self.grid.clone(),
        }
    }

    /// The integral of each level over the grid, `Σ I(θ, φ) sin θ Δθ Δφ`.
    pub fn total_flux(&self) -> Array1<f64> {
        self.data
            .outer_iter()
            .map(|level| {
                level
                    .outer_iter()
                    .enumerate()
                    .map(|(q, row)| {
                        let omega = self.grid.pixel_solid_angle(q);
                        row.iter().map(|v| v.load()).sum::<f64>() * omega
                    })
                    .sum()
            })
            .collect()
    }
}

/// The two estimators produced by a finalised imager.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(bound = "")]
pub struct SynthesisImages<F: SynthesisFloat> {
    /// Eigenvalue-weighted energy per pixel.
    pub standardized: ImageContainer<F>,
    /// The standardized image with the kernel's own response divided out.
    pub least_squares: ImageContainer<F>,
}

impl<F: SynthesisFloat> SynthesisImages<F> {
    /// Divide both images by a single-level sensitivity image.
    pub fn normalise(&self, sensitivity: &ImageContainer<F>) -> Result<Self, ImageError> {
        Ok(Self {
            standardized: self.standardized.div(sensitivity)?,
            least_squares: self.least_squares.div(sensitivity)?,
        })
    }
}
