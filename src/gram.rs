// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Gram-weighting of beamformed antennas.
//!
//! The Gram matrix of a set of beams is the overlap of their (isotropic)
//! far-field responses integrated over the sphere:
//!
//! `G_ant[a, b] = 4π sinc(2π |p_a - p_b| / λ)`, `G = W^H G_ant W`.
//!
//! It whitens the eigenproblem in [`crate::processor`].

use ndarray::prelude::*;
use rayon::prelude::*;
use thiserror::Error;

use crate::{c64, constants::TAU, math::sinc};

#[derive(Error, Debug)]
pub enum GramError {
    #[error("Antenna positions must have 3 columns, but got {0}")]
    PositionColumns(usize),

    #[error("There are {positions} antenna positions but the beamforming weights have {weights} rows")]
    Shape { positions: usize, weights: usize },

    #[error("The wavelength must be positive and finite, but got {0}")]
    BadWavelength(f64),
}

/// Compute the Gram matrix of the beams formed by `weights` (`N_antenna` x
/// `N_beam`) from antennas at `positions` (`N_antenna` x 3, metres) at
/// `wavelength` (metres). The result is `N_beam` x `N_beam`, Hermitian and
/// positive semi-definite.
pub fn gram_matrix(
    positions: ArrayView2<f64>,
    weights: ArrayView2<c64>,
    wavelength: f64,
) -> Result<Array2<c64>, GramError> {
    if positions.len_of(Axis(1)) != 3 {
        return Err(GramError::PositionColumns(positions.len_of(Axis(1))));
    }
    let num_antennas = positions.len_of(Axis(0));
    if weights.len_of(Axis(0)) != num_antennas {
        return Err(GramError::Shape {
            positions: num_antennas,
            weights: weights.len_of(Axis(0)),
        });
    }
    if !(wavelength > 0.0 && wavelength.is_finite()) {
        return Err(GramError::BadWavelength(wavelength));
    }

    let k = TAU / wavelength;
    let mut g_ant = Array2::<c64>::zeros((num_antennas, num_antennas));
    g_ant
        .outer_iter_mut()
        .into_par_iter()
        .enumerate()
        .for_each(|(a, mut row)| {
            let p_a = positions.row(a);
            for (b, g) in row.iter_mut().enumerate() {
                let p_b = positions.row(b);
                let dist = (&p_a - &p_b).mapv(|d| d * d).sum().sqrt();
                *g = c64::new(2.0 * TAU * sinc(k * dist), 0.0);
            }
        });

    let w_h = weights.t().mapv(|z| z.conj());
    Ok(w_h.dot(&g_ant).dot(&weights))
}
