// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Hermitian and generalised Hermitian eigendecompositions.
//!
//! The dense decompositions are done by [`nalgebra::SymmetricEigen`];
//! everything else in the crate works with [`ndarray`] arrays, so matrices are
//! converted at this boundary.

use itertools::Itertools;
use log::trace;
use nalgebra::{DMatrix, SymmetricEigen};
use ndarray::prelude::*;

use super::EigenError;
use crate::{c64, constants::GRAM_RCOND};

/// The eigendecomposition of a Hermitian matrix. Eigenvalues are in descending
/// order, and the eigenvectors are the corresponding columns of `vectors`.
#[derive(Debug, Clone)]
pub(crate) struct HermitianEigen {
    pub(crate) values: Array1<f64>,
    pub(crate) vectors: Array2<c64>,
}

/// The solution of the generalised eigenproblem `A v = λ B v`, where `A` is
/// Hermitian and `B` is Hermitian positive semi-definite.
///
/// Only the `rank` directions in which `B` is numerically non-singular are
/// solved for; the eigenvectors are orthonormal with respect to `B`
/// (`V^H B V = I`).
#[derive(Debug, Clone)]
pub(crate) struct GeneralisedEigen {
    /// Descending eigenvalues.
    pub(crate) values: Array1<f64>,
    /// One eigenvector per column.
    pub(crate) vectors: Array2<c64>,
    /// The numerical rank of `B`.
    pub(crate) rank: usize,
}

impl GeneralisedEigen {
    /// Was `B` rank deficient?
    pub(crate) fn is_degenerate(&self) -> bool {
        self.rank < self.vectors.len_of(Axis(0))
    }
}

fn check_square(m: ArrayView2<c64>) -> Result<usize, EigenError> {
    let (rows, cols) = m.dim();
    if rows != cols {
        return Err(EigenError::NotSquare { rows, cols });
    }
    if m.iter().any(|z| !z.re.is_finite() || !z.im.is_finite()) {
        return Err(EigenError::NonFinite);
    }
    Ok(rows)
}

/// Eigendecompose a Hermitian matrix. The matrix is symmetrised first, so
/// slightly non-Hermitian input (e.g. from rounding) is tolerated.
pub(crate) fn hermitian_eigh(m: ArrayView2<c64>) -> Result<HermitianEigen, EigenError> {
    let n = check_square(m)?;
    if n == 0 {
        return Ok(HermitianEigen {
            values: Array1::zeros(0),
            vectors: Array2::zeros((0, 0)),
        });
    }

    let sym = DMatrix::from_fn(n, n, |i, j| (m[(i, j)] + m[(j, i)].conj()).scale(0.5));
    let eig = SymmetricEigen::try_new(sym, f64::EPSILON, 0)
        .ok_or(EigenError::NoConvergence { size: n })?;

    // nalgebra doesn't sort its eigenvalues.
    let order = (0..n)
        .sorted_by(|&a, &b| eig.eigenvalues[b].total_cmp(&eig.eigenvalues[a]))
        .collect::<Vec<_>>();
    let values = order.iter().map(|&i| eig.eigenvalues[i]).collect();
    let vectors = Array2::from_shape_fn((n, n), |(r, c)| eig.eigenvectors[(r, order[c])]);
    Ok(HermitianEigen { values, vectors })
}

/// Solve `A v = λ B v`.
///
/// `B` is eigendecomposed as `U Γ U^H`; directions with `γ <= GRAM_RCOND *
/// γ_max` are discarded. With `P = U_r Γ_r^{-1/2}`, the reduced standard
/// problem `P^H A P = Y M Y^H` gives the eigenvalues `M` and eigenvectors
/// `V = P Y`.
pub(crate) fn generalised_eigh(
    a: ArrayView2<c64>,
    b: ArrayView2<c64>,
) -> Result<GeneralisedEigen, EigenError> {
    let n_a = check_square(a)?;
    let n_b = check_square(b)?;
    if n_a != n_b {
        return Err(EigenError::DimensionMismatch { a: n_a, b: n_b });
    }

    let g = hermitian_eigh(b)?;
    let gamma_max = g.values.first().copied().unwrap_or(0.0);
    let rank = if gamma_max > 0.0 {
        g.values
            .iter()
            .take_while(|&&gamma| gamma > GRAM_RCOND * gamma_max)
            .count()
    } else {
        0
    };
    trace!("Generalised eigenproblem: {n_a}x{n_a}, rank {rank}");
    if rank == 0 {
        return Ok(GeneralisedEigen {
            values: Array1::zeros(0),
            vectors: Array2::zeros((n_a, 0)),
            rank,
        });
    }

    let mut p = g.vectors.slice(s![.., ..rank]).to_owned();
    for (mut col, &gamma) in p.axis_iter_mut(Axis(1)).zip(g.values.iter()) {
        let scale = gamma.sqrt().recip();
        col.mapv_inplace(|z| z.scale(scale));
    }
    let p_h = p.t().mapv(|z| z.conj());
    let reduced = p_h.dot(&a).dot(&p);
    let y = hermitian_eigh(reduced.view())?;

    Ok(GeneralisedEigen {
        values: y.values,
        vectors: p.dot(&y.vectors),
        rank,
    })
}
