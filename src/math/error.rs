// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Errors associated with eigendecompositions.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum EigenError {
    #[error("Expected a square matrix, but got one with {rows} rows and {cols} columns")]
    NotSquare { rows: usize, cols: usize },

    #[error("The matrix pencil has mismatched dimensions: {a} vs. {b}")]
    DimensionMismatch { a: usize, b: usize },

    #[error("The matrix contains NaN or infinite values")]
    NonFinite,

    #[error("The eigendecomposition of a {size}x{size} Hermitian matrix did not converge")]
    NoConvergence { size: usize },
}
