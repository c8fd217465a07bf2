// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Errors associated with parameter estimation.

use thiserror::Error;

use crate::math::EigenError;

#[derive(Error, Debug)]
pub enum EstimatorError {
    #[error("The number of energy levels must be at least 1")]
    ZeroLevels,

    #[error("The significance threshold must be positive and finite, but got {0}")]
    BadSigma(f64),

    #[error("Covariance matrix is {covariance:?} but the Gram matrix is {gram:?}; both must be square and the same size")]
    Shape {
        covariance: (usize, usize),
        gram: (usize, usize),
    },

    #[error("Cannot merge estimators with different settings")]
    Mismatch,

    #[error("No snapshots were collected; cannot infer parameters")]
    NoData,

    #[error(transparent)]
    Eigen(#[from] EigenError),
}
