// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Errors associated with processing snapshots.

use thiserror::Error;

use crate::math::EigenError;

#[derive(Error, Debug)]
pub enum ProcessorError {
    #[error("Covariance matrix is {covariance:?} but the Gram matrix is {gram:?}; both must be square and the same size")]
    Shape {
        covariance: (usize, usize),
        gram: (usize, usize),
    },

    #[error(transparent)]
    Eigen(#[from] EigenError),
}
