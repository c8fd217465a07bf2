// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Errors associated with periodic-synthesis imaging.

use hifitime::Epoch;
use thiserror::Error;

use crate::image::ImageError;

#[derive(Error, Debug)]
pub enum ImagerError {
    #[error("The imager has already been finalised; no more snapshots can be accumulated")]
    Finalised,

    #[error("No snapshots have been accumulated; there is nothing to image")]
    NothingAccumulated,

    #[error("Snapshot at {timestamp} is outside the synthesis frame's observation")]
    OutsideObservation { timestamp: Epoch },

    #[error("Expected {what} to be {expected}, but got {got}")]
    Shape {
        what: &'static str,
        expected: usize,
        got: usize,
    },

    #[error("Cluster index {index} is not a valid energy level (there are {n_level})")]
    ClusterIndex { index: usize, n_level: usize },

    #[error("Eigenvalues, eigenvectors, antenna positions and weights must all be finite")]
    NonFinite,

    #[error("The wavelength must be positive and finite, but got {0}")]
    BadWavelength(f64),

    #[error("The number of energy levels must be at least 1")]
    ZeroLevels,

    #[error("Imagers (or checkpoints) with different configurations cannot be combined")]
    Mismatch,

    #[error(transparent)]
    Image(#[from] ImageError),
}
