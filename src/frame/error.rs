// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Errors associated with building synthesis frames.

use hifitime::Epoch;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FrameError {
    #[error("The observation ends ({end}) before it starts ({start})")]
    TimeOrder { start: Epoch, end: Epoch },

    #[error("The field of view must be in (0, 2π] radians, but got {0}")]
    BadFieldOfView(f64),

    #[error("The angular resolution must be positive and finite, but got {0}")]
    BadResolution(f64),

    #[error("The kernel half-width must be positive and finite, but got {0}")]
    BadKernelHalfWidth(f64),

    #[error("The rotation rate must be finite, but got {0}")]
    BadRotationRate(f64),

    #[error("The rotation axis {0:?} cannot be normalised")]
    BadRotationAxis([f64; 3]),

    #[error("The field centre is not a finite direction")]
    BadFieldCentre,

    #[error("The number of Fourier-series coefficients must be odd and positive, but got {0}")]
    BadBandwidth(usize),

    #[error("Antenna positions must have 3 columns, but got {0}")]
    PositionColumns(usize),
}
