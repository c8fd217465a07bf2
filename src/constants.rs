// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

/*!
Useful constants.

All constants *must* be double precision. Accumulators may be stored in single
precision, but every calculation is done in double precision first.
 */

pub use std::f64::consts::{FRAC_PI_2, PI, TAU};

pub use marlu::constants::VEL_C;

/// The sidereal rotation rate of the Earth \[radians per second\]. This is the
/// default rate at which an instrument's antennas rotate about the synthesis
/// frame's Z axis.
pub const EARTH_ROTATION_RATE: f64 = 7.292_115_0e-5;

/// The default fraction of eigenvalue energy that the parameter estimators
/// consider to be "signal".
pub const DEFAULT_SIGMA: f64 = 0.95;

/// The default half-width of the synthesis kernel's guard band \[radians\]
/// (10 degrees).
pub const DEFAULT_KERNEL_HALF_WIDTH: f64 = 10.0 * PI / 180.0;

/// Gram-matrix eigenvalues smaller than this fraction of the largest
/// eigenvalue are treated as zero; the corresponding directions are dropped
/// from the generalised eigenproblem.
pub const GRAM_RCOND: f64 = 1e-10;

/// Two antenna layouts whose coordinates agree to within this many wavelengths
/// share a cached steering tensor.
pub const POSITION_TOLERANCE: f64 = 1e-6;

/// The relative tolerance of the floating-point configuration stored in an
/// imager checkpoint (wavelength and longitude window). Text formats may not
/// round-trip these exactly.
pub const CHECKPOINT_TOLERANCE: f64 = 1e-12;

/// Least-squares pixels whose kernel response is smaller than this fraction of
/// the level's largest response are set to zero.
pub const RESPONSE_FLOOR: f64 = 1e-10;

/// The maximum number of Lloyd iterations used when clustering eigenvalues.
pub const MAX_KMEANS_ITERATIONS: usize = 100;
