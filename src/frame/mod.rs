// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

/*!
Synthesis frames.

A synthesis frame is a fixed rotation of instrument coordinates whose Z axis is
the instrument's rotation axis and whose X axis points (in longitude) at the
field centre. In this frame the instrument's antennas turn about Z at a
constant rate, so seen from the antennas the sky only slides along longitude.
That motion is what makes the imaging kernel periodic, and the Fourier series
in [`crate::imager`] exploit it.

The frame also fixes the pixel grid and the longitude window `[ψ0, ψ0 + T)`
over which the kernel is sampled, and from these the number of Fourier-series
coefficients `N_FS`.
 */

mod error;
mod grid;

pub use error::FrameError;
pub use grid::PixelGrid;

use std::f64::consts::{PI, TAU};

use hifitime::Epoch;
use log::{debug, warn};
use marlu::RADec;
use ndarray::prelude::*;
use serde::{Deserialize, Serialize};

use crate::{
    constants::{DEFAULT_KERNEL_HALF_WIDTH, EARTH_ROTATION_RATE},
    math::{cross, dot, mat_vec, normalise, Mat3, Vec3},
};

/// The number of Fourier-series coefficients in use is smaller than the
/// number needed to represent the kernel without aliasing. Images are still
/// produced, but lose fidelity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BandwidthInsufficiency {
    pub required: usize,
    pub available: usize,
}

/// Collects the settings of a [`SynthesisFrame`].
#[derive(Debug, Clone)]
pub struct FrameBuilder {
    field_centre: RADec,
    obs_start: Epoch,
    obs_end: Epoch,
    field_of_view: f64,
    angular_resolution: f64,
    rotation_axis: [f64; 3],
    rotation_rate: f64,
    kernel_half_width: f64,
}

impl FrameBuilder {
    /// `field_of_view` is the diameter of the imaged cap and
    /// `angular_resolution` the pixel spacing, both in radians. The rotation
    /// axis defaults to +Z (the celestial pole), the rotation rate to the
    /// Earth's sidereal rate and the kernel half-width to 10 degrees.
    pub fn new(
        field_centre: RADec,
        obs_start: Epoch,
        obs_end: Epoch,
        field_of_view: f64,
        angular_resolution: f64,
    ) -> FrameBuilder {
        FrameBuilder {
            field_centre,
            obs_start,
            obs_end,
            field_of_view,
            angular_resolution,
            rotation_axis: [0.0, 0.0, 1.0],
            rotation_rate: EARTH_ROTATION_RATE,
            kernel_half_width: DEFAULT_KERNEL_HALF_WIDTH,
        }
    }

    pub fn rotation_axis(mut self, axis: [f64; 3]) -> Self {
        self.rotation_axis = axis;
        self
    }

    /// \[radians per second\]
    pub fn rotation_rate(mut self, rate: f64) -> Self {
        self.rotation_rate = rate;
        self
    }

    /// \[radians\]
    pub fn kernel_half_width(mut self, half_width: f64) -> Self {
        self.kernel_half_width = half_width;
        self
    }

    pub fn build(self) -> Result<SynthesisFrame, FrameError> {
        let FrameBuilder {
            field_centre,
            obs_start,
            obs_end,
            field_of_view,
            angular_resolution,
            rotation_axis,
            rotation_rate,
            kernel_half_width,
        } = self;

        if obs_end < obs_start {
            return Err(FrameError::TimeOrder {
                start: obs_start,
                end: obs_end,
            });
        }
        if !(field_of_view > 0.0 && field_of_view <= TAU) {
            return Err(FrameError::BadFieldOfView(field_of_view));
        }
        if !(angular_resolution > 0.0 && angular_resolution.is_finite()) {
            return Err(FrameError::BadResolution(angular_resolution));
        }
        if !(kernel_half_width > 0.0 && kernel_half_width.is_finite()) {
            return Err(FrameError::BadKernelHalfWidth(kernel_half_width));
        }
        if !rotation_rate.is_finite() {
            return Err(FrameError::BadRotationRate(rotation_rate));
        }

        let z = normalise(&rotation_axis).ok_or(FrameError::BadRotationAxis(rotation_axis))?;
        let (s_ra, c_ra) = field_centre.ra.sin_cos();
        let (s_dec, c_dec) = field_centre.dec.sin_cos();
        let f = [c_dec * c_ra, c_dec * s_ra, s_dec];
        if !f.iter().all(|v| v.is_finite()) {
            return Err(FrameError::BadFieldCentre);
        }
        let centre_colat = dot(&f, &z).clamp(-1.0, 1.0).acos();

        // X' is the field centre with its Z' component removed. If the field
        // centre is on the rotation axis, any perpendicular will do.
        let f_z = dot(&f, &z);
        let x = normalise(&[f[0] - f_z * z[0], f[1] - f_z * z[1], f[2] - f_z * z[2]])
            .or_else(|| {
                let least_aligned = if z[0].abs() < 0.9 {
                    [1.0, 0.0, 0.0]
                } else {
                    [0.0, 1.0, 0.0]
                };
                normalise(&cross(&z, &least_aligned))
            })
            .ok_or(FrameError::BadRotationAxis(rotation_axis))?;
        let y = cross(&z, &x);
        let rotation = [x, y, z];

        let grid = PixelGrid::new(centre_colat, field_of_view, angular_resolution);
        let span = (obs_end - obs_start).to_seconds();
        let delta = grid.spacing();
        let window = grid.longitude_extent() + rotation_rate.abs() * span + 2.0 * kernel_half_width + delta;
        let periodic = grid.is_full_circle() || window >= TAU;
        let period = if periodic { TAU } else { window };

        let mut frame = SynthesisFrame {
            field_centre,
            rotation,
            rotation_rate,
            obs_start,
            obs_end,
            centre_colat,
            kernel_half_width,
            grid,
            period,
            periodic,
            n_fs: 0,
            required_n_fs: 0,
            bandwidth_insufficiency: None,
        };
        frame.required_n_fs = frame.required_bandwidth(frame.grid.order() as f64);
        frame.n_fs = frame.required_n_fs;
        debug!(
            "Synthesis frame: grid {:?}, window {:.3} rad (periodic: {periodic}), N_FS = {}",
            frame.grid.shape(),
            period,
            frame.n_fs
        );
        Ok(frame)
    }
}

/// The rotation, pixel grid and Fourier bandwidth fixed for one observation.
#[derive(Debug, Clone, PartialEq)]
pub struct SynthesisFrame {
    field_centre: RADec,
    /// Rows are the frame's X, Y and Z axes in instrument coordinates.
    rotation: Mat3,
    rotation_rate: f64,
    obs_start: Epoch,
    obs_end: Epoch,
    centre_colat: f64,
    kernel_half_width: f64,
    grid: PixelGrid,
    period: f64,
    periodic: bool,
    n_fs: usize,
    required_n_fs: usize,
    bandwidth_insufficiency: Option<BandwidthInsufficiency>,
}

impl SynthesisFrame {
    /// Use `n_fs` Fourier-series coefficients instead of the computed number.
    /// Fewer than required is allowed, but recorded and warned about.
    pub fn with_bandwidth(mut self, n_fs: usize) -> Result<SynthesisFrame, FrameError> {
        if n_fs == 0 || n_fs % 2 == 0 {
            return Err(FrameError::BadBandwidth(n_fs));
        }
        self.n_fs = n_fs;
        self.bandwidth_insufficiency = if n_fs < self.required_n_fs {
            warn!(
                "Using {n_fs} Fourier-series coefficients, but {} are needed to avoid aliasing",
                self.required_n_fs
            );
            Some(BandwidthInsufficiency {
                required: self.required_n_fs,
                available: n_fs,
            })
        } else {
            None
        };
        Ok(self)
    }

    /// The smallest odd number of Fourier-series coefficients that represents a
    /// kernel whose longitude spectrum extends to `harmonic_limit` (radians⁻¹)
    /// over this frame's window.
    pub(crate) fn required_bandwidth(&self, harmonic_limit: f64) -> usize {
        let taper = if self.periodic {
            0.0
        } else {
            self.period / self.kernel_half_width
        };
        let n = (harmonic_limit * self.period / TAU + taper - 1e-9).ceil().max(0.0) as usize;
        2 * n + 1
    }

    pub fn field_centre(&self) -> RADec {
        self.field_centre
    }

    /// The instrument-to-frame rotation; rows are the frame's axes.
    pub fn rotation(&self) -> Array2<f64> {
        Array2::from_shape_fn((3, 3), |(i, j)| self.rotation[i][j])
    }

    /// Rotate an instrument-frame vector into this frame.
    pub fn to_frame(&self, v: &[f64; 3]) -> [f64; 3] {
        mat_vec(&self.rotation, v)
    }

    pub fn rotation_rate(&self) -> f64 {
        self.rotation_rate
    }

    pub fn obs_start(&self) -> Epoch {
        self.obs_start
    }

    pub fn obs_end(&self) -> Epoch {
        self.obs_end
    }

    /// Is `t` within the observation?
    pub fn contains(&self, t: Epoch) -> bool {
        t >= self.obs_start && t <= self.obs_end
    }

    /// The angle the instrument has turned by at `t`, relative to the middle of
    /// the observation \[radians\].
    pub fn rotation_angle(&self, t: Epoch) -> f64 {
        let span = (self.obs_end - self.obs_start).to_seconds();
        self.rotation_rate * ((t - self.obs_start).to_seconds() - span / 2.0)
    }

    /// The colatitude of the field centre in this frame; its longitude is 0.
    pub fn centre_colatitude(&self) -> f64 {
        self.centre_colat
    }

    pub fn kernel_half_width(&self) -> f64 {
        self.kernel_half_width
    }

    pub fn grid(&self) -> &PixelGrid {
        &self.grid
    }

    /// The length of the longitude window `T` \[radians\].
    pub fn period(&self) -> f64 {
        self.period
    }

    /// The start of the longitude window `ψ0` \[radians\].
    pub fn window_origin(&self) -> f64 {
        if self.periodic {
            -PI
        } else {
            -self.period / 2.0
        }
    }

    /// Does the window cover the whole circle, making the kernel naturally
    /// periodic?
    pub fn is_periodic(&self) -> bool {
        self.periodic
    }

    /// The number of Fourier-series coefficients `N_FS`.
    pub fn n_fs(&self) -> usize {
        self.n_fs
    }

    /// The number of Fourier-series coefficients this frame's grid needs.
    pub fn required_n_fs(&self) -> usize {
        self.required_n_fs
    }

    pub fn bandwidth_insufficiency(&self) -> Option<BandwidthInsufficiency> {
        self.bandwidth_insufficiency
    }

    /// The window taper at longitude `psi`: a raised cosine rising over the
    /// first `T_kernel` of the window and falling over the last, 1 in between.
    /// Periodic frames aren't tapered.
    pub(crate) fn taper(&self, psi: f64) -> f64 {
        if self.periodic {
            return 1.0;
        }
        let x = psi - self.window_origin();
        let edge = x.min(self.period - x);
        if edge >= self.kernel_half_width {
            1.0
        } else if edge <= 0.0 {
            0.0
        } else {
            0.5 * (1.0 - (PI * edge / self.kernel_half_width).cos())
        }
    }
}

/// The number of samples needed along a great circle to resolve the fringes of
/// the given antenna array at `wavelength`, i.e. `ceil(2π D_max / λ)` with
/// `D_max` the largest distance between two antennas.
pub fn nyquist_rate(positions: ArrayView2<f64>, wavelength: f64) -> Result<usize, FrameError> {
    if positions.len_of(Axis(1)) != 3 {
        return Err(FrameError::PositionColumns(positions.len_of(Axis(1))));
    }
    let mut d_max: f64 = 0.0;
    for (a, p_a) in positions.outer_iter().enumerate() {
        for p_b in positions.outer_iter().skip(a + 1) {
            let d = (&p_a - &p_b).mapv(|d| d * d).sum().sqrt();
            d_max = d_max.max(d);
        }
    }
    Ok((TAU * d_max / wavelength).ceil() as usize)
}

/// The angular resolution \[radians\] that makes a grid of order
/// [`nyquist_rate`].
pub fn nyquist_resolution(positions: ArrayView2<f64>, wavelength: f64) -> Result<f64, FrameError> {
    Ok(PI / (nyquist_rate(positions, wavelength)? + 1) as f64)
}

/// The distance of a frame vector from the Z axis.
#[inline]
pub(crate) fn radial_distance(v: &Vec3) -> f64 {
    v[0].hypot(v[1])
}
