// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! User arguments and the validated parameters derived from them.
//!
//! [`BluebildArgs`] is what a caller (or an argument file) specifies; every
//! field is optional. [`BluebildArgs::parse`] checks the arguments, fills in
//! defaults and converts units, producing [`BluebildParams`].

mod error;

pub use error::ParamsError;

use log::debug;
use marlu::RADec;
use serde::{Deserialize, Serialize};

use crate::constants::{
    DEFAULT_KERNEL_HALF_WIDTH, DEFAULT_SIGMA, EARTH_ROTATION_RATE, TAU, VEL_C,
};

pub const DEFAULT_NUM_LEVELS: usize = 4;
pub const DEFAULT_ESTIMATOR_STRIDE: usize = 200;
pub const DEFAULT_IMAGING_STRIDE: usize = 1;
pub const DEFAULT_SENSITIVITY_STRIDE: usize = 50;

/// Arguments for imaging. Angles are in degrees.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BluebildArgs {
    /// The observing wavelength \[metres\]. Conflicts with `frequency`.
    pub wavelength: Option<f64>,

    /// The observing frequency \[Hz\]. Conflicts with `wavelength`.
    pub frequency: Option<f64>,

    /// The right ascension of the field centre \[degrees\].
    pub ra: Option<f64>,

    /// The declination of the field centre \[degrees\].
    pub dec: Option<f64>,

    /// The diameter of the imaged field \[degrees\].
    pub field_of_view: Option<f64>,

    /// The pixel spacing \[degrees\]. If not given, the array's Nyquist
    /// resolution is used.
    pub angular_resolution: Option<f64>,

    /// The half-width of the synthesis kernel's guard band \[degrees\].
    /// Default: 10
    pub kernel_half_width: Option<f64>,

    /// \[radians per second\]. Default: the Earth's sidereal rate.
    pub rotation_rate: Option<f64>,

    /// The instrument's rotation axis in instrument coordinates. Default: +Z.
    pub rotation_axis: Option<[f64; 3]>,

    /// Use this many Fourier-series coefficients instead of the computed
    /// number.
    pub n_fs: Option<usize>,

    /// The number of energy levels of the intensity field. Default: 4
    pub num_levels: Option<usize>,

    /// The fraction of eigenvalue energy to image. Default: 0.95
    pub sigma: Option<f64>,

    /// Use every n-th snapshot to estimate intensity parameters. Default: 200
    pub estimator_stride: Option<usize>,

    /// Image every n-th snapshot of the intensity field. Default: 1
    pub imaging_stride: Option<usize>,

    /// Use every n-th snapshot to estimate sensitivity parameters.
    /// Default: 200
    pub sensitivity_estimator_stride: Option<usize>,

    /// Image every n-th snapshot of the sensitivity field. Default: 50
    pub sensitivity_stride: Option<usize>,

    /// Show progress bars.
    pub draw_progress_bar: bool,
}

impl BluebildArgs {
    pub fn from_toml_str(s: &str) -> Result<BluebildArgs, ParamsError> {
        debug!("Parsing toml arguments...");
        toml::from_str(s).map_err(|e| ParamsError::TomlDecode(e.to_string()))
    }

    pub fn from_json_str(s: &str) -> Result<BluebildArgs, ParamsError> {
        debug!("Parsing json arguments...");
        serde_json::from_str(s).map_err(|e| ParamsError::JsonDecode(e.to_string()))
    }

    pub fn parse(self) -> Result<BluebildParams, ParamsError> {
        // Ensure all of the args are accounted for by pattern matching.
        let BluebildArgs {
            wavelength,
            frequency,
            ra,
            dec,
            field_of_view,
            angular_resolution,
            kernel_half_width,
            rotation_rate,
            rotation_axis,
            n_fs,
            num_levels,
            sigma,
            estimator_stride,
            imaging_stride,
            sensitivity_estimator_stride,
            sensitivity_stride,
            draw_progress_bar,
        } = self;

        let wavelength = match (wavelength, frequency) {
            (Some(_), Some(_)) => return Err(ParamsError::WavelengthAndFrequency),
            (Some(l), None) => positive("wavelength", l)?,
            (None, Some(f)) => VEL_C / positive("frequency", f)?,
            (None, None) => return Err(ParamsError::Missing("wavelength or frequency")),
        };

        let ra = finite(
            "right ascension",
            ra.ok_or(ParamsError::Missing("right ascension"))?,
        )?;
        let dec = finite("declination", dec.ok_or(ParamsError::Missing("declination"))?)?;
        if dec.abs() > 90.0 {
            return Err(ParamsError::Invalid {
                name: "declination",
                value: dec,
            });
        }

        let fov_deg = positive(
            "field of view",
            field_of_view.ok_or(ParamsError::Missing("field of view"))?,
        )?;
        if fov_deg > 360.0 {
            return Err(ParamsError::Invalid {
                name: "field of view",
                value: fov_deg,
            });
        }
        let field_of_view = fov_deg.to_radians().min(TAU);
        let angular_resolution = angular_resolution
            .map(|r| positive("angular resolution", r).map(f64::to_radians))
            .transpose()?;
        let kernel_half_width = kernel_half_width
            .map(|k| positive("kernel half-width", k).map(f64::to_radians))
            .transpose()?
            .unwrap_or(DEFAULT_KERNEL_HALF_WIDTH);
        let rotation_rate = finite(
            "rotation rate",
            rotation_rate.unwrap_or(EARTH_ROTATION_RATE),
        )?;
        let rotation_axis = rotation_axis.unwrap_or([0.0, 0.0, 1.0]);

        if let Some(n) = n_fs {
            if n % 2 == 0 {
                return Err(ParamsError::BadBandwidth(n));
            }
        }
        let num_levels = num_levels.unwrap_or(DEFAULT_NUM_LEVELS);
        if num_levels == 0 {
            return Err(ParamsError::ZeroLevels);
        }
        let sigma = positive("sigma", sigma.unwrap_or(DEFAULT_SIGMA))?;

        let stride = |name, s: Option<usize>, default| match s.unwrap_or(default) {
            0 => Err(ParamsError::ZeroStride(name)),
            s => Ok(s),
        };

        Ok(BluebildParams {
            wavelength,
            field_centre: RADec::from_degrees(ra, dec),
            field_of_view,
            angular_resolution,
            kernel_half_width,
            rotation_rate,
            rotation_axis,
            n_fs,
            num_levels,
            sigma,
            estimator_stride: stride(
                "estimator stride",
                estimator_stride,
                DEFAULT_ESTIMATOR_STRIDE,
            )?,
            imaging_stride: stride("imaging stride", imaging_stride, DEFAULT_IMAGING_STRIDE)?,
            sensitivity_estimator_stride: stride(
                "sensitivity estimator stride",
                sensitivity_estimator_stride,
                DEFAULT_ESTIMATOR_STRIDE,
            )?,
            sensitivity_stride: stride(
                "sensitivity stride",
                sensitivity_stride,
                DEFAULT_SENSITIVITY_STRIDE,
            )?,
            draw_progress_bar,
        })
    }
}

fn finite(name: &'static str, value: f64) -> Result<f64, ParamsError> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(ParamsError::Invalid { name, value })
    }
}

fn positive(name: &'static str, value: f64) -> Result<f64, ParamsError> {
    if value > 0.0 && value.is_finite() {
        Ok(value)
    } else {
        Err(ParamsError::Invalid { name, value })
    }
}

/// Validated imaging parameters. Angles are in radians.
#[derive(Debug, Clone)]
pub struct BluebildParams {
    /// \[metres\]
    pub wavelength: f64,
    pub field_centre: RADec,
    pub field_of_view: f64,
    /// `None` means the array's Nyquist resolution.
    pub angular_resolution: Option<f64>,
    pub kernel_half_width: f64,
    /// \[radians per second\]
    pub rotation_rate: f64,
    pub rotation_axis: [f64; 3],
    pub n_fs: Option<usize>,
    pub num_levels: usize,
    pub sigma: f64,
    pub estimator_stride: usize,
    pub imaging_stride: usize,
    pub sensitivity_estimator_stride: usize,
    pub sensitivity_stride: usize,
    pub draw_progress_bar: bool,
}
