// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Errors associated with user arguments.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ParamsError {
    #[error("Couldn't decode toml structure:\n{0}")]
    TomlDecode(String),

    #[error("Couldn't decode json structure:\n{0}")]
    JsonDecode(String),

    #[error("No {0} was specified")]
    Missing(&'static str),

    #[error("Only one of the wavelength and the frequency may be specified")]
    WavelengthAndFrequency,

    #[error("Invalid {name}: {value}")]
    Invalid { name: &'static str, value: f64 },

    #[error("The number of energy levels must be at least 1")]
    ZeroLevels,

    #[error("The {0} must be at least 1")]
    ZeroStride(&'static str),

    #[error("The number of Fourier-series coefficients must be odd and positive, but got {0}")]
    BadBandwidth(usize),
}
