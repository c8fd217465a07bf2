// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Fourier series in longitude.
//!
//! A function sampled at `ψ_l = ψ0 + l T / N` (`l = 0..N`, `N` odd) is
//! represented by the coefficients `C_n`, `|n| <= (N - 1) / 2`, of
//! `f(ψ) = Σ_n C_n exp(j 2π n (ψ - ψ0) / T)`. Coefficients are stored in FFT
//! order: index `m` holds harmonic `m` for `m <= N / 2` and `m - N` otherwise.

use std::{f64::consts::TAU, fmt, sync::Arc};

use ndarray::prelude::*;
use rustfft::{Fft, FftPlanner, Length};

use crate::{c64, frame::SynthesisFrame, math::cexp};

/// The planned forward FFT and window taper of a frame's longitude samples.
/// Both only depend on the frame, so they are made once per imager and shared
/// by its forks.
#[derive(Clone)]
pub(super) struct SeriesPlan {
    pub(super) fft: Arc<dyn Fft<f64>>,
    /// The taper at each window sample.
    pub(super) taper: Vec<f64>,
}

impl SeriesPlan {
    pub(super) fn new(frame: &SynthesisFrame) -> SeriesPlan {
        let n_fs = frame.n_fs();
        let psi0 = frame.window_origin();
        let step = frame.period() / n_fs as f64;
        SeriesPlan {
            fft: FftPlanner::new().plan_fft_forward(n_fs),
            taper: (0..n_fs).map(|l| frame.taper(psi0 + step * l as f64)).collect(),
        }
    }
}

impl fmt::Debug for SeriesPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SeriesPlan")
            .field("len", &self.fft.len())
            .finish_non_exhaustive()
    }
}

/// The harmonic stored at FFT index `m` of an `n_fs`-long series.
#[inline]
pub(super) fn harmonic(m: usize, n_fs: usize) -> f64 {
    if m <= n_fs / 2 {
        m as f64
    } else {
        m as f64 - n_fs as f64
    }
}

/// Turn samples into Fourier-series coefficients in place, then delay the
/// series by `shift` radians (i.e. `f(ψ)` becomes `f(ψ - shift)`).
pub(super) fn samples_to_series(samples: &mut [c64], fft: &dyn Fft<f64>, shift: f64, period: f64) {
    let n_fs = samples.len();
    fft.process(samples);
    let norm = (n_fs as f64).recip();
    for (m, c) in samples.iter_mut().enumerate() {
        *c *= cexp(-TAU * harmonic(m, n_fs) * shift / period) * norm;
    }
}

/// Evaluate the real part of a series at each of `longitudes`.
pub(super) fn evaluate(
    coeffs: ArrayView1<c64>,
    window_origin: f64,
    period: f64,
    longitudes: ArrayView1<f64>,
) -> Array1<f64> {
    let n_fs = coeffs.len();
    longitudes.mapv(|phi| {
        let x = TAU * (phi - window_origin) / period;
        coeffs
            .iter()
            .enumerate()
            .map(|(m, c)| (c * cexp(harmonic(m, n_fs) * x)).re)
            .sum()
    })
}
