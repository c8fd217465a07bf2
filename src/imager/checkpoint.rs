// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Persisting accumulator state.

use ndarray::prelude::*;
use num_complex::Complex;
use serde::{Deserialize, Serialize};

use super::SynthesisFloat;
use crate::frame::BandwidthInsufficiency;

/// Everything needed to resume an imaging pass: the accumulated Fourier-series
/// coefficients and enough of the imager's configuration to refuse restoring
/// into a differently configured imager.
///
/// Checkpoints are serde-serialisable; how (and where) they are written is up
/// to the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(bound = "")]
pub struct ImagerCheckpoint<F: SynthesisFloat> {
    pub(super) wavelength: f64,
    pub(super) n_level: usize,
    pub(super) n_fs: usize,
    pub(super) grid_shape: (usize, usize),
    pub(super) period: f64,
    pub(super) window_origin: f64,

    /// The number of snapshots accumulated so far.
    pub num_snapshots: usize,

    /// The index of the next snapshot to read, if the caller tracks one.
    pub cursor: Option<usize>,

    pub(super) weighted: Array3<Complex<F>>,
    pub(super) response: Array3<Complex<F>>,
    pub(super) bandwidth_insufficiency: Option<BandwidthInsufficiency>,
}

impl<F: SynthesisFloat> ImagerCheckpoint<F> {
    pub fn with_cursor(mut self, cursor: usize) -> Self {
        self.cursor = Some(cursor);
        self
    }
}
