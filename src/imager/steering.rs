// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Steering tensors of corotating antenna layouts.

use std::f64::consts::TAU;

use ndarray::{prelude::*, Zip};

use crate::{
    c64,
    constants::POSITION_TOLERANCE,
    frame::{radial_distance, SynthesisFrame},
    math::{cexp, unit_vector},
};

/// The phase of every antenna of a corotating layout towards every
/// (row, window sample) direction of a frame, `exp(-j k <r(θ_q, ψ_l), c_a>)`.
///
/// For an instrument that turns with the frame (e.g. an Earth-bound array with
/// the default rotation axis) the corotating layout is the same for every
/// snapshot, so the tensor is computed once.
#[derive(Debug)]
pub(super) struct SteeringCache {
    /// (antennas, 3), metres.
    layout: Array2<f64>,
    wavelength: f64,
    /// (rows, window samples, antennas)
    pub(super) tensor: Array3<c64>,
    /// The highest longitude frequency \[radians⁻¹\] of the layout's kernel.
    pub(super) harmonic_limit: f64,
}

impl SteeringCache {
    pub(super) fn new(frame: &SynthesisFrame, layout: Array2<f64>, wavelength: f64) -> SteeringCache {
        let k = TAU / wavelength;
        let colatitudes = frame.grid().colatitudes();
        let n_fs = frame.n_fs();
        let psi0 = frame.window_origin();
        let step = frame.period() / n_fs as f64;

        let directions = Array3::from_shape_fn((colatitudes.len(), n_fs, 3), |(q, l, i)| {
            unit_vector(colatitudes[q], psi0 + step * l as f64)[i]
        });
        let mut tensor = Array3::zeros((colatitudes.len(), n_fs, layout.len_of(Axis(0))));
        Zip::indexed(&mut tensor).par_for_each(|(q, l, a), t| {
            let r = directions.slice(s![q, l, ..]);
            let c = layout.row(a);
            *t = cexp(-k * r.dot(&c));
        });

        // The kernel |E|^2 mixes pairs of antennas; its longitude spectrum on
        // a row of colatitude θ extends to k sin θ times the largest distance
        // between two antennas perpendicular to the rotation axis.
        let mut d_xy: f64 = 0.0;
        for (a, p_a) in layout.outer_iter().enumerate() {
            for p_b in layout.outer_iter().skip(a + 1) {
                let d = [p_a[0] - p_b[0], p_a[1] - p_b[1], 0.0];
                d_xy = d_xy.max(radial_distance(&d));
            }
        }
        let max_sin = colatitudes.iter().fold(0.0_f64, |acc, t| acc.max(t.sin()));

        SteeringCache {
            layout,
            wavelength,
            tensor,
            harmonic_limit: k * d_xy * max_sin,
        }
    }

    /// Can this tensor be used for `layout`?
    pub(super) fn matches(&self, layout: ArrayView2<f64>, wavelength: f64) -> bool {
        self.wavelength == wavelength
            && self.layout.dim() == layout.dim()
            && self
                .layout
                .iter()
                .zip(layout.iter())
                .all(|(a, b)| ((a - b) / wavelength).abs() <= POSITION_TOLERANCE)
    }
}
