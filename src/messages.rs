// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Messages to report to the user.
//!
//! When unpacking input data, beamforming and imaging, it's useful to report
//! the set-up in a consistent way. These structs are consumed by their
//! `print` methods, which log at the `info` level.

use log::{info, warn};

use crate::{
    constants::VEL_C,
    estimate::IntensityParameters,
    frame::{BandwidthInsufficiency, SynthesisFrame},
};

#[must_use = "This struct must be consumed with its print() method"]
pub(crate) struct FrameDetails<'a> {
    pub(crate) frame: &'a SynthesisFrame,
    /// \[metres\]
    pub(crate) wavelength: f64,
    pub(crate) num_snapshots: usize,
    /// Was the pixel spacing derived from the array's Nyquist rate?
    pub(crate) nyquist: bool,
}

impl FrameDetails<'_> {
    pub(crate) fn print(self) {
        let FrameDetails {
            frame,
            wavelength,
            num_snapshots,
            nyquist,
        } = self;

        let centre = frame.field_centre();
        info!(
            "Field centre (J2000):  {:>9.4}°, {:>8.4}°",
            centre.ra.to_degrees(),
            centre.dec.to_degrees(),
        );
        info!(
            "Wavelength:            {wavelength:.4} m ({:.4} MHz)",
            VEL_C / wavelength / 1e6
        );
        let span = frame.obs_end() - frame.obs_start();
        info!(
            "Observation:           {num_snapshots} snapshots from {} to {} ({span})",
            frame.obs_start(),
            frame.obs_end(),
        );
        info!(
            "Rotation rate:         {:.6e} rad/s (the instrument turns {:.4}°)",
            frame.rotation_rate(),
            (frame.rotation_rate() * span.to_seconds()).abs().to_degrees()
        );

        let grid = frame.grid();
        let (rows, cols) = grid.shape();
        info!(
            "Pixel grid:            {rows} x {cols} pixels, {:.4}° spacing{}",
            grid.spacing().to_degrees(),
            if nyquist { " (Nyquist)" } else { "" }
        );
        info!(
            "Kernel half-width:     {:.4}°",
            frame.kernel_half_width().to_degrees()
        );
        if frame.is_periodic() {
            info!("Longitude window:      full circle");
        } else {
            info!(
                "Longitude window:      {:.4}° from {:.4}°",
                frame.period().to_degrees(),
                frame.window_origin().to_degrees()
            );
        }
        info!(
            "Fourier coefficients:  {} (at least {} needed)",
            frame.n_fs(),
            frame.required_n_fs()
        );
    }
}

#[must_use = "This struct must be consumed with its print() method"]
pub(crate) struct IntensityParameterDetails<'a> {
    pub(crate) parameters: &'a IntensityParameters,
    pub(crate) num_snapshots: usize,
}

impl IntensityParameterDetails<'_> {
    pub(crate) fn print(self) {
        info!(
            "Intensity field: imaging {} eigen-components per snapshot (from {} snapshots)",
            self.parameters.eigen_count, self.num_snapshots
        );
        for (i, c) in self.parameters.centroids.iter().enumerate() {
            info!("    level {i}: centroid {c:.6e}");
        }
    }
}

#[must_use = "This struct must be consumed with its print() method"]
pub(crate) struct ImagingSummary {
    pub(crate) field: &'static str,
    pub(crate) num_snapshots: usize,
    /// If this is `None`, degeneracy isn't reported.
    pub(crate) degenerate_snapshots: Option<usize>,
    pub(crate) bandwidth_insufficiency: Option<BandwidthInsufficiency>,
}

impl ImagingSummary {
    pub(crate) fn print(self) {
        info!(
            "Imaged the {} field from {} snapshots",
            self.field, self.num_snapshots
        );
        if let Some(n) = self.degenerate_snapshots.filter(|&n| n > 0) {
            warn!(
                "{n} of {} snapshots had rank-deficient Gram matrices",
                self.num_snapshots
            );
        }
        if let Some(BandwidthInsufficiency {
            required,
            available,
        }) = self.bandwidth_insufficiency
        {
            warn!(
                "The {} images used {available} Fourier coefficients but {required} were needed; expect aliasing",
                self.field
            );
        }
    }
}
