// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

/*!
Radio-interferometric imaging with the Bluebild periodic-synthesis algorithm.

Snapshots of beamformed visibilities are decomposed into eigen-components
relative to the array's Gram matrix, bucketed into energy levels and
accumulated as longitude Fourier series in a frame that corotates with the
instrument. The series are evaluated on the pixel grid only once, when the
images are finalised.

The typical flow is:
1. [`estimate`]: run a parameter estimator over a subsample of snapshots;
2. [`frame`]: build the synthesis frame, pixel grid and Fourier bandwidth;
3. [`processor`]: eigendecompose every snapshot;
4. [`imager`]: accumulate every snapshot, then finalise into images.

[`pipeline`] wires these steps together for a [`pipeline::SnapshotSource`].
 */

pub mod constants;
pub mod estimate;
pub mod frame;
pub mod gram;
pub mod image;
pub mod imager;
pub(crate) mod math;
pub(crate) mod messages;
pub mod params;
pub mod pipeline;
pub mod processor;

// Re-exports.
pub use estimate::{
    EstimatorError, IntensityFieldParameterEstimator, IntensityParameters,
    SensitivityFieldParameterEstimator,
};
pub use frame::{
    nyquist_rate, nyquist_resolution, BandwidthInsufficiency, FrameBuilder, FrameError,
    PixelGrid, SynthesisFrame,
};
pub use gram::{gram_matrix, GramError};
pub use image::{ImageContainer, ImageError, SynthesisImages};
pub use imager::{
    ImagerCheckpoint, ImagerError, ImagerState, PeriodicSynthesisImager, SynthesisFloat,
};
pub use math::EigenError;
pub use params::{BluebildArgs, BluebildParams, ParamsError};
pub use pipeline::{
    BluebildOutput, IntensityOutput, PipelineError, SensitivityOutput, Snapshot, SnapshotError,
    SnapshotSource,
};
pub use processor::{
    assign_clusters, Degeneracy, EigenComponents, IntensityFieldDataProcessor, ProcessorError,
    SensitivityFieldDataProcessor,
};

// External re-exports.
pub use hifitime::{Duration, Epoch};
pub use marlu::{c64, RADec};
