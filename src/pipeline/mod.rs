// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

/*!
Imaging passes over a sequence of snapshots.

Each field (intensity and sensitivity) is imaged in two passes. The first runs
a parameter estimator over a subsample of the snapshots, the second
eigendecomposes the (possibly differently subsampled) snapshots with the
inferred parameters and accumulates them into a periodic-synthesis imager.
Snapshots are read and processed in parallel; every thread accumulates into
its own forked estimator or imager, and these are merged at the end.
 */

mod error;
#[cfg(test)]
mod tests;

pub use error::{PipelineError, SnapshotError};

use hifitime::Epoch;
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use log::{debug, info};
use ndarray::prelude::*;
use rayon::prelude::*;

use crate::{
    c64,
    estimate::{
        IntensityFieldParameterEstimator, IntensityParameters, SensitivityFieldParameterEstimator,
    },
    frame::{nyquist_resolution, BandwidthInsufficiency, FrameBuilder, SynthesisFrame},
    gram::gram_matrix,
    image::SynthesisImages,
    imager::{PeriodicSynthesisImager, SynthesisFloat},
    messages,
    params::BluebildParams,
    processor::{EigenComponents, IntensityFieldDataProcessor, SensitivityFieldDataProcessor},
};

/// Everything needed to image one instant of an observation.
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub timestamp: Epoch,

    /// `N_antenna` x 3 \[metres\], in the instrument coordinates of the field
    /// centre.
    pub antenna_positions: Array2<f64>,

    /// Beamforming weights, `N_antenna` x `N_beam`.
    pub weights: Array2<c64>,

    /// Beamformed visibilities, `N_beam` x `N_beam`.
    pub covariance: Array2<c64>,
}

/// Somewhere snapshots come from, e.g. a measurement set. Snapshots are
/// identified by their index and may be read from several threads at once.
pub trait SnapshotSource: Sync {
    fn num_snapshots(&self) -> usize;

    /// The timestamp of a snapshot. This should be cheap; it's used to
    /// establish the observation span without reading every snapshot.
    fn timestamp(&self, index: usize) -> Epoch;

    fn read(&self, index: usize) -> Result<Snapshot, Box<dyn std::error::Error + Send + Sync>>;
}

/// The result of imaging the intensity field.
#[derive(Debug, Clone)]
pub struct IntensityOutput<F: SynthesisFloat> {
    pub parameters: IntensityParameters,
    pub images: SynthesisImages<F>,
    pub num_snapshots: usize,
    /// The number of imaged snapshots whose Gram matrix was rank deficient.
    pub degenerate_snapshots: usize,
    pub bandwidth_insufficiency: Option<BandwidthInsufficiency>,
}

/// The result of imaging the sensitivity field.
#[derive(Debug, Clone)]
pub struct SensitivityOutput<F: SynthesisFloat> {
    pub eigen_count: usize,
    pub images: SynthesisImages<F>,
    pub num_snapshots: usize,
    pub bandwidth_insufficiency: Option<BandwidthInsufficiency>,
}

/// The results of imaging both fields of an observation.
#[derive(Debug, Clone)]
pub struct BluebildOutput<F: SynthesisFloat> {
    pub frame: SynthesisFrame,
    pub intensity: IntensityOutput<F>,
    pub sensitivity: SensitivityOutput<F>,
    /// The intensity images divided by the sensitivity least-squares image.
    pub normalised: SynthesisImages<F>,
}

/// Build the synthesis frame covering every snapshot of `source`. If no
/// angular resolution is given, the Nyquist resolution of the first
/// snapshot's antenna layout is used.
pub fn build_frame<S: SnapshotSource + ?Sized>(
    source: &S,
    params: &BluebildParams,
) -> Result<SynthesisFrame, PipelineError> {
    let num_snapshots = source.num_snapshots();
    if num_snapshots == 0 {
        return Err(PipelineError::NoSnapshots);
    }
    let (obs_start, obs_end) = (1..num_snapshots).map(|i| source.timestamp(i)).fold(
        (source.timestamp(0), source.timestamp(0)),
        |(start, end), t| (if t < start { t } else { start }, if t > end { t } else { end }),
    );

    let angular_resolution = match params.angular_resolution {
        Some(r) => r,
        None => {
            let snapshot = read_snapshot(source, 0)?;
            nyquist_resolution(snapshot.antenna_positions.view(), params.wavelength)?
        }
    };

    let mut frame = FrameBuilder::new(
        params.field_centre,
        obs_start,
        obs_end,
        params.field_of_view,
        angular_resolution,
    )
    .rotation_axis(params.rotation_axis)
    .rotation_rate(params.rotation_rate)
    .kernel_half_width(params.kernel_half_width)
    .build()?;
    if let Some(n_fs) = params.n_fs {
        frame = frame.with_bandwidth(n_fs)?;
    }

    messages::FrameDetails {
        frame: &frame,
        wavelength: params.wavelength,
        num_snapshots,
        nyquist: params.angular_resolution.is_none(),
    }
    .print();
    Ok(frame)
}

/// Estimate the intensity-field parameters from every
/// `params.estimator_stride`-th snapshot, then image every
/// `params.imaging_stride`-th snapshot.
pub fn run_intensity<F, S>(
    source: &S,
    frame: &SynthesisFrame,
    params: &BluebildParams,
) -> Result<IntensityOutput<F>, PipelineError>
where
    F: SynthesisFloat,
    S: SnapshotSource + ?Sized,
{
    let estimator_indices = stride_indices(source, params.estimator_stride)?;
    let estimator = IntensityFieldParameterEstimator::new(params.num_levels, params.sigma)?;
    let pb = make_progress_bar(
        estimator_indices.len(),
        "Estimating intensity parameters",
        params.draw_progress_bar,
    );
    let estimator = estimator_indices
        .par_iter()
        .try_fold(
            || estimator.fork(),
            |mut estimator, &i| -> Result<_, PipelineError> {
                let snapshot = read_snapshot(source, i)?;
                with_context(source, i, || {
                    let gram = snapshot_gram(&snapshot, params.wavelength)?;
                    estimator.collect(snapshot.covariance.view(), gram.view())?;
                    Ok(())
                })?;
                pb.inc(1);
                Ok(estimator)
            },
        )
        .try_reduce(
            || estimator.fork(),
            |mut a, b| {
                a.merge(b)?;
                Ok::<_, PipelineError>(a)
            },
        )?;
    pb.abandon_with_message("Finished estimating intensity parameters");
    let parameters = estimator.infer_parameters()?;
    messages::IntensityParameterDetails {
        parameters: &parameters,
        num_snapshots: estimator.num_collected(),
    }
    .print();

    let processor = IntensityFieldDataProcessor::from(parameters.clone());
    let imaging_indices = stride_indices(source, params.imaging_stride)?;
    let imager = PeriodicSynthesisImager::<F>::new(params.wavelength, frame, params.num_levels)?;
    let pb = make_progress_bar(
        imaging_indices.len(),
        "Imaging the intensity field",
        params.draw_progress_bar,
    );
    let (mut imager, degenerate_snapshots) = image_snapshots(
        source,
        imager,
        &imaging_indices,
        params.wavelength,
        &pb,
        |covariance, gram| Ok(processor.process(covariance, gram)?),
    )?;
    pb.abandon_with_message("Finished imaging the intensity field");

    let images = imager.as_image()?;
    let output = IntensityOutput {
        parameters,
        images,
        num_snapshots: imager.num_snapshots(),
        degenerate_snapshots,
        bandwidth_insufficiency: imager.bandwidth_insufficiency(),
    };
    messages::ImagingSummary {
        field: "intensity",
        num_snapshots: output.num_snapshots,
        degenerate_snapshots: Some(output.degenerate_snapshots),
        bandwidth_insufficiency: output.bandwidth_insufficiency,
    }
    .print();
    Ok(output)
}

/// Estimate the number of sensitivity-field eigen-components from every
/// `params.sensitivity_estimator_stride`-th snapshot, then image the
/// sensitivity field from every `params.sensitivity_stride`-th snapshot. Only the snapshots' antenna layouts and beamforming weights are
/// used.
pub fn run_sensitivity<F, S>(
    source: &S,
    frame: &SynthesisFrame,
    params: &BluebildParams,
) -> Result<SensitivityOutput<F>, PipelineError>
where
    F: SynthesisFloat,
    S: SnapshotSource + ?Sized,
{
    let estimator_indices = stride_indices(source, params.sensitivity_estimator_stride)?;
    let estimator = SensitivityFieldParameterEstimator::new(params.sigma)?;
    let pb = make_progress_bar(
        estimator_indices.len(),
        "Estimating sensitivity parameters",
        params.draw_progress_bar,
    );
    let estimator = estimator_indices
        .par_iter()
        .try_fold(
            || estimator.fork(),
            |mut estimator, &i| -> Result<_, PipelineError> {
                let snapshot = read_snapshot(source, i)?;
                with_context(source, i, || {
                    let gram = snapshot_gram(&snapshot, params.wavelength)?;
                    estimator.collect(gram.view())?;
                    Ok(())
                })?;
                pb.inc(1);
                Ok(estimator)
            },
        )
        .try_reduce(
            || estimator.fork(),
            |mut a, b| {
                a.merge(b)?;
                Ok::<_, PipelineError>(a)
            },
        )?;
    pb.abandon_with_message("Finished estimating sensitivity parameters");
    let eigen_count = estimator.infer_parameters()?;
    info!(
        "Sensitivity field: imaging {eigen_count} eigen-components per snapshot (from {} snapshots)",
        estimator.num_collected()
    );

    let processor = SensitivityFieldDataProcessor::new(eigen_count);
    let imaging_indices = stride_indices(source, params.sensitivity_stride)?;
    let imager = PeriodicSynthesisImager::<F>::new(params.wavelength, frame, 1)?;
    let pb = make_progress_bar(
        imaging_indices.len(),
        "Imaging the sensitivity field",
        params.draw_progress_bar,
    );
    let (mut imager, _) = image_snapshots(
        source,
        imager,
        &imaging_indices,
        params.wavelength,
        &pb,
        |_, gram| Ok(processor.process(gram)?),
    )?;
    pb.abandon_with_message("Finished imaging the sensitivity field");

    let images = imager.as_image()?;
    let output = SensitivityOutput {
        eigen_count,
        images,
        num_snapshots: imager.num_snapshots(),
        bandwidth_insufficiency: imager.bandwidth_insufficiency(),
    };
    messages::ImagingSummary {
        field: "sensitivity",
        num_snapshots: output.num_snapshots,
        degenerate_snapshots: None,
        bandwidth_insufficiency: output.bandwidth_insufficiency,
    }
    .print();
    Ok(output)
}

/// Divide the intensity images by the sensitivity least-squares image,
/// converting them to flux units.
pub fn normalise<F: SynthesisFloat>(
    intensity: &SynthesisImages<F>,
    sensitivity: &SynthesisImages<F>,
) -> Result<SynthesisImages<F>, PipelineError> {
    Ok(intensity.normalise(&sensitivity.least_squares)?)
}

/// Build the frame, image both fields and normalise the intensity images.
pub fn run<F, S>(source: &S, params: &BluebildParams) -> Result<BluebildOutput<F>, PipelineError>
where
    F: SynthesisFloat,
    S: SnapshotSource + ?Sized,
{
    let frame = build_frame(source, params)?;
    let intensity = run_intensity(source, &frame, params)?;
    let sensitivity = run_sensitivity(source, &frame, params)?;
    let normalised = normalise(&intensity.images, &sensitivity.images)?;
    Ok(BluebildOutput {
        frame,
        intensity,
        sensitivity,
        normalised,
    })
}

/// Accumulate the eigen-components `process` makes of each snapshot in
/// `indices` (from its covariance and Gram matrix) into `imager`. Also returns
/// the number of those snapshots whose Gram matrix was rank deficient.
fn image_snapshots<F, S, P>(
    source: &S,
    mut imager: PeriodicSynthesisImager<F>,
    indices: &[usize],
    wavelength: f64,
    pb: &ProgressBar,
    process: P,
) -> Result<(PeriodicSynthesisImager<F>, usize), PipelineError>
where
    F: SynthesisFloat,
    S: SnapshotSource + ?Sized,
    P: Fn(ArrayView2<c64>, ArrayView2<c64>) -> Result<EigenComponents, SnapshotError> + Sync,
{
    // Every fork shares the steering tensor of the first snapshot's layout.
    if let Some(&first) = indices.first() {
        let snapshot = read_snapshot(source, first)?;
        with_context(source, first, || {
            imager.prepare(snapshot.timestamp, snapshot.antenna_positions.view())?;
            Ok(())
        })?;
    }

    let (accumulated, degenerate) = indices
        .par_iter()
        .try_fold(
            || (imager.fork(), 0_usize),
            |(mut imager, mut degenerate), &i| -> Result<_, PipelineError> {
                let snapshot = read_snapshot(source, i)?;
                with_context(source, i, || {
                    let gram = snapshot_gram(&snapshot, wavelength)?;
                    let components = process(snapshot.covariance.view(), gram.view())?;
                    if components.degeneracy.is_some() {
                        degenerate += 1;
                    }
                    imager.accumulate(
                        snapshot.timestamp,
                        &components,
                        snapshot.antenna_positions.view(),
                        snapshot.weights.view(),
                    )?;
                    Ok(())
                })?;
                pb.inc(1);
                Ok((imager, degenerate))
            },
        )
        .try_reduce(
            || (imager.fork(), 0_usize),
            |(mut a, n_a), (b, n_b)| {
                a.merge(b)?;
                Ok::<_, PipelineError>((a, n_a + n_b))
            },
        )?;
    imager.merge(accumulated)?;
    debug!(
        "Computed {} steering tensors for {} snapshots",
        imager.num_steering_builds(),
        imager.num_snapshots()
    );
    Ok((imager, degenerate))
}

fn stride_indices<S: SnapshotSource + ?Sized>(
    source: &S,
    stride: usize,
) -> Result<Vec<usize>, PipelineError> {
    let num_snapshots = source.num_snapshots();
    if num_snapshots == 0 {
        return Err(PipelineError::NoSnapshots);
    }
    let indices = (0..num_snapshots).step_by(stride.max(1)).collect::<Vec<_>>();
    debug!(
        "Using {} of {num_snapshots} snapshots (stride {stride})",
        indices.len()
    );
    Ok(indices)
}

fn read_snapshot<S: SnapshotSource + ?Sized>(
    source: &S,
    index: usize,
) -> Result<Snapshot, PipelineError> {
    source
        .read(index)
        .map_err(|e| PipelineError::Snapshot {
            index,
            timestamp: source.timestamp(index),
            source: SnapshotError::Read(e),
        })
}

/// Run `f`, attributing any error to snapshot `index`.
fn with_context<S, T>(
    source: &S,
    index: usize,
    f: impl FnOnce() -> Result<T, SnapshotError>,
) -> Result<T, PipelineError>
where
    S: SnapshotSource + ?Sized,
{
    f().map_err(|e| PipelineError::Snapshot {
        index,
        timestamp: source.timestamp(index),
        source: e,
    })
}

fn snapshot_gram(snapshot: &Snapshot, wavelength: f64) -> Result<Array2<c64>, SnapshotError> {
    Ok(gram_matrix(
        snapshot.antenna_positions.view(),
        snapshot.weights.view(),
        wavelength,
    )?)
}

/// Convenience function to make a progress bar over snapshots.
fn make_progress_bar(num_snapshots: usize, message: &'static str, draw: bool) -> ProgressBar {
    ProgressBar::with_draw_target(
        Some(num_snapshots as _),
        if draw {
            ProgressDrawTarget::stdout()
        } else {
            ProgressDrawTarget::hidden()
        },
    )
    .with_style(
        ProgressStyle::default_bar()
            .template("{msg}: [{wide_bar:.blue}] {pos:3}/{len:3} ({elapsed_precise}<{eta_precise})")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=> "),
    )
    .with_position(0)
    .with_message(message)
}
