// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use std::f64::consts::{PI, TAU};

use approx::assert_abs_diff_eq;
use hifitime::Duration;

use super::*;
use crate::{
    frame::nyquist_resolution,
    math::{cexp, mat_vec, rotation_matrix, unit_vector},
    params::BluebildArgs,
};

const WAVELENGTH: f64 = 1.0;
const ROTATION_RATE: f64 = 0.3;

fn layout() -> Array2<f64> {
    array![
        [0.0, 0.0, 0.0],
        [0.0, 1.3, 0.2],
        [0.0, -0.4, 1.7],
        [0.0, 2.1, -1.1],
        [0.0, -1.8, -0.9],
        [0.0, 0.6, -2.3],
    ]
}

fn start() -> Epoch {
    Epoch::from_gpst_seconds(1090008640.0)
}

/// A point source at colatitude `27π/56`, longitude `π/14`, which is the
/// centre of a pixel.
fn source_direction() -> [f64; 3] {
    unit_vector(27.0 * PI / 56.0, PI / 14.0)
}

struct MemorySource {
    snapshots: Vec<Snapshot>,
    /// Reading this snapshot fails.
    broken: Option<usize>,
}

impl SnapshotSource for MemorySource {
    fn num_snapshots(&self) -> usize {
        self.snapshots.len()
    }

    fn timestamp(&self, index: usize) -> Epoch {
        self.snapshots[index].timestamp
    }

    fn read(&self, index: usize) -> Result<Snapshot, Box<dyn std::error::Error + Send + Sync>> {
        if self.broken == Some(index) {
            return Err("corrupted data".into());
        }
        Ok(self.snapshots[index].clone())
    }
}

/// Five snapshots over a second of the point source, seen by the array as it
/// turns about Z.
fn point_source() -> MemorySource {
    let r0 = source_direction();
    let snapshots = (0..5)
        .map(|i| {
            let dt = 0.25 * i as f64;
            let rot = rotation_matrix(&[0.0, 0.0, 1.0], ROTATION_RATE * (dt - 0.5));
            let positions = Array2::from_shape_vec(
                (6, 3),
                layout()
                    .outer_iter()
                    .flat_map(|p| mat_vec(&rot, &[p[0], p[1], p[2]]))
                    .collect(),
            )
            .unwrap();
            let x = positions
                .outer_iter()
                .map(|p| cexp(TAU / WAVELENGTH * (r0[0] * p[0] + r0[1] * p[1] + r0[2] * p[2])))
                .collect::<Array1<c64>>();
            let covariance = Array2::from_shape_fn((6, 6), |(a, b)| x[a] * x[b].conj());
            Snapshot {
                timestamp: start() + Duration::from_seconds(dt),
                antenna_positions: positions,
                weights: Array2::eye(6),
                covariance,
            }
        })
        .collect();
    MemorySource {
        snapshots,
        broken: None,
    }
}

fn args() -> BluebildArgs {
    BluebildArgs {
        wavelength: Some(WAVELENGTH),
        ra: Some(0.0),
        dec: Some(0.0),
        field_of_view: Some(40.0),
        angular_resolution: Some(180.0 / 28.0),
        rotation_rate: Some(ROTATION_RATE),
        num_levels: Some(2),
        sigma: Some(1.0),
        estimator_stride: Some(1),
        imaging_stride: Some(1),
        sensitivity_estimator_stride: Some(1),
        sensitivity_stride: Some(1),
        ..Default::default()
    }
}

fn params() -> BluebildParams {
    args().parse().unwrap()
}

/// The direction of the brightest pixel of an image.
fn brightest<F: SynthesisFloat>(images: &SynthesisImages<F>) -> [f64; 3] {
    let summed = images.standardized.sum_levels();
    let level = summed.level(0);
    let ((q, l), _) = level
        .indexed_iter()
        .max_by(|(_, a), (_, b)| a.load().total_cmp(&b.load()))
        .unwrap();
    let grid = summed.grid();
    unit_vector(grid.colatitudes()[q], grid.longitudes()[l])
}

#[test]
fn test_build_frame_spans_all_snapshots() {
    let mut source = point_source();
    source.snapshots.reverse();
    let frame = build_frame(&source, &params()).unwrap();
    assert_eq!(frame.obs_start(), start());
    assert_eq!(frame.obs_end(), start() + Duration::from_seconds(1.0));
    assert_abs_diff_eq!(frame.rotation_rate(), ROTATION_RATE);
    assert_abs_diff_eq!(frame.grid().spacing(), PI / 28.0, epsilon = 1e-12);
}

#[test]
fn test_build_frame_nyquist_resolution() {
    let source = point_source();
    let params = BluebildArgs {
        angular_resolution: None,
        ..args()
    }
    .parse()
    .unwrap();
    let frame = build_frame(&source, &params).unwrap();
    let expected = nyquist_resolution(layout().view(), WAVELENGTH).unwrap();
    assert_abs_diff_eq!(frame.grid().spacing(), expected, epsilon = 1e-12);
}

#[test]
fn test_build_frame_bandwidth_override() {
    let source = point_source();
    let params = BluebildArgs {
        n_fs: Some(5),
        ..args()
    }
    .parse()
    .unwrap();
    let frame = build_frame(&source, &params).unwrap();
    assert_eq!(frame.n_fs(), 5);
    let insufficiency = frame.bandwidth_insufficiency().unwrap();
    assert_eq!(insufficiency.available, 5);
    assert!(insufficiency.required > 5);
}

#[test]
fn test_no_snapshots() {
    let source = MemorySource {
        snapshots: vec![],
        broken: None,
    };
    assert!(matches!(
        build_frame(&source, &params()),
        Err(PipelineError::NoSnapshots)
    ));
}

#[test]
fn test_intensity_localises_point_source() {
    let source = point_source();
    let params = params();
    let frame = build_frame(&source, &params).unwrap();
    let output = run_intensity::<f64, _>(&source, &frame, &params).unwrap();

    assert_eq!(output.num_snapshots, 5);
    assert_eq!(output.degenerate_snapshots, 0);
    assert!(output.bandwidth_insufficiency.is_none());
    assert_eq!(output.parameters.centroids.len(), 2);
    assert_eq!(output.images.standardized.num_levels(), 2);

    let r = brightest(&output.images);
    let r0 = source_direction();
    let separation = (r[0] * r0[0] + r[1] * r0[1] + r[2] * r0[2]).clamp(-1.0, 1.0).acos();
    assert!(separation < 0.5 * frame.grid().spacing(), "{separation}");
}

#[test]
fn test_sensitivity_field() {
    let source = point_source();
    let params = params();
    let frame = build_frame(&source, &params).unwrap();
    let output = run_sensitivity::<f64, _>(&source, &frame, &params).unwrap();

    assert_eq!(output.num_snapshots, 5);
    assert_eq!(output.eigen_count, 6);
    assert_eq!(output.images.least_squares.num_levels(), 1);
    let standardized = output.images.standardized.data();
    let peak = standardized.fold(0.0_f64, |acc, &v| acc.max(v));
    assert!(peak > 0.0);
    assert!(standardized
        .iter()
        .all(|v| v.is_finite() && *v >= -1e-3 * peak));
}

#[test]
fn test_strides() {
    let source = point_source();
    let params = BluebildArgs {
        imaging_stride: Some(2),
        sensitivity_stride: Some(3),
        ..args()
    }
    .parse()
    .unwrap();
    let frame = build_frame(&source, &params).unwrap();
    let intensity = run_intensity::<f32, _>(&source, &frame, &params).unwrap();
    assert_eq!(intensity.num_snapshots, 3);
    let sensitivity = run_sensitivity::<f32, _>(&source, &frame, &params).unwrap();
    assert_eq!(sensitivity.num_snapshots, 2);
}

#[test]
fn test_sensitivity_strides_are_independent() {
    // Snapshot 1 is only used to estimate sensitivity parameters, so its bad
    // Gram matrix is reported by the estimator.
    let mut source = point_source();
    source.snapshots[1].weights = Array2::zeros((5, 6));
    let params = BluebildArgs {
        sensitivity_estimator_stride: Some(1),
        sensitivity_stride: Some(2),
        ..args()
    }
    .parse()
    .unwrap();
    let frame = build_frame(&source, &params).unwrap();
    assert!(matches!(
        run_sensitivity::<f64, _>(&source, &frame, &params),
        Err(PipelineError::Snapshot {
            index: 1,
            source: SnapshotError::Gram(_),
            ..
        })
    ));

    // Skipping it while estimating leaves it out of both passes.
    let params = BluebildArgs {
        sensitivity_estimator_stride: Some(4),
        sensitivity_stride: Some(2),
        ..args()
    }
    .parse()
    .unwrap();
    let output = run_sensitivity::<f64, _>(&source, &frame, &params).unwrap();
    assert_eq!(output.num_snapshots, 3);
    assert_eq!(output.eigen_count, 6);
}

#[test]
fn test_imaging_pass_computes_one_steering_tensor() {
    let source = point_source();
    let params = params();
    let frame = build_frame(&source, &params).unwrap();
    let indices = (0..source.num_snapshots()).collect::<Vec<_>>();
    let processor = SensitivityFieldDataProcessor::new(6);

    let (imager, degenerate) = rayon::ThreadPoolBuilder::new()
        .num_threads(8)
        .build()
        .unwrap()
        .install(|| {
            image_snapshots(
                &source,
                PeriodicSynthesisImager::<f64>::new(WAVELENGTH, &frame, 1).unwrap(),
                &indices,
                WAVELENGTH,
                &ProgressBar::hidden(),
                |_, gram| Ok(processor.process(gram)?),
            )
        })
        .unwrap();
    assert_eq!(imager.num_snapshots(), 5);
    assert_eq!(degenerate, 0);
    // The array turns with the frame, so every snapshot has the same
    // corotating layout.
    assert_eq!(imager.num_steering_builds(), 1);
}

#[test]
fn test_run_normalises_every_level() {
    let source = point_source();
    let output = run::<f64, _>(&source, &params()).unwrap();
    assert_eq!(output.normalised.standardized.num_levels(), 2);
    assert_eq!(output.normalised.least_squares.num_levels(), 2);
    assert!(output
        .normalised
        .standardized
        .data()
        .iter()
        .all(|v| v.is_finite()));

    let expected = output
        .intensity
        .images
        .standardized
        .div(&output.sensitivity.images.least_squares)
        .unwrap();
    assert_abs_diff_eq!(
        output.normalised.standardized.data(),
        expected.data(),
        epsilon = 1e-12
    );
}

#[test]
fn test_independent_of_thread_count() {
    let source = point_source();
    let params = params();
    let frame = build_frame(&source, &params).unwrap();
    let parallel = run_intensity::<f64, _>(&source, &frame, &params).unwrap();
    let serial = rayon::ThreadPoolBuilder::new()
        .num_threads(1)
        .build()
        .unwrap()
        .install(|| run_intensity::<f64, _>(&source, &frame, &params))
        .unwrap();

    assert_eq!(parallel.parameters.eigen_count, serial.parameters.eigen_count);
    let peak = serial
        .images
        .standardized
        .data()
        .fold(0.0_f64, |acc, &v| acc.max(v));
    assert_abs_diff_eq!(
        parallel.images.standardized.data(),
        serial.images.standardized.data(),
        epsilon = 1e-9 * peak
    );
}

#[test]
fn test_read_errors_name_the_snapshot() {
    let mut source = point_source();
    source.broken = Some(3);
    let params = params();
    let frame = build_frame(&source, &params).unwrap();
    match run_intensity::<f64, _>(&source, &frame, &params) {
        Err(PipelineError::Snapshot {
            index,
            timestamp,
            source: SnapshotError::Read(_),
        }) => {
            assert_eq!(index, 3);
            assert_eq!(timestamp, start() + Duration::from_seconds(0.75));
        }
        other => panic!("unexpected result: {other:?}"),
    }
}

#[test]
fn test_bad_covariance_is_reported() {
    let mut source = point_source();
    source.snapshots[2].covariance = Array2::zeros((5, 5));
    let params = params();
    let frame = build_frame(&source, &params).unwrap();
    assert!(matches!(
        run_intensity::<f64, _>(&source, &frame, &params),
        Err(PipelineError::Snapshot {
            index: 2,
            source: SnapshotError::Estimator(_),
            ..
        })
    ));
}
