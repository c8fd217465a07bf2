// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Properties that hold for any sky.

use approx::assert_abs_diff_eq;
use vec1::vec1;

use super::*;
use bluebild::{
    assign_clusters, gram_matrix, EigenComponents, ImagerCheckpoint, ImagerError,
    IntensityFieldDataProcessor, PeriodicSynthesisImager, SynthesisImages,
};

fn sky() -> Vec<([f64; 3], f64)> {
    vec![
        (unit_vector(27.0 * PI / 56.0, PI / 14.0), 2.0),
        (unit_vector(31.0 * PI / 56.0, -PI / 28.0), 0.7),
    ]
}

/// Snapshots of [`sky`] with the eigen-components to image for each.
fn processed(num: usize) -> (SynthesisFrame, Vec<(Observation, EigenComponents)>) {
    let frame = field_frame(0.3, 1.0);
    let processor = IntensityFieldDataProcessor::new(6, vec1![1.0, 0.1, 0.01]);
    let snapshots = observe(&sky(), 0.05, num, 0.3, 1.0)
        .into_iter()
        .map(|o| {
            let gram = gram_matrix(o.positions.view(), o.weights.view(), WAVELENGTH).unwrap();
            let components = processor.process(o.covariance.view(), gram.view()).unwrap();
            (o, components)
        })
        .collect();
    (frame, snapshots)
}

fn accumulate_all<'a>(
    imager: &mut PeriodicSynthesisImager<f64>,
    snapshots: impl IntoIterator<Item = &'a (Observation, EigenComponents)>,
) {
    for (o, components) in snapshots {
        imager
            .accumulate(o.timestamp, components, o.positions.view(), o.weights.view())
            .unwrap();
    }
}

fn assert_images_close(a: &SynthesisImages<f64>, b: &SynthesisImages<f64>) {
    let scale = peak(&a.standardized);
    assert_abs_diff_eq!(
        a.standardized.data(),
        b.standardized.data(),
        epsilon = 1e-10 * scale
    );
    let scale = peak(&a.least_squares);
    assert_abs_diff_eq!(
        a.least_squares.data(),
        b.least_squares.data(),
        epsilon = 1e-10 * scale
    );
}

#[test]
fn test_order_independence() {
    let (frame, snapshots) = processed(5);

    let mut forward = PeriodicSynthesisImager::new(WAVELENGTH, &frame, 3).unwrap();
    accumulate_all(&mut forward, &snapshots);
    let mut shuffled = PeriodicSynthesisImager::new(WAVELENGTH, &frame, 3).unwrap();
    accumulate_all(&mut shuffled, [3, 0, 4, 2, 1].iter().map(|&i| &snapshots[i]));

    assert_images_close(&forward.as_image().unwrap(), &shuffled.as_image().unwrap());
}

#[test]
fn test_partitioned_accumulation_matches_serial() {
    let (frame, snapshots) = processed(5);

    let mut serial = PeriodicSynthesisImager::new(WAVELENGTH, &frame, 3).unwrap();
    accumulate_all(&mut serial, &snapshots);

    let mut first = PeriodicSynthesisImager::new(WAVELENGTH, &frame, 3).unwrap();
    let mut second = first.fork();
    accumulate_all(&mut first, &snapshots[..2]);
    accumulate_all(&mut second, &snapshots[2..]);
    first.merge(second).unwrap();
    assert_eq!(first.num_snapshots(), 5);

    assert_images_close(&serial.as_image().unwrap(), &first.as_image().unwrap());
}

#[test]
fn test_finalise_is_idempotent() {
    let (frame, snapshots) = processed(3);
    let mut imager = PeriodicSynthesisImager::new(WAVELENGTH, &frame, 3).unwrap();
    accumulate_all(&mut imager, &snapshots);

    let first = imager.as_image().unwrap();
    let second = imager.as_image().unwrap();
    assert_eq!(first, second);

    let (o, components) = &snapshots[0];
    assert!(matches!(
        imager.accumulate(o.timestamp, components, o.positions.view(), o.weights.view()),
        Err(ImagerError::Finalised)
    ));
}

#[test]
fn test_resume_from_checkpoint() {
    let (frame, snapshots) = processed(4);

    let mut uninterrupted = PeriodicSynthesisImager::new(WAVELENGTH, &frame, 3).unwrap();
    accumulate_all(&mut uninterrupted, &snapshots);

    let mut interrupted = PeriodicSynthesisImager::new(WAVELENGTH, &frame, 3).unwrap();
    accumulate_all(&mut interrupted, &snapshots[..2]);
    let json = serde_json::to_string(&interrupted.checkpoint().with_cursor(2)).unwrap();
    drop(interrupted);

    let checkpoint: ImagerCheckpoint<f64> = serde_json::from_str(&json).unwrap();
    let cursor = checkpoint.cursor.unwrap();
    let mut resumed = PeriodicSynthesisImager::new(WAVELENGTH, &frame, 3).unwrap();
    resumed.restore(checkpoint).unwrap();
    accumulate_all(&mut resumed, &snapshots[cursor..]);
    assert_eq!(resumed.num_snapshots(), 4);

    assert_images_close(&uninterrupted.as_image().unwrap(), &resumed.as_image().unwrap());
}

#[test]
fn test_energy_conservation() {
    // Over the whole sphere each Gram-orthonormal component integrates to 1,
    // so the total flux is the sum of the eigenvalues.
    let frame = FrameBuilder::new(
        RADec::from_degrees(0.0, 0.0),
        start(),
        start(),
        TAU,
        PI / 32.0,
    )
    .build()
    .unwrap();
    assert!(frame.is_periodic());

    let observations = observe(&sky(), 0.0, 1, 0.0, 0.0);
    let o = &observations[0];
    let gram = gram_matrix(o.positions.view(), o.weights.view(), WAVELENGTH).unwrap();
    let components = IntensityFieldDataProcessor::new(6, vec1![1.0])
        .process(o.covariance.view(), gram.view())
        .unwrap();
    let total_eigenvalue: f64 = components.eigenvalues.sum();
    assert!(total_eigenvalue > 0.0);

    let mut imager = PeriodicSynthesisImager::<f64>::new(WAVELENGTH, &frame, 1).unwrap();
    imager
        .accumulate(o.timestamp, &components, o.positions.view(), o.weights.view())
        .unwrap();
    assert!(imager.bandwidth_insufficiency().is_none());
    let images = imager.as_image().unwrap();
    let flux = images.standardized.total_flux();
    assert_abs_diff_eq!(flux[0], total_eigenvalue, epsilon = 1e-2 * total_eigenvalue);
}

#[test]
fn test_cluster_completeness() {
    let (_, snapshots) = processed(5);
    for (_, components) in &snapshots {
        assert_eq!(components.cluster_index.len(), components.len());
        assert!(components.cluster_index.iter().all(|&c| c < 3));
    }

    let centroids = [40.0, 4.0, 0.4, 0.04];
    let eigenvalues = Array1::logspace(10.0, 3.0, -4.0, 60);
    let clusters = assign_clusters(eigenvalues.view(), &centroids);
    assert_eq!(clusters.len(), 60);
    assert!(clusters.iter().all(|&c| c < centroids.len()));
    // Eigenvalues are assigned in order of decreasing magnitude.
    assert!(clusters.windows(2).all(|w| w[0] <= w[1]));
}

#[test]
fn test_bandwidth_consistency() {
    let frame = field_frame(0.3, 1.0);
    assert!(frame.bandwidth_insufficiency().is_none());
    assert_eq!(frame.n_fs(), frame.required_n_fs());

    let r0 = unit_vector(31.0 * PI / 56.0, -PI / 28.0);
    let observations = observe(&[(r0, 1.0)], 0.0, 5, 0.3, 1.0);
    let processor = IntensityFieldDataProcessor::new(6, vec1![1.0]);
    let mut imager = PeriodicSynthesisImager::<f64>::new(WAVELENGTH, &frame, 1).unwrap();
    for o in &observations {
        let gram = gram_matrix(o.positions.view(), o.weights.view(), WAVELENGTH).unwrap();
        let components = processor.process(o.covariance.view(), gram.view()).unwrap();
        imager
            .accumulate(o.timestamp, &components, o.positions.view(), o.weights.view())
            .unwrap();
    }
    assert!(imager.bandwidth_insufficiency().is_none());

    let images = imager.as_image().unwrap();
    let (_, r) = brightest(&images.standardized);
    assert!(angle_between(r, r0) <= frame.grid().spacing());
}
