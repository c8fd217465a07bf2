// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! End-to-end imaging of simple skies.

use approx::assert_abs_diff_eq;
use vec1::vec1;

use super::*;
use bluebild::{
    gram_matrix, IntensityFieldDataProcessor, IntensityFieldParameterEstimator,
    PeriodicSynthesisImager,
};

/// A covariance whose only generalised eigen-component (relative to `gram`)
/// has eigenvalue 1 and is the conventional beam towards `r`.
fn unit_component(positions: ArrayView2<f64>, gram: ArrayView2<c64>, r: [f64; 3]) -> (Array2<c64>, f64) {
    let x = steering(positions, r);
    let gx = gram.dot(&x);
    let norm = x.iter().zip(gx.iter()).map(|(a, b)| a.conj() * b).sum::<c64>().re;
    let n = x.len();
    let covariance = Array2::from_shape_fn((n, n), |(a, b)| gx[a] * gx[b].conj() / norm);
    (covariance, norm)
}

/// Image a single snapshot with one energy level and σ = 1.
fn image_single_snapshot(positions: ArrayView2<f64>, r: [f64; 3]) -> (SynthesisFrame, ImageContainer<f64>, f64) {
    let frame = field_frame(bluebild::constants::EARTH_ROTATION_RATE, 0.0);
    let weights = Array2::eye(positions.len_of(Axis(0)));
    let gram = gram_matrix(positions, weights.view(), WAVELENGTH).unwrap();
    let (covariance, norm) = unit_component(positions, gram.view(), r);

    let mut estimator = IntensityFieldParameterEstimator::new(1, 1.0).unwrap();
    estimator.collect(covariance.view(), gram.view()).unwrap();
    let processor = IntensityFieldDataProcessor::from(estimator.infer_parameters().unwrap());
    let components = processor.process(covariance.view(), gram.view()).unwrap();
    assert_abs_diff_eq!(components.eigenvalues[0], 1.0, epsilon = 1e-9);
    assert!(components.cluster_index.iter().all(|&c| c == 0));

    let mut imager = PeriodicSynthesisImager::<f64>::new(WAVELENGTH, &frame, 1).unwrap();
    imager
        .accumulate(start(), &components, positions, weights.view())
        .unwrap();
    let images = imager.as_image().unwrap();
    (frame, images.standardized, norm)
}

#[test]
fn test_point_source_is_localised() {
    let positions = layout();
    let r0 = unit_vector(27.0 * PI / 56.0, PI / 14.0);
    let (frame, image, norm) = image_single_snapshot(positions.view(), r0);
    let spacing = frame.grid().spacing();

    let (_, r) = brightest(&image);
    assert!(angle_between(r, r0) < spacing, "{}", angle_between(r, r0));

    // The beam's peak is N_antenna² over the component's Gram norm.
    let max = peak(&image);
    assert_abs_diff_eq!(max, 36.0 / norm, epsilon = 1e-3 * max);

    let grid = image.grid();
    let level = image.level(0);
    for ((q, l), &v) in level.indexed_iter() {
        let direction = unit_vector(grid.colatitudes()[q], grid.longitudes()[l]);
        if angle_between(direction, r0) > 1.5 * spacing {
            assert!(v < 0.75 * max, "sidelobe at ({q}, {l}): {v} vs {max}");
        }
    }
}

#[test]
fn test_single_baseline_fringe_peaks_at_source() {
    // One pair can't tell the source from the rest of its fringe, but the
    // source pixel must be on the fringe's crest.
    let positions = array![[0.0, 0.0, 0.0], [0.0, 0.9, 0.4]];
    let r0 = unit_vector(29.0 * PI / 56.0, -PI / 28.0);
    let (frame, image, norm) = image_single_snapshot(positions.view(), r0);

    let max = peak(&image);
    assert_abs_diff_eq!(max, 4.0 / norm, epsilon = 1e-3 * max);

    let grid = frame.grid();
    let q = grid
        .colatitudes()
        .iter()
        .position(|&c| (c - 29.0 * PI / 56.0).abs() < 1e-9)
        .unwrap();
    let l = grid
        .longitudes()
        .iter()
        .position(|&p| (p + PI / 28.0).abs() < 1e-9)
        .unwrap();
    assert!(image.level(0)[(q, l)] > 0.99 * max);
}

#[test]
fn test_empty_sky_images_to_zero() {
    let positions = layout();
    let weights = Array2::<c64>::eye(6);
    let gram = Array2::<c64>::eye(6);
    let covariance = Array2::<c64>::zeros((6, 6));

    let mut estimator = IntensityFieldParameterEstimator::new(2, 1.0).unwrap();
    estimator.collect(covariance.view(), gram.view()).unwrap();
    let parameters = estimator.infer_parameters().unwrap();
    assert!(parameters.centroids.iter().all(|c| c.is_finite()));

    let components = IntensityFieldDataProcessor::from(parameters)
        .process(covariance.view(), gram.view())
        .unwrap();
    assert!(components.eigenvalues.iter().all(|v| v.abs() < 1e-12));

    let frame = field_frame(0.3, 1.0);
    let mut imager = PeriodicSynthesisImager::<f64>::new(WAVELENGTH, &frame, 2).unwrap();
    for dt in [0.0, 0.5, 1.0] {
        imager
            .accumulate(
                start() + Duration::from_seconds(dt),
                &components,
                positions.view(),
                weights.view(),
            )
            .unwrap();
    }
    let images = imager.as_image().unwrap();
    for image in [&images.standardized, &images.least_squares] {
        assert!(image.data().iter().all(|v| v.is_finite()));
        assert!(image.data().iter().all(|v| v.abs() < 1e-9));
    }
}

#[test]
fn test_levels_sum_to_single_level_image() {
    let sources = [
        (unit_vector(27.0 * PI / 56.0, PI / 14.0), 3.0),
        (unit_vector(31.0 * PI / 56.0, -PI / 28.0), 1.0),
        (unit_vector(25.0 * PI / 56.0, -PI / 14.0), 0.2),
    ];
    let observations = observe(&sources, 0.05, 5, 0.3, 1.0);
    let frame = field_frame(0.3, 1.0);

    let image = |n_level: usize| {
        let mut estimator = IntensityFieldParameterEstimator::new(n_level, 1.0).unwrap();
        let grams = observations
            .iter()
            .map(|o| gram_matrix(o.positions.view(), o.weights.view(), WAVELENGTH).unwrap())
            .collect::<Vec<_>>();
        for (o, gram) in observations.iter().zip(&grams) {
            estimator.collect(o.covariance.view(), gram.view()).unwrap();
        }
        let processor = IntensityFieldDataProcessor::from(estimator.infer_parameters().unwrap());
        let mut imager = PeriodicSynthesisImager::<f64>::new(WAVELENGTH, &frame, n_level).unwrap();
        for (o, gram) in observations.iter().zip(&grams) {
            let components = processor.process(o.covariance.view(), gram.view()).unwrap();
            assert_eq!(components.len(), 6);
            imager
                .accumulate(o.timestamp, &components, o.positions.view(), o.weights.view())
                .unwrap();
        }
        imager.as_image().unwrap()
    };

    let four = image(4);
    let one = image(1);
    assert_eq!(four.standardized.num_levels(), 4);
    let summed = four.standardized.sum_levels();
    assert_abs_diff_eq!(
        summed.data(),
        one.standardized.data(),
        epsilon = 1e-9 * peak(&one.standardized)
    );
}

#[test]
fn test_unclustered_processor_matches_estimated_levels() {
    // Fixed centroids put every component in the level nearest its eigenvalue.
    let sources = [(unit_vector(27.0 * PI / 56.0, PI / 14.0), 3.0)];
    let observations = observe(&sources, 0.5, 1, 0.0, 0.0);
    let o = &observations[0];
    let gram = gram_matrix(o.positions.view(), o.weights.view(), WAVELENGTH).unwrap();
    let processor = IntensityFieldDataProcessor::new(6, vec1![100.0, 1.0, 0.0]);
    let components = processor.process(o.covariance.view(), gram.view()).unwrap();
    assert!(components.cluster_index.iter().all(|&c| c < 3));
    for (v, &c) in components.eigenvalues.iter().zip(&components.cluster_index) {
        let best = [100.0_f64, 1.0, 0.0]
            .iter()
            .map(|centroid| (v - centroid).abs())
            .fold(f64::INFINITY, f64::min);
        assert_abs_diff_eq!((v - [100.0, 1.0, 0.0][c]).abs(), best);
    }
}
