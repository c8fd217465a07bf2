// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Parameter estimation from a subsample of snapshots.
//!
//! Before imaging, a calibration pass over some snapshots determines how many
//! eigen-components carry signal (`eigen_count`) and, for intensity imaging,
//! the representative eigenvalues ("centroids") of each energy level. Only the
//! eigenvalue spectrum of each snapshot is kept.

mod error;

pub use error::EstimatorError;

use log::debug;
use ndarray::prelude::*;
use serde::{Deserialize, Serialize};
use vec1::Vec1;

use crate::{
    c64,
    math::{generalised_eigh, hermitian_eigh, kmeans_1d},
};

/// The output of an [`IntensityFieldParameterEstimator`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntensityParameters {
    /// The number of leading eigen-components to image per snapshot.
    pub eigen_count: usize,

    /// One representative eigenvalue per energy level, in descending order.
    pub centroids: Vec1<f64>,
}

/// Collects the generalised eigenvalue spectra of (covariance, Gram) pairs.
#[derive(Debug, Clone)]
pub struct IntensityFieldParameterEstimator {
    n_level: usize,
    sigma: f64,
    spectra: Vec<Array1<f64>>,
}

impl IntensityFieldParameterEstimator {
    /// `sigma` is the fraction of the spectrum's energy to keep; values of 1 or
    /// more keep every eigen-component.
    pub fn new(n_level: usize, sigma: f64) -> Result<Self, EstimatorError> {
        if n_level == 0 {
            return Err(EstimatorError::ZeroLevels);
        }
        check_sigma(sigma)?;
        Ok(Self {
            n_level,
            sigma,
            spectra: vec![],
        })
    }

    /// An empty estimator with the same settings.
    pub fn fork(&self) -> Self {
        Self {
            n_level: self.n_level,
            sigma: self.sigma,
            spectra: vec![],
        }
    }

    pub fn num_levels(&self) -> usize {
        self.n_level
    }

    pub fn num_collected(&self) -> usize {
        self.spectra.len()
    }

    pub fn collect(
        &mut self,
        covariance: ArrayView2<c64>,
        gram: ArrayView2<c64>,
    ) -> Result<(), EstimatorError> {
        let (cr, cc) = covariance.dim();
        let (gr, gc) = gram.dim();
        if cr != cc || gr != gc || cr != gr {
            return Err(EstimatorError::Shape {
                covariance: (cr, cc),
                gram: (gr, gc),
            });
        }

        let eig = generalised_eigh(covariance, gram)?;
        self.spectra.push(eig.values.mapv(|v| v.max(0.0)));
        Ok(())
    }

    /// Absorb the spectra collected by another estimator.
    pub fn merge(&mut self, other: Self) -> Result<(), EstimatorError> {
        if self.n_level != other.n_level || self.sigma != other.sigma {
            return Err(EstimatorError::Mismatch);
        }
        self.spectra.extend(other.spectra);
        Ok(())
    }

    pub fn infer_parameters(&self) -> Result<IntensityParameters, EstimatorError> {
        if self.spectra.is_empty() {
            return Err(EstimatorError::NoData);
        }
        let max_rank = max_rank(&self.spectra);
        let count = energy_count(&self.spectra, self.sigma)
            .max(self.n_level)
            .min(max_rank);

        let mut pool = pooled(&self.spectra, count);
        let mut eigen_count = count;
        if pool.len() < self.n_level {
            eigen_count = max_rank;
            pool = pooled(&self.spectra, max_rank);
        }

        let mut centroids = if pool.len() >= self.n_level {
            let logs = pool.iter().map(|v| v.ln()).collect::<Vec<_>>();
            kmeans_1d(&logs, self.n_level)
                .into_iter()
                .map(f64::exp)
                .collect::<Vec<_>>()
        } else {
            let mut c = pool;
            c.resize(self.n_level, 0.0);
            c
        };
        centroids.sort_by(|a, b| b.total_cmp(a));
        debug!(
            "Intensity parameters from {} snapshots: eigen_count = {eigen_count}, centroids = {centroids:?}",
            self.spectra.len()
        );

        Ok(IntensityParameters {
            eigen_count,
            centroids: Vec1::try_from_vec(centroids).map_err(|_| EstimatorError::ZeroLevels)?,
        })
    }
}

/// Collects the eigenvalue spectra of Gram matrices. The sensitivity field has
/// a single implicit energy level.
#[derive(Debug, Clone)]
pub struct SensitivityFieldParameterEstimator {
    sigma: f64,
    spectra: Vec<Array1<f64>>,
}

impl SensitivityFieldParameterEstimator {
    pub fn new(sigma: f64) -> Result<Self, EstimatorError> {
        check_sigma(sigma)?;
        Ok(Self {
            sigma,
            spectra: vec![],
        })
    }

    pub fn fork(&self) -> Self {
        Self {
            sigma: self.sigma,
            spectra: vec![],
        }
    }

    pub fn num_collected(&self) -> usize {
        self.spectra.len()
    }

    pub fn collect(&mut self, gram: ArrayView2<c64>) -> Result<(), EstimatorError> {
        let eig = hermitian_eigh(gram)?;
        self.spectra.push(eig.values.mapv(|v| v.max(0.0)));
        Ok(())
    }

    pub fn merge(&mut self, other: Self) -> Result<(), EstimatorError> {
        if self.sigma != other.sigma {
            return Err(EstimatorError::Mismatch);
        }
        self.spectra.extend(other.spectra);
        Ok(())
    }

    /// The number of eigen-components to image per snapshot.
    pub fn infer_parameters(&self) -> Result<usize, EstimatorError> {
        if self.spectra.is_empty() {
            return Err(EstimatorError::NoData);
        }
        let eigen_count = energy_count(&self.spectra, self.sigma);
        debug!(
            "Sensitivity parameters from {} snapshots: eigen_count = {eigen_count}",
            self.spectra.len()
        );
        Ok(eigen_count)
    }
}

fn check_sigma(sigma: f64) -> Result<(), EstimatorError> {
    if sigma > 0.0 && sigma.is_finite() {
        Ok(())
    } else {
        Err(EstimatorError::BadSigma(sigma))
    }
}

fn max_rank(spectra: &[Array1<f64>]) -> usize {
    spectra.iter().map(|s| s.len()).max().unwrap_or(0)
}

/// The smallest number of leading eigenvalues of the mean spectrum whose
/// energy is at least `sigma` of the total.
fn energy_count(spectra: &[Array1<f64>], sigma: f64) -> usize {
    let max_rank = max_rank(spectra);
    let mut mean = Array1::<f64>::zeros(max_rank);
    for s in spectra {
        mean.slice_mut(s![..s.len()]).scaled_add(1.0, s);
    }
    mean /= spectra.len().max(1) as f64;

    let total = mean.sum();
    if sigma >= 1.0 || total <= 0.0 {
        return max_rank;
    }
    let mut cumulative = 0.0;
    for (i, &v) in mean.iter().enumerate() {
        cumulative += v;
        if cumulative >= sigma * total {
            return i + 1;
        }
    }
    max_rank
}

/// The leading `count` eigenvalues of every spectrum that are meaningfully
/// positive.
fn pooled(spectra: &[Array1<f64>], count: usize) -> Vec<f64> {
    spectra
        .iter()
        .flat_map(|s| {
            let floor = s.first().copied().unwrap_or(0.0) * f64::EPSILON;
            s.iter()
                .take(count)
                .copied()
                .filter(move |&v| v > floor && v > 0.0)
        })
        .collect()
}
