// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Per-snapshot eigendecomposition.
//!
//! Every snapshot's covariance is decomposed relative to its Gram matrix; the
//! leading `eigen_count` components are kept and each is assigned to the
//! energy level with the nearest centroid.

mod error;

pub use error::ProcessorError;

use log::warn;
use ndarray::prelude::*;
use serde::{Deserialize, Serialize};
use vec1::Vec1;

use crate::{
    c64,
    constants::GRAM_RCOND,
    estimate::IntensityParameters,
    math::{generalised_eigh, hermitian_eigh, nearest_index},
};

/// A snapshot's Gram matrix was numerically rank deficient; only `rank` of its
/// `n_beam` directions could be used.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Degeneracy {
    pub rank: usize,
    pub n_beam: usize,
}

/// The eigen-components of one snapshot that are to be imaged.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EigenComponents {
    /// Descending eigenvalues.
    pub eigenvalues: Array1<f64>,
    /// `N_beam` x `K`; Gram orthonormal.
    pub eigenvectors: Array2<c64>,
    /// The energy level of each component.
    pub cluster_index: Vec<usize>,
    /// Set if the snapshot's Gram matrix was rank deficient.
    pub degeneracy: Option<Degeneracy>,
}

impl EigenComponents {
    pub fn len(&self) -> usize {
        self.eigenvalues.len()
    }

    pub fn is_empty(&self) -> bool {
        self.eigenvalues.is_empty()
    }

    pub fn num_beams(&self) -> usize {
        self.eigenvectors.len_of(Axis(0))
    }
}

/// The index of the nearest centroid of every eigenvalue. Ties go to the lower
/// index. With no centroids, everything belongs to level 0.
pub fn assign_clusters(eigenvalues: ArrayView1<f64>, centroids: &[f64]) -> Vec<usize> {
    if centroids.is_empty() {
        return vec![0; eigenvalues.len()];
    }
    eigenvalues
        .iter()
        .map(|&v| nearest_index(v, centroids))
        .collect()
}

fn check_pair(covariance: ArrayView2<c64>, gram: ArrayView2<c64>) -> Result<(), ProcessorError> {
    let (cr, cc) = covariance.dim();
    let (gr, gc) = gram.dim();
    if cr != cc || gr != gc || cr != gr {
        return Err(ProcessorError::Shape {
            covariance: (cr, cc),
            gram: (gr, gc),
        });
    }
    Ok(())
}

fn degeneracy(rank: usize, n_beam: usize) -> Option<Degeneracy> {
    if rank < n_beam {
        warn!("Gram matrix is rank deficient ({rank} of {n_beam}); imaging the well-conditioned subspace only");
        Some(Degeneracy { rank, n_beam })
    } else {
        None
    }
}

#[derive(Debug, Clone)]
pub struct IntensityFieldDataProcessor {
    eigen_count: usize,
    centroids: Vec1<f64>,
}

impl IntensityFieldDataProcessor {
    pub fn new(eigen_count: usize, centroids: Vec1<f64>) -> Self {
        Self {
            eigen_count,
            centroids,
        }
    }

    pub fn eigen_count(&self) -> usize {
        self.eigen_count
    }

    pub fn num_levels(&self) -> usize {
        self.centroids.len()
    }

    pub fn process(
        &self,
        covariance: ArrayView2<c64>,
        gram: ArrayView2<c64>,
    ) -> Result<EigenComponents, ProcessorError> {
        check_pair(covariance, gram)?;
        let n_beam = gram.len_of(Axis(0));
        let eig = generalised_eigh(covariance, gram)?;
        let k = self.eigen_count.min(eig.values.len());

        let eigenvalues = eig.values.slice(s![..k]).to_owned();
        let cluster_index = assign_clusters(eigenvalues.view(), &self.centroids);
        Ok(EigenComponents {
            eigenvalues,
            eigenvectors: eig.vectors.slice(s![.., ..k]).to_owned(),
            cluster_index,
            degeneracy: degeneracy(eig.rank, n_beam),
        })
    }
}

impl From<IntensityParameters> for IntensityFieldDataProcessor {
    fn from(p: IntensityParameters) -> Self {
        Self::new(p.eigen_count, p.centroids)
    }
}

#[derive(Debug, Clone)]
pub struct SensitivityFieldDataProcessor {
    eigen_count: usize,
}

impl SensitivityFieldDataProcessor {
    pub fn new(eigen_count: usize) -> Self {
        Self { eigen_count }
    }

    pub fn eigen_count(&self) -> usize {
        self.eigen_count
    }

    /// The eigenvalues of the Gram matrix and its eigenvectors, scaled to be
    /// Gram orthonormal. Every component belongs to level 0.
    pub fn process(&self, gram: ArrayView2<c64>) -> Result<EigenComponents, ProcessorError> {
        check_pair(gram, gram)?;
        let n_beam = gram.len_of(Axis(0));
        let eig = hermitian_eigh(gram)?;
        let gamma_max = eig.values.first().copied().unwrap_or(0.0);
        let rank = if gamma_max > 0.0 {
            eig.values
                .iter()
                .take_while(|&&gamma| gamma > GRAM_RCOND * gamma_max)
                .count()
        } else {
            0
        };
        let k = self.eigen_count.min(rank);

        let eigenvalues = eig.values.slice(s![..k]).to_owned();
        let mut eigenvectors = eig.vectors.slice(s![.., ..k]).to_owned();
        for (mut col, &gamma) in eigenvectors.axis_iter_mut(Axis(1)).zip(eigenvalues.iter()) {
            let scale = gamma.sqrt().recip();
            col.mapv_inplace(|z| z.scale(scale));
        }
        Ok(EigenComponents {
            eigenvalues,
            eigenvectors,
            cluster_index: vec![0; k],
            degeneracy: degeneracy(rank, n_beam),
        })
    }
}
