// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

/*!
Periodic-synthesis imaging.

The field of eigen-component `k` of a snapshot towards direction `r` is

`E_k(r) = Σ_a (W v_k)_a exp(-j 2π <r, p_a> / λ)`,

where `W` are the beamforming weights and `p_a` the antenna positions (so
visibilities are expected to follow `x_a ∝ exp(+j 2π <r, p_a> / λ)` for a source
in direction `r`). The standardized image of a level is `Σ_k λ_k |E_k(r)|²` over
the components in that level, summed over snapshots.

Rather than evaluating this on every pixel for every snapshot, the antennas are
rotated into the frame that turns with the instrument. There, `|E_k|²` on a
colatitude row is a function of longitude only, which is sampled over the
frame's longitude window, tapered at the window ends and turned into a Fourier
series. A snapshot taken after the instrument has turned by `α` contributes the
same series delayed by `α`, which is a phase ramp on the coefficients. The
coefficients are summed over snapshots and evaluated on the pixel grid only once
([`PeriodicSynthesisImager::as_image`]).
 */

mod checkpoint;
mod error;
mod fourier;
mod steering;

pub use checkpoint::ImagerCheckpoint;
pub use error::ImagerError;

use std::{f64::consts::TAU, fmt::Debug, sync::Arc};

use approx::relative_eq;
use hifitime::Epoch;
use log::{debug, trace, warn};
use ndarray::{prelude::*, Zip};
use num_complex::Complex;
use num_traits::{Float, NumAssign};
use rayon::prelude::*;
use serde::{de::DeserializeOwned, Serialize};

use self::{
    fourier::{evaluate, samples_to_series, SeriesPlan},
    steering::SteeringCache,
};
use crate::{
    c64,
    constants::{CHECKPOINT_TOLERANCE, RESPONSE_FLOOR},
    frame::{BandwidthInsufficiency, SynthesisFrame},
    image::{ImageContainer, SynthesisImages},
    math::{mat_vec, rotation_matrix},
    processor::EigenComponents,
};

/// The storage precision of accumulated coefficients and images. All
/// arithmetic is done in double precision; values are only rounded when
/// stored.
pub trait SynthesisFloat:
    Float + NumAssign + Debug + Send + Sync + Serialize + DeserializeOwned + 'static
{
    fn store(x: f64) -> Self;
    fn load(self) -> f64;
}

impl SynthesisFloat for f32 {
    #[inline]
    fn store(x: f64) -> f32 {
        x as f32
    }

    #[inline]
    fn load(self) -> f64 {
        self as f64
    }
}

impl SynthesisFloat for f64 {
    #[inline]
    fn store(x: f64) -> f64 {
        x
    }

    #[inline]
    fn load(self) -> f64 {
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImagerState {
    /// Nothing has been accumulated yet.
    Created,
    Accumulating,
    /// Images have been produced; no more snapshots are accepted.
    Finalised,
}

#[derive(Debug, Clone)]
pub struct PeriodicSynthesisImager<F: SynthesisFloat> {
    wavelength: f64,
    frame: SynthesisFrame,
    n_level: usize,
    state: ImagerState,
    num_snapshots: usize,

    /// Eigenvalue-weighted series, (levels, rows, N_FS).
    weighted: Array3<Complex<F>>,
    /// Unweighted series, (levels, rows, N_FS).
    response: Array3<Complex<F>>,

    plan: SeriesPlan,
    steering: Option<Arc<SteeringCache>>,
    /// The number of steering tensors computed by this imager and the imagers
    /// merged into it.
    steering_builds: usize,
    bandwidth_insufficiency: Option<BandwidthInsufficiency>,
    images: Option<SynthesisImages<F>>,
}

impl<F: SynthesisFloat> PeriodicSynthesisImager<F> {
    pub fn new(
        wavelength: f64,
        frame: &SynthesisFrame,
        n_level: usize,
    ) -> Result<Self, ImagerError> {
        if !(wavelength > 0.0 && wavelength.is_finite()) {
            return Err(ImagerError::BadWavelength(wavelength));
        }
        if n_level == 0 {
            return Err(ImagerError::ZeroLevels);
        }
        let shape = (n_level, frame.grid().shape().0, frame.n_fs());
        Ok(Self {
            wavelength,
            frame: frame.clone(),
            n_level,
            state: ImagerState::Created,
            num_snapshots: 0,
            weighted: Array3::zeros(shape),
            response: Array3::zeros(shape),
            plan: SeriesPlan::new(frame),
            steering: None,
            steering_builds: 0,
            bandwidth_insufficiency: frame.bandwidth_insufficiency(),
            images: None,
        })
    }

    pub fn wavelength(&self) -> f64 {
        self.wavelength
    }

    pub fn frame(&self) -> &SynthesisFrame {
        &self.frame
    }

    pub fn num_levels(&self) -> usize {
        self.n_level
    }

    pub fn state(&self) -> ImagerState {
        self.state
    }

    pub fn num_snapshots(&self) -> usize {
        self.num_snapshots
    }

    /// The number of steering tensors computed so far, including those of
    /// merged imagers.
    pub fn num_steering_builds(&self) -> usize {
        self.steering_builds
    }

    /// Set if `N_FS` is too small for the frame or for any antenna layout seen
    /// so far.
    pub fn bandwidth_insufficiency(&self) -> Option<BandwidthInsufficiency> {
        self.bandwidth_insufficiency
    }

    /// Add a snapshot's eigen-components to the images.
    ///
    /// `antenna_positions` (`N_antenna` x 3, metres) are in the instrument
    /// coordinates of the frame's field centre (i.e. the Z axis of an
    /// Earth-bound instrument is the celestial pole), `weights` are
    /// `N_antenna` x `N_beam`. Everything is validated before anything is
    /// accumulated.
    pub fn accumulate(
        &mut self,
        timestamp: Epoch,
        components: &EigenComponents,
        antenna_positions: ArrayView2<f64>,
        weights: ArrayView2<c64>,
    ) -> Result<(), ImagerError> {
        if self.state == ImagerState::Finalised {
            return Err(ImagerError::Finalised);
        }
        if !self.frame.contains(timestamp) {
            return Err(ImagerError::OutsideObservation { timestamp });
        }
        self.validate(components, antenna_positions, weights)?;

        let alpha = self.frame.rotation_angle(timestamp);
        let layout = self.corotating_layout(antenna_positions, alpha);
        let steering = self.steering_for(layout);
        trace!(
            "Accumulating {} eigen-components at {timestamp} (rotation {alpha:.6} rad)",
            components.len()
        );

        if !components.is_empty() {
            let n_fs = self.frame.n_fs();
            let rows = self.snapshot_series(&steering, components, weights, alpha);
            for (q, (weighted, response)) in rows.into_iter().enumerate() {
                let levels = weighted
                    .chunks_exact(n_fs)
                    .zip(response.chunks_exact(n_fs))
                    .enumerate();
                for (level, (w, r)) in levels {
                    add_into(self.weighted.slice_mut(s![level, q, ..]), w);
                    add_into(self.response.slice_mut(s![level, q, ..]), r);
                }
            }
        }

        self.num_snapshots += 1;
        self.state = ImagerState::Accumulating;
        Ok(())
    }

    /// Compute the steering tensor of a snapshot's antenna layout without
    /// accumulating anything. Imagers forked afterwards share the tensor, so
    /// an instrument whose corotating layout doesn't change (e.g. an
    /// Earth-bound array) only needs it computed once.
    pub fn prepare(
        &mut self,
        timestamp: Epoch,
        antenna_positions: ArrayView2<f64>,
    ) -> Result<(), ImagerError> {
        if self.state == ImagerState::Finalised {
            return Err(ImagerError::Finalised);
        }
        if !self.frame.contains(timestamp) {
            return Err(ImagerError::OutsideObservation { timestamp });
        }
        if antenna_positions.ncols() != 3 {
            return Err(ImagerError::Shape {
                what: "the number of antenna position columns",
                expected: 3,
                got: antenna_positions.ncols(),
            });
        }
        if !antenna_positions.iter().all(|v| v.is_finite()) {
            return Err(ImagerError::NonFinite);
        }

        let alpha = self.frame.rotation_angle(timestamp);
        let layout = self.corotating_layout(antenna_positions, alpha);
        self.steering_for(layout);
        Ok(())
    }

    fn validate(
        &self,
        components: &EigenComponents,
        antenna_positions: ArrayView2<f64>,
        weights: ArrayView2<c64>,
    ) -> Result<(), ImagerError> {
        fn check(what: &'static str, expected: usize, got: usize) -> Result<(), ImagerError> {
            if expected == got {
                Ok(())
            } else {
                Err(ImagerError::Shape {
                    what,
                    expected,
                    got,
                })
            }
        }

        let k = components.eigenvalues.len();
        check("the number of antenna position columns", 3, antenna_positions.ncols())?;
        check("the number of weight rows", antenna_positions.nrows(), weights.nrows())?;
        check("the number of eigenvector rows", weights.ncols(), components.eigenvectors.nrows())?;
        check("the number of eigenvectors", k, components.eigenvectors.ncols())?;
        check("the number of cluster indices", k, components.cluster_index.len())?;
        if let Some(&index) = components.cluster_index.iter().find(|&&i| i >= self.n_level) {
            return Err(ImagerError::ClusterIndex {
                index,
                n_level: self.n_level,
            });
        }

        let finite = components.eigenvalues.iter().all(|v| v.is_finite())
            && components.eigenvectors.iter().all(|z| z.is_finite())
            && antenna_positions.iter().all(|v| v.is_finite())
            && weights.iter().all(|z| z.is_finite());
        if finite {
            Ok(())
        } else {
            Err(ImagerError::NonFinite)
        }
    }

    /// The antenna positions as seen from the instrument's reference
    /// orientation in the synthesis frame.
    fn corotating_layout(&self, antenna_positions: ArrayView2<f64>, alpha: f64) -> Array2<f64> {
        let derotation = rotation_matrix(&[0.0, 0.0, 1.0], -alpha);
        let mut layout = Array2::zeros(antenna_positions.dim());
        for (mut out, p) in layout.outer_iter_mut().zip(antenna_positions.outer_iter()) {
            let v = mat_vec(&derotation, &self.frame.to_frame(&[p[0], p[1], p[2]]));
            for (o, v) in out.iter_mut().zip(v) {
                *o = v;
            }
        }
        layout
    }

    fn steering_for(&mut self, layout: Array2<f64>) -> Arc<SteeringCache> {
        if let Some(cache) = &self.steering {
            if cache.matches(layout.view(), self.wavelength) {
                return Arc::clone(cache);
            }
        }

        debug!(
            "Computing steering tensor for {} antennas",
            layout.len_of(Axis(0))
        );
        let cache = Arc::new(SteeringCache::new(&self.frame, layout, self.wavelength));
        self.steering_builds += 1;
        let required = self.frame.required_bandwidth(cache.harmonic_limit);
        let available = self.frame.n_fs();
        if required > available && self.bandwidth_insufficiency.is_none() {
            warn!("The antenna layout needs {required} Fourier-series coefficients, but only {available} are used; images will be aliased");
            self.bandwidth_insufficiency = Some(BandwidthInsufficiency {
                required,
                available,
            });
        }
        self.steering = Some(Arc::clone(&cache));
        cache
    }

    /// The Fourier series of one snapshot, per grid row. Each row holds the
    /// weighted and unweighted series of every level, concatenated.
    fn snapshot_series(
        &self,
        steering: &SteeringCache,
        components: &EigenComponents,
        weights: ArrayView2<c64>,
        alpha: f64,
    ) -> Vec<(Vec<c64>, Vec<c64>)> {
        let n_fs = self.frame.n_fs();
        let n_level = self.n_level;
        let period = self.frame.period();
        let SeriesPlan { fft, taper } = &self.plan;
        let beamformed = weights.dot(&components.eigenvectors);

        steering
            .tensor
            .outer_iter()
            .into_par_iter()
            .map(|a_q| {
                let fields = a_q.dot(&beamformed);
                let mut weighted = vec![c64::default(); n_level * n_fs];
                let mut response = vec![c64::default(); n_level * n_fs];
                let per_component = fields
                    .axis_iter(Axis(1))
                    .zip(components.eigenvalues.iter())
                    .zip(components.cluster_index.iter());
                for ((field, &lambda), &level) in per_component {
                    let offset = level * n_fs;
                    for (l, (e, &t)) in field.iter().zip(taper.iter()).enumerate() {
                        let p = e.norm_sqr() * t;
                        weighted[offset + l] += lambda * p;
                        response[offset + l] += p;
                    }
                }
                for series in weighted
                    .chunks_exact_mut(n_fs)
                    .chain(response.chunks_exact_mut(n_fs))
                {
                    samples_to_series(series, &**fft, alpha, period);
                }
                (weighted, response)
            })
            .collect()
    }

    /// Evaluate the accumulated series on the pixel grid. After the first
    /// call the imager is finalised and the same images are returned again.
    pub fn as_image(&mut self) -> Result<SynthesisImages<F>, ImagerError> {
        if let Some(images) = &self.images {
            return Ok(images.clone());
        }
        if self.num_snapshots == 0 {
            return Err(ImagerError::NothingAccumulated);
        }

        let grid = self.frame.grid();
        let (rows, cols) = grid.shape();
        let longitudes = grid.longitudes();
        let psi0 = self.frame.window_origin();
        let period = self.frame.period();

        let mut standardized = Array3::<f64>::zeros((self.n_level, rows, cols));
        let mut response = Array3::<f64>::zeros((self.n_level, rows, cols));
        Zip::indexed(standardized.lanes_mut(Axis(2)))
            .and(response.lanes_mut(Axis(2)))
            .par_for_each(|(level, q), mut s_row, mut r_row| {
                let w = self.weighted.slice(s![level, q, ..]).mapv(load_complex);
                let r = self.response.slice(s![level, q, ..]).mapv(load_complex);
                s_row.assign(&evaluate(w.view(), psi0, period, longitudes));
                r_row.assign(&evaluate(r.view(), psi0, period, longitudes));
            });

        let mut least_squares = Array3::<f64>::zeros((self.n_level, rows, cols));
        for ((mut lsq, s), r) in least_squares
            .outer_iter_mut()
            .zip(standardized.outer_iter())
            .zip(response.outer_iter())
        {
            let max = r.fold(0.0_f64, |acc, &v| acc.max(v));
            Zip::from(&mut lsq).and(&s).and(&r).for_each(|l, &s, &r| {
                *l = if r > 0.0 && r > RESPONSE_FLOOR * max {
                    s / r
                } else {
                    0.0
                };
            });
        }

        let images = SynthesisImages {
            standardized: ImageContainer::new(standardized.mapv(F::store), grid.clone())?,
            least_squares: ImageContainer::new(least_squares.mapv(F::store), grid.clone())?,
        };
        debug!(
            "Finalised {} levels from {} snapshots",
            self.n_level, self.num_snapshots
        );
        self.images = Some(images.clone());
        self.state = ImagerState::Finalised;
        Ok(images)
    }

    /// An empty imager with the same configuration. Steering tensors already
    /// computed are shared.
    pub fn fork(&self) -> Self {
        Self {
            wavelength: self.wavelength,
            frame: self.frame.clone(),
            n_level: self.n_level,
            state: ImagerState::Created,
            num_snapshots: 0,
            weighted: Array3::zeros(self.weighted.dim()),
            response: Array3::zeros(self.response.dim()),
            plan: self.plan.clone(),
            steering: self.steering.clone(),
            steering_builds: 0,
            bandwidth_insufficiency: self.bandwidth_insufficiency,
            images: None,
        }
    }

    /// Add the snapshots accumulated by `other`, which must have the same
    /// configuration. Neither imager may be finalised.
    pub fn merge(&mut self, other: Self) -> Result<(), ImagerError> {
        if self.state == ImagerState::Finalised || other.state == ImagerState::Finalised {
            return Err(ImagerError::Finalised);
        }
        if self.wavelength != other.wavelength
            || self.n_level != other.n_level
            || self.frame != other.frame
        {
            return Err(ImagerError::Mismatch);
        }

        self.weighted += &other.weighted;
        self.response += &other.response;
        self.num_snapshots += other.num_snapshots;
        self.steering_builds += other.steering_builds;
        if self.num_snapshots > 0 {
            self.state = ImagerState::Accumulating;
        }
        self.bandwidth_insufficiency = self
            .bandwidth_insufficiency
            .or(other.bandwidth_insufficiency);
        if self.steering.is_none() {
            self.steering = other.steering;
        }
        Ok(())
    }

    /// A snapshot of the accumulated state.
    pub fn checkpoint(&self) -> ImagerCheckpoint<F> {
        ImagerCheckpoint {
            wavelength: self.wavelength,
            n_level: self.n_level,
            n_fs: self.frame.n_fs(),
            grid_shape: self.frame.grid().shape(),
            period: self.frame.period(),
            window_origin: self.frame.window_origin(),
            num_snapshots: self.num_snapshots,
            cursor: None,
            weighted: self.weighted.clone(),
            response: self.response.clone(),
            bandwidth_insufficiency: self.bandwidth_insufficiency,
        }
    }

    /// Replace the accumulated state with a checkpoint's.
    pub fn restore(&mut self, checkpoint: ImagerCheckpoint<F>) -> Result<(), ImagerError> {
        if self.state == ImagerState::Finalised {
            return Err(ImagerError::Finalised);
        }
        let shape = self.weighted.dim();
        let close = |a: f64, b: f64| {
            relative_eq!(a, b, epsilon = f64::EPSILON, max_relative = CHECKPOINT_TOLERANCE)
        };
        if checkpoint.n_level != self.n_level
            || checkpoint.n_fs != self.frame.n_fs()
            || checkpoint.grid_shape != self.frame.grid().shape()
            || !close(checkpoint.wavelength, self.wavelength)
            || !close(checkpoint.period, self.frame.period())
            || !close(checkpoint.window_origin, self.frame.window_origin())
            || checkpoint.weighted.dim() != shape
            || checkpoint.response.dim() != shape
        {
            return Err(ImagerError::Mismatch);
        }

        self.weighted = checkpoint.weighted;
        self.response = checkpoint.response;
        self.num_snapshots = checkpoint.num_snapshots;
        self.bandwidth_insufficiency = checkpoint.bandwidth_insufficiency;
        self.state = if self.num_snapshots > 0 {
            ImagerState::Accumulating
        } else {
            ImagerState::Created
        };
        Ok(())
    }
}

fn add_into<F: SynthesisFloat>(mut acc: ArrayViewMut1<Complex<F>>, values: &[c64]) {
    for (a, v) in acc.iter_mut().zip(values) {
        *a = Complex::new(F::store(a.re.load() + v.re), F::store(a.im.load() + v.im));
    }
}

#[inline]
fn load_complex<F: SynthesisFloat>(c: Complex<F>) -> c64 {
    c64::new(c.re.load(), c.im.load())
}
