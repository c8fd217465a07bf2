// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Errors from running imaging passes over snapshots.

use hifitime::Epoch;
use thiserror::Error;

use crate::{
    estimate::EstimatorError, frame::FrameError, gram::GramError, image::ImageError,
    imager::ImagerError, processor::ProcessorError,
};

/// Something went wrong with a single snapshot.
#[derive(Error, Debug)]
pub enum SnapshotError {
    #[error("Couldn't read the snapshot: {0}")]
    Read(Box<dyn std::error::Error + Send + Sync>),

    #[error(transparent)]
    Gram(#[from] GramError),

    #[error(transparent)]
    Estimator(#[from] EstimatorError),

    #[error(transparent)]
    Processor(#[from] ProcessorError),

    #[error(transparent)]
    Imager(#[from] ImagerError),
}

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("The snapshot source has no snapshots")]
    NoSnapshots,

    #[error("Snapshot {index} ({timestamp}): {source}")]
    Snapshot {
        index: usize,
        timestamp: Epoch,
        source: SnapshotError,
    },

    #[error(transparent)]
    Estimator(#[from] EstimatorError),

    #[error(transparent)]
    Frame(#[from] FrameError),

    #[error(transparent)]
    Imager(#[from] ImagerError),

    #[error(transparent)]
    Image(#[from] ImageError),
}
