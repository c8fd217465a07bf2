// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Errors associated with image containers.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ImageError {
    #[error("Image data is {data:?} (levels, rows, columns), but the grid is {grid:?}")]
    Shape {
        data: (usize, usize, usize),
        grid: (usize, usize),
    },

    #[error("Cannot combine images on different pixel grids")]
    GridMismatch,

    #[error("Cannot combine an image with {left} levels with one of {right} levels")]
    LevelMismatch { left: usize, right: usize },
}
