//! Image-facing front ends for the `wfc` solver.
//!
//! Three rule producers share the solver: `overlapping` extracts N×N
//! patterns from a sample image, `simpletiled` expands named tiles through
//! their symmetry classes, and `mosaic` takes explicit per-direction
//! adjacency between whole tile images. Each also renders a solved pattern
//! grid back into a raster.

pub mod mosaic;
pub mod overlapping;
pub mod raster;
pub mod simpletiled;
pub mod symmetry;

use std::error::Error;
use std::fmt;

pub use coord_2d::{Coord, Size};
pub use raster::Raster;
pub use symmetry::Symmetry;

/// Why a front end could not be constructed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildError {
    /// The pattern weights summed to zero.
    Weights(wfc::ZeroWeightSum),
    /// `ground` was requested but the sample's bottom-centre window is not
    /// among the extracted patterns.
    GroundPatternNotFound,
    /// A tiled front end was given no tiles.
    EmptyTileSet,
}

impl fmt::Display for BuildError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            BuildError::Weights(e) => write!(f, "{}", e),
            BuildError::GroundPatternNotFound => {
                write!(f, "ground pattern not found in the sample image")
            }
            BuildError::EmptyTileSet => write!(f, "tile set is empty"),
        }
    }
}

impl Error for BuildError {}

impl From<wfc::ZeroWeightSum> for BuildError {
    fn from(e: wfc::ZeroWeightSum) -> Self {
        BuildError::Weights(e)
    }
}
