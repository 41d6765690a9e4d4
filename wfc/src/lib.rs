//! Constraint-propagation pattern synthesis.
//!
//! The solver places opaque patterns into a grid so that every pair of
//! adjacent cells satisfies a set of directional adjacency rules, choosing
//! cells by minimum Shannon entropy. Front ends that turn images and tile
//! sets into rules (and solved grids back into images) live in the
//! `wfc_image` crate.

pub mod pattern;
mod propagator;
mod solver;
mod wave;
pub mod wrap;

pub use coord_2d::{Coord, Size};
pub use grid_2d::Grid;
pub use pattern::{AdjacencyRules, PatternId, PatternTable};
pub use solver::{Wfc, ZeroWeightSum};
pub use wrap::Wrap;
