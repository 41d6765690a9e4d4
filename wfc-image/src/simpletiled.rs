use coord_2d::{Coord, Size};
use direction::{CardinalDirection, CardinalDirectionTable, CardinalDirections};
use grid_2d::Grid;
use wfc::{AdjacencyRules, PatternId, Wfc, Wrap};

use crate::raster::Raster;
use crate::symmetry::Symmetry;
use crate::BuildError;

/// A tile with its oriented images, index-aligned with the symmetry class's
/// orientation maps.
pub struct Tile {
    pub images: Vec<Raster>,
    pub symmetry: Symmetry,
    pub weight: f64,
}

impl Tile {
    pub fn new(image: Raster, symmetry: Symmetry, weight: f64) -> Self {
        Self {
            images: symmetry.orientations_of(&image),
            symmetry,
            weight,
        }
    }

    /// For "unique" tile sets: the caller supplies one pre-drawn image per
    /// orientation instead of having them generated.
    pub fn from_orientations(images: Vec<Raster>, symmetry: Symmetry, weight: f64) -> Self {
        assert_eq!(images.len(), symmetry.orientations() as usize);
        Self {
            images,
            symmetry,
            weight,
        }
    }
}

/// A directional rule between oriented tiles as declared in a tile set:
/// `left` may appear immediately west of `right`.
#[derive(Debug, Clone)]
pub struct NeighborRule {
    pub left_tile: usize,
    pub left_orientation: u32,
    pub right_tile: usize,
    pub right_orientation: u32,
}

/// For each of the eight group actions (four rotations, then their
/// reflections), where the action sends each orientation index of the
/// class.
fn action_map(symmetry: Symmetry) -> [Vec<u32>; 8] {
    let rotation = symmetry.rotation_map();
    let reflection = symmetry.reflection_map();
    let mut map: [Vec<u32>; 8] = Default::default();
    map[0] = (0..symmetry.orientations()).collect();
    for action in 1..8 {
        map[action] = if action == 4 {
            map[0].iter().map(|&o| reflection[o as usize]).collect()
        } else {
            map[action - 1].iter().map(|&o| rotation[o as usize]).collect()
        };
    }
    map
}

/// The direction a west-of rule maps to under each group action.
const ACTION_DIRECTIONS: [CardinalDirection; 8] = [
    CardinalDirection::East,
    CardinalDirection::North,
    CardinalDirection::West,
    CardinalDirection::South,
    CardinalDirection::West,
    CardinalDirection::South,
    CardinalDirection::East,
    CardinalDirection::North,
];

/// Synthesis over a set of named tiles with symmetry-expanded orientations
/// and explicit neighbour rules.
pub struct SimpleTiledWfc {
    tiles: Vec<Tile>,
    /// pattern id → (tile index, orientation index)
    patterns: Vec<(usize, u32)>,
    /// tile index → orientation index → pattern id
    pattern_ids: Vec<Vec<PatternId>>,
    pins: Vec<(Coord, PatternId)>,
    tile_px: u32,
    solver: Wfc,
}

impl SimpleTiledWfc {
    pub fn new(
        size: Size,
        tiles: Vec<Tile>,
        rules: &[NeighborRule],
        periodic_output: bool,
    ) -> Result<Self, BuildError> {
        if tiles.is_empty() {
            return Err(BuildError::EmptyTileSet);
        }

        let mut patterns = Vec::new();
        let mut pattern_ids = Vec::with_capacity(tiles.len());
        for (tile_index, tile) in tiles.iter().enumerate() {
            let mut ids = Vec::with_capacity(tile.images.len());
            for orientation in 0..tile.images.len() as u32 {
                ids.push(patterns.len() as PatternId);
                patterns.push((tile_index, orientation));
            }
            pattern_ids.push(ids);
        }
        let pattern_count = patterns.len();

        // Expand each declared rule through the whole dihedral group into a
        // dense relation, symmetrised via the opposite direction, then
        // compact it into adjacency lists.
        let mut dense: CardinalDirectionTable<Vec<bool>> = CardinalDirectionTable::default();
        for direction in CardinalDirections {
            *dense.get_mut(direction) = vec![false; pattern_count * pattern_count];
        }
        for rule in rules {
            let left_map = action_map(tiles[rule.left_tile].symmetry);
            let right_map = action_map(tiles[rule.right_tile].symmetry);
            for (action, &direction) in ACTION_DIRECTIONS.iter().enumerate() {
                let left_orientation = left_map[action][rule.left_orientation as usize];
                let right_orientation = right_map[action][rule.right_orientation as usize];
                let p1 = pattern_ids[rule.left_tile][left_orientation as usize] as usize;
                let p2 = pattern_ids[rule.right_tile][right_orientation as usize] as usize;
                dense.get_mut(direction)[p1 * pattern_count + p2] = true;
                dense.get_mut(direction.opposite())[p2 * pattern_count + p1] = true;
            }
        }
        let adjacency = AdjacencyRules::from_fn(pattern_count, |direction, p, q| {
            dense.get(direction)[p as usize * pattern_count + q as usize]
        });

        let weights = pattern_weights(&tiles);
        let wrap = if periodic_output { Wrap::Torus } else { Wrap::None };
        let solver = Wfc::new(size, adjacency, weights, wrap)?;
        let tile_px = tiles[0].images[0].size().width();

        Ok(Self {
            tiles,
            patterns,
            pattern_ids,
            pins: Vec::new(),
            tile_px,
            solver,
        })
    }

    pub fn num_patterns(&self) -> usize {
        self.patterns.len()
    }

    /// Force a cell to one oriented tile on every subsequent run.
    pub fn pin_tile(&mut self, coord: Coord, tile: usize, orientation: u32) {
        let pattern = self.pattern_ids[tile][orientation as usize];
        self.pins.push((coord, pattern));
    }

    pub fn execute(&mut self, seed: u64) -> Option<Raster> {
        let chosen = self.collapse_grid(seed)?;
        Some(self.render(&chosen))
    }

    fn collapse_grid(&mut self, seed: u64) -> Option<Grid<PatternId>> {
        self.solver.init();
        if !self.pins.is_empty() {
            for &(coord, pattern) in &self.pins {
                self.solver.pin(coord, pattern);
            }
            self.solver.propagate();
        }
        self.solver.execute(seed)
    }

    /// Place each chosen oriented tile image into its cell.
    fn render(&self, chosen: &Grid<PatternId>) -> Raster {
        let t = self.tile_px as i32;
        let out_size = Size::new(
            chosen.size().width() * self.tile_px,
            chosen.size().height() * self.tile_px,
        );
        let mut out = Raster::new_fill(out_size, image::Rgba([0, 0, 0, 255]));
        for (coord, &id) in chosen.enumerate() {
            let (tile, orientation) = self.patterns[id as usize];
            let image = &self.tiles[tile].images[orientation as usize];
            for dy in 0..t {
                for dx in 0..t {
                    out.set(
                        Coord::new(coord.x * t + dx, coord.y * t + dy),
                        image.get(Coord::new(dx, dy)),
                    );
                }
            }
        }
        out
    }
}

/// Each (tile, orientation) pattern carries an equal share of its tile's
/// declared weight.
fn pattern_weights(tiles: &[Tile]) -> Vec<f64> {
    let mut weights = Vec::new();
    for tile in tiles {
        let orientations = tile.images.len();
        for _ in 0..orientations {
            weights.push(tile.weight / orientations as f64);
        }
    }
    weights
}
