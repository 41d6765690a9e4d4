use coord_2d::{Coord, Size};
use direction::{CardinalDirection, CardinalDirectionTable, CardinalDirections};
use grid_2d::Grid;
use wfc::{AdjacencyRules, PatternId, Wfc, Wrap};

use crate::raster::Raster;
use crate::BuildError;

/// A mosaic tile: a single image and a weight. Orientations are not
/// expanded; the rules name tiles directly.
pub struct MosaicTile {
    pub image: Raster,
    pub weight: f64,
}

/// The dense directional relation read from a mosaic rules file:
/// `allowed(direction, a, b)` means tile `b` may sit in `direction` of
/// tile `a`.
pub struct NeighborTable {
    count: usize,
    allowed: CardinalDirectionTable<Vec<bool>>,
}

impl NeighborTable {
    pub fn new(count: usize) -> Self {
        let mut allowed = CardinalDirectionTable::default();
        for direction in CardinalDirections {
            *allowed.get_mut(direction) = vec![false; count * count];
        }
        Self { count, allowed }
    }

    pub fn allow(&mut self, direction: CardinalDirection, a: usize, b: usize) {
        self.allowed.get_mut(direction)[a * self.count + b] = true;
    }

    fn get(&self, direction: CardinalDirection, a: usize, b: usize) -> bool {
        self.allowed.get(direction)[a * self.count + b]
    }
}

/// Synthesis over whole-image tiles with explicit directional adjacency.
pub struct MosaicWfc {
    tiles: Vec<MosaicTile>,
    pins: Vec<(Coord, PatternId)>,
    tile_px: u32,
    solver: Wfc,
}

impl MosaicWfc {
    /// The declared relation is symmetrised: a rule present in either
    /// direction admits the pair, and a one-sided declaration is logged as
    /// a warning before being accepted.
    pub fn new(
        size: Size,
        tiles: Vec<MosaicTile>,
        neighbors: &NeighborTable,
        periodic_output: bool,
    ) -> Result<Self, BuildError> {
        if tiles.is_empty() {
            return Err(BuildError::EmptyTileSet);
        }
        assert_eq!(neighbors.count, tiles.len());

        let adjacency = AdjacencyRules::from_fn(tiles.len(), |direction, a, b| {
            let forward = neighbors.get(direction, a as usize, b as usize);
            let backward = neighbors.get(direction.opposite(), b as usize, a as usize);
            if backward && !forward {
                log::warn!(
                    "one-sided neighbor rule: {} allows {} towards {:?} only via the reverse declaration",
                    a,
                    b,
                    direction,
                );
            }
            forward || backward
        });

        let weights = tiles.iter().map(|tile| tile.weight).collect();
        let wrap = if periodic_output { Wrap::Torus } else { Wrap::None };
        let solver = Wfc::new(size, adjacency, weights, wrap)?;
        let tile_px = tiles[0].image.size().width();

        Ok(Self {
            tiles,
            pins: Vec::new(),
            tile_px,
            solver,
        })
    }

    /// Force a cell to one tile on every subsequent run.
    pub fn pin_tile(&mut self, coord: Coord, tile: usize) {
        self.pins.push((coord, tile as PatternId));
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

    fn render(&self, chosen: &Grid<PatternId>) -> Raster {
        let t = self.tile_px as i32;
        let out_size = Size::new(
            chosen.size().width() * self.tile_px,
            chosen.size().height() * self.tile_px,
        );
        let mut out = Raster::new_fill(out_size, image::Rgba([0, 0, 0, 255]));
        for (coord, &id) in chosen.enumerate() {
            let image = &self.tiles[id as usize].image;
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
