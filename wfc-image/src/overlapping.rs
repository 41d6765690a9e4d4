use coord_2d::{Coord, Size};
use grid_2d::Grid;
use hashbrown::HashMap;
use image::Rgba;
use wfc::{AdjacencyRules, PatternId, Wfc, Wrap};

use crate::raster::Raster;
use crate::BuildError;

/// Options for synthesis from overlapping N×N windows of a sample image.
#[derive(Debug, Clone)]
pub struct OverlappingOptions {
    /// Window side length N.
    pub pattern_size: u32,
    /// How many of the eight dihedral transforms of each window to admit,
    /// in the canonical order id, mirror, rot, rot·mirror, rot², ….
    pub symmetry: u32,
    /// Whether windows wrap around the sample's edges.
    pub periodic_input: bool,
    /// Whether the output wraps (and so tiles seamlessly).
    pub periodic_output: bool,
    /// Pin the sample's bottom-centre window along the bottom output row.
    pub ground: bool,
    /// Output image size in pixels.
    pub output_size: Size,
}

impl OverlappingOptions {
    /// The solver grid. A non-periodic output leaves the last N−1 rows and
    /// columns to be filled by extrapolating the boundary patterns.
    pub fn wave_size(&self) -> Size {
        if self.periodic_output {
            self.output_size
        } else {
            let margin = self.pattern_size - 1;
            Size::new(
                self.output_size.width() - margin,
                self.output_size.height() - margin,
            )
        }
    }
}

/// The first `count` entries of the canonical transform chain.
fn transforms(base: &Raster, count: u32) -> Vec<Raster> {
    let count = count.clamp(1, 8) as usize;
    let mut out = Vec::with_capacity(count);
    out.push(base.clone());
    if count > 1 {
        out.push(out[0].mirror());
    }
    if count > 2 {
        out.push(out[0].rotate());
    }
    if count > 3 {
        out.push(out[2].mirror());
    }
    if count > 4 {
        out.push(out[2].rotate());
    }
    if count > 5 {
        out.push(out[4].mirror());
    }
    if count > 6 {
        out.push(out[4].rotate());
    }
    if count > 7 {
        out.push(out[6].mirror());
    }
    out
}

/// Do the two patterns agree on the overlap obtained by shifting `b` by
/// `offset` over `a`?
fn agrees(a: &Raster, b: &Raster, offset: Coord) -> bool {
    let width = a.size().width() as i32;
    let height = a.size().height() as i32;
    let x_min = offset.x.max(0);
    let x_max = if offset.x < 0 { offset.x + width } else { width };
    let y_min = offset.y.max(0);
    let y_max = if offset.y < 0 { offset.y + height } else { height };
    for y in y_min..y_max {
        for x in x_min..x_max {
            if a.get(Coord::new(x, y)) != b.get(Coord::new(x - offset.x, y - offset.y)) {
                return false;
            }
        }
    }
    true
}

/// Slide an N×N window over the sample, expand each window through the
/// requested transforms, and deduplicate by pixel content. Pattern indices
/// follow first-insertion order of the scan, and weights count occurrences.
fn extract_patterns(input: &Raster, options: &OverlappingOptions) -> (Vec<Raster>, Vec<f64>) {
    let n = options.pattern_size;
    let window_size = Size::new(n, n);
    let (max_x, max_y) = if options.periodic_input {
        (input.size().width(), input.size().height())
    } else {
        (
            input.size().width() - n + 1,
            input.size().height() - n + 1,
        )
    };

    let mut patterns = Vec::new();
    let mut weights = Vec::new();
    let mut seen: HashMap<Raster, usize> = HashMap::new();
    for y in 0..max_y as i32 {
        for x in 0..max_x as i32 {
            let window = input.sub_window(Coord::new(x, y), window_size);
            for variant in transforms(&window, options.symmetry) {
                match seen.get(&variant) {
                    Some(&index) => weights[index] += 1.0,
                    None => {
                        seen.insert(variant.clone(), patterns.len());
                        patterns.push(variant);
                        weights.push(1.0);
                    }
                }
            }
        }
    }
    (patterns, weights)
}

/// Synthesis from overlapping patterns of a sample image.
pub struct OverlappingWfc {
    patterns: Vec<Raster>,
    ground: Option<PatternId>,
    options: OverlappingOptions,
    solver: Wfc,
}

impl OverlappingWfc {
    pub fn new(input: Raster, options: OverlappingOptions) -> Result<Self, BuildError> {
        let (patterns, weights) = extract_patterns(&input, &options);
        let rules = AdjacencyRules::from_fn(patterns.len(), |direction, p, q| {
            agrees(
                &patterns[p as usize],
                &patterns[q as usize],
                direction.coord(),
            )
        });
        let wrap = if options.periodic_output {
            Wrap::Torus
        } else {
            Wrap::None
        };
        let solver = Wfc::new(options.wave_size(), rules, weights, wrap)?;

        let ground = if options.ground {
            let n = options.pattern_size;
            let bottom_centre = Coord::new(
                (input.size().width() / 2) as i32,
                input.size().height() as i32 - 1,
            );
            let wanted = input.sub_window(bottom_centre, Size::new(n, n));
            let index = patterns
                .iter()
                .position(|pattern| *pattern == wanted)
                .ok_or(BuildError::GroundPatternNotFound)?;
            Some(index as PatternId)
        } else {
            None
        };

        Ok(Self {
            patterns,
            ground,
            options,
            solver,
        })
    }

    pub fn patterns(&self) -> &[Raster] {
        &self.patterns
    }

    pub fn ground_pattern(&self) -> Option<PatternId> {
        self.ground
    }

    /// Reset the solver, re-apply ground preconditioning and run to
    /// completion. `None` is a contradiction; retry with another seed.
    pub fn execute(&mut self, seed: u64) -> Option<Raster> {
        let chosen = self.collapse_grid(seed)?;
        Some(self.render(&chosen))
    }

    fn collapse_grid(&mut self, seed: u64) -> Option<Grid<PatternId>> {
        self.solver.init();
        if let Some(ground) = self.ground {
            self.seed_ground(ground);
        }
        self.solver.execute(seed)
    }

    /// Restrict the bottom wave row to the ground pattern and ban the
    /// ground pattern everywhere else, then drain the queued bans.
    fn seed_ground(&mut self, ground: PatternId) {
        let size = self.options.wave_size();
        let bottom = size.height() as i32 - 1;
        for x in 0..size.width() as i32 {
            self.solver.pin(Coord::new(x, bottom), ground);
        }
        for y in 0..bottom {
            for x in 0..size.width() as i32 {
                self.solver.ban(Coord::new(x, y), ground);
            }
        }
        self.solver.propagate();
    }

    /// Write each cell's pattern's top-left pixel; for a non-periodic
    /// output, complete the right and bottom margins from the boundary
    /// cells' full patterns.
    fn render(&self, chosen: &Grid<PatternId>) -> Raster {
        let mut out = Raster::new_fill(self.options.output_size, Rgba([0, 0, 0, 255]));
        for (coord, &id) in chosen.enumerate() {
            out.set(coord, self.patterns[id as usize].get(Coord::new(0, 0)));
        }
        if !self.options.periodic_output {
            let n = self.options.pattern_size as i32;
            let wave = self.options.wave_size();
            let right = wave.width() as i32 - 1;
            let bottom = wave.height() as i32 - 1;
            for y in 0..wave.height() as i32 {
                let pattern = &self.patterns[*chosen.get_checked(Coord::new(right, y)) as usize];
                for dx in 1..n {
                    out.set(Coord::new(right + dx, y), pattern.get(Coord::new(dx, 0)));
                }
            }
            for x in 0..wave.width() as i32 {
                let pattern = &self.patterns[*chosen.get_checked(Coord::new(x, bottom)) as usize];
                for dy in 1..n {
                    out.set(Coord::new(x, bottom + dy), pattern.get(Coord::new(0, dy)));
                }
            }
            let corner = &self.patterns[*chosen.get_checked(Coord::new(right, bottom)) as usize];
            for dy in 1..n {
                for dx in 1..n {
                    out.set(
                        Coord::new(right + dx, bottom + dy),
                        corner.get(Coord::new(dx, dy)),
                    );
                }
            }
        }
        out
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use direction::CardinalDirection;

    fn px(v: u8) -> Rgba<u8> {
        Rgba([v, v, v, 255])
    }

    /// Three vertical stripes of distinct colours.
    fn stripes() -> Raster {
        Raster::new_fn(Size::new(3, 3), |Coord { x, .. }| px(x as u8 * 10))
    }

    /// Sky over a single distinct bottom row.
    fn grounded_sample() -> Raster {
        Raster::new_fn(Size::new(4, 4), |Coord { y, .. }| {
            if y == 3 {
                px(200)
            } else {
                px(30)
            }
        })
    }

    fn options(size: Size) -> OverlappingOptions {
        OverlappingOptions {
            pattern_size: 2,
            symmetry: 1,
            periodic_input: true,
            periodic_output: true,
            ground: false,
            output_size: size,
        }
    }

    #[test]
    fn extraction_counts_occurrences() {
        let (patterns, weights) = extract_patterns(&stripes(), &options(Size::new(6, 6)));
        // Three distinct 2×2 windows (one per column phase), each seen in
        // three rows.
        assert_eq!(patterns.len(), 3);
        assert!(weights.iter().all(|&w| w == 3.0));
    }

    #[test]
    fn agreement_matches_pixel_overlap() {
        let (patterns, _) = extract_patterns(&stripes(), &options(Size::new(6, 6)));
        // The column-phase chain: each pattern's right half is the next
        // pattern's left half.
        assert!(agrees(&patterns[0], &patterns[1], CardinalDirection::East.coord()));
        assert!(!agrees(&patterns[0], &patterns[0], CardinalDirection::East.coord()));
        // Vertically every pattern repeats itself.
        assert!(agrees(&patterns[0], &patterns[0], CardinalDirection::South.coord()));
        assert!(!agrees(&patterns[0], &patterns[1], CardinalDirection::South.coord()));
    }

    #[test]
    fn wave_size_shrinks_when_not_periodic() {
        let mut opts = options(Size::new(8, 8));
        opts.pattern_size = 3;
        opts.periodic_output = false;
        assert_eq!(opts.wave_size(), Size::new(6, 6));
        opts.periodic_output = true;
        assert_eq!(opts.wave_size(), Size::new(8, 8));
    }

    #[test]
    fn periodic_stripe_synthesis_is_deterministic() {
        let mut front = OverlappingWfc::new(stripes(), options(Size::new(6, 6))).unwrap();
        let first = front.execute(42).expect("stripes always collapse");
        let second = front.execute(42).expect("stripes always collapse");
        assert_eq!(first, second);
        assert_eq!(first.size(), Size::new(6, 6));
    }

    #[test]
    fn ground_row_is_pinned_and_banned_elsewhere() {
        let mut opts = options(Size::new(8, 8));
        opts.ground = true;
        opts.periodic_output = false;
        let mut front = OverlappingWfc::new(grounded_sample(), opts).unwrap();
        let ground = front.ground_pattern().expect("ground pattern located");

        let chosen = front.collapse_grid(1).expect("grounded sample collapses");
        let bottom = chosen.size().height() as i32 - 1;
        for (coord, &id) in chosen.enumerate() {
            if coord.y == bottom {
                assert_eq!(id, ground);
            } else {
                assert_ne!(id, ground);
            }
        }
    }

    #[test]
    fn missing_ground_pattern_fails_construction() {
        // Non-periodic input never produces the wrapping bottom-centre
        // window of this sample, whose bottom row only appears wrapped.
        let mut opts = options(Size::new(8, 8));
        opts.ground = true;
        opts.periodic_input = false;
        let result = OverlappingWfc::new(grounded_sample(), opts);
        assert!(matches!(result, Err(BuildError::GroundPatternNotFound)));
    }
}
