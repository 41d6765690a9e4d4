use coord_2d::{Coord, Size};
use grid_2d::Grid;
use rand::{Rng, SeedableRng};
use rand_xorshift::XorShiftRng;
use std::error::Error;
use std::fmt;

use crate::pattern::{AdjacencyRules, PatternId, PatternTable};
use crate::propagator::Propagator;
use crate::wave::{EntropyScan, Wave};
use crate::wrap::Wrap;

/// Construction failed because the weight vector summed to zero, so no
/// probability distribution can be formed over the patterns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ZeroWeightSum;

impl fmt::Display for ZeroWeightSum {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "pattern weights sum to zero")
    }
}

impl Error for ZeroWeightSum {}

fn normalize(weights: Vec<f64>) -> Result<PatternTable<f64>, ZeroWeightSum> {
    let sum: f64 = weights.iter().sum();
    if sum <= 0.0 {
        return Err(ZeroWeightSum);
    }
    Ok(weights.into_iter().map(|w| w / sum).collect())
}

enum Observation {
    Failure,
    Success,
    Continue,
}

/// The solver: a wave and a propagator over the same grid, plus the
/// observe/propagate control loop.
///
/// A run goes `init` → any number of `ban`/`pin` preconditionings plus one
/// `propagate` to drain them → `execute`. `execute` does not reset state
/// itself, so callers can seed constraints between `init` and the run.
pub struct Wfc {
    wave: Wave,
    propagator: Propagator,
}

impl Wfc {
    /// Weights are copied and normalised once, here. The solver starts in
    /// the same state `init` produces.
    pub fn new(
        size: Size,
        rules: AdjacencyRules,
        weights: Vec<f64>,
        wrap: Wrap,
    ) -> Result<Self, ZeroWeightSum> {
        assert_eq!(rules.num_patterns(), weights.len());
        let weights = normalize(weights)?;
        Ok(Self {
            wave: Wave::new(size, weights),
            propagator: Propagator::new(size, rules, wrap),
        })
    }

    /// Reset wave and propagator to their post-construction state.
    pub fn init(&mut self) {
        self.wave.init();
        self.propagator.init();
    }

    pub fn size(&self) -> Size {
        self.wave.size()
    }

    pub fn num_patterns(&self) -> usize {
        self.wave.num_patterns()
    }

    pub fn rules(&self) -> &AdjacencyRules {
        self.propagator.rules()
    }

    /// Whether `pattern` is still possible at `coord`.
    pub fn is_possible(&self, coord: Coord, pattern: PatternId) -> bool {
        self.wave.get(coord, pattern)
    }

    /// Number of patterns still possible at `coord`.
    pub fn remaining(&self, coord: Coord) -> u32 {
        self.wave.remaining(coord)
    }

    /// Current entropy of the cell at `coord`.
    pub fn entropy(&self, coord: Coord) -> f64 {
        self.wave.entropy(coord)
    }

    /// Pre-conditioning primitive: ban a single pattern at a cell and queue
    /// the ban. Does not propagate — batch bans, then call [`propagate`].
    ///
    /// [`propagate`]: Wfc::propagate
    pub fn ban(&mut self, coord: Coord, pattern: PatternId) {
        if self.wave.get(coord, pattern) {
            self.wave.ban(coord, pattern);
            self.propagator.ban(coord, pattern);
        }
    }

    /// Ban every pattern at `coord` except `pattern`.
    pub fn pin(&mut self, coord: Coord, pattern: PatternId) {
        for p in 0..self.wave.num_patterns() as PatternId {
            if p != pattern {
                self.ban(coord, p);
            }
        }
    }

    /// Drain queued bans to arc-consistency.
    pub fn propagate(&mut self) {
        self.propagator.propagate(&mut self.wave);
    }

    /// Run observe/propagate to completion with a deterministic RNG seeded
    /// from `seed`. Returns the solved pattern grid, or `None` on
    /// contradiction — an ordinary outcome, left to the caller to retry.
    pub fn execute(&mut self, seed: u64) -> Option<Grid<PatternId>> {
        let mut rng = XorShiftRng::seed_from_u64(seed);
        loop {
            match self.observe(&mut rng) {
                Observation::Success => return Some(self.solved_grid()),
                Observation::Failure => return None,
                Observation::Continue => self.propagator.propagate(&mut self.wave),
            }
        }
    }

    fn observe<R: Rng>(&mut self, rng: &mut R) -> Observation {
        let coord = match self.wave.min_entropy(rng) {
            EntropyScan::Contradiction => return Observation::Failure,
            EntropyScan::Collapsed => return Observation::Success,
            EntropyScan::MinEntropyCell(coord) => coord,
        };

        let num_patterns = self.wave.num_patterns() as PatternId;
        let mut sum = 0.0;
        for p in 0..num_patterns {
            if self.wave.get(coord, p) {
                sum += self.wave.weight(p);
            }
        }
        let mut remaining = if sum > 0.0 {
            rng.gen_range(0.0..sum)
        } else {
            0.0
        };

        // Walk patterns in index order; the pattern whose weight takes the
        // sampled value to zero is chosen. Accumulated floating-point error
        // can leave the walk unfinished, in which case the last possible
        // pattern stands in.
        let mut chosen = None;
        for p in 0..num_patterns {
            if !self.wave.get(coord, p) {
                continue;
            }
            remaining -= self.wave.weight(p);
            chosen = Some(p);
            if remaining <= 0.0 {
                break;
            }
        }
        let chosen = chosen.expect("observed cell has no possible pattern");

        for p in 0..num_patterns {
            if p != chosen && self.wave.get(coord, p) {
                self.wave.ban(coord, p);
                self.propagator.ban(coord, p);
            }
        }
        Observation::Continue
    }

    fn solved_grid(&self) -> Grid<PatternId> {
        Grid::new_fn(self.wave.size(), |coord| {
            self.wave
                .first_possible(coord)
                .expect("solved wave has an empty cell")
        })
    }

    #[cfg(test)]
    pub(crate) fn wave(&self) -> &Wave {
        &self.wave
    }

    #[cfg(test)]
    pub(crate) fn propagator(&self) -> &Propagator {
        &self.propagator
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use direction::{CardinalDirection, CardinalDirections};

    /// Patterns tolerate every pair except two copies of pattern 0 side by
    /// side.
    fn no_adjacent_zeros() -> AdjacencyRules {
        AdjacencyRules::from_fn(2, |_, p, q| !(p == 0 && q == 0))
    }

    #[test]
    fn zero_weights_are_rejected() {
        let result = Wfc::new(
            Size::new(2, 2),
            no_adjacent_zeros(),
            vec![0.0, 0.0],
            Wrap::None,
        );
        assert_eq!(result.err(), Some(ZeroWeightSum));
    }

    #[test]
    fn ban_then_propagate_reaches_arc_consistency() {
        let mut wfc = Wfc::new(
            Size::new(2, 2),
            no_adjacent_zeros(),
            vec![1.0, 1.0],
            Wrap::None,
        )
        .unwrap();

        // Remove pattern 1 from the origin; the origin is then committed to
        // pattern 0, which forces both edge-adjacent cells to pattern 1.
        wfc.ban(Coord::new(0, 0), 1);
        wfc.propagate();

        let wave = wfc.wave();
        assert!(wave.get(Coord::new(0, 0), 0));
        assert!(!wave.get(Coord::new(0, 0), 1));
        for coord in [Coord::new(1, 0), Coord::new(0, 1)] {
            assert!(!wave.get(coord, 0));
            assert!(wave.get(coord, 1));
        }
        // The diagonal cell keeps both options.
        let diagonal = Coord::new(1, 1);
        assert!(wave.get(diagonal, 0));
        assert!(wave.get(diagonal, 1));

        assert!((wave.entropy(Coord::new(0, 0))).abs() < 1e-9);
        assert!((wave.entropy(diagonal) - 2.0f64.ln()).abs() < 1e-9);
        assert!(!wave.is_impossible());
    }

    #[test]
    fn incompatible_pins_contradict() {
        // 1×2 grid where each pattern only tolerates itself horizontally.
        let rules = AdjacencyRules::from_fn(2, |direction, p, q| match direction {
            CardinalDirection::East | CardinalDirection::West => p == q,
            _ => true,
        });
        let mut wfc = Wfc::new(Size::new(2, 1), rules, vec![1.0, 1.0], Wrap::None).unwrap();
        wfc.pin(Coord::new(0, 0), 0);
        wfc.pin(Coord::new(1, 0), 1);
        wfc.propagate();
        assert!(wfc.wave().is_impossible());
        assert_eq!(wfc.execute(0), None);
    }

    #[test]
    fn execute_is_deterministic_per_seed() {
        let mut wfc = Wfc::new(
            Size::new(4, 4),
            no_adjacent_zeros(),
            vec![1.0, 3.0],
            Wrap::Torus,
        )
        .unwrap();

        wfc.init();
        let first = wfc.execute(42).expect("collapse succeeded");
        wfc.init();
        let second = wfc.execute(42).expect("collapse succeeded");
        assert!(first.iter().zip(second.iter()).all(|(a, b)| a == b));

        // Every adjacent pair in the result respects the rules.
        for (coord, &pattern) in first.enumerate() {
            for direction in CardinalDirections {
                let neighbour = (coord + direction.coord()).normalize(Size::new(4, 4));
                let neighbour_pattern = *first.get_checked(neighbour);
                assert!(wfc
                    .rules()
                    .allowed(pattern, direction)
                    .contains(&neighbour_pattern));
            }
        }
    }

    #[test]
    fn init_restores_post_construction_state() {
        let mut wfc = Wfc::new(
            Size::new(3, 3),
            no_adjacent_zeros(),
            vec![1.0, 1.0],
            Wrap::None,
        )
        .unwrap();
        let baseline_entropy = wfc.wave().entropy(Coord::new(1, 1));

        assert!(wfc.execute(9).is_some());
        wfc.init();

        for y in 0..3 {
            for x in 0..3 {
                let coord = Coord::new(x, y);
                assert_eq!(wfc.wave().remaining(coord), 2);
                assert!((wfc.wave().entropy(coord) - baseline_entropy).abs() < 1e-12);
            }
        }
        assert!(wfc.propagator().worklist_is_empty());
        for direction in CardinalDirections {
            // Base support for pattern 1 is the full pattern count; for
            // pattern 0 it excludes itself.
            assert_eq!(
                wfc.propagator()
                    .support_count(Coord::new(1, 1), 1, direction),
                2
            );
            assert_eq!(
                wfc.propagator()
                    .support_count(Coord::new(1, 1), 0, direction),
                1
            );
        }
    }
}
