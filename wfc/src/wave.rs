use coord_2d::{Coord, Size};
use grid_2d::Grid;
use rand::Rng;

use crate::pattern::{PatternId, PatternTable};

/// Weight bookkeeping for one cell, restricted to the patterns still
/// possible there. Every field is updated incrementally on each ban so the
/// entropy scan never has to walk the pattern axis.
#[derive(Debug, Clone, Copy)]
struct WeightSummary {
    sum: f64,
    sum_log: f64,
    sum_plogp: f64,
    entropy: f64,
    remaining: u32,
}

#[derive(Debug, Clone)]
struct WaveCell {
    possible: PatternTable<bool>,
    summary: WeightSummary,
}

/// Outcome of an entropy scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum EntropyScan {
    /// Some cell has run out of possible patterns.
    Contradiction,
    /// Every cell is down to a single pattern.
    Collapsed,
    /// The uncollapsed cell with the lowest noisy entropy.
    MinEntropyCell(Coord),
}

/// The possibility state: one bit per (cell, pattern) plus the per-cell
/// weight summaries. Bits only ever go from possible to banned during a
/// run; `init` is the only thing that sets them back.
pub(crate) struct Wave {
    weights: PatternTable<f64>,
    plogp: PatternTable<f64>,
    // Strictly below half of any single |w·ln w|, so the tie-breaking noise
    // can never reorder genuinely distinct entropies.
    noise_bound: f64,
    base: WeightSummary,
    grid: Grid<WaveCell>,
    impossible: bool,
}

impl Wave {
    /// `weights` must already be normalised to sum to 1.
    pub(crate) fn new(size: Size, weights: PatternTable<f64>) -> Self {
        let plogp = weights
            .iter()
            .map(|&w| if w > 0.0 { w * w.ln() } else { 0.0 })
            .collect::<PatternTable<f64>>();
        let noise_bound = plogp
            .iter()
            .map(|p| p.abs() / 2.0)
            .fold(f64::INFINITY, f64::min);
        let sum: f64 = weights.iter().sum();
        let sum_plogp: f64 = plogp.iter().sum();
        let sum_log = sum.ln();
        let base = WeightSummary {
            sum,
            sum_log,
            sum_plogp,
            entropy: sum_log - sum_plogp / sum,
            remaining: weights.len() as u32,
        };
        let cell = WaveCell {
            possible: PatternTable::new_clone(weights.len(), true),
            summary: base,
        };
        Self {
            weights,
            plogp,
            noise_bound,
            base,
            grid: Grid::new_clone(size, cell),
            impossible: false,
        }
    }

    pub(crate) fn init(&mut self) {
        self.impossible = false;
        let base = self.base;
        for cell in self.grid.iter_mut() {
            cell.possible.iter_mut().for_each(|p| *p = true);
            cell.summary = base;
        }
    }

    pub(crate) fn size(&self) -> Size {
        self.grid.size()
    }

    pub(crate) fn num_patterns(&self) -> usize {
        self.weights.len()
    }

    pub(crate) fn weight(&self, pattern: PatternId) -> f64 {
        self.weights[pattern]
    }

    pub(crate) fn get(&self, coord: Coord, pattern: PatternId) -> bool {
        self.grid.get_checked(coord).possible[pattern]
    }

    #[cfg(test)]
    pub(crate) fn is_impossible(&self) -> bool {
        self.impossible
    }

    pub(crate) fn remaining(&self, coord: Coord) -> u32 {
        self.grid.get_checked(coord).summary.remaining
    }

    pub(crate) fn entropy(&self, coord: Coord) -> f64 {
        self.grid.get_checked(coord).summary.entropy
    }

    #[cfg(test)]
    pub(crate) fn sum(&self, coord: Coord) -> f64 {
        self.grid.get_checked(coord).summary.sum
    }

    /// Remove `pattern` from the possibility set at `coord`. A no-op when it
    /// is already banned.
    pub(crate) fn ban(&mut self, coord: Coord, pattern: PatternId) {
        let cell = self.grid.get_checked_mut(coord);
        if !cell.possible[pattern] {
            return;
        }
        cell.possible[pattern] = false;
        let summary = &mut cell.summary;
        summary.sum -= self.weights[pattern];
        summary.sum_log = summary.sum.ln();
        summary.sum_plogp -= self.plogp[pattern];
        summary.entropy = summary.sum_log - summary.sum_plogp / summary.sum;
        summary.remaining -= 1;
        if summary.remaining == 0 {
            self.impossible = true;
        }
    }

    /// Scan every cell for the lowest entropy, with a small uniform noise
    /// per candidate as tie-break. Cells that are already down to one
    /// pattern are skipped; on exact ties the first cell in scan order wins.
    pub(crate) fn min_entropy<R: Rng>(&self, rng: &mut R) -> EntropyScan {
        if self.impossible {
            return EntropyScan::Contradiction;
        }
        let mut min = f64::INFINITY;
        let mut argmin = None;
        for (coord, cell) in self.grid.enumerate() {
            if cell.summary.remaining == 1 {
                continue;
            }
            let entropy = cell.summary.entropy;
            if entropy <= min {
                let noise = if self.noise_bound > 0.0 {
                    rng.gen_range(0.0..self.noise_bound)
                } else {
                    0.0
                };
                if entropy + noise < min {
                    min = entropy + noise;
                    argmin = Some(coord);
                }
            }
        }
        match argmin {
            Some(coord) => EntropyScan::MinEntropyCell(coord),
            None => EntropyScan::Collapsed,
        }
    }

    /// The lowest-indexed pattern still possible at `coord`. After a
    /// successful run this is the cell's unique assignment.
    pub(crate) fn first_possible(&self, coord: Coord) -> Option<PatternId> {
        self.grid
            .get_checked(coord)
            .possible
            .enumerate()
            .find(|&(_, &possible)| possible)
            .map(|(pattern, _)| pattern)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use rand::SeedableRng;
    use rand_xorshift::XorShiftRng;

    fn uniform_wave(size: Size, num_patterns: usize) -> Wave {
        let w = 1.0 / num_patterns as f64;
        Wave::new(size, PatternTable::new_clone(num_patterns, w))
    }

    fn rng() -> XorShiftRng {
        XorShiftRng::seed_from_u64(7)
    }

    #[test]
    fn summaries_track_bans() {
        let mut wave = uniform_wave(Size::new(2, 2), 4);
        let coord = Coord::new(1, 0);
        assert_eq!(wave.remaining(coord), 4);
        assert!((wave.sum(coord) - 1.0).abs() < 1e-9);

        wave.ban(coord, 2);
        wave.ban(coord, 2); // second ban of the same pattern is a no-op
        assert_eq!(wave.remaining(coord), 3);
        assert!((wave.sum(coord) - 0.75).abs() < 1e-9);
        assert!(!wave.get(coord, 2));
        assert!(wave.get(coord, 0));

        // Entropy of three equally likely patterns.
        let expected = 3.0f64.ln();
        assert!((wave.entropy(coord) - expected).abs() < 1e-9);
        // Other cells are untouched.
        assert!((wave.entropy(Coord::new(0, 0)) - 4.0f64.ln()).abs() < 1e-9);
    }

    #[test]
    fn banning_everything_flags_impossible() {
        let mut wave = uniform_wave(Size::new(1, 2), 2);
        let coord = Coord::new(0, 1);
        wave.ban(coord, 0);
        assert!(!wave.is_impossible());
        wave.ban(coord, 1);
        assert!(wave.is_impossible());
        assert_eq!(wave.min_entropy(&mut rng()), EntropyScan::Contradiction);

        wave.init();
        assert!(!wave.is_impossible());
        assert_eq!(wave.remaining(coord), 2);
        assert!(wave.get(coord, 0));
    }

    #[test]
    fn min_entropy_prefers_the_narrowed_cell() {
        let mut wave = uniform_wave(Size::new(3, 1), 3);
        let narrowed = Coord::new(1, 0);
        wave.ban(narrowed, 0);
        match wave.min_entropy(&mut rng()) {
            EntropyScan::MinEntropyCell(coord) => assert_eq!(coord, narrowed),
            other => panic!("unexpected scan outcome: {:?}", other),
        }
    }

    #[test]
    fn min_entropy_skips_collapsed_cells() {
        let mut wave = uniform_wave(Size::new(2, 1), 2);
        wave.ban(Coord::new(0, 0), 1);
        wave.ban(Coord::new(1, 0), 0);
        assert_eq!(wave.min_entropy(&mut rng()), EntropyScan::Collapsed);
        assert_eq!(wave.first_possible(Coord::new(0, 0)), Some(0));
        assert_eq!(wave.first_possible(Coord::new(1, 0)), Some(1));
    }

    #[test]
    fn single_pattern_wave_does_not_panic_on_noise() {
        // One pattern of weight 1 has |w·ln w| = 0, so the noise range is
        // degenerate.
        let wave = uniform_wave(Size::new(2, 2), 1);
        assert_eq!(wave.min_entropy(&mut rng()), EntropyScan::Collapsed);
    }
}
