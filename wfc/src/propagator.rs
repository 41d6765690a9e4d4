use coord_2d::{Coord, Size};
#[cfg(test)]
use direction::CardinalDirection;
use direction::{CardinalDirectionTable, CardinalDirections};
use grid_2d::Grid;

use crate::pattern::{AdjacencyRules, PatternId, PatternTable};
use crate::wave::Wave;
use crate::wrap::Wrap;

/// Per direction, how many patterns at the neighbouring cell on the
/// opposite side still allow this pattern here. A count of zero means the
/// pattern is banned at this cell or has lost its last supporter from that
/// side.
#[derive(Debug, Clone, Default, PartialEq)]
struct SupportCounts {
    by_direction: CardinalDirectionTable<u32>,
}

impl SupportCounts {
    fn clear(&mut self) {
        self.by_direction = CardinalDirectionTable::default();
    }
}

/// Arc-consistency engine over the four cardinal directions.
///
/// Owns the adjacency rules, the support counters and a LIFO worklist of
/// freshly banned (cell, pattern) pairs. The wave is a sibling owned by the
/// solver and is passed in by mutable reference for each drain.
pub(crate) struct Propagator {
    size: Size,
    wrap: Wrap,
    rules: AdjacencyRules,
    base: PatternTable<SupportCounts>,
    support: Grid<PatternTable<SupportCounts>>,
    worklist: Vec<(Coord, PatternId)>,
}

impl Propagator {
    pub(crate) fn new(size: Size, rules: AdjacencyRules, wrap: Wrap) -> Self {
        let base = (0..rules.num_patterns() as PatternId)
            .map(|pattern| {
                let mut counts = SupportCounts::default();
                for direction in CardinalDirections {
                    *counts.by_direction.get_mut(direction) =
                        rules.base_support(pattern, direction);
                }
                counts
            })
            .collect::<PatternTable<_>>();
        let support = Grid::new_clone(size, base.clone());
        Self {
            size,
            wrap,
            rules,
            base,
            support,
            worklist: Vec::new(),
        }
    }

    /// Empty the worklist and reset every counter to its base value.
    pub(crate) fn init(&mut self) {
        self.worklist.clear();
        for counts in self.support.iter_mut() {
            counts.clone_from(&self.base);
        }
    }

    pub(crate) fn rules(&self) -> &AdjacencyRules {
        &self.rules
    }

    /// Record that `pattern` has just been banned at `coord`: it can no
    /// longer support anything, so its counters are zeroed, and the ban is
    /// queued for propagation.
    pub(crate) fn ban(&mut self, coord: Coord, pattern: PatternId) {
        self.support.get_checked_mut(coord)[pattern].clear();
        self.worklist.push((coord, pattern));
    }

    /// Drain the worklist, decrementing neighbour support and banning
    /// patterns whose support from some side reaches zero. On return (with
    /// the wave not impossible) the wave is arc-consistent in all four
    /// directions.
    pub(crate) fn propagate(&mut self, wave: &mut Wave) {
        let Self {
            size,
            wrap,
            rules,
            support,
            worklist,
            ..
        } = self;
        while let Some((coord, pattern)) = worklist.pop() {
            for direction in CardinalDirections {
                let neighbour =
                    match wrap.normalize_coord(coord + direction.coord(), *size) {
                        Some(neighbour) => neighbour,
                        None => continue,
                    };
                let cell_support = support.get_checked_mut(neighbour);
                for &allowed in rules.allowed(pattern, direction) {
                    let count = cell_support[allowed].by_direction.get_mut(direction);
                    if *count == 0 {
                        continue;
                    }
                    *count -= 1;
                    if *count == 0 && wave.get(neighbour, allowed) {
                        wave.ban(neighbour, allowed);
                        cell_support[allowed].clear();
                        worklist.push((neighbour, allowed));
                    }
                }
            }
        }
    }

    #[cfg(test)]
    pub(crate) fn worklist_is_empty(&self) -> bool {
        self.worklist.is_empty()
    }

    #[cfg(test)]
    pub(crate) fn support_count(
        &self,
        coord: Coord,
        pattern: PatternId,
        direction: CardinalDirection,
    ) -> u32 {
        *self.support.get_checked(coord)[pattern]
            .by_direction
            .get(direction)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn all_allowed(num_patterns: usize) -> AdjacencyRules {
        AdjacencyRules::from_fn(num_patterns, |_, _, _| true)
    }

    fn wave(size: Size, num_patterns: usize) -> Wave {
        let w = 1.0 / num_patterns as f64;
        Wave::new(size, PatternTable::new_clone(num_patterns, w))
    }

    #[test]
    fn init_restores_base_counts() {
        let size = Size::new(2, 2);
        let mut propagator = Propagator::new(size, all_allowed(3), Wrap::None);
        let coord = Coord::new(0, 0);
        propagator.ban(coord, 1);
        assert!(!propagator.worklist_is_empty());
        assert_eq!(propagator.support_count(coord, 1, CardinalDirection::North), 0);

        propagator.init();
        assert!(propagator.worklist_is_empty());
        for direction in CardinalDirections {
            assert_eq!(propagator.support_count(coord, 1, direction), 3);
        }
    }

    #[test]
    fn ban_cascades_through_support() {
        // Two patterns, each only tolerating itself in any direction: a
        // banned pattern must vanish from the whole connected grid.
        let rules = AdjacencyRules::from_fn(2, |_, p, q| p == q);
        let size = Size::new(3, 1);
        let mut propagator = Propagator::new(size, rules, Wrap::None);
        let mut wave = wave(size, 2);

        wave.ban(Coord::new(0, 0), 0);
        propagator.ban(Coord::new(0, 0), 0);
        propagator.propagate(&mut wave);

        for x in 0..3 {
            assert!(!wave.get(Coord::new(x, 0), 0));
            assert!(wave.get(Coord::new(x, 0), 1));
        }
        assert!(!wave.is_impossible());
    }

    #[test]
    fn torus_wrap_propagates_across_the_seam() {
        let rules = AdjacencyRules::from_fn(2, |_, p, q| p == q);
        let size = Size::new(3, 1);
        let mut propagator = Propagator::new(size, rules, Wrap::Torus);
        let mut wave = wave(size, 2);

        wave.ban(Coord::new(2, 0), 1);
        propagator.ban(Coord::new(2, 0), 1);
        propagator.propagate(&mut wave);

        assert!(!wave.get(Coord::new(0, 0), 1));
        assert!(!wave.get(Coord::new(1, 0), 1));
    }
}
