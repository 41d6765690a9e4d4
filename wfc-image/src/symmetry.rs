use crate::raster::Raster;

/// Dihedral symmetry class of a tile shape, written with the conventional
/// glyphs: the letter (or backslash) looks like a tile with that symmetry.
/// The class decides how many of the eight orientations of a tile are
/// visually distinct, and how rotation and reflection permute them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Symmetry {
    X,
    I,
    L,
    T,
    Backslash,
    F,
}

impl Symmetry {
    pub fn from_char(c: char) -> Option<Symmetry> {
        match c {
            'X' => Some(Symmetry::X),
            'I' => Some(Symmetry::I),
            'L' => Some(Symmetry::L),
            'T' => Some(Symmetry::T),
            '\\' => Some(Symmetry::Backslash),
            'F' => Some(Symmetry::F),
            _ => None,
        }
    }

    /// Number of distinct orientations.
    pub fn orientations(self) -> u32 {
        match self {
            Symmetry::X => 1,
            Symmetry::I | Symmetry::Backslash => 2,
            Symmetry::T | Symmetry::L => 4,
            Symmetry::F => 8,
        }
    }

    /// Where a quarter-turn rotation sends each orientation index.
    pub fn rotation_map(self) -> &'static [u32] {
        match self {
            Symmetry::X => &[0],
            Symmetry::I | Symmetry::Backslash => &[1, 0],
            Symmetry::T | Symmetry::L => &[1, 2, 3, 0],
            Symmetry::F => &[1, 2, 3, 0, 5, 6, 7, 4],
        }
    }

    /// Where a reflection sends each orientation index.
    pub fn reflection_map(self) -> &'static [u32] {
        match self {
            Symmetry::X => &[0],
            Symmetry::I => &[0, 1],
            Symmetry::Backslash => &[1, 0],
            Symmetry::T => &[0, 3, 2, 1],
            Symmetry::L => &[1, 0, 3, 2],
            Symmetry::F => &[4, 7, 6, 5, 0, 3, 2, 1],
        }
    }

    /// Generate the distinct oriented images of a tile, index-aligned with
    /// the rotation and reflection maps.
    pub fn orientations_of(self, base: &Raster) -> Vec<Raster> {
        let mut oriented = Vec::with_capacity(self.orientations() as usize);
        oriented.push(base.clone());
        match self {
            Symmetry::X => {}
            Symmetry::I | Symmetry::Backslash => {
                oriented.push(base.rotate());
            }
            Symmetry::T | Symmetry::L => {
                for _ in 0..3 {
                    oriented.push(oriented.last().unwrap().rotate());
                }
            }
            Symmetry::F => {
                for _ in 0..3 {
                    oriented.push(oriented.last().unwrap().rotate());
                }
                oriented.push(oriented.last().unwrap().rotate().mirror());
                for _ in 0..3 {
                    oriented.push(oriented.last().unwrap().rotate());
                }
            }
        }
        oriented
    }
}
