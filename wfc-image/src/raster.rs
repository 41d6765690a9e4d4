use coord_2d::{Coord, Size};
use grid_2d::Grid;
use image::{DynamicImage, Rgba, RgbaImage};
use std::hash::{Hash, Hasher};

/// An owned RGBA pixel grid.
///
/// Used both for whole sample/tile images and for the small N×N pattern
/// windows cut out of them, which is why it hashes and compares by pixel
/// bytes: pattern deduplication keys on content, never identity.
#[derive(Clone, Debug)]
pub struct Raster {
    grid: Grid<Rgba<u8>>,
}

impl Raster {
    pub fn from_image(image: &DynamicImage) -> Self {
        let rgba = image.to_rgba8();
        let grid = Grid::new_fn(Size::new(rgba.width(), rgba.height()), |Coord { x, y }| {
            *rgba.get_pixel(x as u32, y as u32)
        });
        Self { grid }
    }

    pub fn new_fn<F: FnMut(Coord) -> Rgba<u8>>(size: Size, f: F) -> Self {
        Self {
            grid: Grid::new_fn(size, f),
        }
    }

    pub fn new_fill(size: Size, pixel: Rgba<u8>) -> Self {
        Self {
            grid: Grid::new_clone(size, pixel),
        }
    }

    pub fn size(&self) -> Size {
        self.grid.size()
    }

    pub fn get(&self, coord: Coord) -> Rgba<u8> {
        *self.grid.get_checked(coord)
    }

    pub fn set(&mut self, coord: Coord, pixel: Rgba<u8>) {
        *self.grid.get_checked_mut(coord) = pixel;
    }

    /// Quarter-turn rotation. Panics on non-square rasters: only square
    /// tiles and pattern windows are ever rotated.
    pub fn rotate(&self) -> Raster {
        let size = self.size();
        assert_eq!(size.width(), size.height(), "rotated raster must be square");
        let n = size.width() as i32;
        Self {
            grid: Grid::new_fn(size, |Coord { x, y }| {
                *self.grid.get_checked(Coord::new(n - 1 - y, x))
            }),
        }
    }

    /// Horizontal mirror. Panics on non-square rasters, matching `rotate`.
    pub fn mirror(&self) -> Raster {
        let size = self.size();
        assert_eq!(size.width(), size.height(), "mirrored raster must be square");
        let n = size.width() as i32;
        Self {
            grid: Grid::new_fn(size, |Coord { x, y }| {
                *self.grid.get_checked(Coord::new(n - 1 - x, y))
            }),
        }
    }

    /// A window copied out of this raster, wrapping modulo the source size.
    /// Non-wrapping extraction is achieved by restricting window origins.
    pub fn sub_window(&self, top_left: Coord, size: Size) -> Raster {
        Self {
            grid: Grid::new_fn(size, |coord| *self.grid.get_tiled(top_left + coord)),
        }
    }

    pub fn to_image(&self) -> RgbaImage {
        let size = self.size();
        let mut image = RgbaImage::new(size.width(), size.height());
        for (Coord { x, y }, pixel) in self.grid.enumerate() {
            image.put_pixel(x as u32, y as u32, *pixel);
        }
        image
    }
}

impl PartialEq for Raster {
    fn eq(&self, other: &Self) -> bool {
        self.size() == other.size()
            && self.grid.iter().zip(other.grid.iter()).all(|(a, b)| a == b)
    }
}

impl Eq for Raster {}

impl Hash for Raster {
    fn hash<H: Hasher>(&self, state: &mut H) {
        for pixel in self.grid.iter() {
            pixel.0.hash(state);
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use hashbrown::HashMap;

    fn px(v: u8) -> Rgba<u8> {
        Rgba([v, v, v, 255])
    }

    fn raster_2x2(a: u8, b: u8, c: u8, d: u8) -> Raster {
        // a b
        // c d
        Raster::new_fn(Size::new(2, 2), |Coord { x, y }| match (x, y) {
            (0, 0) => px(a),
            (1, 0) => px(b),
            (0, 1) => px(c),
            _ => px(d),
        })
    }

    #[test]
    fn rotate_is_a_quarter_turn() {
        let r = raster_2x2(1, 2, 3, 4);
        let rotated = r.rotate();
        // 1 2        2 4
        // 3 4   ->   1 3
        assert_eq!(rotated, raster_2x2(2, 4, 1, 3));
        assert_eq!(r.rotate().rotate().rotate().rotate(), r);
    }

    #[test]
    fn mirror_is_an_involution() {
        let r = raster_2x2(1, 2, 3, 4);
        assert_eq!(r.mirror(), raster_2x2(2, 1, 4, 3));
        assert_eq!(r.mirror().mirror(), r);
    }

    #[test]
    fn sub_window_wraps() {
        let r = raster_2x2(1, 2, 3, 4);
        let window = r.sub_window(Coord::new(1, 1), Size::new(2, 2));
        assert_eq!(window, raster_2x2(4, 3, 2, 1));
    }

    #[test]
    fn content_hashing_deduplicates() {
        let mut seen = HashMap::new();
        seen.insert(raster_2x2(1, 2, 3, 4), 0u32);
        assert!(seen.contains_key(&raster_2x2(1, 2, 3, 4)));
        assert!(!seen.contains_key(&raster_2x2(4, 3, 2, 1)));
    }
}
