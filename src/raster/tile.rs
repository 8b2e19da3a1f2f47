use serde::Serialize;
use std::cmp::Ordering;

/// Axis-aligned box in longitude/latitude space, given by its upper-left and
/// lower-right corners
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BoundingBox {
    pub ullon: f64,
    pub ullat: f64,
    pub lrlon: f64,
    pub lrlat: f64,
}

impl BoundingBox {
    pub fn new(ullon: f64, ullat: f64, lrlon: f64, lrlat: f64) -> Self {
        Self { ullon, ullat, lrlon, lrlat }
    }

    /// True unless the box has positive width and height.
    pub fn is_degenerate(&self) -> bool {
        // Written so that NaN coordinates count as degenerate
        !(self.ullon < self.lrlon && self.ullat > self.lrlat)
    }

    pub fn lon_width(&self) -> f64 {
        self.lrlon - self.ullon
    }

    /// Closed-interval overlap: boxes sharing only an edge intersect.
    pub fn intersects(&self, other: &BoundingBox) -> bool {
        !(self.lrlon < other.ullon || other.lrlon < self.ullon)
            && !(self.lrlat > other.ullat || other.lrlat > self.ullat)
    }

    pub fn contains(&self, other: &BoundingBox) -> bool {
        self.ullon <= other.ullon
            && self.ullat >= other.ullat
            && self.lrlon >= other.lrlon
            && self.lrlat <= other.lrlat
    }
}

/// A pre-rendered image tile in the quadtree
#[derive(Debug, Clone, PartialEq)]
pub struct Tile {
    /// Path from the root: one digit per level, 1..=4 for NW, NE, SW, SE.
    /// The root is 0.
    pub code: u64,

    /// Level in the tree, 0 for the root. Equals the digit count of `code`
    /// for every other tile.
    pub depth: u32,

    pub bounds: BoundingBox,

    /// Longitude covered by a single pixel
    pub londpp: f64,
}

impl Tile {
    pub fn root(bounds: BoundingBox, tile_size: f64) -> Self {
        Self {
            code: 0,
            depth: 0,
            londpp: bounds.lon_width() / tile_size,
            bounds,
        }
    }

    /// Split into NW, NE, SW, SE quadrants at half the resolution.
    pub fn children(&self) -> [Tile; 4] {
        let BoundingBox { ullon, ullat, lrlon, lrlat } = self.bounds;
        let midlon = (lrlon - ullon) / 2.0 + ullon;
        let midlat = (ullat - lrlat) / 2.0 + lrlat;

        let child = |digit: u64, bounds: BoundingBox| Tile {
            code: self.code * 10 + digit,
            depth: self.depth + 1,
            bounds,
            londpp: self.londpp / 2.0,
        };

        [
            child(1, BoundingBox::new(ullon, ullat, midlon, midlat)),
            child(2, BoundingBox::new(midlon, ullat, lrlon, midlat)),
            child(3, BoundingBox::new(ullon, midlat, midlon, lrlat)),
            child(4, BoundingBox::new(midlon, midlat, lrlon, lrlat)),
        ]
    }

    /// File reference for this tile: `<image_root><code>.<extension>`
    pub fn file_name(&self, image_root: &str, extension: &str) -> String {
        format!("{}{}.{}", image_root, self.code, extension)
    }

    /// Row-major order: north to south, then west to east.
    pub fn raster_order(&self, other: &Tile) -> Ordering {
        other
            .bounds
            .ullat
            .total_cmp(&self.bounds.ullat)
            .then(self.bounds.ullon.total_cmp(&other.bounds.ullon))
    }
}
