use log::{debug, warn};
use serde::Serialize;

use crate::{MapError, StatusOr};

pub mod quadtree;
pub mod tile;

pub use quadtree::TileQuadtree;
pub use tile::{BoundingBox, Tile};

pub const ROOT_ULLON: f64 = -122.2998046875;
pub const ROOT_ULLAT: f64 = 37.892195547244356;
pub const ROOT_LRLON: f64 = -122.2119140625;
pub const ROOT_LRLAT: f64 = 37.82280243352756;
pub const TILE_SIZE: u32 = 256;

/// Deepest level of the tile set: stop once path codes reach 7 digits
pub const MAX_DEPTH: u32 = 7;

/// Deepest level accepted in a config; 4^10 nodes is already over a million
const MAX_SUPPORTED_DEPTH: u32 = 10;

/// Configuration for the tile set being served
#[derive(Clone, Debug)]
pub struct RasterConfig {
    pub root: BoundingBox,       // Area covered by the root tile
    pub tile_size: u32,          // Width of every tile image in pixels
    pub max_depth: u32,          // Level of the smallest tiles
    pub image_root: String,      // Prefix for tile file references
    pub image_extension: String, // Tile image extension, without the dot
}

impl Default for RasterConfig {
    fn default() -> Self {
        Self {
            root: BoundingBox::new(ROOT_ULLON, ROOT_ULLAT, ROOT_LRLON, ROOT_LRLAT),
            tile_size: TILE_SIZE,
            max_depth: MAX_DEPTH,
            image_root: String::new(),
            image_extension: "png".to_string(),
        }
    }
}

impl RasterConfig {
    pub fn validate(&self) -> StatusOr<()> {
        if self.root.is_degenerate() {
            return Err(MapError::ConfigError(format!("degenerate root box {:?}", self.root)));
        }
        if self.tile_size == 0 {
            return Err(MapError::ConfigError("tile size must be positive".to_string()));
        }
        if self.max_depth > MAX_SUPPORTED_DEPTH {
            return Err(MapError::ConfigError(format!(
                "max depth {} exceeds {}",
                self.max_depth, MAX_SUPPORTED_DEPTH
            )));
        }
        Ok(())
    }
}

/// A raster query: the visible box and the viewport size in pixels
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RasterRequest {
    pub ullon: f64,
    pub ullat: f64,
    pub lrlon: f64,
    pub lrlat: f64,
    pub width: f64,
    /// Part of the query contract but not used for tile selection
    pub height: f64,
}

impl RasterRequest {
    pub fn bounds(&self) -> BoundingBox {
        BoundingBox::new(self.ullon, self.ullat, self.lrlon, self.lrlat)
    }
}

/// Tiles to display for a raster query, laid out row by row
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct RasterResult {
    pub render_grid: Vec<Vec<String>>,
    pub raster_ul_lon: f64,
    pub raster_ul_lat: f64,
    pub raster_lr_lon: f64,
    pub raster_lr_lat: f64,
    pub depth: u32,
    pub query_success: bool,
}

impl RasterResult {
    pub fn failure() -> Self {
        Self {
            render_grid: Vec::new(),
            raster_ul_lon: 0.0,
            raster_ul_lat: 0.0,
            raster_lr_lon: 0.0,
            raster_lr_lat: 0.0,
            depth: 0,
            query_success: false,
        }
    }

    pub fn width(&self) -> usize {
        self.render_grid.first().map_or(0, Vec::len)
    }

    pub fn height(&self) -> usize {
        self.render_grid.len()
    }
}

/// Picks the grid of tiles covering a query box at the coarsest sufficient resolution
pub struct Rasterer {
    tree: TileQuadtree,
    config: RasterConfig,
}

impl Rasterer {
    pub fn new(config: RasterConfig) -> StatusOr<Self> {
        config.validate()?;
        let root = Tile::root(config.root, config.tile_size as f64);
        let tree = TileQuadtree::new(root, config.max_depth);
        Ok(Self { tree, config })
    }

    pub fn tree(&self) -> &TileQuadtree {
        &self.tree
    }

    pub fn config(&self) -> &RasterConfig {
        &self.config
    }

    /// Answer a raster query, reporting bad queries through `query_success`.
    pub fn rasterize(&self, request: &RasterRequest) -> RasterResult {
        match self.try_rasterize(request) {
            Ok(result) => result,
            Err(e) => {
                warn!("Raster query failed: {}", e);
                RasterResult::failure()
            }
        }
    }

    pub fn try_rasterize(&self, request: &RasterRequest) -> StatusOr<RasterResult> {
        let query = request.bounds();
        if query.is_degenerate() {
            return Err(MapError::InvalidQueryBox(format!("degenerate box {:?}", query)));
        }
        if !(request.width > 0.0) {
            return Err(MapError::InvalidQueryBox(format!(
                "viewport width {} is not positive",
                request.width
            )));
        }
        if !self.tree.root().bounds.intersects(&query) {
            return Err(MapError::InvalidQueryBox(format!("{:?} is outside the map", query)));
        }

        let londpp_bound = query.lon_width() / request.width;
        let mut tiles = self.tree.select(&query, londpp_bound);
        tiles.sort_by(|a, b| a.raster_order(b));

        let (first, last) = match (tiles.first(), tiles.last()) {
            (Some(first), Some(last)) => (*first, *last),
            _ => return Err(MapError::InvalidQueryBox(format!("no tiles cover {:?}", query))),
        };

        let width = tiles
            .iter()
            .take_while(|t| t.bounds.ullat == first.bounds.ullat)
            .count();
        let render_grid: Vec<Vec<String>> = tiles
            .chunks(width)
            .map(|row| {
                row.iter()
                    .map(|t| t.file_name(&self.config.image_root, &self.config.image_extension))
                    .collect()
            })
            .collect();

        debug!(
            "Raster query {:?} -> {}x{} tiles at depth {}",
            query,
            width,
            render_grid.len(),
            first.depth
        );

        Ok(RasterResult {
            render_grid,
            raster_ul_lon: first.bounds.ullon,
            raster_ul_lat: first.bounds.ullat,
            raster_lr_lon: last.bounds.lrlon,
            raster_lr_lat: last.bounds.lrlat,
            depth: first.depth,
            query_success: true,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn request(ullon: f64, ullat: f64, lrlon: f64, lrlat: f64, width: f64) -> RasterRequest {
        RasterRequest { ullon, ullat, lrlon, lrlat, width, height: width }
    }

    /// Parse the path code back out of a file reference like "1234.png"
    fn code(file: &str) -> u64 {
        file.trim_end_matches(".png").parse().unwrap()
    }

    /// Bounds of a tile given its code, walking down from the configured root
    fn tile_for(rasterer: &Rasterer, code: u64) -> Tile {
        let digits = if code == 0 { String::new() } else { code.to_string() };
        let mut tile = rasterer.tree().root().clone();
        for digit in digits.chars() {
            let idx = digit.to_digit(10).unwrap() as usize - 1;
            tile = tile.children()[idx].clone();
        }
        tile
    }

    /// Checks every property a successful raster result must have
    fn assert_valid_raster(rasterer: &Rasterer, req: &RasterRequest, result: &RasterResult) {
        assert!(result.query_success);
        let height = result.height();
        let width = result.width();
        let tiles: Vec<Tile> = result
            .render_grid
            .iter()
            .flatten()
            .map(|f| tile_for(rasterer, code(f)))
            .collect();
        assert_eq!(height * width, tiles.len(), "grid must be rectangular");
        assert!(result.render_grid.iter().all(|row| row.len() == width));

        // Single depth, fine enough, and no finer than needed
        let bound = req.bounds().lon_width() / req.width;
        for tile in &tiles {
            assert_eq!(tile.depth, result.depth);
            assert!(tile.londpp <= bound || tile.depth == rasterer.tree().max_depth());
            if tile.depth > 0 {
                assert!(tile.londpp * 2.0 > bound, "depth {} is deeper than needed", tile.depth);
            }
            assert!(tile.bounds.intersects(&req.bounds()));
        }

        // Rows share a latitude and columns abut without gaps
        for (i, row) in tiles.chunks(width).enumerate() {
            for pair in row.windows(2) {
                assert_eq!(pair[0].bounds.ullat, pair[1].bounds.ullat);
                assert!((pair[0].bounds.lrlon - pair[1].bounds.ullon).abs() < 1e-12);
            }
            if i + 1 < height {
                let below = &tiles[(i + 1) * width];
                assert!((row[0].bounds.lrlat - below.bounds.ullat).abs() < 1e-12);
            }
        }

        let raster = BoundingBox::new(
            result.raster_ul_lon,
            result.raster_ul_lat,
            result.raster_lr_lon,
            result.raster_lr_lat,
        );
        if rasterer.tree().root().bounds.contains(&req.bounds()) {
            assert!(raster.contains(&req.bounds()), "{:?} does not cover {:?}", raster, req);
        }
    }

    #[test]
    fn test_root_box_returns_root_tile() {
        let rasterer = Rasterer::new(RasterConfig::default()).unwrap();
        let req = request(ROOT_ULLON, ROOT_ULLAT, ROOT_LRLON, ROOT_LRLAT, 256.0);
        let result = rasterer.rasterize(&req);

        assert!(result.query_success);
        assert_eq!(result.render_grid, vec![vec!["0.png".to_string()]]);
        assert_eq!(result.depth, 0);
        assert_eq!(result.raster_ul_lon, ROOT_ULLON);
        assert_eq!(result.raster_lr_lat, ROOT_LRLAT);
    }

    #[test]
    fn test_wider_viewport_descends_one_level() {
        let rasterer = Rasterer::new(RasterConfig::default()).unwrap();
        let req = request(ROOT_ULLON, ROOT_ULLAT, ROOT_LRLON, ROOT_LRLAT, 512.0);
        let result = rasterer.rasterize(&req);

        assert_eq!(result.depth, 1);
        assert_eq!(
            result.render_grid,
            vec![vec!["1.png", "2.png"], vec!["3.png", "4.png"]]
                .into_iter()
                .map(|row| row.into_iter().map(String::from).collect::<Vec<_>>())
                .collect::<Vec<_>>()
        );
        assert_valid_raster(&rasterer, &req, &result);
    }

    #[test]
    fn test_small_box_reaches_deep_tiles() {
        let rasterer = Rasterer::new(RasterConfig::default()).unwrap();
        let req = request(-122.241632, 37.87655, -122.24053, 37.87548, 892.0);
        let result = rasterer.rasterize(&req);

        assert_eq!(result.depth, 7);
        assert_valid_raster(&rasterer, &req, &result);
        assert!(result.width() >= 2);
        assert!(result.height() >= 2);
    }

    #[test]
    fn test_random_boxes_inside_root() {
        let rasterer = Rasterer::new(RasterConfig::default()).unwrap();
        let root = rasterer.tree().root().bounds;
        let mut rng = StdRng::seed_from_u64(42);

        for _ in 0..100 {
            let a = rng.gen_range(root.ullon..root.lrlon);
            let b = rng.gen_range(root.ullon..root.lrlon);
            let c = rng.gen_range(root.lrlat..root.ullat);
            let d = rng.gen_range(root.lrlat..root.ullat);
            if a == b || c == d {
                continue;
            }
            let req = request(a.min(b), c.max(d), a.max(b), c.min(d), rng.gen_range(100.0..2000.0));
            let result = rasterer.rasterize(&req);
            assert_valid_raster(&rasterer, &req, &result);
        }
    }

    #[test]
    fn test_box_overhanging_root_is_clipped() {
        let rasterer = Rasterer::new(RasterConfig::default()).unwrap();
        let req = request(ROOT_ULLON - 1.0, ROOT_ULLAT + 1.0, ROOT_ULLON + 0.01, ROOT_ULLAT - 0.01, 100.0);
        let result = rasterer.rasterize(&req);
        assert!(result.query_success);
        assert_eq!(result.raster_ul_lon, ROOT_ULLON);
        assert_eq!(result.raster_ul_lat, ROOT_ULLAT);
    }

    #[test]
    fn test_invalid_queries_fail() {
        let rasterer = Rasterer::new(RasterConfig::default()).unwrap();
        let bad = [
            // Swapped longitudes
            request(ROOT_LRLON, ROOT_ULLAT, ROOT_ULLON, ROOT_LRLAT, 256.0),
            // Swapped latitudes
            request(ROOT_ULLON, ROOT_LRLAT, ROOT_LRLON, ROOT_ULLAT, 256.0),
            // Outside the map
            request(0.0, 1.0, 1.0, 0.0, 256.0),
            // No viewport
            request(ROOT_ULLON, ROOT_ULLAT, ROOT_LRLON, ROOT_LRLAT, 0.0),
        ];
        for req in &bad {
            assert_eq!(rasterer.rasterize(req), RasterResult::failure());
            assert!(matches!(rasterer.try_rasterize(req), Err(MapError::InvalidQueryBox(_))));
        }
    }

    #[test]
    fn test_image_root_is_prefixed() {
        let config = RasterConfig {
            image_root: "img/".to_string(),
            image_extension: "jpg".to_string(),
            ..Default::default()
        };
        let rasterer = Rasterer::new(config).unwrap();
        let req = request(ROOT_ULLON, ROOT_ULLAT, ROOT_LRLON, ROOT_LRLAT, 256.0);
        assert_eq!(rasterer.rasterize(&req).render_grid, vec![vec!["img/0.jpg".to_string()]]);
    }

    #[test]
    fn test_config_validation() {
        let mut config = RasterConfig::default();
        config.tile_size = 0;
        assert!(matches!(Rasterer::new(config), Err(MapError::ConfigError(_))));

        let mut config = RasterConfig::default();
        config.max_depth = 30;
        assert!(config.validate().is_err());

        let mut config = RasterConfig::default();
        config.root = BoundingBox::new(1.0, 0.0, 0.0, 1.0);
        assert!(config.validate().is_err());
    }
}
