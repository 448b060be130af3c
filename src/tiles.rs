//! Spatial tile index
//!
//! Row-major bucketing of the world bounding box into square tiles of a fixed
//! size (in degrees) per hierarchy level.

use serde::{Deserialize, Serialize};

use crate::graph_id::{GraphId, InvalidGraphIdError, MAX_TILE_INDEX};

const MIN_LAT: f64 = -90.0;
const MAX_LAT: f64 = 90.0;
const MIN_LON: f64 = -180.0;
const MAX_LON: f64 = 180.0;

/// Latitude/longitude bounding box of a tile
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TileBounds {
    pub min_lat: f64,
    pub min_lon: f64,
    pub max_lat: f64,
    pub max_lon: f64,
}

impl TileBounds {
    pub fn contains(&self, lat: f64, lon: f64) -> bool {
        lat >= self.min_lat && lat <= self.max_lat && lon >= self.min_lon && lon <= self.max_lon
    }
}

/// A regular grid of tiles covering the world
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tiles {
    tile_size: f64,
    ncolumns: u32,
    nrows: u32,
}

impl Tiles {
    /// Create a grid with the given tile size in degrees.
    ///
    /// Returns `None` for non-positive or non-finite sizes, and for grids
    /// with more tiles than a [`GraphId`] can address.
    pub fn new(tile_size: f64) -> Option<Self> {
        if !tile_size.is_finite() || tile_size <= 0.0 {
            return None;
        }
        let ncolumns = ((MAX_LON - MIN_LON) / tile_size).ceil();
        let nrows = ((MAX_LAT - MIN_LAT) / tile_size).ceil();
        if ncolumns * nrows > f64::from(MAX_TILE_INDEX) + 1.0 {
            return None;
        }
        let ncolumns = ncolumns as u32;
        let nrows = nrows as u32;
        Some(Self {
            tile_size,
            ncolumns,
            nrows,
        })
    }

    pub fn tile_size(&self) -> f64 {
        self.tile_size
    }

    pub fn ncolumns(&self) -> u32 {
        self.ncolumns
    }

    pub fn nrows(&self) -> u32 {
        self.nrows
    }

    pub fn tile_count(&self) -> u32 {
        self.ncolumns.saturating_mul(self.nrows)
    }

    /// Row of the tile containing `lat`, clamped so that 90 falls in the last row
    pub fn row(&self, lat: f64) -> Option<u32> {
        if !lat.is_finite() || !(MIN_LAT..=MAX_LAT).contains(&lat) {
            return None;
        }
        let row = ((lat - MIN_LAT) / self.tile_size).floor() as u32;
        Some(row.min(self.nrows - 1))
    }

    /// Column of the tile containing `lon`, clamped so that 180 falls in the last column
    pub fn col(&self, lon: f64) -> Option<u32> {
        if !lon.is_finite() || !(MIN_LON..=MAX_LON).contains(&lon) {
            return None;
        }
        let col = ((lon - MIN_LON) / self.tile_size).floor() as u32;
        Some(col.min(self.ncolumns - 1))
    }

    /// Tile index for a coordinate, or `None` if the coordinate is invalid
    pub fn tile_id(&self, lat: f64, lon: f64) -> Option<u32> {
        self.row(lat)?.checked_mul(self.ncolumns)?.checked_add(self.col(lon)?)
    }

    /// Bounding box of a tile, or `None` if the index is outside the grid
    pub fn tile_bounds(&self, tile_id: u32) -> Option<TileBounds> {
        if tile_id >= self.tile_count() {
            return None;
        }
        let row = tile_id / self.ncolumns;
        let col = tile_id % self.ncolumns;
        let min_lat = MIN_LAT + f64::from(row) * self.tile_size;
        let min_lon = MIN_LON + f64::from(col) * self.tile_size;
        Some(TileBounds {
            min_lat,
            min_lon,
            max_lat: (min_lat + self.tile_size).min(MAX_LAT),
            max_lon: (min_lon + self.tile_size).min(MAX_LON),
        })
    }
}

/// One level of the tile hierarchy
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TileLevel {
    pub level: u8,
    pub name: &'static str,
    pub tiles: Tiles,
}

impl TileLevel {
    const fn standard(level: u8, name: &'static str, tile_size: f64, ncolumns: u32, nrows: u32) -> Self {
        TileLevel {
            level,
            name,
            tiles: Tiles {
                tile_size,
                ncolumns,
                nrows,
            },
        }
    }

    /// Look up one of the [`STANDARD_LEVELS`].
    pub fn from_level(level: u8) -> Option<&'static TileLevel> {
        STANDARD_LEVELS.iter().find(|l| l.level == level)
    }

    /// Base graph id (entry index 0) of the tile containing a coordinate.
    ///
    /// The outer `Option` is `None` for invalid coordinates.
    pub fn graph_id(&self, lat: f64, lon: f64) -> Option<Result<GraphId, InvalidGraphIdError>> {
        self.tiles
            .tile_id(lat, lon)
            .map(|tile| GraphId::try_from_components(self.level, tile, 0))
    }
}

/// Highway (4°), arterial (1°) and local (0.25°) levels
pub static STANDARD_LEVELS: [TileLevel; 3] = [
    TileLevel::standard(0, "highway", 4.0, 90, 45),
    TileLevel::standard(1, "arterial", 1.0, 360, 180),
    TileLevel::standard(2, "local", 0.25, 1440, 720),
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_levels_match_computed_grids() {
        for level in &STANDARD_LEVELS {
            let computed = Tiles::new(level.tiles.tile_size()).unwrap();
            assert_eq!(computed, level.tiles, "level {}", level.name);
        }
    }

    #[test]
    fn grids_beyond_the_tile_index_range_are_rejected() {
        assert!(Tiles::new(0.0001).is_none());
        assert!(Tiles::new(0.0).is_none());
        assert!(Tiles::new(f64::NAN).is_none());

        let fine = Tiles::new(360.0 / 2048.0).unwrap();
        assert_eq!(fine.tile_count(), 2048 * 1024);
        assert_eq!(fine.tile_id(89.9, 179.9), Some(2048 * 1024 - 1));
        // 4096 x 2048 tiles no longer fit in the tile index
        assert!(Tiles::new(360.0 / 4096.0).is_none());
    }

    #[test]
    fn tile_id_is_row_major() {
        let tiles = Tiles::new(1.0).unwrap();
        assert_eq!(tiles.tile_id(-90.0, -180.0), Some(0));
        assert_eq!(tiles.tile_id(-90.0, -179.5), Some(0));
        assert_eq!(tiles.tile_id(-90.0, -179.0), Some(1));
        assert_eq!(tiles.tile_id(-89.0, -180.0), Some(360));
        // Brussels
        assert_eq!(tiles.tile_id(50.85, 4.35), Some(140 * 360 + 184));
    }

    #[test]
    fn grid_edges_are_clamped() {
        let tiles = Tiles::new(0.25).unwrap();
        assert_eq!(tiles.tile_id(90.0, 180.0), Some(tiles.tile_count() - 1));
        assert_eq!(tiles.col(180.0), Some(tiles.ncolumns() - 1));
        assert_eq!(tiles.row(90.0), Some(tiles.nrows() - 1));
    }

    #[test]
    fn invalid_coordinates_have_no_tile() {
        let tiles = Tiles::new(4.0).unwrap();
        assert_eq!(tiles.tile_id(91.0, 0.0), None);
        assert_eq!(tiles.tile_id(0.0, -180.5), None);
        assert_eq!(tiles.tile_id(f64::NAN, 0.0), None);
        assert!(Tiles::new(0.0).is_none());
        assert!(Tiles::new(-1.0).is_none());
    }

    #[test]
    fn tile_bounds_contain_their_coordinates() {
        let tiles = Tiles::new(0.25).unwrap();
        for &(lat, lon) in &[(50.85, 4.35), (-33.86, 151.21), (0.0, 0.0), (89.99, -179.99)] {
            let id = tiles.tile_id(lat, lon).unwrap();
            let bounds = tiles.tile_bounds(id).unwrap();
            assert!(bounds.contains(lat, lon), "({lat}, {lon}) not in {bounds:?}");
        }
        assert!(tiles.tile_bounds(tiles.tile_count()).is_none());
    }

    #[test]
    fn graph_id_uses_level() {
        let local = TileLevel::from_level(2).unwrap();
        let id = local.graph_id(50.85, 4.35).unwrap().unwrap();
        assert_eq!(id.level(), 2);
        assert_eq!(id.entry_index(), 0);
        assert_eq!(Some(id.tile_index()), local.tiles.tile_id(50.85, 4.35));
        assert!(TileLevel::from_level(3).is_none());
    }
}
