//! # butterfly-tiles
//!
//! Builds a tiled routing graph from raw OpenStreetMap ways, nodes and turn
//! restrictions.
//!
//! ```no_run
//! use butterfly_tiles::{BuildOptions, DirectoryTileWriter, GraphBuilder, OsmData};
//!
//! # fn main() -> butterfly_tiles::Result<()> {
//! let data = OsmData::from_json_file("belgium.json")?;
//! let builder = GraphBuilder::new(BuildOptions::new("/tmp/butterfly-work"))?;
//! let report = builder.build(&data, &DirectoryTileWriter::new("tiles"), None)?;
//! println!("{} tiles", report.tiles_written);
//! # Ok(())
//! # }
//! ```

pub mod builder;
pub mod config;
pub mod error;
pub mod formats;
pub mod graph_id;
pub mod osmdata;
pub mod tiles;

pub use builder::{BuildOptions, BuildReport, DataQuality, Graph, GraphBuilder, TileData, TileWriter};
pub use config::{BuildConfig, ConfigError};
pub use error::{BuildError, Result};
pub use formats::{DirectoryTileWriter, TileContents, TileFile, TileFormatError};
pub use graph_id::{GraphId, InvalidGraphIdError};
pub use osmdata::{OsmData, OsmNode, OsmRestriction, OsmWay, RestrictionType, RoadClass};
pub use tiles::{TileLevel, Tiles, STANDARD_LEVELS};
