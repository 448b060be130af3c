//! Error types for the tile builder
//!
//! Data defects (degenerate ways, dangling restrictions, over-long link chains)
//! are never errors: they are counted in [`crate::builder::DataQuality`] and
//! the build continues. Everything here is structural and aborts the build.

use std::path::PathBuf;
use thiserror::Error;

use crate::formats::sequence::SequenceError;
use crate::formats::tile::TileFormatError;
use crate::graph_id::{GraphId, InvalidGraphIdError};

/// Convenience result type
pub type Result<T> = std::result::Result<T, BuildError>;

#[derive(Debug, Error)]
pub enum BuildError {
    /// A tile ran out of entry slots or a coordinate produced an unrepresentable id
    #[error("cannot allocate a slot in tile {tile}: {source}")]
    TileSlot {
        tile: u32,
        #[source]
        source: InvalidGraphIdError,
    },

    /// A node was allocated at a coordinate outside the tile grid
    #[error("coordinate ({lat}, {lon}) has no tile")]
    InvalidCoordinate { lat: f64, lon: f64 },

    /// Edge or way positions no longer fit their 32-bit index fields
    #[error("{what} index {index} exceeds the 32-bit index range")]
    IndexOverflow { what: &'static str, index: u64 },

    /// A graph id was looked up that was never issued
    #[error("graph id {0} does not refer to an allocated node")]
    UnknownNode(GraphId),

    #[error("unsupported hierarchy level {0}")]
    UnsupportedLevel(u8),

    #[error("edge or shape sequence failure: {0}")]
    Sequence(#[from] SequenceError),

    #[error("failed to write tile {tile}: {source}")]
    TileWrite {
        tile: GraphId,
        #[source]
        source: TileFormatError,
    },

    #[error("failed to build the writer thread pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    #[error("failed to read input {path}: {source}")]
    Input {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid input document: {0}")]
    InputFormat(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
