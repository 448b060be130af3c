//! Parallel tile writing
//!
//! One task per tile on a dedicated rayon pool. Tasks only read the sealed
//! graph; the first failing tile aborts the pool and is returned.

use log::info;
use rayon::prelude::*;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::builder::edge::{Edge, ShapePoint};
use crate::builder::node::Node;
use crate::builder::node_map::Restriction;
use crate::builder::signs::NodeSigns;
use crate::builder::Graph;
use crate::error::{BuildError, Result};
use crate::formats::tile::TileFormatError;
use crate::graph_id::GraphId;

/// Everything a writer needs for one tile
#[derive(Debug)]
pub struct TileData<'a> {
    /// Base id (entry 0) of the tile
    pub tile: GraphId,
    pub nodes: &'a [Node],
    /// Edges whose source lies in this tile, with their global index
    pub edges: Vec<(u64, Edge)>,
    /// Shape points of `edges`, concatenated in edge order
    pub shapes: Vec<ShapePoint>,
    pub signs: &'a [NodeSigns],
    /// Restrictions anchored at a node in this tile
    pub restrictions: &'a [Restriction],
}

/// Persistence for finished tiles. Called concurrently from the writer pool.
pub trait TileWriter: Sync {
    fn write_tile(&self, tile: &TileData<'_>) -> std::result::Result<(), TileFormatError>;
}

/// Called with (tiles done, tiles total) after each tile
pub type ProgressCallback = Arc<dyn Fn(u64, u64) + Send + Sync>;

#[derive(Clone)]
pub struct WriteOptions {
    pub threads: usize,
    pub progress: Option<ProgressCallback>,
}

impl Default for WriteOptions {
    fn default() -> Self {
        Self {
            threads: num_cpus::get(),
            progress: None,
        }
    }
}

impl std::fmt::Debug for WriteOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WriteOptions")
            .field("threads", &self.threads)
            .field("progress", &self.progress.is_some())
            .finish()
    }
}

/// Gather the view of one tile from the shared graph
pub fn tile_data(graph: &Graph, tile: GraphId) -> Result<TileData<'_>> {
    let tile_index = tile.tile_index();
    let nodes = graph.nodes.tile(tile_index).unwrap_or(&[]);

    let mut indices: Vec<u32> = nodes.iter().flat_map(|node| node.edges.iter().copied()).collect();
    indices.sort_unstable();
    indices.dedup();

    let mut edges = Vec::with_capacity(indices.len());
    let mut shapes = Vec::new();
    for index in indices {
        let index = u64::from(index);
        let edge = graph.edges.get(index)?;
        if edge.source.tile_index() != tile_index {
            continue;
        }
        shapes.extend(graph.shapes.slice(edge.shape_index, u64::from(edge.shape_count))?);
        edges.push((index, edge));
    }

    Ok(TileData {
        tile,
        nodes,
        edges,
        shapes,
        signs: graph.signs.get(&tile_index).map(Vec::as_slice).unwrap_or(&[]),
        restrictions: graph.restrictions.get(&tile_index).map(Vec::as_slice).unwrap_or(&[]),
    })
}

/// Write every non-empty tile in ascending tile order. Returns the number of
/// tiles written; on error no further tiles are started and the pool has
/// joined before returning.
pub fn write_tiles(graph: &Graph, writer: &dyn TileWriter, options: &WriteOptions) -> Result<usize> {
    let tiles: Vec<GraphId> = graph.nodes.tile_bases().collect();
    let total = tiles.len() as u64;
    let done = AtomicU64::new(0);

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(options.threads.max(1))
        .thread_name(|i| format!("tile-writer-{i}"))
        .build()?;

    info!("Writing {} tiles on {} threads", total, options.threads.max(1));

    pool.install(|| {
        tiles.par_iter().try_for_each(|&tile| -> Result<()> {
            let data = tile_data(graph, tile)?;
            writer
                .write_tile(&data)
                .map_err(|source| BuildError::TileWrite { tile, source })?;

            let finished = done.fetch_add(1, Ordering::Relaxed) + 1;
            if let Some(progress) = &options.progress {
                progress(finished, total);
            }
            Ok(())
        })
    })?;

    Ok(tiles.len())
}
