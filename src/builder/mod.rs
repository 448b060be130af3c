//! Graph construction pipeline
//!
//! Phase 1 runs on the calling thread: edge construction, node maps and
//! restriction rewriting, link reclassification and signage. It ends when the
//! node arenas are sealed and the edge sequence is frozen. Phase 2 writes the
//! tiles in parallel from that read-only [`Graph`].

pub mod construct;
pub mod edge;
pub mod node;
pub mod node_map;
pub mod reclassify;
pub mod signs;
pub mod stats;
pub mod writer;

use log::info;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Instant;

pub use edge::{Edge, EdgeAttributes, ShapePoint};
pub use node::{Node, NodeAttributes, SealedTiles, TileNodes};
pub use node_map::{NodeMap, NodeMaps, Restriction};
pub use signs::{NodeSigns, SignInfo, SignKind};
pub use stats::{BuildReport, DataQuality};
pub use writer::{ProgressCallback, TileData, TileWriter, WriteOptions};

use crate::error::{BuildError, Result};
use crate::formats::sequence::FrozenSequence;
use crate::osmdata::OsmData;
use crate::tiles::TileLevel;

#[derive(Debug, Clone)]
pub struct BuildOptions {
    /// Hierarchy level the graph is built for
    pub level: u8,
    /// Directory for the disk-backed edge and shape sequences
    pub work_dir: PathBuf,
    /// Tile writer pool size
    pub threads: usize,
    pub max_link_hops: u32,
}

impl BuildOptions {
    pub fn new<P: AsRef<Path>>(work_dir: P) -> Self {
        Self {
            level: 2,
            work_dir: work_dir.as_ref().to_path_buf(),
            threads: num_cpus::get(),
            max_link_hops: reclassify::DEFAULT_MAX_LINK_HOPS,
        }
    }
}

/// Output of phase 1, immutable and shared by the writer pool
pub struct Graph {
    pub level: &'static TileLevel,
    pub nodes: SealedTiles,
    pub edges: FrozenSequence<Edge>,
    pub shapes: FrozenSequence<ShapePoint>,
    pub node_map: NodeMap,
    pub maps: NodeMaps,
    /// Rewritten restrictions keyed by the tile of their anchor node
    pub restrictions: BTreeMap<u32, Vec<Restriction>>,
    pub signs: BTreeMap<u32, Vec<NodeSigns>>,
    pub reclassified_links: u64,
    pub quality: DataQuality,
}

impl Graph {
    pub fn restriction_count(&self) -> usize {
        self.restrictions.values().map(Vec::len).sum()
    }

    pub fn sign_count(&self) -> usize {
        self.signs.values().map(Vec::len).sum()
    }

    fn report(&self, tiles_written: usize) -> BuildReport {
        BuildReport {
            level: self.level.level,
            nodes: self.nodes.node_count(),
            edges: self.edges.len(),
            shape_points: self.shapes.len(),
            reclassified_links: self.reclassified_links,
            restrictions: self.restriction_count(),
            sign_records: self.sign_count(),
            tiles_written,
            quality: self.quality,
        }
    }
}

pub struct GraphBuilder {
    options: BuildOptions,
    level: &'static TileLevel,
}

impl GraphBuilder {
    pub fn new(options: BuildOptions) -> Result<Self> {
        let level = TileLevel::from_level(options.level).ok_or(BuildError::UnsupportedLevel(options.level))?;
        Ok(Self { options, level })
    }

    pub fn options(&self) -> &BuildOptions {
        &self.options
    }

    /// Run phase 1 on the calling thread
    pub fn construct(&self, data: &OsmData) -> Result<Graph> {
        let start = Instant::now();
        std::fs::create_dir_all(&self.options.work_dir)?;

        let mut quality = DataQuality::default();
        let constructed = construct::construct_edges(data, self.level, &self.options.work_dir, &mut quality)?;

        let maps = node_map::create_node_maps(data, &constructed.node_map);
        let mut restrictions: BTreeMap<u32, Vec<Restriction>> = BTreeMap::new();
        for restriction in node_map::update_restrictions(&data.restrictions, &constructed.node_map, &mut quality) {
            restrictions
                .entry(restriction.anchor().tile_index())
                .or_default()
                .push(restriction);
        }

        let nodes = constructed.nodes.seal();
        let mut edges = constructed.edges;
        let reclassified_links =
            reclassify::reclassify_links(&nodes, &mut edges, self.options.max_link_hops, &mut quality)?;
        let edges = edges.freeze()?;

        let signs = signs::build_signs(&nodes, &edges, &data.ways, &maps)?;

        info!(
            "Graph constructed in {:.2}s: {} nodes in {} tiles, {} edges",
            start.elapsed().as_secs_f64(),
            nodes.node_count(),
            nodes.tile_count(),
            edges.len()
        );

        Ok(Graph {
            level: self.level,
            nodes,
            edges,
            shapes: constructed.shapes,
            node_map: constructed.node_map,
            maps,
            restrictions,
            signs,
            reclassified_links,
            quality,
        })
    }

    /// Construct the graph and write every tile through `writer`
    pub fn build(
        &self,
        data: &OsmData,
        writer: &dyn TileWriter,
        progress: Option<ProgressCallback>,
    ) -> Result<BuildReport> {
        let graph = self.construct(data)?;
        let options = WriteOptions {
            threads: self.options.threads,
            progress,
        };

        let start = Instant::now();
        let tiles_written = writer::write_tiles(&graph, writer, &options)?;
        info!("Wrote {} tiles in {:.2}s", tiles_written, start.elapsed().as_secs_f64());

        graph.quality.log_summary();
        Ok(graph.report(tiles_written))
    }
}
