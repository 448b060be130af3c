//! Edge construction: walks raw ways and emits graph nodes and edges
//!
//! Which points become graph nodes is decided up front, before any edge is
//! emitted. A point is a graph node when it
//!
//! - is the first or last point of a way,
//! - is visited by two or more distinct ways, or
//! - carries a ref, exit-to or name annotation, or is referenced by a turn
//!   restriction.
//!
//! Every other point is a shape point of the edge passing through it.
//! Allocation order, and so every issued [`GraphId`], depends only on the
//! order of the way table.

use log::{debug, info};
use rustc_hash::{FxHashMap, FxHashSet};
use std::path::Path;

use crate::builder::edge::{Edge, ShapePoint};
use crate::builder::node::{Node, TileNodes};
use crate::builder::node_map::NodeMap;
use crate::builder::stats::DataQuality;
use crate::error::{BuildError, Result};
use crate::formats::sequence::{FrozenSequence, Sequence, SequenceWriter};
use crate::graph_id::GraphId;
use crate::osmdata::{OsmData, OsmNode, OsmWay};
use crate::tiles::TileLevel;

pub const EDGES_FILE: &str = "edges.bin";
pub const SHAPES_FILE: &str = "shapes.bin";

/// Output of the construction phase
pub struct Constructed {
    pub nodes: TileNodes,
    /// Finished and mapped for in-place importance updates
    pub edges: Sequence<Edge>,
    pub shapes: FrozenSequence<ShapePoint>,
    pub node_map: NodeMap,
}

/// A way that passed validation, with consecutive duplicate points removed
struct ResolvedWay<'a> {
    index: u32,
    way: &'a OsmWay,
    points: Vec<(i64, &'a OsmNode)>,
}

fn resolve_way<'a>(
    index: usize,
    way: &'a OsmWay,
    data: &'a OsmData,
    level: &TileLevel,
) -> Result<Option<ResolvedWay<'a>>> {
    let mut ids = way.nodes.clone();
    ids.dedup();
    if ids.len() < 2 {
        debug!("Skipping way {}: fewer than two distinct points", way.id);
        return Ok(None);
    }

    let mut points = Vec::with_capacity(ids.len());
    for osm_id in ids {
        let Some(node) = data.nodes.get(&osm_id) else {
            debug!("Skipping way {}: node {} is missing", way.id, osm_id);
            return Ok(None);
        };
        if level.tiles.tile_id(node.lat, node.lon).is_none() {
            debug!(
                "Skipping way {}: node {} has invalid coordinate ({}, {})",
                way.id, osm_id, node.lat, node.lon
            );
            return Ok(None);
        }
        points.push((osm_id, node));
    }

    let index = u32::try_from(index).map_err(|_| BuildError::IndexOverflow {
        what: "way",
        index: index as u64,
    })?;
    Ok(Some(ResolvedWay { index, way, points }))
}

/// Raw ids that must become graph nodes
fn graph_points(ways: &[ResolvedWay<'_>], data: &OsmData) -> FxHashSet<i64> {
    let mut uses: FxHashMap<i64, u32> = FxHashMap::default();
    let mut seen: FxHashSet<i64> = FxHashSet::default();
    let mut promoted: FxHashSet<i64> = FxHashSet::default();

    for way in ways {
        seen.clear();
        for &(osm_id, _) in &way.points {
            if seen.insert(osm_id) {
                *uses.entry(osm_id).or_insert(0) += 1;
            }
        }
        if let (Some(first), Some(last)) = (way.points.first(), way.points.last()) {
            promoted.insert(first.0);
            promoted.insert(last.0);
        }
    }

    promoted.extend(uses.into_iter().filter(|&(_, n)| n >= 2).map(|(id, _)| id));
    promoted.extend(data.node_ref.keys().copied());
    promoted.extend(data.node_exit_to.keys().copied());
    promoted.extend(data.node_name.keys().copied());
    promoted.extend(data.restrictions.iter().flat_map(|r| r.node_refs()));
    promoted
}

struct EdgeConstructor<'a> {
    nodes: TileNodes,
    node_map: NodeMap,
    edges: SequenceWriter<Edge>,
    shapes: SequenceWriter<ShapePoint>,
    graph_points: FxHashSet<i64>,
    data: &'a OsmData,
}

impl EdgeConstructor<'_> {
    /// Graph id for a raw node, allocating it on first sighting
    fn node_for(&mut self, osm_id: i64, osm: &OsmNode) -> Result<GraphId> {
        if let Some(id) = self.node_map.get(osm_id) {
            return Ok(id);
        }

        let mut node = Node::from_osm(osm);
        node.attributes.set_has_ref(self.data.node_ref.contains_key(&osm_id));
        node.attributes.set_exit_to(self.data.node_exit_to.contains_key(&osm_id));
        node.attributes.set_has_name(self.data.node_name.contains_key(&osm_id));

        let id = self.nodes.add_node(node)?;
        self.node_map.insert(osm_id, id);
        Ok(id)
    }

    fn close_edge(&mut self, edge: &Edge) -> Result<()> {
        let position = self.edges.push(edge)?;
        let index = u32::try_from(position).map_err(|_| BuildError::IndexOverflow {
            what: "edge",
            index: position,
        })?;

        let link = edge.is_link();
        self.nodes
            .get_mut(edge.source)
            .ok_or(BuildError::UnknownNode(edge.source))?
            .add_edge(index, link);
        if edge.target != edge.source {
            self.nodes
                .get_mut(edge.target)
                .ok_or(BuildError::UnknownNode(edge.target))?
                .add_edge(index, link);
        }
        Ok(())
    }

    fn walk(&mut self, way: &ResolvedWay<'_>) -> Result<()> {
        let last = way.points.len() - 1;
        let (first_id, first_node) = way.points[0];

        let mut source = self.node_for(first_id, first_node)?;
        let mut source_signal = first_node.traffic_signal;
        let mut edge = Edge::new(source, way.index, self.shapes.len(), way.way);
        let mut interior_signal = false;

        for (i, &(osm_id, osm)) in way.points.iter().enumerate().skip(1) {
            if i < last && !self.graph_points.contains(&osm_id) {
                self.shapes.push(&ShapePoint::from_degrees(osm.lat, osm.lon))?;
                edge.shape_count += 1;
                interior_signal |= osm.traffic_signal;
                continue;
            }

            let target = self.node_for(osm_id, osm)?;
            edge.target = target;
            edge.attributes.set_traffic_signal(interior_signal);
            edge.attributes.set_forward_signal(osm.traffic_signal);
            edge.attributes.set_backward_signal(source_signal);
            self.close_edge(&edge)?;

            if i < last {
                source = target;
                source_signal = osm.traffic_signal;
                edge = Edge::new(source, way.index, self.shapes.len(), way.way);
                interior_signal = false;
            }
        }
        Ok(())
    }
}

/// Walk every way in table order, emitting nodes into per-tile arenas and
/// edges and shape points into disk-backed sequences under `work_dir`.
pub fn construct_edges(
    data: &OsmData,
    level: &'static TileLevel,
    work_dir: &Path,
    quality: &mut DataQuality,
) -> Result<Constructed> {
    let mut ways = Vec::with_capacity(data.ways.len());
    for (index, way) in data.ways.iter().enumerate() {
        match resolve_way(index, way, data, level)? {
            Some(resolved) => ways.push(resolved),
            None => quality.skipped_ways += 1,
        }
    }

    let mut constructor = EdgeConstructor {
        nodes: TileNodes::new(level),
        node_map: NodeMap::default(),
        edges: SequenceWriter::create(work_dir.join(EDGES_FILE))?,
        shapes: SequenceWriter::create(work_dir.join(SHAPES_FILE))?,
        graph_points: graph_points(&ways, data),
        data,
    };

    for way in &ways {
        constructor.walk(way)?;
    }

    info!(
        "Constructed {} nodes, {} edges and {} shape points from {} ways",
        constructor.nodes.len(),
        constructor.edges.len(),
        constructor.shapes.len(),
        ways.len()
    );

    Ok(Constructed {
        nodes: constructor.nodes,
        edges: constructor.edges.finish()?,
        shapes: constructor.shapes.finish()?.freeze()?,
        node_map: constructor.node_map,
    })
}
