//! Graph nodes and the per-tile node tables
//!
//! During construction nodes are appended to [`TileNodes`], one arena per
//! tile. A node's position in its arena is its entry index and never changes.
//! [`TileNodes::seal`] ends the construction phase; the resulting
//! [`SealedTiles`] is read-only and shared by the writer pool.

use bitfield_struct::bitfield;
use std::collections::BTreeMap;

use crate::error::{BuildError, Result};
use crate::graph_id::GraphId;
use crate::osmdata::{NodeType, OsmNode};
use crate::tiles::TileLevel;

#[bitfield(u32)]
#[derive(PartialEq, Eq)]
pub struct NodeAttributes {
    /// At least one incident edge is a link
    pub link_edge: bool,
    /// At least one incident edge is not a link
    pub non_link_edge: bool,
    pub exit_to: bool,
    pub has_ref: bool,
    pub has_name: bool,
    #[bits(12)]
    pub access_mask: u16,
    #[bits(4)]
    pub node_type: u8,
    pub traffic_signal: bool,
    #[bits(10)]
    __: u16,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub lat: f64,
    pub lon: f64,
    /// Incident edge indices in insertion order
    pub edges: Vec<u32>,
    pub attributes: NodeAttributes,
}

impl Node {
    /// A node carrying the raw node's access, type and signal attributes
    pub fn from_osm(osm: &OsmNode) -> Self {
        let attributes = NodeAttributes::new()
            .with_access_mask(osm.access_mask & 0x0fff)
            .with_node_type(osm.node_type as u8)
            .with_traffic_signal(osm.traffic_signal);

        Self {
            lat: osm.lat,
            lon: osm.lon,
            edges: Vec::new(),
            attributes,
        }
    }

    pub fn add_edge(&mut self, edge_index: u32, link: bool) {
        self.edges.push(edge_index);
        if link {
            self.attributes.set_link_edge(true);
        } else {
            self.attributes.set_non_link_edge(true);
        }
    }

    pub fn node_type(&self) -> NodeType {
        NodeType::from_bits(self.attributes.node_type())
    }
}

/// Append-only node arenas, one per tile, for the construction phase
#[derive(Debug)]
pub struct TileNodes {
    level: &'static TileLevel,
    tiles: BTreeMap<u32, Vec<Node>>,
    count: usize,
}

impl TileNodes {
    pub fn new(level: &'static TileLevel) -> Self {
        Self {
            level,
            tiles: BTreeMap::new(),
            count: 0,
        }
    }

    pub fn level(&self) -> &'static TileLevel {
        self.level
    }

    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Append a node to the tile containing its coordinate and return its id
    pub fn add_node(&mut self, node: Node) -> Result<GraphId> {
        let tile = self
            .level
            .tiles
            .tile_id(node.lat, node.lon)
            .ok_or(BuildError::InvalidCoordinate {
                lat: node.lat,
                lon: node.lon,
            })?;

        let arena = self.tiles.entry(tile).or_default();
        let entry = u32::try_from(arena.len()).unwrap_or(u32::MAX);
        let id = GraphId::try_from_components(self.level.level, tile, entry)
            .map_err(|source| BuildError::TileSlot { tile, source })?;

        arena.push(node);
        self.count += 1;
        Ok(id)
    }

    pub fn get(&self, id: GraphId) -> Option<&Node> {
        if id.level() != self.level.level {
            return None;
        }
        self.tiles
            .get(&id.tile_index())?
            .get(id.entry_index() as usize)
    }

    pub fn get_mut(&mut self, id: GraphId) -> Option<&mut Node> {
        if id.level() != self.level.level {
            return None;
        }
        self.tiles
            .get_mut(&id.tile_index())?
            .get_mut(id.entry_index() as usize)
    }

    /// End the construction phase
    pub fn seal(self) -> SealedTiles {
        SealedTiles {
            level: self.level,
            tiles: self
                .tiles
                .into_iter()
                .map(|(tile, nodes)| (tile, nodes.into_boxed_slice()))
                .collect(),
            count: self.count,
        }
    }
}

/// Read-only node tables, iterated in ascending (tile, entry) order
#[derive(Debug)]
pub struct SealedTiles {
    level: &'static TileLevel,
    tiles: BTreeMap<u32, Box<[Node]>>,
    count: usize,
}

impl SealedTiles {
    pub fn level(&self) -> &'static TileLevel {
        self.level
    }

    pub fn node_count(&self) -> usize {
        self.count
    }

    pub fn tile_count(&self) -> usize {
        self.tiles.len()
    }

    pub fn get(&self, id: GraphId) -> Option<&Node> {
        if id.level() != self.level.level {
            return None;
        }
        self.tiles
            .get(&id.tile_index())?
            .get(id.entry_index() as usize)
    }

    /// Like [`SealedTiles::get`], for ids that must have been issued
    pub fn node(&self, id: GraphId) -> Result<&Node> {
        self.get(id).ok_or(BuildError::UnknownNode(id))
    }

    pub fn tile(&self, tile_index: u32) -> Option<&[Node]> {
        self.tiles.get(&tile_index).map(|nodes| &nodes[..])
    }

    pub fn tile_ids(&self) -> impl Iterator<Item = u32> + '_ {
        self.tiles.keys().copied()
    }

    /// Base graph id of every non-empty tile
    pub fn tile_bases(&self) -> impl Iterator<Item = GraphId> + '_ {
        let level = self.level.level;
        self.tiles
            .keys()
            .filter_map(move |&tile| GraphId::try_from_components(level, tile, 0).ok())
    }

    pub fn iter(&self) -> impl Iterator<Item = (GraphId, &Node)> + '_ {
        let level = self.level.level;
        self.tiles.iter().flat_map(move |(&tile, nodes)| {
            nodes.iter().enumerate().filter_map(move |(entry, node)| {
                GraphId::try_from_components(level, tile, entry as u32)
                    .ok()
                    .map(|id| (id, node))
            })
        })
    }
}
