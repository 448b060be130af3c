//! Exit signage and route refs

use std::collections::BTreeMap;

use serde::Serialize;

use crate::builder::edge::Edge;
use crate::builder::node::SealedTiles;
use crate::builder::node_map::NodeMaps;
use crate::error::Result;
use crate::formats::sequence::FrozenSequence;
use crate::graph_id::GraphId;
use crate::osmdata::OsmWay;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum SignKind {
    ExitNumber = 0,
    ExitBranch = 1,
    ExitToward = 2,
    ExitName = 3,
    RouteRef = 4,
}

impl SignKind {
    pub fn from_u8(value: u8) -> Option<Self> {
        Some(match value {
            0 => SignKind::ExitNumber,
            1 => SignKind::ExitBranch,
            2 => SignKind::ExitToward,
            3 => SignKind::ExitName,
            4 => SignKind::RouteRef,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SignInfo {
    pub kind: SignKind,
    pub text: String,
}

impl SignInfo {
    fn new(kind: SignKind, text: &str) -> Self {
        Self {
            kind,
            text: text.to_string(),
        }
    }
}

/// Signage for the exit leaving `node` along edge `edge_index`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NodeSigns {
    pub node: GraphId,
    pub edge_index: u32,
    pub signs: Vec<SignInfo>,
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// A non-empty way-level ref wins over a relation ref
pub fn resolve_ref(way_ref: Option<&str>, relation_ref: Option<&str>) -> Option<String> {
    non_empty(way_ref).or(non_empty(relation_ref)).map(str::to_string)
}

/// `;` separated values of a tag, trimmed, empties removed
pub fn tag_tokens(value: Option<&str>) -> impl Iterator<Item = &str> {
    value
        .unwrap_or("")
        .split(';')
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

/// Split an `exit_to` token into branch and toward parts
fn parse_exit_to(token: &str) -> (Option<&str>, &str) {
    for prefix in ["To ", "Toward "] {
        if let Some(rest) = token.strip_prefix(prefix) {
            return (None, rest.trim());
        }
    }
    for separator in [" to ", " toward "] {
        if token.matches(separator).count() == 1 {
            if let Some((branch, toward)) = token.split_once(separator) {
                return (Some(branch.trim()), toward.trim());
            }
        }
    }
    (None, token)
}

/// Ordered signage for an exit at `node` onto `way`
pub fn create_exit_sign_info_list(node: GraphId, way: &OsmWay, maps: &NodeMaps) -> Vec<SignInfo> {
    let mut signs = Vec::new();

    if let Some(number) = non_empty(way.junction_ref.as_deref()).or(non_empty(maps.node_ref(node))) {
        signs.push(SignInfo::new(SignKind::ExitNumber, number));
    }

    let branch_start = signs.len();
    for token in tag_tokens(way.destination_ref.as_deref()).chain(tag_tokens(way.destination_street.as_deref())) {
        signs.push(SignInfo::new(SignKind::ExitBranch, token));
    }
    for token in tag_tokens(way.destination_ref_to.as_deref())
        .chain(tag_tokens(way.destination_street_to.as_deref()))
        .chain(tag_tokens(way.destination.as_deref()))
    {
        signs.push(SignInfo::new(SignKind::ExitToward, token));
    }

    if signs.len() == branch_start {
        for token in tag_tokens(maps.node_exit_to(node)) {
            let (branch, toward) = parse_exit_to(token);
            if let Some(branch) = branch.filter(|b| !b.is_empty()) {
                signs.push(SignInfo::new(SignKind::ExitBranch, branch));
            }
            if !toward.is_empty() {
                signs.push(SignInfo::new(SignKind::ExitToward, toward));
            }
        }
    }

    for token in tag_tokens(maps.node_name(node)) {
        signs.push(SignInfo::new(SignKind::ExitName, token));
    }

    if let Some(route) = resolve_ref(way.way_ref.as_deref(), way.relation_ref.as_deref()) {
        signs.push(SignInfo::new(SignKind::RouteRef, &route));
    }

    signs
}

/// Signage for every exit node, grouped by tile.
///
/// A node gets signage from its first incident link edge that leaves it,
/// when that edge's way carries exit tags or the node itself is annotated.
pub fn build_signs(
    nodes: &SealedTiles,
    edges: &FrozenSequence<Edge>,
    ways: &[OsmWay],
    maps: &NodeMaps,
) -> Result<BTreeMap<u32, Vec<NodeSigns>>> {
    let mut by_tile: BTreeMap<u32, Vec<NodeSigns>> = BTreeMap::new();

    for (id, node) in nodes.iter() {
        if !node.attributes.link_edge() {
            continue;
        }

        let mut exit = None;
        for &index in &node.edges {
            let edge = edges.get(u64::from(index))?;
            if edge.is_link() && edge.source == id {
                exit = Some((index, edge));
                break;
            }
        }
        let Some((edge_index, edge)) = exit else {
            continue;
        };
        let Some(way) = ways.get(edge.way_index as usize) else {
            continue;
        };
        if !way.has_exit_tags() && !maps.is_annotated(id) {
            continue;
        }

        let signs = create_exit_sign_info_list(id, way, maps);
        if !signs.is_empty() {
            by_tile.entry(id.tile_index()).or_default().push(NodeSigns {
                node: id,
                edge_index,
                signs,
            });
        }
    }

    Ok(by_tile)
}
