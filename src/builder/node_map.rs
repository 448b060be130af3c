//! Raw node id to graph id mapping, and the rewrites that depend on it

use log::debug;
use rustc_hash::FxHashMap;
use serde::Serialize;

use crate::builder::stats::DataQuality;
use crate::graph_id::GraphId;
use crate::osmdata::{OsmData, OsmRestriction, RestrictionType};

/// Graph id issued to each raw node id that became a graph node
#[derive(Debug, Default, Clone)]
pub struct NodeMap(FxHashMap<i64, GraphId>);

impl NodeMap {
    pub fn get(&self, osm_id: i64) -> Option<GraphId> {
        self.0.get(&osm_id).copied()
    }

    pub fn contains(&self, osm_id: i64) -> bool {
        self.0.contains_key(&osm_id)
    }

    pub(crate) fn insert(&mut self, osm_id: i64, id: GraphId) {
        self.0.insert(osm_id, id);
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Node annotations keyed by graph id
#[derive(Debug, Default, Clone)]
pub struct NodeMaps {
    pub refs: FxHashMap<GraphId, String>,
    pub exit_to: FxHashMap<GraphId, String>,
    pub names: FxHashMap<GraphId, String>,
}

impl NodeMaps {
    pub fn node_ref(&self, id: GraphId) -> Option<&str> {
        self.refs.get(&id).map(String::as_str)
    }

    pub fn node_exit_to(&self, id: GraphId) -> Option<&str> {
        self.exit_to.get(&id).map(String::as_str)
    }

    pub fn node_name(&self, id: GraphId) -> Option<&str> {
        self.names.get(&id).map(String::as_str)
    }

    pub fn is_annotated(&self, id: GraphId) -> bool {
        self.refs.contains_key(&id) || self.exit_to.contains_key(&id) || self.names.contains_key(&id)
    }
}

/// Re-key the ref/exit-to/name annotations by graph id.
///
/// Annotations on raw nodes that never became graph nodes are ignored.
pub fn create_node_maps(data: &OsmData, node_map: &NodeMap) -> NodeMaps {
    let rekey = |source: &FxHashMap<i64, String>| -> FxHashMap<GraphId, String> {
        source
            .iter()
            .filter_map(|(&osm_id, text)| node_map.get(osm_id).map(|id| (id, text.clone())))
            .collect()
    };

    NodeMaps {
        refs: rekey(&data.node_ref),
        exit_to: rekey(&data.node_exit_to),
        names: rekey(&data.node_name),
    }
}

/// A turn restriction whose references are all graph nodes
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Restriction {
    pub id: i64,
    pub kind: RestrictionType,
    pub from: GraphId,
    pub via: Vec<GraphId>,
    pub to: GraphId,
}

impl Restriction {
    /// The node whose tile stores this restriction: the first via node, or
    /// the from node when there is none
    pub fn anchor(&self) -> GraphId {
        self.via.first().copied().unwrap_or(self.from)
    }
}

/// Rewrite restrictions to graph ids.
///
/// A restriction with any reference that never became a graph node is dropped
/// and counted. Survivors keep their input order.
pub fn update_restrictions(
    restrictions: &[OsmRestriction],
    node_map: &NodeMap,
    quality: &mut DataQuality,
) -> Vec<Restriction> {
    let mut rewritten = Vec::with_capacity(restrictions.len());

    for restriction in restrictions {
        let resolve = |osm_id: i64| node_map.get(osm_id);
        let via: Option<Vec<GraphId>> = restriction.via.iter().map(|&id| resolve(id)).collect();

        match (resolve(restriction.from), via, resolve(restriction.to)) {
            (Some(from), Some(via), Some(to)) => rewritten.push(Restriction {
                id: restriction.id,
                kind: restriction.kind,
                from,
                via,
                to,
            }),
            _ => {
                let missing: Vec<i64> = restriction
                    .node_refs()
                    .filter(|&id| !node_map.contains(id))
                    .collect();
                debug!(
                    "Dropping restriction {}: nodes {:?} are not graph nodes",
                    restriction.id, missing
                );
                quality.dropped_restrictions += 1;
            }
        }
    }

    rewritten
}
