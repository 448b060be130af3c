//! Link (ramp) reclassification
//!
//! Link edges carry the importance of their own way, which usually
//! understates the roads they connect. Each maximal chain of link edges
//! joined at link-only nodes is walked once. Nodes that also have non-link
//! edges end the chain, and the most significant importance among those
//! non-link edges is pushed onto every link edge of the chain.

use log::{debug, info};
use rustc_hash::FxHashSet;
use std::collections::VecDeque;

use crate::builder::edge::Edge;
use crate::builder::node::{Node, SealedTiles};
use crate::builder::stats::DataQuality;
use crate::error::Result;
use crate::formats::sequence::Sequence;
use crate::graph_id::GraphId;

pub const DEFAULT_MAX_LINK_HOPS: u32 = 64;

/// Lowest importance value among a node's non-link edges
fn best_non_link(node: &Node, edges: &Sequence<Edge>) -> Result<Option<u8>> {
    let mut best: Option<u8> = None;
    for &index in &node.edges {
        let edge = edges.get(u64::from(index))?;
        if !edge.is_link() {
            best = Some(best.map_or(edge.importance(), |b| b.min(edge.importance())));
        }
    }
    Ok(best)
}

struct ChainWalk {
    best: Option<u8>,
    links: Vec<u32>,
    truncated: bool,
    visited: FxHashSet<GraphId>,
    queue: VecDeque<(GraphId, u32)>,
}

impl ChainWalk {
    /// Record arrival at `node_id`: terminal nodes contribute their best
    /// non-link importance, link-only nodes are queued unless the hop bound
    /// is reached.
    fn reach(
        &mut self,
        node_id: GraphId,
        hops: u32,
        nodes: &SealedTiles,
        edges: &Sequence<Edge>,
        max_hops: u32,
    ) -> Result<()> {
        if !self.visited.insert(node_id) {
            return Ok(());
        }
        let node = nodes.node(node_id)?;
        if node.attributes.non_link_edge() {
            if let Some(importance) = best_non_link(node, edges)? {
                self.best = Some(self.best.map_or(importance, |b| b.min(importance)));
            }
        } else if hops >= max_hops {
            self.truncated = true;
        } else {
            self.queue.push_back((node_id, hops));
        }
        Ok(())
    }
}

/// Walk the link-only chain containing `seed`. Link edges already in
/// `assigned` are traversed but not collected.
fn walk_chain(
    seed: u32,
    nodes: &SealedTiles,
    edges: &Sequence<Edge>,
    max_hops: u32,
    assigned: &mut FxHashSet<u32>,
) -> Result<ChainWalk> {
    let mut walk = ChainWalk {
        best: None,
        links: Vec::new(),
        truncated: false,
        visited: FxHashSet::default(),
        queue: VecDeque::new(),
    };
    let seed_edge = edges.get(u64::from(seed))?;
    let mut traversed: FxHashSet<u32> = FxHashSet::default();
    traversed.insert(seed);
    assigned.insert(seed);
    walk.links.push(seed);
    walk.reach(seed_edge.source, 0, nodes, edges, max_hops)?;
    walk.reach(seed_edge.target, 0, nodes, edges, max_hops)?;

    while let Some((node_id, hops)) = walk.queue.pop_front() {
        for &index in &nodes.node(node_id)?.edges {
            let edge = edges.get(u64::from(index))?;
            if !edge.is_link() || !traversed.insert(index) {
                continue;
            }
            if assigned.insert(index) {
                walk.links.push(index);
            }
            walk.reach(edge.opposite(node_id), hops + 1, nodes, edges, max_hops)?;
        }
    }

    Ok(walk)
}

/// Lower link edge importance toward the roads each link chain connects.
///
/// Nodes are visited in ascending (tile, entry) order and every unassigned
/// link edge they carry seeds one chain walk. Importance is never raised, and
/// every link edge collected by one walk receives the same value. Returns the
/// number of edges whose importance changed.
pub fn reclassify_links(
    nodes: &SealedTiles,
    edges: &mut Sequence<Edge>,
    max_hops: u32,
    quality: &mut DataQuality,
) -> Result<u64> {
    let mut changed = 0u64;
    let mut assigned: FxHashSet<u32> = FxHashSet::default();

    for (start, node) in nodes.iter() {
        if !node.attributes.link_edge() {
            continue;
        }

        for &seed in &node.edges {
            if assigned.contains(&seed) || !edges.get(u64::from(seed))?.is_link() {
                continue;
            }
            let walk = walk_chain(seed, nodes, edges, max_hops, &mut assigned)?;
            if walk.truncated {
                debug!("Link chain from {start} truncated after {max_hops} hops");
                quality.truncated_link_chains += 1;
            }
            let Some(best) = walk.best else {
                continue;
            };

            let mut target = best;
            for &index in &walk.links {
                target = target.min(edges.get(u64::from(index))?.importance());
            }
            for &index in &walk.links {
                let mut lowered = false;
                edges.update(u64::from(index), |edge| {
                    if edge.importance() > target {
                        edge.attributes.set_importance(target);
                        lowered = true;
                    }
                })?;
                changed += u64::from(lowered);
            }
        }
    }

    info!("Reclassified {changed} link edges");
    Ok(changed)
}
