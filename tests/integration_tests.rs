//! End-to-end tests for graph construction and tile writing
//!
//! These drive the public API on small synthetic networks, plus the
//! `butterfly-tiles` binary for the build/inspect round trip.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::process::Command;

use butterfly_tiles::builder::signs::{resolve_ref, SignKind};
use butterfly_tiles::{
    BuildOptions, DirectoryTileWriter, Graph, GraphBuilder, OsmData, OsmNode, OsmRestriction, OsmWay,
    RestrictionType, RoadClass, TileFile,
};
use tempfile::TempDir;

fn way(id: i64, nodes: Vec<i64>, class: RoadClass) -> OsmWay {
    OsmWay::new(id, nodes, class)
}

fn link(id: i64, nodes: Vec<i64>, class: RoadClass) -> OsmWay {
    let mut way = OsmWay::new(id, nodes, class);
    way.link = true;
    way
}

fn construct(data: &OsmData) -> (Graph, TempDir) {
    let work = TempDir::new().unwrap();
    let graph = GraphBuilder::new(BuildOptions::new(work.path()))
        .unwrap()
        .construct(data)
        .unwrap();
    (graph, work)
}

fn edge_importances(graph: &Graph) -> Vec<u8> {
    graph.edges.iter().map(|e| e.importance()).collect()
}

/// Grid of intersections with a shape point between each pair of neighbours,
/// spanning several local tiles, plus a few ramps.
fn grid_network(size: i64) -> OsmData {
    let mut data = OsmData::default();
    let grid = |r: i64, c: i64| 1000 + r * 100 + c;
    let mid_h = |r: i64, c: i64| 100_000 + r * 100 + c;
    let mid_v = |r: i64, c: i64| 200_000 + r * 100 + c;

    for r in 0..size {
        for c in 0..size {
            let lat = 50.0 + r as f64 * 0.1;
            let lon = 4.0 + c as f64 * 0.1;
            data.nodes.insert(grid(r, c), OsmNode::new(lat, lon));
            data.nodes.insert(mid_h(r, c), OsmNode::new(lat + 0.01, lon + 0.05));
            data.nodes.insert(mid_v(r, c), OsmNode::new(lat + 0.05, lon + 0.01));
        }
    }

    let classes = [RoadClass::Motorway, RoadClass::Primary, RoadClass::Residential];
    let mut next_way = 1;
    for r in 0..size {
        let mut points = Vec::new();
        for c in 0..size {
            points.push(grid(r, c));
            if c + 1 < size {
                points.push(mid_h(r, c));
            }
        }
        data.ways.push(way(next_way, points, classes[r as usize % classes.len()]));
        next_way += 1;
    }
    for c in 0..size {
        let mut points = Vec::new();
        for r in 0..size {
            points.push(grid(r, c));
            if r + 1 < size {
                points.push(mid_v(r, c));
            }
        }
        data.ways.push(way(next_way, points, RoadClass::Tertiary));
        next_way += 1;
    }

    // Ramps between diagonal neighbours, through two link-only junctions
    for k in 0..size - 1 {
        let a = 300_000 + k * 10;
        let b = a + 1;
        data.nodes.insert(a, OsmNode::new(50.03 + k as f64 * 0.1, 4.03 + k as f64 * 0.1));
        data.nodes.insert(b, OsmNode::new(50.06 + k as f64 * 0.1, 4.06 + k as f64 * 0.1));
        data.ways.push(link(next_way, vec![grid(k, k), a], RoadClass::Tertiary));
        data.ways.push(link(next_way + 1, vec![a, b], RoadClass::Tertiary));
        data.ways.push(link(next_way + 2, vec![b, grid(k + 1, k + 1)], RoadClass::Tertiary));
        next_way += 3;
    }

    data
}

#[test]
fn single_use_interior_points_never_become_nodes() {
    let data = grid_network(6);
    let (graph, _work) = construct(&data);

    let mut uses: HashMap<i64, usize> = HashMap::new();
    let mut endpoints: HashSet<i64> = HashSet::new();
    for way in &data.ways {
        for id in way.nodes.iter().collect::<HashSet<_>>() {
            *uses.entry(*id).or_default() += 1;
        }
        endpoints.insert(way.nodes[0]);
        endpoints.insert(*way.nodes.last().unwrap());
    }

    for (&id, &count) in &uses {
        if count == 1 && !endpoints.contains(&id) {
            assert!(graph.node_map.get(id).is_none(), "shape point {id} became a graph node");
        } else {
            assert!(graph.node_map.get(id).is_some(), "graph point {id} was not allocated");
        }
    }
    assert_eq!(graph.nodes.node_count(), graph.node_map.len());
    assert!(graph.nodes.tile_count() > 1);
}

#[test]
fn shape_points_are_conserved() {
    let data = grid_network(5);
    let (graph, _work) = construct(&data);

    let edges: Vec<_> = graph.edges.iter().collect();
    let total: u64 = edges.iter().map(|e| u64::from(e.shape_count)).sum();
    assert_eq!(total, graph.shapes.len());

    for (index, way) in data.ways.iter().enumerate() {
        let interior = way.nodes[1..way.nodes.len() - 1]
            .iter()
            .filter(|id| graph.node_map.get(**id).is_none())
            .count() as u64;
        let counted: u64 = edges
            .iter()
            .filter(|e| e.way_index as usize == index)
            .map(|e| u64::from(e.shape_count))
            .sum();
        assert_eq!(counted, interior, "way {}", way.id);
    }

    // Edges are listed on both endpoints, and only there
    for (index, edge) in edges.iter().enumerate() {
        for end in [edge.source, edge.target] {
            let node = graph.nodes.get(end).unwrap();
            assert!(node.edges.contains(&(index as u32)));
        }
    }
}

#[test]
fn graph_ids_are_stable_across_runs() {
    let data = grid_network(4);
    let (first, _w1) = construct(&data);
    let (second, _w2) = construct(&data);

    for id in data.nodes.keys() {
        assert_eq!(first.node_map.get(*id), second.node_map.get(*id));
    }
    assert_eq!(edge_importances(&first), edge_importances(&second));
}

#[test]
fn shared_points_split_a_way_into_edges() {
    // A - a1 - B - b1 - C - c1 - D, with B and C shared with E - B - C - F
    let mut data = OsmData::default();
    let ids = [("A", 1), ("a1", 11), ("B", 2), ("b1", 21), ("C", 3), ("c1", 31), ("D", 4), ("E", 5), ("F", 6)];
    for (i, (_, id)) in ids.iter().enumerate() {
        data.nodes.insert(*id, OsmNode::new(50.0 + i as f64 * 0.001, 4.0));
    }
    data.ways.push(way(1, vec![1, 11, 2, 21, 3, 31, 4], RoadClass::Primary));
    data.ways.push(way(2, vec![5, 2, 3, 6], RoadClass::Residential));

    let (graph, _work) = construct(&data);
    for raw in [1, 2, 3, 4, 5, 6] {
        assert!(graph.node_map.get(raw).is_some(), "node {raw}");
    }
    for raw in [11, 21, 31] {
        assert!(graph.node_map.get(raw).is_none(), "shape point {raw}");
    }

    let id = |raw: i64| graph.node_map.get(raw).unwrap();
    let edges: Vec<_> = graph.edges.iter().collect();
    let way_edges: Vec<_> = edges.iter().filter(|e| e.way_index == 0).collect();
    assert_eq!(way_edges.len(), 3);
    assert_eq!((way_edges[0].source, way_edges[0].target), (id(1), id(2)));
    assert_eq!((way_edges[2].source, way_edges[2].target), (id(3), id(4)));
    assert!(way_edges.iter().all(|e| e.shape_count == 1));

    let shape = graph.shapes.get(way_edges[0].shape_index).unwrap();
    assert!((shape.lat() - data.nodes[&11].lat).abs() < 1e-7);
}

#[test]
fn link_chain_takes_best_connected_importance() {
    // X =(imp 2)= P -L1- M -L2- Q =(imp 5)= Y
    let mut data = OsmData::default();
    for (i, id) in [10, 20, 30, 40, 50].iter().enumerate() {
        data.nodes.insert(*id, OsmNode::new(51.0, 3.0 + i as f64 * 0.001));
    }
    data.ways.push(way(1, vec![10, 20], RoadClass::Primary));
    data.ways.push(link(2, vec![20, 30], RoadClass::Tertiary));
    data.ways.push(link(3, vec![30, 40], RoadClass::Tertiary));
    data.ways.push(way(4, vec![40, 50], RoadClass::Unclassified));

    let (graph, _work) = construct(&data);
    let importance = edge_importances(&graph);
    assert_eq!(importance, vec![2, 2, 2, 5]);
    assert_eq!(graph.reclassified_links, 2);
    assert!(graph.quality.is_clean());
}

#[test]
fn reclassification_never_raises_and_converges() {
    let data = grid_network(5);
    let (graph, _work) = construct(&data);

    for edge in graph.edges.iter() {
        let original = data.ways[edge.way_index as usize].road_class.importance();
        if edge.is_link() {
            assert!(edge.importance() <= original);
        } else {
            assert_eq!(edge.importance(), original);
        }
    }

    // Each ramp is a maximal link-only chain of three edges
    let edges: Vec<_> = graph.edges.iter().collect();
    let mut by_chain: HashMap<usize, HashSet<u8>> = HashMap::new();
    for edge in edges.iter().filter(|e| e.is_link()) {
        let chain = (edge.way_index as usize - 10) / 3;
        by_chain.entry(chain).or_default().insert(edge.importance());
    }
    assert_eq!(by_chain.len(), 4);
    for (chain, values) in by_chain {
        assert_eq!(values.len(), 1, "chain {chain} diverged: {values:?}");
    }
}

#[test]
fn unreachable_restrictions_are_dropped() {
    let mut data = OsmData::default();
    for (i, id) in [1, 2, 3, 4].iter().enumerate() {
        data.nodes.insert(*id, OsmNode::new(48.0, 2.0 + i as f64 * 0.001));
    }
    data.nodes.insert(999, OsmNode::new(48.5, 2.5));
    data.ways.push(way(1, vec![1, 2, 3], RoadClass::Secondary));
    data.ways.push(way(2, vec![2, 4], RoadClass::Secondary));
    data.restrictions = vec![
        OsmRestriction {
            id: 1,
            kind: RestrictionType::NoLeftTurn,
            from: 1,
            via: vec![2],
            to: 4,
        },
        OsmRestriction {
            id: 2,
            kind: RestrictionType::NoRightTurn,
            from: 1,
            via: vec![999],
            to: 4,
        },
        OsmRestriction {
            id: 3,
            kind: RestrictionType::OnlyStraightOn,
            from: 1,
            via: vec![2],
            to: 3,
        },
    ];

    let (graph, _work) = construct(&data);
    assert_eq!(graph.quality.dropped_restrictions, 1);

    let kept: Vec<_> = graph.restrictions.values().flatten().collect();
    assert_eq!(kept.iter().map(|r| r.id).collect::<Vec<_>>(), vec![1, 3]);
    for restriction in kept {
        for id in std::iter::once(restriction.from)
            .chain(restriction.via.iter().copied())
            .chain(std::iter::once(restriction.to))
        {
            assert!(graph.nodes.get(id).is_some());
        }
    }
}

#[test]
fn route_refs_prefer_the_way_ref() {
    assert_eq!(resolve_ref(None, Some("I-90")).as_deref(), Some("I-90"));
    assert_eq!(resolve_ref(Some("US-12"), Some("I-90")).as_deref(), Some("US-12"));

    let build = |way_ref: Option<&str>| {
        let mut data = OsmData::default();
        for (i, id) in [1, 2, 3].iter().enumerate() {
            data.nodes.insert(*id, OsmNode::new(47.6, -122.3 + i as f64 * 0.001));
        }
        data.ways.push(way(1, vec![1, 2], RoadClass::Motorway));
        let mut ramp = link(2, vec![2, 3], RoadClass::Motorway);
        ramp.destination = Some("Spokane".to_string());
        ramp.way_ref = way_ref.map(str::to_string);
        data.ways.push(ramp);
        data.add_relation_ref(1, "I-90");
        data.add_relation_ref(1, "I-94");

        let (graph, _work) = construct(&data);
        let signs: Vec<_> = graph.signs.values().flatten().cloned().collect();
        assert_eq!(signs.len(), 1);
        assert_eq!(signs[0].node, graph.node_map.get(2).unwrap());
        signs[0]
            .signs
            .iter()
            .find(|s| s.kind == SignKind::RouteRef)
            .map(|s| s.text.clone())
    };

    assert_eq!(build(None).as_deref(), Some("I-90"));
    assert_eq!(build(Some("US-12")).as_deref(), Some("US-12"));
}

fn tile_files(root: &Path) -> Vec<PathBuf> {
    let mut files = Vec::new();
    let mut stack = vec![root.to_path_buf()];
    while let Some(dir) = stack.pop() {
        for entry in std::fs::read_dir(&dir).unwrap() {
            let path = entry.unwrap().path();
            if path.is_dir() {
                stack.push(path);
            } else if path.extension().is_some_and(|e| e == "gph") {
                files.push(path);
            }
        }
    }
    files.sort();
    files
}

#[test]
fn written_tiles_match_the_graph() {
    let data = grid_network(5);
    let work = TempDir::new().unwrap();
    let out = TempDir::new().unwrap();
    let builder = GraphBuilder::new(BuildOptions::new(work.path())).unwrap();
    let report = builder
        .build(&data, &DirectoryTileWriter::new(out.path()), None)
        .unwrap();

    let files = tile_files(out.path());
    assert_eq!(files.len(), report.tiles_written);

    let mut nodes = 0;
    let mut edges = 0u64;
    let mut shapes = 0u64;
    for file in &files {
        let tile = TileFile::read(file).unwrap();
        nodes += tile.nodes.len();
        edges += tile.edges.len() as u64;
        shapes += tile.shapes.len() as u64;
        for (_, edge) in &tile.edges {
            assert_eq!(edge.source.tile_index(), tile.tile.tile_index());
        }
    }
    assert_eq!(nodes, report.nodes);
    assert_eq!(edges, report.edges);
    assert_eq!(shapes, report.shape_points);
}

#[test]
fn tile_bytes_do_not_depend_on_thread_count() {
    let data = grid_network(6);
    let mut outputs = Vec::new();
    for threads in [1, 4] {
        let work = TempDir::new().unwrap();
        let out = TempDir::new().unwrap();
        let mut options = BuildOptions::new(work.path());
        options.threads = threads;
        GraphBuilder::new(options)
            .unwrap()
            .build(&data, &DirectoryTileWriter::new(out.path()), None)
            .unwrap();

        let files: Vec<(PathBuf, Vec<u8>)> = tile_files(out.path())
            .into_iter()
            .map(|p| {
                let bytes = std::fs::read(&p).unwrap();
                (p.strip_prefix(out.path()).unwrap().to_path_buf(), bytes)
            })
            .collect();
        outputs.push(files);
    }
    assert_eq!(outputs[0], outputs[1]);
}

#[test]
fn cli_builds_and_inspects_tiles() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("network.json");
    std::fs::write(&input, serde_json::to_vec(&grid_network(3)).unwrap()).unwrap();
    let tiles = dir.path().join("tiles");

    let output = Command::new(env!("CARGO_BIN_EXE_butterfly-tiles"))
        .arg("build")
        .arg("--input")
        .arg(&input)
        .arg("--tile-dir")
        .arg(&tiles)
        .arg("--work-dir")
        .arg(dir.path().join("work"))
        .args(["-j", "2"])
        .output()
        .unwrap();
    assert!(
        output.status.success(),
        "build failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let written = report["tiles_written"].as_u64().unwrap();
    assert!(written > 0);
    assert_eq!(report["quality"]["skipped_ways"], 0);

    let files = tile_files(&tiles);
    assert_eq!(files.len() as u64, written);

    let inspect = Command::new(env!("CARGO_BIN_EXE_butterfly-tiles"))
        .arg("inspect")
        .arg(&files[0])
        .output()
        .unwrap();
    assert!(inspect.status.success());
    let text = String::from_utf8_lossy(&inspect.stdout);
    assert!(text.contains("nodes:"));
    assert!(text.contains("crc64:"));
}
