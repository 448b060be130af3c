//! Raw OSM records consumed by the graph builder
//!
//! These are produced by an external parser. For standalone runs they can be
//! loaded from a JSON document with [`OsmData::from_json_file`].

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::str::FromStr;

use crate::error::BuildError;

/// Road classification, most significant first.
///
/// The discriminant is the edge importance, which is stored in 3 bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum RoadClass {
    Motorway = 0,
    Trunk = 1,
    Primary = 2,
    Secondary = 3,
    Tertiary = 4,
    Unclassified = 5,
    Residential = 6,
    #[default]
    Service = 7,
}

impl RoadClass {
    pub const ALL: [RoadClass; 8] = [
        RoadClass::Motorway,
        RoadClass::Trunk,
        RoadClass::Primary,
        RoadClass::Secondary,
        RoadClass::Tertiary,
        RoadClass::Unclassified,
        RoadClass::Residential,
        RoadClass::Service,
    ];

    #[inline]
    pub const fn importance(self) -> u8 {
        self as u8
    }

    pub fn from_importance(importance: u8) -> Option<Self> {
        Self::ALL.get(usize::from(importance)).copied()
    }

    /// Classify an OSM `highway=*` value. Returns the class and whether the
    /// value denotes a link (ramp).
    pub fn from_highway(highway: &str) -> Option<(Self, bool)> {
        let (base, link) = match highway.strip_suffix("_link") {
            Some(base) => (base, true),
            None => (highway, false),
        };
        let class = match base {
            "motorway" => RoadClass::Motorway,
            "trunk" => RoadClass::Trunk,
            "primary" => RoadClass::Primary,
            "secondary" => RoadClass::Secondary,
            "tertiary" => RoadClass::Tertiary,
            "unclassified" | "road" => RoadClass::Unclassified,
            "residential" | "living_street" => RoadClass::Residential,
            "service" | "track" => RoadClass::Service,
            _ => return None,
        };
        if link && class > RoadClass::Tertiary {
            return None;
        }
        Some((class, link))
    }
}

/// Node type stored in the 4-bit node type field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum NodeType {
    #[default]
    StreetIntersection = 0,
    Gate = 1,
    Bollard = 2,
    TollBooth = 3,
    BorderControl = 4,
    MotorwayJunction = 5,
}

impl NodeType {
    pub fn from_bits(bits: u8) -> Self {
        match bits {
            1 => NodeType::Gate,
            2 => NodeType::Bollard,
            3 => NodeType::TollBooth,
            4 => NodeType::BorderControl,
            5 => NodeType::MotorwayJunction,
            _ => NodeType::StreetIntersection,
        }
    }
}

/// Access mask bits
pub mod access {
    pub const AUTO: u16 = 1;
    pub const PEDESTRIAN: u16 = 2;
    pub const BICYCLE: u16 = 4;
    pub const TRUCK: u16 = 8;
    pub const EMERGENCY: u16 = 16;
    pub const TAXI: u16 = 32;
    pub const BUS: u16 = 64;
    pub const HOV: u16 = 128;
    pub const ALL: u16 = 0x0fff;
}

fn default_access() -> u16 {
    access::ALL
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OsmNode {
    pub lat: f64,
    pub lon: f64,
    #[serde(default)]
    pub traffic_signal: bool,
    #[serde(default = "default_access")]
    pub access_mask: u16,
    #[serde(default)]
    pub node_type: NodeType,
}

impl OsmNode {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self {
            lat,
            lon,
            traffic_signal: false,
            access_mask: access::ALL,
            node_type: NodeType::StreetIntersection,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OsmWay {
    pub id: i64,
    pub nodes: Vec<i64>,
    #[serde(default)]
    pub road_class: RoadClass,
    #[serde(default = "default_true")]
    pub auto_forward: bool,
    #[serde(default = "default_true")]
    pub auto_backward: bool,
    #[serde(default)]
    pub link: bool,
    #[serde(default, rename = "ref")]
    pub way_ref: Option<String>,
    #[serde(default)]
    pub relation_ref: Option<String>,
    #[serde(default)]
    pub junction_ref: Option<String>,
    #[serde(default)]
    pub destination: Option<String>,
    #[serde(default)]
    pub destination_ref: Option<String>,
    #[serde(default)]
    pub destination_ref_to: Option<String>,
    #[serde(default)]
    pub destination_street: Option<String>,
    #[serde(default)]
    pub destination_street_to: Option<String>,
}

impl OsmWay {
    pub fn new(id: i64, nodes: Vec<i64>, road_class: RoadClass) -> Self {
        Self {
            id,
            nodes,
            road_class,
            auto_forward: true,
            auto_backward: true,
            ..Default::default()
        }
    }

    /// Whether the way carries any exit signage tags of its own
    pub fn has_exit_tags(&self) -> bool {
        [
            &self.junction_ref,
            &self.destination,
            &self.destination_ref,
            &self.destination_ref_to,
            &self.destination_street,
            &self.destination_street_to,
        ]
        .iter()
        .any(|tag| tag.as_deref().is_some_and(|v| !v.trim().is_empty()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum RestrictionType {
    NoLeftTurn = 0,
    NoRightTurn = 1,
    NoStraightOn = 2,
    NoUTurn = 3,
    NoEntry = 4,
    NoExit = 5,
    OnlyRightTurn = 6,
    OnlyLeftTurn = 7,
    OnlyStraightOn = 8,
}

impl RestrictionType {
    pub fn from_u8(value: u8) -> Option<Self> {
        Some(match value {
            0 => RestrictionType::NoLeftTurn,
            1 => RestrictionType::NoRightTurn,
            2 => RestrictionType::NoStraightOn,
            3 => RestrictionType::NoUTurn,
            4 => RestrictionType::NoEntry,
            5 => RestrictionType::NoExit,
            6 => RestrictionType::OnlyRightTurn,
            7 => RestrictionType::OnlyLeftTurn,
            8 => RestrictionType::OnlyStraightOn,
            _ => return None,
        })
    }

    pub fn is_mandatory(self) -> bool {
        matches!(
            self,
            RestrictionType::OnlyRightTurn | RestrictionType::OnlyLeftTurn | RestrictionType::OnlyStraightOn
        )
    }
}

impl FromStr for RestrictionType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "no_left_turn" => Ok(RestrictionType::NoLeftTurn),
            "no_right_turn" => Ok(RestrictionType::NoRightTurn),
            "no_straight_on" => Ok(RestrictionType::NoStraightOn),
            "no_u_turn" => Ok(RestrictionType::NoUTurn),
            "no_entry" => Ok(RestrictionType::NoEntry),
            "no_exit" => Ok(RestrictionType::NoExit),
            "only_right_turn" => Ok(RestrictionType::OnlyRightTurn),
            "only_left_turn" => Ok(RestrictionType::OnlyLeftTurn),
            "only_straight_on" => Ok(RestrictionType::OnlyStraightOn),
            other => Err(format!("unknown restriction type '{other}'")),
        }
    }
}

/// A turn restriction referencing raw OSM node ids
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OsmRestriction {
    pub id: i64,
    #[serde(rename = "type")]
    pub kind: RestrictionType,
    pub from: i64,
    #[serde(default)]
    pub via: Vec<i64>,
    pub to: i64,
}

impl OsmRestriction {
    /// All referenced node ids in from, via..., to order
    pub fn node_refs(&self) -> impl Iterator<Item = i64> + '_ {
        std::iter::once(self.from)
            .chain(self.via.iter().copied())
            .chain(std::iter::once(self.to))
    }
}

/// Everything the builder needs from the parser
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OsmData {
    #[serde(default)]
    pub ways: Vec<OsmWay>,
    #[serde(default)]
    pub nodes: FxHashMap<i64, OsmNode>,
    #[serde(default)]
    pub restrictions: Vec<OsmRestriction>,
    #[serde(default)]
    pub node_ref: FxHashMap<i64, String>,
    #[serde(default)]
    pub node_exit_to: FxHashMap<i64, String>,
    #[serde(default)]
    pub node_name: FxHashMap<i64, String>,
}

impl OsmData {
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self, BuildError> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|source| BuildError::Input {
            path: path.to_path_buf(),
            source,
        })?;
        let data = serde_json::from_reader(BufReader::new(file))?;
        Ok(data)
    }

    /// Attach a route relation's ref to a way. The first ref attached wins.
    pub fn add_relation_ref(&mut self, way_index: usize, relation_ref: &str) -> bool {
        match self.ways.get_mut(way_index) {
            Some(way) if way.relation_ref.is_none() => {
                way.relation_ref = Some(relation_ref.to_string());
                true
            }
            _ => false,
        }
    }

    /// Whether a raw node carries a ref, exit-to or name annotation
    pub fn is_annotated(&self, osm_id: i64) -> bool {
        self.node_ref.contains_key(&osm_id)
            || self.node_exit_to.contains_key(&osm_id)
            || self.node_name.contains_key(&osm_id)
    }
}
