//! Edge records and shape points
//!
//! An edge connects two graph nodes along a single way with no intersection
//! in between. Interior points of the polyline live in the shared shape
//! sequence at `shape_index..shape_index + shape_count`; the two endpoints are
//! the nodes themselves.

use bitfield_struct::bitfield;

use crate::formats::sequence::Record;
use crate::formats::{le_u32, le_u64};
use crate::graph_id::GraphId;
use crate::osmdata::{OsmWay, RoadClass};

/// Largest value the 3-bit importance field can hold
pub const MAX_IMPORTANCE: u8 = 7;

// Every road class must fit the importance field.
const _: () = assert!(RoadClass::Service as u8 <= MAX_IMPORTANCE);

/// Packed edge attributes, lower importance is more significant
#[bitfield(u32)]
#[derive(PartialEq, Eq)]
pub struct EdgeAttributes {
    #[bits(3)]
    pub importance: u8,
    pub driveable_forward: bool,
    pub driveable_reverse: bool,
    pub traffic_signal: bool,
    pub forward_signal: bool,
    pub backward_signal: bool,
    pub link: bool,
    #[bits(23)]
    __: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Edge {
    pub source: GraphId,
    /// [`GraphId::INVALID`] until the walk reaches the next graph node
    pub target: GraphId,
    pub way_index: u32,
    pub shape_index: u64,
    pub shape_count: u32,
    pub attributes: EdgeAttributes,
}

impl Edge {
    /// Open a new edge at `source`. The target and shape count are filled in
    /// as the way is walked.
    pub fn new(source: GraphId, way_index: u32, shape_index: u64, way: &OsmWay) -> Self {
        let attributes = EdgeAttributes::new()
            .with_importance(way.road_class.importance())
            .with_driveable_forward(way.auto_forward)
            .with_driveable_reverse(way.auto_backward)
            .with_link(way.link);

        Self {
            source,
            target: GraphId::INVALID,
            way_index,
            shape_index,
            shape_count: 0,
            attributes,
        }
    }

    /// The end of the edge that is not `node`
    #[inline]
    pub fn opposite(&self, node: GraphId) -> GraphId {
        if self.source == node {
            self.target
        } else {
            self.source
        }
    }

    #[inline]
    pub fn is_link(&self) -> bool {
        self.attributes.link()
    }

    #[inline]
    pub fn importance(&self) -> u8 {
        self.attributes.importance()
    }
}

impl Record for Edge {
    const SIZE: usize = 36;

    fn encode(&self, buf: &mut [u8]) {
        buf[0..8].copy_from_slice(&self.source.value().to_le_bytes());
        buf[8..16].copy_from_slice(&self.target.value().to_le_bytes());
        buf[16..20].copy_from_slice(&self.way_index.to_le_bytes());
        buf[20..28].copy_from_slice(&self.shape_index.to_le_bytes());
        buf[28..32].copy_from_slice(&self.shape_count.to_le_bytes());
        buf[32..36].copy_from_slice(&self.attributes.into_bits().to_le_bytes());
    }

    fn decode(buf: &[u8]) -> Self {
        Self {
            source: GraphId::from_raw(le_u64(buf, 0)),
            target: GraphId::from_raw(le_u64(buf, 8)),
            way_index: le_u32(buf, 16),
            shape_index: le_u64(buf, 20),
            shape_count: le_u32(buf, 28),
            attributes: EdgeAttributes::from_bits(le_u32(buf, 32)),
        }
    }
}

/// A polyline point in fixed-point 1e-7 degrees
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShapePoint {
    pub lat_fxp: i32,
    pub lon_fxp: i32,
}

impl ShapePoint {
    pub fn from_degrees(lat: f64, lon: f64) -> Self {
        Self {
            lat_fxp: (lat * 1e7).round() as i32,
            lon_fxp: (lon * 1e7).round() as i32,
        }
    }

    pub fn lat(&self) -> f64 {
        f64::from(self.lat_fxp) * 1e-7
    }

    pub fn lon(&self) -> f64 {
        f64::from(self.lon_fxp) * 1e-7
    }
}

impl Record for ShapePoint {
    const SIZE: usize = 8;

    fn encode(&self, buf: &mut [u8]) {
        buf[0..4].copy_from_slice(&self.lat_fxp.to_le_bytes());
        buf[4..8].copy_from_slice(&self.lon_fxp.to_le_bytes());
    }

    fn decode(buf: &[u8]) -> Self {
        Self {
            lat_fxp: le_u32(buf, 0) as i32,
            lon_fxp: le_u32(buf, 4) as i32,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_road_class_fits_importance() {
        for class in RoadClass::ALL {
            let attrs = EdgeAttributes::new().with_importance(class.importance());
            assert_eq!(attrs.importance(), class.importance());
            assert!(attrs.importance() <= MAX_IMPORTANCE);
        }
    }

    #[test]
    fn importance_field_is_three_bits() {
        let attrs = EdgeAttributes::new()
            .with_importance(MAX_IMPORTANCE)
            .with_link(true);
        assert_eq!(attrs.into_bits() & 0b111, 0b111);
        assert!(attrs.link());
        assert!(EdgeAttributes::new().with_importance_checked(MAX_IMPORTANCE + 1).is_err());
    }

    #[test]
    fn new_edge_takes_way_flags() {
        let mut way = OsmWay::new(10, vec![1, 2, 3], RoadClass::Primary);
        way.auto_backward = false;
        way.link = true;
        let source = GraphId::try_from_components(2, 5, 0).unwrap();

        let edge = Edge::new(source, 3, 17, &way);
        assert_eq!(edge.source, source);
        assert!(!edge.target.is_valid());
        assert_eq!(edge.importance(), RoadClass::Primary.importance());
        assert!(edge.attributes.driveable_forward());
        assert!(!edge.attributes.driveable_reverse());
        assert!(edge.is_link());
        assert_eq!(edge.shape_index, 17);
        assert_eq!(edge.shape_count, 0);
    }

    #[test]
    fn edge_record_layout() {
        let way = OsmWay::new(10, vec![1, 2], RoadClass::Trunk);
        let mut edge = Edge::new(GraphId::try_from_components(2, 5, 1).unwrap(), 9, 1 << 33, &way);
        edge.target = GraphId::try_from_components(2, 6, 0).unwrap();
        edge.shape_count = 4;
        edge.attributes.set_forward_signal(true);

        let mut buf = [0u8; Edge::SIZE];
        edge.encode(&mut buf);
        assert_eq!(Edge::decode(&buf), edge);
        assert_eq!(edge.opposite(edge.source), edge.target);
        assert_eq!(edge.opposite(edge.target), edge.source);
    }

    #[test]
    fn shape_points_are_fixed_point() {
        let p = ShapePoint::from_degrees(50.8503396, 4.3517103);
        assert_eq!(p.lat_fxp, 508_503_396);
        assert_eq!(p.lon_fxp, 43_517_103);
        assert!((p.lat() - 50.8503396).abs() < 1e-9);
    }
}
