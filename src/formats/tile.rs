//! `.gph` graph tile files
//!
//! Layout (all little-endian):
//!
//! ```text
//! header (64 bytes)
//!   magic u32 | version u16 | level u8 | reserved u8 | tile_index u32
//!   n_nodes u32 | n_edges u32 | n_shapes u32 | n_signs u32 | n_restrictions u32
//!   zero padding
//! nodes        lat f64 | lon f64 | attributes u32 | n_edges u32 | edge index u32 * n_edges
//! edges        edge index u64 | edge record (36 bytes)
//! shapes       shape point (8 bytes), in edge order
//! signs        node u64 | edge index u32 | n u32 | (kind u8 | len u32 | utf-8) * n
//! restrictions id i64 | kind u8 | from u64 | to u64 | n_via u32 | via u64 * n_via
//! footer       crc64 of everything above
//! ```
//!
//! Tiles live at `<root>/<level>/<tile index>.gph`, where the zero-padded tile
//! index is split into directories of three digits (`2/000/756/425.gph`).

use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

use super::crc::{self, ChecksumWriter};
use super::sequence::Record;
use super::{le_u32, le_u64};
use crate::builder::edge::{Edge, EdgeAttributes, ShapePoint};
use crate::builder::node::{Node, NodeAttributes};
use crate::builder::node_map::Restriction;
use crate::builder::signs::{NodeSigns, SignInfo, SignKind};
use crate::builder::writer::{TileData, TileWriter};
use crate::graph_id::GraphId;
use crate::osmdata::RestrictionType;
use crate::tiles::TileLevel;

const MAGIC: u32 = 0x4254_494C; // "BTIL"
const VERSION: u16 = 1;
const HEADER_SIZE: usize = 64;
const FOOTER_SIZE: usize = 8;

pub const TILE_EXTENSION: &str = "gph";

#[derive(Debug, Error)]
pub enum TileFormatError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("bad magic 0x{0:08X}")]
    BadMagic(u32),
    #[error("unsupported tile version {0}")]
    UnsupportedVersion(u16),
    #[error("unsupported hierarchy level {0}")]
    UnsupportedLevel(u8),
    #[error("CRC64 mismatch: computed 0x{computed:016X}, stored 0x{stored:016X}")]
    ChecksumMismatch { computed: u64, stored: u64 },
    #[error("tile is truncated")]
    Truncated,
    #[error("unknown sign kind {0}")]
    InvalidSignKind(u8),
    #[error("unknown restriction type {0}")]
    InvalidRestrictionType(u8),
    #[error("sign text is not valid UTF-8")]
    InvalidUtf8,
    #[error("{what} count {count} does not fit the tile header")]
    TooMany { what: &'static str, count: usize },
}

/// Relative path of a tile below the tile root
pub fn tile_path(level: &TileLevel, tile_index: u32) -> PathBuf {
    let max_digits = (level.tiles.tile_count().saturating_sub(1)).to_string().len();
    let width = max_digits.div_ceil(3) * 3;
    let digits = format!("{tile_index:0width$}");

    let mut path = PathBuf::from(level.level.to_string());
    let groups: Vec<&str> = (0..digits.len()).step_by(3).map(|i| &digits[i..i + 3]).collect();
    if let Some((file, dirs)) = groups.split_last() {
        for dir in dirs {
            path.push(dir);
        }
        path.push(format!("{file}.{TILE_EXTENSION}"));
    }
    path
}

fn count_u32(what: &'static str, count: usize) -> Result<u32, TileFormatError> {
    u32::try_from(count).map_err(|_| TileFormatError::TooMany { what, count })
}

fn encode_tile<W: Write>(out: &mut W, tile: &TileData<'_>) -> Result<(), TileFormatError> {
    let mut header = [0u8; HEADER_SIZE];
    header[0..4].copy_from_slice(&MAGIC.to_le_bytes());
    header[4..6].copy_from_slice(&VERSION.to_le_bytes());
    header[6] = tile.tile.level();
    header[8..12].copy_from_slice(&tile.tile.tile_index().to_le_bytes());
    header[12..16].copy_from_slice(&count_u32("node", tile.nodes.len())?.to_le_bytes());
    header[16..20].copy_from_slice(&count_u32("edge", tile.edges.len())?.to_le_bytes());
    header[20..24].copy_from_slice(&count_u32("shape", tile.shapes.len())?.to_le_bytes());
    header[24..28].copy_from_slice(&count_u32("sign", tile.signs.len())?.to_le_bytes());
    header[28..32].copy_from_slice(&count_u32("restriction", tile.restrictions.len())?.to_le_bytes());
    out.write_all(&header)?;

    for node in tile.nodes {
        out.write_all(&node.lat.to_le_bytes())?;
        out.write_all(&node.lon.to_le_bytes())?;
        out.write_all(&node.attributes.into_bits().to_le_bytes())?;
        out.write_all(&count_u32("incident edge", node.edges.len())?.to_le_bytes())?;
        for index in &node.edges {
            out.write_all(&index.to_le_bytes())?;
        }
    }

    let mut record = [0u8; Edge::SIZE];
    for (index, edge) in &tile.edges {
        out.write_all(&index.to_le_bytes())?;
        edge.encode(&mut record);
        out.write_all(&record)?;
    }

    let mut point = [0u8; ShapePoint::SIZE];
    for shape in &tile.shapes {
        shape.encode(&mut point);
        out.write_all(&point)?;
    }

    for node_signs in tile.signs {
        out.write_all(&node_signs.node.value().to_le_bytes())?;
        out.write_all(&node_signs.edge_index.to_le_bytes())?;
        out.write_all(&count_u32("sign", node_signs.signs.len())?.to_le_bytes())?;
        for sign in &node_signs.signs {
            out.write_all(&[sign.kind as u8])?;
            out.write_all(&count_u32("sign text byte", sign.text.len())?.to_le_bytes())?;
            out.write_all(sign.text.as_bytes())?;
        }
    }

    for restriction in tile.restrictions {
        out.write_all(&restriction.id.to_le_bytes())?;
        out.write_all(&[restriction.kind as u8])?;
        out.write_all(&restriction.from.value().to_le_bytes())?;
        out.write_all(&restriction.to.value().to_le_bytes())?;
        out.write_all(&count_u32("via", restriction.via.len())?.to_le_bytes())?;
        for via in &restriction.via {
            out.write_all(&via.value().to_le_bytes())?;
        }
    }

    Ok(())
}

/// Writes tiles as `.gph` files below a root directory.
///
/// Each tile is written to a temporary file next to its final path and
/// renamed into place once complete.
#[derive(Debug, Clone)]
pub struct DirectoryTileWriter {
    root: PathBuf,
}

impl DirectoryTileWriter {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Absolute path a tile is written to
    pub fn path_for(&self, tile: GraphId) -> Result<PathBuf, TileFormatError> {
        let level = TileLevel::from_level(tile.level()).ok_or(TileFormatError::UnsupportedLevel(tile.level()))?;
        Ok(self.root.join(tile_path(level, tile.tile_index())))
    }
}

impl TileWriter for DirectoryTileWriter {
    fn write_tile(&self, tile: &TileData<'_>) -> Result<(), TileFormatError> {
        let path = self.path_for(tile.tile)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let tmp_path = path.with_extension(format!("{TILE_EXTENSION}.tmp"));
        let written = write_tmp(&tmp_path, tile).and_then(|()| fs::rename(&tmp_path, &path).map_err(TileFormatError::from));
        if written.is_err() {
            let _ = fs::remove_file(&tmp_path);
        }
        written
    }
}

fn write_tmp(tmp_path: &Path, tile: &TileData<'_>) -> Result<(), TileFormatError> {
    let mut writer = ChecksumWriter::new(BufWriter::new(File::create(tmp_path)?));
    encode_tile(&mut writer, tile)?;

    let (mut inner, checksum) = writer.finish();
    inner.write_all(&checksum.to_le_bytes())?;
    let file = inner.into_inner().map_err(|e| e.into_error())?;
    file.sync_all()?;
    Ok(())
}

/// Decoded contents of a tile file
#[derive(Debug, Clone, PartialEq)]
pub struct TileContents {
    pub tile: GraphId,
    pub nodes: Vec<Node>,
    pub edges: Vec<(u64, Edge)>,
    pub shapes: Vec<ShapePoint>,
    pub signs: Vec<NodeSigns>,
    pub restrictions: Vec<Restriction>,
    pub checksum: u64,
}

struct Cursor<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn take(&mut self, n: usize) -> Result<&'a [u8], TileFormatError> {
        let end = self.pos.checked_add(n).ok_or(TileFormatError::Truncated)?;
        let bytes = self.buf.get(self.pos..end).ok_or(TileFormatError::Truncated)?;
        self.pos = end;
        Ok(bytes)
    }

    fn u8(&mut self) -> Result<u8, TileFormatError> {
        Ok(self.take(1)?[0])
    }

    fn u32(&mut self) -> Result<u32, TileFormatError> {
        Ok(le_u32(self.take(4)?, 0))
    }

    fn u64(&mut self) -> Result<u64, TileFormatError> {
        Ok(le_u64(self.take(8)?, 0))
    }

    fn f64(&mut self) -> Result<f64, TileFormatError> {
        Ok(f64::from_bits(self.u64()?))
    }

    fn graph_id(&mut self) -> Result<GraphId, TileFormatError> {
        Ok(GraphId::from_raw(self.u64()?))
    }
}

pub struct TileFile;

impl TileFile {
    /// Read and verify a tile file
    pub fn read<P: AsRef<Path>>(path: P) -> Result<TileContents, TileFormatError> {
        Self::decode(&fs::read(path)?)
    }

    pub fn decode(bytes: &[u8]) -> Result<TileContents, TileFormatError> {
        if bytes.len() < HEADER_SIZE + FOOTER_SIZE {
            return Err(TileFormatError::Truncated);
        }
        let (body, footer) = bytes.split_at(bytes.len() - FOOTER_SIZE);

        let magic = le_u32(body, 0);
        if magic != MAGIC {
            return Err(TileFormatError::BadMagic(magic));
        }
        let version = u16::from_le_bytes([body[4], body[5]]);
        if version != VERSION {
            return Err(TileFormatError::UnsupportedVersion(version));
        }

        let computed = crc::checksum(body);
        let stored = le_u64(footer, 0);
        if computed != stored {
            return Err(TileFormatError::ChecksumMismatch { computed, stored });
        }

        let tile = GraphId::try_from_components(body[6], le_u32(body, 8), 0)
            .map_err(|_| TileFormatError::UnsupportedLevel(body[6]))?;
        let n_nodes = le_u32(body, 12) as usize;
        let n_edges = le_u32(body, 16) as usize;
        let n_shapes = le_u32(body, 20) as usize;
        let n_signs = le_u32(body, 24) as usize;
        let n_restrictions = le_u32(body, 28) as usize;

        let mut cur = Cursor {
            buf: body,
            pos: HEADER_SIZE,
        };

        let mut nodes = Vec::with_capacity(n_nodes.min(body.len()));
        for _ in 0..n_nodes {
            let lat = cur.f64()?;
            let lon = cur.f64()?;
            let attributes = NodeAttributes::from_bits(cur.u32()?);
            let count = cur.u32()? as usize;
            let mut edges = Vec::with_capacity(count.min(body.len()));
            for _ in 0..count {
                edges.push(cur.u32()?);
            }
            nodes.push(Node {
                lat,
                lon,
                edges,
                attributes,
            });
        }

        let mut edges = Vec::with_capacity(n_edges.min(body.len()));
        for _ in 0..n_edges {
            let index = cur.u64()?;
            edges.push((index, Edge::decode(cur.take(Edge::SIZE)?)));
        }

        let mut shapes = Vec::with_capacity(n_shapes.min(body.len()));
        for _ in 0..n_shapes {
            shapes.push(ShapePoint::decode(cur.take(ShapePoint::SIZE)?));
        }

        let mut signs = Vec::with_capacity(n_signs.min(body.len()));
        for _ in 0..n_signs {
            let node = cur.graph_id()?;
            let edge_index = cur.u32()?;
            let count = cur.u32()? as usize;
            let mut list = Vec::with_capacity(count.min(body.len()));
            for _ in 0..count {
                let raw_kind = cur.u8()?;
                let kind = SignKind::from_u8(raw_kind).ok_or(TileFormatError::InvalidSignKind(raw_kind))?;
                let len = cur.u32()? as usize;
                let text = std::str::from_utf8(cur.take(len)?).map_err(|_| TileFormatError::InvalidUtf8)?;
                list.push(SignInfo {
                    kind,
                    text: text.to_string(),
                });
            }
            signs.push(NodeSigns {
                node,
                edge_index,
                signs: list,
            });
        }

        let mut restrictions = Vec::with_capacity(n_restrictions.min(body.len()));
        for _ in 0..n_restrictions {
            let id = cur.u64()? as i64;
            let raw_kind = cur.u8()?;
            let kind = RestrictionType::from_u8(raw_kind).ok_or(TileFormatError::InvalidRestrictionType(raw_kind))?;
            let from = cur.graph_id()?;
            let to = cur.graph_id()?;
            let count = cur.u32()? as usize;
            let mut via = Vec::with_capacity(count.min(body.len()));
            for _ in 0..count {
                via.push(cur.graph_id()?);
            }
            restrictions.push(Restriction {
                id,
                kind,
                from,
                via,
                to,
            });
        }

        Ok(TileContents {
            tile,
            nodes,
            edges,
            shapes,
            signs,
            restrictions,
            checksum: stored,
        })
    }
}

impl TileContents {
    /// Packed attributes of every edge, in file order
    pub fn edge_attributes(&self) -> impl Iterator<Item = EdgeAttributes> + '_ {
        self.edges.iter().map(|(_, edge)| edge.attributes)
    }
}
