//! Graph identifiers
//!
//! A [`GraphId`] packs a hierarchy level, a tile index and an entry index into a
//! single `u64`:
//!
//! ```text
//!  bits 0..3    level
//!  bits 3..25   tile index
//!  bits 25..46  entry index (node position within its tile)
//! ```
//!
//! Ids are issued once by the edge constructor and never reassigned.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

const LEVEL_BITS: u32 = 3;
const TILE_BITS: u32 = 22;
const INDEX_BITS: u32 = 21;

/// Largest representable hierarchy level
pub const MAX_LEVEL: u8 = (1 << LEVEL_BITS) - 1;
/// Largest representable tile index
pub const MAX_TILE_INDEX: u32 = (1 << TILE_BITS) - 1;
/// Largest representable entry index within a tile
pub const MAX_ENTRY_INDEX: u32 = (1 << INDEX_BITS) - 1;

const INVALID: u64 = (1 << (LEVEL_BITS + TILE_BITS + INDEX_BITS)) - 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum InvalidGraphIdError {
    #[error("level {0} exceeds the maximum of {max}", max = MAX_LEVEL)]
    Level(u8),
    #[error("tile index {0} exceeds the maximum of {max}", max = MAX_TILE_INDEX)]
    TileIndex(u32),
    #[error("entry index {0} exceeds the maximum of {max}", max = MAX_ENTRY_INDEX)]
    EntryIndex(u32),
    #[error("components {level}/{tile_index}/{entry_index} pack to the reserved invalid id")]
    Reserved { level: u8, tile_index: u32, entry_index: u32 },
}

#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GraphId(u64);

impl GraphId {
    /// Sentinel used for edge targets that have not been reached yet.
    pub const INVALID: GraphId = GraphId(INVALID);

    pub fn try_from_components(level: u8, tile_index: u32, entry_index: u32) -> Result<Self, InvalidGraphIdError> {
        if level > MAX_LEVEL {
            return Err(InvalidGraphIdError::Level(level));
        }
        if tile_index > MAX_TILE_INDEX {
            return Err(InvalidGraphIdError::TileIndex(tile_index));
        }
        if entry_index > MAX_ENTRY_INDEX {
            return Err(InvalidGraphIdError::EntryIndex(entry_index));
        }

        let value = u64::from(level)
            | (u64::from(tile_index) << LEVEL_BITS)
            | (u64::from(entry_index) << (LEVEL_BITS + TILE_BITS));
        if value == INVALID {
            return Err(InvalidGraphIdError::Reserved {
                level,
                tile_index,
                entry_index,
            });
        }
        Ok(GraphId(value))
    }

    #[inline]
    pub const fn from_raw(value: u64) -> Self {
        GraphId(value)
    }

    #[inline]
    pub const fn value(self) -> u64 {
        self.0
    }

    #[inline]
    pub const fn level(self) -> u8 {
        (self.0 & ((1 << LEVEL_BITS) - 1)) as u8
    }

    #[inline]
    pub const fn tile_index(self) -> u32 {
        ((self.0 >> LEVEL_BITS) & ((1 << TILE_BITS) - 1)) as u32
    }

    #[inline]
    pub const fn entry_index(self) -> u32 {
        ((self.0 >> (LEVEL_BITS + TILE_BITS)) & ((1 << INDEX_BITS) - 1)) as u32
    }

    #[inline]
    pub const fn is_valid(self) -> bool {
        self.0 != INVALID
    }

    /// The id of the tile containing this id (entry index zeroed).
    #[inline]
    pub const fn tile_base(self) -> GraphId {
        GraphId(self.0 & ((1 << (LEVEL_BITS + TILE_BITS)) - 1))
    }

    /// Returns a new id in the same tile with a different entry index.
    pub fn with_entry_index(self, entry_index: u32) -> Result<Self, InvalidGraphIdError> {
        Self::try_from_components(self.level(), self.tile_index(), entry_index)
    }
}

// Ordered by (level, tile, entry) rather than by the packed value, which is entry-major.
impl Ord for GraphId {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        (self.level(), self.tile_index(), self.entry_index()).cmp(&(
            other.level(),
            other.tile_index(),
            other.entry_index(),
        ))
    }
}

impl PartialOrd for GraphId {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Debug for GraphId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_valid() {
            write!(f, "GraphId({}/{}/{})", self.level(), self.tile_index(), self.entry_index())
        } else {
            f.write_str("GraphId(invalid)")
        }
    }
}

impl fmt::Display for GraphId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.level(), self.tile_index(), self.entry_index())
    }
}
