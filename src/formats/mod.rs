//! On-disk formats: the disk-backed edge/shape sequences and graph tiles

pub mod crc;
pub mod sequence;
pub mod tile;

pub use sequence::{FrozenSequence, Record, Sequence, SequenceError, SequenceWriter};
pub use tile::{tile_path, DirectoryTileWriter, TileContents, TileFile, TileFormatError};

/// Little-endian `u32` at byte offset `at`
#[inline]
pub(crate) fn le_u32(buf: &[u8], at: usize) -> u32 {
    let mut bytes = [0u8; 4];
    bytes.copy_from_slice(&buf[at..at + 4]);
    u32::from_le_bytes(bytes)
}

/// Little-endian `u64` at byte offset `at`
#[inline]
pub(crate) fn le_u64(buf: &[u8], at: usize) -> u64 {
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&buf[at..at + 8]);
    u64::from_le_bytes(bytes)
}
