//! Boundary error taxonomy.
//!
//! Errors only exist at the load/restore/parse boundaries. Nothing in the
//! frame loop can fail; a malformed tape ends playback silently instead.

use thiserror::Error;

/// ROM or RAM image of the wrong size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum LoadError {
    #[error("ROM image must be exactly 16384 bytes, got {0}")]
    RomSize(usize),
    #[error("RAM image must be exactly 49152 bytes, got {0}")]
    RamSize(usize),
}

/// Snapshot restore rejected; the machine is left untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SnapshotError {
    #[error("unsupported hardware mode {0} (a 48K machine accepts modes 0, 1 and 3)")]
    HardwareMode(u8),
    #[error(transparent)]
    Load(#[from] LoadError),
}

/// Malformed tape image.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TapeError {
    #[error("not a TZX file (missing \"ZXTape!\" signature)")]
    BadMagic,
    #[error("truncated {context} at offset {offset}")]
    Truncated {
        context: &'static str,
        offset: usize,
    },
    #[error("TAP block at offset {offset} declares length {len}, minimum is 2")]
    BlockTooShort { offset: usize, len: usize },
    #[error(
        "TAP block at offset {offset}: checksum mismatch (expected {expected:#04x}, got {found:#04x})"
    )]
    Checksum {
        offset: usize,
        expected: u8,
        found: u8,
    },
}
