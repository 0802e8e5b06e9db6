//! ZX Spectrum 48K core.
//!
//! Wires the [`zx48_z80`] interpreter to the Spectrum's memory map, ULA and
//! tape deck, and drives them a 69,888 T-state frame at a time. The pixel
//! renderer, audio sink and host shell live outside: this crate hands them
//! the screen bytes, the per-frame border-change log and the beeper interval
//! stream, and consumes key events and parsed tapes in return.
//!
//! All cross-component wiring happens through per-call borrows; no component
//! holds a reference to another.

mod beeper;
mod bus;
mod error;
mod memory;
mod snapshot;
mod spectrum;
pub mod tape;
mod ula;

pub use beeper::{Beeper, BeeperSample};
pub use bus::SystemBus;
pub use error::{LoadError, SnapshotError, TapeError};
pub use memory::{Memory, RAM_SIZE, ROM_SIZE};
pub use snapshot::Snapshot;
pub use spectrum::{Spectrum, TSTATES_PER_FRAME};
pub use tape::{TapeBlock, TapePlayer};
pub use ula::{SCANLINES_PER_FRAME, TSTATES_PER_SCANLINE, Ula};
