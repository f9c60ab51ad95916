//! Memory-mapped command layer for the AWG peripheral.
//!
//! Presents a narrow, ordered write path: pack a 32-bit command word, write
//! it to the DATA register, then pulse WEN once. Everything above this
//! layer (the frame list, the player, the servers) only ever calls
//! [`Hw::send_words`].

mod backend;
mod command;
mod error;
pub mod fake;
mod hw;

pub use backend::{HwBackend, MmapBackend};
pub use command::{CommandWord, N_CHANNELS, N_TONES, zero_gain_frame};
pub use error::HwError;
pub use hw::Hw;

/// Physical base address of the DATA/VALUE register window.
pub const DATA_BASE: usize = 0x4120_0000;
/// Physical base address of the WEN strobe register window.
pub const WEN_BASE: usize = 0x4121_0000;
/// Size, in bytes, of each mapped register window.
pub const WINDOW_LEN: usize = 0x1000;

/// A frame holds at most this many command words.
pub const MAX_WORDS_PER_FRAME: usize = 64;
