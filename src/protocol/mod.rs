//! Wire protocol shared by the Antenna and Shack stations.
//!
//! ```text
//! [0xAA] [ADDR] [CMD] [LEN] [DATA 0..=64] [CRC_H] [CRC_L] [0x55]
//! ```
//!
//! The CRC16-CCITT covers `ADDR, CMD, LEN, DATA`. The 8-byte fixed packet in
//! [`legacy`] is a separate, smaller binding kept for older firmware.

pub mod commands;
pub mod crc;
pub mod frame;
pub mod legacy;

pub use commands::{Address, Command, CommandClass, ErrorCode};
pub use crc::crc16_ccitt;
pub use frame::{decode, encode, Frame, FrameError};

// ── Frame layout ──────────────────────────────────────────────────────────────

pub const START_BYTE: u8 = 0xAA;
pub const END_BYTE: u8 = 0x55;

/// Largest payload a frame may carry.
pub const MAX_PAYLOAD_SIZE: usize = 64;
/// start + addr + cmd + len + crc(2) + end
pub const FRAME_OVERHEAD: usize = 7;
pub const MAX_FRAME_SIZE: usize = MAX_PAYLOAD_SIZE + FRAME_OVERHEAD;
/// Bytes up to and including the length field.
pub const HEADER_SIZE: usize = 4;

/// Total on-wire size of a frame carrying `payload_len` bytes.
pub const fn frame_size(payload_len: usize) -> usize {
    payload_len + FRAME_OVERHEAD
}
