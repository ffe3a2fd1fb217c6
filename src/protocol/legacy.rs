//! Fixed 8-byte packet used by the first generation of shack controllers.
//!
//! ```text
//! [0xAA] [CMD] [P1_H] [P1_L] [P2_H] [P2_L] [XOR] [0x55]
//! ```
//!
//! No addressing, and only an XOR checksum over the first six bytes. Position
//! parameters are degrees × 10.

use embassy_time::{Duration, Instant};

use super::{END_BYTE, START_BYTE};

pub const PACKET_SIZE: usize = 8;

/// Silence after which a partial packet is dropped.
pub const PACKET_TIMEOUT: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum LegacyCommand {
    Ping = 0x00,
    RotateCw = 0x10,
    RotateCcw = 0x11,
    RotateUp = 0x12,
    RotateDown = 0x13,
    StopAz = 0x14,
    StopEl = 0x15,
    StopAll = 0x16,
    RotateToAz = 0x20,
    RotateToEl = 0x21,
    SetSpeedAz = 0x30,
    SetSpeedEl = 0x31,
    GetStatus = 0x40,
    GetPosition = 0x41,
    Pong = 0x80,
    PositionReport = 0x90,
    StatusReport = 0x91,
    Ack = 0xA0,
    Error = 0xFF,
}

impl LegacyCommand {
    pub fn from_u8(value: u8) -> Option<Self> {
        let cmd = match value {
            0x00 => Self::Ping,
            0x10 => Self::RotateCw,
            0x11 => Self::RotateCcw,
            0x12 => Self::RotateUp,
            0x13 => Self::RotateDown,
            0x14 => Self::StopAz,
            0x15 => Self::StopEl,
            0x16 => Self::StopAll,
            0x20 => Self::RotateToAz,
            0x21 => Self::RotateToEl,
            0x30 => Self::SetSpeedAz,
            0x31 => Self::SetSpeedEl,
            0x40 => Self::GetStatus,
            0x41 => Self::GetPosition,
            0x80 => Self::Pong,
            0x90 => Self::PositionReport,
            0x91 => Self::StatusReport,
            0xA0 => Self::Ack,
            0xFF => Self::Error,
            _ => return None,
        };
        Some(cmd)
    }
}

/// XOR of every byte in `data`.
pub fn xor_checksum(data: &[u8]) -> u8 {
    data.iter().fold(0, |acc, &b| acc ^ b)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct LegacyPacket {
    pub command: u8,
    pub param1: u16,
    pub param2: u16,
}

impl LegacyPacket {
    pub fn new(command: LegacyCommand, param1: u16, param2: u16) -> Self {
        Self {
            command: command as u8,
            param1,
            param2,
        }
    }

    /// Position report carrying azimuth and elevation in tenths of a degree.
    pub fn position(azimuth: f32, elevation: f32) -> Self {
        Self::new(
            LegacyCommand::PositionReport,
            to_tenths(azimuth),
            to_tenths(elevation),
        )
    }

    pub fn command(&self) -> Option<LegacyCommand> {
        LegacyCommand::from_u8(self.command)
    }

    pub fn param1_degrees(&self) -> f32 {
        self.param1 as f32 / 10.0
    }

    pub fn param2_degrees(&self) -> f32 {
        self.param2 as f32 / 10.0
    }

    pub fn encode(&self) -> [u8; PACKET_SIZE] {
        let [p1h, p1l] = self.param1.to_be_bytes();
        let [p2h, p2l] = self.param2.to_be_bytes();
        let mut out = [START_BYTE, self.command, p1h, p1l, p2h, p2l, 0, END_BYTE];
        out[6] = xor_checksum(&out[..6]);
        out
    }

    /// `None` on a bad marker or checksum.
    pub fn decode(buf: &[u8; PACKET_SIZE]) -> Option<Self> {
        if buf[0] != START_BYTE || buf[7] != END_BYTE {
            return None;
        }
        if xor_checksum(&buf[..6]) != buf[6] {
            return None;
        }
        Some(Self {
            command: buf[1],
            param1: u16::from_be_bytes([buf[2], buf[3]]),
            param2: u16::from_be_bytes([buf[4], buf[5]]),
        })
    }
}

fn to_tenths(degrees: f32) -> u16 {
    let t = degrees * 10.0 + 0.5;
    if t.is_nan() || t < 0.0 {
        0
    } else if t >= u16::MAX as f32 {
        u16::MAX
    } else {
        t as u16
    }
}

// ── Byte-at-a-time parser ─────────────────────────────────────────────────────

/// Assembles packets one byte at a time.
#[derive(Debug, Default)]
pub struct LegacyParser {
    buf: [u8; PACKET_SIZE],
    index: usize,
    last_byte: Option<Instant>,
    errors: u32,
}

impl LegacyParser {
    pub const fn new() -> Self {
        Self {
            buf: [0; PACKET_SIZE],
            index: 0,
            last_byte: None,
            errors: 0,
        }
    }

    /// Feed one byte received at `now`. Returns a packet once eight valid
    /// bytes have been collected.
    pub fn push(&mut self, byte: u8, now: Instant) -> Option<LegacyPacket> {
        if let Some(last) = self.last_byte {
            if self.index > 0 && now.saturating_duration_since(last) > PACKET_TIMEOUT {
                warn!("legacy packet timed out after {=usize} bytes", self.index);
                self.index = 0;
                self.errors += 1;
            }
        }
        self.last_byte = Some(now);

        if self.index == 0 {
            if byte == START_BYTE {
                self.buf[0] = byte;
                self.index = 1;
            }
            return None;
        }

        self.buf[self.index] = byte;
        self.index += 1;
        if self.index < PACKET_SIZE {
            return None;
        }

        self.index = 0;
        let packet = LegacyPacket::decode(&self.buf);
        if packet.is_none() {
            debug!("legacy packet rejected");
            self.errors += 1;
        }
        packet
    }

    pub fn reset(&mut self) {
        self.index = 0;
        self.last_byte = None;
    }

    pub fn errors(&self) -> u32 {
        self.errors
    }

    /// True while a packet is partially assembled.
    pub fn is_partial(&self) -> bool {
        self.index > 0
    }
}
