//! Value records exchanged over the link.
//!
//! All types are `Copy`; each node owns one long-lived `RotatorState` and
//! mutates it in place. Wire encodings are fixed big-endian with no padding so
//! both stations agree regardless of toolchain.

use crate::protocol::ErrorCode;

// ── Status flags ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct StatusFlags(pub u8);

impl StatusFlags {
    pub const MOVING_AZ: u8 = 0x01;
    pub const MOVING_EL: u8 = 0x02;
    pub const LIMIT_AZ_CCW: u8 = 0x04;
    pub const LIMIT_AZ_CW: u8 = 0x08;
    pub const LIMIT_EL_DOWN: u8 = 0x10;
    pub const LIMIT_EL_UP: u8 = 0x20;
    pub const GPS_VALID: u8 = 0x40;
    pub const ERROR: u8 = 0x80;

    pub const fn bits(self) -> u8 {
        self.0
    }

    pub const fn contains(self, mask: u8) -> bool {
        self.0 & mask == mask
    }

    pub fn insert(&mut self, mask: u8) {
        self.0 |= mask;
    }

    pub fn remove(&mut self, mask: u8) {
        self.0 &= !mask;
    }

    pub fn set(&mut self, mask: u8, on: bool) {
        if on {
            self.insert(mask);
        } else {
            self.remove(mask);
        }
    }

    pub const fn moving_az(self) -> bool {
        self.contains(Self::MOVING_AZ)
    }

    pub const fn moving_el(self) -> bool {
        self.contains(Self::MOVING_EL)
    }

    pub const fn is_moving(self) -> bool {
        self.0 & (Self::MOVING_AZ | Self::MOVING_EL) != 0
    }

    pub const fn limit_az_ccw(self) -> bool {
        self.contains(Self::LIMIT_AZ_CCW)
    }

    pub const fn limit_az_cw(self) -> bool {
        self.contains(Self::LIMIT_AZ_CW)
    }

    pub const fn limit_el_down(self) -> bool {
        self.contains(Self::LIMIT_EL_DOWN)
    }

    pub const fn limit_el_up(self) -> bool {
        self.contains(Self::LIMIT_EL_UP)
    }

    pub const fn gps_valid(self) -> bool {
        self.contains(Self::GPS_VALID)
    }

    pub const fn error(self) -> bool {
        self.contains(Self::ERROR)
    }
}

// ── Rotator state ─────────────────────────────────────────────────────────────

/// Position and status snapshot. The Master alone writes the `*_current`
/// fields; targets may be requested by either side but only the Master acts.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RotatorState {
    pub azimuth_current: f32,
    pub elevation_current: f32,
    pub azimuth_target: f32,
    pub elevation_target: f32,
    pub status_flags: StatusFlags,
    pub error_code: u8,
    /// Milliseconds on the clock of whichever node stamped it.
    pub timestamp: u32,
}

impl RotatorState {
    /// Encoded payload size; anything else on the wire is treated as stale.
    pub const WIRE_SIZE: usize = 22;

    pub fn to_bytes(&self) -> [u8; Self::WIRE_SIZE] {
        let mut buf = [0u8; Self::WIRE_SIZE];
        buf[0..4].copy_from_slice(&self.azimuth_current.to_be_bytes());
        buf[4..8].copy_from_slice(&self.elevation_current.to_be_bytes());
        buf[8..12].copy_from_slice(&self.azimuth_target.to_be_bytes());
        buf[12..16].copy_from_slice(&self.elevation_target.to_be_bytes());
        buf[16] = self.status_flags.bits();
        buf[17] = self.error_code;
        buf[18..22].copy_from_slice(&self.timestamp.to_be_bytes());
        buf
    }

    /// `None` unless `buf` is exactly [`Self::WIRE_SIZE`] bytes.
    pub fn from_bytes(buf: &[u8]) -> Option<Self> {
        let buf: &[u8; Self::WIRE_SIZE] = buf.try_into().ok()?;
        Some(Self {
            azimuth_current: f32_at(buf, 0),
            elevation_current: f32_at(buf, 4),
            azimuth_target: f32_at(buf, 8),
            elevation_target: f32_at(buf, 12),
            status_flags: StatusFlags(buf[16]),
            error_code: buf[17],
            timestamp: u32::from_be_bytes([buf[18], buf[19], buf[20], buf[21]]),
        })
    }

    /// Decoded error code; unknown values read as `Hardware`.
    pub fn error(&self) -> ErrorCode {
        ErrorCode::from_u8(self.error_code).unwrap_or(ErrorCode::Hardware)
    }

    pub fn is_moving_az(&self) -> bool {
        self.status_flags.moving_az()
    }

    pub fn is_moving_el(&self) -> bool {
        self.status_flags.moving_el()
    }

    pub fn gps_valid(&self) -> bool {
        self.status_flags.gps_valid()
    }
}

// ── GPS ───────────────────────────────────────────────────────────────────────

/// Defined by the protocol for a future `CMD_GET_GPS_DATA` exchange.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct GpsData {
    pub latitude: f32,
    pub longitude: f32,
    pub altitude: f32,
    pub satellites: u8,
    /// 0 = invalid, 1 = GPS, 2 = DGPS
    pub fix_quality: u8,
    pub timestamp: u32,
}

impl GpsData {
    pub const WIRE_SIZE: usize = 18;

    pub fn has_fix(&self) -> bool {
        self.fix_quality > 0
    }

    pub fn to_bytes(&self) -> [u8; Self::WIRE_SIZE] {
        let mut buf = [0u8; Self::WIRE_SIZE];
        buf[0..4].copy_from_slice(&self.latitude.to_be_bytes());
        buf[4..8].copy_from_slice(&self.longitude.to_be_bytes());
        buf[8..12].copy_from_slice(&self.altitude.to_be_bytes());
        buf[12] = self.satellites;
        buf[13] = self.fix_quality;
        buf[14..18].copy_from_slice(&self.timestamp.to_be_bytes());
        buf
    }

    pub fn from_bytes(buf: &[u8]) -> Option<Self> {
        let buf: &[u8; Self::WIRE_SIZE] = buf.try_into().ok()?;
        Some(Self {
            latitude: f32_at(buf, 0),
            longitude: f32_at(buf, 4),
            altitude: f32_at(buf, 8),
            satellites: buf[12],
            fix_quality: buf[13],
            timestamp: u32::from_be_bytes([buf[14], buf[15], buf[16], buf[17]]),
        })
    }
}

fn f32_at(buf: &[u8], at: usize) -> f32 {
    f32::from_be_bytes([buf[at], buf[at + 1], buf[at + 2], buf[at + 3]])
}
