//! Station addresses, command codes, and error codes.

// ── Addresses ─────────────────────────────────────────────────────────────────

pub const MASTER_ADDRESS: u8 = 0x01; // Antenna unit
pub const REMOTE_ADDRESS: u8 = 0x02; // Shack unit
pub const BROADCAST_ADDRESS: u8 = 0xFF;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum Address {
    Master = MASTER_ADDRESS,
    Remote = REMOTE_ADDRESS,
    Broadcast = BROADCAST_ADDRESS,
}

impl Address {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            MASTER_ADDRESS => Some(Self::Master),
            REMOTE_ADDRESS => Some(Self::Remote),
            BROADCAST_ADDRESS => Some(Self::Broadcast),
            _ => None,
        }
    }

    /// True when a frame sent to `self` should be handled by the station `me`.
    pub fn reaches(self, me: Address) -> bool {
        self == me || self == Address::Broadcast
    }
}

impl From<Address> for u8 {
    fn from(value: Address) -> Self {
        value as u8
    }
}

// ── Commands ──────────────────────────────────────────────────────────────────

/// Command codes. The leading nibble gives the [`CommandClass`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum Command {
    // Remote -> Master queries
    GetPosition = 0x10,
    GetStatus = 0x11,
    GetGpsData = 0x12,
    GetSensors = 0x13,

    // Remote -> Master commands
    MoveTo = 0x20,
    Stop = 0x21,
    Park = 0x22,
    SetPreset = 0x23,
    Calibrate = 0x24,
    SetParkPos = 0x25,

    // Master -> Remote responses
    PositionData = 0x30,
    StatusData = 0x31,
    GpsData = 0x32,
    SensorData = 0x33,
    Ack = 0x3E,
    Nak = 0x3F,

    // Master -> all, unsolicited
    PositionUpdate = 0x40,
    Alarm = 0x41,
    StatusChange = 0x42,
    Heartbeat = 0x43,
}

impl Command {
    pub fn from_u8(value: u8) -> Option<Self> {
        let cmd = match value {
            0x10 => Self::GetPosition,
            0x11 => Self::GetStatus,
            0x12 => Self::GetGpsData,
            0x13 => Self::GetSensors,
            0x20 => Self::MoveTo,
            0x21 => Self::Stop,
            0x22 => Self::Park,
            0x23 => Self::SetPreset,
            0x24 => Self::Calibrate,
            0x25 => Self::SetParkPos,
            0x30 => Self::PositionData,
            0x31 => Self::StatusData,
            0x32 => Self::GpsData,
            0x33 => Self::SensorData,
            0x3E => Self::Ack,
            0x3F => Self::Nak,
            0x40 => Self::PositionUpdate,
            0x41 => Self::Alarm,
            0x42 => Self::StatusChange,
            0x43 => Self::Heartbeat,
            _ => return None,
        };
        Some(cmd)
    }

    pub fn class(self) -> CommandClass {
        // every variant sits inside one of the four ranges
        CommandClass::of(self as u8).unwrap_or(CommandClass::Query)
    }
}

impl From<Command> for u8 {
    fn from(value: Command) -> Self {
        value as u8
    }
}

/// Partition of the command space by leading nibble.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CommandClass {
    /// 0x10..=0x1F, Remote -> Master
    Query,
    /// 0x20..=0x2F, Remote -> Master
    Control,
    /// 0x30..=0x3F, Master -> Remote
    Response,
    /// 0x40..=0x4F, Master -> all
    Broadcast,
}

impl CommandClass {
    pub fn of(code: u8) -> Option<Self> {
        match code >> 4 {
            0x1 => Some(Self::Query),
            0x2 => Some(Self::Control),
            0x3 => Some(Self::Response),
            0x4 => Some(Self::Broadcast),
            _ => None,
        }
    }

    /// Classes a Master is expected to receive.
    pub fn is_request(self) -> bool {
        matches!(self, Self::Query | Self::Control)
    }
}

// ── Error codes ───────────────────────────────────────────────────────────────

/// Carried in `RotatorState::error_code` and as the single byte of a NAK.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum ErrorCode {
    #[default]
    None = 0x00,
    InvalidCommand = 0x01,
    InvalidData = 0x02,
    OutOfRange = 0x03,
    Busy = 0x04,
    Timeout = 0x05,
    CrcFailed = 0x06,
    BufferFull = 0x07,
    CommLost = 0x08,
    Hardware = 0x09,
}

impl ErrorCode {
    pub fn from_u8(value: u8) -> Option<Self> {
        let code = match value {
            0x00 => Self::None,
            0x01 => Self::InvalidCommand,
            0x02 => Self::InvalidData,
            0x03 => Self::OutOfRange,
            0x04 => Self::Busy,
            0x05 => Self::Timeout,
            0x06 => Self::CrcFailed,
            0x07 => Self::BufferFull,
            0x08 => Self::CommLost,
            0x09 => Self::Hardware,
            _ => return None,
        };
        Some(code)
    }
}

impl From<ErrorCode> for u8 {
    fn from(value: ErrorCode) -> Self {
        value as u8
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_command_round_trips_through_its_code() {
        for code in 0u8..=0xFF {
            if let Some(cmd) = Command::from_u8(code) {
                assert_eq!(u8::from(cmd), code);
            }
        }
    }

    #[test]
    fn classes_follow_leading_nibble() {
        assert_eq!(Command::GetSensors.class(), CommandClass::Query);
        assert_eq!(Command::SetParkPos.class(), CommandClass::Control);
        assert_eq!(Command::Ack.class(), CommandClass::Response);
        assert_eq!(Command::Nak.class(), CommandClass::Response);
        assert_eq!(Command::Heartbeat.class(), CommandClass::Broadcast);
        assert_eq!(CommandClass::of(0x05), None);
        assert_eq!(CommandClass::of(0x50), None);
        assert!(CommandClass::Control.is_request());
        assert!(!CommandClass::Broadcast.is_request());
    }

    #[test]
    fn broadcast_reaches_every_station() {
        assert!(Address::Broadcast.reaches(Address::Master));
        assert!(Address::Broadcast.reaches(Address::Remote));
        assert!(Address::Remote.reaches(Address::Remote));
        assert!(!Address::Remote.reaches(Address::Master));
        assert_eq!(Address::from_u8(0x03), None);
    }

    #[test]
    fn error_codes_match_wire_values() {
        assert_eq!(u8::from(ErrorCode::InvalidCommand), 0x01);
        assert_eq!(u8::from(ErrorCode::Hardware), 0x09);
        assert_eq!(ErrorCode::from_u8(0x06), Some(ErrorCode::CrcFailed));
        assert_eq!(ErrorCode::from_u8(0x0A), None);
    }
}
