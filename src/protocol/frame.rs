//! Variable-length frame codec.

use heapless::Vec;

use super::crc::{crc16_ccitt, crc16_update};
use super::{
    frame_size, Address, Command, ErrorCode, END_BYTE, FRAME_OVERHEAD, HEADER_SIZE,
    MAX_FRAME_SIZE, MAX_PAYLOAD_SIZE, START_BYTE,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FrameError {
    /// Payload longer than [`MAX_PAYLOAD_SIZE`] on encode.
    InvalidData,
    BadStart,
    BadEnd,
    /// Declared length byte above [`MAX_PAYLOAD_SIZE`].
    LengthOutOfRange,
    /// Buffer shorter than the size the header declares.
    Truncated,
    CrcMismatch,
    /// Output buffer too small for the encoded frame.
    BufferTooSmall,
}

impl From<FrameError> for ErrorCode {
    fn from(value: FrameError) -> Self {
        match value {
            FrameError::CrcMismatch => ErrorCode::CrcFailed,
            FrameError::LengthOutOfRange => ErrorCode::OutOfRange,
            FrameError::BufferTooSmall => ErrorCode::BufferFull,
            FrameError::InvalidData
            | FrameError::BadStart
            | FrameError::BadEnd
            | FrameError::Truncated => ErrorCode::InvalidData,
        }
    }
}

/// One protocol message. Start/end markers and the CRC are implied; they
/// are produced by [`Frame::write_to`] and checked by [`decode`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub address: u8,
    pub command: u8,
    payload: Vec<u8, MAX_PAYLOAD_SIZE>,
}

impl Frame {
    pub fn new(address: u8, command: u8, payload: &[u8]) -> Result<Self, FrameError> {
        let payload = Vec::from_slice(payload).map_err(|_| FrameError::InvalidData)?;
        Ok(Self {
            address,
            command,
            payload,
        })
    }

    /// Typed constructor for frames this crate sends.
    pub fn to(address: Address, command: Command, payload: &[u8]) -> Result<Self, FrameError> {
        Self::new(address.into(), command.into(), payload)
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    pub fn len(&self) -> usize {
        self.payload.len()
    }

    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }

    pub fn address(&self) -> Option<Address> {
        Address::from_u8(self.address)
    }

    pub fn command(&self) -> Option<Command> {
        Command::from_u8(self.command)
    }

    /// Whether the station `me` should handle this frame.
    pub fn is_for(&self, me: Address) -> bool {
        self.address().is_some_and(|a| a.reaches(me))
    }

    /// CRC16 over `address, command, length, payload`.
    pub fn crc(&self) -> u16 {
        let head = [self.address, self.command, self.payload.len() as u8];
        crc16_update(crc16_ccitt(&head), &self.payload)
    }

    /// Total bytes on the wire.
    pub fn wire_len(&self) -> usize {
        frame_size(self.payload.len())
    }

    /// Serialize into `buf`, returning the number of bytes written.
    pub fn write_to(&self, buf: &mut [u8]) -> Result<usize, FrameError> {
        let total = self.wire_len();
        if buf.len() < total {
            return Err(FrameError::BufferTooSmall);
        }
        let n = self.payload.len();
        let crc = self.crc();

        buf[0] = START_BYTE;
        buf[1] = self.address;
        buf[2] = self.command;
        buf[3] = n as u8;
        buf[HEADER_SIZE..HEADER_SIZE + n].copy_from_slice(&self.payload);
        buf[HEADER_SIZE + n..HEADER_SIZE + n + 2].copy_from_slice(&crc.to_be_bytes());
        buf[total - 1] = END_BYTE;

        trace!(
            "frame built: addr={=u8:#x} cmd={=u8:#x} len={=usize} crc={=u16:#x}",
            self.address,
            self.command,
            n,
            crc
        );
        Ok(total)
    }

    pub fn to_bytes(&self) -> Vec<u8, MAX_FRAME_SIZE> {
        let mut out = Vec::new();
        // capacity is MAX_FRAME_SIZE and payload is capped, so this cannot fail
        let _ = out.resize(self.wire_len(), 0);
        let _ = self.write_to(&mut out);
        out
    }
}

/// Build a frame, rejecting payloads above [`MAX_PAYLOAD_SIZE`].
pub fn encode(address: u8, command: u8, payload: &[u8]) -> Result<Frame, FrameError> {
    Frame::new(address, command, payload)
}

/// Parse and validate one frame starting at `buf[0]`.
///
/// Trailing bytes past the declared size are ignored. Nothing past the
/// declared size or the end of `buf` is ever read.
pub fn decode(buf: &[u8]) -> Result<Frame, FrameError> {
    match buf.first() {
        None => return Err(FrameError::Truncated),
        Some(&b) if b != START_BYTE => return Err(FrameError::BadStart),
        Some(_) => {}
    }
    if buf.len() < HEADER_SIZE {
        return Err(FrameError::Truncated);
    }

    let len = buf[3] as usize;
    if len > MAX_PAYLOAD_SIZE {
        debug!("frame rejected: length {=usize} out of range", len);
        return Err(FrameError::LengthOutOfRange);
    }

    let total = frame_size(len);
    let frame = buf.get(..total).ok_or(FrameError::Truncated)?;

    if frame[total - 1] != END_BYTE {
        debug!("frame rejected: bad end marker");
        return Err(FrameError::BadEnd);
    }

    let crc_at = HEADER_SIZE + len;
    let received = u16::from_be_bytes([frame[crc_at], frame[crc_at + 1]]);
    let computed = crc16_ccitt(&frame[1..crc_at]);
    if received != computed {
        debug!(
            "frame rejected: crc {=u16:#x} != {=u16:#x}",
            received,
            computed
        );
        return Err(FrameError::CrcMismatch);
    }

    let frame = Frame::new(frame[1], frame[2], &frame[HEADER_SIZE..crc_at])?;
    trace!(
        "frame parsed: addr={=u8:#x} cmd={=u8:#x} len={=usize}",
        frame.address,
        frame.command,
        len
    );
    Ok(frame)
}

const _: () = assert!(MAX_FRAME_SIZE == MAX_PAYLOAD_SIZE + FRAME_OVERHEAD);
const _: () = assert!(MAX_PAYLOAD_SIZE <= u8::MAX as usize);
