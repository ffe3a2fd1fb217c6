//! Half-duplex RS-485 transport.
//!
//! One UART plus one direction line (DE and /RE tied together, high drives
//! the bus). [`Transport::send`] owns the turnaround; [`Transport::receive`]
//! assembles frames byte by byte into a fixed buffer and hands complete
//! frames to [`decode`](crate::protocol::decode).

use core::cmp::min;

use embassy_time::{with_timeout, Duration, Instant, Timer};
use embedded_hal::digital::OutputPin;
use embedded_io_async::{Read, Write};
use heapless::Vec;

use crate::config::LinkConfig;
use crate::protocol::legacy::{LegacyPacket, LegacyParser};
use crate::protocol::{
    decode, frame_size, Frame, FrameError, END_BYTE, HEADER_SIZE, MAX_FRAME_SIZE,
    MAX_PAYLOAD_SIZE, START_BYTE,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LinkError<E> {
    /// UART read, write or flush failed.
    Port(E),
    /// The direction line could not be driven.
    Direction,
    /// Nothing complete arrived before the deadline.
    Timeout,
    /// Accumulator hit [`MAX_FRAME_SIZE`]. The length byte is checked before
    /// any wait, so this is a hard cap that valid traffic never reaches.
    BufferOverflow,
    /// A complete frame failed validation.
    Frame(FrameError),
}

impl<E> From<FrameError> for LinkError<E> {
    fn from(value: FrameError) -> Self {
        LinkError::Frame(value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct LinkStats {
    pub frames_sent: u32,
    pub frames_received: u32,
    pub frame_errors: u32,
    /// Bytes dropped while scanning for a start marker.
    pub discarded_bytes: u32,
    pub inter_byte_resets: u32,
}

pub struct Transport<P, D> {
    port: P,
    de: D,
    rx: Vec<u8, MAX_FRAME_SIZE>,
    last_byte: Option<Instant>,
    legacy: LegacyParser,
    guard: Duration,
    inter_byte: Duration,
    stats: LinkStats,
}

impl<P, D> Transport<P, D>
where
    P: Read + Write,
    D: OutputPin,
{
    pub fn new(port: P, de: D, config: &LinkConfig) -> Self {
        Self {
            port,
            de,
            rx: Vec::new(),
            last_byte: None,
            legacy: LegacyParser::new(),
            guard: config.turnaround_guard(),
            inter_byte: config.inter_byte_timeout(),
            stats: LinkStats::default(),
        }
    }

    /// Release the bus. Call once before the first exchange.
    pub fn listen(&mut self) -> Result<(), LinkError<P::Error>> {
        self.de.set_low().map_err(|_| LinkError::Direction)
    }

    pub async fn send(&mut self, frame: &Frame) -> Result<(), LinkError<P::Error>> {
        let bytes = frame.to_bytes();
        self.transmit(&bytes).await?;
        self.stats.frames_sent += 1;
        Ok(())
    }

    pub async fn send_legacy(&mut self, packet: &LegacyPacket) -> Result<(), LinkError<P::Error>> {
        self.transmit(&packet.encode()).await?;
        self.stats.frames_sent += 1;
        Ok(())
    }

    /// Drive the bus, write `bytes`, wait for the last stop bit, release.
    ///
    /// The line is back in receive mode on return, whatever the outcome.
    pub async fn transmit(&mut self, bytes: &[u8]) -> Result<(), LinkError<P::Error>> {
        self.de.set_high().map_err(|_| LinkError::Direction)?;
        Timer::after(self.guard).await;

        let written = match self.port.write_all(bytes).await {
            Ok(()) => self.port.flush().await,
            Err(e) => Err(e),
        };

        Timer::after(self.guard).await;
        let released = self.de.set_low();

        if written.is_err() {
            warn!("tx of {=usize} bytes failed", bytes.len());
        }
        written.map_err(LinkError::Port)?;
        released.map_err(|_| LinkError::Direction)
    }

    /// Wait up to `timeout` for one valid frame.
    ///
    /// Corrupt frames are dropped and scanning continues; if the deadline
    /// passes after one was dropped, its error is returned instead of
    /// [`LinkError::Timeout`]. A partial frame survives between calls unless
    /// the inter-byte timeout elapses.
    pub async fn receive(&mut self, timeout: Duration) -> Result<Frame, LinkError<P::Error>> {
        let deadline = Instant::now() + timeout;
        let mut last_error = None;

        loop {
            let now = Instant::now();
            self.expire_partial(now);
            if now >= deadline {
                return Err(last_error.unwrap_or(LinkError::Timeout));
            }

            let remaining = deadline.saturating_duration_since(now);
            let wait = if self.rx.is_empty() {
                remaining
            } else {
                min(remaining, self.inter_byte)
            };

            let mut byte = [0u8; 1];
            match with_timeout(wait, self.port.read(&mut byte)).await {
                Err(_) | Ok(Ok(0)) => continue,
                Ok(Err(e)) => {
                    self.rx.clear();
                    self.stats.frame_errors += 1;
                    last_error = Some(LinkError::Port(e));
                    continue;
                }
                Ok(Ok(_)) => {}
            }
            self.last_byte = Some(Instant::now());

            match self.accept(byte[0]) {
                Ok(Some(frame)) => return Ok(frame),
                Ok(None) => {}
                Err(e) => last_error = Some(e),
            }
        }
    }

    /// Same turnaround and bounds as [`receive`](Self::receive), for the
    /// 8-byte packet format.
    pub async fn receive_legacy(
        &mut self,
        timeout: Duration,
    ) -> Result<LegacyPacket, LinkError<P::Error>> {
        let deadline = Instant::now() + timeout;
        loop {
            let now = Instant::now();
            if now >= deadline {
                return Err(LinkError::Timeout);
            }
            let mut byte = [0u8; 1];
            match with_timeout(deadline.saturating_duration_since(now), self.port.read(&mut byte))
                .await
            {
                Err(_) => return Err(LinkError::Timeout),
                Ok(Err(e)) => return Err(LinkError::Port(e)),
                Ok(Ok(0)) => continue,
                Ok(Ok(_)) => {}
            }
            if let Some(packet) = self.legacy.push(byte[0], Instant::now()) {
                self.stats.frames_received += 1;
                return Ok(packet);
            }
        }
    }

    fn expire_partial(&mut self, now: Instant) {
        let Some(last) = self.last_byte else { return };
        if !self.rx.is_empty() && now.saturating_duration_since(last) >= self.inter_byte {
            warn!(
                "inter-byte timeout, dropping {=usize} partial bytes",
                self.rx.len()
            );
            self.rx.clear();
            self.stats.inter_byte_resets += 1;
        }
    }

    fn accept(&mut self, byte: u8) -> Result<Option<Frame>, LinkError<P::Error>> {
        if self.rx.is_empty() && byte != START_BYTE {
            self.stats.discarded_bytes += 1;
            return Ok(None);
        }
        if self.rx.push(byte).is_err() {
            warn!("rx buffer overflow");
            self.stats.frame_errors += 1;
            self.resync();
            return Err(LinkError::BufferOverflow);
        }
        self.assemble()
    }

    /// Try to complete a frame from the buffered bytes.
    ///
    /// A header that fails (length out of range, bad CRC, bad end marker) is
    /// treated as a false start: the buffer is rescanned from the next start
    /// marker instead of being dropped, so a noise byte ahead of a real frame
    /// costs only that byte.
    fn assemble(&mut self) -> Result<Option<Frame>, LinkError<P::Error>> {
        let mut failed = None;
        while self.rx.len() >= HEADER_SIZE {
            let len = self.rx[3] as usize;
            if len > MAX_PAYLOAD_SIZE {
                debug!("length byte {=usize} out of range, rescanning", len);
                self.stats.frame_errors += 1;
                failed = Some(FrameError::LengthOutOfRange.into());
                self.resync();
                continue;
            }

            let total = frame_size(len);
            if self.rx.len() < total {
                // the frame we are waiting for may be a false start hiding a
                // shorter one that just ended
                if self.rx.last() == Some(&END_BYTE) {
                    if let Some(frame) = self.hidden_frame() {
                        return Ok(Some(frame));
                    }
                }
                break;
            }

            match decode(&self.rx[..total]) {
                Ok(frame) => {
                    self.consume(total);
                    self.stats.frames_received += 1;
                    return Ok(Some(frame));
                }
                Err(e) => {
                    self.stats.frame_errors += 1;
                    failed = Some(e.into());
                    self.resync();
                }
            }
        }
        failed.map_or(Ok(None), Err)
    }

    /// Look for a complete frame that starts after `rx[0]` and ends exactly
    /// at the last buffered byte.
    fn hidden_frame(&mut self) -> Option<Frame> {
        let end = self.rx.len();
        let at = (1..end).find(|&i| {
            self.rx[i] == START_BYTE
                && end - i >= HEADER_SIZE
                && frame_size(self.rx[i + 3] as usize) == end - i
                && decode(&self.rx[i..]).is_ok()
        })?;
        let frame = decode(&self.rx[at..]).ok()?;
        debug!("recovered frame behind {=usize} stray bytes", at);
        self.stats.discarded_bytes += at as u32;
        self.stats.frames_received += 1;
        self.rx.clear();
        Some(frame)
    }

    /// Drop `rx[0]` and everything up to the next start marker.
    fn resync(&mut self) {
        let next = self
            .rx
            .iter()
            .skip(1)
            .position(|&b| b == START_BYTE)
            .map_or(self.rx.len(), |i| i + 1);
        self.stats.discarded_bytes += next as u32;
        self.consume(next);
    }

    /// Remove the first `n` buffered bytes, keeping the rest in order.
    fn consume(&mut self, n: usize) {
        let n = min(n, self.rx.len());
        let rest = self.rx.len() - n;
        self.rx.copy_within(n.., 0);
        self.rx.truncate(rest);
    }

    pub fn stats(&self) -> LinkStats {
        self.stats
    }

    pub fn reset_stats(&mut self) {
        self.stats = LinkStats::default();
    }

    /// Bytes of a frame currently being assembled.
    pub fn pending(&self) -> usize {
        self.rx.len()
    }

    pub fn into_parts(self) -> (P, D) {
        (self.port, self.de)
    }
}
