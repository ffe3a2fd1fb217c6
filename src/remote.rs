//! Shack-side engine.
//!
//! The Remote keeps a cached copy of the Antenna's [`RotatorState`], refreshed
//! by every position/status frame it hears, and issues stop-and-wait commands
//! with a bounded retry. A command call suspends the calling task for at most
//! `retry_count × response_timeout`.

use embassy_time::{Duration, Instant};
use embedded_hal::digital::OutputPin;
use embedded_io_async::{Read, Write};

use crate::config::LinkConfig;
use crate::protocol::{Address, Command, CommandClass, ErrorCode, Frame};
use crate::state::RotatorState;
use crate::transport::{LinkError, Transport};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RemoteState {
    Idle,
    SendingRequest,
    WaitingResponse,
    ProcessingResponse,
    /// Last attempt expired; a retry follows unless the ceiling was hit.
    Timeout,
}

/// Acknowledgement recorded for the most recent command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Reply {
    Ack,
    /// Unknown or missing codes read as `Hardware`.
    Nak(ErrorCode),
}

/// What a command call waits for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Expect {
    Data(Command),
    Ack,
}

/// Result of handing one frame to the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Absorbed {
    /// State frame; `true` if the cache was replaced.
    State(Command, bool),
    Reply(Reply),
    Other,
}

pub struct Remote<P, D> {
    link: Transport<P, D>,
    config: LinkConfig,
    cache: RotatorState,
    updated_at: Option<Instant>,
    mode: RemoteState,
    retries: u8,
    last_reply: Option<Reply>,
    requests: u32,
    responses: u32,
    timeouts: u32,
}

impl<P, D> Remote<P, D>
where
    P: Read + Write,
    D: OutputPin,
{
    pub fn new(link: Transport<P, D>, config: LinkConfig) -> Self {
        Self {
            link,
            config,
            cache: RotatorState::default(),
            updated_at: None,
            mode: RemoteState::Idle,
            retries: 0,
            last_reply: None,
            requests: 0,
            responses: 0,
            timeouts: 0,
        }
    }

    pub fn begin(&mut self) -> Result<(), LinkError<P::Error>> {
        self.link.listen()?;
        self.mode = RemoteState::Idle;
        info!("remote ready");
        Ok(())
    }

    /// One control-loop iteration: listen for a broadcast or late reply.
    pub async fn process(&mut self) {
        if let Ok(frame) = self.link.receive(self.config.remote_listen_window()).await {
            if frame.is_for(Address::Remote) {
                self.absorb(&frame);
            } else {
                trace!("remote: ignoring frame for {=u8:#x}", frame.address);
            }
        }
    }

    // ── Commands ──────────────────────────────────────────────────────────────

    pub async fn request_position(&mut self) -> bool {
        self.command(Command::GetPosition, &[], Expect::Data(Command::PositionData))
            .await
    }

    pub async fn request_status(&mut self) -> bool {
        self.command(Command::GetStatus, &[], Expect::Data(Command::StatusData))
            .await
    }

    pub async fn send_move_to(&mut self, azimuth: f32, elevation: f32) -> bool {
        let mut payload = [0u8; 8];
        payload[..4].copy_from_slice(&azimuth.to_be_bytes());
        payload[4..].copy_from_slice(&elevation.to_be_bytes());
        self.command(Command::MoveTo, &payload, Expect::Ack).await
    }

    pub async fn send_stop(&mut self) -> bool {
        self.command(Command::Stop, &[], Expect::Ack).await
    }

    pub async fn send_park(&mut self) -> bool {
        self.command(Command::Park, &[], Expect::Ack).await
    }

    /// Send `cmd` and wait for `expect`, retrying on silence.
    ///
    /// A NAK ends the exchange at once; only timeouts and failed writes use
    /// up attempts.
    async fn command(&mut self, cmd: Command, payload: &[u8], expect: Expect) -> bool {
        let Ok(request) = Frame::to(Address::Master, cmd, payload) else {
            return false;
        };

        loop {
            self.mode = RemoteState::SendingRequest;
            self.requests += 1;

            let outcome = match self.link.send(&request).await {
                Ok(()) => {
                    self.mode = RemoteState::WaitingResponse;
                    self.await_reply(expect).await
                }
                Err(_) => {
                    warn!("remote: request {=u8:#x} not sent", request.command);
                    None
                }
            };

            if let Some(ok) = outcome {
                self.responses += 1;
                self.retries = 0;
                self.mode = RemoteState::Idle;
                return ok;
            }

            self.timeouts += 1;
            self.retries += 1;
            self.mode = RemoteState::Timeout;
            if self.retries >= self.config.retry_count {
                warn!(
                    "remote: no reply to {=u8:#x} after {=u8} attempts",
                    request.command,
                    self.retries
                );
                self.retries = 0;
                self.mode = RemoteState::Idle;
                return false;
            }
            warn!("remote: timeout, retry {=u8}", self.retries);
        }
    }

    /// Listen until the attempt deadline. Frames that are not the awaited
    /// reply are still absorbed. `None` means nothing matching arrived.
    async fn await_reply(&mut self, expect: Expect) -> Option<bool> {
        let deadline = Instant::now() + self.config.response_timeout();
        loop {
            let now = Instant::now();
            if now >= deadline {
                return None;
            }
            // receive only fails once the window is used up
            let Ok(frame) = self.link.receive(deadline - now).await else {
                return None;
            };
            if !frame.is_for(Address::Remote) {
                continue;
            }

            self.mode = RemoteState::ProcessingResponse;
            let absorbed = self.absorb(&frame);
            match (expect, absorbed) {
                (Expect::Data(want), Absorbed::State(got, updated)) if want == got => {
                    return Some(updated)
                }
                (_, Absorbed::Reply(Reply::Nak(_))) => return Some(false),
                (Expect::Ack, Absorbed::Reply(Reply::Ack)) => return Some(true),
                _ => self.mode = RemoteState::WaitingResponse,
            }
        }
    }

    /// Apply one frame addressed to us.
    fn absorb(&mut self, frame: &Frame) -> Absorbed {
        let Some(cmd) = frame.command() else {
            debug!("remote: unknown command {=u8:#x}", frame.command);
            return Absorbed::Other;
        };

        match cmd {
            Command::PositionData | Command::StatusData | Command::PositionUpdate => {
                let Some(mut state) = RotatorState::from_bytes(frame.payload()) else {
                    debug!(
                        "remote: stale {=u8:#x}, payload {=usize} bytes",
                        frame.command,
                        frame.len()
                    );
                    return Absorbed::State(cmd, false);
                };
                let now = Instant::now();
                state.timestamp = now.as_millis() as u32;
                self.cache = state;
                self.updated_at = Some(now);
                trace!(
                    "remote: az={=f32} el={=f32} flags={=u8:#x}",
                    state.azimuth_current,
                    state.elevation_current,
                    state.status_flags.bits()
                );
                Absorbed::State(cmd, true)
            }
            Command::Ack => {
                debug!("remote: ack");
                self.last_reply = Some(Reply::Ack);
                Absorbed::Reply(Reply::Ack)
            }
            Command::Nak => {
                let code = frame
                    .payload()
                    .first()
                    .and_then(|&b| ErrorCode::from_u8(b))
                    .unwrap_or(ErrorCode::Hardware);
                warn!("remote: nak {=u8}", code as u8);
                let reply = Reply::Nak(code);
                self.last_reply = Some(reply);
                Absorbed::Reply(reply)
            }
            other if other.class() == CommandClass::Broadcast => {
                info!("remote: broadcast {=u8:#x}", frame.command);
                Absorbed::Other
            }
            _ => {
                debug!("remote: unexpected {=u8:#x}", frame.command);
                Absorbed::Other
            }
        }
    }

    // ── Accessors ─────────────────────────────────────────────────────────────

    /// Last absorbed state. `timestamp` is the local receive time.
    pub fn state(&self) -> &RotatorState {
        &self.cache
    }

    /// Local age of the cache, `None` before the first update.
    pub fn cache_age(&self) -> Option<Duration> {
        self.updated_at.map(|at| at.elapsed())
    }

    pub fn is_connected(&self) -> bool {
        self.cache_age()
            .is_some_and(|age| age < self.config.comm_loss_timeout())
    }

    pub fn mode(&self) -> RemoteState {
        self.mode
    }

    pub fn last_reply(&self) -> Option<Reply> {
        self.last_reply
    }

    /// Error code of the last NAK, if the last reply was one.
    pub fn last_nak(&self) -> Option<ErrorCode> {
        match self.last_reply {
            Some(Reply::Nak(code)) => Some(code),
            _ => None,
        }
    }

    pub fn retry_counter(&self) -> u8 {
        self.retries
    }

    pub fn transport(&self) -> &Transport<P, D> {
        &self.link
    }

    pub fn request_count(&self) -> u32 {
        self.requests
    }

    pub fn response_count(&self) -> u32 {
        self.responses
    }

    pub fn timeout_count(&self) -> u32 {
        self.timeouts
    }

    /// Answered attempts in percent; 0 before any request.
    pub fn success_rate(&self) -> f32 {
        if self.requests == 0 {
            return 0.0;
        }
        self.responses as f32 * 100.0 / self.requests as f32
    }
}

#[cfg(test)]
mod tests {
    use embassy_futures::block_on;
    use embassy_time::Timer;

    use super::*;
    use crate::mock::{MockPin, MockPort};
    use crate::protocol::{decode, encode};
    use crate::state::StatusFlags;

    fn remote_with(cfg: LinkConfig) -> (Remote<MockPort, MockPin>, MockPort) {
        let port = MockPort::new();
        let link = Transport::new(port.clone(), MockPin::new(), &cfg);
        let mut remote = Remote::new(link, cfg);
        remote.begin().unwrap();
        (remote, port)
    }

    fn remote() -> (Remote<MockPort, MockPin>, MockPort) {
        remote_with(LinkConfig::default())
    }

    fn snapshot() -> RotatorState {
        RotatorState {
            azimuth_current: 180.5,
            elevation_current: 45.2,
            azimuth_target: 270.0,
            elevation_target: 60.0,
            status_flags: StatusFlags(StatusFlags::MOVING_AZ | StatusFlags::GPS_VALID),
            error_code: 0,
            timestamp: 999_999,
        }
    }

    fn to_remote(cmd: Command, payload: &[u8]) -> std::vec::Vec<u8> {
        Frame::to(Address::Remote, cmd, payload).unwrap().to_bytes().to_vec()
    }

    fn broadcast(state: &RotatorState) -> std::vec::Vec<u8> {
        Frame::to(Address::Broadcast, Command::PositionUpdate, &state.to_bytes())
            .unwrap()
            .to_bytes()
            .to_vec()
    }

    #[test]
    fn broadcast_updates_cache() {
        let (mut r, port) = remote();
        assert!(!r.is_connected());
        assert_eq!(r.cache_age(), None);

        port.feed(&broadcast(&snapshot()));
        block_on(r.process());

        assert!(r.is_connected());
        let s = r.state();
        assert_eq!(s.status_flags.bits(), 0x41);
        assert!(s.is_moving_az());
        assert!(s.gps_valid());
        assert!(!s.is_moving_el());
        assert_eq!(s.azimuth_current, 180.5);
        assert_ne!(s.timestamp, 999_999);
    }

    #[test]
    fn same_broadcast_twice_is_idempotent() {
        let (mut r, port) = remote();
        port.feed(&broadcast(&snapshot()));
        block_on(r.process());
        let first = *r.state();

        block_on(Timer::after(Duration::from_millis(5)));
        port.feed(&broadcast(&snapshot()));
        block_on(r.process());
        let second = *r.state();

        assert!(second.timestamp >= first.timestamp);
        assert_eq!(
            RotatorState { timestamp: 0, ..first },
            RotatorState { timestamp: 0, ..second }
        );
    }

    #[test]
    fn wrong_payload_size_leaves_cache_stale() {
        let (mut r, port) = remote();
        let bytes = snapshot().to_bytes();
        port.feed(&to_remote(Command::PositionData, &bytes[..20]));
        block_on(r.process());
        assert!(!r.is_connected());
        assert_eq!(*r.state(), RotatorState::default());
    }

    #[test]
    fn frames_for_master_are_ignored() {
        let (mut r, port) = remote();
        let frame = Frame::to(Address::Master, Command::PositionData, &snapshot().to_bytes());
        port.feed(&frame.unwrap().to_bytes());
        block_on(r.process());
        assert!(!r.is_connected());
    }

    #[test]
    fn link_drops_after_comm_loss_timeout() {
        let cfg = LinkConfig { comm_loss_timeout_ms: 150, ..LinkConfig::default() };
        let (mut r, port) = remote_with(cfg);
        port.feed(&broadcast(&snapshot()));
        block_on(r.process());
        assert!(r.is_connected());

        block_on(Timer::after(Duration::from_millis(200)));
        assert!(!r.is_connected());
        assert!(r.cache_age().unwrap() >= Duration::from_millis(150));
    }

    #[test]
    fn move_to_acked() {
        let (mut r, port) = remote();
        port.respond_with(|sent| {
            let req = decode(sent).unwrap();
            assert_eq!(req.address(), Some(Address::Master));
            assert_eq!(req.command(), Some(Command::MoveTo));
            assert_eq!(&req.payload()[..4], &270.0f32.to_be_bytes());
            assert_eq!(&req.payload()[4..], &60.0f32.to_be_bytes());
            to_remote(Command::Ack, &[0])
        });

        assert!(block_on(r.send_move_to(270.0, 60.0)));
        assert_eq!(r.last_reply(), Some(Reply::Ack));
        assert_eq!(r.mode(), RemoteState::Idle);
        assert_eq!(r.request_count(), 1);
        assert_eq!(r.response_count(), 1);
        assert_eq!(r.success_rate(), 100.0);
    }

    #[test]
    fn nak_fails_without_retry() {
        let (mut r, port) = remote();
        port.respond_with(|_| to_remote(Command::Nak, &[ErrorCode::InvalidCommand as u8]));

        assert!(!block_on(r.send_park()));
        assert_eq!(r.last_nak(), Some(ErrorCode::InvalidCommand));
        assert_eq!(r.request_count(), 1);
        assert_eq!(r.timeout_count(), 0);
    }

    #[test]
    fn silent_master_exhausts_retries() {
        let (mut r, port) = remote();
        let start = Instant::now();

        assert!(!block_on(r.send_move_to(10.0, 20.0)));

        assert!(start.elapsed() >= Duration::from_millis(300));
        assert_eq!(r.request_count(), 3);
        assert_eq!(r.timeout_count(), 3);
        assert_eq!(r.retry_counter(), 0);
        assert_eq!(r.mode(), RemoteState::Idle);
        assert_eq!(r.success_rate(), 0.0);
        let frame_len = encode(0x01, 0x20, &[0u8; 8]).unwrap().wire_len();
        assert_eq!(port.written().len(), 3 * frame_len);
    }

    #[test]
    fn retry_recovers_after_lost_reply() {
        let (mut r, port) = remote();
        let mut attempts = 0;
        port.respond_with(move |_| {
            attempts += 1;
            if attempts == 1 {
                std::vec::Vec::new()
            } else {
                to_remote(Command::Ack, &[0])
            }
        });

        assert!(block_on(r.send_stop()));
        assert_eq!(r.request_count(), 2);
        assert_eq!(r.timeout_count(), 1);
        assert_eq!(r.retry_counter(), 0);
        assert_eq!(r.success_rate(), 50.0);
    }

    #[test]
    fn broadcast_during_wait_is_absorbed() {
        let (mut r, port) = remote();
        port.respond_with(|_| {
            let mut out = broadcast(&snapshot());
            out.extend(to_remote(Command::Ack, &[0]));
            out
        });

        assert!(block_on(r.send_stop()));
        assert!(r.is_connected());
        assert_eq!(r.state().azimuth_target, 270.0);
    }

    #[test]
    fn position_request_needs_position_data() {
        let (mut r, port) = remote();
        let mut live = snapshot();
        live.azimuth_current = 12.5;
        port.respond_with(move |sent| {
            assert_eq!(decode(sent).unwrap().command(), Some(Command::GetPosition));
            to_remote(Command::PositionData, &live.to_bytes())
        });

        assert!(block_on(r.request_position()));
        assert_eq!(r.state().azimuth_current, 12.5);
    }

    #[test]
    fn status_request_ignores_unrelated_ack() {
        let (mut r, port) = remote();
        // a stray ACK does not answer a status query
        port.respond_with(|_| to_remote(Command::Ack, &[0]));
        assert!(!block_on(r.request_status()));
        assert_eq!(r.request_count(), 3);
        assert_eq!(r.last_reply(), Some(Reply::Ack));
    }

    #[test]
    fn empty_nak_reads_as_hardware() {
        let (mut r, port) = remote();
        port.respond_with(|_| to_remote(Command::Nak, &[]));
        assert!(!block_on(r.send_stop()));
        assert_eq!(r.last_nak(), Some(ErrorCode::Hardware));
    }
}
