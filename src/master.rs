//! Antenna-side engine.
//!
//! The Master owns the live [`RotatorState`]. Each [`Master::process`] call
//! refreshes it from the hardware, answers at most one request, and emits a
//! periodic `POSITION_UPDATE` broadcast. It never initiates any other traffic.

use embassy_time::Instant;
use embedded_hal::digital::OutputPin;
use embedded_io_async::{Read, Write};

use crate::config::LinkConfig;
use crate::protocol::{Address, Command, ErrorCode, Frame, FrameError};
use crate::state::{RotatorState, StatusFlags};
use crate::transport::{LinkError, Transport};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum MasterState {
    Idle,
    WaitingRequest,
    ProcessingCommand,
}

/// Source of live position and limit data, polled once per iteration.
pub trait RotatorInputs {
    fn refresh(&mut self, state: &mut RotatorState);
}

impl<F: FnMut(&mut RotatorState)> RotatorInputs for F {
    fn refresh(&mut self, state: &mut RotatorState) {
        self(state)
    }
}

pub struct Master<P, D> {
    link: Transport<P, D>,
    config: LinkConfig,
    state: RotatorState,
    mode: MasterState,
    last_broadcast: Option<Instant>,
    requests: u32,
    responses: u32,
    broadcasts: u32,
}

impl<P, D> Master<P, D>
where
    P: Read + Write,
    D: OutputPin,
{
    pub fn new(link: Transport<P, D>, config: LinkConfig) -> Self {
        Self {
            link,
            config,
            state: RotatorState::default(),
            mode: MasterState::Idle,
            last_broadcast: None,
            requests: 0,
            responses: 0,
            broadcasts: 0,
        }
    }

    pub fn begin(&mut self) -> Result<(), LinkError<P::Error>> {
        self.link.listen()?;
        self.mode = MasterState::WaitingRequest;
        info!("master ready");
        Ok(())
    }

    /// One control-loop iteration.
    pub async fn process(&mut self, inputs: &mut impl RotatorInputs) {
        if self.mode == MasterState::Idle && self.begin().is_err() {
            error!("master: cannot release bus");
            return;
        }

        inputs.refresh(&mut self.state);
        self.state.timestamp = now_ms();

        if let Ok(request) = self.link.receive(self.config.master_receive_window()).await {
            if request.is_for(Address::Master) {
                self.requests += 1;
                self.mode = MasterState::ProcessingCommand;
                self.respond(&request).await;
                self.mode = MasterState::WaitingRequest;
            } else {
                trace!("master: ignoring frame for {=u8:#x}", request.address);
            }
        }

        let due = match self.last_broadcast {
            None => true,
            Some(at) => at.elapsed() >= self.config.broadcast_interval(),
        };
        if due {
            self.last_broadcast = Some(Instant::now());
            self.broadcast().await;
        }
    }

    async fn respond(&mut self, request: &Frame) {
        let reply = match self.dispatch(request) {
            Ok(reply) => reply,
            Err(_) => return,
        };
        match self.link.send(&reply).await {
            Ok(()) => self.responses += 1,
            Err(_) => warn!("master: response {=u8:#x} not sent", reply.command),
        }
    }

    /// Apply `request` to the state and build the reply for the Remote.
    fn dispatch(&mut self, request: &Frame) -> Result<Frame, FrameError> {
        let reply = |cmd: Command, payload: &[u8]| Frame::to(Address::Remote, cmd, payload);

        match request.command() {
            Some(Command::GetPosition) => reply(Command::PositionData, &self.state.to_bytes()),
            Some(Command::GetStatus) => reply(Command::StatusData, &self.state.to_bytes()),
            Some(Command::MoveTo) => match parse_move_to(request.payload()) {
                Ok((az, el)) => {
                    info!("move to az={=f32} el={=f32}", az, el);
                    self.set_target(az, el);
                    ack()
                }
                Err(code) => {
                    warn!("move-to rejected: {=u8}", code as u8);
                    nak(code)
                }
            },
            Some(Command::Stop) => {
                info!("stop");
                self.state
                    .status_flags
                    .remove(StatusFlags::MOVING_AZ | StatusFlags::MOVING_EL);
                ack()
            }
            Some(Command::Park) => {
                info!("park");
                self.set_target(self.config.park_azimuth, self.config.park_elevation);
                ack()
            }
            _ => {
                debug!("unsupported command {=u8:#x}", request.command);
                nak(ErrorCode::InvalidCommand)
            }
        }
    }

    async fn broadcast(&mut self) {
        let update = match Frame::to(
            Address::Broadcast,
            Command::PositionUpdate,
            &self.state.to_bytes(),
        ) {
            Ok(frame) => frame,
            Err(_) => return,
        };
        match self.link.send(&update).await {
            Ok(()) => {
                self.broadcasts += 1;
                trace!(
                    "update sent az={=f32} el={=f32}",
                    self.state.azimuth_current,
                    self.state.elevation_current
                );
            }
            Err(_) => warn!("master: broadcast not sent"),
        }
    }

    // ── Collaborator side ─────────────────────────────────────────────────────

    pub fn set_position(&mut self, azimuth: f32, elevation: f32) {
        self.state.azimuth_current = azimuth;
        self.state.elevation_current = elevation;
    }

    pub fn set_target(&mut self, azimuth: f32, elevation: f32) {
        self.state.azimuth_target = azimuth;
        self.state.elevation_target = elevation;
    }

    pub fn set_status(&mut self, flags: StatusFlags) {
        self.state.status_flags = flags;
    }

    pub fn set_error(&mut self, code: ErrorCode) {
        self.state.error_code = code.into();
        self.state
            .status_flags
            .set(StatusFlags::ERROR, code != ErrorCode::None);
    }

    pub fn state(&self) -> &RotatorState {
        &self.state
    }

    pub fn mode(&self) -> MasterState {
        self.mode
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

    pub fn broadcast_count(&self) -> u32 {
        self.broadcasts
    }
}

fn ack() -> Result<Frame, FrameError> {
    Frame::to(Address::Remote, Command::Ack, &[ErrorCode::None as u8])
}

fn nak(code: ErrorCode) -> Result<Frame, FrameError> {
    Frame::to(Address::Remote, Command::Nak, &[code as u8])
}

fn parse_move_to(payload: &[u8]) -> Result<(f32, f32), ErrorCode> {
    let (Some(az), Some(el)) = (payload.get(0..4), payload.get(4..8)) else {
        return Err(ErrorCode::InvalidData);
    };
    let az = f32::from_be_bytes([az[0], az[1], az[2], az[3]]);
    let el = f32::from_be_bytes([el[0], el[1], el[2], el[3]]);
    if !az.is_finite() || !el.is_finite() {
        return Err(ErrorCode::OutOfRange);
    }
    Ok((az, el))
}

fn now_ms() -> u32 {
    Instant::now().as_millis() as u32
}

#[cfg(test)]
mod tests {
    use embassy_futures::block_on;
    use embassy_time::{Duration, Timer};

    use super::*;
    use crate::mock::{MockPin, MockPort};
    use crate::protocol::commands::REMOTE_ADDRESS;
    use crate::protocol::{decode, encode};

    fn master() -> (Master<MockPort, MockPin>, MockPort) {
        let port = MockPort::new();
        let cfg = LinkConfig::default();
        let link = Transport::new(port.clone(), MockPin::new(), &cfg);
        (Master::new(link, cfg), port)
    }

    fn still(_: &mut RotatorState) {}

    /// Everything written since the last call, split into frames.
    fn sent_frames(port: &MockPort) -> std::vec::Vec<Frame> {
        let bytes = port.take_written();
        let mut out = std::vec::Vec::new();
        let mut at = 0;
        while at < bytes.len() {
            let frame = decode(&bytes[at..]).unwrap();
            at += frame.wire_len();
            out.push(frame);
        }
        out
    }

    fn request(cmd: u8, payload: &[u8]) -> heapless::Vec<u8, 71> {
        encode(0x01, cmd, payload).unwrap().to_bytes()
    }

    fn move_to(az: f32, el: f32) -> [u8; 8] {
        let mut p = [0u8; 8];
        p[..4].copy_from_slice(&az.to_be_bytes());
        p[4..].copy_from_slice(&el.to_be_bytes());
        p
    }

    #[test]
    fn first_iteration_broadcasts() {
        let (mut m, port) = master();
        block_on(m.process(&mut still));
        assert_eq!(m.mode(), MasterState::WaitingRequest);

        let frames = sent_frames(&port);
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].address(), Some(Address::Broadcast));
        assert_eq!(frames[0].command(), Some(Command::PositionUpdate));
        assert_eq!(frames[0].len(), RotatorState::WIRE_SIZE);
        assert_eq!(m.broadcast_count(), 1);
    }

    #[test]
    fn move_to_sets_targets_and_acks() {
        let (mut m, port) = master();
        port.feed(&request(0x20, &move_to(270.0, 60.0)));
        block_on(m.process(&mut still));

        assert_eq!(m.state().azimuth_target, 270.0);
        assert_eq!(m.state().elevation_target, 60.0);
        let frames = sent_frames(&port);
        assert_eq!(frames[0].address, REMOTE_ADDRESS);
        assert_eq!(frames[0].command, 0x3E);
        assert_eq!(frames[0].payload(), &[0x00]);
        assert_eq!(m.request_count(), 1);
        assert_eq!(m.response_count(), 1);
    }

    #[test]
    fn short_move_to_is_naked() {
        let (mut m, port) = master();
        m.set_target(10.0, 20.0);
        port.feed(&request(0x20, &[0x43, 0x87, 0x00, 0x00]));
        block_on(m.process(&mut still));

        assert_eq!(m.state().azimuth_target, 10.0);
        let frames = sent_frames(&port);
        assert_eq!(frames[0].command, 0x3F);
        assert_eq!(frames[0].payload(), &[ErrorCode::InvalidData as u8]);
    }

    #[test]
    fn non_finite_move_to_is_out_of_range() {
        let (mut m, port) = master();
        port.feed(&request(0x20, &move_to(f32::NAN, 10.0)));
        block_on(m.process(&mut still));

        assert_eq!(m.state().azimuth_target, 0.0);
        let frames = sent_frames(&port);
        assert_eq!(frames[0].payload(), &[ErrorCode::OutOfRange as u8]);
    }

    #[test]
    fn unknown_command_is_naked() {
        let (mut m, port) = master();
        port.feed(&request(0x24, &[]));
        block_on(m.process(&mut still));
        let frames = sent_frames(&port);
        assert_eq!(frames[0].command, 0x3F);
        assert_eq!(frames[0].payload(), &[0x01]);
    }

    #[test]
    fn stop_clears_motion_bits_only() {
        let (mut m, port) = master();
        m.set_status(StatusFlags(
            StatusFlags::MOVING_AZ | StatusFlags::MOVING_EL | StatusFlags::GPS_VALID,
        ));
        port.feed(&request(0x21, &[]));
        block_on(m.process(&mut still));

        assert_eq!(m.state().status_flags.bits(), StatusFlags::GPS_VALID);
        assert_eq!(sent_frames(&port)[0].command, 0x3E);
    }

    #[test]
    fn park_targets_home() {
        let (mut m, port) = master();
        m.set_target(123.0, 45.0);
        port.feed(&request(0x22, &[]));
        block_on(m.process(&mut still));
        assert_eq!(m.state().azimuth_target, 0.0);
        assert_eq!(m.state().elevation_target, 0.0);
    }

    #[test]
    fn position_query_returns_live_state() {
        let (mut m, port) = master();
        let mut inputs = |s: &mut RotatorState| {
            s.azimuth_current = 181.5;
            s.elevation_current = 12.25;
        };
        port.feed(&request(0x10, &[]));
        block_on(m.process(&mut inputs));

        let frames = sent_frames(&port);
        assert_eq!(frames[0].command, 0x30);
        let state = RotatorState::from_bytes(frames[0].payload()).unwrap();
        assert_eq!(state.azimuth_current, 181.5);
        assert_eq!(state.elevation_current, 12.25);
    }

    #[test]
    fn frames_for_other_stations_are_ignored() {
        let (mut m, port) = master();
        port.feed(&encode(REMOTE_ADDRESS, 0x21, &[]).unwrap().to_bytes());
        block_on(m.process(&mut still));
        assert_eq!(m.request_count(), 0);
        // only the broadcast went out
        assert_eq!(sent_frames(&port).len(), 1);
    }

    #[test]
    fn broadcast_follows_interval() {
        let (mut m, port) = master();
        block_on(m.process(&mut still));
        block_on(m.process(&mut still));
        assert_eq!(m.broadcast_count(), 1);

        block_on(Timer::after(Duration::from_millis(100)));
        block_on(m.process(&mut still));
        assert_eq!(m.broadcast_count(), 2);
        assert_eq!(sent_frames(&port).len(), 2);
    }

    #[test]
    fn error_code_sets_error_flag() {
        let (mut m, _) = master();
        m.set_error(ErrorCode::Hardware);
        assert!(m.state().status_flags.error());
        assert_eq!(m.state().error(), ErrorCode::Hardware);
        m.set_error(ErrorCode::None);
        assert!(!m.state().status_flags.error());
    }
}
