//! Stand-in for the encoder and relay boards: slews `current` toward `target`
//! at a fixed rate and keeps the motion and limit flags honest.

use embassy_time::Instant;
use micromath::F32Ext;

use rotator_link::{RotatorInputs, RotatorState, StatusFlags};

pub const AZ_MIN: f32 = 0.0;
pub const AZ_MAX: f32 = 450.0;
pub const EL_MIN: f32 = 0.0;
pub const EL_MAX: f32 = 90.0;

/// Degrees per second, both axes.
const SLEW_RATE: f32 = 6.0;
/// Within this many degrees the axis counts as arrived.
const DEADBAND: f32 = 0.2;

pub struct Slew {
    last: Option<Instant>,
    seen_az: f32,
    seen_el: f32,
}

impl Slew {
    pub const fn new() -> Self {
        Self {
            last: None,
            seen_az: 0.0,
            seen_el: 0.0,
        }
    }
}

impl Default for Slew {
    fn default() -> Self {
        Self::new()
    }
}

impl RotatorInputs for Slew {
    fn refresh(&mut self, state: &mut RotatorState) {
        let now = Instant::now();
        let dt = match self.last {
            Some(last) => (now - last).as_micros() as f32 * 1e-6,
            None => 0.0,
        };
        self.last = Some(now);
        let step = SLEW_RATE * dt;
        let flags = &mut state.status_flags;

        // a new target restarts an axis that STOP halted
        if state.azimuth_target != self.seen_az {
            self.seen_az = state.azimuth_target;
            flags.insert(StatusFlags::MOVING_AZ);
        }
        if state.elevation_target != self.seen_el {
            self.seen_el = state.elevation_target;
            flags.insert(StatusFlags::MOVING_EL);
        }

        if flags.moving_az() {
            let target = state.azimuth_target.clamp(AZ_MIN, AZ_MAX);
            let (pos, arrived) = approach(state.azimuth_current, target, step);
            state.azimuth_current = pos;
            flags.set(StatusFlags::MOVING_AZ, !arrived);
        }
        if flags.moving_el() {
            let target = state.elevation_target.clamp(EL_MIN, EL_MAX);
            let (pos, arrived) = approach(state.elevation_current, target, step);
            state.elevation_current = pos;
            flags.set(StatusFlags::MOVING_EL, !arrived);
        }

        flags.set(StatusFlags::LIMIT_AZ_CCW, state.azimuth_current <= AZ_MIN);
        flags.set(StatusFlags::LIMIT_AZ_CW, state.azimuth_current >= AZ_MAX);
        flags.set(StatusFlags::LIMIT_EL_DOWN, state.elevation_current <= EL_MIN);
        flags.set(StatusFlags::LIMIT_EL_UP, state.elevation_current >= EL_MAX);
    }
}

fn approach(current: f32, target: f32, step: f32) -> (f32, bool) {
    let diff = target - current;
    if diff.abs() <= DEADBAND.max(step) {
        (target, true)
    } else {
        (current + step * diff.signum(), false)
    }
}
