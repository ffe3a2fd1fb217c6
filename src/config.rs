//! Link parameters shared by both stations.

use embassy_time::Duration;

/// Timing and behaviour of one end of the link.
///
/// Both stations must agree on `baud_rate`. The remaining fields are local.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct LinkConfig {
    pub baud_rate: u32,
    /// Per-attempt wait for a reply on the Remote.
    pub response_timeout_ms: u32,
    /// Attempts per Remote command before giving up.
    pub retry_count: u8,
    /// Master broadcast period.
    pub broadcast_interval_ms: u32,
    /// Cache age above which the Remote reports the link as lost.
    pub comm_loss_timeout_ms: u32,
    /// Gap that resets a partially received frame.
    pub inter_byte_timeout_ms: u32,
    /// Settle time around a DE/RE switch.
    pub turnaround_guard_us: u32,
    pub master_receive_window_ms: u32,
    pub remote_listen_window_ms: u32,
    pub park_azimuth: f32,
    pub park_elevation: f32,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            baud_rate: 9600,
            response_timeout_ms: 100,
            retry_count: 3,
            broadcast_interval_ms: 100,
            comm_loss_timeout_ms: 5000,
            inter_byte_timeout_ms: 20,
            turnaround_guard_us: 50,
            master_receive_window_ms: 10,
            remote_listen_window_ms: 50,
            park_azimuth: 0.0,
            park_elevation: 0.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConfigError {
    ZeroBaudRate,
    ZeroRetryCount,
    /// A timeout or window was set to zero.
    ZeroTimeout,
    /// `comm_loss_timeout_ms` must exceed `response_timeout_ms`.
    CommLossTooShort,
    InvalidParkPosition,
}

/// Above this the default cable length gets marginal.
pub const MAX_RELIABLE_BAUD: u32 = 115_200;

impl LinkConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.baud_rate == 0 {
            return Err(ConfigError::ZeroBaudRate);
        }
        if self.retry_count == 0 {
            return Err(ConfigError::ZeroRetryCount);
        }
        let timeouts = [
            self.response_timeout_ms,
            self.broadcast_interval_ms,
            self.comm_loss_timeout_ms,
            self.inter_byte_timeout_ms,
            self.master_receive_window_ms,
            self.remote_listen_window_ms,
        ];
        if timeouts.contains(&0) {
            return Err(ConfigError::ZeroTimeout);
        }
        if self.comm_loss_timeout_ms <= self.response_timeout_ms {
            return Err(ConfigError::CommLossTooShort);
        }
        if !self.park_azimuth.is_finite() || !self.park_elevation.is_finite() {
            return Err(ConfigError::InvalidParkPosition);
        }
        if self.baud_rate > MAX_RELIABLE_BAUD {
            warn!(
                "baud rate {=u32} above {=u32}, expect errors on long runs",
                self.baud_rate,
                MAX_RELIABLE_BAUD
            );
        }
        Ok(())
    }

    pub fn response_timeout(&self) -> Duration {
        Duration::from_millis(self.response_timeout_ms as u64)
    }

    pub fn broadcast_interval(&self) -> Duration {
        Duration::from_millis(self.broadcast_interval_ms as u64)
    }

    pub fn comm_loss_timeout(&self) -> Duration {
        Duration::from_millis(self.comm_loss_timeout_ms as u64)
    }

    pub fn inter_byte_timeout(&self) -> Duration {
        Duration::from_millis(self.inter_byte_timeout_ms as u64)
    }

    pub fn turnaround_guard(&self) -> Duration {
        Duration::from_micros(self.turnaround_guard_us as u64)
    }

    pub fn master_receive_window(&self) -> Duration {
        Duration::from_millis(self.master_receive_window_ms as u64)
    }

    pub fn remote_listen_window(&self) -> Duration {
        Duration::from_millis(self.remote_listen_window_ms as u64)
    }
}
