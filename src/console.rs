//! Operator commands typed on the shack console.

/// What the operator can ask the Remote for.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum OperatorCommand {
    Stop,
    Park,
    MoveTo { azimuth: f32, elevation: f32 },
    RefreshStatus,
}

impl OperatorCommand {
    /// Parse one line: `stop`, `park`, `status` or `goto <az> <el>`.
    /// Verbs are case-insensitive; extra words reject the line.
    pub fn parse(line: &str) -> Option<Self> {
        let mut words = line.split_whitespace();
        let verb = words.next()?;
        let cmd = if verb.eq_ignore_ascii_case("stop") {
            Self::Stop
        } else if verb.eq_ignore_ascii_case("park") {
            Self::Park
        } else if verb.eq_ignore_ascii_case("status") {
            Self::RefreshStatus
        } else if verb.eq_ignore_ascii_case("goto") {
            let azimuth: f32 = words.next()?.parse().ok()?;
            let elevation: f32 = words.next()?.parse().ok()?;
            if !azimuth.is_finite() || !elevation.is_finite() {
                return None;
            }
            Self::MoveTo { azimuth, elevation }
        } else {
            return None;
        };
        words.next().is_none().then_some(cmd)
    }
}
