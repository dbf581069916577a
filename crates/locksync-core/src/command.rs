use std::str::FromStr;

use crate::error::CoreError;

/// An inbound command addressed to one channel of a device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Re-read the device now. Accepted on every channel.
    Refresh,
    Decimal(i64),
    OnOff(bool),
}

impl FromStr for Command {
    type Err = CoreError;

    /// Parses `REFRESH`, `ON`, `OFF` (any case) or a decimal number.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("refresh") {
            Ok(Self::Refresh)
        } else if s.eq_ignore_ascii_case("on") {
            Ok(Self::OnOff(true))
        } else if s.eq_ignore_ascii_case("off") {
            Ok(Self::OnOff(false))
        } else {
            s.parse::<i64>()
                .map(Self::Decimal)
                .map_err(|_| CoreError::config(format!("unrecognized command value: {s:?}")))
        }
    }
}
