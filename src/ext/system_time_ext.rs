use std::time::{Duration, SystemTime};

pub trait SystemTimeExt {
    /// Milliseconds since the unix epoch, zero for pre-epoch times.
    fn unix_millis(&self) -> u128;
}

impl SystemTimeExt for SystemTime {
    fn unix_millis(&self) -> u128 {
        self.duration_since(SystemTime::UNIX_EPOCH)
            .unwrap_or(Duration::ZERO)
            .as_millis()
    }
}

impl SystemTimeExt for Option<SystemTime> {
    fn unix_millis(&self) -> u128 {
        self.as_ref().map(SystemTimeExt::unix_millis).unwrap_or_default()
    }
}
