use nix::time::{clock_gettime, ClockId};

// Input to EventHandler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    // The button level changed; `at_ms` is a monotonic_ms() timestamp.
    Edge { pressed: bool, at_ms: u64 },
    // The click window expired.
    ClickTimeout,
}

impl Event {
    pub fn pressed(at_ms: u64) -> Event {
        Event::Edge { pressed: true, at_ms }
    }

    pub fn released(at_ms: u64) -> Event {
        Event::Edge { pressed: false, at_ms }
    }
}

/// Milliseconds on the monotonic clock. Never jumps with wall-clock changes.
pub fn monotonic_ms() -> u64 {
    match clock_gettime(ClockId::CLOCK_MONOTONIC) {
        Ok(now) => now.tv_sec() as u64 * 1000 + now.tv_nsec() as u64 / 1_000_000,
        // CLOCK_MONOTONIC is always available on Linux.
        Err(_) => 0,
    }
}
