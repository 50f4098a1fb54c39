use std::fmt;

use crate::hold_time::TimeMode;

// Largest count/seconds value that still gets its own action name.
pub const ABSOLUTE_MAX_CLICK: u32 = 99;
pub const ABSOLUTE_MAX_HOLD: u64 = 99;

pub const DOWN_NAME: &str = "DOWN";
pub const UP_NAME: &str = "UP";
pub const CLICK_OTHER_NAME: &str = "CLICK_OTHER";
pub const HOLD_OTHER_NAME: &str = "HOLD_OTHER";

// Output of EventHandler, input to ActionDispatcher. Keep it easily testable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    // Every time the button is pushed down.
    Down,
    // Every time the button is released.
    Up,
    // The button was short-clicked `count` times in quick succession.
    Click { count: u32 },
    // The button was held for `held_ms` on the `count`-th press of a sequence.
    Hold { count: u32, held_ms: u64 },
}

impl Action {
    pub fn name(&self, time_mode: TimeMode) -> ActionName {
        let name = match *self {
            Action::Down => DOWN_NAME.to_string(),
            Action::Up => UP_NAME.to_string(),
            Action::Click { count } if count <= ABSOLUTE_MAX_CLICK => format!("CLICK_{count}"),
            Action::Click { .. } => CLICK_OTHER_NAME.to_string(),
            Action::Hold { held_ms, .. } => match time_mode.seconds(held_ms) {
                seconds if seconds <= ABSOLUTE_MAX_HOLD => format!("HOLD_{seconds}S"),
                _ => HOLD_OTHER_NAME.to_string(),
            },
        };
        ActionName(name)
    }
}

/// Canonical key a binding is looked up under in the config file.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ActionName(String);

impl ActionName {
    pub const MAX_LEN: usize = 11;

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Catch-all name consulted when this one has no binding.
    pub fn fallback(&self) -> Option<ActionName> {
        if self.0.starts_with("CLICK_") && self.0 != CLICK_OTHER_NAME {
            Some(ActionName(CLICK_OTHER_NAME.to_string()))
        } else if self.0.starts_with("HOLD_") && self.0 != HOLD_OTHER_NAME {
            Some(ActionName(HOLD_OTHER_NAME.to_string()))
        } else {
            None
        }
    }
}

impl fmt::Display for ActionName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
