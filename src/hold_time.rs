use indoc::indoc;

/// How a hold duration is reported in seconds.
///
/// The default reports odd seconds only, which gives the user a wide
/// window to hit a given `HOLD_<s>S` binding by counting in their head.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TimeMode {
    pub full_time: bool,
    pub offset_time: bool,
}

impl TimeMode {
    pub fn new(full_time: bool, offset_time: bool) -> Self {
        TimeMode { full_time, offset_time }
    }

    /// Quantizes a hold duration in milliseconds to reported seconds.
    pub fn seconds(&self, held_ms: u64) -> u64 {
        let ticks = i64::try_from(held_ms).unwrap_or(i64::MAX);
        let result = match (self.full_time, self.offset_time) {
            // 0.4..3 => 1, 3..5 => 3, 5..7 => 5
            (false, false) => 1 + ((ticks - 1000) / 2000) * 2,
            // 0.4..2 => 1, 2..4 => 3, 4..6 => 5
            (false, true) => {
                let sec = ticks / 1000;
                sec + (sec + 1) % 2
            }
            (true, false) => ticks / 1000,
            (true, true) => ticks.saturating_add(500) / 1000,
        };
        result.max(0) as u64
    }
}

pub const HELP_TIME: &str = indoc! {"
    Inzown button only reports hold times if the button is held more than 0.4 seconds.
    By default inzown-btn reports only odd seconds as follows:
    \t+--------------------------------+
    \t|      | Upto but not | reported |
    \t| From |  including   | seconds  |
    \t|------+--------------+----------|
    \t|  0.4 |      3       |    1     |
    \t|  3   |      5       |    3     |
    \t|  5   |      7       |    5     |
    \t+--------------------------------+


    if --offset-time is specified the seconds are reported as:
    \t+--------------------------------+
    \t|      | Upto but not | reported |
    \t| From |  including   | seconds  |
    \t|------+--------------+----------|
    \t|  0.4 |     2        |    1     |
    \t|   2  |     4        |    3     |
    \t|   4  |     6        |    5     |
    \t|   6  |     8        |    7     |
    \t+--------------------------------+


    if --full-time is specified the seconds are reported as:
    \t+--------------------------------+
    \t|      | Upto but not | reported |
    \t| From |  including   | seconds  |
    \t|------+--------------+----------|
    \t|  0.4 |      1       |    0     |
    \t|  1   |      2       |    1     |
    \t|  2   |      3       |    2     |
    \t|  3   |      4       |    3     |
    \t+--------------------------------+


    if --full-time and --offset-time is specified the seconds are reported as:
    \t+--------------------------------+
    \t|      | Upto but not | reported |
    \t| From |  including   | seconds  |
    \t|------+--------------+----------|
    \t|  0.4 |     0.5      |    0     |
    \t|  0.5 |     1.5      |    1     |
    \t|  1.5 |     2.5      |    2     |
    \t|  2.5 |     3.5      |    3     |
    \t+--------------------------------+
"};
