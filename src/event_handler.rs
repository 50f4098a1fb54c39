use crate::action::Action;
use crate::event::Event;
use anyhow::Context;
use log::{debug, trace};
use nix::errno::Errno;
use nix::sys::time::TimeSpec;
use nix::sys::timerfd::{Expiration, TimerFd, TimerSetTimeFlags};
use std::time::Duration;

// Presses closer together than this are counted into one CLICK.
pub const CLICK_TIMEOUT_MS: u64 = 400;
// Presses at least this long are reported as HOLD on release.
pub const HOLD_PRESS_TIMEOUT_MS: u64 = CLICK_TIMEOUT_MS;

pub const DEFAULT_CLICK_COUNT_LIMIT: u32 = 8;

/// One-shot timer bounding the click window.
pub trait ClickTimer {
    /// Starts the timer, replacing any pending expiration.
    fn arm(&mut self, timeout: Duration) -> anyhow::Result<()>;
    /// Acknowledges an expiration. `false` if the expiration was superseded by a re-arm.
    fn consume(&mut self) -> anyhow::Result<bool>;
}

impl ClickTimer for TimerFd {
    fn arm(&mut self, timeout: Duration) -> anyhow::Result<()> {
        let expiration = Expiration::OneShot(TimeSpec::from_duration(timeout));
        self.unset().context("stopping the click timer")?;
        self.set(expiration, TimerSetTimeFlags::empty())
            .context("starting the click timer")
    }

    fn consume(&mut self) -> anyhow::Result<bool> {
        match self.wait() {
            Ok(()) => Ok(true),
            Err(Errno::EAGAIN) => Ok(false),
            Err(e) => Err(e).context("reading the click timer"),
        }
    }
}

/// Turns button edges and click-window expirations into button actions.
pub struct EventHandler<T: ClickTimer> {
    click_timer: T,
    // 0 means unlimited
    click_count_limit: u32,
    button_down: bool,
    timer_running: bool,
    press_count: u32,
    pressed_at: Option<u64>,
    actions: Vec<Action>,
}

impl<T: ClickTimer> EventHandler<T> {
    pub fn new(click_timer: T, click_count_limit: u32) -> EventHandler<T> {
        EventHandler {
            click_timer,
            click_count_limit,
            button_down: false,
            timer_running: false,
            press_count: 0,
            pressed_at: None,
            actions: vec![],
        }
    }

    pub fn timer(&self) -> &T {
        &self.click_timer
    }

    pub fn on_events(&mut self, events: &[Event]) -> anyhow::Result<Vec<Action>> {
        for event in events {
            match *event {
                Event::Edge { pressed: true, at_ms } => self.on_press(at_ms)?,
                Event::Edge { pressed: false, at_ms } => self.on_release(at_ms),
                Event::ClickTimeout => self.on_click_timeout()?,
            }
        }
        Ok(self.actions.drain(..).collect())
    }

    fn on_press(&mut self, now: u64) -> anyhow::Result<()> {
        self.send_action(Action::Down);
        self.button_down = true;
        self.pressed_at = Some(now);

        if !self.timer_running {
            self.press_count = 1;
            self.timer_running = true;
        } else if self.click_count_limit == 0 || self.press_count < self.click_count_limit {
            self.press_count += 1;
        }
        trace!("press #{} at {now}", self.press_count);

        // The window counts from the most recent press, not the first one.
        self.click_timer.arm(Duration::from_millis(CLICK_TIMEOUT_MS))
    }

    fn on_release(&mut self, now: u64) {
        if !self.button_down {
            debug!("Ignoring release without a press at {now}");
            return;
        }
        self.button_down = false;
        self.send_action(Action::Up);

        if let Some(pressed_at) = self.pressed_at.take() {
            let held_ms = now.saturating_sub(pressed_at);
            if held_ms >= HOLD_PRESS_TIMEOUT_MS {
                self.send_action(Action::Hold {
                    count: self.press_count,
                    held_ms,
                });
            }
        }
    }

    fn on_click_timeout(&mut self) -> anyhow::Result<()> {
        if !self.click_timer.consume()? {
            trace!("Click timer was re-armed before it was read");
            return Ok(());
        }
        if self.button_down {
            debug!("Click window closed while held, {} presses not reported as click", self.press_count);
        } else {
            self.send_action(Action::Click { count: self.press_count });
        }
        self.timer_running = false;
        Ok(())
    }

    fn send_action(&mut self, action: Action) {
        self.actions.push(action);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct FakeTimer {
        arms: usize,
    }

    impl ClickTimer for FakeTimer {
        fn arm(&mut self, timeout: Duration) -> anyhow::Result<()> {
            assert_eq!(timeout, Duration::from_millis(CLICK_TIMEOUT_MS));
            self.arms += 1;
            Ok(())
        }

        fn consume(&mut self) -> anyhow::Result<bool> {
            Ok(true)
        }
    }

    const T: Event = Event::ClickTimeout;

    #[allow(non_snake_case)]
    fn P(at_ms: u64) -> Event {
        Event::pressed(at_ms)
    }

    #[allow(non_snake_case)]
    fn R(at_ms: u64) -> Event {
        Event::released(at_ms)
    }

    fn handler(limit: u32) -> EventHandler<FakeTimer> {
        EventHandler::new(FakeTimer::default(), limit)
    }

    fn run(limit: u32, events: &[Event]) -> Vec<Action> {
        handler(limit).on_events(events).unwrap()
    }

    #[test]
    fn single_click() {
        assert_eq!(
            run(8, &[P(0), R(100), T]),
            vec![Action::Down, Action::Up, Action::Click { count: 1 }]
        );
    }

    #[test]
    fn double_click() {
        assert_eq!(
            run(8, &[P(0), R(50), P(150), R(200), T]),
            vec![
                Action::Down,
                Action::Up,
                Action::Down,
                Action::Up,
                Action::Click { count: 2 }
            ]
        );
    }

    #[test]
    fn hold() {
        // The window expires at 400 while the button is still down.
        assert_eq!(
            run(8, &[P(0), T, R(600)]),
            vec![Action::Down, Action::Up, Action::Hold { count: 1, held_ms: 600 }]
        );
    }

    #[test]
    fn hold_on_third_press_suppresses_click() {
        let actions = run(8, &[P(0), R(50), P(100), R(150), P(200), T, R(1500)]);
        assert_eq!(
            actions,
            vec![
                Action::Down,
                Action::Up,
                Action::Down,
                Action::Up,
                Action::Down,
                Action::Up,
                Action::Hold { count: 3, held_ms: 1300 }
            ]
        );
    }

    #[test]
    fn click_count_is_clamped_but_timer_keeps_rearming() {
        let mut handler = handler(3);
        let mut events = vec![];
        for i in 0..10 {
            events.push(P(i * 50));
            events.push(R(i * 50 + 25));
        }
        events.push(T);
        let actions = handler.on_events(&events).unwrap();

        let mut expected = vec![];
        for _ in 0..10 {
            expected.push(Action::Down);
            expected.push(Action::Up);
        }
        expected.push(Action::Click { count: 3 });
        assert_eq!(actions, expected);
        assert_eq!(handler.timer().arms, 10);
    }

    #[test]
    fn unlimited_click_count() {
        let mut events = vec![];
        for i in 0..120 {
            events.push(P(i * 10));
            events.push(R(i * 10 + 5));
        }
        events.push(T);
        let actions = run(0, &events);
        assert_eq!(actions.last(), Some(&Action::Click { count: 120 }));
    }

    #[test]
    fn short_press_is_not_a_hold() {
        assert_eq!(
            run(8, &[P(0), R(300), T]),
            vec![Action::Down, Action::Up, Action::Click { count: 1 }]
        );
    }

    #[test]
    fn hold_threshold_is_inclusive() {
        assert_eq!(
            run(8, &[P(1000), R(1399)]),
            vec![Action::Down, Action::Up]
        );
        assert_eq!(
            run(8, &[P(1000), R(1400)]),
            vec![Action::Down, Action::Up, Action::Hold { count: 1, held_ms: 400 }]
        );
    }

    #[test]
    fn spurious_release_is_ignored() {
        assert_eq!(run(8, &[R(10), R(20)]), Vec::<Action>::new());
        assert_eq!(run(8, &[P(0), R(10), R(20)]), vec![Action::Down, Action::Up]);
    }

    #[test]
    fn next_sequence_starts_from_one() {
        let mut handler = handler(8);
        handler.on_events(&[P(0), R(50), P(100), R(150), T]).unwrap();
        let actions = handler.on_events(&[P(2000), R(2050), T]).unwrap();
        assert_eq!(actions.last(), Some(&Action::Click { count: 1 }));
    }

    #[test]
    fn stale_timer_expiration_is_dropped() {
        struct StaleTimer;
        impl ClickTimer for StaleTimer {
            fn arm(&mut self, _: Duration) -> anyhow::Result<()> {
                Ok(())
            }
            fn consume(&mut self) -> anyhow::Result<bool> {
                Ok(false)
            }
        }
        let mut handler = EventHandler::new(StaleTimer, 8);
        let actions = handler.on_events(&[P(0), R(50), T]).unwrap();
        assert_eq!(actions, vec![Action::Down, Action::Up]);
        // Still in the same window: the next press counts as the second one.
        let actions = handler.on_events(&[P(100), R(500)]).unwrap();
        assert_eq!(actions.last(), Some(&Action::Hold { count: 2, held_ms: 400 }));
    }

    #[test]
    fn rearming_timerfd_discards_pending_expiration() {
        use nix::sys::timerfd::{ClockId, TimerFlags};
        use std::thread;

        let timer = TimerFd::new(ClockId::CLOCK_MONOTONIC, TimerFlags::TFD_NONBLOCK).unwrap();
        let mut handler = EventHandler::new(timer, 8);
        assert_eq!(handler.on_events(&[P(0), R(50)]).unwrap(), vec![Action::Down, Action::Up]);

        // Let the window expire without reading it.
        handler.click_timer.arm(Duration::from_millis(1)).unwrap();
        thread::sleep(Duration::from_millis(10));

        // The press re-arms the timer before the expiration is read.
        let actions = handler.on_events(&[P(100), T]).unwrap();
        assert_eq!(actions, vec![Action::Down]);
        assert_eq!(handler.press_count, 2);
        assert!(handler.timer_running);

        assert_eq!(handler.on_events(&[R(150)]).unwrap(), vec![Action::Up]);
        thread::sleep(Duration::from_millis(CLICK_TIMEOUT_MS + 100));
        assert_eq!(handler.on_events(&[T]).unwrap(), vec![Action::Click { count: 2 }]);
    }

    // Feeds random edges, firing the timer whenever its deadline passes.
    fn random_session(limit: u32) -> (Vec<Event>, Vec<Action>) {
        let mut handler = handler(limit);
        let mut fed = vec![];
        let mut actions = vec![];
        let mut now = 0;
        let mut deadline: Option<u64> = None;
        let mut pressed = false;

        for _ in 0..fastrand::usize(1..60) {
            now += fastrand::u64(1..1500);
            if let Some(at) = deadline {
                if at < now {
                    fed.push(T);
                    actions.extend(handler.on_events(&[T]).unwrap());
                    deadline = None;
                }
            }
            // Mostly alternate, with the odd repeated level.
            if fastrand::u8(0..10) != 0 {
                pressed = !pressed;
            }
            let arms = handler.timer().arms;
            let event = Event::Edge { pressed, at_ms: now };
            fed.push(event);
            actions.extend(handler.on_events(&[event]).unwrap());
            if handler.timer().arms > arms {
                deadline = Some(now + CLICK_TIMEOUT_MS);
            }
        }
        if deadline.is_some() {
            fed.push(T);
            actions.extend(handler.on_events(&[T]).unwrap());
        }
        (fed, actions)
    }

    #[test]
    fn random_sessions_keep_invariants() {
        for _ in 0..500 {
            let limit = fastrand::u32(0..5);
            let (events, actions) = random_session(limit);

            let presses = events.iter().filter(|e| matches!(e, Event::Edge { pressed: true, .. })).count();
            let timeouts = events.iter().filter(|e| **e == T).count();
            let downs = actions.iter().filter(|a| **a == Action::Down).count();
            let ups = actions.iter().filter(|a| **a == Action::Up).count();
            let clicks = actions.iter().filter(|a| matches!(a, Action::Click { .. })).count();
            let holds = actions.iter().filter(|a| matches!(a, Action::Hold { .. })).count();

            assert_eq!(downs, presses);
            assert!(ups <= downs);
            assert!(clicks <= timeouts);
            assert!(holds <= ups);

            for (i, action) in actions.iter().enumerate() {
                match *action {
                    Action::Hold { count, held_ms } => {
                        assert!(i > 0 && actions[i - 1] == Action::Up, "HOLD not preceded by UP: {actions:?}");
                        assert!(held_ms >= HOLD_PRESS_TIMEOUT_MS);
                        assert!(count >= 1);
                        assert!(limit == 0 || count <= limit);
                    }
                    Action::Click { count } => {
                        assert!(count >= 1);
                        assert!(limit == 0 || count <= limit);
                    }
                    Action::Up => assert!(i > 0),
                    Action::Down => {}
                }
            }
        }
    }

    #[test]
    fn ups_match_releases_after_presses() {
        for _ in 0..200 {
            let (events, actions) = random_session(8);
            let mut down = false;
            let mut expected_ups = 0;
            for event in &events {
                match *event {
                    Event::Edge { pressed: true, .. } => down = true,
                    Event::Edge { pressed: false, .. } if down => {
                        down = false;
                        expected_ups += 1;
                    }
                    _ => {}
                }
            }
            assert_eq!(actions.iter().filter(|a| **a == Action::Up).count(), expected_ups);
        }
    }
}
