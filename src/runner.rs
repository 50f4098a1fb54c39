use anyhow::Context;
use log::{debug, info, warn};
use nix::errno::Errno;
use nix::poll::{poll, PollFd, PollFlags, PollTimeout};
use nix::sys::timerfd::{ClockId, TimerFd, TimerFlags};
use signal_hook::consts::signal::{SIGINT, SIGTERM};
use signal_hook::low_level::pipe;
use std::os::fd::{AsFd, BorrowedFd};
use std::os::unix::net::UnixStream;

use crate::action::Action;
use crate::action_dispatcher::ActionDispatcher;
use crate::action_resolver::ActionResolver;
use crate::device::{ButtonSource, Edge, SysfsGpio};
use crate::event::{monotonic_ms, Event};
use crate::event_handler::{ClickTimer, EventHandler};
use crate::settings::Settings;

/// Returns a socket that turns readable once SIGINT or SIGTERM is delivered.
/// A signal arriving at any point after this call is kept until it is read.
pub fn termination_pipe() -> anyhow::Result<UnixStream> {
    let (stop, notify) = UnixStream::pair().context("Failed to create termination pipe")?;
    notify
        .set_nonblocking(true)
        .context("Failed to set up termination pipe")?;
    for signal in [SIGINT, SIGTERM] {
        let notify = notify.try_clone().context("Failed to set up termination pipe")?;
        pipe::register(signal, notify).with_context(|| format!("Failed to register signal {signal} handler"))?;
    }
    Ok(stop)
}

/// Sets up the button on `settings.pin` and dispatches its actions until a
/// termination signal arrives or the button can no longer be read.
pub fn run(settings: &Settings) -> anyhow::Result<()> {
    let stop = termination_pipe()?;
    run_with(&SysfsGpio::default(), settings, stop.as_fd())
}

pub fn run_with(gpio: &SysfsGpio, settings: &Settings, stop: BorrowedFd<'_>) -> anyhow::Result<()> {
    let pin = settings.pin;
    let _export = gpio.export_guarded(pin)?;

    if let Some(active_low) = settings.activation.active_low() {
        gpio.set_active_low(pin, active_low)?;
    }
    gpio.set_edge(pin, Edge::Both)?;

    let result = listen(gpio, settings, stop);

    if let Err(e) = gpio.set_edge(pin, Edge::None) {
        warn!("{e:#}");
    }
    result
}

fn listen(gpio: &SysfsGpio, settings: &Settings, stop: BorrowedFd<'_>) -> anyhow::Result<()> {
    let mut button = gpio.open_button(settings.pin)?;
    let timer = TimerFd::new(ClockId::CLOCK_MONOTONIC, TimerFlags::TFD_NONBLOCK | TimerFlags::TFD_CLOEXEC)
        .context("Creating timer failed")?;
    let mut handler = EventHandler::new(timer, settings.click_count_limit);
    let resolver = ActionResolver::new(settings.config_store(), settings.time_mode);
    let mut dispatcher = ActionDispatcher::new(resolver);

    info!("Listening to events on GPIO #{}", settings.pin);
    event_loop(&mut button, &mut handler, stop, |action| dispatcher.on_action(action))
}

/// Waits for button edges and click-window expirations and feeds them through
/// `handler`. Returns `Ok` once `stop` turns readable.
pub fn event_loop<B, T, F>(
    button: &mut B,
    handler: &mut EventHandler<T>,
    stop: BorrowedFd<'_>,
    mut on_action: F,
) -> anyhow::Result<()>
where
    B: ButtonSource,
    T: ClickTimer + AsFd,
    F: FnMut(Action),
{
    loop {
        let (stop_ready, edge_ready, timer_ready) = {
            let edge_events = button.edge_events();
            let mut fds = [
                PollFd::new(stop, PollFlags::POLLIN),
                PollFd::new(button.edge_fd(), edge_events),
                PollFd::new(handler.timer().as_fd(), PollFlags::POLLIN),
            ];
            match poll(&mut fds, PollTimeout::NONE) {
                Ok(0) | Err(Errno::EINTR) => continue,
                Ok(_) => {}
                Err(e) => return Err(e).context("Waiting for button events failed"),
            }
            let ready = |fd: &PollFd, flags: PollFlags| fd.revents().is_some_and(|revents| revents.intersects(flags));
            (
                ready(&fds[0], PollFlags::POLLIN | PollFlags::POLLHUP),
                ready(&fds[1], edge_events | PollFlags::POLLHUP),
                ready(&fds[2], PollFlags::POLLIN),
            )
        };

        if stop_ready {
            info!("Terminating");
            return Ok(());
        }

        // Edges first so a click window is never closed ahead of a press
        // that arrived in the same wakeup.
        let mut events = Vec::with_capacity(2);
        if edge_ready {
            let at_ms = monotonic_ms();
            let pressed = button.read_level()?;
            debug!("Button {} at {at_ms}", if pressed { "pressed" } else { "released" });
            events.push(Event::Edge { pressed, at_ms });
        }
        if timer_ready {
            events.push(Event::ClickTimeout);
        }

        for action in handler.on_events(&events)? {
            on_action(action);
        }
    }
}
