//! # Link Event Loop
//!
//! Drives a [`LinkSession`] from tokio: port reads, the main tick, the fast
//! live-sampling tick and the one-shot quiet gate. The session itself never
//! blocks or sleeps; this loop only decides which handler runs next.

use std::future;
use std::io;
use std::ops::ControlFlow;

use tokio::time::{interval, sleep_until, Instant, MissedTickBehavior};
use tracing::{debug, info};

use crate::config::LinkConfig;
use crate::link::session::{LinkSession, SessionEvent, READ_CHUNK};
use crate::serial::DeviceSerial;

/// Why [`run`] returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Exit {
    /// The event callback asked to stop
    Stopped,
    /// Ctrl+C
    Interrupted,
    /// The link closed (device gone or closed by the callback)
    LinkClosed,
}

/// What woke the loop up
enum Wake {
    Received(io::Result<usize>),
    Tick,
    Sample,
    QuietGate,
    Interrupt,
}

async fn receive(link: Option<&mut DeviceSerial>, buf: &mut [u8]) -> io::Result<usize> {
    match link {
        Some(serial) => serial.recv(buf).await,
        None => future::pending().await,
    }
}

async fn wait_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => future::pending().await,
    }
}

/// Run the session until the callback stops it, the link closes or Ctrl+C
///
/// After every wake-up all queued [`SessionEvent`]s are handed to
/// `on_event`, which may issue further session commands.
///
/// # Arguments
///
/// * `session` - Session with an opened link
/// * `config` - Tick periods
/// * `on_event` - Called for each event; `ControlFlow::Break` ends the loop
///
/// # Returns
///
/// * `Exit` - Reason the loop ended
pub async fn run<F>(session: &mut LinkSession<DeviceSerial>, config: &LinkConfig, mut on_event: F) -> Exit
where
    F: FnMut(&mut LinkSession<DeviceSerial>, SessionEvent) -> ControlFlow<()>,
{
    let mut tick = interval(config.tick_interval());
    tick.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut sample = interval(config.sample_interval());
    sample.set_missed_tick_behavior(MissedTickBehavior::Skip);

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    let mut buf = [0u8; READ_CHUNK];

    // Events queued before the loop (e.g. by commands issued by the caller)
    if drain_events(session, &mut on_event).is_break() {
        return Exit::Stopped;
    }

    loop {
        if !session.is_open() {
            return Exit::LinkClosed;
        }

        let gate = session.quiet_gate_deadline().map(Instant::from_std);
        let sampling = session.live_sampling_active();

        let wake = tokio::select! {
            res = receive(session.link_mut(), &mut buf) => Wake::Received(res),
            _ = tick.tick() => Wake::Tick,
            _ = sample.tick(), if sampling => Wake::Sample,
            _ = wait_until(gate), if gate.is_some() => Wake::QuietGate,
            _ = &mut shutdown => Wake::Interrupt,
        };

        match wake {
            Wake::Received(Ok(0)) => {
                session.on_link_error(&io::Error::from(io::ErrorKind::UnexpectedEof))
            }
            Wake::Received(Ok(n)) => session.on_received(&buf[..n]),
            Wake::Received(Err(e)) => session.on_link_error(&e),
            Wake::Tick => session.on_tick(),
            Wake::Sample => session.on_sample_tick(),
            Wake::QuietGate => {
                debug!("Quiet gate deadline reached");
                session.on_quiet_gate_elapsed();
            }
            Wake::Interrupt => {
                info!("Received Ctrl+C, shutting down...");
                return Exit::Interrupted;
            }
        }

        if drain_events(session, &mut on_event).is_break() {
            return Exit::Stopped;
        }
    }
}

/// Tick the session until its queued output is written
///
/// Used before dropping a session so a command queued behind a full output
/// buffer still reaches the device. Callers bound the wait with a timeout.
///
/// # Returns
///
/// * `bool` - The link is still open
pub async fn flush(session: &mut LinkSession<DeviceSerial>, config: &LinkConfig) -> bool {
    let mut tick = interval(config.tick_interval());
    while session.is_open() && session.pending_output() > 0 {
        tick.tick().await;
        session.on_tick();
    }
    session.is_open()
}

fn drain_events<F>(session: &mut LinkSession<DeviceSerial>, on_event: &mut F) -> ControlFlow<()>
where
    F: FnMut(&mut LinkSession<DeviceSerial>, SessionEvent) -> ControlFlow<()>,
{
    while let Some(event) = session.poll_event() {
        on_event(session, event)?;
    }
    ControlFlow::Continue(())
}
