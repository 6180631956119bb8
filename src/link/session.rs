//! # Link Session
//!
//! Owns the serial link to the flight controller, tracks the active device
//! mode and interprets incoming bytes according to whichever sub-protocol is
//! in flight.
//!
//! The device never says what it is sending. The session decides purely from
//! its own flags, checked in this fixed order:
//!
//! | Priority | Active when | Incoming data is |
//! |----------|-------------|------------------|
//! | 1 | settings pull pending | raw blob bytes (discarded until the quiet gate opens) |
//! | 2 | settings push pending | `ok_push` / `settings_rcvd` lines |
//! | 3 | motor test | `motors_receipt` lines |
//! | 4 | channel monitor | 12-integer channel lines |
//! | 5 | live telemetry | 9-float sensor lines |
//! | 6 | otherwise | swallowed |
//!
//! Everything the session writes goes through one outbound queue. Bytes the
//! port has accepted leave the queue and are never written again, so a
//! token cut short by a full output buffer is completed on the next flush
//! instead of being restarted.
//!
//! All handlers are synchronous and non-blocking. The async driver in
//! [`crate::link::driver`] calls them on readiness, ticks and the quiet-gate
//! deadline; tests call them directly.

use std::collections::VecDeque;
use std::io;
use std::time::{Duration, Instant};

use bytes::{Buf, BytesMut};
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::{ConfiguratorError, Result};
use crate::link::protocol::{
    encode_motor_values, normalize_line, Command, Mode, MotorValues, MOTOR_COUNT,
    TOKEN_MOTORS_RECEIPT, TOKEN_OK_PUSH, TOKEN_SETTINGS_RCVD,
};
use crate::rc::RcChannels;
use crate::serial::SerialLink;
use crate::settings::{self, Settings, SettingsBlob, SETTINGS_BLOB_LEN};
use crate::telemetry::decoder::LIVE_FIELDS;
use crate::telemetry::{parse_channels, parse_live, LiveSample, LiveVector, PlotHistory};

/// Largest single read from the link
pub const READ_CHUNK: usize = 256;

/// Tunables taken from the `[link]` and `[telemetry]` config sections.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionOptions {
    /// Delay between `pull_settings` and accepting blob bytes
    pub quiet_gate: Duration,
    /// Longest partial line kept while waiting for `'\n'`
    pub max_line_len: usize,
    /// Live samples kept for plotting
    pub plot_history: usize,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

impl SessionOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            quiet_gate: config.link.quiet_gate(),
            max_line_len: config.link.max_line_len,
            plot_history: config.telemetry.plot_history,
        }
    }
}

/// Progress of a settings pull.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PullStatus {
    #[default]
    Idle,
    /// Request sent, waiting for the gate and then 1024 bytes
    Pending,
    /// Blob received and applied
    Pulled,
    /// Blob received but its magic byte was wrong
    Failed,
    /// Link closed before the blob was complete
    Incomplete,
}

/// Progress of a settings push.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PushPhase {
    #[default]
    Idle,
    /// `push_settings` sent, waiting for `ok_push`
    AwaitingAck,
    /// Blob being written, `written` of 1024 bytes accepted so far
    Writing { written: usize },
    /// Blob written, waiting for `settings_rcvd`
    AwaitingReceipt,
}

/// Things the caller may want to react to, drained with [`LinkSession::poll_event`].
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    SettingsPulled,
    PullFailed(String),
    PushAccepted,
    PushCompleted,
    PushFailed(String),
    ChannelsUpdated(RcChannels),
    LiveSample(LiveVector),
    MotorsWritten(MotorValues),
    LinkClosed(String),
}

/// One-shot timer gate.
///
/// Armed when a pull is requested; the driver fires it once the deadline
/// passes, after which it stays open until re-armed or reset.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QuietGate {
    deadline: Option<Instant>,
    open: bool,
}

impl QuietGate {
    pub fn arm(&mut self, now: Instant, delay: Duration) {
        self.deadline = Some(now + delay);
        self.open = false;
    }

    /// Open the gate. Returns false if it was not armed.
    pub fn fire(&mut self) -> bool {
        if self.deadline.take().is_some() {
            self.open = true;
            true
        } else {
            false
        }
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn is_open(&self) -> bool {
        self.open
    }
}

/// Map a link I/O error to the short status shown to the user.
///
/// # Examples
///
/// ```
/// use std::io;
/// use fc_configurator::link::session::link_error_message;
///
/// let e = io::Error::new(io::ErrorKind::NotFound, "no such device");
/// assert_eq!(link_error_message(&e), "Device not found");
/// ```
pub fn link_error_message(error: &io::Error) -> String {
    match error.kind() {
        io::ErrorKind::NotFound => "Device not found".to_string(),
        io::ErrorKind::PermissionDenied => "Can't open device".to_string(),
        io::ErrorKind::NotConnected => "Not open error".to_string(),
        io::ErrorKind::BrokenPipe
        | io::ErrorKind::ConnectionReset
        | io::ErrorKind::ConnectionAborted
        | io::ErrorKind::UnexpectedEof => "Port disconnected".to_string(),
        _ => format!("Serial port error: {}", error),
    }
}

/// Flight controller link session
///
/// Holds the device configuration and the latest telemetry alongside the
/// protocol state, so one object owns everything a front end displays.
pub struct LinkSession<L: SerialLink> {
    link: Option<L>,
    options: SessionOptions,

    mode: Mode,
    pull: PullStatus,
    push: PushPhase,
    push_blob: Option<Box<SettingsBlob>>,
    motor_test_active: bool,
    motor_awaiting_receipt: bool,
    channel_monitor_active: bool,
    live_active: bool,

    gate: QuietGate,
    accumulator: BytesMut,
    rx: BytesMut,
    tx: BytesMut,

    settings: Settings,
    channels: Option<RcChannels>,
    live: LiveVector,
    motor_values: MotorValues,
    history: PlotHistory,

    events: VecDeque<SessionEvent>,
    status: String,
}

impl<L: SerialLink> LinkSession<L> {
    /// Create a disconnected session with default settings
    pub fn new(options: SessionOptions) -> Self {
        Self {
            link: None,
            options,
            mode: Mode::default(),
            pull: PullStatus::Idle,
            push: PushPhase::Idle,
            push_blob: None,
            motor_test_active: false,
            motor_awaiting_receipt: false,
            channel_monitor_active: false,
            live_active: false,
            gate: QuietGate::default(),
            accumulator: BytesMut::with_capacity(SETTINGS_BLOB_LEN),
            rx: BytesMut::with_capacity(options.max_line_len),
            tx: BytesMut::new(),
            settings: Settings::default(),
            channels: None,
            live: [0.0; LIVE_FIELDS],
            motor_values: [0; MOTOR_COUNT],
            history: PlotHistory::new(options.plot_history),
            events: VecDeque::new(),
            status: "Disconnected".to_string(),
        }
    }

    /// Attach an opened link. Any previous link is closed first.
    pub fn open(&mut self, link: L) {
        if self.link.is_some() {
            self.close();
        }
        self.link = Some(link);
        self.pull = PullStatus::Idle;
        self.set_status("Connected");
        info!("Link opened");
    }

    /// Close the link and return every in-flight operation to idle.
    ///
    /// A partially received blob is dropped and the pull is marked
    /// [`PullStatus::Incomplete`].
    pub fn close(&mut self) {
        self.close_with("Disconnected".to_string());
    }

    fn close_with(&mut self, reason: String) {
        if self.link.take().is_none() {
            return;
        }

        if self.pull == PullStatus::Pending {
            warn!(
                "Link closed with {}/{} settings bytes received",
                self.accumulator.len(),
                SETTINGS_BLOB_LEN
            );
            self.pull = PullStatus::Incomplete;
            self.events
                .push_back(SessionEvent::PullFailed("link closed during pull".to_string()));
        }
        if self.push != PushPhase::Idle {
            warn!("Link closed during settings push ({:?})", self.push);
            self.events
                .push_back(SessionEvent::PushFailed("link closed during push".to_string()));
        }

        if !self.tx.is_empty() {
            debug!("Dropping {} unsent bytes", self.tx.len());
            self.tx.clear();
        }
        self.push = PushPhase::Idle;
        self.push_blob = None;
        self.gate.reset();
        self.accumulator.clear();
        self.reset_mode_flags();
        self.mode = Mode::default();

        info!("Link closed: {}", reason);
        self.events.push_back(SessionEvent::LinkClosed(reason.clone()));
        self.set_status(reason);
    }

    /// Report a link failure: the error becomes the status and the link is
    /// force-closed.
    pub fn on_link_error(&mut self, error: &io::Error) {
        let message = link_error_message(error);
        warn!("Link error: {} ({})", message, error);
        self.close_with(message);
    }

    pub fn is_open(&self) -> bool {
        self.link.is_some()
    }

    pub fn link(&self) -> Option<&L> {
        self.link.as_ref()
    }

    /// Mutable link access for drivers that read the port themselves.
    /// Writes must still go through the session.
    pub fn link_mut(&mut self) -> Option<&mut L> {
        self.link.as_mut()
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn pull_status(&self) -> PullStatus {
        self.pull
    }

    pub fn push_phase(&self) -> PushPhase {
        self.push
    }

    /// True while a pull or push has not finished
    pub fn is_transfer_in_progress(&self) -> bool {
        self.pull == PullStatus::Pending || self.push != PushPhase::Idle
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Mutable access for local edits; takes effect on the next push
    pub fn settings_mut(&mut self) -> &mut Settings {
        &mut self.settings
    }

    /// Latest channel vector from the monitor, if any arrived
    pub fn channels(&self) -> Option<&RcChannels> {
        self.channels.as_ref()
    }

    /// Latest live sensor vector (zero after a mode change)
    pub fn live(&self) -> &LiveVector {
        &self.live
    }

    pub fn history(&self) -> &PlotHistory {
        &self.history
    }

    pub fn motor_values(&self) -> &MotorValues {
        &self.motor_values
    }

    pub fn motor_test_active(&self) -> bool {
        self.motor_test_active
    }

    pub fn awaiting_motor_receipt(&self) -> bool {
        self.motor_awaiting_receipt
    }

    pub fn channel_monitor_active(&self) -> bool {
        self.channel_monitor_active
    }

    /// Whether the fast sampling tick should run
    ///
    /// Paused while a pull is pending: no live lines arrive then.
    pub fn live_sampling_active(&self) -> bool {
        self.live_active && self.pull != PullStatus::Pending
    }

    /// Queued bytes the port has not accepted yet
    pub fn pending_output(&self) -> usize {
        self.tx.len()
    }

    /// When the pending quiet gate should fire
    pub fn quiet_gate_deadline(&self) -> Option<Instant> {
        self.gate.deadline()
    }

    /// Latest user-visible status line
    pub fn status(&self) -> &str {
        &self.status
    }

    /// Take the oldest unhandled event
    pub fn poll_event(&mut self) -> Option<SessionEvent> {
        self.events.pop_front()
    }

    fn set_status(&mut self, status: impl Into<String>) {
        self.status = status.into();
    }

    fn ensure_idle(&self) -> Result<()> {
        if self.link.is_none() {
            return Err(ConfiguratorError::NotConnected);
        }
        if self.is_transfer_in_progress() {
            return Err(ConfiguratorError::TransferInProgress);
        }
        Ok(())
    }

    /// Append a message to the outbound queue and write what the port takes.
    fn enqueue(&mut self, data: &[u8]) -> io::Result<()> {
        if self.link.is_none() {
            return Err(io::Error::new(io::ErrorKind::NotConnected, "link closed"));
        }
        self.tx.extend_from_slice(data);
        self.flush_output()
    }

    /// Write queued bytes until the port stops accepting them.
    ///
    /// Accepted bytes leave the queue; the rest waits for the next flush.
    fn flush_output(&mut self) -> io::Result<()> {
        let Some(link) = self.link.as_mut() else {
            return Ok(());
        };
        while !self.tx.is_empty() {
            match link.write_some(&self.tx) {
                Ok(0) => break,
                Ok(n) => self.tx.advance(n),
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(e) => return Err(e),
            }
        }
        if !self.tx.is_empty() {
            debug!("Serial output full, {} bytes queued", self.tx.len());
        }
        Ok(())
    }

    /// Queue a command; a hard write failure closes the link.
    fn send_command(&mut self, data: &[u8]) -> Result<()> {
        if let Err(e) = self.enqueue(data) {
            self.on_link_error(&e);
            return Err(e.into());
        }
        Ok(())
    }

    fn reset_mode_flags(&mut self) {
        self.motor_test_active = false;
        self.motor_awaiting_receipt = false;
        self.channel_monitor_active = false;
        self.live_active = false;
        self.live = [0.0; LIVE_FIELDS];
        self.history.clear();
        self.rx.clear();
    }

    /// Switch the device into another mode
    ///
    /// Sends the mode token, then resets every per-mode flag and enables the
    /// ones the new mode needs.
    ///
    /// # Errors
    ///
    /// - `NotConnected` if the link is closed
    /// - `TransferInProgress` while a pull or push is running
    /// - `Io` if the token could not be written
    pub fn set_mode(&mut self, mode: Mode) -> Result<()> {
        self.ensure_idle()?;
        self.send_command(&mode.command().to_wire())?;

        self.reset_mode_flags();
        self.mode = mode;
        match mode {
            Mode::MotorTest => {
                self.motor_test_active = true;
                // The device opens the exchange with its first receipt
                self.motor_awaiting_receipt = true;
            }
            Mode::FlightSetup => self.channel_monitor_active = true,
            Mode::LivePlots => self.live_active = true,
            Mode::Firmware | Mode::Configuration | Mode::Suspended => {}
        }

        info!("Mode: {}", mode);
        self.set_status(format!("Mode: {}", mode));
        Ok(())
    }

    /// Request the settings blob from the device
    ///
    /// Clears the receive buffers and arms the quiet gate. Bytes arriving
    /// before the gate fires are discarded.
    ///
    /// # Errors
    ///
    /// - `NotConnected` / `TransferInProgress` as for [`LinkSession::set_mode`]
    /// - `Io` if the buffers could not be cleared or the token not written
    pub fn pull_settings(&mut self) -> Result<()> {
        self.ensure_idle()?;

        if let Some(link) = self.link.as_mut() {
            if let Err(e) = link.clear_input() {
                self.on_link_error(&e);
                return Err(e.into());
            }
        }
        self.accumulator.clear();
        self.rx.clear();

        self.send_command(&Command::PullSettings.to_wire())?;

        self.pull = PullStatus::Pending;
        self.gate.arm(Instant::now(), self.options.quiet_gate);
        debug!("Settings pull requested, quiet gate {:?}", self.options.quiet_gate);
        self.set_status("Pulling settings...");
        Ok(())
    }

    /// Send the current settings to the device
    ///
    /// Only the request is written here. The blob follows once the device
    /// answers `ok_push`, in chunks on each [`LinkSession::on_tick`].
    ///
    /// # Errors
    ///
    /// Same as [`LinkSession::set_mode`]
    pub fn push_settings(&mut self) -> Result<()> {
        self.ensure_idle()?;

        let blob = settings::encode(&self.settings);
        self.rx.clear();
        self.send_command(&Command::PushSettings.to_wire())?;

        self.push_blob = Some(Box::new(blob));
        self.push = PushPhase::AwaitingAck;
        debug!("Settings push requested, waiting for {}", TOKEN_OK_PUSH);
        self.set_status("Waiting for device to accept settings...");
        Ok(())
    }

    /// Abandon a stalled pull or push.
    ///
    /// Returns true if something was cancelled.
    pub fn cancel_transfer(&mut self) -> bool {
        let mut cancelled = false;
        if self.pull == PullStatus::Pending {
            self.pull = PullStatus::Idle;
            self.gate.reset();
            self.accumulator.clear();
            cancelled = true;
        }
        if self.push != PushPhase::Idle {
            self.push = PushPhase::Idle;
            self.push_blob = None;
            self.events
                .push_back(SessionEvent::PushFailed("cancelled".to_string()));
            cancelled = true;
        }
        if cancelled {
            info!("Settings transfer cancelled");
            self.set_status("Transfer cancelled");
        }
        cancelled
    }

    /// Update the motor slider values, written on the next device receipt
    pub fn set_motor_values(&mut self, values: MotorValues) {
        self.motor_values = values;
    }

    /// Restart the device. Any transfer in flight is abandoned.
    ///
    /// # Errors
    ///
    /// `NotConnected` or `Io`
    pub fn reboot(&mut self) -> Result<()> {
        self.device_command(Command::Reboot, "Rebooting device...")
    }

    /// Restart the device into its DFU bootloader. Any transfer in flight is
    /// abandoned.
    ///
    /// # Errors
    ///
    /// `NotConnected` or `Io`
    pub fn bootloader(&mut self) -> Result<()> {
        self.device_command(Command::Bootloader, "Starting bootloader...")
    }

    fn device_command(&mut self, command: Command, status: &str) -> Result<()> {
        if self.link.is_none() {
            return Err(ConfiguratorError::NotConnected);
        }
        if self.is_transfer_in_progress() {
            self.cancel_transfer();
        }
        self.accumulator.clear();
        self.send_command(&command.to_wire())?;
        info!("Sent {}", command);
        self.set_status(status);
        Ok(())
    }

    /// Ask the device to restore its factory settings
    ///
    /// # Errors
    ///
    /// Same as [`LinkSession::set_mode`]
    pub fn load_defaults(&mut self) -> Result<()> {
        self.ensure_idle()?;
        self.send_command(&Command::LoadDefaults.to_wire())?;
        info!("Sent {}", Command::LoadDefaults);
        self.set_status("Device settings reset to defaults");
        Ok(())
    }

    /// Fire the quiet gate once its deadline has passed
    pub fn on_quiet_gate_elapsed(&mut self) {
        if !self.gate.fire() {
            return;
        }
        if self.pull == PullStatus::Pending {
            self.accumulator.clear();
            debug!("Quiet gate open, accepting settings bytes");
        }
    }

    /// Handle "bytes available" from the link
    ///
    /// Reads until the port has nothing more buffered. Every chunk is handed
    /// to the dispatcher before the next read.
    pub fn on_ready_read(&mut self) {
        let mut buf = [0u8; READ_CHUNK];
        loop {
            let Some(link) = self.link.as_mut() else {
                return;
            };
            let n = match link.read_available(&mut buf) {
                Ok(0) => return,
                Ok(n) => n,
                Err(e) => {
                    self.on_link_error(&e);
                    return;
                }
            };
            self.ingest(&buf[..n]);
        }
    }

    /// Handle bytes the caller already read from the link
    ///
    /// Same dispatch as [`LinkSession::on_ready_read`], for drivers that read
    /// the port themselves. Ignored once the link is closed.
    pub fn on_received(&mut self, chunk: &[u8]) {
        if self.link.is_some() {
            self.ingest(chunk);
        }
    }

    fn ingest(&mut self, mut chunk: &[u8]) {
        if self.pull == PullStatus::Pending {
            if !self.gate.is_open() {
                debug!("Discarding {} bytes before quiet gate", chunk.len());
                return;
            }
            // The accumulator never grows past the blob; the tail is line data
            let take = (SETTINGS_BLOB_LEN - self.accumulator.len()).min(chunk.len());
            self.accumulator.extend_from_slice(&chunk[..take]);
            if self.accumulator.len() == SETTINGS_BLOB_LEN {
                self.finish_pull();
            }
            chunk = &chunk[take..];
            if chunk.is_empty() {
                return;
            }
        }

        self.rx.extend_from_slice(chunk);
        while let Some(pos) = self.rx.iter().position(|&b| b == b'\n') {
            let line = self.rx.split_to(pos + 1);
            let text = String::from_utf8_lossy(&line);
            self.dispatch_line(&text);
        }
        if self.rx.len() > self.options.max_line_len {
            debug!("Swallowing {} bytes without line end", self.rx.len());
            self.rx.clear();
        }
    }

    fn finish_pull(&mut self) {
        let result = settings::decode(&self.accumulator);
        self.accumulator.clear();
        self.gate.reset();

        match result {
            Ok(settings) => {
                self.settings = settings;
                self.pull = PullStatus::Pulled;
                info!("Settings pulled");
                self.events.push_back(SessionEvent::SettingsPulled);
                self.set_status("Settings pulled");
            }
            Err(e) => {
                self.pull = PullStatus::Failed;
                warn!("Discarding pulled settings: {}", e);
                self.events.push_back(SessionEvent::PullFailed(e.to_string()));
                self.set_status("Pull failed: invalid settings data");
            }
        }
    }

    fn dispatch_line(&mut self, line: &str) {
        match self.push {
            PushPhase::AwaitingAck => {
                if normalize_line(line) == TOKEN_OK_PUSH {
                    self.push = PushPhase::Writing { written: 0 };
                    debug!("Device accepted push");
                    self.events.push_back(SessionEvent::PushAccepted);
                    self.set_status("Writing settings...");
                } else {
                    self.swallow(line);
                }
                return;
            }
            PushPhase::AwaitingReceipt => {
                if normalize_line(line) == TOKEN_SETTINGS_RCVD {
                    self.push = PushPhase::Idle;
                    self.push_blob = None;
                    info!("Settings pushed");
                    self.events.push_back(SessionEvent::PushCompleted);
                    self.set_status("Settings pushed");
                } else {
                    self.swallow(line);
                }
                return;
            }
            PushPhase::Writing { .. } => {
                self.swallow(line);
                return;
            }
            PushPhase::Idle => {}
        }

        if self.motor_test_active {
            if normalize_line(line) == TOKEN_MOTORS_RECEIPT {
                self.motor_awaiting_receipt = false;
                self.write_motor_values();
            } else {
                self.swallow(line);
            }
        } else if self.channel_monitor_active {
            match parse_channels(line) {
                Some(channels) => {
                    self.channels = Some(channels);
                    self.events.push_back(SessionEvent::ChannelsUpdated(channels));
                    self.send_receipt(Command::ChannelsReceipt);
                }
                None => debug!("Dropping malformed channel line: {:?}", line),
            }
        } else if self.live_active {
            match parse_live(line) {
                Some(live) => {
                    self.live = live;
                    self.events.push_back(SessionEvent::LiveSample(live));
                    self.send_receipt(Command::LiveReceipt);
                }
                None => debug!("Dropping malformed live line: {:?}", line),
            }
        } else {
            self.swallow(line);
        }
    }

    fn swallow(&self, line: &str) {
        debug!("Swallowing line in {} mode: {:?}", self.mode, line);
    }

    fn send_receipt(&mut self, command: Command) {
        if let Err(e) = self.enqueue(&command.to_wire()) {
            self.on_link_error(&e);
        }
    }

    /// Queue one motor line. Only called after a receipt cleared the flag.
    fn write_motor_values(&mut self) {
        if self.motor_awaiting_receipt {
            return;
        }
        let values = self.motor_values;
        match self.enqueue(&encode_motor_values(&values)) {
            Ok(()) => {
                self.motor_awaiting_receipt = true;
                self.events.push_back(SessionEvent::MotorsWritten(values));
            }
            Err(e) => self.on_link_error(&e),
        }
    }

    /// Periodic tick: flushes queued output, then advances the push writer.
    ///
    /// Blob bytes are only written once every queued token has gone out.
    pub fn on_tick(&mut self) {
        if let Err(e) = self.flush_output() {
            self.on_link_error(&e);
            return;
        }
        if let PushPhase::Writing { written } = self.push {
            if self.tx.is_empty() {
                self.write_push_chunks(written);
            }
        }
    }

    fn write_push_chunks(&mut self, mut written: usize) {
        let (Some(link), Some(blob)) = (self.link.as_mut(), self.push_blob.as_ref()) else {
            return;
        };

        let mut failure = None;
        while written < SETTINGS_BLOB_LEN {
            match link.write_some(&blob[written..]) {
                Ok(0) => break,
                Ok(n) => written += n,
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(e) => {
                    failure = Some(e);
                    break;
                }
            }
        }

        if let Some(e) = failure {
            warn!("Settings push aborted after {} bytes: {}", written, e);
            self.push = PushPhase::Idle;
            self.push_blob = None;
            self.events.push_back(SessionEvent::PushFailed(e.to_string()));
            self.set_status(format!("Push failed: {}", e));
            return;
        }

        if written == SETTINGS_BLOB_LEN {
            self.push = PushPhase::AwaitingReceipt;
            self.push_blob = None;
            debug!("Settings blob written, waiting for {}", TOKEN_SETTINGS_RCVD);
            self.set_status("Waiting for device to store settings...");
        } else {
            self.push = PushPhase::Writing { written };
            self.set_status(format!(
                "Writing settings... {}/{}",
                written, SETTINGS_BLOB_LEN
            ));
        }
    }

    /// Fast sampling tick: appends the latest live vector to the plot history
    pub fn on_sample_tick(&mut self) {
        if self.live_sampling_active() {
            self.history.push(LiveSample::from(self.live));
        }
    }
}
