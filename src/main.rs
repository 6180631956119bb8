//! # FC Configurator
//!
//! Command line front end for configuring and operating the flight controller
//! over its USB serial link.
//!
//! Every subcommand that talks to the device opens the link, issues one
//! operation and runs the link event loop until that operation finishes or
//! Ctrl+C is pressed.

use std::io::Write;
use std::ops::ControlFlow;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

use fc_configurator::config::{Config, LoggingConfig};
use fc_configurator::firmware::{self, FlashOutput, FlashRequest};
use fc_configurator::link::{self, Exit, LinkSession, Mode, SessionEvent, SessionOptions};
use fc_configurator::orientation::Rotation;
use fc_configurator::rc::{RcChannels, RcFunction, CHANNEL_UNBOUND};
use fc_configurator::serial::{self, DeviceSerial};
use fc_configurator::settings::{self, store, PidGains, PropRotation, ReceiverProtocol, Settings, CW};
use fc_configurator::telemetry::{classify, is_armed, LiveSample, TelemetryRecorder};

/// Print every n-th live sample to the terminal
const LIVE_PRINT_EVERY: u64 = 10;

/// How long to wait for the device to take the final all-zero motor line
const MOTOR_STOP_TIMEOUT: Duration = Duration::from_secs(1);

/// How long to keep writing queued output before giving up
const OUTPUT_FLUSH_TIMEOUT: Duration = Duration::from_secs(1);

#[derive(Debug, Parser)]
#[command(name = "fc-configurator", version, about = "Flight controller configurator")]
struct Cli {
    /// TOML configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Serial device, overrides auto-detection and the config file
    #[arg(long, global = true)]
    port: Option<String>,

    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(Debug, Subcommand)]
enum Cmd {
    /// List serial ports, flight controllers first
    Ports,
    /// Read the settings from the device
    Pull {
        /// Save the raw 1024-byte blob here
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Write a saved settings blob to the device
    Push {
        #[arg(long)]
        input: PathBuf,
    },
    /// Print a saved settings blob
    Show {
        #[arg(long)]
        input: PathBuf,
    },
    /// Modify a saved settings blob
    Edit {
        #[arg(long)]
        input: PathBuf,
        #[arg(long)]
        output: PathBuf,
        /// Rotate the sensor orientation, e.g. `z+` (repeatable, applied in order)
        #[arg(long)]
        rotate: Vec<Rotation>,
        /// Bind a function to a channel, e.g. `arm=5` (repeatable)
        #[arg(long, value_parser = parse_binding)]
        bind: Vec<(RcFunction, u8)>,
        /// Toggle reversal of the channel a function is bound to (repeatable)
        #[arg(long)]
        reverse: Vec<RcFunction>,
        #[arg(long, value_enum)]
        props: Option<PropsArg>,
        #[arg(long, value_enum)]
        receiver: Option<ReceiverArg>,
    },
    /// Show live receiver channels mapped to their functions
    Monitor,
    /// Stream live sensor data
    Live {
        /// Record samples to a JSONL file in telemetry.log_dir
        #[arg(long)]
        record: bool,
    },
    /// Spin the motors with the given slider values
    Motors {
        m1: u16,
        m2: u16,
        m3: u16,
        m4: u16,
        /// Stop after this many seconds
        #[arg(long, default_value_t = 3)]
        seconds: u64,
    },
    /// Restart the device
    Reboot,
    /// Restart the device into its DFU bootloader
    Bootloader,
    /// Restore the device's factory settings
    LoadDefaults,
    /// Flash a firmware binary with dfu-util
    Flash {
        file: PathBuf,
        /// Start the new firmware after flashing
        #[arg(long)]
        leave: bool,
    },
    /// List DFU devices
    DfuList,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum PropsArg {
    Normal,
    Reversed,
}

impl From<PropsArg> for PropRotation {
    fn from(arg: PropsArg) -> Self {
        match arg {
            PropsArg::Normal => PropRotation::Normal,
            PropsArg::Reversed => PropRotation::Reversed,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ReceiverArg {
    Sbus,
    Srxl,
}

impl From<ReceiverArg> for ReceiverProtocol {
    fn from(arg: ReceiverArg) -> Self {
        match arg {
            ReceiverArg::Sbus => ReceiverProtocol::Sbus,
            ReceiverArg::Srxl => ReceiverProtocol::Srxl,
        }
    }
}

/// Parse `FUNC=CH`
fn parse_binding(s: &str) -> std::result::Result<(RcFunction, u8), String> {
    let (func, ch) = s
        .split_once('=')
        .ok_or_else(|| format!("expected FUNC=CH, got '{}'", s))?;
    let func: RcFunction = func.trim().parse()?;
    let ch: u8 = ch
        .trim()
        .parse()
        .map_err(|_| format!("invalid channel '{}'", ch))?;
    Ok((func, ch))
}

/// Install the tracing subscriber
///
/// Logs go to stderr; with `logging.file_dir` set, also to a daily rolling
/// file. The returned guard must be held until exit so buffered file output
/// is flushed.
fn init_logging(config: &LoggingConfig) -> Result<Option<WorkerGuard>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let stderr_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);

    match &config.file_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create log directory {}", dir))?;
            let appender = tracing_appender::rolling::daily(dir, "fc-configurator.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            tracing_subscriber::registry()
                .with(filter)
                .with(stderr_layer)
                .with(tracing_subscriber::fmt::layer().with_writer(writer).with_ansi(false))
                .init();
            Ok(Some(guard))
        }
        None => {
            tracing_subscriber::registry().with(filter).with(stderr_layer).init();
            Ok(None)
        }
    }
}

/// Main entry point for FC Configurator
///
/// # Errors
///
/// Returns error if the configuration is invalid, the device cannot be
/// opened, or the requested operation fails.
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => Config::load(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => Config::default(),
    };
    if let Some(port) = cli.port {
        config.serial.port = port;
    }

    let _log_guard = init_logging(&config.logging)?;
    info!("FC Configurator v{} starting...", env!("CARGO_PKG_VERSION"));

    match cli.cmd {
        Cmd::Ports => list_ports(&config),
        Cmd::Pull { out } => pull(&config, out.as_deref()).await,
        Cmd::Push { input } => push(&config, &input).await,
        Cmd::Show { input } => {
            let settings = load_settings(&input)?;
            print_settings(&settings);
            Ok(())
        }
        Cmd::Edit {
            input,
            output,
            rotate,
            bind,
            reverse,
            props,
            receiver,
        } => {
            let mut settings = load_settings(&input)?;
            for rotation in rotate {
                settings.orientation = settings.orientation.apply(rotation);
            }
            for (function, channel) in bind {
                if !settings.rc.set_channel(function, channel) {
                    bail!("Channel {} out of range for {}", channel, function);
                }
            }
            for function in reverse {
                settings.rc.toggle_reverse(function);
            }
            if let Some(props) = props {
                settings.set_prop_rotation(props.into());
            }
            if let Some(receiver) = receiver {
                settings.receiver = receiver.into();
            }
            store::save(&output, &settings::encode(&settings))
                .with_context(|| format!("Failed to write {}", output.display()))?;
            print_settings(&settings);
            info!("Saved settings to {}", output.display());
            Ok(())
        }
        Cmd::Monitor => monitor(&config).await,
        Cmd::Live { record } => live(&config, record || config.telemetry.record).await,
        Cmd::Motors { m1, m2, m3, m4, seconds } => {
            motors(&config, [m1, m2, m3, m4], Duration::from_secs(seconds)).await
        }
        Cmd::Reboot => device_command(&config, LinkSession::reboot).await,
        Cmd::Bootloader => device_command(&config, LinkSession::bootloader).await,
        Cmd::LoadDefaults => device_command(&config, LinkSession::load_defaults).await,
        Cmd::Flash { file, leave } => run_dfu(&config, FlashRequest::Flash { path: file, leave }).await,
        Cmd::DfuList => run_dfu(&config, FlashRequest::List).await,
    }
}

fn list_ports(config: &Config) -> Result<()> {
    let candidates = serial::discover(&config.serial)?;
    if candidates.is_empty() {
        println!("No serial ports found");
    }
    for c in candidates {
        let marker = if c.is_flight_controller { "*" } else { " " };
        println!("{} {:<20} {}", marker, c.path, c.description);
    }
    Ok(())
}

fn connect(config: &Config) -> Result<LinkSession<DeviceSerial>> {
    let serial = DeviceSerial::open(&config.serial).context("Failed to open flight controller")?;
    info!("Connected to {}", serial.device_path());
    let mut session = LinkSession::new(SessionOptions::from_config(config));
    session.open(serial);
    Ok(session)
}

fn load_settings(path: &Path) -> Result<Settings> {
    let blob = store::load(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let settings = settings::decode(&blob)
        .with_context(|| format!("{} does not hold valid settings", path.display()))?;
    Ok(settings)
}

fn exit_message(exit: Exit, session: &LinkSession<DeviceSerial>) -> Option<String> {
    match exit {
        Exit::Stopped => None,
        Exit::Interrupted => Some("Interrupted".to_string()),
        Exit::LinkClosed => Some(session.status().to_string()),
    }
}

async fn pull(config: &Config, out: Option<&Path>) -> Result<()> {
    let mut session = connect(config)?;
    session.pull_settings()?;
    info!("Pulling settings (Ctrl+C to cancel)");

    let exit = link::run(&mut session, &config.link, |_, event| match event {
        SessionEvent::SettingsPulled | SessionEvent::PullFailed(_) => ControlFlow::Break(()),
        _ => ControlFlow::Continue(()),
    })
    .await;

    if session.pull_status() != link::PullStatus::Pulled {
        let reason = exit_message(exit, &session).unwrap_or_else(|| session.status().to_string());
        bail!("Pull failed: {}", reason);
    }

    print_settings(session.settings());
    if let Some(out) = out {
        store::save(out, &settings::encode(session.settings()))
            .with_context(|| format!("Failed to write {}", out.display()))?;
        info!("Saved settings to {}", out.display());
    }
    Ok(())
}

async fn push(config: &Config, input: &Path) -> Result<()> {
    let settings = load_settings(input)?;
    let mut session = connect(config)?;
    *session.settings_mut() = settings;
    session.push_settings()?;
    info!("Pushing settings (Ctrl+C to cancel)");

    let mut result = None;
    let exit = link::run(&mut session, &config.link, |_, event| match event {
        SessionEvent::PushCompleted => {
            result = Some(Ok(()));
            ControlFlow::Break(())
        }
        SessionEvent::PushFailed(msg) => {
            result = Some(Err(msg));
            ControlFlow::Break(())
        }
        _ => ControlFlow::Continue(()),
    })
    .await;

    match result {
        Some(Ok(())) => {
            println!("Settings pushed");
            Ok(())
        }
        Some(Err(msg)) => bail!("Push failed: {}", msg),
        None => bail!(
            "Push failed: {}",
            exit_message(exit, &session).unwrap_or_else(|| session.status().to_string())
        ),
    }
}

fn open_recorder(config: &Config, enabled: bool) -> Result<Option<TelemetryRecorder>> {
    if !enabled {
        return Ok(None);
    }
    Ok(Some(TelemetryRecorder::create(&config.telemetry.log_dir)?))
}

fn finish_recording(recorder: Option<TelemetryRecorder>) {
    if let Some(mut recorder) = recorder {
        match recorder.flush() {
            Ok(()) => info!(
                "Recorded {} samples to {}",
                recorder.records(),
                recorder.path().display()
            ),
            Err(e) => warn!("Failed to flush telemetry recording: {}", e),
        }
    }
}

/// Write out anything still queued before the session is dropped
async fn flush_output(session: &mut LinkSession<DeviceSerial>, config: &Config) {
    if session.pending_output() == 0 {
        return;
    }
    match tokio::time::timeout(OUTPUT_FLUSH_TIMEOUT, link::flush(session, &config.link)).await {
        Ok(true) => {}
        Ok(false) => warn!("Link closed with output pending: {}", session.status()),
        Err(_) => warn!("{} bytes not written to the device", session.pending_output()),
    }
}

/// Leave a streaming mode so the device stops sending
async fn leave_streaming(session: &mut LinkSession<DeviceSerial>, config: &Config) {
    if session.is_open() {
        if let Err(e) = session.set_mode(Mode::Configuration) {
            warn!("Failed to leave {} mode: {}", session.mode(), e);
        }
        flush_output(session, config).await;
    }
}

async fn monitor(config: &Config) -> Result<()> {
    let mut session = connect(config)?;
    session.set_mode(Mode::FlightSetup)?;
    let mut recorder = open_recorder(config, config.telemetry.record)?;
    info!("Monitoring receiver channels (Ctrl+C to stop)");

    let exit = link::run(&mut session, &config.link, |s, event| {
        if let SessionEvent::ChannelsUpdated(channels) = event {
            if let Some(recorder) = recorder.as_mut() {
                if let Err(e) = recorder.record_channels(&channels) {
                    warn!("Failed to record channels: {}", e);
                }
            }
            println!("{}", describe_channels(s.settings(), &channels, config));
        }
        ControlFlow::Continue(())
    })
    .await;

    leave_streaming(&mut session, config).await;
    finish_recording(recorder);
    match exit_message(exit, &session) {
        Some(msg) if exit == Exit::LinkClosed => bail!("{}", msg),
        _ => Ok(()),
    }
}

fn describe_channels(settings: &Settings, channels: &RcChannels, config: &Config) -> String {
    let (low, high) = (config.channels.low_threshold, config.channels.high_threshold);
    RcFunction::ALL
        .iter()
        .map(|&function| match settings.rc.resolve(channels, function) {
            None => format!("{}=off", function),
            Some(value) if function == RcFunction::Arm => {
                let state = if is_armed(value, high) { "armed" } else { "disarmed" };
                format!("{}={}({})", function, value, state)
            }
            Some(value) => format!("{}={}({:?})", function, value, classify(value, low, high)),
        })
        .collect::<Vec<_>>()
        .join(" ")
}

async fn live(config: &Config, record: bool) -> Result<()> {
    let mut session = connect(config)?;
    session.set_mode(Mode::LivePlots)?;
    let mut recorder = open_recorder(config, record)?;
    info!("Streaming live sensor data (Ctrl+C to stop)");

    let mut count: u64 = 0;
    let exit = link::run(&mut session, &config.link, |_, event| {
        if let SessionEvent::LiveSample(vector) = event {
            let sample = LiveSample::from(vector);
            if let Some(recorder) = recorder.as_mut() {
                if let Err(e) = recorder.record_live(&sample) {
                    warn!("Failed to record sample: {}", e);
                }
            }
            if count % LIVE_PRINT_EVERY == 0 {
                println!(
                    "acc {:8.1} {:8.1} {:8.1}  gyro {:8.1} {:8.1} {:8.1}  angle {:7.1} {:7.1} {:7.1}",
                    sample.accel[0], sample.accel[1], sample.accel[2],
                    sample.gyro[0], sample.gyro[1], sample.gyro[2],
                    sample.angle[0], sample.angle[1], sample.angle[2],
                );
            }
            count += 1;
        }
        ControlFlow::Continue(())
    })
    .await;

    info!(
        "Received {} samples, {} kept for plotting",
        count,
        session.history().len()
    );
    leave_streaming(&mut session, config).await;
    finish_recording(recorder);
    match exit_message(exit, &session) {
        Some(msg) if exit == Exit::LinkClosed => bail!("{}", msg),
        _ => Ok(()),
    }
}

async fn motors(config: &Config, values: [u16; 4], duration: Duration) -> Result<()> {
    let mut session = connect(config)?;
    session.set_mode(Mode::MotorTest)?;
    session.set_motor_values(values);
    info!("Motor test {:?} for {:?} (Ctrl+C to stop)", values, duration);

    let mut lines: u64 = 0;
    let finished = tokio::time::timeout(
        duration,
        link::run(&mut session, &config.link, |_, event| {
            if let SessionEvent::MotorsWritten(_) = event {
                lines += 1;
            }
            ControlFlow::Continue(())
        }),
    )
    .await;

    // The zero line goes out on the next receipt
    session.set_motor_values([0; 4]);
    if session.is_open() {
        let _ = tokio::time::timeout(
            MOTOR_STOP_TIMEOUT,
            link::run(&mut session, &config.link, |_, event| match event {
                SessionEvent::MotorsWritten(v) if v == [0; 4] => ControlFlow::Break(()),
                _ => ControlFlow::Continue(()),
            }),
        )
        .await;
    }
    leave_streaming(&mut session, config).await;
    info!("Motor test finished after {} motor lines", lines);

    match finished {
        Ok(Exit::LinkClosed) => bail!("{}", session.status()),
        _ => Ok(()),
    }
}

async fn device_command(
    config: &Config,
    command: fn(&mut LinkSession<DeviceSerial>) -> fc_configurator::error::Result<()>,
) -> Result<()> {
    let mut session = connect(config)?;
    command(&mut session)?;
    flush_output(&mut session, config).await;
    println!("{}", session.status());
    Ok(())
}

async fn run_dfu(config: &Config, request: FlashRequest) -> Result<()> {
    let mut progress_shown = false;
    let code = firmware::flash(&config.firmware, &request, |output| match output {
        FlashOutput::Line(text) => {
            if progress_shown {
                println!();
                progress_shown = false;
            }
            println!("{}", text);
        }
        FlashOutput::Progress(text) => {
            print!("\r{}", text);
            let _ = std::io::stdout().flush();
            progress_shown = true;
        }
    })
    .await?;

    if progress_shown {
        println!();
    }
    println!("Return Code: {}", code);
    if code != 0 {
        bail!("dfu-util failed with exit code {}", code);
    }
    Ok(())
}

fn print_settings(settings: &Settings) {
    let gains = |name: &str, g: &PidGains| {
        println!(
            "{:<8} roll {:?}  nick {:?}  yaw {:?}",
            name,
            [g.roll.kp, g.roll.ki, g.roll.kd],
            [g.nick.kp, g.nick.ki, g.nick.kd],
            [g.yaw.kp, g.yaw.ki, g.yaw.kd],
        )
    };
    gains("PID", &settings.pid);
    gains("PID low", &settings.pid_low);
    println!("Rates    {:?}", settings.rate);

    for (i, motor) in settings.motors.iter().enumerate() {
        let dir = if motor.direction == CW { "CW" } else { "CCW" };
        println!("Motor {}  timer channel {}  {}", i + 1, motor.timer_channel, dir);
    }
    println!("Props    {:?}", settings.prop_rotation());

    // Decoded blobs are not range checked
    if settings.orientation.is_valid() {
        for view in settings.orientation.decompose() {
            println!(
                "Vehicle {} -> sensor {:?}{} ({})",
                view.vehicle.label(),
                view.sensor,
                if view.positive { "+" } else { "-" },
                view.direction
            );
        }
    } else {
        println!("Orient.  invalid matrix {:?}", settings.orientation.rows());
    }
    println!("Aspect   {}", settings.aspect_ratio);

    for function in RcFunction::ALL {
        let binding = settings.rc.binding(function);
        if binding.channel == CHANNEL_UNBOUND {
            println!("RC {:<8} unbound", function);
        } else {
            let rev = if binding.reversed { " reversed" } else { "" };
            println!("RC {:<8} channel {}{}", function, binding.channel, rev);
        }
    }
    println!("Receiver {:?}", settings.receiver);
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_binding() {
        assert_eq!(parse_binding("arm=5").unwrap(), (RcFunction::Arm, 5));
        assert_eq!(parse_binding(" thrust = 1 ").unwrap(), (RcFunction::Thrust, 1));
        assert!(parse_binding("arm").is_err());
        assert!(parse_binding("arm=x").is_err());
        assert!(parse_binding("nothing=3").is_err());
    }

    #[test]
    fn test_parse_edit_command() {
        let cli = Cli::try_parse_from([
            "fc-configurator",
            "edit",
            "--input",
            "a.bin",
            "--output",
            "b.bin",
            "--rotate",
            "z+",
            "--rotate",
            "x-",
            "--bind",
            "aux1=9",
            "--reverse",
            "roll",
            "--props",
            "reversed",
        ])
        .unwrap();
        match cli.cmd {
            Cmd::Edit { rotate, bind, reverse, props, .. } => {
                assert_eq!(rotate.len(), 2);
                assert_eq!(bind, vec![(RcFunction::Aux1, 9)]);
                assert_eq!(reverse, vec![RcFunction::Roll]);
                assert!(matches!(props, Some(PropsArg::Reversed)));
            }
            other => panic!("Expected edit, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_motors_command() {
        let cli = Cli::try_parse_from(["fc-configurator", "--port", "/dev/ttyACM1", "motors", "1", "2", "3", "4"])
            .unwrap();
        assert_eq!(cli.port.as_deref(), Some("/dev/ttyACM1"));
        match cli.cmd {
            Cmd::Motors { m1, m4, seconds, .. } => {
                assert_eq!((m1, m4, seconds), (1, 4, 3));
            }
            other => panic!("Expected motors, got {:?}", other),
        }
    }

    #[test]
    fn test_describe_channels() {
        let settings = Settings::default();
        let config = Config::default();
        let mut channels = [1500u16; 12];
        let arm = settings.rc.binding(RcFunction::Arm).channel as usize;
        channels[arm - 1] = 2800;
        let text = describe_channels(&settings, &channels, &config);
        assert!(text.contains("armed"));
        assert!(!text.contains("disarmed"));
    }
}
