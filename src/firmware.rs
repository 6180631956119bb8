//! # Firmware Flashing
//!
//! Thin wrapper around `dfu-util`. The flight controller must already be in
//! its DFU bootloader (see the `bootloader` device command).
//!
//! dfu-util draws its progress bar by rewriting one line with `'\r'`; those
//! updates are reported as [`FlashOutput::Progress`] so a front end can
//! overwrite instead of append.

use std::path::PathBuf;
use std::process::Stdio;

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::config::FirmwareConfig;
use crate::error::{ConfiguratorError, Result};

/// What to ask dfu-util for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlashRequest {
    /// Download a binary to flash; `leave` restarts into the new firmware
    Flash { path: PathBuf, leave: bool },
    /// List attached DFU devices
    List,
}

/// One piece of dfu-util output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlashOutput {
    /// A complete line
    Line(String),
    /// A progress update replacing the previous one
    Progress(String),
}

/// Check the request before anything is started
///
/// # Errors
///
/// `Firmware` if no file was given or the file does not exist
pub fn check_request(request: &FlashRequest) -> Result<()> {
    if let FlashRequest::Flash { path, .. } = request {
        if path.as_os_str().is_empty() {
            return Err(ConfiguratorError::Firmware("No file selected...".to_string()));
        }
        if !path.exists() {
            return Err(ConfiguratorError::Firmware(format!(
                "'{}' does not exist...",
                path.display()
            )));
        }
    }
    Ok(())
}

/// Command line arguments for dfu-util
///
/// # Examples
///
/// ```
/// use std::path::PathBuf;
/// use fc_configurator::config::FirmwareConfig;
/// use fc_configurator::firmware::{dfu_args, FlashRequest};
///
/// let request = FlashRequest::Flash { path: PathBuf::from("fc.bin"), leave: true };
/// assert_eq!(
///     dfu_args(&FirmwareConfig::default(), &request),
///     ["-s", "0x08004000:leave", "-D", "fc.bin"]
/// );
/// ```
pub fn dfu_args(config: &FirmwareConfig, request: &FlashRequest) -> Vec<String> {
    match request {
        FlashRequest::Flash { path, leave } => {
            let address = if *leave {
                format!("{}:leave", config.flash_address)
            } else {
                config.flash_address.clone()
            };
            vec![
                "-s".to_string(),
                address,
                "-D".to_string(),
                path.display().to_string(),
            ]
        }
        FlashRequest::List => vec!["-l".to_string()],
    }
}

/// Run dfu-util and stream its output
///
/// # Arguments
///
/// * `config` - dfu-util location and flash address
/// * `request` - Flash a file or list devices
/// * `on_output` - Receives stdout as it arrives, then any stderr lines
///
/// # Returns
///
/// * `Result<i32>` - dfu-util's exit code (-1 if killed by a signal)
///
/// # Errors
///
/// Returns error if:
/// - The request is invalid (see [`check_request`])
/// - dfu-util cannot be started
/// - Reading its output fails
pub async fn flash<F>(config: &FirmwareConfig, request: &FlashRequest, mut on_output: F) -> Result<i32>
where
    F: FnMut(FlashOutput),
{
    check_request(request)?;

    let args = dfu_args(config, request);
    info!("Running {} {}", config.dfu_util, args.join(" "));

    let mut child = Command::new(&config.dfu_util)
        .args(&args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| {
            ConfiguratorError::Firmware(format!(
                "{} cannot be found or started: {}. Install dfu-util or set firmware.dfu_util",
                config.dfu_util, e
            ))
        })?;

    let stderr_task = child.stderr.take().map(|mut stderr| {
        tokio::spawn(async move {
            let mut text = String::new();
            stderr.read_to_string(&mut text).await.map(|_| text)
        })
    });

    if let Some(stdout) = child.stdout.take() {
        stream_output(stdout, &mut on_output).await?;
    }

    if let Some(task) = stderr_task {
        match task.await {
            Ok(Ok(text)) => {
                for line in text.lines().filter(|l| !l.trim().is_empty()) {
                    on_output(FlashOutput::Line(line.to_string()));
                }
            }
            Ok(Err(e)) => warn!("Failed to read dfu-util stderr: {}", e),
            Err(e) => warn!("dfu-util stderr reader failed: {}", e),
        }
    }

    let status = child.wait().await?;
    let code = status.code().unwrap_or(-1);
    debug!("dfu-util exited with {}", code);
    Ok(code)
}

/// Split a byte stream into lines and `'\r'` progress updates
///
/// `"\r\n"` ends a normal line. Text left without a terminator at end of
/// stream is reported as a line.
///
/// # Errors
///
/// Returns the underlying read error
pub async fn stream_output<R, F>(mut reader: R, on_output: &mut F) -> std::io::Result<()>
where
    R: AsyncRead + Unpin,
    F: FnMut(FlashOutput),
{
    let mut pending: Vec<u8> = Vec::new();
    let mut buf = [0u8; 512];

    loop {
        let n = reader.read(&mut buf).await?;
        let eof = n == 0;
        pending.extend_from_slice(&buf[..n]);

        let mut start = 0;
        while let Some(offset) = pending[start..].iter().position(|&b| b == b'\n' || b == b'\r') {
            let end = start + offset;
            let text = String::from_utf8_lossy(&pending[start..end]).trim_end().to_string();

            if pending[end] == b'\n' {
                emit(on_output, FlashOutput::Line(text));
                start = end + 1;
            } else if end + 1 < pending.len() {
                if pending[end + 1] == b'\n' {
                    emit(on_output, FlashOutput::Line(text));
                    start = end + 2;
                } else {
                    emit(on_output, FlashOutput::Progress(text));
                    start = end + 1;
                }
            } else if eof {
                emit(on_output, FlashOutput::Progress(text));
                start = end + 1;
            } else {
                // Wait for the next byte to tell "\r" from "\r\n"
                break;
            }
        }
        pending.drain(..start);

        if eof {
            if !pending.is_empty() {
                let text = String::from_utf8_lossy(&pending).trim_end().to_string();
                emit(on_output, FlashOutput::Line(text));
            }
            return Ok(());
        }
    }
}

fn emit<F: FnMut(FlashOutput)>(on_output: &mut F, output: FlashOutput) {
    let text = match &output {
        FlashOutput::Line(t) | FlashOutput::Progress(t) => t,
    };
    if !text.is_empty() {
        on_output(output);
    }
}
