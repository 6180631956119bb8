//! # Telemetry Recorder
//!
//! Writes decoded live samples and channel vectors to a JSONL file, one
//! record per line, each stamped with an RFC 3339 timestamp.
//!
//! ```text
//! {"timestamp":"2024-05-01T12:00:00.120+02:00","kind":"live","live":{"accel":[..],"gyro":[..],"angle":[..]}}
//! {"timestamp":"2024-05-01T12:00:00.220+02:00","kind":"channels","channels":[1000,1500,..]}
//! ```

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::Local;
use serde::Serialize;
use tracing::info;

use super::decoder::LiveSample;
use crate::error::{ConfiguratorError, Result};
use crate::rc::RcChannels;

#[derive(Debug, Serialize)]
struct Record<'a> {
    timestamp: String,
    kind: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    live: Option<&'a LiveSample>,
    #[serde(skip_serializing_if = "Option::is_none")]
    channels: Option<&'a RcChannels>,
}

/// JSONL telemetry writer.
#[derive(Debug)]
pub struct TelemetryRecorder {
    writer: BufWriter<File>,
    path: PathBuf,
    records: u64,
}

impl TelemetryRecorder {
    /// Creates a new recording file inside `dir`.
    ///
    /// The directory is created if needed; the file is named after the
    /// current local time.
    ///
    /// # Errors
    ///
    /// Returns error if the directory or file cannot be created
    pub fn create<P: AsRef<Path>>(dir: P) -> Result<Self> {
        fs::create_dir_all(dir.as_ref())?;
        let name = format!("telemetry_{}.jsonl", Local::now().format("%Y%m%d_%H%M%S"));
        let path = dir.as_ref().join(name);
        let file = File::create(&path)?;
        info!("Recording telemetry to {}", path.display());

        Ok(Self {
            writer: BufWriter::new(file),
            path,
            records: 0,
        })
    }

    /// Appends a live sample.
    pub fn record_live(&mut self, sample: &LiveSample) -> Result<()> {
        self.write(Record {
            timestamp: Local::now().to_rfc3339(),
            kind: "live",
            live: Some(sample),
            channels: None,
        })
    }

    /// Appends a channel vector.
    pub fn record_channels(&mut self, channels: &RcChannels) -> Result<()> {
        self.write(Record {
            timestamp: Local::now().to_rfc3339(),
            kind: "channels",
            live: None,
            channels: Some(channels),
        })
    }

    /// Flushes buffered records to disk.
    pub fn flush(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[must_use]
    pub fn records(&self) -> u64 {
        self.records
    }

    fn write(&mut self, record: Record<'_>) -> Result<()> {
        let line = serde_json::to_string(&record)
            .map_err(|e| ConfiguratorError::Io(e.into()))?;
        writeln!(self.writer, "{}", line)?;
        self.records += 1;
        Ok(())
    }
}
