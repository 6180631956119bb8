//! # Telemetry Module
//!
//! Decoding and handling of the ASCII telemetry the device streams.
//!
//! This module handles:
//! - Parsing channel monitor and live sensor lines
//! - Classifying channel values for display
//! - Keeping a bounded live-plot history
//! - Recording telemetry to JSONL files

pub mod decoder;
pub mod plot;
pub mod recorder;

pub use decoder::{classify, is_armed, parse_channels, parse_live, Level, LiveSample, LiveVector};
pub use plot::PlotHistory;
pub use recorder::TelemetryRecorder;
