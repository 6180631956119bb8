//! # FC Configurator Library
//!
//! Configure and operate a small quadcopter flight controller over its USB
//! serial link.
//!
//! This library provides the settings blob codec, the sensor orientation
//! algebra, the RC function mapping, the link session state machine that
//! sequences every exchange with the device, and the telemetry decoder.

pub mod config;
pub mod error;
pub mod firmware;
pub mod link;
pub mod orientation;
pub mod rc;
pub mod serial;
pub mod settings;
pub mod telemetry;
