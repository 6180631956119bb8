//! # Settings File Store
//!
//! Byte-exact persistence of a settings blob. The file holds the raw 1024
//! bytes, nothing else.

use std::fs;
use std::path::Path;

use tracing::info;

use super::layout::{SettingsBlob, SETTINGS_BLOB_LEN};
use crate::error::{ConfiguratorError, Result};

/// Write a blob to `path`, replacing any existing file.
///
/// # Errors
///
/// Returns error if the file cannot be written
pub fn save<P: AsRef<Path>>(path: P, blob: &SettingsBlob) -> Result<()> {
    fs::write(path.as_ref(), blob)?;
    info!("Saved settings blob to {}", path.as_ref().display());
    Ok(())
}

/// Read a blob from `path`.
///
/// # Errors
///
/// Returns error if:
/// - The file cannot be read
/// - The file is not exactly 1024 bytes long
pub fn load<P: AsRef<Path>>(path: P) -> Result<SettingsBlob> {
    let bytes = fs::read(path.as_ref())?;
    let actual = bytes.len();
    let blob: SettingsBlob = bytes.try_into().map_err(|_| ConfiguratorError::BlobLength {
        expected: SETTINGS_BLOB_LEN,
        actual,
    })?;
    Ok(blob)
}
