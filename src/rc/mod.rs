//! # RC Module
//!
//! Receiver channel definitions and the function-to-channel mapping table.
//!
//! The receiver delivers 12 raw channels. Twelve logical functions (thrust,
//! roll, ...) are each bound to one physical channel, numbered 1-12; channel
//! number 0 means "unbound". Reversal is a property of the physical channel
//! and is mirrored onto every function bound to it.

pub mod mapping;

pub use mapping::{RcBinding, RcFunction, RcMapping};

/// Number of physical receiver channels reported by the device
pub const NUM_RC_CHANNELS: usize = 12;

/// Number of binding slots in the settings blob (slot 0 is reserved)
pub const RC_SLOTS: usize = 13;

/// Channel number meaning "not bound to any physical channel"
pub const CHANNEL_UNBOUND: u8 = 0;

/// Highest valid physical channel number
pub const CHANNEL_MAX: u8 = NUM_RC_CHANNELS as u8;

/// Raw receiver channel vector (pulse widths as reported by the device)
pub type RcChannels = [u16; NUM_RC_CHANNELS];
