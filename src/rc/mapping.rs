//! # RC Mapping Table
//!
//! Bidirectional association between logical RC functions and physical
//! receiver channels, with per-channel reversal.
//!
//! ## Reversal
//!
//! The reversal flag is stored per function for convenience, but it belongs to
//! the physical channel. Every function bound to the same channel always
//! carries the same flag.
//!
//! ## Usage
//!
//! ```
//! use fc_configurator::rc::{RcFunction, RcMapping};
//!
//! let mut map = RcMapping::default();
//! map.set_channel(RcFunction::Arm, 5);
//! map.set_channel(RcFunction::Beep, 5);
//! map.toggle_reverse(RcFunction::Arm);
//!
//! assert!(map.binding(RcFunction::Beep).reversed);
//! ```

use std::fmt;
use std::str::FromStr;

use tracing::{debug, warn};

use super::{RcChannels, CHANNEL_MAX, CHANNEL_UNBOUND, RC_SLOTS};

/// Logical RC function. The discriminant is the slot index in the table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RcFunction {
    Thrust = 1,
    Roll = 2,
    Nick = 3,
    Yaw = 4,
    Arm = 5,
    Mode = 6,
    Beep = 7,
    Prog = 8,
    Var = 9,
    Aux1 = 10,
    Aux2 = 11,
    Aux3 = 12,
}

impl RcFunction {
    /// All functions in slot order.
    pub const ALL: [RcFunction; 12] = [
        RcFunction::Thrust,
        RcFunction::Roll,
        RcFunction::Nick,
        RcFunction::Yaw,
        RcFunction::Arm,
        RcFunction::Mode,
        RcFunction::Beep,
        RcFunction::Prog,
        RcFunction::Var,
        RcFunction::Aux1,
        RcFunction::Aux2,
        RcFunction::Aux3,
    ];

    /// Slot index in the mapping table (1-12).
    #[must_use]
    pub fn slot(self) -> usize {
        self as usize
    }

    /// Lowercase name used on the command line.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            RcFunction::Thrust => "thrust",
            RcFunction::Roll => "roll",
            RcFunction::Nick => "nick",
            RcFunction::Yaw => "yaw",
            RcFunction::Arm => "arm",
            RcFunction::Mode => "mode",
            RcFunction::Beep => "beep",
            RcFunction::Prog => "prog",
            RcFunction::Var => "var",
            RcFunction::Aux1 => "aux1",
            RcFunction::Aux2 => "aux2",
            RcFunction::Aux3 => "aux3",
        }
    }
}

impl fmt::Display for RcFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.name())
    }
}

impl FromStr for RcFunction {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let lower = s.trim().to_ascii_lowercase();
        match lower.as_str() {
            "pitch" => return Ok(RcFunction::Nick),
            "gier" => return Ok(RcFunction::Yaw),
            _ => {}
        }
        RcFunction::ALL
            .into_iter()
            .find(|f| f.name() == lower)
            .ok_or_else(|| format!("unknown RC function '{}'", s))
    }
}

/// One slot of the mapping table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RcBinding {
    /// Physical channel number (1-12), 0 when unbound
    pub channel: u8,
    /// Whether the bound physical channel is reversed
    pub reversed: bool,
}

/// Function-to-channel table, 13 slots with slot 0 reserved.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RcMapping {
    slots: [RcBinding; RC_SLOTS],
}

impl RcMapping {
    /// Conventional assignment: function N on channel N, nothing reversed.
    #[must_use]
    pub fn conventional() -> Self {
        let mut map = Self::default();
        for function in RcFunction::ALL {
            map.slots[function.slot()].channel = function.slot() as u8;
        }
        map
    }

    /// Rebuilds a table from raw slots (settings blob order).
    #[must_use]
    pub fn from_slots(slots: [RcBinding; RC_SLOTS]) -> Self {
        Self { slots }
    }

    /// Raw slots in settings blob order.
    #[must_use]
    pub fn slots(&self) -> &[RcBinding; RC_SLOTS] {
        &self.slots
    }

    /// Current binding of a function.
    #[must_use]
    pub fn binding(&self, function: RcFunction) -> RcBinding {
        self.slots[function.slot()]
    }

    /// Functions currently bound to a physical channel.
    pub fn functions_on(&self, channel: u8) -> impl Iterator<Item = RcFunction> + '_ {
        RcFunction::ALL
            .into_iter()
            .filter(move |f| self.slots[f.slot()].channel == channel)
    }

    /// Rebinds a function to a physical channel.
    ///
    /// The function adopts the reversal flag already carried by the channel,
    /// i.e. by any other function bound to it. A channel nobody else uses is
    /// not reversed.
    ///
    /// # Arguments
    ///
    /// * `function` - Function to rebind
    /// * `channel` - Physical channel number (0-12, 0 = unbind)
    ///
    /// # Returns
    ///
    /// `false` if the channel number is out of range (table left unchanged)
    pub fn set_channel(&mut self, function: RcFunction, channel: u8) -> bool {
        if channel > CHANNEL_MAX {
            warn!("Ignoring channel {} for {}: must be 0-{}", channel, function, CHANNEL_MAX);
            return false;
        }

        let slot = function.slot();
        let reversed = self
            .slots
            .iter()
            .enumerate()
            .find(|&(i, b)| i != slot && b.channel == channel)
            .map(|(_, b)| b.reversed)
            .unwrap_or(false);

        self.slots[slot] = RcBinding { channel, reversed };
        debug!("RC {} -> channel {} (reversed: {})", function, channel, reversed);
        true
    }

    /// Flips the reversal of the function's bound channel.
    ///
    /// The new flag is copied to every slot bound to the same channel number.
    /// An unbound function has no channel to reverse and is left unchanged.
    ///
    /// # Returns
    ///
    /// The new reversal flag
    pub fn toggle_reverse(&mut self, function: RcFunction) -> bool {
        let binding = self.slots[function.slot()];
        if binding.channel == CHANNEL_UNBOUND {
            warn!("Ignoring reverse for {}: not bound to a channel", function);
            return binding.reversed;
        }
        let reversed = !binding.reversed;

        for slot in self.slots.iter_mut() {
            if slot.channel == binding.channel {
                slot.reversed = reversed;
            }
        }

        debug!("RC channel {} reversed: {}", binding.channel, reversed);
        reversed
    }

    /// Looks up the raw value of the channel bound to `function`.
    ///
    /// # Arguments
    ///
    /// * `channels` - Latest receiver channel vector
    /// * `function` - Function to resolve
    ///
    /// # Returns
    ///
    /// The raw channel value, or `None` when the function is unbound
    #[must_use]
    pub fn resolve(&self, channels: &RcChannels, function: RcFunction) -> Option<u16> {
        match self.slots[function.slot()].channel {
            CHANNEL_UNBOUND => None,
            ch => channels.get(usize::from(ch) - 1).copied(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_channel_flags_consistent(map: &RcMapping) {
        for a in map.slots() {
            for b in map.slots() {
                if a.channel == b.channel {
                    assert_eq!(a.reversed, b.reversed, "slots on channel {} disagree", a.channel);
                }
            }
        }
    }

    #[test]
    fn test_default_is_unbound() {
        let map = RcMapping::default();
        for f in RcFunction::ALL {
            assert_eq!(map.binding(f), RcBinding::default());
        }
    }

    #[test]
    fn test_conventional_assignment() {
        let map = RcMapping::conventional();
        assert_eq!(map.binding(RcFunction::Thrust).channel, 1);
        assert_eq!(map.binding(RcFunction::Aux3).channel, 12);
        assert_eq!(map.slots()[0].channel, CHANNEL_UNBOUND);
    }

    #[test]
    fn test_set_channel_adopts_channel_reversal() {
        let mut map = RcMapping::conventional();
        map.toggle_reverse(RcFunction::Roll); // channel 2 reversed

        map.set_channel(RcFunction::Aux1, 2);
        assert!(map.binding(RcFunction::Aux1).reversed);

        map.set_channel(RcFunction::Aux1, 10);
        assert!(!map.binding(RcFunction::Aux1).reversed);
        assert_channel_flags_consistent(&map);
    }

    #[test]
    fn test_set_channel_empty_channel_not_reversed() {
        let mut map = RcMapping::conventional();
        map.toggle_reverse(RcFunction::Mode);
        assert!(map.binding(RcFunction::Mode).reversed);

        // Move to a channel nobody else is on
        map.set_channel(RcFunction::Aux3, 0);
        map.set_channel(RcFunction::Mode, 12);
        assert!(!map.binding(RcFunction::Mode).reversed);
    }

    #[test]
    fn test_set_channel_out_of_range() {
        let mut map = RcMapping::conventional();
        assert!(!map.set_channel(RcFunction::Arm, 13));
        assert_eq!(map.binding(RcFunction::Arm).channel, 5);
    }

    #[test]
    fn test_toggle_reverse_propagates_to_shared_channel() {
        let mut map = RcMapping::conventional();
        map.set_channel(RcFunction::Beep, 5);
        map.set_channel(RcFunction::Prog, 5);

        assert!(map.toggle_reverse(RcFunction::Beep));
        for f in [RcFunction::Arm, RcFunction::Beep, RcFunction::Prog] {
            assert!(map.binding(f).reversed, "{} should be reversed", f);
        }
        assert!(!map.binding(RcFunction::Mode).reversed);

        assert!(!map.toggle_reverse(RcFunction::Arm));
        assert_eq!(map.functions_on(5).filter(|&f| map.binding(f).reversed).count(), 0);
    }

    #[test]
    fn test_toggle_reverse_unbound_is_ignored() {
        let mut map = RcMapping::conventional();
        map.set_channel(RcFunction::Beep, CHANNEL_UNBOUND);
        map.set_channel(RcFunction::Prog, CHANNEL_UNBOUND);

        assert!(!map.toggle_reverse(RcFunction::Beep));
        assert_eq!(map.slots()[0], RcBinding::default());
        assert!(!map.binding(RcFunction::Beep).reversed);
        assert!(!map.binding(RcFunction::Prog).reversed);
        assert!(map.slots().iter().all(|b| !b.reversed));
    }

    #[test]
    fn test_toggle_reverse_every_function_keeps_invariant() {
        let mut map = RcMapping::conventional();
        map.set_channel(RcFunction::Var, 3);
        map.set_channel(RcFunction::Aux2, 3);
        map.set_channel(RcFunction::Aux3, 1);

        for f in RcFunction::ALL {
            map.toggle_reverse(f);
            assert_channel_flags_consistent(&map);
        }
    }

    #[test]
    fn test_resolve() {
        let mut channels = [1500u16; 12];
        channels[0] = 1000;
        channels[11] = 2000;

        let mut map = RcMapping::conventional();
        assert_eq!(map.resolve(&channels, RcFunction::Thrust), Some(1000));
        assert_eq!(map.resolve(&channels, RcFunction::Aux3), Some(2000));

        map.set_channel(RcFunction::Arm, 12);
        assert_eq!(map.resolve(&channels, RcFunction::Arm), Some(2000));

        map.set_channel(RcFunction::Arm, CHANNEL_UNBOUND);
        assert_eq!(map.resolve(&channels, RcFunction::Arm), None);
    }

    #[test]
    fn test_functions_on() {
        let mut map = RcMapping::conventional();
        map.set_channel(RcFunction::Aux1, 4);
        let on_four: Vec<_> = map.functions_on(4).collect();
        assert_eq!(on_four, vec![RcFunction::Yaw, RcFunction::Aux1]);
    }

    #[test]
    fn test_parse_function_names() {
        assert_eq!("thrust".parse::<RcFunction>().unwrap(), RcFunction::Thrust);
        assert_eq!("PITCH".parse::<RcFunction>().unwrap(), RcFunction::Nick);
        assert_eq!("gier".parse::<RcFunction>().unwrap(), RcFunction::Yaw);
        assert_eq!("aux3".parse::<RcFunction>().unwrap(), RcFunction::Aux3);
        assert!("throttle".parse::<RcFunction>().is_err());
    }

    #[test]
    fn test_slot_indices() {
        for (i, f) in RcFunction::ALL.iter().enumerate() {
            assert_eq!(f.slot(), i + 1);
        }
    }
}
