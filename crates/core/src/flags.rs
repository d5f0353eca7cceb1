//! Option words passed to serialization and setter calls

use bitflags::bitflags;
use dssobj_sdk::{json_bits, setter_bits};

bitflags! {
    /// Options for `to_json` on objects and batches
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct JsonFlags: u32 {
        /// Emit all properties, not only the explicitly set ones
        const FULL = json_bits::FULL;
        /// With `FULL`, omit redundant properties
        const SKIP_REDUNDANT = json_bits::SKIP_REDUNDANT;
        /// Enumerations as integers
        const ENUM_AS_INT = json_bits::ENUM_AS_INT;
        /// Qualify object references as `Class.Name`
        const FULL_NAMES = json_bits::FULL_NAMES;
        /// Human-readable output
        const PRETTY = json_bits::PRETTY;
        /// Batches only: skip disabled objects
        const EXCLUDE_DISABLED = json_bits::EXCLUDE_DISABLED;
        /// Omit the class tag
        const SKIP_CLASS_TAG = json_bits::SKIP_CLASS_TAG;
    }
}

bitflags! {
    /// Modifiers for property writes
    ///
    /// The whole word is forwarded to the engine unchanged.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct SetterFlags: u32 {
        /// Let array properties resize the properties they depend on
        const IMPLICIT_SIZES = setter_bits::IMPLICIT_SIZES;
        /// Skip the full recalculation a write would normally trigger
        const AVOID_FULL_RECALC = setter_bits::AVOID_FULL_RECALC;
        /// Do not wrap the write in an implicit edit session
        const NO_IMPLICIT_EDIT = setter_bits::NO_IMPLICIT_EDIT;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flag_bits_match_engine() {
        assert_eq!(JsonFlags::FULL.bits(), 0x01);
        assert_eq!(JsonFlags::SKIP_CLASS_TAG.bits(), 0x40);
        assert_eq!(JsonFlags::all().bits(), 0x7F);
        assert_eq!(
            (SetterFlags::IMPLICIT_SIZES | SetterFlags::AVOID_FULL_RECALC).bits(),
            0x03
        );
    }

    #[test]
    fn test_unknown_bits_are_dropped() {
        assert_eq!(SetterFlags::from_bits_truncate(0xFF), SetterFlags::all());
    }
}
