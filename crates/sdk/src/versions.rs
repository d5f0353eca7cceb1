//! ABI version and raw flag bits
//!
//! These values must match exactly what the engine header declares.

/// Function table ABI version requested from the engine
pub const FUNCTION_TABLE_VERSION: u32 = 1;

/// Symbol name of the table entry point in the engine library
pub const GET_FUNCTION_TABLE: &[u8] = b"DSS_GetFunctionTable\0";

/// Raw bits for the `options` word of `to_json`/`batch_to_json`
pub mod json_bits {
    /// Emit all properties ordered by index, not only the explicitly set ones
    pub const FULL: u32 = 0x01;
    /// With `FULL`, omit redundant/unused properties
    pub const SKIP_REDUNDANT: u32 = 0x02;
    /// Emit enumerations as integers instead of names
    pub const ENUM_AS_INT: u32 = 0x04;
    /// Always qualify object references as `Class.Name`
    pub const FULL_NAMES: u32 = 0x08;
    /// Human-readable whitespace
    pub const PRETTY: u32 = 0x10;
    /// Batch serialization only: skip disabled objects
    pub const EXCLUDE_DISABLED: u32 = 0x20;
    /// Omit the class-identifying field
    pub const SKIP_CLASS_TAG: u32 = 0x40;
}

/// Raw bits for the `flags` word of every setter
pub mod setter_bits {
    /// Let array properties define the size of the properties they depend on
    pub const IMPLICIT_SIZES: u32 = 0x01;
    /// Skip the full recalculation a write would normally trigger
    pub const AVOID_FULL_RECALC: u32 = 0x02;
    /// Host-side: do not wrap the write in an implicit edit session
    pub const NO_IMPLICIT_EDIT: u32 = 0x04;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_symbol_is_null_terminated() {
        assert_eq!(GET_FUNCTION_TABLE.last(), Some(&0));
    }

    #[test]
    fn test_json_bits_are_distinct() {
        let all = [
            json_bits::FULL,
            json_bits::SKIP_REDUNDANT,
            json_bits::ENUM_AS_INT,
            json_bits::FULL_NAMES,
            json_bits::PRETTY,
            json_bits::EXCLUDE_DISABLED,
            json_bits::SKIP_CLASS_TAG,
        ];
        let combined = all.iter().fold(0u32, |acc, b| {
            assert_eq!(acc & b, 0);
            acc | b
        });
        assert_eq!(combined, 0x7F);
    }
}
