//! Native engine type definitions
//!
//! These are opaque types representing objects owned by the native engine.
//! We don't need their internal structure - just pointers. Every pointer is
//! handed back through the function table, never dereferenced on this side.

use std::ffi::{c_char, c_void};

/// Opaque type for a native engine context
///
/// Each context owns its own object tables and its own error slot.
#[repr(C)]
pub struct DssContextRaw {
    _opaque: [u8; 0],
}

/// Opaque type for a native engine object (circuit element, shape, code, ...)
#[repr(C)]
pub struct DssObjectRaw {
    _opaque: [u8; 0],
}

/// Raw context pointer as passed across the boundary
pub type ContextPtr = *mut DssContextRaw;

/// Raw object pointer as passed across the boundary
pub type ObjectPtr = *mut DssObjectRaw;

/// Entry point that hands over the engine's function table
///
/// This is the single symbol a host needs to resolve from the engine library.
///
/// # Returns
/// Pointer to a static function table, or null if the engine refuses the
/// requested ABI version.
pub type GetFunctionTableFn = unsafe extern "C" fn(version: u32) -> *const c_void;

/// Engine-side boolean (`0` = false, anything else = true)
pub type NativeBool = u16;

/// Convert a Rust bool to the engine's boolean representation
#[inline]
pub const fn native_bool(value: bool) -> NativeBool {
    if value {
        1
    } else {
        0
    }
}

/// Raw C string as returned by the engine
pub type RawStr = *mut c_char;
