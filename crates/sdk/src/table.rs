//! Flat function table exported by the native engine
//!
//! The engine exposes its whole object API as one `#[repr(C)]` table of
//! nullable function pointers keyed by (verb, kind, type). The layout below
//! must match the engine's header field for field.
//!
//! # Conventions
//!
//! - Getters returning arrays write a freshly allocated buffer to `result`
//!   and its element count to `count`. The caller owns the buffer and must
//!   release it exactly once through the matching `dispose_*` entry.
//! - Getters returning `*mut c_char` transfer ownership (release with
//!   `dispose_string`). Getters returning `*const c_char` lend engine-owned
//!   memory that stays valid until the next call on the same context.
//! - Every setter takes a trailing `flags` word that is reserved for setter
//!   behavior modifiers.
//! - Failures never unwind across the boundary. They are recorded in the
//!   context's error slot, read with `error_get_number`.

use std::ffi::c_char;

use crate::interfaces::{ContextPtr, NativeBool, ObjectPtr};

/// The engine's function table
///
/// Every entry is nullable. The adapter validates required entries once at
/// load time; optional entries degrade gracefully.
#[repr(C)]
#[derive(Clone, Copy)]
pub struct DssFunctionTable {
    /// ABI version of this table (see [`crate::FUNCTION_TABLE_VERSION`])
    pub version: u32,

    // ------------------------------------------------------------------
    // Context lifecycle
    // ------------------------------------------------------------------
    pub ctx_new: Option<unsafe extern "C" fn() -> ContextPtr>,
    pub ctx_dispose: Option<unsafe extern "C" fn(ctx: ContextPtr)>,
    pub clear_all: Option<unsafe extern "C" fn(ctx: ContextPtr)>,

    // ------------------------------------------------------------------
    // Error slot
    // ------------------------------------------------------------------
    pub error_get_number: Option<unsafe extern "C" fn(ctx: ContextPtr) -> i32>,
    pub error_get_description: Option<unsafe extern "C" fn(ctx: ContextPtr) -> *const c_char>,
    pub error_clear: Option<unsafe extern "C" fn(ctx: ContextPtr)>,

    // ------------------------------------------------------------------
    // Class-level lookup
    // ------------------------------------------------------------------
    pub new_object: Option<
        unsafe extern "C" fn(
            ctx: ContextPtr,
            cls_idx: i32,
            name: *const c_char,
            activate: NativeBool,
            begin_edit: NativeBool,
        ) -> ObjectPtr,
    >,
    pub get_handle_by_name:
        Option<unsafe extern "C" fn(ctx: ContextPtr, cls_idx: i32, name: *const c_char) -> ObjectPtr>,
    pub get_handle_by_idx:
        Option<unsafe extern "C" fn(ctx: ContextPtr, cls_idx: i32, idx: i32) -> ObjectPtr>,
    pub get_count: Option<unsafe extern "C" fn(ctx: ContextPtr, cls_idx: i32) -> i32>,

    // ------------------------------------------------------------------
    // Object identity
    // ------------------------------------------------------------------
    pub get_class_idx: Option<unsafe extern "C" fn(obj: ObjectPtr) -> i32>,
    pub get_name: Option<unsafe extern "C" fn(obj: ObjectPtr) -> *const c_char>,

    // ------------------------------------------------------------------
    // Edit sessions
    // ------------------------------------------------------------------
    pub begin_edit: Option<unsafe extern "C" fn(obj: ObjectPtr)>,
    pub end_edit: Option<unsafe extern "C" fn(obj: ObjectPtr, num_changes: i32)>,

    // ------------------------------------------------------------------
    // Scalars
    // ------------------------------------------------------------------
    pub get_int32: Option<unsafe extern "C" fn(obj: ObjectPtr, idx: i32) -> i32>,
    pub set_int32: Option<unsafe extern "C" fn(obj: ObjectPtr, idx: i32, value: i32, flags: u32)>,
    pub get_float64: Option<unsafe extern "C" fn(obj: ObjectPtr, idx: i32) -> f64>,
    pub set_float64: Option<unsafe extern "C" fn(obj: ObjectPtr, idx: i32, value: f64, flags: u32)>,
    pub get_string: Option<unsafe extern "C" fn(obj: ObjectPtr, idx: i32) -> *mut c_char>,
    pub set_string:
        Option<unsafe extern "C" fn(obj: ObjectPtr, idx: i32, value: *const c_char, flags: u32)>,

    // ------------------------------------------------------------------
    // Arrays
    // ------------------------------------------------------------------
    pub get_int32_array: Option<
        unsafe extern "C" fn(result: *mut *mut i32, count: *mut i32, obj: ObjectPtr, idx: i32),
    >,
    pub set_int32_array: Option<
        unsafe extern "C" fn(obj: ObjectPtr, idx: i32, values: *const i32, count: i32, flags: u32),
    >,
    pub get_float64_array: Option<
        unsafe extern "C" fn(result: *mut *mut f64, count: *mut i32, obj: ObjectPtr, idx: i32),
    >,
    pub set_float64_array: Option<
        unsafe extern "C" fn(obj: ObjectPtr, idx: i32, values: *const f64, count: i32, flags: u32),
    >,
    pub get_string_array: Option<
        unsafe extern "C" fn(
            result: *mut *mut *mut c_char,
            count: *mut i32,
            obj: ObjectPtr,
            idx: i32,
        ),
    >,
    pub set_string_array: Option<
        unsafe extern "C" fn(
            obj: ObjectPtr,
            idx: i32,
            values: *const *const c_char,
            count: i32,
            flags: u32,
        ),
    >,

    // ------------------------------------------------------------------
    // Object references
    // ------------------------------------------------------------------
    pub get_object: Option<unsafe extern "C" fn(obj: ObjectPtr, idx: i32) -> ObjectPtr>,
    pub set_object:
        Option<unsafe extern "C" fn(obj: ObjectPtr, idx: i32, other: ObjectPtr, flags: u32)>,
    pub get_object_array: Option<
        unsafe extern "C" fn(result: *mut *mut ObjectPtr, count: *mut i32, obj: ObjectPtr, idx: i32),
    >,
    pub set_object_array: Option<
        unsafe extern "C" fn(
            obj: ObjectPtr,
            idx: i32,
            values: *const ObjectPtr,
            count: i32,
            flags: u32,
        ),
    >,

    // ------------------------------------------------------------------
    // Serialization
    // ------------------------------------------------------------------
    pub to_json: Option<unsafe extern "C" fn(obj: ObjectPtr, options: i32) -> *mut c_char>,
    pub batch_to_json: Option<
        unsafe extern "C" fn(objs: *const ObjectPtr, count: i32, options: i32) -> *mut c_char,
    >,

    // ------------------------------------------------------------------
    // Buffer disposal
    // ------------------------------------------------------------------
    pub dispose_string: Option<unsafe extern "C" fn(value: *mut c_char)>,
    pub dispose_int32_array: Option<unsafe extern "C" fn(values: *mut i32, count: i32)>,
    pub dispose_float64_array: Option<unsafe extern "C" fn(values: *mut f64, count: i32)>,
    pub dispose_string_array: Option<unsafe extern "C" fn(values: *mut *mut c_char, count: i32)>,
    pub dispose_pointer_array: Option<unsafe extern "C" fn(values: *mut ObjectPtr, count: i32)>,
}

impl DssFunctionTable {
    /// An empty table with every entry unset
    ///
    /// Useful as a base when assembling a table by hand.
    pub const fn empty(version: u32) -> Self {
        Self {
            version,
            ctx_new: None,
            ctx_dispose: None,
            clear_all: None,
            error_get_number: None,
            error_get_description: None,
            error_clear: None,
            new_object: None,
            get_handle_by_name: None,
            get_handle_by_idx: None,
            get_count: None,
            get_class_idx: None,
            get_name: None,
            begin_edit: None,
            end_edit: None,
            get_int32: None,
            set_int32: None,
            get_float64: None,
            set_float64: None,
            get_string: None,
            set_string: None,
            get_int32_array: None,
            set_int32_array: None,
            get_float64_array: None,
            set_float64_array: None,
            get_string_array: None,
            set_string_array: None,
            get_object: None,
            set_object: None,
            get_object_array: None,
            set_object_array: None,
            to_json: None,
            batch_to_json: None,
            dispose_string: None,
            dispose_int32_array: None,
            dispose_float64_array: None,
            dispose_string_array: None,
            dispose_pointer_array: None,
        }
    }
}
