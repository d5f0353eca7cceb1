//! Checked wrappers over the function table
//!
//! Every wrapper performs exactly one native call (plus the error-slot drain)
//! and converts its inputs and outputs between host and engine
//! representations:
//!
//! ```text
//! host value ──► C repr ──► table entry ──► check(ctx) ──► host value
//!                                 │
//!                                 └──► owned buffer ──► dispose_* (on drop)
//! ```
//!
//! Results that carry engine-allocated buffers are wrapped before the error
//! check, so a failing call still releases what it returned.

use std::ffi::c_char;
use std::ptr;

use dssobj_sdk::{native_bool, ContextPtr, ObjectPtr};

use crate::buffers::{
    borrowed_string, len_to_count, slice_ptr, to_cstring, CStringArray, NativeArray, NativeString,
};
use crate::error::{NativeError, NativeResult};
use crate::globals::EngineApi;

/// Resolve a table entry, reporting it as unsupported when unset
#[inline]
fn entry<F: Copy>(slot: Option<F>, name: &'static str) -> NativeResult<F> {
    slot.ok_or(NativeError::Unsupported(name))
}

/// Array getter signature shared by every `get_*_array` entry
type ArrayGetter<T> = unsafe extern "C" fn(*mut *mut T, *mut i32, ObjectPtr, i32);

impl EngineApi {
    /// Drain the context's error slot
    ///
    /// Returns `Ok` when the slot is clear. Otherwise reads the description,
    /// clears the slot and reports the failure, so the next call starts clean.
    ///
    /// # Safety
    /// `ctx` must be a live context created by this engine
    pub unsafe fn check(&self, ctx: ContextPtr) -> NativeResult<()> {
        let code = entry(self.table.error_get_number, "error_get_number")?(ctx);
        if code == 0 {
            return Ok(());
        }

        let describe = entry(self.table.error_get_description, "error_get_description")?;
        let message = borrowed_string(describe(ctx));
        entry(self.table.error_clear, "error_clear")?(ctx);

        tracing::debug!(code, %message, "Native call failed");
        Err(NativeError::Native { code, message })
    }

    // ------------------------------------------------------------------
    // Context lifecycle
    // ------------------------------------------------------------------

    /// Create a fresh engine context
    ///
    /// # Safety
    /// The table must come from a loaded engine
    pub unsafe fn ctx_new(&self) -> NativeResult<ContextPtr> {
        let ctx = entry(self.table.ctx_new, "ctx_new")?();
        if ctx.is_null() {
            return Err(NativeError::NullContext);
        }
        Ok(ctx)
    }

    /// Dispose of an engine context
    ///
    /// # Safety
    /// `ctx` must be live and must not be used afterwards
    pub unsafe fn ctx_dispose(&self, ctx: ContextPtr) -> NativeResult<()> {
        entry(self.table.ctx_dispose, "ctx_dispose")?(ctx);
        Ok(())
    }

    /// Remove every object from a context
    ///
    /// # Safety
    /// `ctx` must be live. Every object pointer of the context dangles
    /// afterwards.
    pub unsafe fn clear_all(&self, ctx: ContextPtr) -> NativeResult<()> {
        entry(self.table.clear_all, "clear_all")?(ctx);
        self.check(ctx)
    }

    // ------------------------------------------------------------------
    // Class-level lookup
    // ------------------------------------------------------------------

    /// Create an object, returning null when the engine declined
    ///
    /// # Safety
    /// `ctx` must be live
    pub unsafe fn new_object(
        &self,
        ctx: ContextPtr,
        class_index: i32,
        name: &str,
        activate: bool,
        begin_edit: bool,
    ) -> NativeResult<ObjectPtr> {
        let f = entry(self.table.new_object, "new_object")?;
        let name = to_cstring(name)?;
        let obj = f(
            ctx,
            class_index,
            name.as_ptr(),
            native_bool(activate),
            native_bool(begin_edit),
        );
        self.check(ctx)?;
        Ok(obj)
    }

    /// Look up an object by name (null when absent)
    ///
    /// # Safety
    /// `ctx` must be live
    pub unsafe fn handle_by_name(
        &self,
        ctx: ContextPtr,
        class_index: i32,
        name: &str,
    ) -> NativeResult<ObjectPtr> {
        let f = entry(self.table.get_handle_by_name, "get_handle_by_name")?;
        let name = to_cstring(name)?;
        let obj = f(ctx, class_index, name.as_ptr());
        self.check(ctx)?;
        Ok(obj)
    }

    /// Look up an object by 1-based position (null when out of range)
    ///
    /// # Safety
    /// `ctx` must be live
    pub unsafe fn handle_by_index(
        &self,
        ctx: ContextPtr,
        class_index: i32,
        index: i32,
    ) -> NativeResult<ObjectPtr> {
        let obj = entry(self.table.get_handle_by_idx, "get_handle_by_idx")?(ctx, class_index, index);
        self.check(ctx)?;
        Ok(obj)
    }

    /// Number of live objects of a class
    ///
    /// # Safety
    /// `ctx` must be live
    pub unsafe fn count(&self, ctx: ContextPtr, class_index: i32) -> NativeResult<i32> {
        let count = entry(self.table.get_count, "get_count")?(ctx, class_index);
        self.check(ctx)?;
        Ok(count)
    }

    // ------------------------------------------------------------------
    // Object identity and edit sessions
    // ------------------------------------------------------------------

    /// # Safety
    /// `obj` must be a live object of `ctx`
    pub unsafe fn class_index(&self, ctx: ContextPtr, obj: ObjectPtr) -> NativeResult<i32> {
        let idx = entry(self.table.get_class_idx, "get_class_idx")?(obj);
        self.check(ctx)?;
        Ok(idx)
    }

    /// Object name (copied out of engine-owned memory)
    ///
    /// # Safety
    /// `obj` must be a live object of `ctx`
    pub unsafe fn name(&self, ctx: ContextPtr, obj: ObjectPtr) -> NativeResult<String> {
        let raw = entry(self.table.get_name, "get_name")?(obj);
        // Copy before the error check: the borrow is only valid until the
        // next call on this context.
        let name = borrowed_string(raw);
        self.check(ctx)?;
        Ok(name)
    }

    /// # Safety
    /// `obj` must be a live object of `ctx`
    pub unsafe fn begin_edit(&self, ctx: ContextPtr, obj: ObjectPtr) -> NativeResult<()> {
        entry(self.table.begin_edit, "begin_edit")?(obj);
        self.check(ctx)
    }

    /// # Safety
    /// `obj` must be a live object of `ctx`
    pub unsafe fn end_edit(&self, ctx: ContextPtr, obj: ObjectPtr, num_changes: i32) -> NativeResult<()> {
        entry(self.table.end_edit, "end_edit")?(obj, num_changes);
        self.check(ctx)
    }

    // ------------------------------------------------------------------
    // Scalars
    // ------------------------------------------------------------------

    /// # Safety
    /// `obj` must be a live object of `ctx`
    pub unsafe fn get_int32(&self, ctx: ContextPtr, obj: ObjectPtr, idx: i32) -> NativeResult<i32> {
        let value = entry(self.table.get_int32, "get_int32")?(obj, idx);
        self.check(ctx)?;
        Ok(value)
    }

    /// # Safety
    /// `obj` must be a live object of `ctx`
    pub unsafe fn set_int32(
        &self,
        ctx: ContextPtr,
        obj: ObjectPtr,
        idx: i32,
        value: i32,
        flags: u32,
    ) -> NativeResult<()> {
        entry(self.table.set_int32, "set_int32")?(obj, idx, value, flags);
        self.check(ctx)
    }

    /// # Safety
    /// `obj` must be a live object of `ctx`
    pub unsafe fn get_float64(&self, ctx: ContextPtr, obj: ObjectPtr, idx: i32) -> NativeResult<f64> {
        let value = entry(self.table.get_float64, "get_float64")?(obj, idx);
        self.check(ctx)?;
        Ok(value)
    }

    /// # Safety
    /// `obj` must be a live object of `ctx`
    pub unsafe fn set_float64(
        &self,
        ctx: ContextPtr,
        obj: ObjectPtr,
        idx: i32,
        value: f64,
        flags: u32,
    ) -> NativeResult<()> {
        entry(self.table.set_float64, "set_float64")?(obj, idx, value, flags);
        self.check(ctx)
    }

    /// # Safety
    /// `obj` must be a live object of `ctx`
    pub unsafe fn get_string(&self, ctx: ContextPtr, obj: ObjectPtr, idx: i32) -> NativeResult<String> {
        let dispose = entry(self.table.dispose_string, "dispose_string")?;
        let raw = entry(self.table.get_string, "get_string")?(obj, idx);
        let owned = NativeString::new(raw, dispose);
        self.check(ctx)?;
        Ok(owned.to_string_lossy())
    }

    /// # Safety
    /// `obj` must be a live object of `ctx`
    pub unsafe fn set_string(
        &self,
        ctx: ContextPtr,
        obj: ObjectPtr,
        idx: i32,
        value: &str,
        flags: u32,
    ) -> NativeResult<()> {
        let f = entry(self.table.set_string, "set_string")?;
        let value = to_cstring(value)?;
        f(obj, idx, value.as_ptr(), flags);
        self.check(ctx)
    }

    // ------------------------------------------------------------------
    // Arrays
    // ------------------------------------------------------------------

    /// Call an array getter and take ownership of the returned buffer
    unsafe fn fetch_array<T: Copy>(
        &self,
        ctx: ContextPtr,
        getter: ArrayGetter<T>,
        dispose: unsafe extern "C" fn(*mut T, i32),
        obj: ObjectPtr,
        idx: i32,
    ) -> NativeResult<NativeArray<T>> {
        let mut data: *mut T = ptr::null_mut();
        let mut count: i32 = 0;
        getter(&mut data, &mut count, obj, idx);
        let buffer = NativeArray::new(data, count, dispose);
        self.check(ctx)?;
        Ok(buffer)
    }

    /// # Safety
    /// `obj` must be a live object of `ctx`
    pub unsafe fn get_int32_array(
        &self,
        ctx: ContextPtr,
        obj: ObjectPtr,
        idx: i32,
    ) -> NativeResult<Vec<i32>> {
        let getter = entry(self.table.get_int32_array, "get_int32_array")?;
        let dispose = entry(self.table.dispose_int32_array, "dispose_int32_array")?;
        self.fetch_array(ctx, getter, dispose, obj, idx)?.to_vec()
    }

    /// # Safety
    /// `obj` must be a live object of `ctx`
    pub unsafe fn set_int32_array(
        &self,
        ctx: ContextPtr,
        obj: ObjectPtr,
        idx: i32,
        values: &[i32],
        flags: u32,
    ) -> NativeResult<()> {
        let f = entry(self.table.set_int32_array, "set_int32_array")?;
        f(obj, idx, slice_ptr(values), len_to_count(values.len())?, flags);
        self.check(ctx)
    }

    /// # Safety
    /// `obj` must be a live object of `ctx`
    pub unsafe fn get_float64_array(
        &self,
        ctx: ContextPtr,
        obj: ObjectPtr,
        idx: i32,
    ) -> NativeResult<Vec<f64>> {
        let getter = entry(self.table.get_float64_array, "get_float64_array")?;
        let dispose = entry(self.table.dispose_float64_array, "dispose_float64_array")?;
        self.fetch_array(ctx, getter, dispose, obj, idx)?.to_vec()
    }

    /// # Safety
    /// `obj` must be a live object of `ctx`
    pub unsafe fn set_float64_array(
        &self,
        ctx: ContextPtr,
        obj: ObjectPtr,
        idx: i32,
        values: &[f64],
        flags: u32,
    ) -> NativeResult<()> {
        let f = entry(self.table.set_float64_array, "set_float64_array")?;
        f(obj, idx, slice_ptr(values), len_to_count(values.len())?, flags);
        self.check(ctx)
    }

    /// # Safety
    /// `obj` must be a live object of `ctx`
    pub unsafe fn get_string_array(
        &self,
        ctx: ContextPtr,
        obj: ObjectPtr,
        idx: i32,
    ) -> NativeResult<Vec<String>> {
        let getter = entry(self.table.get_string_array, "get_string_array")?;
        let dispose = entry(self.table.dispose_string_array, "dispose_string_array")?;
        let buffer: NativeArray<*mut c_char> = self.fetch_array(ctx, getter, dispose, obj, idx)?;
        let strings = buffer
            .as_slice()?
            .iter()
            .map(|&item| borrowed_string(item))
            .collect();
        Ok(strings)
    }

    /// # Safety
    /// `obj` must be a live object of `ctx`
    pub unsafe fn set_string_array<S: AsRef<str>>(
        &self,
        ctx: ContextPtr,
        obj: ObjectPtr,
        idx: i32,
        values: &[S],
        flags: u32,
    ) -> NativeResult<()> {
        let f = entry(self.table.set_string_array, "set_string_array")?;
        let array = CStringArray::new(values)?;
        f(obj, idx, array.as_ptr(), array.count()?, flags);
        self.check(ctx)
    }

    // ------------------------------------------------------------------
    // Object references
    // ------------------------------------------------------------------

    /// Referenced object, null when unset
    ///
    /// # Safety
    /// `obj` must be a live object of `ctx`
    pub unsafe fn get_object(&self, ctx: ContextPtr, obj: ObjectPtr, idx: i32) -> NativeResult<ObjectPtr> {
        let other = entry(self.table.get_object, "get_object")?(obj, idx);
        self.check(ctx)?;
        Ok(other)
    }

    /// # Safety
    /// `obj` must be a live object of `ctx`; `other` must be null or live
    pub unsafe fn set_object(
        &self,
        ctx: ContextPtr,
        obj: ObjectPtr,
        idx: i32,
        other: ObjectPtr,
        flags: u32,
    ) -> NativeResult<()> {
        entry(self.table.set_object, "set_object")?(obj, idx, other, flags);
        self.check(ctx)
    }

    /// # Safety
    /// `obj` must be a live object of `ctx`
    pub unsafe fn get_object_array(
        &self,
        ctx: ContextPtr,
        obj: ObjectPtr,
        idx: i32,
    ) -> NativeResult<Vec<ObjectPtr>> {
        let getter = entry(self.table.get_object_array, "get_object_array")?;
        let dispose = entry(self.table.dispose_pointer_array, "dispose_pointer_array")?;
        self.fetch_array(ctx, getter, dispose, obj, idx)?.to_vec()
    }

    /// # Safety
    /// `obj` must be a live object of `ctx`; every element must be null or live
    pub unsafe fn set_object_array(
        &self,
        ctx: ContextPtr,
        obj: ObjectPtr,
        idx: i32,
        values: &[ObjectPtr],
        flags: u32,
    ) -> NativeResult<()> {
        let f = entry(self.table.set_object_array, "set_object_array")?;
        f(obj, idx, slice_ptr(values), len_to_count(values.len())?, flags);
        self.check(ctx)
    }

    // ------------------------------------------------------------------
    // Serialization
    // ------------------------------------------------------------------

    /// # Safety
    /// `obj` must be a live object of `ctx`
    pub unsafe fn to_json(&self, ctx: ContextPtr, obj: ObjectPtr, options: u32) -> NativeResult<String> {
        let f = entry(self.table.to_json, "to_json")?;
        let dispose = entry(self.table.dispose_string, "dispose_string")?;
        let owned = NativeString::new(f(obj, options as i32), dispose);
        self.check(ctx)?;
        Ok(owned.to_string_lossy())
    }

    /// # Safety
    /// Every element of `objs` must be a live object of `ctx`
    pub unsafe fn batch_to_json(
        &self,
        ctx: ContextPtr,
        objs: &[ObjectPtr],
        options: u32,
    ) -> NativeResult<String> {
        let f = entry(self.table.batch_to_json, "batch_to_json")?;
        let dispose = entry(self.table.dispose_string, "dispose_string")?;
        let count = len_to_count(objs.len())?;
        let owned = NativeString::new(f(slice_ptr(objs), count, options as i32), dispose);
        self.check(ctx)?;
        Ok(owned.to_string_lossy())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fake;

    #[test]
    fn test_native_error_is_drained_once() {
        let api = fake::install();
        unsafe {
            let ctx = api.ctx_new().unwrap();
            let w = api.new_object(ctx, fake::WIDGET, "w1", true, false).unwrap();

            let err = api.set_float64(ctx, w, 1, -1.0, 0).unwrap_err();
            assert_eq!(err.native_code(), Some(fake::ERR_INVALID_VALUE));

            // Slot was cleared by the first check
            assert!(api.check(ctx).is_ok());
            assert_eq!(api.get_float64(ctx, w, 1).unwrap(), 0.0);
            api.ctx_dispose(ctx).unwrap();
        }
    }

    #[test]
    fn test_array_buffers_are_released() {
        let api = fake::install();
        unsafe {
            let ctx = api.ctx_new().unwrap();
            let w = api.new_object(ctx, fake::WIDGET, "w1", true, false).unwrap();
            api.set_float64_array(ctx, w, 6, &[1.0, 2.0, 3.0], 0).unwrap();
            api.set_string_array(ctx, w, 8, &["a", "b"], 0).unwrap();

            assert_eq!(api.get_float64_array(ctx, w, 6).unwrap(), vec![1.0, 2.0, 3.0]);
            assert_eq!(api.get_string_array(ctx, w, 8).unwrap(), vec!["a", "b"]);
            assert_eq!(api.get_string(ctx, w, 4).unwrap(), "");
            assert_eq!(fake::outstanding_buffers(ctx), 0);
            api.ctx_dispose(ctx).unwrap();
        }
    }

    #[test]
    fn test_failed_array_read_still_releases() {
        let api = fake::install();
        unsafe {
            let ctx = api.ctx_new().unwrap();
            let w = api.new_object(ctx, fake::WIDGET, "w1", true, false).unwrap();
            // Label is a string property, not an int array
            assert!(api.get_int32_array(ctx, w, 4).is_err());
            assert_eq!(fake::outstanding_buffers(ctx), 0);
            api.ctx_dispose(ctx).unwrap();
        }
    }

    #[test]
    fn test_interior_nul_never_reaches_engine() {
        let api = fake::install();
        unsafe {
            let ctx = api.ctx_new().unwrap();
            let w = api.new_object(ctx, fake::WIDGET, "w1", true, false).unwrap();
            let err = api.set_string(ctx, w, 4, "bad\0label", 0).unwrap_err();
            assert!(matches!(err, NativeError::InteriorNul(_)));
            assert_eq!(api.get_string(ctx, w, 4).unwrap(), "");
            api.ctx_dispose(ctx).unwrap();
        }
    }

    #[test]
    fn test_unsupported_optional_entry() {
        let mut table = fake::function_table();
        table.batch_to_json = None;
        let api = unsafe { crate::loader::load_function_table(&table) }.unwrap();
        unsafe {
            let ctx = api.ctx_new().unwrap();
            assert_eq!(
                api.batch_to_json(ctx, &[], 0).unwrap_err(),
                NativeError::Unsupported("batch_to_json")
            );
            api.ctx_dispose(ctx).unwrap();
        }
    }
}
