//! Host/native buffer marshalling
//!
//! Buffers returned by the engine are wrapped in RAII owners the moment the
//! call returns, so each one is released exactly once, also on early return
//! through the error channel.

use std::ffi::{c_char, CStr, CString};
use std::ptr;

use crate::error::{NativeError, NativeResult};

/// Engine-allocated array released through a `dispose_*` entry on drop
pub(crate) struct NativeArray<T> {
    ptr: *mut T,
    count: i32,
    dispose: unsafe extern "C" fn(*mut T, i32),
}

impl<T: Copy> NativeArray<T> {
    pub(crate) fn new(ptr: *mut T, count: i32, dispose: unsafe extern "C" fn(*mut T, i32)) -> Self {
        Self { ptr, count, dispose }
    }

    /// View the buffer contents
    pub(crate) fn as_slice(&self) -> NativeResult<&[T]> {
        let len = count_to_len(self.count)?;
        if self.ptr.is_null() || len == 0 {
            return Ok(&[]);
        }
        // SAFETY: The engine guarantees `count` initialized elements at `ptr`
        // until the buffer is disposed, which only happens in `drop`.
        Ok(unsafe { std::slice::from_raw_parts(self.ptr, len) })
    }

    pub(crate) fn to_vec(&self) -> NativeResult<Vec<T>> {
        Ok(self.as_slice()?.to_vec())
    }
}

impl<T> Drop for NativeArray<T> {
    fn drop(&mut self) {
        if !self.ptr.is_null() {
            // SAFETY: `ptr` came from the engine together with `dispose`
            // and is released only here.
            unsafe { (self.dispose)(self.ptr, self.count) };
            self.ptr = ptr::null_mut();
        }
    }
}

/// Engine-allocated C string released through `dispose_string` on drop
pub(crate) struct NativeString {
    ptr: *mut c_char,
    dispose: unsafe extern "C" fn(*mut c_char),
}

impl NativeString {
    pub(crate) fn new(ptr: *mut c_char, dispose: unsafe extern "C" fn(*mut c_char)) -> Self {
        Self { ptr, dispose }
    }

    pub(crate) fn to_string_lossy(&self) -> String {
        // SAFETY: `ptr` is null or a NUL-terminated engine string
        unsafe { borrowed_string(self.ptr) }
    }
}

impl Drop for NativeString {
    fn drop(&mut self) {
        if !self.ptr.is_null() {
            // SAFETY: released exactly once
            unsafe { (self.dispose)(self.ptr) };
            self.ptr = ptr::null_mut();
        }
    }
}

/// Copy a borrowed engine string (null reads as empty)
///
/// # Safety
/// `ptr` must be null or point to a NUL-terminated string
pub(crate) unsafe fn borrowed_string(ptr: *const c_char) -> String {
    if ptr.is_null() {
        return String::new();
    }
    CStr::from_ptr(ptr).to_string_lossy().into_owned()
}

/// Convert a host string to a C string
pub(crate) fn to_cstring(value: &str) -> NativeResult<CString> {
    CString::new(value).map_err(|_| NativeError::InteriorNul(value.to_string()))
}

/// Host-owned array of C strings kept alive for the duration of a call
pub(crate) struct CStringArray {
    _owned: Vec<CString>,
    ptrs: Vec<*const c_char>,
}

impl CStringArray {
    pub(crate) fn new<S: AsRef<str>>(values: &[S]) -> NativeResult<Self> {
        let owned = values
            .iter()
            .map(|v| to_cstring(v.as_ref()))
            .collect::<NativeResult<Vec<_>>>()?;
        let ptrs = owned.iter().map(|c| c.as_ptr()).collect();
        Ok(Self { _owned: owned, ptrs })
    }

    /// Pointer to the first element, or null for an empty array
    pub(crate) fn as_ptr(&self) -> *const *const c_char {
        if self.ptrs.is_empty() {
            ptr::null()
        } else {
            self.ptrs.as_ptr()
        }
    }

    pub(crate) fn count(&self) -> NativeResult<i32> {
        len_to_count(self.ptrs.len())
    }
}

/// Convert an engine element count to a host length
pub(crate) fn count_to_len(count: i32) -> NativeResult<usize> {
    usize::try_from(count).map_err(|_| NativeError::BadCount(count))
}

/// Convert a host length to an engine element count
pub(crate) fn len_to_count(len: usize) -> NativeResult<i32> {
    i32::try_from(len).map_err(|_| NativeError::BadCount(i32::MAX))
}

/// Pointer to a slice's data, or null for an empty slice
pub(crate) fn slice_ptr<T>(values: &[T]) -> *const T {
    if values.is_empty() {
        ptr::null()
    } else {
        values.as_ptr()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    static DISPOSED: AtomicUsize = AtomicUsize::new(0);

    unsafe extern "C" fn count_dispose(values: *mut i32, count: i32) {
        DISPOSED.fetch_add(1, Ordering::SeqCst);
        drop(Box::from_raw(std::ptr::slice_from_raw_parts_mut(
            values,
            count as usize,
        )));
    }

    #[test]
    fn test_owned_buffer_disposes_once() {
        let before = DISPOSED.load(Ordering::SeqCst);
        let data: Box<[i32]> = vec![1, 2, 3].into_boxed_slice();
        let ptr = Box::into_raw(data) as *mut i32;
        {
            let buffer = NativeArray::new(ptr, 3, count_dispose);
            assert_eq!(buffer.to_vec().unwrap(), vec![1, 2, 3]);
        }
        assert_eq!(DISPOSED.load(Ordering::SeqCst), before + 1);
    }

    #[test]
    fn test_null_buffer_not_disposed() {
        let before = DISPOSED.load(Ordering::SeqCst);
        {
            let buffer = NativeArray::new(std::ptr::null_mut(), 0, count_dispose);
            assert!(buffer.as_slice().unwrap().is_empty());
        }
        assert_eq!(DISPOSED.load(Ordering::SeqCst), before);
    }

    #[test]
    fn test_negative_count_is_error() {
        let buffer = NativeArray::new(std::ptr::null_mut(), -2, count_dispose);
        assert_eq!(buffer.as_slice().unwrap_err(), NativeError::BadCount(-2));
    }

    #[test]
    fn test_interior_nul_rejected() {
        assert!(matches!(to_cstring("a\0b"), Err(NativeError::InteriorNul(_))));
        assert!(to_cstring("Line.L1").is_ok());
    }

    #[test]
    fn test_empty_string_array_is_null() {
        let empty: [&str; 0] = [];
        let array = CStringArray::new(&empty).unwrap();
        assert!(array.as_ptr().is_null());
        assert_eq!(array.count().unwrap(), 0);

        let array = CStringArray::new(&["a", "b"]).unwrap();
        assert!(!array.as_ptr().is_null());
        assert_eq!(array.count().unwrap(), 2);
    }
}
