//! Host types that can be read from and written to properties
//!
//! [`Scalar`] covers single values, [`ArrayElement`] covers the element
//! types of array properties. Each impl picks the native entry it routes
//! through, so the generic accessors on handles and batches stay one-liners.

use std::ops::{Add, Mul, Sub};

use dssobj_engine::{EngineApi, NativeResult};
use dssobj_sdk::{ContextPtr, ObjectPtr};

use super::class::PropertyKind;

mod sealed {
    pub trait Sealed {}
    impl Sealed for bool {}
    impl Sealed for i32 {}
    impl Sealed for f64 {}
    impl Sealed for String {}
}

/// Scalar property value type (`bool`, `i32`, `f64`, `String`)
pub trait Scalar: Clone + 'static + sealed::Sealed {
    /// Kind this type maps to
    const KIND: PropertyKind;

    /// Whether a property declared as `kind` can be accessed as `Self`
    fn accepts(kind: PropertyKind) -> bool;

    #[doc(hidden)]
    unsafe fn read(api: &EngineApi, ctx: ContextPtr, obj: ObjectPtr, idx: i32) -> NativeResult<Self>;

    #[doc(hidden)]
    unsafe fn write(
        api: &EngineApi,
        ctx: ContextPtr,
        obj: ObjectPtr,
        idx: i32,
        value: &Self,
        flags: u32,
    ) -> NativeResult<()>;
}

impl Scalar for bool {
    const KIND: PropertyKind = PropertyKind::Bool;

    fn accepts(kind: PropertyKind) -> bool {
        matches!(kind, PropertyKind::Bool | PropertyKind::Int32)
    }

    unsafe fn read(api: &EngineApi, ctx: ContextPtr, obj: ObjectPtr, idx: i32) -> NativeResult<Self> {
        Ok(api.get_int32(ctx, obj, idx)? != 0)
    }

    unsafe fn write(
        api: &EngineApi,
        ctx: ContextPtr,
        obj: ObjectPtr,
        idx: i32,
        value: &Self,
        flags: u32,
    ) -> NativeResult<()> {
        api.set_int32(ctx, obj, idx, *value as i32, flags)
    }
}

impl Scalar for i32 {
    const KIND: PropertyKind = PropertyKind::Int32;

    fn accepts(kind: PropertyKind) -> bool {
        matches!(kind, PropertyKind::Int32 | PropertyKind::Bool)
    }

    unsafe fn read(api: &EngineApi, ctx: ContextPtr, obj: ObjectPtr, idx: i32) -> NativeResult<Self> {
        api.get_int32(ctx, obj, idx)
    }

    unsafe fn write(
        api: &EngineApi,
        ctx: ContextPtr,
        obj: ObjectPtr,
        idx: i32,
        value: &Self,
        flags: u32,
    ) -> NativeResult<()> {
        api.set_int32(ctx, obj, idx, *value, flags)
    }
}

impl Scalar for f64 {
    const KIND: PropertyKind = PropertyKind::Float64;

    fn accepts(kind: PropertyKind) -> bool {
        matches!(kind, PropertyKind::Float64 | PropertyKind::Int32)
    }

    unsafe fn read(api: &EngineApi, ctx: ContextPtr, obj: ObjectPtr, idx: i32) -> NativeResult<Self> {
        api.get_float64(ctx, obj, idx)
    }

    unsafe fn write(
        api: &EngineApi,
        ctx: ContextPtr,
        obj: ObjectPtr,
        idx: i32,
        value: &Self,
        flags: u32,
    ) -> NativeResult<()> {
        api.set_float64(ctx, obj, idx, *value, flags)
    }
}

impl Scalar for String {
    const KIND: PropertyKind = PropertyKind::String;

    // Every property has a textual form
    fn accepts(_kind: PropertyKind) -> bool {
        true
    }

    unsafe fn read(api: &EngineApi, ctx: ContextPtr, obj: ObjectPtr, idx: i32) -> NativeResult<Self> {
        api.get_string(ctx, obj, idx)
    }

    unsafe fn write(
        api: &EngineApi,
        ctx: ContextPtr,
        obj: ObjectPtr,
        idx: i32,
        value: &Self,
        flags: u32,
    ) -> NativeResult<()> {
        api.set_string(ctx, obj, idx, value, flags)
    }
}

/// Element type of an array property (`i32`, `f64`, `String`)
pub trait ArrayElement: Clone + 'static + sealed::Sealed {
    /// Array kind this element type maps to
    const KIND: PropertyKind;

    /// Whether a property declared as `kind` can be accessed as `[Self]`
    fn accepts(kind: PropertyKind) -> bool;

    #[doc(hidden)]
    unsafe fn read_array(
        api: &EngineApi,
        ctx: ContextPtr,
        obj: ObjectPtr,
        idx: i32,
    ) -> NativeResult<Vec<Self>>;

    #[doc(hidden)]
    unsafe fn write_array(
        api: &EngineApi,
        ctx: ContextPtr,
        obj: ObjectPtr,
        idx: i32,
        values: &[Self],
        flags: u32,
    ) -> NativeResult<()>;
}

impl ArrayElement for i32 {
    const KIND: PropertyKind = PropertyKind::Int32Array;

    fn accepts(kind: PropertyKind) -> bool {
        matches!(kind, PropertyKind::Int32Array | PropertyKind::Float64Array)
    }

    unsafe fn read_array(
        api: &EngineApi,
        ctx: ContextPtr,
        obj: ObjectPtr,
        idx: i32,
    ) -> NativeResult<Vec<Self>> {
        api.get_int32_array(ctx, obj, idx)
    }

    unsafe fn write_array(
        api: &EngineApi,
        ctx: ContextPtr,
        obj: ObjectPtr,
        idx: i32,
        values: &[Self],
        flags: u32,
    ) -> NativeResult<()> {
        api.set_int32_array(ctx, obj, idx, values, flags)
    }
}

impl ArrayElement for f64 {
    const KIND: PropertyKind = PropertyKind::Float64Array;

    fn accepts(kind: PropertyKind) -> bool {
        matches!(kind, PropertyKind::Float64Array | PropertyKind::Int32Array)
    }

    unsafe fn read_array(
        api: &EngineApi,
        ctx: ContextPtr,
        obj: ObjectPtr,
        idx: i32,
    ) -> NativeResult<Vec<Self>> {
        api.get_float64_array(ctx, obj, idx)
    }

    unsafe fn write_array(
        api: &EngineApi,
        ctx: ContextPtr,
        obj: ObjectPtr,
        idx: i32,
        values: &[Self],
        flags: u32,
    ) -> NativeResult<()> {
        api.set_float64_array(ctx, obj, idx, values, flags)
    }
}

impl ArrayElement for String {
    const KIND: PropertyKind = PropertyKind::StringArray;

    // Object arrays read and write as names
    fn accepts(kind: PropertyKind) -> bool {
        kind.is_array()
    }

    unsafe fn read_array(
        api: &EngineApi,
        ctx: ContextPtr,
        obj: ObjectPtr,
        idx: i32,
    ) -> NativeResult<Vec<Self>> {
        api.get_string_array(ctx, obj, idx)
    }

    unsafe fn write_array(
        api: &EngineApi,
        ctx: ContextPtr,
        obj: ObjectPtr,
        idx: i32,
        values: &[Self],
        flags: u32,
    ) -> NativeResult<()> {
        api.set_string_array(ctx, obj, idx, values, flags)
    }
}

/// Numeric scalars supporting in-place arithmetic on batch proxies
pub trait Numeric: Scalar + Copy + Add<Output = Self> + Sub<Output = Self> + Mul<Output = Self> {}

impl Numeric for i32 {}
impl Numeric for f64 {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scalar_kind_acceptance() {
        assert!(<f64 as Scalar>::accepts(PropertyKind::Int32));
        assert!(!<f64 as Scalar>::accepts(PropertyKind::Object));
        assert!(<bool as Scalar>::accepts(PropertyKind::Bool));
        assert!(<String as Scalar>::accepts(PropertyKind::ObjectArray));
    }

    #[test]
    fn test_array_kind_acceptance() {
        assert!(<String as ArrayElement>::accepts(PropertyKind::ObjectArray));
        assert!(!<i32 as ArrayElement>::accepts(PropertyKind::StringArray));
        assert!(!<f64 as ArrayElement>::accepts(PropertyKind::Float64));
    }
}
