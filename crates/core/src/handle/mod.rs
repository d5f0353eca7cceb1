//! Object handles
//!
//! An [`ObjectHandle`] names one native object of one context. It never
//! dereferences the native pointer: every access goes through the function
//! table, and every call drains the context's error slot before its result
//! is used.
//!
//! # Identity
//!
//! ```text
//! ObjectHandle { ctx: Weak<ContextShared>, ctx_id, key: HandleKey }
//!                                                     │
//!                    HandleRegistry (one slot per native pointer)
//!                    └── HandleSlot { ptr, class_index, edit_open }
//! ```
//!
//! Two handles are equal when they belong to the same context and the same
//! slot, which means the same native object. Once the slot is dropped
//! (`clear_all`, `release`, context teardown) every handle to it fails with
//! [`DssError::InvalidHandle`].
//!
//! # Edit sessions
//!
//! Writes made while no session is open are wrapped in an implicit
//! `begin_edit`/`end_edit(1)` pair, so each one triggers its own
//! recalculation. Open a session (or an [`EditGuard`]) to batch several
//! writes into one recalculation.

pub(crate) mod registry;

use std::fmt;
use std::hash::{Hash, Hasher};
use std::ptr;
use std::rc::{Rc, Weak};

use dssobj_engine::NativeResult;
use dssobj_sdk::ObjectPtr;

use crate::context::ContextShared;
use crate::edit::EditGuard;
use crate::error::{DssError, DssResult, SessionMisuse};
use crate::flags::{JsonFlags, SetterFlags};
use crate::schema::{ArrayElement, ClassSchema, DssClass, PropertyDef, PropertyKind, Scalar};
use crate::value::{PropertyValue, ScalarValue, VectorValue};

pub use registry::HandleKey;

/// Handle to one live native object
#[derive(Clone)]
pub struct ObjectHandle {
    ctx: Weak<ContextShared>,
    ctx_id: u64,
    key: HandleKey,
}

/// A handle resolved against its live slot
pub(crate) struct Resolved {
    pub ctx: Rc<ContextShared>,
    pub ptr: ObjectPtr,
    pub class_index: u32,
    pub edit_open: bool,
}

impl ObjectHandle {
    pub(crate) fn new(ctx: &Rc<ContextShared>, key: HandleKey) -> Self {
        Self {
            ctx: Rc::downgrade(ctx),
            ctx_id: ctx.id,
            key,
        }
    }

    pub(crate) fn resolve(&self) -> DssResult<Resolved> {
        let ctx = self.ctx.upgrade().ok_or(DssError::InvalidHandle)?;
        let (ptr, class_index, edit_open) = {
            let handles = ctx.handles.borrow();
            let slot = handles.get(self.key).ok_or(DssError::InvalidHandle)?;
            (slot.ptr, slot.class_index, slot.edit_open)
        };
        Ok(Resolved {
            ctx,
            ptr,
            class_index,
            edit_open,
        })
    }

    /// Native pointer of this handle as seen from `ctx`
    pub(crate) fn ptr_in(&self, ctx: &ContextShared) -> DssResult<ObjectPtr> {
        if self.ctx_id != ctx.id {
            return Err(DssError::ForeignContext);
        }
        ctx.handles
            .borrow()
            .get(self.key)
            .map(|slot| slot.ptr)
            .ok_or(DssError::InvalidHandle)
    }

    fn set_edit_open(&self, ctx: &ContextShared, open: bool) {
        if let Some(slot) = ctx.handles.borrow_mut().get_mut(self.key) {
            slot.edit_open = open;
        }
    }

    pub(crate) fn mark_edit_open(&self) -> DssResult<()> {
        let r = self.resolve()?;
        self.set_edit_open(&r.ctx, true);
        Ok(())
    }

    /// One native read: resolve, call, drain the error slot
    fn read<R>(
        &self,
        op: &'static str,
        call: impl FnOnce(&ContextShared, ObjectPtr) -> NativeResult<R>,
    ) -> DssResult<R> {
        let r = self.resolve()?;
        tracing::trace!(op, ctx = r.ctx.id, "native read");
        Ok(call(&r.ctx, r.ptr)?)
    }

    /// Fail with `KindMismatch` if the schema declares `idx` with a kind
    /// that `accepts` rejects
    fn check_kind(
        &self,
        r: &Resolved,
        idx: i32,
        expected: PropertyKind,
        accepts: fn(PropertyKind) -> bool,
    ) -> DssResult<()> {
        let schema = match r.ctx.classes.borrow().get(r.class_index) {
            Some(schema) => schema,
            None => return Ok(()),
        };
        match schema.property_at(idx) {
            Some(def) if !accepts(def.kind) => Err(DssError::KindMismatch {
                property: format!("{}.{}", schema.name, def.name),
                expected: expected.to_string(),
                actual: def.kind.to_string(),
            }),
            _ => Ok(()),
        }
    }

    /// Run one native write, wrapped in an implicit edit session when none
    /// is open
    ///
    /// The implicit wrap is skipped for `NO_IMPLICIT_EDIT` or when disabled
    /// in the config. The session is closed even if the write fails; the
    /// write error wins over the close error.
    pub(crate) fn write_with_session<F>(
        &self,
        op: &'static str,
        flags: SetterFlags,
        write: F,
    ) -> DssResult<()>
    where
        F: FnOnce(&ContextShared, ObjectPtr, u32) -> NativeResult<()>,
    {
        let r = self.resolve()?;
        self.write_resolved(&r, op, flags, write)
    }

    fn write_resolved<F>(
        &self,
        r: &Resolved,
        op: &'static str,
        flags: SetterFlags,
        write: F,
    ) -> DssResult<()>
    where
        F: FnOnce(&ContextShared, ObjectPtr, u32) -> NativeResult<()>,
    {
        let flags = flags | r.ctx.config.setter_flags();
        let implicit = !r.edit_open
            && r.ctx.config.implicit_edit
            && !flags.contains(SetterFlags::NO_IMPLICIT_EDIT);
        tracing::trace!(op, ctx = r.ctx.id, implicit, "native write");

        if !implicit {
            return Ok(write(&r.ctx, r.ptr, flags.bits())?);
        }

        // SAFETY: `ptr` is live in `ctx` (resolved above)
        unsafe { r.ctx.api.begin_edit(r.ctx.raw, r.ptr) }?;
        let written = write(&r.ctx, r.ptr, flags.bits());
        let closed = unsafe { r.ctx.api.end_edit(r.ctx.raw, r.ptr, 1) };
        written?;
        closed?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Identity
    // ------------------------------------------------------------------

    /// Whether the handle still refers to a live object
    pub fn is_live(&self) -> bool {
        self.resolve().is_ok()
    }

    /// Id of the owning context
    pub fn context_id(&self) -> u64 {
        self.ctx_id
    }

    /// Raw native pointer
    pub fn as_ptr(&self) -> DssResult<ObjectPtr> {
        Ok(self.resolve()?.ptr)
    }

    /// Class index of the object
    pub fn class_index(&self) -> DssResult<u32> {
        Ok(self.resolve()?.class_index)
    }

    /// Registered schema of the object's class
    pub fn class_schema(&self) -> DssResult<&'static ClassSchema> {
        let r = self.resolve()?;
        r.ctx.schema(r.class_index)
    }

    /// Property definition by name (case-insensitive)
    pub fn property(&self, name: &str) -> DssResult<&'static PropertyDef> {
        self.class_schema()?.require(name)
    }

    /// Object name
    pub fn name(&self) -> DssResult<String> {
        // SAFETY: resolved pointers are live in their context
        self.read("get_name", |ctx, obj| unsafe { ctx.api.name(ctx.raw, obj) })
    }

    /// `Class.Name`
    pub fn full_name(&self) -> DssResult<String> {
        let schema = self.class_schema()?;
        Ok(format!("{}.{}", schema.name, self.name()?))
    }

    /// Typed view of this handle, if the class index matches
    pub fn downcast<C: DssClass>(&self) -> Option<C> {
        match self.class_index() {
            Ok(index) if index == C::CLASS_INDEX => Some(C::from_handle(self.clone())),
            _ => None,
        }
    }

    /// Forget this object on the host side
    ///
    /// Every handle to the object becomes invalid; the engine object itself
    /// is left alone and can be found again. Returns `false` if the handle
    /// was already invalid.
    pub fn release(&self) -> bool {
        match self.ctx.upgrade() {
            Some(ctx) => ctx.handles.borrow_mut().release(self.key),
            None => false,
        }
    }

    // ------------------------------------------------------------------
    // Scalars
    // ------------------------------------------------------------------

    /// Read a scalar property
    pub fn get<T: Scalar>(&self, idx: i32) -> DssResult<T> {
        let r = self.resolve()?;
        self.check_kind(&r, idx, T::KIND, T::accepts)?;
        tracing::trace!(op = "get", ctx = r.ctx.id, idx, "native read");
        // SAFETY: `ptr` is live in `ctx`
        Ok(unsafe { T::read(r.ctx.api, r.ctx.raw, r.ptr, idx) }?)
    }

    /// Write a scalar property
    pub fn set<T: Scalar>(&self, idx: i32, value: T, flags: SetterFlags) -> DssResult<()> {
        let r = self.resolve()?;
        self.check_kind(&r, idx, T::KIND, T::accepts)?;
        // SAFETY: `obj` is live in `ctx`
        self.write_resolved(&r, "set", flags, |ctx, obj, bits| unsafe {
            T::write(ctx.api, ctx.raw, obj, idx, &value, bits)
        })
    }

    /// Read any property in its textual form
    pub fn get_string(&self, idx: i32) -> DssResult<String> {
        // SAFETY: resolved pointers are live in their context
        self.read("get_string", |ctx, obj| unsafe {
            ctx.api.get_string(ctx.raw, obj, idx)
        })
    }

    /// Write any property from its textual form (the engine parses it)
    pub fn set_string(&self, idx: i32, value: &str, flags: SetterFlags) -> DssResult<()> {
        // SAFETY: `obj` is live in `ctx`
        self.write_with_session("set_string", flags, |ctx, obj, bits| unsafe {
            ctx.api.set_string(ctx.raw, obj, idx, value, bits)
        })
    }

    // ------------------------------------------------------------------
    // Arrays
    // ------------------------------------------------------------------

    /// Read an array property
    pub fn get_array<T: ArrayElement>(&self, idx: i32) -> DssResult<Vec<T>> {
        let r = self.resolve()?;
        self.check_kind(&r, idx, T::KIND, T::accepts)?;
        tracing::trace!(op = "get_array", ctx = r.ctx.id, idx, "native read");
        // SAFETY: `ptr` is live in `ctx`
        Ok(unsafe { T::read_array(r.ctx.api, r.ctx.raw, r.ptr, idx) }?)
    }

    /// Write an array property
    pub fn set_array<T: ArrayElement>(
        &self,
        idx: i32,
        values: &[T],
        flags: SetterFlags,
    ) -> DssResult<()> {
        let r = self.resolve()?;
        self.check_kind(&r, idx, T::KIND, T::accepts)?;
        // SAFETY: `obj` is live in `ctx`
        self.write_resolved(&r, "set_array", flags, |ctx, obj, bits| unsafe {
            T::write_array(ctx.api, ctx.raw, obj, idx, values, bits)
        })
    }

    /// Read a complex property stored as a `[re, im]` float64 array
    pub fn get_complex(&self, idx: i32) -> DssResult<(f64, f64)> {
        match self.get_array::<f64>(idx)?.as_slice() {
            [re, im, ..] => Ok((*re, *im)),
            other => Err(DssError::ShapeMismatch {
                expected: 2,
                actual: other.len(),
            }),
        }
    }

    pub fn set_complex(&self, idx: i32, value: (f64, f64), flags: SetterFlags) -> DssResult<()> {
        self.set_array(idx, &[value.0, value.1], flags)
    }

    // ------------------------------------------------------------------
    // Object references
    // ------------------------------------------------------------------

    /// Read an object reference
    ///
    /// The referenced object's class is resolved through the engine and
    /// must be registered in this context.
    pub fn get_object_ref(&self, idx: i32) -> DssResult<Option<ObjectHandle>> {
        let r = self.resolve()?;
        // SAFETY: `ptr` is live in `ctx`
        let other = unsafe { r.ctx.api.get_object(r.ctx.raw, r.ptr, idx) }?;
        r.ctx.issue(other, None)
    }

    /// Write an object reference (`None` clears it)
    pub fn set_object_ref(
        &self,
        idx: i32,
        target: Option<&ObjectHandle>,
        flags: SetterFlags,
    ) -> DssResult<()> {
        let r = self.resolve()?;
        let other = match target {
            Some(handle) => handle.ptr_in(&r.ctx)?,
            None => ptr::null_mut(),
        };
        // SAFETY: `obj` and `other` are live in `ctx`
        self.write_resolved(&r, "set_object_ref", flags, |ctx, obj, bits| unsafe {
            ctx.api.set_object(ctx.raw, obj, idx, other, bits)
        })
    }

    /// Read an object-array property
    pub fn get_object_refs(&self, idx: i32) -> DssResult<Vec<Option<ObjectHandle>>> {
        let r = self.resolve()?;
        // SAFETY: `ptr` is live in `ctx`
        let others = unsafe { r.ctx.api.get_object_array(r.ctx.raw, r.ptr, idx) }?;
        others
            .into_iter()
            .map(|other| r.ctx.issue(other, None))
            .collect()
    }

    /// Write an object-array property
    pub fn set_object_refs(
        &self,
        idx: i32,
        targets: &[ObjectHandle],
        flags: SetterFlags,
    ) -> DssResult<()> {
        let r = self.resolve()?;
        let others = targets
            .iter()
            .map(|h| h.ptr_in(&r.ctx))
            .collect::<DssResult<Vec<_>>>()?;
        // SAFETY: `obj` and every element of `others` are live in `ctx`
        self.write_resolved(&r, "set_object_refs", flags, |ctx, obj, bits| unsafe {
            ctx.api.set_object_array(ctx.raw, obj, idx, &others, bits)
        })
    }

    // ------------------------------------------------------------------
    // Dynamic values
    // ------------------------------------------------------------------

    /// Write a dynamically shaped value with exactly one native setter
    ///
    /// Integer and boolean scalars are widened when the property is declared
    /// as float64.
    pub fn set_value(&self, idx: i32, value: &PropertyValue, flags: SetterFlags) -> DssResult<()> {
        let declared = self
            .class_schema()
            .ok()
            .and_then(|schema| schema.property_at(idx))
            .map(|def| def.kind);
        let float = declared == Some(PropertyKind::Float64);
        match value {
            PropertyValue::Scalar(ScalarValue::Bool(v)) if float => {
                self.set(idx, if *v { 1.0 } else { 0.0 }, flags)
            }
            PropertyValue::Scalar(ScalarValue::Int32(v)) if float => self.set(idx, f64::from(*v), flags),
            PropertyValue::Scalar(ScalarValue::Bool(v)) => self.set(idx, *v, flags),
            PropertyValue::Scalar(ScalarValue::Int32(v)) => self.set(idx, *v, flags),
            PropertyValue::Scalar(ScalarValue::Float64(v)) => self.set(idx, *v, flags),
            PropertyValue::Scalar(ScalarValue::Text(v)) => self.set_string(idx, v, flags),
            PropertyValue::Reference(target) => self.set_object_ref(idx, target.as_ref(), flags),
            PropertyValue::Name(name) => self.set_string(idx, name, flags),
            PropertyValue::Vector(VectorValue::Int32(v)) => self.set_array(idx, v.as_slice(), flags),
            PropertyValue::Vector(VectorValue::Float64(v)) => self.set_array(idx, v.as_slice(), flags),
            PropertyValue::Vector(VectorValue::Text(v)) => self.set_array(idx, v.as_slice(), flags),
            PropertyValue::ReferenceList(targets) => self.set_object_refs(idx, targets, flags),
            PropertyValue::NameList(names) => self.set_array(idx, names.as_slice(), flags),
        }
    }

    /// Write a property by name, checking the value against its declared kind
    pub fn set_property(
        &self,
        name: &str,
        value: &PropertyValue,
        flags: SetterFlags,
    ) -> DssResult<()> {
        let def = self.property(name)?;
        if !value.fits(def.kind) {
            return Err(DssError::KindMismatch {
                property: def.name.to_string(),
                expected: value.describe().to_string(),
                actual: def.kind.to_string(),
            });
        }
        self.set_value(def.index, value, flags)
    }

    // ------------------------------------------------------------------
    // Edit sessions
    // ------------------------------------------------------------------

    /// Open an edit session
    ///
    /// Sessions do not nest: a second call fails with
    /// [`SessionMisuse::AlreadyOpen`].
    pub fn begin_edit(&self) -> DssResult<()> {
        let r = self.resolve()?;
        if r.edit_open {
            return Err(SessionMisuse::AlreadyOpen.into());
        }
        // SAFETY: `ptr` is live in `ctx`
        unsafe { r.ctx.api.begin_edit(r.ctx.raw, r.ptr) }?;
        self.set_edit_open(&r.ctx, true);
        Ok(())
    }

    /// Close the edit session, running the deferred recalculation once
    ///
    /// Fails with [`SessionMisuse::NotOpen`] without reaching the engine if
    /// no session is open. The session counts as closed even if the engine
    /// reports an error.
    pub fn end_edit(&self, change_count: i32) -> DssResult<()> {
        let r = self.resolve()?;
        if !r.edit_open {
            return Err(SessionMisuse::NotOpen.into());
        }
        // SAFETY: `ptr` is live in `ctx`
        let result = unsafe { r.ctx.api.end_edit(r.ctx.raw, r.ptr, change_count) };
        self.set_edit_open(&r.ctx, false);
        Ok(result?)
    }

    /// Whether an edit session is open on this object
    pub fn is_editing(&self) -> bool {
        self.resolve().map(|r| r.edit_open).unwrap_or(false)
    }

    /// Open a session closed by the returned guard
    pub fn edit(&self) -> DssResult<EditGuard<'_>> {
        EditGuard::open(self)
    }

    // ------------------------------------------------------------------
    // Serialization
    // ------------------------------------------------------------------

    /// Engine JSON for this object
    ///
    /// `flags` are combined with the configured defaults.
    pub fn to_json(&self, flags: JsonFlags) -> DssResult<String> {
        let r = self.resolve()?;
        let flags = flags | r.ctx.config.json_flags();
        // SAFETY: `ptr` is live in `ctx`
        Ok(unsafe { r.ctx.api.to_json(r.ctx.raw, r.ptr, flags.bits()) }?)
    }

    /// Engine JSON for this object, parsed
    pub fn to_json_value(&self, flags: JsonFlags) -> DssResult<serde_json::Value> {
        Ok(serde_json::from_str(&self.to_json(flags)?)?)
    }
}

impl PartialEq for ObjectHandle {
    fn eq(&self, other: &Self) -> bool {
        self.ctx_id == other.ctx_id && self.key == other.key
    }
}

impl Eq for ObjectHandle {}

impl Hash for ObjectHandle {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.ctx_id.hash(state);
        self.key.hash(state);
    }
}

impl fmt::Debug for ObjectHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = f.debug_struct("ObjectHandle");
        s.field("ctx", &self.ctx_id);
        match self.resolve() {
            Ok(r) => s.field("ptr", &r.ptr).field("class", &r.class_index),
            Err(_) => s.field("ptr", &"<invalid>"),
        };
        s.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{fake_context, fake_context_with, GADGET, WIDGET};
    use crate::CoreConfig;
    use dssobj_engine::fake;
    use std::collections::HashSet;

    const RATING: i32 = 1;
    const COUNT: i32 = 2;
    const ENABLED: i32 = 3;
    const LABEL: i32 = 4;
    const PEER: i32 = 5;
    const WEIGHTS: i32 = 6;
    const CODES: i32 = 7;
    const TAGS: i32 = 8;
    const LINKS: i32 = 9;

    #[test]
    fn test_widget_rating_round_trip() {
        let ctx = fake_context();
        let widgets = ctx.accessor(&WIDGET).unwrap();
        let w1 = widgets.new("w1", false, true).unwrap();
        w1.set(RATING, 2.5, SetterFlags::empty()).unwrap();
        assert_eq!(w1.get::<f64>(RATING).unwrap(), 2.5);
        assert_eq!(widgets.find("W1").unwrap(), w1);
    }

    #[test]
    fn test_implicit_session_recalculates_per_write() {
        let ctx = fake_context();
        let w = ctx.accessor(&WIDGET).unwrap().new("w", false, true).unwrap();
        let ptr = w.as_ptr().unwrap();

        w.set(RATING, 1.0, SetterFlags::empty()).unwrap();
        w.set(COUNT, 3, SetterFlags::empty()).unwrap();
        assert_eq!(unsafe { fake::recalc_count(ptr) }, 2);
        assert_eq!(unsafe { fake::last_change_count(ptr) }, 1);
        assert!(!w.is_editing());
    }

    #[test]
    fn test_explicit_session_recalculates_once() {
        let ctx = fake_context();
        let w = ctx.accessor(&WIDGET).unwrap().new("w", false, true).unwrap();
        let ptr = w.as_ptr().unwrap();

        w.begin_edit().unwrap();
        w.set(RATING, 1.0, SetterFlags::empty()).unwrap();
        w.set(COUNT, 3, SetterFlags::empty()).unwrap();
        assert_eq!(unsafe { fake::recalc_count(ptr) }, 0);
        w.end_edit(2).unwrap();

        assert_eq!(unsafe { fake::recalc_count(ptr) }, 1);
        assert_eq!(unsafe { fake::last_change_count(ptr) }, 2);
    }

    #[test]
    fn test_session_misuse_is_host_side() {
        let ctx = fake_context();
        let w = ctx.accessor(&WIDGET).unwrap().new("w", false, true).unwrap();
        let ptr = w.as_ptr().unwrap();

        assert!(matches!(
            w.end_edit(1),
            Err(DssError::SessionMisuse(SessionMisuse::NotOpen))
        ));
        w.begin_edit().unwrap();
        assert!(matches!(
            w.begin_edit(),
            Err(DssError::SessionMisuse(SessionMisuse::AlreadyOpen))
        ));
        w.end_edit(1).unwrap();
        assert!(matches!(
            w.end_edit(1),
            Err(DssError::SessionMisuse(SessionMisuse::NotOpen))
        ));
        // Only the one real end_edit reached the engine
        assert_eq!(unsafe { fake::recalc_count(ptr) }, 1);
    }

    #[test]
    fn test_clones_share_session_state() {
        let ctx = fake_context();
        let widgets = ctx.accessor(&WIDGET).unwrap();
        let w = widgets.new("w", false, true).unwrap();
        let found = widgets.find("w").unwrap();

        w.begin_edit().unwrap();
        assert!(found.is_editing());
        found.end_edit(1).unwrap();
        assert!(!w.is_editing());
    }

    #[test]
    fn test_no_implicit_edit_flag_is_forwarded() {
        let ctx = fake_context();
        let w = ctx.accessor(&WIDGET).unwrap().new("w", false, true).unwrap();
        let ptr = w.as_ptr().unwrap();

        let flags = SetterFlags::NO_IMPLICIT_EDIT | SetterFlags::AVOID_FULL_RECALC;
        w.set(RATING, 4.0, flags).unwrap();
        assert_eq!(unsafe { fake::recalc_count(ptr) }, 0);
        assert_eq!(unsafe { fake::last_setter_flags(ptr) }, flags.bits());
    }

    #[test]
    fn test_config_disables_implicit_edit() {
        let ctx = fake_context_with(CoreConfig {
            implicit_edit: false,
            ..CoreConfig::default()
        });
        let w = ctx.accessor(&WIDGET).unwrap().new("w", false, true).unwrap();
        w.set(RATING, 4.0, SetterFlags::empty()).unwrap();
        assert_eq!(unsafe { fake::recalc_count(w.as_ptr().unwrap()) }, 0);
    }

    #[test]
    fn test_native_error_then_next_call_succeeds() {
        let ctx = fake_context();
        let w = ctx.accessor(&WIDGET).unwrap().new("w", false, true).unwrap();
        w.set(RATING, 1.5, SetterFlags::empty()).unwrap();

        let err = w.set(RATING, -1.0, SetterFlags::empty()).unwrap_err();
        assert_eq!(err.native_code(), Some(fake::ERR_INVALID_VALUE));
        assert_eq!(w.get::<f64>(RATING).unwrap(), 1.5);
        // The failing write still closed its implicit session
        assert!(w.begin_edit().is_ok());
        w.end_edit(1).unwrap();
    }

    #[test]
    fn test_scalar_kinds() {
        let ctx = fake_context();
        let w = ctx.accessor(&WIDGET).unwrap().new("w", false, true).unwrap();
        let f = SetterFlags::empty();

        w.set(ENABLED, false, f).unwrap();
        assert!(!w.get::<bool>(ENABLED).unwrap());
        w.set(COUNT, 7, f).unwrap();
        assert_eq!(w.get::<i32>(COUNT).unwrap(), 7);
        w.set(LABEL, "hello".to_string(), f).unwrap();
        assert_eq!(w.get::<String>(LABEL).unwrap(), "hello");
        w.set_string(COUNT, "12", f).unwrap();
        assert_eq!(w.get_string(COUNT).unwrap(), "12");
    }

    #[test]
    fn test_kind_mismatch_fails_before_native_call() {
        let ctx = fake_context();
        let w = ctx.accessor(&WIDGET).unwrap().new("w", false, true).unwrap();
        assert!(matches!(
            w.get::<f64>(PEER),
            Err(DssError::KindMismatch { .. })
        ));
        assert!(matches!(
            w.set(LABEL, true, SetterFlags::empty()),
            Err(DssError::KindMismatch { .. })
        ));
        assert!(matches!(
            w.get_array::<i32>(TAGS),
            Err(DssError::KindMismatch { .. })
        ));
    }

    #[test]
    fn test_arrays_round_trip_and_release_buffers() {
        let ctx = fake_context();
        let w = ctx.accessor(&WIDGET).unwrap().new("w", false, true).unwrap();
        let f = SetterFlags::empty();

        w.set_array(WEIGHTS, &[0.5, 1.5], f).unwrap();
        w.set_array(CODES, &[3, 4, 5], f).unwrap();
        w.set_array(TAGS, &["x".to_string(), "y".to_string()], f).unwrap();

        assert_eq!(w.get_array::<f64>(WEIGHTS).unwrap(), vec![0.5, 1.5]);
        assert_eq!(w.get_array::<i32>(CODES).unwrap(), vec![3, 4, 5]);
        assert_eq!(w.get_array::<String>(TAGS).unwrap(), vec!["x", "y"]);
        assert!(w.get_array::<f64>(WEIGHTS).is_ok());
        assert_eq!(unsafe { fake::outstanding_buffers(ctx.as_ptr()) }, 0);
    }

    #[test]
    fn test_object_references() {
        let ctx = fake_context();
        let widgets = ctx.accessor(&WIDGET).unwrap();
        let gadgets = ctx.accessor(&GADGET).unwrap();
        let w = widgets.new("w", false, true).unwrap();
        let g = gadgets.new("g", false, true).unwrap();
        let f = SetterFlags::empty();

        assert_eq!(w.get_object_ref(PEER).unwrap(), None);
        w.set_object_ref(PEER, Some(&g), f).unwrap();
        let peer = w.get_object_ref(PEER).unwrap().unwrap();
        assert_eq!(peer, g);
        assert_eq!(peer.full_name().unwrap(), "Gadget.g");

        w.set_object_ref(PEER, None, f).unwrap();
        assert_eq!(w.get_object_ref(PEER).unwrap(), None);

        w.set_object_refs(LINKS, &[g.clone(), w.clone()], f).unwrap();
        let links = w.get_object_refs(LINKS).unwrap();
        assert_eq!(links, vec![Some(g.clone()), Some(w.clone())]);
        assert_eq!(
            w.get_array::<String>(LINKS).unwrap(),
            vec!["g".to_string(), "w".to_string()]
        );
    }

    #[test]
    fn test_reference_to_unregistered_class_is_not_found() {
        let ctx = fake_context();
        let w = ctx.accessor(&WIDGET).unwrap().new("w", false, true).unwrap();
        // Monitor objects exist in the engine but their class is not registered
        unsafe {
            let api = fake::install();
            let m = api
                .new_object(ctx.as_ptr(), fake::MONITOR, "m", true, false)
                .unwrap();
            api.set_object(ctx.as_ptr(), w.as_ptr().unwrap(), PEER, m, 0).unwrap();
        }
        assert!(matches!(w.get_object_ref(PEER), Err(DssError::NotFound(_))));
    }

    #[test]
    fn test_foreign_context_fails_fast() {
        let a = fake_context();
        let b = fake_context();
        let wa = a.accessor(&WIDGET).unwrap().new("w", false, true).unwrap();
        let wb = b.accessor(&WIDGET).unwrap().new("w", false, true).unwrap();

        assert!(matches!(
            wa.set_object_ref(PEER, Some(&wb), SetterFlags::empty()),
            Err(DssError::ForeignContext)
        ));
        assert_ne!(wa, wb);
    }

    #[test]
    fn test_identity_and_hash() {
        let ctx = fake_context();
        let widgets = ctx.accessor(&WIDGET).unwrap();
        let a = widgets.new("a", false, true).unwrap();
        let b = widgets.new("b", false, true).unwrap();

        let mut set = HashSet::new();
        set.insert(a.clone());
        set.insert(widgets.find("A").unwrap());
        set.insert(widgets.find(2).unwrap());
        assert_eq!(set.len(), 2);
        assert!(set.contains(&b));
    }

    #[test]
    fn test_release_invalidates_every_clone() {
        let ctx = fake_context();
        let widgets = ctx.accessor(&WIDGET).unwrap();
        let w = widgets.new("w", false, true).unwrap();
        let copy = w.clone();

        assert!(w.release());
        assert!(!copy.is_live());
        assert!(matches!(copy.name(), Err(DssError::InvalidHandle)));

        // The object is still in the engine
        let again = widgets.find("w").unwrap();
        assert!(again.is_live());
        assert_ne!(again, w);
    }

    #[test]
    fn test_set_property_by_name() {
        let ctx = fake_context();
        let w = ctx.accessor(&WIDGET).unwrap().new("w", false, true).unwrap();
        let f = SetterFlags::empty();

        w.set_property("rating", &PropertyValue::from(3.0), f).unwrap();
        assert_eq!(w.get::<f64>(RATING).unwrap(), 3.0);
        assert!(matches!(
            w.set_property("Peer", &PropertyValue::from(3.0), f),
            Err(DssError::KindMismatch { .. })
        ));
        assert!(matches!(
            w.set_property("Nope", &PropertyValue::from(3.0), f),
            Err(DssError::NotFound(_))
        ));
    }

    #[test]
    fn test_complex_is_a_float_pair() {
        let ctx = fake_context();
        let w = ctx.accessor(&WIDGET).unwrap().new("w", false, true).unwrap();
        w.set_complex(WEIGHTS, (1.5, -2.0), SetterFlags::empty()).unwrap();
        assert_eq!(w.get_array::<f64>(WEIGHTS).unwrap(), vec![1.5, -2.0]);
        assert_eq!(w.get_complex(WEIGHTS).unwrap(), (1.5, -2.0));

        w.set_array(WEIGHTS, &[3.0], SetterFlags::empty()).unwrap();
        assert!(matches!(
            w.get_complex(WEIGHTS),
            Err(DssError::ShapeMismatch { expected: 2, actual: 1 })
        ));
    }

    #[test]
    fn test_integer_value_widens_to_float_property() {
        let ctx = fake_context();
        let widgets = ctx.accessor(&WIDGET).unwrap();
        let w = widgets
            .new_with_properties("w", &[("Rating", PropertyValue::from(4))])
            .unwrap();
        assert_eq!(w.get::<f64>(RATING).unwrap(), 4.0);

        w.set_value(RATING, &PropertyValue::from(true), SetterFlags::empty())
            .unwrap();
        assert_eq!(w.get::<f64>(RATING).unwrap(), 1.0);
    }

    #[test]
    fn test_to_json_value() {
        let ctx = fake_context();
        let w = ctx.accessor(&WIDGET).unwrap().new("w", false, true).unwrap();
        w.set(RATING, 2.0, SetterFlags::empty()).unwrap();

        let json = w.to_json_value(JsonFlags::empty()).unwrap();
        assert_eq!(json["Name"], "w");
        assert_eq!(json["Rating"], 2.0);

        let json = w.to_json_value(JsonFlags::SKIP_CLASS_TAG).unwrap();
        assert!(json.get("DSSClass").is_none());
        assert_eq!(unsafe { fake::outstanding_buffers(ctx.as_ptr()) }, 0);
    }
}
