//! Batches: one property across many objects
//!
//! An [`ObjectBatch`] is an ordered list of objects of one class. Reads
//! return one element per member in member order. Writes fan out to every
//! member; when some members fail, every member is still attempted and the
//! first error is returned.
//!
//! A batch built with [`ObjectBatch::all`] has no fixed membership: it
//! enumerates the live objects of its class again on every access.
//!
//! ```ignore
//! let batch = widgets.batch_new_named(&["a", "b", "c"], false)?;
//! batch.set_all(RATING, 10.0, SetterFlags::empty())?;
//! assert_eq!(batch.get_all::<f64>(RATING)?, vec![10.0; 3]);
//!
//! // Length must match the batch
//! assert!(batch.set_vector(RATING, &[1.0, 2.0], SetterFlags::empty()).is_err());
//! ```

mod proxy;

use std::borrow::Cow;
use std::rc::{Rc, Weak};

use regex::RegexBuilder;

use crate::accessor::{create, enumerate};
use crate::context::ContextShared;
use crate::edit::BatchEditGuard;
use crate::error::{DssError, DssResult};
use crate::flags::{JsonFlags, SetterFlags};
use crate::handle::ObjectHandle;
use crate::schema::{ArrayElement, ClassSchema, Scalar};
use crate::value::{PropertyValue, RefTarget};

pub use proxy::{BatchArrayProxy, ProxyValue};

enum Members {
    Fixed(Vec<ObjectHandle>),
    /// Every live object of the class, enumerated on access
    Synced,
}

/// Ordered collection of objects of one class
pub struct ObjectBatch {
    ctx: Weak<ContextShared>,
    schema: &'static ClassSchema,
    members: Members,
}

impl ObjectBatch {
    fn fixed(ctx: &Rc<ContextShared>, schema: &'static ClassSchema, handles: Vec<ObjectHandle>) -> Self {
        tracing::debug!("Batch of {} {} objects", handles.len(), schema.name);
        Self {
            ctx: Rc::downgrade(ctx),
            schema,
            members: Members::Fixed(handles),
        }
    }

    // ------------------------------------------------------------------
    // Construction
    // ------------------------------------------------------------------

    pub(crate) fn all(ctx: &Rc<ContextShared>, schema: &'static ClassSchema) -> Self {
        tracing::debug!("Batch of all {} objects", schema.name);
        Self {
            ctx: Rc::downgrade(ctx),
            schema,
            members: Members::Synced,
        }
    }

    pub(crate) fn from_names<S: AsRef<str>>(
        ctx: &Rc<ContextShared>,
        schema: &'static ClassSchema,
        names: &[S],
    ) -> DssResult<Self> {
        let class = schema.native_index();
        let handles = names
            .iter()
            .map(|name| {
                let name = name.as_ref();
                // SAFETY: `ctx.raw` is live while `ctx` is held
                let ptr = unsafe { ctx.api.handle_by_name(ctx.raw, class, name) }?;
                ctx.issue_some(ptr, Some(schema.index), || format!("{}.{}", schema.name, name))
            })
            .collect::<DssResult<Vec<_>>>()?;
        Ok(Self::fixed(ctx, schema, handles))
    }

    pub(crate) fn from_indices(
        ctx: &Rc<ContextShared>,
        schema: &'static ClassSchema,
        indices: &[i32],
    ) -> DssResult<Self> {
        let handles = indices
            .iter()
            .map(|&index| crate::accessor::nth(ctx, schema, index))
            .collect::<DssResult<Vec<_>>>()?;
        Ok(Self::fixed(ctx, schema, handles))
    }

    /// Objects created before a failure stay in the engine, with their
    /// sessions closed
    pub(crate) fn new_named<S: AsRef<str>>(
        ctx: &Rc<ContextShared>,
        schema: &'static ClassSchema,
        names: &[S],
        begin_edit: bool,
    ) -> DssResult<Self> {
        let mut handles = Vec::with_capacity(names.len());
        for name in names {
            match create(ctx, schema, name.as_ref(), begin_edit, true) {
                Ok(handle) => handles.push(handle),
                Err(e) => {
                    if begin_edit {
                        close_all(&handles);
                    }
                    return Err(e);
                }
            }
        }
        Ok(Self::fixed(ctx, schema, handles))
    }

    /// Names are `{class}_{serial}_{n}`, with a per-context serial
    pub(crate) fn new_count(
        ctx: &Rc<ContextShared>,
        schema: &'static ClassSchema,
        count: usize,
        begin_edit: bool,
    ) -> DssResult<Self> {
        let serial = ctx.next_batch_serial();
        let prefix = schema.name.to_ascii_lowercase();
        let names: Vec<String> = (1..=count)
            .map(|n| format!("{}_{}_{}", prefix, serial, n))
            .collect();
        Self::new_named(ctx, schema, &names, begin_edit)
    }

    pub(crate) fn from_handles(
        ctx: &Rc<ContextShared>,
        schema: &'static ClassSchema,
        handles: &[ObjectHandle],
    ) -> DssResult<Self> {
        for handle in handles {
            handle.ptr_in(ctx)?;
            let class_index = handle.class_index()?;
            if class_index != schema.index {
                return Err(DssError::KindMismatch {
                    property: handle.full_name()?,
                    expected: schema.name.to_string(),
                    actual: ctx.schema(class_index)?.name.to_string(),
                });
            }
        }
        Ok(Self::fixed(ctx, schema, handles.to_vec()))
    }

    pub(crate) fn matching(
        ctx: &Rc<ContextShared>,
        schema: &'static ClassSchema,
        pattern: &str,
    ) -> DssResult<Self> {
        let re = RegexBuilder::new(pattern).case_insensitive(true).build()?;
        let mut handles = Vec::new();
        for handle in enumerate(ctx, schema)? {
            if re.is_match(&handle.name()?) {
                handles.push(handle);
            }
        }
        Ok(Self::fixed(ctx, schema, handles))
    }

    pub(crate) fn with_int32(
        ctx: &Rc<ContextShared>,
        schema: &'static ClassSchema,
        property: &str,
        value: i32,
    ) -> DssResult<Self> {
        let def = schema.require(property)?;
        let mut handles = Vec::new();
        for handle in enumerate(ctx, schema)? {
            if handle.get::<i32>(def.index)? == value {
                handles.push(handle);
            }
        }
        Ok(Self::fixed(ctx, schema, handles))
    }

    // ------------------------------------------------------------------
    // Members
    // ------------------------------------------------------------------

    fn ctx(&self) -> DssResult<Rc<ContextShared>> {
        self.ctx.upgrade().ok_or(DssError::InvalidHandle)
    }

    pub fn schema(&self) -> &'static ClassSchema {
        self.schema
    }

    /// Current members, in order
    pub fn handles(&self) -> DssResult<Cow<'_, [ObjectHandle]>> {
        match &self.members {
            Members::Fixed(handles) => Ok(Cow::Borrowed(handles)),
            Members::Synced => Ok(Cow::Owned(enumerate(&self.ctx()?, self.schema)?)),
        }
    }

    pub fn len(&self) -> DssResult<usize> {
        match &self.members {
            Members::Fixed(handles) => Ok(handles.len()),
            Members::Synced => {
                let ctx = self.ctx()?;
                crate::accessor::count(&ctx, self.schema)
            }
        }
    }

    pub fn is_empty(&self) -> DssResult<bool> {
        Ok(self.len()? == 0)
    }

    /// Member at a 0-based position
    pub fn get(&self, position: usize) -> DssResult<Option<ObjectHandle>> {
        Ok(self.handles()?.get(position).cloned())
    }

    pub fn iter(&self) -> DssResult<std::vec::IntoIter<ObjectHandle>> {
        Ok(self.handles()?.into_owned().into_iter())
    }

    /// Run `op` on every member, returning the first error
    fn fan_out<F>(&self, op: &'static str, mut f: F) -> DssResult<()>
    where
        F: FnMut(usize, &ObjectHandle) -> DssResult<()>,
    {
        let members = self.handles()?;
        let mut first = None;
        for (i, handle) in members.iter().enumerate() {
            if let Err(e) = f(i, handle) {
                tracing::warn!("{} failed on {} member {}: {}", op, self.schema.name, i, e);
                first.get_or_insert(e);
            }
        }
        first.map_or(Ok(()), Err)
    }

    fn check_shape(&self, members: usize, actual: usize) -> DssResult<()> {
        if members != actual {
            return Err(DssError::ShapeMismatch {
                expected: members,
                actual,
            });
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Reads
    // ------------------------------------------------------------------

    /// One value per member
    pub fn get_all<T: Scalar>(&self, idx: i32) -> DssResult<Vec<T>> {
        self.handles()?.iter().map(|h| h.get(idx)).collect()
    }

    pub fn get_object_ref_all(&self, idx: i32) -> DssResult<Vec<Option<ObjectHandle>>> {
        self.handles()?.iter().map(|h| h.get_object_ref(idx)).collect()
    }

    pub fn get_array_all<T: ArrayElement>(&self, idx: i32) -> DssResult<Vec<Vec<T>>> {
        self.handles()?.iter().map(|h| h.get_array(idx)).collect()
    }

    pub fn names(&self) -> DssResult<Vec<String>> {
        self.handles()?.iter().map(|h| h.name()).collect()
    }

    pub fn full_names(&self) -> DssResult<Vec<String>> {
        self.handles()?.iter().map(|h| h.full_name()).collect()
    }

    // ------------------------------------------------------------------
    // Writes
    // ------------------------------------------------------------------

    /// Broadcast one value to every member
    pub fn set_all<T: Scalar>(&self, idx: i32, value: T, flags: SetterFlags) -> DssResult<()> {
        self.fan_out("set_all", |_, h| h.set(idx, value.clone(), flags))
    }

    /// One value per member
    ///
    /// Fails with [`DssError::ShapeMismatch`] before touching any member if
    /// the lengths differ.
    pub fn set_vector<T: Scalar>(&self, idx: i32, values: &[T], flags: SetterFlags) -> DssResult<()> {
        let members = self.handles()?;
        self.check_shape(members.len(), values.len())?;
        let mut first = None;
        for (i, (handle, value)) in members.iter().zip(values).enumerate() {
            if let Err(e) = handle.set(idx, value.clone(), flags) {
                tracing::warn!("set_vector failed on {} member {}: {}", self.schema.name, i, e);
                first.get_or_insert(e);
            }
        }
        first.map_or(Ok(()), Err)
    }

    pub fn set_object_ref_all(&self, idx: i32, target: RefTarget<'_>, flags: SetterFlags) -> DssResult<()> {
        match target {
            RefTarget::None => self.fan_out("set_object_ref_all", |_, h| h.set_object_ref(idx, None, flags)),
            RefTarget::One(other) => {
                self.fan_out("set_object_ref_all", |_, h| h.set_object_ref(idx, Some(other), flags))
            }
            RefTarget::Name(name) => self.fan_out("set_object_ref_all", |_, h| h.set_string(idx, name, flags)),
            RefTarget::Each(others) => {
                self.check_shape(self.len()?, others.len())?;
                self.fan_out("set_object_ref_all", |i, h| {
                    h.set_object_ref(idx, Some(&others[i]), flags)
                })
            }
            RefTarget::Names(names) => {
                self.check_shape(self.len()?, names.len())?;
                self.fan_out("set_object_ref_all", |i, h| h.set_string(idx, names[i], flags))
            }
        }
    }

    /// Write the same array to every member
    pub fn set_array_all<T: ArrayElement>(&self, idx: i32, values: &[T], flags: SetterFlags) -> DssResult<()> {
        self.fan_out("set_array_all", |_, h| h.set_array(idx, values, flags))
    }

    /// One array per member
    pub fn set_array_each<T: ArrayElement>(
        &self,
        idx: i32,
        values: &[Vec<T>],
        flags: SetterFlags,
    ) -> DssResult<()> {
        let members = self.handles()?;
        self.check_shape(members.len(), values.len())?;
        let mut first = None;
        for (i, (handle, value)) in members.iter().zip(values).enumerate() {
            if let Err(e) = handle.set_array(idx, value.as_slice(), flags) {
                tracing::warn!("set_array_each failed on {} member {}: {}", self.schema.name, i, e);
                first.get_or_insert(e);
            }
        }
        first.map_or(Ok(()), Err)
    }

    /// Write a dynamically shaped value to every member
    pub fn set_value_all(&self, idx: i32, value: &PropertyValue, flags: SetterFlags) -> DssResult<()> {
        self.fan_out("set_value_all", |_, h| h.set_value(idx, value, flags))
    }

    // ------------------------------------------------------------------
    // Edit sessions
    // ------------------------------------------------------------------

    /// Open a session on every member
    pub fn begin_edit_all(&self) -> DssResult<()> {
        self.fan_out("begin_edit", |_, h| h.begin_edit())
    }

    /// Close the session on every member
    ///
    /// Every member is closed even when some fail; no member is left open.
    pub fn end_edit_all(&self, change_count: i32) -> DssResult<()> {
        self.fan_out("end_edit", |_, h| h.end_edit(change_count))
    }

    pub fn edit(&self) -> DssResult<BatchEditGuard<'_>> {
        BatchEditGuard::open(self)
    }

    // ------------------------------------------------------------------
    // Views and serialization
    // ------------------------------------------------------------------

    /// Lazy view of a scalar property across the batch
    pub fn proxy<T: Scalar>(&self, idx: i32) -> BatchArrayProxy<'_, T> {
        BatchArrayProxy::new(self, idx)
    }

    /// Engine JSON array with one entry per member
    ///
    /// Without a native batch serializer the per-object output is joined;
    /// `EXCLUDE_DISABLED` is then not applied.
    pub fn to_json(&self, flags: JsonFlags) -> DssResult<String> {
        let ctx = self.ctx()?;
        let flags = flags | ctx.config.json_flags();
        let members = self.handles()?;
        if members.is_empty() {
            return Ok("[]".to_string());
        }

        if ctx.api.has_batch_to_json() {
            let ptrs = members
                .iter()
                .map(|h| h.ptr_in(&ctx))
                .collect::<DssResult<Vec<_>>>()?;
            // SAFETY: every pointer is live in `ctx`
            return Ok(unsafe { ctx.api.batch_to_json(ctx.raw, &ptrs, flags.bits()) }?);
        }

        let items = members
            .iter()
            .map(|h| h.to_json(flags))
            .collect::<DssResult<Vec<_>>>()?;
        Ok(format!("[{}]", items.join(",")))
    }

    pub fn to_json_value(&self, flags: JsonFlags) -> DssResult<serde_json::Value> {
        Ok(serde_json::from_str(&self.to_json(flags)?)?)
    }
}

/// Close sessions left open by an aborted operation, logging failures
pub(crate) fn close_all(handles: &[ObjectHandle]) {
    for handle in handles {
        if let Err(e) = handle.end_edit(1) {
            tracing::warn!("Failed to close session on {:?}: {}", handle, e);
        }
    }
}

impl std::fmt::Debug for ObjectBatch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut s = f.debug_struct("ObjectBatch");
        s.field("class", &self.schema.name);
        match &self.members {
            Members::Fixed(handles) => s.field("len", &handles.len()),
            Members::Synced => s.field("len", &"<all>"),
        };
        s.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{fake_context, GADGET, MONITOR, WIDGET};
    use dssobj_engine::fake;

    const RATING: i32 = 1;
    const COUNT: i32 = 2;
    const ENABLED: i32 = 3;
    const PEER: i32 = 5;
    const WEIGHTS: i32 = 6;

    #[test]
    fn test_widget_batch_scenario() {
        let ctx = fake_context();
        let widgets = ctx.accessor(&WIDGET).unwrap();
        let w1 = widgets.new("W1", false, true).unwrap();
        let h = widgets.find("W1").unwrap();
        h.set(RATING, 42.5, SetterFlags::empty()).unwrap();
        assert_eq!(w1.get::<f64>(RATING).unwrap(), 42.5);

        let batch = widgets.batch_new_named(&["A", "B", "C"], false).unwrap();
        batch.set_all(RATING, 10.0, SetterFlags::empty()).unwrap();
        assert_eq!(batch.get_all::<f64>(RATING).unwrap(), vec![10.0, 10.0, 10.0]);

        let err = batch
            .set_vector(RATING, &[1.0, 2.0], SetterFlags::empty())
            .unwrap_err();
        assert!(matches!(err, DssError::ShapeMismatch { expected: 3, actual: 2 }));
        assert_eq!(batch.get_all::<f64>(RATING).unwrap(), vec![10.0, 10.0, 10.0]);
    }

    #[test]
    fn test_set_vector_in_member_order() {
        let ctx = fake_context();
        let widgets = ctx.accessor(&WIDGET).unwrap();
        let batch = widgets.batch_new_named(&["a", "b", "c"], false).unwrap();
        batch.set_vector(COUNT, &[3, 1, 2], SetterFlags::empty()).unwrap();
        assert_eq!(batch.get_all::<i32>(COUNT).unwrap(), vec![3, 1, 2]);
        assert_eq!(batch.names().unwrap(), vec!["a", "b", "c"]);
        assert_eq!(batch.full_names().unwrap()[1], "Widget.b");
    }

    #[test]
    fn test_fan_out_attempts_every_member() {
        let ctx = fake_context();
        let widgets = ctx.accessor(&WIDGET).unwrap();
        let batch = widgets.batch_new_named(&["a", "b", "c"], false).unwrap();
        batch.set_vector(RATING, &[1.0, 1.0, 1.0], SetterFlags::empty()).unwrap();

        let err = batch
            .set_vector(RATING, &[5.0, -1.0, 6.0], SetterFlags::empty())
            .unwrap_err();
        assert_eq!(err.native_code(), Some(fake::ERR_INVALID_VALUE));
        assert_eq!(batch.get_all::<f64>(RATING).unwrap(), vec![5.0, 1.0, 6.0]);
    }

    #[test]
    fn test_new_count_generates_unique_names() {
        let ctx = fake_context();
        let widgets = ctx.accessor(&WIDGET).unwrap();
        let first = widgets.batch_new_count(2, false).unwrap();
        let second = widgets.batch_new_count(2, false).unwrap();
        assert_eq!(first.names().unwrap(), vec!["widget_1_1", "widget_1_2"]);
        assert_eq!(second.names().unwrap(), vec!["widget_2_1", "widget_2_2"]);
        assert_eq!(widgets.count().unwrap(), 4);
    }

    #[test]
    fn test_new_count_with_begin_edit() {
        let ctx = fake_context();
        let widgets = ctx.accessor(&WIDGET).unwrap();
        let batch = widgets.batch_new_count(2, true).unwrap();
        batch.set_all(COUNT, 1, SetterFlags::empty()).unwrap();
        batch.end_edit_all(1).unwrap();
        for h in batch.iter().unwrap() {
            assert_eq!(unsafe { fake::recalc_count(h.as_ptr().unwrap()) }, 1);
        }
    }

    #[test]
    fn test_failed_new_named_closes_created_sessions() {
        let ctx = fake_context();
        let widgets = ctx.accessor(&WIDGET).unwrap();
        let err = widgets.batch_new_named(&["x", "y", "X"], true).unwrap_err();
        assert!(matches!(err, DssError::ConstructionConflict(_)));

        assert_eq!(widgets.count().unwrap(), 2);
        for name in ["x", "y"] {
            let h = widgets.find(name).unwrap();
            assert!(!h.is_editing());
            assert_eq!(unsafe { fake::recalc_count(h.as_ptr().unwrap()) }, 1);
        }
    }

    #[test]
    fn test_from_names_preserves_order_and_fails_on_missing() {
        let ctx = fake_context();
        let widgets = ctx.accessor(&WIDGET).unwrap();
        widgets.batch_new_named(&["a", "b", "c"], false).unwrap();

        let batch = widgets.batch_from_names(&["c", "a"]).unwrap();
        assert_eq!(batch.names().unwrap(), vec!["c", "a"]);
        assert!(matches!(
            widgets.batch_from_names(&["a", "zz"]),
            Err(DssError::NotFound(_))
        ));

        let batch = widgets.batch_from_indices(&[2, 3]).unwrap();
        assert_eq!(batch.names().unwrap(), vec!["b", "c"]);
    }

    #[test]
    fn test_all_follows_live_objects() {
        let ctx = fake_context();
        let widgets = ctx.accessor(&WIDGET).unwrap();
        let all = widgets.batch_all().unwrap();
        assert!(all.is_empty().unwrap());
        assert_eq!(all.to_json(JsonFlags::empty()).unwrap(), "[]");

        widgets.new("a", false, true).unwrap();
        widgets.new("b", false, true).unwrap();
        assert_eq!(all.len().unwrap(), 2);
        all.set_all(COUNT, 4, SetterFlags::empty()).unwrap();
        assert_eq!(all.get_all::<i32>(COUNT).unwrap(), vec![4, 4]);

        ctx.clear_all().unwrap();
        assert_eq!(all.len().unwrap(), 0);
    }

    #[test]
    fn test_from_handles_checks_class_and_context() {
        let ctx = fake_context();
        let other = fake_context();
        let widgets = ctx.accessor(&WIDGET).unwrap();
        let w = widgets.new("w", false, true).unwrap();
        let g = ctx.accessor(&GADGET).unwrap().new("g", false, true).unwrap();
        let foreign = other.accessor(&WIDGET).unwrap().new("w", false, true).unwrap();

        assert_eq!(widgets.batch_from_handles(&[w.clone()]).unwrap().len().unwrap(), 1);
        assert!(matches!(
            widgets.batch_from_handles(&[w.clone(), g]),
            Err(DssError::KindMismatch { .. })
        ));
        assert!(matches!(
            widgets.batch_from_handles(&[foreign]),
            Err(DssError::ForeignContext)
        ));
    }

    #[test]
    fn test_matching_and_with_int32() {
        let ctx = fake_context();
        let widgets = ctx.accessor(&WIDGET).unwrap();
        let batch = widgets
            .batch_new_named(&["load_1", "Load_2", "gen_1"], false)
            .unwrap();
        batch.set_vector(COUNT, &[1, 2, 1], SetterFlags::empty()).unwrap();

        let loads = widgets.batch_matching("^load_").unwrap();
        assert_eq!(loads.names().unwrap(), vec!["load_1", "Load_2"]);
        let ones = widgets.batch_with_int32("count", 1).unwrap();
        assert_eq!(ones.names().unwrap(), vec!["load_1", "gen_1"]);

        assert!(matches!(widgets.batch_matching("("), Err(DssError::Pattern(_))));
        assert!(matches!(
            widgets.batch_with_int32("nope", 1),
            Err(DssError::NotFound(_))
        ));
    }

    #[test]
    fn test_object_refs_broadcast_and_parallel() {
        let ctx = fake_context();
        let widgets = ctx.accessor(&WIDGET).unwrap();
        let gadgets = ctx.accessor(&GADGET).unwrap();
        let batch = widgets.batch_new_named(&["a", "b"], false).unwrap();
        let g1 = gadgets.new("g1", false, true).unwrap();
        let g2 = gadgets.new("g2", false, true).unwrap();
        let f = SetterFlags::empty();

        batch.set_object_ref_all(PEER, RefTarget::One(&g1), f).unwrap();
        assert_eq!(
            batch.get_object_ref_all(PEER).unwrap(),
            vec![Some(g1.clone()), Some(g1.clone())]
        );

        let each = [g2.clone(), g1.clone()];
        batch.set_object_ref_all(PEER, RefTarget::Each(&each), f).unwrap();
        assert_eq!(
            batch.get_object_ref_all(PEER).unwrap(),
            vec![Some(g2.clone()), Some(g1.clone())]
        );

        batch.set_object_ref_all(PEER, RefTarget::Names(&["Gadget.g1", "g2"]), f).unwrap();
        assert_eq!(
            batch.get_object_ref_all(PEER).unwrap(),
            vec![Some(g1.clone()), Some(g2.clone())]
        );

        batch.set_object_ref_all(PEER, RefTarget::Name("g2"), f).unwrap();
        assert_eq!(batch.get_object_ref_all(PEER).unwrap()[0], Some(g2));

        assert!(matches!(
            batch.set_object_ref_all(PEER, RefTarget::Each(&[g1]), f),
            Err(DssError::ShapeMismatch { expected: 2, actual: 1 })
        ));

        batch.set_object_ref_all(PEER, RefTarget::None, f).unwrap();
        assert_eq!(batch.get_object_ref_all(PEER).unwrap(), vec![None, None]);
    }

    #[test]
    fn test_arrays_across_batch() {
        let ctx = fake_context();
        let widgets = ctx.accessor(&WIDGET).unwrap();
        let batch = widgets.batch_new_named(&["a", "b"], false).unwrap();
        let f = SetterFlags::empty();

        batch.set_array_all(WEIGHTS, &[1.0, 2.0], f).unwrap();
        assert_eq!(
            batch.get_array_all::<f64>(WEIGHTS).unwrap(),
            vec![vec![1.0, 2.0], vec![1.0, 2.0]]
        );

        batch
            .set_array_each(WEIGHTS, &[vec![3.0], vec![4.0, 5.0]], f)
            .unwrap();
        assert_eq!(
            batch.get_array_all::<f64>(WEIGHTS).unwrap(),
            vec![vec![3.0], vec![4.0, 5.0]]
        );
        assert!(matches!(
            batch.set_array_each(WEIGHTS, &[vec![1.0]], f),
            Err(DssError::ShapeMismatch { .. })
        ));
        assert_eq!(unsafe { fake::outstanding_buffers(ctx.as_ptr()) }, 0);
    }

    #[test]
    fn test_end_edit_all_closes_every_member() {
        let ctx = fake_context();
        let widgets = ctx.accessor(&WIDGET).unwrap();
        let batch = widgets.batch_new_named(&["a", "b", "c"], false).unwrap();
        let b = widgets.find("b").unwrap();

        b.begin_edit().unwrap();
        // One member was already open: reported, the others still opened
        assert!(matches!(
            batch.begin_edit_all(),
            Err(DssError::SessionMisuse(_))
        ));
        assert!(batch.iter().unwrap().all(|h| h.is_editing()));

        batch.end_edit_all(1).unwrap();
        for h in batch.iter().unwrap() {
            assert!(!h.is_editing());
            assert!(!unsafe { fake::is_editing(h.as_ptr().unwrap()) });
        }
        assert!(matches!(
            batch.end_edit_all(1),
            Err(DssError::SessionMisuse(_))
        ));
    }

    #[test]
    fn test_batch_to_json() {
        let ctx = fake_context();
        let widgets = ctx.accessor(&WIDGET).unwrap();
        let batch = widgets.batch_new_named(&["a", "b"], false).unwrap();
        batch.set_vector(ENABLED, &[true, false], SetterFlags::empty()).unwrap();

        let json = batch.to_json_value(JsonFlags::empty()).unwrap();
        assert_eq!(json.as_array().unwrap().len(), 2);
        assert_eq!(json[1]["Name"], "b");

        let json = batch.to_json_value(JsonFlags::EXCLUDE_DISABLED).unwrap();
        assert_eq!(json.as_array().unwrap().len(), 1);
        assert_eq!(json[0]["Name"], "a");
    }

    #[test]
    fn test_set_value_all_on_monitor() {
        let ctx = fake_context();
        let widgets = ctx.accessor(&WIDGET).unwrap();
        let monitors = ctx.accessor(&MONITOR).unwrap();
        widgets.new("w", false, true).unwrap();
        let batch = monitors.batch_new_named(&["m1", "m2"], false).unwrap();

        batch
            .set_value_all(1, &PropertyValue::name("Widget.w"), SetterFlags::empty())
            .unwrap();
        let elements = batch.get_object_ref_all(1).unwrap();
        assert!(elements.iter().all(|e| e.as_ref().map(|h| h.name().unwrap()) == Some("w".into())));
        batch
            .set_value_all(2, &PropertyValue::from(2), SetterFlags::empty())
            .unwrap();
        assert_eq!(batch.get_all::<i32>(2).unwrap(), vec![2, 2]);
    }
}
