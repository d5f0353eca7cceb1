//! Class-level entry points
//!
//! A [`ClassAccessor`] is bound to one registered class of one context. It
//! creates and finds objects, enumerates the live objects of its class and
//! builds batches over them.

use std::rc::{Rc, Weak};

use crate::batch::ObjectBatch;
use crate::context::ContextShared;
use crate::error::{DssError, DssResult};
use crate::flags::SetterFlags;
use crate::handle::ObjectHandle;
use crate::schema::ClassSchema;
use crate::value::PropertyValue;

/// How to look up one object of a class
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lookup<'a> {
    /// By name (case-insensitive)
    Name(&'a str),
    /// By 1-based position in the engine's enumeration order
    Index(i32),
}

impl<'a> From<&'a str> for Lookup<'a> {
    fn from(name: &'a str) -> Self {
        Lookup::Name(name)
    }
}

impl<'a> From<&'a String> for Lookup<'a> {
    fn from(name: &'a String) -> Self {
        Lookup::Name(name)
    }
}

impl From<i32> for Lookup<'_> {
    fn from(index: i32) -> Self {
        Lookup::Index(index)
    }
}

/// Factory and lookup for the objects of one class
#[derive(Clone)]
pub struct ClassAccessor {
    ctx: Weak<ContextShared>,
    schema: &'static ClassSchema,
}

impl ClassAccessor {
    pub(crate) fn bind(ctx: &Rc<ContextShared>, schema: &'static ClassSchema) -> Self {
        Self {
            ctx: Rc::downgrade(ctx),
            schema,
        }
    }

    pub(crate) fn ctx(&self) -> DssResult<Rc<ContextShared>> {
        self.ctx.upgrade().ok_or(DssError::InvalidHandle)
    }

    pub fn schema(&self) -> &'static ClassSchema {
        self.schema
    }

    pub fn name(&self) -> &'static str {
        self.schema.name
    }

    pub fn index(&self) -> u32 {
        self.schema.index
    }

    /// Create an object
    ///
    /// With `begin_edit` the object starts with an open edit session that
    /// the caller must close. Fails with [`DssError::ConstructionConflict`]
    /// if the engine declines (for example on a duplicate name).
    pub fn new(&self, name: &str, begin_edit: bool, activate: bool) -> DssResult<ObjectHandle> {
        let ctx = self.ctx()?;
        create(&ctx, self.schema, name, begin_edit, activate)
    }

    /// Create an object and set its initial properties in one edit session
    ///
    /// Property names are case-insensitive. The session is closed even when
    /// a property fails; the first failure is returned and the object stays
    /// in the engine with the properties set so far.
    pub fn new_with_properties(
        &self,
        name: &str,
        props: &[(&str, PropertyValue)],
    ) -> DssResult<ObjectHandle> {
        let handle = self.new(name, true, true)?;

        let written = props.iter().try_for_each(|(prop, value)| {
            handle.set_property(prop, value, SetterFlags::empty())
        });
        let change_count = i32::try_from(props.len()).unwrap_or(i32::MAX).max(1);
        let closed = handle.end_edit(change_count);

        written?;
        closed?;
        Ok(handle)
    }

    /// Find an object by name or by 1-based index
    pub fn find<'a>(&self, key: impl Into<Lookup<'a>>) -> DssResult<ObjectHandle> {
        let ctx = self.ctx()?;
        let key = key.into();
        let class = self.schema.native_index();
        // SAFETY: `ctx.raw` is live while `ctx` is held
        let ptr = match key {
            Lookup::Name(name) => unsafe { ctx.api.handle_by_name(ctx.raw, class, name) }?,
            Lookup::Index(index) => unsafe { ctx.api.handle_by_index(ctx.raw, class, index) }?,
        };
        ctx.issue_some(ptr, Some(self.schema.index), || match key {
            Lookup::Name(name) => format!("{}.{}", self.schema.name, name),
            Lookup::Index(index) => format!("{} #{}", self.schema.name, index),
        })
    }

    /// Whether an object with this name exists
    pub fn contains(&self, name: &str) -> DssResult<bool> {
        match self.find(name) {
            Ok(_) => Ok(true),
            Err(DssError::NotFound(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Number of live objects of this class
    pub fn count(&self) -> DssResult<usize> {
        let ctx = self.ctx()?;
        count(&ctx, self.schema)
    }

    /// Lazy pass over the live objects, in engine order
    ///
    /// The object count is taken when the pass starts. Each call starts a
    /// fresh pass.
    pub fn iter(&self) -> DssResult<ClassIter> {
        let ctx = self.ctx()?;
        let total = count(&ctx, self.schema)?;
        Ok(ClassIter {
            ctx: self.ctx.clone(),
            schema: self.schema,
            next: 1,
            total: i32::try_from(total).unwrap_or(i32::MAX),
        })
    }

    // ------------------------------------------------------------------
    // Batches
    // ------------------------------------------------------------------

    /// Batch over every live object of this class, re-enumerated on access
    pub fn batch_all(&self) -> DssResult<ObjectBatch> {
        Ok(ObjectBatch::all(&self.ctx()?, self.schema))
    }

    /// Batch over existing objects, by name, in the given order
    pub fn batch_from_names<S: AsRef<str>>(&self, names: &[S]) -> DssResult<ObjectBatch> {
        ObjectBatch::from_names(&self.ctx()?, self.schema, names)
    }

    /// Batch over existing objects, by 1-based index
    pub fn batch_from_indices(&self, indices: &[i32]) -> DssResult<ObjectBatch> {
        ObjectBatch::from_indices(&self.ctx()?, self.schema, indices)
    }

    /// Create one object per name and batch them
    pub fn batch_new_named<S: AsRef<str>>(
        &self,
        names: &[S],
        begin_edit: bool,
    ) -> DssResult<ObjectBatch> {
        ObjectBatch::new_named(&self.ctx()?, self.schema, names, begin_edit)
    }

    /// Create `count` objects with generated names and batch them
    pub fn batch_new_count(&self, count: usize, begin_edit: bool) -> DssResult<ObjectBatch> {
        ObjectBatch::new_count(&self.ctx()?, self.schema, count, begin_edit)
    }

    /// Batch over already resolved handles of this class
    pub fn batch_from_handles(&self, handles: &[ObjectHandle]) -> DssResult<ObjectBatch> {
        ObjectBatch::from_handles(&self.ctx()?, self.schema, handles)
    }

    /// Batch over the objects whose name matches `pattern` (case-insensitive)
    pub fn batch_matching(&self, pattern: &str) -> DssResult<ObjectBatch> {
        ObjectBatch::matching(&self.ctx()?, self.schema, pattern)
    }

    /// Batch over the objects whose int32 property equals `value`
    pub fn batch_with_int32(&self, property: &str, value: i32) -> DssResult<ObjectBatch> {
        ObjectBatch::with_int32(&self.ctx()?, self.schema, property, value)
    }

    /// Create one object per name and set the same properties on all of
    /// them in one edit session
    ///
    /// Every member's session is closed even when a property fails; the
    /// first failure is returned.
    pub fn batch_new_with_properties<S: AsRef<str>>(
        &self,
        names: &[S],
        props: &[(&str, PropertyValue)],
    ) -> DssResult<ObjectBatch> {
        let batch = self.batch_new_named(names, true)?;

        let written = props.iter().try_for_each(|(prop, value)| {
            let def = self.schema.require(prop)?;
            if !value.fits(def.kind) {
                return Err(DssError::KindMismatch {
                    property: format!("{}.{}", self.schema.name, def.name),
                    expected: value.describe().to_string(),
                    actual: def.kind.to_string(),
                });
            }
            batch.set_value_all(def.index, value, SetterFlags::empty())
        });
        let change_count = i32::try_from(props.len()).unwrap_or(i32::MAX).max(1);
        let closed = batch.end_edit_all(change_count);

        written?;
        closed?;
        Ok(batch)
    }
}

impl std::fmt::Debug for ClassAccessor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClassAccessor")
            .field("class", &self.schema.name)
            .field("index", &self.schema.index)
            .finish()
    }
}

/// Lazy pass over the live objects of one class
pub struct ClassIter {
    ctx: Weak<ContextShared>,
    schema: &'static ClassSchema,
    next: i32,
    total: i32,
}

impl Iterator for ClassIter {
    type Item = DssResult<ObjectHandle>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.next > self.total {
            return None;
        }
        let index = self.next;
        self.next += 1;

        let Some(ctx) = self.ctx.upgrade() else {
            self.next = self.total + 1;
            return Some(Err(DssError::InvalidHandle));
        };
        Some(nth(&ctx, self.schema, index))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let left = usize::try_from(self.total - self.next + 1).unwrap_or(0);
        (left, Some(left))
    }
}

// ----------------------------------------------------------------------
// Shared with batch construction
// ----------------------------------------------------------------------

pub(crate) fn create(
    ctx: &Rc<ContextShared>,
    schema: &'static ClassSchema,
    name: &str,
    begin_edit: bool,
    activate: bool,
) -> DssResult<ObjectHandle> {
    let full_name = || format!("{}.{}", schema.name, name);
    // SAFETY: `ctx.raw` is live while `ctx` is held
    let ptr = unsafe {
        ctx.api
            .new_object(ctx.raw, schema.native_index(), name, activate, begin_edit)
    }
    .map_err(|e| DssError::ConstructionConflict(format!("{}: {}", full_name(), e)))?;
    if ptr.is_null() {
        return Err(DssError::ConstructionConflict(full_name()));
    }

    let handle = ctx.issue_some(ptr, Some(schema.index), full_name)?;
    if begin_edit {
        handle.mark_edit_open()?;
    }
    tracing::trace!(class = schema.name, name, "created object");
    Ok(handle)
}

pub(crate) fn count(ctx: &ContextShared, schema: &ClassSchema) -> DssResult<usize> {
    // SAFETY: `ctx.raw` is live while `ctx` is borrowed
    let count = unsafe { ctx.api.count(ctx.raw, schema.native_index()) }?;
    Ok(usize::try_from(count).unwrap_or(0))
}

pub(crate) fn nth(
    ctx: &Rc<ContextShared>,
    schema: &'static ClassSchema,
    index: i32,
) -> DssResult<ObjectHandle> {
    // SAFETY: `ctx.raw` is live while `ctx` is held
    let ptr = unsafe { ctx.api.handle_by_index(ctx.raw, schema.native_index(), index) }?;
    ctx.issue_some(ptr, Some(schema.index), || format!("{} #{}", schema.name, index))
}

/// Every live object of a class, in engine order
pub(crate) fn enumerate(
    ctx: &Rc<ContextShared>,
    schema: &'static ClassSchema,
) -> DssResult<Vec<ObjectHandle>> {
    let total = i32::try_from(count(ctx, schema)?).unwrap_or(i32::MAX);
    (1..=total).map(|index| nth(ctx, schema, index)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{fake_context, GADGET, WIDGET};
    use dssobj_engine::fake;

    #[test]
    fn test_new_rejects_duplicate_name() {
        let ctx = fake_context();
        let widgets = ctx.accessor(&WIDGET).unwrap();
        widgets.new("w1", false, true).unwrap();
        assert!(matches!(
            widgets.new("W1", false, true),
            Err(DssError::ConstructionConflict(_))
        ));
        assert_eq!(widgets.count().unwrap(), 1);
        // Same name in another class is fine
        ctx.accessor(&GADGET).unwrap().new("w1", false, true).unwrap();
    }

    #[test]
    fn test_new_with_begin_edit_starts_open() {
        let ctx = fake_context();
        let widgets = ctx.accessor(&WIDGET).unwrap();
        let w = widgets.new("w1", true, true).unwrap();
        assert!(w.is_editing());
        w.set(1, 3.0, SetterFlags::empty()).unwrap();
        w.end_edit(1).unwrap();
        assert_eq!(unsafe { fake::recalc_count(w.as_ptr().unwrap()) }, 1);
    }

    #[test]
    fn test_new_with_properties() {
        let ctx = fake_context();
        let widgets = ctx.accessor(&WIDGET).unwrap();
        let w = widgets
            .new_with_properties(
                "w1",
                &[
                    ("rating", PropertyValue::from(4.5)),
                    ("Count", PropertyValue::from(2)),
                    ("tags", PropertyValue::from(vec!["a".to_string()])),
                ],
            )
            .unwrap();
        let ptr = w.as_ptr().unwrap();
        assert!(!w.is_editing());
        assert_eq!(w.get::<f64>(1).unwrap(), 4.5);
        assert_eq!(unsafe { fake::recalc_count(ptr) }, 1);
        assert_eq!(unsafe { fake::last_change_count(ptr) }, 3);
    }

    #[test]
    fn test_new_with_properties_closes_session_on_failure() {
        let ctx = fake_context();
        let widgets = ctx.accessor(&WIDGET).unwrap();
        let err = widgets
            .new_with_properties(
                "w1",
                &[
                    ("Rating", PropertyValue::from(1.0)),
                    ("Bogus", PropertyValue::from(1.0)),
                ],
            )
            .unwrap_err();
        assert!(matches!(err, DssError::NotFound(_)));

        let w = widgets.find("w1").unwrap();
        assert!(!w.is_editing());
        assert!(!unsafe { fake::is_editing(w.as_ptr().unwrap()) });
        assert_eq!(w.get::<f64>(1).unwrap(), 1.0);
    }

    #[test]
    fn test_find_by_name_and_index() {
        let ctx = fake_context();
        let widgets = ctx.accessor(&WIDGET).unwrap();
        let a = widgets.new("a", false, true).unwrap();
        let b = widgets.new("b", false, true).unwrap();

        assert_eq!(widgets.find("B").unwrap(), b);
        assert_eq!(widgets.find(1).unwrap(), a);
        assert!(matches!(widgets.find(3), Err(DssError::NotFound(_))));
        assert!(matches!(widgets.find(0), Err(DssError::NotFound(_))));
        assert!(matches!(widgets.find("c"), Err(DssError::NotFound(_))));
        assert!(widgets.contains("a").unwrap());
        assert!(!widgets.contains("c").unwrap());
    }

    #[test]
    fn test_iter_is_restartable() {
        let ctx = fake_context();
        let widgets = ctx.accessor(&WIDGET).unwrap();
        for name in ["a", "b", "c"] {
            widgets.new(name, false, true).unwrap();
        }

        let names = |w: &ClassAccessor| -> Vec<String> {
            w.iter()
                .unwrap()
                .map(|h| h.and_then(|h| h.name()))
                .collect::<DssResult<_>>()
                .unwrap()
        };
        assert_eq!(names(&widgets), vec!["a", "b", "c"]);
        widgets.new("d", false, true).unwrap();
        assert_eq!(names(&widgets), vec!["a", "b", "c", "d"]);
        assert_eq!(widgets.iter().unwrap().size_hint(), (4, Some(4)));
    }

    #[test]
    fn test_accessor_outliving_context() {
        let ctx = fake_context();
        let widgets = ctx.accessor(&WIDGET).unwrap();
        drop(ctx);
        assert!(matches!(widgets.count(), Err(DssError::InvalidHandle)));
    }

    #[test]
    fn test_batch_new_with_properties() {
        let ctx = fake_context();
        let widgets = ctx.accessor(&WIDGET).unwrap();
        let batch = widgets
            .batch_new_with_properties(
                &["a", "b"],
                &[("Count", PropertyValue::from(9)), ("Label", PropertyValue::from("x"))],
            )
            .unwrap();
        assert_eq!(batch.get_all::<i32>(2).unwrap(), vec![9, 9]);
        for h in batch.iter().unwrap() {
            assert!(!h.is_editing());
            assert_eq!(unsafe { fake::last_change_count(h.as_ptr().unwrap()) }, 2);
        }
    }
}
