//! Engine context ownership
//!
//! A [`DssContext`] owns one native context: its objects, its error slot, its
//! class registry and the registry of every handle it issued. Handles,
//! batches and accessors keep a weak reference to the shared state, so they
//! are `!Send` and they fail with [`DssError::InvalidHandle`] once the
//! context is gone.
//!
//! # Lifecycle
//!
//! ```text
//! DssContext::new ──► ctx_new
//!       │
//!       ├── accessor(&SCHEMA) ──► ClassAccessor ──► ObjectHandle / ObjectBatch
//!       │
//!       ├── clear_all ──► invalidate every handle, then clear the engine
//!       │
//!       └── drop ──► invalidate every handle, then ctx_dispose
//! ```

use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use dssobj_engine::{try_api, EngineApi, InterfaceError};
use dssobj_sdk::{ContextPtr, ObjectPtr};

use crate::accessor::ClassAccessor;
use crate::config::CoreConfig;
use crate::error::{DssError, DssResult};
use crate::handle::registry::HandleRegistry;
use crate::handle::ObjectHandle;
use crate::schema::registry::ClassRegistry;
use crate::schema::{ClassSchema, DssClass};

static NEXT_CONTEXT_ID: AtomicU64 = AtomicU64::new(1);

/// State shared by a context and everything derived from it
pub(crate) struct ContextShared {
    pub id: u64,
    pub api: &'static EngineApi,
    pub raw: ContextPtr,
    pub handles: RefCell<HandleRegistry>,
    pub classes: RefCell<ClassRegistry>,
    pub config: CoreConfig,
    batch_serial: Cell<u64>,
}

impl ContextShared {
    /// Registered schema for a class index
    pub fn schema(&self, index: u32) -> DssResult<&'static ClassSchema> {
        self.classes
            .borrow()
            .get(index)
            .ok_or_else(|| DssError::NotFound(format!("class index {}", index)))
    }

    /// Serial used to generate unique names for batch-created objects
    pub fn next_batch_serial(&self) -> u64 {
        let serial = self.batch_serial.get() + 1;
        self.batch_serial.set(serial);
        serial
    }

    /// Issue a handle for a native pointer (`None` for null)
    ///
    /// Without a class hint, the class is resolved through the engine and
    /// must be registered.
    pub fn issue(
        self: &Rc<Self>,
        ptr: ObjectPtr,
        class_index: Option<u32>,
    ) -> DssResult<Option<ObjectHandle>> {
        if ptr.is_null() {
            return Ok(None);
        }
        if let Some(key) = self.handles.borrow().lookup(ptr) {
            return Ok(Some(ObjectHandle::new(self, key)));
        }

        let class_index = match class_index {
            Some(index) => index,
            None => {
                // SAFETY: `ptr` was just returned by the engine for this context
                let raw = unsafe { self.api.class_index(self.raw, ptr) }?;
                let index = u32::try_from(raw)
                    .map_err(|_| DssError::NotFound(format!("class index {}", raw)))?;
                self.schema(index)?;
                index
            }
        };

        let key = self.handles.borrow_mut().register(ptr, class_index);
        Ok(Some(ObjectHandle::new(self, key)))
    }

    /// Issue a handle for a pointer that must not be null
    pub fn issue_some(
        self: &Rc<Self>,
        ptr: ObjectPtr,
        class_index: Option<u32>,
        what: impl FnOnce() -> String,
    ) -> DssResult<ObjectHandle> {
        self.issue(ptr, class_index)?
            .ok_or_else(|| DssError::NotFound(what()))
    }
}

impl Drop for ContextShared {
    fn drop(&mut self) {
        let invalidated = self.handles.get_mut().invalidate_all();
        // SAFETY: `raw` is live and nothing can reach it after this point
        if let Err(e) = unsafe { self.api.ctx_dispose(self.raw) } {
            tracing::warn!("Failed to dispose context #{}: {}", self.id, e);
        }
        tracing::info!(
            "Context #{} disposed ({} handles invalidated)",
            self.id,
            invalidated
        );
    }
}

/// Owner of one native engine context
///
/// # Example
///
/// ```ignore
/// use dssobj_core::{DssContext, SetterFlags};
///
/// let ctx = DssContext::new()?;
/// let widgets = ctx.accessor(&WIDGET)?;
/// let w1 = widgets.new("w1", false, true)?;
/// w1.set(1, 2.5, SetterFlags::empty())?;
/// assert_eq!(w1.get::<f64>(1)?, 2.5);
/// ```
pub struct DssContext {
    shared: Rc<ContextShared>,
}

impl DssContext {
    /// Create a context on the installed function table with default config
    pub fn new() -> DssResult<Self> {
        Self::with_config(CoreConfig::default())
    }

    /// Create a context on the installed function table
    pub fn with_config(config: CoreConfig) -> DssResult<Self> {
        let api = try_api().ok_or(InterfaceError::NotInitialized)?;
        Self::with_api(api, config)
    }

    /// Create a context on an explicit function table
    pub fn with_api(api: &'static EngineApi, config: CoreConfig) -> DssResult<Self> {
        // SAFETY: `api` is a validated function table
        let raw = unsafe { api.ctx_new() }?;
        let id = NEXT_CONTEXT_ID.fetch_add(1, Ordering::Relaxed);
        tracing::info!("Context #{} created", id);

        Ok(Self {
            shared: Rc::new(ContextShared {
                id,
                api,
                raw,
                handles: RefCell::new(HandleRegistry::default()),
                classes: RefCell::new(ClassRegistry::default()),
                config,
                batch_serial: Cell::new(0),
            }),
        })
    }

    /// Process-unique id of this context
    pub fn id(&self) -> u64 {
        self.shared.id
    }

    pub fn config(&self) -> &CoreConfig {
        &self.shared.config
    }

    /// Raw native context pointer
    pub fn as_ptr(&self) -> ContextPtr {
        self.shared.raw
    }

    /// Register a class schema
    ///
    /// Fails with [`DssError::ClassConflict`] if a different schema already
    /// owns the class index.
    pub fn register_class(&self, schema: &'static ClassSchema) -> DssResult<()> {
        self.shared.classes.borrow_mut().register(schema)
    }

    /// Register the schema of a derived class
    pub fn register<C: DssClass>(&self) -> DssResult<()> {
        self.register_class(C::schema())
    }

    /// Number of registered classes
    pub fn class_count(&self) -> usize {
        self.shared.classes.borrow().len()
    }

    /// Registered schema for a class index
    pub fn schema(&self, index: u32) -> Option<&'static ClassSchema> {
        self.shared.classes.borrow().get(index)
    }

    /// Accessor for a class, registering its schema first
    pub fn accessor(&self, schema: &'static ClassSchema) -> DssResult<ClassAccessor> {
        self.register_class(schema)?;
        Ok(ClassAccessor::bind(&self.shared, schema))
    }

    /// Accessor for a derived class
    pub fn accessor_for<C: DssClass>(&self) -> DssResult<ClassAccessor> {
        self.accessor(C::schema())
    }

    /// Accessor for an already registered class, by name
    pub fn class(&self, name: &str) -> DssResult<ClassAccessor> {
        let schema = self
            .shared
            .classes
            .borrow()
            .by_name(name)
            .ok_or_else(|| DssError::NotFound(format!("class {}", name)))?;
        Ok(ClassAccessor::bind(&self.shared, schema))
    }

    /// Remove every object from the engine
    ///
    /// All handles issued so far are invalidated before the engine frees
    /// the objects.
    pub fn clear_all(&self) -> DssResult<()> {
        let invalidated = self.shared.handles.borrow_mut().invalidate_all();
        tracing::debug!(
            "Context #{}: clear_all invalidated {} handles",
            self.shared.id,
            invalidated
        );
        // SAFETY: `raw` is live; no handle can reach the freed objects
        unsafe { self.shared.api.clear_all(self.shared.raw) }?;
        Ok(())
    }

    /// Number of live handle slots (one per distinct native object)
    pub fn live_handles(&self) -> usize {
        self.shared.handles.borrow().len()
    }
}

impl std::fmt::Debug for DssContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DssContext")
            .field("id", &self.shared.id)
            .field("live_handles", &self.live_handles())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{fake_context, GADGET, WIDGET};
    use dssobj_engine::fake;

    static WIDGET_IMPOSTOR: ClassSchema = ClassSchema::new(fake::WIDGET as u32, "Impostor", &[]);

    #[test]
    fn test_clear_all_invalidates_handles() {
        let ctx = fake_context();
        let widgets = ctx.accessor(&WIDGET).unwrap();
        let w = widgets.new("w1", false, true).unwrap();
        assert!(w.is_live());

        ctx.clear_all().unwrap();
        assert!(!w.is_live());
        assert!(matches!(w.get::<f64>(1), Err(DssError::InvalidHandle)));
        assert_eq!(widgets.count().unwrap(), 0);
        assert_eq!(ctx.live_handles(), 0);
    }

    #[test]
    fn test_drop_invalidates_handles() {
        let ctx = fake_context();
        let w = ctx.accessor(&WIDGET).unwrap().new("w1", false, true).unwrap();
        drop(ctx);
        assert!(!w.is_live());
        assert!(matches!(w.name(), Err(DssError::InvalidHandle)));
    }

    #[test]
    fn test_duplicate_class_index_rejected() {
        let ctx = fake_context();
        ctx.register_class(&WIDGET).unwrap();
        assert!(matches!(
            ctx.register_class(&WIDGET_IMPOSTOR),
            Err(DssError::ClassConflict(1))
        ));
        assert!(ctx.accessor(&WIDGET_IMPOSTOR).is_err());
    }

    #[test]
    fn test_class_by_name() {
        let ctx = fake_context();
        ctx.register_class(&GADGET).unwrap();
        ctx.register_class(&GADGET).unwrap();
        assert_eq!(ctx.class_count(), 1);
        assert_eq!(ctx.class("gadget").unwrap().name(), "Gadget");
        assert!(matches!(ctx.class("Widget"), Err(DssError::NotFound(_))));
    }

    #[test]
    fn test_contexts_are_independent() {
        let a = fake_context();
        let b = fake_context();
        assert_ne!(a.id(), b.id());
        a.accessor(&WIDGET).unwrap().new("w1", false, true).unwrap();
        assert_eq!(b.accessor(&WIDGET).unwrap().count().unwrap(), 0);
    }
}
