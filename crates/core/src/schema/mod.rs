//! Class Schema - Data-driven description of engine classes
//!
//! The engine routes every property access by (class index, property index).
//! This module maps those integers to names and declared kinds so one generic
//! accessor can serve every class.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    ClassSchema (static)                     │
//! │   index, name, [PropertyDef { name, index, kind }]          │
//! └─────────────────────────────┬───────────────────────────────┘
//!                               │ register
//!                               ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │              ClassRegistry (one per DssContext)             │
//! │   class index -> schema (injective)                         │
//! └─────────────────────────────┬───────────────────────────────┘
//!                               │
//!                               ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │   ClassAccessor / ObjectHandle / ObjectBatch                │
//! │   get::<T: Scalar>(idx), get_array::<T: ArrayElement>(idx)  │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ## Hand-written table
//!
//! ```ignore
//! use dssobj_core::schema::{ClassSchema, PropertyDef, PropertyKind};
//!
//! static LINE: ClassSchema = ClassSchema::new(
//!     7,
//!     "Line",
//!     &[
//!         PropertyDef::new("Length", 1, PropertyKind::Float64),
//!         PropertyDef::new("Bus1", 2, PropertyKind::String),
//!     ],
//! );
//!
//! let lines = ctx.accessor(&LINE)?;
//! let len: f64 = lines.find("L1")?.get(1)?;
//! ```
//!
//! ## Derived
//!
//! ```ignore
//! #[derive(DssClass)]
//! #[dss(class = "Line", index = 7)]
//! pub struct Line {
//!     handle: ObjectHandle,
//!     #[dss(index = 1, name = "Length")]
//!     _length: PhantomData<f64>,
//! }
//!
//! let line: Line = ctx.accessor_for::<Line>()?.find("L1")?.downcast().unwrap();
//! line.set_length(2.5, SetterFlags::empty())?;
//! ```

mod class;
pub(crate) mod registry;
mod types;

pub use class::{ClassSchema, PropertyDef, PropertyKind};
pub use types::{ArrayElement, Numeric, Scalar};

use crate::handle::ObjectHandle;

/// Typed wrapper around an [`ObjectHandle`] of one known class
///
/// This trait is implemented by the `#[derive(DssClass)]` macro.
pub trait DssClass: Sized {
    /// Class name as the engine spells it
    const CLASS_NAME: &'static str;

    /// Class index used in class-level calls
    const CLASS_INDEX: u32;

    /// The class's schema table
    fn schema() -> &'static ClassSchema;

    /// Wrap a handle without checking its class
    ///
    /// Prefer [`ObjectHandle::downcast`], which checks the class index.
    fn from_handle(handle: ObjectHandle) -> Self;

    /// The underlying handle
    fn handle(&self) -> &ObjectHandle;
}

#[cfg(test)]
mod tests {
    use std::marker::PhantomData;

    use super::*;
    use crate::testing::{fake_context, GADGET};
    use crate::{DssError, SetterFlags};
    use dssobj_engine::fake;

    #[derive(crate::DssClass)]
    #[dss(class = "Widget", index = 1)]
    struct Widget {
        handle: ObjectHandle,

        #[dss(index = 1, name = "Rating")]
        _rating: PhantomData<f64>,

        #[dss(index = 2, name = "Count")]
        _count: PhantomData<i32>,

        #[dss(index = 5, name = "Peer")]
        _peer: PhantomData<Option<ObjectHandle>>,

        #[dss(index = 6, name = "Weights")]
        _weights: PhantomData<Vec<f64>>,

        #[dss(index = 10, name = "Mode", kind = "enum", readonly)]
        _mode: PhantomData<i32>,
    }

    #[test]
    fn test_derived_schema_table() {
        let schema = Widget::schema();
        assert_eq!(Widget::CLASS_INDEX, fake::WIDGET as u32);
        assert_eq!(schema.name, "Widget");
        assert_eq!(schema.require("peer").unwrap().kind, PropertyKind::Object);
        assert_eq!(schema.property_at(6).unwrap().kind, PropertyKind::Float64Array);
        assert_eq!(Widget::RATING, 1);
        assert_eq!(Widget::MODE, 10);
    }

    #[test]
    fn test_derived_accessors() {
        let ctx = fake_context();
        let widgets = ctx.accessor_for::<Widget>().unwrap();
        let gadget = ctx.accessor(&GADGET).unwrap().new("g", false, true).unwrap();
        let w: Widget = widgets.new("w", false, true).unwrap().downcast().unwrap();
        let f = SetterFlags::empty();

        w.set_rating(2.5, f).unwrap();
        w.set_count(4, f).unwrap();
        w.set_peer(Some(&gadget), f).unwrap();
        w.set_weights(&[1.0, 2.0], f).unwrap();

        assert_eq!(w.rating().unwrap(), 2.5);
        assert_eq!(w.count().unwrap(), 4);
        assert_eq!(w.peer().unwrap(), Some(gadget.clone()));
        assert_eq!(w.weights().unwrap(), vec![1.0, 2.0]);
        assert_eq!(w.mode().unwrap(), 0);
        assert!(matches!(w.set_rating(-1.0, f), Err(DssError::Native { .. })));

        assert!(gadget.downcast::<Widget>().is_none());
        assert_eq!(w.handle().full_name().unwrap(), "Widget.w");
    }
}
