//! dssobj - Typed object and batch access
//!
//! This crate sits on top of the engine's flat function table and exposes
//! its objects as handles, batches and lazy per-property views, with edit
//! sessions and the engine's error slot turned into `Result`s.
//!
//! # Re-exports
//!
//! This crate re-exports the SDK and engine crates for convenience:
//! - [`sdk`] - Function table layout and option bits
//! - [`engine`] - Table loading and the native call adapter
//!
//! # Example
//!
//! ```ignore
//! use dssobj_core::{DssContext, SetterFlags};
//!
//! dssobj_core::engine::load_from_entry_point(entry)?;
//! let ctx = DssContext::new()?;
//! let widgets = ctx.accessor(&WIDGET)?;
//!
//! let batch = widgets.batch_new_named(&["a", "b", "c"], false)?;
//! batch.set_all(RATING, 10.0, SetterFlags::empty())?;
//! ```

// Allow the crate to refer to itself as `dssobj_core` for proc macro compatibility
extern crate self as dssobj_core;

// Re-export SDK and engine crates
pub use dssobj_engine as engine;
pub use dssobj_sdk as sdk;

pub mod accessor;
pub mod batch;
pub mod config;
pub mod context;
pub mod edit;
pub mod error;
pub mod flags;
pub mod handle;
pub mod logging;
pub mod schema;
pub mod value;

#[cfg(test)]
mod testing;

pub use accessor::{ClassAccessor, ClassIter, Lookup};
pub use batch::{BatchArrayProxy, ObjectBatch, ProxyValue};
pub use config::{ConfigError, ConfigResult, CoreConfig};
pub use context::DssContext;
pub use edit::{BatchEditGuard, EditGuard};
pub use error::{DssError, DssResult, SessionMisuse};
pub use flags::{JsonFlags, SetterFlags};
pub use handle::{HandleKey, ObjectHandle};
pub use schema::{ArrayElement, ClassSchema, DssClass, Numeric, PropertyDef, PropertyKind, Scalar};
pub use value::{PropertyValue, RefTarget, ScalarValue, VectorValue};

// Re-export macros
pub use dssobj_macros::DssClass;
