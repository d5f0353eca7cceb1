//! dssobj Proc Macros
//!
//! This crate provides `#[derive(DssClass)]`, which turns a struct holding
//! an `ObjectHandle` into a typed wrapper for one engine class.
//!
//! # Example
//!
//! ```ignore
//! use dssobj_core::{DssClass, ObjectHandle, SetterFlags};
//! use std::marker::PhantomData;
//!
//! #[derive(DssClass)]
//! #[dss(class = "Line", index = 7)]
//! pub struct Line {
//!     handle: ObjectHandle,
//!
//!     #[dss(index = 1, name = "Length")]
//!     _length: PhantomData<f64>,
//!
//!     #[dss(index = 2, name = "Bus1")]
//!     _bus1: PhantomData<String>,
//!
//!     #[dss(index = 3, name = "Phases", readonly)]
//!     _phases: PhantomData<i32>,
//! }
//!
//! // Generated:
//! // - Line::LENGTH, Line::BUS1, Line::PHASES (property indices)
//! // - line.length() -> DssResult<f64>
//! // - line.set_length(2.5, SetterFlags::empty()) -> DssResult<()>
//! // - line.phases() -> DssResult<i32> (no setter)
//! // - impl DssClass for Line, with a static ClassSchema
//! ```
//!
//! # Attributes
//!
//! ## Struct Attributes
//!
//! - `#[dss(class = "Name")]` - **Required.** The engine class name.
//! - `#[dss(index = N)]` - **Required.** The engine class index.
//!
//! ## Field Attributes
//!
//! - `#[dss(index = N)]` - Mark as a property with the given 1-based index.
//! - `#[dss(name = "Name")]` - Property name (default: the field name).
//! - `#[dss(kind = "int32")]` - Override the kind inferred from the type.
//! - `#[dss(readonly)]` - Don't generate a setter.
//!
//! The struct must have a field named `handle` of type `ObjectHandle`.

mod dss_class;
mod parse;

use proc_macro::TokenStream;
use syn::{parse_macro_input, DeriveInput};

/// Derive macro for typed class wrappers
///
/// Property kinds are inferred from the field type (`PhantomData<T>` is
/// unwrapped): `bool`, `i32`, `f64`, `String`, `ObjectHandle` (or
/// `Option<ObjectHandle>`), and `Vec<_>` of `i32`, `f64`, `String` or
/// `ObjectHandle`.
///
/// # Generated Code
///
/// For each property field, the macro generates:
///
/// - An index constant (`const LENGTH: i32`)
/// - A getter (`fn length(&self) -> DssResult<f64>`)
/// - A setter (`fn set_length(&self, value: f64, flags: SetterFlags)`) unless `readonly`
///
/// Array properties take and return slices and vectors; object properties
/// go through `get_object_ref`/`set_object_ref`.
#[proc_macro_derive(DssClass, attributes(dss))]
pub fn derive_dss_class(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    dss_class::derive_dss_class(input).into()
}
