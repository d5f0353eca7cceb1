//! dssobj SDK - Native Engine Type Definitions
//!
//! This crate contains opaque type definitions and the flat function table
//! layout exported by the native simulation engine. It has no dependencies
//! and compiles quickly, allowing parallel compilation of dependent crates.
//!
//! # Modules
//!
//! - [`interfaces`] - Opaque native types and raw function signatures
//! - [`table`] - The `#[repr(C)]` function table handed over by the engine
//! - [`versions`] - ABI version and raw flag bits

pub mod interfaces;
pub mod table;
pub mod versions;

pub use interfaces::*;
pub use table::DssFunctionTable;
pub use versions::{json_bits, setter_bits, FUNCTION_TABLE_VERSION};
