//! dssobj Engine - Function Table Loading and Native Call Adapter
//!
//! This crate handles:
//! - Validating the engine's flat function table
//! - Storing the table in a process-wide static
//! - Wrapping every table entry in a checked call that drains the
//!   context's error slot and releases engine-allocated buffers
//!
//! # Architecture
//!
//! The table is acquired once via [`loader::load_function_table`] (or
//! [`loader::load_from_entry_point`]) and installed with [`init_api`]. Typed
//! wrappers live on [`EngineApi`] and take the raw context pointer so the
//! right error slot is checked after each call.
//!
//! # Thread Safety
//!
//! The table itself is immutable and shared. Contexts and objects created
//! through it are single-threaded; that restriction is enforced one layer up
//! in `dssobj-core`.

mod buffers;
mod calls;
pub mod error;
#[cfg(any(test, feature = "fake"))]
pub mod fake;
pub mod globals;
pub mod loader;

pub use error::{InterfaceError, NativeError, NativeResult};
pub use globals::{api, get_or_init_api, init_api, is_api_initialized, try_api, EngineApi};
pub use loader::{load_from_entry_point, load_function_table};
