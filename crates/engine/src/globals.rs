//! Global function table storage
//!
//! The engine's function table is acquired once per process and stored here.
//! Access is thread-safe via OnceLock. Contexts created from the table are
//! not shared: each one belongs to exactly one thread.

use std::sync::OnceLock;

use dssobj_sdk::DssFunctionTable;

use crate::error::InterfaceError;

/// Validated engine function table
///
/// Required entries are guaranteed to be present (checked by
/// [`crate::loader::load_function_table`]). Optional entries are looked up
/// per call and reported as [`crate::NativeError::Unsupported`] when absent.
pub struct EngineApi {
    pub(crate) table: DssFunctionTable,
}

// SAFETY: The table only holds function pointers into the engine library,
// which is immutable and lives for the entire process lifetime.
unsafe impl Send for EngineApi {}
unsafe impl Sync for EngineApi {}

/// Global function table storage
static API: OnceLock<EngineApi> = OnceLock::new();

/// Install the engine function table
///
/// Called once during host startup. Fails with
/// [`InterfaceError::AlreadyInitialized`] if a table is already installed.
pub fn init_api(api: EngineApi) -> Result<&'static EngineApi, InterfaceError> {
    API.set(api).map_err(|_| InterfaceError::AlreadyInitialized)?;
    API.get().ok_or(InterfaceError::NotInitialized)
}

/// Install the function table produced by `make` unless one is already present
///
/// Returns whichever table ends up installed.
pub fn get_or_init_api<F>(make: F) -> &'static EngineApi
where
    F: FnOnce() -> EngineApi,
{
    API.get_or_init(make)
}

/// Get the installed function table
///
/// # Panics
/// Panics if called before `init_api`
pub fn api() -> &'static EngineApi {
    API.get().expect("Function table not initialized")
}

/// Try to get the function table without panicking
pub fn try_api() -> Option<&'static EngineApi> {
    API.get()
}

/// Check if the function table is installed
pub fn is_api_initialized() -> bool {
    API.get().is_some()
}

impl EngineApi {
    /// ABI version reported by the engine
    pub fn version(&self) -> u32 {
        self.table.version
    }

    /// Raw access to the underlying table
    pub fn table(&self) -> &DssFunctionTable {
        &self.table
    }

    /// Whether batch serialization is available
    pub fn has_batch_to_json(&self) -> bool {
        self.table.batch_to_json.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fake;
    use crate::loader::load_function_table;

    #[test]
    fn test_second_install_rejected() {
        let installed = fake::install();
        let table = fake::function_table();
        let again = unsafe { load_function_table(&table) }.unwrap();

        assert!(matches!(init_api(again), Err(InterfaceError::AlreadyInitialized)));
        assert!(std::ptr::eq(api(), installed));
    }
}
