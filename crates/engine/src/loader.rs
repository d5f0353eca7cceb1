//! Function table loading and validation

use dssobj_sdk::{DssFunctionTable, GetFunctionTableFn, FUNCTION_TABLE_VERSION};

use crate::error::InterfaceError;
use crate::globals::EngineApi;

/// Collect the names of every unset entry among the listed fields
macro_rules! missing_entries {
    ($table:expr, $($field:ident),* $(,)?) => {{
        let mut missing: Vec<&'static str> = Vec::new();
        $(
            if $table.$field.is_none() {
                missing.push(stringify!($field));
            }
        )*
        missing
    }};
}

/// Require `$dispose` whenever `$getter` is provided
macro_rules! paired_entries {
    ($table:expr, $missing:expr, $(($getter:ident, $dispose:ident)),* $(,)?) => {
        $(
            if $table.$getter.is_some() && $table.$dispose.is_none() {
                $missing.push(stringify!($dispose));
            }
        )*
    };
}

/// Validate a function table copied from the engine
///
/// # Arguments
/// * `table` - Pointer to the engine's static function table
///
/// # Safety
/// `table` must be null or point to a valid `DssFunctionTable`
#[tracing::instrument(skip_all)]
pub unsafe fn load_function_table(
    table: *const DssFunctionTable,
) -> Result<EngineApi, InterfaceError> {
    if table.is_null() {
        return Err(InterfaceError::NullPointer("DssFunctionTable".into()));
    }
    let table = *table;

    if table.version != FUNCTION_TABLE_VERSION {
        return Err(InterfaceError::VersionMismatch {
            expected: FUNCTION_TABLE_VERSION,
            found: table.version,
        });
    }

    // Required entries - fail if any are missing
    let mut missing = missing_entries!(
        table,
        ctx_new,
        ctx_dispose,
        error_get_number,
        error_get_description,
        error_clear,
        new_object,
        get_handle_by_name,
        get_handle_by_idx,
        get_count,
        get_class_idx,
        get_name,
        begin_edit,
        end_edit,
        get_int32,
        set_int32,
        get_float64,
        set_float64,
        get_string,
        set_string,
        get_object,
        set_object,
        dispose_string,
    );

    // Optional getters are only usable together with their disposer
    paired_entries!(
        table,
        missing,
        (get_int32_array, dispose_int32_array),
        (get_float64_array, dispose_float64_array),
        (get_string_array, dispose_string_array),
        (get_object_array, dispose_pointer_array),
    );

    if !missing.is_empty() {
        return Err(InterfaceError::MissingEntries(missing.join(", ")));
    }

    // Optional entries - log but don't fail
    let optional = missing_entries!(
        table,
        clear_all,
        get_int32_array,
        set_int32_array,
        get_float64_array,
        set_float64_array,
        get_string_array,
        set_string_array,
        get_object_array,
        set_object_array,
        to_json,
        batch_to_json,
    );
    for name in &optional {
        tracing::debug!("Function table entry `{}`: not available", name);
    }

    tracing::info!(
        "Function table v{} loaded ({} optional entries missing)",
        table.version,
        optional.len()
    );

    Ok(EngineApi { table })
}

/// Load the function table through the engine's entry point
///
/// # Safety
/// `entry` must be the engine's `DSS_GetFunctionTable` export
#[tracing::instrument(skip_all)]
pub unsafe fn load_from_entry_point(entry: GetFunctionTableFn) -> Result<EngineApi, InterfaceError> {
    let ptr = entry(FUNCTION_TABLE_VERSION) as *const DssFunctionTable;
    if ptr.is_null() {
        return Err(InterfaceError::NullPointer(format!(
            "DSS_GetFunctionTable(v{})",
            FUNCTION_TABLE_VERSION
        )));
    }
    load_function_table(ptr)
}
