//! Attribute parsing for the DssClass derive macro

use darling::{FromDeriveInput, FromField};
use syn::{DeriveInput, Ident, Type};

/// Parsed #[dss(...)] attributes on the struct
#[derive(Debug, FromDeriveInput)]
#[darling(attributes(dss), supports(struct_named))]
pub struct DssClassArgs {
    /// Struct identifier
    pub ident: Ident,

    /// Struct fields
    pub data: darling::ast::Data<(), DssFieldArgs>,

    /// Engine class name (e.g., "Line")
    #[darling(rename = "class")]
    pub class_name: String,

    /// Engine class index
    pub index: u32,
}

/// Parsed #[dss(...)] attributes on a field
#[derive(Debug, FromField)]
#[darling(attributes(dss))]
pub struct DssFieldArgs {
    /// Field identifier
    pub ident: Option<Ident>,

    /// Field type
    pub ty: Type,

    /// Property index. Fields without one are not properties (e.g., the
    /// handle field)
    pub index: Option<i32>,

    /// Property name as the engine spells it (defaults to the field name)
    pub name: Option<String>,

    /// Explicit kind ("int32", "float64[]", ...) when the type alone is not
    /// enough, e.g. enumerations stored as int32
    pub kind: Option<String>,

    /// Whether to skip the setter
    #[darling(default)]
    pub readonly: bool,
}

impl DssFieldArgs {
    /// Check if this is a property field (has an index attribute)
    pub fn is_property(&self) -> bool {
        self.index.is_some()
    }

    /// Check if this is the handle field
    pub fn is_handle_field(&self) -> bool {
        self.ident.as_ref().map(|i| i == "handle").unwrap_or(false)
    }

    /// Field name without a leading underscore
    pub fn clean_name(&self) -> String {
        let name = self.ident.as_ref().map(|i| i.to_string()).unwrap_or_default();
        name.strip_prefix('_').unwrap_or(&name).to_string()
    }
}

/// Parse a DeriveInput into DssClassArgs
pub fn parse_dss_class(input: &DeriveInput) -> darling::Result<DssClassArgs> {
    DssClassArgs::from_derive_input(input)
}
