//! Static class descriptions
//!
//! A [`ClassSchema`] maps property names to the integer indices the engine
//! routes on, together with the declared kind of each property. Tables are
//! `'static`: they are written by hand or emitted by `#[derive(DssClass)]`.

use std::fmt;

use crate::error::{DssError, DssResult};

/// Declared kind of a property
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PropertyKind {
    Bool,
    Int32,
    Float64,
    String,
    Object,
    Int32Array,
    Float64Array,
    StringArray,
    ObjectArray,
}

impl PropertyKind {
    /// Whether values of this kind are sequences
    pub const fn is_array(self) -> bool {
        matches!(
            self,
            PropertyKind::Int32Array
                | PropertyKind::Float64Array
                | PropertyKind::StringArray
                | PropertyKind::ObjectArray
        )
    }

    /// Whether values of this kind are object references
    pub const fn is_reference(self) -> bool {
        matches!(self, PropertyKind::Object | PropertyKind::ObjectArray)
    }
}

impl fmt::Display for PropertyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PropertyKind::Bool => "bool",
            PropertyKind::Int32 => "int32",
            PropertyKind::Float64 => "float64",
            PropertyKind::String => "string",
            PropertyKind::Object => "object",
            PropertyKind::Int32Array => "int32[]",
            PropertyKind::Float64Array => "float64[]",
            PropertyKind::StringArray => "string[]",
            PropertyKind::ObjectArray => "object[]",
        };
        f.write_str(name)
    }
}

/// One property of a class
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PropertyDef {
    /// Property name as the engine spells it
    pub name: &'static str,
    /// 1-based property index
    pub index: i32,
    /// Declared kind
    pub kind: PropertyKind,
}

impl PropertyDef {
    pub const fn new(name: &'static str, index: i32, kind: PropertyKind) -> Self {
        Self { name, index, kind }
    }
}

/// Description of one engine class
#[derive(Debug, PartialEq, Eq)]
pub struct ClassSchema {
    /// Class index used in class-level calls
    pub index: u32,
    /// Class name (also the prefix of full object names)
    pub name: &'static str,
    /// Properties in index order
    pub properties: &'static [PropertyDef],
}

impl ClassSchema {
    pub const fn new(index: u32, name: &'static str, properties: &'static [PropertyDef]) -> Self {
        Self {
            index,
            name,
            properties,
        }
    }

    /// Find a property by name (case-insensitive)
    pub fn property(&self, name: &str) -> Option<&'static PropertyDef> {
        let properties: &'static [PropertyDef] = self.properties;
        properties.iter().find(|p| p.name.eq_ignore_ascii_case(name))
    }

    /// Find a property by index
    pub fn property_at(&self, index: i32) -> Option<&'static PropertyDef> {
        let properties: &'static [PropertyDef] = self.properties;
        properties.iter().find(|p| p.index == index)
    }

    /// Resolve a property name, failing with `NotFound`
    pub fn require(&self, name: &str) -> DssResult<&'static PropertyDef> {
        self.property(name)
            .ok_or_else(|| DssError::NotFound(format!("{}.{}", self.name, name)))
    }

    /// Class index as passed to the engine
    pub(crate) fn native_index(&self) -> i32 {
        self.index as i32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    static SAMPLE: ClassSchema = ClassSchema::new(
        4,
        "Sample",
        &[
            PropertyDef::new("Rating", 1, PropertyKind::Float64),
            PropertyDef::new("Links", 2, PropertyKind::ObjectArray),
        ],
    );

    #[test]
    fn test_property_lookup_is_case_insensitive() {
        assert_eq!(SAMPLE.property("rating").map(|p| p.index), Some(1));
        assert_eq!(SAMPLE.property("LINKS").map(|p| p.kind), Some(PropertyKind::ObjectArray));
        assert!(SAMPLE.property("missing").is_none());
    }

    #[test]
    fn test_require_reports_qualified_name() {
        match SAMPLE.require("Nope") {
            Err(DssError::NotFound(name)) => assert_eq!(name, "Sample.Nope"),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_kind_predicates() {
        assert!(PropertyKind::ObjectArray.is_array());
        assert!(PropertyKind::ObjectArray.is_reference());
        assert!(!PropertyKind::Float64.is_array());
        assert_eq!(PropertyKind::Int32Array.to_string(), "int32[]");
    }
}
