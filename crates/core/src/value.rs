//! Dynamically shaped property values
//!
//! [`PropertyValue`] is resolved once at the API boundary into exactly one
//! native setter call: scalars go through the typed setters, references
//! through the object setters, names through the string setters (the engine
//! resolves them).

use crate::handle::ObjectHandle;
use crate::schema::PropertyKind;

/// A single scalar
#[derive(Debug, Clone, PartialEq)]
pub enum ScalarValue {
    Bool(bool),
    Int32(i32),
    Float64(f64),
    Text(String),
}

/// A homogeneous sequence
#[derive(Debug, Clone, PartialEq)]
pub enum VectorValue {
    Int32(Vec<i32>),
    Float64(Vec<f64>),
    Text(Vec<String>),
}

impl VectorValue {
    pub fn len(&self) -> usize {
        match self {
            VectorValue::Int32(v) => v.len(),
            VectorValue::Float64(v) => v.len(),
            VectorValue::Text(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Any value a property setter accepts
#[derive(Debug, Clone, PartialEq)]
pub enum PropertyValue {
    Scalar(ScalarValue),
    /// An object reference, `None` clears it
    Reference(Option<ObjectHandle>),
    /// An object reference by name (`Name` or `Class.Name`)
    Name(String),
    Vector(VectorValue),
    ReferenceList(Vec<ObjectHandle>),
    NameList(Vec<String>),
}

impl PropertyValue {
    /// Reference by name
    pub fn name(name: impl Into<String>) -> Self {
        PropertyValue::Name(name.into())
    }

    /// Short description used in kind-mismatch errors
    pub fn describe(&self) -> &'static str {
        match self {
            PropertyValue::Scalar(ScalarValue::Bool(_)) => "bool",
            PropertyValue::Scalar(ScalarValue::Int32(_)) => "int32",
            PropertyValue::Scalar(ScalarValue::Float64(_)) => "float64",
            PropertyValue::Scalar(ScalarValue::Text(_)) => "string",
            PropertyValue::Reference(_) => "object reference",
            PropertyValue::Name(_) => "object name",
            PropertyValue::Vector(VectorValue::Int32(_)) => "int32[]",
            PropertyValue::Vector(VectorValue::Float64(_)) => "float64[]",
            PropertyValue::Vector(VectorValue::Text(_)) => "string[]",
            PropertyValue::ReferenceList(_) => "object reference list",
            PropertyValue::NameList(_) => "object name list",
        }
    }

    /// Whether this value can be written to a property of `kind`
    ///
    /// Text values always fit: the engine parses them.
    pub fn fits(&self, kind: PropertyKind) -> bool {
        use PropertyKind as K;
        match self {
            PropertyValue::Scalar(ScalarValue::Text(_)) => true,
            PropertyValue::Scalar(_) => matches!(kind, K::Bool | K::Int32 | K::Float64),
            PropertyValue::Reference(_) | PropertyValue::Name(_) => kind == K::Object,
            PropertyValue::Vector(VectorValue::Text(_)) => kind.is_array(),
            PropertyValue::Vector(_) => matches!(kind, K::Int32Array | K::Float64Array),
            PropertyValue::ReferenceList(_) | PropertyValue::NameList(_) => kind == K::ObjectArray,
        }
    }
}

impl From<bool> for PropertyValue {
    fn from(value: bool) -> Self {
        PropertyValue::Scalar(ScalarValue::Bool(value))
    }
}

impl From<i32> for PropertyValue {
    fn from(value: i32) -> Self {
        PropertyValue::Scalar(ScalarValue::Int32(value))
    }
}

impl From<f64> for PropertyValue {
    fn from(value: f64) -> Self {
        PropertyValue::Scalar(ScalarValue::Float64(value))
    }
}

impl From<&str> for PropertyValue {
    fn from(value: &str) -> Self {
        PropertyValue::Scalar(ScalarValue::Text(value.to_string()))
    }
}

impl From<String> for PropertyValue {
    fn from(value: String) -> Self {
        PropertyValue::Scalar(ScalarValue::Text(value))
    }
}

impl From<Vec<i32>> for PropertyValue {
    fn from(value: Vec<i32>) -> Self {
        PropertyValue::Vector(VectorValue::Int32(value))
    }
}

impl From<Vec<f64>> for PropertyValue {
    fn from(value: Vec<f64>) -> Self {
        PropertyValue::Vector(VectorValue::Float64(value))
    }
}

impl From<Vec<String>> for PropertyValue {
    fn from(value: Vec<String>) -> Self {
        PropertyValue::Vector(VectorValue::Text(value))
    }
}

impl From<ObjectHandle> for PropertyValue {
    fn from(value: ObjectHandle) -> Self {
        PropertyValue::Reference(Some(value))
    }
}

impl From<&ObjectHandle> for PropertyValue {
    fn from(value: &ObjectHandle) -> Self {
        PropertyValue::Reference(Some(value.clone()))
    }
}

impl From<Option<ObjectHandle>> for PropertyValue {
    fn from(value: Option<ObjectHandle>) -> Self {
        PropertyValue::Reference(value)
    }
}

impl From<Vec<ObjectHandle>> for PropertyValue {
    fn from(value: Vec<ObjectHandle>) -> Self {
        PropertyValue::ReferenceList(value)
    }
}

/// Target of a batch-wide object reference write
#[derive(Debug, Clone, Copy)]
pub enum RefTarget<'a> {
    /// Clear the reference on every member
    None,
    /// Same object for every member
    One(&'a ObjectHandle),
    /// One object per member
    Each(&'a [ObjectHandle]),
    /// Same object, by name, for every member
    Name(&'a str),
    /// One object name per member
    Names(&'a [&'a str]),
}
