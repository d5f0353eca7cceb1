//! Test fixtures backed by the in-memory engine

use dssobj_engine::fake;

use crate::config::CoreConfig;
use crate::context::DssContext;
use crate::schema::{ClassSchema, PropertyDef, PropertyKind};

pub static WIDGET: ClassSchema = ClassSchema::new(
    fake::WIDGET as u32,
    "Widget",
    &[
        PropertyDef::new("Rating", 1, PropertyKind::Float64),
        PropertyDef::new("Count", 2, PropertyKind::Int32),
        PropertyDef::new("Enabled", 3, PropertyKind::Bool),
        PropertyDef::new("Label", 4, PropertyKind::String),
        PropertyDef::new("Peer", 5, PropertyKind::Object),
        PropertyDef::new("Weights", 6, PropertyKind::Float64Array),
        PropertyDef::new("Codes", 7, PropertyKind::Int32Array),
        PropertyDef::new("Tags", 8, PropertyKind::StringArray),
        PropertyDef::new("Links", 9, PropertyKind::ObjectArray),
        PropertyDef::new("Mode", 10, PropertyKind::Int32),
    ],
);

pub static GADGET: ClassSchema = ClassSchema::new(
    fake::GADGET as u32,
    "Gadget",
    &[
        PropertyDef::new("Power", 1, PropertyKind::Float64),
        PropertyDef::new("Owner", 2, PropertyKind::Object),
        PropertyDef::new("Enabled", 3, PropertyKind::Bool),
    ],
);

pub static MONITOR: ClassSchema = ClassSchema::new(
    fake::MONITOR as u32,
    "Monitor",
    &[
        PropertyDef::new("Element", 1, PropertyKind::Object),
        PropertyDef::new("Terminal", 2, PropertyKind::Int32),
        PropertyDef::new("Enabled", 3, PropertyKind::Bool),
    ],
);

/// Fresh context on the in-memory engine
pub fn fake_context() -> DssContext {
    fake_context_with(CoreConfig::default())
}

pub fn fake_context_with(config: CoreConfig) -> DssContext {
    DssContext::with_api(fake::install(), config).expect("fake engine context")
}
