//! Per-context class registry

use std::collections::HashMap;

use super::class::ClassSchema;
use crate::error::{DssError, DssResult};

/// Class index -> schema, injective per context
#[derive(Default)]
pub(crate) struct ClassRegistry {
    classes: HashMap<u32, &'static ClassSchema>,
}

impl ClassRegistry {
    /// Register a schema
    ///
    /// Registering the same table twice is a no-op; a different table for a
    /// taken index is a [`DssError::ClassConflict`].
    pub fn register(&mut self, schema: &'static ClassSchema) -> DssResult<()> {
        match self.classes.get(&schema.index) {
            Some(existing) if std::ptr::eq(*existing, schema) => Ok(()),
            Some(_) => Err(DssError::ClassConflict(schema.index)),
            None => {
                self.classes.insert(schema.index, schema);
                tracing::debug!("Registered class {} at index {}", schema.name, schema.index);
                Ok(())
            }
        }
    }

    pub fn get(&self, index: u32) -> Option<&'static ClassSchema> {
        self.classes.get(&index).copied()
    }

    pub fn by_name(&self, name: &str) -> Option<&'static ClassSchema> {
        self.classes
            .values()
            .copied()
            .find(|s| s.name.eq_ignore_ascii_case(name))
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }
}
