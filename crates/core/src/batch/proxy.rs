//! Lazy per-property views over a batch

use std::ptr;

use crate::error::DssResult;
use crate::flags::SetterFlags;
use crate::schema::{Numeric, Scalar};

use super::ObjectBatch;

/// Right-hand side of a proxy assignment
#[derive(Debug, Clone, PartialEq)]
pub enum ProxyValue<T> {
    /// Broadcast to every member
    Scalar(T),
    /// One value per member
    Vector(Vec<T>),
}

impl<T> From<Vec<T>> for ProxyValue<T> {
    fn from(values: Vec<T>) -> Self {
        ProxyValue::Vector(values)
    }
}

/// One scalar property across every member of a batch
///
/// Nothing is cached: every read goes to the engine.
pub struct BatchArrayProxy<'b, T: Scalar> {
    batch: &'b ObjectBatch,
    idx: i32,
    _marker: std::marker::PhantomData<T>,
}

impl<'b, T: Scalar> BatchArrayProxy<'b, T> {
    pub(crate) fn new(batch: &'b ObjectBatch, idx: i32) -> Self {
        Self {
            batch,
            idx,
            _marker: std::marker::PhantomData,
        }
    }

    pub fn index(&self) -> i32 {
        self.idx
    }

    pub fn to_vec(&self) -> DssResult<Vec<T>> {
        self.batch.get_all(self.idx)
    }

    /// Value of the member at a 0-based position
    pub fn get(&self, position: usize) -> DssResult<Option<T>> {
        Ok(self.to_vec()?.into_iter().nth(position))
    }

    pub fn len(&self) -> DssResult<usize> {
        self.batch.len()
    }

    pub fn is_empty(&self) -> DssResult<bool> {
        self.batch.is_empty()
    }

    pub fn assign(&self, value: ProxyValue<T>, flags: SetterFlags) -> DssResult<()> {
        match value {
            ProxyValue::Scalar(v) => self.batch.set_all(self.idx, v, flags),
            ProxyValue::Vector(v) => self.batch.set_vector(self.idx, &v, flags),
        }
    }

    /// Copy another view's values into this one, member by member
    pub fn assign_from(&self, other: &BatchArrayProxy<'_, T>, flags: SetterFlags) -> DssResult<()> {
        if ptr::eq(self.batch, other.batch) && self.idx == other.idx {
            return Ok(());
        }
        let values = other.to_vec()?;
        self.batch.set_vector(self.idx, &values, flags)
    }
}

impl<T: Numeric> BatchArrayProxy<'_, T> {
    /// Add `delta` to every member
    pub fn increment(&self, delta: T, flags: SetterFlags) -> DssResult<()> {
        let values: Vec<T> = self.to_vec()?.into_iter().map(|v| v + delta).collect();
        self.batch.set_vector(self.idx, &values, flags)
    }

    /// Subtract `delta` from every member
    pub fn decrement(&self, delta: T, flags: SetterFlags) -> DssResult<()> {
        let values: Vec<T> = self.to_vec()?.into_iter().map(|v| v - delta).collect();
        self.batch.set_vector(self.idx, &values, flags)
    }

    /// Multiply every member by `factor`
    pub fn scale(&self, factor: T, flags: SetterFlags) -> DssResult<()> {
        let values: Vec<T> = self.to_vec()?.into_iter().map(|v| v * factor).collect();
        self.batch.set_vector(self.idx, &values, flags)
    }
}

impl BatchArrayProxy<'_, f64> {
    /// Divide every member by `divisor`
    pub fn divide(&self, divisor: f64, flags: SetterFlags) -> DssResult<()> {
        let values: Vec<f64> = self.to_vec()?.into_iter().map(|v| v / divisor).collect();
        self.batch.set_vector(self.idx, &values, flags)
    }
}
