//! Scoped edit sessions
//!
//! Guards open a session on construction and close it when dropped, passing
//! the number of writes made through them (at least one) as the change
//! count. Call `finish` to close early and observe the engine's answer;
//! errors on drop are only logged.

use crate::batch::{close_all, ObjectBatch};
use crate::error::DssResult;
use crate::flags::SetterFlags;
use crate::handle::ObjectHandle;
use crate::schema::Scalar;
use crate::value::PropertyValue;

/// Edit session on one object
pub struct EditGuard<'h> {
    handle: &'h ObjectHandle,
    changes: i32,
    open: bool,
}

impl<'h> EditGuard<'h> {
    pub(crate) fn open(handle: &'h ObjectHandle) -> DssResult<Self> {
        handle.begin_edit()?;
        Ok(Self {
            handle,
            changes: 0,
            open: true,
        })
    }

    pub fn handle(&self) -> &ObjectHandle {
        self.handle
    }

    /// Writes made through this guard so far
    pub fn changes(&self) -> i32 {
        self.changes
    }

    /// Write a scalar property inside the session
    pub fn set<T: Scalar>(&mut self, idx: i32, value: T, flags: SetterFlags) -> DssResult<()> {
        self.handle.set(idx, value, flags)?;
        self.changes += 1;
        Ok(())
    }

    /// Write a dynamically shaped value inside the session
    pub fn set_value(&mut self, idx: i32, value: &PropertyValue, flags: SetterFlags) -> DssResult<()> {
        self.handle.set_value(idx, value, flags)?;
        self.changes += 1;
        Ok(())
    }

    /// Close the session with an explicit change count
    pub fn finish(mut self, change_count: i32) -> DssResult<()> {
        self.open = false;
        self.handle.end_edit(change_count)
    }
}

impl Drop for EditGuard<'_> {
    fn drop(&mut self) {
        if !self.open {
            return;
        }
        if let Err(e) = self.handle.end_edit(self.changes.max(1)) {
            tracing::warn!("Failed to close edit session: {}", e);
        }
    }
}

/// Edit session on every member of a batch
pub struct BatchEditGuard<'b> {
    batch: &'b ObjectBatch,
    changes: i32,
    open: bool,
}

impl<'b> BatchEditGuard<'b> {
    /// Sessions opened here are closed again if any member refuses
    pub(crate) fn open(batch: &'b ObjectBatch) -> DssResult<Self> {
        let members = batch.handles()?;
        let mut opened = Vec::with_capacity(members.len());
        let mut first = None;
        for (i, handle) in members.iter().enumerate() {
            match handle.begin_edit() {
                Ok(()) => opened.push(handle.clone()),
                Err(e) => {
                    tracing::warn!("begin_edit failed on {} member {}: {}", batch.schema().name, i, e);
                    first.get_or_insert(e);
                }
            }
        }
        if let Some(e) = first {
            close_all(&opened);
            return Err(e);
        }
        Ok(Self {
            batch,
            changes: 0,
            open: true,
        })
    }

    pub fn batch(&self) -> &ObjectBatch {
        self.batch
    }

    pub fn changes(&self) -> i32 {
        self.changes
    }

    /// Write the same scalar to every member inside the session
    pub fn set_all<T: Scalar>(&mut self, idx: i32, value: T, flags: SetterFlags) -> DssResult<()> {
        self.batch.set_all(idx, value, flags)?;
        self.changes += 1;
        Ok(())
    }

    /// Write one scalar per member inside the session
    pub fn set_vector<T: Scalar>(&mut self, idx: i32, values: &[T], flags: SetterFlags) -> DssResult<()> {
        self.batch.set_vector(idx, values, flags)?;
        self.changes += 1;
        Ok(())
    }

    pub fn set_value_all(&mut self, idx: i32, value: &PropertyValue, flags: SetterFlags) -> DssResult<()> {
        self.batch.set_value_all(idx, value, flags)?;
        self.changes += 1;
        Ok(())
    }

    /// Close every member's session with an explicit change count
    pub fn finish(mut self, change_count: i32) -> DssResult<()> {
        self.open = false;
        self.batch.end_edit_all(change_count)
    }
}

impl Drop for BatchEditGuard<'_> {
    fn drop(&mut self) {
        if !self.open {
            return;
        }
        if let Err(e) = self.batch.end_edit_all(self.changes.max(1)) {
            tracing::warn!("Failed to close batch edit session: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{fake_context, WIDGET};
    use dssobj_engine::fake;

    #[test]
    fn test_guard_closes_with_change_count() {
        let ctx = fake_context();
        let w = ctx.accessor(&WIDGET).unwrap().new("w", false, true).unwrap();
        let ptr = w.as_ptr().unwrap();
        {
            let mut edit = w.edit().unwrap();
            edit.set(1, 1.0, SetterFlags::empty()).unwrap();
            edit.set(2, 5, SetterFlags::empty()).unwrap();
            edit.set(3, false, SetterFlags::empty()).unwrap();
            assert!(w.is_editing());
        }
        assert!(!w.is_editing());
        assert_eq!(unsafe { fake::recalc_count(ptr) }, 1);
        assert_eq!(unsafe { fake::last_change_count(ptr) }, 3);
    }

    #[test]
    fn test_empty_guard_reports_one_change() {
        let ctx = fake_context();
        let w = ctx.accessor(&WIDGET).unwrap().new("w", false, true).unwrap();
        drop(w.edit().unwrap());
        assert_eq!(unsafe { fake::last_change_count(w.as_ptr().unwrap()) }, 1);
    }

    #[test]
    fn test_finish_closes_once() {
        let ctx = fake_context();
        let w = ctx.accessor(&WIDGET).unwrap().new("w", false, true).unwrap();
        let mut edit = w.edit().unwrap();
        edit.set(1, 2.0, SetterFlags::empty()).unwrap();
        edit.finish(7).unwrap();
        assert_eq!(unsafe { fake::recalc_count(w.as_ptr().unwrap()) }, 1);
        assert_eq!(unsafe { fake::last_change_count(w.as_ptr().unwrap()) }, 7);
    }

    #[test]
    fn test_guard_refuses_nested_session() {
        let ctx = fake_context();
        let w = ctx.accessor(&WIDGET).unwrap().new("w", false, true).unwrap();
        let _edit = w.edit().unwrap();
        assert!(w.edit().is_err());
    }

    #[test]
    fn test_batch_guard() {
        let ctx = fake_context();
        let widgets = ctx.accessor(&WIDGET).unwrap();
        let batch = widgets.batch_new_count(3, false).unwrap();
        {
            let mut edit = batch.edit().unwrap();
            edit.set_all(2, 4, SetterFlags::empty()).unwrap();
            edit.set_vector(1, &[1.0, 2.0, 3.0], SetterFlags::empty()).unwrap();
        }
        for h in batch.iter().unwrap() {
            let ptr = h.as_ptr().unwrap();
            assert_eq!(unsafe { fake::recalc_count(ptr) }, 1);
            assert_eq!(unsafe { fake::last_change_count(ptr) }, 2);
        }
        assert_eq!(batch.get_all::<f64>(1).unwrap(), vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_batch_guard_rolls_back_on_refusal() {
        let ctx = fake_context();
        let widgets = ctx.accessor(&WIDGET).unwrap();
        let batch = widgets.batch_new_named(&["a", "b", "c"], false).unwrap();
        let members: Vec<_> = batch.iter().unwrap().collect();
        members[1].begin_edit().unwrap();

        assert!(matches!(
            batch.edit(),
            Err(crate::DssError::SessionMisuse(crate::SessionMisuse::AlreadyOpen))
        ));
        assert!(!members[0].is_editing());
        assert!(members[1].is_editing());
        assert!(!members[2].is_editing());
        assert!(!unsafe { fake::is_editing(members[0].as_ptr().unwrap()) });
    }
}
