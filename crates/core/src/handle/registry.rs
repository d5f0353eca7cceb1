//! Live-handle registry
//!
//! Every handle issued by a context points at a slot in this registry. There
//! is one slot per native object: re-discovering the same pointer (by name,
//! by index, through a reference property) hands out the existing key, so all
//! handles to one object share its edit-session state.
//!
//! Keys are generational. Once a slot is dropped, every key that pointed at
//! it stops resolving, even if the engine later reuses the pointer value for
//! a new object.

use std::collections::HashMap;

use dssobj_sdk::ObjectPtr;
use slotmap::{new_key_type, SlotMap};

new_key_type! {
    /// Key of a live handle slot
    pub struct HandleKey;
}

/// Host-side state of one live native object
pub(crate) struct HandleSlot {
    pub ptr: ObjectPtr,
    pub class_index: u32,
    pub edit_open: bool,
}

#[derive(Default)]
pub(crate) struct HandleRegistry {
    slots: SlotMap<HandleKey, HandleSlot>,
    by_ptr: HashMap<usize, HandleKey>,
}

impl HandleRegistry {
    /// Key for `ptr`, creating a slot on first sight
    pub fn register(&mut self, ptr: ObjectPtr, class_index: u32) -> HandleKey {
        if let Some(&key) = self.by_ptr.get(&(ptr as usize)) {
            return key;
        }
        let key = self.slots.insert(HandleSlot {
            ptr,
            class_index,
            edit_open: false,
        });
        self.by_ptr.insert(ptr as usize, key);
        key
    }

    /// Existing key for `ptr`, if any
    pub fn lookup(&self, ptr: ObjectPtr) -> Option<HandleKey> {
        self.by_ptr.get(&(ptr as usize)).copied()
    }

    pub fn get(&self, key: HandleKey) -> Option<&HandleSlot> {
        self.slots.get(key)
    }

    pub fn get_mut(&mut self, key: HandleKey) -> Option<&mut HandleSlot> {
        self.slots.get_mut(key)
    }

    /// Drop one slot; returns `false` if it was already gone
    pub fn release(&mut self, key: HandleKey) -> bool {
        match self.slots.remove(key) {
            Some(slot) => {
                self.by_ptr.remove(&(slot.ptr as usize));
                true
            }
            None => false,
        }
    }

    /// Drop every slot, returning how many were live
    pub fn invalidate_all(&mut self) -> usize {
        let count = self.slots.len();
        self.slots.clear();
        self.by_ptr.clear();
        count
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fake_ptr(addr: usize) -> ObjectPtr {
        addr as ObjectPtr
    }

    #[test]
    fn test_same_pointer_shares_slot() {
        let mut registry = HandleRegistry::default();
        let a = registry.register(fake_ptr(0x1000), 1);
        let b = registry.register(fake_ptr(0x1000), 1);
        let c = registry.register(fake_ptr(0x2000), 1);
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_stale_key_never_resolves_again() {
        let mut registry = HandleRegistry::default();
        let old = registry.register(fake_ptr(0x1000), 1);
        assert_eq!(registry.invalidate_all(), 1);
        assert!(registry.get(old).is_none());

        // Pointer reuse yields a fresh key
        let new = registry.register(fake_ptr(0x1000), 1);
        assert_ne!(old, new);
        assert!(registry.get(old).is_none());
        assert!(registry.get(new).is_some());
    }

    #[test]
    fn test_release_removes_pointer_mapping() {
        let mut registry = HandleRegistry::default();
        let key = registry.register(fake_ptr(0x3000), 2);
        assert!(registry.release(key));
        assert!(!registry.release(key));
        assert!(registry.lookup(fake_ptr(0x3000)).is_none());
    }
}
