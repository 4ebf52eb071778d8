use std::sync::{Arc, Mutex, PoisonError};

/// Owned shared slot holding the latest value of a pipeline product.
///
/// Writers replace the whole value; readers clone the latest snapshot. No
/// reader ever observes a partially updated value, and the lock never leaves
/// this type. Handles are cheap clones sharing one slot, so the inbound
/// handler and the per-frame task can sit on opposite sides.
#[derive(Debug)]
pub struct Latest<T> {
    slot: Arc<Mutex<Option<T>>>,
}

impl<T> Default for Latest<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for Latest<T> {
    fn clone(&self) -> Self {
        Self {
            slot: Arc::clone(&self.slot),
        }
    }
}

impl<T> Latest<T> {
    pub fn new() -> Self {
        Self {
            slot: Arc::new(Mutex::new(None)),
        }
    }

    /// Replace the held value as a whole.
    pub fn replace(&self, value: T) {
        *self.lock() = Some(value);
    }

    /// Drop the held value.
    pub fn clear(&self) {
        *self.lock() = None;
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Option<T>> {
        // A writer panicking mid-replace cannot leave a torn value behind,
        // so a poisoned slot is still safe to read.
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<T: Clone> Latest<T> {
    /// Clone of the most recently completed value, if any.
    pub fn snapshot(&self) -> Option<T> {
        self.lock().clone()
    }
}
