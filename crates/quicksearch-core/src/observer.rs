//! Change notification for observable objects.
//!
//! Each observable object (the corpus registry, a [`Suggestions`]
//! aggregate, a live shortcut cursor) owns an [`ObserverList`]. Callbacks
//! are invoked on a snapshot of the list, so an observer may register or
//! unregister observers from inside its own callback.
//!
//! [`Suggestions`]: crate::suggestions::Suggestions

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Handle returned by [`ObserverList::register`].
pub type ObserverId = u64;

type Callback = Arc<dyn Fn() + Send + Sync>;

/// Registered change callbacks.
#[derive(Default)]
pub struct ObserverList {
    next_id: AtomicU64,
    observers: Mutex<Vec<(ObserverId, Callback)>>,
}

impl ObserverList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a callback invoked on every change.
    pub fn register(&self, callback: impl Fn() + Send + Sync + 'static) -> ObserverId {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        lock(&self.observers).push((id, Arc::new(callback)));
        id
    }

    /// Remove a callback. Returns `false` if it was not registered.
    pub fn unregister(&self, id: ObserverId) -> bool {
        let mut observers = lock(&self.observers);
        let before = observers.len();
        observers.retain(|(oid, _)| *oid != id);
        observers.len() != before
    }

    pub fn clear(&self) {
        lock(&self.observers).clear();
    }

    pub fn len(&self) -> usize {
        lock(&self.observers).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Invoke every registered callback.
    pub fn notify(&self) {
        let snapshot: Vec<Callback> = lock(&self.observers)
            .iter()
            .map(|(_, cb)| Arc::clone(cb))
            .collect();
        for cb in snapshot {
            cb();
        }
    }
}

impl std::fmt::Debug for ObserverList {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObserverList")
            .field("observers", &self.len())
            .finish()
    }
}

/// Lock a mutex, recovering the data if a previous holder panicked.
pub(crate) fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn test_notify_reaches_all_observers() {
        let list = ObserverList::new();
        let hits = Arc::new(AtomicUsize::new(0));
        for _ in 0..3 {
            let hits = Arc::clone(&hits);
            list.register(move || {
                hits.fetch_add(1, Ordering::SeqCst);
            });
        }
        list.notify();
        assert_eq!(hits.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_unregister_inside_callback() {
        let list = Arc::new(ObserverList::new());
        let hits = Arc::new(AtomicUsize::new(0));
        let id_cell = Arc::new(Mutex::new(None));
        let (l, h, c) = (Arc::clone(&list), Arc::clone(&hits), Arc::clone(&id_cell));
        let id = list.register(move || {
            h.fetch_add(1, Ordering::SeqCst);
            if let Some(id) = *lock(&c) {
                l.unregister(id);
            }
        });
        *lock(&id_cell) = Some(id);

        list.notify();
        list.notify();
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert!(list.is_empty());
    }
}
