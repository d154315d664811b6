use std::collections::BTreeMap;
use std::sync::Mutex;

use crate::{CoreError, EventRepository, NewEvent, StoredEvent};

/// Simple in-memory event repository for tests and local demos. Ids are
/// assigned sequentially from 1.
pub struct InMemoryEventRepo {
    inner: Mutex<Inner>,
}

#[derive(Default)]
struct Inner {
    events: BTreeMap<u64, StoredEvent>,
    next_id: u64,
}

impl InMemoryEventRepo {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
        }
    }
}

impl Default for InMemoryEventRepo {
    fn default() -> Self {
        Self::new()
    }
}

impl EventRepository for InMemoryEventRepo {
    fn insert(&self, event: NewEvent) -> Result<StoredEvent, CoreError> {
        let mut inner = self
            .inner
            .lock()
            .map_err(|_| CoreError::Repository("mutex poisoned".into()))?;
        if inner.events.values().any(|e| e.same_occurrence(&event)) {
            return Err(CoreError::AlreadyExists);
        }
        inner.next_id += 1;
        let stored = StoredEvent::from_new(inner.next_id, event);
        inner.events.insert(stored.id, stored.clone());
        Ok(stored)
    }

    fn get(&self, id: u64) -> Result<Option<StoredEvent>, CoreError> {
        let inner = self
            .inner
            .lock()
            .map_err(|_| CoreError::Repository("mutex poisoned".into()))?;
        Ok(inner.events.get(&id).cloned())
    }

    fn list(&self, limit: usize) -> Result<Vec<StoredEvent>, CoreError> {
        let inner = self
            .inner
            .lock()
            .map_err(|_| CoreError::Repository("mutex poisoned".into()))?;
        let mut items: Vec<StoredEvent> = inner.events.values().cloned().collect();
        // Newest first; ids break ties between equal timestamps.
        items.sort_by(|a, b| {
            b.submitted_at
                .cmp(&a.submitted_at)
                .then_with(|| b.id.cmp(&a.id))
        });
        items.truncate(limit);
        Ok(items)
    }
}
