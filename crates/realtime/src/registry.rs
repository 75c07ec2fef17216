//! Handler registry for inbound events.
//!
//! Exactly one registry exists, owned by the client independent of any
//! connection, so registrations survive reconnect cycles. Handlers for a
//! kind run synchronously in registration order; a slow handler delays the
//! rest of that event's handlers but not future events.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};

use log::warn;

use crate::events::InboundEvent;

/// Handler list key for events with an unrecognized kind.
pub const DEFAULT_KIND: &str = "default";

type Handler = Arc<dyn Fn(&InboundEvent) + Send + Sync>;

/// Event-kind → ordered handler list.
#[derive(Default)]
pub struct HandlerRegistry {
    handlers: Mutex<HashMap<String, Vec<(u64, Handler)>>>,
    next_id: AtomicU64,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a callback for an event kind (use [`DEFAULT_KIND`] to catch
    /// unrecognized kinds). The returned guard unregisters exactly this
    /// callback when dropped or when `unregister` is called.
    #[must_use = "dropping the guard unregisters the handler"]
    pub fn register<F>(self: &Arc<Self>, kind: &str, handler: F) -> HandlerGuard
    where
        F: Fn(&InboundEvent) + Send + Sync + 'static,
    {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        if let Ok(mut handlers) = self.handlers.lock() {
            handlers
                .entry(kind.to_string())
                .or_default()
                .push((id, Arc::new(handler)));
        }
        HandlerGuard {
            registry: Arc::downgrade(self),
            kind: kind.to_string(),
            id,
        }
    }

    fn unregister(&self, kind: &str, id: u64) {
        if let Ok(mut handlers) = self.handlers.lock() {
            if let Some(list) = handlers.get_mut(kind) {
                list.retain(|(entry_id, _)| *entry_id != id);
                if list.is_empty() {
                    handlers.remove(kind);
                }
            }
        }
    }

    /// Dispatch one event to every handler registered for its kind, in
    /// registration order. Unrecognized kinds go to the `default` list.
    pub fn dispatch(&self, event: &InboundEvent) {
        let route = if event.is_unknown() { DEFAULT_KIND } else { event.kind() };

        // Clone the list out so handlers may register/unregister reentrantly.
        let snapshot: Vec<Handler> = match self.handlers.lock() {
            Ok(handlers) => handlers
                .get(route)
                .map(|list| list.iter().map(|(_, h)| Arc::clone(h)).collect())
                .unwrap_or_default(),
            Err(_) => {
                warn!("Handler registry lock poisoned; dropping event {}", event.kind());
                return;
            }
        };

        for handler in snapshot {
            handler(event);
        }
    }

    /// Number of handlers currently registered for a kind.
    pub fn handler_count(&self, kind: &str) -> usize {
        self.handlers
            .lock()
            .map(|handlers| handlers.get(kind).map(|list| list.len()).unwrap_or(0))
            .unwrap_or(0)
    }
}

/// Removes its handler from the registry on drop.
pub struct HandlerGuard {
    registry: Weak<HandlerRegistry>,
    kind: String,
    id: u64,
}

impl HandlerGuard {
    /// Explicitly remove the handler now.
    pub fn unregister(self) {
        // Drop does the work.
    }
}

impl Drop for HandlerGuard {
    fn drop(&mut self) {
        if let Some(registry) = self.registry.upgrade() {
            registry.unregister(&self.kind, self.id);
        }
    }
}
