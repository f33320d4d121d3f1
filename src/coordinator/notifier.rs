//! Change notifier for coordinator subscribers.
//!
//! After every completed refresh cycle the coordinator pushes its public
//! state here. Synchronous callbacks are invoked in registration order and
//! async consumers waiting on a [`watch::Receiver`] are woken.

use super::CoordinatorUpdate;
use parking_lot::RwLock;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::watch;

/// Callback invoked with the coordinator state after each cycle.
pub type UpdateListener = Arc<dyn Fn(&CoordinatorUpdate) + Send + Sync>;

/// Handle returned by [`UpdateNotifier::add_listener`], used to unregister.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

pub struct UpdateNotifier {
    state: watch::Sender<CoordinatorUpdate>,
    listeners: RwLock<Vec<(ListenerId, UpdateListener)>>,
    next_id: AtomicU64,
}

impl UpdateNotifier {
    pub fn new(initial: CoordinatorUpdate) -> Self {
        let (state, _) = watch::channel(initial);
        Self {
            state,
            listeners: RwLock::new(Vec::new()),
            next_id: AtomicU64::new(0),
        }
    }

    pub fn add_listener(&self, listener: UpdateListener) -> ListenerId {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::SeqCst));
        self.listeners.write().push((id, listener));
        id
    }

    /// Unregister a listener. Returns false if it was not registered.
    pub fn remove_listener(&self, id: ListenerId) -> bool {
        let mut listeners = self.listeners.write();
        let before = listeners.len();
        listeners.retain(|(existing, _)| *existing != id);
        listeners.len() != before
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.read().len()
    }

    /// Receiver that observes every published state.
    pub fn subscribe(&self) -> watch::Receiver<CoordinatorUpdate> {
        self.state.subscribe()
    }

    /// Publish a new state to all subscribers.
    ///
    /// Listeners run outside the registry lock so they may unregister
    /// themselves.
    pub fn notify(&self, update: CoordinatorUpdate) {
        self.state.send_replace(update.clone());

        let listeners: Vec<UpdateListener> = self
            .listeners
            .read()
            .iter()
            .map(|(_, listener)| listener.clone())
            .collect();
        for listener in listeners {
            listener(&update);
        }
    }
}
