// ===============================
// src/observer.rs
// ===============================
use crate::domain::Instrument;

/// Called with the tick timestamp (ms) and the quote snapshot.
pub type QuoteListener = Box<dyn FnMut(i64, &[Instrument])>;

/// Deregistration token handed out by [`Subscribers::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// Ordered set of quote listeners; notified in registration order.
#[derive(Default)]
pub struct Subscribers {
    listeners: Vec<(SubscriptionId, QuoteListener)>,
    next_id: u64,
}

impl Subscribers {
    pub fn new() -> Self { Self::default() }

    pub fn subscribe(&mut self, listener: QuoteListener) -> SubscriptionId {
        self.next_id += 1;
        let id = SubscriptionId(self.next_id);
        self.listeners.push((id, listener));
        id
    }

    /// Returns false if the token was unknown or already removed.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(sid, _)| *sid != id);
        self.listeners.len() != before
    }

    pub fn notify(&mut self, ts_ms: i64, snapshot: &[Instrument]) {
        for (_, listener) in self.listeners.iter_mut() {
            listener(ts_ms, snapshot);
        }
    }

    pub fn is_empty(&self) -> bool { self.listeners.is_empty() }

    pub fn ids(&self) -> impl Iterator<Item = SubscriptionId> + '_ {
        self.listeners.iter().map(|(id, _)| *id)
    }
}

impl std::fmt::Debug for Subscribers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscribers").field("len", &self.listeners.len()).finish()
    }
}
