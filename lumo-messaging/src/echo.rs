use std::time::{Duration, Instant};

use dashmap::DashMap;
use uuid::Uuid;

/// Bounded-lifetime table of message ids this client just wrote.
///
/// The store's insert response and the change feed's echo of the same insert
/// both deliver the row; the id is registered after the insert confirms, and
/// the echo consumes it so the row is never rendered twice.  Entries expire
/// after `ttl` in case the echo is never delivered, keeping the table from
/// growing without bound.
pub struct EchoGuard {
    entries: DashMap<Uuid, Instant>,
    ttl: Duration,
}

impl EchoGuard {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            ttl,
        }
    }

    /// Remember a just-confirmed insert.
    pub fn register(&self, id: Uuid) {
        self.purge();
        self.entries.insert(id, Instant::now() + self.ttl);
    }

    /// Returns `false` when `id` is a recent own insert (and consumes the
    /// entry), `true` when the event should be applied.
    pub fn admit(&self, id: Uuid) -> bool {
        self.purge();
        self.entries.remove(&id).is_none()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn purge(&self) {
        let now = Instant::now();
        self.entries.retain(|_, expiry| *expiry > now);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn echo_is_consumed_once() {
        let guard = EchoGuard::new(Duration::from_secs(30));
        let id = Uuid::new_v4();

        guard.register(id);
        assert!(!guard.admit(id), "first echo must be skipped");
        assert!(guard.admit(id), "second delivery is foreign and admitted");
    }

    #[test]
    fn unknown_ids_are_admitted() {
        let guard = EchoGuard::new(Duration::from_secs(30));
        assert!(guard.admit(Uuid::new_v4()));
    }

    #[test]
    fn entries_expire() {
        let guard = EchoGuard::new(Duration::from_millis(10));
        let id = Uuid::new_v4();

        guard.register(id);
        std::thread::sleep(Duration::from_millis(20));
        assert!(guard.admit(id), "expired entry no longer suppresses");
        assert!(guard.is_empty());
    }
}
