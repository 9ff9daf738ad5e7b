//! Bounded FIFO of `(epoch, session)` pairs used by the unordered-transport
//! wrapper to tolerate late delivery across a rekey.

use crate::core::constants::EPOCH_RING_CAPACITY;
use crate::crypto::aead::Session;

/// A capacity-bounded, insertion-ordered ring of installed sessions.
pub struct EpochRing {
    entries: Vec<(u16, Session)>,
}

impl Default for EpochRing {
    fn default() -> Self {
        EpochRing::new()
    }
}

impl EpochRing {
    /// An empty ring.
    pub fn new() -> Self {
        EpochRing {
            entries: Vec::with_capacity(EPOCH_RING_CAPACITY),
        }
    }

    /// Number of sessions currently installed.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the ring holds no sessions.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Fixed capacity of the ring.
    pub fn capacity(&self) -> usize {
        EPOCH_RING_CAPACITY
    }

    /// The most recently inserted epoch, if any.
    pub fn current(&self) -> Option<u16> {
        self.entries.last().map(|(e, _)| *e)
    }

    /// The longest-installed epoch, if any.
    pub fn oldest(&self) -> Option<u16> {
        self.entries.first().map(|(e, _)| *e)
    }

    /// Look up a session by epoch, mutably.
    pub fn resolve_mut(&mut self, epoch: u16) -> Option<&mut Session> {
        self.entries
            .iter_mut()
            .find(|(e, _)| *e == epoch)
            .map(|(_, s)| s)
    }

    /// Look up the most recently inserted session, mutably.
    pub fn resolve_current_mut(&mut self) -> Option<&mut Session> {
        self.entries.last_mut().map(|(_, s)| s)
    }

    /// Insert a new session at the given epoch, evicting the oldest entry
    /// if the ring is already at capacity.
    ///
    /// Returns the evicted epoch, if any.
    pub fn insert(&mut self, epoch: u16, session: Session) -> Option<u16> {
        let evicted = if self.entries.len() >= EPOCH_RING_CAPACITY {
            Some(self.entries.remove(0).0)
        } else {
            None
        };
        self.entries.push((epoch, session));
        evicted
    }

    /// Remove a specific epoch's session, zeroizing it first.
    pub fn remove(&mut self, epoch: u16) -> bool {
        if let Some(idx) = self.entries.iter().position(|(e, _)| *e == epoch) {
            let (_, mut session) = self.entries.remove(idx);
            session.zeroize();
            true
        } else {
            false
        }
    }

    /// Scrub and drop every installed session.
    pub fn zeroize_all(&mut self) {
        for (_, session) in &mut self.entries {
            session.zeroize();
        }
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::aead::{ReplayMode, Role, SessionKey};
    use crate::crypto::keys::SessionId;
    use crate::crypto::replay::SlidingWindow;

    fn dummy_session(epoch: u16) -> Session {
        let key = SessionKey::from_slice(&[0x11u8; 32]).unwrap();
        Session::new(
            SessionId::generate(),
            Role::Client,
            &key,
            &key,
            epoch,
            ReplayMode::Sliding(SlidingWindow::new()),
        )
    }

    #[test]
    fn insert_and_resolve() {
        let mut ring = EpochRing::new();
        ring.insert(0, dummy_session(0));
        ring.insert(1, dummy_session(1));
        assert_eq!(ring.current(), Some(1));
        assert_eq!(ring.oldest(), Some(0));
        assert!(ring.resolve_mut(0).is_some());
        assert!(ring.resolve_mut(2).is_none());
    }

    #[test]
    fn insert_evicts_oldest_at_capacity() {
        let mut ring = EpochRing::new();
        for e in 0..EPOCH_RING_CAPACITY as u16 {
            assert!(ring.insert(e, dummy_session(e)).is_none());
        }
        let evicted = ring.insert(EPOCH_RING_CAPACITY as u16, dummy_session(EPOCH_RING_CAPACITY as u16));
        assert_eq!(evicted, Some(0));
        assert_eq!(ring.len(), EPOCH_RING_CAPACITY);
        assert!(ring.resolve_mut(0).is_none());
    }

    #[test]
    fn remove_and_zeroize_all() {
        let mut ring = EpochRing::new();
        ring.insert(0, dummy_session(0));
        assert!(ring.remove(0));
        assert!(!ring.remove(0));
        ring.insert(1, dummy_session(1));
        ring.zeroize_all();
        assert!(ring.is_empty());
    }
}
