use std::collections::VecDeque;

use crate::crypto::PublicKey;

pub const DEFAULT_DEDUP_CAPACITY: usize = 20;

/// Bounded log of recently seen chat ids (`sender || timestamp`).
///
/// Only the last `capacity` ids are remembered, so a duplicate arriving
/// after that many other messages gets through again.
#[derive(Debug, Clone)]
pub struct DedupLog {
    capacity: usize,
    seen: VecDeque<String>,
}

impl Default for DedupLog {
    fn default() -> Self {
        Self::new(DEFAULT_DEDUP_CAPACITY)
    }
}

impl DedupLog {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            seen: VecDeque::with_capacity(capacity),
        }
    }

    pub fn id(sender: &PublicKey, timestamp: u64) -> String {
        format!("{}{}", sender.to_hex(), timestamp)
    }

    /// Record `id`; false if it is already in the log.
    pub fn insert(&mut self, id: String) -> bool {
        if self.seen.contains(&id) {
            return false;
        }
        if self.seen.len() == self.capacity {
            self.seen.pop_front();
        }
        self.seen.push_back(id);
        true
    }

    /// Forget `id`, e.g. when the message it stands for was not stored.
    pub fn remove(&mut self, id: &str) -> bool {
        match self.seen.iter().position(|seen| seen == id) {
            Some(index) => self.seen.remove(index).is_some(),
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duplicate_rejected() {
        let mut log = DedupLog::default();
        assert!(log.insert("a1".to_string()));
        assert!(!log.insert("a1".to_string()));
        assert_eq!(log.len(), 1);
    }

    #[test]
    fn test_wraps_at_capacity() {
        let mut log = DedupLog::new(2);
        assert!(log.insert("a".to_string()));
        assert!(log.insert("b".to_string()));
        assert!(log.insert("c".to_string()));
        assert_eq!(log.len(), 2);
        // "a" fell out of the window
        assert!(log.insert("a".to_string()));
        assert!(!log.insert("c".to_string()));
    }

    #[test]
    fn test_removed_id_is_accepted_again() {
        let mut log = DedupLog::default();
        assert!(log.insert("a1".to_string()));
        assert!(log.remove("a1"));
        assert!(!log.remove("a1"));
        assert!(log.insert("a1".to_string()));
    }
}
