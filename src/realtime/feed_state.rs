use std::collections::{HashSet, VecDeque};
use uuid::Uuid;

/// Orders feed refetches that may finish out of order. Every refetch takes a
/// version when it starts; a result is applied only if nothing newer has been
/// applied already.
#[derive(Debug, Default)]
pub struct FeedState {
    issued: u64,
    applied: u64,
}

impl FeedState {
    pub fn begin(&mut self) -> u64 {
        self.issued += 1;
        self.issued
    }

    /// Records `version` as applied unless it is stale.
    pub fn accept(&mut self, version: u64) -> bool {
        if version <= self.applied || version > self.issued {
            return false;
        }
        self.applied = version;
        true
    }

    pub fn applied(&self) -> u64 {
        self.applied
    }
}

/// Remembers which message ids were already delivered to the browser, up to a
/// bounded number of recent ids.
#[derive(Debug)]
pub struct MessageLog {
    seen: HashSet<Uuid>,
    order: VecDeque<Uuid>,
    capacity: usize,
}

impl MessageLog {
    pub const DEFAULT_CAPACITY: usize = 500;

    pub fn new(capacity: usize) -> Self {
        Self { seen: HashSet::new(), order: VecDeque::new(), capacity: capacity.max(1) }
    }

    pub fn with_known(ids: impl IntoIterator<Item = Uuid>) -> Self {
        let mut log = Self::new(Self::DEFAULT_CAPACITY);
        for id in ids {
            log.admit(id);
        }
        log
    }

    /// True the first time an id is seen.
    pub fn admit(&mut self, id: Uuid) -> bool {
        if !self.seen.insert(id) {
            return false;
        }
        self.order.push_back(id);
        if self.order.len() > self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.seen.remove(&oldest);
            }
        }
        true
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn late_result_from_older_refetch_is_discarded() {
        let mut feed = FeedState::default();
        let first = feed.begin();
        let second = feed.begin();

        assert!(feed.accept(second));
        assert!(!feed.accept(first));
        assert_eq!(feed.applied(), second);
    }

    #[test]
    fn in_order_results_are_all_applied() {
        let mut feed = FeedState::default();
        let a = feed.begin();
        assert!(feed.accept(a));
        let b = feed.begin();
        assert!(feed.accept(b));
        assert!(!feed.accept(b));
    }

    #[test]
    fn unknown_versions_are_rejected() {
        let mut feed = FeedState::default();
        assert!(!feed.accept(1));
        feed.begin();
        assert!(!feed.accept(5));
    }

    #[test]
    fn message_log_deduplicates() {
        let known = Uuid::new_v4();
        let mut log = MessageLog::with_known([known]);
        assert!(!log.admit(known));
        let fresh = Uuid::new_v4();
        assert!(log.admit(fresh));
        assert!(!log.admit(fresh));
        assert_eq!(log.len(), 2);
    }

    #[test]
    fn message_log_forgets_oldest_beyond_capacity() {
        let mut log = MessageLog::new(2);
        let (a, b, c) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        assert!(log.admit(a));
        assert!(log.admit(b));
        assert!(log.admit(c));
        assert_eq!(log.len(), 2);
        assert!(log.admit(a));
        assert!(!log.admit(c));
    }
}
