use signalpost_core::ActivityRecord;
use std::collections::VecDeque;

pub const ACTIVITY_CAPACITY: usize = 100;

/// Bounded, append-only history of engine actions. Oldest records fall off first.
#[derive(Debug, Clone)]
pub struct ActivityLog {
    records: VecDeque<ActivityRecord>,
    capacity: usize,
}

impl Default for ActivityLog {
    fn default() -> Self {
        Self::with_capacity(ACTIVITY_CAPACITY)
    }
}

impl ActivityLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            records: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn push(&mut self, record: ActivityRecord) {
        if self.records.len() == self.capacity {
            self.records.pop_front();
        }
        self.records.push_back(record);
    }

    /// Newest first.
    pub fn recent(&self, limit: usize) -> Vec<ActivityRecord> {
        self.records.iter().rev().take(limit).cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use signalpost_core::ActivityKind;

    #[test]
    fn test_evicts_oldest_at_capacity() {
        let mut log = ActivityLog::new();
        for i in 0..(ACTIVITY_CAPACITY + 5) {
            log.push(ActivityRecord::succeeded(
                ActivityKind::MentionReply,
                format!("reply {}", i),
            ));
        }
        assert_eq!(log.len(), ACTIVITY_CAPACITY);

        let all = log.recent(usize::MAX);
        assert_eq!(all.first().unwrap().summary, "reply 104");
        assert_eq!(all.last().unwrap().summary, "reply 5");
    }

    #[test]
    fn test_recent_is_newest_first() {
        let mut log = ActivityLog::with_capacity(3);
        log.push(ActivityRecord::succeeded(ActivityKind::ProactivePost, "a"));
        log.push(ActivityRecord::failed(ActivityKind::EngagementReply, "b", "boom"));

        let recent = log.recent(5);
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].summary, "b");
        assert!(!recent[0].success);
        assert_eq!(log.recent(1)[0].summary, "b");
        assert!(log.recent(0).is_empty());
    }
}
