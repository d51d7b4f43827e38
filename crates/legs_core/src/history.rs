use std::collections::VecDeque;

/// Append-only record log that keeps the most recent `capacity` entries.
///
/// Records are moved in and only ever handed out by shared reference.
#[derive(Debug, Clone)]
pub struct History<R> {
    records: VecDeque<R>,
    capacity: usize,
    total_pushed: usize,
}

impl<R> History<R> {
    /// A capacity of zero is raised to one so `latest()` always has
    /// something to return after the first push.
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            records: VecDeque::with_capacity(capacity.min(1024)),
            capacity,
            total_pushed: 0,
        }
    }

    pub fn push(&mut self, record: R) {
        if self.records.len() == self.capacity {
            self.records.pop_front();
        }
        self.records.push_back(record);
        self.total_pushed += 1;
    }

    pub fn latest(&self) -> Option<&R> {
        self.records.back()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of records ever appended, including evicted ones.
    pub fn total_pushed(&self) -> usize {
        self.total_pushed
    }

    /// Retained records, oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &R> {
        self.records.iter()
    }
}
