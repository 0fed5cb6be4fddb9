use super::types::HistoryPoint;
use std::collections::VecDeque;

/// Capacity-limited rolling buffer of chart samples, oldest evicted first.
#[derive(Debug)]
pub struct BoundedHistoryStore {
    points: VecDeque<HistoryPoint>,
    capacity: usize,
}

impl BoundedHistoryStore {
    pub fn new(capacity: usize) -> Self {
        Self {
            points: VecDeque::with_capacity(capacity.max(1)),
            capacity: capacity.max(1),
        }
    }

    pub fn append(&mut self, point: HistoryPoint) {
        self.points.push_back(point);
        while self.points.len() > self.capacity {
            self.points.pop_front();
        }
    }

    /// Wholesale replacement after a bulk-history flatten. The bulk feed is
    /// the source of truth for retrospective state, so dropping live appends
    /// that raced ahead of it is accepted.
    pub fn replace(&mut self, points: Vec<HistoryPoint>) {
        let skip = points.len().saturating_sub(self.capacity);
        self.points = points.into_iter().skip(skip).collect();
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn to_vec(&self) -> Vec<HistoryPoint> {
        self.points.iter().cloned().collect()
    }
}
