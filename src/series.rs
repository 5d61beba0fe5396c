//! rolling per-metric sample window
//!
//! a `RollingSeries` keeps the most recent `capacity` samples, oldest first.
//! pushing past capacity evicts from the front.

use serde::Serialize;
use std::collections::VecDeque;

/// samples kept per metric unless configured otherwise
pub const DEFAULT_CAPACITY: usize = 10;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RollingSeries<T> {
    #[serde(skip)]
    capacity: usize,
    samples: VecDeque<T>,
}

impl<T: Clone> RollingSeries<T> {
    /// new series holding just `seed`
    ///
    /// a capacity of zero is bumped to one so the series always has a latest value.
    pub fn seeded(seed: T, capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let mut samples = VecDeque::with_capacity(capacity + 1);
        samples.push_back(seed);
        Self { capacity, samples }
    }

    pub fn push(&mut self, value: T) {
        self.samples.push_back(value);
        while self.samples.len() > self.capacity {
            self.samples.pop_front();
        }
    }

    /// copy of this series with `value` appended
    pub fn appended(&self, value: T) -> Self {
        let mut next = self.clone();
        next.push(value);
        next
    }

    pub fn latest(&self) -> Option<&T> {
        self.samples.back()
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.samples.iter()
    }

    pub fn to_vec(&self) -> Vec<T> {
        self.samples.iter().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_with_seed() {
        let series = RollingSeries::seeded(30.0, DEFAULT_CAPACITY);
        assert_eq!(series.len(), 1);
        assert_eq!(series.latest(), Some(&30.0));
    }

    #[test]
    fn evicts_oldest_past_capacity() {
        let mut series = RollingSeries::seeded(0, DEFAULT_CAPACITY);
        for v in 1..=25 {
            series.push(v);
            assert!(series.len() <= DEFAULT_CAPACITY);
        }
        assert_eq!(series.to_vec(), (16..=25).collect::<Vec<_>>());
    }

    #[test]
    fn appended_leaves_receiver_alone() {
        let series = RollingSeries::seeded(1, 3);
        let next = series.appended(2).appended(3).appended(4);
        assert_eq!(series.to_vec(), vec![1]);
        assert_eq!(next.to_vec(), vec![2, 3, 4]);
        assert_eq!(next.capacity(), 3);
    }

    #[test]
    fn zero_capacity_keeps_latest() {
        let mut series = RollingSeries::seeded('a', 0);
        series.push('b');
        assert_eq!(series.to_vec(), vec!['b']);
    }
}
