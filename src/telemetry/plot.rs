//! # Live Plot History
//!
//! Bounded history of live samples, appended on every fast sampling tick
//! while the live tab is active. The renderer reads it as a time series.

use std::collections::VecDeque;

use super::decoder::LiveSample;

/// Ring of the most recent live samples.
#[derive(Debug, Clone)]
pub struct PlotHistory {
    samples: VecDeque<LiveSample>,
    capacity: usize,
}

impl PlotHistory {
    /// Creates an empty history holding at most `capacity` samples.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            samples: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Appends a sample, evicting the oldest one when full.
    pub fn push(&mut self, sample: LiveSample) {
        if self.samples.len() == self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(sample);
    }

    pub fn clear(&mut self) {
        self.samples.clear();
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Most recent sample, if any.
    #[must_use]
    pub fn latest(&self) -> Option<&LiveSample> {
        self.samples.back()
    }

    /// Samples from oldest to newest.
    pub fn iter(&self) -> impl Iterator<Item = &LiveSample> {
        self.samples.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(x: f64) -> LiveSample {
        LiveSample { accel: [x, 0.0, 0.0], ..LiveSample::default() }
    }

    #[test]
    fn test_push_evicts_oldest() {
        let mut history = PlotHistory::new(3);
        for i in 0..5 {
            history.push(sample(i as f64));
        }
        assert_eq!(history.len(), 3);
        let xs: Vec<f64> = history.iter().map(|s| s.accel[0]).collect();
        assert_eq!(xs, vec![2.0, 3.0, 4.0]);
        assert_eq!(history.latest().unwrap().accel[0], 4.0);
    }

    #[test]
    fn test_zero_capacity_holds_one() {
        let mut history = PlotHistory::new(0);
        history.push(sample(1.0));
        history.push(sample(2.0));
        assert_eq!(history.len(), 1);
    }

    #[test]
    fn test_clear() {
        let mut history = PlotHistory::new(4);
        history.push(sample(1.0));
        history.clear();
        assert!(history.is_empty());
        assert!(history.latest().is_none());
    }
}
