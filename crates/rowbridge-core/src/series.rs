//! Rolling numeric series used for heart-rate summaries

use std::collections::VecDeque;

/// Bounded series of samples with running aggregates
#[derive(Debug, Clone, Default)]
pub struct RollingSeries {
    samples: VecDeque<f64>,
    capacity: Option<usize>,
}

impl RollingSeries {
    /// Unbounded series
    pub fn new() -> Self {
        Self::default()
    }

    /// Series that forgets its oldest sample past `capacity`
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            samples: VecDeque::with_capacity(capacity),
            capacity: Some(capacity),
        }
    }

    /// Add a sample; absent and non-finite samples are skipped
    pub fn push(&mut self, sample: Option<f64>) {
        let Some(value) = sample.filter(|v| v.is_finite()) else {
            return;
        };
        if let Some(capacity) = self.capacity {
            if capacity == 0 {
                return;
            }
            while self.samples.len() >= capacity {
                self.samples.pop_front();
            }
        }
        self.samples.push_back(value);
    }

    pub fn reset(&mut self) {
        self.samples.clear();
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn last(&self) -> Option<f64> {
        self.samples.back().copied()
    }

    pub fn average(&self) -> Option<f64> {
        if self.samples.is_empty() {
            return None;
        }
        Some(self.samples.iter().sum::<f64>() / self.samples.len() as f64)
    }

    pub fn minimum(&self) -> Option<f64> {
        self.samples.iter().copied().reduce(f64::min)
    }

    pub fn maximum(&self) -> Option<f64> {
        self.samples.iter().copied().reduce(f64::max)
    }
}
