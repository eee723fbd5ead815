//! Smoothed per-system counters.

use std::collections::VecDeque;
use std::time::Duration;

/// A windowed average of how long something took and how many entities it
/// touched.
#[derive(Debug, Clone)]
pub struct SmoothCounter {
    window: usize,
    samples: VecDeque<(Duration, usize)>,
    total_duration: Duration,
    total_entities: usize,
    maximum: Duration,
}

impl SmoothCounter {
    /// Create a counter averaging over the last `window` samples.
    pub fn new(window: usize) -> SmoothCounter {
        SmoothCounter {
            window: window.max(1),
            samples: VecDeque::new(),
            total_duration: Duration::ZERO,
            total_entities: 0,
            maximum: Duration::ZERO,
        }
    }

    /// Record a sample.
    pub fn record(&mut self, duration: Duration, entities: usize) {
        if self.samples.len() == self.window {
            if let Some((d, e)) = self.samples.pop_front() {
                self.total_duration -= d;
                self.total_entities -= e;
            }
        }

        self.samples.push_back((duration, entities));
        self.total_duration += duration;
        self.total_entities += entities;
        self.maximum = self.maximum.max(duration);
    }

    /// The mean duration over the window.
    pub fn average_duration(&self) -> Duration {
        match self.samples.len() {
            0 => Duration::ZERO,
            n => self.total_duration / n as u32,
        }
    }

    /// The mean entity count over the window.
    pub fn average_entities(&self) -> f64 {
        match self.samples.len() {
            0 => 0.0,
            n => self.total_entities as f64 / n as f64,
        }
    }

    /// The longest duration ever recorded.
    pub fn maximum(&self) -> Duration {
        self.maximum
    }

    /// The number of samples currently in the window.
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn clear(&mut self) {
        self.samples.clear();
        self.total_duration = Duration::ZERO;
        self.total_entities = 0;
        self.maximum = Duration::ZERO;
    }
}
