use std::collections::VecDeque;

use crate::calibration::CalibrationScale;
use crate::my_types::*;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PositionSample {
    pub pixel: Vector2d,
    pub time: Timestamp,
}

/// Outcome of feeding one target observation to [`PositionHistory::observe`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Movement {
    /// History was empty. A fresh target counts as having just moved.
    First,
    /// Offset from the short-window average exceeded the noise floor.
    Moved { delta_mm: f64 },
    /// Offset stayed within the noise floor.
    Steady { delta_mm: f64 },
    /// Nothing to compare against: no recent samples or no calibration yet.
    Unknown,
}

impl Movement {
    /// Whether the last-movement timestamp has to be refreshed.
    pub fn is_movement(&self) -> bool {
        matches!(self, Movement::First | Movement::Moved { .. })
    }
}

/// Recent target centers, bounded by count and by age.
#[derive(Debug)]
pub struct PositionHistory {
    samples: VecDeque<PositionSample>,
    capacity: usize,
    /// averaging window of the movement test, seconds
    window: f64,
    /// maximum sample age, seconds
    retention: f64,
    /// noise floor, millimeters
    threshold_mm: f64,
}

impl PositionHistory {
    pub fn new(capacity: usize, window: f64, retention: f64, threshold_mm: f64) -> Self {
        Self {
            samples: VecDeque::with_capacity(capacity),
            capacity: capacity.max(1),
            window,
            retention,
            threshold_mm,
        }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn clear(&mut self) {
        self.samples.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = &PositionSample> {
        self.samples.iter()
    }

    pub fn oldest(&self) -> Option<&PositionSample> {
        self.samples.front()
    }

    /// Mean pixel position of the samples at most `window` seconds old.
    /// Samples stamped after `now` are ignored.
    pub fn recent_mean(&self, now: Timestamp) -> Option<Vector2d> {
        let mut sum = Vector2d::zeros();
        let mut count = 0;
        for sample in self.samples.iter().filter(|s| (0. ..=self.window).contains(&(now - s.time))) {
            sum += sample.pixel;
            count += 1;
        }
        if count == 0 {
            return None;
        }
        Some(sum / count as f64)
    }

    /// Compare the new position against where the target has been sitting,
    /// then record it.
    pub fn observe(&mut self, pixel: Vector2d, now: Timestamp, scale: &CalibrationScale) -> Movement {
        let sample = PositionSample { pixel, time: now };
        if self.samples.is_empty() {
            self.push(sample);
            return Movement::First;
        }

        let movement = match self.recent_mean(now) {
            Some(mean) => match scale.to_mm((pixel - mean).norm()) {
                Some(delta_mm) if delta_mm > self.threshold_mm => Movement::Moved { delta_mm },
                Some(delta_mm) => Movement::Steady { delta_mm },
                None => Movement::Unknown,
            },
            None => Movement::Unknown,
        };

        self.push(sample);
        self.evict(now);
        movement
    }

    fn push(&mut self, sample: PositionSample) {
        if self.samples.len() == self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(sample);
    }

    /// Timestamps may arrive out of order, so the whole buffer is scanned.
    fn evict(&mut self, now: Timestamp) {
        let retention = self.retention;
        self.samples.retain(|s| now - s.time <= retention);
    }
}
