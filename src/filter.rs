//! Noise gate between the heading computer and the application callback.
//!
//! The filter remembers only the last *emitted* heading, truncated to whole
//! degrees, and compares it against the new untruncated heading. This
//! asymmetric comparison is kept for compatibility with existing consumers;
//! comparing against the last raw heading would be a behavior change.

use crate::heading::{HeadingData, HeadingSample};

#[derive(Debug, Clone)]
pub struct ChangeFilter {
    threshold: f64,
    last_emitted: Option<i32>,
}

impl ChangeFilter {
    pub fn new(threshold: f64) -> Self {
        Self {
            threshold,
            last_emitted: None,
        }
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Last emitted heading in whole degrees, if anything was emitted yet.
    pub fn last_emitted(&self) -> Option<i32> {
        self.last_emitted
    }

    /// Returns the heading to deliver, or `None` if the change is too small.
    ///
    /// Forwarded iff `|last - new| > threshold`. The first sample always passes.
    pub fn accept(&mut self, sample: HeadingSample) -> Option<HeadingData> {
        if let Some(last) = self.last_emitted
            && (f64::from(last) - sample.heading).abs() <= self.threshold
        {
            return None;
        }

        // heading is in [0, 360), truncation cannot overflow
        let truncated = sample.heading as i32;
        self.last_emitted = Some(truncated);

        Some(HeadingData {
            heading: f64::from(truncated),
            accuracy: sample.accuracy,
        })
    }
}
