use std::collections::VecDeque;
use std::time::{Instant, SystemTime};

use serde::Serialize;
use thiserror::Error;

use crate::emotion::domain::emotion::Label;
use crate::emotion::domain::face_observation::FaceObservation;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum HistoryError {
    #[error("history capacity must be at least 1")]
    ZeroCapacity,
}

/// One face's dominant emotion at the moment it was recorded.
#[derive(Clone, Debug, Serialize)]
pub struct HistoryEntry {
    pub emotion: Label,
    pub confidence: f64,
    /// Monotonic append time, for ordering and age checks.
    #[serde(skip)]
    pub timestamp: Instant,
    /// Wall-clock time of the same instant, for reports.
    pub recorded_at: SystemTime,
}

impl HistoryEntry {
    pub fn new(emotion: Label, confidence: f64) -> Self {
        Self {
            emotion,
            confidence,
            timestamp: Instant::now(),
            recorded_at: SystemTime::now(),
        }
    }

    pub fn from_observation(observation: &FaceObservation) -> Self {
        Self::new(observation.dominant_emotion.clone(), observation.confidence())
    }
}

/// Bounded FIFO of recent entries. Once full, each append evicts the oldest.
#[derive(Debug)]
pub struct RollingHistory {
    entries: VecDeque<HistoryEntry>,
    capacity: usize,
}

impl RollingHistory {
    pub fn new(capacity: usize) -> Result<Self, HistoryError> {
        if capacity == 0 {
            return Err(HistoryError::ZeroCapacity);
        }
        Ok(Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        })
    }

    pub fn append(&mut self, entry: HistoryEntry) {
        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(entry);
    }

    /// Appends the entry derived from `observation`, stamped now.
    pub fn record(&mut self, observation: &FaceObservation) {
        self.append(HistoryEntry::from_observation(observation));
    }

    /// Oldest-first copy of the current contents.
    pub fn snapshot(&self) -> Vec<HistoryEntry> {
        self.entries.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::emotion::domain::emotion::Emotion;
    use crate::emotion::domain::emotion_distribution::EmotionDistribution;
    use crate::shared::bounding_box::BoundingBox;
    use approx::assert_relative_eq;

    fn entry(confidence: f64) -> HistoryEntry {
        HistoryEntry::new(Label::Canonical(Emotion::Happy), confidence)
    }

    fn bbox() -> BoundingBox {
        BoundingBox {
            x: 0,
            y: 0,
            width: 10,
            height: 10,
        }
    }

    #[test]
    fn test_zero_capacity_rejected() {
        assert_eq!(
            RollingHistory::new(0).unwrap_err(),
            HistoryError::ZeroCapacity
        );
    }

    #[test]
    fn test_overflow_keeps_most_recent_in_order() {
        let mut history = RollingHistory::new(100).unwrap();
        for i in 0..150 {
            history.append(entry(i as f64));
        }
        let snapshot = history.snapshot();
        assert_eq!(snapshot.len(), 100);
        for (i, e) in snapshot.iter().enumerate() {
            assert_relative_eq!(e.confidence, (i + 50) as f64);
        }
    }

    #[test]
    fn test_len_never_exceeds_capacity() {
        let mut history = RollingHistory::new(3).unwrap();
        for i in 0..10 {
            history.append(entry(i as f64));
            assert!(history.len() <= history.capacity());
        }
        assert_eq!(history.len(), 3);
    }

    #[test]
    fn test_snapshot_is_detached() {
        let mut history = RollingHistory::new(5).unwrap();
        history.append(entry(1.0));
        let snapshot = history.snapshot();
        history.append(entry(2.0));
        assert_eq!(snapshot.len(), 1);
        assert_eq!(history.len(), 2);
    }

    #[test]
    fn test_record_unclassified_face_is_neutral_zero() {
        let mut history = RollingHistory::new(5).unwrap();
        history.record(&FaceObservation::new(bbox(), EmotionDistribution::empty()));
        let e = &history.snapshot()[0];
        assert_eq!(e.emotion, Label::NEUTRAL);
        assert_relative_eq!(e.confidence, 0.0);
    }

    #[test]
    fn test_record_uses_dominant_and_max_probability() {
        let mut history = RollingHistory::new(5).unwrap();
        let emotions = EmotionDistribution::normalized([
            (Label::Canonical(Emotion::Sad), 0.7),
            (Label::Canonical(Emotion::Happy), 0.3),
        ]);
        history.record(&FaceObservation::new(bbox(), emotions));
        let e = &history.snapshot()[0];
        assert_eq!(e.emotion, Label::Canonical(Emotion::Sad));
        assert_relative_eq!(e.confidence, 0.7, epsilon = 1e-9);
    }

    #[test]
    fn test_timestamps_non_decreasing() {
        let mut history = RollingHistory::new(5).unwrap();
        history.append(entry(0.0));
        history.append(entry(0.0));
        let s = history.snapshot();
        assert!(s[0].timestamp <= s[1].timestamp);
    }
}
