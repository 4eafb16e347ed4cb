use std::sync::{Arc, Mutex, MutexGuard};

use crate::emotion::domain::face_observation::FaceObservation;
use crate::history::domain::rolling_history::{HistoryEntry, HistoryError, RollingHistory};
use crate::history::domain::statistics_aggregator::EmotionStatistics;

/// A [`RollingHistory`] shared between the processing thread and readers.
///
/// Each call takes the lock for its own duration only. A poisoned lock is
/// recovered since the buffer holds no cross-entry invariant a panic could
/// break.
#[derive(Clone, Debug)]
pub struct SharedHistory {
    inner: Arc<Mutex<RollingHistory>>,
}

impl SharedHistory {
    pub fn new(capacity: usize) -> Result<Self, HistoryError> {
        Ok(Self {
            inner: Arc::new(Mutex::new(RollingHistory::new(capacity)?)),
        })
    }

    pub fn append(&self, entry: HistoryEntry) {
        self.lock().append(entry);
    }

    /// Records every observation of one frame under a single lock.
    pub fn record_all(&self, observations: &[FaceObservation]) {
        let mut history = self.lock();
        for observation in observations {
            history.record(observation);
        }
    }

    pub fn snapshot(&self) -> Vec<HistoryEntry> {
        self.lock().snapshot()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.lock().capacity()
    }

    /// Statistics over a snapshot taken now. The lock is released before
    /// counting.
    pub fn statistics(&self) -> EmotionStatistics {
        let snapshot = self.snapshot();
        EmotionStatistics::compute(&snapshot)
    }

    fn lock(&self) -> MutexGuard<'_, RollingHistory> {
        self.inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
