use std::sync::{Arc, RwLock};

use crate::pipeline::frame_processor::ProcessedFrame;

/// Single-slot mailbox holding the most recent processed frame.
///
/// The writer swaps in a new `Arc`; readers clone the `Arc` and never see a
/// frame without its observations or vice versa.
#[derive(Clone, Default)]
pub struct LatestResult {
    slot: Arc<RwLock<Option<Arc<ProcessedFrame>>>>,
}

impl LatestResult {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn publish(&self, result: ProcessedFrame) {
        let result = Arc::new(result);
        let mut slot = self
            .slot
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *slot = Some(result);
    }

    /// The last published result, or `None` before the first frame.
    pub fn get(&self) -> Option<Arc<ProcessedFrame>> {
        self.slot
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}
