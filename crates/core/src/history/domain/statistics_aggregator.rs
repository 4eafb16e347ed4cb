use std::collections::BTreeMap;

use serde::Serialize;

use crate::emotion::domain::emotion::Label;
use crate::emotion::domain::face_observation::FaceObservation;
use crate::history::domain::rolling_history::HistoryEntry;

/// Fraction of entries per dominant emotion. Empty when computed over
/// nothing; otherwise the fractions sum to 1.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct EmotionStatistics {
    pub fractions: BTreeMap<Label, f64>,
    /// Number of entries the fractions were computed over.
    pub total: usize,
}

impl EmotionStatistics {
    pub fn compute(snapshot: &[HistoryEntry]) -> Self {
        Self::from_labels(snapshot.iter().map(|e| &e.emotion))
    }

    /// Same statistic over a single frame's faces.
    pub fn compute_from_observations(observations: &[FaceObservation]) -> Self {
        Self::from_labels(observations.iter().map(|o| &o.dominant_emotion))
    }

    fn from_labels<'a>(labels: impl Iterator<Item = &'a Label>) -> Self {
        let mut counts: BTreeMap<Label, usize> = BTreeMap::new();
        let mut total = 0;
        for label in labels {
            *counts.entry(label.clone()).or_default() += 1;
            total += 1;
        }
        let fractions = counts
            .into_iter()
            .map(|(label, n)| (label, n as f64 / total as f64))
            .collect();
        Self { fractions, total }
    }

    pub fn is_empty(&self) -> bool {
        self.fractions.is_empty()
    }

    pub fn get(&self, label: &Label) -> Option<f64> {
        self.fractions.get(label).copied()
    }

    /// Most frequent label; equal frequencies go to the higher-priority label.
    pub fn dominant(&self) -> Option<(&Label, f64)> {
        let mut best: Option<(&Label, f64)> = None;
        for (label, &fraction) in &self.fractions {
            if best.map_or(true, |(_, b)| fraction > b) {
                best = Some((label, fraction));
            }
        }
        best
    }
}
