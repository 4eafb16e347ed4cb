use std::collections::BTreeMap;

use serde::Serialize;

use crate::emotion::domain::emotion::{Emotion, Label};

/// Probability per label for one face, summing to 1 unless empty.
///
/// Empty means classification failed for that face; it is a value, not an
/// error. Instances are only built through [`EmotionDistribution::normalized`]
/// so the sum invariant cannot be broken after construction.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct EmotionDistribution(BTreeMap<Label, f64>);

impl EmotionDistribution {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Sums weights per label and divides by the total mass.
    ///
    /// Negative and non-finite weights count as zero. Zero total mass yields
    /// the empty distribution.
    pub fn normalized<I>(weights: I) -> Self
    where
        I: IntoIterator<Item = (Label, f64)>,
    {
        let weights: Vec<(Label, f64)> = weights
            .into_iter()
            .map(|(label, w)| (label, if w.is_finite() && w > 0.0 { w } else { 0.0 }))
            .collect();

        // Scale by the largest weight so huge finite weights cannot overflow the sum.
        let largest = weights.iter().map(|(_, w)| *w).fold(0.0, f64::max);
        if largest <= 0.0 {
            return Self::empty();
        }
        let mut mass: BTreeMap<Label, f64> = BTreeMap::new();
        for (label, weight) in weights {
            *mass.entry(label).or_insert(0.0) += weight / largest;
        }

        let total: f64 = mass.values().sum();
        for p in mass.values_mut() {
            *p /= total;
        }
        Self(mass)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn get(&self, label: &Label) -> Option<f64> {
        self.0.get(label).copied()
    }

    /// Probability of a canonical emotion, 0 when absent.
    pub fn probability(&self, emotion: Emotion) -> f64 {
        self.get(&Label::Canonical(emotion)).unwrap_or(0.0)
    }

    /// Iterates in label priority order.
    pub fn iter(&self) -> impl Iterator<Item = (&Label, f64)> {
        self.0.iter().map(|(label, p)| (label, *p))
    }

    pub fn total(&self) -> f64 {
        self.0.values().sum()
    }

    /// Highest-probability label; ties go to the higher-priority label.
    pub fn dominant(&self) -> Option<(&Label, f64)> {
        let mut best: Option<(&Label, f64)> = None;
        for (label, p) in self.iter() {
            if best.map_or(true, |(_, best_p)| p > best_p) {
                best = Some((label, p));
            }
        }
        best
    }

    /// Probability of the dominant label, or 0 for an empty distribution.
    pub fn max_probability(&self) -> f64 {
        self.dominant().map_or(0.0, |(_, p)| p)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn label(e: Emotion) -> Label {
        Label::Canonical(e)
    }

    #[test]
    fn test_normalized_sums_to_one() {
        let d = EmotionDistribution::normalized([
            (label(Emotion::Happy), 30.0),
            (label(Emotion::Sad), 10.0),
            (label(Emotion::Neutral), 60.0),
        ]);
        assert_relative_eq!(d.total(), 1.0, epsilon = 1e-9);
        assert_relative_eq!(d.probability(Emotion::Happy), 0.3, epsilon = 1e-9);
        assert_relative_eq!(d.probability(Emotion::Neutral), 0.6, epsilon = 1e-9);
    }

    #[test]
    fn test_normalized_merges_duplicate_labels() {
        let d = EmotionDistribution::normalized([
            (label(Emotion::Anger), 1.0),
            (label(Emotion::Anger), 1.0),
            (label(Emotion::Sad), 2.0),
        ]);
        assert_eq!(d.len(), 2);
        assert_relative_eq!(d.probability(Emotion::Anger), 0.5);
    }

    #[test]
    fn test_zero_mass_is_empty() {
        let d = EmotionDistribution::normalized([
            (label(Emotion::Happy), 0.0),
            (label(Emotion::Sad), 0.0),
        ]);
        assert!(d.is_empty());
        assert!(d.dominant().is_none());
        assert_relative_eq!(d.max_probability(), 0.0);
    }

    #[test]
    fn test_negative_and_nan_weights_count_as_zero() {
        let d = EmotionDistribution::normalized([
            (label(Emotion::Happy), -5.0),
            (label(Emotion::Sad), f64::NAN),
            (label(Emotion::Neutral), 2.0),
        ]);
        assert_relative_eq!(d.probability(Emotion::Neutral), 1.0);
        assert_relative_eq!(d.probability(Emotion::Happy), 0.0);
    }

    #[test]
    fn test_huge_finite_weights_still_sum_to_one() {
        let d = EmotionDistribution::normalized([
            (Label::Canonical(Emotion::Happy), 1e308),
            (Label::Canonical(Emotion::Sad), 1e308),
            (Label::Canonical(Emotion::Sad), f64::MAX),
        ]);
        assert_eq!(d.len(), 2);
        assert_relative_eq!(d.total(), 1.0, epsilon = 1e-9);
        assert!(d.probability(Emotion::Sad) > d.probability(Emotion::Happy));
    }

    #[test]
    fn test_dominant_picks_max() {
        let d = EmotionDistribution::normalized([
            (label(Emotion::Happy), 0.2),
            (label(Emotion::Disgust), 0.7),
            (label(Emotion::Sad), 0.1),
        ]);
        let (l, p) = d.dominant().unwrap();
        assert_eq!(l, &label(Emotion::Disgust));
        assert_relative_eq!(p, 0.7, epsilon = 1e-9);
    }

    #[test]
    fn test_dominant_tie_goes_to_priority_order() {
        // Inserted lowest-priority first to prove insertion order is irrelevant.
        let d = EmotionDistribution::normalized([
            (label(Emotion::Disgust), 0.5),
            (Label::Unmapped("contempt".into()), 0.5),
            (label(Emotion::Surprise), 0.5),
        ]);
        assert_eq!(d.dominant().unwrap().0, &label(Emotion::Surprise));
    }

    #[test]
    fn test_iter_is_priority_ordered() {
        let d = EmotionDistribution::normalized([
            (label(Emotion::Neutral), 1.0),
            (label(Emotion::Happy), 1.0),
        ]);
        let labels: Vec<_> = d.iter().map(|(l, _)| l.clone()).collect();
        assert_eq!(labels, vec![label(Emotion::Happy), label(Emotion::Neutral)]);
    }

    #[test]
    fn test_serializes_as_object() {
        let d = EmotionDistribution::normalized([(label(Emotion::Happy), 1.0)]);
        assert_eq!(serde_json::to_string(&d).unwrap(), r#"{"happy":1.0}"#);
    }
}
