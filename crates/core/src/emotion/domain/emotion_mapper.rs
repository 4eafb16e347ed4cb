use std::collections::HashMap;

use crate::emotion::domain::emotion::{Emotion, Label};
use crate::emotion::domain::emotion_distribution::EmotionDistribution;

/// Raw classifier output: native label → score. Scores need not sum to 1.
pub type RawDistribution = HashMap<String, f64>;

/// The classifier's native vocabulary and its canonical counterpart.
pub const NATIVE_TABLE: [(&str, Emotion); 7] = [
    ("angry", Emotion::Anger),
    ("disgust", Emotion::Disgust),
    ("fear", Emotion::Frustration),
    ("happy", Emotion::Happy),
    ("sad", Emotion::Sad),
    ("surprise", Emotion::Surprise),
    ("neutral", Emotion::Neutral),
];

/// Translates classifier-native labels into the canonical taxonomy.
///
/// The table may be many-to-one; probabilities of labels that land on the
/// same canonical emotion are summed before renormalising.
#[derive(Clone, Debug)]
pub struct EmotionMapper {
    table: HashMap<String, Emotion>,
}

impl EmotionMapper {
    pub fn new<I, S>(table: I) -> Self
    where
        I: IntoIterator<Item = (S, Emotion)>,
        S: AsRef<str>,
    {
        Self {
            table: table
                .into_iter()
                .map(|(raw, emotion)| (normalize_key(raw.as_ref()), emotion))
                .collect(),
        }
    }

    /// Maps one native label. Labels missing from the table pass through
    /// verbatim (still recognised if they already name a canonical emotion).
    pub fn map(&self, raw: &str) -> Label {
        match self.table.get(&normalize_key(raw)) {
            Some(emotion) => Label::Canonical(*emotion),
            None => Label::from_name(raw),
        }
    }

    pub fn remap_distribution(&self, raw: &RawDistribution) -> EmotionDistribution {
        EmotionDistribution::normalized(raw.iter().map(|(label, p)| (self.map(label), *p)))
    }
}

impl Default for EmotionMapper {
    fn default() -> Self {
        Self::new(NATIVE_TABLE)
    }
}

fn normalize_key(raw: &str) -> String {
    raw.trim().to_lowercase()
}
