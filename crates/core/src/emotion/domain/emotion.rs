use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize, Serializer};

/// The canonical emotion taxonomy.
///
/// Variant order is the tie-break priority: when two labels share the
/// highest probability (or frequency), the one declared first wins.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Emotion {
    Happy,
    Surprise,
    Frustration,
    Anger,
    Sad,
    Neutral,
    Disgust,
}

impl Emotion {
    pub const ALL: [Emotion; 7] = [
        Emotion::Happy,
        Emotion::Surprise,
        Emotion::Frustration,
        Emotion::Anger,
        Emotion::Sad,
        Emotion::Neutral,
        Emotion::Disgust,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Emotion::Happy => "happy",
            Emotion::Surprise => "surprise",
            Emotion::Frustration => "frustration",
            Emotion::Anger => "anger",
            Emotion::Sad => "sad",
            Emotion::Neutral => "neutral",
            Emotion::Disgust => "disgust",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|e| e.as_str() == name)
    }
}

impl fmt::Display for Emotion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Emotion {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_name(s).ok_or_else(|| format!("unknown emotion '{s}'"))
    }
}

/// A distribution key: a canonical emotion, or a classifier label the
/// mapper had no entry for (kept verbatim).
///
/// Ordered canonical-first in priority order, then unmapped labels by name.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Label {
    Canonical(Emotion),
    Unmapped(String),
}

impl Label {
    /// Reported for faces whose emotion could not be determined.
    pub const NEUTRAL: Label = Label::Canonical(Emotion::Neutral);

    /// Resolves a label name, recognising canonical names exactly.
    pub fn from_name(name: &str) -> Self {
        match Emotion::from_name(name) {
            Some(emotion) => Label::Canonical(emotion),
            None => Label::Unmapped(name.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Label::Canonical(emotion) => emotion.as_str(),
            Label::Unmapped(name) => name,
        }
    }

    pub fn emotion(&self) -> Option<Emotion> {
        match self {
            Label::Canonical(emotion) => Some(*emotion),
            Label::Unmapped(_) => None,
        }
    }
}

impl From<Emotion> for Label {
    fn from(emotion: Emotion) -> Self {
        Label::Canonical(emotion)
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for Label {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}
