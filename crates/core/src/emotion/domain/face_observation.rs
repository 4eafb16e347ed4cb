use serde::Serialize;

use crate::emotion::domain::emotion::Label;
use crate::emotion::domain::emotion_distribution::EmotionDistribution;
use crate::shared::bounding_box::BoundingBox;

/// One detected face in one frame, with its classified emotions.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct FaceObservation {
    pub bbox: BoundingBox,
    pub emotions: EmotionDistribution,
    /// Argmax of `emotions`; `neutral` when `emotions` is empty.
    pub dominant_emotion: Label,
}

impl FaceObservation {
    pub fn new(bbox: BoundingBox, emotions: EmotionDistribution) -> Self {
        let dominant_emotion = emotions
            .dominant()
            .map(|(label, _)| label.clone())
            .unwrap_or(Label::NEUTRAL);
        Self {
            bbox,
            emotions,
            dominant_emotion,
        }
    }

    /// Probability of the dominant emotion, 0 when unclassified.
    pub fn confidence(&self) -> f64 {
        self.emotions.max_probability()
    }

    pub fn is_classified(&self) -> bool {
        !self.emotions.is_empty()
    }
}
