use thiserror::Error;

use crate::classification::domain::emotion_classifier::EmotionClassifier;
use crate::emotion::domain::emotion_distribution::EmotionDistribution;
use crate::emotion::domain::emotion_mapper::EmotionMapper;
use crate::shared::bounding_box::BoundingBox;
use crate::shared::error::BoxError;
use crate::shared::frame::Frame;

/// Why a single face produced no emotions. Never surfaced to callers.
#[derive(Error, Debug)]
pub enum ClassificationFailure {
    #[error("face crop {0} is empty")]
    EmptyCrop(BoundingBox),
    #[error("classifier error: {0}")]
    Classifier(#[source] BoxError),
    #[error("classifier returned no scores")]
    NoResult,
    #[error("classifier scores carry no probability mass")]
    ZeroMass,
}

/// Crops a face, runs the classifier on it and maps the result into the
/// canonical taxonomy.
pub struct FaceEmotionAnalyzer {
    classifier: Box<dyn EmotionClassifier>,
    mapper: EmotionMapper,
}

impl FaceEmotionAnalyzer {
    pub fn new(classifier: Box<dyn EmotionClassifier>, mapper: EmotionMapper) -> Self {
        Self { classifier, mapper }
    }

    /// Emotions for the face at `bbox`, or the empty distribution if
    /// anything along the way fails.
    pub fn classify(&mut self, frame: &Frame, bbox: &BoundingBox) -> EmotionDistribution {
        match self.try_classify(frame, bbox) {
            Ok(emotions) => emotions,
            Err(e) => {
                log::warn!(
                    "Emotion analysis failed for face {bbox} on frame {}: {e}",
                    frame.index()
                );
                EmotionDistribution::empty()
            }
        }
    }

    fn try_classify(
        &mut self,
        frame: &Frame,
        bbox: &BoundingBox,
    ) -> Result<EmotionDistribution, ClassificationFailure> {
        let face = frame.crop(bbox);
        if face.is_empty() {
            return Err(ClassificationFailure::EmptyCrop(*bbox));
        }

        let raw = self
            .classifier
            .classify(&face)
            .map_err(ClassificationFailure::Classifier)?;
        if raw.is_empty() {
            return Err(ClassificationFailure::NoResult);
        }

        let emotions = self.mapper.remap_distribution(&raw);
        if emotions.is_empty() {
            return Err(ClassificationFailure::ZeroMass);
        }
        Ok(emotions)
    }
}
