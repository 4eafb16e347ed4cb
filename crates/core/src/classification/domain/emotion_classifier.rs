use crate::emotion::domain::emotion_mapper::RawDistribution;
use crate::shared::error::BoxError;
use crate::shared::frame::Frame;

/// Domain interface for facial expression classification.
///
/// Receives a cropped face and returns scores keyed by the classifier's
/// own label vocabulary. Scores need not be normalised.
pub trait EmotionClassifier: Send {
    fn classify(&mut self, face: &Frame) -> Result<RawDistribution, BoxError>;
}
