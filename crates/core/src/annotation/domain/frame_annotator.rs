use crate::emotion::domain::face_observation::FaceObservation;
use crate::shared::error::BoxError;
use crate::shared::frame::Frame;

/// Draws face observations onto a frame in place.
///
/// Callers pass a copy when the original must stay untouched.
pub trait FrameAnnotator: Send {
    fn annotate(&self, frame: &mut Frame, observations: &[FaceObservation])
        -> Result<(), BoxError>;
}

/// Leaves frames unchanged.
pub struct NullAnnotator;

impl FrameAnnotator for NullAnnotator {
    fn annotate(
        &self,
        _frame: &mut Frame,
        _observations: &[FaceObservation],
    ) -> Result<(), BoxError> {
        Ok(())
    }
}
