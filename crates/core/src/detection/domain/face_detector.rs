use crate::shared::error::BoxError;
use crate::shared::frame::Frame;

/// Face extent as reported by a detector, before conversion to pixels.
#[derive(Clone, Debug, PartialEq)]
pub enum DetectedBounds {
    /// Fractions of the frame width/height (most neural detectors).
    Relative {
        x: f64,
        y: f64,
        width: f64,
        height: f64,
    },
    /// Pixel offsets; may overhang the frame.
    Pixel {
        x: i32,
        y: i32,
        width: i32,
        height: i32,
    },
}

#[derive(Clone, Debug, PartialEq)]
pub struct Detection {
    pub bounds: DetectedBounds,
    pub confidence: f64,
}

/// Domain interface for face detection.
///
/// Implementations may be stateful (e.g., reusing inference buffers),
/// hence `&mut self`.
pub trait FaceDetector: Send {
    fn detect(&mut self, frame: &Frame) -> Result<Vec<Detection>, BoxError>;
}
