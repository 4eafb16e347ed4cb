use thiserror::Error;

use crate::detection::domain::face_detector::{DetectedBounds, Detection, FaceDetector};
use crate::shared::bounding_box::BoundingBox;
use crate::shared::error::BoxError;
use crate::shared::frame::Frame;

/// The face detector itself failed on a frame (not "no faces found").
#[derive(Error, Debug)]
#[error("face detection failed on frame {frame_index}: {source}")]
pub struct DetectionFailure {
    pub frame_index: usize,
    #[source]
    pub source: BoxError,
}

/// Turns raw detector output into in-frame pixel boxes.
///
/// One detector call per frame, no retries. Detections under
/// `min_confidence` or with no visible area are dropped.
pub struct FaceLocator {
    detector: Box<dyn FaceDetector>,
    min_confidence: f64,
}

impl FaceLocator {
    pub fn new(detector: Box<dyn FaceDetector>, min_confidence: f64) -> Self {
        Self {
            detector,
            min_confidence,
        }
    }

    pub fn locate(&mut self, frame: &Frame) -> Result<Vec<BoundingBox>, DetectionFailure> {
        let detections = self
            .detector
            .detect(frame)
            .map_err(|source| DetectionFailure {
                frame_index: frame.index(),
                source,
            })?;

        Ok(detections
            .iter()
            .filter(|d| d.confidence >= self.min_confidence)
            .filter_map(|d| {
                let bbox = to_pixels(d, frame.width(), frame.height());
                if bbox.is_none() {
                    log::debug!(
                        "Dropping detection outside frame {}: {:?}",
                        frame.index(),
                        d.bounds
                    );
                }
                bbox
            })
            .collect())
    }
}

fn to_pixels(detection: &Detection, frame_width: u32, frame_height: u32) -> Option<BoundingBox> {
    match detection.bounds {
        DetectedBounds::Relative {
            x,
            y,
            width,
            height,
        } => BoundingBox::from_relative(x, y, width, height, frame_width, frame_height),
        DetectedBounds::Pixel {
            x,
            y,
            width,
            height,
        } => BoundingBox::from_pixels(x, y, width, height, frame_width, frame_height),
    }
}
