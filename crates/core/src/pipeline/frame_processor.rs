use std::time::Instant;

use serde::Serialize;

use crate::annotation::domain::frame_annotator::FrameAnnotator;
use crate::classification::domain::face_emotion_analyzer::FaceEmotionAnalyzer;
use crate::detection::domain::face_locator::{DetectionFailure, FaceLocator};
use crate::emotion::domain::face_observation::FaceObservation;
use crate::pipeline::pipeline_logger::{NullPipelineLogger, PipelineLogger};
use crate::shared::frame::Frame;

/// One frame's result: an annotated copy plus one observation per face,
/// in detector order.
#[derive(Clone, Debug, Serialize)]
pub struct ProcessedFrame {
    #[serde(skip)]
    pub annotated: Frame,
    pub frame_index: usize,
    pub observations: Vec<FaceObservation>,
}

impl ProcessedFrame {
    /// The frame as captured, with nothing found on it.
    pub fn unprocessed(frame: &Frame) -> Self {
        Self {
            annotated: frame.clone(),
            frame_index: frame.index(),
            observations: Vec::new(),
        }
    }
}

/// Runs detection, per-face classification and annotation on one frame.
///
/// Stateless between frames. The input frame is never modified.
pub struct FrameProcessor {
    locator: FaceLocator,
    analyzer: FaceEmotionAnalyzer,
    annotator: Box<dyn FrameAnnotator>,
    logger: Box<dyn PipelineLogger>,
}

impl FrameProcessor {
    pub fn new(
        locator: FaceLocator,
        analyzer: FaceEmotionAnalyzer,
        annotator: Box<dyn FrameAnnotator>,
    ) -> Self {
        Self {
            locator,
            analyzer,
            annotator,
            logger: Box::new(NullPipelineLogger),
        }
    }

    pub fn with_logger(mut self, logger: Box<dyn PipelineLogger>) -> Self {
        self.logger = logger;
        self
    }

    /// Fails only when the detector does; classification and annotation
    /// problems degrade the result instead.
    pub fn process(&mut self, frame: &Frame) -> Result<ProcessedFrame, DetectionFailure> {
        let t0 = Instant::now();
        let boxes = self.locator.locate(frame)?;
        self.logger.timing("detect", elapsed_ms(t0));

        let t0 = Instant::now();
        let observations: Vec<FaceObservation> = boxes
            .iter()
            .map(|bbox| FaceObservation::new(*bbox, self.analyzer.classify(frame, bbox)))
            .collect();
        self.logger.timing("classify", elapsed_ms(t0));
        self.logger.metric("faces", observations.len() as f64);
        let unclassified = observations.iter().filter(|o| !o.is_classified()).count();
        self.logger.metric("unclassified", unclassified as f64);

        let mut annotated = frame.clone();
        if !observations.is_empty() {
            let t0 = Instant::now();
            if let Err(e) = self.annotator.annotate(&mut annotated, &observations) {
                log::warn!("Annotation failed on frame {}: {e}", frame.index());
                annotated = frame.clone();
            }
            self.logger.timing("annotate", elapsed_ms(t0));
        }

        self.logger.frame(frame.index(), observations.len());
        Ok(ProcessedFrame {
            annotated,
            frame_index: frame.index(),
            observations,
        })
    }

    /// Emits the logger summary.
    pub fn finish(&self) {
        self.logger.summary();
    }
}

fn elapsed_ms(start: Instant) -> f64 {
    start.elapsed().as_secs_f64() * 1000.0
}
