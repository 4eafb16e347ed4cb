/// BlazeFace face detector using ONNX Runtime via `ort`.
///
/// The same short-range network MediaPipe's face detection is built on.
/// Emits boxes relative to the frame; pixel conversion and clamping happen
/// in [`FaceLocator`](crate::detection::domain::face_locator::FaceLocator).
use std::path::Path;

use crate::detection::domain::face_detector::{DetectedBounds, Detection, FaceDetector};
use crate::shared::error::BoxError;
use crate::shared::frame::Frame;

/// BlazeFace model input resolution.
const INPUT_SIZE: u32 = 128;

/// Sigmoid score below which anchors are discarded before NMS.
pub const DEFAULT_SCORE_THRESHOLD: f64 = 0.5;

const NMS_IOU_THRESH: f64 = 0.3;

/// Number of BlazeFace anchors (short-range model).
const NUM_ANCHORS: usize = 896;

/// Values per anchor in the regressor output: box (4) + 6 keypoints (12).
const REGRESSOR_STRIDE: usize = 16;

pub struct OnnxBlazefaceDetector {
    session: ort::session::Session,
    score_threshold: f64,
    anchors: Vec<[f32; 2]>,
}

impl OnnxBlazefaceDetector {
    pub fn new(model_path: &Path, score_threshold: f64) -> Result<Self, BoxError> {
        let session = ort::session::Session::builder()?.commit_from_file(model_path)?;
        log::info!("Loaded BlazeFace model from {}", model_path.display());
        Ok(Self {
            session,
            score_threshold,
            anchors: generate_anchors(),
        })
    }
}

impl FaceDetector for OnnxBlazefaceDetector {
    fn detect(&mut self, frame: &Frame) -> Result<Vec<Detection>, BoxError> {
        if frame.is_empty() || frame.channels() != 3 {
            return Err(format!(
                "BlazeFace needs a non-empty RGB frame, got {}x{}x{}",
                frame.width(),
                frame.height(),
                frame.channels()
            )
            .into());
        }

        let input_tensor = preprocess(frame, INPUT_SIZE);
        let input_value = ort::value::Tensor::from_array(input_tensor)?;
        let outputs = self.session.run(ort::inputs![input_value])?;

        // regressors: [1, 896, 16], classificators: [1, 896, 1]
        if outputs.len() < 2 {
            return Err(
                format!("BlazeFace model expected 2 outputs, got {}", outputs.len()).into(),
            );
        }
        let regressors = outputs[0].try_extract_array::<f32>()?;
        let scores = outputs[1].try_extract_array::<f32>()?;
        let reg_data = regressors.as_slice().ok_or("Cannot get regressor slice")?;
        let score_data = scores.as_slice().ok_or("Cannot get score slice")?;

        let mut candidates = decode(&self.anchors, reg_data, score_data, self.score_threshold);
        let kept = nms(&mut candidates, NMS_IOU_THRESH);

        Ok(kept
            .into_iter()
            .map(|c| Detection {
                bounds: DetectedBounds::Relative {
                    x: c.x1,
                    y: c.y1,
                    width: c.x2 - c.x1,
                    height: c.y2 - c.y1,
                },
                confidence: c.score,
            })
            .collect())
    }
}

/// Resize to `size × size` (nearest neighbour) and scale to [-1, 1], NCHW.
fn preprocess(frame: &Frame, size: u32) -> ndarray::Array4<f32> {
    let src = frame.as_ndarray();
    let src_h = frame.height() as usize;
    let src_w = frame.width() as usize;
    let s = size as usize;

    let mut tensor = ndarray::Array4::<f32>::zeros((1, 3, s, s));
    for y in 0..s {
        let src_y = (((y as f64 + 0.5) * src_h as f64 / s as f64) as usize).min(src_h - 1);
        for x in 0..s {
            let src_x = (((x as f64 + 0.5) * src_w as f64 / s as f64) as usize).min(src_w - 1);
            for c in 0..3 {
                tensor[[0, c, y, x]] = src[[src_y, src_x, c]] as f32 / 127.5 - 1.0;
            }
        }
    }
    tensor
}

/// Anchor centres for the short-range model: a 16×16 grid with 2 anchors per
/// cell followed by an 8×8 grid with 6.
fn generate_anchors() -> Vec<[f32; 2]> {
    let layers = [(8, 2), (16, 6)]; // (stride, anchors_per_cell)
    let mut anchors = Vec::with_capacity(NUM_ANCHORS);
    for &(stride, per_cell) in &layers {
        let grid = INPUT_SIZE as usize / stride;
        for y in 0..grid {
            for x in 0..grid {
                let cx = (x as f32 + 0.5) / grid as f32;
                let cy = (y as f32 + 0.5) / grid as f32;
                anchors.extend(std::iter::repeat([cx, cy]).take(per_cell));
            }
        }
    }
    anchors
}

/// Candidate box in relative coordinates.
#[derive(Clone, Debug, PartialEq)]
struct Candidate {
    x1: f64,
    y1: f64,
    x2: f64,
    y2: f64,
    score: f64,
}

fn decode(
    anchors: &[[f32; 2]],
    regressors: &[f32],
    raw_scores: &[f32],
    score_threshold: f64,
) -> Vec<Candidate> {
    let size = INPUT_SIZE as f32;
    let mut out = Vec::new();
    for (i, (&raw, anchor)) in raw_scores.iter().zip(anchors).enumerate() {
        let score = sigmoid(raw) as f64;
        if score < score_threshold {
            continue;
        }
        let offset = i * REGRESSOR_STRIDE;
        let Some(reg) = regressors.get(offset..offset + 4) else {
            break;
        };
        let cx = anchor[0] + reg[0] / size;
        let cy = anchor[1] + reg[1] / size;
        let w = reg[2] / size;
        let h = reg[3] / size;
        out.push(Candidate {
            x1: (cx - w / 2.0) as f64,
            y1: (cy - h / 2.0) as f64,
            x2: (cx + w / 2.0) as f64,
            y2: (cy + h / 2.0) as f64,
            score,
        });
    }
    out
}

fn nms(candidates: &mut [Candidate], iou_thresh: f64) -> Vec<Candidate> {
    candidates.sort_by(|a, b| b.score.total_cmp(&a.score));

    let mut keep: Vec<Candidate> = Vec::new();
    for c in candidates.iter() {
        if keep.iter().all(|k| iou(k, c) <= iou_thresh) {
            keep.push(c.clone());
        }
    }
    keep
}

fn iou(a: &Candidate, b: &Candidate) -> f64 {
    let inter_w = (a.x2.min(b.x2) - a.x1.max(b.x1)).max(0.0);
    let inter_h = (a.y2.min(b.y2) - a.y1.max(b.y1)).max(0.0);
    let inter = inter_w * inter_h;
    if inter == 0.0 {
        return 0.0;
    }
    let area_a = (a.x2 - a.x1) * (a.y2 - a.y1);
    let area_b = (b.x2 - b.x1) * (b.y2 - b.y1);
    inter / (area_a + area_b - inter)
}

fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}
