//! Grayscale facial expression classifiers run through ONNX Runtime.

use std::path::Path;
use std::str::FromStr;

use image::imageops::FilterType;

use crate::classification::domain::emotion_classifier::EmotionClassifier;
use crate::emotion::domain::emotion_mapper::{RawDistribution, NATIVE_TABLE};
use crate::shared::error::BoxError;
use crate::shared::frame::Frame;

/// How grayscale pixel values are fed to the network.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PixelScale {
    /// 0..=255 as is.
    Raw,
    /// Divided by 255.
    Unit,
}

/// Input/output layout of a supported expression model.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EmotionModel {
    pub input_size: u32,
    pub scale: PixelScale,
    /// Native label for each output index.
    pub labels: &'static [&'static str],
    /// Whether outputs are logits that still need a softmax.
    pub logits: bool,
}

impl EmotionModel {
    /// ONNX model zoo FER+ (64x64, 8 classes, logits). The `contempt`
    /// output has no place in the taxonomy and is dropped.
    pub const FER_PLUS: EmotionModel = EmotionModel {
        input_size: 64,
        scale: PixelScale::Raw,
        labels: &[
            "neutral", "happy", "surprise", "sad", "angry", "disgust", "fear", "contempt",
        ],
        logits: true,
    };

    /// FER2013-style CNN (48x48, 7 classes, softmax output).
    pub const FER2013: EmotionModel = EmotionModel {
        input_size: 48,
        scale: PixelScale::Unit,
        labels: &["angry", "disgust", "fear", "happy", "sad", "surprise", "neutral"],
        logits: false,
    };
}

impl FromStr for EmotionModel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ferplus" => Ok(Self::FER_PLUS),
            "fer2013" => Ok(Self::FER2013),
            other => Err(format!(
                "unknown emotion model '{other}' (expected ferplus or fer2013)"
            )),
        }
    }
}

pub struct OnnxEmotionClassifier {
    session: ort::session::Session,
    model: EmotionModel,
}

impl OnnxEmotionClassifier {
    pub fn new(model_path: &Path, model: EmotionModel) -> Result<Self, BoxError> {
        let session = ort::session::Session::builder()?.commit_from_file(model_path)?;
        log::info!(
            "Loaded emotion model from {} ({}x{}, {} classes)",
            model_path.display(),
            model.input_size,
            model.input_size,
            model.labels.len()
        );
        Ok(Self { session, model })
    }
}

impl EmotionClassifier for OnnxEmotionClassifier {
    fn classify(&mut self, face: &Frame) -> Result<RawDistribution, BoxError> {
        let input = preprocess(face, &self.model)?;
        let input_value = ort::value::Tensor::from_array(input)?;
        let outputs = self.session.run(ort::inputs![input_value])?;

        let scores = outputs[0].try_extract_array::<f32>()?;
        let scores: Vec<f32> = scores.iter().copied().collect();
        if scores.len() != self.model.labels.len() {
            return Err(format!(
                "emotion model returned {} scores, expected {}",
                scores.len(),
                self.model.labels.len()
            )
            .into());
        }

        let probs = if self.model.logits {
            softmax(&scores)
        } else {
            scores
        };
        Ok(native_distribution(self.model.labels, &probs))
    }
}

/// Pairs outputs with their labels, keeping only the classifier's native
/// seven-label vocabulary.
fn native_distribution(labels: &[&str], probs: &[f32]) -> RawDistribution {
    labels
        .iter()
        .zip(probs)
        .filter(|(label, _)| NATIVE_TABLE.iter().any(|(native, _)| native == *label))
        .map(|(label, &p)| (label.to_string(), p as f64))
        .collect()
}

/// Grayscale, bilinear resize to the model input, NCHW `[1, 1, S, S]`.
fn preprocess(face: &Frame, model: &EmotionModel) -> Result<ndarray::Array4<f32>, BoxError> {
    if face.is_empty() || face.channels() != 3 {
        return Err(format!(
            "expected a non-empty RGB face crop, got {}x{}x{}",
            face.width(),
            face.height(),
            face.channels()
        )
        .into());
    }
    let rgb = image::RgbImage::from_raw(face.width(), face.height(), face.data().to_vec())
        .ok_or("face crop buffer does not match its dimensions")?;
    let gray = image::imageops::grayscale(&rgb);
    let size = model.input_size;
    let resized = image::imageops::resize(&gray, size, size, FilterType::Triangle);

    let divisor = match model.scale {
        PixelScale::Raw => 1.0,
        PixelScale::Unit => 255.0,
    };
    let s = size as usize;
    let mut tensor = ndarray::Array4::<f32>::zeros((1, 1, s, s));
    for (x, y, pixel) in resized.enumerate_pixels() {
        tensor[[0, 0, y as usize, x as usize]] = pixel.0[0] as f32 / divisor;
    }
    Ok(tensor)
}

fn softmax(logits: &[f32]) -> Vec<f32> {
    let max = logits.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let exps: Vec<f32> = logits.iter().map(|v| (v - max).exp()).collect();
    let sum: f32 = exps.iter().sum();
    exps.into_iter().map(|e| e / sum).collect()
}
