/// BlazeFace (short-range) ONNX export. Not downloaded: place it in the model
/// cache directory or pass an explicit path.
pub const BLAZEFACE_MODEL_NAME: &str = "blazeface.onnx";

pub const FERPLUS_MODEL_NAME: &str = "emotion-ferplus-8.onnx";
pub const FERPLUS_MODEL_URL: &str =
    "https://github.com/onnx/models/raw/main/validated/vision/body_analysis/emotion_ferplus/model/emotion-ferplus-8.onnx";

/// FER2013-style 48x48 model. No canonical public export; supply the file.
pub const FER2013_MODEL_NAME: &str = "emotion-fer2013.onnx";

/// Number of observations kept for rolling statistics.
pub const DEFAULT_HISTORY_CAPACITY: usize = 100;

/// Minimum detector confidence for a face to be classified.
pub const DEFAULT_MIN_DETECTION_CONFIDENCE: f64 = 0.5;

pub const DEFAULT_CAPTURE_WIDTH: u32 = 640;
pub const DEFAULT_CAPTURE_HEIGHT: u32 = 480;
pub const DEFAULT_CAPTURE_FPS: u32 = 30;

pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "bmp", "tiff", "tif", "webp"];
