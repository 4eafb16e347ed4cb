pub mod emotion_classifier;
pub mod face_emotion_analyzer;
