pub mod emotion;
pub mod emotion_distribution;
pub mod emotion_mapper;
pub mod face_observation;
