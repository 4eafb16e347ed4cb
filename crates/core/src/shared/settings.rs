use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::shared::constants::{
    DEFAULT_CAPTURE_FPS, DEFAULT_CAPTURE_HEIGHT, DEFAULT_CAPTURE_WIDTH, DEFAULT_HISTORY_CAPACITY,
    DEFAULT_MIN_DETECTION_CONFIDENCE,
};

#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("failed to read settings from {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid settings in {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("{0}")]
    Invalid(String),
}

/// What the processing loop does when the face detector fails on a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DetectionFailurePolicy {
    /// Publish the raw frame with no observations and continue.
    #[default]
    Skip,
    /// Stop the session and report the failure.
    Abort,
}

impl std::str::FromStr for DetectionFailurePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "skip" => Ok(Self::Skip),
            "abort" => Ok(Self::Abort),
            other => Err(format!(
                "detection failure policy must be 'skip' or 'abort', got '{other}'"
            )),
        }
    }
}

/// Requested capture geometry for camera devices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureSettings {
    pub width: u32,
    pub height: u32,
    pub fps: u32,
}

impl Default for CaptureSettings {
    fn default() -> Self {
        Self {
            width: DEFAULT_CAPTURE_WIDTH,
            height: DEFAULT_CAPTURE_HEIGHT,
            fps: DEFAULT_CAPTURE_FPS,
        }
    }
}

/// Pipeline settings, loadable from a JSON file. Missing fields take their
/// defaults so partial files are valid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub history_capacity: usize,
    pub min_detection_confidence: f64,
    pub capture: CaptureSettings,
    pub on_detection_failure: DetectionFailurePolicy,
    /// Delay between frames in milliseconds (0 = as fast as the source allows).
    pub pace_ms: u64,
    pub annotate: bool,
    /// TrueType font for label text; without one only boxes and colour tabs are drawn.
    pub font_path: Option<PathBuf>,
    /// Log rolling statistics every N processed frames (0 = only at the end).
    pub stats_every: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            history_capacity: DEFAULT_HISTORY_CAPACITY,
            min_detection_confidence: DEFAULT_MIN_DETECTION_CONFIDENCE,
            capture: CaptureSettings::default(),
            on_detection_failure: DetectionFailurePolicy::default(),
            pace_ms: 0,
            annotate: true,
            font_path: None,
            stats_every: 30,
        }
    }
}

impl Settings {
    pub fn load(path: &Path) -> Result<Self, SettingsError> {
        let json = fs::read_to_string(path).map_err(|source| SettingsError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let settings: Settings =
            serde_json::from_str(&json).map_err(|source| SettingsError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.history_capacity == 0 {
            return Err(SettingsError::Invalid(
                "History capacity must be at least 1".into(),
            ));
        }
        if !(0.0..=1.0).contains(&self.min_detection_confidence) {
            return Err(SettingsError::Invalid(format!(
                "Detection confidence must be between 0.0 and 1.0, got {}",
                self.min_detection_confidence
            )));
        }
        let c = &self.capture;
        if c.width == 0 || c.height == 0 || c.fps == 0 {
            return Err(SettingsError::Invalid(format!(
                "Capture size and fps must be positive, got {}x{} @ {}",
                c.width, c.height, c.fps
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_defaults_match_live_capture_setup() {
        let s = Settings::default();
        assert_eq!(s.history_capacity, 100);
        assert_relative_eq!(s.min_detection_confidence, 0.5);
        assert_eq!(s.capture, CaptureSettings { width: 640, height: 480, fps: 30 });
        assert_eq!(s.on_detection_failure, DetectionFailurePolicy::Skip);
        assert!(s.annotate);
        assert!(s.validate().is_ok());
    }

    #[test]
    fn test_partial_json_fills_defaults() {
        let s: Settings =
            serde_json::from_str(r#"{"history_capacity": 20, "capture": {"fps": 15}}"#).unwrap();
        assert_eq!(s.history_capacity, 20);
        assert_eq!(s.capture.fps, 15);
        assert_eq!(s.capture.width, 640);
        assert_eq!(s.stats_every, 30);
    }

    #[test]
    fn test_policy_serializes_lowercase() {
        let s = Settings {
            on_detection_failure: DetectionFailurePolicy::Abort,
            ..Settings::default()
        };
        let json = serde_json::to_string(&s).unwrap();
        assert!(json.contains(r#""on_detection_failure":"abort""#));
    }

    #[test]
    fn test_policy_from_str() {
        assert_eq!(
            "skip".parse::<DetectionFailurePolicy>(),
            Ok(DetectionFailurePolicy::Skip)
        );
        assert_eq!(
            "abort".parse::<DetectionFailurePolicy>(),
            Ok(DetectionFailurePolicy::Abort)
        );
        assert!("retry".parse::<DetectionFailurePolicy>().is_err());
    }

    #[test]
    fn test_load_round_trips_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, r#"{"pace_ms": 30, "annotate": false}"#).unwrap();

        let s = Settings::load(&path).unwrap();
        assert_eq!(s.pace_ms, 30);
        assert!(!s.annotate);
    }

    #[test]
    fn test_load_missing_file_is_read_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = Settings::load(&dir.path().join("missing.json")).unwrap_err();
        assert!(matches!(err, SettingsError::Read { .. }));
    }

    #[test]
    fn test_load_rejects_malformed_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, "{ not json").unwrap();
        assert!(matches!(
            Settings::load(&path).unwrap_err(),
            SettingsError::Parse { .. }
        ));
    }

    #[test]
    fn test_validate_rejects_zero_capacity() {
        let s = Settings {
            history_capacity: 0,
            ..Settings::default()
        };
        assert!(matches!(s.validate(), Err(SettingsError::Invalid(_))));
    }

    #[test]
    fn test_validate_rejects_confidence_out_of_range() {
        let s = Settings {
            min_detection_confidence: 1.5,
            ..Settings::default()
        };
        assert!(s.validate().is_err());
    }
}
