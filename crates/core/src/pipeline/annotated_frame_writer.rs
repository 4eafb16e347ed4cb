use std::path::{Path, PathBuf};

use crate::pipeline::frame_processor::ProcessedFrame;
use crate::shared::error::BoxError;

/// Saves annotated frames as numbered PNGs in one directory.
///
/// The same frame index is written at most once, so it can be fed from a
/// polled latest-result slot.
pub struct AnnotatedFrameWriter {
    dir: PathBuf,
    last_written: Option<usize>,
    written: usize,
}

impl AnnotatedFrameWriter {
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self, BoxError> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self {
            dir,
            last_written: None,
            written: 0,
        })
    }

    /// Writes `processed` unless that frame was already written. Returns the
    /// file path when something was written.
    pub fn write(&mut self, processed: &ProcessedFrame) -> Result<Option<PathBuf>, BoxError> {
        if self.last_written == Some(processed.frame_index) {
            return Ok(None);
        }
        let path = self.path_for(processed.frame_index);
        let image = processed
            .annotated
            .to_rgb_image()
            .ok_or("annotated frame is not RGB")?;
        image.save(&path)?;

        self.last_written = Some(processed.frame_index);
        self.written += 1;
        Ok(Some(path))
    }

    pub fn written(&self) -> usize {
        self.written
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, index: usize) -> PathBuf {
        self.dir.join(format!("frame_{index:06}.png"))
    }
}
