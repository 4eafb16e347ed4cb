use std::path::PathBuf;

use crate::capture::domain::frame_source::{FrameSource, SourceInfo};
use crate::shared::error::BoxError;
use crate::shared::frame::Frame;

/// A single still image presented as a one-frame source.
pub struct ImageFrameSource {
    path: PathBuf,
    frame: Option<Frame>,
}

impl ImageFrameSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            frame: None,
        }
    }
}

impl FrameSource for ImageFrameSource {
    fn open(&mut self) -> Result<SourceInfo, BoxError> {
        let image = image::open(&self.path)?.to_rgb8();
        let frame = Frame::from_rgb_image(image, 0);
        let info = SourceInfo {
            width: frame.width(),
            height: frame.height(),
            fps: 0.0,
            description: self.path.display().to_string(),
        };
        self.frame = Some(frame);
        Ok(info)
    }

    fn read_frame(&mut self) -> Result<Option<Frame>, BoxError> {
        Ok(self.frame.take())
    }

    fn close(&mut self) {
        self.frame = None;
    }
}
