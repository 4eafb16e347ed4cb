use std::fmt;

use crate::shared::error::BoxError;
use crate::shared::frame::Frame;

/// What an opened source delivers.
#[derive(Clone, Debug, PartialEq)]
pub struct SourceInfo {
    pub width: u32,
    pub height: u32,
    /// Nominal rate; 0 for stills.
    pub fps: f64,
    pub description: String,
}

impl fmt::Display for SourceInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({}x{} @ {:.1} fps)",
            self.description, self.width, self.height, self.fps
        )
    }
}

/// A camera, video or still image that yields frames one at a time.
///
/// `close` must be safe to call more than once and on a source that never
/// opened successfully.
pub trait FrameSource: Send {
    fn open(&mut self) -> Result<SourceInfo, BoxError>;

    /// Next frame, or `Ok(None)` once the source is exhausted.
    fn read_frame(&mut self) -> Result<Option<Frame>, BoxError>;

    fn close(&mut self);
}

/// An open [`FrameSource`] that is closed when dropped.
pub struct OpenedSource {
    source: Box<dyn FrameSource>,
    info: SourceInfo,
}

impl OpenedSource {
    /// Opens `source`. On failure it is closed before the error is returned.
    pub fn open(mut source: Box<dyn FrameSource>) -> Result<Self, BoxError> {
        match source.open() {
            Ok(info) => Ok(Self { source, info }),
            Err(e) => {
                source.close();
                Err(e)
            }
        }
    }

    pub fn info(&self) -> &SourceInfo {
        &self.info
    }

    pub fn read_frame(&mut self) -> Result<Option<Frame>, BoxError> {
        self.source.read_frame()
    }
}

impl Drop for OpenedSource {
    fn drop(&mut self) {
        self.source.close();
        log::debug!("Closed frame source {}", self.info.description);
    }
}
