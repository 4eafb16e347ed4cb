use std::fmt;

use serde::Serialize;

/// An axis-aligned face box in absolute pixel coordinates.
///
/// Always non-empty and always inside the frame it was derived from; the
/// constructors return `None` instead of producing a box that would violate
/// either property.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub struct BoundingBox {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl BoundingBox {
    /// Clamps a pixel-space box (which may start off-frame or overhang the
    /// edges) to a `frame_width` x `frame_height` frame.
    pub fn from_pixels(
        x: i32,
        y: i32,
        width: i32,
        height: i32,
        frame_width: u32,
        frame_height: u32,
    ) -> Option<Self> {
        if width <= 0 || height <= 0 {
            return None;
        }
        let fw = frame_width as i64;
        let fh = frame_height as i64;

        let x1 = (x as i64).clamp(0, fw);
        let y1 = (y as i64).clamp(0, fh);
        let x2 = (x as i64 + width as i64).clamp(0, fw);
        let y2 = (y as i64 + height as i64).clamp(0, fh);

        if x2 <= x1 || y2 <= y1 {
            return None;
        }
        Some(Self {
            x: x1 as u32,
            y: y1 as u32,
            width: (x2 - x1) as u32,
            height: (y2 - y1) as u32,
        })
    }

    /// Converts a box expressed as fractions of the frame size.
    ///
    /// Offsets and sizes are scaled then truncated toward zero before
    /// clamping, so a face partly off the left edge keeps its visible part.
    pub fn from_relative(
        x: f64,
        y: f64,
        width: f64,
        height: f64,
        frame_width: u32,
        frame_height: u32,
    ) -> Option<Self> {
        if ![x, y, width, height].iter().all(|v| v.is_finite()) {
            return None;
        }
        let fw = frame_width as f64;
        let fh = frame_height as f64;
        Self::from_pixels(
            (x * fw) as i32,
            (y * fh) as i32,
            (width * fw) as i32,
            (height * fh) as i32,
            frame_width,
            frame_height,
        )
    }

    pub fn right(&self) -> u32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> u32 {
        self.y + self.height
    }
}

impl fmt::Display for BoundingBox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "({}, {}) {}x{}",
            self.x, self.y, self.width, self.height
        )
    }
}
