use std::path::Path;

use ab_glyph::{FontVec, PxScale};
use image::Rgb;
use imageproc::drawing::{draw_filled_rect_mut, draw_hollow_rect_mut, draw_text_mut};
use imageproc::rect::Rect;

use crate::annotation::domain::frame_annotator::FrameAnnotator;
use crate::emotion::domain::emotion::{Emotion, Label};
use crate::emotion::domain::face_observation::FaceObservation;
use crate::shared::bounding_box::BoundingBox;
use crate::shared::error::BoxError;
use crate::shared::frame::Frame;

const BOX_COLOR: Rgb<u8> = Rgb([0, 255, 0]);
const TEXT_COLOR: Rgb<u8> = Rgb([255, 255, 255]);
const UNMAPPED_COLOR: Rgb<u8> = Rgb([200, 200, 200]);
const TAB_HEIGHT: u32 = 6;
const LINE_SPACING: i32 = 20;

/// Draws a green box around every face with a tab in the dominant
/// emotion's colour.
///
/// With a font loaded it also writes the dominant label in capitals above
/// the box and one `label: p.pp` line per emotion below it.
pub struct BoxAnnotator {
    font: Option<FontVec>,
    scale: PxScale,
}

impl BoxAnnotator {
    pub fn new() -> Self {
        Self {
            font: None,
            scale: PxScale::from(16.0),
        }
    }

    pub fn with_font_file(path: &Path) -> Result<Self, BoxError> {
        let bytes = std::fs::read(path)?;
        let font = FontVec::try_from_vec(bytes)?;
        log::debug!("Loaded annotation font {}", path.display());
        Ok(Self {
            font: Some(font),
            ..Self::new()
        })
    }

    pub fn has_font(&self) -> bool {
        self.font.is_some()
    }

    fn draw_labels(&self, image: &mut image::RgbImage, observation: &FaceObservation) {
        let Some(font) = &self.font else {
            return;
        };
        let b = &observation.bbox;
        let x = b.x as i32;

        let title = observation.dominant_emotion.as_str().to_uppercase();
        let title_y = b.y as i32 - 10 - self.scale.y as i32;
        draw_text_mut(image, BOX_COLOR, x, title_y, self.scale, font, &title);

        let mut line_y = b.bottom() as i32 + LINE_SPACING - self.scale.y as i32;
        for (label, p) in observation.emotions.iter() {
            let line = format!("{label}: {p:.2}");
            draw_text_mut(image, TEXT_COLOR, x, line_y, self.scale, font, &line);
            line_y += LINE_SPACING;
        }
    }
}

impl Default for BoxAnnotator {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameAnnotator for BoxAnnotator {
    fn annotate(
        &self,
        frame: &mut Frame,
        observations: &[FaceObservation],
    ) -> Result<(), BoxError> {
        if observations.is_empty() {
            return Ok(());
        }
        let mut image = frame.to_rgb_image().ok_or_else(|| {
            format!(
                "cannot annotate a {}-channel frame, expected RGB",
                frame.channels()
            )
        })?;

        for observation in observations {
            draw_box(&mut image, &observation.bbox);
            draw_tab(&mut image, &observation.bbox, label_color(&observation.dominant_emotion));
            self.draw_labels(&mut image, observation);
        }

        frame.data_mut().copy_from_slice(image.as_raw());
        Ok(())
    }
}

/// Two-pixel outline: the box edge plus one pixel inside it.
fn draw_box(image: &mut image::RgbImage, bbox: &BoundingBox) {
    let outer = Rect::at(bbox.x as i32, bbox.y as i32).of_size(bbox.width, bbox.height);
    draw_hollow_rect_mut(image, outer, BOX_COLOR);
    if bbox.width > 2 && bbox.height > 2 {
        let inner =
            Rect::at(bbox.x as i32 + 1, bbox.y as i32 + 1).of_size(bbox.width - 2, bbox.height - 2);
        draw_hollow_rect_mut(image, inner, BOX_COLOR);
    }
}

/// Filled strip along the top edge of the box, inside it so it never
/// leaves the frame.
fn draw_tab(image: &mut image::RgbImage, bbox: &BoundingBox, color: Rgb<u8>) {
    let tab = Rect::at(bbox.x as i32, bbox.y as i32)
        .of_size(bbox.width, TAB_HEIGHT.min(bbox.height));
    draw_filled_rect_mut(image, tab, color);
}

pub fn label_color(label: &Label) -> Rgb<u8> {
    match label.emotion() {
        Some(emotion) => emotion_color(emotion),
        None => UNMAPPED_COLOR,
    }
}

fn emotion_color(emotion: Emotion) -> Rgb<u8> {
    match emotion {
        Emotion::Happy => Rgb([0xFF, 0x6B, 0x6B]),
        Emotion::Surprise => Rgb([0x4E, 0xCD, 0xC4]),
        Emotion::Frustration => Rgb([0x45, 0xB7, 0xD1]),
        Emotion::Anger => Rgb([0x96, 0xCE, 0xB4]),
        Emotion::Sad => Rgb([0xFF, 0xEA, 0xA7]),
        Emotion::Neutral => Rgb([0xDD, 0xA0, 0xDD]),
        Emotion::Disgust => Rgb([0x98, 0xD8, 0xC8]),
    }
}
