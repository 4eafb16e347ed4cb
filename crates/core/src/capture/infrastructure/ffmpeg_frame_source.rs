use std::path::PathBuf;

use crate::capture::domain::frame_source::{FrameSource, SourceInfo};
use crate::shared::error::BoxError;
use crate::shared::frame::Frame;
use crate::shared::settings::CaptureSettings;

/// Frames from a video file or a capture device, decoded by ffmpeg-next.
///
/// Without an input format the target is opened as a file or URL. With one
/// (`v4l2`, `avfoundation`, `dshow`, ...) it names a device, and the
/// requested capture size and rate are passed to the demuxer.
pub struct FfmpegFrameSource {
    target: PathBuf,
    input_format: Option<String>,
    capture: CaptureSettings,
    state: Option<DecodeState>,
    next_index: usize,
}

// Safety: FfmpegFrameSource is only used from a single thread at a time.
// The raw pointers inside ffmpeg types are not shared across threads.
unsafe impl Send for FfmpegFrameSource {}

struct DecodeState {
    ictx: ffmpeg_next::format::context::Input,
    decoder: ffmpeg_next::decoder::Video,
    scaler: ffmpeg_next::software::scaling::Context,
    stream_index: usize,
    width: u32,
    height: u32,
    flushing: bool,
}

impl FfmpegFrameSource {
    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self {
            target: path.into(),
            input_format: None,
            capture: CaptureSettings::default(),
            state: None,
            next_index: 0,
        }
    }

    pub fn device(
        device: impl Into<PathBuf>,
        input_format: impl Into<String>,
        capture: CaptureSettings,
    ) -> Self {
        Self {
            input_format: Some(input_format.into()),
            capture,
            ..Self::file(device)
        }
    }

    fn open_input(&self) -> Result<ffmpeg_next::format::context::Input, BoxError> {
        let Some(name) = &self.input_format else {
            return Ok(ffmpeg_next::format::input(&self.target)?);
        };

        ffmpeg_next::device::register_all();
        let format = ffmpeg_next::device::input::video()
            .find(|f| f.name() == name)
            .ok_or_else(|| format!("ffmpeg has no '{name}' capture input"))?;

        let mut options = ffmpeg_next::Dictionary::new();
        options.set(
            "video_size",
            &format!("{}x{}", self.capture.width, self.capture.height),
        );
        options.set("framerate", &self.capture.fps.to_string());

        Ok(ffmpeg_next::format::open_with(&self.target, &format, options)?.input())
    }
}

impl FrameSource for FfmpegFrameSource {
    fn open(&mut self) -> Result<SourceInfo, BoxError> {
        ffmpeg_next::init()?;

        let ictx = self.open_input()?;
        let stream = ictx
            .streams()
            .best(ffmpeg_next::media::Type::Video)
            .ok_or("No video stream found")?;

        let stream_index = stream.index();
        let codec_ctx = ffmpeg_next::codec::context::Context::from_parameters(stream.parameters())?;
        let decoder = codec_ctx.decoder().video()?;

        let rate = stream.avg_frame_rate();
        let fps = if rate.denominator() != 0 {
            rate.numerator() as f64 / rate.denominator() as f64
        } else {
            0.0
        };

        let width = decoder.width();
        let height = decoder.height();
        let scaler = ffmpeg_next::software::scaling::Context::get(
            decoder.format(),
            width,
            height,
            ffmpeg_next::format::Pixel::RGB24,
            width,
            height,
            ffmpeg_next::software::scaling::Flags::BILINEAR,
        )?;

        let info = SourceInfo {
            width,
            height,
            fps,
            description: self.target.display().to_string(),
        };
        log::info!("Opened {info}");

        self.state = Some(DecodeState {
            ictx,
            decoder,
            scaler,
            stream_index,
            width,
            height,
            flushing: false,
        });
        self.next_index = 0;
        Ok(info)
    }

    fn read_frame(&mut self) -> Result<Option<Frame>, BoxError> {
        let state = self.state.as_mut().ok_or("FfmpegFrameSource: not opened")?;

        loop {
            if let Some(frame) = state.try_receive(self.next_index)? {
                self.next_index += 1;
                return Ok(Some(frame));
            }
            if state.flushing {
                return Ok(None);
            }

            let packet = state
                .ictx
                .packets()
                .next()
                .map(|(stream, packet)| (stream.index(), packet));
            match packet {
                None => {
                    let _ = state.decoder.send_eof();
                    state.flushing = true;
                }
                Some((index, packet)) if index == state.stream_index => {
                    if let Err(e) = state.decoder.send_packet(&packet) {
                        log::debug!("Dropping undecodable packet: {e}");
                    }
                }
                Some(_) => {}
            }
        }
    }

    fn close(&mut self) {
        self.state = None;
    }
}

impl DecodeState {
    fn try_receive(&mut self, index: usize) -> Result<Option<Frame>, BoxError> {
        let mut decoded = ffmpeg_next::util::frame::video::Video::empty();
        if self.decoder.receive_frame(&mut decoded).is_err() {
            return Ok(None);
        }
        let mut rgb_frame = ffmpeg_next::util::frame::video::Video::empty();
        self.scaler.run(&decoded, &mut rgb_frame)?;

        let pixels = extract_rgb_pixels(&rgb_frame, self.width, self.height);
        Ok(Some(Frame::new(pixels, self.width, self.height, 3, index)))
    }
}

/// Copies pixel data into a tightly packed RGB buffer, dropping row padding.
fn extract_rgb_pixels(
    rgb_frame: &ffmpeg_next::util::frame::video::Video,
    width: u32,
    height: u32,
) -> Vec<u8> {
    let stride = rgb_frame.stride(0);
    let data = rgb_frame.data(0);
    let row_len = width as usize * 3;

    let mut pixels = Vec::with_capacity(row_len * height as usize);
    for row in 0..height as usize {
        let start = row * stride;
        pixels.extend_from_slice(&data[start..start + row_len]);
    }
    pixels
}
