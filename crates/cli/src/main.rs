use std::path::{Path, PathBuf};
use std::process;

use clap::Parser;

use facemood_core::annotation::domain::frame_annotator::{FrameAnnotator, NullAnnotator};
use facemood_core::annotation::infrastructure::box_annotator::BoxAnnotator;
use facemood_core::capture::domain::frame_source::FrameSource;
use facemood_core::capture::infrastructure::ffmpeg_frame_source::FfmpegFrameSource;
use facemood_core::capture::infrastructure::image_frame_source::ImageFrameSource;
use facemood_core::classification::domain::emotion_classifier::EmotionClassifier;
use facemood_core::classification::domain::face_emotion_analyzer::FaceEmotionAnalyzer;
use facemood_core::classification::infrastructure::onnx_emotion_classifier::{
    EmotionModel, OnnxEmotionClassifier,
};
use facemood_core::detection::domain::face_detector::FaceDetector;
use facemood_core::detection::domain::face_locator::FaceLocator;
use facemood_core::detection::infrastructure::onnx_blazeface_detector::{
    OnnxBlazefaceDetector, DEFAULT_SCORE_THRESHOLD,
};
use facemood_core::emotion::domain::emotion_mapper::EmotionMapper;
use facemood_core::history::domain::shared_history::SharedHistory;
use facemood_core::history::domain::statistics_aggregator::EmotionStatistics;
use facemood_core::pipeline::annotated_frame_writer::AnnotatedFrameWriter;
use facemood_core::pipeline::frame_processor::{FrameProcessor, ProcessedFrame};
use facemood_core::pipeline::live_session::{LiveSession, SessionConfig, SessionEvent};
use facemood_core::pipeline::pipeline_logger::StdoutPipelineLogger;
use facemood_core::shared::constants::{
    BLAZEFACE_MODEL_NAME, FER2013_MODEL_NAME, FERPLUS_MODEL_NAME, FERPLUS_MODEL_URL,
    IMAGE_EXTENSIONS,
};
use facemood_core::shared::model_resolver::{self, ModelFile};
use facemood_core::shared::settings::{DetectionFailurePolicy, Settings};

/// Live facial emotion recognition for cameras, videos and images.
#[derive(Parser)]
#[command(name = "facemood")]
struct Cli {
    /// Video or image file, or a capture device when --input-format is given
    /// (e.g. /dev/video0 with v4l2, "0" with avfoundation).
    input: String,

    /// ffmpeg capture input format (v4l2, avfoundation, dshow).
    #[arg(long)]
    input_format: Option<String>,

    /// JSON settings file. Flags override its values.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Minimum face detection confidence (0.0-1.0).
    #[arg(long)]
    confidence: Option<f64>,

    /// Number of observations kept for rolling statistics.
    #[arg(long)]
    history_capacity: Option<usize>,

    /// Save annotated frames with faces as PNGs in this directory.
    #[arg(long)]
    annotated_dir: Option<PathBuf>,

    /// Write the final statistics report as JSON.
    #[arg(long)]
    stats_json: Option<PathBuf>,

    /// Log rolling statistics every N frames (0 = only at the end).
    #[arg(long)]
    stats_every: Option<usize>,

    /// Stop after this many frames.
    #[arg(long)]
    max_frames: Option<usize>,

    /// What to do when face detection fails on a frame: skip or abort.
    #[arg(long)]
    on_detection_failure: Option<DetectionFailurePolicy>,

    /// TrueType font for label text on annotated frames.
    #[arg(long)]
    font: Option<PathBuf>,

    /// Delay between frames in milliseconds.
    #[arg(long)]
    pace_ms: Option<u64>,

    /// Do not draw on frames.
    #[arg(long)]
    no_annotate: bool,

    /// BlazeFace ONNX model (default: model cache).
    #[arg(long)]
    detector_model: Option<PathBuf>,

    /// Emotion ONNX model (default: model cache, downloaded for ferplus).
    #[arg(long)]
    classifier_model: Option<PathBuf>,

    /// Emotion model layout: ferplus or fer2013.
    #[arg(long, default_value = "ferplus")]
    emotion_model: EmotionModel,
}

fn main() {
    env_logger::init();

    if let Err(e) = run() {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    validate(&cli)?;

    let settings = load_settings(&cli)?;
    let detector = build_detector(&cli)?;
    let classifier = build_classifier(&cli)?;
    let annotator = build_annotator(&settings)?;

    let processor = FrameProcessor::new(
        FaceLocator::new(detector, settings.min_detection_confidence),
        FaceEmotionAnalyzer::new(classifier, EmotionMapper::default()),
        annotator,
    )
    .with_logger(Box::new(StdoutPipelineLogger::default()));

    let history = SharedHistory::new(settings.history_capacity)?;
    let mut config = SessionConfig::from_settings(&settings);
    config.max_frames = cli.max_frames;

    let mut frame_writer = cli
        .annotated_dir
        .as_deref()
        .map(AnnotatedFrameWriter::new)
        .transpose()
        .map_err(|e| -> Box<dyn std::error::Error> { e })?;

    let handle = LiveSession::start(open_source(&cli, &settings), processor, history, config);
    let events = handle.events().clone();

    for event in events.iter() {
        match event {
            SessionEvent::Started(info) => log::info!("Reading from {info}"),
            SessionEvent::FrameProcessed { index, faces } => {
                if faces > 0 {
                    if let (Some(writer), Some(latest)) = (frame_writer.as_mut(), handle.latest()) {
                        if is_annotated_frame(&latest, index) {
                            writer.write(&latest).map_err(|e| -> Box<dyn std::error::Error> { e })?;
                        }
                    }
                }
                if settings.stats_every > 0 && (index + 1) % settings.stats_every == 0 {
                    log::info!("Rolling statistics: {}", format_statistics(&handle.statistics()));
                }
            }
            SessionEvent::FrameSkipped { .. } => {}
            SessionEvent::Finished(_) => break,
        }
    }

    let statistics = handle.statistics();
    let summary = handle.join()?;

    log::info!("Final statistics: {}", format_statistics(&statistics));
    if let Some(writer) = &frame_writer {
        log::info!(
            "Saved {} annotated frames to {}",
            writer.written(),
            writer.dir().display()
        );
    }
    if let Some(path) = &cli.stats_json {
        let report = serde_json::json!({
            "summary": summary,
            "statistics": statistics,
        });
        std::fs::write(path, serde_json::to_string_pretty(&report)?)?;
        log::info!("Statistics written to {}", path.display());
    }

    Ok(())
}

fn load_settings(cli: &Cli) -> Result<Settings, Box<dyn std::error::Error>> {
    let mut settings = match &cli.config {
        Some(path) => Settings::load(path)?,
        None => Settings::default(),
    };
    apply_overrides(&mut settings, cli);
    settings.validate()?;
    Ok(settings)
}

fn apply_overrides(settings: &mut Settings, cli: &Cli) {
    if let Some(confidence) = cli.confidence {
        settings.min_detection_confidence = confidence;
    }
    if let Some(capacity) = cli.history_capacity {
        settings.history_capacity = capacity;
    }
    if let Some(every) = cli.stats_every {
        settings.stats_every = every;
    }
    if let Some(policy) = cli.on_detection_failure {
        settings.on_detection_failure = policy;
    }
    if let Some(pace) = cli.pace_ms {
        settings.pace_ms = pace;
    }
    if let Some(font) = &cli.font {
        settings.font_path = Some(font.clone());
    }
    if cli.no_annotate {
        settings.annotate = false;
    }
}

fn build_detector(cli: &Cli) -> Result<Box<dyn FaceDetector>, Box<dyn std::error::Error>> {
    log::info!("Resolving model: {BLAZEFACE_MODEL_NAME}");
    let model = ModelFile {
        name: BLAZEFACE_MODEL_NAME,
        url: None,
    };
    let path = model_resolver::resolve(model, cli.detector_model.as_deref(), None, None)?;
    Ok(Box::new(OnnxBlazefaceDetector::new(
        &path,
        DEFAULT_SCORE_THRESHOLD,
    )
    .map_err(|e| -> Box<dyn std::error::Error> { e })?))
}

fn build_classifier(cli: &Cli) -> Result<Box<dyn EmotionClassifier>, Box<dyn std::error::Error>> {
    let model = if cli.emotion_model == EmotionModel::FER_PLUS {
        ModelFile {
            name: FERPLUS_MODEL_NAME,
            url: Some(FERPLUS_MODEL_URL),
        }
    } else {
        ModelFile {
            name: FER2013_MODEL_NAME,
            url: None,
        }
    };
    log::info!("Resolving model: {}", model.name);
    let path = model_resolver::resolve(
        model,
        cli.classifier_model.as_deref(),
        None,
        Some(Box::new(download_progress)),
    )?;
    Ok(Box::new(OnnxEmotionClassifier::new(&path, cli.emotion_model).map_err(|e| -> Box<dyn std::error::Error> { e })?))
}

fn build_annotator(settings: &Settings) -> Result<Box<dyn FrameAnnotator>, Box<dyn std::error::Error>> {
    if !settings.annotate {
        return Ok(Box::new(NullAnnotator));
    }
    let annotator = match &settings.font_path {
        Some(font) => BoxAnnotator::with_font_file(font).map_err(|e| -> Box<dyn std::error::Error> { e })?,
        None => BoxAnnotator::new(),
    };
    if !annotator.has_font() {
        log::info!("No font configured; drawing boxes without emotion labels");
    }
    Ok(Box::new(annotator))
}

/// The latest slot may already hold a later frame than the event announced.
fn is_annotated_frame(latest: &ProcessedFrame, index: usize) -> bool {
    latest.frame_index == index && !latest.observations.is_empty()
}

fn open_source(cli: &Cli, settings: &Settings) -> Box<dyn FrameSource> {
    match &cli.input_format {
        Some(format) => Box::new(FfmpegFrameSource::device(
            &cli.input,
            format.clone(),
            settings.capture,
        )),
        None if is_image(Path::new(&cli.input)) => Box::new(ImageFrameSource::new(&cli.input)),
        None => Box::new(FfmpegFrameSource::file(&cli.input)),
    }
}

fn validate(cli: &Cli) -> Result<(), Box<dyn std::error::Error>> {
    if cli.input_format.is_none() && !Path::new(&cli.input).exists() {
        return Err(format!("Input file not found: {}", cli.input).into());
    }
    if let Some(confidence) = cli.confidence {
        if !(0.0..=1.0).contains(&confidence) {
            return Err(
                format!("Confidence must be between 0.0 and 1.0, got {confidence}").into(),
            );
        }
    }
    if cli.history_capacity == Some(0) {
        return Err("History capacity must be at least 1".into());
    }
    if cli.max_frames == Some(0) {
        return Err("Max frames must be at least 1".into());
    }
    if let Some(font) = &cli.font {
        if !font.exists() {
            return Err(format!("Font file not found: {}", font.display()).into());
        }
    }
    Ok(())
}

fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
        .unwrap_or(false)
}

/// `happy 60.0%, sad 40.0% (10 detections)`
fn format_statistics(stats: &EmotionStatistics) -> String {
    if stats.is_empty() {
        return "no detections yet".into();
    }
    let mut ranked: Vec<_> = stats.fractions.iter().collect();
    ranked.sort_by(|a, b| b.1.total_cmp(a.1).then_with(|| a.0.cmp(b.0)));
    let parts: Vec<String> = ranked
        .into_iter()
        .map(|(label, fraction)| format!("{label} {:.1}%", fraction * 100.0))
        .collect();
    format!("{} ({} detections)", parts.join(", "), stats.total)
}

fn download_progress(downloaded: u64, total: u64) {
    if total > 0 {
        let pct = downloaded as f64 / total as f64 * 100.0;
        eprint!("\rDownloading: {pct:.0}%");
    } else {
        eprint!("\rDownloading: {downloaded} bytes");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use facemood_core::emotion::domain::emotion::Emotion;
    use facemood_core::emotion::domain::emotion_distribution::EmotionDistribution;
    use facemood_core::emotion::domain::face_observation::FaceObservation;
    use facemood_core::shared::bounding_box::BoundingBox;
    use facemood_core::shared::frame::Frame;
    use facemood_core::history::domain::rolling_history::HistoryEntry;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("facemood").chain(args.iter().copied())).unwrap()
    }

    fn processed(index: usize, faces: usize) -> ProcessedFrame {
        let mut frame = ProcessedFrame::unprocessed(&Frame::new(vec![0; 12], 2, 2, 3, index));
        let bbox = BoundingBox {
            x: 0,
            y: 0,
            width: 1,
            height: 1,
        };
        frame.observations = (0..faces)
            .map(|_| FaceObservation::new(bbox, EmotionDistribution::empty()))
            .collect();
        frame
    }

    #[test]
    fn test_annotated_frame_must_match_event() {
        assert!(is_annotated_frame(&processed(4, 1), 4));
        // Producer already moved on to a frame without faces.
        assert!(!is_annotated_frame(&processed(5, 0), 4));
        assert!(!is_annotated_frame(&processed(5, 2), 4));
    }

    #[test]
    fn test_defaults() {
        let cli = parse(&["clip.mp4"]);
        assert_eq!(cli.emotion_model, EmotionModel::FER_PLUS);
        assert!(cli.input_format.is_none());
        assert!(!cli.no_annotate);
    }

    #[test]
    fn test_rejects_unknown_policy() {
        let result = Cli::try_parse_from(["facemood", "clip.mp4", "--on-detection-failure", "retry"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_missing_file_rejected_unless_device() {
        assert!(validate(&parse(&["/nonexistent/clip.mp4"])).is_err());
        assert!(validate(&parse(&["/dev/video9", "--input-format", "v4l2"])).is_ok());
    }

    #[test]
    fn test_validate_ranges() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("face.png");
        std::fs::write(&input, b"").unwrap();
        let input = input.to_str().unwrap();

        assert!(validate(&parse(&[input])).is_ok());
        assert!(validate(&parse(&[input, "--confidence", "1.2"])).is_err());
        assert!(validate(&parse(&[input, "--history-capacity", "0"])).is_err());
        assert!(validate(&parse(&[input, "--max-frames", "0"])).is_err());
        assert!(validate(&parse(&[input, "--font", "/nonexistent/font.ttf"])).is_err());
    }

    #[test]
    fn test_flags_override_settings() {
        let cli = parse(&[
            "clip.mp4",
            "--confidence",
            "0.7",
            "--history-capacity",
            "20",
            "--on-detection-failure",
            "abort",
            "--no-annotate",
        ]);
        let mut settings = Settings::default();
        apply_overrides(&mut settings, &cli);
        assert_eq!(settings.min_detection_confidence, 0.7);
        assert_eq!(settings.history_capacity, 20);
        assert_eq!(settings.on_detection_failure, DetectionFailurePolicy::Abort);
        assert!(!settings.annotate);
        assert_eq!(settings.stats_every, Settings::default().stats_every);
    }

    #[test]
    fn test_is_image() {
        assert!(is_image(Path::new("face.PNG")));
        assert!(is_image(Path::new("a/b.jpeg")));
        assert!(!is_image(Path::new("clip.mp4")));
        assert!(!is_image(Path::new("/dev/video0")));
    }

    #[test]
    fn test_format_statistics_ranks_by_fraction() {
        let mut snapshot = Vec::new();
        for _ in 0..4 {
            snapshot.push(HistoryEntry::new(Emotion::Sad.into(), 0.9));
        }
        for _ in 0..6 {
            snapshot.push(HistoryEntry::new(Emotion::Happy.into(), 0.9));
        }
        let text = format_statistics(&EmotionStatistics::compute(&snapshot));
        assert_eq!(text, "happy 60.0%, sad 40.0% (10 detections)");
    }

    #[test]
    fn test_format_empty_statistics() {
        assert_eq!(
            format_statistics(&EmotionStatistics::default()),
            "no detections yet"
        );
    }
}
