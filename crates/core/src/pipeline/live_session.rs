use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;

use crate::capture::domain::frame_source::{FrameSource, OpenedSource, SourceInfo};
use crate::detection::domain::face_locator::DetectionFailure;
use crate::history::domain::rolling_history::HistoryEntry;
use crate::history::domain::shared_history::SharedHistory;
use crate::history::domain::statistics_aggregator::EmotionStatistics;
use crate::pipeline::frame_processor::{FrameProcessor, ProcessedFrame};
use crate::pipeline::latest_result::LatestResult;
use crate::shared::error::BoxError;
use crate::shared::settings::{DetectionFailurePolicy, Settings};

/// Events queued for the handle before newer ones are dropped.
pub const EVENT_QUEUE_CAPACITY: usize = 256;

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("frame source failed: {0}")]
    Source(#[source] BoxError),
    #[error(transparent)]
    Detection(#[from] DetectionFailure),
    #[error("processing thread panicked")]
    WorkerPanicked,
}

#[derive(Clone, Debug, Default)]
pub struct SessionConfig {
    pub on_detection_failure: DetectionFailurePolicy,
    /// Sleep between frames.
    pub pace: Option<Duration>,
    /// Stop after reading this many frames.
    pub max_frames: Option<usize>,
}

impl SessionConfig {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            on_detection_failure: settings.on_detection_failure,
            pace: (settings.pace_ms > 0).then(|| Duration::from_millis(settings.pace_ms)),
            max_frames: None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// The source ran out of frames.
    Exhausted,
    /// [`SessionHandle::stop`] was called.
    Requested,
    FrameLimit,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SessionSummary {
    pub frames_processed: usize,
    pub frames_skipped: usize,
    pub faces_observed: usize,
    pub stop_reason: StopReason,
}

/// Progress notifications for the presentation layer.
#[derive(Clone, Debug)]
pub enum SessionEvent {
    Started(SourceInfo),
    FrameProcessed { index: usize, faces: usize },
    FrameSkipped { index: usize, reason: String },
    Finished(SessionSummary),
}

/// Background loop: read a frame, process it, record it, publish it.
pub struct LiveSession;

impl LiveSession {
    /// Spawns the processing thread. The source is opened on that thread
    /// and closed on every exit path.
    pub fn start(
        source: Box<dyn FrameSource>,
        processor: FrameProcessor,
        history: SharedHistory,
        config: SessionConfig,
    ) -> SessionHandle {
        let latest = LatestResult::new();
        let stop = Arc::new(AtomicBool::new(false));
        let frames = Arc::new(AtomicUsize::new(0));
        let (events_tx, events_rx) = crossbeam_channel::bounded(EVENT_QUEUE_CAPACITY);

        let worker = {
            let shared = Shared {
                latest: latest.clone(),
                history: history.clone(),
                stop: stop.clone(),
                frames: frames.clone(),
                events: events_tx,
            };
            std::thread::spawn(move || run(source, processor, shared, config))
        };

        SessionHandle {
            latest,
            history,
            stop,
            frames,
            events: events_rx,
            worker: Some(worker),
        }
    }
}

/// State the processing thread shares with its handle.
struct Shared {
    latest: LatestResult,
    history: SharedHistory,
    stop: Arc<AtomicBool>,
    frames: Arc<AtomicUsize>,
    events: crossbeam_channel::Sender<SessionEvent>,
}

impl Shared {
    fn emit(&self, event: SessionEvent) {
        // Full queue or dropped receiver: the event is lost, the frame is not.
        if let Err(crossbeam_channel::TrySendError::Full(event)) = self.events.try_send(event) {
            log::debug!("Event queue full, dropping {event:?}");
        }
    }
}

fn run(
    source: Box<dyn FrameSource>,
    mut processor: FrameProcessor,
    shared: Shared,
    config: SessionConfig,
) -> Result<SessionSummary, SessionError> {
    let mut source = OpenedSource::open(source).map_err(SessionError::Source)?;
    log::info!("Session started on {}", source.info());
    shared.emit(SessionEvent::Started(source.info().clone()));

    let result = process_frames(&mut source, &mut processor, &shared, &config);
    processor.finish();

    if let Ok(summary) = &result {
        log::info!(
            "Session finished ({:?}): {} frames, {} skipped, {} faces",
            summary.stop_reason,
            summary.frames_processed,
            summary.frames_skipped,
            summary.faces_observed
        );
        shared.emit(SessionEvent::Finished(summary.clone()));
    }
    result
}

fn process_frames(
    source: &mut OpenedSource,
    processor: &mut FrameProcessor,
    shared: &Shared,
    config: &SessionConfig,
) -> Result<SessionSummary, SessionError> {
    let mut frames_read = 0;
    let mut skipped = 0;
    let mut faces = 0;

    let stop_reason = loop {
        if shared.stop.load(Ordering::Relaxed) {
            break StopReason::Requested;
        }
        if config.max_frames.is_some_and(|max| frames_read >= max) {
            break StopReason::FrameLimit;
        }

        let Some(frame) = source.read_frame().map_err(SessionError::Source)? else {
            break StopReason::Exhausted;
        };
        frames_read += 1;

        match processor.process(&frame) {
            Ok(processed) => {
                let count = processed.observations.len();
                shared.history.record_all(&processed.observations);
                shared.latest.publish(processed);
                shared.frames.fetch_add(1, Ordering::Relaxed);
                faces += count;
                shared.emit(SessionEvent::FrameProcessed {
                    index: frame.index(),
                    faces: count,
                });
            }
            Err(failure) => match config.on_detection_failure {
                DetectionFailurePolicy::Abort => return Err(failure.into()),
                DetectionFailurePolicy::Skip => {
                    log::warn!("Skipping frame: {failure}");
                    skipped += 1;
                    shared.latest.publish(ProcessedFrame::unprocessed(&frame));
                    shared.emit(SessionEvent::FrameSkipped {
                        index: frame.index(),
                        reason: failure.to_string(),
                    });
                }
            },
        }

        if let Some(pace) = config.pace {
            std::thread::sleep(pace);
        }
    };

    Ok(SessionSummary {
        frames_processed: frames_read - skipped,
        frames_skipped: skipped,
        faces_observed: faces,
        stop_reason,
    })
}

/// Presentation-side view of a running session. Never blocks on the
/// processing thread except in [`join`](Self::join).
///
/// Dropping the handle stops the session and waits for it.
pub struct SessionHandle {
    latest: LatestResult,
    history: SharedHistory,
    stop: Arc<AtomicBool>,
    frames: Arc<AtomicUsize>,
    events: crossbeam_channel::Receiver<SessionEvent>,
    worker: Option<JoinHandle<Result<SessionSummary, SessionError>>>,
}

impl SessionHandle {
    pub fn latest(&self) -> Option<Arc<ProcessedFrame>> {
        self.latest.get()
    }

    pub fn statistics(&self) -> EmotionStatistics {
        self.history.statistics()
    }

    pub fn history_snapshot(&self) -> Vec<HistoryEntry> {
        self.history.snapshot()
    }

    pub fn frames_processed(&self) -> usize {
        self.frames.load(Ordering::Relaxed)
    }

    pub fn events(&self) -> &crossbeam_channel::Receiver<SessionEvent> {
        &self.events
    }

    /// Asks the loop to stop before its next frame.
    pub fn stop(&self) {
        self.stop.store(true, Ordering::Relaxed);
    }

    pub fn is_finished(&self) -> bool {
        self.worker.as_ref().map_or(true, |w| w.is_finished())
    }

    pub fn join(mut self) -> Result<SessionSummary, SessionError> {
        match self.worker.take() {
            Some(worker) => worker.join().map_err(|_| SessionError::WorkerPanicked)?,
            None => Err(SessionError::WorkerPanicked),
        }
    }
}

impl Drop for SessionHandle {
    fn drop(&mut self) {
        if let Some(worker) = self.worker.take() {
            self.stop();
            let _ = worker.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotation::domain::frame_annotator::NullAnnotator;
    use crate::classification::domain::emotion_classifier::EmotionClassifier;
    use crate::classification::domain::face_emotion_analyzer::FaceEmotionAnalyzer;
    use crate::detection::domain::face_detector::{DetectedBounds, Detection, FaceDetector};
    use crate::detection::domain::face_locator::FaceLocator;
    use crate::emotion::domain::emotion::{Emotion, Label};
    use crate::emotion::domain::emotion_mapper::{EmotionMapper, RawDistribution};
    use crate::shared::frame::Frame;
    use approx::assert_relative_eq;

    // --- Stubs ---

    struct StubSource {
        /// `None` = endless.
        frames: Option<usize>,
        fail_read_at: Option<usize>,
        fail_open: bool,
        next: usize,
        closes: Arc<AtomicUsize>,
    }

    impl FrameSource for StubSource {
        fn open(&mut self) -> Result<SourceInfo, BoxError> {
            if self.fail_open {
                return Err("no camera".into());
            }
            Ok(SourceInfo {
                width: 32,
                height: 32,
                fps: 30.0,
                description: "stub camera".into(),
            })
        }

        fn read_frame(&mut self) -> Result<Option<Frame>, BoxError> {
            if self.fail_read_at == Some(self.next) {
                return Err("camera unplugged".into());
            }
            if self.frames.is_some_and(|n| self.next >= n) {
                return Ok(None);
            }
            let frame = Frame::new(vec![90; 32 * 32 * 3], 32, 32, 3, self.next);
            self.next += 1;
            Ok(Some(frame))
        }

        fn close(&mut self) {
            self.closes.fetch_add(1, Ordering::SeqCst);
        }
    }

    /// One face per frame; errors on the listed frame indices.
    struct StubDetector {
        fail_on: Vec<usize>,
    }

    impl FaceDetector for StubDetector {
        fn detect(&mut self, frame: &Frame) -> Result<Vec<Detection>, BoxError> {
            if self.fail_on.contains(&frame.index()) {
                return Err("bad frame".into());
            }
            Ok(vec![Detection {
                bounds: DetectedBounds::Relative {
                    x: 0.25,
                    y: 0.25,
                    width: 0.5,
                    height: 0.5,
                },
                confidence: 0.99,
            }])
        }
    }

    struct HappyClassifier;

    impl EmotionClassifier for HappyClassifier {
        fn classify(&mut self, _face: &Frame) -> Result<RawDistribution, BoxError> {
            Ok([("happy".to_string(), 0.9), ("sad".to_string(), 0.1)]
                .into_iter()
                .collect())
        }
    }

    // --- Helpers ---

    fn source(frames: Option<usize>) -> (StubSource, Arc<AtomicUsize>) {
        let closes = Arc::new(AtomicUsize::new(0));
        let source = StubSource {
            frames,
            fail_read_at: None,
            fail_open: false,
            next: 0,
            closes: closes.clone(),
        };
        (source, closes)
    }

    fn processor(fail_on: Vec<usize>) -> FrameProcessor {
        FrameProcessor::new(
            FaceLocator::new(Box::new(StubDetector { fail_on }), 0.5),
            FaceEmotionAnalyzer::new(Box::new(HappyClassifier), EmotionMapper::default()),
            Box::new(NullAnnotator),
        )
    }

    fn start(source: StubSource, fail_on: Vec<usize>, config: SessionConfig) -> SessionHandle {
        LiveSession::start(
            Box::new(source),
            processor(fail_on),
            SharedHistory::new(100).unwrap(),
            config,
        )
    }

    // --- Tests ---

    #[test]
    fn test_processes_until_source_exhausted() {
        let (src, closes) = source(Some(5));
        let handle = start(src, vec![], SessionConfig::default());
        let events = handle.events().clone();
        let history = handle.history.clone();
        let latest = handle.latest.clone();

        let summary = handle.join().unwrap();
        assert_eq!(summary.frames_processed, 5);
        assert_eq!(summary.faces_observed, 5);
        assert_eq!(summary.stop_reason, StopReason::Exhausted);
        assert_eq!(closes.load(Ordering::SeqCst), 1);

        assert_eq!(history.len(), 5);
        let stats = history.statistics();
        assert_relative_eq!(stats.get(&Label::Canonical(Emotion::Happy)).unwrap(), 1.0);

        let last = latest.get().unwrap();
        assert_eq!(last.frame_index, 4);
        assert_eq!(last.observations.len(), 1);

        let received: Vec<_> = events.try_iter().collect();
        assert!(matches!(received.first(), Some(SessionEvent::Started(_))));
        assert!(matches!(received.last(), Some(SessionEvent::Finished(_))));
        assert_eq!(received.len(), 7);
    }

    #[test]
    fn test_skip_policy_publishes_raw_frame_and_continues() {
        let (src, _) = source(Some(3));
        let handle = start(src, vec![1], SessionConfig::default());
        let events = handle.events().clone();
        let history = handle.history.clone();

        let summary = handle.join().unwrap();
        assert_eq!(summary.frames_processed, 2);
        assert_eq!(summary.frames_skipped, 1);
        assert_eq!(history.len(), 2);
        assert!(events
            .try_iter()
            .any(|e| matches!(e, SessionEvent::FrameSkipped { index: 1, .. })));
    }

    #[test]
    fn test_skipped_frame_becomes_latest_without_observations() {
        let (src, _) = source(Some(2));
        let handle = start(src, vec![1], SessionConfig::default());
        let latest = handle.latest.clone();
        handle.join().unwrap();
        let last = latest.get().unwrap();
        assert_eq!(last.frame_index, 1);
        assert!(last.observations.is_empty());
    }

    #[test]
    fn test_abort_policy_stops_with_detection_failure() {
        let (src, closes) = source(Some(10));
        let config = SessionConfig {
            on_detection_failure: DetectionFailurePolicy::Abort,
            ..SessionConfig::default()
        };
        let handle = start(src, vec![2], config);
        let history = handle.history.clone();

        match handle.join() {
            Err(SessionError::Detection(failure)) => assert_eq!(failure.frame_index, 2),
            other => panic!("expected detection failure, got {other:?}"),
        }
        assert_eq!(history.len(), 2);
        assert_eq!(closes.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_read_failure_ends_session_and_closes_source() {
        let (mut src, closes) = source(None);
        src.fail_read_at = Some(3);
        let handle = start(src, vec![], SessionConfig::default());
        let err = handle.join().unwrap_err();
        assert!(matches!(err, SessionError::Source(_)));
        assert!(err.to_string().contains("camera unplugged"));
        assert_eq!(closes.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_open_failure_reported_and_source_closed() {
        let (mut src, closes) = source(Some(1));
        src.fail_open = true;
        let handle = start(src, vec![], SessionConfig::default());
        assert!(matches!(handle.join(), Err(SessionError::Source(_))));
        assert_eq!(closes.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_stop_ends_endless_source() {
        let (src, closes) = source(None);
        let config = SessionConfig {
            pace: Some(Duration::from_millis(1)),
            ..SessionConfig::default()
        };
        let handle = start(src, vec![], config);

        // Wait until at least one frame went through.
        for event in handle.events().iter() {
            if matches!(event, SessionEvent::FrameProcessed { .. }) {
                break;
            }
        }
        assert!(handle.latest().is_some());
        assert!(handle.frames_processed() >= 1);
        handle.stop();

        let summary = handle.join().unwrap();
        assert_eq!(summary.stop_reason, StopReason::Requested);
        assert_eq!(closes.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_frame_limit() {
        let (src, _) = source(None);
        let config = SessionConfig {
            max_frames: Some(3),
            ..SessionConfig::default()
        };
        let summary = start(src, vec![], config).join().unwrap();
        assert_eq!(summary.frames_processed, 3);
        assert_eq!(summary.stop_reason, StopReason::FrameLimit);
    }

    #[test]
    fn test_history_stays_bounded() {
        let (src, _) = source(Some(20));
        let handle = LiveSession::start(
            Box::new(src),
            processor(vec![]),
            SharedHistory::new(8).unwrap(),
            SessionConfig::default(),
        );
        let history = handle.history.clone();
        handle.join().unwrap();
        assert_eq!(history.len(), 8);
        assert_eq!(history.snapshot().len(), 8);
    }

    #[test]
    fn test_event_queue_bounded_without_reader() {
        let (src, _) = source(Some(EVENT_QUEUE_CAPACITY * 4));
        let handle = start(src, vec![], SessionConfig::default());
        while !handle.is_finished() {
            std::thread::sleep(Duration::from_millis(1));
        }
        assert!(handle.events().len() <= EVENT_QUEUE_CAPACITY);
        assert_eq!(handle.frames_processed(), EVENT_QUEUE_CAPACITY * 4);

        let summary = handle.join().unwrap();
        assert_eq!(summary.frames_processed, EVENT_QUEUE_CAPACITY * 4);
    }

    #[test]
    fn test_dropping_handle_stops_session() {
        let (src, closes) = source(None);
        let config = SessionConfig {
            pace: Some(Duration::from_millis(1)),
            ..SessionConfig::default()
        };
        drop(start(src, vec![], config));
        assert_eq!(closes.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_config_from_settings() {
        let settings = Settings {
            pace_ms: 30,
            on_detection_failure: DetectionFailurePolicy::Abort,
            ..Settings::default()
        };
        let config = SessionConfig::from_settings(&settings);
        assert_eq!(config.pace, Some(Duration::from_millis(30)));
        assert_eq!(config.on_detection_failure, DetectionFailurePolicy::Abort);
        assert!(SessionConfig::from_settings(&Settings::default()).pace.is_none());
    }
}
