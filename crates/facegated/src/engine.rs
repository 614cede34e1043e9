use facegate_core::access_log::{AccessLog, AccessLogEntry, AccessStatus};
use facegate_core::config::Config;
use facegate_core::cooldown::{Clock, Cooldown, SystemClock};
use facegate_core::gallery::{read_gallery, SharedGallery};
use facegate_core::matcher::{matcher_for, Matcher, Tolerance};
use facegate_core::{FaceRegion, MatchResult, Pipeline};
use facegate_hw::{CameraError, FrameSource};
use image::GrayImage;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("camera unavailable: {0}")]
    CameraUnavailable(#[source] CameraError),
    #[error("failed to spawn recognition thread: {0}")]
    Spawn(#[source] std::io::Error),
    #[error("recognition worker was lost; restart the daemon")]
    WorkerLost,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Stopped,
    Running,
}

/// Why a running session ended.
#[derive(Debug, Clone, PartialEq)]
pub enum StopReason {
    Requested,
    SourceFailed(String),
    /// Recognition panicked on a frame. The session can be started again.
    Panicked(String),
}

/// One face in a processed frame and what was decided about it.
#[derive(Debug, Clone)]
pub struct FaceDecision {
    pub region: FaceRegion,
    pub result: MatchResult,
    /// False when the cooldown suppressed the log/UI event for this face.
    pub emitted: bool,
}

/// The most recently processed frame, for display.
#[derive(Debug, Clone)]
pub struct ProcessedFrame {
    pub sequence: u32,
    pub image: GrayImage,
    pub faces: Vec<FaceDecision>,
}

/// Messages sent from the recognition thread to the foreground.
#[derive(Debug, Clone)]
pub enum SessionEvent {
    Frame {
        sequence: u32,
        faces: Vec<FaceDecision>,
    },
    Access(AccessLogEntry),
    Stopped(StopReason),
}

#[derive(Debug, Clone, Copy)]
pub struct SessionSettings {
    /// Process every Nth frame read from the source.
    pub frame_skip: u32,
    pub cooldown: Duration,
}

impl SessionSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            frame_skip: config.frame_skip,
            cooldown: config.cooldown,
        }
    }
}

/// State shared by the foreground and the recognition thread.
struct Shared {
    gallery: SharedGallery,
    tolerance: Arc<Tolerance>,
    log: AccessLog,
    latest: Mutex<Option<ProcessedFrame>>,
    events: mpsc::UnboundedSender<SessionEvent>,
}

/// Everything the recognition thread owns while running. Handed back on exit.
struct Parts {
    pipeline: Pipeline,
    matcher: Box<dyn Matcher>,
    source: Box<dyn FrameSource>,
    cooldown: Cooldown,
}

struct Worker {
    stop: Arc<AtomicBool>,
    handle: JoinHandle<Parts>,
}

/// A camera recognition session: `Stopped -> Running -> Stopped`.
pub struct Session {
    shared: Arc<Shared>,
    settings: SessionSettings,
    idle: Option<Parts>,
    worker: Option<Worker>,
}

impl Session {
    pub fn new(
        pipeline: Pipeline,
        source: Box<dyn FrameSource>,
        gallery: SharedGallery,
        log: AccessLog,
        tolerance: Arc<Tolerance>,
        settings: SessionSettings,
        events: mpsc::UnboundedSender<SessionEvent>,
    ) -> Self {
        Self::with_clock(
            pipeline,
            source,
            gallery,
            log,
            tolerance,
            settings,
            events,
            Arc::new(SystemClock),
        )
    }

    #[allow(clippy::too_many_arguments)]
    pub fn with_clock(
        pipeline: Pipeline,
        source: Box<dyn FrameSource>,
        gallery: SharedGallery,
        log: AccessLog,
        tolerance: Arc<Tolerance>,
        settings: SessionSettings,
        events: mpsc::UnboundedSender<SessionEvent>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let matcher = matcher_for(pipeline.kind());
        Self {
            shared: Arc::new(Shared {
                gallery,
                tolerance,
                log,
                latest: Mutex::new(None),
                events,
            }),
            settings,
            idle: Some(Parts {
                pipeline,
                matcher,
                source,
                cooldown: Cooldown::with_clock(settings.cooldown, clock),
            }),
            worker: None,
        }
    }

    pub fn state(&self) -> SessionState {
        match &self.worker {
            Some(w) if !w.handle.is_finished() => SessionState::Running,
            _ => SessionState::Stopped,
        }
    }

    /// Open the source and start recognizing. A no-op while running.
    pub fn start(&mut self) -> Result<(), SessionError> {
        if self.state() == SessionState::Running {
            tracing::debug!("session already running");
            return Ok(());
        }
        self.reap();

        let mut parts = self.idle.take().ok_or(SessionError::WorkerLost)?;
        if let Err(e) = parts.source.open() {
            tracing::warn!(source = %parts.source.describe(), error = %e, "cannot open frame source");
            self.idle = Some(parts);
            return Err(SessionError::CameraUnavailable(e));
        }
        tracing::info!(source = %parts.source.describe(), "session started");

        let stop = Arc::new(AtomicBool::new(false));
        let worker_stop = stop.clone();
        let shared = self.shared.clone();
        let settings = self.settings;

        let handle = std::thread::Builder::new()
            .name("facegate-engine".into())
            .spawn(move || run(parts, &shared, settings, &worker_stop))
            .map_err(SessionError::Spawn)?;

        self.worker = Some(Worker { stop, handle });
        Ok(())
    }

    /// Stop recognizing and release the source. Safe from any state.
    ///
    /// Blocks until the worker finishes its current frame.
    pub fn stop(&mut self) {
        if let Some(worker) = &self.worker {
            worker.stop.store(true, Ordering::Release);
        }
        self.reap();
        if let Some(parts) = self.idle.as_mut() {
            parts.source.release();
        }
    }

    /// The latest processed frame, if any.
    pub fn latest_frame(&self) -> Option<ProcessedFrame> {
        self.shared
            .latest
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .clone()
    }

    pub fn tolerance(&self) -> &Tolerance {
        &self.shared.tolerance
    }

    /// Join a worker that was told to stop or ended on its own.
    fn reap(&mut self) {
        let Some(worker) = self.worker.take() else {
            return;
        };
        match worker.handle.join() {
            Ok(parts) => self.idle = Some(parts),
            Err(_) => tracing::error!("recognition worker panicked; session cannot restart"),
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Recognition loop. Checks the stop flag once per frame; any read error ends it.
fn run(mut parts: Parts, shared: &Shared, settings: SessionSettings, stop: &AtomicBool) -> Parts {
    tracing::info!("engine thread started");
    let skip = u64::from(settings.frame_skip.max(1));
    let mut read = 0u64;

    let reason = loop {
        if stop.load(Ordering::Acquire) {
            break StopReason::Requested;
        }

        let frame = match parts.source.read() {
            Ok(frame) => frame,
            Err(e) => {
                tracing::warn!(error = %e, "frame read failed; stopping session");
                break StopReason::SourceFailed(e.to_string());
            }
        };
        read += 1;
        if (read - 1) % skip != 0 {
            continue;
        }

        let sequence = frame.sequence;
        let Some(image) = frame.into_image() else {
            tracing::warn!(sequence, "malformed frame; skipping");
            continue;
        };

        let faces = match panic::catch_unwind(AssertUnwindSafe(|| recognize(&mut parts, shared, &image))) {
            Ok(faces) => faces,
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                tracing::error!(sequence, panic = %message, "recognition panicked; stopping session");
                break StopReason::Panicked(message);
            }
        };
        let _ = shared.events.send(SessionEvent::Frame {
            sequence,
            faces: faces.clone(),
        });
        *shared.latest.lock().unwrap_or_else(|p| p.into_inner()) = Some(ProcessedFrame {
            sequence,
            image,
            faces,
        });
    };

    parts.source.release();
    tracing::info!(reason = ?reason, "engine thread exiting");
    let _ = shared.events.send(SessionEvent::Stopped(reason));
    parts
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Locate, describe and match every face in `image`, then log the decisions
/// the cooldown lets through.
fn recognize(parts: &mut Parts, shared: &Shared, image: &GrayImage) -> Vec<FaceDecision> {
    let regions = parts.pipeline.locate(image);
    let mut decisions = Vec::with_capacity(regions.len());

    for region in regions {
        let descriptor = match parts.pipeline.describe(image, &region) {
            Ok(d) => d,
            Err(e) => {
                tracing::debug!(error = %e, x1 = region.x1, y1 = region.y1, "skipping face");
                continue;
            }
        };

        let threshold = shared.tolerance.get();
        let result = {
            let gallery = read_gallery(&shared.gallery);
            parts.matcher.compare(&descriptor, gallery.identities(), threshold)
        };

        let emitted = parts.cooldown.admit(&result.name);
        if emitted {
            let status = AccessStatus::from_granted(result.access_granted);
            let confidence = result.access_granted.then_some(result.confidence);
            let entry = AccessLogEntry::now(result.name.clone(), status, confidence);
            if let Err(e) = shared.log.append_entry(entry.clone()) {
                tracing::warn!(error = %e, "failed to write access log");
            }
            tracing::info!(name = %entry.name, status = %entry.status, confidence = result.confidence, "access decision");
            let _ = shared.events.send(SessionEvent::Access(entry));
        }

        decisions.push(FaceDecision {
            region,
            result,
            emitted,
        });
    }
    decisions
}

#[cfg(test)]
mod tests {
    use super::*;
    use facegate_core::cooldown::ManualClock;
    use facegate_core::detector::{DetectorError, FaceDetector};
    use facegate_core::extractor::{DescriptorExtractor, ExtractError, HistogramExtractor};
    use facegate_core::gallery::{write_gallery, GalleryStore};
    use facegate_core::locator::FaceLocator;
    use facegate_core::{Descriptor, ExtractorKind, UNKNOWN_NAME};
    use facegate_hw::Frame;
    use image::Luma;

    const FACE: FaceRegion = FaceRegion {
        x1: 100,
        y1: 50,
        x2: 200,
        y2: 160,
        confidence: 0.9,
    };

    struct FixedDetector(Vec<FaceRegion>);

    impl FaceDetector for FixedDetector {
        fn detect(&mut self, _frame: &GrayImage) -> Result<Vec<FaceRegion>, DetectorError> {
            Ok(self.0.clone())
        }
    }

    /// Fails on crops wider than 100 px, otherwise defers to the histogram extractor.
    struct NarrowOnlyExtractor;

    impl DescriptorExtractor for NarrowOnlyExtractor {
        fn kind(&self) -> ExtractorKind {
            ExtractorKind::Histogram
        }

        fn extract(&mut self, crop: &GrayImage) -> Result<Descriptor, ExtractError> {
            if crop.width() > 100 {
                return Err(ExtractError::InferenceFailed("too wide".into()));
            }
            HistogramExtractor.extract(crop)
        }
    }

    /// Raises the tolerance beyond reach while describing the second face.
    struct TighteningExtractor {
        tolerance: Arc<Tolerance>,
        calls: u32,
    }

    impl DescriptorExtractor for TighteningExtractor {
        fn kind(&self) -> ExtractorKind {
            ExtractorKind::Histogram
        }

        fn extract(&mut self, crop: &GrayImage) -> Result<Descriptor, ExtractError> {
            self.calls += 1;
            if self.calls == 2 {
                self.tolerance.set(1.5);
            }
            HistogramExtractor.extract(crop)
        }
    }

    struct PanickingExtractor;

    impl DescriptorExtractor for PanickingExtractor {
        fn kind(&self) -> ExtractorKind {
            ExtractorKind::Histogram
        }

        fn extract(&mut self, _crop: &GrayImage) -> Result<Descriptor, ExtractError> {
            panic!("extractor blew up");
        }
    }

    /// Replays `limit` copies of one image (or forever), moving the clock
    /// forward by `step` before each frame.
    struct ScriptedSource {
        image: GrayImage,
        limit: Option<u32>,
        read: u32,
        step: Duration,
        clock: Arc<ManualClock>,
        open: bool,
        fail_open: bool,
    }

    impl ScriptedSource {
        fn new(limit: Option<u32>, step: Duration, clock: Arc<ManualClock>) -> Self {
            Self {
                image: scene(),
                limit,
                read: 0,
                step,
                clock,
                open: false,
                fail_open: false,
            }
        }
    }

    impl FrameSource for ScriptedSource {
        fn open(&mut self) -> Result<(), CameraError> {
            if self.fail_open {
                return Err(CameraError::DeviceNotFound("/dev/video9".into()));
            }
            self.open = true;
            self.read = 0;
            Ok(())
        }

        fn read(&mut self) -> Result<Frame, CameraError> {
            if !self.open {
                return Err(CameraError::NotOpen);
            }
            if self.limit.is_some_and(|l| self.read >= l) {
                return Err(CameraError::Exhausted);
            }
            if self.limit.is_none() {
                std::thread::sleep(Duration::from_millis(1));
            }
            self.clock.advance(self.step);
            self.read += 1;
            Ok(Frame::from_image(self.image.clone(), self.read))
        }

        fn release(&mut self) {
            self.open = false;
        }

        fn is_open(&self) -> bool {
            self.open
        }

        fn describe(&self) -> String {
            "scripted".into()
        }
    }

    fn scene() -> GrayImage {
        GrayImage::from_fn(320, 240, |x, y| Luma([((x * 7 + y * 3) % 256) as u8]))
    }

    struct Harness {
        session: Session,
        events: mpsc::UnboundedReceiver<SessionEvent>,
        log: AccessLog,
        gallery: SharedGallery,
        _dir: tempfile::TempDir,
    }

    fn harness(
        regions: Vec<FaceRegion>,
        extractor: Box<dyn DescriptorExtractor>,
        source: ScriptedSource,
        clock: Arc<ManualClock>,
        frame_skip: u32,
    ) -> Harness {
        let tolerance = Arc::new(Tolerance::new(ExtractorKind::Histogram.default_threshold()));
        harness_with_tolerance(regions, extractor, source, clock, frame_skip, tolerance)
    }

    fn harness_with_tolerance(
        regions: Vec<FaceRegion>,
        extractor: Box<dyn DescriptorExtractor>,
        source: ScriptedSource,
        clock: Arc<ManualClock>,
        frame_skip: u32,
        tolerance: Arc<Tolerance>,
    ) -> Harness {
        let dir = tempfile::tempdir().unwrap();
        let gallery = GalleryStore::open(dir.path().join("gallery.json"), ExtractorKind::Histogram).shared();
        let log = AccessLog::new(dir.path().join("access_log.json"));
        let (tx, rx) = mpsc::unbounded_channel();
        let pipeline = Pipeline::new(FaceLocator::new(Box::new(FixedDetector(regions))), extractor);
        let session = Session::with_clock(
            pipeline,
            Box::new(source),
            gallery.clone(),
            log.clone(),
            tolerance,
            SessionSettings {
                frame_skip,
                cooldown: Duration::from_secs(3),
            },
            tx,
            clock,
        );
        Harness {
            session,
            events: rx,
            log,
            gallery,
            _dir: dir,
        }
    }

    fn enroll_scene_face(gallery: &SharedGallery, name: &str) {
        let crop = facegate_core::locator::crop(&scene(), &FACE);
        let descriptor = HistogramExtractor.extract(&crop).unwrap();
        write_gallery(gallery).add(name, descriptor).unwrap();
    }

    /// Receive events until the session reports it stopped.
    fn drain(events: &mut mpsc::UnboundedReceiver<SessionEvent>) -> Vec<SessionEvent> {
        let mut seen = Vec::new();
        while let Some(event) = events.blocking_recv() {
            let done = matches!(event, SessionEvent::Stopped(_));
            seen.push(event);
            if done {
                break;
            }
        }
        seen
    }

    fn frame_count(events: &[SessionEvent]) -> usize {
        events
            .iter()
            .filter(|e| matches!(e, SessionEvent::Frame { .. }))
            .count()
    }

    #[test]
    fn test_open_failure_leaves_session_stopped() {
        let clock = Arc::new(ManualClock::new());
        let mut source = ScriptedSource::new(Some(1), Duration::ZERO, clock.clone());
        source.fail_open = true;
        let mut h = harness(vec![FACE], Box::new(HistogramExtractor), source, clock, 1);

        assert!(matches!(h.session.start(), Err(SessionError::CameraUnavailable(_))));
        assert_eq!(h.session.state(), SessionState::Stopped);
        h.session.stop();
        assert_eq!(h.session.state(), SessionState::Stopped);
    }

    #[test]
    fn test_detections_one_second_apart_log_once() {
        let clock = Arc::new(ManualClock::new());
        let source = ScriptedSource::new(Some(2), Duration::from_secs(1), clock.clone());
        let mut h = harness(vec![FACE], Box::new(HistogramExtractor), source, clock, 1);
        enroll_scene_face(&h.gallery, "Alice");

        h.session.start().unwrap();
        let events = drain(&mut h.events);

        assert_eq!(frame_count(&events), 2);
        let entries = h.log.list();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].name, "Alice");
        assert_eq!(entries[0].status, AccessStatus::Granted);
        assert!(entries[0].confidence.is_some_and(|c| (c - 1.0).abs() < 1e-4));

        let suppressed = events.iter().find_map(|e| match e {
            SessionEvent::Frame { sequence: 2, faces } => Some(faces.clone()),
            _ => None,
        });
        let suppressed = suppressed.unwrap();
        assert_eq!(suppressed.len(), 1);
        assert!(!suppressed[0].emitted);
        assert_eq!(suppressed[0].result.name, "Alice");
    }

    #[test]
    fn test_detections_four_seconds_apart_log_twice() {
        let clock = Arc::new(ManualClock::new());
        let source = ScriptedSource::new(Some(2), Duration::from_secs(4), clock.clone());
        let mut h = harness(vec![FACE], Box::new(HistogramExtractor), source, clock, 1);
        enroll_scene_face(&h.gallery, "Alice");

        h.session.start().unwrap();
        let events = drain(&mut h.events);

        let accesses = events
            .iter()
            .filter(|e| matches!(e, SessionEvent::Access(_)))
            .count();
        assert_eq!(accesses, 2);
        assert_eq!(h.log.list().len(), 2);
    }

    #[test]
    fn test_empty_gallery_logs_unknown_denied() {
        let clock = Arc::new(ManualClock::new());
        let source = ScriptedSource::new(Some(1), Duration::from_secs(1), clock.clone());
        let mut h = harness(vec![FACE], Box::new(HistogramExtractor), source, clock, 1);

        h.session.start().unwrap();
        drain(&mut h.events);

        let entries = h.log.list();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].name, UNKNOWN_NAME);
        assert_eq!(entries[0].status, AccessStatus::Denied);
        assert_eq!(entries[0].confidence, None);
    }

    #[test]
    fn test_frame_skip_processes_every_nth_frame() {
        let clock = Arc::new(ManualClock::new());
        let source = ScriptedSource::new(Some(6), Duration::from_secs(1), clock.clone());
        let mut h = harness(vec![FACE], Box::new(HistogramExtractor), source, clock, 2);

        h.session.start().unwrap();
        let events = drain(&mut h.events);

        let sequences: Vec<u32> = events
            .iter()
            .filter_map(|e| match e {
                SessionEvent::Frame { sequence, .. } => Some(*sequence),
                _ => None,
            })
            .collect();
        assert_eq!(sequences, vec![1, 3, 5]);
    }

    #[test]
    fn test_read_failure_ends_session() {
        let clock = Arc::new(ManualClock::new());
        let source = ScriptedSource::new(Some(1), Duration::from_secs(1), clock.clone());
        let mut h = harness(vec![FACE], Box::new(HistogramExtractor), source, clock, 1);

        h.session.start().unwrap();
        let events = drain(&mut h.events);
        assert!(matches!(
            events.last(),
            Some(SessionEvent::Stopped(StopReason::SourceFailed(_)))
        ));
        h.session.stop();
        assert_eq!(h.session.state(), SessionState::Stopped);
    }

    #[test]
    fn test_extraction_failure_skips_only_that_face() {
        let clock = Arc::new(ManualClock::new());
        let source = ScriptedSource::new(Some(1), Duration::from_secs(1), clock.clone());
        let wide = FaceRegion::new(10, 10, 130, 130, 0.9);
        let mut h = harness(vec![wide, FACE], Box::new(NarrowOnlyExtractor), source, clock, 1);

        h.session.start().unwrap();
        let events = drain(&mut h.events);

        let faces = events
            .iter()
            .find_map(|e| match e {
                SessionEvent::Frame { faces, .. } => Some(faces.clone()),
                _ => None,
            })
            .unwrap();
        assert_eq!(faces.len(), 1);
        assert_eq!(faces[0].region, FACE);
    }

    #[test]
    fn test_stop_is_idempotent_and_session_restarts() {
        let clock = Arc::new(ManualClock::new());
        let source = ScriptedSource::new(None, Duration::from_millis(10), clock.clone());
        let mut h = harness(vec![FACE], Box::new(HistogramExtractor), source, clock, 1);

        h.session.stop();
        h.session.start().unwrap();
        assert_eq!(h.session.state(), SessionState::Running);
        h.session.start().unwrap();
        while !matches!(h.events.blocking_recv(), Some(SessionEvent::Frame { .. })) {}

        h.session.stop();
        assert_eq!(h.session.state(), SessionState::Stopped);
        assert!(h.session.latest_frame().is_some());
        let events = drain(&mut h.events);
        assert!(matches!(events.last(), Some(SessionEvent::Stopped(StopReason::Requested))));
        h.session.stop();

        h.session.start().unwrap();
        assert_eq!(h.session.state(), SessionState::Running);
        h.session.stop();
        assert_eq!(h.session.state(), SessionState::Stopped);
    }

    #[test]
    fn test_tolerance_change_applies_to_next_frame() {
        let clock = Arc::new(ManualClock::new());
        let source = ScriptedSource::new(Some(1), Duration::from_secs(1), clock.clone());
        let mut h = harness(vec![FACE], Box::new(HistogramExtractor), source, clock, 1);
        enroll_scene_face(&h.gallery, "Alice");

        // Nothing can score above 1.0, so this denies even an exact match.
        h.session.tolerance().set(1.5);
        h.session.start().unwrap();
        drain(&mut h.events);

        let entries = h.log.list();
        assert_eq!(entries[0].name, UNKNOWN_NAME);
        assert_eq!(entries[0].status, AccessStatus::Denied);
    }

    #[test]
    fn test_tolerance_change_applies_to_next_comparison() {
        let clock = Arc::new(ManualClock::new());
        let source = ScriptedSource::new(Some(1), Duration::from_secs(1), clock.clone());
        let tolerance = Arc::new(Tolerance::new(ExtractorKind::Histogram.default_threshold()));
        let extractor = TighteningExtractor {
            tolerance: tolerance.clone(),
            calls: 0,
        };
        let mut h = harness_with_tolerance(vec![FACE, FACE], Box::new(extractor), source, clock, 1, tolerance);
        enroll_scene_face(&h.gallery, "Alice");

        h.session.start().unwrap();
        let events = drain(&mut h.events);

        let faces = events
            .iter()
            .find_map(|e| match e {
                SessionEvent::Frame { faces, .. } => Some(faces.clone()),
                _ => None,
            })
            .unwrap();
        assert_eq!(faces.len(), 2);
        assert!(faces[0].result.access_granted);
        assert!(!faces[1].result.access_granted);
    }

    #[test]
    fn test_recognition_panic_stops_session_and_allows_restart() {
        let clock = Arc::new(ManualClock::new());
        let source = ScriptedSource::new(Some(3), Duration::from_secs(1), clock.clone());
        let mut h = harness(vec![FACE], Box::new(PanickingExtractor), source, clock, 1);

        h.session.start().unwrap();
        let events = drain(&mut h.events);
        assert!(matches!(
            events.last(),
            Some(SessionEvent::Stopped(StopReason::Panicked(m))) if m.contains("blew up")
        ));

        h.session.start().unwrap();
        let events = drain(&mut h.events);
        assert!(matches!(events.last(), Some(SessionEvent::Stopped(StopReason::Panicked(_)))));
        h.session.stop();
        assert_eq!(h.session.state(), SessionState::Stopped);
    }
}
