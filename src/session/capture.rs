/**
 * ============================================================================
 * SESSION CAPTURE MODULE
 * ============================================================================
 *
 * PURPOSE: Drive the video recorder, capture engine and telemetry image saver
 * as one start/stop unit
 *
 * FUNCTIONALITY:
 * - Create the session cache directory before any writer starts
 * - Start recorder -> engine telemetry saving -> image saver, unwinding
 *   partial starts on failure
 * - Stop every writer best-effort and collect the engine's clip lists
 * - Reset engine clip state immediately after each retrieval
 *
 * The engine's clip accumulation is process-global state. Only
 * CaptureHandle::stop() reads and resets it.
 *
 * ============================================================================
 */

use crate::session::storage;
use crate::session::types::{SessionArtifacts, SessionError, VideoClip, VideoClipPro};
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};

// =============================================================================
// External Collaborators
// =============================================================================

// Video encoder writing frames to a file
pub trait VideoRecorder: Send {
    fn start_recording(&mut self, output_path: &Path) -> Result<(), String>;
    fn stop_recording(&mut self) -> Result<(), String>;
}

// Native capture engine: telemetry saving, clip bookkeeping and its own clock
pub trait CaptureEngine: Send {
    fn start_telemetry_saving(&mut self, cache_dir: &Path) -> Result<(), String>;
    fn stop_telemetry_saving(&mut self) -> Result<(), String>;

    fn clips(&mut self) -> Vec<VideoClip>;
    fn reset_clips(&mut self);

    fn clips_pro(&mut self) -> Vec<VideoClipPro>;
    fn reset_clips_pro(&mut self);

    // Engine monotonic clock in seconds
    fn core_time_seconds(&self) -> f64;
}

// Serializer turning telemetry into images inside the cache directory
pub trait TelemetryImageSaver: Send {
    fn start(&mut self, cache_dir: &Path) -> Result<(), String>;
    fn stop(&mut self) -> Result<(), String>;
}

// =============================================================================
// Capture Results
// =============================================================================

// Values recorded when capture starts
#[derive(Debug, Clone)]
pub struct CaptureStart {
    pub cached_telemetry_dir: PathBuf,
    pub core_session_start_millis: i64,
    pub started_at: DateTime<Utc>,
}

// Everything collected when capture stops
#[derive(Debug, Clone)]
pub struct CapturedSession {
    pub artifacts: SessionArtifacts,
    pub video_path: PathBuf,
    pub cached_telemetry_dir: PathBuf,
    pub core_session_start_millis: i64,
    pub started_at: DateTime<Utc>,

    // Writers that failed to stop; the rest of the sequence still ran
    pub stop_errors: Vec<SessionError>,
}

#[derive(Debug)]
struct ActiveCapture {
    video_path: PathBuf,
    start: CaptureStart,
}

// =============================================================================
// Capture Handle
// =============================================================================

pub struct CaptureHandle {
    recorder: Box<dyn VideoRecorder>,
    engine: Box<dyn CaptureEngine>,
    image_saver: Box<dyn TelemetryImageSaver>,
    active: Option<ActiveCapture>,
}

impl CaptureHandle {
    pub fn new(
        recorder: Box<dyn VideoRecorder>,
        engine: Box<dyn CaptureEngine>,
        image_saver: Box<dyn TelemetryImageSaver>,
    ) -> Self {
        Self {
            recorder,
            engine,
            image_saver,
            active: None,
        }
    }

    pub fn is_started(&self) -> bool {
        self.active.is_some()
    }

    // Start routing video into `video_path` and telemetry into a fresh cache
    // directory under `cache_root`
    pub fn start(
        &mut self,
        video_path: &Path,
        cache_root: &Path,
    ) -> Result<CaptureStart, SessionError> {
        if self.active.is_some() {
            return Err(SessionError::AlreadyStarted);
        }

        // Writers need an existing target directory
        let (cache_dir, started_at) = storage::create_session_cache_dir(cache_root).map_err(
            |message| SessionError::StartFailure {
                stage: "session cache directory",
                message,
            },
        )?;

        if let Err(message) = self.recorder.start_recording(video_path) {
            discard_cache_dir(&cache_dir);
            return Err(SessionError::StartFailure {
                stage: "video recorder",
                message,
            });
        }

        if let Err(message) = self.engine.start_telemetry_saving(&cache_dir) {
            self.unwind_recorder();
            discard_cache_dir(&cache_dir);
            return Err(SessionError::StartFailure {
                stage: "telemetry saving",
                message,
            });
        }

        // Read the engine clock right after it starts saving, keeping skew
        // against the directory stamp small
        let core_session_start_millis = core_time_to_millis(self.engine.core_time_seconds());

        if let Err(message) = self.image_saver.start(&cache_dir) {
            if let Err(e) = self.engine.stop_telemetry_saving() {
                log::warn!("Failed to unwind telemetry saving: {}", e);
            }
            self.unwind_recorder();
            discard_cache_dir(&cache_dir);
            return Err(SessionError::StartFailure {
                stage: "telemetry image saver",
                message,
            });
        }

        let start = CaptureStart {
            cached_telemetry_dir: cache_dir,
            core_session_start_millis,
            started_at,
        };

        log::info!(
            "Capture started: video {:?}, telemetry {:?}, engine start {}ms",
            video_path,
            start.cached_telemetry_dir,
            core_session_start_millis
        );

        self.active = Some(ActiveCapture {
            video_path: video_path.to_path_buf(),
            start: start.clone(),
        });

        Ok(start)
    }

    // Stop all writers and collect the session's clips
    //
    // Returns None when capture was not started.
    pub fn stop(&mut self) -> Option<CapturedSession> {
        let active = self.active.take()?;
        let mut stop_errors = Vec::new();

        if let Err(message) = self.recorder.stop_recording() {
            log::error!("Failed to stop video recorder: {}", message);
            stop_errors.push(SessionError::StopFailure {
                stage: "video recorder",
                message,
            });
        }

        if let Err(message) = self.engine.stop_telemetry_saving() {
            log::error!("Failed to stop telemetry saving: {}", message);
            stop_errors.push(SessionError::StopFailure {
                stage: "telemetry saving",
                message,
            });
        }

        if let Err(message) = self.image_saver.stop() {
            log::error!("Failed to stop telemetry image saver: {}", message);
            stop_errors.push(SessionError::StopFailure {
                stage: "telemetry image saver",
                message,
            });
        }

        // Each reset directly follows its retrieval
        let clips = self.engine.clips();
        self.engine.reset_clips();

        let clips_pro = self.engine.clips_pro();
        self.engine.reset_clips_pro();

        let artifacts = SessionArtifacts::new(clips, clips_pro);

        log::info!(
            "Capture stopped: video {:?}, {} clip(s), {} stop error(s)",
            active.video_path,
            artifacts.clip_count(),
            stop_errors.len()
        );

        Some(CapturedSession {
            artifacts,
            video_path: active.video_path,
            cached_telemetry_dir: active.start.cached_telemetry_dir,
            core_session_start_millis: active.start.core_session_start_millis,
            started_at: active.start.started_at,
            stop_errors,
        })
    }

    fn unwind_recorder(&mut self) {
        if let Err(e) = self.recorder.stop_recording() {
            log::warn!("Failed to unwind video recorder: {}", e);
        }
    }
}

impl Drop for CaptureHandle {
    fn drop(&mut self) {
        if self.active.is_some() {
            log::warn!("Capture handle dropped while started, stopping writers");
            let _ = self.stop();
        }
    }
}

// Remove the cache directory of a session that never started
fn discard_cache_dir(cache_dir: &Path) {
    if let Err(e) = std::fs::remove_dir(cache_dir) {
        log::warn!("Failed to remove unused session cache {:?}: {}", cache_dir, e);
    }
}

// Engine time is truncated to whole seconds before conversion, as the engine
// reports session offsets at second granularity
fn core_time_to_millis(seconds: f64) -> i64 {
    (seconds.trunc() as i64) * 1000
}
