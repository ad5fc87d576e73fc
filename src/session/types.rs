/**
 * ============================================================================
 * SESSION TYPES MODULE
 * ============================================================================
 *
 * PURPOSE: Data structures for rotating capture sessions
 *
 * TYPES:
 * - VideoClip / VideoClipPro: Clip records reported by the capture engine
 * - SessionArtifacts: Clip lists collected when a session ends
 * - ActiveSession: The session currently being written
 * - CompletedSession: Event handed to the session listener
 * - SessionStatus: Snapshot of the writer for callers
 * - SessionError: Failures surfaced by the writer
 *
 * ============================================================================
 */

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use uuid::Uuid;

// Standard clip record reported by the capture engine (engine clock, seconds)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoClip {
    pub start_seconds: f64,
    pub end_seconds: f64,
}

// Extended ("pro") clip record reported by the capture engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoClipPro {
    pub start_seconds: f64,
    pub end_seconds: f64,

    // Number of detections the engine attached to this clip
    #[serde(default)]
    pub detections: u32,
}

// Clip lists collected for one session
//
// Empty lists are stored as None so consumers can tell "no data of this kind"
// apart from an empty list.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionArtifacts {
    pub standard: Option<Vec<VideoClip>>,
    pub pro: Option<Vec<VideoClipPro>>,
}

impl SessionArtifacts {
    pub fn new(standard: Vec<VideoClip>, pro: Vec<VideoClipPro>) -> Self {
        Self {
            standard: non_empty(standard),
            pro: non_empty(pro),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.standard.is_none() && self.pro.is_none()
    }

    pub fn clip_count(&self) -> usize {
        self.standard.as_ref().map_or(0, Vec::len) + self.pro.as_ref().map_or(0, Vec::len)
    }
}

fn non_empty<T>(items: Vec<T>) -> Option<Vec<T>> {
    if items.is_empty() { None } else { Some(items) }
}

// Session currently being written
#[derive(Debug, Clone)]
pub struct ActiveSession {
    pub id: Uuid,

    // Buffer slot the recorder writes video into
    pub video_path: PathBuf,

    // Telemetry cache directory (ends with a path separator)
    pub cached_telemetry_dir: PathBuf,

    // Engine clock at start, milliseconds. Not wall clock.
    pub core_session_start_millis: i64,

    // Wall clock at which the cache directory was named
    pub started_at: DateTime<Utc>,
}

// Event emitted exactly once per finished session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletedSession {
    pub id: Uuid,
    pub artifacts: SessionArtifacts,
    pub video_path: PathBuf,
    pub cached_telemetry_dir: PathBuf,
    pub core_session_start_millis: i64,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
}

impl CompletedSession {
    pub fn duration_seconds(&self) -> f64 {
        (self.ended_at - self.started_at).num_milliseconds() as f64 / 1000.0
    }
}

// Writer status for callers
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionStatus {
    pub is_recording: bool,
    pub current_session_id: Option<Uuid>,
    pub current_video_path: Option<PathBuf>,
    pub current_session_start: Option<String>,
    pub current_session_duration_seconds: Option<f64>,
    pub buffer_index: usize,
    pub buffer_count: usize,
    pub completed_sessions: u64,
    pub rotation_failures: u64,
}

// Errors surfaced by the session writer
#[derive(Debug, Clone, PartialEq)]
pub enum SessionError {
    /// A recorder, engine or serializer could not begin; partial starts were unwound
    StartFailure {
        stage: &'static str,
        message: String,
    },

    /// A writer failed to stop cleanly; the stop sequence still completed
    StopFailure {
        stage: &'static str,
        message: String,
    },

    /// Capture start was requested while capture was already running
    AlreadyStarted,

    /// The worker has exited and no longer accepts commands
    WriterClosed,
}

impl std::fmt::Display for SessionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionError::StartFailure { stage, message } => {
                write!(f, "Failed to start {}: {}", stage, message)
            }
            SessionError::StopFailure { stage, message } => {
                write!(f, "Failed to stop {}: {}", stage, message)
            }
            SessionError::AlreadyStarted => write!(f, "Capture already started"),
            SessionError::WriterClosed => write!(f, "Session writer has shut down"),
        }
    }
}

impl std::error::Error for SessionError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_lists_become_none() {
        let artifacts = SessionArtifacts::new(Vec::new(), Vec::new());
        assert_eq!(artifacts.standard, None);
        assert_eq!(artifacts.pro, None);
        assert!(artifacts.is_empty());
        assert_eq!(artifacts.clip_count(), 0);
    }

    #[test]
    fn test_lists_kept_independently() {
        let artifacts = SessionArtifacts::new(
            vec![VideoClip { start_seconds: 1.0, end_seconds: 3.5 }],
            Vec::new(),
        );
        assert_eq!(artifacts.standard.as_ref().map(Vec::len), Some(1));
        assert_eq!(artifacts.pro, None);
        assert!(!artifacts.is_empty());
        assert_eq!(artifacts.clip_count(), 1);
    }

    #[test]
    fn test_absent_lists_serialize_as_null() {
        let artifacts = SessionArtifacts::new(Vec::new(), Vec::new());
        let json = serde_json::to_string(&artifacts).unwrap();
        assert_eq!(json, r#"{"standard":null,"pro":null}"#);
    }

    #[test]
    fn test_error_display() {
        let e = SessionError::StartFailure {
            stage: "video recorder",
            message: "device busy".to_string(),
        };
        assert_eq!(e.to_string(), "Failed to start video recorder: device busy");
        assert_eq!(SessionError::WriterClosed.to_string(), "Session writer has shut down");
    }
}
