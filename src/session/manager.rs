/**
 * ============================================================================
 * SESSION MANAGER MODULE
 * ============================================================================
 *
 * PURPOSE: Rotating session lifecycle for continuous capture
 *
 * RESPONSIBILITIES:
 * - Start/stop capture into the current video buffer
 * - Rotate sessions on a fixed interval (5 minutes default)
 * - Hand each finished session to the listener exactly once
 * - Advance the buffer pool only after a session has been handed off
 *
 * SESSION FLOW:
 * 1. start() -> capture into pool.current(), arm the rotation timer
 * 2. Timer fires -> stop capture, emit session, advance pool, start next
 * 3. stop() -> cancel timer, stop capture, emit session, advance pool
 *
 * THREADING:
 * All state lives on one worker task. SessionManager handles only send
 * commands to it, so start/stop/rotate never run concurrently.
 *
 * ============================================================================
 */

use crate::session::buffers::BufferPool;
use crate::session::capture::CaptureHandle;
use crate::session::config::SessionConfig;
use crate::session::listener::SessionListener;
use crate::session::scheduler::Scheduler;
use crate::session::storage;
use crate::session::types::{ActiveSession, CompletedSession, SessionError, SessionStatus};
use chrono::Utc;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use uuid::Uuid;

// Delay before retrying a session start that failed during rotation
pub const RESUME_BACKOFF: Duration = Duration::from_secs(5);

const COMMAND_CHANNEL_CAPACITY: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SessionAction {
    Rotate,
    Resume,
}

// Controller state; capture is armed iff Recording
#[derive(Debug)]
enum RotationState {
    Idle,
    Recording(ActiveSession),
}

enum Command {
    Start(oneshot::Sender<Result<(), SessionError>>),
    Stop(oneshot::Sender<Result<(), SessionError>>),
    Status(oneshot::Sender<SessionStatus>),
    Shutdown(oneshot::Sender<()>),
}

// =============================================================================
// Rotation Controller
// =============================================================================

pub struct RotationController {
    state: RotationState,
    buffers: BufferPool,
    capture: CaptureHandle,
    scheduler: Scheduler<SessionAction>,
    listener: Box<dyn SessionListener>,
    cache_root: PathBuf,
    session_length: Duration,
    cache_retention_days: Option<u32>,
    completed_sessions: u64,
    rotation_failures: u64,
}

impl RotationController {
    pub fn new(
        buffers: BufferPool,
        capture: CaptureHandle,
        listener: impl SessionListener + 'static,
        cache_root: impl Into<PathBuf>,
        session_length: Duration,
    ) -> Self {
        Self {
            state: RotationState::Idle,
            buffers,
            capture,
            scheduler: Scheduler::new(),
            listener: Box::new(listener),
            cache_root: cache_root.into(),
            session_length,
            cache_retention_days: None,
            completed_sessions: 0,
            rotation_failures: 0,
        }
    }

    // Build a controller from validated configuration
    pub fn from_config(
        config: &SessionConfig,
        capture: CaptureHandle,
        listener: impl SessionListener + 'static,
    ) -> Result<Self, String> {
        config.validate()?;

        let controller = Self::new(
            config.buffer_pool()?,
            capture,
            listener,
            config.cache_root.clone(),
            config.session_length(),
        );

        Ok(controller.with_cache_retention(config.cache_retention_days))
    }

    pub fn with_cache_retention(mut self, days: Option<u32>) -> Self {
        self.cache_retention_days = days;
        self
    }

    pub fn is_recording(&self) -> bool {
        matches!(self.state, RotationState::Recording(_))
    }

    // Idle -> Recording. No-op while recording.
    pub fn start(&mut self) -> Result<(), SessionError> {
        if self.is_recording() {
            log::debug!("Start requested while recording, ignoring");
            return Ok(());
        }

        log::info!("Starting rotating session capture");

        // Drops any pending resume from a failed rotation
        self.scheduler.stop();
        self.scheduler.start();

        if let Err(e) = self.start_session() {
            self.scheduler.stop();
            log::error!("Failed to start session capture: {}", e);
            return Err(e);
        }

        Ok(())
    }

    // Recording -> Idle. No-op while idle.
    //
    // The whole stop sequence runs even when a writer fails to stop; the
    // first such failure is returned afterwards.
    pub fn stop(&mut self) -> Result<(), SessionError> {
        // Quiesce first so no rotation can follow this stop
        self.scheduler.stop();

        if !self.is_recording() {
            log::debug!("Stop requested while idle, ignoring");
            return Ok(());
        }

        log::info!("Stopping rotating session capture");

        match self.stop_session().into_iter().next() {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    pub fn status(&self) -> SessionStatus {
        let (current_session_id, current_video_path, current_session_start, duration) =
            match &self.state {
                RotationState::Idle => (None, None, None, None),
                RotationState::Recording(active) => {
                    let duration =
                        (Utc::now() - active.started_at).num_milliseconds() as f64 / 1000.0;
                    (
                        Some(active.id),
                        Some(active.video_path.clone()),
                        Some(active.started_at.to_rfc3339()),
                        Some(duration),
                    )
                }
            };

        SessionStatus {
            is_recording: self.is_recording(),
            current_session_id,
            current_video_path,
            current_session_start,
            current_session_duration_seconds: duration,
            buffer_index: self.buffers.index(),
            buffer_count: self.buffers.len(),
            completed_sessions: self.completed_sessions,
            rotation_failures: self.rotation_failures,
        }
    }

    // Begin a session in the pool's current slot and arm the rotation timer
    fn start_session(&mut self) -> Result<(), SessionError> {
        let video_path = self.buffers.current();
        let start = self.capture.start(&video_path, &self.cache_root)?;

        let active = ActiveSession {
            id: Uuid::new_v4(),
            video_path,
            cached_telemetry_dir: start.cached_telemetry_dir,
            core_session_start_millis: start.core_session_start_millis,
            started_at: start.started_at,
        };

        log::info!(
            "Session {} started in buffer {} of {} ({:?})",
            active.id,
            self.buffers.index(),
            self.buffers.len(),
            active.video_path
        );

        self.state = RotationState::Recording(active);
        self.scheduler.post_delayed(SessionAction::Rotate, self.session_length);
        Ok(())
    }

    // Stop capture, hand the session off, then advance the pool
    //
    // Returns the writers' stop failures; the sequence has already completed.
    fn stop_session(&mut self) -> Vec<SessionError> {
        let active = match std::mem::replace(&mut self.state, RotationState::Idle) {
            RotationState::Recording(active) => active,
            RotationState::Idle => return Vec::new(),
        };

        let Some(captured) = self.capture.stop() else {
            log::error!("Session {} was recording without active capture", active.id);
            self.buffers.advance();
            return Vec::new();
        };

        let session = CompletedSession {
            id: active.id,
            artifacts: captured.artifacts,
            video_path: captured.video_path,
            cached_telemetry_dir: captured.cached_telemetry_dir,
            core_session_start_millis: captured.core_session_start_millis,
            started_at: captured.started_at,
            ended_at: Utc::now(),
        };

        log::info!(
            "Session {} finished: {:.1}s, {} clip(s), buffer {:?}",
            session.id,
            session.duration_seconds(),
            session.artifacts.clip_count(),
            session.video_path
        );

        let handed_off_millis = session.started_at.timestamp_millis();
        self.listener.on_session_stop(session);
        self.completed_sessions += 1;

        // Only now may the next session reuse the pool
        self.buffers.advance();

        // The session just handed off belongs to the listener now
        if let Some(days) = self.cache_retention_days {
            if let Err(e) =
                storage::cleanup_old_sessions(&self.cache_root, days, handed_off_millis)
            {
                log::warn!("Failed to clean up session cache: {}", e);
            }
        }

        captured.stop_errors
    }

    fn handle_action(&mut self, action: SessionAction) {
        match action {
            SessionAction::Rotate => self.rotate(),
            SessionAction::Resume => self.resume(),
        }
    }

    // Recording -> Recording at the session-length boundary
    fn rotate(&mut self) {
        if !self.is_recording() {
            return;
        }

        log::info!("Rotating session...");

        if !self.stop_session().is_empty() {
            self.rotation_failures += 1;
        }

        if let Err(e) = self.start_session() {
            self.rotation_failures += 1;
            log::error!(
                "Failed to start next session, retrying in {:?}: {}",
                RESUME_BACKOFF,
                e
            );
            self.scheduler.post_delayed(SessionAction::Resume, RESUME_BACKOFF);
        }
    }

    // Retry after a rotation failed to start the next session
    fn resume(&mut self) {
        if self.is_recording() {
            return;
        }

        match self.start_session() {
            Ok(()) => log::info!("Session capture resumed"),
            Err(e) => {
                self.rotation_failures += 1;
                log::error!(
                    "Failed to resume session capture, retrying in {:?}: {}",
                    RESUME_BACKOFF,
                    e
                );
                self.scheduler.post_delayed(SessionAction::Resume, RESUME_BACKOFF);
            }
        }
    }

    fn handle_command(&mut self, command: Command) -> bool {
        match command {
            Command::Start(reply) => {
                let _ = reply.send(self.start());
            }
            Command::Stop(reply) => {
                let _ = reply.send(self.stop());
            }
            Command::Status(reply) => {
                let _ = reply.send(self.status());
            }
            Command::Shutdown(reply) => {
                self.shutdown();
                let _ = reply.send(());
                return false;
            }
        }
        true
    }

    fn shutdown(&mut self) {
        if let Err(e) = self.stop() {
            log::error!("Session stopped with errors during shutdown: {}", e);
        }
    }

    // Worker loop: commands and scheduled actions, one at a time
    async fn run(mut self, mut commands: mpsc::Receiver<Command>) {
        log::info!(
            "Session worker started (interval: {:?}, buffers: {})",
            self.session_length,
            self.buffers.len()
        );

        loop {
            tokio::select! {
                biased;

                command = commands.recv() => match command {
                    Some(command) => {
                        if !self.handle_command(command) {
                            break;
                        }
                    }
                    None => {
                        self.shutdown();
                        break;
                    }
                },
                action = self.scheduler.next_due() => self.handle_action(action),
            }
        }

        log::info!("Session worker stopped ({} sessions)", self.completed_sessions);
    }
}

// =============================================================================
// Session Manager Handle
// =============================================================================

// Cloneable handle to a running session worker
#[derive(Clone)]
pub struct SessionManager {
    commands: mpsc::Sender<Command>,
    worker: Arc<Mutex<Option<JoinHandle<()>>>>,
}

impl SessionManager {
    // Spawn the worker on the current tokio runtime
    pub fn spawn(controller: RotationController) -> Self {
        let (tx, rx) = mpsc::channel(COMMAND_CHANNEL_CAPACITY);
        let worker = tokio::spawn(controller.run(rx));

        Self {
            commands: tx,
            worker: Arc::new(Mutex::new(Some(worker))),
        }
    }

    // Begin rotating capture. Idempotent.
    pub async fn start(&self) -> Result<(), SessionError> {
        self.request(Command::Start).await?
    }

    // End capture and flush the in-progress session. Idempotent.
    pub async fn stop(&self) -> Result<(), SessionError> {
        self.request(Command::Stop).await?
    }

    pub async fn status(&self) -> Result<SessionStatus, SessionError> {
        self.request(Command::Status).await
    }

    // Blocking variants for callers outside the runtime (plain threads)
    pub fn blocking_start(&self) -> Result<(), SessionError> {
        self.blocking_request(Command::Start)?
    }

    pub fn blocking_stop(&self) -> Result<(), SessionError> {
        self.blocking_request(Command::Stop)?
    }

    // Stop any active session and wait for the worker to exit
    pub async fn shutdown(&self) -> Result<(), SessionError> {
        let sent = self.request(Command::Shutdown).await;

        let worker = self
            .worker
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();

        if let Some(worker) = worker {
            if let Err(e) = worker.await {
                log::error!("Session worker ended abnormally: {}", e);
            }
        }

        sent
    }

    async fn request<T>(
        &self,
        command: impl FnOnce(oneshot::Sender<T>) -> Command,
    ) -> Result<T, SessionError> {
        let (tx, rx) = oneshot::channel();
        self.commands
            .send(command(tx))
            .await
            .map_err(|_| SessionError::WriterClosed)?;
        rx.await.map_err(|_| SessionError::WriterClosed)
    }

    fn blocking_request<T>(
        &self,
        command: impl FnOnce(oneshot::Sender<T>) -> Command,
    ) -> Result<T, SessionError> {
        let (tx, rx) = oneshot::channel();
        self.commands
            .blocking_send(command(tx))
            .map_err(|_| SessionError::WriterClosed)?;
        rx.blocking_recv().map_err(|_| SessionError::WriterClosed)
    }
}
