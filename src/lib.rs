pub mod session;

pub use session::buffers::BufferPool;
pub use session::capture::{CaptureEngine, CaptureHandle, TelemetryImageSaver, VideoRecorder};
pub use session::config::SessionConfig;
pub use session::listener::{ManifestListener, SessionListener};
pub use session::manager::{RotationController, SessionManager};
pub use session::types::{
    CompletedSession, SessionArtifacts, SessionError, SessionStatus, VideoClip, VideoClipPro,
};
