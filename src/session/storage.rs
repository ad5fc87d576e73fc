/**
 * ============================================================================
 * SESSION STORAGE MODULE
 * ============================================================================
 *
 * PURPOSE: Manage per-session telemetry cache directories
 *
 * FUNCTIONALITY:
 * - Generate time-stamped cache directory names
 * - Create cache directories before writers start
 * - Write the session manifest sidecar
 * - Calculate cache usage and clean up expired sessions
 *
 * FILE STRUCTURE:
 * <cache_root>/
 * ├── 1736956800123/          # Wall-clock millis at session start
 * │   ├── session.json        # Manifest sidecar (written on completion)
 * │   └── ...                 # Telemetry + images written by the engine
 * └── 1736957100456/
 *     └── ...
 *
 * ============================================================================
 */

use crate::session::types::CompletedSession;
use chrono::{DateTime, TimeZone, Utc};
use once_cell::sync::Lazy;
use std::ffi::OsString;
use std::path::{MAIN_SEPARATOR_STR, Path, PathBuf};
use std::sync::Mutex;
use walkdir::WalkDir;

pub const MANIFEST_FILE_NAME: &str = "session.json";

// Last millisecond stamp handed out, shared by every writer in the process
static LAST_CACHE_DIR_MILLIS: Lazy<Mutex<i64>> = Lazy::new(|| Mutex::new(0));

// Next directory stamp: wall clock, bumped past the previous one if needed
fn next_cache_dir_millis(now_millis: i64) -> i64 {
    let mut last = LAST_CACHE_DIR_MILLIS
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner());
    let millis = now_millis.max(*last + 1);
    *last = millis;
    millis
}

// Build "<cache_root>/<millis>/" with a trailing separator
pub fn cache_dir_path(cache_root: &Path, millis: i64) -> PathBuf {
    let mut dir: OsString = cache_root.join(millis.to_string()).into_os_string();
    dir.push(MAIN_SEPARATOR_STR);
    PathBuf::from(dir)
}

// Generate a fresh cache directory path for a session starting now
//
// Returns the path together with the wall-clock time it encodes.
pub fn generate_cache_dir(cache_root: &Path) -> Result<(PathBuf, DateTime<Utc>), String> {
    let root = std::path::absolute(cache_root)
        .map_err(|e| format!("Failed to resolve cache root {:?}: {}", cache_root, e))?;

    let millis = next_cache_dir_millis(Utc::now().timestamp_millis());
    let started_at = Utc
        .timestamp_millis_opt(millis)
        .single()
        .ok_or_else(|| format!("Invalid cache directory timestamp: {}", millis))?;

    Ok((cache_dir_path(&root, millis), started_at))
}

// Generate and create the cache directory for a new session
pub fn create_session_cache_dir(cache_root: &Path) -> Result<(PathBuf, DateTime<Utc>), String> {
    let (dir, started_at) = generate_cache_dir(cache_root)?;

    std::fs::create_dir_all(&dir)
        .map_err(|e| format!("Failed to create session cache directory {:?}: {}", dir, e))?;

    log::debug!("Created session cache directory {:?}", dir);
    Ok((dir, started_at))
}

// Save the session manifest into its cache directory (temp file + rename)
pub fn save_manifest(session: &CompletedSession) -> Result<PathBuf, String> {
    let path = session.cached_telemetry_dir.join(MANIFEST_FILE_NAME);
    let temp_path = path.with_extension("json.tmp");

    let contents = serde_json::to_string_pretty(session)
        .map_err(|e| format!("Failed to serialize session manifest: {}", e))?;

    std::fs::write(&temp_path, contents)
        .map_err(|e| format!("Failed to write session manifest: {}", e))?;

    std::fs::rename(&temp_path, &path)
        .map_err(|e| format!("Failed to save session manifest: {}", e))?;

    log::info!("Saved session manifest to {:?}", path);
    Ok(path)
}

// Load a session manifest
pub fn load_manifest(path: &Path) -> Result<CompletedSession, String> {
    let contents = std::fs::read_to_string(path)
        .map_err(|e| format!("Failed to read session manifest: {}", e))?;

    serde_json::from_str(&contents).map_err(|e| format!("Failed to parse session manifest: {}", e))
}

// Session cache directories under the root, oldest first
pub fn list_session_dirs(cache_root: &Path) -> Vec<(PathBuf, i64)> {
    if !cache_root.exists() {
        return Vec::new();
    }

    let mut dirs: Vec<(PathBuf, i64)> = WalkDir::new(cache_root)
        .min_depth(1)
        .max_depth(1)
        .follow_links(false)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_dir())
        .filter_map(|e| {
            let millis = e.file_name().to_str()?.parse::<i64>().ok()?;
            Some((e.path().to_path_buf(), millis))
        })
        .collect();

    dirs.sort_by_key(|(_, millis)| *millis);
    dirs
}

// Calculate total bytes stored under the cache root
pub fn calculate_cache_size(cache_root: &Path) -> Result<u64, String> {
    if !cache_root.exists() {
        return Ok(0);
    }

    let mut total_size: u64 = 0;

    for entry in WalkDir::new(cache_root)
        .follow_links(false)
        .into_iter()
        .filter_map(|e| e.ok())
    {
        if entry.file_type().is_file() {
            if let Ok(metadata) = entry.metadata() {
                total_size += metadata.len();
            }
        }
    }

    Ok(total_size)
}

// Remove session cache directories older than the retention period
//
// Age comes from the directory name, not the file mtime, so directories the
// engine is still appending to are judged by when their session began.
// Directories stamped at or after `keep_from_millis` are never removed.
pub fn cleanup_old_sessions(
    cache_root: &Path,
    retention_days: u32,
    keep_from_millis: i64,
) -> Result<u64, String> {
    let retention_cutoff =
        (Utc::now() - chrono::Duration::days(retention_days as i64)).timestamp_millis();
    let cutoff = retention_cutoff.min(keep_from_millis);

    let mut dirs_deleted: u64 = 0;

    for (dir, millis) in list_session_dirs(cache_root) {
        if millis >= cutoff {
            break;
        }

        if let Err(e) = std::fs::remove_dir_all(&dir) {
            log::warn!("Failed to delete expired session cache {:?}: {}", dir, e);
        } else {
            dirs_deleted += 1;
        }
    }

    if dirs_deleted > 0 {
        log::info!("Cleaned up {} expired session cache directories", dirs_deleted);
    }

    Ok(dirs_deleted)
}
