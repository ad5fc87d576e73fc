/**
 * ============================================================================
 * SESSION MODULE
 * ============================================================================
 * 
 * PURPOSE: Continuous video + telemetry capture split into bounded sessions
 * 
 * SUBMODULES:
 * - buffers: Fixed ring of video buffer slots
 * - capture: Recorder, engine and image saver driven as one unit
 * - config: Configuration persistence and validation
 * - listener: Receivers for completed sessions
 * - manager: Rotation state machine and worker handle
 * - scheduler: Cancellable delayed actions for the worker
 * - storage: Telemetry cache directories and manifests
 * - types: Data structures and errors
 * 
 * ARCHITECTURE:
 * 1. One worker task owns the controller state
 * 2. Each session writes video into the pool's current buffer and telemetry
 *    into a fresh time-stamped cache directory
 * 3. Session rotation: stop, hand off, advance buffer, start next (5 min)
 * 4. The listener receives each finished session exactly once
 * 
 * ============================================================================
 */

pub mod buffers;
pub mod capture;
pub mod config;
pub mod listener;
pub mod manager;
pub mod scheduler;
pub mod storage;
pub mod types;
