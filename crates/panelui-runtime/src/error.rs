#![forbid(unsafe_code)]

//! Runtime errors.
//!
//! A task error halts the loop; on firmware a crash beats running on
//! with corrupted state. The one exception is input polling, where a
//! failing device is logged and skipped so a flaky sensor cannot take
//! the display down with it.

use panelui_scene::SceneError;

use crate::drivers::DriverError;

/// Errors that stop the runtime loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuntimeError {
    /// A user task failed.
    Task {
        /// The task's registered name.
        name: String,
        /// What it reported.
        message: String,
    },
    /// The panel driver rejected a flush.
    Driver(DriverError),
    /// Layout or tree mutation failed during the frame task.
    Scene(SceneError),
}

impl std::fmt::Display for RuntimeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RuntimeError::Task { name, message } => {
                write!(f, "task {name:?} failed: {message}")
            }
            RuntimeError::Driver(err) => write!(f, "panel driver: {err}"),
            RuntimeError::Scene(err) => write!(f, "scene: {err}"),
        }
    }
}

impl std::error::Error for RuntimeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RuntimeError::Task { .. } => None,
            RuntimeError::Driver(err) => Some(err),
            RuntimeError::Scene(err) => Some(err),
        }
    }
}

impl From<DriverError> for RuntimeError {
    fn from(err: DriverError) -> Self {
        RuntimeError::Driver(err)
    }
}

impl From<SceneError> for RuntimeError {
    fn from(err: SceneError) -> Self {
        RuntimeError::Scene(err)
    }
}
