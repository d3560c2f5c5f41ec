use std::path::PathBuf;
use thiserror::Error;

/// Failures raised by a player engine. Any of these may leave the engine
/// unusable, so callers treat them uniformly as a trigger for recovery.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("video backend '{0}' is not available")]
    UnsupportedBackend(String),

    #[error("media probe failed: {0}")]
    Probe(String),

    #[error("engine invalidated: {0}")]
    Invalidated(String),

    #[error("no media loaded")]
    NoMedia,

    #[error("engine has shut down")]
    Shutdown,

    #[error("no engine instance")]
    Missing,
}

pub type EngineResult<T> = Result<T, EngineError>;

/// Rejected user input. These never touch pane or engine state.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InputError {
    #[error("file not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("unsupported video format: {}", .0.display())]
    UnsupportedFormat(PathBuf),
}

impl InputError {
    /// Text shown in the pane's display label.
    pub fn display_text(&self) -> &'static str {
        match self {
            InputError::NotFound(_) => "Error: File Not Found",
            InputError::UnsupportedFormat(_) => "Error: Unsupported Format",
        }
    }
}
