use std::fmt;
use thiserror::Error;

use crate::core::{EngineError, InputError};

/// Pane operations that go through engine recovery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaneOp {
    Load,
    TogglePlay,
    Seek,
    SetVolume,
    Mute,
    ToggleLoop,
    Reset,
    EndOfPlayback,
}

impl fmt::Display for PaneOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PaneOp::Load => "load",
            PaneOp::TogglePlay => "toggle play",
            PaneOp::Seek => "seek",
            PaneOp::SetVolume => "set volume",
            PaneOp::Mute => "mute",
            PaneOp::ToggleLoop => "toggle loop",
            PaneOp::Reset => "reset",
            PaneOp::EndOfPlayback => "end of playback",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Error)]
pub enum PaneError {
    #[error(transparent)]
    Input(#[from] InputError),

    #[error("pane {pane}: no video backend could be started")]
    NoBackend { pane: usize },

    #[error("pane {pane}: {op} failed again after recovery: {source}")]
    Persistent {
        pane: usize,
        op: PaneOp,
        #[source]
        source: EngineError,
    },
}

impl PaneError {
    /// Text shown in the pane's display label.
    pub fn display_text(&self) -> &'static str {
        match self {
            PaneError::Input(input) => input.display_text(),
            PaneError::NoBackend { .. } => "Error: No Video Output",
            PaneError::Persistent { source: EngineError::Shutdown, .. } => "Error: Player Shutdown",
            PaneError::Persistent { .. } => "Error: Invalid Video",
        }
    }
}
