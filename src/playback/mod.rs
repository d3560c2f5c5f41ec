pub mod controller;
pub mod error;
pub mod pane;
pub mod timer;

#[cfg(test)]
mod controller_test;

pub use controller::{AppController, AppState, PANE_COUNT};
pub use error::{PaneError, PaneOp};
pub use pane::{PaneController, PaneDisplay, PaneSettings, SliderState, TransportFlags};
pub use timer::ProgressTimer;
