// =============================================================================
// PLAYER ENGINE CONTRACT
// =============================================================================
//
// A pane talks to exactly one engine. Engines run their own threads and report
// end-of-playback through a broadcast channel; the GUI thread drains that
// channel every frame, so notification handlers never race GUI work.
//
// =============================================================================

use std::path::Path;
use std::time::Duration;
use tokio::sync::broadcast;

use crate::core::EngineResult;

/// Raw RGBA frame ready for texture upload
#[derive(Debug, Clone)]
pub struct VideoFrame {
    pub image_data: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub timestamp: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeekReference {
    Absolute,
    /// Offset from the current position. Pane operations always seek to
    /// absolute targets.
    #[allow(dead_code)]
    Relative,
}

/// Engine signals a pane may subscribe to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObservedProperty {
    EndFile,
    EofReached,
    IdleActive,
}

impl ObservedProperty {
    pub const ALL: [ObservedProperty; 3] = [
        ObservedProperty::EndFile,
        ObservedProperty::EofReached,
        ObservedProperty::IdleActive,
    ];
}

/// Why playback stopped. All three are handled identically by panes; the
/// reason is kept for logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminationReason {
    EndFile,
    EofReached,
    Idle,
}

impl TerminationReason {
    pub fn property(self) -> ObservedProperty {
        match self {
            TerminationReason::EndFile => ObservedProperty::EndFile,
            TerminationReason::EofReached => ObservedProperty::EofReached,
            TerminationReason::Idle => ObservedProperty::IdleActive,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineEvent {
    PlaybackTerminated(TerminationReason),
}

/// An engine event tagged with the pane and engine generation it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineNotification {
    pub pane: usize,
    pub generation: u64,
    pub event: EngineEvent,
}

/// Handed to an engine at construction so its threads can post events.
#[derive(Debug, Clone)]
pub struct Notifier {
    pane: usize,
    generation: u64,
    sender: broadcast::Sender<EngineNotification>,
}

impl Notifier {
    pub fn new(pane: usize, generation: u64, sender: broadcast::Sender<EngineNotification>) -> Self {
        Self { pane, generation, sender }
    }

    pub fn pane(&self) -> usize {
        self.pane
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn notify(&self, event: EngineEvent) {
        let notification = EngineNotification {
            pane: self.pane,
            generation: self.generation,
            event,
        };
        // No receivers only happens during shutdown
        if self.sender.send(notification).is_err() {
            log::debug!("Dropped engine event for pane {}: no listeners", self.pane);
        }
    }
}

/// Construction options, fixed for the lifetime of an engine instance.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineOptions {
    /// Rendering back-end; for the ffmpeg engine this selects `-hwaccel`.
    pub backend: String,
    pub hardware_decoding: bool,
    /// Hold the last frame and report eof instead of unloading at the end.
    pub keep_open: bool,
    /// Stay alive in idle state when nothing is loaded.
    pub idle: bool,
    pub precise_seek: bool,
    pub initial_volume: f64,
}

pub trait PlayerEngine {
    fn backend(&self) -> &str;

    fn load_file(&mut self, path: &Path) -> EngineResult<()>;
    /// Blocks until the most recent load finished or `timeout` elapsed.
    /// Returns `true` only if the media is loaded and usable.
    fn wait_until_loaded(&self, timeout: Duration) -> bool;

    fn pause(&self) -> EngineResult<bool>;
    fn set_pause(&mut self, paused: bool) -> EngineResult<()>;
    fn volume(&self) -> EngineResult<f64>;
    fn set_volume(&mut self, volume: f64) -> EngineResult<()>;
    fn loop_file(&self) -> EngineResult<bool>;
    fn set_loop_file(&mut self, enabled: bool) -> EngineResult<()>;

    fn time_pos(&self) -> EngineResult<Option<f64>>;
    fn duration(&self) -> EngineResult<Option<f64>>;
    fn filename(&self) -> EngineResult<Option<String>>;
    fn idle_active(&self) -> EngineResult<bool>;
    fn core_shutdown(&self) -> bool;

    fn seek(&mut self, target: f64, reference: SeekReference) -> EngineResult<()>;

    fn observe(&mut self, property: ObservedProperty) -> EngineResult<()>;
    fn unobserve(&mut self, property: ObservedProperty) -> EngineResult<()>;

    /// Latest decoded frame since the previous call, if any.
    fn take_frame(&mut self) -> Option<VideoFrame>;

    fn terminate(&mut self);
}

pub trait EngineFactory {
    fn create(&self, options: &EngineOptions, notifier: Notifier) -> EngineResult<Box<dyn PlayerEngine>>;
}

/// Expands RGB24 bytes into RGBA for egui textures.
pub fn rgb_to_rgba(rgb: &[u8]) -> Vec<u8> {
    let mut rgba = Vec::with_capacity(rgb.len() / 3 * 4);
    for chunk in rgb.chunks_exact(3) {
        rgba.extend_from_slice(chunk);
        rgba.push(255);
    }
    rgba
}
