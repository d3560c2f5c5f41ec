// =============================================================================
// PANE CONTROLLER
// =============================================================================
//
// One pane owns one engine handle and the media it plays. Every engine call
// goes through `with_recovery`: the first failure tears the engine down,
// builds a fresh one and retries the operation once; a second failure parks
// the pane in a persistent error state until a new file is loaded.
//
// =============================================================================

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;

use crate::core::media::{display_name, validate_video_path};
use crate::core::{AppConfig, EngineError, EngineResult};
use crate::playback::error::{PaneError, PaneOp};
use crate::video::{
    EngineFactory, EngineNotification, EngineOptions, Notifier, ObservedProperty, PlayerEngine,
    SeekReference, TerminationReason, VideoFrame,
};

/// Range used by the seek slider while the duration is unknown.
pub const SEEK_PLACEHOLDER_MAX: f64 = 100.0;
/// Loop switched off on an idle engine parks it this far before the end.
const END_PARK_OFFSET: f64 = 0.1;

/// Tunables shared by all panes.
#[derive(Debug, Clone, PartialEq)]
pub struct PaneSettings {
    pub backends: Vec<String>,
    pub hardware_decoding: bool,
    pub precise_seek: bool,
    pub default_volume: f64,
    pub seek_tolerance: f64,
    pub end_guard: f64,
    pub load_timeout: Duration,
}

impl PaneSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            backends: config.video_backends.clone(),
            hardware_decoding: config.hardware_decoding,
            precise_seek: config.precise_seek,
            default_volume: config.default_volume,
            seek_tolerance: config.seek_tolerance_secs,
            end_guard: config.end_guard_secs,
            load_timeout: config.load_timeout(),
        }
    }
}

impl Default for PaneSettings {
    fn default() -> Self {
        Self::from_config(&AppConfig::default())
    }
}

/// Global transport state a pane needs to rebuild its engine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransportFlags {
    pub loop_enabled: bool,
    pub muted: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaneDisplay {
    Empty,
    Loaded(String),
    Error(String),
}

impl PaneDisplay {
    pub fn text(&self) -> &str {
        match self {
            PaneDisplay::Empty => "Drop video here",
            PaneDisplay::Loaded(name) => name,
            PaneDisplay::Error(message) => message,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, PaneDisplay::Error(_))
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SliderState {
    pub value: f64,
    pub max: f64,
    pub enabled: bool,
}

impl SliderState {
    fn placeholder() -> Self {
        Self {
            value: 0.0,
            max: SEEK_PLACEHOLDER_MAX,
            enabled: false,
        }
    }

    fn for_duration(duration: Option<f64>) -> Self {
        match duration.filter(|d| *d > 0.0) {
            Some(duration) => Self {
                value: 0.0,
                max: duration,
                enabled: true,
            },
            None => Self::placeholder(),
        }
    }

    fn set_value(&mut self, value: f64) {
        self.value = value.clamp(0.0, self.max);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Attempt {
    First,
    Retry,
}

pub struct PaneController {
    index: usize,
    factory: Arc<dyn EngineFactory>,
    sender: broadcast::Sender<EngineNotification>,
    settings: Arc<PaneSettings>,

    engine: Option<Box<dyn PlayerEngine>>,
    generation: u64,

    media_path: Option<PathBuf>,
    is_first_play: bool,
    has_ended: bool,
    failed: bool,

    volume_before_mute: f64,
    volume_level: f64,
    display: PaneDisplay,
    seek_slider: SliderState,
    position: Option<f64>,
    duration: Option<f64>,
}

impl PaneController {
    pub fn new(
        index: usize,
        factory: Arc<dyn EngineFactory>,
        sender: broadcast::Sender<EngineNotification>,
        settings: Arc<PaneSettings>,
    ) -> Self {
        let volume = settings.default_volume;
        Self {
            index,
            factory,
            sender,
            settings,
            engine: None,
            generation: 0,
            media_path: None,
            is_first_play: false,
            has_ended: false,
            failed: false,
            volume_before_mute: volume,
            volume_level: volume,
            display: PaneDisplay::Empty,
            seek_slider: SliderState::placeholder(),
            position: None,
            duration: None,
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn media_path(&self) -> Option<&Path> {
        self.media_path.as_deref()
    }

    /// A file is loaded and the pane is not parked in a persistent error.
    pub fn has_media(&self) -> bool {
        self.media_path.is_some() && !self.failed
    }

    pub fn has_engine(&self) -> bool {
        self.engine.is_some()
    }

    pub fn backend(&self) -> Option<&str> {
        self.engine.as_deref().map(|engine| engine.backend())
    }

    pub fn is_first_play(&self) -> bool {
        self.is_first_play
    }

    pub fn has_ended(&self) -> bool {
        self.has_ended
    }

    pub fn is_failed(&self) -> bool {
        self.failed
    }

    pub fn volume_before_mute(&self) -> f64 {
        self.volume_before_mute
    }

    /// Value shown on the volume slider; zero while muted.
    pub fn volume_level(&self) -> f64 {
        self.volume_level
    }

    pub fn volume_label(&self) -> String {
        format!("Vol: {}", self.volume_level as i64)
    }

    pub fn display(&self) -> &PaneDisplay {
        &self.display
    }

    pub fn seek_slider(&self) -> SliderState {
        self.seek_slider
    }

    /// Tracks the slider while the user drags it; the seek itself happens on release.
    pub fn drag_seek_slider(&mut self, value: f64) {
        self.seek_slider.set_value(value);
    }

    pub fn status_line(&self) -> String {
        format!(
            "{} / {}",
            format_clock(self.position.unwrap_or(0.0)),
            format_clock(self.duration.unwrap_or(0.0))
        )
    }

    // -------------------------------------------------------------------------
    // Engine lifecycle
    // -------------------------------------------------------------------------

    fn engine(&self) -> EngineResult<&dyn PlayerEngine> {
        match self.engine.as_deref() {
            Some(engine) if engine.core_shutdown() => Err(EngineError::Shutdown),
            Some(engine) => Ok(engine),
            None => Err(EngineError::Missing),
        }
    }

    fn engine_mut(&mut self) -> EngineResult<&mut Box<dyn PlayerEngine>> {
        match self.engine.as_mut() {
            Some(engine) if engine.core_shutdown() => Err(EngineError::Shutdown),
            Some(engine) => Ok(engine),
            None => Err(EngineError::Missing),
        }
    }

    fn effective_volume(&self, flags: TransportFlags) -> f64 {
        if flags.muted {
            0.0
        } else {
            self.volume_before_mute
        }
    }

    /// Creates the pane's first engine.
    pub fn start(&mut self, flags: TransportFlags) -> Result<(), PaneError> {
        if let Err(e) = self.create_engine(flags) {
            self.display = PaneDisplay::Error(e.display_text().to_string());
            return Err(e);
        }
        Ok(())
    }

    /// Tries each configured backend in order until one produces an engine.
    fn create_engine(&mut self, flags: TransportFlags) -> Result<(), PaneError> {
        let settings = self.settings.clone();
        let initial_volume = self.effective_volume(flags);

        for backend in &settings.backends {
            let options = EngineOptions {
                backend: backend.clone(),
                hardware_decoding: settings.hardware_decoding,
                keep_open: true,
                idle: true,
                precise_seek: settings.precise_seek,
                initial_volume,
            };
            let generation = self.generation + 1;
            let notifier = Notifier::new(self.index, generation, self.sender.clone());

            let mut engine = match self.factory.create(&options, notifier) {
                Ok(engine) => engine,
                Err(e) => {
                    log::warn!("Pane {}: backend {} unavailable: {}", self.index, backend, e);
                    continue;
                }
            };

            let observed = ObservedProperty::ALL
                .iter()
                .try_for_each(|property| engine.observe(*property));
            if let Err(e) = observed {
                log::warn!("Pane {}: backend {} rejected observers: {}", self.index, backend, e);
                engine.terminate();
                continue;
            }

            self.generation = generation;
            self.engine = Some(engine);
            log::info!(
                "Pane {} engine ready (backend {}, generation {})",
                self.index,
                backend,
                generation
            );
            return Ok(());
        }

        log::error!("Pane {}: no video backend could be started", self.index);
        Err(PaneError::NoBackend { pane: self.index })
    }

    /// Unsubscribes and terminates the current engine, if any.
    fn teardown(&mut self) {
        if let Some(mut engine) = self.engine.take() {
            for property in ObservedProperty::ALL {
                if let Err(e) = engine.unobserve(property) {
                    log::debug!("Pane {}: unobserve {:?} failed: {}", self.index, property, e);
                }
            }
            engine.terminate();
            log::debug!("Pane {}: engine generation {} terminated", self.index, self.generation);
        }
    }

    /// Replaces the engine with a fresh one and reapplies loop and volume.
    pub fn recover(&mut self, flags: TransportFlags) -> Result<(), PaneError> {
        log::warn!("Pane {}: recreating engine", self.index);
        self.teardown();
        self.create_engine(flags)?;

        let volume = self.effective_volume(flags);
        let reapplied = self.engine_mut().and_then(|engine| {
            engine.set_loop_file(flags.loop_enabled)?;
            engine.set_volume(volume)
        });
        if let Err(e) = reapplied {
            log::warn!("Pane {}: could not restore transport on new engine: {}", self.index, e);
        }
        Ok(())
    }

    fn mark_failed(&mut self, error: &PaneError) {
        log::error!("Pane {} disabled: {}", self.index, error);
        self.failed = true;
        self.has_ended = false;
        self.teardown();
        self.display = PaneDisplay::Error(error.display_text().to_string());
        self.seek_slider = SliderState::placeholder();
        self.position = None;
    }

    /// Runs `action`, recovering the engine and retrying once on failure.
    fn with_recovery<T>(
        &mut self,
        op: PaneOp,
        flags: TransportFlags,
        mut action: impl FnMut(&mut Self, Attempt) -> EngineResult<T>,
    ) -> Result<T, PaneError> {
        let first = match action(self, Attempt::First) {
            Ok(value) => return Ok(value),
            Err(e) => e,
        };
        log::warn!("Pane {}: {} failed: {}", self.index, op, first);

        if let Err(e) = self.recover(flags) {
            self.mark_failed(&e);
            return Err(e);
        }

        match action(self, Attempt::Retry) {
            Ok(value) => {
                log::info!("Pane {}: {} succeeded after recovery", self.index, op);
                Ok(value)
            }
            Err(source) => {
                let error = PaneError::Persistent {
                    pane: self.index,
                    op,
                    source,
                };
                self.mark_failed(&error);
                Err(error)
            }
        }
    }

    // -------------------------------------------------------------------------
    // Engine steps used inside recovery
    // -------------------------------------------------------------------------

    fn load_paused(&mut self, path: &Path, timeout: Duration) -> EngineResult<Option<f64>> {
        let index = self.index;
        let engine = self.engine_mut()?;
        engine.load_file(path)?;
        if !engine.wait_until_loaded(timeout) {
            log::warn!("Pane {}: {} not ready within {:?}", index, path.display(), timeout);
        }
        engine.set_pause(true)?;
        engine.duration()
    }

    /// Reloads `path` when the engine lost its file (fresh engine or idle).
    fn ensure_loaded(&mut self, path: &Path, timeout: Duration) -> EngineResult<()> {
        let needs_reload = {
            let engine = self.engine()?;
            engine.filename()?.is_none() || engine.idle_active()?
        };
        if needs_reload {
            log::info!("Pane {}: engine has no active file, reloading {}", self.index, path.display());
            let duration = self.load_paused(path, timeout)?;
            self.is_first_play = true;
            self.apply_duration(duration);
        }
        Ok(())
    }

    fn start_playback(&mut self, path: &Path, timeout: Duration) -> EngineResult<()> {
        self.ensure_loaded(path, timeout)?;
        if self.is_first_play || self.has_ended {
            self.engine_mut()?.seek(0.0, SeekReference::Absolute)?;
            self.is_first_play = false;
            self.seek_slider.set_value(0.0);
            self.position = Some(0.0);
        }
        self.engine_mut()?.set_pause(false)
    }

    fn park_at_end(&mut self) -> EngineResult<()> {
        let engine = self.engine_mut()?;
        engine.set_pause(true)?;
        if let Some(duration) = engine.duration()? {
            engine.seek((duration - END_PARK_OFFSET).max(0.0), SeekReference::Absolute)?;
        }
        Ok(())
    }

    fn apply_duration(&mut self, duration: Option<f64>) {
        self.seek_slider = SliderState::for_duration(duration);
        self.duration = duration;
        self.position = Some(0.0);
    }

    // -------------------------------------------------------------------------
    // Pane operations
    // -------------------------------------------------------------------------

    /// Loads `path` paused at the start. Invalid input only changes the
    /// display; the previous media and engine stay as they were.
    pub fn load(&mut self, path: &Path, flags: TransportFlags) -> Result<(), PaneError> {
        let path = match validate_video_path(path) {
            Ok(path) => path,
            Err(e) => {
                log::warn!("Pane {}: rejected {}: {}", self.index, path.display(), e);
                self.display = PaneDisplay::Error(e.display_text().to_string());
                return Err(e.into());
            }
        };

        self.failed = false;
        if self.engine.is_none() {
            if let Err(e) = self.create_engine(flags) {
                self.mark_failed(&e);
                return Err(e);
            }
        }

        self.media_path = Some(path.clone());
        let timeout = self.settings.load_timeout;
        let duration = self.with_recovery(PaneOp::Load, flags, |pane, _| pane.load_paused(&path, timeout))?;

        self.is_first_play = true;
        self.has_ended = false;
        self.apply_duration(duration);
        self.display = PaneDisplay::Loaded(display_name(&path));
        log::info!("Pane {}: loaded {} (duration {:?})", self.index, path.display(), duration);
        Ok(())
    }

    pub fn toggle_play(&mut self, playing: bool, flags: TransportFlags) -> Result<(), PaneError> {
        let Some(path) = self.media_path.clone().filter(|_| !self.failed) else {
            return Ok(());
        };

        if playing {
            let timeout = self.settings.load_timeout;
            self.with_recovery(PaneOp::TogglePlay, flags, |pane, _| pane.start_playback(&path, timeout))?;
            self.has_ended = false;
            log::info!("Pane {}: playing {}", self.index, path.display());
        } else {
            self.with_recovery(PaneOp::TogglePlay, flags, |pane, _| pane.engine_mut()?.set_pause(true))?;
            log::info!("Pane {}: paused", self.index);
        }
        Ok(())
    }

    /// Seeks to `target` seconds. Requests closer than the seek tolerance to
    /// the current position are dropped.
    pub fn seek(&mut self, target: f64, flags: TransportFlags) -> Result<(), PaneError> {
        let live = self.engine.as_deref().map_or(false, |engine| !engine.core_shutdown());
        let Some(path) = self.media_path.clone().filter(|_| live && !self.failed) else {
            return Ok(());
        };
        let tolerance = self.settings.seek_tolerance;
        let timeout = self.settings.load_timeout;

        let performed = self.with_recovery(PaneOp::Seek, flags, |pane, attempt| {
            if attempt == Attempt::Retry {
                pane.ensure_loaded(&path, timeout)?;
                // The explicit target replaces the restart-from-zero
                pane.is_first_play = false;
            }
            if let Some(current) = pane.engine()?.time_pos()? {
                if (current - target).abs() < tolerance {
                    return Ok(false);
                }
            }
            pane.engine_mut()?.seek(target, SeekReference::Absolute)?;
            Ok(true)
        })?;

        if performed {
            self.has_ended = false;
            self.seek_slider.set_value(target);
            self.position = Some(target);
            log::debug!("Pane {}: seek to {:.2}s", self.index, target);
        }
        Ok(())
    }

    /// Sets the pane volume (0–100). While muted the level is only recorded.
    pub fn set_volume(&mut self, level: f64, flags: TransportFlags) -> Result<(), PaneError> {
        let level = level.clamp(0.0, 100.0);
        self.volume_before_mute = level;
        if flags.muted {
            log::debug!("Pane {}: muted, recorded volume {}", self.index, level);
            return Ok(());
        }
        self.volume_level = level;
        if self.engine.is_none() || self.failed {
            return Ok(());
        }
        self.with_recovery(PaneOp::SetVolume, flags, |pane, _| pane.engine_mut()?.set_volume(level))
    }

    /// Pushes the current mute state to the engine.
    pub fn apply_mute(&mut self, flags: TransportFlags) -> Result<(), PaneError> {
        let target = self.effective_volume(flags);
        self.volume_level = target;
        if self.engine.is_none() || self.failed {
            return Ok(());
        }
        self.with_recovery(PaneOp::Mute, flags, |pane, _| pane.engine_mut()?.set_volume(target))
    }

    pub fn toggle_loop(&mut self, flags: TransportFlags) -> Result<(), PaneError> {
        if self.engine.is_none() || self.failed {
            return Ok(());
        }
        let enabled = flags.loop_enabled;
        self.with_recovery(PaneOp::ToggleLoop, flags, |pane, attempt| {
            pane.engine_mut()?.set_loop_file(enabled)?;
            if !enabled && (attempt == Attempt::Retry || pane.engine()?.idle_active()?) {
                pane.park_at_end()?;
            }
            Ok(())
        })
    }

    /// Reloads the current file paused at position zero.
    pub fn reset(&mut self, flags: TransportFlags) -> Result<(), PaneError> {
        let Some(path) = self.media_path.clone().filter(|_| !self.failed) else {
            return Ok(());
        };
        let timeout = self.settings.load_timeout;

        let duration = self.with_recovery(PaneOp::Reset, flags, |pane, _| {
            let duration = pane.load_paused(&path, timeout)?;
            if pane.engine()?.filename()?.is_some() {
                pane.engine_mut()?.seek(0.0, SeekReference::Absolute)?;
            }
            Ok(duration)
        })?;

        self.is_first_play = false;
        self.has_ended = false;
        self.apply_duration(duration);
        self.display = PaneDisplay::Loaded(display_name(&path));
        log::info!("Pane {}: reset {}", self.index, path.display());
        Ok(())
    }

    /// Handles end-file, eof-reached and idle alike. Returns `true` when the
    /// end was accepted, in which case the caller re-checks whether every
    /// pane has finished.
    pub fn on_playback_terminated(
        &mut self,
        reason: TerminationReason,
        flags: TransportFlags,
    ) -> Result<bool, PaneError> {
        if flags.loop_enabled {
            return Ok(false);
        }
        let Some(path) = self.media_path.clone().filter(|_| !self.failed) else {
            return Ok(false);
        };
        let Ok(engine) = self.engine() else {
            return Ok(false);
        };

        // Notifications race engine state, so only trust ones near the end
        if let (Ok(Some(position)), Ok(Some(duration))) = (engine.time_pos(), engine.duration()) {
            if position < duration - self.settings.end_guard {
                log::debug!(
                    "Pane {}: ignoring {:?} at {:.2}s of {:.2}s",
                    self.index,
                    reason,
                    position,
                    duration
                );
                return Ok(false);
            }
        }

        let timeout = self.settings.load_timeout;
        let duration = self.with_recovery(PaneOp::EndOfPlayback, flags, |pane, attempt| {
            if attempt == Attempt::Retry {
                pane.load_paused(&path, timeout)?;
                pane.park_at_end()?;
            }
            let engine = pane.engine_mut()?;
            engine.set_pause(true)?;
            engine.duration()
        })?;

        self.has_ended = true;
        if let Some(duration) = duration {
            self.seek_slider.set_value(duration);
            self.position = Some(duration);
        }
        log::info!("Pane {}: playback ended ({:?})", self.index, reason);
        Ok(true)
    }

    /// Refreshes the seek slider from the engine position. Read failures are
    /// logged and left for the next poll.
    pub fn poll_progress(&mut self) {
        if !self.has_media() {
            return;
        }
        let Ok(engine) = self.engine() else {
            return;
        };

        match read_playing_position(engine) {
            Ok(Some(position)) => {
                self.position = Some(position);
                if (self.seek_slider.value - position).abs() >= self.settings.seek_tolerance {
                    self.seek_slider.set_value(position);
                }
            }
            Ok(None) => {}
            Err(e) => log::warn!("Pane {}: progress read failed: {}", self.index, e),
        }
    }

    pub fn take_frame(&mut self) -> Option<VideoFrame> {
        self.engine.as_mut()?.take_frame()
    }

    pub fn shutdown(&mut self) {
        self.teardown();
    }
}

/// Position of a pane that is actively playing, `None` if paused or idle.
fn read_playing_position(engine: &dyn PlayerEngine) -> EngineResult<Option<f64>> {
    if engine.pause()? || engine.idle_active()? {
        return Ok(None);
    }
    engine.time_pos()
}

fn format_clock(seconds: f64) -> String {
    let total = seconds.max(0.0) as u64;
    format!("{:02}:{:02}", total / 60, total % 60)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_clock() {
        assert_eq!(format_clock(0.0), "00:00");
        assert_eq!(format_clock(61.9), "01:01");
        assert_eq!(format_clock(-3.0), "00:00");
    }

    #[test]
    fn test_slider_for_unknown_duration_is_placeholder() {
        let slider = SliderState::for_duration(None);
        assert_eq!(slider.max, SEEK_PLACEHOLDER_MAX);
        assert!(!slider.enabled);
        assert!(SliderState::for_duration(Some(4.5)).enabled);
    }
}
