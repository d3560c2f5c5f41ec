use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::broadcast::{self, error::TryRecvError};

use crate::core::{AppConfig, LayoutGeometry, LayoutMode, WindowSize};
use crate::playback::error::PaneError;
use crate::playback::pane::{PaneController, PaneSettings, TransportFlags};
use crate::playback::timer::ProgressTimer;
use crate::video::{EngineEvent, EngineFactory, EngineNotification};

pub const PANE_COUNT: usize = 4;
const NOTIFICATION_CAPACITY: usize = 64;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AppState {
    pub global_playing: bool,
    pub loop_enabled: bool,
    pub is_muted: bool,
    pub layout_mode: LayoutMode,
    pub fullscreen: bool,
}

/// Owns the four panes and applies global commands to them.
pub struct AppController {
    panes: [PaneController; PANE_COUNT],
    state: AppState,
    notifications: broadcast::Receiver<EngineNotification>,
    progress_timer: ProgressTimer,
}

impl AppController {
    pub fn new(factory: Arc<dyn EngineFactory>, config: &AppConfig) -> Self {
        let (sender, notifications) = broadcast::channel(NOTIFICATION_CAPACITY);
        let settings = Arc::new(PaneSettings::from_config(config));
        let panes = std::array::from_fn(|index| {
            PaneController::new(index, factory.clone(), sender.clone(), settings.clone())
        });

        let mut controller = Self {
            panes,
            state: AppState {
                layout_mode: config.initial_layout,
                ..Default::default()
            },
            notifications,
            progress_timer: ProgressTimer::new(config.progress_interval(), Instant::now()),
        };

        let flags = controller.flags();
        for pane in controller.panes.iter_mut() {
            if let Err(e) = pane.start(flags) {
                log::error!("Pane {} has no engine: {}", pane.index(), e);
            }
        }
        log::info!("Controller ready with layout {}", controller.state.layout_mode);
        controller
    }

    fn flags(&self) -> TransportFlags {
        TransportFlags {
            loop_enabled: self.state.loop_enabled,
            muted: self.state.is_muted,
        }
    }

    pub fn state(&self) -> AppState {
        self.state
    }

    pub fn panes(&self) -> &[PaneController; PANE_COUNT] {
        &self.panes
    }

    pub fn pane(&self, index: usize) -> Option<&PaneController> {
        self.panes.get(index)
    }

    pub fn pane_mut(&mut self, index: usize) -> Option<&mut PaneController> {
        self.panes.get_mut(index)
    }

    pub fn layout_mode(&self) -> LayoutMode {
        self.state.layout_mode
    }

    pub fn geometry(&self) -> LayoutGeometry {
        self.state.layout_mode.geometry()
    }

    pub fn play_button_label(&self) -> &'static str {
        if self.state.global_playing {
            "Pause All"
        } else {
            "Play All"
        }
    }

    pub fn loop_button_label(&self) -> &'static str {
        if self.state.loop_enabled {
            "Loop On"
        } else {
            "Loop Off"
        }
    }

    pub fn mute_button_label(&self) -> &'static str {
        if self.state.is_muted {
            "Unmute"
        } else {
            "Mute"
        }
    }

    // -------------------------------------------------------------------------
    // Per-pane commands
    // -------------------------------------------------------------------------

    pub fn load(&mut self, index: usize, path: &Path) -> Result<(), PaneError> {
        let flags = self.flags();
        match self.panes.get_mut(index) {
            Some(pane) => pane.load(path, flags),
            None => {
                log::warn!("Ignoring load for unknown pane {}", index);
                Ok(())
            }
        }
    }

    pub fn seek(&mut self, index: usize, target: f64) -> Result<(), PaneError> {
        let flags = self.flags();
        match self.panes.get_mut(index) {
            Some(pane) => pane.seek(target, flags),
            None => Ok(()),
        }
    }

    pub fn set_volume(&mut self, index: usize, level: f64) -> Result<(), PaneError> {
        let flags = self.flags();
        match self.panes.get_mut(index) {
            Some(pane) => pane.set_volume(level, flags),
            None => Ok(()),
        }
    }

    // -------------------------------------------------------------------------
    // Global commands
    // -------------------------------------------------------------------------

    pub fn toggle_play_all(&mut self) {
        self.state.global_playing = !self.state.global_playing;
        let playing = self.state.global_playing;
        let flags = self.flags();

        for pane in self.panes.iter_mut().filter(|pane| pane.has_media()) {
            if let Err(e) = pane.toggle_play(playing, flags) {
                log::error!("{}", e);
            }
        }
        log::info!("{} all panes", if playing { "Playing" } else { "Paused" });
    }

    /// Drops back to not-playing once every pane with media has ended.
    /// Returns `true` if the aggregate state changed.
    pub fn check_all_ended(&mut self) -> bool {
        let all_ended = self
            .panes
            .iter()
            .all(|pane| !pane.has_media() || pane.has_ended());

        if all_ended && self.state.global_playing {
            self.state.global_playing = false;
            log::info!("All videos ended, back to Play All");
            return true;
        }
        false
    }

    pub fn toggle_loop_all(&mut self) {
        self.state.loop_enabled = !self.state.loop_enabled;
        let flags = self.flags();
        for pane in self.panes.iter_mut() {
            if let Err(e) = pane.toggle_loop(flags) {
                log::error!("{}", e);
            }
        }
        log::info!("Loop {}", if flags.loop_enabled { "on" } else { "off" });
    }

    pub fn toggle_mute_all(&mut self) {
        self.state.is_muted = !self.state.is_muted;
        let flags = self.flags();
        for pane in self.panes.iter_mut() {
            if let Err(e) = pane.apply_mute(flags) {
                log::error!("{}", e);
            }
        }
        log::info!("{} all panes", if flags.muted { "Muted" } else { "Unmuted" });
    }

    pub fn reset_all(&mut self) {
        let flags = self.flags();
        for pane in self.panes.iter_mut().filter(|pane| pane.has_media()) {
            if let Err(e) = pane.reset(flags) {
                log::error!("{}", e);
            }
        }
        self.state.global_playing = false;
        log::info!("Reset all panes");
    }

    /// Advances to the next layout. Returns the window size to apply, or
    /// `None` while fullscreen.
    pub fn cycle_layout(&mut self) -> Option<WindowSize> {
        self.state.layout_mode = self.state.layout_mode.next();
        log::info!("Switched to {} layout", self.state.layout_mode);
        (!self.state.fullscreen).then(|| self.state.layout_mode.window_size())
    }

    /// Returns the new fullscreen state.
    pub fn toggle_fullscreen(&mut self) -> bool {
        self.state.fullscreen = !self.state.fullscreen;
        log::info!("Fullscreen {}", if self.state.fullscreen { "on" } else { "off" });
        self.state.fullscreen
    }

    /// Returns `true` if fullscreen was active.
    pub fn exit_fullscreen(&mut self) -> bool {
        if !self.state.fullscreen {
            return false;
        }
        self.state.fullscreen = false;
        log::info!("Fullscreen off");
        true
    }

    // -------------------------------------------------------------------------
    // Event loop hooks
    // -------------------------------------------------------------------------

    /// Routes queued engine notifications to their panes. Notifications from
    /// engines that have since been replaced are discarded.
    pub fn dispatch_notifications(&mut self) -> usize {
        let mut handled = 0;
        loop {
            match self.notifications.try_recv() {
                Ok(notification) => {
                    if self.handle_notification(notification) {
                        handled += 1;
                    }
                }
                Err(TryRecvError::Lagged(skipped)) => {
                    log::warn!("Dropped {} engine notifications", skipped);
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => break,
            }
        }
        handled
    }

    fn handle_notification(&mut self, notification: EngineNotification) -> bool {
        let flags = self.flags();
        let Some(pane) = self.panes.get_mut(notification.pane) else {
            log::warn!("Notification for unknown pane {}", notification.pane);
            return false;
        };
        if notification.generation != pane.generation() || !pane.has_engine() {
            log::debug!(
                "Discarding stale notification for pane {} (generation {}, current {})",
                notification.pane,
                notification.generation,
                pane.generation()
            );
            return false;
        }

        match notification.event {
            EngineEvent::PlaybackTerminated(reason) => match pane.on_playback_terminated(reason, flags) {
                Ok(true) => {
                    self.check_all_ended();
                }
                Ok(false) => {}
                Err(e) => log::error!("{}", e),
            },
        }
        true
    }

    /// Reads positions of playing panes into their seek sliders. Per-pane
    /// failures never stop the schedule.
    pub fn poll_progress(&mut self) {
        for pane in self.panes.iter_mut() {
            pane.poll_progress();
        }
    }

    /// Called once per GUI frame. Returns how long the GUI may wait before
    /// the next progress poll.
    pub fn tick(&mut self, now: Instant) -> Option<Duration> {
        self.dispatch_notifications();
        if self.progress_timer.is_due(now) {
            self.poll_progress();
            self.progress_timer.reschedule(now);
        }
        self.progress_timer.time_until_due(now)
    }

    pub fn shutdown(&mut self) {
        self.progress_timer.cancel();
        for pane in self.panes.iter_mut() {
            pane.shutdown();
        }
        log::info!("All engines terminated");
    }
}
