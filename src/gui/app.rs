use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use eframe::egui;
use tokio::sync::broadcast;

use crate::core::media::{normalize_drop_payload, VIDEO_EXTENSIONS};
use crate::core::AppConfig;
use crate::gui::pane_view::{PaneIntent, PaneView};
use crate::hotkeys::{ShortcutAction, ShortcutManager};
use crate::playback::{AppController, PaneError, PANE_COUNT};
use crate::video::EngineFactory;

const PANE_SPACING: f32 = 6.0;
const PLAYING_REPAINT: Duration = Duration::from_millis(16);
const IDLE_REPAINT: Duration = Duration::from_millis(500);

pub struct SimulPlayerApp {
    pub config: AppConfig,
    pub controller: AppController,
    views: [PaneView; PANE_COUNT],
    shortcut_manager: ShortcutManager,
    shortcut_receiver: broadcast::Receiver<ShortcutAction>,
}

impl SimulPlayerApp {
    pub fn new(
        cc: &eframe::CreationContext<'_>,
        config: AppConfig,
        factory: Arc<dyn EngineFactory>,
    ) -> anyhow::Result<Self> {
        let mut visuals = egui::Visuals::dark();
        visuals.override_text_color = Some(egui::Color32::WHITE);
        cc.egui_ctx.set_visuals(visuals);

        let (shortcut_manager, shortcut_receiver) = ShortcutManager::with_fallback(&config.key_bindings);
        let controller = AppController::new(factory, &config);

        Ok(Self {
            config,
            controller,
            views: std::array::from_fn(PaneView::new),
            shortcut_manager,
            shortcut_receiver,
        })
    }

    fn process_shortcuts(&mut self, ctx: &egui::Context) {
        ctx.input(|input| self.shortcut_manager.process_input(input));

        loop {
            match self.shortcut_receiver.try_recv() {
                Ok(ShortcutAction::ToggleFullscreen) => {
                    let fullscreen = self.controller.toggle_fullscreen();
                    self.apply_fullscreen(ctx, fullscreen);
                }
                Ok(ShortcutAction::ExitFullscreen) => {
                    if self.controller.exit_fullscreen() {
                        self.apply_fullscreen(ctx, false);
                    }
                }
                Err(broadcast::error::TryRecvError::Lagged(skipped)) => {
                    log::warn!("Skipped {} shortcut events", skipped);
                }
                Err(_) => break,
            }
        }
    }

    fn apply_fullscreen(&self, ctx: &egui::Context, fullscreen: bool) {
        ctx.send_viewport_cmd(egui::ViewportCommand::Fullscreen(fullscreen));
        if !fullscreen {
            // The layout may have changed while fullscreen
            let size = self.controller.layout_mode().window_size();
            ctx.send_viewport_cmd(egui::ViewportCommand::InnerSize(size.to_vec2()));
        }
    }

    fn process_dropped_files(&mut self, ctx: &egui::Context) {
        let (files, pointer) = ctx.input(|i| (i.raw.dropped_files.clone(), i.pointer.hover_pos()));
        if files.is_empty() {
            return;
        }

        let paths: Vec<PathBuf> = files.iter().filter_map(dropped_path).collect();
        let visible = self.controller.layout_mode().visible_panes();
        let cells: Vec<(usize, egui::Rect)> = self
            .views
            .iter()
            .enumerate()
            .take(visible)
            .filter_map(|(index, view)| view.rect.map(|rect| (index, rect)))
            .collect();
        let has_media: Vec<bool> = self.controller.panes().iter().map(|pane| pane.has_media()).collect();
        let target = pick_drop_target(pointer, &cells, &has_media);

        for (offset, path) in paths.into_iter().enumerate() {
            let index = target + offset;
            if index >= visible {
                log::warn!("No free pane for dropped file {}", path.display());
                break;
            }
            log::info!("Dropped {} onto pane {}", path.display(), index);
            report(self.controller.load(index, &path));
        }
    }

    fn upload_frames(&mut self, ctx: &egui::Context) {
        for (index, view) in self.views.iter_mut().enumerate() {
            if let Some(frame) = self.controller.pane_mut(index).and_then(|pane| pane.take_frame()) {
                view.update_texture(ctx, frame);
            }
        }
    }

    fn show_transport(&mut self, ctx: &egui::Context, ui: &mut egui::Ui) {
        ui.horizontal(|ui| {
            if ui.button(self.controller.play_button_label()).clicked() {
                self.controller.toggle_play_all();
            }
            if ui.button(self.controller.loop_button_label()).clicked() {
                self.controller.toggle_loop_all();
            }
            if ui.button(self.controller.mute_button_label()).clicked() {
                self.controller.toggle_mute_all();
            }
            if ui.button("Change Layout").clicked() {
                if let Some(size) = self.controller.cycle_layout() {
                    ctx.send_viewport_cmd(egui::ViewportCommand::InnerSize(size.to_vec2()));
                }
            }
            if ui.button("Reset").clicked() {
                self.controller.reset_all();
            }

            ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                ui.label(
                    egui::RichText::new(self.controller.layout_mode().label())
                        .small()
                        .color(egui::Color32::GRAY),
                );
            });
        });
    }

    fn show_panes(&mut self, ui: &mut egui::Ui) {
        let geometry = self.controller.geometry();
        let available = ui.available_rect_before_wrap();
        let columns = geometry.columns.max(1) as f32;
        let rows = geometry.rows.max(1) as f32;
        let cell_size = egui::vec2(
            (available.width() - PANE_SPACING * (columns - 1.0)) / columns,
            (available.height() - PANE_SPACING * (rows - 1.0)) / rows,
        );
        let muted = self.controller.state().is_muted;

        for view in self.views.iter_mut() {
            view.rect = None;
        }

        let mut intents = Vec::new();
        for (index, cell) in geometry.cells.iter().enumerate() {
            let Some(pane) = self.controller.pane(index) else {
                continue;
            };
            let min = available.min
                + egui::vec2(
                    cell.column as f32 * (cell_size.x + PANE_SPACING),
                    cell.row as f32 * (cell_size.y + PANE_SPACING),
                );
            let rect = egui::Rect::from_min_size(min, cell_size);
            let view = &mut self.views[index];
            view.rect = Some(rect);

            let intent = ui
                .allocate_ui_at_rect(rect, |ui| view.show(ui, pane, muted))
                .inner;
            intents.push((index, intent));
        }

        for (index, intent) in intents {
            self.apply_intent(index, intent);
        }
    }

    fn apply_intent(&mut self, index: usize, intent: PaneIntent) {
        if let Some(value) = intent.drag_to {
            if let Some(pane) = self.controller.pane_mut(index) {
                pane.drag_seek_slider(value);
            }
        }
        if let Some(target) = intent.seek_to {
            report(self.controller.seek(index, target));
        }
        if let Some(level) = intent.volume {
            report(self.controller.set_volume(index, level));
        }
        if intent.open_dialog {
            if let Some(path) = rfd::FileDialog::new()
                .add_filter("Video", &VIDEO_EXTENSIONS)
                .pick_file()
            {
                report(self.controller.load(index, &path));
            }
        }
    }
}

impl eframe::App for SimulPlayerApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        let until_poll = self.controller.tick(Instant::now());

        self.process_shortcuts(ctx);
        self.process_dropped_files(ctx);
        self.upload_frames(ctx);

        egui::TopBottomPanel::bottom("transport").show(ctx, |ui| {
            ui.add_space(4.0);
            self.show_transport(ctx, ui);
            ui.add_space(4.0);
        });

        egui::CentralPanel::default().show(ctx, |ui| {
            self.show_panes(ui);
        });

        // Frames arrive from engine threads, so keep painting while playing
        let repaint = if self.controller.state().global_playing {
            PLAYING_REPAINT
        } else {
            until_poll.map_or(IDLE_REPAINT, |wait| wait.min(IDLE_REPAINT))
        };
        ctx.request_repaint_after(repaint);
    }

    fn on_exit(&mut self, _gl: Option<&eframe::glow::Context>) {
        self.controller.shutdown();

        if self.config.remember_layout {
            self.config.initial_layout = self.controller.layout_mode();
            if let Err(e) = self.config.save() {
                log::error!("Failed to save layout: {}", e);
            }
        }
    }
}

/// Resolves the local path of a dropped item. A native path is taken as-is;
/// only the name fallback (a URI or brace-wrapped payload) is decoded.
pub fn dropped_path(file: &egui::DroppedFile) -> Option<PathBuf> {
    match &file.path {
        Some(path) => Some(path.clone()),
        None if !file.name.trim().is_empty() => Some(normalize_drop_payload(&file.name)),
        None => None,
    }
}

/// Pane that receives a drop: the visible pane under the pointer, otherwise
/// the first empty visible pane, otherwise pane 0.
pub fn pick_drop_target(
    pointer: Option<egui::Pos2>,
    cells: &[(usize, egui::Rect)],
    has_media: &[bool],
) -> usize {
    if let Some(pos) = pointer {
        if let Some((index, _)) = cells.iter().find(|(_, rect)| rect.contains(pos)) {
            return *index;
        }
    }

    cells
        .iter()
        .map(|(index, _)| *index)
        .find(|index| !has_media.get(*index).copied().unwrap_or(false))
        .unwrap_or(0)
}

fn report(result: Result<(), PaneError>) {
    if let Err(e) = result {
        log::warn!("{}", e);
    }
}
