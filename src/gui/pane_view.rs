use eframe::egui;

use crate::playback::{PaneController, PaneDisplay};
use crate::video::VideoFrame;

const CONTROLS_HEIGHT: f32 = 56.0;

/// What the user asked a pane to do this frame.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PaneIntent {
    pub drag_to: Option<f64>,
    pub seek_to: Option<f64>,
    pub volume: Option<f64>,
    pub open_dialog: bool,
}

/// Rendering state for one pane: the uploaded frame texture and where the
/// pane was drawn last frame (used to target drops).
pub struct PaneView {
    index: usize,
    texture: Option<egui::TextureHandle>,
    pub rect: Option<egui::Rect>,
}

impl PaneView {
    pub fn new(index: usize) -> Self {
        Self {
            index,
            texture: None,
            rect: None,
        }
    }

    pub fn update_texture(&mut self, ctx: &egui::Context, frame: VideoFrame) {
        if frame.image_data.len() != (frame.width * frame.height * 4) as usize {
            log::debug!("Pane {}: skipping malformed frame", self.index);
            return;
        }
        let image = egui::ColorImage::from_rgba_unmultiplied(
            [frame.width as usize, frame.height as usize],
            &frame.image_data,
        );
        match &mut self.texture {
            Some(texture) => texture.set(image, egui::TextureOptions::LINEAR),
            None => {
                self.texture = Some(ctx.load_texture(
                    format!("pane_{}_frame", self.index),
                    image,
                    egui::TextureOptions::LINEAR,
                ));
            }
        }
    }

    pub fn show(&mut self, ui: &mut egui::Ui, pane: &PaneController, muted: bool) -> PaneIntent {
        let mut intent = PaneIntent::default();

        let video_size = egui::vec2(
            ui.available_width(),
            (ui.available_height() - CONTROLS_HEIGHT).max(40.0),
        );
        let (video_rect, _) = ui.allocate_exact_size(video_size, egui::Sense::hover());
        self.paint_video(ui, video_rect, pane);

        ui.horizontal(|ui| {
            let slider = pane.seek_slider();
            let mut value = slider.value;
            ui.spacing_mut().slider_width = (ui.available_width() - 90.0).max(40.0);
            let response = ui.add_enabled(
                slider.enabled,
                egui::Slider::new(&mut value, 0.0..=slider.max).show_value(false),
            );
            if response.changed() {
                intent.drag_to = Some(value);
            }
            // Seek on release, or straight away for clicks and keyboard input
            if response.drag_stopped() || (response.changed() && !response.dragged()) {
                intent.seek_to = Some(value);
            }
            ui.label(egui::RichText::new(pane.status_line()).small());
        });

        ui.horizontal(|ui| {
            ui.label(egui::RichText::new(pane.volume_label()).small());
            let mut volume = pane.volume_level();
            ui.spacing_mut().slider_width = 100.0;
            let response = ui.add_enabled(
                !muted,
                egui::Slider::new(&mut volume, 0.0..=100.0).show_value(false),
            );
            if response.changed() {
                intent.volume = Some(volume.round());
            }
            if ui.small_button("Open…").clicked() {
                intent.open_dialog = true;
            }
        });

        intent
    }

    fn paint_video(&self, ui: &egui::Ui, rect: egui::Rect, pane: &PaneController) {
        let painter = ui.painter_at(rect);
        painter.rect_filled(rect, egui::Rounding::same(4.0), egui::Color32::BLACK);

        if let (Some(texture), PaneDisplay::Loaded(_)) = (&self.texture, pane.display()) {
            if pane.has_media() {
                let fitted = fit_rect(rect, texture.size_vec2());
                let uv = egui::Rect::from_min_max(egui::pos2(0.0, 0.0), egui::pos2(1.0, 1.0));
                painter.image(texture.id(), fitted, uv, egui::Color32::WHITE);
                return;
            }
        }

        let color = if pane.display().is_error() {
            egui::Color32::from_rgb(230, 90, 90)
        } else {
            egui::Color32::GRAY
        };
        painter.text(
            rect.center(),
            egui::Align2::CENTER_CENTER,
            pane.display().text(),
            egui::FontId::proportional(14.0),
            color,
        );
    }
}

/// Largest rect with the frame's aspect ratio centered inside `outer`.
pub fn fit_rect(outer: egui::Rect, frame: egui::Vec2) -> egui::Rect {
    if frame.x <= 0.0 || frame.y <= 0.0 {
        return outer;
    }
    let scale = (outer.width() / frame.x).min(outer.height() / frame.y);
    egui::Rect::from_center_size(outer.center(), frame * scale)
}
