mod core;
mod gui;
mod hotkeys;
mod playback;
mod video;

use std::sync::Arc;

use eframe::egui;

use crate::core::AppConfig;
use crate::gui::SimulPlayerApp;
use crate::video::{EngineFactory, FfmpegEngineFactory, FfmpegTools};

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = AppConfig::load().unwrap_or_else(|e| {
        log::warn!("Failed to load config, using defaults: {}", e);
        AppConfig::default()
    });

    let tools = Arc::new(FfmpegTools::from_config(&config));
    let factory: Arc<dyn EngineFactory> = Arc::new(FfmpegEngineFactory::new(tools));

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size(config.initial_layout.window_size().to_vec2())
            .with_title(format!("Simul PB v{}", env!("CARGO_PKG_VERSION")))
            .with_drag_and_drop(true),
        ..Default::default()
    };

    eframe::run_native(
        "Simul PB",
        options,
        Box::new(move |cc| match SimulPlayerApp::new(cc, config, factory) {
            Ok(app) => Ok(Box::new(app)),
            Err(e) => {
                log::error!("Failed to initialize app: {}", e);
                Err(e.into())
            }
        }),
    )
    .map_err(|e| anyhow::anyhow!("Failed to run app: {}", e))?;

    Ok(())
}
