pub mod audio;
pub mod engine;
pub mod ffmpeg_engine;
pub mod ffmpeg_manager;

#[cfg(test)]
pub mod fake_engine;

pub use engine::*;
pub use ffmpeg_engine::FfmpegEngineFactory;
pub use ffmpeg_manager::FfmpegTools;
