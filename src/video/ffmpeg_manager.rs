use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};
use std::sync::OnceLock;

use crate::core::{AppConfig, EngineError, EngineResult};
use crate::video::{rgb_to_rgba, EngineOptions, VideoFrame};

/// Every pane renders at this height; width follows the source aspect ratio.
pub const DISPLAY_HEIGHT: u32 = 360;
pub const AUDIO_SAMPLE_RATE: u32 = 48_000;
pub const AUDIO_CHANNELS: u16 = 2;

/// Stream facts gathered by ffprobe when a file is loaded.
#[derive(Debug, Clone, PartialEq)]
pub struct MediaInfo {
    pub duration: Option<f64>,
    pub frame_rate: f64,
    pub width: u32,
    pub height: u32,
    pub has_audio: bool,
}

impl MediaInfo {
    /// Output size of the rawvideo stream, kept even for the scaler.
    pub fn display_size(&self) -> (u32, u32) {
        let aspect = if self.height > 0 {
            self.width as f64 / self.height as f64
        } else {
            16.0 / 9.0
        };
        let width = ((DISPLAY_HEIGHT as f64 * aspect).round() as u32).max(2) & !1;
        (width, DISPLAY_HEIGHT)
    }

    pub fn playback_fps(&self) -> f64 {
        self.frame_rate.clamp(1.0, 60.0)
    }
}

/// Locations of the ffmpeg binaries plus cached capability probes.
#[derive(Debug)]
pub struct FfmpegTools {
    ffmpeg: PathBuf,
    ffprobe: PathBuf,
    runnable: OnceLock<bool>,
    hwaccels: OnceLock<Vec<String>>,
}

impl FfmpegTools {
    pub fn new(ffmpeg: PathBuf, ffprobe: PathBuf) -> Self {
        Self {
            ffmpeg,
            ffprobe,
            runnable: OnceLock::new(),
            hwaccels: OnceLock::new(),
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(config.ffmpeg_program(), config.ffprobe_program())
    }

    fn execute(program: &Path, command: &mut Command) -> EngineResult<Output> {
        command
            .stdin(Stdio::null())
            .output()
            .map_err(|source| EngineError::Spawn {
                program: program.display().to_string(),
                source,
            })
    }

    fn is_runnable(&self) -> bool {
        *self.runnable.get_or_init(|| {
            let mut command = Command::new(&self.ffmpeg);
            command.args(["-hide_banner", "-version"]);
            match Self::execute(&self.ffmpeg, &mut command) {
                Ok(output) => output.status.success(),
                Err(e) => {
                    log::error!("ffmpeg is not runnable: {}", e);
                    false
                }
            }
        })
    }

    fn hwaccels(&self) -> &[String] {
        self.hwaccels.get_or_init(|| {
            let mut command = Command::new(&self.ffmpeg);
            command.args(["-hide_banner", "-hwaccels"]);
            match Self::execute(&self.ffmpeg, &mut command) {
                Ok(output) => {
                    let methods = parse_hwaccels(&String::from_utf8_lossy(&output.stdout));
                    log::info!("Available ffmpeg hardware accelerators: {:?}", methods);
                    methods
                }
                Err(e) => {
                    log::warn!("Could not list ffmpeg hardware accelerators: {}", e);
                    Vec::new()
                }
            }
        })
    }

    /// Fails unless `backend` can drive an engine on this machine.
    pub fn ensure_backend(&self, backend: &str) -> EngineResult<()> {
        if !self.is_runnable() {
            return Err(EngineError::UnsupportedBackend(backend.to_string()));
        }
        match backend {
            "auto" | "none" => Ok(()),
            other if self.hwaccels().iter().any(|method| method == other) => Ok(()),
            other => Err(EngineError::UnsupportedBackend(other.to_string())),
        }
    }

    pub fn probe(&self, path: &Path) -> EngineResult<MediaInfo> {
        let mut command = Command::new(&self.ffprobe);
        command
            .args(["-v", "quiet", "-print_format", "json", "-show_format", "-show_streams"])
            .arg(path);
        let output = Self::execute(&self.ffprobe, &mut command)?;

        if !output.status.success() {
            log::error!(
                "ffprobe failed for {}: {}",
                path.display(),
                String::from_utf8_lossy(&output.stderr)
            );
            return Err(EngineError::Probe(format!("ffprobe exited with {}", output.status)));
        }

        let json: serde_json::Value = serde_json::from_slice(&output.stdout)
            .map_err(|e| EngineError::Probe(format!("invalid ffprobe output: {}", e)))?;
        parse_probe_output(&json)
    }

    /// Continuous playback stream: rawvideo on stdout, f32le audio on stderr.
    /// Builds the playback stream: rawvideo on stdout and, when `with_audio`
    /// is set, f32le samples on stderr.
    pub fn stream_command(
        &self,
        path: &Path,
        start: f64,
        info: &MediaInfo,
        options: &EngineOptions,
        with_audio: bool,
    ) -> Command {
        let (width, height) = info.display_size();
        let mut cmd = Command::new(&self.ffmpeg);

        if options.hardware_decoding && options.backend != "none" {
            cmd.arg("-hwaccel").arg(&options.backend);
        }
        if !options.precise_seek {
            cmd.arg("-noaccurate_seek");
        }
        cmd.arg("-ss").arg(format!("{:.3}", start));
        cmd.arg("-i").arg(path);

        cmd.arg("-map").arg("0:v:0");
        cmd.arg("-f").arg("rawvideo");
        cmd.arg("-pix_fmt").arg("rgb24");
        cmd.arg("-s").arg(format!("{}x{}", width, height));
        cmd.arg("-r").arg(format!("{:.3}", info.playback_fps()));
        cmd.arg("pipe:1");

        if with_audio && info.has_audio {
            cmd.arg("-map").arg("0:a:0");
            cmd.arg("-f").arg("f32le");
            cmd.arg("-ac").arg(AUDIO_CHANNELS.to_string());
            cmd.arg("-ar").arg(AUDIO_SAMPLE_RATE.to_string());
            cmd.arg("pipe:2");
        }

        cmd.arg("-loglevel").arg("quiet");
        cmd.arg("-nostdin");
        cmd.stdin(Stdio::null()).stdout(Stdio::piped()).stderr(Stdio::piped());
        cmd
    }

    /// Decodes one frame at `timestamp`, used for the still shown after a
    /// load or a paused seek.
    pub fn extract_frame(&self, path: &Path, timestamp: f64, info: &MediaInfo) -> EngineResult<VideoFrame> {
        let (width, height) = info.display_size();
        let mut command = Command::new(&self.ffmpeg);
        command
            .arg("-ss").arg(format!("{:.3}", timestamp))
            .arg("-i").arg(path)
            .args(["-vframes", "1", "-f", "rawvideo", "-pix_fmt", "rgb24"])
            .arg("-s").arg(format!("{}x{}", width, height))
            .args(["-loglevel", "quiet", "-"]);
        let output = Self::execute(&self.ffmpeg, &mut command)?;

        let expected = (width * height * 3) as usize;
        if !output.status.success() || output.stdout.len() != expected {
            return Err(EngineError::Probe(format!(
                "frame extraction returned {} bytes (expected {})",
                output.stdout.len(),
                expected
            )));
        }

        Ok(VideoFrame {
            image_data: rgb_to_rgba(&output.stdout),
            width,
            height,
            timestamp,
        })
    }
}

fn parse_hwaccels(listing: &str) -> Vec<String> {
    listing
        .lines()
        .skip_while(|line| !line.starts_with("Hardware acceleration methods"))
        .skip(1)
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

fn parse_frame_rate(text: &str) -> Option<f64> {
    let rate = match text.split_once('/') {
        Some((num, den)) => {
            let num: f64 = num.parse().ok()?;
            let den: f64 = den.parse().ok()?;
            if den == 0.0 {
                return None;
            }
            num / den
        }
        None => text.parse().ok()?,
    };
    (rate.is_finite() && rate > 0.0).then_some(rate)
}

fn parse_probe_output(json: &serde_json::Value) -> EngineResult<MediaInfo> {
    let empty = Vec::new();
    let streams = json["streams"].as_array().unwrap_or(&empty);
    let video = streams
        .iter()
        .find(|s| s["codec_type"] == "video")
        .ok_or_else(|| EngineError::Probe("no video stream found".to_string()))?;
    let has_audio = streams.iter().any(|s| s["codec_type"] == "audio");

    let duration = json["format"]["duration"]
        .as_str()
        .or_else(|| video["duration"].as_str())
        .and_then(|s| s.parse::<f64>().ok())
        .filter(|d| d.is_finite() && *d > 0.0);

    let frame_rate = video["avg_frame_rate"]
        .as_str()
        .and_then(parse_frame_rate)
        .or_else(|| video["r_frame_rate"].as_str().and_then(parse_frame_rate))
        .unwrap_or(30.0);

    Ok(MediaInfo {
        duration,
        frame_rate,
        width: video["width"].as_u64().unwrap_or(1920) as u32,
        height: video["height"].as_u64().unwrap_or(1080) as u32,
        has_audio,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_hwaccels_listing() {
        let listing = "Hardware acceleration methods:\nvdpau\ncuda\nvaapi\n\n";
        assert_eq!(parse_hwaccels(listing), vec!["vdpau", "cuda", "vaapi"]);
        assert!(parse_hwaccels("").is_empty());
    }

    #[test]
    fn test_parse_frame_rate() {
        assert_eq!(parse_frame_rate("30/1"), Some(30.0));
        assert!((parse_frame_rate("30000/1001").unwrap() - 29.97).abs() < 0.01);
        assert_eq!(parse_frame_rate("0/0"), None);
        assert_eq!(parse_frame_rate("25"), Some(25.0));
    }

    #[test]
    fn test_parse_probe_output() {
        let json = serde_json::json!({
            "format": { "duration": "10.000000" },
            "streams": [
                { "codec_type": "video", "width": 1280, "height": 720, "avg_frame_rate": "24/1" },
                { "codec_type": "audio" }
            ]
        });
        let info = parse_probe_output(&json).expect("probe parses");
        assert_eq!(info.duration, Some(10.0));
        assert_eq!(info.frame_rate, 24.0);
        assert!(info.has_audio);
        assert_eq!(info.display_size(), (640, 360));
    }

    #[test]
    fn test_probe_without_video_stream_fails() {
        let json = serde_json::json!({
            "format": { "duration": "3.0" },
            "streams": [ { "codec_type": "audio" } ]
        });
        assert!(matches!(parse_probe_output(&json), Err(EngineError::Probe(_))));
    }

    #[test]
    fn test_gif_without_duration() {
        let json = serde_json::json!({
            "format": {},
            "streams": [ { "codec_type": "video", "width": 300, "height": 200, "r_frame_rate": "10/1" } ]
        });
        let info = parse_probe_output(&json).expect("probe parses");
        assert_eq!(info.duration, None);
        assert!(!info.has_audio);
        assert_eq!(info.display_size(), (540, 360));
    }

    fn stream_args(info: &MediaInfo, with_audio: bool) -> Vec<String> {
        let tools = FfmpegTools::new(PathBuf::from("ffmpeg"), PathBuf::from("ffprobe"));
        let options = EngineOptions {
            backend: "none".to_string(),
            hardware_decoding: false,
            keep_open: true,
            idle: true,
            precise_seek: true,
            initial_volume: 50.0,
        };
        tools
            .stream_command(Path::new("/videos/clip.mp4"), 2.0, info, &options, with_audio)
            .get_args()
            .map(|arg| arg.to_string_lossy().into_owned())
            .collect()
    }

    #[test]
    fn test_stream_command_leaves_out_audio_without_consumer() {
        let info = MediaInfo {
            duration: Some(10.0),
            frame_rate: 30.0,
            width: 1280,
            height: 720,
            has_audio: true,
        };

        let with_audio = stream_args(&info, true);
        assert!(with_audio.iter().any(|arg| arg == "pipe:2"));
        assert!(with_audio.iter().any(|arg| arg == "0:a:0"));

        let video_only = stream_args(&info, false);
        assert!(!video_only.iter().any(|arg| arg == "pipe:2"));
        assert!(!video_only.iter().any(|arg| arg == "0:a:0"));
        assert!(video_only.iter().any(|arg| arg == "pipe:1"));
    }
}
