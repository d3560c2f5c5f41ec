// =============================================================================
// FFMPEG PLAYER ENGINE
// =============================================================================
//
// One engine per pane. A dedicated playback thread owns the ffmpeg process,
// the reader threads and the rodio sink; the pane only ever touches the
// command channel and the shared property block.
//
// - ffmpeg writes rawvideo to stdout and f32le audio to stderr
// - readers block when their buffers are full, which paces ffmpeg itself
// - frames are released against a wall clock started at play/seek
// - end of stream either loops, holds the last frame (keep-open) or unloads
//
// =============================================================================

use std::collections::{HashSet, VecDeque};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdout};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{mpsc, Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use rodio::{OutputStream, OutputStreamHandle, Sink};

use crate::core::{EngineError, EngineResult};
use crate::video::audio::{AudioBuffer, StreamingAudioSource};
use crate::video::ffmpeg_manager::{FfmpegTools, MediaInfo, AUDIO_CHANNELS, AUDIO_SAMPLE_RATE};
use crate::video::{
    rgb_to_rgba, EngineEvent, EngineFactory, EngineOptions, Notifier, ObservedProperty, PlayerEngine,
    SeekReference, TerminationReason, VideoFrame,
};

/// Decoded frames held ahead of the playback clock
const MAX_BUFFERED_FRAMES: usize = 30;
/// Two seconds of stereo audio
const AUDIO_BUFFER_SAMPLES: usize = AUDIO_SAMPLE_RATE as usize * AUDIO_CHANNELS as usize * 2;
/// How long `terminate` waits for the playback thread before detaching it
const TERMINATE_GRACE: Duration = Duration::from_millis(50);
/// A full audio ring that does not drain for this long has no consumer.
const AUDIO_STALL_LIMIT: Duration = Duration::from_millis(250);

#[derive(Debug)]
enum EngineCommand {
    Load { path: PathBuf, serial: u64 },
    SetPause(bool),
    SetVolume(f64),
    SetLoop(bool),
    Seek(f64),
    Shutdown,
}

/// Property block mirrored between the pane and the playback thread
#[derive(Debug, Clone, Default)]
struct EngineProperties {
    pause: bool,
    volume: f64,
    loop_file: bool,
    time_pos: Option<f64>,
    duration: Option<f64>,
    filename: Option<String>,
    idle_active: bool,
    core_shutdown: bool,
    failure: Option<String>,
    requested_load: u64,
    completed_load: u64,
}

struct Shared {
    props: Mutex<EngineProperties>,
    load_finished: Condvar,
    observed: Mutex<HashSet<ObservedProperty>>,
    notifier: Notifier,
}

impl Shared {
    fn props(&self) -> MutexGuard<'_, EngineProperties> {
        self.props.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn observed(&self) -> MutexGuard<'_, HashSet<ObservedProperty>> {
        self.observed.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn emit(&self, reason: TerminationReason) {
        if self.observed().contains(&reason.property()) {
            log::debug!("Pane {} engine reports {:?}", self.notifier.pane(), reason);
            self.notifier.notify(EngineEvent::PlaybackTerminated(reason));
        }
    }

    fn fail(&self, reason: String) {
        log::error!("Pane {} engine invalidated: {}", self.notifier.pane(), reason);
        self.props().failure = Some(reason);
    }
}

pub struct FfmpegEngine {
    backend: String,
    shared: Arc<Shared>,
    command_sender: mpsc::Sender<EngineCommand>,
    frame_receiver: mpsc::Receiver<VideoFrame>,
    thread_handle: Option<JoinHandle<()>>,
    load_serial: u64,
}

impl FfmpegEngine {
    pub fn spawn(tools: Arc<FfmpegTools>, options: EngineOptions, notifier: Notifier) -> EngineResult<Self> {
        let pane = notifier.pane();
        let shared = Arc::new(Shared {
            props: Mutex::new(EngineProperties {
                pause: true,
                volume: options.initial_volume,
                idle_active: true,
                ..Default::default()
            }),
            load_finished: Condvar::new(),
            observed: Mutex::new(HashSet::new()),
            notifier,
        });

        let (cmd_tx, cmd_rx) = mpsc::channel();
        let (frame_tx, frame_rx) = mpsc::channel();
        let backend = options.backend.clone();
        let thread_shared = shared.clone();

        let thread_handle = thread::Builder::new()
            .name(format!("pane-{}-playback", pane))
            .spawn(move || playback_thread(tools, options, thread_shared, cmd_rx, frame_tx))
            .map_err(|source| EngineError::Spawn {
                program: "playback thread".to_string(),
                source,
            })?;

        Ok(Self {
            backend,
            shared,
            command_sender: cmd_tx,
            frame_receiver: frame_rx,
            thread_handle: Some(thread_handle),
            load_serial: 0,
        })
    }

    fn check_alive(&self) -> EngineResult<MutexGuard<'_, EngineProperties>> {
        let props = self.shared.props();
        if props.core_shutdown {
            return Err(EngineError::Shutdown);
        }
        if let Some(reason) = &props.failure {
            return Err(EngineError::Invalidated(reason.clone()));
        }
        Ok(props)
    }

    fn send(&self, command: EngineCommand) -> EngineResult<()> {
        self.command_sender.send(command).map_err(|_| {
            self.shared.props().core_shutdown = true;
            EngineError::Shutdown
        })
    }
}

impl PlayerEngine for FfmpegEngine {
    fn backend(&self) -> &str {
        &self.backend
    }

    fn load_file(&mut self, path: &Path) -> EngineResult<()> {
        self.load_serial += 1;
        let serial = self.load_serial;
        self.check_alive()?.requested_load = serial;
        log::info!("Engine ({}) loading {}", self.backend, path.display());
        self.send(EngineCommand::Load {
            path: path.to_path_buf(),
            serial,
        })
    }

    fn wait_until_loaded(&self, timeout: Duration) -> bool {
        let props = self.shared.props();
        let (props, wait) = self
            .shared
            .load_finished
            .wait_timeout_while(props, timeout, |p| {
                p.completed_load < p.requested_load && !p.core_shutdown
            })
            .unwrap_or_else(PoisonError::into_inner);

        if wait.timed_out() {
            log::warn!("Engine ({}) not ready after {:?}", self.backend, timeout);
            return false;
        }
        props.failure.is_none() && !props.core_shutdown && props.filename.is_some()
    }

    fn pause(&self) -> EngineResult<bool> {
        Ok(self.check_alive()?.pause)
    }

    fn set_pause(&mut self, paused: bool) -> EngineResult<()> {
        self.check_alive()?.pause = paused;
        self.send(EngineCommand::SetPause(paused))
    }

    fn volume(&self) -> EngineResult<f64> {
        Ok(self.check_alive()?.volume)
    }

    fn set_volume(&mut self, volume: f64) -> EngineResult<()> {
        let volume = volume.clamp(0.0, 100.0);
        self.check_alive()?.volume = volume;
        self.send(EngineCommand::SetVolume(volume))
    }

    fn loop_file(&self) -> EngineResult<bool> {
        Ok(self.check_alive()?.loop_file)
    }

    fn set_loop_file(&mut self, enabled: bool) -> EngineResult<()> {
        self.check_alive()?.loop_file = enabled;
        self.send(EngineCommand::SetLoop(enabled))
    }

    fn time_pos(&self) -> EngineResult<Option<f64>> {
        Ok(self.check_alive()?.time_pos)
    }

    fn duration(&self) -> EngineResult<Option<f64>> {
        Ok(self.check_alive()?.duration)
    }

    fn filename(&self) -> EngineResult<Option<String>> {
        Ok(self.check_alive()?.filename.clone())
    }

    fn idle_active(&self) -> EngineResult<bool> {
        Ok(self.check_alive()?.idle_active)
    }

    fn core_shutdown(&self) -> bool {
        self.shared.props().core_shutdown
    }

    fn seek(&mut self, target: f64, reference: SeekReference) -> EngineResult<()> {
        let absolute = {
            let mut props = self.check_alive()?;
            if props.filename.is_none() {
                return Err(EngineError::NoMedia);
            }
            let base = match reference {
                SeekReference::Absolute => 0.0,
                SeekReference::Relative => props.time_pos.unwrap_or(0.0),
            };
            let mut absolute = (base + target).max(0.0);
            if let Some(duration) = props.duration {
                absolute = absolute.min(duration);
            }
            props.time_pos = Some(absolute);
            absolute
        };
        self.send(EngineCommand::Seek(absolute))
    }

    fn observe(&mut self, property: ObservedProperty) -> EngineResult<()> {
        drop(self.check_alive()?);
        self.shared.observed().insert(property);
        Ok(())
    }

    fn unobserve(&mut self, property: ObservedProperty) -> EngineResult<()> {
        self.shared.observed().remove(&property);
        Ok(())
    }

    fn take_frame(&mut self) -> Option<VideoFrame> {
        let mut latest = None;
        while let Ok(frame) = self.frame_receiver.try_recv() {
            latest = Some(frame);
        }
        latest
    }

    fn terminate(&mut self) {
        let Some(handle) = self.thread_handle.take() else {
            return;
        };
        log::debug!("Terminating engine ({})", self.backend);
        let _ = self.command_sender.send(EngineCommand::Shutdown);

        // Short grace period on the GUI thread, then let a reaper finish the join
        let deadline = Instant::now() + TERMINATE_GRACE;
        while !handle.is_finished() && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(5));
        }
        if handle.is_finished() {
            if handle.join().is_err() {
                log::warn!("Playback thread ({}) panicked", self.backend);
            }
        } else {
            let backend = self.backend.clone();
            let reaper = thread::Builder::new()
                .name("engine-reaper".to_string())
                .spawn(move || {
                    if handle.join().is_err() {
                        log::warn!("Playback thread ({}) panicked", backend);
                    }
                    log::debug!("Playback thread ({}) reaped", backend);
                });
            if let Err(e) = reaper {
                log::warn!("Could not start reaper for playback thread ({}): {}", self.backend, e);
            }
        }

        {
            let mut props = self.shared.props();
            props.core_shutdown = true;
            props.idle_active = true;
        }
        self.shared.load_finished.notify_all();
    }
}

impl Drop for FfmpegEngine {
    fn drop(&mut self) {
        self.terminate();
    }
}

pub struct FfmpegEngineFactory {
    tools: Arc<FfmpegTools>,
}

impl FfmpegEngineFactory {
    pub fn new(tools: Arc<FfmpegTools>) -> Self {
        Self { tools }
    }
}

impl EngineFactory for FfmpegEngineFactory {
    fn create(&self, options: &EngineOptions, notifier: Notifier) -> EngineResult<Box<dyn PlayerEngine>> {
        self.tools.ensure_backend(&options.backend)?;
        let pane = notifier.pane();
        let engine = FfmpegEngine::spawn(self.tools.clone(), options.clone(), notifier)?;
        log::info!("Created ffmpeg engine for pane {} with backend {}", pane, options.backend);
        Ok(Box::new(engine))
    }
}

// =============================================================================
// PLAYBACK THREAD
// =============================================================================

struct LoadedMedia {
    path: PathBuf,
    info: MediaInfo,
}

struct PlaybackState {
    tools: Arc<FfmpegTools>,
    options: EngineOptions,
    media: Option<LoadedMedia>,
    position: f64,
    is_playing: bool,
    looping: bool,
    volume: f32,

    ffmpeg_process: Option<Child>,
    readers: Vec<JoinHandle<()>>,
    reader_stop: Arc<AtomicBool>,
    video_done: Arc<AtomicBool>,
    frames_read: Arc<AtomicU64>,
    frame_buffer: Arc<Mutex<VecDeque<VideoFrame>>>,

    audio_buffer: Arc<Mutex<AudioBuffer>>,
    audio_stop_flag: Arc<AtomicBool>,
    audio_sink: Option<Sink>,
    stream_handle: Option<OutputStreamHandle>,

    playback_start_time: Option<Instant>,
    playback_start_position: f64,
}

impl PlaybackState {
    fn new(tools: Arc<FfmpegTools>, options: EngineOptions, stream_handle: Option<OutputStreamHandle>) -> Self {
        let volume = (options.initial_volume / 100.0).clamp(0.0, 1.0) as f32;
        Self {
            tools,
            options,
            media: None,
            position: 0.0,
            is_playing: false,
            looping: false,
            volume,
            ffmpeg_process: None,
            readers: Vec::new(),
            reader_stop: Arc::new(AtomicBool::new(false)),
            video_done: Arc::new(AtomicBool::new(false)),
            frames_read: Arc::new(AtomicU64::new(0)),
            frame_buffer: Arc::new(Mutex::new(VecDeque::new())),
            audio_buffer: Arc::new(Mutex::new(AudioBuffer::new(AUDIO_BUFFER_SAMPLES))),
            audio_stop_flag: Arc::new(AtomicBool::new(false)),
            audio_sink: None,
            stream_handle,
            playback_start_time: None,
            playback_start_position: 0.0,
        }
    }

    fn duration(&self) -> Option<f64> {
        self.media.as_ref().and_then(|media| media.info.duration)
    }

    fn current_position(&self) -> f64 {
        match (self.is_playing, self.playback_start_time) {
            (true, Some(start)) => {
                let position = self.playback_start_position + start.elapsed().as_secs_f64();
                self.duration().map_or(position, |duration| position.min(duration))
            }
            _ => self.position,
        }
    }

    fn load(&mut self, path: &Path, serial: u64, shared: &Shared, frame_tx: &mpsc::Sender<VideoFrame>) {
        self.stop_stream();
        let probed = self.tools.probe(path);

        let mut props = shared.props();
        let loaded = match probed {
            Ok(info) => {
                log::info!(
                    "Loaded {} ({:?}s, {:.2} fps, audio: {})",
                    path.display(),
                    info.duration,
                    info.frame_rate,
                    info.has_audio
                );
                props.duration = info.duration;
                props.filename = path.file_name().map(|name| name.to_string_lossy().into_owned());
                props.idle_active = false;
                props.time_pos = Some(0.0);
                self.media = Some(LoadedMedia {
                    path: path.to_path_buf(),
                    info,
                });
                self.position = 0.0;
                true
            }
            Err(e) => {
                log::error!("Failed to load {}: {}", path.display(), e);
                props.failure = Some(e.to_string());
                self.media = None;
                false
            }
        };
        props.completed_load = props.completed_load.max(serial);
        let autoplay = loaded && !props.pause;
        drop(props);
        shared.load_finished.notify_all();

        if autoplay {
            self.play(shared);
        } else if loaded {
            self.send_preview(frame_tx);
        }
    }

    fn play(&mut self, shared: &Shared) {
        if self.is_playing || self.media.is_none() {
            return;
        }
        if let Some(duration) = self.duration() {
            if self.position >= duration {
                if !self.looping {
                    // keep-open semantics: stay on the last frame
                    shared.props().pause = true;
                    return;
                }
                self.position = 0.0;
            }
        }
        if let Err(e) = self.start_stream() {
            shared.fail(e.to_string());
        }
    }

    fn pause(&mut self, shared: &Shared) {
        if !self.is_playing {
            return;
        }
        self.position = self.current_position();
        self.stop_stream();
        shared.props().time_pos = Some(self.position);
        log::debug!("Paused at {:.2}s", self.position);
    }

    fn seek(&mut self, target: f64, shared: &Shared, frame_tx: &mpsc::Sender<VideoFrame>) {
        if self.media.is_none() {
            return;
        }
        let was_playing = self.is_playing;
        self.stop_stream();

        let upper = self.duration().unwrap_or(f64::MAX);
        self.position = target.clamp(0.0, upper);
        {
            let mut props = shared.props();
            props.time_pos = Some(self.position);
        }
        log::debug!("Seeking to {:.2}s", self.position);

        if was_playing {
            if let Err(e) = self.start_stream() {
                shared.fail(e.to_string());
            }
        } else {
            self.send_preview(frame_tx);
        }
    }

    fn set_volume(&mut self, volume: f64) {
        self.volume = (volume / 100.0).clamp(0.0, 1.0) as f32;
        if let Some(sink) = &self.audio_sink {
            sink.set_volume(self.volume);
        }
    }

    fn send_preview(&self, frame_tx: &mpsc::Sender<VideoFrame>) {
        let Some(media) = &self.media else {
            return;
        };
        match self.tools.extract_frame(&media.path, self.position, &media.info) {
            Ok(frame) => {
                let _ = frame_tx.send(frame);
            }
            Err(e) => log::debug!("No preview frame at {:.2}s: {}", self.position, e),
        }
    }

    fn start_stream(&mut self) -> EngineResult<()> {
        let (path, info) = match &self.media {
            Some(media) => (media.path.clone(), media.info.clone()),
            None => return Err(EngineError::NoMedia),
        };
        let start_position = self.position;

        self.reader_stop.store(false, Ordering::SeqCst);
        self.video_done.store(false, Ordering::SeqCst);
        self.frames_read.store(0, Ordering::SeqCst);
        if let Ok(mut buffer) = self.frame_buffer.lock() {
            buffer.clear();
        }
        if let Ok(mut buffer) = self.audio_buffer.lock() {
            buffer.clear();
        }

        // Only ask ffmpeg for audio when something will play it
        let audio_sink = if info.has_audio { self.open_audio_sink() } else { None };
        let with_audio = audio_sink.is_some();

        let spawned = self
            .tools
            .stream_command(&path, start_position, &info, &self.options, with_audio)
            .spawn();
        let mut process = match spawned {
            Ok(process) => process,
            Err(source) => {
                self.audio_stop_flag.store(true, Ordering::SeqCst);
                return Err(EngineError::Spawn {
                    program: "ffmpeg".to_string(),
                    source,
                });
            }
        };
        log::debug!(
            "Started ffmpeg stream at {:.2}s for {} (audio: {})",
            start_position,
            path.display(),
            with_audio
        );

        if let Some(stdout) = process.stdout.take() {
            let reader = VideoReader {
                frame_buffer: self.frame_buffer.clone(),
                stop_flag: self.reader_stop.clone(),
                done_flag: self.video_done.clone(),
                frames_read: self.frames_read.clone(),
                size: info.display_size(),
                fps: info.playback_fps(),
                start_position,
            };
            self.readers.push(thread::spawn(move || reader.run(stdout)));
        }

        if with_audio {
            if let Some(stderr) = process.stderr.take() {
                let audio_buffer = self.audio_buffer.clone();
                let stop_flag = self.reader_stop.clone();
                self.readers.push(thread::spawn(move || audio_reader_thread(stderr, audio_buffer, stop_flag)));
            }
        }

        if let Some(sink) = audio_sink {
            sink.play();
            self.audio_sink = Some(sink);
        }

        self.ffmpeg_process = Some(process);
        self.is_playing = true;
        self.playback_start_time = Some(Instant::now());
        self.playback_start_position = start_position;
        Ok(())
    }

    fn open_audio_sink(&self) -> Option<Sink> {
        let handle = self.stream_handle.as_ref()?;
        match Sink::try_new(handle) {
            Ok(sink) => {
                self.audio_stop_flag.store(false, Ordering::SeqCst);
                sink.set_volume(self.volume);
                sink.append(StreamingAudioSource::new(
                    self.audio_buffer.clone(),
                    self.audio_stop_flag.clone(),
                    AUDIO_SAMPLE_RATE,
                    AUDIO_CHANNELS,
                ));
                Some(sink)
            }
            Err(e) => {
                log::warn!("No audio sink, playing video only: {}", e);
                None
            }
        }
    }

    fn stop_stream(&mut self) {
        self.reader_stop.store(true, Ordering::SeqCst);
        self.audio_stop_flag.store(true, Ordering::SeqCst);

        if let Some(mut process) = self.ffmpeg_process.take() {
            log::debug!("Killing ffmpeg stream");
            let _ = process.kill();
            let _ = process.wait();
        }
        for reader in self.readers.drain(..) {
            if reader.join().is_err() {
                log::warn!("Stream reader thread panicked");
            }
        }

        self.audio_sink = None;
        if let Ok(mut buffer) = self.frame_buffer.lock() {
            buffer.clear();
        }
        if let Ok(mut buffer) = self.audio_buffer.lock() {
            buffer.clear();
        }
        self.is_playing = false;
        self.playback_start_time = None;
    }

    /// Runs on every idle tick while playing. Returns `false` when the
    /// engine should shut down.
    fn advance(&mut self, shared: &Shared, frame_tx: &mpsc::Sender<VideoFrame>) -> bool {
        let current = self.current_position();
        let stream_finished = self.video_done.load(Ordering::SeqCst)
            && self.frame_buffer.lock().map(|buffer| buffer.is_empty()).unwrap_or(true);

        if stream_finished && self.frames_read.load(Ordering::SeqCst) == 0 {
            let near_end = self
                .duration()
                .map_or(false, |duration| self.playback_start_position >= duration - 1.0);
            if !near_end {
                self.stop_stream();
                shared.fail("ffmpeg stream produced no frames".to_string());
                return true;
            }
        }

        let reached_end = stream_finished || self.duration().map_or(false, |duration| current >= duration);
        if reached_end {
            return self.finish_playback(current, shared);
        }

        let mut latest = None;
        if let Ok(mut buffer) = self.frame_buffer.lock() {
            while buffer.front().map_or(false, |frame| frame.timestamp <= current) {
                latest = buffer.pop_front();
            }
        }
        if let Some(frame) = latest {
            let _ = frame_tx.send(frame);
        }
        shared.props().time_pos = Some(current);
        true
    }

    fn finish_playback(&mut self, current: f64, shared: &Shared) -> bool {
        self.stop_stream();

        if self.looping {
            log::debug!("Looping back to start");
            self.position = 0.0;
            shared.props().time_pos = Some(0.0);
            if let Err(e) = self.start_stream() {
                shared.fail(e.to_string());
            }
            return true;
        }

        let end = self.duration().unwrap_or(current);
        self.position = end;

        if self.options.keep_open {
            {
                let mut props = shared.props();
                props.time_pos = Some(end);
                props.pause = true;
            }
            shared.emit(TerminationReason::EofReached);
            return true;
        }

        self.media = None;
        {
            let mut props = shared.props();
            props.filename = None;
            props.time_pos = None;
            props.duration = None;
            props.idle_active = true;
        }
        shared.emit(TerminationReason::EndFile);
        if self.options.idle {
            shared.emit(TerminationReason::Idle);
            true
        } else {
            log::info!("Playback finished and idle is not allowed, shutting engine down");
            false
        }
    }
}

fn playback_thread(
    tools: Arc<FfmpegTools>,
    options: EngineOptions,
    shared: Arc<Shared>,
    cmd_rx: mpsc::Receiver<EngineCommand>,
    frame_tx: mpsc::Sender<VideoFrame>,
) {
    // The output stream is not Send, so it lives and dies on this thread
    let (_audio_stream, stream_handle) = match OutputStream::try_default() {
        Ok((stream, handle)) => (Some(stream), Some(handle)),
        Err(e) => {
            log::warn!("Failed to create audio output: {}. Video will play without audio.", e);
            (None, None)
        }
    };
    let mut state = PlaybackState::new(tools, options, stream_handle);

    loop {
        let timeout = if state.is_playing {
            Duration::from_millis(8)
        } else {
            Duration::from_millis(50)
        };

        match cmd_rx.recv_timeout(timeout) {
            Ok(EngineCommand::Load { path, serial }) => state.load(&path, serial, &shared, &frame_tx),
            Ok(EngineCommand::SetPause(true)) => state.pause(&shared),
            Ok(EngineCommand::SetPause(false)) => state.play(&shared),
            Ok(EngineCommand::SetVolume(volume)) => state.set_volume(volume),
            Ok(EngineCommand::SetLoop(enabled)) => state.looping = enabled,
            Ok(EngineCommand::Seek(target)) => state.seek(target, &shared, &frame_tx),
            Ok(EngineCommand::Shutdown) => {
                log::info!("Playback thread shutting down");
                break;
            }
            Err(mpsc::RecvTimeoutError::Timeout) => {
                if state.is_playing && !state.advance(&shared, &frame_tx) {
                    break;
                }
            }
            Err(mpsc::RecvTimeoutError::Disconnected) => {
                log::info!("Command channel disconnected, shutting down");
                break;
            }
        }
    }

    state.stop_stream();
    {
        let mut props = shared.props();
        props.core_shutdown = true;
        props.idle_active = true;
    }
    shared.load_finished.notify_all();
    log::info!("Playback thread exited");
}

struct VideoReader {
    frame_buffer: Arc<Mutex<VecDeque<VideoFrame>>>,
    stop_flag: Arc<AtomicBool>,
    done_flag: Arc<AtomicBool>,
    frames_read: Arc<AtomicU64>,
    size: (u32, u32),
    fps: f64,
    start_position: f64,
}

impl VideoReader {
    fn run(self, mut stdout: ChildStdout) {
        let (width, height) = self.size;
        let frame_duration = 1.0 / self.fps;
        let mut buffer = vec![0u8; (width * height * 3) as usize];
        let mut frame_index = 0u64;

        log::debug!("Video reader started ({}x{} @ {:.2} fps)", width, height, self.fps);

        'read: while !self.stop_flag.load(Ordering::Relaxed) {
            if let Err(e) = stdout.read_exact(&mut buffer) {
                if e.kind() != std::io::ErrorKind::UnexpectedEof {
                    log::debug!("Video reader error: {}", e);
                }
                break;
            }

            let mut frame = Some(VideoFrame {
                image_data: rgb_to_rgba(&buffer),
                width,
                height,
                timestamp: self.start_position + frame_index as f64 * frame_duration,
            });
            frame_index += 1;
            self.frames_read.fetch_add(1, Ordering::SeqCst);

            // Block until the playback clock frees a slot
            while let Some(pending) = frame.take() {
                if self.stop_flag.load(Ordering::Relaxed) {
                    break 'read;
                }
                let mut queue = match self.frame_buffer.lock() {
                    Ok(queue) => queue,
                    Err(_) => break 'read,
                };
                if queue.len() < MAX_BUFFERED_FRAMES {
                    queue.push_back(pending);
                } else {
                    drop(queue);
                    frame = Some(pending);
                    thread::sleep(Duration::from_millis(5));
                }
            }
        }

        self.done_flag.store(true, Ordering::SeqCst);
        log::debug!("Video reader stopped (read {} frames)", frame_index);
    }
}

fn audio_reader_thread<R: Read>(mut source: R, audio_buffer: Arc<Mutex<AudioBuffer>>, stop_flag: Arc<AtomicBool>) {
    // 1024 samples per read keeps f32 boundaries aligned
    let mut byte_buffer = vec![0u8; 4096];
    let mut total_samples = 0u64;
    let mut dropped_samples = 0u64;
    let mut stalled_since: Option<Instant> = None;
    let mut discarding = false;

    log::debug!("Audio reader started");

    'read: while !stop_flag.load(Ordering::Relaxed) {
        if let Err(e) = source.read_exact(&mut byte_buffer) {
            if e.kind() != std::io::ErrorKind::UnexpectedEof {
                log::debug!("Audio reader error: {}", e);
            }
            break;
        }

        let samples: Vec<f32> = byte_buffer
            .chunks_exact(4)
            .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
            .collect();
        total_samples += samples.len() as u64;

        // Wait for the sink while it drains; once it has stalled past the
        // limit, drop samples so ffmpeg never blocks on this pipe
        let mut offset = 0;
        while offset < samples.len() {
            if stop_flag.load(Ordering::Relaxed) {
                break 'read;
            }
            let written = match audio_buffer.lock() {
                Ok(mut buffer) => buffer.write(&samples[offset..]),
                Err(_) => break 'read,
            };
            offset += written;
            if written > 0 {
                stalled_since = None;
                discarding = false;
                continue;
            }

            let stalled = stalled_since.get_or_insert_with(Instant::now).elapsed();
            if discarding || stalled >= AUDIO_STALL_LIMIT {
                if !discarding {
                    log::warn!("Audio output stalled, discarding samples");
                    discarding = true;
                }
                dropped_samples += (samples.len() - offset) as u64;
                break;
            }
            thread::sleep(Duration::from_millis(5));
        }
    }

    log::debug!(
        "Audio reader stopped (read {} samples, dropped {})",
        total_samples,
        dropped_samples
    );
}
