//! Scriptable in-memory engine for controller tests.

use std::collections::{HashMap, HashSet, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use crate::core::{EngineError, EngineResult};
use crate::video::{
    EngineEvent, EngineFactory, EngineOptions, Notifier, ObservedProperty, PlayerEngine, SeekReference,
    TerminationReason, VideoFrame,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FakeOp {
    Load,
    SetPause,
    SetVolume,
    SetLoop,
    Seek,
    ReadPause,
    ReadTimePos,
    ReadFilename,
}

#[derive(Debug, Default)]
pub struct FakeProps {
    pub pause: bool,
    pub volume: f64,
    pub loop_file: bool,
    pub time_pos: Option<f64>,
    pub duration: Option<f64>,
    pub filename: Option<String>,
    pub idle_active: bool,
    pub shutdown: bool,
    pub observed: HashSet<ObservedProperty>,
    pub loaded_path: Option<PathBuf>,
}

#[derive(Default)]
pub struct FakeWorld {
    pub create_attempts: Vec<(usize, String)>,
    pub created: usize,
    pub terminated: usize,
    pub broken_backends: HashSet<String>,
    pub fail_once: VecDeque<(usize, FakeOp)>,
    pub fail_always: HashSet<(usize, FakeOp)>,
    pub durations: HashMap<PathBuf, Option<f64>>,
    pub unloadable: HashSet<PathBuf>,
    pub loads: Vec<(usize, PathBuf)>,
    pub seeks: Vec<(usize, f64)>,
    pub volume_sets: Vec<(usize, f64)>,
    pub pause_sets: Vec<(usize, bool)>,
    engines: HashMap<usize, Arc<Mutex<FakeProps>>>,
    notifiers: HashMap<usize, Vec<Notifier>>,
}

impl FakeWorld {
    fn injected_failure(&mut self, pane: usize, op: FakeOp) -> bool {
        if self.fail_always.contains(&(pane, op)) {
            return true;
        }
        match self.fail_once.iter().position(|&entry| entry == (pane, op)) {
            Some(index) => {
                self.fail_once.remove(index);
                true
            }
            None => false,
        }
    }

    pub fn seeks_for(&self, pane: usize) -> Vec<f64> {
        self.seeks.iter().filter(|(p, _)| *p == pane).map(|(_, t)| *t).collect()
    }

    pub fn loads_for(&self, pane: usize) -> usize {
        self.loads.iter().filter(|(p, _)| *p == pane).count()
    }
}

/// Factory and test handle in one; clones share the same world.
#[derive(Clone, Default)]
pub struct FakeFactory {
    world: Arc<Mutex<FakeWorld>>,
}

impl FakeFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn world(&self) -> MutexGuard<'_, FakeWorld> {
        self.world.lock().unwrap()
    }

    /// Property block of the most recent engine created for `pane`.
    pub fn props(&self, pane: usize) -> Arc<Mutex<FakeProps>> {
        self.world().engines.get(&pane).cloned().expect("no engine created for pane")
    }

    pub fn set_time_pos(&self, pane: usize, time_pos: Option<f64>) {
        self.props(pane).lock().unwrap().time_pos = time_pos;
    }

    pub fn fail_once(&self, pane: usize, op: FakeOp) {
        self.world().fail_once.push_back((pane, op));
    }

    pub fn set_duration(&self, path: &Path, duration: Option<f64>) {
        self.world().durations.insert(path.to_path_buf(), duration);
    }

    /// Posts a termination event from the current engine of `pane`, as the
    /// engine thread would.
    pub fn emit(&self, pane: usize, reason: TerminationReason) {
        let notifier = self
            .world()
            .notifiers
            .get(&pane)
            .and_then(|notifiers| notifiers.last().cloned())
            .expect("no engine created for pane");
        notifier.notify(EngineEvent::PlaybackTerminated(reason));
    }

    /// Posts an event from an earlier engine of `pane`.
    pub fn emit_from_generation(&self, pane: usize, generation: u64, reason: TerminationReason) {
        let notifier = self
            .world()
            .notifiers
            .get(&pane)
            .and_then(|notifiers| notifiers.iter().find(|n| n.generation() == generation).cloned())
            .expect("no engine with that generation");
        notifier.notify(EngineEvent::PlaybackTerminated(reason));
    }
}

impl EngineFactory for FakeFactory {
    fn create(&self, options: &EngineOptions, notifier: Notifier) -> EngineResult<Box<dyn PlayerEngine>> {
        let pane = notifier.pane();
        let mut world = self.world();
        world.create_attempts.push((pane, options.backend.clone()));
        if world.broken_backends.contains(&options.backend) {
            return Err(EngineError::UnsupportedBackend(options.backend.clone()));
        }

        let props = Arc::new(Mutex::new(FakeProps {
            pause: true,
            volume: options.initial_volume,
            idle_active: true,
            ..Default::default()
        }));
        world.created += 1;
        world.engines.insert(pane, props.clone());
        world.notifiers.entry(pane).or_default().push(notifier);

        Ok(Box::new(FakeEngine {
            pane,
            backend: options.backend.clone(),
            world: self.world.clone(),
            props,
            terminated: false,
        }))
    }
}

pub struct FakeEngine {
    pane: usize,
    backend: String,
    world: Arc<Mutex<FakeWorld>>,
    props: Arc<Mutex<FakeProps>>,
    terminated: bool,
}

impl FakeEngine {
    fn props(&self) -> MutexGuard<'_, FakeProps> {
        self.props.lock().unwrap()
    }

    fn check(&self, op: Option<FakeOp>) -> EngineResult<()> {
        if self.props().shutdown {
            return Err(EngineError::Shutdown);
        }
        if let Some(op) = op {
            if self.world.lock().unwrap().injected_failure(self.pane, op) {
                return Err(EngineError::Invalidated(format!("injected {:?} failure", op)));
            }
        }
        Ok(())
    }
}

impl PlayerEngine for FakeEngine {
    fn backend(&self) -> &str {
        &self.backend
    }

    fn load_file(&mut self, path: &Path) -> EngineResult<()> {
        self.check(Some(FakeOp::Load))?;
        let (duration, loadable) = {
            let mut world = self.world.lock().unwrap();
            world.loads.push((self.pane, path.to_path_buf()));
            let duration = world.durations.get(path).copied().unwrap_or(Some(10.0));
            (duration, !world.unloadable.contains(path))
        };

        let mut props = self.props();
        props.loaded_path = Some(path.to_path_buf());
        if loadable {
            props.filename = path.file_name().map(|n| n.to_string_lossy().into_owned());
            props.duration = duration;
            props.time_pos = Some(0.0);
            props.idle_active = false;
        } else {
            props.filename = None;
            props.duration = None;
            props.time_pos = None;
            props.idle_active = true;
        }
        Ok(())
    }

    fn wait_until_loaded(&self, _timeout: Duration) -> bool {
        let props = self.props();
        !props.shutdown && props.filename.is_some()
    }

    fn pause(&self) -> EngineResult<bool> {
        self.check(Some(FakeOp::ReadPause))?;
        Ok(self.props().pause)
    }

    fn set_pause(&mut self, paused: bool) -> EngineResult<()> {
        self.check(Some(FakeOp::SetPause))?;
        self.world.lock().unwrap().pause_sets.push((self.pane, paused));
        self.props().pause = paused;
        Ok(())
    }

    fn volume(&self) -> EngineResult<f64> {
        self.check(None)?;
        Ok(self.props().volume)
    }

    fn set_volume(&mut self, volume: f64) -> EngineResult<()> {
        self.check(Some(FakeOp::SetVolume))?;
        self.world.lock().unwrap().volume_sets.push((self.pane, volume));
        self.props().volume = volume;
        Ok(())
    }

    fn loop_file(&self) -> EngineResult<bool> {
        self.check(None)?;
        Ok(self.props().loop_file)
    }

    fn set_loop_file(&mut self, enabled: bool) -> EngineResult<()> {
        self.check(Some(FakeOp::SetLoop))?;
        self.props().loop_file = enabled;
        Ok(())
    }

    fn time_pos(&self) -> EngineResult<Option<f64>> {
        self.check(Some(FakeOp::ReadTimePos))?;
        Ok(self.props().time_pos)
    }

    fn duration(&self) -> EngineResult<Option<f64>> {
        self.check(None)?;
        Ok(self.props().duration)
    }

    fn filename(&self) -> EngineResult<Option<String>> {
        self.check(Some(FakeOp::ReadFilename))?;
        Ok(self.props().filename.clone())
    }

    fn idle_active(&self) -> EngineResult<bool> {
        self.check(None)?;
        Ok(self.props().idle_active)
    }

    fn core_shutdown(&self) -> bool {
        self.props().shutdown
    }

    fn seek(&mut self, target: f64, reference: SeekReference) -> EngineResult<()> {
        self.check(Some(FakeOp::Seek))?;
        let mut props = self.props();
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
        drop(props);
        self.world.lock().unwrap().seeks.push((self.pane, absolute));
        Ok(())
    }

    fn observe(&mut self, property: ObservedProperty) -> EngineResult<()> {
        self.check(None)?;
        self.props().observed.insert(property);
        Ok(())
    }

    fn unobserve(&mut self, property: ObservedProperty) -> EngineResult<()> {
        self.props().observed.remove(&property);
        Ok(())
    }

    fn take_frame(&mut self) -> Option<VideoFrame> {
        None
    }

    fn terminate(&mut self) {
        if self.terminated {
            return;
        }
        self.terminated = true;
        self.props().shutdown = true;
        self.world.lock().unwrap().terminated += 1;
    }
}

impl Drop for FakeEngine {
    fn drop(&mut self) {
        self.terminate();
    }
}
