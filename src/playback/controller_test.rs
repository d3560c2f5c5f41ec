#[cfg(test)]
mod tests {

    use std::path::PathBuf;
    use std::sync::Arc;
    use std::time::{Duration, Instant};
    use tempfile::TempDir;

    use crate::core::{AppConfig, LayoutMode, LAYOUT_CYCLE};
    use crate::playback::AppController;
    use crate::video::fake_engine::{FakeFactory, FakeOp};
    use crate::video::TerminationReason;

    fn controller() -> (AppController, FakeFactory, TempDir) {
        let factory = FakeFactory::new();
        let controller = AppController::new(Arc::new(factory.clone()), &AppConfig::default());
        (controller, factory, TempDir::new().expect("temp dir"))
    }

    fn video_file(dir: &TempDir, name: &str) -> PathBuf {
        let path = dir.path().join(name);
        std::fs::write(&path, b"not really a video").expect("write test file");
        path
    }

    #[test]
    fn test_startup_creates_one_engine_per_pane() {
        let (controller, factory, _dir) = controller();

        assert_eq!(factory.world().created, 4);
        assert!(controller.panes().iter().all(|pane| pane.has_engine()));
        assert_eq!(controller.play_button_label(), "Play All");
        assert_eq!(controller.layout_mode(), LayoutMode::OneByFour);
    }

    #[test]
    fn test_single_clip_plays_to_the_end() {
        let (mut controller, factory, dir) = controller();
        let clip = video_file(&dir, "clip.mp4");
        controller.load(0, &clip).expect("load");

        controller.toggle_play_all();
        assert!(controller.state().global_playing);
        assert_eq!(controller.play_button_label(), "Pause All");

        factory.set_time_pos(0, Some(9.8));
        factory.emit(0, TerminationReason::EofReached);
        assert_eq!(controller.dispatch_notifications(), 1);

        let pane = controller.pane(0).unwrap();
        assert!(pane.has_ended());
        assert!(factory.props(0).lock().unwrap().pause);
        assert_eq!(pane.seek_slider().value, 10.0);
        assert!(!controller.state().global_playing);
        assert_eq!(controller.play_button_label(), "Play All");
    }

    #[test]
    fn test_all_ended_waits_for_every_loaded_pane() {
        let (mut controller, factory, dir) = controller();
        controller.load(0, &video_file(&dir, "a.mp4")).unwrap();
        controller.load(2, &video_file(&dir, "b.mp4")).unwrap();
        controller.toggle_play_all();

        factory.set_time_pos(0, Some(10.0));
        factory.emit(0, TerminationReason::EndFile);
        controller.dispatch_notifications();
        assert!(controller.state().global_playing);

        factory.set_time_pos(2, Some(10.0));
        factory.emit(2, TerminationReason::Idle);
        controller.dispatch_notifications();
        assert!(!controller.state().global_playing);
    }

    #[test]
    fn test_check_all_ended_ignores_empty_panes() {
        let (mut controller, _factory, dir) = controller();
        controller.load(1, &video_file(&dir, "a.mp4")).unwrap();
        controller.toggle_play_all();

        assert!(!controller.check_all_ended());
        assert!(controller.state().global_playing);
    }

    #[test]
    fn test_stale_generation_is_discarded() {
        let (mut controller, factory, dir) = controller();
        controller.load(0, &video_file(&dir, "clip.mp4")).unwrap();
        controller.toggle_play_all();

        // Force a recovery so pane 0 moves to a new engine
        factory.fail_once(0, FakeOp::SetPause);
        controller.toggle_play_all();
        assert_eq!(controller.pane(0).unwrap().generation(), 2);
        controller.toggle_play_all();

        factory.set_time_pos(0, Some(10.0));
        factory.emit_from_generation(0, 1, TerminationReason::EndFile);

        assert_eq!(controller.dispatch_notifications(), 0);
        assert!(!controller.pane(0).unwrap().has_ended());
        assert!(controller.state().global_playing);
    }

    #[test]
    fn test_failed_pane_is_excluded_from_fan_out() {
        let (mut controller, factory, dir) = controller();
        controller.load(0, &video_file(&dir, "a.mp4")).unwrap();
        controller.load(1, &video_file(&dir, "b.mp4")).unwrap();
        factory.fail_once(0, FakeOp::Seek);
        factory.fail_once(0, FakeOp::Seek);
        assert!(controller.seek(0, 4.0).is_err());
        assert!(controller.pane(0).unwrap().is_failed());

        controller.toggle_play_all();
        let pane_zero_pauses = factory.world().pause_sets.iter().filter(|(p, _)| *p == 0).count();
        controller.toggle_play_all();

        assert_eq!(
            factory.world().pause_sets.iter().filter(|(p, _)| *p == 0).count(),
            pane_zero_pauses
        );

        factory.set_time_pos(1, Some(10.0));
        controller.toggle_play_all();
        factory.emit(1, TerminationReason::EofReached);
        controller.dispatch_notifications();
        assert!(!controller.state().global_playing);
    }

    #[test]
    fn test_mute_all_twice_restores_each_volume() {
        let (mut controller, factory, _dir) = controller();
        controller.set_volume(0, 30.0).unwrap();
        controller.set_volume(1, 80.0).unwrap();

        controller.toggle_mute_all();
        assert_eq!(controller.mute_button_label(), "Unmute");
        for index in 0..4 {
            assert_eq!(factory.props(index).lock().unwrap().volume, 0.0);
            assert_eq!(controller.pane(index).unwrap().volume_label(), "Vol: 0");
        }

        controller.toggle_mute_all();
        assert_eq!(controller.mute_button_label(), "Mute");
        assert_eq!(factory.props(0).lock().unwrap().volume, 30.0);
        assert_eq!(factory.props(1).lock().unwrap().volume, 80.0);
        assert_eq!(factory.props(2).lock().unwrap().volume, 50.0);
        assert_eq!(controller.pane(1).unwrap().volume_label(), "Vol: 80");
    }

    #[test]
    fn test_loop_all_updates_every_engine() {
        let (mut controller, factory, _dir) = controller();

        controller.toggle_loop_all();

        assert_eq!(controller.loop_button_label(), "Loop On");
        for index in 0..4 {
            assert!(factory.props(index).lock().unwrap().loop_file);
        }
    }

    #[test]
    fn test_reset_all_stops_playback() {
        let (mut controller, factory, dir) = controller();
        controller.load(0, &video_file(&dir, "clip.mp4")).unwrap();
        controller.toggle_play_all();

        controller.reset_all();

        assert!(!controller.state().global_playing);
        assert!(factory.props(0).lock().unwrap().pause);
        assert_eq!(factory.world().loads_for(0), 2);
        // Empty panes are left alone
        assert_eq!(factory.world().loads_for(1), 0);
    }

    #[test]
    fn test_layout_cycle_returns_to_start() {
        let (mut controller, _factory, _dir) = controller();
        let original = controller.geometry();

        let sizes: Vec<String> = (0..LAYOUT_CYCLE.len())
            .filter_map(|_| controller.cycle_layout())
            .map(|size| size.to_string())
            .collect();

        assert_eq!(sizes, ["960x400", "640x400", "400x400", "760x680", "1280x400"]);
        assert_eq!(controller.geometry(), original);
        assert_eq!(controller.layout_mode(), LayoutMode::OneByFour);
    }

    #[test]
    fn test_layout_change_keeps_window_size_in_fullscreen() {
        let (mut controller, _factory, _dir) = controller();
        assert!(controller.toggle_fullscreen());

        assert_eq!(controller.cycle_layout(), None);
        assert_eq!(controller.layout_mode(), LayoutMode::OneByThree);

        assert!(controller.exit_fullscreen());
        assert!(!controller.exit_fullscreen());
    }

    #[test]
    fn test_tick_polls_progress_on_schedule() {
        let (mut controller, factory, dir) = controller();
        controller.load(0, &video_file(&dir, "a.mp4")).unwrap();
        controller.load(1, &video_file(&dir, "b.mp4")).unwrap();
        controller.toggle_play_all();
        factory.world().fail_always.insert((0, FakeOp::ReadTimePos));
        factory.set_time_pos(1, Some(4.0));

        let now = Instant::now();
        assert!(controller.tick(now).is_some());
        assert_eq!(controller.pane(1).unwrap().seek_slider().value, 0.0);

        let later = now + Duration::from_secs(2);
        let next = controller.tick(later);

        // Pane 0 failing to report does not stop pane 1 or the schedule
        assert_eq!(controller.pane(1).unwrap().seek_slider().value, 4.0);
        assert_eq!(next, Some(Duration::from_secs(1)));
        assert!(!controller.pane(0).unwrap().is_failed());
    }

    #[test]
    fn test_shutdown_terminates_all_engines() {
        let (mut controller, factory, _dir) = controller();

        controller.shutdown();

        assert_eq!(factory.world().terminated, 4);
        assert!(controller.panes().iter().all(|pane| !pane.has_engine()));
        assert_eq!(controller.tick(Instant::now()), None);
    }
}
