#[cfg(test)]
mod tests {

    use std::path::PathBuf;

    use eframe::egui;

    use crate::core::media::validate_video_path;
    use crate::gui::app::{dropped_path, pick_drop_target};
    use crate::gui::pane_view::fit_rect;

    fn row_of_cells(count: usize) -> Vec<(usize, egui::Rect)> {
        (0..count)
            .map(|index| {
                let min = egui::pos2(index as f32 * 100.0, 0.0);
                (index, egui::Rect::from_min_size(min, egui::vec2(100.0, 100.0)))
            })
            .collect()
    }

    #[test]
    fn test_drop_targets_pane_under_pointer() {
        let cells = row_of_cells(4);
        let target = pick_drop_target(Some(egui::pos2(250.0, 50.0)), &cells, &[false; 4]);
        assert_eq!(target, 2);
    }

    #[test]
    fn test_drop_under_pointer_replaces_loaded_pane() {
        let cells = row_of_cells(4);
        let target = pick_drop_target(Some(egui::pos2(10.0, 10.0)), &cells, &[true, false, false, false]);
        assert_eq!(target, 0);
    }

    #[test]
    fn test_drop_without_pointer_picks_first_empty_pane() {
        let cells = row_of_cells(3);
        let target = pick_drop_target(None, &cells, &[true, true, false, false]);
        assert_eq!(target, 2);
    }

    #[test]
    fn test_drop_ignores_hidden_empty_panes() {
        // Pane 3 is empty but not part of the 1x3 layout
        let cells = row_of_cells(3);
        let target = pick_drop_target(Some(egui::pos2(900.0, 50.0)), &cells, &[true, true, true, false]);
        assert_eq!(target, 0);
    }

    #[test]
    fn test_dropped_path_prefers_local_path() {
        let file = egui::DroppedFile {
            path: Some(PathBuf::from("/videos/clip.mp4")),
            name: "ignored".to_string(),
            ..Default::default()
        };
        assert_eq!(dropped_path(&file), Some(PathBuf::from("/videos/clip.mp4")));
    }

    #[test]
    fn test_dropped_native_path_keeps_percent_sequences() {
        let dir = tempfile::tempdir().expect("tempdir");
        let video = dir.path().join("100%25 final.mp4");
        std::fs::write(&video, b"not really a video").expect("write video");

        let file = egui::DroppedFile {
            path: Some(video.clone()),
            name: "100%25 final.mp4".to_string(),
            ..Default::default()
        };
        let resolved = dropped_path(&file).expect("path");

        assert_eq!(resolved, video);
        assert_eq!(validate_video_path(&resolved).expect("valid video"), video);
    }

    #[test]
    fn test_dropped_path_decodes_uri_names() {
        let file = egui::DroppedFile {
            name: "file:///videos/my%20clip.mp4".to_string(),
            ..Default::default()
        };
        assert_eq!(dropped_path(&file), Some(PathBuf::from("/videos/my clip.mp4")));

        let empty = egui::DroppedFile::default();
        assert_eq!(dropped_path(&empty), None);
    }

    #[test]
    fn test_fit_rect_letterboxes_wide_frames() {
        let outer = egui::Rect::from_min_size(egui::pos2(0.0, 0.0), egui::vec2(400.0, 400.0));
        let fitted = fit_rect(outer, egui::vec2(1280.0, 720.0));

        assert_eq!(fitted.width(), 400.0);
        assert_eq!(fitted.height(), 225.0);
        assert_eq!(fitted.center(), outer.center());
    }
}
