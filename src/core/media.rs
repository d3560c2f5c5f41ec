use std::path::{Component, Path, PathBuf};

use crate::core::InputError;

/// Extensions accepted for drag-and-drop and the open dialog.
pub const VIDEO_EXTENSIONS: [&str; 5] = ["mp4", "avi", "mkv", "mov", "gif"];

/// Turns a raw drop payload into a filesystem path.
///
/// Drop sources hand over paths in several shapes: wrapped in braces when
/// they contain spaces (only the first entry is taken), as `file://` URIs, or
/// percent-encoded. The result is normalized lexically; nothing here touches
/// the filesystem.
pub fn normalize_drop_payload(raw: &str) -> PathBuf {
    let mut payload = raw.trim();

    if let Some(rest) = payload.strip_prefix('{') {
        payload = rest.split('}').next().unwrap_or(rest);
    }

    let mut decoded = match urlencoding::decode(payload) {
        Ok(text) => text.into_owned(),
        Err(e) => {
            log::debug!("Keeping undecodable drop payload as-is ({}): {}", e, payload);
            payload.to_string()
        }
    };

    if let Some(rest) = decoded.strip_prefix("file://") {
        // file:///C:/clips/a.mp4 carries a leading slash before the drive letter
        let bytes = rest.as_bytes();
        let has_drive = bytes.len() >= 3 && bytes[0] == b'/' && bytes[1].is_ascii_alphabetic() && bytes[2] == b':';
        decoded = if has_drive { rest[1..].to_string() } else { rest.to_string() };
    }

    normalize_lexically(Path::new(&decoded))
}

/// Collapses `.` and `..` components the way `normpath` does, without
/// resolving symlinks.
fn normalize_lexically(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                let can_pop = matches!(
                    normalized.components().next_back(),
                    Some(Component::Normal(_))
                );
                if can_pop {
                    normalized.pop();
                } else if !normalized.has_root() {
                    normalized.push("..");
                }
            }
            other => normalized.push(other.as_os_str()),
        }
    }
    if normalized.as_os_str().is_empty() {
        normalized.push(".");
    }
    normalized
}

pub fn is_supported_video(path: &Path) -> bool {
    path.extension()
        .map(|ext| ext.to_string_lossy().to_lowercase())
        .map(|ext| VIDEO_EXTENSIONS.contains(&ext.as_str()))
        .unwrap_or(false)
}

/// Checks that `path` can be handed to an engine: it must exist and carry a
/// recognized video extension.
pub fn validate_video_path(path: &Path) -> Result<PathBuf, InputError> {
    if !path.exists() {
        return Err(InputError::NotFound(path.to_path_buf()));
    }
    if !is_supported_video(path) {
        return Err(InputError::UnsupportedFormat(path.to_path_buf()));
    }
    Ok(path.to_path_buf())
}

/// Base name shown in a pane's label.
pub fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
