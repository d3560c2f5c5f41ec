/// Window-level actions bound to keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShortcutAction {
    ToggleFullscreen,
    ExitFullscreen,
}
