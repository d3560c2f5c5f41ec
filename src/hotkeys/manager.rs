use tokio::sync::broadcast;

use crate::core::KeyBindings;
use crate::hotkeys::ShortcutAction;

pub struct ShortcutManager {
    bindings: Vec<(egui::Key, ShortcutAction)>,
    event_sender: broadcast::Sender<ShortcutAction>,
}

impl ShortcutManager {
    pub fn new(key_bindings: &KeyBindings) -> anyhow::Result<(Self, broadcast::Receiver<ShortcutAction>)> {
        let (event_sender, event_receiver) = broadcast::channel(32);

        let bindings = vec![
            (parse_key(&key_bindings.toggle_fullscreen)?, ShortcutAction::ToggleFullscreen),
            (parse_key(&key_bindings.exit_fullscreen)?, ShortcutAction::ExitFullscreen),
        ];
        log::debug!("Registered shortcuts: {:?}", bindings);

        Ok((
            ShortcutManager {
                bindings,
                event_sender,
            },
            event_receiver,
        ))
    }

    /// Falls back to the default keys when the configured ones don't parse.
    pub fn with_fallback(key_bindings: &KeyBindings) -> (Self, broadcast::Receiver<ShortcutAction>) {
        match Self::new(key_bindings) {
            Ok(manager) => manager,
            Err(e) => {
                log::warn!("Invalid key bindings ({}), using defaults", e);
                Self::new(&KeyBindings::default()).unwrap_or_else(|_| {
                    let (event_sender, event_receiver) = broadcast::channel(32);
                    (
                        ShortcutManager {
                            bindings: Vec::new(),
                            event_sender,
                        },
                        event_receiver,
                    )
                })
            }
        }
    }

    pub fn process_input(&self, input: &egui::InputState) -> usize {
        self.process_keys(|key| input.key_pressed(key))
    }

    /// Emits an event for every bound key reported as pressed.
    pub fn process_keys(&self, pressed: impl Fn(egui::Key) -> bool) -> usize {
        let mut sent = 0;
        for (key, action) in &self.bindings {
            if pressed(*key) {
                log::debug!("Shortcut {:?} -> {:?}", key, action);
                if self.event_sender.send(*action).is_ok() {
                    sent += 1;
                }
            }
        }
        sent
    }
}

pub fn parse_key(name: &str) -> anyhow::Result<egui::Key> {
    egui::Key::from_name(name.trim()).ok_or_else(|| anyhow::anyhow!("Unknown key name: {}", name))
}
