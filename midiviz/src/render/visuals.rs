use log::warn;

use crate::state::State;

pub type Rgb = [f32; 3];

/// Known state keys and their meaning, shown by `--help`.
pub const STATE_KEYS: &[(&str, &str)] = &[
    ("color-bg", "background color, three floats in [0, 1]"),
    ("bg-alpha", "background opacity with a transparent framebuffer"),
    ("color-major", "notes on white keys"),
    ("color-minor", "notes on black keys"),
    ("color-keyboard-major", "white key color"),
    ("color-keyboard-minor", "black key color"),
    ("preroll", "seconds of upcoming notes on screen"),
    ("keyboard-size", "fraction of the height used by the keyboard"),
    ("min-key", "lowest MIDI key shown"),
    ("max-key", "highest MIDI key shown"),
    ("show-keyboard", "draw the keyboard (true/false)"),
    ("show-gui", "show the control panel at startup (true/false)"),
];

#[derive(Clone, Debug, PartialEq)]
pub struct VisualSettings {
    pub background: Rgb,
    pub background_alpha: f32,
    pub note_major: Rgb,
    pub note_minor: Rgb,
    pub key_major: Rgb,
    pub key_minor: Rgb,
    pub preroll: f32,
    pub keyboard_size: f32,
    pub min_key: u8,
    pub max_key: u8,
    pub show_keyboard: bool,
    pub show_gui: bool,
}

impl Default for VisualSettings {
    fn default() -> Self {
        Self {
            background: [0.05, 0.05, 0.07],
            background_alpha: 1.0,
            note_major: [0.33, 0.66, 1.0],
            note_minor: [0.2, 0.45, 0.8],
            key_major: [0.95, 0.95, 0.95],
            key_minor: [0.08, 0.08, 0.08],
            preroll: 2.5,
            keyboard_size: 0.12,
            min_key: 21,
            max_key: 108,
            show_keyboard: true,
            show_gui: true,
        }
    }
}

impl VisualSettings {
    pub fn from_state(state: &State) -> Self {
        let mut settings = Self::default();
        settings.apply_state(state);
        settings
    }

    /// Applies recognized keys and returns the ones it did not recognize.
    pub fn apply_state(&mut self, state: &State) -> Vec<String> {
        let mut unknown = Vec::new();

        for (key, _) in state.iter() {
            match key {
                "color-bg" => set_color(&mut self.background, state, key),
                "color-major" => set_color(&mut self.note_major, state, key),
                "color-minor" => set_color(&mut self.note_minor, state, key),
                "color-keyboard-major" => {
                    set_color(&mut self.key_major, state, key)
                }
                "color-keyboard-minor" => {
                    set_color(&mut self.key_minor, state, key)
                }
                "bg-alpha" => {
                    if let Some(alpha) = state.parse::<f32>(key) {
                        self.background_alpha = alpha.clamp(0.0, 1.0);
                    }
                }
                "preroll" => {
                    if let Some(preroll) = state.parse::<f32>(key) {
                        self.preroll = preroll.clamp(0.1, 60.0);
                    }
                }
                "keyboard-size" => {
                    if let Some(size) = state.parse::<f32>(key) {
                        self.keyboard_size = size.clamp(0.0, 0.9);
                    }
                }
                "min-key" => {
                    if let Some(key) = state.parse::<u8>(key) {
                        self.min_key = key.min(127);
                    }
                }
                "max-key" => {
                    if let Some(key) = state.parse::<u8>(key) {
                        self.max_key = key.min(127);
                    }
                }
                "show-keyboard" => {
                    if let Some(show) = parse_bool(state, key) {
                        self.show_keyboard = show;
                    }
                }
                "show-gui" => {
                    if let Some(show) = parse_bool(state, key) {
                        self.show_gui = show;
                    }
                }
                other => unknown.push(other.to_string()),
            }
        }

        if self.min_key > self.max_key {
            std::mem::swap(&mut self.min_key, &mut self.max_key);
        }

        unknown
    }

    pub fn to_state(&self) -> State {
        let mut state = State::new();
        state.set("color-bg", color_text(self.background));
        state.set("bg-alpha", self.background_alpha.to_string());
        state.set("color-major", color_text(self.note_major));
        state.set("color-minor", color_text(self.note_minor));
        state.set("color-keyboard-major", color_text(self.key_major));
        state.set("color-keyboard-minor", color_text(self.key_minor));
        state.set("preroll", self.preroll.to_string());
        state.set("keyboard-size", self.keyboard_size.to_string());
        state.set("min-key", self.min_key.to_string());
        state.set("max-key", self.max_key.to_string());
        state.set("show-keyboard", self.show_keyboard.to_string());
        state.set("show-gui", self.show_gui.to_string());
        state
    }
}

fn set_color(target: &mut Rgb, state: &State, key: &str) {
    let Some(values) = state.floats(key) else {
        return;
    };

    match values.as_slice() {
        [gray] => *target = [*gray; 3].map(|c| c.clamp(0.0, 1.0)),
        [r, g, b, ..] => *target = [*r, *g, *b].map(|c| c.clamp(0.0, 1.0)),
        _ => warn!("state color '{}' needs 1 or 3 components", key),
    }
}

fn parse_bool(state: &State, key: &str) -> Option<bool> {
    let raw = state.get(key)?;
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => {
            warn!("state value for '{}' is not a boolean: '{}'", key, raw);
            None
        }
    }
}

fn color_text(color: Rgb) -> String {
    format!("{} {} {}", color[0], color[1], color[2])
}
