use std::ffi::OsString;
use std::path::{Path, PathBuf};

use clap::{CommandFactory, Parser, ValueEnum};
use log::warn;

pub mod settings;

use self::settings::{PersistedSettings, load_settings_if_exists};
use crate::render::visuals::STATE_KEYS;
use crate::runtime::action::WindowFrame;

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, ValueEnum)]
pub enum ExportFormat {
    #[default]
    Png,
    Mp4,
    #[value(name = "prores")]
    ProRes,
}

impl ExportFormat {
    pub fn is_video(self) -> bool {
        !matches!(self, ExportFormat::Png)
    }

    /// Guesses the format from an output file extension.
    pub fn from_path(path: &Path) -> Option<Self> {
        let extension = path.extension()?.to_str()?.to_ascii_lowercase();
        match extension.as_str() {
            "mp4" => Some(Self::Mp4),
            "mov" => Some(Self::ProRes),
            _ => None,
        }
    }
}

/// Where and how to record frames.
#[derive(Clone, Debug, PartialEq)]
pub struct Exporting {
    pub path: Option<PathBuf>,
    pub format: ExportFormat,
    pub framerate: u32,
    /// Mb/s, video formats only.
    pub bitrate: u32,
    /// `[0, 0]` records at the framebuffer size.
    pub size: [u32; 2],
    pub postroll: f32,
}

impl Default for Exporting {
    fn default() -> Self {
        Self {
            path: None,
            format: ExportFormat::default(),
            framerate: 60,
            bitrate: 40,
            size: [0, 0],
            postroll: 1.0,
        }
    }
}

impl Exporting {
    pub fn is_requested(&self) -> bool {
        self.path
            .as_ref()
            .is_some_and(|path| !path.as_os_str().is_empty())
    }
}

#[derive(Debug, Parser)]
#[command(
    name = "midiviz",
    about = "Interactive MIDI visualizer",
    disable_help_flag = true,
    disable_version_flag = true,
    args_override_self = true
)]
struct Cli {
    #[arg(short = 'h', long = "help", help = "Print help and exit")]
    help: bool,

    #[arg(short = 'v', long = "version", help = "Print version and exit")]
    version: bool,

    #[arg(long, value_name = "PATH", help = "MIDI file to load")]
    midi: Option<PathBuf>,

    #[arg(long, value_name = "PATH", help = "Visual state preset to apply")]
    config: Option<PathBuf>,

    #[arg(
        long = "window-size",
        alias = "windowSize",
        num_args = 2,
        value_names = ["WIDTH", "HEIGHT"],
        help = "Initial window size"
    )]
    window_size: Option<Vec<u32>>,

    #[arg(
        long = "window-position",
        alias = "windowPosition",
        num_args = 2,
        value_names = ["X", "Y"],
        allow_negative_numbers = true,
        help = "Initial window position"
    )]
    window_position: Option<Vec<i32>>,

    #[arg(long, help = "Start in fullscreen")]
    fullscreen: bool,

    #[arg(long = "hide-window", help = "Create the window hidden")]
    hide_window: bool,

    #[arg(long = "no-transparency", help = "Use an opaque framebuffer")]
    no_transparency: bool,

    #[arg(
        long = "gui-scale",
        value_name = "SCALE",
        help = "Control panel scale"
    )]
    gui_scale: Option<f32>,

    #[arg(long, value_name = "PATH", help = "Record directly to PATH and quit")]
    export: Option<PathBuf>,

    #[arg(long, value_enum, help = "Recording format")]
    format: Option<ExportFormat>,

    #[arg(long, value_name = "FPS", help = "Recording framerate")]
    framerate: Option<u32>,

    #[arg(long, value_name = "MBPS", help = "Video bitrate")]
    bitrate: Option<u32>,

    #[arg(
        long = "export-size",
        num_args = 2,
        value_names = ["WIDTH", "HEIGHT"],
        help = "Recording resolution (defaults to the framebuffer)"
    )]
    export_size: Option<Vec<u32>>,

    #[arg(
        long,
        value_name = "SECONDS",
        help = "Extra time after the last note"
    )]
    postroll: Option<f32>,

    #[arg(value_name = "KEY=VALUE", help = "Visual state overrides")]
    overrides: Vec<String>,
}

/// Startup descriptor built from persisted settings and the command line.
#[derive(Clone, Debug, PartialEq)]
pub struct Configuration {
    pub window_size: [u32; 2],
    pub window_position: [i32; 2],
    pub hide_window: bool,
    pub prevent_transparency: bool,
    pub fullscreen: bool,
    pub gui_scale: f32,
    pub show_help: bool,
    pub show_version: bool,
    pub last_midi_path: Option<PathBuf>,
    pub last_config_path: Option<PathBuf>,
    pub exporting: Exporting,
    overrides: Vec<String>,
}

impl Default for Configuration {
    fn default() -> Self {
        Self::from_sources(PersistedSettings::default(), None)
    }
}

impl Configuration {
    /// Reads `settings_path` (if present), then `args`; arguments win.
    pub fn new<I, T>(settings_path: &Path, args: I) -> Result<Self, String>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        let persisted = match load_settings_if_exists(settings_path) {
            Ok(Some(settings)) => settings,
            Ok(None) => PersistedSettings::default(),
            Err(err) => {
                warn!(
                    "ignoring unreadable settings '{}': {}",
                    settings_path.display(),
                    err
                );
                PersistedSettings::default()
            }
        };

        let cli = Cli::try_parse_from(args).map_err(|err| err.to_string())?;

        Ok(Self::from_sources(persisted, Some(cli)))
    }

    fn from_sources(persisted: PersistedSettings, cli: Option<Cli>) -> Self {
        let mut config = Self {
            window_size: persisted.window_size,
            window_position: persisted.window_position,
            hide_window: false,
            prevent_transparency: persisted.prevent_transparency,
            fullscreen: false,
            gui_scale: persisted.gui_scale,
            show_help: false,
            show_version: false,
            last_midi_path: persisted.last_midi_path,
            last_config_path: persisted.last_config_path,
            exporting: Exporting::default(),
            overrides: Vec::new(),
        };

        if let Some(cli) = cli {
            config.apply_cli(cli);
        }

        config.window_size = config.window_size.map(|v| v.max(1));
        if !config.gui_scale.is_finite() || config.gui_scale <= 0.0 {
            config.gui_scale = 1.0;
        }

        config
    }

    fn apply_cli(&mut self, cli: Cli) {
        self.show_help = cli.help;
        self.show_version = cli.version;
        self.hide_window = cli.hide_window;
        self.fullscreen = cli.fullscreen;
        self.prevent_transparency |= cli.no_transparency;

        if let Some([w, h]) = pair(cli.window_size) {
            self.window_size = [w, h];
        }
        if let Some([x, y]) = pair(cli.window_position) {
            self.window_position = [x, y];
        }
        if let Some(scale) = cli.gui_scale {
            self.gui_scale = scale;
        }
        if cli.midi.is_some() {
            self.last_midi_path = cli.midi;
        }
        if cli.config.is_some() {
            self.last_config_path = cli.config;
        }

        let exporting = &mut self.exporting;
        exporting.path = cli.export;
        let guessed =
            exporting.path.as_deref().and_then(ExportFormat::from_path);
        if let Some(format) = cli.format.or(guessed) {
            exporting.format = format;
        }
        if let Some(framerate) = cli.framerate {
            exporting.framerate = framerate;
        }
        if let Some(bitrate) = cli.bitrate {
            exporting.bitrate = bitrate;
        }
        if let Some(size) = pair(cli.export_size) {
            exporting.size = size;
        }
        if let Some(postroll) = cli.postroll {
            exporting.postroll = postroll.max(0.0);
        }

        self.overrides = cli.overrides;
    }

    /// Raw `KEY=VALUE` state overrides from the command line.
    pub fn args(&self) -> &[String] {
        &self.overrides
    }

    /// Records whether the surface really came up transparent. The next run
    /// only asks for transparency the platform gave this time.
    pub fn set_transparency_achieved(&mut self, transparent: bool) {
        self.prevent_transparency = !transparent;
    }

    /// Settings to remember for the next run.
    pub fn to_persisted(
        &self,
        frame: &WindowFrame,
        last_midi_path: Option<PathBuf>,
    ) -> PersistedSettings {
        PersistedSettings {
            window_size: frame.size().map(|v| v.max(1)),
            window_position: frame.position(),
            gui_scale: self.gui_scale,
            prevent_transparency: self.prevent_transparency,
            last_midi_path: last_midi_path
                .or_else(|| self.last_midi_path.clone()),
            last_config_path: self.last_config_path.clone(),
            ..PersistedSettings::default()
        }
    }

    pub fn print_help() {
        let mut command = Cli::command();
        let _ = command.print_help();

        println!();
        println!("Visual state keys (KEY=VALUE or in a --config preset):");
        for (key, description) in STATE_KEYS {
            println!("  {:<24}{}", key, description);
        }
    }

    pub fn print_version() {
        println!("{} {}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));
    }
}

fn pair<T: Copy>(values: Option<Vec<T>>) -> Option<[T; 2]> {
    match values.as_deref() {
        Some([a, b]) => Some([*a, *b]),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use std::env;
    use std::fs;

    use super::*;

    fn settings_file(name: &str, json: &str) -> PathBuf {
        let dir = env::temp_dir()
            .join(format!("midiviz-config-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join(format!("{}.json", name));
        fs::write(&path, json).unwrap();
        path
    }

    fn missing_settings() -> PathBuf {
        env::temp_dir().join("midiviz-config-missing/none.json")
    }

    #[test]
    fn command_line_overrides_persisted_window_size() {
        let path = settings_file("precedence", r#"{"window_size":[800,600]}"#);
        let config = Configuration::new(
            &path,
            ["midiviz", "--windowSize", "1024", "768"],
        )
        .unwrap();
        assert_eq!(config.window_size, [1024, 768]);

        let config = Configuration::new(&path, ["midiviz"]).unwrap();
        assert_eq!(config.window_size, [800, 600]);
    }

    #[test]
    fn repeated_flags_keep_last_value() {
        let config = Configuration::new(
            &missing_settings(),
            [
                "midiviz",
                "--window-size",
                "640",
                "480",
                "--window-size",
                "320",
                "200",
            ],
        )
        .unwrap();
        assert_eq!(config.window_size, [320, 200]);
    }

    #[test]
    fn help_and_version_are_flags() {
        let config =
            Configuration::new(&missing_settings(), ["midiviz", "--help"])
                .unwrap();
        assert!(config.show_help);
        assert!(!config.show_version);

        let config =
            Configuration::new(&missing_settings(), ["midiviz", "-v"]).unwrap();
        assert!(config.show_version);
    }

    #[test]
    fn exporting_and_overrides_are_parsed() {
        let config = Configuration::new(
            &missing_settings(),
            [
                "midiviz",
                "--midi",
                "song.mid",
                "--export",
                "out.mp4",
                "--format",
                "mp4",
                "--framerate",
                "30",
                "--export-size",
                "1920",
                "1080",
                "--window-position",
                "-10",
                "20",
                "preroll=3",
                "color-bg=0 0 0",
            ],
        )
        .unwrap();

        assert_eq!(config.last_midi_path, Some(PathBuf::from("song.mid")));
        assert!(config.exporting.is_requested());
        assert_eq!(config.exporting.format, ExportFormat::Mp4);
        assert_eq!(config.exporting.framerate, 30);
        assert_eq!(config.exporting.size, [1920, 1080]);
        assert_eq!(config.window_position, [-10, 20]);
        assert_eq!(config.args(), ["preroll=3", "color-bg=0 0 0"]);
    }

    #[test]
    fn export_format_follows_the_extension_unless_given() {
        let config = Configuration::new(
            &missing_settings(),
            ["midiviz", "--export", "take.MOV"],
        )
        .unwrap();
        assert_eq!(config.exporting.format, ExportFormat::ProRes);

        let config = Configuration::new(
            &missing_settings(),
            ["midiviz", "--export", "take.mov", "--format", "png"],
        )
        .unwrap();
        assert_eq!(config.exporting.format, ExportFormat::Png);
    }

    #[test]
    fn no_export_path_means_no_recording() {
        let config =
            Configuration::new(&missing_settings(), ["midiviz"]).unwrap();
        assert!(!config.exporting.is_requested());
        assert_eq!(config.gui_scale, 1.0);
    }

    #[test]
    fn unknown_flags_are_rejected() {
        assert!(
            Configuration::new(&missing_settings(), ["midiviz", "--bogus"])
                .is_err()
        );
    }

    #[test]
    fn invalid_gui_scale_falls_back() {
        let path = settings_file("scale", r#"{"gui_scale":0.0}"#);
        let config = Configuration::new(&path, ["midiviz"]).unwrap();
        assert_eq!(config.gui_scale, 1.0);
    }

    #[test]
    fn persisted_snapshot_uses_live_frame() {
        let config = Configuration::default();
        let frame = WindowFrame::new(5, 6, 700, 500);
        let persisted = config.to_persisted(&frame, None);
        assert_eq!(persisted.window_size, [700, 500]);
        assert_eq!(persisted.window_position, [5, 6]);
    }

    #[test]
    fn persisted_transparency_is_what_the_surface_allowed() {
        let frame = WindowFrame::new(0, 0, 800, 600);

        let mut config = Configuration::default();
        assert!(!config.prevent_transparency);
        config.set_transparency_achieved(false);
        assert!(config.to_persisted(&frame, None).prevent_transparency);

        config.set_transparency_achieved(true);
        assert!(!config.to_persisted(&frame, None).prevent_transparency);
    }
}
