use std::path::PathBuf;

use crate::config::ExportFormat;
use crate::render::visuals::VisualSettings;

/// Something the user asked for in the control panel.
#[derive(Clone, Debug, PartialEq)]
pub enum PanelEvent {
    TogglePlayback,
    Restart,
    Seek(f32),
    Fullscreen,
    Resize { width: u32, height: u32 },
    LoadMidi(PathBuf),
    LoadState(PathBuf),
    SaveState(PathBuf),
    StartRecording { path: PathBuf, format: ExportFormat },
    StopRecording,
    Quit,
}

/// Read only facts shown by the panel.
#[derive(Clone, Debug, Default)]
pub struct PanelStatus {
    pub position: f32,
    pub duration: f32,
    pub playing: bool,
    pub recording: bool,
    pub recorded_frames: u64,
    pub average_fps: f32,
    pub midi_name: Option<String>,
}

/// Widget values that persist between frames.
#[derive(Clone, Debug)]
pub struct PanelState {
    pub width: u32,
    pub height: u32,
    pub format: ExportFormat,
}

impl Default for PanelState {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
            format: ExportFormat::Mp4,
        }
    }
}

pub fn control_panel(
    ctx: &egui::Context,
    status: &PanelStatus,
    visuals: &mut VisualSettings,
    state: &mut PanelState,
) -> Vec<PanelEvent> {
    let mut events = Vec::new();

    egui::Window::new("midiviz")
        .default_pos([12.0, 12.0])
        .resizable(false)
        .show(ctx, |ui| {
            playback(ui, status, &mut events);
            ui.separator();
            appearance(ui, visuals);
            ui.separator();
            window(ui, state, &mut events);
            ui.separator();
            files(ui, status, state, &mut events);
        });

    events
}

fn playback(
    ui: &mut egui::Ui,
    status: &PanelStatus,
    events: &mut Vec<PanelEvent>,
) {
    ui.label(status.midi_name.as_deref().unwrap_or("No MIDI file"));

    ui.horizontal(|ui| {
        let label = if status.playing { "Pause" } else { "Play" };
        if ui.button(label).clicked() {
            events.push(PanelEvent::TogglePlayback);
        }
        if ui.button("Restart").clicked() {
            events.push(PanelEvent::Restart);
        }
        ui.label(format!("{:.0} fps", status.average_fps));
    });

    let mut position = status.position.min(status.duration);
    let slider = egui::Slider::new(&mut position, 0.0..=status.duration)
        .text("s")
        .fixed_decimals(1);
    if ui.add_enabled(!status.recording, slider).changed() {
        events.push(PanelEvent::Seek(position));
    }
}

fn appearance(ui: &mut egui::Ui, visuals: &mut VisualSettings) {
    ui.add(
        egui::Slider::new(&mut visuals.preroll, 0.1..=20.0)
            .text("Preroll")
            .logarithmic(true),
    );
    ui.add(
        egui::Slider::new(&mut visuals.keyboard_size, 0.0..=0.5)
            .text("Keyboard"),
    );
    ui.checkbox(&mut visuals.show_keyboard, "Show keyboard");

    egui::Grid::new("colors").num_columns(2).show(ui, |ui| {
        ui.label("Background");
        ui.color_edit_button_rgb(&mut visuals.background);
        ui.end_row();
        ui.label("Notes");
        ui.horizontal(|ui| {
            ui.color_edit_button_rgb(&mut visuals.note_major);
            ui.color_edit_button_rgb(&mut visuals.note_minor);
        });
        ui.end_row();
        ui.label("Keys");
        ui.horizontal(|ui| {
            ui.color_edit_button_rgb(&mut visuals.key_major);
            ui.color_edit_button_rgb(&mut visuals.key_minor);
        });
        ui.end_row();
    });
}

fn window(
    ui: &mut egui::Ui,
    state: &mut PanelState,
    events: &mut Vec<PanelEvent>,
) {
    ui.horizontal(|ui| {
        ui.add(egui::DragValue::new(&mut state.width).range(64..=8192));
        ui.label("x");
        ui.add(egui::DragValue::new(&mut state.height).range(64..=8192));
        if ui.button("Apply size").clicked() {
            events.push(PanelEvent::Resize {
                width: state.width,
                height: state.height,
            });
        }
    });

    if ui.button("Fullscreen").clicked() {
        events.push(PanelEvent::Fullscreen);
    }
}

fn files(
    ui: &mut egui::Ui,
    status: &PanelStatus,
    state: &mut PanelState,
    events: &mut Vec<PanelEvent>,
) {
    ui.horizontal(|ui| {
        if ui.button("Load MIDI").clicked() {
            if let Some(path) = rfd::FileDialog::new()
                .add_filter("MIDI", &["mid", "midi"])
                .pick_file()
            {
                events.push(PanelEvent::LoadMidi(path));
            }
        }
        if ui.button("Load preset").clicked() {
            if let Some(path) = rfd::FileDialog::new()
                .add_filter("YAML", &["yml", "yaml"])
                .pick_file()
            {
                events.push(PanelEvent::LoadState(path));
            }
        }
        if ui.button("Save preset").clicked() {
            if let Some(path) = rfd::FileDialog::new()
                .add_filter("YAML", &["yml", "yaml"])
                .set_file_name("preset.yml")
                .save_file()
            {
                events.push(PanelEvent::SaveState(path));
            }
        }
    });

    ui.horizontal(|ui| {
        if status.recording {
            ui.label(format!("Recording ({} frames)", status.recorded_frames));
            if ui.button("Stop").clicked() {
                events.push(PanelEvent::StopRecording);
            }
            return;
        }

        egui::ComboBox::from_id_salt("format")
            .selected_text(format_label(state.format))
            .show_ui(ui, |ui| {
                for format in
                    [ExportFormat::Mp4, ExportFormat::ProRes, ExportFormat::Png]
                {
                    ui.selectable_value(
                        &mut state.format,
                        format,
                        format_label(format),
                    );
                }
            });

        if ui.button("Record").clicked() {
            if let Some(path) = pick_export_path(state.format) {
                events.push(PanelEvent::StartRecording {
                    path,
                    format: state.format,
                });
            }
        }
    });

    if ui.button("Quit").clicked() {
        events.push(PanelEvent::Quit);
    }
}

fn pick_export_path(format: ExportFormat) -> Option<PathBuf> {
    let stamp = chrono::Local::now().format("%Y%m%d_%H%M%S");
    match format {
        ExportFormat::Png => rfd::FileDialog::new().pick_folder(),
        ExportFormat::Mp4 => rfd::FileDialog::new()
            .set_file_name(format!("midiviz_{}.mp4", stamp))
            .save_file(),
        ExportFormat::ProRes => rfd::FileDialog::new()
            .set_file_name(format!("midiviz_{}.mov", stamp))
            .save_file(),
    }
}

fn format_label(format: ExportFormat) -> &'static str {
    match format {
        ExportFormat::Png => "PNG frames",
        ExportFormat::Mp4 => "MP4 (H.264)",
        ExportFormat::ProRes => "ProRes",
    }
}
