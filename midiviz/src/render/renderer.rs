use std::path::Path;
use std::sync::Arc;

use log::{debug, error, info, warn};
use winit::event::ElementState;
use winit::keyboard::KeyCode;

use super::frame::Frame;
use super::layout::{self, Rect};
use super::recorder::{FrameRecorder, RECORDING_FORMAT};
use super::rects::RectPipeline;
use super::scene::Scene;
use crate::config::Exporting;
use crate::midi::Score;
use crate::resources::Resources;
use crate::runtime::action::SystemAction;
use crate::runtime::session::Visualizer;
use crate::state::State;
use crate::ui::panel::{self, PanelEvent, PanelState, PanelStatus};

/// Draws the score on the window surface and, while recording, into the
/// recorder's offscreen target.
pub struct Renderer {
    device: Arc<wgpu::Device>,
    queue: Arc<wgpu::Queue>,
    scene: Scene,
    rects: RectPipeline,
    recording_rects: Option<RectPipeline>,
    shader: String,
    recorder: Option<FrameRecorder>,
    exporting: Exporting,
    panel: PanelState,
    size: [u32; 2],
    gui_scale: f32,
    transparent: bool,
    average_fps: f32,
}

impl Renderer {
    pub fn new(
        device: Arc<wgpu::Device>,
        queue: Arc<wgpu::Queue>,
        format: wgpu::TextureFormat,
        transparent: bool,
        resources: &Resources,
    ) -> Self {
        let rects = RectPipeline::new(&device, format, &resources.rects_shader);

        Self {
            device,
            queue,
            scene: Scene::new(),
            rects,
            recording_rects: None,
            shader: resources.rects_shader.clone(),
            recorder: None,
            exporting: Exporting::default(),
            panel: PanelState::default(),
            size: [1, 1],
            gui_scale: 1.0,
            transparent,
            average_fps: 0.0,
        }
    }

    pub fn midi_path(&self) -> Option<&Path> {
        self.scene.midi_path()
    }

    fn clear_color(&self, opaque: bool) -> wgpu::Color {
        let [r, g, b] = self.scene.visuals().background.map(f64::from);
        let alpha = if opaque || !self.transparent {
            1.0
        } else {
            f64::from(self.scene.visuals().background_alpha)
        };

        // Transparent surfaces expect premultiplied color.
        wgpu::Color {
            r: r * alpha,
            g: g * alpha,
            b: b * alpha,
            a: alpha,
        }
    }

    fn start_recording(
        &mut self,
        exporting: &Exporting,
        framebuffer_size: [u32; 2],
        direct: bool,
    ) -> bool {
        if self.recorder.is_some() {
            warn!("a recording is already running");
            return false;
        }

        match FrameRecorder::new(
            self.device.clone(),
            self.queue.clone(),
            exporting,
            framebuffer_size,
        ) {
            Ok(recorder) => {
                self.recorder = Some(recorder);
                self.exporting = exporting.clone();
                self.scene.begin_recording(
                    exporting.framerate,
                    exporting.postroll,
                    direct,
                );
                true
            }
            Err(err) => {
                error!("failed to start recording: {}", err);
                false
            }
        }
    }

    fn stop_recording(&mut self) {
        if let Some(recorder) = self.recorder.take() {
            let stats = recorder.stop();
            info!(
                "wrote {} frames to '{}'",
                stats.frames_captured,
                stats.output_path.display()
            );
        }
        self.scene.end_recording();
    }

    fn capture(&mut self, rects: &[Rect]) {
        let clear = self.clear_color(true);
        let Some(recorder) = self.recorder.as_mut() else {
            return;
        };

        let pipeline = self.recording_rects.get_or_insert_with(|| {
            RectPipeline::new(&self.device, RECORDING_FORMAT, &self.shader)
        });
        pipeline.upload(&self.device, &self.queue, rects);

        let mut encoder =
            self.device
                .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                    label: Some("midiviz-recording-encoder"),
                });
        pipeline.draw(&mut encoder, recorder.target_view(), clear);

        if let Err(err) = recorder.capture(encoder) {
            error!("recording failed: {}", err);
            self.stop_recording();
        }
    }

    fn panel_status(&self) -> PanelStatus {
        PanelStatus {
            position: self.scene.position(),
            duration: self.scene.score().duration(),
            playing: self.scene.is_playing(),
            recording: self.scene.is_recording(),
            recorded_frames: self.scene.recorded_frames(),
            average_fps: self.average_fps,
            midi_name: self
                .midi_path()
                .and_then(Path::file_name)
                .map(|name| name.to_string_lossy().into_owned()),
        }
    }

    fn handle_panel_event(&mut self, event: PanelEvent) {
        match event {
            PanelEvent::TogglePlayback => self.scene.toggle_playback(),
            PanelEvent::Restart => self.scene.restart(),
            PanelEvent::Seek(position) => self.scene.seek(position),
            PanelEvent::Fullscreen => {
                self.scene.request(SystemAction::Fullscreen)
            }
            PanelEvent::Resize { width, height } => {
                self.scene.request(SystemAction::Resize { width, height })
            }
            PanelEvent::LoadMidi(path) => {
                if let Err(err) = self.load_file(&path) {
                    error!("{}", err);
                }
            }
            PanelEvent::LoadState(path) => {
                let mut state = State::new();
                match state.load_file(&path) {
                    Ok(()) => self.scene.apply_state(&state),
                    Err(err) => error!("{}", err),
                }
            }
            PanelEvent::SaveState(path) => {
                match self.scene.visuals().to_state().save(&path) {
                    Ok(()) => info!("saved preset to '{}'", path.display()),
                    Err(err) => error!("{}", err),
                }
            }
            PanelEvent::StartRecording { path, format } => {
                let exporting = Exporting {
                    path: Some(path),
                    format,
                    ..self.exporting.clone()
                };
                self.start_recording(&exporting, self.size, false);
            }
            PanelEvent::StopRecording => self.stop_recording(),
            PanelEvent::Quit => self.scene.request(SystemAction::Quit),
        }
    }
}

impl Visualizer<Frame> for Renderer {
    fn load_file(&mut self, path: &Path) -> Result<(), String> {
        let score = Score::load(path)?;
        self.scene.load_score(score, path);
        Ok(())
    }

    fn set_state(&mut self, state: &State) {
        self.scene.apply_state(state);
    }

    fn resize_and_rescale(&mut self, width: u32, height: u32, scale: f32) {
        self.resize(width, height);
        self.rescale(scale);
    }

    fn resize(&mut self, width: u32, height: u32) {
        self.size = [width.max(1), height.max(1)];
        self.panel.width = width;
        self.panel.height = height;
    }

    // Layout works in normalized coordinates and egui-winit tracks the
    // scale factor itself.
    fn rescale(&mut self, scale: f32) {
        debug!("scale factor is now {}", scale);
    }

    fn set_gui_scale(&mut self, scale: f32) {
        self.gui_scale = scale;
    }

    fn start_direct_recording(
        &mut self,
        exporting: &Exporting,
        framebuffer_size: [u32; 2],
    ) -> bool {
        self.start_recording(exporting, framebuffer_size, true)
    }

    fn draw(
        &mut self,
        time: f32,
        ui: &egui::Context,
        target: Option<&mut Frame>,
    ) -> SystemAction {
        if (ui.zoom_factor() - self.gui_scale).abs() > f32::EPSILON {
            ui.set_zoom_factor(self.gui_scale);
        }

        let position = self.scene.advance(time);
        let rects =
            layout::build(self.scene.score(), position, self.scene.visuals());

        if let Some(frame) = target {
            let clear = self.clear_color(false);
            self.rects.upload(&self.device, &self.queue, &rects);
            let (_, _, encoder, view) = frame.parts();
            self.rects.draw(encoder, view, clear);
        }

        if self.recorder.is_some() {
            self.capture(&rects);
            if self.scene.recording_complete() {
                self.stop_recording();
            }
        }

        if self.scene.visuals().show_gui {
            let status = self.panel_status();
            let events = panel::control_panel(
                ui,
                &status,
                self.scene.visuals_mut(),
                &mut self.panel,
            );
            for event in events {
                self.handle_panel_event(event);
            }
        }

        self.scene.next_action()
    }

    fn key_pressed(&mut self, code: KeyCode, state: ElementState) {
        self.scene.key_pressed(code, state);
    }

    fn frame_stats(&mut self, average_fps: f32) {
        self.average_fps = average_fps;
    }

    fn clean(&mut self) {
        if self.recorder.is_some() {
            warn!("stopping unfinished recording");
            self.stop_recording();
        }
    }
}
