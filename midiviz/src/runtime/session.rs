use std::path::Path;
use std::time::Instant;

use log::{debug, info, warn};
use winit::event::{ElementState, WindowEvent};
use winit::keyboard::{KeyCode, PhysicalKey};

use super::action::{
    SystemAction, WindowFrame, WindowSystem, framebuffer_scale,
    perform_action,
};
use super::clock::PlaybackClock;
use crate::config::{Configuration, Exporting};
use crate::state::State;

/// The drawing side of a session: owns the score, the visual state and any
/// active recording.
pub trait Visualizer<T> {
    fn load_file(&mut self, path: &Path) -> Result<(), String>;

    fn set_state(&mut self, state: &State);

    fn resize_and_rescale(&mut self, width: u32, height: u32, scale: f32);

    fn resize(&mut self, width: u32, height: u32);

    fn rescale(&mut self, scale: f32);

    fn set_gui_scale(&mut self, scale: f32);

    /// Returns false when the recording could not be started.
    fn start_direct_recording(
        &mut self,
        exporting: &Exporting,
        framebuffer_size: [u32; 2],
    ) -> bool;

    /// Renders one frame and returns the window effect it wants, if any.
    fn draw(
        &mut self,
        time: f32,
        ui: &egui::Context,
        target: Option<&mut T>,
    ) -> SystemAction;

    fn key_pressed(&mut self, code: KeyCode, state: ElementState);

    fn frame_stats(&mut self, _average_fps: f32) {}

    fn clean(&mut self);
}

/// Immediate mode UI layered on top of the visualizer output.
pub trait Overlay<W: WindowSystem> {
    fn context(&self) -> &egui::Context;

    fn wants_keyboard(&self) -> bool {
        self.context().wants_keyboard_input()
    }

    fn begin_frame(&mut self, window: &W);

    fn end_frame(&mut self, window: &W, target: Option<&mut W::Target>);

    fn on_window_event(&mut self, window: &W, event: &WindowEvent);

    fn shutdown(&mut self);
}

/// Merges the preset file named by the configuration with its command line
/// overrides. Overrides win.
pub fn initial_state(config: &Configuration) -> State {
    let mut state = State::new();

    if let Some(path) = config.last_config_path.as_deref() {
        if let Err(err) = state.load_file(path) {
            warn!("failed to load preset '{}': {}", path.display(), err);
        }
    }

    state.load_args(config.args());
    state
}

pub struct Session<W, V, O>
where
    W: WindowSystem,
    V: Visualizer<W::Target>,
    O: Overlay<W>,
{
    window: W,
    visualizer: V,
    overlay: O,
    frame: WindowFrame,
    clock: PlaybackClock,
    frames: u64,
    dispatches: u64,
}

impl<W, V, O> Session<W, V, O>
where
    W: WindowSystem,
    V: Visualizer<W::Target>,
    O: Overlay<W>,
{
    /// Applies configuration and state to freshly created collaborators.
    /// May leave the close flag set, in which case no frame should run.
    pub fn start(
        config: &Configuration,
        window: W,
        visualizer: V,
        overlay: O,
    ) -> Self {
        Self::start_with_clock(
            config,
            window,
            visualizer,
            overlay,
            PlaybackClock::from_env(),
        )
    }

    pub fn start_with_clock(
        config: &Configuration,
        window: W,
        mut visualizer: V,
        overlay: O,
        clock: PlaybackClock,
    ) -> Self {
        if let Some(path) = config.last_midi_path.as_deref() {
            match visualizer.load_file(path) {
                Ok(()) => info!("loaded '{}'", path.display()),
                Err(err) => {
                    warn!("failed to load '{}': {}", path.display(), err)
                }
            }
        }

        let state = initial_state(config);
        debug!("initial state has {} entries", state.len());
        visualizer.set_state(&state);

        let mut window = window;
        let frame = WindowFrame::capture(&window);
        window.set_swap_interval(1);

        let (fb_width, fb_height) = window.framebuffer_size();
        let scale = framebuffer_scale(fb_width, frame.width);
        visualizer.resize_and_rescale(fb_width, fb_height, scale);
        visualizer.set_gui_scale(config.gui_scale);

        let mut session = Self {
            window,
            visualizer,
            overlay,
            frame,
            clock,
            frames: 0,
            dispatches: 0,
        };

        if config.exporting.is_requested() {
            let size = [fb_width, fb_height];
            if !session
                .visualizer
                .start_direct_recording(&config.exporting, size)
            {
                warn!("could not start recording; quitting");
                session.dispatch(SystemAction::Quit);
            }
        }

        if config.fullscreen {
            session.dispatch(SystemAction::Fullscreen);
        }

        session
    }

    // One pass of the loop: UI begin, draw, dispatch, UI composite, present.
    pub fn frame(&mut self) {
        let time = self.clock.tick(Instant::now());
        self.visualizer.frame_stats(self.clock.average_fps());

        self.overlay.begin_frame(&self.window);

        let mut target = self.window.acquire_frame();
        let action =
            self.visualizer
                .draw(time, self.overlay.context(), target.as_mut());

        self.dispatch(action);

        self.overlay.end_frame(&self.window, target.as_mut());

        if let Some(target) = target {
            self.window.swap_buffers(target);
        }

        self.frames += 1;
    }

    pub fn dispatch(&mut self, action: SystemAction) {
        if action != SystemAction::None {
            debug!("dispatching {:?}", action);
        }
        perform_action(action, &mut self.window, &mut self.frame);
        self.dispatches += 1;
    }

    /// Routes one native window event. The overlay always sees it first.
    pub fn handle_window_event(&mut self, event: &WindowEvent) {
        self.overlay.on_window_event(&self.window, event);

        match event {
            WindowEvent::CloseRequested => self.on_close_requested(),
            WindowEvent::KeyboardInput { event, .. } => {
                if let PhysicalKey::Code(code) = event.physical_key {
                    self.on_key(code, event.state);
                }
            }
            WindowEvent::Resized(size) => {
                self.on_framebuffer_resize(size.width, size.height);
                self.on_geometry_changed();
            }
            WindowEvent::Moved(_) => self.on_geometry_changed(),
            WindowEvent::ScaleFactorChanged { scale_factor, .. } => {
                self.on_rescale(*scale_factor as f32)
            }
            _ => {}
        }
    }

    pub fn on_key(&mut self, code: KeyCode, state: ElementState) {
        if self.overlay.wants_keyboard() {
            return;
        }
        self.visualizer.key_pressed(code, state);
    }

    pub fn on_framebuffer_resize(&mut self, width: u32, height: u32) {
        self.window.resize_surface(width, height);
        self.visualizer.resize(width, height);
    }

    /// Keeps the windowed frame record in step with moves and resizes the
    /// window system reports. Fullscreen geometry is never recorded.
    pub fn on_geometry_changed(&mut self) {
        self.window.refresh_geometry();
        if !self.window.is_fullscreen() {
            self.frame.reread(&self.window);
        }
    }

    pub fn on_rescale(&mut self, scale: f32) {
        self.visualizer.rescale(scale);
    }

    pub fn on_close_requested(&mut self) {
        self.window.set_should_close();
    }

    pub fn should_close(&self) -> bool {
        self.window.should_close()
    }

    pub fn window(&self) -> &W {
        &self.window
    }

    pub fn window_mut(&mut self) -> &mut W {
        &mut self.window
    }

    pub fn visualizer(&self) -> &V {
        &self.visualizer
    }

    pub fn window_frame(&self) -> &WindowFrame {
        &self.frame
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }

    pub fn dispatches(&self) -> u64 {
        self.dispatches
    }

    /// UI first, then the visualizer, then the window. Consumes the session
    /// so it can only happen once.
    pub fn shutdown(self) {
        let Self {
            window,
            mut visualizer,
            mut overlay,
            ..
        } = self;

        overlay.shutdown();
        visualizer.clean();
        drop(visualizer);
        drop(overlay);
        drop(window);
        info!("session closed");
    }
}
