use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use log::{error, info, warn};
use winit::application::ApplicationHandler;
use winit::dpi::{LogicalPosition, LogicalSize};
use winit::event::WindowEvent;
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::window::{WindowAttributes, WindowId};

use super::context::GraphicsContext;
use super::session::Session;
use crate::config::Configuration;
use crate::config::settings::save_settings;
use crate::render::renderer::Renderer;
use crate::resources::Resources;
use crate::ui::EguiOverlay;

/// Fatal errors before the first frame.
#[derive(Debug)]
pub enum StartupError {
    EventLoop(String),
    Window(String),
    Surface(String),
    Adapter(String),
    Device(String),
    Resources(String),
}

impl StartupError {
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::EventLoop(_) | Self::Window(_) | Self::Surface(_) => 2,
            Self::Adapter(_) | Self::Device(_) | Self::Resources(_) => -1,
        }
    }
}

impl fmt::Display for StartupError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EventLoop(err) => write!(f, "event loop: {}", err),
            Self::Window(err) => write!(f, "window: {}", err),
            Self::Surface(err) => write!(f, "surface: {}", err),
            Self::Adapter(err) => write!(f, "graphics adapter: {}", err),
            Self::Device(err) => write!(f, "graphics device: {}", err),
            Self::Resources(err) => write!(f, "resources: {}", err),
        }
    }
}

impl std::error::Error for StartupError {}

type AppSession = Session<GraphicsContext, Renderer, EguiOverlay>;

struct MidivizApp {
    config: Configuration,
    settings_path: PathBuf,
    session: Option<AppSession>,
    window_id: Option<WindowId>,
    failure: Option<StartupError>,
}

impl MidivizApp {
    fn new(config: Configuration, settings_path: PathBuf) -> Self {
        Self {
            config,
            settings_path,
            session: None,
            window_id: None,
            failure: None,
        }
    }

    // Window, graphics context, resources, renderer, UI, then the session.
    fn init_session(
        &self,
        event_loop: &ActiveEventLoop,
    ) -> Result<AppSession, StartupError> {
        let config = &self.config;
        let [width, height] = config.window_size;
        let [x, y] = config.window_position;

        let attrs = WindowAttributes::default()
            .with_title("midiviz")
            .with_inner_size(LogicalSize::new(width, height))
            .with_position(LogicalPosition::new(x, y))
            .with_visible(!config.hide_window)
            .with_transparent(!config.prevent_transparency);

        let window = Arc::new(
            event_loop
                .create_window(attrs)
                .map_err(|err| StartupError::Window(err.to_string()))?,
        );

        let context =
            GraphicsContext::new(window, config.prevent_transparency)?;
        let resources = Resources::load().map_err(StartupError::Resources)?;

        let renderer = Renderer::new(
            context.device().clone(),
            context.queue().clone(),
            context.format(),
            context.is_transparent(),
            &resources,
        );

        let overlay = EguiOverlay::new(&context);

        Ok(Session::start(config, context, renderer, overlay))
    }

    fn close(&mut self) {
        let Some(session) = self.session.take() else {
            return;
        };

        let settings = self.config.to_persisted(
            session.window_frame(),
            session.visualizer().midi_path().map(Path::to_path_buf),
        );
        match save_settings(&self.settings_path, &settings) {
            Ok(()) => info!("saved settings to {:?}", self.settings_path),
            Err(err) => warn!("failed to save settings: {}", err),
        }

        session.shutdown();
    }
}

impl ApplicationHandler for MidivizApp {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.session.is_some() || self.failure.is_some() {
            return;
        }

        match self.init_session(event_loop) {
            Ok(session) => {
                let transparent = session.window().is_transparent();
                self.config.set_transparency_achieved(transparent);

                let window = session.window().window();
                self.window_id = Some(window.id());

                let closing = session.should_close();
                if !closing {
                    window.request_redraw();
                }
                self.session = Some(session);
                if closing {
                    event_loop.exit();
                }
            }
            Err(err) => {
                error!("failed to start: {}", err);
                self.failure = Some(err);
                event_loop.exit();
            }
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        window_id: WindowId,
        event: WindowEvent,
    ) {
        if self.window_id != Some(window_id) {
            return;
        }
        let Some(session) = self.session.as_mut() else {
            return;
        };

        match event {
            WindowEvent::RedrawRequested => {
                if !session.should_close() {
                    session.frame();
                }
            }
            WindowEvent::Destroyed => session.on_close_requested(),
            event => session.handle_window_event(&event),
        }

        if session.should_close() {
            event_loop.exit();
        }
    }

    fn about_to_wait(&mut self, event_loop: &ActiveEventLoop) {
        let Some(session) = self.session.as_ref() else {
            return;
        };

        if session.should_close() {
            event_loop.exit();
            return;
        }

        session.window().window().request_redraw();
    }

    fn exiting(&mut self, _event_loop: &ActiveEventLoop) {
        self.close();
    }
}

/// Runs the visualizer until the window closes and returns the process exit
/// code.
pub fn run(config: Configuration, settings_path: PathBuf) -> i32 {
    let event_loop = match EventLoop::new() {
        Ok(event_loop) => event_loop,
        Err(err) => {
            let err = StartupError::EventLoop(err.to_string());
            error!("failed to start: {}", err);
            return err.exit_code();
        }
    };
    event_loop.set_control_flow(ControlFlow::Poll);

    let mut app = MidivizApp::new(config, settings_path);
    if let Err(err) = event_loop.run_app(&mut app) {
        error!("event loop error: {}", err);
        app.close();
        return StartupError::EventLoop(err.to_string()).exit_code();
    }

    // Not every platform calls `exiting`.
    app.close();

    match app.failure {
        Some(err) => err.exit_code(),
        None => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn window_failures_exit_with_two() {
        assert_eq!(StartupError::EventLoop("x".into()).exit_code(), 2);
        assert_eq!(StartupError::Window("x".into()).exit_code(), 2);
        assert_eq!(StartupError::Surface("x".into()).exit_code(), 2);
    }

    #[test]
    fn graphics_failures_exit_with_minus_one() {
        assert_eq!(StartupError::Adapter("x".into()).exit_code(), -1);
        assert_eq!(StartupError::Device("x".into()).exit_code(), -1);
        assert_eq!(StartupError::Resources("x".into()).exit_code(), -1);
    }
}
