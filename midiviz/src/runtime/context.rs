use std::sync::Arc;

use log::{debug, error, info, warn};
use winit::dpi::{LogicalPosition, LogicalSize};
use winit::monitor::{MonitorHandle, VideoModeHandle};
use winit::window::{Fullscreen, Window};

use super::action::{WindowFrame, WindowSystem};
use super::app::StartupError;
use crate::render::frame::Frame;

/// The native window together with its wgpu surface and device.
pub struct GraphicsContext {
    window: Arc<Window>,
    surface: wgpu::Surface<'static>,
    surface_config: wgpu::SurfaceConfiguration,
    device: Arc<wgpu::Device>,
    queue: Arc<wgpu::Queue>,
    transparent: bool,
    // Requested geometry the window system has not confirmed yet.
    pending: Option<WindowFrame>,
    needs_reconfigure: bool,
    should_close: bool,
}

impl GraphicsContext {
    pub fn new(
        window: Arc<Window>,
        prevent_transparency: bool,
    ) -> Result<Self, StartupError> {
        let instance =
            wgpu::Instance::new(&wgpu::InstanceDescriptor::default());

        let surface = instance
            .create_surface(window.clone())
            .map_err(|err| StartupError::Surface(err.to_string()))?;

        let adapter = pollster::block_on(instance.request_adapter(
            &wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                force_fallback_adapter: false,
                compatible_surface: Some(&surface),
            },
        ))
        .map_err(|err| StartupError::Adapter(err.to_string()))?;

        let info = adapter.get_info();
        info!("using {} ({:?})", info.name, info.backend);

        let (device, queue) = pollster::block_on(adapter.request_device(
            &wgpu::DeviceDescriptor {
                label: Some("midiviz-device"),
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::default()
                    .using_resolution(adapter.limits()),
                memory_hints: wgpu::MemoryHints::Performance,
                ..Default::default()
            },
        ))
        .map_err(|err| StartupError::Device(err.to_string()))?;

        let caps = surface.get_capabilities(&adapter);
        let format = choose_surface_format(&caps.formats).ok_or_else(|| {
            StartupError::Device("surface has no supported formats".into())
        })?;
        let (alpha_mode, transparent) =
            choose_alpha_mode(&caps.alpha_modes, prevent_transparency);
        debug!(
            "surface format {:?}, alpha {:?}, transparent {}",
            format, alpha_mode, transparent
        );

        let size = window.inner_size();
        let surface_config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode: wgpu::PresentMode::AutoVsync,
            alpha_mode,
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &surface_config);

        Ok(Self {
            window,
            surface,
            surface_config,
            device: Arc::new(device),
            queue: Arc::new(queue),
            transparent,
            pending: None,
            needs_reconfigure: false,
            should_close: false,
        })
    }

    pub fn window(&self) -> &Window {
        &self.window
    }

    pub fn device(&self) -> &Arc<wgpu::Device> {
        &self.device
    }

    pub fn queue(&self) -> &Arc<wgpu::Queue> {
        &self.queue
    }

    pub fn format(&self) -> wgpu::TextureFormat {
        self.surface_config.format
    }

    pub fn is_transparent(&self) -> bool {
        self.transparent
    }

    fn scale_factor(&self) -> f64 {
        self.window.scale_factor()
    }

    // Applies a logical size request. Returns the size that is in effect
    // now, or the request itself when the window system answers later.
    fn request_size(&self, width: u32, height: u32) -> (u32, u32) {
        match self.window.request_inner_size(LogicalSize::new(width, height)) {
            Some(size) => {
                let size = size.to_logical::<u32>(self.scale_factor());
                (size.width, size.height)
            }
            None => (width, height),
        }
    }
}

impl WindowSystem for GraphicsContext {
    type Target = Frame;

    fn position(&self) -> (i32, i32) {
        if let Some(pending) = self.pending {
            return (pending.x, pending.y);
        }

        let position = self
            .window
            .outer_position()
            .unwrap_or_default()
            .to_logical::<i32>(self.scale_factor());
        (position.x, position.y)
    }

    fn size(&self) -> (u32, u32) {
        if let Some(pending) = self.pending {
            return (pending.width, pending.height);
        }

        let size = self
            .window
            .inner_size()
            .to_logical::<u32>(self.scale_factor());
        (size.width, size.height)
    }

    fn framebuffer_size(&self) -> (u32, u32) {
        let size = self.window.inner_size();
        (size.width, size.height)
    }

    fn is_fullscreen(&self) -> bool {
        self.window.fullscreen().is_some()
    }

    fn enter_fullscreen(&mut self) {
        let monitor = self
            .window
            .primary_monitor()
            .or_else(|| self.window.current_monitor());

        let fullscreen = match monitor {
            Some(monitor) => match native_video_mode(&monitor) {
                Some(mode) => {
                    debug!(
                        "exclusive fullscreen {}x{} @ {}mHz",
                        mode.size().width,
                        mode.size().height,
                        mode.refresh_rate_millihertz()
                    );
                    Fullscreen::Exclusive(mode)
                }
                None => Fullscreen::Borderless(Some(monitor)),
            },
            None => {
                warn!("no monitor found; using borderless fullscreen");
                Fullscreen::Borderless(None)
            }
        };

        self.window.set_fullscreen(Some(fullscreen));
    }

    fn restore_windowed(&mut self, frame: &WindowFrame) {
        self.window.set_fullscreen(None);
        let (width, height) = self.request_size(frame.width, frame.height);
        self.window
            .set_outer_position(LogicalPosition::new(frame.x, frame.y));
        self.pending = Some(WindowFrame::new(frame.x, frame.y, width, height));
    }

    fn set_size(&mut self, width: u32, height: u32) {
        let (x, y) = self.position();
        let (width, height) = self.request_size(width, height);
        self.pending = Some(WindowFrame::new(x, y, width, height));
    }

    fn set_resizable(&mut self, resizable: bool) {
        self.window.set_resizable(resizable);
    }

    fn set_swap_interval(&mut self, interval: u32) {
        let present_mode = if interval == 0 {
            wgpu::PresentMode::AutoNoVsync
        } else {
            wgpu::PresentMode::AutoVsync
        };

        if self.surface_config.present_mode != present_mode {
            self.surface_config.present_mode = present_mode;
            self.needs_reconfigure = true;
        }
    }

    fn set_should_close(&mut self) {
        self.should_close = true;
    }

    fn should_close(&self) -> bool {
        self.should_close
    }

    fn refresh_geometry(&mut self) {
        self.pending = None;
    }

    fn resize_surface(&mut self, width: u32, height: u32) {
        if width == 0 || height == 0 {
            return;
        }

        self.surface_config.width = width;
        self.surface_config.height = height;
        self.needs_reconfigure = true;
    }

    fn acquire_frame(&mut self) -> Option<Frame> {
        if self.needs_reconfigure {
            self.surface.configure(&self.device, &self.surface_config);
            self.needs_reconfigure = false;
        }

        let output = match self.surface.get_current_texture() {
            Ok(output) => output,
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                self.surface.configure(&self.device, &self.surface_config);
                return None;
            }
            Err(wgpu::SurfaceError::Timeout) => {
                warn!("surface timeout while acquiring frame");
                return None;
            }
            Err(wgpu::SurfaceError::OutOfMemory) => {
                error!("surface out of memory; exiting");
                self.should_close = true;
                return None;
            }
            Err(wgpu::SurfaceError::Other) => {
                warn!("surface error while acquiring frame");
                return None;
            }
        };

        Some(Frame::new(self.device.clone(), self.queue.clone(), output))
    }

    fn swap_buffers(&mut self, target: Frame) {
        self.window.pre_present_notify();
        target.submit();
    }
}

// Full resolution of the monitor at its highest refresh rate.
fn native_video_mode(monitor: &MonitorHandle) -> Option<VideoModeHandle> {
    let size = monitor.size();
    monitor
        .video_modes()
        .filter(|mode| mode.size() == size)
        .max_by_key(|mode| (mode.refresh_rate_millihertz(), mode.bit_depth()))
}

fn choose_surface_format(
    formats: &[wgpu::TextureFormat],
) -> Option<wgpu::TextureFormat> {
    formats
        .iter()
        .copied()
        .find(|f| {
            matches!(
                f,
                wgpu::TextureFormat::Bgra8Unorm
                    | wgpu::TextureFormat::Rgba8Unorm
            )
        })
        .or_else(|| formats.iter().copied().find(|f| !f.is_srgb()))
        .or_else(|| formats.first().copied())
}

fn choose_alpha_mode(
    modes: &[wgpu::CompositeAlphaMode],
    prevent_transparency: bool,
) -> (wgpu::CompositeAlphaMode, bool) {
    if !prevent_transparency {
        for mode in [
            wgpu::CompositeAlphaMode::PreMultiplied,
            wgpu::CompositeAlphaMode::PostMultiplied,
        ] {
            if modes.contains(&mode) {
                return (mode, true);
            }
        }
    }

    if modes.contains(&wgpu::CompositeAlphaMode::Opaque) {
        return (wgpu::CompositeAlphaMode::Opaque, false);
    }

    (
        modes
            .first()
            .copied()
            .unwrap_or(wgpu::CompositeAlphaMode::Auto),
        false,
    )
}
