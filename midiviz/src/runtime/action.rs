use log::{debug, info};

/// A window-system effect requested by the renderer for the current frame.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum SystemAction {
    #[default]
    None,
    Fullscreen,
    Resize {
        width: u32,
        height: u32,
    },
    FixSize,
    FreeSize,
    Quit,
}

/// Last known windowed position and size, in logical screen coordinates.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct WindowFrame {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl WindowFrame {
    pub fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn capture<W: WindowSystem + ?Sized>(window: &W) -> Self {
        let mut frame = Self::default();
        frame.reread(window);
        frame
    }

    // Overwrites the record with whatever the window system reports now.
    pub fn reread<W: WindowSystem + ?Sized>(&mut self, window: &W) {
        let (x, y) = window.position();
        let (width, height) = window.size();
        self.x = x;
        self.y = y;
        self.width = width;
        self.height = height;
    }

    pub fn position(&self) -> [i32; 2] {
        [self.x, self.y]
    }

    pub fn size(&self) -> [u32; 2] {
        [self.width, self.height]
    }
}

/// Native window and presentation surface as seen by the session.
///
/// Geometry is in logical screen coordinates except
/// [`WindowSystem::framebuffer_size`], which is in physical pixels.
pub trait WindowSystem {
    /// One acquired presentation target.
    type Target;

    fn position(&self) -> (i32, i32);

    fn size(&self) -> (u32, u32);

    fn framebuffer_size(&self) -> (u32, u32);

    /// True while the window is attached to a monitor.
    fn is_fullscreen(&self) -> bool;

    /// Moves the window to the primary monitor at its native video mode.
    fn enter_fullscreen(&mut self);

    /// Detaches from the monitor and places the window at `frame`.
    fn restore_windowed(&mut self, frame: &WindowFrame);

    fn set_size(&mut self, width: u32, height: u32);

    fn set_resizable(&mut self, resizable: bool);

    /// 0 disables vertical sync, anything else enables it.
    fn set_swap_interval(&mut self, interval: u32);

    fn set_should_close(&mut self);

    fn should_close(&self) -> bool;

    /// Reconfigures the presentation surface after a framebuffer resize.
    fn resize_surface(&mut self, _width: u32, _height: u32) {}

    /// Called once the window system has reported a move or resize, so
    /// geometry requested earlier is now live.
    fn refresh_geometry(&mut self) {}

    fn acquire_frame(&mut self) -> Option<Self::Target>;

    fn swap_buffers(&mut self, target: Self::Target);
}

/// Applies one requested action to the live window.
pub fn perform_action<W: WindowSystem + ?Sized>(
    action: SystemAction,
    window: &mut W,
    frame: &mut WindowFrame,
) {
    match action {
        SystemAction::None => {}
        SystemAction::Fullscreen => {
            if window.is_fullscreen() {
                window.restore_windowed(frame);
                // The target display may be smaller than the saved frame.
                frame.reread(window);
                info!(
                    "left fullscreen at {}x{} ({}, {})",
                    frame.width, frame.height, frame.x, frame.y
                );
            } else {
                frame.reread(window);
                window.enter_fullscreen();
                info!("entered fullscreen");
            }

            // Some platforms drop the swap interval on monitor changes.
            window.set_swap_interval(1);
        }
        SystemAction::Resize { width, height } => {
            if window.is_fullscreen() {
                debug!(
                    "deferring resize to {}x{} until fullscreen ends",
                    width, height
                );
                frame.width = width;
                frame.height = height;
                return;
            }

            window.set_size(width, height);
            frame.reread(window);
            debug!(
                "resized window to {}x{} (requested {}x{})",
                frame.width, frame.height, width, height
            );
        }
        SystemAction::FixSize => {
            window.set_resizable(false);
            window.set_swap_interval(0);
        }
        SystemAction::FreeSize => {
            window.set_resizable(true);
            window.set_swap_interval(1);
        }
        SystemAction::Quit => {
            window.set_should_close();
        }
    }
}

/// Ratio between framebuffer pixels and window units.
pub fn framebuffer_scale(framebuffer_width: u32, window_width: u32) -> f32 {
    framebuffer_width as f32 / window_width.max(1) as f32
}
