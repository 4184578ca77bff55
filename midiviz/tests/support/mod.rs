#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::env;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use midiviz::config::{Configuration, Exporting};
use midiviz::runtime::action::{SystemAction, WindowFrame, WindowSystem};
use midiviz::runtime::session::{Overlay, Visualizer};
use midiviz::state::State;
use winit::event::{ElementState, WindowEvent};
use winit::keyboard::KeyCode;

pub fn gpu_tests_enabled() -> bool {
    matches!(
        env::var("MIDIVIZ_RUN_GPU_TESTS")
            .unwrap_or_default()
            .to_ascii_lowercase()
            .as_str(),
        "1" | "true" | "yes" | "on"
    )
}

pub fn scratch_dir(name: &str) -> PathBuf {
    let dir = env::temp_dir()
        .join(format!("midiviz-tests-{}", std::process::id()))
        .join(name);
    std::fs::create_dir_all(&dir).expect("create scratch dir");
    dir
}

pub fn config(args: &[&str]) -> Configuration {
    let missing = env::temp_dir().join("midiviz-tests-missing/settings.json");
    let args = std::iter::once("midiviz").chain(args.iter().copied());
    Configuration::new(&missing, args).expect("valid test arguments")
}

/// Ordered record of every side effect, shared by all mocks.
#[derive(Clone, Default)]
pub struct CallLog(Rc<RefCell<Vec<String>>>);

impl CallLog {
    pub fn push(&self, entry: impl Into<String>) {
        self.0.borrow_mut().push(entry.into());
    }

    pub fn entries(&self) -> Vec<String> {
        self.0.borrow().clone()
    }

    pub fn clear(&self) {
        self.0.borrow_mut().clear();
    }

    pub fn count(&self, entry: &str) -> usize {
        self.0.borrow().iter().filter(|e| *e == entry).count()
    }

    pub fn position(&self, entry: &str) -> Option<usize> {
        self.0.borrow().iter().position(|e| e == entry)
    }
}

/// A window on a single monitor that clamps windowed geometry to it.
pub struct MockWindow {
    pub log: CallLog,
    pub position: (i32, i32),
    pub size: (u32, u32),
    pub pixel_ratio: u32,
    pub monitor: (u32, u32),
    pub fullscreen: bool,
    pub resizable: bool,
    pub swap_interval: u32,
    pub should_close: bool,
    pub frames_acquired: u64,
}

impl MockWindow {
    pub fn new(log: &CallLog) -> Self {
        Self {
            log: log.clone(),
            position: (100, 100),
            size: (800, 600),
            pixel_ratio: 1,
            monitor: (1920, 1080),
            fullscreen: false,
            resizable: true,
            swap_interval: 1,
            should_close: false,
            frames_acquired: 0,
        }
    }

    pub fn geometry(&self) -> WindowFrame {
        WindowFrame::new(
            self.position.0,
            self.position.1,
            self.size.0,
            self.size.1,
        )
    }

    fn clamp_size(&self, width: u32, height: u32) -> (u32, u32) {
        (width.min(self.monitor.0), height.min(self.monitor.1))
    }
}

impl WindowSystem for MockWindow {
    type Target = u64;

    fn position(&self) -> (i32, i32) {
        self.position
    }

    fn size(&self) -> (u32, u32) {
        self.size
    }

    fn framebuffer_size(&self) -> (u32, u32) {
        (self.size.0 * self.pixel_ratio, self.size.1 * self.pixel_ratio)
    }

    fn is_fullscreen(&self) -> bool {
        self.fullscreen
    }

    fn enter_fullscreen(&mut self) {
        self.log.push("enter_fullscreen");
        self.fullscreen = true;
        self.position = (0, 0);
        self.size = self.monitor;
    }

    fn restore_windowed(&mut self, frame: &WindowFrame) {
        self.log.push("restore_windowed");
        self.fullscreen = false;
        self.size = self.clamp_size(frame.width, frame.height);
        self.position = (frame.x.max(0), frame.y.max(0));
    }

    fn set_size(&mut self, width: u32, height: u32) {
        self.log.push(format!("set_size({},{})", width, height));
        self.size = self.clamp_size(width, height);
    }

    fn set_resizable(&mut self, resizable: bool) {
        self.log.push(format!("set_resizable({})", resizable));
        self.resizable = resizable;
    }

    fn set_swap_interval(&mut self, interval: u32) {
        self.log.push(format!("swap_interval({})", interval));
        self.swap_interval = interval;
    }

    fn set_should_close(&mut self) {
        self.log.push("set_should_close");
        self.should_close = true;
    }

    fn should_close(&self) -> bool {
        self.should_close
    }

    fn resize_surface(&mut self, width: u32, height: u32) {
        self.log.push(format!("resize_surface({},{})", width, height));
    }

    fn acquire_frame(&mut self) -> Option<u64> {
        self.log.push("acquire_frame");
        self.frames_acquired += 1;
        Some(self.frames_acquired)
    }

    fn swap_buffers(&mut self, target: u64) {
        self.log.push(format!("swap_buffers({})", target));
    }
}

impl Drop for MockWindow {
    fn drop(&mut self) {
        self.log.push("drop:window");
    }
}

pub struct MockVisualizer {
    pub log: CallLog,
    pub actions: VecDeque<SystemAction>,
    pub recording_succeeds: bool,
    pub fail_loads: bool,
    pub state: State,
}

impl MockVisualizer {
    pub fn new(log: &CallLog) -> Self {
        Self {
            log: log.clone(),
            actions: VecDeque::new(),
            recording_succeeds: true,
            fail_loads: false,
            state: State::new(),
        }
    }

    pub fn with_actions(
        log: &CallLog,
        actions: impl IntoIterator<Item = SystemAction>,
    ) -> Self {
        let mut visualizer = Self::new(log);
        visualizer.actions = actions.into_iter().collect();
        visualizer
    }
}

impl Visualizer<u64> for MockVisualizer {
    fn load_file(&mut self, path: &Path) -> Result<(), String> {
        self.log.push(format!("load_file({})", path.display()));
        if self.fail_loads {
            return Err("unreadable".to_string());
        }
        Ok(())
    }

    fn set_state(&mut self, state: &State) {
        let entries: Vec<String> =
            state.iter().map(|(k, v)| format!("{}={}", k, v)).collect();
        self.log.push(format!("set_state({})", entries.join(",")));
        self.state = state.clone();
    }

    fn resize_and_rescale(&mut self, width: u32, height: u32, scale: f32) {
        self.log.push(format!(
            "resize_and_rescale({},{},{})",
            width, height, scale
        ));
    }

    fn resize(&mut self, width: u32, height: u32) {
        self.log.push(format!("resize({},{})", width, height));
    }

    fn rescale(&mut self, scale: f32) {
        self.log.push(format!("rescale({})", scale));
    }

    fn set_gui_scale(&mut self, scale: f32) {
        self.log.push(format!("set_gui_scale({})", scale));
    }

    fn start_direct_recording(
        &mut self,
        _exporting: &Exporting,
        framebuffer_size: [u32; 2],
    ) -> bool {
        self.log.push(format!(
            "start_direct_recording({},{})",
            framebuffer_size[0], framebuffer_size[1]
        ));
        self.recording_succeeds
    }

    fn draw(
        &mut self,
        _time: f32,
        _ui: &egui::Context,
        target: Option<&mut u64>,
    ) -> SystemAction {
        match target {
            Some(target) => self.log.push(format!("draw({})", target)),
            None => self.log.push("draw"),
        }
        self.actions.pop_front().unwrap_or_default()
    }

    fn key_pressed(&mut self, code: KeyCode, state: ElementState) {
        self.log.push(format!("key({:?},{:?})", code, state));
    }

    fn clean(&mut self) {
        self.log.push("clean");
    }
}

impl Drop for MockVisualizer {
    fn drop(&mut self) {
        self.log.push("drop:visualizer");
    }
}

pub struct MockOverlay {
    pub log: CallLog,
    pub ctx: egui::Context,
    pub wants_keyboard: Rc<Cell<bool>>,
}

impl MockOverlay {
    pub fn new(log: &CallLog) -> Self {
        Self {
            log: log.clone(),
            ctx: egui::Context::default(),
            wants_keyboard: Rc::new(Cell::new(false)),
        }
    }
}

impl Overlay<MockWindow> for MockOverlay {
    fn context(&self) -> &egui::Context {
        &self.ctx
    }

    fn wants_keyboard(&self) -> bool {
        self.wants_keyboard.get()
    }

    fn begin_frame(&mut self, _window: &MockWindow) {
        self.log.push("ui_begin");
    }

    fn end_frame(&mut self, _window: &MockWindow, target: Option<&mut u64>) {
        match target {
            Some(target) => self.log.push(format!("ui_end({})", target)),
            None => self.log.push("ui_end"),
        }
    }

    fn on_window_event(&mut self, _window: &MockWindow, _event: &WindowEvent) {
        self.log.push("ui_event");
    }

    fn shutdown(&mut self) {
        self.log.push("ui_shutdown");
    }
}

impl Drop for MockOverlay {
    fn drop(&mut self) {
        self.log.push("drop:overlay");
    }
}
