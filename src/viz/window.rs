use std::sync::Arc;

use winit::{
    dpi::PhysicalSize,
    event_loop::EventLoop,
    window::{Window, WindowBuilder},
};

pub const DEFAULT_WINDOW_WIDTH: u32 = 1024;
pub const DEFAULT_WINDOW_HEIGHT: u32 = 768;
const WINDOW_TITLE: &str = "DynLab";

pub struct WindowManager {
    window: Arc<Window>,
}

impl WindowManager {
    pub fn new(event_loop: &EventLoop<()>) -> Result<Self, winit::error::OsError> {
        let window = WindowBuilder::new()
            .with_title(WINDOW_TITLE)
            .with_inner_size(PhysicalSize::new(DEFAULT_WINDOW_WIDTH, DEFAULT_WINDOW_HEIGHT))
            .build(event_loop)?;

        Ok(Self { window: Arc::new(window) })
    }

    pub fn window(&self) -> &Arc<Window> {
        &self.window
    }

    pub fn inner_size(&self) -> PhysicalSize<u32> {
        self.window.inner_size()
    }

    pub fn set_title(&self, title: &str) {
        self.window.set_title(title);
    }

    pub fn reset_title(&self) {
        self.window.set_title(WINDOW_TITLE);
    }

    pub fn request_redraw(&self) {
        self.window.request_redraw();
    }
}
