//! Window, surface and sphere drawing.

pub mod renderer;
pub mod uniforms;
pub mod window;

pub use renderer::{RenderError, Renderer, Scene};
pub use window::WindowManager;
