pub mod handler;
pub mod jacket;
pub mod layout;
pub mod renderer;

pub use handler::create_image_router;
pub use jacket::{BackgroundImage, JacketProvider, JacketSource};
pub use layout::{Scene, build_scene};
pub use renderer::{RenderOptions, ResolvedImages, render_png, render_svg_to_png, scene_to_svg};
