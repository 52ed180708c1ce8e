pub mod gemini;
pub mod image;
pub mod request;
pub mod text;
pub mod thread;

pub use image::*;
pub use request::*;
pub use text::*;
pub use thread::*;
