pub mod composite;
pub mod cpu;

pub use cpu::{FrameCompositor, OverlayRenderer};

/// One rendered frame in RGBA8 row-major order.
#[derive(Clone, Debug)]
pub struct FrameRGBA {
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
    pub premultiplied: bool,
}
