use crate::foundation::core::{Fps, FrameIndex};
use crate::foundation::error::WatermarkResult;
use crate::render::FrameRGBA;
use std::path::PathBuf;

/// Configuration provided to a [`FrameSink`] before the first frame.
#[derive(Debug, Clone)]
pub struct SinkConfig {
    /// Output width in pixels.
    pub width: u32,
    /// Output height in pixels.
    pub height: u32,
    /// Output frames-per-second.
    pub fps: Fps,
    /// Audio stream copied from a source file, starting at time zero.
    pub audio: Option<AudioPassthrough>,
}

/// A source audio stream muxed into the output alongside the rendered frames.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioPassthrough {
    pub path: PathBuf,
    /// Absolute stream index in the source container.
    pub stream_index: usize,
    /// Seconds of audio to keep.
    pub duration_sec: f64,
}

/// Sink contract for consuming composited frames in output order.
///
/// `push_frame` is called in strictly increasing `FrameIndex` order.
pub trait FrameSink: Send {
    /// Called once before any frames are pushed.
    fn begin(&mut self, cfg: SinkConfig) -> WatermarkResult<()>;
    /// Push one frame.
    fn push_frame(&mut self, idx: FrameIndex, frame: &FrameRGBA) -> WatermarkResult<()>;
    /// Called once after the last frame is pushed.
    fn end(&mut self) -> WatermarkResult<()>;
}

/// In-memory sink for tests and debugging.
#[derive(Debug, Default)]
pub struct InMemorySink {
    cfg: Option<SinkConfig>,
    frames: Vec<(FrameIndex, FrameRGBA)>,
    finished: bool,
}

impl InMemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Configuration captured in `begin`, if any.
    pub fn config(&self) -> Option<&SinkConfig> {
        self.cfg.as_ref()
    }

    pub fn frames(&self) -> &[(FrameIndex, FrameRGBA)] {
        &self.frames
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }
}

impl FrameSink for InMemorySink {
    fn begin(&mut self, cfg: SinkConfig) -> WatermarkResult<()> {
        self.cfg = Some(cfg);
        self.frames.clear();
        self.finished = false;
        Ok(())
    }

    fn push_frame(&mut self, idx: FrameIndex, frame: &FrameRGBA) -> WatermarkResult<()> {
        self.frames.push((idx, frame.clone()));
        Ok(())
    }

    fn end(&mut self) -> WatermarkResult<()> {
        self.finished = true;
        Ok(())
    }
}
