pub mod decode;
pub mod ffmpeg;
pub mod sink;

pub use decode::VideoFrameReader;
pub use ffmpeg::{FfmpegSink, FfmpegSinkOpts, is_ffmpeg_on_path};
pub use sink::{AudioPassthrough, FrameSink, InMemorySink, SinkConfig};
