//! Burn image, text and view-snapshot watermarks into videos and still images.
//!
//! A [`MediaItem`] names a source and an ordered list of overlay elements. [`MediaProcessor`]
//! builds a composite timeline from the source tracks, a layer tree for the overlays and an
//! orientation-correcting transform, then exports an MP4 through the system `ffmpeg` on a worker
//! thread and reports the result through a single completion.

#![forbid(unsafe_code)]

pub mod assets;
pub mod config;
pub mod encode;
pub mod export;
pub mod foundation;
pub mod job;
pub mod layer;
pub mod media;
pub mod processor;
pub mod render;
pub mod timeline;

pub use assets::{PreparedImage, SvgView, ViewSnapshot, decode_image, load_image};
pub use config::ProcessorConfig;
pub use export::{ExportDestination, ExportPreset, ExportSession, ExportStatus, FileType};
pub use foundation::core::{Affine, Canvas, Fps, FrameIndex, Rect, Rgba8, Size, Vec2};
pub use foundation::error::{WatermarkError, WatermarkResult};
pub use job::{ElementSpec, WatermarkJob};
pub use layer::{Layer, LayerContents, LayerTree, TextLayer, build_layer_tree};
pub use media::{
    AssetTrack, ElementContent, ElementKind, MediaElement, MediaItem, SourceAsset, TextContent,
    TrackKind, VideoAsset,
};
pub use processor::{MediaProcessResult, MediaProcessor, default_frame_rate};
pub use render::FrameRGBA;
pub use timeline::{Orientation, orientation_transform};
