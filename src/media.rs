pub mod item;
pub mod probe;

pub use item::{
    ElementContent, ElementKind, MediaElement, MediaItem, SourceAsset, TextContent,
};
pub use probe::{AssetTrack, TrackKind, VideoAsset};
