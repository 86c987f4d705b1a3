pub mod composition;
pub mod orientation;
pub mod video_composition;

pub use composition::{Composition, CompositionTrack, CompositionTrackId, TimeRange, TrackSegment};
pub use orientation::{Orientation, orientation_transform};
pub use video_composition::{Instruction, LayerInstruction, VideoComposition};
