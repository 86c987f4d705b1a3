//! Render layer tree: a parent layer holding the video layer and the overlay layer, which in turn
//! holds one child layer per overlay element.

use std::path::PathBuf;

use crate::{
    assets::raster::PreparedImage,
    foundation::{
        core::{Canvas, Rect, Rgba8},
        error::WatermarkResult,
    },
    media::item::{ElementContent, MediaElement, MediaItem},
};

/// Index of the video layer among the parent layer's children.
pub const VIDEO_LAYER_INDEX: usize = 0;
/// Index of the overlay layer among the parent layer's children.
pub const OVERLAY_LAYER_INDEX: usize = 1;

#[derive(Clone, Debug, PartialEq)]
pub struct TextLayer {
    pub string: String,
    pub font_size: f32,
    pub color: Rgba8,
    pub font: Option<PathBuf>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum LayerContents {
    None,
    /// Placeholder filled with decoded source frames at render time.
    VideoFrames,
    Image(PreparedImage),
    Text(TextLayer),
}

#[derive(Clone, Debug, PartialEq)]
pub struct Layer {
    pub frame: Rect,
    pub contents: LayerContents,
    pub masks_to_bounds: bool,
    pub sublayers: Vec<Layer>,
}

impl Layer {
    pub fn new(frame: Rect) -> Self {
        Self {
            frame,
            contents: LayerContents::None,
            masks_to_bounds: false,
            sublayers: Vec::new(),
        }
    }

    pub fn with_contents(mut self, contents: LayerContents) -> Self {
        self.contents = contents;
        self
    }

    /// Append on top of the existing sublayers.
    pub fn add_sublayer(&mut self, layer: Layer) {
        self.sublayers.push(layer);
    }
}

/// Layer tree attached to a video composition.
#[derive(Clone, Debug, PartialEq)]
pub struct LayerTree {
    pub parent: Layer,
}

impl LayerTree {
    pub fn video_layer(&self) -> &Layer {
        &self.parent.sublayers[VIDEO_LAYER_INDEX]
    }

    pub fn overlay(&self) -> &Layer {
        &self.parent.sublayers[OVERLAY_LAYER_INDEX]
    }
}

/// Build the layer for one overlay element. View elements are snapshotted here.
pub fn element_layer(element: &MediaElement) -> WatermarkResult<Layer> {
    let contents = match &element.content {
        ElementContent::View(view) => LayerContents::Image(view.snapshot()?),
        ElementContent::Image(image) => LayerContents::Image(image.clone()),
        ElementContent::Text(text) => LayerContents::Text(TextLayer {
            string: text.text.clone(),
            font_size: text.font_size,
            color: text.color,
            font: text.font.clone(),
        }),
    };
    Ok(Layer::new(element.frame).with_contents(contents))
}

/// Build the parent/video/overlay layer tree for `item` at `render_size`.
pub fn build_layer_tree(item: &MediaItem, render_size: Canvas) -> WatermarkResult<LayerTree> {
    let bounds = render_size.rect();

    let mut overlay = Layer::new(bounds);
    overlay.masks_to_bounds = true;
    for element in &item.elements {
        overlay.add_sublayer(element_layer(element)?);
    }

    let mut parent = Layer::new(bounds);
    parent.add_sublayer(Layer::new(bounds).with_contents(LayerContents::VideoFrames));
    parent.add_sublayer(overlay);

    Ok(LayerTree { parent })
}
