use std::{path::PathBuf, sync::Arc};

use crate::{
    assets::{raster::PreparedImage, view::ViewSnapshot},
    foundation::core::{Canvas, Rect, Rgba8},
    media::probe::VideoAsset,
};

/// Font size of a text overlay when none is given.
pub const DEFAULT_TEXT_FONT_SIZE: f32 = 36.0;

/// The media an item is watermarking.
#[derive(Clone, Debug)]
pub enum SourceAsset {
    Video(VideoAsset),
    Image(PreparedImage),
}

/// Input descriptor for one processing call.
#[derive(Clone, Debug)]
pub struct MediaItem {
    pub source: SourceAsset,
    /// Target render dimensions.
    pub size: Canvas,
    /// Overlays in stacking order; the first element is drawn first (bottommost).
    pub elements: Vec<MediaElement>,
}

impl MediaItem {
    pub fn new(source: SourceAsset, size: Canvas) -> Self {
        Self {
            source,
            size,
            elements: Vec::new(),
        }
    }

    pub fn with_elements(mut self, elements: Vec<MediaElement>) -> Self {
        self.elements = elements;
        self
    }

    /// Add an overlay on top of the ones already present.
    pub fn add_element(&mut self, element: MediaElement) {
        self.elements.push(element);
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ElementKind {
    View,
    Image,
    Text,
}

#[derive(Clone, Debug, PartialEq)]
pub struct TextContent {
    pub text: String,
    pub font_size: f32,
    pub color: Rgba8,
    /// Font file; the system sans-serif face is used when unset.
    pub font: Option<PathBuf>,
}

impl TextContent {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            font_size: DEFAULT_TEXT_FONT_SIZE,
            color: Rgba8::WHITE,
            font: None,
        }
    }

    pub fn with_font_size(mut self, font_size: f32) -> Self {
        self.font_size = font_size;
        self
    }

    pub fn with_color(mut self, color: Rgba8) -> Self {
        self.color = color;
        self
    }

    pub fn with_font(mut self, font: impl Into<PathBuf>) -> Self {
        self.font = Some(font.into());
        self
    }
}

#[derive(Clone, Debug)]
pub enum ElementContent {
    View(Arc<dyn ViewSnapshot>),
    Image(PreparedImage),
    Text(TextContent),
}

/// One overlay: content plus its placement rectangle in render coordinates.
#[derive(Clone, Debug)]
pub struct MediaElement {
    pub frame: Rect,
    pub content: ElementContent,
}

impl MediaElement {
    pub fn view(view: Arc<dyn ViewSnapshot>, frame: Rect) -> Self {
        Self {
            frame,
            content: ElementContent::View(view),
        }
    }

    pub fn image(image: PreparedImage, frame: Rect) -> Self {
        Self {
            frame,
            content: ElementContent::Image(image),
        }
    }

    pub fn text(text: TextContent, frame: Rect) -> Self {
        Self {
            frame,
            content: ElementContent::Text(text),
        }
    }

    pub fn kind(&self) -> ElementKind {
        match self.content {
            ElementContent::View(_) => ElementKind::View,
            ElementContent::Image(_) => ElementKind::Image,
            ElementContent::Text(_) => ElementKind::Text,
        }
    }
}
