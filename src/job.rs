//! JSON job files describing a source and its overlays.
//!
//! ```json
//! {
//!   "source": "clip.mp4",
//!   "elements": [
//!     { "kind": "image", "frame": [0, 0, 200, 200], "path": "logo.png" },
//!     { "kind": "text", "frame": [10, 10, 100, 40], "text": "© 2024", "color": "#ffffffcc" },
//!     { "kind": "view", "frame": [0, 300, 120, 40], "svg": "badge.svg", "scale": 2.0 }
//!   ]
//! }
//! ```
//!
//! Relative paths resolve against the job file's directory.

use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use anyhow::Context as _;

use crate::{
    assets::{raster::load_image, view::SvgView},
    foundation::{
        core::{Canvas, Rect, Rgba8},
        error::{WatermarkError, WatermarkResult},
    },
    media::{
        item::{MediaElement, MediaItem, SourceAsset, TextContent},
        probe::VideoAsset,
    },
    processor::default_render_size,
};

#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct WatermarkJob {
    pub source: PathBuf,
    /// Render size `[width, height]`; the source's display size when omitted.
    #[serde(default)]
    pub size: Option<[u32; 2]>,
    #[serde(default)]
    pub elements: Vec<ElementSpec>,
}

/// One overlay. `frame` is `[x, y, width, height]` in render pixels.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ElementSpec {
    Image {
        frame: [f64; 4],
        path: PathBuf,
    },
    Text {
        frame: [f64; 4],
        text: String,
        #[serde(default)]
        font_size: Option<f32>,
        /// `#rrggbb` or `#rrggbbaa`.
        #[serde(default)]
        color: Option<String>,
        #[serde(default)]
        font: Option<PathBuf>,
    },
    View {
        frame: [f64; 4],
        svg: PathBuf,
        #[serde(default)]
        scale: Option<f32>,
    },
}

impl WatermarkJob {
    pub fn parse(json: &str) -> WatermarkResult<Self> {
        serde_json::from_str(json)
            .map_err(|e| WatermarkError::validation(format!("invalid job file: {e}")))
    }

    pub fn read(path: &Path) -> WatermarkResult<Self> {
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("read job file '{}'", path.display()))?;
        Self::parse(&json)
    }

    /// Load the source and every overlay, resolving paths against `base_dir`.
    ///
    /// Still-image sources (by file extension) are decoded; anything else is probed as video.
    #[tracing::instrument(level = "debug", skip(self), fields(source = %self.source.display()))]
    pub fn into_media_item(self, base_dir: &Path) -> WatermarkResult<MediaItem> {
        let source_path = resolve(base_dir, &self.source);
        let source = if is_still_image(&source_path) {
            SourceAsset::Image(load_image(&source_path)?)
        } else {
            SourceAsset::Video(VideoAsset::probe(&source_path)?)
        };

        let size = match (self.size, &source) {
            (Some([w, h]), _) => Canvas::new(w, h),
            (None, SourceAsset::Video(asset)) => default_render_size(asset)?,
            (None, SourceAsset::Image(img)) => Canvas::from_size_even(
                crate::foundation::core::Size::new(f64::from(img.width), f64::from(img.height)),
            )?,
        };

        let elements = self
            .elements
            .into_iter()
            .map(|spec| spec.into_element(base_dir))
            .collect::<WatermarkResult<Vec<_>>>()?;
        Ok(MediaItem::new(source, size).with_elements(elements))
    }
}

impl ElementSpec {
    pub fn frame(&self) -> Rect {
        let [x, y, w, h] = match self {
            Self::Image { frame, .. } | Self::Text { frame, .. } | Self::View { frame, .. } => {
                *frame
            }
        };
        Rect::from_origin_size((x, y), (w, h))
    }

    fn into_element(self, base_dir: &Path) -> WatermarkResult<MediaElement> {
        let frame = self.frame();
        Ok(match self {
            Self::Image { path, .. } => {
                MediaElement::image(load_image(&resolve(base_dir, &path))?, frame)
            }
            Self::Text {
                text,
                font_size,
                color,
                font,
                ..
            } => {
                let mut content = TextContent::new(text);
                if let Some(size) = font_size {
                    if !size.is_finite() || size <= 0.0 {
                        return Err(WatermarkError::validation(format!(
                            "text font_size must be > 0, got {size}"
                        )));
                    }
                    content = content.with_font_size(size);
                }
                if let Some(color) = color {
                    content = content.with_color(Rgba8::from_hex(&color)?);
                }
                if let Some(font) = font {
                    content = content.with_font(resolve(base_dir, &font));
                }
                MediaElement::text(content, frame)
            }
            Self::View { svg, scale, .. } => {
                let mut view = SvgView::from_file(&resolve(base_dir, &svg))?;
                if let Some(scale) = scale {
                    view = view.with_scale(scale);
                }
                MediaElement::view(Arc::new(view), frame)
            }
        })
    }
}

fn resolve(base_dir: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base_dir.join(path)
    }
}

fn is_still_image(path: &Path) -> bool {
    image::ImageFormat::from_path(path).is_ok()
}
