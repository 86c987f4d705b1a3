use std::{fmt, path::Path, sync::Arc};

use anyhow::Context as _;

use crate::{
    assets::raster::PreparedImage,
    foundation::error::{WatermarkError, WatermarkResult},
};

/// A renderable view that can be captured as a still image.
///
/// Snapshots are taken once, when the layer tree is built.
pub trait ViewSnapshot: Send + Sync + fmt::Debug {
    fn snapshot(&self) -> WatermarkResult<PreparedImage>;
}

/// A view described as an SVG document, snapshotted with `resvg` at its intrinsic size.
#[derive(Clone)]
pub struct SvgView {
    tree: Arc<usvg::Tree>,
    scale: f32,
}

impl fmt::Debug for SvgView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let size = self.tree.size();
        f.debug_struct("SvgView")
            .field("width", &size.width())
            .field("height", &size.height())
            .field("scale", &self.scale)
            .finish()
    }
}

impl SvgView {
    pub fn from_data(bytes: &[u8], resources_dir: Option<&Path>) -> WatermarkResult<Self> {
        let mut fontdb = usvg::fontdb::Database::new();
        fontdb.load_system_fonts();
        let opts = usvg::Options {
            resources_dir: resources_dir.map(Path::to_path_buf),
            fontdb: Arc::new(fontdb),
            ..Default::default()
        };
        let tree = usvg::Tree::from_data(bytes, &opts).context("parse svg view")?;
        Ok(Self {
            tree: Arc::new(tree),
            scale: 1.0,
        })
    }

    pub fn from_file(path: &Path) -> WatermarkResult<Self> {
        let bytes =
            std::fs::read(path).with_context(|| format!("read svg view '{}'", path.display()))?;
        Self::from_data(&bytes, path.parent())
    }

    /// Snapshot at `scale` times the intrinsic size (the screen scale of a view capture).
    pub fn with_scale(mut self, scale: f32) -> Self {
        self.scale = scale;
        self
    }
}

impl ViewSnapshot for SvgView {
    fn snapshot(&self) -> WatermarkResult<PreparedImage> {
        if !self.scale.is_finite() || self.scale <= 0.0 {
            return Err(WatermarkError::validation(
                "view snapshot scale must be finite and > 0",
            ));
        }
        let size = self.tree.size();
        let width = (size.width() * self.scale).ceil().max(1.0) as u32;
        let height = (size.height() * self.scale).ceil().max(1.0) as u32;

        let mut pixmap = resvg::tiny_skia::Pixmap::new(width, height)
            .ok_or_else(|| WatermarkError::render("failed to allocate view snapshot pixmap"))?;
        let xform = resvg::tiny_skia::Transform::from_scale(
            (width as f32) / size.width(),
            (height as f32) / size.height(),
        );
        resvg::render(&self.tree, xform, &mut pixmap.as_mut());

        // tiny-skia pixmaps are premultiplied RGBA8 already.
        PreparedImage::from_premul_rgba8(width, height, pixmap.data().to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RED_SQUARE: &[u8] = br##"<svg xmlns="http://www.w3.org/2000/svg" width="4" height="2">
        <rect x="0" y="0" width="2" height="2" fill="#ff0000"/>
    </svg>"##;

    #[test]
    fn svg_snapshot_has_intrinsic_size() {
        let view = SvgView::from_data(RED_SQUARE, None).unwrap();
        let img = view.snapshot().unwrap();
        assert_eq!((img.width, img.height), (4, 2));
        assert_eq!(&img.rgba8_premul[0..4], &[255, 0, 0, 255]);
        // right half is untouched
        assert_eq!(&img.rgba8_premul[12..16], &[0, 0, 0, 0]);
    }

    #[test]
    fn svg_snapshot_scales() {
        let view = SvgView::from_data(RED_SQUARE, None).unwrap().with_scale(2.0);
        let img = view.snapshot().unwrap();
        assert_eq!((img.width, img.height), (8, 4));
    }

    #[test]
    fn invalid_svg_is_rejected() {
        assert!(SvgView::from_data(b"<svg", None).is_err());
    }

    #[test]
    fn zero_scale_is_rejected() {
        let view = SvgView::from_data(RED_SQUARE, None).unwrap().with_scale(0.0);
        assert!(view.snapshot().is_err());
    }
}
