use std::{path::Path, sync::Arc};

use anyhow::Context as _;

use crate::foundation::{
    core::Rgba8,
    error::{WatermarkError, WatermarkResult},
};

/// Font file contents and the face to use inside them (non-zero only for collections).
#[derive(Clone, Debug)]
pub struct ResolvedFont {
    pub bytes: Arc<Vec<u8>>,
    pub index: u32,
}

/// Stateful helper for building Parley text layouts from raw font bytes.
pub(crate) struct TextLayoutEngine {
    font_ctx: parley::FontContext,
    layout_ctx: parley::LayoutContext<Rgba8>,
}

impl Default for TextLayoutEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl TextLayoutEngine {
    pub(crate) fn new() -> Self {
        Self {
            font_ctx: parley::FontContext::default(),
            layout_ctx: parley::LayoutContext::new(),
        }
    }

    /// Shape and lay out a single unwrapped paragraph.
    pub(crate) fn layout_plain(
        &mut self,
        text: &str,
        font: &ResolvedFont,
        size_px: f32,
        brush: Rgba8,
    ) -> WatermarkResult<parley::Layout<Rgba8>> {
        if !size_px.is_finite() || size_px <= 0.0 {
            return Err(WatermarkError::validation(
                "text font_size must be finite and > 0",
            ));
        }

        let families = self.font_ctx.collection.register_fonts(
            parley::fontique::Blob::from(font.bytes.as_ref().clone()),
            None,
        );
        if families.is_empty() {
            return Err(WatermarkError::validation(
                "no font families registered from font bytes",
            ));
        }
        let family_id = families
            .iter()
            .find(|(_, faces)| faces.iter().any(|f| f.index() == font.index))
            .map(|(id, _)| *id)
            .ok_or_else(|| {
                WatermarkError::validation(format!("font data has no face {}", font.index))
            })?;

        let family_name = self
            .font_ctx
            .collection
            .family_name(family_id)
            .ok_or_else(|| WatermarkError::validation("registered font family has no name"))?
            .to_string();

        let mut builder = self
            .layout_ctx
            .ranged_builder(&mut self.font_ctx, text, 1.0, true);
        builder.push_default(parley::style::StyleProperty::FontStack(
            parley::style::FontStack::Source(std::borrow::Cow::Owned(family_name)),
        ));
        builder.push_default(parley::style::StyleProperty::FontSize(size_px));
        builder.push_default(parley::style::StyleProperty::Brush(brush));

        let mut layout: parley::Layout<Rgba8> = builder.build(text);
        layout.break_all_lines(None);
        Ok(layout)
    }
}

/// Load the font used for a text layer.
///
/// An explicit font file wins; otherwise the first sans-serif face installed on the system is
/// used, mirroring the default face of a platform text layer. A font file is read as its first
/// face.
pub fn resolve_font(font: Option<&Path>) -> WatermarkResult<ResolvedFont> {
    if let Some(path) = font {
        let bytes =
            std::fs::read(path).with_context(|| format!("read font '{}'", path.display()))?;
        return Ok(ResolvedFont {
            bytes: Arc::new(bytes),
            index: 0,
        });
    }

    let mut db = usvg::fontdb::Database::new();
    db.load_system_fonts();
    let query = usvg::fontdb::Query {
        families: &[
            usvg::fontdb::Family::SansSerif,
            usvg::fontdb::Family::Serif,
            usvg::fontdb::Family::Monospace,
        ],
        ..Default::default()
    };
    let id = db
        .query(&query)
        .or_else(|| db.faces().next().map(|face| face.id))
        .ok_or_else(|| {
            WatermarkError::render("no system font available for text layers; set a font file")
        })?;
    db.with_face_data(id, |data, index| ResolvedFont {
        bytes: Arc::new(data.to_vec()),
        index,
    })
    .ok_or_else(|| WatermarkError::render("failed to load system font data"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_missing_font_is_an_error() {
        let err = resolve_font(Some(Path::new("fonts/missing.ttf"))).unwrap_err();
        assert!(err.to_string().contains("fonts/missing.ttf"));
    }

    fn raw(bytes: &[u8]) -> ResolvedFont {
        ResolvedFont {
            bytes: Arc::new(bytes.to_vec()),
            index: 0,
        }
    }

    #[test]
    fn layout_rejects_bad_font_size() {
        let mut engine = TextLayoutEngine::new();
        assert!(
            engine
                .layout_plain("x", &raw(&[]), 0.0, Rgba8::WHITE)
                .is_err()
        );
        assert!(
            engine
                .layout_plain("x", &raw(&[]), f32::NAN, Rgba8::WHITE)
                .is_err()
        );
    }

    #[test]
    fn layout_rejects_non_font_bytes() {
        let mut engine = TextLayoutEngine::new();
        assert!(
            engine
                .layout_plain("x", &raw(b"not a font"), 24.0, Rgba8::WHITE)
                .is_err()
        );
    }

    #[test]
    fn layout_smoke_with_system_font_if_present() {
        let Ok(font) = resolve_font(None) else {
            return;
        };

        let mut engine = TextLayoutEngine::new();
        let layout = engine
            .layout_plain("hello", &font, 36.0, Rgba8::WHITE)
            .unwrap();
        assert!(layout.lines().next().is_some());
    }

    #[test]
    fn layout_uses_the_resolved_face_index() {
        let Ok(font) = resolve_font(None) else {
            return;
        };
        let mut engine = TextLayoutEngine::new();
        let missing = ResolvedFont {
            index: font.index + 1000,
            ..font.clone()
        };
        let err = engine
            .layout_plain("hello", &missing, 36.0, Rgba8::WHITE)
            .err()
            .expect("expected layout error for missing face index");
        assert!(err.to_string().contains("no face"), "{err}");

        assert!(engine.layout_plain("hello", &font, 36.0, Rgba8::WHITE).is_ok());
    }
}
