use std::{
    collections::HashMap,
    path::{Path, PathBuf},
    sync::Arc,
};

use crate::{
    assets::{
        raster::PreparedImage,
        text::{ResolvedFont, TextLayoutEngine, resolve_font},
    },
    foundation::{
        core::{Affine, Canvas, Vec2},
        error::{WatermarkError, WatermarkResult},
    },
    layer::{Layer, LayerContents, TextLayer},
    render::{FrameRGBA, composite::over_in_place},
};

struct CachedFont {
    source: ResolvedFont,
    data: vello_cpu::peniko::FontData,
}

/// Rasterizes the overlay sub-tree into a premultiplied frame of the render size.
pub struct OverlayRenderer {
    text: TextLayoutEngine,
    fonts: HashMap<Option<PathBuf>, CachedFont>,
}

impl Default for OverlayRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl OverlayRenderer {
    pub fn new() -> Self {
        Self {
            text: TextLayoutEngine::new(),
            fonts: HashMap::new(),
        }
    }

    /// Draw `overlay`'s sublayers in order (first = bottommost) into a transparent frame.
    ///
    /// The overlay layer spans the whole canvas, so masking it to its bounds is the pixmap edge.
    #[tracing::instrument(level = "debug", skip_all, fields(layers = overlay.sublayers.len()))]
    pub fn render(&mut self, overlay: &Layer, size: Canvas) -> WatermarkResult<FrameRGBA> {
        let (w, h) = canvas_u16(size)?;
        let mut ctx = vello_cpu::RenderContext::new(w, h);
        let origin = overlay.frame.origin().to_vec2();
        for layer in &overlay.sublayers {
            self.draw_layer(&mut ctx, layer, origin)?;
        }
        ctx.flush();

        let mut pixmap = vello_cpu::Pixmap::new(w, h);
        ctx.render_to_pixmap(&mut pixmap);
        Ok(FrameRGBA {
            width: size.width,
            height: size.height,
            data: pixmap.data_as_u8_slice().to_vec(),
            premultiplied: true,
        })
    }

    fn draw_layer(
        &mut self,
        ctx: &mut vello_cpu::RenderContext,
        layer: &Layer,
        parent_origin: Vec2,
    ) -> WatermarkResult<()> {
        let frame = layer.frame.abs();
        let origin = parent_origin + frame.origin().to_vec2();
        ctx.set_paint_transform(vello_cpu::kurbo::Affine::IDENTITY);

        match &layer.contents {
            LayerContents::None | LayerContents::VideoFrames => {}
            LayerContents::Image(img) => {
                if img.is_empty() || frame.width() <= 0.0 || frame.height() <= 0.0 {
                    return Ok(());
                }
                // Contents are stretched to fill the layer frame.
                let (iw, ih) = (f64::from(img.width), f64::from(img.height));
                let xf = Affine::translate(origin)
                    * Affine::scale_non_uniform(frame.width() / iw, frame.height() / ih);
                ctx.set_transform(affine_to_cpu(xf));
                ctx.set_paint(image_paint(img)?);
                ctx.fill_rect(&vello_cpu::kurbo::Rect::new(0.0, 0.0, iw, ih));
            }
            LayerContents::Text(text) => self.draw_text(ctx, text, origin)?,
        }

        for sub in &layer.sublayers {
            self.draw_layer(ctx, sub, origin)?;
        }
        Ok(())
    }

    fn draw_text(
        &mut self,
        ctx: &mut vello_cpu::RenderContext,
        text: &TextLayer,
        origin: Vec2,
    ) -> WatermarkResult<()> {
        if text.string.is_empty() {
            return Ok(());
        }
        let (source, font) = self.font_for(text.font.as_deref())?;
        let layout = self
            .text
            .layout_plain(&text.string, &source, text.font_size, text.color)?;

        ctx.set_transform(affine_to_cpu(Affine::translate(origin)));
        for line in layout.lines() {
            for item in line.items() {
                let parley::layout::PositionedLayoutItem::GlyphRun(run) = item else {
                    continue;
                };

                let brush = run.style().brush;
                ctx.set_paint(vello_cpu::peniko::Color::from_rgba8(
                    brush.r, brush.g, brush.b, brush.a,
                ));

                let glyphs = run.glyphs().map(|g| vello_cpu::Glyph {
                    id: g.id,
                    x: g.x,
                    y: g.y,
                });
                ctx.glyph_run(&font)
                    .font_size(run.run().font_size())
                    .fill_glyphs(glyphs);
            }
        }
        Ok(())
    }

    fn font_for(
        &mut self,
        path: Option<&Path>,
    ) -> WatermarkResult<(ResolvedFont, vello_cpu::peniko::FontData)> {
        let key = path.map(Path::to_path_buf);
        if let Some(font) = self.fonts.get(&key) {
            return Ok((font.source.clone(), font.data.clone()));
        }

        let source = resolve_font(path)?;
        let data = vello_cpu::peniko::FontData::new(
            vello_cpu::peniko::Blob::from(source.bytes.as_ref().clone()),
            source.index,
        );
        self.fonts.insert(
            key,
            CachedFont {
                source: source.clone(),
                data: data.clone(),
            },
        );
        Ok((source, data))
    }
}

/// Draws one source frame with its orientation transform, then the pre-rendered overlay on top.
pub struct FrameCompositor {
    size: Canvas,
    overlay: FrameRGBA,
}

impl FrameCompositor {
    pub fn new(size: Canvas, overlay: FrameRGBA) -> WatermarkResult<Self> {
        size.validate()?;
        if overlay.width != size.width
            || overlay.height != size.height
            || overlay.data.len() != size.byte_len()
            || !overlay.premultiplied
        {
            return Err(WatermarkError::render(format!(
                "overlay frame {}x{} does not match render size {}x{}",
                overlay.width, overlay.height, size.width, size.height
            )));
        }
        Ok(Self { size, overlay })
    }

    pub fn size(&self) -> Canvas {
        self.size
    }

    pub fn compose(&self, source: &PreparedImage, transform: Affine) -> WatermarkResult<FrameRGBA> {
        let (w, h) = canvas_u16(self.size)?;
        let mut ctx = vello_cpu::RenderContext::new(w, h);
        if !source.is_empty() {
            ctx.set_paint_transform(vello_cpu::kurbo::Affine::IDENTITY);
            ctx.set_transform(affine_to_cpu(transform));
            ctx.set_paint(image_paint(source)?);
            ctx.fill_rect(&vello_cpu::kurbo::Rect::new(
                0.0,
                0.0,
                f64::from(source.width),
                f64::from(source.height),
            ));
        }
        ctx.flush();

        let mut pixmap = vello_cpu::Pixmap::new(w, h);
        ctx.render_to_pixmap(&mut pixmap);
        let mut data = pixmap.data_as_u8_slice().to_vec();
        over_in_place(&mut data, &self.overlay.data)?;

        Ok(FrameRGBA {
            width: self.size.width,
            height: self.size.height,
            data,
            premultiplied: true,
        })
    }
}

fn canvas_u16(size: Canvas) -> WatermarkResult<(u16, u16)> {
    let w: u16 = size
        .width
        .try_into()
        .map_err(|_| WatermarkError::render("render width exceeds u16"))?;
    let h: u16 = size
        .height
        .try_into()
        .map_err(|_| WatermarkError::render("render height exceeds u16"))?;
    if w == 0 || h == 0 {
        return Err(WatermarkError::render("render size must be non-zero"));
    }
    Ok((w, h))
}

fn affine_to_cpu(a: Affine) -> vello_cpu::kurbo::Affine {
    vello_cpu::kurbo::Affine::new(a.as_coeffs())
}

fn image_paint(img: &PreparedImage) -> WatermarkResult<vello_cpu::Image> {
    let pixmap = image_premul_bytes_to_pixmap(img.rgba8_premul.as_slice(), img.width, img.height)?;
    Ok(vello_cpu::Image {
        image: vello_cpu::ImageSource::Pixmap(Arc::new(pixmap)),
        sampler: vello_cpu::peniko::ImageSampler::default(),
    })
}

fn image_premul_bytes_to_pixmap(
    rgba8_premul: &[u8],
    width: u32,
    height: u32,
) -> WatermarkResult<vello_cpu::Pixmap> {
    let w: u16 = width
        .try_into()
        .map_err(|_| WatermarkError::render("image width exceeds u16"))?;
    let h: u16 = height
        .try_into()
        .map_err(|_| WatermarkError::render("image height exceeds u16"))?;
    if rgba8_premul.len() != width as usize * height as usize * 4 {
        return Err(WatermarkError::render("image byte length mismatch"));
    }

    let mut may_have_opacities = false;
    let mut pixels = Vec::with_capacity(width as usize * height as usize);
    for px in rgba8_premul.chunks_exact(4) {
        let a = px[3];
        may_have_opacities |= a != 255;
        pixels.push(vello_cpu::peniko::color::PremulRgba8 {
            r: px[0],
            g: px[1],
            b: px[2],
            a,
        });
    }

    Ok(vello_cpu::Pixmap::from_parts_with_opacity(
        pixels,
        w,
        h,
        may_have_opacities,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        foundation::core::{Rect, Rgba8},
        timeline::orientation::{Orientation, orientation_transform},
    };

    fn solid(w: u32, h: u32, px: [u8; 4]) -> PreparedImage {
        let data = px.repeat(w as usize * h as usize);
        PreparedImage::from_premul_rgba8(w, h, data).unwrap()
    }

    fn pixel(frame: &FrameRGBA, x: u32, y: u32) -> [u8; 4] {
        let off = ((y * frame.width + x) * 4) as usize;
        [
            frame.data[off],
            frame.data[off + 1],
            frame.data[off + 2],
            frame.data[off + 3],
        ]
    }

    fn overlay_with(layers: Vec<Layer>, size: Canvas) -> Layer {
        let mut overlay = Layer::new(size.rect());
        overlay.masks_to_bounds = true;
        for l in layers {
            overlay.add_sublayer(l);
        }
        overlay
    }

    #[test]
    fn empty_overlay_is_transparent() {
        let size = Canvas::new(8, 8);
        let frame = OverlayRenderer::new()
            .render(&overlay_with(vec![], size), size)
            .unwrap();
        assert_eq!(frame.data.len(), size.byte_len());
        assert!(frame.data.iter().all(|&b| b == 0));
        assert!(frame.premultiplied);
    }

    #[test]
    fn image_layer_is_stretched_into_its_frame() {
        let size = Canvas::new(16, 16);
        let red = Layer::new(Rect::new(4.0, 4.0, 12.0, 12.0))
            .with_contents(LayerContents::Image(solid(2, 2, [255, 0, 0, 255])));
        let frame = OverlayRenderer::new()
            .render(&overlay_with(vec![red], size), size)
            .unwrap();

        assert_eq!(pixel(&frame, 8, 8), [255, 0, 0, 255]);
        assert_eq!(pixel(&frame, 5, 10), [255, 0, 0, 255]);
        assert_eq!(pixel(&frame, 1, 1), [0, 0, 0, 0]);
        assert_eq!(pixel(&frame, 14, 14), [0, 0, 0, 0]);
    }

    #[test]
    fn later_layers_draw_on_top() {
        let size = Canvas::new(16, 16);
        let bottom = Layer::new(Rect::new(0.0, 0.0, 16.0, 16.0))
            .with_contents(LayerContents::Image(solid(1, 1, [255, 0, 0, 255])));
        let top = Layer::new(Rect::new(0.0, 0.0, 8.0, 16.0))
            .with_contents(LayerContents::Image(solid(1, 1, [0, 0, 255, 255])));
        let frame = OverlayRenderer::new()
            .render(&overlay_with(vec![bottom, top], size), size)
            .unwrap();

        assert_eq!(pixel(&frame, 4, 8), [0, 0, 255, 255]);
        assert_eq!(pixel(&frame, 12, 8), [255, 0, 0, 255]);
    }

    #[test]
    fn text_layer_draws_glyphs_if_a_system_font_exists() {
        if resolve_font(None).is_err() {
            return;
        }
        let size = Canvas::new(128, 64);
        let text = Layer::new(Rect::new(0.0, 0.0, 128.0, 64.0)).with_contents(
            LayerContents::Text(TextLayer {
                string: "WM".to_string(),
                font_size: 36.0,
                color: Rgba8::WHITE,
                font: None,
            }),
        );
        let frame = OverlayRenderer::new()
            .render(&overlay_with(vec![text], size), size)
            .unwrap();
        assert!(frame.data.chunks_exact(4).any(|px| px[3] > 0));
    }

    #[test]
    fn compositor_rotates_source_and_keeps_overlay_on_top() {
        let size = Canvas::new(4, 8);
        // natural 8x4 landscape frame, left half green, right half blue
        let mut data = Vec::new();
        for _y in 0..4 {
            for x in 0..8 {
                data.extend_from_slice(if x < 4 {
                    &[0, 255, 0, 255]
                } else {
                    &[0, 0, 255, 255]
                });
            }
        }
        let source = PreparedImage::from_premul_rgba8(8, 4, data).unwrap();

        let mut overlay_px = vec![0u8; size.byte_len()];
        overlay_px[..4].copy_from_slice(&[255, 0, 0, 255]);
        let overlay = FrameRGBA {
            width: 4,
            height: 8,
            data: overlay_px,
            premultiplied: true,
        };

        let compositor = FrameCompositor::new(size, overlay).unwrap();
        let xf = orientation_transform(
            Orientation::Up,
            crate::foundation::core::Size::new(8.0, 4.0),
            1.0,
        );
        let frame = compositor.compose(&source, xf).unwrap();

        // quarter turn: the source's left half lands in the top half of the portrait frame
        assert_eq!(pixel(&frame, 0, 0), [255, 0, 0, 255]);
        assert_eq!(pixel(&frame, 2, 1), [0, 255, 0, 255]);
        assert_eq!(pixel(&frame, 2, 6), [0, 0, 255, 255]);
    }

    #[test]
    fn compositor_rejects_mismatched_overlay() {
        let overlay = FrameRGBA {
            width: 2,
            height: 2,
            data: vec![0; 16],
            premultiplied: true,
        };
        assert!(FrameCompositor::new(Canvas::new(4, 4), overlay).is_err());
    }

    #[test]
    fn glyph_font_uses_the_resolved_face() {
        let Ok(expected) = resolve_font(None) else {
            return;
        };
        let mut renderer = OverlayRenderer::new();
        let (source, data) = renderer.font_for(None).unwrap();
        assert_eq!(source.index, expected.index);
        assert_eq!(data.index, expected.index);

        let (_, cached) = renderer.font_for(None).unwrap();
        assert_eq!(cached.index, expected.index);
    }
}
