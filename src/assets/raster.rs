use std::{path::Path, sync::Arc};

use anyhow::Context;

use crate::foundation::{
    error::{WatermarkError, WatermarkResult},
    math::{premultiply_rgba8_in_place, unpremultiply_rgba8_in_place},
};

/// Decoded raster image in premultiplied RGBA8 form.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PreparedImage {
    pub width: u32,
    pub height: u32,
    /// Premultiplied RGBA8, row-major, tightly packed.
    pub rgba8_premul: Arc<Vec<u8>>,
}

impl PreparedImage {
    pub fn from_premul_rgba8(
        width: u32,
        height: u32,
        rgba8_premul: Vec<u8>,
    ) -> WatermarkResult<Self> {
        if rgba8_premul.len() != width as usize * height as usize * 4 {
            return Err(WatermarkError::validation(format!(
                "image byte length {} does not match {width}x{height} rgba8",
                rgba8_premul.len()
            )));
        }
        Ok(Self {
            width,
            height,
            rgba8_premul: Arc::new(rgba8_premul),
        })
    }

    pub fn from_rgba_image(img: image::RgbaImage) -> Self {
        let (width, height) = img.dimensions();
        let mut rgba8_premul = img.into_raw();
        premultiply_rgba8_in_place(&mut rgba8_premul);
        Self {
            width,
            height,
            rgba8_premul: Arc::new(rgba8_premul),
        }
    }

    /// Convert back to a straight-alpha image.
    pub fn to_rgba_image(&self) -> WatermarkResult<image::RgbaImage> {
        let mut straight = self.rgba8_premul.as_ref().clone();
        unpremultiply_rgba8_in_place(&mut straight);
        image::RgbaImage::from_raw(self.width, self.height, straight)
            .ok_or_else(|| WatermarkError::validation("image buffer does not match dimensions"))
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

pub fn decode_image(bytes: &[u8]) -> WatermarkResult<PreparedImage> {
    let dyn_img = image::load_from_memory(bytes).context("decode image from memory")?;
    Ok(PreparedImage::from_rgba_image(dyn_img.to_rgba8()))
}

pub fn load_image(path: &Path) -> WatermarkResult<PreparedImage> {
    let bytes =
        std::fs::read(path).with_context(|| format!("read image '{}'", path.display()))?;
    decode_image(&bytes).map_err(|e| match e {
        WatermarkError::Other(err) => {
            WatermarkError::Other(err.context(format!("image '{}'", path.display())))
        }
        other => other,
    })
}
