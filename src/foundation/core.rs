use crate::foundation::error::{WatermarkError, WatermarkResult};

pub use kurbo::{Affine, Point, Rect, Size, Vec2};

/// Frames-per-second represented as a rational `num/den`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Fps {
    pub num: u32,
    pub den: u32, // must be > 0
}

impl Fps {
    pub fn new(num: u32, den: u32) -> WatermarkResult<Self> {
        if den == 0 {
            return Err(WatermarkError::validation("Fps den must be > 0"));
        }
        if num == 0 {
            return Err(WatermarkError::validation("Fps num must be > 0"));
        }
        Ok(Self { num, den })
    }

    pub fn as_f64(self) -> f64 {
        f64::from(self.num) / f64::from(self.den)
    }

    /// Duration of one frame in seconds.
    pub fn frame_duration_secs(self) -> f64 {
        f64::from(self.den) / f64::from(self.num)
    }

    /// Number of whole frames needed to cover `secs`.
    pub fn secs_to_frames_ceil(self, secs: f64) -> u64 {
        (secs * self.as_f64() - 1e-9).ceil().max(0.0) as u64
    }
}

impl Default for Fps {
    fn default() -> Self {
        Self { num: 30, den: 1 }
    }
}

/// Zero-based output frame number.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FrameIndex(pub u64);

impl FrameIndex {
    /// Presentation time of this frame at `fps`.
    pub fn time_secs(self, fps: Fps) -> f64 {
        self.0 as f64 * fps.frame_duration_secs()
    }
}

/// Output render dimensions in pixels.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Canvas {
    pub width: u32,
    pub height: u32,
}

impl Canvas {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Round a floating-point size to the nearest encodable canvas (even, non-zero).
    pub fn from_size_even(size: Size) -> WatermarkResult<Self> {
        if !size.width.is_finite() || !size.height.is_finite() {
            return Err(WatermarkError::validation("size must be finite"));
        }
        let even = |v: f64| -> u32 {
            let v = v.round().max(2.0) as u32;
            v + (v % 2)
        };
        let canvas = Self::new(even(size.width), even(size.height));
        canvas.validate()?;
        Ok(canvas)
    }

    /// Check that frames of this size can be rasterized and encoded as yuv420p.
    pub fn validate(self) -> WatermarkResult<()> {
        if self.width == 0 || self.height == 0 {
            return Err(WatermarkError::validation(
                "render width/height must be non-zero",
            ));
        }
        if !self.width.is_multiple_of(2) || !self.height.is_multiple_of(2) {
            return Err(WatermarkError::validation(
                "render width/height must be even (required for yuv420p mp4 output)",
            ));
        }
        if self.width > u32::from(u16::MAX) || self.height > u32::from(u16::MAX) {
            return Err(WatermarkError::validation(format!(
                "render size {}x{} exceeds {}x{}",
                self.width,
                self.height,
                u16::MAX,
                u16::MAX
            )));
        }
        Ok(())
    }

    pub fn size(self) -> Size {
        Size::new(f64::from(self.width), f64::from(self.height))
    }

    /// The canvas bounds as a rect anchored at the origin.
    pub fn rect(self) -> Rect {
        Rect::from_origin_size(Point::ORIGIN, self.size())
    }

    pub fn byte_len(self) -> usize {
        self.width as usize * self.height as usize * 4
    }
}

/// Straight-alpha RGBA8 color.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Rgba8 {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Rgba8 {
    pub const WHITE: Self = Self::new(255, 255, 255, 255);
    pub const BLACK: Self = Self::new(0, 0, 0, 255);

    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    /// Parse `#rrggbb` or `#rrggbbaa`.
    pub fn from_hex(s: &str) -> WatermarkResult<Self> {
        let hex = s.strip_prefix('#').unwrap_or(s);
        if hex.len() != 6 && hex.len() != 8 {
            return Err(WatermarkError::validation(format!(
                "color '{s}' must be #rrggbb or #rrggbbaa"
            )));
        }
        let channel = |i: usize| -> WatermarkResult<u8> {
            u8::from_str_radix(&hex[i..i + 2], 16)
                .map_err(|_| WatermarkError::validation(format!("color '{s}' is not hex")))
        };
        let a = if hex.len() == 8 { channel(6)? } else { 255 };
        Ok(Self::new(channel(0)?, channel(2)?, channel(4)?, a))
    }

    pub fn to_array(self) -> [u8; 4] {
        [self.r, self.g, self.b, self.a]
    }
}
