use std::f64::consts::{FRAC_PI_2, PI};

use crate::foundation::core::{Affine, Size, Vec2};

/// Source content orientation, derived from the video track's display rotation.
///
/// The names follow the image-orientation convention where an unrotated stored frame is `Right`
/// and a frame that has to be turned a quarter clockwise for display is `Up`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Orientation {
    #[default]
    Up,
    Left,
    Right,
    Down,
}

impl Orientation {
    /// Map a clockwise display rotation in degrees. Rotations that are not a multiple of 90
    /// fall back to `Up`.
    pub fn from_rotation_degrees(deg: i32) -> Self {
        match deg.rem_euclid(360) {
            0 => Self::Right,
            90 => Self::Up,
            180 => Self::Left,
            270 => Self::Down,
            _ => Self::Up,
        }
    }

    /// Translation offset and rotation angle (radians) for a source of `natural` size.
    pub fn offset_and_angle(self, natural: Size) -> (Vec2, f64) {
        let (w, h) = (natural.width, natural.height);
        match self {
            Self::Left => (Vec2::new(h, w), PI),
            Self::Right => (Vec2::ZERO, 0.0),
            Self::Down => (Vec2::new(0.0, w), -FRAC_PI_2),
            Self::Up => (Vec2::new(h, 0.0), FRAC_PI_2),
        }
    }
}

/// Orientation-correction transform mapping natural source pixels into render space.
///
/// Composition order is fixed: scale, then translate, then rotate, each concatenated onto the
/// running matrix (so the rotation is applied to points first).
pub fn orientation_transform(orientation: Orientation, natural: Size, scale_factor: f64) -> Affine {
    let (offset, angle) = orientation.offset_and_angle(natural);
    let scale = Affine::scale(scale_factor);
    let translation = scale * Affine::translate(offset);
    translation * Affine::rotate(angle)
}
