use crate::foundation::{
    error::{WatermarkError, WatermarkResult},
    math::mul_div255_u8,
};

pub type PremulRgba8 = [u8; 4];

/// Source-over for one premultiplied pixel.
pub fn over(dst: PremulRgba8, src: PremulRgba8) -> PremulRgba8 {
    match src[3] {
        0 => dst,
        255 => src,
        sa => {
            let inv = 255u16 - u16::from(sa);
            let mut out = [0u8; 4];
            for i in 0..4 {
                out[i] = src[i].saturating_add(mul_div255_u8(u16::from(dst[i]), inv));
            }
            out
        }
    }
}

/// Composite `src` over `dst`; both premultiplied RGBA8 of the same size.
pub fn over_in_place(dst: &mut [u8], src: &[u8]) -> WatermarkResult<()> {
    if dst.len() != src.len() || !dst.len().is_multiple_of(4) {
        return Err(WatermarkError::render(
            "over_in_place expects equal-length rgba8 buffers",
        ));
    }
    for (d, s) in dst.chunks_exact_mut(4).zip(src.chunks_exact(4)) {
        let out = over([d[0], d[1], d[2], d[3]], [s[0], s[1], s[2], s[3]]);
        d.copy_from_slice(&out);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn over_src_alpha_0_is_noop() {
        let dst = [10, 20, 30, 40];
        assert_eq!(over(dst, [0, 0, 0, 0]), dst);
    }

    #[test]
    fn over_src_opaque_replaces_dst() {
        let src = [255, 0, 0, 255];
        assert_eq!(over([0, 0, 255, 255], src), src);
    }

    #[test]
    fn over_dst_transparent_returns_src() {
        let src = [100, 110, 120, 200];
        assert_eq!(over([0, 0, 0, 0], src), src);
    }

    #[test]
    fn over_half_white_on_black() {
        assert_eq!(over([0, 0, 0, 255], [128, 128, 128, 128]), [128, 128, 128, 255]);
    }

    #[test]
    fn over_in_place_checks_lengths() {
        let mut dst = vec![0u8; 8];
        assert!(over_in_place(&mut dst, &[0u8; 4]).is_err());
        over_in_place(&mut dst, &[255, 0, 0, 255, 0, 0, 0, 0]).unwrap();
        assert_eq!(dst, vec![255, 0, 0, 255, 0, 0, 0, 0]);
    }
}
