pub(crate) fn mul_div255_u16(x: u16, y: u16) -> u16 {
    (((u32::from(x) * u32::from(y)) + 127) / 255) as u16
}

pub(crate) fn mul_div255_u8(x: u16, y: u16) -> u8 {
    mul_div255_u16(x, y) as u8
}

pub(crate) fn premultiply_rgba8_in_place(rgba: &mut [u8]) {
    for px in rgba.chunks_exact_mut(4) {
        let a = u16::from(px[3]);
        if a == 0 {
            px[0] = 0;
            px[1] = 0;
            px[2] = 0;
            continue;
        }
        px[0] = mul_div255_u8(u16::from(px[0]), a);
        px[1] = mul_div255_u8(u16::from(px[1]), a);
        px[2] = mul_div255_u8(u16::from(px[2]), a);
    }
}

pub(crate) fn unpremultiply_rgba8_in_place(rgba: &mut [u8]) {
    for px in rgba.chunks_exact_mut(4) {
        let a = u32::from(px[3]);
        if a == 0 || a == 255 {
            continue;
        }
        for c in &mut px[..3] {
            *c = ((u32::from(*c) * 255 + a / 2) / a).min(255) as u8;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mul_div255_rounds_to_nearest() {
        assert_eq!(mul_div255_u16(255, 255), 255);
        assert_eq!(mul_div255_u16(128, 255), 128);
        assert_eq!(mul_div255_u16(255, 128), 128);
        assert_eq!(mul_div255_u16(0, 200), 0);
    }

    #[test]
    fn premultiply_then_unpremultiply_opaque_is_identity() {
        let mut px = vec![10u8, 20, 30, 255];
        premultiply_rgba8_in_place(&mut px);
        assert_eq!(px, vec![10, 20, 30, 255]);
        unpremultiply_rgba8_in_place(&mut px);
        assert_eq!(px, vec![10, 20, 30, 255]);
    }

    #[test]
    fn premultiply_zero_alpha_clears_color() {
        let mut px = vec![200u8, 100, 50, 0];
        premultiply_rgba8_in_place(&mut px);
        assert_eq!(px, vec![0, 0, 0, 0]);
    }

    #[test]
    fn unpremultiply_half_alpha() {
        let mut px = vec![64u8, 0, 128, 128];
        unpremultiply_rgba8_in_place(&mut px);
        assert_eq!(px, vec![128, 0, 255, 128]);
    }
}
