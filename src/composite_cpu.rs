use crate::foundation::{
    core::Rgba8,
    error::{CertError, CertResult},
};

pub type PremulRgba8 = [u8; 4];

/// Porter-Duff source-over for one premultiplied pixel.
pub fn over(dst: PremulRgba8, src: PremulRgba8) -> PremulRgba8 {
    if src[3] == 0 {
        return dst;
    }
    if src[3] == 255 {
        return src;
    }

    let inv = 255u16 - u16::from(src[3]);
    let mut out = [0u8; 4];
    for i in 0..4 {
        let dc = mul_div255(u16::from(dst[i]), inv);
        out[i] = src[i].saturating_add(dc);
    }
    out
}

/// Composite `src` over `dst` in place; both are premultiplied RGBA8 of equal size.
pub fn over_in_place(dst: &mut [u8], src: &[u8]) -> CertResult<()> {
    if dst.len() != src.len() || !dst.len().is_multiple_of(4) {
        return Err(CertError::composition(
            "over_in_place expects equal-length rgba8 buffers",
        ));
    }
    for (d, s) in dst.chunks_exact_mut(4).zip(src.chunks_exact(4)) {
        let out = over([d[0], d[1], d[2], d[3]], [s[0], s[1], s[2], s[3]]);
        d.copy_from_slice(&out);
    }
    Ok(())
}

/// Flatten premultiplied RGBA8 over an opaque backdrop into packed RGB8.
pub fn flatten_to_rgb8(src: &[u8], backdrop: Rgba8) -> CertResult<Vec<u8>> {
    if !src.len().is_multiple_of(4) {
        return Err(CertError::composition(
            "flatten_to_rgb8 expects an rgba8 buffer",
        ));
    }

    let bg = [
        u16::from(backdrop.r),
        u16::from(backdrop.g),
        u16::from(backdrop.b),
    ];
    let mut out = Vec::with_capacity(src.len() / 4 * 3);
    for s in src.chunks_exact(4) {
        let a = u16::from(s[3]);
        if a == 255 {
            out.extend_from_slice(&s[..3]);
            continue;
        }
        let inv = 255u16 - a;
        for i in 0..3 {
            let c = u16::from(s[i]) + u16::from(mul_div255(bg[i], inv));
            out.push(c.min(255) as u8);
        }
    }
    Ok(out)
}

fn mul_div255(x: u16, y: u16) -> u8 {
    (((u32::from(x) * u32::from(y)) + 127) / 255) as u8
}
