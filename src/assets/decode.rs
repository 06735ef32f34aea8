use std::sync::Arc;

use anyhow::Context;
use image::imageops::FilterType;

use crate::foundation::error::{CertError, CertResult, SignatureDecodeError};

#[derive(Clone, Debug)]
pub struct PreparedImage {
    pub width: u32,
    pub height: u32,
    /// Premultiplied RGBA8, row-major, tightly packed.
    pub rgba8_premul: Arc<Vec<u8>>,
}

/// Decode the certificate base image into straight RGBA8.
pub fn decode_template_image(bytes: &[u8]) -> CertResult<image::RgbaImage> {
    let dyn_img = image::load_from_memory(bytes)
        .context("decode template image from memory")
        .map_err(|e| CertError::resource(format!("{e:#}")))?;
    Ok(dyn_img.to_rgba8())
}

/// Decode a signer's image. Failures here are recoverable by the caller.
pub fn decode_signature(
    bytes: &[u8],
    signer: &str,
) -> Result<image::RgbaImage, SignatureDecodeError> {
    if bytes.is_empty() {
        return Err(SignatureDecodeError {
            signer: signer.to_string(),
            reason: "no image data".to_string(),
        });
    }
    let dyn_img = image::load_from_memory(bytes).map_err(|e| SignatureDecodeError {
        signer: signer.to_string(),
        reason: e.to_string(),
    })?;
    let rgba = dyn_img.to_rgba8();
    if rgba.width() == 0 || rgba.height() == 0 {
        return Err(SignatureDecodeError {
            signer: signer.to_string(),
            reason: "image has zero width or height".to_string(),
        });
    }
    Ok(rgba)
}

/// Resample to exactly `width` x `height` with a Lanczos filter, then premultiply.
pub fn resize_rgba(img: &image::RgbaImage, width: u32, height: u32) -> CertResult<PreparedImage> {
    if width == 0 || height == 0 {
        return Err(CertError::composition(format!(
            "cannot resize image to {width}x{height}"
        )));
    }
    let resized = image::imageops::resize(img, width, height, FilterType::Lanczos3);
    Ok(prepare_rgba_image(resized))
}

pub fn prepare_rgba_image(img: image::RgbaImage) -> PreparedImage {
    let (width, height) = img.dimensions();
    let mut rgba8_premul = img.into_raw();
    premultiply_rgba8_in_place(&mut rgba8_premul);
    PreparedImage {
        width,
        height,
        rgba8_premul: Arc::new(rgba8_premul),
    }
}

fn premultiply_rgba8_in_place(rgba: &mut [u8]) {
    for px in rgba.chunks_exact_mut(4) {
        let a = px[3] as u16;
        if a == 0 {
            px[0] = 0;
            px[1] = 0;
            px[2] = 0;
            continue;
        }
        px[0] = ((px[0] as u16 * a + 127) / 255) as u8;
        px[1] = ((px[1] as u16 * a + 127) / 255) as u8;
        px[2] = ((px[2] as u16 * a + 127) / 255) as u8;
    }
}
