//! Single-page PDF output for a flattened certificate raster.
//!
//! The page is one DeviceRGB image XObject scaled to the page box. No info
//! dictionary, timestamps or document ids are written, so equal pixels give
//! equal bytes.

use lopdf::{Document, Object, Stream, dictionary};

use crate::foundation::error::{CertError, CertResult};

const PDF_VERSION: &str = "1.7";
const POINTS_PER_INCH: f64 = 72.0;

/// Page box in points for a raster printed at `dpi`.
pub fn page_size_points(width_px: u32, height_px: u32, dpi: f64) -> (f64, f64) {
    (
        f64::from(width_px) * POINTS_PER_INCH / dpi,
        f64::from(height_px) * POINTS_PER_INCH / dpi,
    )
}

/// Encode packed RGB8 pixels as a one-page PDF.
pub fn encode_rgb8_page(rgb8: &[u8], width: u32, height: u32, dpi: f64) -> CertResult<Vec<u8>> {
    if width == 0 || height == 0 {
        return Err(CertError::composition("pdf page must have non-zero size"));
    }
    if rgb8.len() != width as usize * height as usize * 3 {
        return Err(CertError::composition(format!(
            "pdf page expects {} rgb bytes for {width}x{height}, got {}",
            width as usize * height as usize * 3,
            rgb8.len()
        )));
    }
    if !dpi.is_finite() || dpi <= 0.0 {
        return Err(CertError::composition(format!("invalid output dpi {dpi}")));
    }

    let (w_pt, h_pt) = page_size_points(width, height, dpi);

    let mut doc = Document::with_version(PDF_VERSION);
    let pages_id = doc.new_object_id();

    let image_id = doc.add_object(Stream::new(
        dictionary! {
            "Type" => "XObject",
            "Subtype" => "Image",
            "Width" => i64::from(width),
            "Height" => i64::from(height),
            "ColorSpace" => "DeviceRGB",
            "BitsPerComponent" => 8,
        },
        rgb8.to_vec(),
    ));

    let content = format!("q {w_pt:.4} 0 0 {h_pt:.4} 0 0 cm /Im0 Do Q\n").into_bytes();
    let content_id = doc.add_object(Stream::new(dictionary! {}, content));

    let page_id = doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "Contents" => content_id,
        "Resources" => dictionary! {
            "XObject" => dictionary! { "Im0" => image_id },
        },
        "MediaBox" => vec![
            0.into(),
            0.into(),
            Object::Real(w_pt as f32),
            Object::Real(h_pt as f32),
        ],
    });

    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => vec![page_id.into()],
            "Count" => 1,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);
    doc.compress();

    let mut out = Vec::new();
    doc.save_to(&mut out)
        .map_err(|e| CertError::composition(format!("write pdf: {e}")))?;
    Ok(out)
}
