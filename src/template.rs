use std::{fmt, sync::Arc};

use crate::{
    assets::decode::{PreparedImage, decode_template_image, prepare_rgba_image},
    config::{FontSizes, LayoutStyle},
    foundation::core::Canvas,
    foundation::error::{CertError, CertResult},
};

/// Text roles of the fixed certificate layout.
#[repr(usize)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FontRole {
    Title,
    Name,
    Header,
    Details,
    Signature,
    Prize,
    Speaker,
}

impl FontRole {
    pub const ALL: [FontRole; 7] = [
        FontRole::Title,
        FontRole::Name,
        FontRole::Header,
        FontRole::Details,
        FontRole::Signature,
        FontRole::Prize,
        FontRole::Speaker,
    ];

    fn index(self) -> usize {
        self as usize
    }
}

/// Raw font file bytes plus a label used in diagnostics.
pub struct FontFace {
    label: String,
    bytes: Arc<Vec<u8>>,
}

impl FontFace {
    pub fn new(label: impl Into<String>, bytes: Vec<u8>) -> CertResult<Self> {
        let label = label.into();
        if bytes.is_empty() {
            return Err(CertError::resource(format!("font '{label}' is empty")));
        }
        Ok(Self {
            label,
            bytes: Arc::new(bytes),
        })
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn bytes(&self) -> &Arc<Vec<u8>> {
        &self.bytes
    }
}

impl fmt::Debug for FontFace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FontFace")
            .field("label", &self.label)
            .field("bytes_len", &self.bytes.len())
            .finish()
    }
}

/// A face at a fixed pixel size.
#[derive(Clone, Debug)]
pub struct FontSpec {
    pub face: Arc<FontFace>,
    pub size_px: f32,
}

/// One [`FontSpec`] per [`FontRole`].
#[derive(Clone, Debug)]
pub struct FontSet {
    specs: [FontSpec; 7],
}

impl FontSet {
    /// Same face for every role, sized per role.
    pub fn uniform(face: FontFace, sizes: FontSizes) -> Self {
        let face = Arc::new(face);
        let spec = |size_px: f32| FontSpec {
            face: face.clone(),
            size_px,
        };
        Self {
            specs: [
                spec(sizes.title),
                spec(sizes.name),
                spec(sizes.header),
                spec(sizes.details),
                spec(sizes.signature),
                spec(sizes.prize),
                spec(sizes.speaker),
            ],
        }
    }

    pub fn with_role(mut self, role: FontRole, face: Arc<FontFace>, size_px: f32) -> Self {
        self.specs[role.index()] = FontSpec { face, size_px };
        self
    }

    pub fn get(&self, role: FontRole) -> &FontSpec {
        &self.specs[role.index()]
    }

    pub fn validate(&self) -> CertResult<()> {
        for role in FontRole::ALL {
            let spec = self.get(role);
            if !spec.size_px.is_finite() || spec.size_px <= 0.0 {
                return Err(CertError::resource(format!(
                    "font size for {role:?} must be finite and > 0 (got {})",
                    spec.size_px
                )));
            }
        }
        Ok(())
    }
}

/// The fixed base image, fonts and layout constants shared by a whole batch.
///
/// Never mutated by rendering; every render starts from a private copy of the pixels.
#[derive(Clone, Debug)]
pub struct Template {
    canvas: Canvas,
    base: PreparedImage,
    fonts: FontSet,
    style: LayoutStyle,
}

impl Template {
    pub fn new(image: image::RgbaImage, fonts: FontSet, style: LayoutStyle) -> CertResult<Self> {
        let canvas = Canvas::new(image.width(), image.height())?;
        fonts.validate()?;
        style
            .validate()
            .map_err(|e| CertError::resource(format!("template style: {e}")))?;
        Ok(Self {
            canvas,
            base: prepare_rgba_image(image),
            fonts,
            style,
        })
    }

    /// Decode an encoded image (PNG, JPEG, ...) and build a template from it.
    pub fn from_encoded(bytes: &[u8], fonts: FontSet, style: LayoutStyle) -> CertResult<Self> {
        let image = decode_template_image(bytes)?;
        Self::new(image, fonts, style)
    }

    pub fn canvas(&self) -> Canvas {
        self.canvas
    }

    pub fn fonts(&self) -> &FontSet {
        &self.fonts
    }

    pub fn style(&self) -> &LayoutStyle {
        &self.style
    }

    /// Premultiplied RGBA8 pixels of the base image.
    pub fn base_pixels(&self) -> &[u8] {
        self.base.rgba8_premul.as_slice()
    }
}
