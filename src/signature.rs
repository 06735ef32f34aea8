//! Signer blocks along the bottom of the certificate.
//!
//! Slots are spaced from the number of *configured* signers, so an incomplete
//! signer leaves its slot empty instead of shifting the others.

use crate::{
    assets::decode::{PreparedImage, decode_signature, resize_rgba},
    config::LayoutStyle,
    foundation::core::{Canvas, Point, Rect},
    foundation::error::CertResult,
    model::SignerInput,
    render::cpu::OverlaySurface,
    template::{FontRole, FontSpec, Template},
    text::Typesetter,
};

/// Scale `(width, height)` to `target` width keeping the aspect ratio.
///
/// The height is rounded and never drops below one pixel. A zero width is treated as one.
pub fn fit_to_width(width: u32, height: u32, target: u32) -> (u32, u32) {
    let scale = f64::from(target) / f64::from(width.max(1));
    let h = (scale * f64::from(height)).round().max(1.0);
    (target, h as u32)
}

#[derive(Clone, Debug)]
pub enum SignatureMark {
    Image { image: PreparedImage, origin: Point },
    /// Thin line drawn where the image would have gone.
    Placeholder { line: Rect, reason: String },
}

impl SignatureMark {
    pub fn is_placeholder(&self) -> bool {
        matches!(self, Self::Placeholder { .. })
    }
}

/// A fully positioned signer block.
#[derive(Clone, Debug)]
pub struct SignerBlock {
    /// 1-based slot index among the configured signers.
    pub slot: usize,
    pub mark: SignatureMark,
    pub rule: Rect,
    pub name: String,
    pub name_origin: Point,
    pub post: String,
    pub post_origin: Point,
}

pub struct SignatureBlockRenderer<'a> {
    canvas: Canvas,
    style: &'a LayoutStyle,
    font: &'a FontSpec,
}

impl<'a> SignatureBlockRenderer<'a> {
    pub fn new(template: &'a Template) -> Self {
        Self {
            canvas: template.canvas(),
            style: template.style(),
            font: template.fonts().get(FontRole::Signature),
        }
    }

    /// Horizontal distance between slot centers for `configured` signers.
    pub fn spacing(&self, configured: usize) -> u32 {
        let slots = u32::try_from(configured).unwrap_or(u32::MAX).saturating_add(1);
        self.canvas.width / slots
    }

    pub fn block_top(&self) -> f64 {
        self.canvas.height_f64() - self.style.signature_offset_from_bottom
    }

    /// Tallest signature image that still ends on the canvas.
    pub fn max_image_height(&self) -> u32 {
        let room = self.canvas.height_f64() - self.block_top().max(0.0);
        room.clamp(1.0, self.canvas.height_f64()) as u32
    }

    /// Scale to `width` and clip whatever would hang below the canvas.
    ///
    /// Clipping happens on the source rows, so the resampled buffer never
    /// exceeds `width x max_image_height()`.
    fn fit_signature(&self, img: &image::RgbaImage, width: u32) -> CertResult<PreparedImage> {
        let (w, h) = fit_to_width(img.width(), img.height(), width);
        let max_h = self.max_image_height();
        if h <= max_h {
            return resize_rgba(img, w, h);
        }

        let scale = f64::from(img.width().max(1)) / f64::from(width);
        let src_h = ((f64::from(max_h) * scale).ceil() as u32).clamp(1, img.height());
        let top_rows = image::imageops::crop_imm(img, 0, 0, img.width(), src_h).to_image();
        tracing::debug!(height = h, clipped_to = max_h, "signature clipped at canvas edge");
        resize_rgba(&top_rows, w, max_h)
    }

    /// Position every complete signer, decoding and resizing its image.
    ///
    /// An undecodable image becomes [`SignatureMark::Placeholder`]; other
    /// failures propagate.
    pub fn plan<T>(&self, signers: &[SignerInput], typesetter: &mut T) -> CertResult<Vec<SignerBlock>>
    where
        T: Typesetter + ?Sized,
    {
        let spacing = f64::from(self.spacing(signers.len()));
        let width = self.style.signature_width;
        let width_f = f64::from(width);
        let top = self.block_top();
        let rule_y = top + self.style.signature_rule_drop;

        let mut blocks = Vec::with_capacity(signers.len());
        for (i, input) in signers.iter().enumerate() {
            let slot = i + 1;
            let Some(signer) = input.complete() else {
                tracing::debug!(slot, "signer incomplete, slot left empty");
                continue;
            };
            let x = spacing * slot as f64 - f64::from(width / 2);

            let mark = match decode_signature(signer.signature().bytes(), signer.name()) {
                Ok(img) => SignatureMark::Image {
                    image: self.fit_signature(&img, width)?,
                    origin: Point::new(x, top),
                },
                Err(err) => {
                    tracing::warn!(slot, error = %err, "drawing signature placeholder");
                    let y = top + self.style.placeholder_drop;
                    SignatureMark::Placeholder {
                        line: Rect::new(x, y, x + width_f, y + self.style.signature_rule_width),
                        reason: err.reason,
                    }
                }
            };

            let name_w = typesetter.measure(signer.name(), self.font)?.width;
            let post_w = typesetter.measure(signer.post(), self.font)?.width;
            blocks.push(SignerBlock {
                slot,
                mark,
                rule: Rect::new(
                    x,
                    rule_y,
                    x + width_f,
                    rule_y + self.style.signature_rule_width,
                ),
                name_origin: Point::new(
                    x + (width_f - name_w) / 2.0,
                    rule_y + self.style.signer_name_drop,
                ),
                post_origin: Point::new(
                    x + (width_f - post_w) / 2.0,
                    rule_y + self.style.signer_post_drop,
                ),
                name: signer.name().to_string(),
                post: signer.post().to_string(),
            });
        }
        Ok(blocks)
    }

    pub fn draw<T>(
        &self,
        blocks: &[SignerBlock],
        surface: &mut OverlaySurface,
        typesetter: &mut T,
    ) -> CertResult<()>
    where
        T: Typesetter + ?Sized,
    {
        let color = self.style.text_color;
        for block in blocks {
            match &block.mark {
                SignatureMark::Image { image, origin } => surface.draw_image(image, *origin)?,
                SignatureMark::Placeholder { line, .. } => surface.fill_rect(*line, color),
            }
            surface.fill_rect(block.rule, color);
            typesetter.draw(surface, &block.name, self.font, block.name_origin, color)?;
            typesetter.draw(surface, &block.post, self.font, block.post_origin, color)?;
        }
        Ok(())
    }

    /// Plan and draw in one step.
    pub fn render<T>(
        &self,
        signers: &[SignerInput],
        surface: &mut OverlaySurface,
        typesetter: &mut T,
    ) -> CertResult<Vec<SignerBlock>>
    where
        T: Typesetter + ?Sized,
    {
        let blocks = self.plan(signers, typesetter)?;
        self.draw(&blocks, surface, typesetter)?;
        Ok(blocks)
    }
}
