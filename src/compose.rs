use std::sync::Arc;

use sha2::Digest as _;

use crate::{
    archive::certificate_file_name,
    composite_cpu::{flatten_to_rgb8, over_in_place},
    encode_pdf::encode_rgb8_page,
    foundation::error::{CertError, CertResult},
    layout::{LayoutBlock, certificate_blocks, layout_blocks},
    model::CertificateRequest,
    render::cpu::OverlaySurface,
    signature::{SignatureBlockRenderer, SignerBlock},
    template::Template,
    text::{ParleyTypesetter, Typesetter},
};

/// One finished certificate document.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RenderedCertificate {
    pub recipient: String,
    pub file_name: String,
    pub bytes: Vec<u8>,
    /// Lower-case hex SHA-256 of `bytes`.
    pub sha256: String,
}

/// Pixel-level result of a render, before document encoding.
#[derive(Clone, Debug)]
pub struct ComposedPage {
    pub width: u32,
    pub height: u32,
    /// Packed RGB8, flattened over the style backdrop.
    pub rgb8: Vec<u8>,
    pub blocks: Vec<LayoutBlock>,
    pub signers: Vec<SignerBlock>,
}

/// Renders one recipient at a time against a shared template.
///
/// The template is never written to; each render copies its pixels first.
pub struct CertificateComposer<T> {
    template: Arc<Template>,
    typesetter: T,
}

impl CertificateComposer<ParleyTypesetter> {
    /// Composer using the template's own fonts through Parley.
    pub fn with_parley(template: Arc<Template>) -> CertResult<Self> {
        let typesetter = ParleyTypesetter::new(template.fonts())?;
        Ok(Self::new(template, typesetter))
    }
}

impl<T: Typesetter> CertificateComposer<T> {
    pub fn new(template: Arc<Template>, typesetter: T) -> Self {
        Self {
            template,
            typesetter,
        }
    }

    pub fn template(&self) -> &Arc<Template> {
        &self.template
    }

    /// Render `request` to a PDF. Any failure is a composition error for this recipient.
    #[tracing::instrument(skip(self, request), fields(recipient = %request.recipient))]
    pub fn compose(&mut self, request: &CertificateRequest) -> CertResult<RenderedCertificate> {
        let page = self.compose_page(request)?;
        let dpi = self.template.style().output_dpi;
        let bytes = encode_rgb8_page(&page.rgb8, page.width, page.height, dpi)
            .map_err(|e| as_composition(&request.recipient, e))?;

        let file_name = certificate_file_name(
            &request.recipient,
            request.kind,
            request.effective_prize_rank(),
        );
        let sha256 = sha256_hex(&bytes);
        tracing::debug!(file = %file_name, bytes = bytes.len(), "certificate encoded");
        Ok(RenderedCertificate {
            recipient: request.recipient.trim().to_string(),
            file_name,
            bytes,
            sha256,
        })
    }

    /// Lay out, draw, composite and flatten, stopping short of the PDF.
    pub fn compose_page(&mut self, request: &CertificateRequest) -> CertResult<ComposedPage> {
        self.compose_page_inner(request)
            .map_err(|e| as_composition(&request.recipient, e))
    }

    fn compose_page_inner(&mut self, request: &CertificateRequest) -> CertResult<ComposedPage> {
        request.validate()?;

        let template = Arc::clone(&self.template);
        let canvas = template.canvas();
        let fonts = template.fonts();
        let style = template.style();

        let specs = certificate_blocks(request, style)?;
        let typesetter = &mut self.typesetter;
        let blocks = layout_blocks(canvas, &specs, |text, role| {
            typesetter.measure(text, fonts.get(role))
        })?;

        let mut surface = OverlaySurface::new(canvas)?;
        for block in &blocks {
            self.typesetter.draw(
                &mut surface,
                &block.text,
                fonts.get(block.role),
                block.origin,
                style.text_color,
            )?;
            if let Some(rule) = block.rule {
                surface.fill_rect(rule, style.text_color);
            }
        }

        let signers = SignatureBlockRenderer::new(&template).render(
            &request.signers,
            &mut surface,
            &mut self.typesetter,
        )?;

        let overlay = surface.finish()?;
        let mut pixels = template.base_pixels().to_vec();
        over_in_place(&mut pixels, &overlay.data)?;
        let rgb8 = flatten_to_rgb8(&pixels, style.backdrop)?;

        Ok(ComposedPage {
            width: canvas.width,
            height: canvas.height,
            rgb8,
            blocks,
            signers,
        })
    }
}

fn as_composition(recipient: &str, err: CertError) -> CertError {
    match err {
        CertError::Composition(_) => err,
        other => CertError::composition(format!("certificate for '{recipient}': {other}")),
    }
}

pub fn sha256_hex(bytes: &[u8]) -> String {
    let digest = sha2::Sha256::digest(bytes);
    let mut out = String::with_capacity(digest.len() * 2);
    for b in digest {
        out.push_str(&format!("{b:02x}"));
    }
    out
}
