//! Text measurement and glyph drawing.
//!
//! Measurement is a pure function of `(text, font)`; the typesetters below keep
//! scratch contexts and caches, but the returned extents depend on nothing else.

use std::{borrow::Cow, collections::HashMap, sync::Arc};

use crate::{
    foundation::core::{Point, Rect, Rgba8, TextExtent},
    foundation::error::{CertError, CertResult},
    render::cpu::OverlaySurface,
    template::{FontFace, FontRole, FontSet, FontSpec},
};

pub trait Typesetter {
    fn measure(&mut self, text: &str, font: &FontSpec) -> CertResult<TextExtent>;

    /// Draw `text` with the top-left of its layout box at `origin`.
    fn draw(
        &mut self,
        surface: &mut OverlaySurface,
        text: &str,
        font: &FontSpec,
        origin: Point,
        color: Rgba8,
    ) -> CertResult<()>;
}

fn face_key(face: &FontFace) -> usize {
    Arc::as_ptr(face.bytes()) as usize
}

/// Shapes with Parley and rasterizes glyph runs through the overlay surface.
pub struct ParleyTypesetter {
    font_ctx: parley::FontContext,
    layout_ctx: parley::LayoutContext<()>,
    families: HashMap<usize, String>,
    cpu_fonts: HashMap<usize, vello_cpu::peniko::FontData>,
}

impl ParleyTypesetter {
    /// Register every distinct face of `fonts`; a face with no usable family is a resource error.
    pub fn new(fonts: &FontSet) -> CertResult<Self> {
        let mut this = Self {
            font_ctx: parley::FontContext::default(),
            layout_ctx: parley::LayoutContext::new(),
            families: HashMap::new(),
            cpu_fonts: HashMap::new(),
        };
        for role in FontRole::ALL {
            this.register(&fonts.get(role).face)?;
        }
        Ok(this)
    }

    /// Family name Parley resolved for `face`, if it was registered.
    pub fn family_name(&self, face: &FontFace) -> Option<&str> {
        self.families.get(&face_key(face)).map(String::as_str)
    }

    fn register(&mut self, face: &FontFace) -> CertResult<()> {
        let key = face_key(face);
        if self.families.contains_key(&key) {
            return Ok(());
        }

        let families = self
            .font_ctx
            .collection
            .register_fonts(parley::fontique::Blob::from(face.bytes().to_vec()), None);
        let family_id = families.first().map(|(id, _)| *id).ok_or_else(|| {
            CertError::resource(format!(
                "font '{}' has no usable font family",
                face.label()
            ))
        })?;
        let family_name = self
            .font_ctx
            .collection
            .family_name(family_id)
            .ok_or_else(|| {
                CertError::resource(format!("font '{}' family has no name", face.label()))
            })?
            .to_string();
        tracing::debug!(font = face.label(), family = %family_name, "registered font face");

        let cpu_font = vello_cpu::peniko::FontData::new(
            vello_cpu::peniko::Blob::from(face.bytes().as_ref().clone()),
            0,
        );
        self.families.insert(key, family_name);
        self.cpu_fonts.insert(key, cpu_font);
        Ok(())
    }

    fn layout(&mut self, text: &str, font: &FontSpec) -> CertResult<parley::Layout<()>> {
        let family = self
            .families
            .get(&face_key(&font.face))
            .cloned()
            .ok_or_else(|| {
                CertError::composition(format!(
                    "font '{}' was not registered with the typesetter",
                    font.face.label()
                ))
            })?;

        let mut builder = self
            .layout_ctx
            .ranged_builder(&mut self.font_ctx, text, 1.0, true);
        builder.push_default(parley::style::StyleProperty::FontStack(
            parley::style::FontStack::Source(Cow::Owned(family)),
        ));
        builder.push_default(parley::style::StyleProperty::FontSize(font.size_px));

        let mut layout: parley::Layout<()> = builder.build(text);
        layout.break_all_lines(None);
        Ok(layout)
    }
}

impl Typesetter for ParleyTypesetter {
    fn measure(&mut self, text: &str, font: &FontSpec) -> CertResult<TextExtent> {
        let layout = self.layout(text, font)?;
        Ok(TextExtent::new(
            f64::from(layout.width()),
            f64::from(layout.height()),
        ))
    }

    fn draw(
        &mut self,
        surface: &mut OverlaySurface,
        text: &str,
        font: &FontSpec,
        origin: Point,
        color: Rgba8,
    ) -> CertResult<()> {
        let layout = self.layout(text, font)?;
        let cpu_font = self
            .cpu_fonts
            .get(&face_key(&font.face))
            .ok_or_else(|| CertError::composition("font data missing for registered face"))?;

        for line in layout.lines() {
            for item in line.items() {
                let parley::layout::PositionedLayoutItem::GlyphRun(run) = item else {
                    continue;
                };
                // Positioned glyphs carry the run offset, advances and baseline.
                let glyphs = run.positioned_glyphs().map(|g| vello_cpu::Glyph {
                    id: g.id,
                    x: g.x,
                    y: g.y,
                });
                surface.fill_glyphs(cpu_font, run.run().font_size(), origin, color, glyphs);
            }
        }
        Ok(())
    }
}

/// Font-free typesetter: every character is a box `advance * size` wide and
/// `size` tall. Non-whitespace characters are drawn as filled boxes.
///
/// Used for layout previews and in tests, where no font file is available.
#[derive(Clone, Debug)]
pub struct BoxTypesetter {
    pub advance: f64,
}

impl Default for BoxTypesetter {
    fn default() -> Self {
        Self { advance: 0.5 }
    }
}

impl Typesetter for BoxTypesetter {
    fn measure(&mut self, text: &str, font: &FontSpec) -> CertResult<TextExtent> {
        let size = f64::from(font.size_px);
        Ok(TextExtent::new(
            text.chars().count() as f64 * size * self.advance,
            size,
        ))
    }

    fn draw(
        &mut self,
        surface: &mut OverlaySurface,
        text: &str,
        font: &FontSpec,
        origin: Point,
        color: Rgba8,
    ) -> CertResult<()> {
        let size = f64::from(font.size_px);
        let step = size * self.advance;
        for (i, ch) in text.chars().enumerate() {
            if ch.is_whitespace() {
                continue;
            }
            let x = origin.x + i as f64 * step;
            surface.fill_rect(
                Rect::new(x + 1.0, origin.y + 1.0, x + step - 1.0, origin.y + size - 1.0),
                color,
            );
        }
        Ok(())
    }
}
