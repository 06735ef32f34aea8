use std::sync::Arc;

use crate::{
    assets::decode::PreparedImage,
    foundation::core::{Canvas, Point, Rect, Rgba8},
    foundation::error::{CertError, CertResult},
    render::FrameRGBA,
};

/// Transparent drawing surface the size of the canvas.
///
/// Everything a certificate adds to the template (text, rules, signatures) is
/// drawn here first and composited onto the template afterwards.
pub struct OverlaySurface {
    canvas: Canvas,
    ctx: vello_cpu::RenderContext,
}

impl OverlaySurface {
    pub fn new(canvas: Canvas) -> CertResult<Self> {
        let (w, h) = canvas.surface_size()?;
        Ok(Self {
            canvas,
            ctx: vello_cpu::RenderContext::new(w, h),
        })
    }

    pub fn canvas(&self) -> Canvas {
        self.canvas
    }

    pub fn fill_rect(&mut self, rect: Rect, color: Rgba8) {
        self.ctx
            .set_paint_transform(vello_cpu::kurbo::Affine::IDENTITY);
        self.ctx.set_transform(vello_cpu::kurbo::Affine::IDENTITY);
        self.ctx.set_paint(color_to_cpu(color));
        self.ctx.fill_rect(&rect_to_cpu(rect));
    }

    /// Draw a premultiplied image with its top-left corner at `origin`.
    pub fn draw_image(&mut self, image: &PreparedImage, origin: Point) -> CertResult<()> {
        let pixmap =
            image_premul_bytes_to_pixmap(image.rgba8_premul.as_slice(), image.width, image.height)?;
        let paint = vello_cpu::Image {
            image: vello_cpu::ImageSource::Pixmap(Arc::new(pixmap)),
            sampler: vello_cpu::peniko::ImageSampler::default(),
        };

        self.ctx
            .set_paint_transform(vello_cpu::kurbo::Affine::IDENTITY);
        self.ctx
            .set_transform(vello_cpu::kurbo::Affine::translate((origin.x, origin.y)));
        self.ctx.set_paint(paint);
        self.ctx.fill_rect(&vello_cpu::kurbo::Rect::new(
            0.0,
            0.0,
            f64::from(image.width),
            f64::from(image.height),
        ));
        self.ctx.set_transform(vello_cpu::kurbo::Affine::IDENTITY);
        Ok(())
    }

    /// Fill a run of positioned glyphs, offset by `origin`.
    pub fn fill_glyphs<I>(
        &mut self,
        font: &vello_cpu::peniko::FontData,
        font_size: f32,
        origin: Point,
        color: Rgba8,
        glyphs: I,
    ) where
        I: Iterator<Item = vello_cpu::Glyph>,
    {
        self.ctx
            .set_paint_transform(vello_cpu::kurbo::Affine::IDENTITY);
        self.ctx
            .set_transform(vello_cpu::kurbo::Affine::translate((origin.x, origin.y)));
        self.ctx.set_paint(color_to_cpu(color));
        self.ctx
            .glyph_run(font)
            .font_size(font_size)
            .fill_glyphs(glyphs);
        self.ctx.set_transform(vello_cpu::kurbo::Affine::IDENTITY);
    }

    /// Rasterize everything drawn so far and read back premultiplied RGBA8.
    pub fn finish(mut self) -> CertResult<FrameRGBA> {
        let (w, h) = self.canvas.surface_size()?;
        let mut pixmap = vello_cpu::Pixmap::new(w, h);
        self.ctx.flush();
        self.ctx.render_to_pixmap(&mut pixmap);

        let data = pixmap.data_as_u8_slice().to_vec();
        if data.len() != self.canvas.byte_len() {
            return Err(CertError::composition(
                "overlay readback size does not match canvas",
            ));
        }
        Ok(FrameRGBA {
            width: self.canvas.width,
            height: self.canvas.height,
            data,
            premultiplied: true,
        })
    }
}

fn color_to_cpu(c: Rgba8) -> vello_cpu::peniko::Color {
    vello_cpu::peniko::Color::from_rgba8(c.r, c.g, c.b, c.a)
}

fn rect_to_cpu(r: Rect) -> vello_cpu::kurbo::Rect {
    vello_cpu::kurbo::Rect::new(r.x0, r.y0, r.x1, r.y1)
}

fn image_premul_bytes_to_pixmap(
    rgba8_premul: &[u8],
    width: u32,
    height: u32,
) -> CertResult<vello_cpu::Pixmap> {
    let w: u16 = width
        .try_into()
        .map_err(|_| CertError::composition("image width exceeds u16"))?;
    let h: u16 = height
        .try_into()
        .map_err(|_| CertError::composition("image height exceeds u16"))?;
    if rgba8_premul.len() != width as usize * height as usize * 4 {
        return Err(CertError::composition("prepared image byte length mismatch"));
    }

    let mut may_have_opacities = false;
    let mut pixels = Vec::with_capacity(width as usize * height as usize);
    for px in rgba8_premul.chunks_exact(4) {
        let a = px[3];
        may_have_opacities |= a != 255;
        pixels.push(vello_cpu::peniko::color::PremulRgba8 {
            r: px[0],
            g: px[1],
            b: px[2],
            a,
        });
    }

    Ok(vello_cpu::Pixmap::from_parts_with_opacity(
        pixels,
        w,
        h,
        may_have_opacities,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn alpha_at(frame: &FrameRGBA, x: u32, y: u32) -> u8 {
        frame.data[((y * frame.width + x) * 4 + 3) as usize]
    }

    #[test]
    fn untouched_surface_is_fully_transparent() {
        let surface = OverlaySurface::new(Canvas::new(16, 8).unwrap()).unwrap();
        let frame = surface.finish().unwrap();
        assert_eq!((frame.width, frame.height), (16, 8));
        assert!(frame.premultiplied);
        assert!(frame.data.iter().all(|&b| b == 0));
    }

    #[test]
    fn filled_rect_covers_only_its_pixels() {
        let mut surface = OverlaySurface::new(Canvas::new(16, 16).unwrap()).unwrap();
        surface.fill_rect(Rect::new(4.0, 4.0, 8.0, 8.0), Rgba8::BLACK);
        let frame = surface.finish().unwrap();
        assert_eq!(alpha_at(&frame, 5, 5), 255);
        assert_eq!(alpha_at(&frame, 12, 12), 0);
        assert_eq!(alpha_at(&frame, 0, 0), 0);
    }

    #[test]
    fn image_lands_at_origin() {
        let img = PreparedImage {
            width: 2,
            height: 2,
            rgba8_premul: Arc::new(vec![255u8; 16]),
        };
        let mut surface = OverlaySurface::new(Canvas::new(8, 8).unwrap()).unwrap();
        surface.draw_image(&img, Point::new(4.0, 4.0)).unwrap();
        let frame = surface.finish().unwrap();
        assert_eq!(alpha_at(&frame, 5, 5), 255);
        assert_eq!(alpha_at(&frame, 1, 1), 0);
    }

    #[test]
    fn mismatched_image_bytes_are_rejected() {
        let img = PreparedImage {
            width: 3,
            height: 3,
            rgba8_premul: Arc::new(vec![0u8; 4]),
        };
        let mut surface = OverlaySurface::new(Canvas::new(8, 8).unwrap()).unwrap();
        assert!(surface.draw_image(&img, Point::new(0.0, 0.0)).is_err());
    }
}
