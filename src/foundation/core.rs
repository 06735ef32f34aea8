use crate::foundation::error::{CertError, CertResult};

pub use kurbo::{Point, Rect};

/// Pixel dimensions of the certificate canvas.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Canvas {
    pub width: u32,
    pub height: u32,
}

impl Canvas {
    pub fn new(width: u32, height: u32) -> CertResult<Self> {
        if width == 0 || height == 0 {
            return Err(CertError::resource("canvas width/height must be non-zero"));
        }
        if width > u32::from(u16::MAX) || height > u32::from(u16::MAX) {
            return Err(CertError::resource(format!(
                "canvas {width}x{height} exceeds the {max}px raster limit",
                max = u16::MAX
            )));
        }
        Ok(Self { width, height })
    }

    pub fn width_f64(self) -> f64 {
        f64::from(self.width)
    }

    pub fn height_f64(self) -> f64 {
        f64::from(self.height)
    }

    /// Dimensions as the `u16` pair the raster surface requires.
    pub fn surface_size(self) -> CertResult<(u16, u16)> {
        let w: u16 = self
            .width
            .try_into()
            .map_err(|_| CertError::composition("canvas width exceeds u16"))?;
        let h: u16 = self
            .height
            .try_into()
            .map_err(|_| CertError::composition("canvas height exceeds u16"))?;
        Ok((w, h))
    }

    pub fn byte_len(self) -> usize {
        self.width as usize * self.height as usize * 4
    }
}

/// Straight-alpha RGBA8 color.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Rgba8 {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Rgba8 {
    pub const BLACK: Self = Self::new(0, 0, 0, 255);
    pub const WHITE: Self = Self::new(255, 255, 255, 255);

    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    pub fn to_array(self) -> [u8; 4] {
        [self.r, self.g, self.b, self.a]
    }
}

/// Measured size of a run of text at a given font size, in pixels.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct TextExtent {
    pub width: f64,
    pub height: f64,
}

impl TextExtent {
    pub fn new(width: f64, height: f64) -> Self {
        Self {
            width: width.max(0.0),
            height: height.max(0.0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canvas_rejects_zero_and_oversized_dimensions() {
        assert!(Canvas::new(0, 10).is_err());
        assert!(Canvas::new(10, 0).is_err());
        assert!(Canvas::new(70_000, 10).is_err());
        let c = Canvas::new(3508, 2480).unwrap();
        assert_eq!(c.surface_size().unwrap(), (3508, 2480));
        assert_eq!(c.byte_len(), 3508 * 2480 * 4);
    }

    #[test]
    fn text_extent_clamps_negative_sizes() {
        let e = TextExtent::new(-1.0, 4.0);
        assert_eq!(e.width, 0.0);
        assert_eq!(e.height, 4.0);
    }
}
