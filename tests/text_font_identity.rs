use std::sync::Arc;

use certforge::{
    Canvas, CertificateComposer, CertificateKind, CertificateRequest, ComposedPage, FontFace,
    FontRole, FontSet, FontSizes, LayoutBlock, LayoutStyle, OverlaySurface, ParleyTypesetter,
    Rgba8, Template, Typesetter,
};

fn dejavu() -> FontFace {
    let bytes = std::fs::read("tests/data/fonts/DejaVuSans.ttf").unwrap();
    FontFace::new("DejaVuSans.ttf", bytes).unwrap()
}

#[test]
fn typesetter_exposes_font_family_from_bytes() {
    let fonts = FontSet::uniform(dejavu(), FontSizes::default());
    let t = ParleyTypesetter::new(&fonts).unwrap();
    let family = t.family_name(&fonts.get(FontRole::Name).face).unwrap();
    assert!(family.contains("DejaVu"));
}

#[test]
fn measurement_is_pure_and_grows_with_text() {
    let fonts = FontSet::uniform(dejavu(), FontSizes::default());
    let mut t = ParleyTypesetter::new(&fonts).unwrap();
    let name = fonts.get(FontRole::Name);

    let short = t.measure("Ada", name).unwrap();
    let long = t.measure("Ada Lovelace", name).unwrap();
    let again = t.measure("Ada", name).unwrap();
    assert!(short.width > 0.0 && short.height > 0.0);
    assert!(long.width > short.width);
    assert_eq!(short, again);

    let bigger = t.measure("Ada", fonts.get(FontRole::Title)).unwrap();
    assert!(bigger.width > short.width);

    let empty = t.measure("", name).unwrap();
    assert_eq!(empty.width, 0.0);
}

#[test]
fn drawn_glyphs_cover_pixels_inside_the_measured_box() {
    let fonts = FontSet::uniform(dejavu(), FontSizes::default());
    let mut t = ParleyTypesetter::new(&fonts).unwrap();
    let spec = fonts.get(FontRole::Details);
    let extent = t.measure("HHHH", spec).unwrap();

    let mut surface = OverlaySurface::new(Canvas::new(400, 120).unwrap()).unwrap();
    t.draw(
        &mut surface,
        "HHHH",
        spec,
        kurbo::Point::new(10.0, 10.0),
        Rgba8::BLACK,
    )
    .unwrap();
    let frame = surface.finish().unwrap();

    let mut inked = 0usize;
    for y in 0..frame.height {
        for x in 0..frame.width {
            let a = frame.data[((y * frame.width + x) * 4 + 3) as usize];
            if a == 0 {
                continue;
            }
            inked += 1;
            assert!(f64::from(x) >= 9.0 && f64::from(x) <= 11.0 + extent.width);
            assert!(f64::from(y) >= 9.0 && f64::from(y) <= 11.0 + extent.height);
        }
    }
    assert!(inked > 0);
}

fn is_ink(page: &ComposedPage, x: u32, y: u32) -> bool {
    let i = ((y * page.width + x) * 3) as usize;
    page.rgb8[i..i + 3].iter().any(|&c| c < 160)
}

/// Inked `(min_x, max_x)` over the rows `y0..y1`, if any.
fn ink_span(page: &ComposedPage, y0: u32, y1: u32) -> Option<(u32, u32)> {
    let mut span: Option<(u32, u32)> = None;
    for y in y0..y1.min(page.height) {
        for x in 0..page.width {
            if is_ink(page, x, y) {
                span = Some(match span {
                    Some((lo, hi)) => (lo.min(x), hi.max(x)),
                    None => (x, x),
                });
            }
        }
    }
    span
}

fn assert_ink_within(page: &ComposedPage, block: &LayoutBlock) {
    let b = block.bounds;
    let (lo, hi) = ink_span(page, b.y0.floor() as u32, b.y1.ceil() as u32)
        .unwrap_or_else(|| panic!("no ink for '{}'", block.text));
    assert!(f64::from(lo) >= b.x0 - 2.0, "'{}' starts left of its box", block.text);
    assert!(f64::from(hi) <= b.x1 + 2.0, "'{}' ends right of its box", block.text);
    assert!(
        f64::from(hi - lo) >= 0.8 * b.width(),
        "'{}' ink covers {} of {} px",
        block.text,
        hi - lo,
        b.width()
    );
}

#[test]
fn composed_text_lands_inside_its_layout_blocks() {
    let sizes = FontSizes {
        title: 40.0,
        name: 36.0,
        header: 14.0,
        details: 12.0,
        signature: 10.0,
        prize: 18.0,
        speaker: 10.0,
    };
    let template = Template::new(
        image::RgbaImage::from_pixel(800, 600, image::Rgba([255, 255, 255, 255])),
        FontSet::uniform(dejavu(), sizes),
        LayoutStyle::default(),
    )
    .unwrap();
    let mut composer = CertificateComposer::with_parley(Arc::new(template)).unwrap();
    let page = composer
        .compose_page(&CertificateRequest::new(
            "Ada Lovelace",
            CertificateKind::Participation,
        ))
        .unwrap();

    let texts: Vec<_> = page.blocks.iter().map(|b| b.text.as_str()).collect();
    assert_eq!(
        texts,
        vec![
            "Of Participation",
            "THIS CERTIFICATE IS PROUDLY PRESENTED TO",
            "Ada Lovelace",
        ]
    );
    let (title, header, name) = (&page.blocks[0], &page.blocks[1], &page.blocks[2]);

    assert_ink_within(&page, title);
    assert_ink_within(&page, name);

    // Nothing between the header's bottom edge and the top of the name.
    let gap_top = header.bounds.y1.ceil() as u32 + 1;
    let gap_bottom = name.bounds.y0.floor() as u32;
    assert!(gap_top < gap_bottom);
    assert_eq!(ink_span(&page, gap_top, gap_bottom), None);
}
