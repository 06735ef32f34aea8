//! Vertical stacking of the certificate's text blocks.
//!
//! Every block is centered horizontally. The first included block sits at its
//! anchor; each later one starts `gap` pixels below the previous block's bottom
//! edge, or at its own anchor when that is lower. The running bottom edge is an
//! explicit [`LayoutCursor`] threaded from block to block.

use std::fmt::Write as _;

use crate::{
    config::LayoutStyle,
    foundation::core::{Canvas, Point, Rect, TextExtent},
    foundation::error::{CertError, CertResult},
    model::CertificateRequest,
    template::FontRole,
};

/// Vertical design anchor: `fraction * canvas_height + offset`.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Anchor {
    pub fraction: f64,
    pub offset: f64,
}

impl Anchor {
    pub const fn new(fraction: f64, offset: f64) -> Self {
        Self { fraction, offset }
    }

    pub fn resolve(self, canvas_height: f64) -> f64 {
        self.fraction * canvas_height + self.offset
    }
}

/// Horizontal rule drawn under a block, spanning a fraction of the canvas width.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RuleSpec {
    pub gap: f64,
    pub width: f64,
    pub span: (f64, f64),
}

#[derive(Clone, Debug, PartialEq)]
pub struct BlockSpec {
    pub text: String,
    pub role: FontRole,
    pub anchor: Option<Anchor>,
    /// Space between the previous included block's bottom and this block's top.
    pub gap: f64,
    pub rule: Option<RuleSpec>,
    pub include: bool,
}

impl BlockSpec {
    pub fn new(text: impl Into<String>, role: FontRole) -> Self {
        Self {
            text: text.into(),
            role,
            anchor: None,
            gap: 0.0,
            rule: None,
            include: true,
        }
    }

    pub fn anchored(mut self, anchor: Anchor) -> Self {
        self.anchor = Some(anchor);
        self
    }

    pub fn after_gap(mut self, gap: f64) -> Self {
        self.gap = gap;
        self
    }

    pub fn with_rule(mut self, rule: RuleSpec) -> Self {
        self.rule = Some(rule);
        self
    }

    pub fn when(mut self, include: bool) -> Self {
        self.include = include;
        self
    }
}

/// A positioned block, produced and consumed within a single render.
#[derive(Clone, Debug, PartialEq)]
pub struct LayoutBlock {
    pub text: String,
    pub role: FontRole,
    pub origin: Point,
    pub bounds: Rect,
    pub rule: Option<Rect>,
}

impl LayoutBlock {
    /// Lowest edge of the block, including its rule.
    pub fn bottom(&self) -> f64 {
        match self.rule {
            Some(r) => r.y1.max(self.bounds.y1),
            None => self.bounds.y1,
        }
    }
}

/// Running layout state: the bottom edge of the last placed block.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct LayoutCursor {
    pub bottom: Option<f64>,
}

pub fn center_x(canvas_width: f64, text_width: f64) -> f64 {
    (canvas_width - text_width) / 2.0
}

/// Place one block below `cursor` and return it with the advanced cursor.
pub fn place_block(
    canvas: Canvas,
    cursor: LayoutCursor,
    spec: &BlockSpec,
    extent: TextExtent,
) -> (LayoutBlock, LayoutCursor) {
    let anchor_y = spec.anchor.map(|a| a.resolve(canvas.height_f64()));
    let y = match (cursor.bottom, anchor_y) {
        (None, anchor) => anchor.unwrap_or(0.0),
        (Some(prev), None) => prev + spec.gap,
        (Some(prev), Some(anchor)) => (prev + spec.gap).max(anchor),
    };
    let x = center_x(canvas.width_f64(), extent.width);
    let bounds = Rect::new(x, y, x + extent.width, y + extent.height);

    let rule = spec.rule.map(|r| {
        let top = bounds.y1 + r.gap;
        Rect::new(
            canvas.width_f64() * r.span.0,
            top,
            canvas.width_f64() * r.span.1,
            top + r.width,
        )
    });

    let block = LayoutBlock {
        text: spec.text.clone(),
        role: spec.role,
        origin: Point::new(x, y),
        bounds,
        rule,
    };
    let next = LayoutCursor {
        bottom: Some(block.bottom()),
    };
    (block, next)
}

/// Lay out the included blocks in order, measuring each with `measure`.
pub fn layout_blocks<M>(
    canvas: Canvas,
    specs: &[BlockSpec],
    mut measure: M,
) -> CertResult<Vec<LayoutBlock>>
where
    M: FnMut(&str, FontRole) -> CertResult<TextExtent>,
{
    let mut cursor = LayoutCursor::default();
    let mut out = Vec::with_capacity(specs.len());
    for spec in specs.iter().filter(|s| s.include) {
        let extent = measure(&spec.text, spec.role)?;
        let (block, next) = place_block(canvas, cursor, spec, extent);
        out.push(block);
        cursor = next;
    }
    Ok(out)
}

/// The fixed block sequence of a certificate, with conditional blocks switched on or off.
pub fn certificate_blocks(
    request: &CertificateRequest,
    style: &LayoutStyle,
) -> CertResult<Vec<BlockSpec>> {
    let title = format!("{} {}", style.title_prefix, request.kind.label());
    let rank = request.effective_prize_rank();
    let prize = rank.map(|r| format!("{} Prize", r.label()));

    let (event_line, date_line) = match &request.event {
        Some(event) if !event.name.trim().is_empty() => {
            let mut line = format!("{} {}", style.phrase_for(request.kind), event.name.trim());
            if let Some(org) = event.organizer.as_deref().map(str::trim)
                && !org.is_empty()
            {
                line.push_str(" Event by ");
                line.push_str(org);
            }

            let mut date = String::from("on ");
            write!(date, "{}", event.date.format(&style.date_format)).map_err(|_| {
                CertError::composition(format!(
                    "invalid date format pattern '{}'",
                    style.date_format
                ))
            })?;
            if let Some(venue) = event.venue.as_deref().map(str::trim)
                && !venue.is_empty()
            {
                date.push_str(" at ");
                date.push_str(venue);
            }
            (Some(line), Some(date))
        }
        _ => (None, None),
    };
    let speaker = request.speaker.as_ref().and_then(|s| s.line());

    let underline = RuleSpec {
        gap: style.underline_gap,
        width: style.underline_width,
        span: style.underline_span,
    };

    Ok(vec![
        BlockSpec::new(title, FontRole::Title).anchored(style.title_anchor),
        BlockSpec::new(prize.clone().unwrap_or_default(), FontRole::Prize)
            .after_gap(style.prize_gap)
            .when(prize.is_some()),
        BlockSpec::new(style.header_text.clone(), FontRole::Header)
            .anchored(style.header_anchor)
            .after_gap(style.header_gap),
        BlockSpec::new(request.recipient.trim(), FontRole::Name)
            .anchored(style.name_anchor)
            .after_gap(style.name_gap)
            .with_rule(underline),
        BlockSpec::new(event_line.clone().unwrap_or_default(), FontRole::Details)
            .after_gap(style.event_gap)
            .when(event_line.is_some()),
        BlockSpec::new(date_line.clone().unwrap_or_default(), FontRole::Details)
            .after_gap(style.date_gap)
            .when(date_line.is_some()),
        BlockSpec::new(speaker.clone().unwrap_or_default(), FontRole::Speaker)
            .after_gap(style.speaker_gap)
            .when(speaker.is_some()),
    ])
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;
    use crate::model::{CertificateKind, EventInfo, PrizeRank, SpeakerInfo};

    fn canvas() -> Canvas {
        Canvas::new(2000, 1400).unwrap()
    }

    /// Width proportional to character count; height fixed per role.
    fn fake_measure(text: &str, role: FontRole) -> CertResult<TextExtent> {
        let h = match role {
            FontRole::Title => 120.0,
            FontRole::Name => 70.0,
            _ => 40.0,
        };
        Ok(TextExtent::new(text.chars().count() as f64 * 17.0, h))
    }

    #[test]
    fn center_x_balances_around_midline() {
        for (w, tw) in [(2000.0, 333.0), (101.0, 100.0), (640.0, 0.0), (50.0, 80.0)] {
            let x = center_x(w, tw);
            assert!((x + tw / 2.0 - w / 2.0).abs() < 1e-9);
        }
    }

    #[test]
    fn unanchored_blocks_stack_exactly_at_gap() {
        let specs = vec![
            BlockSpec::new("a", FontRole::Title).anchored(Anchor::new(0.0, 140.0)),
            BlockSpec::new("bb", FontRole::Details).after_gap(12.0),
            BlockSpec::new("ccc", FontRole::Details).after_gap(7.0),
        ];
        let blocks = layout_blocks(canvas(), &specs, fake_measure).unwrap();
        assert_eq!(blocks.len(), 3);
        assert_eq!(blocks[0].origin.y, 140.0);
        assert_eq!(blocks[1].origin.y, blocks[0].bottom() + 12.0);
        assert_eq!(blocks[2].origin.y, blocks[1].bottom() + 7.0);
    }

    #[test]
    fn anchor_wins_only_when_lower_than_stacked_position() {
        let c = canvas();
        let first = BlockSpec::new("x", FontRole::Title).anchored(Anchor::new(0.0, 10.0));
        let (a, cursor) = place_block(c, LayoutCursor::default(), &first, TextExtent::new(5.0, 50.0));
        assert_eq!(a.origin.y, 10.0);
        assert_eq!(cursor.bottom, Some(60.0));

        let far = BlockSpec::new("y", FontRole::Header)
            .anchored(Anchor::new(0.5, 0.0))
            .after_gap(5.0);
        let (b, _) = place_block(c, cursor, &far, TextExtent::new(5.0, 5.0));
        assert_eq!(b.origin.y, 700.0);

        let near = BlockSpec::new("z", FontRole::Header)
            .anchored(Anchor::new(0.0, 20.0))
            .after_gap(5.0);
        let (b, _) = place_block(c, cursor, &near, TextExtent::new(5.0, 5.0));
        assert_eq!(b.origin.y, 65.0);
    }

    #[test]
    fn omitted_block_leaves_no_residual_gap() {
        let with = vec![
            BlockSpec::new("top", FontRole::Title).anchored(Anchor::new(0.0, 0.0)),
            BlockSpec::new("mid", FontRole::Details).after_gap(30.0),
            BlockSpec::new("end", FontRole::Details).after_gap(10.0),
        ];
        let mut without = with.clone();
        without[1].include = false;

        let a = layout_blocks(canvas(), &with, fake_measure).unwrap();
        let b = layout_blocks(canvas(), &without, fake_measure).unwrap();
        assert_eq!(a.len(), 3);
        assert_eq!(b.len(), 2);
        assert_eq!(a[0], b[0]);
        assert_eq!(b[1].text, "end");
        assert_eq!(b[1].origin.y, b[0].bottom() + 10.0);
    }

    #[test]
    fn every_block_starts_below_previous_bottom_plus_gap() {
        let req = CertificateRequest::new("Ada Lovelace", CertificateKind::Excellence)
            .with_prize_rank(PrizeRank::First)
            .with_event(EventInfo {
                name: "HackFest".to_string(),
                date: NaiveDate::from_ymd_opt(2024, 3, 9).unwrap(),
                organizer: Some("OSPC".to_string()),
                venue: Some("VIT Chennai".to_string()),
            })
            .with_speaker(SpeakerInfo {
                name: "Grace".to_string(),
                designation: None,
            });
        let style = LayoutStyle::default();
        let specs = certificate_blocks(&req, &style).unwrap();
        let included: Vec<_> = specs.iter().filter(|s| s.include).collect();
        let blocks = layout_blocks(Canvas::new(600, 400).unwrap(), &specs, fake_measure).unwrap();
        assert_eq!(blocks.len(), 7);
        for (i, pair) in blocks.windows(2).enumerate() {
            let gap = included[i + 1].gap;
            assert!(pair[1].origin.y >= pair[0].bottom() + gap - 1e-9);
        }
    }

    #[test]
    fn certificate_blocks_compose_original_phrasing() {
        let req = CertificateRequest::new("  Ada  ", CertificateKind::Participation).with_event(
            EventInfo {
                name: "HackFest".to_string(),
                date: NaiveDate::from_ymd_opt(2024, 3, 9).unwrap(),
                organizer: Some("OSPC".to_string()),
                venue: Some("VIT Chennai".to_string()),
            },
        );
        let specs = certificate_blocks(&req, &LayoutStyle::default()).unwrap();
        let texts: Vec<_> = specs
            .iter()
            .filter(|s| s.include)
            .map(|s| s.text.as_str())
            .collect();
        assert_eq!(
            texts,
            vec![
                "Of Participation",
                "THIS CERTIFICATE IS PROUDLY PRESENTED TO",
                "Ada",
                "for participating in HackFest Event by OSPC",
                "on March 09, 2024 at VIT Chennai",
            ]
        );
    }

    #[test]
    fn prize_line_only_for_excellence() {
        let style = LayoutStyle::default();
        let exc = CertificateRequest::new("Ada", CertificateKind::Excellence)
            .with_prize_rank(PrizeRank::Third);
        let specs = certificate_blocks(&exc, &style).unwrap();
        assert!(specs[1].include);
        assert_eq!(specs[1].text, "Third Prize");

        let mut app = exc.clone();
        app.kind = CertificateKind::Appreciation;
        let specs = certificate_blocks(&app, &style).unwrap();
        assert!(!specs[1].include);
    }

    #[test]
    fn empty_text_gets_a_zero_width_box_at_its_anchor() {
        let spec = BlockSpec::new("", FontRole::Name).anchored(Anchor::new(0.5, 0.0));
        let blocks = layout_blocks(canvas(), &[spec], |_, _| Ok(TextExtent::new(0.0, 0.0))).unwrap();
        assert_eq!(blocks[0].origin, Point::new(1000.0, 700.0));
        assert_eq!(blocks[0].bounds.width(), 0.0);
    }

    #[test]
    fn underline_spans_middle_half_of_canvas() {
        let spec = BlockSpec::new("Ada", FontRole::Name)
            .anchored(Anchor::new(0.0, 100.0))
            .with_rule(RuleSpec {
                gap: 30.0,
                width: 2.0,
                span: (0.25, 0.75),
            });
        let (block, cursor) = place_block(
            canvas(),
            LayoutCursor::default(),
            &spec,
            TextExtent::new(90.0, 70.0),
        );
        let rule = block.rule.unwrap();
        assert_eq!(rule, Rect::new(500.0, 200.0, 1500.0, 202.0));
        assert_eq!(cursor.bottom, Some(202.0));
    }

    #[test]
    fn measurement_errors_propagate() {
        let specs = vec![BlockSpec::new("boom", FontRole::Name)];
        let err = layout_blocks(canvas(), &specs, |_, _| Err(CertError::composition("no glyphs")))
            .unwrap_err();
        assert!(matches!(err, CertError::Composition(_)));
    }
}
