//! Caption layout for titled QR images.
//!
//! A titled image is the rendered symbol placed on a taller canvas with a band
//! above it (title) and a band below it (value). The band height is one sixth
//! of the canvas height. Text offsets follow two fixed formulas:
//!
//! - title y = `(band - text_height) / 2`
//! - value y = `(canvas_height - band) + text_height / 2`
//!
//! [`CaptionLayout::compute`] is pure arithmetic on measured text sizes so it
//! can be checked without a font. [`measure_text`] supplies those sizes as the
//! inked pixel bounds of the text, not its nominal line height.

use ab_glyph::{point, Font, GlyphId, PxScale, Rect, ScaleFont};

/// Axis-aligned text box in canvas pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextBox {
    /// Left edge
    pub x: i32,
    /// Top edge
    pub y: i32,
    /// Measured text width
    pub width: u32,
    /// Measured text height
    pub height: u32,
}

impl TextBox {
    /// Bottom edge (exclusive).
    pub fn bottom(&self) -> i32 {
        self.y + self.height as i32
    }

    /// Right edge (exclusive).
    pub fn right(&self) -> i32 {
        self.x + self.width as i32
    }

    /// Whether two boxes share at least one pixel.
    pub fn overlaps(&self, other: &TextBox) -> bool {
        self.x < other.right()
            && other.x < self.right()
            && self.y < other.bottom()
            && other.y < self.bottom()
    }
}

/// Inked bounds of one line of text, relative to the origin handed to
/// `imageproc::drawing::draw_text_mut`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TextExtent {
    /// Left edge of the first inked column
    pub min_x: i32,
    /// Top edge of the first inked row
    pub min_y: i32,
    /// Inked width
    pub width: u32,
    /// Inked height, descenders included
    pub height: u32,
}

impl TextExtent {
    /// `(width, height)`, as taken by [`CaptionLayout::compute`].
    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}

/// Measure `text` as `draw_text_mut` will draw it.
///
/// Glyphs are placed the same way: baseline at the font ascent, advancing by
/// `h_advance` and kerning against the previous outlined glyph. The result is
/// the union of the glyphs' pixel bounds. Text with no outlines (empty or
/// whitespace) measures as zero.
pub fn measure_text(font: &impl Font, scale: PxScale, text: &str) -> TextExtent {
    let scaled = font.as_scaled(scale);
    let mut caret = 0.0_f32;
    let mut last: Option<GlyphId> = None;
    let mut ink: Option<Rect> = None;

    for c in text.chars() {
        let id = scaled.glyph_id(c);
        let glyph = id.with_scale_and_position(scale, point(caret, scaled.ascent()));
        caret += scaled.h_advance(id);
        let Some(outlined) = scaled.outline_glyph(glyph) else {
            continue;
        };
        if let Some(last) = last {
            caret += scaled.kern(id, last);
        }
        last = Some(id);

        let bounds = outlined.px_bounds();
        ink = Some(match ink {
            None => bounds,
            Some(union) => Rect {
                min: point(union.min.x.min(bounds.min.x), union.min.y.min(bounds.min.y)),
                max: point(union.max.x.max(bounds.max.x), union.max.y.max(bounds.max.y)),
            },
        });
    }

    ink.map_or_else(TextExtent::default, |rect| TextExtent {
        min_x: rect.min.x.round() as i32,
        min_y: rect.min.y.round() as i32,
        width: rect.width().round() as u32,
        height: rect.height().round() as u32,
    })
}

/// Placement of the symbol and both captions on the canvas.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptionLayout {
    /// Canvas width
    pub width: u32,
    /// Canvas height
    pub height: u32,
    /// Height of the top and bottom caption bands
    pub band_height: u32,
    /// Top-left corner of the rendered symbol
    pub symbol_origin: (u32, u32),
    /// Title text placement
    pub title: TextBox,
    /// Value text placement
    pub value: TextBox,
}

impl CaptionLayout {
    /// Lay out a square symbol of `symbol_side` pixels with the given measured
    /// `(width, height)` text sizes.
    ///
    /// The canvas is 3/2 of the symbol height so each band is a sixth of it,
    /// and at least as wide as the wider caption plus `margin` on both sides.
    pub fn compute(
        symbol_side: u32,
        title_size: (u32, u32),
        value_size: (u32, u32),
        margin: u32,
    ) -> Self {
        let widest_text = title_size.0.max(value_size.0) + 2 * margin;
        let width = symbol_side.max(widest_text);
        let height = (symbol_side * 3).div_ceil(2);
        let band_height = height / 6;

        let symbol_origin = ((width - symbol_side) / 2, (height - symbol_side) / 2);

        let centered_x = |text_width: u32| (width as i32 - text_width as i32) / 2;

        let title = TextBox {
            x: centered_x(title_size.0),
            y: (band_height as i32 - title_size.1 as i32) / 2,
            width: title_size.0,
            height: title_size.1,
        };
        let value = TextBox {
            x: centered_x(value_size.0),
            y: (height - band_height) as i32 + (value_size.1 / 2) as i32,
            width: value_size.0,
            height: value_size.1,
        };

        Self {
            width,
            height,
            band_height,
            symbol_origin,
            title,
            value,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ab_glyph::FontRef;

    const FIXTURE_FONT: &[u8] = include_bytes!("../../tests/fixtures/DejaVuSans.ttf");

    fn font() -> FontRef<'static> {
        FontRef::try_from_slice(FIXTURE_FONT).unwrap()
    }

    #[test]
    fn blank_text_measures_zero() {
        let scale = PxScale::from(24.0);
        assert_eq!(measure_text(&font(), scale, ""), TextExtent::default());
        assert_eq!(measure_text(&font(), scale, "   "), TextExtent::default());
    }

    #[test]
    fn extent_covers_descenders_below_the_baseline() {
        let font = font();
        let scale = PxScale::from(24.0);
        let ascent = font.as_scaled(scale).ascent();
        let cap = measure_text(&font, scale, "L");
        let descending = measure_text(&font, scale, "Lp");

        // Ink starts below the ascent line, not at the draw origin.
        assert!(cap.min_y > 0);
        assert_eq!(descending.min_y, cap.min_y);
        assert!((cap.min_y + cap.height as i32) as f32 <= ascent.ceil());
        assert!((descending.min_y + descending.height as i32) as f32 > ascent);
        assert!(descending.width > cap.width);
    }

    #[test]
    fn band_is_a_sixth_of_the_canvas() {
        let layout = CaptionLayout::compute(290, (80, 18), (90, 18), 10);
        assert_eq!(layout.height, 435);
        assert_eq!(layout.band_height, 72);
        assert!(layout.symbol_origin.1 >= layout.band_height);
        assert!(layout.symbol_origin.1 + 290 <= layout.height - layout.band_height);
    }

    #[test]
    fn offsets_follow_band_formulas() {
        let layout = CaptionLayout::compute(290, (80, 18), (90, 20), 10);
        assert_eq!(layout.title.y, (72 - 18) / 2);
        assert_eq!(layout.value.y, (435 - 72) + 10);
        assert_eq!(layout.title.x, (290 - 80) / 2);
        assert_eq!(layout.value.x, (290 - 90) / 2);
    }

    #[test]
    fn captions_do_not_overlap() {
        let layout = CaptionLayout::compute(250, (120, 22), (120, 22), 10);
        assert!(!layout.title.overlaps(&layout.value));
        assert!(layout.title.bottom() <= layout.band_height as i32);
        assert!(layout.value.y >= (layout.height - layout.band_height) as i32);
        assert!(layout.value.bottom() <= layout.height as i32);
    }

    #[test]
    fn wide_caption_widens_canvas() {
        let layout = CaptionLayout::compute(100, (300, 20), (40, 20), 8);
        assert_eq!(layout.width, 316);
        assert_eq!(layout.title.x, 8);
        assert_eq!(layout.symbol_origin.0, 108);
    }

    #[test]
    fn overlap_detection() {
        let a = TextBox { x: 0, y: 0, width: 10, height: 10 };
        let b = TextBox { x: 9, y: 9, width: 5, height: 5 };
        let c = TextBox { x: 10, y: 0, width: 5, height: 5 };
        assert!(a.overlaps(&b));
        assert!(!a.overlaps(&c));
    }
}
